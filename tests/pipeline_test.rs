//! Tag correction and relocation over real files in a temp directory.

use musichandler_rs::finder::find_mp3_files;
use musichandler_rs::progress::Progress;
use musichandler_rs::relocate::{relocate, RelocateMode};
use musichandler_rs::settings::{Patterns, Settings};
use musichandler_rs::tagger::{self, correct_tags, TrackName, QUARANTINE_DIR};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

fn patterns() -> Patterns {
    Settings::default().patterns().unwrap()
}

fn mp3(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"\xFF\xFBaudio frames").unwrap();
    path
}

fn tagged_mp3(dir: &Path, name: &str, artist: &str) -> PathBuf {
    let path = mp3(dir, name);
    tagger::write_tags(
        &path,
        &TrackName {
            artist: artist.to_string(),
            title: "Song".to_string(),
        },
    )
    .unwrap();
    path
}

#[test]
fn correct_tags_tags_good_names_and_quarantines_the_rest() {
    let dir = tempdir().unwrap();
    let source = dir.path();
    mp3(source, "Artist Name - Song Title.mp3");
    mp3(source, "A feat. B - Song.mp3");
    mp3(source, "Bad Name.mp3");
    mp3(source, "X - Y (Official Video).mp3");

    let files = find_mp3_files(source, None).unwrap();
    let mut progress = Progress::hidden(files.len());
    let report = correct_tags(&files, source, &patterns(), &mut progress).unwrap();

    assert!(progress.is_complete());
    assert_eq!(report.tagged.len(), 2);
    assert_eq!(report.quarantined.len(), 2);
    assert!(report.failed.is_empty());

    let good = source.join("Artist Name - Song Title.mp3");
    assert_eq!(tagger::read_artist(&good).unwrap(), "Artist Name");
    let tag = id3::Tag::read_from_path(&good).unwrap();
    assert_eq!(id3::TagLike::title(&tag), Some("Song Title"));

    let renamed = source.join("A ft. B - Song.mp3");
    assert!(renamed.exists());
    assert!(!source.join("A feat. B - Song.mp3").exists());
    assert_eq!(tagger::read_artist(&renamed).unwrap(), "A ft. B");

    // Quarantined files keep their original names and content
    let quarantine = source.join(QUARANTINE_DIR);
    assert_eq!(
        fs::read(quarantine.join("Bad Name.mp3")).unwrap(),
        b"\xFF\xFBaudio frames"
    );
    assert!(quarantine.join("X - Y (Official Video).mp3").exists());
    assert!(!source.join("Bad Name.mp3").exists());
}

#[test]
fn rerun_leaves_quarantine_alone() {
    let dir = tempdir().unwrap();
    let source = dir.path();
    mp3(source, "Artist - Title.mp3");
    mp3(source, "NoSeparator.mp3");

    let files = find_mp3_files(source, None).unwrap();
    correct_tags(&files, source, &patterns(), &mut Progress::hidden(files.len())).unwrap();

    let files = find_mp3_files(source, None).unwrap();
    assert_eq!(files.len(), 2);
    let report =
        correct_tags(&files, source, &patterns(), &mut Progress::hidden(files.len())).unwrap();

    assert_eq!(report.tagged, vec![source.join("Artist - Title.mp3")]);
    assert!(report.quarantined.is_empty());
    assert!(source.join(QUARANTINE_DIR).join("NoSeparator.mp3").exists());
}

#[test]
fn copying_twice_yields_one_file() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("in");
    let destination = dir.path().join("library");
    fs::create_dir_all(&source).unwrap();
    fs::create_dir_all(&destination).unwrap();

    let file = tagged_mp3(&source, "Artist - Song.mp3", "Artist");
    let files = vec![file.clone()];

    for _ in 0..2 {
        let report = relocate(
            &files,
            &destination,
            RelocateMode::Copy,
            &mut Progress::hidden(1),
        );
        assert_eq!(report.relocated.len(), 1);
        assert!(report.failed.is_empty());
    }

    let artist_dir = destination.join("Artist");
    assert_eq!(fs::read_dir(&artist_dir).unwrap().count(), 1);
    assert!(artist_dir.join("Artist - Song.mp3").exists());
    assert!(file.exists());
}

#[test]
fn copy_keeps_modification_time() {
    let dir = tempdir().unwrap();
    let destination = dir.path().join("library");
    fs::create_dir_all(&destination).unwrap();

    let file = tagged_mp3(dir.path(), "Artist - Song.mp3", "Artist");
    let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
    File::options()
        .write(true)
        .open(&file)
        .unwrap()
        .set_modified(when)
        .unwrap();

    let report = relocate(
        &[file],
        &destination,
        RelocateMode::Copy,
        &mut Progress::hidden(1),
    );

    let copied = &report.relocated[0];
    assert_eq!(fs::metadata(copied).unwrap().modified().unwrap(), when);
}

#[test]
fn move_removes_source_and_groups_by_artist() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("in");
    let destination = dir.path().join("library");
    fs::create_dir_all(&source).unwrap();
    fs::create_dir_all(&destination).unwrap();

    let a = tagged_mp3(&source, "One - Song.mp3", "AC/DC");
    let b = tagged_mp3(&source, "Two - Song.mp3", "AC/DC");
    let untagged = mp3(&source, "Three - Song.mp3");

    let files = vec![a.clone(), b.clone(), untagged.clone()];
    let report = relocate(
        &files,
        &destination,
        RelocateMode::Move,
        &mut Progress::hidden(files.len()),
    );

    assert_eq!(report.relocated.len(), 2);
    assert_eq!(report.failed, vec![untagged.clone()]);
    assert!(!a.exists() && !b.exists());
    assert!(untagged.exists());
    assert_eq!(fs::read_dir(destination.join("AC_DC")).unwrap().count(), 2);
}

#[test]
fn normalized_name_never_replaces_an_existing_track() {
    let dir = tempdir().unwrap();
    let source = dir.path();
    let original = source.join("A feat. B - Song.mp3");
    fs::write(&original, b"first").unwrap();
    let existing = source.join("A ft. B - Song.mp3");
    fs::write(&existing, b"second").unwrap();

    let files = vec![original.clone(), existing.clone()];
    let report =
        correct_tags(&files, source, &patterns(), &mut Progress::hidden(files.len())).unwrap();

    assert_eq!(report.tagged, vec![existing.clone()]);
    assert_eq!(report.failed, vec![original.clone()]);
    assert_eq!(fs::read(&original).unwrap(), b"first");
    assert_eq!(tagger::read_artist(&existing).unwrap(), "A ft. B");
}

#[test]
fn quarantine_keeps_earlier_files_with_the_same_name() {
    let dir = tempdir().unwrap();
    let source = dir.path();
    let quarantine = source.join(QUARANTINE_DIR);
    fs::create_dir_all(&quarantine).unwrap();
    fs::write(quarantine.join("Bad.mp3"), b"old").unwrap();
    let incoming = source.join("Bad.mp3");
    fs::write(&incoming, b"new").unwrap();

    let report = correct_tags(
        &[incoming.clone()],
        source,
        &patterns(),
        &mut Progress::hidden(1),
    )
    .unwrap();

    let kept = quarantine.join("Bad (1).mp3");
    assert_eq!(report.quarantined, vec![kept.clone()]);
    assert_eq!(fs::read(quarantine.join("Bad.mp3")).unwrap(), b"old");
    assert_eq!(fs::read(&kept).unwrap(), b"new");
    assert!(!incoming.exists());
}

#[test]
fn failed_tag_write_reports_the_renamed_path() {
    let dir = tempdir().unwrap();
    let source = dir.path();
    // A directory renames fine but cannot take an ID3 tag
    let unwritable = source.join("A feat. B - Song.mp3");
    fs::create_dir(&unwritable).unwrap();

    let report = correct_tags(
        &[unwritable.clone()],
        source,
        &patterns(),
        &mut Progress::hidden(1),
    )
    .unwrap();

    let renamed = source.join("A ft. B - Song.mp3");
    assert!(report.tagged.is_empty());
    assert_eq!(report.failed, vec![renamed.clone()]);
    assert!(renamed.exists());
    assert!(!unwritable.exists());
}
