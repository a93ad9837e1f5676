// src/tagger.rs
use anyhow::{Context, Result};
use id3::{frame, Tag, TagLike, Version};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::progress::Progress;
use crate::settings::Patterns;

/// Folder inside the source directory that receives unparsable files.
pub const QUARANTINE_DIR: &str = "_invalid";

const SEPARATOR: &str = " - ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("no \" - \" separator between artist and title")]
    MissingSeparator,
    #[error("more than one \" - \" separator")]
    TooManySeparators,
    #[error("name matches the invalid pattern")]
    InvalidMarker,
    #[error("artist or title is empty")]
    EmptyField,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackName {
    pub artist: String,
    pub title: String,
}

#[derive(Debug, Default)]
pub struct CorrectionReport {
    /// Files whose tags were written, under their (possibly renamed) path.
    pub tagged: Vec<PathBuf>,
    pub quarantined: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Rewrite featuring markers to a uniform `ft.` spelling.
pub fn normalize_featuring(basename: &str, patterns: &Patterns) -> String {
    let inline = patterns.featuring.replace_all(basename, " ft. ");
    patterns
        .featuring_paren
        .replace_all(&inline, "(ft. ")
        .into_owned()
}

/// Split `Artist - Title.mp3` into its parts.
pub fn parse_filename(basename: &str, patterns: &Patterns) -> Result<TrackName, NameError> {
    if patterns.invalid.is_match(basename) {
        return Err(NameError::InvalidMarker);
    }

    let parts: Vec<&str> = basename.split(SEPARATOR).collect();
    let (artist, title) = match parts.as_slice() {
        [artist, title] => (*artist, *title),
        [_] => return Err(NameError::MissingSeparator),
        _ => return Err(NameError::TooManySeparators),
    };

    let artist = artist.trim();
    let title = strip_extension(title).trim();

    if artist.is_empty() || title.is_empty() {
        return Err(NameError::EmptyField);
    }

    Ok(TrackName {
        artist: artist.to_string(),
        title: title.to_string(),
    })
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case("mp3") => stem,
        _ => name,
    }
}

/// The lead artist of a credit such as `A & B feat. C`, used for searching.
pub fn primary_artist(artist: &str, patterns: &Patterns) -> String {
    let lead = patterns.separators.split(artist).next().unwrap_or(artist);
    let lead = patterns.featuring.split(lead).next().unwrap_or(lead);
    let lead = patterns.featuring_paren.split(lead).next().unwrap_or(lead);
    lead.trim().to_string()
}

pub fn correct_tags(
    files: &[PathBuf],
    source: &Path,
    patterns: &Patterns,
    progress: &mut Progress,
) -> Result<CorrectionReport> {
    let quarantine = source.join(QUARANTINE_DIR);
    if quarantine.is_dir() {
        debug!("{} directory already exists.", QUARANTINE_DIR);
    } else {
        fs::create_dir_all(&quarantine)
            .with_context(|| format!("Failed to create {}", quarantine.display()))?;
    }

    let mut report = CorrectionReport::default();
    progress.print();

    for file in files {
        if file.parent() == Some(quarantine.as_path()) {
            debug!("Skipping quarantined file {}", file.display());
            progress.inc_and_print();
            continue;
        }

        match correct_file(file, &quarantine, patterns) {
            Outcome::Tagged(path) => report.tagged.push(path),
            Outcome::Quarantined(path) => report.quarantined.push(path),
            Outcome::Failed(path, e) => {
                warn!("Failed to correct {}: {:#}", path.display(), e);
                report.failed.push(path);
            }
        }

        progress.inc_and_print();
    }

    progress.finish();
    info!(
        "id3 correction completed: {} tagged, {} quarantined, {} failed.",
        report.tagged.len(),
        report.quarantined.len(),
        report.failed.len()
    );

    Ok(report)
}

enum Outcome {
    Tagged(PathBuf),
    Quarantined(PathBuf),
    /// Carries the path the file is left at, which may already be renamed.
    Failed(PathBuf, anyhow::Error),
}

fn correct_file(file: &Path, quarantine: &Path, patterns: &Patterns) -> Outcome {
    let basename = match file.file_name() {
        Some(name) => name.to_string_lossy().to_string(),
        None => return Outcome::Failed(file.to_path_buf(), anyhow::anyhow!("File has no name")),
    };

    let normalized = normalize_featuring(&basename, patterns);

    let name = match parse_filename(&normalized, patterns) {
        Ok(name) => name,
        Err(reason) => {
            let target = free_path(&quarantine.join(&basename));
            if let Err(e) = fs::rename(file, &target) {
                let e = anyhow::Error::new(e)
                    .context(format!("Failed to move to {}", target.display()));
                return Outcome::Failed(file.to_path_buf(), e);
            }
            info!("Quarantined {} as {} ({})", basename, target.display(), reason);
            return Outcome::Quarantined(target);
        }
    };

    let path = if normalized != basename {
        let renamed = file.with_file_name(&normalized);
        if renamed.exists() {
            let e = anyhow::anyhow!("{} already exists, not renaming", renamed.display());
            return Outcome::Failed(file.to_path_buf(), e);
        }
        if let Err(e) = fs::rename(file, &renamed) {
            let e = anyhow::Error::new(e).context("Failed to rename");
            return Outcome::Failed(file.to_path_buf(), e);
        }
        debug!("Renamed {} -> {}", basename, normalized);
        renamed
    } else {
        file.to_path_buf()
    };

    match write_tags(&path, &name) {
        Ok(()) => Outcome::Tagged(path),
        Err(e) => Outcome::Failed(path, e),
    }
}

/// `target`, or the first `stem (n).ext` next to it that is not taken.
fn free_path(target: &Path) -> PathBuf {
    if !target.exists() {
        return target.to_path_buf();
    }

    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = target
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 1;
    loop {
        let candidate = target.with_file_name(format!("{} ({}){}", stem, n, ext));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Set artist and title, keeping every other frame already in the file.
pub fn write_tags(file_path: &Path, name: &TrackName) -> Result<()> {
    let mut tag = Tag::read_from_path(file_path).unwrap_or_else(|_| Tag::new());

    tag.set_artist(&name.artist);
    tag.set_title(&name.title);

    tag.write_to_path(file_path, Version::Id3v24)
        .context("Failed to write ID3 tag")?;

    Ok(())
}

pub fn read_artist(file_path: &Path) -> Result<String> {
    let tag = Tag::read_from_path(file_path)
        .with_context(|| format!("No ID3 tag in {}", file_path.display()))?;

    // ID3v2.4 separates multiple values with NUL
    let artist = tag
        .artist()
        .and_then(|a| a.split('\0').next())
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .with_context(|| format!("No artist tag in {}", file_path.display()))?;

    Ok(artist.to_string())
}

/// Replace the front cover of `file_path` with `image_data`.
pub fn embed_cover(file_path: &Path, image_data: &[u8]) -> Result<()> {
    let mut tag = Tag::read_from_path(file_path).unwrap_or_else(|_| Tag::new());

    add_cover_art(&mut tag, image_data);

    tag.write_to_path(file_path, Version::Id3v24)
        .context("Failed to write ID3 tag")?;

    Ok(())
}

fn add_cover_art(tag: &mut Tag, image_data: &[u8]) {
    let picture = frame::Picture {
        mime_type: sniff_mime(image_data).to_string(),
        picture_type: frame::PictureType::CoverFront,
        description: "Cover".to_string(),
        data: image_data.to_vec(),
    };

    tag.remove_picture_by_type(frame::PictureType::CoverFront);
    tag.add_frame(picture);
}

fn sniff_mime(image_data: &[u8]) -> &'static str {
    if image_data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if image_data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        "image/png"
    } else if image_data.starts_with(b"GIF8") {
        "image/gif"
    } else {
        "image/jpeg"
    }
}
