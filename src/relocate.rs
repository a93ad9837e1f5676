// src/relocate.rs
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::progress::Progress;
use crate::tagger;

const UNKNOWN_ARTIST: &str = "Unknown Artist";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocateMode {
    Copy,
    Move,
}

impl RelocateMode {
    fn verb(self) -> &'static str {
        match self {
            RelocateMode::Copy => "copying",
            RelocateMode::Move => "moving",
        }
    }
}

#[derive(Debug, Default)]
pub struct RelocateReport {
    /// Destination paths of files that made it.
    pub relocated: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// File every track into `<destination>/<artist>/`.
pub fn relocate(
    files: &[PathBuf],
    destination: &Path,
    mode: RelocateMode,
    progress: &mut Progress,
) -> RelocateReport {
    let mut report = RelocateReport::default();
    progress.print();

    for file in files {
        match relocate_file(file, destination, mode) {
            Ok(target) => report.relocated.push(target),
            Err(e) => {
                warn!("Error {} file {}: {:#}", mode.verb(), file.display(), e);
                report.failed.push(file.clone());
            }
        }
        progress.inc_and_print();
    }

    progress.finish();
    info!(
        "Relocation ({:?}) completed: {} done, {} failed.",
        mode,
        report.relocated.len(),
        report.failed.len()
    );

    report
}

fn relocate_file(file: &Path, destination: &Path, mode: RelocateMode) -> Result<PathBuf> {
    let artist = tagger::read_artist(file)?;
    let folder = destination.join(artist_folder_name(&artist));

    if folder.is_dir() {
        debug!("Folder '{}' already exists.", folder.display());
    } else {
        fs::create_dir_all(&folder)
            .with_context(|| format!("Failed to create {}", folder.display()))?;
    }

    let basename = file.file_name().context("File has no name")?;
    let target = folder.join(basename);

    match mode {
        RelocateMode::Copy => copy_preserving_mtime(file, &target)?,
        RelocateMode::Move => move_file(file, &target)?,
    }

    Ok(target)
}

/// Overwrites `target`, so copying twice leaves a single file.
fn copy_preserving_mtime(from: &Path, to: &Path) -> Result<()> {
    if same_file(from, to) {
        return Ok(());
    }

    fs::copy(from, to)
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;

    let modified = fs::metadata(from)
        .and_then(|m| m.modified())
        .with_context(|| format!("Failed to read modification time of {}", from.display()))?;
    File::options()
        .write(true)
        .open(to)
        .and_then(|f| f.set_modified(modified))
        .with_context(|| format!("Failed to set modification time of {}", to.display()))?;

    Ok(())
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if same_file(from, to) {
        return Ok(());
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        // Rename cannot cross filesystems, fall back to copy and delete
        Err(rename_err) => {
            debug!("Rename of {} failed ({}), copying instead", from.display(), rename_err);
            copy_preserving_mtime(from, to)?;
            fs::remove_file(from).with_context(|| format!("Failed to remove {}", from.display()))
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Turn an artist tag into a single safe path component.
pub fn artist_folder_name(artist: &str) -> String {
    let cleaned: String = artist
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let cleaned = cleaned.trim().trim_end_matches('.').trim_end();

    if cleaned.is_empty() {
        UNKNOWN_ARTIST.to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_names_are_single_components() {
        assert_eq!(artist_folder_name("AC/DC"), "AC_DC");
        assert_eq!(artist_folder_name("  Sigur Rós "), "Sigur Rós");
        assert_eq!(artist_folder_name("Mr. T."), "Mr. T");
        assert_eq!(artist_folder_name(".."), UNKNOWN_ARTIST);
        assert_eq!(artist_folder_name(""), UNKNOWN_ARTIST);
    }
}
