// src/finder.rs
use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const MP3_PATTERN: &str = "*.mp3";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Find files whose name matches `pattern` below `source`.
///
/// `depth` counts directory levels: `Some(1)` only looks at files directly
/// inside `source`, `None` recurses without limit. The result is sorted.
pub fn find_files(source: &Path, pattern: &str, depth: Option<usize>) -> Result<Vec<PathBuf>> {
    if depth == Some(0) {
        anyhow::bail!("Recursion depth must be at least 1");
    }

    let pattern =
        Pattern::new(pattern).with_context(|| format!("Invalid file pattern: {}", pattern))?;

    // `dir`, `dir/` and `dir//` all collapse to the same root
    let root: PathBuf = source.components().collect();

    if !root.is_dir() {
        anyhow::bail!("Directory does not exist: {}", source.display());
    }

    let mut walker = WalkDir::new(&root).min_depth(1).follow_links(false);
    if let Some(depth) = depth {
        walker = walker.max_depth(depth);
    }

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|name| pattern.matches_with(name, MATCH_OPTIONS))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect();

    files.sort();
    files.dedup();

    Ok(files)
}

/// Shorthand for the MP3 search every command starts with.
pub fn find_mp3_files(source: &Path, depth: Option<usize>) -> Result<Vec<PathBuf>> {
    find_files(source, MP3_PATTERN, depth)
}
