// src/uploads.rs
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::debug;

pub const DATE_FORMAT: &str = "%d/%m/%y";

/// Parse a `dd/mm/yy` date as typed by the user.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, DATE_FORMAT)
        .with_context(|| format!("Invalid date {:?}, expected dd/mm/yy", input))
}

/// Files last modified strictly after midnight UTC of `date`.
pub fn modified_after(files: &[PathBuf], date: NaiveDate) -> Vec<PathBuf> {
    let threshold: SystemTime = Utc
        .from_utc_datetime(&date.and_time(NaiveTime::default()))
        .into();

    files
        .iter()
        .filter(|file| match fs::metadata(file).and_then(|m| m.modified()) {
            Ok(modified) => modified > threshold,
            Err(e) => {
                debug!("Skipping {}: {}", file.display(), e);
                false
            }
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn parses_short_dates() {
        let date = parse_date(" 05/03/21 ").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2021, 3, 5).unwrap());
    }

    #[test]
    fn rejects_other_formats() {
        assert!(parse_date("2021-03-05").is_err());
        assert!(parse_date("31/02/21").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn filters_by_modification_time() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("old.mp3");
        let new = dir.path().join("new.mp3");
        fs::write(&old, b"").unwrap();
        fs::write(&new, b"").unwrap();

        // 2020-01-01T00:00:00Z and 2022-01-01T00:00:00Z
        let set = |path: &PathBuf, secs: u64| {
            File::options()
                .write(true)
                .open(path)
                .unwrap()
                .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
                .unwrap();
        };
        set(&old, 1_577_836_800);
        set(&new, 1_640_995_200);

        let files = vec![old.clone(), new.clone(), dir.path().join("gone.mp3")];
        let date = parse_date("01/06/21").unwrap();
        assert_eq!(modified_after(&files, date), vec![new]);
    }

    #[test]
    fn midnight_itself_is_not_after() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("edge.mp3");
        fs::write(&file, b"").unwrap();
        File::options()
            .write(true)
            .open(&file)
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_640_995_200))
            .unwrap();

        let files = vec![file];
        assert!(modified_after(&files, parse_date("01/01/22").unwrap()).is_empty());
        assert_eq!(modified_after(&files, parse_date("31/12/21").unwrap()).len(), 1);
    }
}
