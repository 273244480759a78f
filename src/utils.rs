//! Helpers for dates, log-friendly strings and output directories.

use chrono::{Datelike, Duration, NaiveDate};
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Monday, Wednesday and Friday of the upcoming week.
///
/// Run on a Monday, this targets the following Monday rather than today.
pub fn upcoming_filming_dates(run_date: NaiveDate) -> [NaiveDate; 3] {
    let from_monday = i64::from(run_date.weekday().num_days_from_monday());
    let days_until_monday = match (7 - from_monday) % 7 {
        0 => 7,
        n => n,
    };
    filming_week(run_date + Duration::days(days_until_monday))
}

/// Monday, Wednesday and Friday of the week starting at `monday`.
pub fn filming_week(monday: NaiveDate) -> [NaiveDate; 3] {
    [monday, monday + Duration::days(2), monday + Duration::days(4)]
}

/// Human date label, e.g. `6 October 2025`.
pub fn week_label(date: NaiveDate) -> String {
    date.format("%-d %B %Y").to_string()
}

/// Truncate a string for logging, keeping it on a char boundary.
///
/// Longer strings get `"…(+N bytes)"` appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Detect if a serde_json error means the input stopped early.
///
/// A model response cut off at its token limit fails with an EOF error.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Ensure a directory exists and is writable by creating and removing a probe file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_filming_dates_from_sunday() {
        let dates = upcoming_filming_dates(date(2025, 10, 5));
        assert_eq!(dates, [date(2025, 10, 6), date(2025, 10, 8), date(2025, 10, 10)]);
    }

    #[test]
    fn test_filming_dates_from_monday_skip_a_week() {
        let dates = upcoming_filming_dates(date(2025, 10, 6));
        assert_eq!(dates[0], date(2025, 10, 13));
    }

    #[test]
    fn test_filming_dates_midweek() {
        let dates = upcoming_filming_dates(date(2025, 10, 9));
        assert_eq!(dates[0], date(2025, 10, 13));
        assert_eq!(dates[2], date(2025, 10, 17));
    }

    #[test]
    fn test_week_label_has_no_leading_zero() {
        assert_eq!(week_label(date(2025, 10, 6)), "6 October 2025");
        assert_eq!(week_label(date(2025, 11, 17)), "17 November 2025");
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("Gent", 100), "Gent");
        let long = "a".repeat(500);
        let result = truncate_for_log(&long, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.ends_with("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        let result = truncate_for_log("\u{00e9}\u{00e9}\u{00e9}", 3);
        assert_eq!(result, "\u{00e9}…(+4 bytes)");
    }

    #[test]
    fn test_looks_truncated() {
        let err = serde_json::from_str::<serde_json::Value>(r#"{"topic": "Gra"#).unwrap_err();
        assert!(looks_truncated(&err));
        let err = serde_json::from_str::<serde_json::Value>(r#"{"topic": }"#).unwrap_err();
        assert!(!looks_truncated(&err));
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_directory() {
        let dir = std::env::temp_dir().join(format!("vc_probe_{}", std::process::id()));
        let path = dir.to_str().unwrap().to_string();
        ensure_writable_dir(&path).await.unwrap();
        assert!(dir.is_dir());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
