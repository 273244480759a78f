//! Script package archive.
//!
//! Each week's package is written to `{json_output_dir}/{week_start}.json` so a
//! document can be rebuilt later with `--package` without generating again.

use chrono::NaiveDate;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, instrument};

use crate::models::ScriptPackage;

pub fn package_path(json_output_dir: &str, week_start: NaiveDate) -> PathBuf {
    PathBuf::from(json_output_dir).join(format!("{}.json", week_start.format("%Y-%m-%d")))
}

#[instrument(level = "info", skip(package))]
pub async fn write_package(
    package: &ScriptPackage,
    json_output_dir: &str,
    week_start: NaiveDate,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(package)?;
    fs::create_dir_all(json_output_dir).await?;

    let path = package_path(json_output_dir, week_start);
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote script package");
    Ok(path)
}

#[instrument(level = "info")]
pub async fn read_package(path: &str) -> Result<ScriptPackage, Box<dyn Error>> {
    let json = fs::read_to_string(path).await?;
    let package: ScriptPackage = serde_json::from_str(&json)?;
    info!(topic = %package.topic, images = package.image_urls.len(), "Loaded script package");
    Ok(package)
}
