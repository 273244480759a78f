//! Pipeline tunables, optionally loaded from a YAML file.
//!
//! Every field has a default, so a settings file only needs the keys it
//! changes:
//!
//! ```yaml
//! channel_name: Vlaamse Chroniqueur
//! style_batch_size: 50
//! image_width_pt: 430
//! image_height_pt: 260
//! ```

use serde::Deserialize;
use std::error::Error;
use std::time::Duration;
use tracing::{info, instrument};

use crate::docs::{BuildOptions, DEFAULT_BATCH_SIZE, DEFAULT_CHANNEL_NAME, ImageSize};

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub channel_name: String,
    /// Style requests per document update call.
    pub style_batch_size: usize,
    pub image_width_pt: f64,
    pub image_height_pt: f64,
    /// Days with more rain than this are filmed indoors.
    pub rain_threshold_mm: f64,
    /// Used when the topic location cannot be geocoded (Ghent).
    pub fallback_latitude: f64,
    pub fallback_longitude: f64,
    pub max_images: usize,
    pub wikimedia_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            style_batch_size: DEFAULT_BATCH_SIZE,
            image_width_pt: 430.0,
            image_height_pt: 260.0,
            rain_threshold_mm: 2.0,
            fallback_latitude: 51.0543,
            fallback_longitude: 3.7174,
            max_images: 5,
            wikimedia_delay_ms: 500,
            request_timeout_secs: 10,
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> Result<Self, Box<dyn Error>> {
        let settings: Settings = serde_yaml::from_str(yaml)?;
        if settings.style_batch_size == 0 {
            return Err("style_batch_size must be at least 1".into());
        }
        Ok(settings)
    }

    /// Read settings from `path`, or use the defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };
        let yaml = tokio::fs::read_to_string(path).await?;
        let settings = Settings::from_yaml(&yaml)?;
        info!(path, channel = %settings.channel_name, "Loaded settings");
        Ok(settings)
    }

    pub fn build_options(&self, folder_id: Option<String>) -> BuildOptions {
        BuildOptions {
            channel_name: self.channel_name.clone(),
            batch_size: self.style_batch_size,
            image_size: ImageSize {
                width_pt: self.image_width_pt,
                height_pt: self.image_height_pt,
            },
            folder_id,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn wikimedia_delay(&self) -> Duration {
        Duration::from_millis(self.wikimedia_delay_ms)
    }
}
