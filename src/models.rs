//! Data models for the weekly production package.
//!
//! This module defines the structures exchanged between pipeline stages:
//! - [`Topic`]: the language model's pick for the week
//! - [`DayWeather`]: forecast for one candidate filming day
//! - [`GeneratedScript`]: the language model's production package
//! - [`ScriptPackage`]: the generated script merged with topic fields and image URLs,
//!   which is what the document builder consumes
//!
//! Field names are snake_case on the wire because that is the JSON shape
//! requested from the model.

use serde::{Deserialize, Serialize};

use crate::error::DocsError;

/// The historical topic selected for a week.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Topic {
    /// Name of the topic, e.g. "Gravensteen Castle".
    pub topic: String,
    /// Filming location, as specific as the model could make it.
    pub location: String,
    /// Historical era and dates.
    pub period: String,
    /// Reference article for the topic.
    pub wikipedia_url: String,
    /// Short keyword phrase used as the first image search.
    pub wikimedia_search_query: String,
    /// One sentence on why the topic suits the week.
    #[serde(default)]
    pub rationale: Option<String>,
}

/// Forecast for a single filming date.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DayWeather {
    /// Date in `YYYY-MM-DD` format.
    pub date: String,
    /// Human readable WMO description.
    pub condition: String,
    /// Maximum temperature in Celsius.
    pub temp_c: Option<f64>,
    /// Total daily precipitation in millimetres.
    pub rain_mm: Option<f64>,
    /// Whether the rain stays under the outdoor threshold.
    pub outdoor_ok: bool,
}

/// Weather summary as echoed back inside a shooting plan entry.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct PlanWeather {
    #[serde(default = "unknown_condition")]
    pub condition: String,
    #[serde(default)]
    pub temp_c: Option<f64>,
    #[serde(default)]
    pub rain_mm: Option<f64>,
}

fn unknown_condition() -> String {
    "unknown".to_string()
}

fn outdoor_venue() -> String {
    "outdoor".to_string()
}

/// One filming day in the shooting plan.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DayPlan {
    /// Day name, e.g. "Monday".
    pub day: String,
    /// Date in `YYYY-MM-DD` format.
    pub date: String,
    #[serde(default)]
    pub weather: PlanWeather,
    #[serde(default)]
    pub recommended: bool,
    #[serde(default = "outdoor_venue")]
    pub venue: String,
    #[serde(default)]
    pub shots: Vec<String>,
    #[serde(default)]
    pub indoor_alternative: Option<String>,
}

/// One section of spoken commentary.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Section {
    pub title: String,
    pub commentary: String,
    #[serde(default)]
    pub location_notes: String,
}

/// The spoken script in one language.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ScriptBody {
    pub intro: String,
    #[serde(default)]
    pub sections: Vec<Section>,
    pub outro: String,
}

/// Post-production notes.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct EditingGuide {
    #[serde(default)]
    pub structure: String,
    #[serde(default)]
    pub transitions: String,
    #[serde(default)]
    pub b_roll_suggestions: Vec<String>,
    #[serde(default)]
    pub music_timing: String,
}

/// Research pointers, each list rendered only when non-empty.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Resources {
    #[serde(default)]
    pub footage_tips: Vec<String>,
    #[serde(default)]
    pub music_suggestions: Vec<String>,
    #[serde(default)]
    pub quote_sources: Vec<String>,
    #[serde(default)]
    pub archives: Vec<String>,
}

/// The production package as returned by the script generation call.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GeneratedScript {
    pub shooting_plan: Vec<DayPlan>,
    pub script_nl: ScriptBody,
    pub script_en: ScriptBody,
    #[serde(default)]
    pub editing_guide: EditingGuide,
    #[serde(default)]
    pub resources: Resources,
}

/// Everything the document builder needs for one week.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ScriptPackage {
    pub topic: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub wikipedia_url: Option<String>,
    #[serde(default)]
    pub shooting_plan: Vec<DayPlan>,
    pub script_nl: ScriptBody,
    pub script_en: ScriptBody,
    #[serde(default)]
    pub editing_guide: EditingGuide,
    #[serde(default)]
    pub resources: Resources,
    /// Positionally consumed; `None` means the search found nothing for that slot.
    #[serde(default)]
    pub image_urls: Vec<Option<String>>,
}

impl ScriptPackage {
    /// Merge the generated script with the topic it was written for.
    pub fn from_parts(
        topic: &Topic,
        script: GeneratedScript,
        image_urls: Vec<Option<String>>,
    ) -> Self {
        let wikipedia_url = Some(topic.wikipedia_url.trim().to_string()).filter(|u| !u.is_empty());
        Self {
            topic: topic.topic.clone(),
            location: topic.location.clone(),
            period: topic.period.clone(),
            wikipedia_url,
            shooting_plan: script.shooting_plan,
            script_nl: script.script_nl,
            script_en: script.script_en,
            editing_guide: script.editing_guide,
            resources: script.resources,
            image_urls,
        }
    }

    /// Reject packages that cannot even produce a document title.
    pub fn validate(&self) -> Result<(), DocsError> {
        if self.topic.trim().is_empty() {
            return Err(DocsError::InvalidPackage {
                field: "topic",
                reason: "topic name is empty".to_string(),
            });
        }
        Ok(())
    }
}
