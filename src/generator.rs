//! Topic selection and script generation.
//!
//! Both steps go through [`ask_with_backoff`] with their own chat template; the
//! templates carry the system prompts, this module only supplies the week's
//! data and the JSON shape to answer with.

use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::error::Error;
use tracing::{info, instrument, warn};

use crate::api::ask_with_backoff;
use crate::error::GenerateError;
use crate::models::{DayWeather, GeneratedScript, Topic};
use crate::utils::truncate_for_log;

pub const TOPIC_TEMPLATE: &str = "vlaamse_topic";
pub const SCRIPT_TEMPLATE: &str = "vlaamse_script";

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:json)?\s*([\s\S]*?)```").expect("code fence pattern is valid")
});

const TOPIC_SHAPE: &str = r#"{
  "topic": "Name of the topic",
  "location": "Specific filming location",
  "period": "Historical era and dates",
  "wikipedia_url": "https://en.wikipedia.org/wiki/EXACT_ARTICLE_TITLE",
  "wikimedia_search_query": "3-5 search keywords for Wikimedia Commons images",
  "rationale": "One sentence explaining why this topic suits this week"
}"#;

const SCRIPT_SHAPE: &str = r#"{
  "shooting_plan": [{
    "day": "Monday",
    "date": "YYYY-MM-DD",
    "weather": {"condition": "...", "temp_c": 0, "rain_mm": 0},
    "recommended": true,
    "venue": "outdoor",
    "shots": ["..."],
    "indoor_alternative": null
  }],
  "script_nl": {
    "intro": "...",
    "sections": [{"title": "...", "commentary": "...", "location_notes": "..."}],
    "outro": "..."
  },
  "script_en": {"intro": "...", "sections": [], "outro": "..."},
  "editing_guide": {
    "structure": "...",
    "transitions": "...",
    "b_roll_suggestions": ["..."],
    "music_timing": "..."
  },
  "resources": {
    "footage_tips": ["..."],
    "music_suggestions": ["..."],
    "quote_sources": ["..."],
    "archives": ["..."]
  }
}"#;

pub fn topic_prompt(week_start: NaiveDate, past_topics: &[String]) -> String {
    let history = if past_topics.is_empty() {
        "No topics have been covered yet.".to_string()
    } else {
        format!(
            "Topics already covered, oldest first (do not repeat them):\n- {}",
            past_topics.join("\n- ")
        )
    };
    format!(
        "Week starting: {}\n\n{history}\n\nReturn JSON only:\n{TOPIC_SHAPE}",
        week_start.format("%A %-d %B %Y")
    )
}

pub fn script_prompt(topic: &Topic, day: &DayWeather) -> Result<String, serde_json::Error> {
    Ok(format!(
        "Topic:\n{}\n\nFilming day and weather forecast:\n{}\n\n\
         Return the complete production package as a single JSON object, with the script \
         in Flemish Dutch under script_nl and in English under script_en:\n{SCRIPT_SHAPE}",
        serde_json::to_string_pretty(topic)?,
        serde_json::to_string_pretty(day)?,
    ))
}

/// Pull a JSON value out of a model response.
///
/// Markdown code fences are stripped, and leading prose is skipped up to the
/// first `{` or `[`.
pub fn parse_json_response<T: DeserializeOwned>(
    raw: &str,
    context: &'static str,
) -> Result<T, GenerateError> {
    if raw.trim().is_empty() {
        return Err(GenerateError::EmptyResponse { context });
    }

    let mut candidate = CODE_FENCE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| raw.trim());

    if !candidate.starts_with(['{', '[']) {
        if let Some(start) = candidate.find(['{', '[']) {
            candidate = &candidate[start..];
        }
    }

    serde_json::from_str(candidate).map_err(|source| GenerateError::Parse {
        context,
        source,
        preview: truncate_for_log(raw, 300),
    })
}

#[instrument(level = "info", skip(config, template, past_topics), fields(past = past_topics.len()))]
pub async fn select_topic(
    config: &AwfulJadeConfig,
    template: &ChatTemplate,
    week_start: NaiveDate,
    past_topics: &[String],
) -> Result<Topic, Box<dyn Error>> {
    let prompt = topic_prompt(week_start, past_topics);
    let raw = ask_with_backoff("select_topic", config, &prompt, template).await?;
    let topic: Topic = parse_json_response(&raw, "select_topic")?;
    info!(
        topic = %topic.topic,
        location = %topic.location,
        rationale = topic.rationale.as_deref().unwrap_or(""),
        "Topic selected"
    );
    Ok(topic)
}

/// Ask for the full package; a response cut off mid-JSON is re-asked once.
#[instrument(level = "info", skip_all, fields(topic = %topic.topic, date = %day.date))]
pub async fn generate_script(
    config: &AwfulJadeConfig,
    template: &ChatTemplate,
    topic: &Topic,
    day: &DayWeather,
) -> Result<GeneratedScript, Box<dyn Error>> {
    let prompt = script_prompt(topic, day)?;
    let raw = ask_with_backoff("generate_script", config, &prompt, template).await?;

    match parse_json_response::<GeneratedScript>(&raw, "generate_script") {
        Ok(script) => Ok(script),
        Err(e) if e.is_truncated() => {
            warn!(error = %e, "Script response was cut off; asking once more");
            let raw = ask_with_backoff("generate_script", config, &prompt, template).await?;
            Ok(parse_json_response(&raw, "generate_script")?)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::sample_topic;

    #[test]
    fn test_parse_plain_json() {
        let raw = r#"{"topic": "Gravensteen", "location": "Ghent", "period": "Medieval",
            "wikipedia_url": "https://en.wikipedia.org/wiki/Gravensteen",
            "wikimedia_search_query": "Gravensteen castle"}"#;
        let topic: Topic = parse_json_response(raw, "select_topic").unwrap();
        assert_eq!(topic.topic, "Gravensteen");
        assert_eq!(topic.rationale, None);
    }

    #[test]
    fn test_parse_fenced_json_with_prose() {
        let raw = "Here is the topic you asked for:\n```json\n{\"a\": 1}\n```\nEnjoy!";
        let value: serde_json::Value = parse_json_response(raw, "select_topic").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_parse_leading_prose_without_fence() {
        let raw = "Sure. [1, 2, 3]";
        let value: Vec<u8> = parse_json_response(raw, "select_topic").unwrap();
        assert_eq!(value, vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_empty_fence_falls_back_to_raw() {
        let raw = "``` ``` {\"b\": true}";
        let value: serde_json::Value = parse_json_response(raw, "select_topic").unwrap();
        assert_eq!(value["b"], true);
    }

    #[test]
    fn test_parse_empty_response() {
        let err = parse_json_response::<serde_json::Value>("  \n", "select_topic").unwrap_err();
        assert!(matches!(err, GenerateError::EmptyResponse { context: "select_topic" }));
    }

    #[test]
    fn test_parse_missing_field_is_not_truncation() {
        let err = parse_json_response::<Topic>(r#"{"topic": "Gravensteen"}"#, "select_topic").unwrap_err();
        assert!(!err.is_truncated());
        assert!(err.to_string().contains("select_topic"));
    }

    #[test]
    fn test_parse_cut_off_response_is_truncation() {
        let err = parse_json_response::<GeneratedScript>(r#"{"shooting_plan": [{"day": "Mon"#, "generate_script")
            .unwrap_err();
        assert!(err.is_truncated());
    }

    #[test]
    fn test_topic_prompt_lists_past_topics() {
        let week = NaiveDate::from_ymd_opt(2025, 10, 6).unwrap();
        let prompt = topic_prompt(week, &["Belfry of Bruges".to_string(), "Cloth Hall".to_string()]);
        assert!(prompt.starts_with("Week starting: Monday 6 October 2025"));
        assert!(prompt.contains("- Belfry of Bruges\n- Cloth Hall"));
        assert!(prompt.contains("wikimedia_search_query"));

        let prompt = topic_prompt(week, &[]);
        assert!(prompt.contains("No topics have been covered yet."));
    }

    #[test]
    fn test_script_prompt_embeds_topic_and_weather() {
        let day = DayWeather {
            date: "2025-10-08".to_string(),
            condition: "overcast".to_string(),
            temp_c: Some(14.2),
            rain_mm: Some(0.3),
            outdoor_ok: true,
        };
        let prompt = script_prompt(&sample_topic(), &day).unwrap();
        assert!(prompt.contains("\"topic\": \"Gravensteen\""));
        assert!(prompt.contains("\"date\": \"2025-10-08\""));
        assert!(prompt.contains("script_nl"));
    }
}
