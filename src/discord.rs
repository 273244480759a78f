//! Discord webhook summary of the week's package.

use chrono::NaiveDate;
use reqwest::Client;
use serde_json::json;
use std::error::Error;
use tracing::{info, instrument, warn};

use crate::models::ScriptPackage;
use crate::utils::week_label;

/// Plain-text summary: topic, filming days and the document link.
pub fn build_message(
    channel_name: &str,
    week_start: NaiveDate,
    package: &ScriptPackage,
    doc_url: &str,
) -> String {
    let mut lines = vec![
        format!("**{channel_name} \u{2014} Week of {}**", week_label(week_start)),
        String::new(),
    ];

    if package.period.is_empty() {
        lines.push(format!("Topic: {}", package.topic));
    } else {
        lines.push(format!("Topic: {} ({})", package.topic, package.period));
    }
    if !package.location.is_empty() {
        lines.push(format!("Location: {}", package.location));
    }

    if !package.shooting_plan.is_empty() {
        lines.push(String::new());
        lines.push("Filming days:".to_string());
        for day in &package.shooting_plan {
            let temp = day
                .weather
                .temp_c
                .map_or_else(|| "?".to_string(), |t| format!("{t:.1}\u{00b0}C"));
            lines.push(format!(
                "  {} {}: {} {temp} \u{2014} {}",
                day.day, day.date, day.weather.condition, day.venue
            ));
        }
    }

    lines.push(String::new());
    lines.push("Full script + editing guide:".to_string());
    lines.push(doc_url.to_string());
    lines.join("\n")
}

/// Post the summary. Without a webhook this only logs a warning.
#[instrument(level = "info", skip_all)]
pub async fn post_to_discord(
    http: &Client,
    webhook_url: Option<&str>,
    message: &str,
) -> Result<(), Box<dyn Error>> {
    let Some(webhook_url) = webhook_url.map(str::trim).filter(|u| !u.is_empty()) else {
        warn!("No Discord webhook configured; skipping notification");
        return Ok(());
    };

    http.post(webhook_url)
        .json(&json!({ "content": message }))
        .send()
        .await?
        .error_for_status()?;
    info!("Discord notification sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docs::layout::tests::{full_package, week};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_build_message() {
        let package = full_package(vec![]);
        let message = build_message("Vlaamse Chroniqueur", week(), &package, "https://docs.google.com/d/1");
        let lines: Vec<&str> = message.lines().collect();

        assert_eq!(lines[0], "**Vlaamse Chroniqueur \u{2014} Week of 6 October 2025**");
        assert_eq!(lines[2], "Topic: Gravensteen (Medieval, c. 1180-1350)");
        assert_eq!(lines[3], "Location: Sint-Veerleplein 11, Ghent");
        assert!(lines.contains(&"  Wednesday 2025-10-08: overcast 14.0\u{00b0}C \u{2014} indoor"));
        assert_eq!(lines.last(), Some(&"https://docs.google.com/d/1"));
    }

    #[test]
    fn test_build_message_without_period_or_plan() {
        let mut package = full_package(vec![]);
        package.period.clear();
        package.shooting_plan.clear();
        let message = build_message("Vlaamse Chroniqueur", week(), &package, "https://x");
        assert!(message.contains("Topic: Gravensteen\n"));
        assert!(!message.contains("Filming days:"));
    }

    #[tokio::test]
    async fn test_post_sends_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook"))
            .and(body_json(json!({"content": "hallo"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/webhook", server.uri());
        post_to_discord(&Client::new(), Some(&url), "hallo").await.unwrap();
    }

    #[tokio::test]
    async fn test_post_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let url = format!("{}/webhook", server.uri());
        assert!(post_to_discord(&Client::new(), Some(&url), "hallo").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_webhook_is_skipped() {
        assert!(post_to_discord(&Client::new(), None, "hallo").await.is_ok());
        assert!(post_to_discord(&Client::new(), Some("  "), "hallo").await.is_ok());
    }
}
