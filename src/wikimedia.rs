//! Wikimedia Commons image search.
//!
//! A usable image is a JPEG or PNG under 25 MB served over https.

use futures::stream::{self, StreamExt};
use itertools::Itertools;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::models::Topic;

pub const COMMONS_API: &str = "https://commons.wikimedia.org/w/api.php";
pub const MAX_FILE_SIZE_BYTES: u64 = 25 * 1024 * 1024;
const ALLOWED_MIME: [&str; 2] = ["image/jpeg", "image/png"];
const SEARCH_LIMIT: &str = "10";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<QueryPages>,
}

#[derive(Debug, Deserialize)]
struct QueryPages {
    #[serde(default)]
    pages: HashMap<String, Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    imageinfo: Vec<ImageInfo>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ImageInfo {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub mime: String,
}

pub fn is_usable(info: &ImageInfo) -> bool {
    ALLOWED_MIME.contains(&info.mime.as_str())
        && info.size <= MAX_FILE_SIZE_BYTES
        && Url::parse(&info.url).is_ok_and(|u| u.scheme() == "https")
}

/// Short search queries for the topic, de-duplicated, at most `max`.
///
/// Commons matches against file names and descriptions, so fewer keywords
/// find more.
pub fn build_image_queries(topic: &Topic, max: usize) -> Vec<String> {
    let name = topic.topic.trim();
    let location_short = topic
        .location
        .split(',')
        .next()
        .unwrap_or_default()
        .split_whitespace()
        .take(3)
        .join(" ");
    let period_keyword = topic
        .period
        .split(',')
        .next()
        .and_then(|p| p.split_whitespace().next())
        .unwrap_or_default();
    let with_period = if name.is_empty() || period_keyword.is_empty() {
        String::new()
    } else {
        format!("{name} {period_keyword}")
    };

    [
        topic.wikimedia_search_query.trim().to_string(),
        name.to_string(),
        location_short,
        with_period,
    ]
    .into_iter()
    .filter(|q| !q.is_empty())
    .unique()
    .take(max)
    .collect()
}

#[derive(Debug, Clone)]
pub struct CommonsClient {
    http: Client,
    api_url: String,
}

impl CommonsClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            api_url: COMMONS_API.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self
    }

    async fn search(&self, query: &str) -> Result<Vec<ImageInfo>, Box<dyn Error>> {
        let resp: SearchResponse = self
            .http
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("generator", "search"),
                ("gsrnamespace", "6"),
                ("gsrsearch", query),
                ("gsrlimit", SEARCH_LIMIT),
                ("prop", "imageinfo"),
                ("iiprop", "url|size|mime"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // pages come back keyed by page id; `index` is the search rank
        let mut pages: Vec<Page> = resp.query.map(|q| q.pages.into_values().collect()).unwrap_or_default();
        pages.sort_by_key(|p| p.index.unwrap_or(u32::MAX));
        Ok(pages
            .into_iter()
            .filter_map(|p| p.imageinfo.into_iter().next())
            .collect())
    }

    /// URL of the first usable image for `query`. Search failures yield `None`.
    #[instrument(level = "info", skip(self))]
    pub async fn find_image_url(&self, query: &str) -> Option<String> {
        match self.search(query).await {
            Ok(candidates) => candidates.into_iter().find(is_usable).map(|info| info.url),
            Err(e) => {
                warn!(%query, error = %e, "Wikimedia search failed");
                None
            }
        }
    }

    /// One lookup per query, sequentially with a courtesy delay, preserving order.
    #[instrument(level = "info", skip_all, fields(queries = queries.len()))]
    pub async fn find_image_urls(&self, queries: &[String], delay: Duration) -> Vec<Option<String>> {
        let urls: Vec<Option<String>> = stream::iter(queries)
            .then(|query| async move {
                let url = self.find_image_url(query).await;
                debug!(%query, found = url.is_some(), "Image lookup");
                tokio::time::sleep(delay).await;
                url
            })
            .collect()
            .await;

        info!(
            found = urls.iter().filter(|u| u.is_some()).count(),
            total = urls.len(),
            "Image search finished"
        );
        urls
    }
}
