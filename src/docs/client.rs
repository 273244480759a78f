//! Document and storage service access.
//!
//! [`DocumentService`] is the seam the builder talks to. [`GoogleDocsClient`]
//! implements it over the Docs v1 and Drive v3 REST APIs with a caller
//! supplied OAuth access token.

use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::requests::Request;
use crate::error::DocsError;
use crate::utils::truncate_for_log;

pub const DOCS_API: &str = "https://docs.googleapis.com";
pub const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";

const DOCUMENT_MIME: &str = "application/vnd.google-apps.document";

/// Remote operations needed to build and publish a document.
pub trait DocumentService {
    /// Create an empty document and return its id.
    async fn create_document(&self, title: &str) -> Result<String, DocsError>;

    /// Apply requests atomically in one call.
    async fn batch_update(&self, document_id: &str, requests: &[Request]) -> Result<(), DocsError>;

    /// Replace the document's parents with `folder_id`.
    async fn move_to_folder(&self, document_id: &str, folder_id: &str) -> Result<(), DocsError>;

    /// Allow anyone with the link to read.
    async fn share_publicly(&self, document_id: &str) -> Result<(), DocsError>;

    async fn web_view_link(&self, document_id: &str) -> Result<String, DocsError>;

    /// Titles of the documents in a folder, oldest first.
    async fn list_document_titles(&self, folder_id: &str) -> Result<Vec<String>, DocsError>;
}

#[derive(Debug, Clone)]
pub struct GoogleDocsClient {
    http: Client,
    access_token: String,
    docs_base: String,
    drive_base: String,
}

impl GoogleDocsClient {
    pub fn new(http: Client, access_token: impl Into<String>) -> Self {
        Self {
            http,
            access_token: access_token.into(),
            docs_base: DOCS_API.to_string(),
            drive_base: DRIVE_API.to_string(),
        }
    }

    /// Point the client at other endpoints (used by tests).
    #[cfg(test)]
    pub fn with_base_urls(mut self, docs_base: &str, drive_base: &str) -> Self {
        self.docs_base = docs_base.trim_end_matches('/').to_string();
        self.drive_base = drive_base.trim_end_matches('/').to_string();
        self
    }

    async fn send(&self, operation: &'static str, builder: RequestBuilder) -> Result<Value, DocsError> {
        let resp = builder
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|source| DocsError::Http { operation, source })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DocsError::Status {
                operation,
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }

        let value = resp
            .json::<Value>()
            .await
            .map_err(|source| DocsError::Http { operation, source })?;
        debug!(operation, "Document service call succeeded");
        Ok(value)
    }

    fn file_url(&self, document_id: &str) -> String {
        format!("{}/files/{}", self.drive_base, document_id)
    }
}

fn string_field(value: &Value, operation: &'static str, field: &'static str) -> Result<String, DocsError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(DocsError::MissingField { operation, field })
}

impl DocumentService for GoogleDocsClient {
    #[instrument(level = "info", skip(self))]
    async fn create_document(&self, title: &str) -> Result<String, DocsError> {
        let url = format!("{}/v1/documents", self.docs_base);
        let created = self
            .send("create_document", self.http.post(url).json(&json!({ "title": title })))
            .await?;
        string_field(&created, "create_document", "documentId")
    }

    #[instrument(level = "debug", skip(self, requests), fields(count = requests.len()))]
    async fn batch_update(&self, document_id: &str, requests: &[Request]) -> Result<(), DocsError> {
        let url = format!("{}/v1/documents/{}:batchUpdate", self.docs_base, document_id);
        self.send("batch_update", self.http.post(url).json(&json!({ "requests": requests })))
            .await?;
        Ok(())
    }

    #[instrument(level = "info", skip(self))]
    async fn move_to_folder(&self, document_id: &str, folder_id: &str) -> Result<(), DocsError> {
        let meta = self
            .send(
                "get_parents",
                self.http.get(self.file_url(document_id)).query(&[("fields", "parents")]),
            )
            .await?;
        let current_parents = meta
            .get("parents")
            .and_then(Value::as_array)
            .map(|parents| {
                parents
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_default();

        self.send(
            "move_to_folder",
            self.http.patch(self.file_url(document_id)).json(&json!({})).query(&[
                ("addParents", folder_id),
                ("removeParents", current_parents.as_str()),
                ("fields", "id,parents"),
            ]),
        )
        .await?;
        Ok(())
    }

    #[instrument(level = "info", skip(self))]
    async fn share_publicly(&self, document_id: &str) -> Result<(), DocsError> {
        let url = format!("{}/permissions", self.file_url(document_id));
        self.send(
            "share_publicly",
            self.http.post(url).json(&json!({ "type": "anyone", "role": "reader" })),
        )
        .await?;
        Ok(())
    }

    #[instrument(level = "info", skip(self))]
    async fn web_view_link(&self, document_id: &str) -> Result<String, DocsError> {
        let meta = self
            .send(
                "web_view_link",
                self.http.get(self.file_url(document_id)).query(&[("fields", "webViewLink")]),
            )
            .await?;
        string_field(&meta, "web_view_link", "webViewLink")
    }

    #[instrument(level = "info", skip(self))]
    async fn list_document_titles(&self, folder_id: &str) -> Result<Vec<String>, DocsError> {
        let q = format!("'{folder_id}' in parents and mimeType='{DOCUMENT_MIME}' and trashed=false");
        let url = format!(
            "{}/files?q={}&fields={}&orderBy={}&pageSize=100",
            self.drive_base,
            urlencoding::encode(&q),
            urlencoding::encode("files(name,createdTime)"),
            urlencoding::encode("createdTime asc"),
        );
        let listing = self.send("list_document_titles", self.http.get(url)).await?;

        let titles = listing
            .get("files")
            .and_then(Value::as_array)
            .map(|files| {
                files
                    .iter()
                    .filter_map(|f| f.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(titles)
    }
}
