//! Weekly document builder.
//!
//! Builds the production document in four phases:
//!
//! 1. [`layout::assemble`] linearizes the package into one text buffer, recording
//!    style events and image slots against buffer offsets
//! 2. [`insert_text`] inserts the whole buffer in one call at index 1
//! 3. [`apply_formatting`] sends the style requests in fixed-size batches
//! 4. [`insert_images`] inserts images one call at a time, highest offset first
//!
//! Document creation and text insertion failures abort the build. Failed
//! style batches and images are logged and skipped; earlier batches stay
//! applied.

pub mod client;
pub mod layout;
pub mod requests;

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

pub use client::{DocumentService, GoogleDocsClient};
pub use layout::{ImageSlot, StyleEvent, assemble, document_title};
pub use requests::ImageSize;

use crate::error::DocsError;
use crate::models::ScriptPackage;
use requests::{batches, build_style_requests, image_insertion_order, insert_image_request, insert_text_request};

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_CHANNEL_NAME: &str = "Vlaamse Chroniqueur";

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub channel_name: String,
    /// Maximum style requests per `batchUpdate` call.
    pub batch_size: usize,
    pub image_size: ImageSize,
    /// Storage folder to move the finished document into.
    pub folder_id: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            image_size: ImageSize::default(),
            folder_id: None,
        }
    }
}

/// Outcome of the formatting phase.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FormattingReport {
    pub requests: usize,
    pub batches_sent: usize,
    pub batches_failed: usize,
}

#[instrument(level = "info", skip_all, fields(%document_id, units = text.encode_utf16().count()))]
pub async fn insert_text<D: DocumentService>(
    service: &D,
    document_id: &str,
    text: &str,
) -> Result<(), DocsError> {
    service
        .batch_update(document_id, &[insert_text_request(text)])
        .await
        .map_err(|e| e.during("insert_text", document_id))
}

/// Send every style request, in offset order, `batch_size` at a time.
#[instrument(level = "info", skip_all, fields(%document_id, events = events.len(), batch_size = batch_size))]
pub async fn apply_formatting<D: DocumentService>(
    service: &D,
    document_id: &str,
    events: &[StyleEvent],
    batch_size: usize,
) -> FormattingReport {
    let requests = build_style_requests(events);
    let mut report = FormattingReport {
        requests: requests.len(),
        ..FormattingReport::default()
    };

    for (index, batch) in batches(&requests, batch_size).enumerate() {
        match service.batch_update(document_id, batch).await {
            Ok(()) => report.batches_sent += 1,
            Err(e) => {
                report.batches_failed += 1;
                warn!(
                    batch = index,
                    size = batch.len(),
                    error = %e,
                    "Style batch failed; earlier batches remain applied"
                );
            }
        }
    }

    info!(
        requests = report.requests,
        sent = report.batches_sent,
        failed = report.batches_failed,
        "Formatting applied"
    );
    report
}

/// Insert images highest offset first. Returns how many went in.
#[instrument(level = "info", skip_all, fields(%document_id, slots = slots.len()))]
pub async fn insert_images<D: DocumentService>(
    service: &D,
    document_id: &str,
    slots: &[ImageSlot],
    size: ImageSize,
) -> usize {
    let mut inserted = 0;
    for slot in image_insertion_order(slots) {
        match service
            .batch_update(document_id, &[insert_image_request(slot, size)])
            .await
        {
            Ok(()) => inserted += 1,
            Err(e) => warn!(url = %slot.url, offset = slot.offset, error = %e, "Could not insert image"),
        }
    }
    inserted
}

/// Build the weekly document and return its shareable link.
#[instrument(level = "info", skip_all, fields(%week_start, topic = %package.topic))]
pub async fn create_weekly_doc<D: DocumentService>(
    service: &D,
    options: &BuildOptions,
    week_start: NaiveDate,
    package: &ScriptPackage,
) -> Result<String, DocsError> {
    package.validate()?;

    let title = document_title(&options.channel_name, week_start, &package.topic);
    let document_id = service
        .create_document(&title)
        .await
        .map_err(|e| e.during("create_document", &title))?;
    info!(%document_id, %title, "Created document");

    let layout = assemble(week_start, package, &options.channel_name);
    info!(
        units = layout.len,
        events = layout.events.len(),
        images = layout.slots.len(),
        "Assembled document layout"
    );

    insert_text(service, &document_id, &layout.text).await?;
    apply_formatting(service, &document_id, &layout.events, options.batch_size).await;
    let inserted = insert_images(service, &document_id, &layout.slots, options.image_size).await;
    info!(inserted, total = layout.slots.len(), "Images inserted");

    if let Some(folder_id) = options.folder_id.as_deref().filter(|f| !f.trim().is_empty()) {
        if let Err(e) = service.move_to_folder(&document_id, folder_id).await {
            warn!(%document_id, %folder_id, error = %e, "Could not move document into folder");
        }
    }

    service
        .share_publicly(&document_id)
        .await
        .map_err(|e| e.during("share_publicly", &document_id))?;
    service
        .web_view_link(&document_id)
        .await
        .map_err(|e| e.during("web_view_link", &document_id))
}

/// Topic part of a weekly document title, i.e. everything after the first `:`.
pub fn topic_from_title(title: &str) -> Option<String> {
    let (_, topic) = title.split_once(':')?;
    let topic = topic.trim();
    (!topic.is_empty()).then(|| topic.to_string())
}

/// Past topics in creation order. Any failure yields an empty list.
#[instrument(level = "info", skip(service))]
pub async fn get_past_topics<D: DocumentService>(service: &D, folder_id: &str) -> Vec<String> {
    match service.list_document_titles(folder_id).await {
        Ok(titles) => titles.iter().filter_map(|t| topic_from_title(t)).collect(),
        Err(e) => {
            warn!(error = %e, "Could not fetch past topics");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docs::layout::tests::{full_package, minimal_package, week};
    use crate::docs::requests::Request;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Create(String),
        Batch(Vec<Request>),
        Move(String),
        Share,
        Link,
        List,
    }

    #[derive(Debug, Default)]
    struct RecordingService {
        calls: Mutex<Vec<Call>>,
        fail_create: bool,
        fail_insert_text: bool,
        fail_move: bool,
        failing_style_batch: Option<usize>,
        failing_image_urls: Vec<String>,
        style_batches_seen: Mutex<usize>,
    }

    impl RecordingService {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn unavailable(operation: &'static str) -> DocsError {
            DocsError::Status {
                operation,
                status: 503,
                body: "backend unavailable".to_string(),
            }
        }
    }

    impl DocumentService for RecordingService {
        async fn create_document(&self, title: &str) -> Result<String, DocsError> {
            self.record(Call::Create(title.to_string()));
            if self.fail_create {
                return Err(Self::unavailable("create_document"));
            }
            Ok("doc-1".to_string())
        }

        async fn batch_update(&self, _document_id: &str, requests: &[Request]) -> Result<(), DocsError> {
            self.record(Call::Batch(requests.to_vec()));
            match requests.first() {
                Some(Request::InsertText { .. }) if self.fail_insert_text => {
                    Err(Self::unavailable("batch_update"))
                }
                Some(Request::InsertInlineImage { uri, .. }) if self.failing_image_urls.contains(uri) => {
                    Err(Self::unavailable("batch_update"))
                }
                Some(Request::UpdateParagraphStyle { .. } | Request::UpdateTextStyle { .. }) => {
                    let mut seen = self.style_batches_seen.lock().unwrap();
                    let index = *seen;
                    *seen += 1;
                    if self.failing_style_batch == Some(index) {
                        Err(Self::unavailable("batch_update"))
                    } else {
                        Ok(())
                    }
                }
                _ => Ok(()),
            }
        }

        async fn move_to_folder(&self, _document_id: &str, folder_id: &str) -> Result<(), DocsError> {
            self.record(Call::Move(folder_id.to_string()));
            if self.fail_move {
                return Err(Self::unavailable("move_to_folder"));
            }
            Ok(())
        }

        async fn share_publicly(&self, _document_id: &str) -> Result<(), DocsError> {
            self.record(Call::Share);
            Ok(())
        }

        async fn web_view_link(&self, document_id: &str) -> Result<String, DocsError> {
            self.record(Call::Link);
            Ok(format!("https://docs.google.com/document/d/{document_id}/edit"))
        }

        async fn list_document_titles(&self, _folder_id: &str) -> Result<Vec<String>, DocsError> {
            self.record(Call::List);
            Err(Self::unavailable("list_document_titles"))
        }
    }

    fn three_images() -> Vec<Option<String>> {
        ["https://a", "https://b", "https://c"]
            .iter()
            .map(|u| Some(u.to_string()))
            .collect()
    }

    fn image_uris(calls: &[Call]) -> Vec<String> {
        calls
            .iter()
            .filter_map(|c| match c {
                Call::Batch(reqs) => match reqs.first() {
                    Some(Request::InsertInlineImage { uri, .. }) => Some(uri.clone()),
                    _ => None,
                },
                _ => None,
            })
            .collect()
    }

    fn style_batch_sizes(calls: &[Call]) -> Vec<usize> {
        calls
            .iter()
            .filter_map(|c| match c {
                Call::Batch(reqs)
                    if matches!(
                        reqs.first(),
                        Some(Request::UpdateParagraphStyle { .. } | Request::UpdateTextStyle { .. })
                    ) =>
                {
                    Some(reqs.len())
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_build_runs_phases_in_order() {
        let service = RecordingService::default();
        let options = BuildOptions {
            folder_id: Some("folder-9".to_string()),
            ..BuildOptions::default()
        };
        let package = full_package(three_images());

        let link = create_weekly_doc(&service, &options, week(), &package).await.unwrap();
        assert_eq!(link, "https://docs.google.com/document/d/doc-1/edit");

        let calls = service.calls();
        assert_eq!(
            calls[0],
            Call::Create("Vlaamse Chroniqueur \u{2014} Week of 6 October 2025: Gravensteen".to_string())
        );
        match &calls[1] {
            Call::Batch(reqs) => {
                assert_eq!(reqs.len(), 1);
                assert!(matches!(reqs[0], Request::InsertText { .. }));
            }
            other => panic!("expected text insert, got {other:?}"),
        }

        let sizes = style_batch_sizes(&calls);
        assert!(sizes.iter().all(|&s| s <= DEFAULT_BATCH_SIZE));
        let layout = assemble(week(), &package, DEFAULT_CHANNEL_NAME);
        assert_eq!(sizes.iter().sum::<usize>(), build_style_requests(&layout.events).len());

        assert_eq!(image_uris(&calls), vec!["https://c", "https://b", "https://a"]);
        let tail: Vec<Call> = calls[calls.len() - 3..].to_vec();
        assert_eq!(tail, vec![Call::Move("folder-9".to_string()), Call::Share, Call::Link]);
    }

    #[tokio::test]
    async fn test_image_failure_does_not_abort() {
        let service = RecordingService {
            failing_image_urls: vec!["https://b".to_string()],
            ..RecordingService::default()
        };
        let package = full_package(three_images());

        let result = create_weekly_doc(&service, &BuildOptions::default(), week(), &package).await;
        assert!(result.is_ok());
        assert_eq!(image_uris(&service.calls()), vec!["https://c", "https://b", "https://a"]);
    }

    #[tokio::test]
    async fn test_failed_style_batch_keeps_going() {
        let service = RecordingService {
            failing_style_batch: Some(1),
            ..RecordingService::default()
        };
        let layout = assemble(week(), &full_package(vec![]), DEFAULT_CHANNEL_NAME);

        let report = apply_formatting(&service, "doc-1", &layout.events, 10).await;
        let expected_batches = report.requests.div_ceil(10);
        assert_eq!(report.batches_failed, 1);
        assert_eq!(report.batches_sent, expected_batches - 1);
        assert_eq!(style_batch_sizes(&service.calls()).len(), expected_batches);
    }

    #[tokio::test]
    async fn test_text_insert_failure_is_fatal() {
        let service = RecordingService {
            fail_insert_text: true,
            ..RecordingService::default()
        };
        let err = create_weekly_doc(&service, &BuildOptions::default(), week(), &minimal_package())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("insert_text"));
        assert_eq!(service.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_create_failure_is_fatal() {
        let service = RecordingService {
            fail_create: true,
            ..RecordingService::default()
        };
        let result = create_weekly_doc(&service, &BuildOptions::default(), week(), &minimal_package()).await;
        assert!(result.is_err());
        assert_eq!(service.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_package_never_creates_document() {
        let service = RecordingService::default();
        let mut package = minimal_package();
        package.topic = String::new();

        let err = create_weekly_doc(&service, &BuildOptions::default(), week(), &package)
            .await
            .unwrap_err();
        assert!(matches!(err, DocsError::InvalidPackage { .. }));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_move_failure_is_only_a_warning() {
        let service = RecordingService {
            fail_move: true,
            ..RecordingService::default()
        };
        let options = BuildOptions {
            folder_id: Some("folder-9".to_string()),
            ..BuildOptions::default()
        };
        let result = create_weekly_doc(&service, &options, week(), &minimal_package()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_blank_folder_is_not_moved() {
        let service = RecordingService::default();
        let options = BuildOptions {
            folder_id: Some("  ".to_string()),
            ..BuildOptions::default()
        };
        create_weekly_doc(&service, &options, week(), &minimal_package())
            .await
            .unwrap();
        assert!(!service.calls().iter().any(|c| matches!(c, Call::Move(_))));
    }

    #[test]
    fn test_topic_from_title() {
        assert_eq!(
            topic_from_title("Vlaamse Chroniqueur \u{2014} Week of 6 October 2025: Gravensteen"),
            Some("Gravensteen".to_string())
        );
        assert_eq!(
            topic_from_title("Week of 13 October 2025: Ypres: the Cloth Hall"),
            Some("Ypres: the Cloth Hall".to_string())
        );
        assert_eq!(topic_from_title("Untitled document"), None);
        assert_eq!(topic_from_title("Draft: "), None);
    }

    #[tokio::test]
    async fn test_past_topics_degrade_to_empty() {
        let service = RecordingService::default();
        assert!(get_past_topics(&service, "folder-9").await.is_empty());
        assert_eq!(service.calls(), vec![Call::List]);
    }
}
