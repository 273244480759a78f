//! Error types for the document builder and the generation steps.

use thiserror::Error;

/// Failures raised by the document builder and its remote service.
#[derive(Error, Debug)]
pub enum DocsError {
    #[error("HTTP request failed during {operation}: {source}")]
    Http {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{operation} returned status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("{operation} response is missing field `{field}`")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },
    #[error("invalid script package field `{field}`: {reason}")]
    InvalidPackage { field: &'static str, reason: String },
    #[error("{operation} failed for document {document_id}: {source}")]
    Operation {
        operation: &'static str,
        document_id: String,
        #[source]
        source: Box<DocsError>,
    },
}

impl DocsError {
    /// Attach the operation name and document id to an underlying failure.
    pub fn during(self, operation: &'static str, document_id: &str) -> Self {
        DocsError::Operation {
            operation,
            document_id: document_id.to_string(),
            source: Box::new(self),
        }
    }
}

/// Failures while turning a language model response into structured data.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("{context}: the model returned an empty response")]
    EmptyResponse { context: &'static str },
    #[error("{context}: JSON parse failure: {source}; response: {preview}")]
    Parse {
        context: &'static str,
        #[source]
        source: serde_json::Error,
        preview: String,
    },
}

impl GenerateError {
    /// Whether the response looked cut off rather than malformed.
    pub fn is_truncated(&self) -> bool {
        match self {
            GenerateError::Parse { source, .. } => crate::utils::looks_truncated(source),
            GenerateError::EmptyResponse { .. } => false,
        }
    }
}
