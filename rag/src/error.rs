use crate::accounts::AccountError;

/// Errors surfaced by the retrieval pipeline and its stores.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// A remote service could not be reached or answered with a non-2xx status.
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    /// A remote service answered, but not in a shape we understand.
    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Text could not be pulled out of an uploaded document.
    #[error("failed to read document: {0}")]
    Extraction(String),

    #[error(transparent)]
    Account(#[from] AccountError),

    /// The current session is not allowed to perform the operation.
    #[error("{0}")]
    Forbidden(String),

    /// User input was rejected before any state changed.
    #[error("{0}")]
    Validation(String),
}

impl RagError {
    pub(crate) fn http(url: &str, message: impl Into<String>) -> Self {
        Self::Http {
            url: url.to_string(),
            message: message.into(),
        }
    }
}
