use std::io;

use thiserror::Error;

/// Errors surfaced by the transport layer and the cache store.
///
/// Validation and sink failures do not appear here: they surface through the
/// `State` a sink returns from `write`/`finalize`, and the task maps them to
/// its terminal outcome.
#[derive(Debug, Error)]
pub enum NetError {
    /// The in-flight request was cancelled on user request.
    #[error("operation canceled")]
    Canceled,

    #[error("network error: {0}")]
    Network(String),

    /// Malformed response metadata, e.g. an unparseable redirect location.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("redirect loop detected (more than 10 redirects)")]
    TooManyRedirects,

    #[error("file I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("cache index error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NetError {
    /// Cancel-vs-other classification used by the task's error handler.
    pub fn is_canceled(&self) -> bool {
        matches!(self, NetError::Canceled)
    }
}

pub type Result<T> = std::result::Result<T, NetError>;
