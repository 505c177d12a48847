/// Errors surfaced by store operations.
///
/// Most of these never reach a caller: the fetch path and `select` record them
/// into the store's error state instead. `PreconditionFailed` is the exception
/// and is returned from `set_annotation`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid beer id: {0}")]
    InvalidArgument(String),

    #[error("Beer {0} not found")]
    NotFound(u64),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Cannot annotate beer {0}: it is not in the catalog")]
    PreconditionFailed(u64),

    #[error("Profile upload failed: {0}")]
    Upload(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Failures raised by a `Transport` implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request never reached the server (refused, timed out, offline)
    #[error("{0}")]
    Unreachable(String),
}

impl From<TransportError> for StoreError {
    fn from(err: TransportError) -> Self {
        StoreError::Transport(err.to_string())
    }
}
