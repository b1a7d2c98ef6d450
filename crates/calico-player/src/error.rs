use thiserror::Error;

/// Failure of a metadata or ratings round-trip.  Always recoverable: the
/// caller skips this cycle and keeps whatever it was displaying.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("mpv binary not found")]
    NotFound,

    #[error("failed to spawn mpv: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("mpv IPC: {0}")]
    Ipc(String),

    #[error("no stream loaded")]
    NotLoaded,
}
