/// Errors surfaced by the engine's public contract and internal orchestration (§7).
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The probing HEAD request failed outright (network error or non-2xx status).
    #[error("probe failed: {0}")]
    ProbeFailed(String),

    /// The origin did not report a usable `Content-Length`.
    #[error("origin did not report a usable content length")]
    ProbeUnknownSize,

    /// A chunked range request did not come back `206 Partial Content`.
    #[error("chunk request returned unexpected status {0}")]
    ChunkHttpStatus(u16),

    /// No bytes were read for at least the configured read timeout.
    #[error("no data received for at least {0:?}")]
    InactivityTimeout(std::time::Duration),

    /// The response headers for a chunk request did not arrive within the connect timeout.
    #[error("timed out waiting for response headers after {0:?}")]
    ConnectTimeout(std::time::Duration),

    /// A filesystem operation failed.
    #[error("io error: {0}")]
    IoError(String),

    /// The merged output's size did not match the probed total size after all retries.
    #[error("merged output size did not match the probed total size after retrying")]
    SizeMismatch,

    /// A single chunk's completed byte count did not match its expected range size within
    /// tolerance (§4.2 completion check).
    #[error("chunk {chunk} wrote {actual} bytes, expected {expected}")]
    ChunkSizeMismatch { chunk: u32, actual: u64, expected: u64 },

    /// The request to the engine was malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No download exists with the given id.
    #[error("no such download")]
    NotFound,

    /// The requested operation is not valid for the download's current state.
    #[error("invalid state for this operation: {0}")]
    InvalidState(String),
}

impl From<storage::StorageError> for EngineError {
    fn from(e: storage::StorageError) -> Self {
        match e {
            storage::StorageError::SizeMismatch { .. } => EngineError::SizeMismatch,
            other => EngineError::IoError(other.to_string()),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::IoError(e.to_string())
    }
}
