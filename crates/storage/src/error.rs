/// Errors surfaced by the backing-store and merge subsystem.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A filesystem operation on a chunk or output file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The merged output's byte count did not match the probed total size.
    #[error("merged size {actual} does not match expected size {expected}")]
    SizeMismatch {
        /// Bytes actually written to the output file.
        actual: u64,
        /// The size the download was probed at.
        expected: u64,
    },

    /// The merged output file could not be read back for the post-merge smoke test.
    #[error("merged output is unreadable: {0}")]
    Corrupt(String),
}
