//! Temporary chunk backing files and final-file merge/verify.
//!
//! Owns the on-disk side of a chunked download: where a chunk's bytes live while it streams in,
//! and how those pieces become the final output file once every chunk has completed.

mod backing;
mod error;
mod merge;

pub use backing::BackingStore;
pub use error::StorageError;
pub use merge::{merge_and_verify, MergeOutcome};
