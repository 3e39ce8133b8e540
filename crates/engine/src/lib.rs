//! Download engine: probing, chunked HTTP fetching, merge/verify, and the process-wide registry
//! an adapter drives (§2, §4).

mod controller;
mod duration;
mod error;
mod events;
mod http;
mod model;
mod partition;
mod pause;
mod progress;
mod registry;

pub use controller::{MAX_CHUNKS, MIN_CHUNKS};
pub use duration::{format_duration, parse_duration};
pub use error::EngineError;
pub use events::{DownloadEvent, EventKind};
pub use model::{ChunkSnapshot, ChunkStatus, DownloadId, DownloadSnapshot, DownloadStatus};
pub use registry::Registry;

pub use storage::BackingStore;
