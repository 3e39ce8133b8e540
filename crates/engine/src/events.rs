//! Broadcast event envelope (§6 push channel, §4.5 broadcast semantics).

use serde::Serialize;

use crate::model::{DownloadId, DownloadSnapshot};

/// The kind of event carried by an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Progress,
    Status,
    Paused,
    Resumed,
    Completed,
    Error,
}

/// One event published on the broadcast bus. Carries a full snapshot so a subscriber never needs
/// to reach back into the registry to render an update.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadEvent {
    #[serde(rename = "downloadId")]
    pub download_id: DownloadId,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: DownloadSnapshot,
}

impl DownloadEvent {
    pub fn new(kind: EventKind, snapshot: DownloadSnapshot) -> Self {
        Self {
            download_id: snapshot.id,
            kind,
            data: snapshot,
        }
    }
}
