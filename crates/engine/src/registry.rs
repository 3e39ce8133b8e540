//! Process-wide download registry (§4.5): a dashmap-backed map from id to its `Download` and
//! controller handle, plus the shared broadcast bus every download's events fan out onto.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::Client;
use storage::BackingStore;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::controller::{self, ControllerHandle, MAX_CHUNKS, MIN_CHUNKS};
use crate::error::EngineError;
use crate::events::DownloadEvent;
use crate::http;
use crate::model::{Download, DownloadId, DownloadSnapshot, DownloadStatus};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

struct Entry {
    download: Arc<Download>,
    handle: ControllerHandle,
}

/// Owns every download known to this process (§4.6 Engine Public Contract).
pub struct Registry {
    entries: DashMap<DownloadId, Entry>,
    client: Client,
    backing: Arc<BackingStore>,
    events: broadcast::Sender<DownloadEvent>,
    downloads_dir: PathBuf,
}

impl Registry {
    /// `downloads_dir` is where `add_download` places a download's output file when the caller
    /// supplies only a filename (§4.7 platform helpers resolve this directory for the process
    /// entry point; the registry itself just joins it).
    pub fn new(backing: BackingStore, downloads_dir: PathBuf) -> Result<Self, EngineError> {
        let client = http::build_client()?;
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            entries: DashMap::new(),
            client,
            backing: Arc::new(backing),
            events,
            downloads_dir,
        })
    }

    /// Validates the request, creates the `Download` in `pending`, and spawns its controller
    /// (§4.6 `add_download`).
    pub fn add_download(
        &self,
        url: String,
        filename: String,
        requested_chunks: u32,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<DownloadSnapshot, EngineError> {
        if url.trim().is_empty() {
            return Err(EngineError::InvalidRequest("url must not be empty".to_string()));
        }
        if filename.trim().is_empty() {
            return Err(EngineError::InvalidRequest("filename must not be empty".to_string()));
        }
        if !(MIN_CHUNKS..=MAX_CHUNKS).contains(&requested_chunks) {
            return Err(EngineError::InvalidRequest(format!(
                "chunks must be between {MIN_CHUNKS} and {MAX_CHUNKS}"
            )));
        }

        let id = Uuid::new_v4();
        let output_path = self.downloads_dir.join(&filename);
        let download = Arc::new(Download::new(
            id,
            url,
            filename,
            output_path,
            requested_chunks,
            connect_timeout,
            read_timeout,
        ));

        let handle = controller::spawn(
            download.clone(),
            self.client.clone(),
            self.backing.clone(),
            self.events.clone(),
        );
        let snapshot = download.snapshot();
        self.entries.insert(id, Entry { download, handle });
        Ok(snapshot)
    }

    pub fn list_downloads(&self) -> Vec<DownloadSnapshot> {
        self.entries.iter().map(|e| e.download.snapshot()).collect()
    }

    pub fn get_download(&self, id: DownloadId) -> Result<DownloadSnapshot, EngineError> {
        self.entries
            .get(&id)
            .map(|e| e.download.snapshot())
            .ok_or(EngineError::NotFound)
    }

    pub fn pause_download(&self, id: DownloadId) -> Result<(), EngineError> {
        let entry = self.entries.get(&id).ok_or(EngineError::NotFound)?;
        if entry.download.status() != DownloadStatus::Downloading {
            return Err(EngineError::InvalidState(
                "download is not downloading".to_string(),
            ));
        }
        entry.handle.pause();
        Ok(())
    }

    pub fn resume_download(&self, id: DownloadId) -> Result<(), EngineError> {
        let entry = self.entries.get(&id).ok_or(EngineError::NotFound)?;
        if entry.download.status() != DownloadStatus::Paused {
            return Err(EngineError::InvalidState("download is not paused".to_string()));
        }
        entry.handle.resume();
        Ok(())
    }

    /// Cancels an active download, then removes its registry entry. Per the Open Question
    /// decision recorded in DESIGN.md, a completed download's output file is never deleted here —
    /// only in-flight temporaries are cleaned up.
    pub fn delete_download(&self, id: DownloadId) -> Result<(), EngineError> {
        let (_, entry) = self.entries.remove(&id).ok_or(EngineError::NotFound)?;
        if !entry.download.status().is_terminal() {
            entry.handle.cancel();
        }
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.events.subscribe()
    }

    /// §4.6 `open_completed`: fails unless the download is complete and its output file is still
    /// on disk.
    pub async fn open_completed(
        &self,
        id: DownloadId,
    ) -> Result<(tokio::fs::File, DownloadSnapshot), EngineError> {
        let snapshot = {
            let entry = self.entries.get(&id).ok_or(EngineError::NotFound)?;
            entry.download.snapshot()
        };
        if snapshot.status != DownloadStatus::Completed {
            return Err(EngineError::InvalidState(
                "download is not completed".to_string(),
            ));
        }
        let file = tokio::fs::File::open(&snapshot.output_path)
            .await
            .map_err(|_| EngineError::InvalidState("completed output file is missing".to_string()))?;
        Ok((file, snapshot))
    }
}
