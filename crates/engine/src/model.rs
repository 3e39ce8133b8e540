//! The download data model (§3): `Download`, its chunks, and the read-only snapshots handed to
//! observers.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use uuid::Uuid;

use crate::partition::Range;

/// Opaque, process-unique download identifier.
pub type DownloadId = Uuid;

/// Top-level lifecycle state of a download (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Paused,
    Completed,
    Error,
    Cancelled,
}

impl DownloadStatus {
    /// Terminal states never transition out (§3 invariants).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DownloadStatus::Completed | DownloadStatus::Error | DownloadStatus::Cancelled
        )
    }
}

/// Per-chunk lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    Waiting,
    Downloading,
    Completed,
    Failed,
}

impl ChunkStatus {
    fn to_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => ChunkStatus::Waiting,
            1 => ChunkStatus::Downloading,
            2 => ChunkStatus::Completed,
            _ => ChunkStatus::Failed,
        }
    }
}

/// One chunk's live, concurrently-updated state.
///
/// `downloaded_bytes` and `status` are atomics so the owning fetcher can update them without ever
/// taking the download's lock (§4.5 "Concurrent access to a Download").
#[derive(Debug)]
pub struct ChunkHandle {
    pub index: u32,
    pub start: u64,
    pub end: u64,
    downloaded_bytes: AtomicU64,
    status: AtomicU8,
    started_at: Mutex<Option<Instant>>,
}

impl ChunkHandle {
    pub fn new(index: u32, range: Range) -> Arc<Self> {
        Arc::new(Self {
            index,
            start: range.start,
            end: range.end,
            downloaded_bytes: AtomicU64::new(0),
            status: AtomicU8::new(ChunkStatus::Waiting.to_u8()),
            started_at: Mutex::new(None),
        })
    }

    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded_bytes.load(Ordering::Acquire)
    }

    /// Adds freshly-read bytes to the running total. Never exceeds `size()` in practice, but the
    /// fetcher is responsible for not over-reading past its range.
    pub fn add_downloaded(&self, n: u64) {
        self.downloaded_bytes.fetch_add(n, Ordering::AcqRel);
    }

    pub fn status(&self) -> ChunkStatus {
        ChunkStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: ChunkStatus) {
        if status == ChunkStatus::Downloading {
            let mut guard = self.started_at.lock().expect("chunk started_at poisoned");
            if guard.is_none() {
                *guard = Some(Instant::now());
            }
        }
        self.status.store(status.to_u8(), Ordering::Release);
    }

    pub fn started_at(&self) -> Option<Instant> {
        *self.started_at.lock().expect("chunk started_at poisoned")
    }

    /// Instantaneous rate since this chunk started downloading.
    pub fn rate_bps(&self) -> u64 {
        match self.started_at() {
            Some(start) => {
                let elapsed = start.elapsed().as_secs_f64().max(1.0 / 1000.0);
                (self.downloaded() as f64 / elapsed) as u64
            }
            None => 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status() == ChunkStatus::Completed
    }
}

/// Wire-shaped snapshot of one chunk (§3 ChunkState, camelCase on the wire per §6).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkSnapshot {
    pub id: u32,
    pub start: u64,
    pub end: u64,
    pub size: u64,
    pub downloaded_bytes: u64,
    pub rate_bps: u64,
    pub status: ChunkStatus,
}

impl From<&Arc<ChunkHandle>> for ChunkSnapshot {
    fn from(chunk: &Arc<ChunkHandle>) -> Self {
        Self {
            id: chunk.index,
            start: chunk.start,
            end: chunk.end,
            size: chunk.size(),
            downloaded_bytes: chunk.downloaded(),
            rate_bps: chunk.rate_bps(),
            status: chunk.status(),
        }
    }
}

/// Mutable fields of a download, guarded by a single short-lived lock (§4.5). Held only to read
/// or swap plain values — all I/O happens through the `Arc<ChunkHandle>`s cloned out of here.
struct DownloadState {
    status: DownloadStatus,
    total_size: u64,
    supports_range: bool,
    started_at: Option<SystemTime>,
    error_message: Option<String>,
    chunks: Vec<Arc<ChunkHandle>>,
    speed_bps: u64,
    time_remaining_s: Option<u64>,
    last_sample: Option<(u64, Instant)>,
}

/// The unit of work (§3). Immutable identity/config fields sit directly on the struct; everything
/// that changes over the download's lifetime lives behind `state`.
pub struct Download {
    pub id: DownloadId,
    pub url: String,
    pub filename: String,
    pub output_path: PathBuf,
    pub requested_chunks: u32,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    state: Mutex<DownloadState>,
}

impl Download {
    pub fn new(
        id: DownloadId,
        url: String,
        filename: String,
        output_path: PathBuf,
        requested_chunks: u32,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Self {
        Self {
            id,
            url,
            filename,
            output_path,
            requested_chunks,
            connect_timeout,
            read_timeout,
            state: Mutex::new(DownloadState {
                status: DownloadStatus::Pending,
                total_size: 0,
                supports_range: false,
                started_at: None,
                error_message: None,
                chunks: Vec::new(),
                speed_bps: 0,
                time_remaining_s: None,
                last_sample: None,
            }),
        }
    }

    pub fn status(&self) -> DownloadStatus {
        self.state.lock().expect("download state poisoned").status
    }

    /// Sets the status. Refuses to move out of a terminal state (§3 invariant).
    pub fn set_status(&self, status: DownloadStatus) {
        let mut state = self.state.lock().expect("download state poisoned");
        if state.status.is_terminal() {
            return;
        }
        if status == DownloadStatus::Downloading && state.started_at.is_none() {
            state.started_at = Some(SystemTime::now());
        }
        state.status = status;
    }

    pub fn set_error(&self, message: String) {
        let mut state = self.state.lock().expect("download state poisoned");
        if state.status.is_terminal() {
            return;
        }
        state.status = DownloadStatus::Error;
        state.error_message = Some(message);
    }

    /// Records probe results and installs the partitioned chunks. Called once, before any worker
    /// starts, while status is still `Pending`.
    pub fn install_probe_result(&self, total_size: u64, supports_range: bool, chunks: Vec<Arc<ChunkHandle>>) {
        let mut state = self.state.lock().expect("download state poisoned");
        state.total_size = total_size;
        state.supports_range = supports_range;
        state.chunks = chunks;
    }

    pub fn total_size(&self) -> u64 {
        self.state.lock().expect("download state poisoned").total_size
    }

    pub fn supports_range(&self) -> bool {
        self.state.lock().expect("download state poisoned").supports_range
    }

    pub fn chunk_count(&self) -> u32 {
        self.state.lock().expect("download state poisoned").chunks.len() as u32
    }

    pub fn chunks(&self) -> Vec<Arc<ChunkHandle>> {
        self.state.lock().expect("download state poisoned").chunks.clone()
    }

    /// Always the live atomic sum of per-chunk counters — never a cached, back-derived value
    /// (§9 Open Questions).
    pub fn downloaded_bytes(&self) -> u64 {
        self.state
            .lock()
            .expect("download state poisoned")
            .chunks
            .iter()
            .map(|c| c.downloaded())
            .sum()
    }

    pub fn progress_pct(&self) -> f64 {
        let total = self.total_size();
        if total == 0 {
            return 0.0;
        }
        (self.downloaded_bytes() as f64 / total as f64) * 100.0
    }

    pub fn all_chunks_complete(&self) -> bool {
        let state = self.state.lock().expect("download state poisoned");
        !state.chunks.is_empty() && state.chunks.iter().all(|c| c.is_complete())
    }

    /// Recomputes the sampled overall rate and ETA (§4.3). Intended to be called by the
    /// controller's 4 Hz ticker; cheap enough to also call opportunistically.
    pub fn tick_rate(&self) {
        let mut state = self.state.lock().expect("download state poisoned");
        let now_bytes: u64 = state.chunks.iter().map(|c| c.downloaded()).sum();
        let now = Instant::now();

        let speed = match state.last_sample {
            Some((last_bytes, last_time)) => {
                let elapsed = now.duration_since(last_time).as_secs_f64();
                if elapsed > 0.0 && now_bytes >= last_bytes {
                    ((now_bytes - last_bytes) as f64 / elapsed) as u64
                } else {
                    state.speed_bps
                }
            }
            None => 0,
        };

        state.speed_bps = speed;
        state.time_remaining_s = if speed > 0 {
            let remaining = state.total_size.saturating_sub(now_bytes);
            Some(remaining / speed)
        } else {
            None
        };
        state.last_sample = Some((now_bytes, now));
    }

    pub fn snapshot(&self) -> DownloadSnapshot {
        let state = self.state.lock().expect("download state poisoned");
        let downloaded_bytes: u64 = state.chunks.iter().map(|c| c.downloaded()).sum();
        let progress_pct = if state.total_size == 0 {
            0.0
        } else {
            (downloaded_bytes as f64 / state.total_size as f64) * 100.0
        };

        DownloadSnapshot {
            id: self.id,
            url: self.url.clone(),
            filename: self.filename.clone(),
            output_path: self.output_path.clone(),
            requested_chunks: self.requested_chunks,
            total_size: state.total_size,
            supports_range: state.supports_range,
            status: state.status,
            progress_pct,
            downloaded_bytes,
            speed_bps: state.speed_bps,
            time_remaining_s: state.time_remaining_s,
            chunks: state.chunks.iter().map(ChunkSnapshot::from).collect(),
            connect_timeout_ms: self.connect_timeout.as_millis() as u64,
            read_timeout_ms: self.read_timeout.as_millis() as u64,
            started_at_epoch_ms: state.started_at.map(|t| {
                t.duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis() as u64
            }),
            error_message: state.error_message.clone(),
        }
    }
}

/// Wire-shaped, read-only view of a `Download` (§3, camelCase on the wire per §6).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSnapshot {
    pub id: DownloadId,
    pub url: String,
    pub filename: String,
    pub output_path: PathBuf,
    pub requested_chunks: u32,
    pub total_size: u64,
    pub supports_range: bool,
    pub status: DownloadStatus,
    pub progress_pct: f64,
    pub downloaded_bytes: u64,
    pub speed_bps: u64,
    pub time_remaining_s: Option<u64>,
    pub chunks: Vec<ChunkSnapshot>,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub started_at_epoch_ms: Option<u64>,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_download() -> Download {
        Download::new(
            Uuid::new_v4(),
            "https://example.com/file.bin".to_string(),
            "file.bin".to_string(),
            PathBuf::from("/tmp/file.bin"),
            4,
            Duration::from_secs(10),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn new_download_starts_pending_with_zero_progress() {
        let d = sample_download();
        assert_eq!(d.status(), DownloadStatus::Pending);
        assert_eq!(d.downloaded_bytes(), 0);
        assert_eq!(d.progress_pct(), 0.0);
    }

    #[test]
    fn terminal_status_is_sticky() {
        let d = sample_download();
        d.set_status(DownloadStatus::Completed);
        d.set_status(DownloadStatus::Downloading);
        assert_eq!(d.status(), DownloadStatus::Completed);
    }

    #[test]
    fn downloaded_bytes_is_live_atomic_sum_not_cached() {
        let d = sample_download();
        let chunks = vec![
            ChunkHandle::new(0, Range { start: 0, end: 9 }),
            ChunkHandle::new(1, Range { start: 10, end: 19 }),
        ];
        d.install_probe_result(20, true, chunks.clone());
        chunks[0].add_downloaded(5);
        chunks[1].add_downloaded(3);
        assert_eq!(d.downloaded_bytes(), 8);
        chunks[0].add_downloaded(5);
        assert_eq!(d.downloaded_bytes(), 13);
        assert!((d.progress_pct() - 65.0).abs() < 1e-9);
    }

    #[test]
    fn all_chunks_complete_detection() {
        let d = sample_download();
        let chunks = vec![
            ChunkHandle::new(0, Range { start: 0, end: 9 }),
            ChunkHandle::new(1, Range { start: 10, end: 19 }),
        ];
        d.install_probe_result(20, true, chunks.clone());
        assert!(!d.all_chunks_complete());
        chunks[0].set_status(ChunkStatus::Completed);
        chunks[1].set_status(ChunkStatus::Completed);
        assert!(d.all_chunks_complete());
    }

    #[test]
    fn tick_rate_reports_zero_speed_with_no_elapsed_progress() {
        let d = sample_download();
        let chunks = vec![ChunkHandle::new(0, Range { start: 0, end: 9 })];
        d.install_probe_result(10, true, chunks);
        d.tick_rate();
        let snap = d.snapshot();
        assert_eq!(snap.speed_bps, 0);
        assert_eq!(snap.time_remaining_s, None);
    }
}
