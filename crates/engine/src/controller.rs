//! Download controller (§4.4): the state machine that drives one download from pending through
//! probe, chunked or single-file fetch, merge, to a terminal state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use reqwest::Client;
use storage::{merge_and_verify, BackingStore};
use tokio::sync::broadcast;
use tokio::task::AbortHandle;

use crate::events::{DownloadEvent, EventKind};
use crate::http;
use crate::model::{ChunkHandle, Download, DownloadStatus};
use crate::partition::{self, Range};
use crate::pause::PauseController;
use crate::progress::{CoarseEmitter, TICK_INTERVAL};

/// Smallest `requested_chunks` the registry accepts (§4.5).
pub const MIN_CHUNKS: u32 = 1;
/// Largest `requested_chunks` the registry accepts (§4.5).
pub const MAX_CHUNKS: u32 = 16;

const MAX_MERGE_ATTEMPTS: u32 = 3;

/// A live handle to a running controller task, kept in the registry next to its `Download`.
///
/// Dropping a handle does not stop the controller — callers that want that must call `cancel()`
/// explicitly, the same way the registry's delete operation does.
pub struct ControllerHandle {
    download: Arc<Download>,
    events: broadcast::Sender<DownloadEvent>,
    pause: Arc<PauseController>,
    cancelled: Arc<AtomicBool>,
    worker_handles: Arc<Mutex<Vec<AbortHandle>>>,
}

impl ControllerHandle {
    /// Requests a pause (§4.4). The caller is expected to have already checked the download is
    /// `downloading` — this only flips the cooperative signal and records the transition.
    pub fn pause(&self) {
        self.download.set_status(DownloadStatus::Paused);
        self.pause.pause();
        publish(&self.events, EventKind::Paused, &self.download);
    }

    /// Clears a pause request, waking any parked fetcher.
    pub fn resume(&self) {
        self.download.set_status(DownloadStatus::Downloading);
        self.pause.resume();
        publish(&self.events, EventKind::Resumed, &self.download);
    }

    /// Aborts every in-flight task for this download. The controller's own run loop notices the
    /// cancellation flag once its workers unwind and performs the actual cleanup — aborting it
    /// directly here would skip that cleanup.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.pause.resume();
        let handles = self.worker_handles.lock().expect("controller worker handles poisoned");
        for handle in handles.iter() {
            handle.abort();
        }
    }
}

/// Spawns the controller task that drives `download` to completion, failure, or cancellation, and
/// returns a handle to it immediately; the work itself runs on its own task.
pub fn spawn(
    download: Arc<Download>,
    client: Client,
    backing: Arc<BackingStore>,
    events: broadcast::Sender<DownloadEvent>,
) -> ControllerHandle {
    let pause = Arc::new(PauseController::new());
    let cancelled = Arc::new(AtomicBool::new(false));
    let worker_handles = Arc::new(Mutex::new(Vec::new()));

    tokio::spawn(run(
        download.clone(),
        client,
        backing,
        events.clone(),
        pause.clone(),
        cancelled.clone(),
        worker_handles.clone(),
    ));

    ControllerHandle {
        download,
        events,
        pause,
        cancelled,
        worker_handles,
    }
}

fn publish(events: &broadcast::Sender<DownloadEvent>, kind: EventKind, download: &Download) {
    // send() only fails when there are no subscribers; that's not an error for the producer
    // (§4.5 broadcast semantics — publish is non-blocking and never fails the caller).
    let _ = events.send(DownloadEvent::new(kind, download.snapshot()));
}

async fn run(
    download: Arc<Download>,
    client: Client,
    backing: Arc<BackingStore>,
    events: broadcast::Sender<DownloadEvent>,
    pause: Arc<PauseController>,
    cancelled: Arc<AtomicBool>,
    worker_handles: Arc<Mutex<Vec<AbortHandle>>>,
) {
    download.set_status(DownloadStatus::Downloading);
    publish(&events, EventKind::Status, &download);

    let probe = match http::probe(&client, &download.url, download.connect_timeout).await {
        Ok(p) => p,
        Err(e) => {
            fail(&download, &events, &backing, 0, e.to_string()).await;
            return;
        }
    };

    if cancelled.load(Ordering::Acquire) {
        download.set_status(DownloadStatus::Cancelled);
        publish(&events, EventKind::Status, &download);
        return;
    }

    let chunked = probe.supports_range && download.requested_chunks > 1;
    let ranges = if chunked {
        partition::partition(probe.total_size, download.requested_chunks)
    } else {
        vec![Range {
            start: 0,
            end: probe.total_size - 1,
        }]
    };
    let chunks: Vec<Arc<ChunkHandle>> = ranges
        .iter()
        .enumerate()
        .map(|(i, r)| ChunkHandle::new(i as u32, *r))
        .collect();
    let chunk_count = chunks.len() as u32;

    download.install_probe_result(probe.total_size, probe.supports_range, chunks.clone());

    if let Some(parent) = download.output_path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            fail(&download, &events, &backing, chunk_count, e.to_string()).await;
            return;
        }
    }

    let ticker = spawn_ticker(download.clone(), events.clone(), cancelled.clone());
    worker_handles
        .lock()
        .expect("controller worker handles poisoned")
        .push(ticker.abort_handle());

    let mut tasks = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let client = client.clone();
        let url = download.url.clone();
        let backing = backing.clone();
        let output_path = download.output_path.clone();
        let connect_timeout = download.connect_timeout;
        let read_timeout = download.read_timeout;
        let pause = pause.clone();
        let chunk = chunk.clone();
        let download_id = download.id;
        let events = events.clone();
        let download_for_progress = download.clone();

        let handle = tokio::spawn(async move {
            let mut file = if chunked {
                backing
                    .create_chunk_file(download_id, chunk.index)
                    .await
                    .map_err(|e| e.to_string())?
            } else {
                tokio::fs::File::create(&output_path)
                    .await
                    .map_err(|e| e.to_string())?
            };

            let mut coarse = CoarseEmitter::new();
            http::fetch_chunk(
                &client,
                &url,
                &chunk,
                &mut file,
                connect_timeout,
                read_timeout,
                &pause,
                chunked,
                move |n| {
                    if coarse.add(n) {
                        publish(&events, EventKind::Progress, &download_for_progress);
                    }
                },
            )
            .await
            .map_err(|e| e.to_string())
        });
        worker_handles
            .lock()
            .expect("controller worker handles poisoned")
            .push(handle.abort_handle());
        tasks.push(handle);
    }

    // Fetch tasks' own abort handles, separate from `worker_handles` (which `cancel()` drains):
    // on the first fatal chunk error we abort every sibling immediately, not just on delete.
    let fetch_abort_handles: Vec<AbortHandle> = tasks.iter().map(|t| t.abort_handle()).collect();
    let mut first_error = None;
    let mut in_flight: FuturesUnordered<_> = tasks.into_iter().collect();
    while let Some(result) = in_flight.next().await {
        let outcome = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(e) if e.is_cancelled() => None,
            Err(e) => Some(e.to_string()),
        };
        if let Some(message) = outcome {
            if first_error.is_none() {
                for handle in &fetch_abort_handles {
                    handle.abort();
                }
            }
            first_error.get_or_insert(message);
        }
    }

    ticker.abort();

    if cancelled.load(Ordering::Acquire) {
        let _ = backing.remove_all(download.id, chunk_count).await;
        let _ = tokio::fs::remove_file(&download.output_path).await;
        download.set_status(DownloadStatus::Cancelled);
        publish(&events, EventKind::Status, &download);
        return;
    }

    if let Some(message) = first_error {
        fail(&download, &events, &backing, chunk_count, message).await;
        return;
    }

    if chunked {
        if let Err(e) = merge_and_verify(
            &backing,
            download.id,
            chunk_count,
            &download.output_path,
            probe.total_size,
            MAX_MERGE_ATTEMPTS,
        )
        .await
        {
            fail(&download, &events, &backing, chunk_count, e.to_string()).await;
            return;
        }
    }

    download.set_status(DownloadStatus::Completed);
    publish(&events, EventKind::Completed, &download);
}

async fn fail(
    download: &Download,
    events: &broadcast::Sender<DownloadEvent>,
    backing: &BackingStore,
    chunk_count: u32,
    message: String,
) {
    download.set_error(message);
    let _ = backing.remove_all(download.id, chunk_count).await;
    publish(events, EventKind::Error, download);
}

fn spawn_ticker(
    download: Arc<Download>,
    events: broadcast::Sender<DownloadEvent>,
    cancelled: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            interval.tick().await;
            if cancelled.load(Ordering::Acquire) || download.status().is_terminal() {
                return;
            }
            download.tick_rate();
            publish(&events, EventKind::Progress, &download);
        }
    })
}
