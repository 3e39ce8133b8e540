//! End-to-end scenarios driving the public `Registry` contract against a mock origin (§8).

use std::path::PathBuf;
use std::time::Duration;

use engine::{DownloadStatus, Registry};
use storage::BackingStore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Tuple's last two elements are tempdir guards — keep them bound in the caller for the test's
/// whole lifetime or the backing/downloads directories disappear out from under the controller.
async fn new_registry() -> (Registry, PathBuf, tempfile::TempDir, tempfile::TempDir) {
    let downloads = tempfile::tempdir().unwrap();
    let temp = tempfile::tempdir().unwrap();
    let backing = BackingStore::new(temp.path()).await.unwrap();
    let registry = Registry::new(backing, downloads.path().to_path_buf()).unwrap();
    let downloads_path = downloads.path().to_path_buf();
    (registry, downloads_path, downloads, temp)
}

/// Polls `get_download` until it reaches a terminal status or the timeout elapses.
async fn wait_for_terminal(registry: &Registry, id: uuid::Uuid, timeout: Duration) -> engine::DownloadSnapshot {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let snapshot = registry.get_download(id).expect("download must still be registered");
        if matches!(
            snapshot.status,
            DownloadStatus::Completed | DownloadStatus::Error | DownloadStatus::Cancelled
        ) {
            return snapshot;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("download did not reach a terminal state in time: {snapshot:?}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn ranged_responder(body: &'static [u8]) -> impl Fn(&Request) -> ResponseTemplate {
    move |req: &Request| {
        let Some(range) = req.headers.get("range").and_then(|v| v.to_str().ok()) else {
            return ResponseTemplate::new(200).set_body_bytes(body.to_vec());
        };
        let spec = range.trim_start_matches("bytes=");
        let (start, end) = spec.split_once('-').expect("range header has a dash");
        let start: usize = start.parse().unwrap();
        let end: usize = end.parse().unwrap();
        ResponseTemplate::new(206)
            .insert_header("content-range", format!("bytes {start}-{end}/{}", body.len()))
            .set_body_bytes(body[start..=end].to_vec())
    }
}

#[tokio::test]
async fn completes_a_small_chunked_download() {
    let body: &'static [u8] = b"the quick brown fox jumps over the lazy dog!!!!"; // 48 bytes
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/file.bin"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-length", body.len().to_string())
                .insert_header("accept-ranges", "bytes"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file.bin"))
        .respond_with(ranged_responder(body))
        .mount(&server)
        .await;

    let (registry, downloads_path, _downloads_guard, _temp_guard) = new_registry().await;
    let snapshot = registry
        .add_download(
            format!("{}/file.bin", server.uri()),
            "fox.txt".to_string(),
            4,
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap();

    let final_snapshot = wait_for_terminal(&registry, snapshot.id, Duration::from_secs(5)).await;
    assert_eq!(final_snapshot.status, DownloadStatus::Completed);
    assert_eq!(final_snapshot.chunks.len(), 4);

    let contents = tokio::fs::read(downloads_path.join("fox.txt")).await.unwrap();
    assert_eq!(contents, body);
}

#[tokio::test]
async fn falls_back_to_single_file_path_when_range_unsupported() {
    let body: &'static [u8] = b"no ranges here, just the whole thing at once";
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/file.bin"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-length", body.len().to_string()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(&server)
        .await;

    let (registry, downloads_path, _downloads_guard, _temp_guard) = new_registry().await;
    let snapshot = registry
        .add_download(
            format!("{}/file.bin", server.uri()),
            "plain.txt".to_string(),
            8,
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap();

    let final_snapshot = wait_for_terminal(&registry, snapshot.id, Duration::from_secs(5)).await;
    assert_eq!(final_snapshot.status, DownloadStatus::Completed);
    assert_eq!(final_snapshot.chunks.len(), 1);

    let contents = tokio::fs::read(downloads_path.join("plain.txt")).await.unwrap();
    assert_eq!(contents, body);
}

#[tokio::test]
async fn missing_content_length_fails_with_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/file.bin"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (registry, _downloads_path, _downloads_guard, _temp_guard) = new_registry().await;
    let snapshot = registry
        .add_download(
            format!("{}/file.bin", server.uri()),
            "unknown.bin".to_string(),
            4,
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap();

    let final_snapshot = wait_for_terminal(&registry, snapshot.id, Duration::from_secs(5)).await;
    assert_eq!(final_snapshot.status, DownloadStatus::Error);
    assert!(final_snapshot.error_message.is_some());
}

#[tokio::test]
async fn rejects_an_out_of_range_chunk_count() {
    let (registry, _downloads_path, _downloads_guard, _temp_guard) = new_registry().await;
    let err = registry
        .add_download(
            "https://example.com/file.bin".to_string(),
            "file.bin".to_string(),
            64,
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap_err();
    assert!(matches!(err, engine::EngineError::InvalidRequest(_)));
}

#[tokio::test]
async fn pause_then_resume_still_reaches_completed() {
    let body: &'static [u8] = b"pausable payload long enough to span several chunks nicely";
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/file.bin"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-length", body.len().to_string())
                .insert_header("accept-ranges", "bytes"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file.bin"))
        .respond_with(ranged_responder(body))
        .mount(&server)
        .await;

    let (registry, downloads_path, _downloads_guard, _temp_guard) = new_registry().await;
    let snapshot = registry
        .add_download(
            format!("{}/file.bin", server.uri()),
            "pausable.bin".to_string(),
            4,
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap();

    // Give the controller a moment to reach `downloading` before pausing it.
    tokio::time::sleep(Duration::from_millis(30)).await;
    let _ = registry.pause_download(snapshot.id);
    tokio::time::sleep(Duration::from_millis(30)).await;
    let _ = registry.resume_download(snapshot.id);

    let final_snapshot = wait_for_terminal(&registry, snapshot.id, Duration::from_secs(5)).await;
    assert_eq!(final_snapshot.status, DownloadStatus::Completed);

    let contents = tokio::fs::read(downloads_path.join("pausable.bin")).await.unwrap();
    assert_eq!(contents, body);
}

#[tokio::test]
async fn delete_after_completion_keeps_the_output_file() {
    let body: &'static [u8] = b"kept after delete";
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/file.bin"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-length", body.len().to_string()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(&server)
        .await;

    let (registry, downloads_path, _downloads_guard, _temp_guard) = new_registry().await;
    let snapshot = registry
        .add_download(
            format!("{}/file.bin", server.uri()),
            "keep.bin".to_string(),
            1,
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap();

    wait_for_terminal(&registry, snapshot.id, Duration::from_secs(5)).await;
    registry.delete_download(snapshot.id).unwrap();

    assert!(matches!(
        registry.get_download(snapshot.id),
        Err(engine::EngineError::NotFound)
    ));
    assert!(downloads_path.join("keep.bin").exists());
}
