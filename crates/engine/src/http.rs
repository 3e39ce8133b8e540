//! HTTP probe and range fetcher (§4.2).

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::EngineError;
use crate::model::{ChunkHandle, ChunkStatus};
use crate::pause::PauseController;

const USER_AGENT: &str = "Cascade/0.1.0";

/// Result of probing an origin (§4.4 Probe).
#[derive(Debug, Clone, Copy)]
pub struct ProbeResult {
    pub total_size: u64,
    pub supports_range: bool,
}

/// Builds the shared `reqwest::Client` used for both probing and fetching.
pub fn build_client() -> Result<Client, EngineError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| EngineError::ProbeFailed(e.to_string()))
}

/// Issues the probing HEAD request (§4.4 Probe).
pub async fn probe(client: &Client, url: &str, connect_timeout: Duration) -> Result<ProbeResult, EngineError> {
    let response = tokio::time::timeout(connect_timeout, client.head(url).send())
        .await
        .map_err(|_| EngineError::ProbeFailed("timed out waiting for response headers".to_string()))?
        .map_err(|e| EngineError::ProbeFailed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(EngineError::ProbeFailed(format!(
            "HEAD returned {}",
            response.status()
        )));
    }

    let total_size = response
        .content_length()
        .filter(|&n| n > 0)
        .ok_or(EngineError::ProbeUnknownSize)?;

    let supports_range = response
        .headers()
        .get(reqwest::header::ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').any(|token| token.trim().eq_ignore_ascii_case("bytes")))
        .unwrap_or(false);

    Ok(ProbeResult {
        total_size,
        supports_range,
    })
}

/// Streams one chunk's bytes into an already-open destination file, enforcing the inactivity
/// timeout and pause cooperation, and publishing progress through `on_bytes` as they arrive
/// (§4.2, §4.3, §5).
///
/// `ranged` selects whether a `Range` header is sent; the single-file path omits it and accepts a
/// plain `200 OK`. The caller owns `file` — chunked downloads pass a chunk's backing file, the
/// single-file path passes the final output file directly. `connect_timeout` bounds the wait for
/// response headers, same as it bounds the probe's HEAD — a server that accepts the socket but
/// never sends headers must not hang the fetcher forever.
pub async fn fetch_chunk(
    client: &Client,
    url: &str,
    chunk: &Arc<ChunkHandle>,
    file: &mut File,
    connect_timeout: Duration,
    read_timeout: Duration,
    pause: &PauseController,
    ranged: bool,
    mut on_bytes: impl FnMut(u64),
) -> Result<(), EngineError> {
    let mut request = client.get(url);
    if ranged {
        request = request.header(
            reqwest::header::RANGE,
            format!("bytes={}-{}", chunk.start, chunk.end),
        );
    }

    let response = tokio::time::timeout(connect_timeout, request.send())
        .await
        .map_err(|_| EngineError::ConnectTimeout(connect_timeout))?
        .map_err(|e| EngineError::ChunkHttpStatus(e.status().map(|s| s.as_u16()).unwrap_or(0)))?;

    let status = response.status();
    let acceptable = if ranged {
        status.as_u16() == 206
    } else {
        status.is_success() || status.as_u16() == 206
    };
    if !acceptable {
        return Err(EngineError::ChunkHttpStatus(status.as_u16()));
    }

    chunk.set_status(ChunkStatus::Downloading);
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    loop {
        pause.wait_if_paused().await;

        let next = tokio::time::timeout(read_timeout, stream.next())
            .await
            .map_err(|_| EngineError::InactivityTimeout(read_timeout))?;

        let Some(item) = next else {
            break;
        };

        let bytes = item.map_err(|e| EngineError::IoError(e.to_string()))?;

        pause.wait_if_paused().await;
        file.write_all(&bytes).await?;

        let n = bytes.len() as u64;
        written += n;
        chunk.add_downloaded(n);
        on_bytes(n);
    }

    file.flush().await?;
    file.sync_all().await?;

    let expected = chunk.size();
    let tolerance = 1024u64;
    if written.abs_diff(expected) > tolerance {
        return Err(EngineError::ChunkSizeMismatch {
            chunk: chunk.index,
            actual: written,
            expected,
        });
    }

    chunk.set_status(ChunkStatus::Completed);
    Ok(())
}
