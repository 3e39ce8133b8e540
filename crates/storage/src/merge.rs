use std::path::Path;

use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::backing::BackingStore;
use crate::error::StorageError;

/// Result of a successful merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Total bytes written to the output file.
    pub bytes_written: u64,
}

/// Concatenates a download's chunk backing files into `output_path`, in index order, then
/// verifies the result. Retries up to `max_attempts` times on verification failure; chunk backing
/// files are only removed once a merge attempt succeeds (§4.4).
pub async fn merge_and_verify(
    backing: &BackingStore,
    download_id: Uuid,
    chunk_count: u32,
    output_path: &Path,
    expected_size: u64,
    max_attempts: u32,
) -> Result<MergeOutcome, StorageError> {
    let mut last_err = None;

    for attempt in 1..=max_attempts.max(1) {
        match merge_once(backing, download_id, chunk_count, output_path, expected_size).await {
            Ok(bytes_written) => {
                backing.remove_all(download_id, chunk_count).await?;
                return Ok(MergeOutcome { bytes_written });
            }
            Err(e) => {
                tracing::warn!(
                    download_id = %download_id,
                    attempt,
                    error = %e,
                    "merge attempt failed, chunk backing files retained for retry"
                );
                last_err = Some(e);
            }
        }
    }

    Err(last_err.expect("loop runs at least once"))
}

async fn merge_once(
    backing: &BackingStore,
    download_id: Uuid,
    chunk_count: u32,
    output_path: &Path,
    expected_size: u64,
) -> Result<u64, StorageError> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut output = File::create(output_path).await?;
    let mut total_written = 0u64;

    for index in 0..chunk_count {
        let mut chunk_file = backing.open_chunk_file(download_id, index).await?;
        total_written += tokio::io::copy(&mut chunk_file, &mut output).await?;
    }

    output.flush().await?;
    output.sync_all().await?;
    drop(output);

    let metadata = fs::metadata(output_path).await?;
    if metadata.len() != expected_size {
        let _ = fs::remove_file(output_path).await;
        return Err(StorageError::SizeMismatch {
            actual: metadata.len(),
            expected: expected_size,
        });
    }

    if expected_size > 0 {
        let mut readback = File::open(output_path)
            .await
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;
        let mut probe = [0u8; 4096];
        readback
            .read(&mut probe)
            .await
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;
    }

    Ok(total_written)
}
