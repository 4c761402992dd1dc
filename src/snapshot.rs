//! Streaming download of the signed CSV snapshot (spec §4.4).
//!
//! Downloaded body is fully buffered in memory before decoding — the
//! merge rule in [`crate::sync`] needs the complete note set before it can
//! filter, so streaming straight into the CSV parser would only move the
//! buffering, not eliminate it (spec §5, "resource scoping").

use std::cmp;

use futures_util::StreamExt;
use reqwest::Url;
use tracing::debug;

use crate::codec::{decode_snapshot_csv, normalize_notes};
use crate::error::{ClientError, Result};
use crate::models::NoteInfo;
use crate::transport::Transport;

const MIN_CHUNK_BYTES: u64 = 8 * 1024;
const MAX_PROGRESS_CHUNK_BYTES: u64 = 1_000_000;
const PROGRESS_CHUNK_FRACTION: f64 = 0.05;

/// Download the snapshot at `url`, invoking `progress_cb` with an integer
/// percentage after each chunk when `Content-Length` is known. Percentages
/// can exceed 100 on a short final chunk (spec §9 — preserved, not
/// clamped). Returns the normalized notes.
pub async fn download_snapshot(
    transport: &Transport,
    url: &str,
    progress_cb: Option<&(dyn Fn(u32) + Send + Sync)>,
) -> Result<Vec<NoteInfo>> {
    let parsed_url =
        Url::parse(url).map_err(|e| ClientError::Protocol(format!("invalid snapshot URL: {e}")))?;

    let response = transport.send_signed(&parsed_url, true).await?;
    if !response.status().is_success() {
        return Err(Transport::http_error(response).await);
    }

    let total_size = response
        .content_length()
        .filter(|&n| n > 0);

    let content = if let Some(cb) = progress_cb {
        let chunk_size = match total_size {
            Some(total) => cmp::min(
                (total as f64 * PROGRESS_CHUNK_FRACTION) as u64,
                MAX_PROGRESS_CHUNK_BYTES,
            )
            .max(1),
            None => MIN_CHUNK_BYTES,
        };

        let mut buf = Vec::new();
        let mut stream = response.bytes_stream();
        let mut seen: u64 = 0;
        let mut i: u64 = 0;
        let mut pending = Vec::new();

        while let Some(next) = stream.next().await {
            let bytes = next.map_err(ClientError::Transport)?;
            pending.extend_from_slice(&bytes);
            seen += bytes.len() as u64;

            while pending.len() as u64 >= chunk_size {
                i += 1;
                buf.extend(pending.drain(..chunk_size as usize));
                if let Some(total) = total_size {
                    let percent = (i * chunk_size * 100 / total) as u32;
                    cb(percent);
                }
            }
        }
        if !pending.is_empty() {
            i += 1;
            buf.extend_from_slice(&pending);
            if let Some(total) = total_size {
                let percent = (i * chunk_size * 100 / total) as u32;
                cb(percent);
            }
        }
        buf
    } else {
        response.bytes().await.map_err(ClientError::Transport)?.to_vec()
    };

    let filename = parsed_url
        .path()
        .rsplit('/')
        .next()
        .unwrap_or_default();

    debug!(bytes = content.len(), filename, "snapshot downloaded");

    let raw = decode_snapshot_csv(&content, filename)?;
    normalize_notes(raw)
}
