//! Media-update stream and best-effort media file fetch (spec §4.6).
//!
//! Same pagination + watermark contract as the deck-update stream, but no
//! merging and no snapshot detour: each chunk is handed straight to the
//! caller.

use std::path::Path;
use std::sync::Arc;

use futures_core::stream::Stream;
use futures_util::StreamExt;
use serde_json::Value;
use tracing::warn;

use crate::error::{ClientError, Result};
use crate::models::{DeckMedia, DeckMediaUpdateChunk};
use crate::pagination::{paginate, Page};
use crate::token::TokenCell;
use crate::transport::{Api, SendOptions, Transport};

const DECK_MEDIA_UPDATE_PAGE_SIZE: u32 = 2000;

impl Page for DeckMediaUpdateChunk {
    fn next_cursor(&self) -> Option<&str> {
        self.next.as_deref()
    }
}

/// Stream media-update pages for a deck since `since`. Lazy, finite,
/// non-restartable within one call (spec §5): a new call always restarts
/// from the given `since`.
pub fn get_deck_media_updates(
    transport: Arc<Transport>,
    token: TokenCell,
    deck_id: &str,
    since: Option<String>,
) -> impl Stream<Item = Result<Vec<DeckMedia>>> {
    let mut params = vec![("size".to_string(), DECK_MEDIA_UPDATE_PAGE_SIZE.to_string())];
    if let Some(s) = since {
        params.push(("since".to_string(), s));
    }

    let path = format!("/decks/{deck_id}/media/list/");
    let pages = paginate(transport, token, path, params, true, |v: Value| {
        serde_json::from_value::<DeckMediaUpdateChunk>(v).map_err(ClientError::from)
    });
    pages.map(|page| page.map(|p| p.media))
}

/// Download `media_names` for `deck_id` into `media_dir`. Best-effort: a
/// failure on one file is logged and counted but does not abort the
/// batch (spec §4.6, §7).
pub async fn download_media(
    transport: &Transport,
    token: &TokenCell,
    deck_id: &str,
    media_names: &[String],
    media_dir: &Path,
) -> Result<()> {
    if transport.storage_base().is_none() {
        return Err(ClientError::ConfigurationMissing("storage bucket URL"));
    }

    let mut downloaded = 0usize;
    for name in media_names {
        let remote_path = format!("/deck_assets/{deck_id}/{name}");
        match transport
            .send::<()>(
                reqwest::Method::GET,
                Api::Storage,
                &remote_path,
                token,
                SendOptions::default(),
            )
            .await
        {
            Ok(response) if response.status().is_success() => {
                match response.bytes().await {
                    Ok(bytes) => {
                        if let Some(parent) = media_dir.parent() {
                            let _ = tokio::fs::create_dir_all(parent).await;
                        }
                        let _ = tokio::fs::create_dir_all(media_dir).await;
                        let target = media_dir.join(name);
                        if let Err(e) = tokio::fs::write(&target, &bytes).await {
                            warn!(media_name = %name, error = %e, "failed to write media file");
                            continue;
                        }
                        downloaded += 1;
                    }
                    Err(e) => {
                        warn!(media_name = %name, error = %e, "failed to read media body");
                    }
                }
            }
            Ok(response) => {
                warn!(
                    media_name = %name,
                    status = %response.status(),
                    "unable to download media file"
                );
            }
            Err(e) => {
                warn!(media_name = %name, error = %e, "error downloading media file");
            }
        }
    }

    tracing::info!(
        deck_id,
        attempted = media_names.len(),
        downloaded,
        "downloaded media from sync service"
    );
    Ok(())
}
