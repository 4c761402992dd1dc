//! Extension-update stream (spec §4.6).
//!
//! Same pagination + watermark contract as the media stream, with an
//! optional per-page progress callback reporting cumulative customization
//! count.

use std::sync::Arc;

use futures_core::stream::Stream;
use futures_util::StreamExt;
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::models::{DeckExtensionUpdateChunk, NoteCustomization};
use crate::pagination::{paginate, Page};
use crate::token::TokenCell;
use crate::transport::Transport;

const DECK_EXTENSION_UPDATE_PAGE_SIZE: u32 = 2000;

impl Page for DeckExtensionUpdateChunk {
    fn next_cursor(&self) -> Option<&str> {
        self.next.as_deref()
    }
}

/// Stream note-customization pages for a deck extension since `since`.
/// `progress_cb`, when set, receives the cumulative customization count
/// seen so far after each page.
pub fn get_deck_extension_updates(
    transport: Arc<Transport>,
    token: TokenCell,
    deck_extension_id: i64,
    since: Option<String>,
    progress_cb: Option<Arc<dyn Fn(usize) + Send + Sync>>,
) -> impl Stream<Item = Result<Vec<NoteCustomization>>> {
    let mut params = vec![(
        "size".to_string(),
        DECK_EXTENSION_UPDATE_PAGE_SIZE.to_string(),
    )];
    if let Some(s) = since {
        params.push(("since".to_string(), s));
    }

    let path = format!("/deck_extensions/{deck_extension_id}/note_customizations/");
    let pages = paginate(transport, token, path, params, true, |v: Value| {
        serde_json::from_value::<DeckExtensionUpdateChunk>(v).map_err(ClientError::from)
    });

    let mut seen = 0usize;
    pages.map(move |page| {
        page.map(|p| {
            seen += p.note_customizations.len();
            if let Some(cb) = &progress_cb {
                cb(seen);
            }
            p.note_customizations
        })
    })
}
