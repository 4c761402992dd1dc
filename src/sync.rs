//! The deck-update reconciler (spec §4.5) — the centerpiece of this crate.
//!
//! Drives the pagination loop against `/decks/{id}/updates`, detects the
//! snapshot-URL branch, recurses for post-snapshot deltas, and merges
//! snapshot + deltas under the JSON-wins rule (spec §4.5, P1). The merge
//! itself ([`merge_chunks`]) is split out as a pure function so the
//! properties in spec §8 can be tested without a mock server.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::codec::{decode_delta_notes, normalize_notes};
use crate::error::{ClientError, Result};
use crate::models::{DeckUpdates, DeckUpdatesChunk, NoteInfo};
use crate::pagination::{paginate, Page};
use crate::token::TokenCell;
use crate::transport::Transport;

const DECK_UPDATE_PAGE_SIZE: u32 = 2000;

/// Cancellation / completion outcome of [`get_deck_updates`].
pub enum SyncOutcome {
    Updates(DeckUpdates),
    Cancelled,
}

#[derive(Default)]
pub struct SyncCallbacks<'a> {
    /// Invoked with the cumulative number of notes seen after each delta
    /// page (not invoked for the snapshot branch).
    pub updates_progress: Option<&'a (dyn Fn(usize) + Send + Sync)>,
    /// Invoked with an (possibly >100) integer percentage while the
    /// snapshot body streams in.
    pub snapshot_progress: Option<&'a (dyn Fn(u32) + Send + Sync)>,
    /// Checked once per page; returning `true` abandons the run with no
    /// partial result (spec §5, P7).
    pub cancel: Option<&'a (dyn Fn() -> bool + Send + Sync)>,
}

#[derive(Debug, Deserialize)]
struct RawDeckUpdatePage {
    notes: Option<String>,
    latest_update: Option<String>,
    #[serde(default)]
    protected_fields: HashMap<String, Vec<String>>,
    #[serde(default)]
    protected_tags: Vec<String>,
    external_notes_url: Option<String>,
    next: Option<String>,
}

impl Page for RawDeckUpdatePage {
    fn next_cursor(&self) -> Option<&str> {
        self.next.as_deref()
    }
}

fn parse_page(value: Value) -> Result<RawDeckUpdatePage> {
    serde_json::from_value(value).map_err(ClientError::from)
}

fn protected_fields_by_note_type(raw: HashMap<String, Vec<String>>) -> HashMap<i64, Vec<String>> {
    raw.into_iter()
        .filter_map(|(k, v)| k.parse::<i64>().ok().map(|id| (id, v)))
        .collect()
}

struct InnerRun {
    deck_id: String,
    since: Option<String>,
    download_full_deck: bool,
}

/// Fetch incremental updates for a deck, merging the snapshot/delta
/// channels under the JSON-wins rule. `since` is the watermark to resume
/// from, formatted per [`crate::models::DATETIME_FORMAT_STR`]; `None`
/// fetches everything.
pub async fn get_deck_updates(
    transport: Arc<Transport>,
    token: TokenCell,
    deck_id: &str,
    since: Option<String>,
    download_full_deck: bool,
    callbacks: &SyncCallbacks<'_>,
) -> Result<SyncOutcome> {
    let mut chunks: Vec<DeckUpdatesChunk> = Vec::new();
    let mut notes_seen = 0usize;

    let mut stack = vec![InnerRun {
        deck_id: deck_id.to_string(),
        since,
        download_full_deck,
    }];

    // The Python source recurses into itself on a snapshot page; the
    // service guarantees that page is terminal for its stream, so
    // recursion depth is exactly 1 (spec §9). We flatten that recursion
    // into an explicit worklist rather than calling back into an async fn
    // (which would otherwise need boxing for the recursive future type).
    while let Some(run) = stack.pop() {
        let params = vec![
            ("size".to_string(), DECK_UPDATE_PAGE_SIZE.to_string()),
            ("full_deck".to_string(), run.download_full_deck.to_string()),
        ]
        .into_iter()
        .chain(run.since.clone().map(|s| ("since".to_string(), s)))
        .collect();

        let path = format!("/decks/{}/updates", run.deck_id);
        let mut pages = Box::pin(paginate(
            transport.clone(),
            token.clone(),
            path,
            params,
            true,
            parse_page,
        ));

        while let Some(page) = pages.next().await {
            let page = page?;

            if let Some(cancel) = callbacks.cancel {
                if cancel() {
                    info!(deck_id, "deck sync cancelled");
                    return Ok(SyncOutcome::Cancelled);
                }
            }

            if let Some(url) = page.external_notes_url.filter(|u| !u.is_empty()) {
                debug!(deck_id, %url, "snapshot branch");
                let snapshot_notes = crate::snapshot::download_snapshot(
                    &transport,
                    &url,
                    callbacks.snapshot_progress,
                )
                .await?;

                chunks.push(DeckUpdatesChunk {
                    notes: snapshot_notes,
                    latest_update: page.latest_update.clone(),
                    protected_fields: protected_fields_by_note_type(page.protected_fields),
                    protected_tags: page.protected_tags,
                    from_csv: true,
                    external_notes_url: Some(url),
                    next: None,
                });

                // Recurse for post-snapshot deltas; the snapshot page is
                // terminal for this stream, so stop consuming it.
                stack.push(InnerRun {
                    deck_id: run.deck_id.clone(),
                    since: page.latest_update,
                    download_full_deck: false,
                });
                break;
            }

            let notes_field = page.notes.ok_or_else(|| {
                ClientError::Protocol("delta page has neither notes nor external_notes_url".into())
            })?;

            let raw_notes = decode_delta_notes(&notes_field)?;
            let notes = normalize_notes(raw_notes)?;
            notes_seen += notes.len();

            chunks.push(DeckUpdatesChunk {
                notes,
                latest_update: page.latest_update,
                protected_fields: protected_fields_by_note_type(page.protected_fields),
                protected_tags: page.protected_tags,
                from_csv: false,
                external_notes_url: None,
                next: None,
            });

            if let Some(cb) = callbacks.updates_progress {
                cb(notes_seen);
            }
        }
    }

    let merged = merge_chunks(chunks);
    info!(deck_id, notes = merged.notes.len(), "deck sync complete");
    Ok(SyncOutcome::Updates(merged))
}

/// Fold a sequence of chunks (in the order the pagination driver yielded
/// them) into one [`DeckUpdates`]: notes from JSON chunks are kept in
/// full and in order; notes from CSV chunks are dropped whenever their
/// `ah_nid` also appears in a JSON chunk (JSON wins, spec P1); the
/// watermark is the max of all chunks' `latest_update` (P2); protection
/// metadata is taken from the last chunk that carried any, even if empty
/// (P3, spec §9).
pub fn merge_chunks(chunks: Vec<DeckUpdatesChunk>) -> DeckUpdates {
    let mut notes_from_json: Vec<NoteInfo> = Vec::new();
    let mut notes_from_csv: Vec<NoteInfo> = Vec::new();
    let mut latest_update: Option<String> = None;
    let mut protected_fields: HashMap<i64, Vec<String>> = HashMap::new();
    let mut protected_tags: Vec<String> = Vec::new();

    for chunk in chunks {
        if chunk.from_csv {
            notes_from_csv = chunk.notes;
        } else {
            notes_from_json.extend(chunk.notes);
        }
        latest_update = max_watermark(latest_update, chunk.latest_update);
        protected_fields = chunk.protected_fields;
        protected_tags = chunk.protected_tags;
    }

    let json_ids: HashSet<&str> = notes_from_json.iter().map(|n| n.ah_nid.as_str()).collect();
    let filtered_csv: Vec<NoteInfo> = notes_from_csv
        .into_iter()
        .filter(|n| !json_ids.contains(n.ah_nid.as_str()))
        .collect();

    let mut notes = notes_from_json;
    notes.extend(filtered_csv);

    DeckUpdates {
        notes,
        latest_update,
        protected_fields,
        protected_tags,
    }
}

fn max_watermark(current: Option<String>, candidate: Option<String>) -> Option<String> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(std::cmp::max(a, b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LastUpdateType;

    fn note(id: &str, deleted: bool) -> NoteInfo {
        NoteInfo {
            ah_nid: id.to_string(),
            anki_id: 1,
            note_type_id: 1,
            fields: vec![],
            tags: vec![],
            last_update_type: deleted.then_some(LastUpdateType::Delete),
            extra: HashMap::new(),
        }
    }

    #[test]
    fn json_wins_over_csv_for_shared_ids() {
        let snapshot = DeckUpdatesChunk {
            notes: vec![note("a", false), note("b", false), note("c", false)],
            latest_update: Some("T0".to_string()),
            from_csv: true,
            ..Default::default()
        };
        let delta = DeckUpdatesChunk {
            notes: vec![note("b", true)],
            latest_update: Some("T1".to_string()),
            from_csv: false,
            ..Default::default()
        };

        let merged = merge_chunks(vec![snapshot, delta]);

        assert_eq!(merged.notes.len(), 3);
        assert_eq!(merged.notes[0].ah_nid, "b");
        assert_eq!(merged.notes[0].last_update_type, Some(LastUpdateType::Delete));
        assert!(merged.notes.iter().skip(1).any(|n| n.ah_nid == "a"));
        assert!(merged.notes.iter().skip(1).any(|n| n.ah_nid == "c"));
    }

    #[test]
    fn watermark_is_max_of_all_chunks() {
        let chunks = vec![
            DeckUpdatesChunk {
                latest_update: Some("2024-01-01T00:00:00.000000".to_string()),
                ..Default::default()
            },
            DeckUpdatesChunk {
                latest_update: Some("2024-06-01T00:00:00.000000".to_string()),
                ..Default::default()
            },
            DeckUpdatesChunk {
                latest_update: Some("2024-03-01T00:00:00.000000".to_string()),
                ..Default::default()
            },
        ];
        let merged = merge_chunks(chunks);
        assert_eq!(
            merged.latest_update.as_deref(),
            Some("2024-06-01T00:00:00.000000")
        );
    }

    #[test]
    fn watermark_absent_when_no_chunk_has_one() {
        let merged = merge_chunks(vec![DeckUpdatesChunk::default(), DeckUpdatesChunk::default()]);
        assert_eq!(merged.latest_update, None);
    }

    #[test]
    fn protection_metadata_is_last_chunk_wins_even_if_empty() {
        let mut fields_a = HashMap::new();
        fields_a.insert(1, vec!["Front".to_string()]);

        let chunks = vec![
            DeckUpdatesChunk {
                protected_fields: fields_a,
                protected_tags: vec!["marked".to_string()],
                ..Default::default()
            },
            DeckUpdatesChunk::default(),
        ];
        let merged = merge_chunks(chunks);
        assert!(merged.protected_fields.is_empty());
        assert!(merged.protected_tags.is_empty());
    }
}
