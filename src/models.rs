//! Wire and domain types shared across the sync engine.
//!
//! `NoteInfo`, `DeckUpdatesChunk` and `DeckUpdates` are the core entities of
//! the deck-update reconciler (see [`crate::sync`]); the rest are produced
//! by the thin catalog/administrative endpoints.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The service's timestamp encoding: an ISO-8601-like format with
/// microsecond precision. The client treats it as an opaque string and
/// round-trips it verbatim between `latest_update` and `since`.
pub const DATETIME_FORMAT_STR: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// A note's relation to the remote update, carried as a tag-like marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastUpdateType {
    Create,
    Update,
    Delete,
}

/// The user's relation to a deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserDeckRelation {
    Subscribed,
    Owned,
    None,
}

/// A named collection of notes belonging to a single owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub id: String,
    pub name: String,
    pub owner: Option<String>,
    #[serde(default)]
    pub user_relation: Option<UserDeckRelation>,
}

/// A canonical note, normalized from either the CSV snapshot or a JSON
/// delta page by [`crate::codec::normalize_notes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteInfo {
    /// The note's stable identity (`ah_nid` in spec terms).
    pub ah_nid: String,
    pub anki_id: i64,
    pub note_type_id: i64,
    /// Ordered field name -> value pairs; order matters to the editor.
    pub fields: Vec<(String, serde_json::Value)>,
    pub tags: Vec<String>,
    pub last_update_type: Option<LastUpdateType>,
    /// Any other keys the service sent, preserved verbatim.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// One page of the deck-update stream, as yielded by the pagination driver
/// before the reconciler folds it into aggregate state.
#[derive(Debug, Clone, Default)]
pub struct DeckUpdatesChunk {
    pub notes: Vec<NoteInfo>,
    pub latest_update: Option<String>,
    pub protected_fields: HashMap<i64, Vec<String>>,
    pub protected_tags: Vec<String>,
    pub from_csv: bool,
    pub external_notes_url: Option<String>,
    pub next: Option<String>,
}

/// The merged result of one `get_deck_updates` sync run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeckUpdates {
    pub notes: Vec<NoteInfo>,
    pub latest_update: Option<String>,
    pub protected_fields: HashMap<i64, Vec<String>>,
    pub protected_tags: Vec<String>,
}

/// A single media asset descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckMedia {
    pub name: String,
    pub hash: Option<String>,
    #[serde(default)]
    pub referencing_notes: Vec<String>,
}

/// One page of the media-update stream, as parsed directly from the wire
/// (see [`crate::media::get_deck_media_updates`]).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeckMediaUpdateChunk {
    #[serde(default)]
    pub media: Vec<DeckMedia>,
    pub next: Option<String>,
}

/// A per-note tag overlay contributed by a deck extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteCustomization {
    pub ah_nid: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One page of the extension-update stream, as parsed directly from the
/// wire (see [`crate::extensions::get_deck_extension_updates`]).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeckExtensionUpdateChunk {
    #[serde(default)]
    pub note_customizations: Vec<NoteCustomization>,
    pub next: Option<String>,
}

/// A deck extension (a named set of optional tags a user opted into).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckExtension {
    pub id: i64,
    pub name: String,
    pub deck_id: String,
    pub owner_id: Option<String>,
}

/// A pending action the host should apply to local notes (e.g. unsuspend).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotesAction {
    pub ah_nid: String,
    pub action: String,
}

/// Result of a successful `login` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResult {
    pub access_token: String,
    pub user_id: Option<String>,
    pub email: Option<String>,
}
