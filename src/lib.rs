//! Flashsync client library.
//!
//! A client for incremental synchronization of flashcard decks against a
//! cloud sync service: paginated JSON delta fetches, a gzipped-CSV snapshot
//! fallback, and a merge rule that reconciles the two into one consistent
//! note set. Also covers the deck catalog, media assets and per-user deck
//! extensions the sync engine sits alongside.
//!
//! The six components are split one module per concern:
//!
//! - [`transport`] — the single HTTP invocation point (retry, timeouts, auth)
//! - [`codec`] — Base85/gzip/JSON delta decoding and CSV snapshot decoding
//! - [`pagination`] — the generic cursor-following driver
//! - [`snapshot`] — streaming download of the signed CSV snapshot
//! - [`sync`] — the deck-update reconciler (the core merge algorithm)
//! - [`media`], [`extensions`] — the two sibling update streams
//!
//! [`client::DeckSyncClient`] is the façade gathering all of the above plus
//! the catalog/administrative endpoints into one public API.

pub mod base85;
pub mod client;
pub mod codec;
pub mod error;
pub mod extensions;
pub mod media;
pub mod models;
pub mod pagination;
pub mod snapshot;
pub mod sync;
pub mod token;
pub mod transport;

pub use client::{ClientConfig, DeckSyncClient};
pub use error::{ClientError, Result};
pub use models::{
    Deck, DeckExtension, DeckExtensionUpdateChunk, DeckMedia, DeckMediaUpdateChunk, DeckUpdates,
    LoginResult, NoteCustomization, NoteInfo, NotesAction, UserDeckRelation,
};
pub use sync::{SyncCallbacks, SyncOutcome};
pub use token::TokenCell;

/// Current version of the client library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
