//! Client façade: wires transport, token state, codec, pagination,
//! snapshot loader and the deck-update reconciler into the public API
//! (spec §1's "explicitly in scope" list, plus the thin catalog wrappers
//! from §1's "explicitly out of scope" list — see `SPEC_FULL.md` §3).
//!
//! Modeled on the teacher's `Client<A, S>` (`examples/
//! calimero-network-core/crates/client/src/client.rs`), simplified: spec
//! §5 specifies the token as plain per-instance state rather than a
//! pluggable authenticator/storage backend, so this façade owns a single
//! [`TokenCell`] directly instead of the teacher's generic `A`/`S` type
//! parameters.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures_core::stream::Stream;
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::{ClientError, Result};
use crate::extensions::get_deck_extension_updates;
use crate::media::{download_media, get_deck_media_updates};
use crate::models::{
    Deck, DeckExtension, DeckMedia, LoginResult, NoteCustomization, NoteInfo, NotesAction,
};
use crate::sync::{get_deck_updates, SyncCallbacks, SyncOutcome};
use crate::token::TokenCell;
use crate::transport::{Api, SendOptions, Transport};

pub const DEFAULT_API_URL: &str = "https://sync.example.invalid/functions/v1/addon-auth";

/// Configuration surface (spec §6): token, two base URLs, a local media
/// directory resolver. No environment-variable contract, no CLI.
pub struct ClientConfig {
    pub token: Option<String>,
    pub api_url: Url,
    pub storage_bucket_url: Option<Url>,
    pub local_media_dir: Option<Arc<dyn Fn() -> PathBuf + Send + Sync>>,
}

impl ClientConfig {
    pub fn new(api_url: Url) -> Self {
        Self {
            token: None,
            api_url,
            storage_bucket_url: None,
            local_media_dir: None,
        }
    }
}

pub struct DeckSyncClient {
    transport: Arc<Transport>,
    token: TokenCell,
    local_media_dir: Option<Arc<dyn Fn() -> PathBuf + Send + Sync>>,
}

impl DeckSyncClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            transport: Arc::new(Transport::new(config.api_url, config.storage_bucket_url)),
            token: TokenCell::new(config.token),
            local_media_dir: config.local_media_dir,
        }
    }

    fn require_token(&self) -> Result<()> {
        if self.token.get().is_none() {
            return Err(ClientError::NotAuthenticated);
        }
        Ok(())
    }

    async fn expect<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        json: Option<&impl Serialize>,
        expected: &[StatusCode],
    ) -> Result<T> {
        let response = self
            .transport
            .send(
                method,
                Api::Service,
                path,
                &self.token,
                SendOptions {
                    json,
                    params: None,
                    long_running: false,
                },
            )
            .await?;

        let status = response.status();
        if !expected.contains(&status) {
            return Err(Transport::http_error(response).await);
        }
        response.json::<T>().await.map_err(ClientError::Transport)
    }

    // ---- Authentication -------------------------------------------------

    pub async fn login(&mut self, email: &str, password: &str) -> Result<LoginResult> {
        #[derive(Serialize)]
        struct LoginRequest<'a> {
            email: &'a str,
            password: &'a str,
        }

        info!(email, "logging in user");
        let result: LoginResult = self
            .expect(
                Method::POST,
                "/login",
                Some(&LoginRequest { email, password }),
                &[StatusCode::OK],
            )
            .await?;
        self.token.set(result.access_token.clone());
        Ok(result)
    }

    pub fn signout(&mut self) {
        self.token.clear();
        info!("user signed out");
    }

    // ---- Deck catalog (thin wrappers, spec §1/§3 of SPEC_FULL.md) -------

    pub async fn get_deck_subscriptions(&self) -> Result<Vec<Deck>> {
        self.require_token()?;
        self.expect::<Vec<Deck>>(
            Method::GET,
            "/decks/subscriptions/",
            None::<&()>,
            &[StatusCode::OK],
        )
        .await
    }

    pub async fn subscribe_to_deck(&self, deck_id: &str) -> Result<()> {
        self.require_token()?;
        #[derive(Serialize)]
        struct Body<'a> {
            deck: &'a str,
        }
        self.expect::<Value>(
            Method::POST,
            "/decks/subscriptions/",
            Some(&Body { deck: deck_id }),
            &[StatusCode::CREATED],
        )
        .await?;
        Ok(())
    }

    pub async fn unsubscribe_from_deck(&self, deck_id: &str) -> Result<()> {
        self.require_token()?;
        let path = format!("/decks/{deck_id}/subscriptions/");
        let response = self
            .transport
            .send::<()>(
                Method::DELETE,
                Api::Service,
                &path,
                &self.token,
                SendOptions::default(),
            )
            .await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(Transport::http_error(response).await)
    }

    pub async fn get_deck_by_id(&self, deck_id: &str) -> Result<Deck> {
        self.require_token()?;
        let path = format!("/decks/{deck_id}/");
        self.expect::<Deck>(Method::GET, &path, None::<&()>, &[StatusCode::OK]).await
    }

    pub async fn get_protected_fields(&self, deck_id: &str) -> Result<HashMap<i64, Vec<String>>> {
        self.require_token()?;
        let path = format!("/decks/{deck_id}/protected-fields/");
        let response = self
            .transport
            .send::<()>(
                Method::GET,
                Api::Service,
                &path,
                &self.token,
                SendOptions::default(),
            )
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(HashMap::new());
        }
        if !response.status().is_success() {
            return Err(Transport::http_error(response).await);
        }
        #[derive(serde::Deserialize)]
        struct Body {
            #[serde(default)]
            fields: HashMap<String, Vec<String>>,
        }
        let body: Body = response.json().await.map_err(ClientError::Transport)?;
        Ok(body
            .fields
            .into_iter()
            .filter_map(|(k, v)| k.parse::<i64>().ok().map(|id| (id, v)))
            .collect())
    }

    pub async fn get_protected_tags(&self, deck_id: &str) -> Result<Vec<String>> {
        self.require_token()?;
        let path = format!("/decks/{deck_id}/protected-tags/");
        let response = self
            .transport
            .send::<()>(
                Method::GET,
                Api::Service,
                &path,
                &self.token,
                SendOptions::default(),
            )
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(Transport::http_error(response).await);
        }
        #[derive(serde::Deserialize)]
        struct Body {
            #[serde(default)]
            tags: Vec<String>,
        }
        let body: Body = response.json().await.map_err(ClientError::Transport)?;
        Ok(body.tags.into_iter().filter(|t| !t.trim().is_empty()).collect())
    }

    pub async fn get_note_types_dict_for_deck(
        &self,
        deck_id: &str,
    ) -> Result<HashMap<i64, Value>> {
        self.require_token()?;
        let path = format!("/decks/{deck_id}/note-types/");
        let raw: Vec<Value> = self
            .expect(Method::GET, &path, None::<&()>, &[StatusCode::OK])
            .await?;

        let mut result = HashMap::new();
        for note_type in raw {
            let anki_id = note_type
                .get("anki_id")
                .and_then(Value::as_i64)
                .ok_or_else(|| ClientError::Protocol("note type missing anki_id".into()))?;
            result.insert(anki_id, note_type);
        }
        Ok(result)
    }

    pub async fn get_note_by_id(&self, note_id: &str) -> Result<NoteInfo> {
        self.require_token()?;
        let path = format!("/notes/{note_id}");
        self.expect(Method::GET, &path, None::<&()>, &[StatusCode::OK]).await
    }

    pub async fn generate_presigned_url(&self, key: &str, action: &str, many: bool) -> Result<String> {
        self.require_token()?;
        let response = self
            .transport
            .send::<()>(
                Method::GET,
                Api::Service,
                "/decks/generate-presigned-url",
                &self.token,
                SendOptions {
                    json: None::<&()>,
                    params: Some(&[
                        ("key", key.to_string()),
                        ("type", action.to_string()),
                        ("many", many.to_string()),
                    ]),
                    long_running: false,
                },
            )
            .await?;
        if !response.status().is_success() {
            return Err(Transport::http_error(response).await);
        }
        #[derive(serde::Deserialize)]
        struct Body {
            pre_signed_url: Option<String>,
        }
        let body: Body = response.json().await.map_err(ClientError::Transport)?;
        body.pre_signed_url
            .ok_or_else(|| ClientError::Protocol("missing pre_signed_url in response".into()))
    }

    pub async fn get_deck_extensions(&self) -> Result<Vec<DeckExtension>> {
        self.require_token()?;
        #[derive(serde::Deserialize)]
        struct Body {
            #[serde(default)]
            deck_extensions: Vec<DeckExtension>,
        }
        let body: Body = self
            .expect(
                Method::GET,
                "/users/deck_extensions",
                None::<&()>,
                &[StatusCode::OK],
            )
            .await?;
        Ok(body.deck_extensions)
    }

    pub async fn get_deck_extensions_by_deck_id(&self, deck_id: &str) -> Result<Vec<DeckExtension>> {
        self.require_token()?;
        let response = self
            .transport
            .send::<()>(
                Method::GET,
                Api::Service,
                "/users/deck_extensions",
                &self.token,
                SendOptions {
                    json: None::<&()>,
                    params: Some(&[("deck_id", deck_id.to_string())]),
                    long_running: false,
                },
            )
            .await?;
        if !response.status().is_success() {
            return Err(Transport::http_error(response).await);
        }
        #[derive(serde::Deserialize)]
        struct Body {
            #[serde(default)]
            deck_extensions: Vec<DeckExtension>,
        }
        let body: Body = response.json().await.map_err(ClientError::Transport)?;
        Ok(body.deck_extensions)
    }

    pub async fn get_pending_notes_actions_for_deck(&self, deck_id: &str) -> Result<Vec<NotesAction>> {
        self.require_token()?;
        let response = self
            .transport
            .send::<()>(
                Method::GET,
                Api::Service,
                &format!("/decks/{deck_id}/notes-actions/"),
                &self.token,
                SendOptions {
                    json: None,
                    params: None,
                    long_running: true,
                },
            )
            .await?;
        if !response.status().is_success() {
            return Err(Transport::http_error(response).await);
        }
        response.json().await.map_err(ClientError::Transport)
    }

    // ---- The core: deck-update reconciliation ---------------------------

    /// See [`crate::sync::get_deck_updates`].
    #[allow(clippy::too_many_arguments)]
    pub async fn get_deck_updates(
        &self,
        deck_id: &str,
        since: Option<String>,
        download_full_deck: bool,
        callbacks: &SyncCallbacks<'_>,
    ) -> Result<SyncOutcome> {
        self.require_token()?;
        get_deck_updates(
            self.transport.clone(),
            self.token.clone(),
            deck_id,
            since,
            download_full_deck,
            callbacks,
        )
        .await
    }

    pub fn get_deck_media_updates(
        &self,
        deck_id: &str,
        since: Option<String>,
    ) -> Result<impl Stream<Item = Result<Vec<DeckMedia>>>> {
        self.require_token()?;
        Ok(get_deck_media_updates(
            self.transport.clone(),
            self.token.clone(),
            deck_id,
            since,
        ))
    }

    pub fn get_deck_extension_updates(
        &self,
        deck_extension_id: i64,
        since: Option<String>,
        progress_cb: Option<Arc<dyn Fn(usize) + Send + Sync>>,
    ) -> Result<impl Stream<Item = Result<Vec<NoteCustomization>>>> {
        self.require_token()?;
        Ok(get_deck_extension_updates(
            self.transport.clone(),
            self.token.clone(),
            deck_extension_id,
            since,
            progress_cb,
        ))
    }

    pub async fn download_media(&self, media_names: &[String], deck_id: &str) -> Result<()> {
        let resolver = self
            .local_media_dir
            .as_ref()
            .ok_or(ClientError::ConfigurationMissing("local media directory resolver"))?;
        let dir: PathBuf = resolver();
        download_media(&self.transport, &self.token, deck_id, media_names, &dir).await
    }

    /// Exposed for hosts that need to resolve a media path without
    /// downloading (e.g. to check local freshness first).
    pub fn media_dir(&self) -> Result<PathBuf> {
        self.local_media_dir
            .as_ref()
            .map(|f| f())
            .ok_or(ClientError::ConfigurationMissing("local media directory resolver"))
    }

    pub fn media_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.media_dir()?.join(name))
    }
}
