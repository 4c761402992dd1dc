//! Error taxonomy for the sync client.
//!
//! Spec's four-and-a-half error kinds (not-authenticated,
//! configuration-missing, transport failure, HTTP error, protocol/decode
//! error) map directly onto [`ClientError`]'s variants. The reconciler and
//! callers match on these variants rather than on string messages.

use thiserror::Error;

/// The service's parsed `{error, message}` error body, when present.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceError {
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// An API call requiring a token was made with none configured.
    #[error("not authenticated: call login() first")]
    NotAuthenticated,

    /// A call needed configuration (storage bucket URL, media directory
    /// resolver) that was never supplied.
    #[error("missing configuration: {0}")]
    ConfigurationMissing(&'static str),

    /// Connection or read-timeout failure, after the retry budget was
    /// exhausted.
    #[error("transport failure after retries: {0}")]
    Transport(#[source] reqwest::Error),

    /// An HTTP response outside the endpoint's expected status set.
    #[error("unexpected HTTP status {status}{}", .service.as_ref().map(|e| format!(": {e:?}")).unwrap_or_default())]
    Http {
        status: reqwest::StatusCode,
        service: Option<ServiceError>,
    },

    /// The wire payload could not be decoded: missing `notes`/
    /// `external_notes_url` on a delta page, or a Base85/gzip/JSON/CSV
    /// decode failure.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The request body could not be built or the response JSON could not
    /// be deserialized into the expected shape.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
