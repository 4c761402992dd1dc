//! Single HTTP invocation point.
//!
//! Generalizes the teacher's `ConnectionInfo::request` /
//! `execute_request_with_auth_retry` (see `examples/calimero-network-core`)
//! to spec §4.1's contract: two base URLs (service API vs. signed-storage
//! bucket), bearer auth injected only for the service API, two timeout
//! tiers, and a fixed 3-attempt/2s-delay retry that fires only on
//! connection-establishment failure or read timeout.

use std::time::Duration;

use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ClientError, Result, ServiceError};
use crate::token::TokenCell;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);
const STANDARD_READ_TIMEOUT: Duration = Duration::from_secs(30);
const LONG_READ_TIMEOUT: Duration = Duration::from_secs(600);

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Which base URL a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Api {
    /// The sync service's API. Carries `Authorization: Bearer <token>`.
    Service,
    /// A pre-signed storage URL (snapshot download, media fetch). Never
    /// carries an auth header.
    Storage,
}

/// Per-call overrides for [`Transport::send`].
#[derive(Default)]
pub struct SendOptions<'a, J: Serialize> {
    pub json: Option<&'a J>,
    pub params: Option<&'a [(&'a str, String)]>,
    pub long_running: bool,
}

/// Set of HTTP status codes a caller treats as success for one endpoint.
/// Anything else becomes [`ClientError::Http`].
pub fn is_expected(status: StatusCode, expected: &[StatusCode]) -> bool {
    expected.contains(&status)
}

#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
    service_base: Url,
    storage_base: Option<Url>,
}

impl Transport {
    pub fn new(service_base: Url, storage_base: Option<Url>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECTION_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            service_base,
            storage_base,
        }
    }

    pub fn storage_base(&self) -> Option<&Url> {
        self.storage_base.as_ref()
    }

    fn build_url(&self, api: Api, suffix: &str) -> Result<Url> {
        match api {
            Api::Service => join_suffix(&self.service_base, suffix),
            Api::Storage => {
                let base = self
                    .storage_base
                    .as_ref()
                    .ok_or(ClientError::ConfigurationMissing("storage bucket URL"))?;
                join_suffix(base, suffix)
            }
        }
    }

    /// Send one logical request, retrying transient connect/timeout
    /// failures up to [`MAX_ATTEMPTS`] times with a fixed [`RETRY_DELAY`]
    /// between attempts. Non-transient failures (including any HTTP
    /// status) return on the first attempt.
    pub async fn send<J: Serialize>(
        &self,
        method: Method,
        api: Api,
        suffix: &str,
        token: &TokenCell,
        opts: SendOptions<'_, J>,
    ) -> Result<reqwest::Response> {
        let url = self.build_url(api, suffix)?;
        let timeout = if opts.long_running {
            LONG_READ_TIMEOUT
        } else {
            STANDARD_READ_TIMEOUT
        };

        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut builder = self
                .client
                .request(method.clone(), url.clone())
                .timeout(timeout)
                .header("Content-Type", "application/json");

            if matches!(api, Api::Service) {
                if let Some(auth) = token.auth_header() {
                    builder = builder.header("Authorization", auth);
                }
            }
            if let Some(params) = opts.params {
                builder = builder.query(params);
            }
            if let Some(json) = opts.json {
                builder = builder.json(json);
            }

            debug!(%url, attempt, "sending request");
            match builder.send().await {
                Ok(response) => return Ok(response),
                Err(err) if is_transient(&err) && attempt < MAX_ATTEMPTS => {
                    warn!(%url, attempt, error = %err, "transient transport failure, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
                Err(err) if is_transient(&err) => {
                    return Err(ClientError::Transport(err));
                }
                Err(err) => return Err(ClientError::Transport(err)),
            }
        }
    }

    /// Parse a non-2xx response into [`ClientError::Http`], best-effort
    /// decoding the service's `{error, message}` body.
    pub async fn http_error(response: reqwest::Response) -> ClientError {
        let status = response.status();
        let service = response
            .json::<ErrorBody>()
            .await
            .ok()
            .map(|body| ServiceError {
                code: body.error,
                message: body.message,
            });
        ClientError::Http { status, service }
    }

    pub fn connection_timeout() -> Duration {
        CONNECTION_TIMEOUT
    }

    /// Send a GET against a fully-qualified URL (a pre-signed snapshot or
    /// media URL), never attaching an auth header. Same retry policy as
    /// [`Transport::send`].
    pub async fn send_signed(&self, url: &Url, long_running: bool) -> Result<reqwest::Response> {
        let timeout = if long_running {
            LONG_READ_TIMEOUT
        } else {
            STANDARD_READ_TIMEOUT
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(%url, attempt, "sending signed-URL request");
            match self.client.get(url.clone()).timeout(timeout).send().await {
                Ok(response) => return Ok(response),
                Err(err) if is_transient(&err) && attempt < MAX_ATTEMPTS => {
                    warn!(%url, attempt, error = %err, "transient transport failure, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
                Err(err) => return Err(ClientError::Transport(err)),
            }
        }
    }
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Only connection-establishment failures and read timeouts are transient
/// per spec §4.1; everything else (including status codes, which never
/// surface as `reqwest::Error`) is not retried.
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

fn join_suffix(base: &Url, suffix: &str) -> Result<Url> {
    let mut s = suffix.to_string();
    if !s.starts_with('/') {
        s = format!("/{s}");
    }
    let joined = format!(
        "{}{}",
        base.as_str().trim_end_matches('/'),
        s
    );
    Url::parse(&joined).map_err(|e| ClientError::Protocol(format!("invalid URL {joined}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_suffix_handles_missing_leading_slash() {
        let base = Url::parse("https://service.example/api").unwrap();
        assert_eq!(
            join_suffix(&base, "decks/x/updates").unwrap().as_str(),
            "https://service.example/api/decks/x/updates"
        );
    }

    #[test]
    fn join_suffix_preserves_query_string_in_suffix() {
        let base = Url::parse("https://service.example/api").unwrap();
        assert_eq!(
            join_suffix(&base, "/decks/x/updates?cursor=a").unwrap().as_str(),
            "https://service.example/api/decks/x/updates?cursor=a"
        );
    }

    /// P6: at most 3 attempts total, with a fixed 2s delay between them,
    /// on a connection-establishment failure. Port 0 is never listened on
    /// by a real service, so every connect attempt fails immediately
    /// (no real wait); `start_paused` makes the two inter-attempt sleeps
    /// resolve without the test itself waiting 4 real seconds, while still
    /// accounting for the elapsed virtual time.
    #[tokio::test(start_paused = true)]
    async fn retries_at_most_three_times_with_two_second_delay_on_connect_failure() {
        let transport = Transport::new(Url::parse("http://127.0.0.1:0").unwrap(), None);
        let token = TokenCell::default();

        let start = tokio::time::Instant::now();
        let result = transport
            .send::<()>(
                Method::GET,
                Api::Service,
                "/decks/x/updates",
                &token,
                SendOptions::default(),
            )
            .await;

        assert!(matches!(result, Err(ClientError::Transport(_))));
        assert_eq!(tokio::time::Instant::now() - start, RETRY_DELAY * 2);
    }
}
