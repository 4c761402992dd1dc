//! Generic cursor-following pagination driver (spec §4.3).
//!
//! Parameterized by an initial path and initial query parameters. Attaches
//! the initial parameters only on the first request; every later page is
//! fetched by following the opaque `next` cursor the service returns,
//! after rewriting an absolute `next` URL down to a path suffix. The
//! driver knows nothing about payload shape — callers supply a page
//! parser and get back a lazy, non-restartable stream (spec §5, §9).

use std::sync::Arc;

use async_stream::try_stream;
use futures_core::stream::Stream;
use reqwest::Method;
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::token::TokenCell;
use crate::transport::{Api, SendOptions, Transport};

/// Rewrite an absolute `next` URL to a path suffix, per spec §4.3/§9.
///
/// If `next` contains the substring `/api`, everything up to and
/// including the first occurrence is stripped and the remainder is used
/// as the next path suffix. If `next` does not contain `/api`, it is
/// returned completely unchanged (including scheme and host) — this is a
/// deliberate preservation of a source quirk (spec §9, open question):
/// such a `next` is used verbatim on the following request, which only
/// works correctly if the driver treats it as a full URL rather than a
/// suffix relative to the service's base. Implementations must not
/// "fix" this by normalizing it away.
pub fn rewrite_next(next: &str) -> String {
    match next.find("/api") {
        Some(idx) => next[idx + "/api".len()..].to_string(),
        None => next.to_string(),
    }
}

/// One page's worth of caller-visible data plus the opaque cursor the
/// driver needs to continue.
pub trait Page: Sized {
    fn next_cursor(&self) -> Option<&str>;
}

/// Drive the cursor loop against `path`, attaching `initial_params` only
/// on the first request, and parsing each page's raw JSON body with
/// `parse`. Yields pages lazily; stops when a page's `next` is null.
pub fn paginate<T, F>(
    transport: Arc<Transport>,
    token: TokenCell,
    path: String,
    initial_params: Vec<(String, String)>,
    long_running: bool,
    parse: F,
) -> impl Stream<Item = Result<T>>
where
    T: Page + 'static,
    F: Fn(Value) -> Result<T> + 'static,
{
    try_stream! {
        let mut path = path;
        let mut first = true;

        loop {
            let params: Option<Vec<(&str, String)>> = if first {
                Some(
                    initial_params
                        .iter()
                        .map(|(k, v)| (k.as_str(), v.clone()))
                        .collect(),
                )
            } else {
                None
            };

            let response = transport
                .send::<()>(
                    Method::GET,
                    Api::Service,
                    &path,
                    &token,
                    SendOptions {
                        json: None,
                        params: params.as_deref(),
                        long_running,
                    },
                )
                .await?;

            if !response.status().is_success() {
                Err(Transport::http_error(response).await)?;
            }

            let body: Value = response
                .json()
                .await
                .map_err(ClientError::Transport)?;

            let page = parse(body)?;
            let next = page.next_cursor().map(rewrite_next);

            yield page;

            first = false;
            match next {
                Some(n) => path = n,
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_everything_up_to_and_including_first_api_occurrence() {
        assert_eq!(
            rewrite_next("https://host/api/decks/X/updates?cursor=a"),
            "/decks/X/updates?cursor=a"
        );
    }

    #[test]
    fn strips_only_the_first_api_occurrence() {
        assert_eq!(
            rewrite_next("https://host/api/decks/api/updates"),
            "/decks/api/updates"
        );
    }

    #[test]
    fn urls_without_api_are_used_verbatim() {
        let next = "https://other-host.example/decks/X/updates?cursor=a";
        assert_eq!(rewrite_next(next), next);
    }
}
