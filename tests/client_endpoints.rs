//! End-to-end coverage for the thin catalog wrappers on [`DeckSyncClient`]
//! that have interesting status-code handling (spec §6, §8 scenario 6).

mod support;

use flashsync_client::{ClientConfig, ClientError, DeckSyncClient};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> DeckSyncClient {
    let mut config = ClientConfig::new(server.uri().parse().unwrap());
    config.token = Some("tok".to_string());
    DeckSyncClient::new(config)
}

#[tokio::test]
async fn unsubscribe_treats_404_as_idempotent_success() {
    support::init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/decks/deck-a/subscriptions/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.unsubscribe_from_deck("deck-a").await.unwrap();
}

#[tokio::test]
async fn unsubscribe_fails_on_server_error() {
    support::init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/decks/deck-b/subscriptions/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.unsubscribe_from_deck("deck-b").await.unwrap_err();
    assert!(matches!(err, ClientError::Http { .. }));
}

#[tokio::test]
async fn protected_fields_404_is_empty_not_an_error() {
    support::init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/decks/deck-c/protected-fields/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let fields = client.get_protected_fields("deck-c").await.unwrap();
    assert!(fields.is_empty());
}

#[tokio::test]
async fn calls_without_a_token_fail_before_any_http_request() {
    support::init_tracing();
    let server = MockServer::start().await;
    // No mocks registered: if the client attempted any request, wiremock's
    // default 404-for-unregistered-paths behavior would still return a
    // result, not an error here. NotAuthenticated must fire first.
    let config = ClientConfig::new(server.uri().parse().unwrap());
    let client = DeckSyncClient::new(config);

    let err = client.get_deck_subscriptions().await.unwrap_err();
    assert!(matches!(err, ClientError::NotAuthenticated));
}
