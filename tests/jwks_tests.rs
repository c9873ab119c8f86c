//! JWKS cache integration tests against a mocked key-set endpoint.
//!
//! Covers TTL caching, the single-flight stampede guarantee, forced refresh
//! on key rotation, and fetch-failure behavior with and without a prior set.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::TestKeypair;
use futures::future::join_all;
use hanko_gate::{AuthError, JwksCache};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cache_for(server: &MockServer, ttl: Duration) -> JwksCache {
    JwksCache::new(
        format!("{}/.well-known/jwks.json", server.uri()),
        ttl,
        Duration::from_secs(5),
        Duration::from_secs(2),
    )
}

async fn mount_jwks(server: &MockServer, body: &serde_json::Value, expect: u64) {
    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expect)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_keyset_is_cached_within_ttl() {
    let server = MockServer::start().await;
    let keypair = TestKeypair::new(1, "key-01");
    mount_jwks(&server, &common::jwks_body(&[&keypair]), 1).await;

    let cache = cache_for(&server, Duration::from_secs(3600));

    let first = cache.keyset().await.expect("first fetch");
    let second = cache.keyset().await.expect("cached read");

    assert!(Arc::ptr_eq(&first, &second), "second read must be the cached set");
    assert_eq!(first.len(), 1);
    assert!(first.get("key-01").is_some());
    // MockServer verifies the expect(1) on drop.
}

#[tokio::test]
async fn test_expired_ttl_triggers_refresh() {
    let server = MockServer::start().await;
    let keypair = TestKeypair::new(1, "key-01");
    mount_jwks(&server, &common::jwks_body(&[&keypair]), 2).await;

    let cache = cache_for(&server, Duration::from_secs(0));

    let first = cache.keyset().await.expect("first fetch");
    let second = cache.keyset().await.expect("second fetch");

    assert!(
        !Arc::ptr_eq(&first, &second),
        "zero TTL must produce a fresh set per call"
    );
}

#[tokio::test]
async fn test_stampede_issues_exactly_one_fetch() {
    let server = MockServer::start().await;
    let keypair = TestKeypair::new(1, "key-01");
    // Slow response so every caller piles up behind the in-flight fetch.
    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::jwks_body(&[&keypair]))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(cache_for(&server, Duration::from_secs(3600)));

    let calls = (0..16).map(|_| {
        let cache = Arc::clone(&cache);
        async move { cache.keyset().await }
    });
    let results = join_all(calls).await;

    let first = results
        .first()
        .unwrap()
        .as_ref()
        .expect("stampede caller should succeed");
    for result in &results {
        let set = result.as_ref().expect("every caller should succeed");
        assert!(
            Arc::ptr_eq(first, set),
            "every caller must observe the same key set"
        );
    }
}

#[tokio::test]
async fn test_stampede_shares_the_same_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(cache_for(&server, Duration::from_secs(3600)));

    let calls = (0..8).map(|_| {
        let cache = Arc::clone(&cache);
        async move { cache.keyset().await }
    });
    let results = join_all(calls).await;

    for result in results {
        let err = result.expect_err("every caller should see the failure");
        assert!(matches!(err, AuthError::JwksFetch(_)), "got {err:?}");
    }
}

#[tokio::test]
async fn test_resolve_hits_cached_key() {
    let server = MockServer::start().await;
    let keypair = TestKeypair::new(1, "key-01");
    mount_jwks(&server, &common::jwks_body(&[&keypair]), 1).await;

    let cache = cache_for(&server, Duration::from_secs(3600));

    let jwk = cache.resolve("key-01").await.expect("key should resolve");
    assert_eq!(jwk.kid, "key-01");
    assert_eq!(jwk.kty, "OKP");
}

#[tokio::test]
async fn test_resolve_forces_refresh_on_rotation() {
    let server = MockServer::start().await;
    let old_key = TestKeypair::new(1, "key-01");
    let new_key = TestKeypair::new(2, "key-02");

    mount_jwks(&server, &common::jwks_body(&[&old_key]), 1).await;

    let cache = cache_for(&server, Duration::from_secs(3600));
    cache.keyset().await.expect("prime the cache");

    // Rotate: the endpoint now also publishes the new key.
    server.reset().await;
    mount_jwks(&server, &common::jwks_body(&[&old_key, &new_key]), 1).await;

    let jwk = cache
        .resolve("key-02")
        .await
        .expect("rotated key should resolve after forced refresh");
    assert_eq!(jwk.kid, "key-02");
}

#[tokio::test]
async fn test_resolve_unknown_kid_after_refresh_is_invalid_token() {
    let server = MockServer::start().await;
    let keypair = TestKeypair::new(1, "key-01");
    // Initial fill plus exactly one forced refresh.
    mount_jwks(&server, &common::jwks_body(&[&keypair]), 2).await;

    let cache = cache_for(&server, Duration::from_secs(3600));

    let err = cache.resolve("no-such-key").await.expect_err("must fail");
    assert_eq!(err, AuthError::InvalidToken);
}

#[tokio::test]
async fn test_fetch_error_with_no_prior_set_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let cache = cache_for(&server, Duration::from_secs(3600));

    let err = cache.keyset().await.expect_err("must fail");
    assert!(matches!(err, AuthError::JwksFetch(ref msg) if msg.contains("500")));
}

#[tokio::test]
async fn test_fetch_error_serves_stale_set() {
    let server = MockServer::start().await;
    let keypair = TestKeypair::new(1, "key-01");
    mount_jwks(&server, &common::jwks_body(&[&keypair]), 1).await;

    // Zero TTL so the second call must attempt a refresh.
    let cache = cache_for(&server, Duration::from_secs(0));
    let first = cache.keyset().await.expect("first fetch");

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let second = cache
        .keyset()
        .await
        .expect("stale set should be served through the outage");
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_malformed_body_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let cache = cache_for(&server, Duration::from_secs(3600));

    let err = cache.keyset().await.expect_err("must fail");
    assert!(matches!(err, AuthError::JwksFetch(_)));
}
