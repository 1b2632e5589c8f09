//! Resolution through the real HTTP transport.

use super::harness::{dead_origin, keys, CacheServer, OriginServer, Route};
use fedfetch::config::FetchConfig;
use fedfetch::fetch::url_in_cache;
use fedfetch::server::StoredDocument;
use fedfetch::{
    Error, FetchSource, HttpTransport, LinkedDataSignature, ResolverBuilder, ResolverConfig,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn actor(origin: &OriginServer, name: &str, key: usize) -> Value {
    let id = origin.url(&format!("/users/{name}"));
    json!({
        "@context": ["https://www.w3.org/ns/activitystreams", "https://w3id.org/security/v1"],
        "id": id,
        "type": "Person",
        "inbox": format!("{id}/inbox"),
        "publicKey": { "id": format!("{id}#main-key"), "owner": id, "publicKeyPem": keys::public_pem(key) },
    })
}

fn config(dir: &TempDir) -> ResolverConfig {
    let mut config = ResolverConfig::default();
    config.trust.min_verifiers = Some(1);
    config.trust.verifiers_file = Some(dir.path().join("verifiers.json"));
    config.fetch.timeout_secs = 1;
    config
}

fn resolver_with(config: ResolverConfig) -> fedfetch::Resolver {
    let transport = Arc::new(HttpTransport::new(&config.fetch).unwrap());
    ResolverBuilder::new(config).with_transport(transport).build().unwrap()
}

/// Test 1: an actor is fetched directly with content negotiation.
#[tokio::test]
async fn test_direct_actor() {
    let origin = OriginServer::start().await.unwrap();
    let alice = actor(&origin, "alice", 0);
    origin.route("/users/alice", Route::activity(&alice));
    let dir = TempDir::new().unwrap();
    let resolver = resolver_with(config(&dir));

    let outcome = resolver
        .resolve(&origin.url("/users/alice"), None)
        .await
        .unwrap()
        .expect("actor resolved");
    assert_eq!(outcome.resolved_uri, alice["id"]);
    assert_eq!(outcome.source, FetchSource::Origin);
    assert_eq!(outcome.json().unwrap(), alice);
}

/// Test 2: an HTML profile page leads to its activity representation.
#[tokio::test]
async fn test_html_alternate() {
    let origin = OriginServer::start().await.unwrap();
    let alice = actor(&origin, "alice", 0);
    origin.route("/users/alice", Route::activity(&alice));
    origin.route(
        "/@alice",
        Route::html(
            r#"<!doctype html><html><head>
            <link rel="alternate" type="application/activity+json" href="/users/alice">
            </head><body>Alice</body></html>"#,
        ),
    );
    let dir = TempDir::new().unwrap();
    let resolver = resolver_with(config(&dir));

    let outcome = resolver
        .resolve(&origin.url("/@alice"), None)
        .await
        .unwrap()
        .expect("found via alternate link");
    assert_eq!(outcome.resolved_uri, alice["id"]);
}

/// Test 3: a Link header wins over the HTML body.
#[tokio::test]
async fn test_link_header() {
    let origin = OriginServer::start().await.unwrap();
    let note_id = origin.url("/statuses/1");
    origin.route(
        "/statuses/1",
        Route::activity(&json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "id": note_id,
            "type": "Note",
            "content": "hello",
        })),
    );
    origin.route(
        "/@alice/1",
        Route::html(r#"<link rel="alternate" type="application/activity+json" href="/nowhere">"#)
            .with_link(&format!(
                r#"<{note_id}>; rel="alternate"; type="application/activity+json""#
            )),
    );
    let dir = TempDir::new().unwrap();
    let resolver = resolver_with(config(&dir));

    let outcome = resolver
        .resolve(&origin.url("/@alice/1"), None)
        .await
        .unwrap()
        .expect("found via Link header");
    assert_eq!(outcome.resolved_uri, note_id);
}

/// Test 4: HTML pointing at more HTML is not followed a second time.
#[tokio::test]
async fn test_single_hop() {
    let origin = OriginServer::start().await.unwrap();
    origin.route(
        "/one",
        Route::html(r#"<link rel="alternate" type="application/activity+json" href="/two">"#),
    );
    origin.route(
        "/two",
        Route::html(r#"<link rel="alternate" type="application/activity+json" href="/three">"#),
    );
    origin.route("/three", Route::activity(&actor(&origin, "three", 0)));
    let dir = TempDir::new().unwrap();
    let resolver = resolver_with(config(&dir));

    assert!(resolver.resolve(&origin.url("/one"), None).await.unwrap().is_none());
}

/// Test 5: a body over the ceiling is rejected, not truncated.
#[tokio::test]
async fn test_body_ceiling() {
    let origin = OriginServer::start().await.unwrap();
    let mut big = actor(&origin, "big", 0);
    big["summary"] = json!("x".repeat(4096));
    origin.route("/users/big", Route::activity(&big));

    let fetch = FetchConfig {
        max_body_bytes: 1024,
        ..FetchConfig::default()
    };
    let transport = HttpTransport::new(&fetch).unwrap();
    let err = fedfetch::fetch::fetch_json(&transport, &origin.url("/users/big"), &fetch.accept)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BodyTooLarge { limit: 1024, .. }));
}

/// Test 6: a slow origin times out and the failure surfaces without a cache.
#[tokio::test]
async fn test_timeout_surfaces() {
    let origin = OriginServer::start().await.unwrap();
    origin.route(
        "/users/slow",
        Route::activity(&actor(&origin, "slow", 0)).with_delay(Duration::from_secs(3)),
    );
    let dir = TempDir::new().unwrap();
    let resolver = resolver_with(config(&dir));

    let err = resolver
        .resolve(&origin.url("/users/slow"), None)
        .await
        .unwrap_err();
    assert!(err.is_transport());
    assert_eq!(resolver.fetch_stats().failures, 1);
}

/// Test 7: an unreachable origin is replaced by a signed cache copy.
#[tokio::test]
async fn test_cache_fallback() {
    let keys_host = OriginServer::start().await.unwrap();
    let alice = actor(&keys_host, "alice", 0);
    keys_host.route("/users/alice", Route::activity(&alice));
    let alice_id = alice["id"].as_str().unwrap().to_string();

    let original = format!("{}/statuses/1", dead_origin().await.unwrap());
    let activity = json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "id": format!("{original}/activity"),
        "type": "Create",
        "actor": alice_id,
        "object": { "id": original, "type": "Note", "attributedTo": alice_id },
    });
    let signed = LinkedDataSignature::sign(
        &activity,
        &format!("{alice_id}#main-key"),
        keys::private(0),
        "2024-05-01T12:00:00Z",
    )
    .unwrap();

    let cache = CacheServer::start().await.unwrap();
    cache.store().insert(original.clone(), StoredDocument::signed(signed.to_string()));

    let dir = TempDir::new().unwrap();
    let resolver = resolver_with(config(&dir));

    let outcome = resolver
        .resolve(&original, Some(&cache.base_url()))
        .await
        .unwrap()
        .expect("served from cache");
    assert!(outcome.is_from_cache());
    assert_eq!(outcome.json().unwrap()["object"]["id"], original);
    assert_eq!(outcome.auxiliary.unwrap()["cache_host"], cache.base_url());
}

/// Test 8: a cache copy signed by someone else is refused and the origin
/// failure is reported.
#[tokio::test]
async fn test_cache_forgery_refused() {
    let keys_host = OriginServer::start().await.unwrap();
    let alice = actor(&keys_host, "alice", 0);
    let mallory = actor(&keys_host, "mallory", 1);
    keys_host.route("/users/alice", Route::activity(&alice));
    keys_host.route("/users/mallory", Route::activity(&mallory));
    let alice_id = alice["id"].as_str().unwrap();
    let mallory_id = mallory["id"].as_str().unwrap();

    let original = format!("{}/statuses/1", dead_origin().await.unwrap());
    let activity = json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "id": format!("{original}/activity"),
        "type": "Create",
        "actor": alice_id,
        "object": { "id": original, "type": "Note", "attributedTo": alice_id },
    });
    let signed = LinkedDataSignature::sign(
        &activity,
        &format!("{mallory_id}#main-key"),
        keys::private(1),
        "2024-05-01T12:00:00Z",
    )
    .unwrap();

    let cache = CacheServer::start().await.unwrap();
    cache.store().insert(original.clone(), StoredDocument::signed(signed.to_string()));
    assert!(url_in_cache(&cache.base_url(), &original).is_some());

    let dir = TempDir::new().unwrap();
    let resolver = resolver_with(config(&dir));

    let err = resolver
        .resolve(&original, Some(&cache.base_url()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Network(_)));
    assert_eq!(resolver.fetch_stats().cache_rejections, 1);
}

/// Test 9: relative alternate links resolve against the page reached after
/// redirects.
#[tokio::test]
async fn test_relative_alternate_after_redirect() {
    let origin = OriginServer::start().await.unwrap();
    let alice = actor(&origin, "alice", 0);
    origin.route("/@alice", Route::redirect("/profiles/alice/"));
    origin.route(
        "/profiles/alice/",
        Route::html(r#"<link rel="alternate" type="application/activity+json" href="feed.json">"#),
    );
    origin.route("/profiles/alice/feed.json", Route::activity(&alice));
    let dir = TempDir::new().unwrap();
    let resolver = resolver_with(config(&dir));

    let outcome = resolver
        .resolve(&origin.url("/@alice"), None)
        .await
        .unwrap()
        .expect("alternate resolved against the redirected page");
    assert_eq!(outcome.resolved_uri, alice["id"]);
}

/// Test 10: a timed-out origin is replaced by a signed cache copy.
#[tokio::test]
async fn test_timeout_falls_back_to_cache() {
    let origin = OriginServer::start().await.unwrap();
    let alice = actor(&origin, "alice", 0);
    origin.route("/users/alice", Route::activity(&alice));
    let alice_id = alice["id"].as_str().unwrap().to_string();

    let original = origin.url("/statuses/slow");
    let activity = json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "id": format!("{original}/activity"),
        "type": "Create",
        "actor": alice_id,
        "object": { "id": original, "type": "Note", "attributedTo": alice_id },
    });
    origin.route(
        "/statuses/slow",
        Route::activity(&activity["object"]).with_delay(Duration::from_secs(3)),
    );
    let signed = LinkedDataSignature::sign(
        &activity,
        &format!("{alice_id}#main-key"),
        keys::private(0),
        "2024-05-01T12:00:00Z",
    )
    .unwrap();

    let cache = CacheServer::start().await.unwrap();
    cache.store().insert(original.clone(), StoredDocument::signed(signed.to_string()));

    let dir = TempDir::new().unwrap();
    let resolver = resolver_with(config(&dir));

    let outcome = resolver
        .resolve(&original, Some(&cache.base_url()))
        .await
        .unwrap()
        .expect("cache stands in for the slow origin");
    assert!(outcome.is_from_cache());
    let stats = resolver.fetch_stats();
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.cache_hits, 1);
}
