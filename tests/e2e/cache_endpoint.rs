//! The cache-serving endpoint over real HTTP.

use super::harness::CacheServer;
use fedfetch::fetch::url_in_cache;
use fedfetch::server::StoredDocument;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use reqwest::StatusCode;

const URI: &str = "https://a.example/statuses/1";

async fn get(url: &str) -> reqwest::Response {
    reqwest::get(url).await.unwrap()
}

fn header<'a>(response: &'a reqwest::Response, name: reqwest::header::HeaderName) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Test 1: a stored signed copy is served with a long private lifetime.
#[tokio::test]
async fn test_serves_signed_copy() {
    let cache = CacheServer::start().await.unwrap();
    cache
        .store()
        .insert(URI, StoredDocument::signed(r#"{"id":"https://a.example/statuses/1"}"#));

    let response = get(&url_in_cache(&cache.base_url(), URI).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, CONTENT_TYPE), Some("application/activity+json"));
    assert_eq!(header(&response, CACHE_CONTROL), Some("private, max-age=259200"));
    assert_eq!(
        response.text().await.unwrap(),
        r#"{"id":"https://a.example/statuses/1"}"#
    );
}

/// Test 2: unknown, deleted and unsigned subjects are all 404.
#[tokio::test]
async fn test_missing_subjects() {
    let cache = CacheServer::start().await.unwrap();
    cache.store().insert("https://a.example/unsigned", StoredDocument::default());
    cache.store().insert("https://a.example/deleted", StoredDocument::signed("{}"));
    assert!(cache.store().mark_deleted("https://a.example/deleted"));

    for uri in ["https://a.example/unknown", "https://a.example/unsigned", "https://a.example/deleted"] {
        let response = get(&url_in_cache(&cache.base_url(), uri).unwrap()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(header(&response, CACHE_CONTROL), Some("public, max-age=180"));
    }
}

/// Test 3: a lookup without a URI is a 404.
#[tokio::test]
async fn test_missing_uri() {
    let cache = CacheServer::start().await.unwrap();
    for path in ["/get_from_cache", "/get_from_cache/"] {
        let response = get(&cache.url(path)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
        assert_eq!(header(&response, CACHE_CONTROL), Some("public, max-age=180"));
    }
}

/// Test 4: a URI that does not decode is a 400.
#[tokio::test]
async fn test_undecodable_uri() {
    let cache = CacheServer::start().await.unwrap();
    let response = get(&cache.url("/get_from_cache/https:%2F%2Fa.example%2F%FF%FE")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(header(&response, CACHE_CONTROL), Some("public, max-age=180"));
}
