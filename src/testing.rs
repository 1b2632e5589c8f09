//! Test doubles shared by unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::error::{Error, Result};
use crate::fetch::{HttpResponse, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Scripted reply for one URL.
#[derive(Clone)]
enum Reply {
    Response(HttpResponse),
    Timeout,
    Refused,
}

/// Transport that answers from a fixed routing table and records requests.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn route(&self, url: &str, reply: Reply) {
        self.routes.lock().insert(url.to_string(), reply);
    }

    pub fn respond(&self, url: &str, status: u16, content_type: &str, link: Option<&str>, body: &str) {
        self.route(
            url,
            Reply::Response(HttpResponse {
                url: url.to_string(),
                status,
                content_type: Some(content_type.to_string()),
                link: link.map(str::to_string),
                body: Bytes::from(body.to_string()),
            }),
        );
    }

    pub fn json(&self, url: &str, value: &Value) {
        self.respond(url, 200, "application/activity+json", None, &value.to_string());
    }

    pub fn html(&self, url: &str, body: &str) {
        self.respond(url, 200, "text/html; charset=utf-8", None, body);
    }

    pub fn status(&self, url: &str, status: u16) {
        self.respond(url, status, "text/plain", None, "");
    }

    pub fn timeout(&self, url: &str) {
        self.route(url, Reply::Timeout);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn accept_for(&self, url: &str) -> Option<String> {
        self.requests
            .lock()
            .iter()
            .find(|(u, _)| u == url)
            .map(|(_, accept)| accept.clone())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str, accept: &str) -> Result<HttpResponse> {
        self.requests
            .lock()
            .push((url.to_string(), accept.to_string()));
        let reply = self.routes.lock().get(url).cloned().unwrap_or(Reply::Refused);
        match reply {
            Reply::Response(response) => Ok(response),
            Reply::Timeout => Err(Error::Timeout(url.to_string())),
            Reply::Refused => Err(Error::Network(format!("GET {url}: connection refused"))),
        }
    }
}

/// Deterministic RSA test keys, generated once per test binary.
pub fn test_key(index: usize) -> &'static RsaPrivateKey {
    static KEYS: OnceLock<Vec<RsaPrivateKey>> = OnceLock::new();
    let keys = KEYS.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        (0..4)
            .map(|_| RsaPrivateKey::new(&mut rng, 1024).expect("generate test key"))
            .collect()
    });
    &keys[index]
}

pub fn public_pem(key: &RsaPrivateKey) -> String {
    RsaPublicKey::from(key)
        .to_public_key_pem(LineEnding::LF)
        .expect("encode public key")
}
