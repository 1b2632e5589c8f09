//! Multi-party verification with verifier keys fetched over HTTP.

use super::harness::{keys, OriginServer, Route};
use fedfetch::{Attestor, Error, HttpTransport, LookupData, ResolverBuilder, ResolverConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

fn verifier_profile(origin: &OriginServer, path: &str, key: usize) -> Value {
    let id = origin.url(path);
    json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "id": id,
        "type": "Service",
        "publicKey": { "id": format!("{id}#main-key"), "owner": id, "publicKeyPem": keys::public_pem(key) },
    })
}

fn document() -> Value {
    json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "id": "https://a.example/users/alice",
        "type": "Person",
        "inbox": "https://a.example/users/alice/inbox",
        "publicKey": {
            "id": "https://a.example/users/alice#main-key",
            "owner": "https://a.example/users/alice",
            "publicKeyPem": keys::public_pem(3),
        },
    })
}

/// Two verifier origins: `127.0.0.1` and `localhost` count as distinct hosts.
struct Verifiers {
    first: OriginServer,
    second: OriginServer,
    dir: TempDir,
}

impl Verifiers {
    async fn start() -> Self {
        let first = OriginServer::start().await.unwrap();
        let second = OriginServer::start().await.unwrap();
        first.route("/actor", Route::activity(&verifier_profile(&first, "/actor", 0)));
        second.route("/actor", Route::activity(&verifier_profile(&second, "/actor", 1)));
        Self {
            first,
            second,
            dir: TempDir::new().unwrap(),
        }
    }

    fn first_uri(&self) -> String {
        self.first.url("/actor")
    }

    /// The second verifier, addressed through a different host name.
    fn second_uri(&self) -> String {
        self.second.url("/actor").replace("127.0.0.1", "localhost")
    }

    fn resolver(&self, min_verifiers: u32) -> fedfetch::Resolver {
        let path = self.dir.path().join("verifiers.json");
        std::fs::write(
            &path,
            serde_json::to_string_pretty(&json!({
                self.first_uri(): null,
                self.second_uri(): null,
            }))
            .unwrap(),
        )
        .unwrap();

        let mut config = ResolverConfig::default();
        config.trust.min_verifiers = Some(min_verifiers);
        config.trust.verifiers_file = Some(path);
        let transport = Arc::new(HttpTransport::new(&config.fetch).unwrap());
        ResolverBuilder::new(config).with_transport(transport).build().unwrap()
    }
}

fn lookup(document: &Value, attestations: &[fedfetch::SignatureAttestation]) -> LookupData {
    LookupData {
        json: document.to_string(),
        key_signatures: Some(serde_json::to_value(attestations).unwrap()),
        auxiliary: None,
    }
}

/// Test 1: keys are fetched, persisted, and a two-host quorum is trusted.
#[tokio::test]
async fn test_quorum_with_fetched_keys() {
    let verifiers = Verifiers::start().await;
    let resolver = verifiers.resolver(2);
    let document = document();

    let attestations = vec![
        Attestor::new(verifiers.first_uri(), keys::private(0).clone()).attest(&document, None),
        Attestor::new(verifiers.second_uri(), keys::private(1).clone()).attest(&document, None),
    ];
    let trusted = resolver.verify_lookup(&lookup(&document, &attestations)).await.unwrap();
    assert_eq!(trusted, Some(document));

    let persisted: Value =
        serde_json::from_str(&std::fs::read_to_string(resolver.registry().path()).unwrap()).unwrap();
    assert_eq!(persisted[verifiers.first_uri()], keys::public_pem(0));
    assert_eq!(persisted[verifiers.second_uri()], keys::public_pem(1));
}

/// Test 2: one host is not enough for a threshold of two.
#[tokio::test]
async fn test_single_host_below_threshold() {
    let verifiers = Verifiers::start().await;
    let resolver = verifiers.resolver(2);
    let document = document();

    let attestations =
        vec![Attestor::new(verifiers.first_uri(), keys::private(0).clone()).attest(&document, None)];
    let result = resolver.verify(&document, None, &attestations).await.unwrap();
    assert!(!result.is_trusted());
    assert_eq!(result.verified_hosts.len(), 1);
}

/// Test 3: a forged attestation from a known verifier fails the call.
#[tokio::test]
async fn test_forged_attestation() {
    let verifiers = Verifiers::start().await;
    let resolver = verifiers.resolver(1);
    let document = document();

    let attestations = vec![
        Attestor::new(verifiers.first_uri(), keys::private(2).clone()).attest(&document, None),
        Attestor::new(verifiers.second_uri(), keys::private(1).clone()).attest(&document, None),
    ];
    let err = resolver
        .verify_lookup(&lookup(&document, &attestations))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Verification(_)));
}
