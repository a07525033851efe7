use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::instrument;

use crate::core::error::{ConfigError, Error};

/// JWKS document as published by the identity provider.
#[derive(Debug, Deserialize)]
pub(crate) struct Jwks {
    pub(crate) keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Jwk {
    pub(crate) kty: String,
    pub(crate) kid: String,
    #[serde(default)]
    pub(crate) alg: Option<String>,
    #[serde(default)]
    pub(crate) n: Option<String>,
    #[serde(default)]
    pub(crate) e: Option<String>,
}

#[derive(Clone)]
pub(crate) struct VerificationKey {
    pub(crate) alg: Algorithm,
    pub(crate) key: DecodingKey,
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("alg", &self.alg)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct CachedKeys {
    keys: HashMap<String, VerificationKey>,
    fetched_at: Option<Instant>,
}

/// Signing-key cache over the identity provider's JWKS endpoint.
///
/// Keys are refreshed when the cache is stale or a `kid` is missing.
/// Concurrent misses collapse into one upstream fetch, and refreshes are
/// additionally bounded by a cooldown so an attacker spraying unknown
/// `kid`s cannot turn the cache into a fetch loop.
#[derive(Clone)]
pub(crate) struct KeyStore {
    client: reqwest::Client,
    url: String,
    ttl: Duration,
    refresh_cooldown: Duration,
    fetch_timeout: Duration,
    cached: Arc<RwLock<CachedKeys>>,
    last_refresh: Arc<Mutex<Option<Instant>>>,
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material is intentionally not printable
        f.debug_struct("KeyStore")
            .field("url", &self.url)
            .field("ttl", &self.ttl)
            .field("refresh_cooldown", &self.refresh_cooldown)
            .finish()
    }
}

impl KeyStore {
    pub(crate) fn new(
        url: String,
        ttl: Duration,
        refresh_cooldown: Duration,
        fetch_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::ClientBuilder::new().build()?;

        Ok(Self {
            client,
            url,
            ttl,
            refresh_cooldown,
            fetch_timeout,
            cached: Arc::new(RwLock::new(CachedKeys::default())),
            last_refresh: Arc::new(Mutex::new(None)),
        })
    }

    /// Key store primed with fixed keys and an exhausted refresh budget.
    /// Unknown `kid`s fail without touching the network.
    #[cfg(test)]
    pub(crate) fn preloaded(keys: Vec<(String, VerificationKey)>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: String::new(),
            ttl: Duration::from_secs(3600),
            refresh_cooldown: Duration::from_secs(3600),
            fetch_timeout: Duration::from_secs(1),
            cached: Arc::new(RwLock::new(CachedKeys {
                keys: keys.into_iter().collect(),
                fetched_at: Some(Instant::now()),
            })),
            last_refresh: Arc::new(Mutex::new(Some(Instant::now()))),
        }
    }

    #[instrument(skip(self))]
    pub(crate) async fn resolve(&self, kid: &str) -> Result<VerificationKey, Error> {
        {
            let cached = self.cached.read().await;

            if let (Some(key), Some(at)) = (cached.keys.get(kid), cached.fetched_at) {
                if at.elapsed() < self.ttl {
                    return Ok(key.clone());
                }
            }
        }

        // Single-flight: one refresh at a time, everyone else waits on it.
        let mut last_refresh = self.last_refresh.lock().await;

        {
            let cached = self.cached.read().await;

            if cached.fetched_at.is_some_and(|at| at.elapsed() < self.ttl) {
                if let Some(key) = cached.keys.get(kid) {
                    return Ok(key.clone());
                }
            }
        }

        if last_refresh.is_some_and(|at| at.elapsed() < self.refresh_cooldown) {
            return self
                .cached
                .read()
                .await
                .keys
                .get(kid)
                .cloned()
                .ok_or(Error::UnknownSigningKey);
        }

        *last_refresh = Some(Instant::now());

        let keys = self.fetch().await?;

        tracing::info!(count = keys.len(), "Refreshed signing key set");

        let mut cached = self.cached.write().await;
        cached.keys = keys;
        cached.fetched_at = Some(Instant::now());

        cached.keys.get(kid).cloned().ok_or(Error::UnknownSigningKey)
    }

    async fn fetch(&self) -> Result<HashMap<String, VerificationKey>, Error> {
        let response = tokio::time::timeout(
            self.fetch_timeout,
            self.client.get(&self.url).send(),
        )
        .await
        .map_err(|_| Error::UpstreamTimeout)??
        .error_for_status()?;

        let body = tokio::time::timeout(self.fetch_timeout, response.text())
            .await
            .map_err(|_| Error::UpstreamTimeout)??;

        let jwks: Jwks = serde_json::from_str(&body)?;

        Ok(build_key_map(jwks))
    }
}

pub(crate) fn build_key_map(jwks: Jwks) -> HashMap<String, VerificationKey> {
    let mut keys = HashMap::new();

    for jwk in jwks.keys {
        if jwk.kty != "RSA" || jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
            tracing::warn!(kid = %jwk.kid, kty = %jwk.kty, "Skipping unsupported JWKS entry");
            continue;
        }

        let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
            tracing::warn!(kid = %jwk.kid, "Skipping JWKS entry without RSA components");
            continue;
        };

        match DecodingKey::from_rsa_components(n, e) {
            Ok(key) => {
                keys.insert(
                    jwk.kid,
                    VerificationKey {
                        alg: Algorithm::RS256,
                        key,
                    },
                );
            }
            Err(e) => {
                tracing::warn!(kid = %jwk.kid, "Ignoring undecodable JWKS entry: {:?}", e);
            }
        }
    }

    keys
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const JWKS: &str = r#"{
        "keys": [
            {
                "kty": "RSA",
                "kid": "k1",
                "alg": "RS256",
                "use": "sig",
                "n": "yRE6rHuNR0QbHO3H3Kt2pOKGVhQqGZXInOduQNxXzuKlvQTLUTv4l4sggh5_CYYi_cvI-SXVT9kPWSKXxJXBXd_4LkvcPuUakBoAkfh-eiFVMh2VrUyWyj3MFl0HTVF9KwRXLAcwkREiS3npThHRyIxuy0ZMeZfxVL5arMhw1SRELB8HoGfG_AtH89BIE9jDBHZ9dLelK9a184zAf8LwoPLxvJb3Il5nncqPcSfKDDodMFBIMc4lQzDKL5gvmiXLXB1AGLm8KBjfE8s3L5xqi-yUod-j8MtvIj812dkS4QMiRVN_by2h3ZY8LYVGrqZXZTcgn2ujn8uKjXLZVD5TdQ",
                "e": "AQAB"
            },
            {
                "kty": "EC",
                "kid": "k2",
                "alg": "ES256"
            },
            {
                "kty": "RSA",
                "kid": "k3",
                "alg": "RS512"
            }
        ]
    }"#;

    #[test]
    fn parses_rsa_keys_and_skips_the_rest() {
        let jwks: Jwks = serde_json::from_str(JWKS).unwrap();
        let keys = build_key_map(jwks);

        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key("k1"));
        assert_eq!(keys["k1"].alg, Algorithm::RS256);
    }

    #[tokio::test]
    async fn preloaded_store_resolves_known_kid() {
        let jwks: Jwks = serde_json::from_str(JWKS).unwrap();
        let keys = build_key_map(jwks).into_iter().collect();

        let store = KeyStore::preloaded(keys);
        assert!(store.resolve("k1").await.is_ok());
    }

    /// JWKS endpoint serving the fixture and counting how often it is hit.
    async fn serve_jwks() -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let app = axum::Router::new().route(
            "/jwks",
            axum::routing::get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    JWKS
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/jwks", listener.local_addr().unwrap());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (url, hits)
    }

    #[tokio::test]
    async fn concurrent_misses_collapse_into_one_fetch() {
        let (url, hits) = serve_jwks().await;

        let store = KeyStore::new(
            url,
            Duration::from_secs(300),
            Duration::from_secs(300),
            Duration::from_secs(5),
        )
        .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.resolve("k1").await }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stalled_key_endpoint_surfaces_upstream_timeout() {
        // Bound but never accepted: the fetch can connect yet gets no
        // response before its deadline.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/jwks", listener.local_addr().unwrap());

        let store = KeyStore::new(
            url,
            Duration::from_secs(300),
            Duration::from_secs(300),
            Duration::from_millis(200),
        )
        .unwrap();

        let err = store.resolve("k1").await.unwrap_err();
        assert!(matches!(err, Error::UpstreamTimeout));

        drop(listener);
    }

    #[tokio::test]
    async fn unknown_kid_is_denied_without_a_second_refresh() {
        let jwks: Jwks = serde_json::from_str(JWKS).unwrap();
        let keys = build_key_map(jwks).into_iter().collect();

        // Refresh budget already spent; the miss must fail fast rather
        // than hammer the endpoint.
        let store = KeyStore::preloaded(keys);
        let err = store.resolve("unknown").await.unwrap_err();
        assert!(matches!(err, Error::UnknownSigningKey));
    }
}
