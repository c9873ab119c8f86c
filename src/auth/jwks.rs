//! JWKS cache: fetches and holds the identity service's public key set.
//!
//! The key set is fetched from the service's `/.well-known/jwks.json`
//! endpoint and cached for a configurable TTL. A refresh replaces the whole
//! set behind an `Arc` swap, so verifications holding the previous snapshot
//! stay valid. Refreshes are single-flight: under an expiry stampede exactly
//! one fetch hits the network and every waiter observes its result.

use crate::errors::AuthError;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// A public verification key from the JWKS endpoint.
///
/// Immutable once fetched; identified by `kid`. Key material fields depend
/// on the key family: `n`/`e` for RSA, `crv`/`x`/`y` for EC, `crv`/`x` for
/// OKP (Ed25519).
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA", "EC", or "OKP").
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    pub kid: String,

    /// Algorithm the key is intended for, when published.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing keys).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// Curve name for EC/OKP keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// EC x coordinate, or the Ed25519 public key (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,
}

/// JWKS document shape: `{"keys": [...]}`.
#[derive(Debug, Clone, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

/// A fetched key set, indexed by `kid`.
///
/// Replaced wholesale on refresh, never edited in place.
#[derive(Debug)]
pub struct KeySet {
    keys: HashMap<String, Jwk>,
    fetched_at: Instant,
    source: String,
}

impl KeySet {
    /// Look up a key by id.
    pub fn get(&self, kid: &str) -> Option<&Jwk> {
        self.keys.get(kid)
    }

    /// Number of keys in the set.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// When this set was fetched.
    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    /// URL the set was fetched from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Caching JWKS client.
///
/// Thread-safe: the current set lives behind an `RwLock<Option<Arc<..>>>`
/// and refreshes serialize on a separate mutex so concurrent callers never
/// issue duplicate fetches.
pub struct JwksCache {
    jwks_url: String,
    http_client: reqwest::Client,
    ttl: Duration,
    current: RwLock<Option<Arc<KeySet>>>,
    /// Serializes refreshes; holds the failure of the last completed flight
    /// so waiters queued behind a failed fetch observe the same error.
    refresh_lock: Mutex<Option<AuthError>>,
    /// Bumped once per completed flight (success or failure).
    refresh_epoch: AtomicU64,
}

impl JwksCache {
    /// Create a cache for the given JWKS endpoint.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL of the identity service's JWKS endpoint
    /// * `ttl` - how long a fetched set stays fresh
    /// * `fetch_timeout` - total timeout for one fetch
    /// * `connect_timeout` - connection-open timeout for one fetch
    pub fn new(
        jwks_url: String,
        ttl: Duration,
        fetch_timeout: Duration,
        connect_timeout: Duration,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "hanko.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            ttl,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(None),
            refresh_epoch: AtomicU64::new(0),
        }
    }

    /// Get the current key set, refreshing it if the cache is empty or past
    /// its TTL.
    ///
    /// If the refresh fails but a previously fetched set exists, that stale
    /// set is returned and the failure is only logged; the cache survives
    /// endpoint outages. With no previous set the failure propagates.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::JwksFetch`] when the fetch fails and there is no
    /// earlier set to fall back on.
    pub async fn keyset(&self) -> Result<Arc<KeySet>, AuthError> {
        if let Some(set) = self.fresh_snapshot().await {
            return Ok(set);
        }
        self.refresh().await
    }

    /// Look up a key by id, forcing one extra refresh on a miss.
    ///
    /// The forced refresh covers key rotation: a token signed with a freshly
    /// rotated key may arrive before the cached set expires. If the key is
    /// still absent after the refresh the token cannot be verified.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if the key id is unknown even
    /// after a refresh, or [`AuthError::JwksFetch`] if fetching fails with
    /// nothing cached.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn resolve(&self, kid: &str) -> Result<Jwk, AuthError> {
        let set = self.keyset().await?;
        if let Some(key) = set.get(kid) {
            tracing::debug!(target: "hanko.jwks", kid = %kid, "key set cache hit");
            return Ok(key.clone());
        }

        tracing::debug!(target: "hanko.jwks", kid = %kid, "key not in cached set, forcing refresh");
        let set = self.force_refresh(&set).await?;
        match set.get(kid) {
            Some(key) => Ok(key.clone()),
            None => {
                tracing::warn!(target: "hanko.jwks", kid = %kid, "key not found in JWKS after refresh");
                Err(AuthError::InvalidToken)
            }
        }
    }

    /// Return the cached set if it is still within TTL.
    async fn fresh_snapshot(&self) -> Option<Arc<KeySet>> {
        let current = self.current.read().await;
        current
            .as_ref()
            .filter(|set| set.fetched_at.elapsed() < self.ttl)
            .cloned()
    }

    /// Refresh the cache, single-flight.
    ///
    /// Whoever holds the refresh lock fetches; everyone queued behind them
    /// observes that flight's outcome without touching the network: a fresh
    /// set through the double-check, or the flight's failure via the epoch
    /// counter.
    async fn refresh(&self) -> Result<Arc<KeySet>, AuthError> {
        let observed_epoch = self.refresh_epoch.load(Ordering::Acquire);
        let mut last_failure = self.refresh_lock.lock().await;

        // A flight may have completed while we waited for the lock.
        if let Some(set) = self.fresh_snapshot().await {
            return Ok(set);
        }
        if self.refresh_epoch.load(Ordering::Acquire) != observed_epoch {
            if let Some(e) = (*last_failure).clone() {
                return self.stale_fallback(e).await;
            }
        }

        let outcome = self.fetch().await;
        self.refresh_epoch.fetch_add(1, Ordering::AcqRel);
        match outcome {
            Ok(set) => {
                *last_failure = None;
                let set = Arc::new(set);
                *self.current.write().await = Some(Arc::clone(&set));
                Ok(set)
            }
            Err(e) => {
                *last_failure = Some(e.clone());
                self.stale_fallback(e).await
            }
        }
    }

    /// Serve the previous set through an outage, or surface the failure when
    /// nothing was ever fetched.
    async fn stale_fallback(&self, e: AuthError) -> Result<Arc<KeySet>, AuthError> {
        let current = self.current.read().await;
        if let Some(stale) = current.as_ref() {
            tracing::warn!(
                target: "hanko.jwks",
                error = %e,
                "JWKS refresh failed, serving stale key set"
            );
            Ok(Arc::clone(stale))
        } else {
            Err(e)
        }
    }

    /// Refresh ignoring TTL, for key-rotation misses.
    ///
    /// `seen` is the set the caller already searched; if a different set got
    /// published while waiting for the lock, that one is returned instead of
    /// fetching again.
    async fn force_refresh(&self, seen: &Arc<KeySet>) -> Result<Arc<KeySet>, AuthError> {
        let mut last_failure = self.refresh_lock.lock().await;

        {
            let current = self.current.read().await;
            if let Some(set) = current.as_ref() {
                if !Arc::ptr_eq(set, seen) {
                    return Ok(Arc::clone(set));
                }
            }
        }

        let outcome = self.fetch().await;
        self.refresh_epoch.fetch_add(1, Ordering::AcqRel);
        match outcome {
            Ok(set) => {
                *last_failure = None;
                let set = Arc::new(set);
                *self.current.write().await = Some(Arc::clone(&set));
                Ok(set)
            }
            Err(e) => {
                *last_failure = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Fetch and parse the key set. Callers hold the refresh lock.
    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<KeySet, AuthError> {
        tracing::debug!(target: "hanko.jwks", url = %self.jwks_url, "fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "hanko.jwks", error = %e, "failed to fetch JWKS");
                AuthError::JwksFetch(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "hanko.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(AuthError::JwksFetch(format!(
                "endpoint returned {}",
                response.status()
            )));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "hanko.jwks", error = %e, "failed to parse JWKS response");
            AuthError::JwksFetch(format!("unparseable body: {e}"))
        })?;

        let keys: HashMap<String, Jwk> = jwks
            .keys
            .into_iter()
            .map(|key| (key.kid.clone(), key))
            .collect();

        tracing::info!(
            target: "hanko.jwks",
            key_count = keys.len(),
            "JWKS cache refreshed"
        );

        Ok(KeySet {
            keys,
            fetched_at: Instant::now(),
            source: self.jwks_url.clone(),
        })
    }
}

impl std::fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksCache")
            .field("jwks_url", &self.jwks_url)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
