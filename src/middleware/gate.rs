//! Request gate middleware.
//!
//! Runs once per request: locates a candidate token, verifies it, and
//! attaches the outcome to the request's extensions. The gate never blocks
//! or rejects a request; every verification failure degrades to an anonymous
//! session. Enforcement is the job of downstream guards reading the session
//! (see [`crate::session::RequireAuth`]).

use crate::auth::{JwksCache, TokenVerifier};
use crate::config::GateConfig;
use crate::middleware::locate::locate_token;
use crate::session::AuthSession;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

/// Shared state for the gate: configuration plus the verifier stack.
///
/// Built once at startup and shared across all requests; the JWKS cache
/// inside is the only mutable piece and handles its own synchronization.
pub struct GateState {
    config: GateConfig,
    verifier: TokenVerifier,
}

impl GateState {
    /// Build the gate state from configuration.
    ///
    /// Wires the JWKS cache to the config's derived endpoint URL and TTL and
    /// puts the verifier on top.
    pub fn new(config: GateConfig) -> Self {
        let jwks = Arc::new(JwksCache::new(
            config.jwks_url(),
            config.jwks_cache_ttl,
            config.fetch_timeout,
            config.connect_timeout,
        ));
        let verifier = TokenVerifier::new(jwks, config.clock_skew_seconds);
        Self { config, verifier }
    }

    /// The configuration this gate was built with.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.config
            .exclude_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

impl std::fmt::Debug for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Authentication gate middleware.
///
/// Mount with `axum::middleware::from_fn_with_state`:
///
/// ```rust,ignore
/// let gate = Arc::new(GateState::new(GateConfig::from_env()?));
/// let app = Router::new()
///     .route("/me", get(me))
///     .layer(middleware::from_fn_with_state(gate, authenticate));
/// ```
///
/// Paths under a configured excluded prefix are skipped outright: the
/// locator never runs and the session is anonymous. Everything else gets a
/// session attached exactly once, then the request is forwarded
/// unconditionally.
#[instrument(skip_all, name = "hanko.gate")]
pub async fn authenticate(
    State(state): State<Arc<GateState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let session = if state.is_excluded(req.uri().path()) {
        tracing::debug!(target: "hanko.gate", path = %req.uri().path(), "path excluded, skipping token extraction");
        AuthSession::anonymous()
    } else {
        match locate_token(req.headers(), &state.config.cookie_name) {
            None => AuthSession::anonymous(),
            Some(token) => match state.verifier.verify(&token).await {
                Ok(claims) => AuthSession::verified(claims),
                Err(e) => {
                    tracing::debug!(
                        target: "hanko.gate",
                        error = %e,
                        "token verification failed, continuing as anonymous"
                    );
                    AuthSession::anonymous()
                }
            },
        }
    };

    req.extensions_mut().insert(session);
    next.run(req).await
}
