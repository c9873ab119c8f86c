//! hanko-gate
//!
//! Axum middleware that authenticates HTTP requests carrying a JWT issued by
//! a Hanko-style identity service, verified against the service's published
//! JWKS.
//!
//! # Pipeline
//!
//! ```text
//! request -> gate (middleware) -> locator -> verifier -> JWKS cache
//!                                             |
//!                      AuthSession attached to request extensions
//! ```
//!
//! The gate annotates requests and never rejects them; routes that require
//! authentication opt in with the [`RequireAuth`] guard.
//!
//! # Modules
//!
//! - `config` - gate configuration (env or programmatic)
//! - `errors` - verification failure taxonomy
//! - `auth` - claims, JWKS cache, token verifier
//! - `middleware` - token locator and the request gate
//! - `session` - session accessor and enforcement guard
//!
//! # Example
//!
//! ```rust,ignore
//! use hanko_gate::{authenticate, AuthSession, GateConfig, GateState, RequireAuth};
//!
//! let gate = std::sync::Arc::new(GateState::new(GateConfig::from_env()?));
//! let app = axum::Router::new()
//!     .route("/me", axum::routing::get(me))
//!     .layer(axum::middleware::from_fn_with_state(gate, authenticate));
//!
//! async fn me(RequireAuth(claims): RequireAuth) -> String {
//!     claims.subject().to_string()
//! }
//! ```

pub mod auth;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod session;

pub use auth::{Claims, Jwk, JwksCache, KeySet, TokenVerifier};
pub use config::{ConfigError, GateConfig};
pub use errors::AuthError;
pub use middleware::{authenticate, locate_token, GateState};
pub use session::{AuthSession, RequireAuth, SessionExt, Unauthorized};
