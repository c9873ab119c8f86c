//! Error taxonomy for token verification.
//!
//! Every verification failure is classified into one of four kinds. All of
//! them are recoverable at the request gate, which converts them into an
//! anonymous session; none of them propagate to the application as a
//! response error. Only configuration problems (see [`crate::config`]) fail
//! loudly, and they do so at startup before any request is processed.

use thiserror::Error;

/// Classified token verification failure.
///
/// Display messages are intentionally generic to avoid leaking which exact
/// check a token failed. Details are logged at debug level where the failure
/// is detected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Token declared a signature algorithm outside the allow-list.
    ///
    /// Symmetric (HMAC) algorithms land here regardless of whether their
    /// signature would verify, closing the algorithm-confusion hole.
    #[error("unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Signature verification failed, the signing key could not be resolved,
    /// or the token/payload is malformed.
    #[error("the access token is invalid")]
    InvalidToken,

    /// Token `exp` is in the past beyond the allowed clock skew.
    #[error("the access token has expired")]
    ExpiredToken,

    /// The JWKS endpoint was unreachable, returned a non-2xx status, or its
    /// body could not be parsed as a key set.
    #[error("failed to fetch JWKS: {0}")]
    JwksFetch(String),
}
