//! Token verification.
//!
//! Verifies a bearer JWT against a key resolved from the JWKS cache and
//! classifies every failure into the [`AuthError`] taxonomy.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE any decoding (DoS prevention)
//! - Only asymmetric signature algorithms are accepted; HMAC is rejected
//!   before key resolution, regardless of signature validity
//! - `exp` is validated with a symmetric clock skew tolerance
//! - Only the key-resolution step may touch the network; everything else is
//!   pure CPU work on the token

use crate::auth::claims::Claims;
use crate::auth::jwks::{Jwk, JwksCache};
use crate::errors::AuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

/// Maximum accepted token size in bytes, checked before any parsing.
pub const MAX_TOKEN_SIZE_BYTES: usize = 8192;

/// Signature algorithms the verifier accepts. Asymmetric only.
pub const ALLOWED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
];

/// Token header fields read without trusting the token.
#[derive(Debug, Deserialize)]
struct RawHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

/// Verifies tokens using keys from a [`JwksCache`].
///
/// Stateless per call; safe to share behind an `Arc` across requests.
pub struct TokenVerifier {
    jwks: Arc<JwksCache>,
    clock_skew_seconds: u64,
}

impl TokenVerifier {
    /// Create a verifier.
    ///
    /// # Arguments
    ///
    /// * `jwks` - cache resolving key ids to public keys
    /// * `clock_skew_seconds` - tolerance applied to `exp` comparison
    pub fn new(jwks: Arc<JwksCache>, clock_skew_seconds: u64) -> Self {
        Self {
            jwks,
            clock_skew_seconds,
        }
    }

    /// Verify a token and return its claims.
    ///
    /// Pipeline: untrusted header parse, algorithm allow-list, key
    /// resolution (the only step that may hit the network), signature
    /// verification, `exp` check with skew.
    ///
    /// # Errors
    ///
    /// - [`AuthError::UnsupportedAlgorithm`] - declared algorithm outside the allow-list
    /// - [`AuthError::InvalidToken`] - malformed token, unknown key, or bad signature
    /// - [`AuthError::ExpiredToken`] - `exp` in the past beyond skew
    /// - [`AuthError::JwksFetch`] - key set could not be fetched
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = inspect_header(token)?;
        let algorithm = allowed_algorithm(&header.alg)?;

        let kid = header
            .kid
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                tracing::debug!(target: "hanko.verify", "token header missing kid");
                AuthError::InvalidToken
            })?;

        let jwk = self.jwks.resolve(&kid).await?;

        let claims = verify_signed(token, &jwk, algorithm, self.clock_skew_seconds)?;
        tracing::debug!(target: "hanko.verify", "token verified");
        Ok(claims)
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("clock_skew_seconds", &self.clock_skew_seconds)
            .finish_non_exhaustive()
    }
}

/// Parse the token header without verifying anything.
fn inspect_header(token: &str) -> Result<RawHeader, AuthError> {
    if token.len() > MAX_TOKEN_SIZE_BYTES {
        tracing::debug!(
            target: "hanko.verify",
            token_size = token.len(),
            max_size = MAX_TOKEN_SIZE_BYTES,
            "token rejected: size exceeds maximum allowed"
        );
        return Err(AuthError::InvalidToken);
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    let header_part = parts.next().ok_or(AuthError::InvalidToken)?;
    if parts.clone().count() != 2 {
        tracing::debug!(target: "hanko.verify", "token rejected: not three dot-separated parts");
        return Err(AuthError::InvalidToken);
    }

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "hanko.verify", error = %e, "failed to decode token header base64");
        AuthError::InvalidToken
    })?;

    serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "hanko.verify", error = %e, "failed to parse token header JSON");
        AuthError::InvalidToken
    })
}

/// Map the declared algorithm against the allow-list.
fn allowed_algorithm(alg: &str) -> Result<Algorithm, AuthError> {
    let parsed: Algorithm = alg
        .parse()
        .map_err(|_| AuthError::UnsupportedAlgorithm(alg.to_string()))?;

    if ALLOWED_ALGORITHMS.contains(&parsed) {
        Ok(parsed)
    } else {
        tracing::debug!(target: "hanko.verify", alg = %alg, "token rejected: algorithm not in allow-list");
        Err(AuthError::UnsupportedAlgorithm(alg.to_string()))
    }
}

/// Verify the signature and time claims against the resolved key.
fn verify_signed(
    token: &str,
    jwk: &Jwk,
    algorithm: Algorithm,
    clock_skew_seconds: u64,
) -> Result<Claims, AuthError> {
    // A key published for a different algorithm must not verify this token.
    if let Some(key_alg) = &jwk.alg {
        if !matches!(key_alg.parse::<Algorithm>(), Ok(a) if a == algorithm) {
            tracing::warn!(
                target: "hanko.verify",
                kid = %jwk.kid,
                key_alg = %key_alg,
                "JWK algorithm does not match token algorithm"
            );
            return Err(AuthError::InvalidToken);
        }
    }

    let decoding_key = decoding_key(jwk)?;

    let mut validation = Validation::new(algorithm);
    validation.validate_exp = true;
    validation.leeway = clock_skew_seconds;
    // Audience is not part of the contract; claims beyond sub/exp pass through.
    validation.validate_aud = false;

    let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(target: "hanko.verify", error = %e, "token verification failed");
        if matches!(
            e.kind(),
            jsonwebtoken::errors::ErrorKind::ExpiredSignature
        ) {
            AuthError::ExpiredToken
        } else {
            AuthError::InvalidToken
        }
    })?;

    Ok(token_data.claims)
}

/// Build a decoding key from the JWK's material for its key family.
fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, AuthError> {
    let missing = |field: &str| {
        tracing::error!(target: "hanko.verify", kid = %jwk.kid, field = field, "JWK missing key material");
        AuthError::InvalidToken
    };

    let key = match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_deref().ok_or_else(|| missing("n"))?;
            let e = jwk.e.as_deref().ok_or_else(|| missing("e"))?;
            DecodingKey::from_rsa_components(n, e)
        }
        "EC" => {
            let x = jwk.x.as_deref().ok_or_else(|| missing("x"))?;
            let y = jwk.y.as_deref().ok_or_else(|| missing("y"))?;
            DecodingKey::from_ec_components(x, y)
        }
        "OKP" => {
            let x = jwk.x.as_deref().ok_or_else(|| missing("x"))?;
            DecodingKey::from_ed_components(x)
        }
        other => {
            tracing::warn!(target: "hanko.verify", kty = %other, kid = %jwk.kid, "unsupported JWK key type");
            return Err(AuthError::InvalidToken);
        }
    };

    key.map_err(|e| {
        tracing::error!(target: "hanko.verify", kid = %jwk.kid, error = %e, "invalid JWK key material");
        AuthError::InvalidToken
    })
}
