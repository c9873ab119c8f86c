//! Token verification pipeline: claims, key set cache, and verifier.

pub mod claims;
pub mod jwks;
pub mod verifier;

pub use claims::Claims;
pub use jwks::{Jwk, JwksCache, KeySet};
pub use verifier::{TokenVerifier, ALLOWED_ALGORITHMS, MAX_TOKEN_SIZE_BYTES};
