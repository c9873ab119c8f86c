//! Shared helpers for integration tests: deterministic Ed25519 keypairs,
//! token signing, and JWKS document construction.

#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde::Serialize;

/// Minimal claim set for signed test tokens.
#[derive(Debug, Clone, Serialize)]
pub struct TestClaims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

impl TestClaims {
    pub fn new(sub: &str, exp: i64) -> Self {
        Self {
            sub: sub.to_string(),
            exp,
            iat: chrono::Utc::now().timestamp(),
        }
    }
}

/// Deterministic Ed25519 keypair for signing test tokens.
pub struct TestKeypair {
    pub kid: String,
    public_key_bytes: Vec<u8>,
    private_key_pkcs8: Vec<u8>,
}

impl TestKeypair {
    pub fn new(seed: u8, kid: &str) -> Self {
        let mut seed_bytes = [0u8; 32];
        seed_bytes[0] = seed;
        for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
            *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
        }

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
            .expect("failed to create test keypair");

        Self {
            kid: kid.to_string(),
            public_key_bytes: key_pair.public_key().as_ref().to_vec(),
            private_key_pkcs8: build_pkcs8_from_seed(&seed_bytes),
        }
    }

    pub fn sign(&self, claims: &TestClaims) -> String {
        let encoding_key = EncodingKey::from_ed_der(&self.private_key_pkcs8);
        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.kid.clone());

        encode(&header, claims, &encoding_key).expect("failed to sign token")
    }

    /// Sign with a different kid than the one the JWKS publishes.
    pub fn sign_with_kid(&self, claims: &TestClaims, kid: &str) -> String {
        let encoding_key = EncodingKey::from_ed_der(&self.private_key_pkcs8);
        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        header.kid = Some(kid.to_string());

        encode(&header, claims, &encoding_key).expect("failed to sign token")
    }

    pub fn jwk_json(&self) -> serde_json::Value {
        serde_json::json!({
            "kty": "OKP",
            "kid": self.kid,
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(&self.public_key_bytes),
            "alg": "EdDSA",
            "use": "sig"
        })
    }
}

/// A JWKS document publishing the given keypairs.
pub fn jwks_body(keypairs: &[&TestKeypair]) -> serde_json::Value {
    serde_json::json!({
        "keys": keypairs.iter().map(|kp| kp.jwk_json()).collect::<Vec<_>>()
    })
}

/// An HMAC-signed token, which the verifier must reject before any key
/// lookup regardless of its (valid) signature.
pub fn hmac_token(claims: &TestClaims) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some("hmac-key".to_string());
    encode(
        &header,
        claims,
        &EncodingKey::from_secret(b"shared-secret"),
    )
    .expect("failed to sign HMAC token")
}

/// Build a PKCS#8 v1 document from an Ed25519 seed.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    let mut pkcs8 = Vec::new();

    // Outer SEQUENCE tag
    pkcs8.push(0x30);
    pkcs8.push(0x2e); // Length: 46 bytes

    // Version: INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);

    // Algorithm Identifier: SEQUENCE
    pkcs8.push(0x30);
    pkcs8.push(0x05); // Length: 5 bytes
                      // OID for Ed25519: 1.3.101.112
    pkcs8.extend_from_slice(&[0x06, 0x03, 0x2b, 0x65, 0x70]);

    // Private Key: OCTET STRING
    pkcs8.push(0x04);
    pkcs8.push(0x22); // Length: 34 bytes
                      // Inner OCTET STRING with seed
    pkcs8.push(0x04);
    pkcs8.push(0x20); // Length: 32 bytes
    pkcs8.extend_from_slice(seed);

    pkcs8
}
