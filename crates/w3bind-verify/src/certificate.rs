//! Key-binding certificate validation.

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

/// Claims a key-binding certificate carries.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyBindingClaims {
    /// Identifier the key is bound to.
    pub ename: String,
    /// Multibase-encoded public key.
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

/// Why a single certificate was rejected.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("malformed certificate header: {0}")]
    Header(#[source] jsonwebtoken::errors::Error),

    #[error("no registry key with kid {0}")]
    UnknownKid(String),

    #[error("no registry key compatible with {0:?}")]
    NoCompatibleKey(Algorithm),

    #[error("unusable registry key: {0}")]
    Key(#[source] jsonwebtoken::errors::Error),

    #[error("certificate rejected: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

/// Validates `token` against the registry key set and returns its claims.
///
/// The key is chosen by the header `kid`. A token without a `kid` is tried
/// against every key of a compatible family, first success wins. `exp` is
/// enforced when present; no other registered claim is required.
pub fn validate(token: &str, keys: &JwkSet) -> Result<KeyBindingClaims, CertificateError> {
    let header = jsonwebtoken::decode_header(token).map_err(CertificateError::Header)?;

    let mut validation = Validation::new(header.alg);
    validation.required_spec_claims.clear();
    validation.validate_aud = false;

    let candidates: Vec<&Jwk> = match header.kid.as_deref() {
        Some(kid) => vec![keys
            .find(kid)
            .ok_or_else(|| CertificateError::UnknownKid(kid.to_string()))?],
        None => keys
            .keys
            .iter()
            .filter(|jwk| compatible(header.alg, jwk))
            .collect(),
    };

    let mut last = CertificateError::NoCompatibleKey(header.alg);
    for jwk in candidates {
        let key = match DecodingKey::from_jwk(jwk) {
            Ok(key) => key,
            Err(e) => {
                last = CertificateError::Key(e);
                continue;
            }
        };
        match jsonwebtoken::decode::<KeyBindingClaims>(token, &key, &validation) {
            Ok(data) => return Ok(data.claims),
            Err(e) => last = CertificateError::Invalid(e),
        }
    }
    Err(last)
}

fn compatible(alg: Algorithm, jwk: &Jwk) -> bool {
    match &jwk.algorithm {
        AlgorithmParameters::EllipticCurve(_) => {
            matches!(alg, Algorithm::ES256 | Algorithm::ES384)
        }
        AlgorithmParameters::RSA(_) => matches!(
            alg,
            Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512
        ),
        AlgorithmParameters::OctetKeyPair(_) => alg == Algorithm::EdDSA,
        // Registry key sets never publish shared secrets.
        AlgorithmParameters::OctetKey(_) => false,
    }
}
