use crate::certificate;
use crate::key::{import_public_key, verify_p256};
use async_trait::async_trait;
use w3bind_types::{Ename, VerificationResult};
use w3bind_vault::VaultClient;

const NO_CERTIFICATES: &str = "no key binding certificates published";
const ALL_FAILED: &str = "all certificates failed";
const SIGNATURE_MISMATCH: &str = "signature verification failed";

/// Something that can check a wallet signature against an identity.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Verifies that `signature` over `payload` was produced by a key bound
    /// to `identifier`.
    ///
    /// Never fails: every problem is reported as an invalid result.
    async fn verify(&self, identifier: &str, signature: &str, payload: &str)
        -> VerificationResult;
}

/// Verifies signatures using the key-binding certificates an identity's
/// vault publishes, validated against the registry's key set.
#[derive(Debug, Clone)]
pub struct CertificateVerifier {
    vault: VaultClient,
    strict: bool,
}

impl CertificateVerifier {
    /// Creates a verifier.
    ///
    /// With `strict` unset, an identity that publishes no certificates is
    /// accepted without a key check and the result carries no public key.
    pub fn new(vault: VaultClient, strict: bool) -> Self {
        Self { vault, strict }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

#[async_trait]
impl SignatureVerifier for CertificateVerifier {
    #[tracing::instrument(skip(self, signature, payload), fields(strict = self.strict))]
    async fn verify(
        &self,
        identifier: &str,
        signature: &str,
        payload: &str,
    ) -> VerificationResult {
        let Ok(ename) = Ename::normalize(identifier) else {
            return VerificationResult::invalid("eName is required");
        };
        if signature.is_empty() {
            return VerificationResult::invalid("signature is required");
        }
        if payload.is_empty() {
            return VerificationResult::invalid("payload is required");
        }

        let registry = self.vault.registry();
        let endpoint = match registry.resolve_endpoint(ename.as_str()).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                tracing::warn!(ename = %ename, error = %e, "vault resolution failed");
                return VerificationResult::invalid(e.to_string());
            }
        };

        let certificates = match self.vault.whois(&endpoint, &ename).await {
            Ok(certs) => certs,
            Err(e) => {
                tracing::warn!(ename = %ename, error = %e, "whois lookup failed");
                return VerificationResult::invalid(e.to_string());
            }
        };

        if certificates.is_empty() {
            if self.strict {
                tracing::warn!(ename = %ename, "no key binding certificates, rejecting");
                return VerificationResult::invalid(NO_CERTIFICATES);
            }
            tracing::info!(ename = %ename, "no key binding certificates, accepting unenforced");
            return VerificationResult::unenforced();
        }

        let keys = match registry.public_key_set().await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "registry key set unavailable");
                return VerificationResult::invalid(e.to_string());
            }
        };

        let signature_bytes = match w3bind_codec::decode_signature(signature) {
            Ok(bytes) => bytes,
            Err(e) => return VerificationResult::invalid(e.to_string()),
        };

        let mut last_error: Option<String> = None;
        for (index, token) in certificates.iter().enumerate() {
            let claims = match certificate::validate(token, &keys) {
                Ok(claims) => claims,
                Err(e) => {
                    tracing::debug!(index, error = %e, "certificate rejected");
                    last_error = Some(e.to_string());
                    continue;
                }
            };

            if !ename.matches(&claims.ename) {
                tracing::debug!(index, bound_to = %claims.ename, "certificate bound to another identity");
                last_error = Some(format!(
                    "certificate is bound to {}, not {ename}",
                    claims.ename
                ));
                continue;
            }

            let key_bytes = match w3bind_codec::decode_key(&claims.public_key) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::debug!(index, error = %e, "certificate key undecodable");
                    last_error = Some(e.to_string());
                    continue;
                }
            };

            let Some(key) = import_public_key(&key_bytes) else {
                tracing::debug!(index, "certificate key is not a P-256 key");
                last_error = Some("public key is not a valid P-256 key".to_string());
                continue;
            };

            if verify_p256(&key, payload.as_bytes(), &signature_bytes) {
                tracing::info!(ename = %ename, index, "signature verified");
                return VerificationResult::verified(claims.public_key);
            }
            tracing::debug!(index, "signature does not match certificate key");
            last_error = Some(SIGNATURE_MISMATCH.to_string());
        }

        let reason = last_error.unwrap_or_else(|| ALL_FAILED.to_string());
        tracing::warn!(ename = %ename, reason = %reason, "signature rejected");
        VerificationResult::invalid(reason)
    }
}
