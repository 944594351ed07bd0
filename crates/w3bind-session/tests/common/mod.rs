#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use w3bind_session::{CreateSessionRequest, SessionManager, SessionStore};
use w3bind_types::VerificationResult;
use w3bind_verify::SignatureVerifier;

/// Accepts exactly the signature `"good"`, optionally after a delay.
#[derive(Default)]
pub struct StubVerifier {
    pub calls: AtomicUsize,
    pub delay: Duration,
}

#[async_trait]
impl SignatureVerifier for StubVerifier {
    async fn verify(&self, identifier: &str, signature: &str, _payload: &str) -> VerificationResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if signature == "good" {
            VerificationResult::verified(format!("zkey-of-{identifier}"))
        } else {
            VerificationResult::invalid("signature verification failed")
        }
    }
}

pub fn manager(store: Arc<dyn SessionStore>, ttl: Duration) -> (SessionManager, Arc<StubVerifier>) {
    manager_with(store, ttl, StubVerifier::default())
}

pub fn manager_with(
    store: Arc<dyn SessionStore>,
    ttl: Duration,
    verifier: StubVerifier,
) -> (SessionManager, Arc<StubVerifier>) {
    let verifier = Arc::new(verifier);
    (SessionManager::new(store, verifier.clone(), ttl), verifier)
}

pub fn sign_request(target: &str) -> CreateSessionRequest {
    CreateSessionRequest {
        target: target.to_string(),
        callback_url: "https://platform.test/api/signing/callback".to_string(),
        ..Default::default()
    }
}
