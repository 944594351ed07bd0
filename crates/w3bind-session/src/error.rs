use crate::store::StoreError;
use thiserror::Error;
use w3bind_types::SessionStatus;

/// Errors returned by [`SessionManager`](crate::SessionManager).
///
/// Wallet callbacks report expected failures through
/// [`CallbackOutcome`](crate::CallbackOutcome) instead; these variants are
/// for bad requests and backend faults.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("invalid session request: {0}")]
    InvalidRequest(String),

    #[error("session {id} is {status}, not completed")]
    NotCompleted { id: String, status: SessionStatus },

    #[error("session {0} has already been used")]
    AlreadyConsumed(String),

    #[error("at least one witness session is required")]
    NoWitnessSessions,

    #[error("witness session not found: {0}")]
    WitnessNotFound(String),

    #[error("witness session is not completed: {0}")]
    NotWitnessed(String),

    #[error("witness session target mismatch: {0}")]
    WitnessTargetMismatch(String),

    #[error("failed to build deep link: {0}")]
    DeepLink(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("session store task failed: {0}")]
    Task(String),
}
