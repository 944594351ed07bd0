//! Session persistence.
//!
//! Stores are synchronous; the manager calls them from blocking tasks. Every
//! status change goes through [`SessionStore::update`], a compare-and-set on
//! the stored status, so two writers racing to finish the same session
//! cannot both succeed.

mod memory;
mod sqlite;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

use crate::model::SigningSession;
use chrono::{DateTime, Utc};
use thiserror::Error;
use w3bind_types::SessionStatus;

/// A change applied to a session under the store's compare-and-set.
pub type Mutation = Box<dyn FnOnce(&mut SigningSession) + Send>;

/// Result of a compare-and-set update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The mutation ran; carries the stored result.
    Applied(SigningSession),
    /// The session exists but its status was not the expected one.
    StatusMismatch(SigningSession),
    /// No session has this id.
    NotFound,
}

/// Errors from a session store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {0} already exists")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error(transparent)]
    PoolInit(#[from] w3bind_db::PoolError),

    #[error(transparent)]
    Migration(#[from] w3bind_db::MigrationError),

    #[error("corrupt session row {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("session store lock poisoned")]
    Poisoned,
}

/// Backend for signing sessions.
pub trait SessionStore: Send + Sync + 'static {
    /// Inserts a new session.
    fn create(&self, session: &SigningSession) -> Result<(), StoreError>;

    /// Fetches a session by id.
    fn get(&self, id: &str) -> Result<Option<SigningSession>, StoreError>;

    /// Applies `mutation` only if the stored status equals `expected`.
    ///
    /// The mutation sees the stored session; `updated_at` is stamped after
    /// it runs.
    fn update(
        &self,
        id: &str,
        expected: SessionStatus,
        mutation: Mutation,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Ids of pending sessions whose deadline is before `now`.
    fn overdue(&self, now: DateTime<Utc>) -> Result<Vec<String>, StoreError>;

    /// Deletes terminal sessions last updated before `before`; returns the
    /// number removed.
    fn prune_expired(&self, before: DateTime<Utc>) -> Result<usize, StoreError>;
}
