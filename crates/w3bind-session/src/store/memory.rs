use super::{Mutation, SessionStore, StoreError, UpdateOutcome};
use crate::model::{now, SigningSession};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use w3bind_types::SessionStatus;

/// Process-local session store.
///
/// Sessions do not survive a restart and are not shared between instances.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SigningSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn create(&self, session: &SigningSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::Poisoned)?;
        if sessions.contains_key(&session.id) {
            return Err(StoreError::Duplicate(session.id.clone()));
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<SigningSession>, StoreError> {
        let sessions = self.sessions.read().map_err(|_| StoreError::Poisoned)?;
        Ok(sessions.get(id).cloned())
    }

    fn update(
        &self,
        id: &str,
        expected: SessionStatus,
        mutation: Mutation,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::Poisoned)?;
        let Some(session) = sessions.get_mut(id) else {
            return Ok(UpdateOutcome::NotFound);
        };
        if session.status != expected {
            return Ok(UpdateOutcome::StatusMismatch(session.clone()));
        }
        mutation(session);
        session.updated_at = now();
        Ok(UpdateOutcome::Applied(session.clone()))
    }

    fn overdue(&self, now: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let sessions = self.sessions.read().map_err(|_| StoreError::Poisoned)?;
        Ok(sessions
            .values()
            .filter(|s| s.is_overdue(now))
            .map(|s| s.id.clone())
            .collect())
    }

    fn prune_expired(&self, before: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::Poisoned)?;
        let initial = sessions.len();
        sessions.retain(|_, s| !(s.status.is_terminal() && s.updated_at < before));
        Ok(initial - sessions.len())
    }
}
