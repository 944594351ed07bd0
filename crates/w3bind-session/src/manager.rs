use crate::deep_link;
use crate::error::SessionError;
use crate::model::{
    now, BindingIntent, CallbackOutcome, CallbackRequest, CreateSessionRequest, SessionUpdate,
    SigningSession,
};
use crate::store::{Mutation, SessionStore, StoreError, UpdateOutcome};
use chrono::{DateTime, TimeDelta, Utc};
use futures_util::Stream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use url::Url;
use w3bind_types::{Ename, SessionKind, SessionStatus};
use w3bind_verify::SignatureVerifier;

/// How long a new session stays open when no TTL is configured.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(15 * 60);

const UPDATE_CHANNEL_CAPACITY: usize = 256;

const EXPIRED: &str = "session expired";
const NOT_FOUND: &str = "session not found";
const NOT_PENDING: &str = "session not pending";
const MESSAGE_MISMATCH: &str = "signed message does not match session";
const SIGNER_MISMATCH: &str = "unexpected signer";

/// Counts from one [`SessionManager::sweep`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Pending sessions moved to `expired`.
    pub expired: usize,
    /// Terminal sessions deleted.
    pub pruned: usize,
}

/// Owns the lifecycle of signing sessions.
///
/// Cheap to clone; clones share the store, verifier, and update channel.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn SessionStore>,
    verifier: Arc<dyn SignatureVerifier>,
    ttl: TimeDelta,
    updates: broadcast::Sender<SessionUpdate>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("ttl", &self.inner.ttl)
            .field("subscribers", &self.inner.updates.receiver_count())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        verifier: Arc<dyn SignatureVerifier>,
        ttl: Duration,
    ) -> Self {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::minutes(15));
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store,
                verifier,
                ttl,
                updates,
            }),
        }
    }

    /// Opens a new pending session and builds its deep link.
    pub async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<SigningSession, SessionError> {
        let target = Ename::normalize(&request.target)
            .map_err(|e| SessionError::InvalidRequest(format!("target: {e}")))?;
        let expected_signer = request
            .expected_signer
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(Ename::normalize)
            .transpose()
            .map_err(|e| SessionError::InvalidRequest(format!("expectedSigner: {e}")))?;
        Url::parse(&request.callback_url)
            .map_err(|e| SessionError::InvalidRequest(format!("callbackUrl: {e}")))?;
        let binding = request
            .binding
            .map(|b| {
                if b.document_id.trim().is_empty() {
                    return Err(SessionError::InvalidRequest(
                        "binding.documentId is required".to_string(),
                    ));
                }
                Ok(BindingIntent {
                    vault_owner: Ename::normalize(&b.vault_owner).map_err(|e| {
                        SessionError::InvalidRequest(format!("binding.vaultOwner: {e}"))
                    })?,
                    document_id: b.document_id,
                })
            })
            .transpose()?;
        if let Some(intent) = &binding {
            match &expected_signer {
                Some(signer) if *signer == intent.vault_owner => {}
                Some(_) => {
                    return Err(SessionError::InvalidRequest(
                        "expectedSigner must be the binding vault owner".to_string(),
                    ))
                }
                None => {
                    return Err(SessionError::InvalidRequest(
                        "binding requires expectedSigner".to_string(),
                    ))
                }
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        let message = match request.kind {
            SessionKind::Witness => id.clone(),
            SessionKind::Sign => request
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| id.clone()),
        };
        let qr_data = deep_link::build(
            &id,
            request.kind,
            &message,
            &target,
            expected_signer.as_ref(),
            &request.callback_url,
        )?;

        let created_at = now();
        let session = SigningSession {
            id,
            kind: request.kind,
            target_ename: target,
            expected_signer,
            message,
            qr_data,
            created_at,
            expires_at: created_at + self.inner.ttl,
            updated_at: created_at,
            status: SessionStatus::Pending,
            signer: None,
            signature: None,
            public_key: None,
            error: None,
            binding,
            consumed_at: None,
        };

        let stored = session.clone();
        self.with_store(move |store| store.create(&stored)).await?;
        tracing::info!(
            session_id = %session.id,
            kind = session.kind.as_str(),
            target = %session.target_ename,
            expires_at = %session.expires_at,
            "signing session created"
        );
        Ok(session)
    }

    /// Returns the session, expiring it first if its deadline has passed.
    pub async fn get_status(&self, id: &str) -> Result<SigningSession, SessionError> {
        self.find(id)
            .await?
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    async fn find(&self, id: &str) -> Result<Option<SigningSession>, SessionError> {
        let key = id.to_string();
        let Some(session) = self.with_store(move |store| store.get(&key)).await? else {
            return Ok(None);
        };
        if !session.is_overdue(now()) {
            return Ok(Some(session));
        }
        match self.expire(id).await? {
            UpdateOutcome::Applied(s) | UpdateOutcome::StatusMismatch(s) => Ok(Some(s)),
            UpdateOutcome::NotFound => Ok(None),
        }
    }

    async fn expire(&self, id: &str) -> Result<UpdateOutcome, SessionError> {
        let outcome = self
            .transition(
                id,
                Box::new(|s: &mut SigningSession| {
                    s.status = SessionStatus::Expired;
                    s.error = Some(EXPIRED.to_string());
                }),
            )
            .await?;
        if let UpdateOutcome::Applied(s) = &outcome {
            tracing::info!(session_id = %s.id, "signing session expired");
        }
        Ok(outcome)
    }

    /// Compare-and-set from `pending`, publishing the change when applied.
    async fn transition(&self, id: &str, mutation: Mutation) -> Result<UpdateOutcome, SessionError> {
        let key = id.to_string();
        let outcome = self
            .with_store(move |store| store.update(&key, SessionStatus::Pending, mutation))
            .await?;
        if let UpdateOutcome::Applied(session) = &outcome {
            // No receivers is fine.
            let _ = self.inner.updates.send(SessionUpdate::from(session));
        }
        Ok(outcome)
    }

    /// Processes a wallet callback.
    ///
    /// Checks run in a fixed order: existence, expiry, pending status,
    /// signed message, expected signer, then signature verification. The
    /// terminal write is a compare-and-set from `pending`, so of two racing
    /// callbacks exactly one lands and the other reports the session as not
    /// pending.
    #[tracing::instrument(skip(self, request), fields(session_id = %request.session_id))]
    pub async fn submit_callback(
        &self,
        request: CallbackRequest,
    ) -> Result<CallbackOutcome, SessionError> {
        let Some(session) = self.find(&request.session_id).await? else {
            return Ok(CallbackOutcome::failed(None, NOT_FOUND));
        };

        match session.status {
            SessionStatus::Pending => {}
            SessionStatus::Expired => {
                return Ok(CallbackOutcome::failed(Some(SessionStatus::Expired), EXPIRED));
            }
            other => return Ok(CallbackOutcome::failed(Some(other), NOT_PENDING)),
        }

        if request.message != session.message {
            tracing::warn!("callback signed a different message");
            return self
                .reject(&session.id, SessionStatus::SecurityViolation, MESSAGE_MISMATCH)
                .await;
        }

        if let Some(expected) = &session.expected_signer {
            if !expected.matches(&request.w3id) {
                tracing::warn!(expected = %expected, got = %request.w3id, "callback from unexpected signer");
                return self
                    .reject(&session.id, SessionStatus::SecurityViolation, SIGNER_MISMATCH)
                    .await;
            }
        }

        let result = self
            .inner
            .verifier
            .verify(&request.w3id, &request.signature, &request.message)
            .await;

        if !result.valid {
            let reason = result
                .error
                .unwrap_or_else(|| "signature verification failed".to_string());
            tracing::warn!(reason = %reason, "callback signature rejected");
            return self.reject(&session.id, SessionStatus::Rejected, &reason).await;
        }

        let signer = match Ename::normalize(&request.w3id) {
            Ok(signer) => signer,
            Err(e) => {
                return self
                    .reject(&session.id, SessionStatus::Rejected, &e.to_string())
                    .await
            }
        };

        let success = session.kind.success_status();
        let signature = request.signature;
        let public_key = result.public_key;
        let outcome = self
            .transition(
                &session.id,
                Box::new(move |s: &mut SigningSession| {
                    s.status = success;
                    s.signer = Some(signer);
                    s.signature = Some(signature);
                    s.public_key = public_key;
                    s.error = None;
                }),
            )
            .await?;

        Ok(match outcome {
            UpdateOutcome::Applied(s) => {
                tracing::info!(status = %s.status, signer = ?s.signer, "signing session finished");
                CallbackOutcome::accepted(s)
            }
            UpdateOutcome::StatusMismatch(s) => CallbackOutcome::failed(Some(s.status), NOT_PENDING),
            UpdateOutcome::NotFound => CallbackOutcome::failed(None, NOT_FOUND),
        })
    }

    async fn reject(
        &self,
        id: &str,
        status: SessionStatus,
        reason: &str,
    ) -> Result<CallbackOutcome, SessionError> {
        let error = reason.to_string();
        let outcome = self
            .transition(
                id,
                Box::new(move |s: &mut SigningSession| {
                    s.status = status;
                    s.error = Some(error);
                }),
            )
            .await?;
        Ok(match outcome {
            UpdateOutcome::Applied(s) => CallbackOutcome::failed(Some(s.status), reason),
            UpdateOutcome::StatusMismatch(s) => CallbackOutcome::failed(Some(s.status), NOT_PENDING),
            UpdateOutcome::NotFound => CallbackOutcome::failed(None, NOT_FOUND),
        })
    }

    /// Spends a completed session's signature on one vault write.
    ///
    /// The mark is set inside the store's compare-and-set, so of two racing
    /// callers exactly one gets the session back.
    pub async fn consume(&self, id: &str) -> Result<SigningSession, SessionError> {
        let won = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&won);
        let key = id.to_string();
        let outcome = self
            .with_store(move |store| {
                store.update(
                    &key,
                    SessionStatus::Completed,
                    Box::new(move |s: &mut SigningSession| {
                        if s.consumed_at.is_none() {
                            s.consumed_at = Some(now());
                            flag.store(true, Ordering::SeqCst);
                        }
                    }),
                )
            })
            .await?;

        match outcome {
            UpdateOutcome::Applied(s) if won.load(Ordering::SeqCst) => {
                tracing::debug!(session_id = %s.id, "signing session consumed");
                Ok(s)
            }
            UpdateOutcome::Applied(s) => Err(SessionError::AlreadyConsumed(s.id)),
            UpdateOutcome::StatusMismatch(s) => Err(SessionError::NotCompleted {
                id: s.id,
                status: s.status,
            }),
            UpdateOutcome::NotFound => Err(SessionError::NotFound(id.to_string())),
        }
    }

    /// Undoes [`consume`](Self::consume) after the vault write failed.
    pub async fn release(&self, id: &str) -> Result<(), SessionError> {
        let key = id.to_string();
        self.with_store(move |store| {
            store.update(
                &key,
                SessionStatus::Completed,
                Box::new(|s: &mut SigningSession| s.consumed_at = None),
            )
        })
        .await?;
        Ok(())
    }

    /// Checks that every session in `ids` is a witnessed session about
    /// `target`.
    pub async fn ensure_witnessed(
        &self,
        target: &str,
        ids: &[String],
    ) -> Result<Vec<SigningSession>, SessionError> {
        let target = Ename::normalize(target)
            .map_err(|e| SessionError::InvalidRequest(format!("target: {e}")))?;
        if ids.is_empty() {
            return Err(SessionError::NoWitnessSessions);
        }

        let mut sessions = Vec::with_capacity(ids.len());
        for id in ids {
            let session = self
                .find(id)
                .await?
                .ok_or_else(|| SessionError::WitnessNotFound(id.clone()))?;
            if session.status != SessionStatus::Witnessed {
                return Err(SessionError::NotWitnessed(id.clone()));
            }
            if session.target_ename != target {
                return Err(SessionError::WitnessTargetMismatch(id.clone()));
            }
            sessions.push(session);
        }
        Ok(sessions)
    }

    /// Streams status updates for one session.
    ///
    /// The first item is always the current status. The stream ends after a
    /// terminal status, and a pending session's stream reports `expired` at
    /// its deadline even if nothing else reads the session.
    pub async fn subscribe(
        &self,
        id: &str,
    ) -> Result<impl Stream<Item = SessionUpdate> + Send + 'static, SessionError> {
        // Subscribe before reading so no change between the two is missed.
        let updates = BroadcastStream::new(self.inner.updates.subscribe());
        let session = self.get_status(id).await?;

        let watch = Watch {
            manager: self.clone(),
            id: session.id.clone(),
            deadline: session.expires_at,
            updates,
            first: Some(SessionUpdate::from(&session)),
            finished: false,
        };
        Ok(futures_util::stream::unfold(watch, Watch::next))
    }

    /// Expires overdue pending sessions and deletes terminal sessions last
    /// touched more than `retention` ago.
    pub async fn sweep(&self, retention: Duration) -> Result<SweepReport, SessionError> {
        let started = now();
        let overdue = self.with_store(move |store| store.overdue(started)).await?;

        let mut report = SweepReport::default();
        for id in overdue {
            if matches!(self.expire(&id).await?, UpdateOutcome::Applied(_)) {
                report.expired += 1;
            }
        }

        let cutoff = TimeDelta::from_std(retention)
            .ok()
            .and_then(|r| started.checked_sub_signed(r));
        if let Some(before) = cutoff {
            report.pruned = self.with_store(move |store| store.prune_expired(before)).await?;
        }

        if report != SweepReport::default() {
            tracing::debug!(expired = report.expired, pruned = report.pruned, "session sweep");
        }
        Ok(report)
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl.to_std().unwrap_or(DEFAULT_SESSION_TTL)
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T, SessionError>
    where
        F: FnOnce(&dyn SessionStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.inner.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| SessionError::Task(e.to_string()))?
            .map_err(SessionError::from)
    }
}

struct Watch {
    manager: SessionManager,
    id: String,
    deadline: DateTime<Utc>,
    updates: BroadcastStream<SessionUpdate>,
    first: Option<SessionUpdate>,
    finished: bool,
}

impl Watch {
    async fn next(mut self) -> Option<(SessionUpdate, Self)> {
        if self.finished {
            return None;
        }
        if let Some(update) = self.first.take() {
            self.finished = update.status.is_terminal();
            return Some((update, self));
        }

        loop {
            let wait = (self.deadline - Utc::now()).to_std().unwrap_or_default()
                + Duration::from_millis(1);
            match tokio::time::timeout(wait, self.updates.next()).await {
                Ok(Some(Ok(update))) => {
                    if update.session_id != self.id {
                        continue;
                    }
                    self.finished = update.status.is_terminal();
                    return Some((update, self));
                }
                Ok(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    tracing::warn!(session_id = %self.id, skipped, "session update stream lagged, re-reading");
                    if let Some(update) = self.reread().await? {
                        return Some((update, self));
                    }
                }
                Ok(None) => return None,
                // Deadline passed with no update.
                Err(_) => {
                    if let Some(update) = self.reread().await? {
                        return Some((update, self));
                    }
                }
            }
        }
    }

    /// Reads the session directly. `Some(Some(_))` carries a terminal update.
    async fn reread(&mut self) -> Option<Option<SessionUpdate>> {
        let session = self.manager.find(&self.id).await.ok().flatten()?;
        if session.status.is_terminal() {
            self.finished = true;
            Some(Some(SessionUpdate::from(&session)))
        } else {
            Some(None)
        }
    }
}
