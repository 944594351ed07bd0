use super::{Mutation, SessionStore, StoreError, UpdateOutcome};
use crate::model::{now, BindingIntent, SigningSession};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use w3bind_db::{create_pool, run_migrations, DbPool, DbRuntimeSettings};
use w3bind_types::{Ename, SessionStatus};

const COLUMNS: &str = "id, kind, target_ename, expected_signer, message, qr_data, \
     created_at, expires_at, updated_at, status, signer, signature, public_key, error, \
     binding_vault_owner, binding_document_id, consumed_at";

/// Session store backed by SQLite.
///
/// Several server instances may share one database file; the
/// compare-and-set in [`SessionStore::update`] runs inside an immediate
/// transaction, so it holds the write lock from read to write.
#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    pool: DbPool,
}

impl SqliteSessionStore {
    /// Wraps an existing pool. The schema must already be migrated.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Opens (or creates) the database at `path` and applies migrations.
    pub fn open(path: &str, settings: DbRuntimeSettings) -> Result<Self, StoreError> {
        let pool = create_pool(path, settings)?;
        let conn = pool.get()?;
        let applied = run_migrations(&conn)?;
        tracing::info!(path, applied, "session database ready");
        drop(conn);
        Ok(Self { pool })
    }
}

/// A row as stored, before validation.
struct RawSession {
    id: String,
    kind: String,
    target_ename: String,
    expected_signer: Option<String>,
    message: String,
    qr_data: String,
    created_at: i64,
    expires_at: i64,
    updated_at: i64,
    status: String,
    signer: Option<String>,
    signature: Option<String>,
    public_key: Option<String>,
    error: Option<String>,
    binding_vault_owner: Option<String>,
    binding_document_id: Option<String>,
    consumed_at: Option<i64>,
}

impl RawSession {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            target_ename: row.get(2)?,
            expected_signer: row.get(3)?,
            message: row.get(4)?,
            qr_data: row.get(5)?,
            created_at: row.get(6)?,
            expires_at: row.get(7)?,
            updated_at: row.get(8)?,
            status: row.get(9)?,
            signer: row.get(10)?,
            signature: row.get(11)?,
            public_key: row.get(12)?,
            error: row.get(13)?,
            binding_vault_owner: row.get(14)?,
            binding_document_id: row.get(15)?,
            consumed_at: row.get(16)?,
        })
    }

    fn into_session(self) -> Result<SigningSession, StoreError> {
        let id = self.id;
        let corrupt = |reason: String| StoreError::Corrupt {
            id: id.clone(),
            reason,
        };
        let ename = |raw: &str| Ename::normalize(raw).map_err(|e| corrupt(e.to_string()));
        let time = |ms: i64| {
            DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| corrupt(format!("timestamp out of range: {ms}")))
        };

        let binding = match (self.binding_vault_owner, self.binding_document_id) {
            (Some(owner), Some(document_id)) => Some(BindingIntent {
                vault_owner: ename(&owner)?,
                document_id,
            }),
            _ => None,
        };

        Ok(SigningSession {
            kind: self.kind.parse().map_err(|e| corrupt(format!("{e}")))?,
            target_ename: ename(&self.target_ename)?,
            expected_signer: self.expected_signer.as_deref().map(ename).transpose()?,
            message: self.message,
            qr_data: self.qr_data,
            created_at: time(self.created_at)?,
            expires_at: time(self.expires_at)?,
            updated_at: time(self.updated_at)?,
            status: self.status.parse().map_err(|e| corrupt(format!("{e}")))?,
            signer: self.signer.as_deref().map(ename).transpose()?,
            signature: self.signature,
            public_key: self.public_key,
            error: self.error,
            binding,
            consumed_at: self.consumed_at.map(time).transpose()?,
            id: id.clone(),
        })
    }
}

fn select(conn: &Connection, id: &str) -> Result<Option<SigningSession>, StoreError> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM signing_sessions WHERE id = ?1"),
            [id],
            RawSession::from_row,
        )
        .optional()?;
    raw.map(RawSession::into_session).transpose()
}

impl SessionStore for SqliteSessionStore {
    fn create(&self, session: &SigningSession) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        let inserted = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO signing_sessions ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
            ),
            params![
                session.id,
                session.kind.as_str(),
                session.target_ename.as_str(),
                session.expected_signer.as_ref().map(Ename::as_str),
                session.message,
                session.qr_data,
                session.created_at.timestamp_millis(),
                session.expires_at.timestamp_millis(),
                session.updated_at.timestamp_millis(),
                session.status.as_str(),
                session.signer.as_ref().map(Ename::as_str),
                session.signature,
                session.public_key,
                session.error,
                session.binding.as_ref().map(|b| b.vault_owner.as_str()),
                session.binding.as_ref().map(|b| b.document_id.as_str()),
                session.consumed_at.map(|t| t.timestamp_millis()),
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::Duplicate(session.id.clone()));
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<SigningSession>, StoreError> {
        let conn = self.pool.get()?;
        select(&conn, id)
    }

    fn update(
        &self,
        id: &str,
        expected: SessionStatus,
        mutation: Mutation,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(mut session) = select(&tx, id)? else {
            return Ok(UpdateOutcome::NotFound);
        };
        if session.status != expected {
            return Ok(UpdateOutcome::StatusMismatch(session));
        }

        mutation(&mut session);
        session.updated_at = now();

        tx.execute(
            "UPDATE signing_sessions
             SET status = ?2, signer = ?3, signature = ?4, public_key = ?5, error = ?6,
                 updated_at = ?7, consumed_at = ?8
             WHERE id = ?1 AND status = ?9",
            params![
                session.id,
                session.status.as_str(),
                session.signer.as_ref().map(Ename::as_str),
                session.signature,
                session.public_key,
                session.error,
                session.updated_at.timestamp_millis(),
                session.consumed_at.map(|t| t.timestamp_millis()),
                expected.as_str(),
            ],
        )?;
        tx.commit()?;
        Ok(UpdateOutcome::Applied(session))
    }

    fn overdue(&self, now: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id FROM signing_sessions WHERE status = 'pending' AND expires_at < ?1",
        )?;
        let ids = stmt
            .query_map([now.timestamp_millis()], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn prune_expired(&self, before: DateTime<Utc>) -> Result<usize, StoreError> {
        let conn = self.pool.get()?;
        let removed = conn.execute(
            "DELETE FROM signing_sessions WHERE status != 'pending' AND updated_at < ?1",
            [before.timestamp_millis()],
        )?;
        Ok(removed)
    }
}
