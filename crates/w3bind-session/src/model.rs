use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use w3bind_types::{Ename, SessionKind, SessionStatus};

/// Current time at the millisecond precision sessions are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// A document that receives the verified signature once the session
/// completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingIntent {
    /// Owner of the vault holding the document.
    pub vault_owner: Ename,
    /// Id of the binding document to countersign.
    pub document_id: String,
}

/// One short-lived request for a wallet signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningSession {
    pub id: String,
    pub kind: SessionKind,
    pub target_ename: Ename,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_signer: Option<Ename>,
    /// The exact string the wallet must sign.
    pub message: String,
    /// Deep link rendered as a QR code for the wallet.
    pub qr_data: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<Ename>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<BindingIntent>,
    /// Set once the signature has been spent on a vault write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumed_at: Option<DateTime<Utc>>,
}

impl SigningSession {
    /// True if the session is still pending but its deadline has passed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Pending && now > self.expires_at
    }
}

/// Parameters for a new session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub kind: SessionKind,
    /// Identity the session is about.
    pub target: String,
    /// Only this identity may complete the session, when set.
    #[serde(default)]
    pub expected_signer: Option<String>,
    /// Message to sign. Defaults to the session id; witness sessions always
    /// sign the id.
    #[serde(default)]
    pub message: Option<String>,
    /// Where the wallet posts its callback.
    pub callback_url: String,
    #[serde(default)]
    pub binding: Option<BindingIntentRequest>,
}

/// Unvalidated form of [`BindingIntent`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingIntentRequest {
    pub vault_owner: String,
    pub document_id: String,
}

/// What the wallet posts back after signing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackRequest {
    pub session_id: String,
    pub signature: String,
    pub w3id: String,
    pub message: String,
}

/// Result of processing a wallet callback.
///
/// Expected failures (unknown session, wrong signer, bad signature) are
/// reported here rather than as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub success: bool,
    /// Session status after the callback, when the session exists.
    pub status: Option<SessionStatus>,
    pub error: Option<String>,
    /// The session as stored after the callback.
    pub session: Option<SigningSession>,
}

impl CallbackOutcome {
    pub(crate) fn accepted(session: SigningSession) -> Self {
        Self {
            success: true,
            status: Some(session.status),
            error: None,
            session: Some(session),
        }
    }

    pub(crate) fn failed(status: Option<SessionStatus>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            status,
            error: Some(error.into()),
            session: None,
        }
    }
}

/// A status change published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub session_id: String,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer: Option<Ename>,
}

impl From<&SigningSession> for SessionUpdate {
    fn from(session: &SigningSession) -> Self {
        Self {
            session_id: session.id.clone(),
            status: session.status,
            error: session.error.clone(),
            signer: session.signer.clone(),
        }
    }
}
