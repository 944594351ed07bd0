//! Signing-session and witness API handlers.

use crate::{api_bindings, AppState};
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use w3bind_binding::BindingError;
use w3bind_registry::RegistryError;
use w3bind_session::{
    BindingIntentRequest, CallbackOutcome, CallbackRequest, CreateSessionRequest, SessionError,
    SigningSession,
};
use w3bind_types::{Ename, SessionKind, SessionStatus};

/// Request body for `POST /api/signing/sessions`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionBody {
    #[serde(default)]
    pub kind: SessionKind,
    /// Identity the session is about.
    pub target: String,
    #[serde(default)]
    pub expected_signer: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Defaults to this server's callback endpoint.
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub binding: Option<BindingIntentRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub qr_data: String,
    pub expires_at: DateTime<Utc>,
}

/// Wallet callback body. Every field is required; they are optional here so
/// a missing one is reported as a 400 with a uniform message.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackBody {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub w3id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl CallbackBody {
    fn into_request(self) -> Option<CallbackRequest> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Some(CallbackRequest {
            session_id: present(self.session_id)?,
            signature: present(self.signature)?,
            w3id: present(self.w3id)?,
            message: present(self.message)?,
        })
    }
}

/// What the wallet sees after a callback. Always sent with `200 OK`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<CallbackOutcome> for CallbackResponse {
    fn from(outcome: CallbackOutcome) -> Self {
        Self {
            success: outcome.success,
            status: outcome.status,
            error: outcome.error,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WitnessVerifyRequest {
    pub target: String,
    #[serde(default)]
    pub session_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WitnessVerifyResponse {
    pub verified: bool,
    pub target: Ename,
    /// Signers of the witness sessions, in request order.
    pub witnesses: Vec<Ename>,
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("upstream failure: {0}")]
    BadGateway(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(_) | SessionError::WitnessNotFound(_) => {
                ApiError::NotFound(e.to_string())
            }
            SessionError::AlreadyConsumed(_) => ApiError::Conflict(e.to_string()),
            SessionError::InvalidRequest(_)
            | SessionError::NotCompleted { .. }
            | SessionError::NoWitnessSessions
            | SessionError::NotWitnessed(_)
            | SessionError::WitnessTargetMismatch(_) => ApiError::BadRequest(e.to_string()),
            SessionError::DeepLink(_) | SessionError::Store(_) | SessionError::Task(_) => {
                tracing::error!(error = %e, "session backend failure");
                ApiError::InternalServerError("session backend failure".to_string())
            }
        }
    }
}

impl From<BindingError> for ApiError {
    fn from(e: BindingError) -> Self {
        match e {
            BindingError::Registry(RegistryError::EndpointNotFound(_)) => {
                ApiError::NotFound(e.to_string())
            }
            BindingError::Registry(RegistryError::Identifier(_))
            | BindingError::Claim(_)
            | BindingError::Rejected(_) => ApiError::BadRequest(e.to_string()),
            BindingError::Registry(_) | BindingError::Vault(_) | BindingError::MissingId => {
                tracing::warn!(error = %e, "vault operation failed");
                ApiError::BadGateway(e.to_string())
            }
        }
    }
}

/// Handler for `POST /api/signing/sessions`.
pub async fn create_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<CreateSessionBody>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let callback_url = body
        .callback_url
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| state.default_callback_url());

    let session = state
        .sessions
        .create_session(CreateSessionRequest {
            kind: body.kind,
            target: body.target,
            expected_signer: body.expected_signer,
            message: body.message,
            callback_url,
            binding: body.binding,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id,
            qr_data: session.qr_data,
            expires_at: session.expires_at,
        }),
    ))
}

/// Handler for `GET /api/signing/sessions/{id}`.
pub async fn get_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SigningSession>, ApiError> {
    Ok(Json(state.sessions.get_status(&id).await?))
}

/// Handler for `POST /api/signing/callback`.
///
/// Only a body with missing fields gets a 400. Every other outcome,
/// including backend failures, is a 200 whose `success` flag tells the
/// wallet what happened.
pub async fn callback_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<CallbackBody>,
) -> Result<Json<CallbackResponse>, ApiError> {
    let request = body.into_request().ok_or_else(|| {
        ApiError::BadRequest("sessionId, signature, w3id and message are required".to_string())
    })?;

    let outcome = match state.sessions.submit_callback(request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "callback processing failed");
            return Ok(Json(CallbackResponse {
                success: false,
                status: None,
                error: Some("internal error".to_string()),
            }));
        }
    };

    if let Some(session) = outcome
        .session
        .as_ref()
        .filter(|s| s.status == SessionStatus::Completed)
    {
        api_bindings::complete_binding(&state, session).await;
    }

    Ok(Json(CallbackResponse::from(outcome)))
}

/// Handler for `POST /api/witness/verify`.
pub async fn verify_witnesses_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<WitnessVerifyRequest>,
) -> Result<Json<WitnessVerifyResponse>, ApiError> {
    let sessions = state
        .sessions
        .ensure_witnessed(&body.target, &body.session_ids)
        .await?;

    let target = sessions
        .first()
        .map(|s| s.target_ename.clone())
        .ok_or_else(|| ApiError::BadRequest("no witness sessions".to_string()))?;
    let witnesses = sessions.into_iter().filter_map(|s| s.signer).collect();

    Ok(Json(WitnessVerifyResponse {
        verified: true,
        target,
        witnesses,
    }))
}
