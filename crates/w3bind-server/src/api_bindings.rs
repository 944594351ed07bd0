//! Binding document handlers.
//!
//! Reads go straight to the owner's vault. Writes spend a completed signing
//! session, so the signature they carry has already been verified and is
//! used once.

use crate::api::ApiError;
use crate::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use w3bind_binding::SocialConnection;
use w3bind_session::{BindingIntent, SigningSession};
use w3bind_types::{BindingDocument, Ename, SessionStatus};

#[derive(Debug, Serialize, Deserialize)]
pub struct PendingResponse {
    pub documents: Vec<BindingDocument>,
}

#[derive(Debug, Serialize)]
pub struct ConnectionsResponse {
    pub connections: Vec<SocialConnection>,
}

/// Request body for `POST /api/bindings/{ename}/documents`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    /// A completed sign session whose signer vouches for the vault owner.
    pub session_id: String,
    /// Claim data; `name` is required.
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentResponse {
    pub document_id: String,
}

fn parse_ename(raw: &str) -> Result<Ename, ApiError> {
    Ename::normalize(raw).map_err(|e| ApiError::BadRequest(format!("ename: {e}")))
}

/// Handler for `GET /api/bindings/{ename}/pending`.
pub async fn pending_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(ename): Path<String>,
) -> Result<Json<PendingResponse>, ApiError> {
    let ename = parse_ename(&ename)?;
    let vault = state.bindings.resolve(&ename).await?;
    let documents = state.bindings.fetch_unsigned_documents(&vault, &ename).await?;
    Ok(Json(PendingResponse { documents }))
}

/// Handler for `GET /api/bindings/{ename}/connections`.
pub async fn connections_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(ename): Path<String>,
) -> Result<Json<ConnectionsResponse>, ApiError> {
    let ename = parse_ename(&ename)?;
    let vault = state.bindings.resolve(&ename).await?;
    let connections = state.bindings.list_social_connections(&vault, &ename).await?;
    Ok(Json(ConnectionsResponse { connections }))
}

/// Handler for `POST /api/bindings/{ename}/documents`.
///
/// Writes a social-connection claim about `ename` into its vault, signed by
/// the signer of the referenced session. The session must be about `ename`
/// and is spent by the write.
pub async fn create_document_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(ename): Path<String>,
    Json(body): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<CreateDocumentResponse>), ApiError> {
    let owner = parse_ename(&ename)?;
    let session = state.sessions.get_status(&body.session_id).await?;
    if session.status != SessionStatus::Completed {
        return Err(ApiError::BadRequest(format!(
            "session {} is {}, not completed",
            session.id, session.status
        )));
    }
    if session.target_ename != owner {
        return Err(ApiError::BadRequest(format!(
            "session {} is about {}, not {owner}",
            session.id, session.target_ename
        )));
    }
    let (Some(signer), Some(signature)) = (session.signer.as_ref(), session.signature.as_deref())
    else {
        return Err(ApiError::BadRequest(format!(
            "session {} carries no signature",
            session.id
        )));
    };
    if *signer == owner {
        return Err(ApiError::BadRequest(
            "an identity cannot vouch for itself".to_string(),
        ));
    }
    require_bound_key(&state, &session)?;

    state.sessions.consume(&session.id).await?;
    let created = async {
        let vault = state.bindings.resolve(&owner).await?;
        state
            .bindings
            .create_document(&vault, &owner, signer, &owner, &body.data, signature)
            .await
    }
    .await;

    match created {
        Ok(document_id) => Ok((
            StatusCode::CREATED,
            Json(CreateDocumentResponse { document_id }),
        )),
        Err(e) => {
            release(&state, &session.id).await;
            Err(e.into())
        }
    }
}

/// Handler for `DELETE /api/bindings/{ename}/documents/{documentId}`.
///
/// Declining a claim removes it from the owner's vault.
pub async fn decline_document_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((ename, document_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let owner = parse_ename(&ename)?;
    let vault = state.bindings.resolve(&owner).await?;
    state
        .bindings
        .delete_document(&vault, &owner, &document_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Appends the verified signature of a completed session to the document
/// named by its binding intent.
///
/// Failures are logged; the wallet callback has already succeeded and the
/// session keeps its status.
pub async fn complete_binding(state: &AppState, session: &SigningSession) {
    let Some(intent) = session.binding.as_ref() else {
        return;
    };

    match countersign(state, session, intent).await {
        Ok(()) => tracing::info!(
            session_id = %session.id,
            document_id = %intent.document_id,
            vault_owner = %intent.vault_owner,
            "binding document countersigned"
        ),
        Err(e) => tracing::warn!(
            session_id = %session.id,
            document_id = %intent.document_id,
            vault_owner = %intent.vault_owner,
            error = %e,
            "failed to countersign binding document"
        ),
    }
}

/// Only the vault owner countersigns, and only a social-connection claim
/// about them that they have not signed yet.
async fn countersign(
    state: &AppState,
    session: &SigningSession,
    intent: &BindingIntent,
) -> Result<(), ApiError> {
    let (Some(signer), Some(signature)) = (session.signer.as_ref(), session.signature.as_deref())
    else {
        return Err(ApiError::BadRequest(format!(
            "session {} carries no signature",
            session.id
        )));
    };
    if *signer != intent.vault_owner {
        return Err(ApiError::Forbidden(format!(
            "{signer} cannot countersign in the vault of {}",
            intent.vault_owner
        )));
    }
    require_bound_key(state, session)?;

    let vault = state.bindings.resolve(&intent.vault_owner).await?;
    let pending = state
        .bindings
        .fetch_unsigned_documents(&vault, &intent.vault_owner)
        .await?;
    if !pending.iter().any(|d| d.id == intent.document_id) {
        return Err(ApiError::NotFound(format!(
            "no pending claim {} for {}",
            intent.document_id, intent.vault_owner
        )));
    }

    state.sessions.consume(&session.id).await?;
    let appended = state
        .bindings
        .add_counterparty_signature(
            &vault,
            &intent.vault_owner,
            signer,
            &intent.document_id,
            signature,
        )
        .await;
    if let Err(e) = appended {
        release(state, &session.id).await;
        return Err(e.into());
    }
    Ok(())
}

/// Vault writes need a signature checked against a bound key unless the
/// server is configured to accept unenforced verifications.
fn require_bound_key(state: &AppState, session: &SigningSession) -> Result<(), ApiError> {
    if session.public_key.is_none() && !state.allow_unenforced_writes {
        return Err(ApiError::Forbidden(format!(
            "session {} was verified without a bound key",
            session.id
        )));
    }
    Ok(())
}

async fn release(state: &AppState, session_id: &str) {
    if let Err(e) = state.sessions.release(session_id).await {
        tracing::warn!(session_id = %session_id, error = %e, "failed to release session");
    }
}
