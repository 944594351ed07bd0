use crate::error::BindingError;
use crate::queries::{
    self, BindingDocumentsData, CreateData, DeleteData, SignatureData, BINDING_DOCUMENTS,
    CREATE_BINDING_DOCUMENT, CREATE_BINDING_DOCUMENT_SIGNATURE, DELETE_META_ENVELOPE,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use w3bind_registry::VaultEndpoint;
use w3bind_types::{
    validate_claim_data, BindingDocument, DocumentKind, DocumentState, Ename, SignatureEntry,
};
use w3bind_vault::{join_messages, VaultClient};

/// A completed social connection as seen from the vault owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialConnection {
    /// The other identity that signed the document.
    pub counterparty: Ename,
    /// The fully signed document.
    pub document: BindingDocument,
}

/// Reads and writes social-connection binding documents in vaults.
#[derive(Debug, Clone)]
pub struct BindingClient {
    vault: VaultClient,
}

impl BindingClient {
    pub fn new(vault: VaultClient) -> Self {
        Self { vault }
    }

    /// Looks up the vault that stores `ename`'s documents.
    pub async fn resolve(&self, ename: &Ename) -> Result<VaultEndpoint, BindingError> {
        Ok(self.vault.registry().resolve_endpoint(ename.as_str()).await?)
    }

    /// Writes a new social-connection document about `subject` into the
    /// vault owned by `vault_owner`, carrying `signer`'s signature.
    ///
    /// Returns the vault-assigned document id.
    pub async fn create_document(
        &self,
        target: &VaultEndpoint,
        vault_owner: &Ename,
        signer: &Ename,
        subject: &Ename,
        claim_data: &Map<String, Value>,
        signature_hash: &str,
    ) -> Result<String, BindingError> {
        let data = validate_claim_data(DocumentKind::SocialConnection, claim_data)?;
        let input = json!({
            "subject": subject,
            "type": DocumentKind::SocialConnection,
            "data": data,
            "ownerSignature": SignatureEntry::now(signer.clone(), signature_hash),
        });

        let response: CreateData = self
            .vault
            .graphql(target, vault_owner, CREATE_BINDING_DOCUMENT, json!({ "input": input }))
            .await?;
        let payload = response.create_binding_document;
        if !payload.errors.is_empty() {
            return Err(BindingError::Rejected(join_messages(&payload.errors)));
        }
        let id = payload.meta_envelope_id.ok_or(BindingError::MissingId)?;

        tracing::info!(
            document_id = %id,
            vault_owner = %vault_owner,
            signer = %signer,
            subject = %subject,
            "binding document created"
        );
        Ok(id)
    }

    /// Appends `signer`'s signature to an existing document.
    pub async fn add_counterparty_signature(
        &self,
        target: &VaultEndpoint,
        vault_owner: &Ename,
        signer: &Ename,
        document_id: &str,
        signature_hash: &str,
    ) -> Result<(), BindingError> {
        let input = json!({
            "bindingDocumentId": document_id,
            "signature": SignatureEntry::now(signer.clone(), signature_hash),
        });

        let response: SignatureData = self
            .vault
            .graphql(
                target,
                vault_owner,
                CREATE_BINDING_DOCUMENT_SIGNATURE,
                json!({ "input": input }),
            )
            .await?;
        let payload = response.create_binding_document_signature;
        if !payload.errors.is_empty() {
            return Err(BindingError::Rejected(join_messages(&payload.errors)));
        }

        tracing::info!(
            document_id = %document_id,
            vault_owner = %vault_owner,
            signer = %signer,
            "counterparty signature added"
        );
        Ok(())
    }

    /// Social-connection documents about `caller` in its own vault that
    /// `caller` has not signed yet.
    pub async fn fetch_unsigned_documents(
        &self,
        own_vault: &VaultEndpoint,
        caller: &Ename,
    ) -> Result<Vec<BindingDocument>, BindingError> {
        let docs = self.list_documents(own_vault, caller).await?;
        Ok(docs
            .into_iter()
            .filter(|d| d.awaits_signature_from(DocumentKind::SocialConnection, caller, caller))
            .collect())
    }

    /// The first social-connection document about `subject` in
    /// `vault_owner`'s vault that `caller` has not signed.
    pub async fn fetch_unsigned_document_for_subject(
        &self,
        foreign_vault: &VaultEndpoint,
        vault_owner: &Ename,
        caller: &Ename,
        subject: &Ename,
    ) -> Result<Option<BindingDocument>, BindingError> {
        let docs = self.list_documents(foreign_vault, vault_owner).await?;
        Ok(docs
            .into_iter()
            .find(|d| d.awaits_signature_from(DocumentKind::SocialConnection, subject, caller)))
    }

    pub async fn delete_document(
        &self,
        own_vault: &VaultEndpoint,
        vault_owner: &Ename,
        document_id: &str,
    ) -> Result<(), BindingError> {
        let _: DeleteData = self
            .vault
            .graphql(
                own_vault,
                vault_owner,
                DELETE_META_ENVELOPE,
                json!({ "id": document_id }),
            )
            .await?;
        tracing::info!(document_id = %document_id, vault_owner = %vault_owner, "binding document deleted");
        Ok(())
    }

    /// Fully signed social-connection documents in `owner`'s vault, each
    /// paired with the identity on the other side.
    pub async fn list_social_connections(
        &self,
        vault: &VaultEndpoint,
        owner: &Ename,
    ) -> Result<Vec<SocialConnection>, BindingError> {
        let docs = self.list_documents(vault, owner).await?;
        Ok(docs
            .into_iter()
            .filter(|d| d.kind == DocumentKind::SocialConnection)
            .filter(|d| d.state() == DocumentState::Complete)
            .filter_map(|document| {
                let counterparty = document.counterparty(owner)?.clone();
                Some(SocialConnection {
                    counterparty,
                    document,
                })
            })
            .collect())
    }

    async fn list_documents(
        &self,
        vault: &VaultEndpoint,
        owner: &Ename,
    ) -> Result<Vec<BindingDocument>, BindingError> {
        let data: BindingDocumentsData = self
            .vault
            .graphql(vault, owner, BINDING_DOCUMENTS, json!({}))
            .await?;
        let docs = queries::documents(data);
        tracing::debug!(vault = %vault, owner = %owner, documents = docs.len(), "listed binding documents");
        Ok(docs)
    }
}
