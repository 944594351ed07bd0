//! GraphQL operations and their response shapes.

use serde::Deserialize;
use serde_json::Value;
use w3bind_types::BindingDocument;
use w3bind_vault::GraphQlError;

pub(crate) const BINDING_DOCUMENTS: &str = r#"
    query {
        bindingDocuments(first: 50) {
            edges {
                node {
                    id
                    parsed
                }
            }
        }
    }
"#;

pub(crate) const CREATE_BINDING_DOCUMENT: &str = r#"
    mutation CreateBindingDoc($input: CreateBindingDocumentInput!) {
        createBindingDocument(input: $input) {
            metaEnvelopeId
            bindingDocument {
                subject
                type
                signatures { signer signature timestamp }
            }
            errors { message code }
        }
    }
"#;

pub(crate) const CREATE_BINDING_DOCUMENT_SIGNATURE: &str = r#"
    mutation AddSignature($input: CreateBindingDocumentSignatureInput!) {
        createBindingDocumentSignature(input: $input) {
            bindingDocument {
                subject
                type
                signatures { signer signature timestamp }
            }
            errors { message code }
        }
    }
"#;

pub(crate) const DELETE_META_ENVELOPE: &str = r#"
    mutation DeleteMetaEnvelope($id: String!) {
        deleteMetaEnvelope(id: $id) {
            id
        }
    }
"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BindingDocumentsData {
    #[serde(default)]
    pub binding_documents: Option<Connection>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Connection {
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Edge {
    pub node: Node,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Node {
    pub id: String,
    #[serde(default)]
    pub parsed: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateData {
    pub create_binding_document: CreatePayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreatePayload {
    #[serde(default)]
    pub meta_envelope_id: Option<String>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignatureData {
    pub create_binding_document_signature: SignaturePayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignaturePayload {
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeleteData {
    #[allow(dead_code)]
    pub delete_meta_envelope: Option<Value>,
}

/// Decodes every well-formed document; nodes without a usable `parsed`
/// payload are skipped.
pub(crate) fn documents(data: BindingDocumentsData) -> Vec<BindingDocument> {
    data.binding_documents
        .unwrap_or_default()
        .edges
        .into_iter()
        .filter_map(|edge| {
            let id = edge.node.id;
            let parsed = edge.node.parsed?;
            match serde_json::from_value::<BindingDocument>(parsed) {
                Ok(mut doc) => {
                    doc.id = id;
                    Some(doc)
                }
                Err(e) => {
                    tracing::debug!(id = %id, error = %e, "skipping malformed binding document");
                    None
                }
            }
        })
        .collect()
}
