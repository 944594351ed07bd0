//! Binding documents: two-party attestations stored inside vaults.

use crate::ename::Ename;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The closed set of binding document kinds a vault accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    /// A government or vendor-verified identity document.
    #[serde(rename = "id_document")]
    IdDocument,
    /// A photograph of the subject.
    #[serde(rename = "photograph")]
    Photograph,
    /// Two identities assert they know each other.
    #[serde(rename = "social_connection")]
    SocialConnection,
    /// A claim the subject makes about itself.
    #[serde(rename = "self")]
    SelfClaim,
}

impl DocumentKind {
    /// Returns the wire label for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdDocument => "id_document",
            Self::Photograph => "photograph",
            Self::SocialConnection => "social_connection",
            Self::SelfClaim => "self",
        }
    }

    fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::IdDocument => &["vendor", "reference", "name"],
            Self::Photograph => &["photoBlob"],
            Self::SocialConnection | Self::SelfClaim => &["name"],
        }
    }

    /// Kinds whose `data` repeats the kind label under a `kind` key.
    fn tags_data(self) -> bool {
        matches!(self, Self::SocialConnection | Self::SelfClaim)
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = ParseDocumentKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id_document" => Ok(Self::IdDocument),
            "photograph" => Ok(Self::Photograph),
            "social_connection" => Ok(Self::SocialConnection),
            "self" => Ok(Self::SelfClaim),
            _ => Err(ParseDocumentKindError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown document kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown binding document kind: {0}")]
pub struct ParseDocumentKindError(pub String);

/// Errors raised when claim data does not fit its document kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimDataError {
    /// A required field is absent or not a string.
    #[error("{kind} data must have string field: {field}")]
    MissingField {
        /// The document kind being validated.
        kind: DocumentKind,
        /// The offending field name.
        field: &'static str,
    },
}

/// Checks `data` against the shape required by `kind` and returns the
/// normalized payload.
///
/// Only the fields the kind defines survive; social-connection and self
/// claims additionally carry `kind` set to the kind label.
///
/// # Errors
///
/// Returns [`ClaimDataError::MissingField`] for the first required field
/// that is absent or not a string.
pub fn validate_claim_data(
    kind: DocumentKind,
    data: &Map<String, Value>,
) -> Result<Map<String, Value>, ClaimDataError> {
    let mut normalized = Map::new();
    if kind.tags_data() {
        normalized.insert("kind".into(), Value::String(kind.as_str().into()));
    }
    for &field in kind.required_fields() {
        match data.get(field) {
            Some(Value::String(s)) => {
                normalized.insert(field.into(), Value::String(s.clone()));
            }
            _ => return Err(ClaimDataError::MissingField { kind, field }),
        }
    }
    Ok(normalized)
}

/// One signature on a binding document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    /// Identity that produced the signature.
    pub signer: Ename,
    /// Opaque signature (or signature hash) string.
    pub signature: String,
    /// RFC 3339 timestamp of when the entry was produced.
    pub timestamp: String,
}

impl SignatureEntry {
    /// Builds an entry stamped with the current time.
    pub fn now(signer: Ename, signature: impl Into<String>) -> Self {
        Self {
            signer,
            signature: signature.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Completion state of a binding document, seen from its subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    /// Still waiting on the subject or on a counterparty.
    Pending,
    /// Signed by the subject and by at least one other identity.
    Complete,
}

/// A two-party attestation record stored in a vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingDocument {
    /// Vault-assigned identifier (the envelope id).
    #[serde(default)]
    pub id: String,
    /// The identity the document is about.
    pub subject: Ename,
    /// Document kind.
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    /// Kind-specific payload.
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Signatures in the order they were appended.
    #[serde(default)]
    pub signatures: Vec<SignatureEntry>,
}

impl BindingDocument {
    /// Returns true if `who` has already signed this document.
    pub fn is_signed_by(&self, who: &Ename) -> bool {
        self.signatures.iter().any(|s| s.signer == *who)
    }

    /// The document is complete once the subject and at least one other
    /// identity have signed it.
    pub fn state(&self) -> DocumentState {
        let subject_signed = self.is_signed_by(&self.subject);
        let other_signed = self.signatures.iter().any(|s| s.signer != self.subject);
        if subject_signed && other_signed {
            DocumentState::Complete
        } else {
            DocumentState::Pending
        }
    }

    /// The first signer that is not `me`.
    pub fn counterparty(&self, me: &Ename) -> Option<&Ename> {
        self.signatures
            .iter()
            .map(|s| &s.signer)
            .find(|signer| *signer != me)
    }

    /// True for documents of `kind` about `subject` that `subject` has not
    /// yet signed.
    pub fn awaits_signature_from(&self, kind: DocumentKind, subject: &Ename, signer: &Ename) -> bool {
        self.kind == kind && self.subject == *subject && !self.is_signed_by(signer)
    }
}
