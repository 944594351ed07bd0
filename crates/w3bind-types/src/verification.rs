use serde::{Deserialize, Serialize};

/// Outcome of verifying a signature against an identity's key material.
///
/// Verification never fails with an error value; every failure collapses
/// into `valid == false` with a diagnostic `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Whether the signature is accepted.
    pub valid: bool,
    /// Reason for rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Multibase public key that verified the signature.
    ///
    /// `None` on a valid result means the identity published no key-binding
    /// certificates and was accepted without a key check. Callers that need
    /// strict verification must require this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

impl VerificationResult {
    /// A signature verified by `public_key`.
    pub fn verified(public_key: impl Into<String>) -> Self {
        Self {
            valid: true,
            error: None,
            public_key: Some(public_key.into()),
        }
    }

    /// Accepted without any key check.
    pub fn unenforced() -> Self {
        Self {
            valid: true,
            error: None,
            public_key: None,
        }
    }

    /// Rejected for `reason`.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(reason.into()),
            public_key: None,
        }
    }
}
