//! Shared types for the w3bind trust-binding protocol.
//!
//! This crate holds the data model every other crate speaks: normalized
//! identifiers ([`Ename`]), binding documents and their signature entries,
//! signing-session status values, and the structured verification result.
//!
//! Nothing here performs I/O. Crates that talk to the registry or to vaults
//! depend on this crate for their wire types; this keeps the dependency graph
//! flat and prevents the protocol crates from depending on each other just to
//! share a struct.

mod document;
mod ename;
mod session;
mod verification;

pub use document::{
    validate_claim_data, BindingDocument, ClaimDataError, DocumentKind, DocumentState,
    ParseDocumentKindError, SignatureEntry,
};
pub use ename::{Ename, EnameError};
pub use session::{ParseSessionKindError, ParseSessionStatusError, SessionKind, SessionStatus};
pub use verification::VerificationResult;

/// HTTP header that selects which identity's data a vault call touches.
///
/// On a shared vault server this is a tenant selector, not authorization.
pub const ENAME_HEADER: &str = "X-ENAME";
