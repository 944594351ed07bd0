//! Signature verification against registry-certified keys.
//!
//! An identity's vault publishes key-binding certificates: JWTs issued by
//! the registry that bind a public key to the identity. A wallet signature
//! is accepted when some certificate validates against the registry key set,
//! names the claimed identity, and carries a key under which the signature
//! verifies.
//!
//! Certificates are tried one at a time in the order the vault lists them;
//! the first that verifies wins.

pub mod certificate;
pub mod key;
mod verifier;

pub use verifier::{CertificateVerifier, SignatureVerifier};
