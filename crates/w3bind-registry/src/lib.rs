//! Client for the discovery registry.
//!
//! The registry is the only central service the protocol trusts, and only
//! for three things:
//!
//! - resolving an identifier to the vault that hosts it,
//! - issuing the bearer credential this platform presents to vaults,
//! - publishing the key set that signs key-binding certificates.
//!
//! Every call carries a bounded timeout and surfaces failures as typed
//! [`RegistryError`] values. Nothing here retries; retry policy belongs to
//! the caller.

mod client;
mod endpoint;
mod error;

pub use client::{RegistryClient, RegistryConfig, DEFAULT_TIMEOUT, DEFAULT_TOKEN_REFRESH_MARGIN};
pub use endpoint::VaultEndpoint;
pub use error::RegistryError;

pub use jsonwebtoken::jwk::JwkSet;
