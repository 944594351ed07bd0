//! Transport for calls into personal vaults.
//!
//! Two surfaces are covered: the unauthenticated `whois` lookup that lists an
//! identity's key-binding certificates, and the GraphQL endpoint used for
//! binding documents. GraphQL calls carry the registry-issued service token
//! as a bearer credential and scope themselves with the `X-ENAME` header.

mod client;
mod error;
mod graphql;

pub use client::VaultClient;
pub use error::VaultError;
pub use graphql::{join_messages, GraphQlError};
