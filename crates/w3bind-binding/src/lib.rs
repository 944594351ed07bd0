//! Binding document protocol.
//!
//! A requester's claim about a social connection becomes a document in the
//! requester's vault carrying the signer's signature; the requester then
//! counter-signs it. Every call authenticates with the registry-issued
//! service token and scopes itself to one vault owner via `X-ENAME`.

mod client;
mod error;
mod queries;

pub use client::{BindingClient, SocialConnection};
pub use error::BindingError;
