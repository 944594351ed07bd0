use thiserror::Error;
use w3bind_registry::RegistryError;
use w3bind_types::ClaimDataError;
use w3bind_vault::VaultError;

/// Errors from binding-document operations.
#[derive(Debug, Error)]
pub enum BindingError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Claim(#[from] ClaimDataError),

    /// The vault refused the write; field errors joined with `"; "`.
    #[error("{0}")]
    Rejected(String),

    #[error("createBindingDocument returned no metaEnvelopeId")]
    MissingId,
}
