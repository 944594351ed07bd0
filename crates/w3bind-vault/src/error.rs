use thiserror::Error;
use url::Url;
use w3bind_registry::RegistryError;

/// Errors that can occur when calling a vault.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A service token could not be obtained from the registry.
    #[error("failed to obtain service token: {0}")]
    Registry(#[from] RegistryError),

    /// The request did not finish within the configured timeout.
    #[error("vault request to {url} timed out")]
    Timeout { url: Url },

    /// The vault answered with a non-success status.
    #[error("vault request to {url} failed with status {status}")]
    Status { url: Url, status: u16 },

    /// Transport-level failure.
    #[error("vault request to {url} failed: {source}")]
    Http { url: Url, source: reqwest::Error },

    /// The GraphQL response carried one or more errors, joined with `"; "`.
    #[error("{0}")]
    GraphQl(String),

    /// The response body did not have the expected shape.
    #[error("unexpected response from {url}: {reason}")]
    MalformedResponse { url: Url, reason: String },
}

impl VaultError {
    pub(crate) fn from_request(url: &Url, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.clone() }
        } else {
            Self::Http {
                url: url.clone(),
                source,
            }
        }
    }

    pub(crate) fn malformed(url: &Url, reason: impl ToString) -> Self {
        Self::MalformedResponse {
            url: url.clone(),
            reason: reason.to_string(),
        }
    }
}
