use thiserror::Error;
use url::Url;
use w3bind_types::EnameError;

/// Errors that can occur when talking to the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No registry base URL was configured.
    #[error("registry base URL is required")]
    MissingBaseUrl,

    /// A configured or resolved URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The identifier could not be normalized.
    #[error("invalid identifier: {0}")]
    Identifier(#[from] EnameError),

    /// The registry has no vault mapping for the identifier.
    #[error("no vault endpoint registered for {0}")]
    EndpointNotFound(String),

    /// The request did not finish within the configured timeout.
    #[error("request to {url} timed out")]
    Timeout {
        /// The URL that timed out.
        url: Url,
    },

    /// The registry answered with a non-success status.
    #[error("request to {url} failed with status {status}")]
    Status {
        /// The URL that was requested.
        url: Url,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body was not what the registry contract promises.
    #[error("unexpected response from {url}: {reason}")]
    MalformedResponse {
        /// The URL that was requested.
        url: Url,
        /// What was wrong with the body.
        reason: String,
    },

    /// Transport-level failure (connection refused, TLS, ...).
    #[error("request to {url} failed: {source}")]
    Http {
        /// The URL that was requested.
        url: Url,
        /// The underlying client error.
        source: reqwest::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl RegistryError {
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
