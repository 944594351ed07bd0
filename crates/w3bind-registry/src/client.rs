use crate::endpoint::VaultEndpoint;
use crate::error::RegistryError;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::jwk::JwkSet;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;
use w3bind_types::Ename;

/// Per-request timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long before expiry a cached service token is refreshed.
pub const DEFAULT_TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Lifetime assumed for a service token whose response omits `expiresAt`.
const DEFAULT_TOKEN_LIFETIME: TimeDelta = TimeDelta::hours(1);

/// Connection settings for [`RegistryClient`].
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Base URL of the registry, e.g. `https://registry.example`.
    pub base_url: String,
    /// Platform name presented when requesting a service token.
    pub platform: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Refresh the service token once less than this much lifetime remains.
    pub token_refresh_margin: Duration,
}

impl RegistryConfig {
    pub fn new(base_url: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            platform: platform.into(),
            timeout: DEFAULT_TIMEOUT,
            token_refresh_margin: DEFAULT_TOKEN_REFRESH_MARGIN,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveResponse {
    #[serde(default)]
    evault_url: Option<String>,
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct CertificationRequest<'a> {
    platform: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Expiry {
    EpochMillis(i64),
    Rfc3339(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CertificationResponse {
    token: String,
    #[serde(default)]
    expires_at: Option<Expiry>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// HTTP client for the registry.
///
/// Holds a cached service token. Refreshes are serialized behind an async
/// mutex, so concurrent callers that find the token stale wait for one
/// refresh instead of each issuing their own.
#[derive(Debug)]
pub struct RegistryClient {
    base: Url,
    platform: String,
    http: reqwest::Client,
    refresh_margin: TimeDelta,
    token: Mutex<Option<CachedToken>>,
}

impl RegistryClient {
    /// Builds a client from `config`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::MissingBaseUrl`] if the base URL is blank.
    /// - [`RegistryError::InvalidUrl`] if it does not parse.
    /// - [`RegistryError::Client`] if the HTTP client cannot be built.
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        let trimmed = config.base_url.trim();
        if trimmed.is_empty() {
            return Err(RegistryError::MissingBaseUrl);
        }
        let base = Url::parse(trimmed)?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("w3bind/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RegistryError::Client)?;

        let refresh_margin = TimeDelta::from_std(config.token_refresh_margin)
            .unwrap_or_else(|_| TimeDelta::minutes(5));

        Ok(Self {
            base,
            platform: config.platform,
            http,
            refresh_margin,
            token: Mutex::new(None),
        })
    }

    /// The registry base URL.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// The shared HTTP client, configured with the registry timeout.
    ///
    /// Vault calls reuse it so they inherit the same timeout and connection
    /// pool.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Resolves `identifier` to the vault that hosts it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EndpointNotFound`] if the registry has no
    /// mapping (404) or answers without a URI; transport, status, and body
    /// failures map to their respective variants.
    #[tracing::instrument(skip(self), fields(registry = %self.base))]
    pub async fn resolve_endpoint(&self, identifier: &str) -> Result<VaultEndpoint, RegistryError> {
        let ename = Ename::normalize(identifier)?;
        let mut url = self.base.join("/resolve")?;
        url.query_pairs_mut().append_pair("w3id", ename.as_str());

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RegistryError::from_request(&url, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::EndpointNotFound(ename.to_string()));
        }
        if !response.status().is_success() {
            return Err(RegistryError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let body: ResolveResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::malformed(&url, e))?;

        let uri = body
            .evault_url
            .or(body.uri)
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| RegistryError::EndpointNotFound(ename.to_string()))?;

        let endpoint = VaultEndpoint::parse(uri.trim())?;
        tracing::debug!(ename = %ename, vault = %endpoint, "resolved vault endpoint");
        Ok(endpoint)
    }

    /// Returns a bearer credential for calling vaults as this platform.
    ///
    /// The token is cached and refreshed once less than the configured
    /// margin of its lifetime remains.
    ///
    /// # Errors
    ///
    /// Propagates the failure of the certification request.
    pub async fn service_token(&self) -> Result<String, RegistryError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Utc::now() > self.refresh_margin {
                return Ok(token.token.clone());
            }
            tracing::debug!(expires_at = %token.expires_at, "service token near expiry, refreshing");
        }

        let fresh = self.request_token().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn request_token(&self) -> Result<CachedToken, RegistryError> {
        let url = self.base.join("/platforms/certification")?;
        let response = self
            .http
            .post(url.clone())
            .json(&CertificationRequest {
                platform: &self.platform,
            })
            .send()
            .await
            .map_err(|e| RegistryError::from_request(&url, e))?;

        if !response.status().is_success() {
            return Err(RegistryError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let body: CertificationResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::malformed(&url, e))?;
        if body.token.is_empty() {
            return Err(RegistryError::malformed(&url, "empty token"));
        }

        let now = Utc::now();
        let expires_at = match body.expires_at {
            Some(Expiry::EpochMillis(ms)) => DateTime::from_timestamp_millis(ms),
            Some(Expiry::Rfc3339(s)) => DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            None => None,
        }
        .unwrap_or(now + DEFAULT_TOKEN_LIFETIME);

        tracing::info!(platform = %self.platform, %expires_at, "obtained service token");
        Ok(CachedToken {
            token: body.token,
            expires_at,
        })
    }

    /// Fetches the registry's published verification key set.
    ///
    /// # Errors
    ///
    /// Returns a transport, status, or [`RegistryError::MalformedResponse`]
    /// error if the key set cannot be retrieved or parsed.
    pub async fn public_key_set(&self) -> Result<JwkSet, RegistryError> {
        let url = self.base.join("/.well-known/jwks.json")?;
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RegistryError::from_request(&url, e))?;

        if !response.status().is_success() {
            return Err(RegistryError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| RegistryError::malformed(&url, e))
    }
}
