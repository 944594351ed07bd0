use crate::error::VaultError;
use crate::graphql::{join_messages, GraphQlRequest, GraphQlResponse};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use w3bind_registry::{RegistryClient, VaultEndpoint};
use w3bind_types::{Ename, ENAME_HEADER};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WhoisResponse {
    #[serde(default)]
    key_binding_certificates: Vec<String>,
}

/// Client for vault HTTP endpoints.
///
/// Shares the registry's HTTP client (and therefore its timeout) and asks
/// the registry for the service token on every GraphQL call; the registry
/// caches it.
#[derive(Debug, Clone)]
pub struct VaultClient {
    registry: Arc<RegistryClient>,
}

impl VaultClient {
    pub fn new(registry: Arc<RegistryClient>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RegistryClient> {
        &self.registry
    }

    /// Lists the key-binding certificates the vault publishes for `ename`.
    ///
    /// A response without the certificate field is treated as an empty list.
    pub async fn whois(
        &self,
        endpoint: &VaultEndpoint,
        ename: &Ename,
    ) -> Result<Vec<String>, VaultError> {
        let url = endpoint.whois_url();
        let response = self
            .registry
            .http()
            .get(url.clone())
            .header(ENAME_HEADER, ename.as_str())
            .send()
            .await
            .map_err(|e| VaultError::from_request(&url, e))?;

        if !response.status().is_success() {
            return Err(VaultError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let body: WhoisResponse = response
            .json()
            .await
            .map_err(|e| VaultError::malformed(&url, e))?;
        tracing::debug!(
            ename = %ename,
            certificates = body.key_binding_certificates.len(),
            "whois lookup"
        );
        Ok(body.key_binding_certificates)
    }

    /// Runs a GraphQL operation against the vault owned by `owner`.
    ///
    /// Top-level GraphQL errors are returned as [`VaultError::GraphQl`] with
    /// their messages joined. The `data` object is deserialized into `T`.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        endpoint: &VaultEndpoint,
        owner: &Ename,
        query: &str,
        variables: Value,
    ) -> Result<T, VaultError> {
        let token = self.registry.service_token().await?;
        let url = endpoint.graphql_url();

        let response = self
            .registry
            .http()
            .post(url.clone())
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ENAME_HEADER, owner.as_str())
            .json(&GraphQlRequest {
                query,
                variables: &variables,
            })
            .send()
            .await
            .map_err(|e| VaultError::from_request(&url, e))?;

        if !response.status().is_success() {
            return Err(VaultError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let body: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| VaultError::malformed(&url, e))?;

        if !body.errors.is_empty() {
            let joined = join_messages(&body.errors);
            tracing::warn!(vault = %endpoint, owner = %owner, errors = %joined, "graphql errors");
            return Err(VaultError::GraphQl(joined));
        }

        let data = body
            .data
            .ok_or_else(|| VaultError::malformed(&url, "response has no data"))?;
        serde_json::from_value(data).map_err(|e| VaultError::malformed(&url, e))
    }
}
