use std::fmt;
use url::Url;

/// A vault's network address as resolved from the registry.
///
/// The registry may hand back either the vault's base URL or its GraphQL URL
/// directly; both forms are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultEndpoint {
    url: Url,
}

impl VaultEndpoint {
    /// Parses a resolved vault URI.
    ///
    /// # Errors
    ///
    /// Returns the parse error if `raw` is not an absolute URL.
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            url: Url::parse(raw)?,
        })
    }

    /// The URL exactly as the registry returned it.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The vault's GraphQL endpoint.
    pub fn graphql_url(&self) -> Url {
        if self.url.path().trim_end_matches('/').ends_with("/graphql") {
            return self.url.clone();
        }
        self.join_root("/graphql")
    }

    /// The vault's key-binding lookup endpoint.
    pub fn whois_url(&self) -> Url {
        self.join_root("/whois")
    }

    fn join_root(&self, path: &str) -> Url {
        let mut url = self.url.clone();
        url.set_path(path);
        url.set_query(None);
        url.set_fragment(None);
        url
    }
}

impl From<Url> for VaultEndpoint {
    fn from(url: Url) -> Self {
        Self { url }
    }
}

impl fmt::Display for VaultEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_graphql_path() {
        let e = VaultEndpoint::parse("https://vault.example:4000").unwrap();
        assert_eq!(e.graphql_url().as_str(), "https://vault.example:4000/graphql");
        assert_eq!(e.whois_url().as_str(), "https://vault.example:4000/whois");
    }

    #[test]
    fn graphql_url_is_not_doubled() {
        let e = VaultEndpoint::parse("https://vault.example/graphql").unwrap();
        assert_eq!(e.graphql_url().as_str(), "https://vault.example/graphql");
        assert_eq!(e.whois_url().as_str(), "https://vault.example/whois");
    }

    #[test]
    fn paths_are_root_relative() {
        let e = VaultEndpoint::parse("https://vault.example/tenants/a?x=1").unwrap();
        assert_eq!(e.graphql_url().as_str(), "https://vault.example/graphql");
    }
}
