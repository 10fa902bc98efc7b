use serde::{Deserialize, Serialize};
use url::Url;

/// Credential-injection rule for one known API host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCredential {
    /// Host the rule applies to, e.g. `api.example.org`.
    pub host: String,
    /// Header to inject, e.g. `x-api-key` or `Authorization`.
    pub header: String,
    pub value: String,
}

/// Ambient network configuration handed to every download task.
///
/// Carries the user-agent and the host-to-credential mapping; credentials are
/// only attached to requests whose host matches a configured rule, so tokens
/// never leak to redirect targets on other hosts.
///
/// # Examples
///
/// ```
/// use windlass_net::NetConfig;
///
/// let config = NetConfig::new("windlass/0.1")
///     .credential("api.example.org", "x-api-key", "secret");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetConfig {
    pub user_agent: String,

    #[serde(default)]
    pub credentials: Vec<HostCredential>,
}

impl NetConfig {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self { user_agent: user_agent.into(), credentials: Vec::new() }
    }

    /// Add a credential rule for a host.
    #[must_use]
    pub fn credential(
        mut self,
        host: impl Into<String>,
        header: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.credentials.push(HostCredential {
            host: host.into(),
            header: header.into(),
            value: value.into(),
        });
        self
    }

    /// Outbound header set for a request to `url`: the user-agent plus any
    /// credential headers whose host rule matches.
    pub fn headers_for(&self, url: &Url) -> Vec<(String, String)> {
        let mut headers = vec![("User-Agent".to_string(), self.user_agent.clone())];
        if let Some(host) = url.host_str() {
            for credential in &self.credentials {
                if credential.host.eq_ignore_ascii_case(host) {
                    headers.push((credential.header.clone(), credential.value.clone()));
                }
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NetConfig {
        NetConfig::new("windlass/0.1")
            .credential("api.example.org", "x-api-key", "secret")
            .credential("files.example.org", "Authorization", "Bearer token")
    }

    #[test]
    fn test_user_agent_always_present() {
        let url = Url::parse("https://mirror.example.net/file").unwrap();
        let headers = config().headers_for(&url);
        assert_eq!(headers, vec![("User-Agent".to_string(), "windlass/0.1".to_string())]);
    }

    #[test]
    fn test_credentials_for_matching_host() {
        let url = Url::parse("https://api.example.org/v2/projects").unwrap();
        let headers = config().headers_for(&url);
        assert!(headers.contains(&("x-api-key".to_string(), "secret".to_string())));
        assert!(!headers.iter().any(|(name, _)| name == "Authorization"));
    }

    #[test]
    fn test_host_match_is_case_insensitive() {
        let url = Url::parse("https://API.EXAMPLE.ORG/v2").unwrap();
        let headers = config().headers_for(&url);
        assert!(headers.contains(&("x-api-key".to_string(), "secret".to_string())));
    }

    #[test]
    fn test_no_credentials_for_subdomain() {
        // "cdn.api.example.org" is a different host than "api.example.org"
        let url = Url::parse("https://cdn.api.example.org/file").unwrap();
        let headers = config().headers_for(&url);
        assert_eq!(headers.len(), 1);
    }
}
