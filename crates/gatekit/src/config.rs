//! Client handle configuration.

use std::time::Duration;

use crate::error::{Error, Result};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for a Gate client handle.
///
/// # Example
///
/// ```
/// use gatekit::GateConfig;
///
/// let config = GateConfig::new("https://gate.example.com")
///     .ignore_cert_errors(true)
///     .header("X-Team", "platform");
/// assert_eq!(config.default_headers.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// Base URL of the Gate service, without a trailing slash.
    pub endpoint: String,
    /// Headers sent with every request.
    pub default_headers: Vec<(String, String)>,
    /// Accept any TLS certificate.
    pub ignore_cert_errors: bool,
    /// Return 3xx responses instead of following them.
    pub ignore_redirects: bool,
    /// Timeout applied to each call.
    pub timeout: Duration,
    /// Optional basic auth credentials.
    pub basic_auth: Option<(String, String)>,
}

impl GateConfig {
    /// Create a config for an endpoint with default settings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            default_headers: Vec::new(),
            ignore_cert_errors: false,
            ignore_redirects: false,
            timeout: DEFAULT_TIMEOUT,
            basic_auth: None,
        }
    }

    /// Add a default header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Add every header from a `Name=value,Other=value` list.
    pub fn headers_from_str(mut self, spec: &str) -> Result<Self> {
        self.default_headers.extend(parse_headers(spec)?);
        Ok(self)
    }

    /// Set whether TLS certificate errors are ignored.
    #[must_use]
    pub fn ignore_cert_errors(mut self, ignore: bool) -> Self {
        self.ignore_cert_errors = ignore;
        self
    }

    /// Set whether redirects are returned instead of followed.
    #[must_use]
    pub fn ignore_redirects(mut self, ignore: bool) -> Self {
        self.ignore_redirects = ignore;
        self
    }

    /// Set the per-call timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set basic auth credentials.
    #[must_use]
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((username.into(), password.into()));
        self
    }

    /// Check that the configuration can produce a working client.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(Error::InvalidConfig("gate endpoint is empty".to_string()));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "gate endpoint {} must start with http:// or https://",
                self.endpoint
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig("timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Parse a `Name=value,Other=value` header list.
///
/// Blank entries are ignored; an entry without `=` or with an empty name is
/// an error.
pub fn parse_headers(spec: &str) -> Result<Vec<(String, String)>> {
    spec.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, value) = entry.split_once('=').ok_or_else(|| {
                Error::InvalidConfig(format!("header '{entry}' is not in Name=value form"))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "header '{entry}' has an empty name"
                )));
            }
            Ok((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = GateConfig::new("https://gate.example.com/");
        assert_eq!(config.endpoint, "https://gate.example.com");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(!config.ignore_cert_errors);
    }

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers("X-Team=platform, X-Env = prod ,,").unwrap();
        assert_eq!(
            headers,
            vec![
                ("X-Team".to_string(), "platform".to_string()),
                ("X-Env".to_string(), "prod".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_headers_empty() {
        assert!(parse_headers("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_headers_rejects_missing_value_separator() {
        assert!(parse_headers("X-Team").is_err());
        assert!(parse_headers("=value").is_err());
    }

    #[test]
    fn test_validate() {
        assert!(GateConfig::new("https://gate").validate().is_ok());
        assert!(GateConfig::new("").validate().is_err());
        assert!(GateConfig::new("gate:8084").validate().is_err());
        assert!(
            GateConfig::new("http://gate")
                .timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_builder_methods() {
        let config = GateConfig::new("https://gate")
            .headers_from_str("A=1,B=2")
            .unwrap()
            .ignore_redirects(true)
            .basic_auth("user", "secret");

        assert_eq!(config.default_headers.len(), 2);
        assert!(config.ignore_redirects);
        assert_eq!(
            config.basic_auth,
            Some(("user".to_string(), "secret".to_string()))
        );
    }
}
