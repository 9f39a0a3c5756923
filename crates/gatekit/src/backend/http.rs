//! HTTP backend for a live Gate service.
//!
//! Status codes are never turned into errors here: the agent is configured
//! with `http_status_as_error(false)` so that a `404` or `500` comes back as a
//! [`RawResponse`] for the caller to classify.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::backend::Gate;
use crate::config::GateConfig;
use crate::error::{Error, Result};
use crate::types::{GateRequest, Method, RawResponse};

const USER_AGENT: &str = concat!("spingate/", env!("CARGO_PKG_VERSION"));

/// Gate client backed by a blocking `ureq` agent.
///
/// # Example
///
/// ```no_run
/// use gatekit::{Gate, GateConfig, GateRequest, HttpGate};
///
/// let gate = HttpGate::new(GateConfig::new("https://gate.example.com")).unwrap();
/// let response = gate.send(&GateRequest::get("/applications/demo")).unwrap();
/// println!("status {}", response.status);
/// ```
pub struct HttpGate {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Gate base URL.
    endpoint: String,
    /// Headers added to every request, auth included.
    headers: Vec<(String, String)>,
}

impl HttpGate {
    /// Build a client handle from a config.
    pub fn new(config: GateConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.timeout));

        if config.ignore_redirects {
            builder = builder.max_redirects(0);
        }

        if config.ignore_cert_errors {
            log::warn!("TLS certificate verification is disabled for {}", config.endpoint);
            builder = builder.tls_config(
                ureq::tls::TlsConfig::builder()
                    .disable_verification(true)
                    .build(),
            );
        }

        let agent: ureq::Agent = builder.build().into();

        let mut headers = config.default_headers;
        if let Some((user, password)) = &config.basic_auth {
            let token = STANDARD.encode(format!("{user}:{password}"));
            headers.push(("Authorization".to_string(), format!("Basic {token}")));
        }

        Ok(Self {
            agent,
            endpoint: config.endpoint,
            headers,
        })
    }

    /// Get the configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the absolute URL for a request path.
    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.endpoint, path)
        } else {
            format!("{}/{}", self.endpoint, path)
        }
    }

    fn with_headers<B>(&self, mut request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        request = request
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request
    }
}

impl Gate for HttpGate {
    fn send(&self, request: &GateRequest) -> Result<RawResponse> {
        let url = self.url(&request.path);
        log::trace!("{} {}", request.method, url);

        let result = match (request.method, &request.body) {
            (Method::Get, _) => self.with_headers(self.agent.get(&url)).call(),
            (Method::Delete, _) => self.with_headers(self.agent.delete(&url)).call(),
            (Method::Post, Some(body)) => self.with_headers(self.agent.post(&url)).send_json(body),
            (Method::Post, None) => self.with_headers(self.agent.post(&url)).send_empty(),
            (Method::Put, Some(body)) => self.with_headers(self.agent.put(&url)).send_json(body),
            (Method::Put, None) => self.with_headers(self.agent.put(&url)).send_empty(),
        };

        let mut response = result.map_err(|e| Error::transport(&url, e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::InvalidBody(format!("{url}: {e}")))?;

        log::trace!("{} {} -> {}", request.method, url, status);
        Ok(RawResponse { status, body })
    }
}
