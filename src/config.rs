//! Client configuration
//!
//! Read from `~/.config/spingate/config.toml`:
//!
//! ```toml
//! gate_endpoint = "https://gate.example.com"
//! default_headers = "X-Team=platform,X-Env=prod"
//! ignore_cert_errors = false
//! ignore_redirects = false
//! retry_timeout = 60
//! poll_interval_ms = 1000
//!
//! [auth]
//! username = "admin"
//! password = "${GATE_PASSWORD}"
//! ```
//!
//! Command-line flags take precedence over file values.

use anyhow::{Context, Result, bail};
use gatekit::GateConfig;
use reconcile::{Backoff, WaitConfig};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::paths;

fn default_retry_timeout() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_transport_retries() -> u32 {
    3
}

/// How the delay between task polls evolves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollBackoff {
    #[default]
    Fixed,
    Exponential,
}

/// Basic auth credentials
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Client settings for one Gate
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Gate base URL
    #[serde(default)]
    pub gate_endpoint: Option<String>,

    /// Extra headers as `K=V,K2=V2`
    #[serde(default)]
    pub default_headers: Option<String>,

    #[serde(default)]
    pub ignore_cert_errors: bool,

    #[serde(default)]
    pub ignore_redirects: bool,

    /// Time budget for one task, in seconds
    #[serde(default = "default_retry_timeout")]
    pub retry_timeout: u64,

    /// Delay between task polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub poll_backoff: PollBackoff,

    /// Upper bound for exponential poll delays, in milliseconds
    #[serde(default)]
    pub poll_interval_max_ms: Option<u64>,

    /// Per-request timeout, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Consecutive transport failures tolerated while polling
    #[serde(default = "default_transport_retries")]
    pub transport_retries: u32,

    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gate_endpoint: None,
            default_headers: None,
            ignore_cert_errors: false,
            ignore_redirects: false,
            retry_timeout: default_retry_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_backoff: PollBackoff::default(),
            poll_interval_max_ms: None,
            request_timeout: default_request_timeout(),
            transport_retries: default_transport_retries(),
            auth: None,
        }
    }
}

impl Settings {
    /// Load settings.
    ///
    /// A missing default config file yields defaults; a missing explicit one
    /// is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, is_explicit) = paths::config_file(explicit)?;

        if !path.exists() {
            if is_explicit {
                bail!("Config file not found: {}", path.display());
            }
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::from_file(&path)
    }

    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(settings)
    }

    /// Apply command-line overrides
    #[must_use]
    pub fn with_overrides(mut self, gate_endpoint: Option<String>, retry_timeout: Option<u64>) -> Self {
        if gate_endpoint.is_some() {
            self.gate_endpoint = gate_endpoint;
        }
        if let Some(timeout) = retry_timeout {
            self.retry_timeout = timeout;
        }
        self
    }

    /// Build the Gate client config
    pub fn gate_config(&self) -> Result<GateConfig> {
        let Some(endpoint) = self.gate_endpoint.as_deref().filter(|e| !e.is_empty()) else {
            bail!("No Gate endpoint configured; set gate_endpoint, GATE_ENDPOINT or --gate-endpoint");
        };

        let mut config = GateConfig::new(endpoint)
            .ignore_cert_errors(self.ignore_cert_errors)
            .ignore_redirects(self.ignore_redirects)
            .timeout(Duration::from_secs(self.request_timeout));

        if let Some(headers) = &self.default_headers {
            config = config
                .headers_from_str(headers)
                .context("Invalid default_headers")?;
        }

        if let Some(auth) = &self.auth {
            let password = shellexpand::env(&auth.password)
                .with_context(|| format!("Could not expand password for {}", auth.username))?;
            config = config.basic_auth(&auth.username, password.as_ref());
        }

        config.validate().context("Invalid Gate configuration")?;
        Ok(config)
    }

    /// Build the task wait config
    pub fn wait_config(&self) -> WaitConfig {
        let interval = Duration::from_millis(self.poll_interval_ms);
        let backoff = match self.poll_backoff {
            PollBackoff::Fixed => Backoff::Fixed,
            PollBackoff::Exponential => Backoff::Exponential {
                factor: 2.0,
                max: Duration::from_millis(
                    self.poll_interval_max_ms
                        .unwrap_or(self.poll_interval_ms.saturating_mul(10)),
                ),
            },
        };

        WaitConfig::default()
            .timeout(Duration::from_secs(self.retry_timeout))
            .interval(interval)
            .backoff(backoff)
            .transport_retries(self.transport_retries)
    }
}

// ============================================================================
// Tests
// ============================================================================
