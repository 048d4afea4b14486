//! Relay configuration

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::serde_utils::duration;
use super::{AmiConfig, AriConfig};
use crate::error::ConfigError;

/// Which wire protocol the relay speaks to Asterisk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Manager Interface: TCP line protocol, filtered by the allow-set
    #[default]
    Ami,
    /// REST Interface: JSON over WebSocket, forwarded unfiltered
    Ari,
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ami" => Ok(Protocol::Ami),
            "ari" => Ok(Protocol::Ari),
            other => Err(ConfigError::Invalid(format!(
                "unknown protocol {other:?} (expected \"ami\" or \"ari\")"
            ))),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ami => f.write_str("ami"),
            Protocol::Ari => f.write_str("ari"),
        }
    }
}

/// Configuration for the relay daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Source protocol
    pub protocol: Protocol,

    /// Bound on establishing the transport and on the registration call
    #[serde(with = "duration")]
    pub connect_timeout: Duration,

    /// Webhook target
    pub webhook: WebhookConfig,

    /// Read deadline and heartbeat
    pub liveness: LivenessConfig,

    /// Manager Interface settings
    pub ami: AmiConfig,

    /// REST Interface settings
    pub ari: AriConfig,

    /// Reconnect policy after a session ends
    pub reconnect: ReconnectConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::default(),
            connect_timeout: Duration::from_secs(10),
            webhook: WebhookConfig::default(),
            liveness: LivenessConfig::default(),
            ami: AmiConfig::default(),
            ari: AriConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Webhook delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Target URL; required
    pub url: String,

    /// Per-request timeout
    #[serde(with = "duration")]
    pub timeout: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Liveness settings for an active session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Read deadline, re-armed after every successful read
    #[serde(with = "duration")]
    pub read_timeout: Duration,

    /// Minimum spacing of heartbeat log lines
    #[serde(with = "duration")]
    pub heartbeat_interval: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(60),
        }
    }
}

/// Exponential backoff between reconnect attempts
///
/// Disabled by default: a finished session ends the process and restarts are
/// left to the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Reconnect instead of exiting when a session ends
    pub enabled: bool,

    /// Initial delay
    #[serde(with = "duration")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

impl ReconnectConfig {
    /// Check the backoff parameters, whether or not reconnect is enabled
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial.is_zero() {
            return Err(ConfigError::Invalid(
                "reconnect.initial must be non-zero".to_string(),
            ));
        }
        if self.initial > self.max {
            return Err(ConfigError::Invalid(format!(
                "reconnect.initial ({:?}) must not exceed reconnect.max ({:?})",
                self.initial, self.max
            )));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "reconnect.multiplier must be a finite number >= 1, got {}",
                self.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::Invalid(format!(
                "reconnect.jitter must be between 0 and 1, got {}",
                self.jitter
            )));
        }
        Ok(())
    }
}

impl RelayConfig {
    /// Overlay environment variables on top of the current values
    ///
    /// `lookup` is normally `std::env::var`; empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(protocol) = var("TELEHOOK_PROTOCOL") {
            self.protocol = protocol.parse()?;
        }
        if let Some(url) = var("WEBHOOK_URL") {
            self.webhook.url = url;
        }
        if let Some(host) = var("ASTERISK_HOST") {
            self.ami.host = host.clone();
            self.ari.host = host;
        }

        if let Some(port) = var("AMI_PORT") {
            self.ami.port = parse_port("AMI_PORT", &port)?;
        }
        if let Some(user) = var("AMI_USER") {
            self.ami.username = user;
        }
        if let Some(secret) = var("AMI_PASS") {
            self.ami.secret = secret;
        }

        if let Some(port) = var("ASTERISK_PORT") {
            self.ari.port = parse_port("ASTERISK_PORT", &port)?;
        }
        if let Some(user) = var("ASTERISK_USER") {
            self.ari.username = user;
        }
        if let Some(password) = var("ASTERISK_PASS") {
            self.ari.password = password;
        }
        if let Some(app) = var("ARI_APP_NAME") {
            self.ari.app_name = app;
        }

        Ok(())
    }

    /// Overlay the process environment
    pub fn apply_process_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Check the configuration before anything connects
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook.url.trim().is_empty() {
            return Err(ConfigError::MissingField(
                "webhook.url (set WEBHOOK_URL or --webhook-url)".to_string(),
            ));
        }
        let url = Url::parse(&self.webhook.url)
            .map_err(|e| ConfigError::Invalid(format!("webhook.url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "webhook.url must be http or https, got {}",
                url.scheme()
            )));
        }

        let ports = [("ami.port", self.ami.port), ("ari.port", self.ari.port)];
        if let Some((name, _)) = ports.iter().find(|(_, port)| *port == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be non-zero")));
        }

        let timeouts = [
            ("liveness.read_timeout", self.liveness.read_timeout),
            ("liveness.heartbeat_interval", self.liveness.heartbeat_interval),
            ("webhook.timeout", self.webhook.timeout),
            ("connect_timeout", self.connect_timeout),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::Invalid(format!("{name} must be non-zero")));
        }

        if self.ari.app_name.trim().is_empty() {
            return Err(ConfigError::MissingField("ari.app_name".to_string()));
        }

        self.reconnect.validate()
    }

    /// Log the effective configuration, without credentials
    pub fn log_summary(&self) {
        tracing::info!("Configuration loaded:");
        match self.protocol {
            Protocol::Ami => {
                tracing::info!("  Asterisk AMI: {}", self.ami.address());
                tracing::info!("  AMI User: {}", self.ami.username);
            }
            Protocol::Ari => {
                tracing::info!("  Asterisk ARI: {}:{}", self.ari.host, self.ari.port);
                tracing::info!("  ARI App: {}", self.ari.app_name);
            }
        }
        tracing::info!("  Webhook URL: {}", self.webhook.url);
        if self.reconnect.enabled {
            tracing::info!(
                "  Reconnect: enabled (initial {:?}, max {:?})",
                self.reconnect.initial,
                self.reconnect.max
            );
        }
    }
}

fn parse_port(name: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{name}={value:?} is not a valid port")))
}
