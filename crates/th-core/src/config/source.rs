//! Event source configuration

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration;
use crate::error::ConfigError;

/// Manager Interface (AMI) connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmiConfig {
    /// Asterisk host
    pub host: String,

    /// Manager TCP port
    pub port: u16,

    /// Manager account
    pub username: String,

    /// Manager account secret
    pub secret: String,
}

impl Default for AmiConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5038,
            username: "admin".to_string(),
            secret: "admin".to_string(),
        }
    }
}

impl AmiConfig {
    /// `host:port` of the manager interface
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// REST Interface (ARI) connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AriConfig {
    /// Asterisk host
    pub host: String,

    /// HTTP port serving ARI
    pub port: u16,

    /// ARI user
    pub username: String,

    /// ARI password
    pub password: String,

    /// Stasis application to register and subscribe as
    pub app_name: String,

    /// WebSocket opening handshake timeout
    #[serde(with = "duration")]
    pub handshake_timeout: Duration,

    /// How long to wait for the peer's close frame on shutdown
    #[serde(with = "duration")]
    pub close_grace: Duration,
}

impl Default for AriConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8088,
            username: "admin".to_string(),
            password: "admin".to_string(),
            app_name: "webhook-forwarder".to_string(),
            handshake_timeout: Duration::from_secs(10),
            close_grace: Duration::from_secs(1),
        }
    }
}

impl AriConfig {
    fn base_url(&self, scheme: &str) -> Result<Url, ConfigError> {
        Url::parse(&format!("{}://{}:{}/ari/", scheme, self.host, self.port))
            .map_err(|e| {
                ConfigError::Invalid(format!("ARI address {}:{}: {}", self.host, self.port, e))
            })
    }

    /// Control endpoint registering the application (`PUT`)
    pub fn application_url(&self) -> Result<Url, ConfigError> {
        let mut url = self.base_url("http")?;
        url.path_segments_mut()
            .map_err(|_| ConfigError::Invalid("ARI URL cannot carry a path".into()))?
            .pop_if_empty()
            .push("applications")
            .push(&self.app_name);
        Ok(url)
    }

    /// Event stream endpoint, carrying the application and credentials as
    /// query parameters
    pub fn events_url(&self) -> Result<Url, ConfigError> {
        let mut url = self.base_url("ws")?.join("events").map_err(|e| {
            ConfigError::Invalid(format!("ARI events URL: {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("app", &self.app_name)
            .append_pair("api_key", &format!("{}:{}", self.username, self.password));
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ami_address() {
        let config = AmiConfig::default();
        assert_eq!(config.address(), "localhost:5038");
    }

    #[test]
    fn test_application_url() {
        let config = AriConfig {
            host: "pbx.local".into(),
            app_name: "my app".into(),
            ..AriConfig::default()
        };

        assert_eq!(
            config.application_url().unwrap().as_str(),
            "http://pbx.local:8088/ari/applications/my%20app"
        );
    }

    #[test]
    fn test_events_url() {
        let config = AriConfig {
            username: "asterisk".into(),
            password: "p&ss".into(),
            ..AriConfig::default()
        };

        let url = config.events_url().unwrap();
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.path(), "/ari/events");

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("app".to_string(), "webhook-forwarder".to_string()),
                ("api_key".to_string(), "asterisk:p&ss".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_host() {
        let config = AriConfig {
            host: "bad host".into(),
            ..AriConfig::default()
        };
        assert!(config.application_url().is_err());
    }
}
