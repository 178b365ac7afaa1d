use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Base URI must start and end with '/': {0}")]
    InvalidBaseUri(String),

    #[error("HTTP timeout cannot be 0")]
    InvalidTimeout,

    #[error("Unsupported URL scheme for {0}: {1}")]
    UnsupportedScheme(&'static str, String),
}

/// How TAC values are represented in the userplane document.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TacEncoding {
    /// Decimal integer in the document, lowercase hex string on the backends
    #[default]
    Integer,
    /// String passed through unchanged in both directions
    String,
}

/// Userplane gateway configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for incoming requests
    pub listener: Listener,
    /// Admin listener for health and readiness probes
    pub admin_listener: Listener,
    /// Prefix stripped from every request path before routing
    #[serde(default = "default_base_uri")]
    pub base_uri: String,
    /// PGW profile service
    pub pgw: BackendConfig,
    /// SGW profile service
    pub sgw: BackendConfig,
    #[serde(default)]
    pub tac_encoding: TacEncoding,
    #[serde(default)]
    pub timeouts: Timeouts,
}

fn default_base_uri() -> String {
    "/".to_string()
}

impl Config {
    /// Validates the gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if !self.base_uri.starts_with('/') || !self.base_uri.ends_with('/') {
            return Err(ValidationError::InvalidBaseUri(self.base_uri.clone()));
        }

        self.pgw.validate("pgw")?;
        self.sgw.validate("sgw")?;
        self.timeouts.validate()?;

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    /// Validates the listener configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Control-plane profile service endpoint
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// Base URL, e.g. `http://192.168.120.219:10000`
    pub url: Url,
}

impl BackendConfig {
    fn validate(&self, name: &'static str) -> Result<(), ValidationError> {
        match self.url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ValidationError::UnsupportedScheme(name, other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Timeouts {
    /// Bound on one backend call, connection through body
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_http_timeout_secs() -> u64 {
    10
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl Timeouts {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.http_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            listener: Listener {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            admin_listener: Listener {
                host: "127.0.0.1".to_string(),
                port: 8081,
            },
            base_uri: "/".to_string(),
            pgw: BackendConfig {
                url: Url::parse("http://192.168.120.219:10000").unwrap(),
            },
            sgw: BackendConfig {
                url: Url::parse("http://192.168.120.220:10000").unwrap(),
            },
            tac_encoding: TacEncoding::Integer,
            timeouts: Timeouts::default(),
        }
    }

    #[test]
    fn test_parse_valid_config() {
        let yaml = r#"
listener:
    host: "0.0.0.0"
    port: 8080
admin_listener:
    host: "127.0.0.1"
    port: 8081
base_uri: /oam/
pgw:
    url: "http://192.168.120.219:10000"
sgw:
    url: "http://192.168.120.220:10000"
tac_encoding: string
timeouts:
    http_timeout_secs: 3
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.base_uri, "/oam/");
        assert_eq!(config.pgw.url.port(), Some(10000));
        assert_eq!(config.tac_encoding, TacEncoding::String);
        assert_eq!(config.timeouts.http_timeout_secs, 3);
    }

    #[test]
    fn test_defaults() {
        let yaml = r#"
listener: {host: "0.0.0.0", port: 8080}
admin_listener: {host: "127.0.0.1", port: 8081}
pgw: {url: "http://127.0.0.1:10000"}
sgw: {url: "http://127.0.0.1:10001"}
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.base_uri, "/");
        assert_eq!(config.tac_encoding, TacEncoding::Integer);
        assert_eq!(config.timeouts.http_timeout_secs, 10);
    }

    #[test]
    fn test_validation_errors() {
        assert!(base_config().validate().is_ok());

        let mut config = base_config();
        config.admin_listener.port = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidPort
        ));

        let mut config = base_config();
        config.base_uri = "oam".to_string();
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidBaseUri(_)
        ));

        let mut config = base_config();
        config.timeouts.http_timeout_secs = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidTimeout
        ));

        let mut config = base_config();
        config.sgw.url = Url::parse("ftp://192.168.120.220").unwrap();
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::UnsupportedScheme("sgw", _)
        ));
    }

    #[test]
    fn test_deserialization_errors() {
        // Invalid URL
        assert!(
            serde_yaml::from_str::<Config>(
                r#"
listener: {host: "0.0.0.0", port: 8080}
admin_listener: {host: "127.0.0.1", port: 8081}
pgw: {url: "not-a-url"}
sgw: {url: "http://127.0.0.1:10001"}
"#
            )
            .is_err()
        );

        // Missing backend
        assert!(
            serde_yaml::from_str::<Config>(
                r#"
listener: {host: "0.0.0.0", port: 8080}
admin_listener: {host: "127.0.0.1", port: 8081}
pgw: {url: "http://127.0.0.1:10000"}
"#
            )
            .is_err()
        );

        // Unknown TAC encoding
        assert!(serde_yaml::from_str::<TacEncoding>("hex").is_err());
    }
}
