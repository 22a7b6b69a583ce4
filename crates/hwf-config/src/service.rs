use crate::metadata::{load_metadata_file, parse_metadata_pair, Metadata};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CALIPER_ENDPOINT: &str =
    "https://lti.tools/caliper/event?key=hwf-jupyter-lsloan&limit=0";
pub const DEFAULT_CALIPER_API_KEY: &str = "your-caliper-endpoint-key";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid metadata: {details}")]
    InvalidMetadata { details: String },

    #[error("Invalid configuration: {details}")]
    InvalidConfiguration { details: String },
}

/// Which sink receives telemetry events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    Console,
    #[default]
    Caliper,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Caliper => "caliper",
        }
    }
}

impl FromStr for SinkKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "caliper" => Ok(Self::Caliper),
            other => Err(ConfigError::InvalidConfiguration {
                details: format!("unknown sink '{}', expected 'console' or 'caliper'", other),
            }),
        }
    }
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Collector destination and the identities the analytics sink stamps on events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaliperSettings {
    pub endpoint_url: String,
    pub api_key: String,
    pub sensor_id: String,
    /// Prefix for actor identities, e.g. `urn:umich:jupyter:user:`
    pub actor_namespace: String,
    /// Prefix for session identities
    pub session_namespace: String,
    pub ed_app_id: String,
    /// Log every outgoing envelope at debug level
    pub debug: bool,
    /// Collector request timeout. Unset waits for the collector indefinitely
    pub timeout_secs: Option<u64>,
}

impl Default for CaliperSettings {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_CALIPER_ENDPOINT.to_string(),
            api_key: DEFAULT_CALIPER_API_KEY.to_string(),
            sensor_id: "urn:umich:jupyter:sensor".to_string(),
            actor_namespace: "urn:umich:jupyter:user:".to_string(),
            session_namespace: "urn:umich:jupyter:session:".to_string(),
            ed_app_id: "urn:umich:jupyter:notebook".to_string(),
            debug: false,
            timeout_secs: None,
        }
    }
}

/// Process-wide configuration, fixed for the lifetime of the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    /// Always starts and ends with `/`
    pub base_url: String,
    pub token: String,
    /// Set when `token` was generated rather than supplied by the operator
    #[serde(default)]
    pub token_generated: bool,
    pub sink: SinkKind,
    pub caliper: CaliperSettings,
    pub metadata: Metadata,
}

impl ServerConfig {
    /// Create a configuration with defaults. A random token is generated when
    /// none is supplied.
    pub fn new(address: impl Into<String>, base_url: &str, token: Option<String>) -> Self {
        let token_generated = token.is_none();
        let token = token.unwrap_or_else(|| {
            debug!("No server token supplied, generating one");
            Self::generate_token()
        });

        Self {
            address: address.into(),
            base_url: normalize_base_url(base_url),
            token,
            token_generated,
            sink: SinkKind::default(),
            caliper: CaliperSettings::default(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_sink(mut self, sink: SinkKind) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_caliper(mut self, caliper: CaliperSettings) -> Self {
        self.caliper = caliper;
        self
    }

    /// Merge metadata from an optional file and `KEY=VALUE` pairs. Pairs win
    /// over file entries with the same key.
    pub fn with_metadata(
        mut self,
        file: Option<&Path>,
        pairs: &[String],
    ) -> Result<Self, ConfigError> {
        if let Some(path) = file {
            self.metadata.extend(load_metadata_file(path)?);
        }

        for pair in pairs {
            let (key, value) = parse_metadata_pair(pair)?;
            self.metadata.insert(key, value);
        }

        Ok(self)
    }

    /// Full path of the telemetry event route
    pub fn event_route(&self) -> String {
        format!("{}telemetry/event", self.base_url)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::InvalidConfiguration {
                details: "listen address must not be empty".to_string(),
            });
        }

        if self.token.trim().is_empty() {
            return Err(ConfigError::InvalidConfiguration {
                details: "server token must not be empty".to_string(),
            });
        }

        if self.sink == SinkKind::Caliper {
            let endpoint = url::Url::parse(&self.caliper.endpoint_url).map_err(|e| {
                ConfigError::InvalidConfiguration {
                    details: format!(
                        "invalid collector endpoint '{}': {}",
                        self.caliper.endpoint_url, e
                    ),
                }
            })?;

            if !matches!(endpoint.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidConfiguration {
                    details: format!(
                        "collector endpoint must be http or https, got '{}'",
                        endpoint.scheme()
                    ),
                });
            }
        }

        Ok(())
    }

    /// Generate a 24-byte server token (48 hex characters)
    fn generate_token() -> String {
        let mut rng = rand::thread_rng();
        let bytes: Vec<u8> = (0..24).map(|_| rng.gen::<u8>()).collect();
        hex::encode(bytes)
    }
}

fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}
