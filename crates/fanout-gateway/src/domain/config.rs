//! Gateway configuration with validation.
//!
//! The defaults reproduce the built-in routing table: three services on
//! ports 9091-9093 and a `grouped` route fanning out to all of them.
//! A TOML file named by `FANOUT_CONFIG` replaces the defaults section by
//! section.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// Environment variable naming an optional TOML configuration file
pub const CONFIG_PATH_ENV: &str = "FANOUT_CONFIG";
/// Environment override for the listen address
pub const HTTP_HOST_ENV: &str = "FANOUT_HTTP_HOST";
/// Environment override for the listen port
pub const HTTP_PORT_ENV: &str = "FANOUT_HTTP_PORT";

/// Main gateway configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration
    pub http: HttpConfig,
    /// Outbound client behaviour
    pub upstream: UpstreamOptions,
    /// Request limits
    pub limits: LimitsConfig,
    /// Known upstream services
    pub services: Vec<ServiceConfig>,
    /// Route name -> ordered list of service names
    pub routes: BTreeMap<String, Vec<String>>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let services: Vec<ServiceConfig> = (1..=3)
            .map(|n| ServiceConfig {
                name: format!("service{}", n),
                host: "0.0.0.0".to_string(),
                port: 9090 + n,
                endpoint: "/api/test".to_string(),
            })
            .collect();

        let mut routes: BTreeMap<String, Vec<String>> = services
            .iter()
            .map(|s| (s.name.clone(), vec![s.name.clone()]))
            .collect();
        routes.insert(
            "grouped".to_string(),
            services.iter().map(|s| s.name.clone()).collect(),
        );

        Self {
            http: HttpConfig::default(),
            upstream: UpstreamOptions::default(),
            limits: LimitsConfig::default(),
            services,
            routes,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| env::var(key).ok())
    }

    /// Load configuration using an arbitrary variable lookup.
    ///
    /// Reads the file named by [`CONFIG_PATH_ENV`] if set, applies the
    /// host/port overrides, then validates.
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(host) = lookup(HTTP_HOST_ENV) {
            config.http.host = host.trim().parse().map_err(|_| ConfigError::InvalidOverride {
                variable: HTTP_HOST_ENV,
                value: host.clone(),
            })?;
        }
        if let Some(port) = lookup(HTTP_PORT_ENV) {
            config.http.port = port.trim().parse().map_err(|_| ConfigError::InvalidOverride {
                variable: HTTP_PORT_ENV,
                value: port.clone(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Read a TOML configuration file. Does not validate.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse TOML configuration text. Does not validate.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port == 0 {
            return Err(ConfigError::InvalidPort("http.port cannot be 0".into()));
        }

        if !matches!(self.upstream.scheme.as_str(), "http" | "https") {
            return Err(ConfigError::InvalidScheme(self.upstream.scheme.clone()));
        }

        if self.upstream.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "connect_timeout cannot be 0".into(),
            ));
        }
        if self.upstream.request_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "request_timeout cannot be 0".into(),
            ));
        }

        if self.limits.max_request_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_request_size cannot be 0".into(),
            ));
        }

        let mut names = HashSet::new();
        for service in &self.services {
            service.validate()?;
            if !names.insert(service.name.as_str()) {
                return Err(ConfigError::DuplicateService(service.name.clone()));
            }
        }

        for (route, members) in &self.routes {
            if route.trim().is_empty() || route.trim() != route {
                return Err(ConfigError::Invalid(format!(
                    "route name {:?} must be non-empty without surrounding whitespace",
                    route
                )));
            }
            if members.is_empty() {
                return Err(ConfigError::EmptyRoute(route.clone()));
            }
            if let Some(missing) = members.iter().find(|m| !names.contains(m.as_str())) {
                return Err(ConfigError::UnknownService {
                    route: route.clone(),
                    service: missing.clone(),
                });
            }
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8080)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
        }
    }
}

/// Outbound request options shared by every upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamOptions {
    /// URL scheme used to reach upstreams
    pub scheme: String,
    /// TCP connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Whole-request timeout, including reading the reply body
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Idle pooled connections are closed after this long
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Duration,
}

impl Default for UpstreamOptions {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

/// Request limits configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Max inbound request body size in bytes (default: 1MiB)
    pub max_request_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size: 1024 * 1024,
        }
    }
}

/// A single upstream service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Unique name, used as the key in merged replies
    pub name: String,
    /// Host name or address
    pub host: String,
    /// Port
    pub port: u16,
    /// Path requested on the upstream
    pub endpoint: String,
}

impl ServiceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidService("service name cannot be empty".into()));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidService(format!(
                "{}: host cannot be empty",
                self.name
            )));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(format!(
                "{}: port cannot be 0",
                self.name
            )));
        }
        if !self.endpoint.starts_with('/') {
            return Err(ConfigError::InvalidService(format!(
                "{}: endpoint must start with '/'",
                self.name
            )));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("cannot parse config: {0}")]
    Parse(String),
    #[error("invalid value {value:?} for {variable}")]
    InvalidOverride {
        variable: &'static str,
        value: String,
    },
    #[error("invalid port: {0}")]
    InvalidPort(String),
    #[error("unsupported upstream scheme: {0}")]
    InvalidScheme(String),
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    #[error("invalid service: {0}")]
    InvalidService(String),
    #[error("duplicate service name: {0}")]
    DuplicateService(String),
    #[error("route {0} has no upstreams")]
    EmptyRoute(String),
    #[error("route {route} references unknown service {service}")]
    UnknownService { route: String, service: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Duration (de)serialization as `"30s"`, `"500ms"` or `"2m"`
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_nanos() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ms" must be checked before the bare 'm' and 's' suffixes
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
