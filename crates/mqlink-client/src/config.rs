//! Client configuration types.
//!
//! A [`ClientConfig`] is normally assembled with the builder methods, but it
//! can also be loaded from a TOML file:
//! - `${VAR}` or `${VAR:-default}` is substituted from the environment before parsing
//! - `MQLINK__` prefixed environment variables override file values
//!   (e.g. `MQLINK__PORT=8883`, `MQLINK__TLS__SERVER_NAME=broker.local`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Environment, File, FileFormat};
use mqlink_core::QoS;
use regex::Regex;
use serde::Deserialize;

use crate::error::{ClientError, Result};
use crate::will::Will;

/// Default broker port for plain TCP.
pub const DEFAULT_PORT: u16 = 1883;
/// Default keep-alive interval in seconds.
pub const DEFAULT_KEEP_ALIVE: u16 = 60;
/// Default delay between connection attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);
/// Default time allowed for the transport connect and the CONNACK.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// TLS settings for the broker connection.
///
/// When no CA certificate is given the webpki root store is used.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to a PEM-encoded CA certificate used to verify the broker.
    pub ca_cert: Option<PathBuf>,
    /// Path to a PEM-encoded client certificate (mutual TLS).
    pub client_cert: Option<PathBuf>,
    /// Path to the PEM-encoded private key for `client_cert`.
    pub client_key: Option<PathBuf>,
    /// Name to verify the broker certificate against (defaults to the host).
    pub server_name: Option<String>,
    /// Skip certificate verification. Testing only.
    pub accept_invalid_certs: bool,
}

impl TlsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    pub fn client_auth(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.client_cert = Some(cert.into());
        self.client_key = Some(key.into());
        self
    }

    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.client_cert.is_some() != self.client_key.is_some() {
            return Err(ClientError::InvalidInput(
                "tls.client_cert and tls.client_key must be set together".into(),
            ));
        }
        Ok(())
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Broker host name or IP address.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Client identifier. Must be non-empty by the time `connect` runs.
    pub client_id: String,
    /// Username for authentication.
    pub username: Option<String>,
    /// Password for authentication. Requires a username.
    pub password: Option<Vec<u8>>,
    /// Keep-alive interval in seconds (0 = disabled).
    pub keep_alive: u16,
    /// Clean session flag.
    pub clean_session: bool,
    /// Last will published by the broker on abnormal disconnect.
    pub will: Option<Will>,
    /// Minimum delay between connection attempts.
    pub retry_interval: Duration,
    /// Timeout for the transport connect and the CONNACK read.
    pub connect_timeout: Duration,
    /// Largest inbound packet accepted, in bytes (0 = unlimited).
    pub max_packet_size: usize,
    /// TLS settings. `None` means plain TCP.
    pub tls: Option<TlsConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            client_id: String::new(),
            username: None,
            password: None,
            keep_alive: DEFAULT_KEEP_ALIVE,
            clean_session: true,
            will: None,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_packet_size: 0,
            tls: None,
        }
    }
}

impl ClientConfig {
    /// Create a new config for the given broker.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the client ID.
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }

    /// Set username only.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set username and password.
    pub fn credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<Vec<u8>>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set keep-alive interval in seconds.
    pub fn keep_alive(mut self, seconds: u16) -> Self {
        self.keep_alive = seconds;
        self
    }

    /// Set clean session flag.
    pub fn clean_session(mut self, clean: bool) -> Self {
        self.clean_session = clean;
        self
    }

    /// Set the last will message.
    pub fn will(mut self, will: Will) -> Self {
        self.will = Some(will);
        self
    }

    /// Set the delay between connection attempts.
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Limit the size of inbound packets.
    pub fn max_packet_size(mut self, bytes: usize) -> Self {
        self.max_packet_size = bytes;
        self
    }

    /// Connect over TLS.
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// `host:port` string used for socket address resolution.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Merge per-connect overrides into a copy of this config.
    pub fn apply(&self, options: ConnectOptions) -> ClientConfig {
        let mut merged = self.clone();
        if let Some(client_id) = options.client_id {
            merged.client_id = client_id;
        }
        if let Some(username) = options.username {
            merged.username = Some(username);
        }
        if let Some(password) = options.password {
            merged.password = Some(password);
        }
        if let Some(clean_session) = options.clean_session {
            merged.clean_session = clean_session;
        }
        if let Some(will) = options.will {
            merged.will = Some(will);
        }
        merged
    }

    /// Check everything `connect` needs.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() {
            return Err(ClientError::InvalidInput("client id must not be empty".into()));
        }
        self.validate_settings()
    }

    /// Checks that do not depend on per-connect options.
    fn validate_settings(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(ClientError::InvalidInput("host must not be empty".into()));
        }
        if self.connect_timeout.is_zero() {
            return Err(ClientError::InvalidInput(
                "connect_timeout must be non-zero".into(),
            ));
        }
        if self.password.is_some() && self.username.is_none() {
            // MQTT-3.1.2-22: password flag requires the username flag
            return Err(ClientError::InvalidInput(
                "password requires a username".into(),
            ));
        }
        if let Some(ref will) = self.will {
            will.validate()?;
        }
        if let Some(ref tls) = self.tls {
            tls.validate()?;
        }
        Ok(())
    }

    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// A missing file is not an error: defaults and `MQLINK__` variables
    /// still apply.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("host", "localhost")?
            .set_default("port", DEFAULT_PORT as i64)?
            .set_default("keep_alive", DEFAULT_KEEP_ALIVE as i64)?
            .set_default("clean_session", true)?
            .set_default("retry_interval", DEFAULT_RETRY_INTERVAL.as_secs() as i64)?
            .set_default("connect_timeout", DEFAULT_CONNECT_TIMEOUT.as_secs() as i64)?
            .set_default("max_packet_size", 0)?;

        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let substituted = substitute_env_vars(&content)?;
            builder = builder.add_source(File::from_str(&substituted, FileFormat::Toml));
        }

        let cfg = builder
            .add_source(
                Environment::with_prefix("MQLINK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let file: FileConfig = cfg.try_deserialize()?;
        Self::from_file_config(file)
    }

    /// Load configuration from environment variables only (no file).
    pub fn from_env() -> Result<Self> {
        Self::load(Path::new(""))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let substituted = substitute_env_vars(content)?;
        let file: FileConfig = toml::from_str(&substituted)
            .map_err(|e| ClientError::Config(format!("TOML parse error: {}", e)))?;
        Self::from_file_config(file)
    }

    fn from_file_config(file: FileConfig) -> Result<Self> {
        let will = match file.will {
            Some(w) => {
                let qos = QoS::try_from(w.qos)
                    .map_err(|_| ClientError::Config(format!("will.qos must be 0 or 1, got {}", w.qos)))?;
                Some(Will::new(w.topic, w.payload.into_bytes()).qos(qos).retain(w.retain))
            }
            None => None,
        };

        let config = ClientConfig {
            host: file.host,
            port: file.port,
            client_id: file.client_id,
            username: file.username,
            password: file.password.map(String::into_bytes),
            keep_alive: file.keep_alive,
            clean_session: file.clean_session,
            will,
            retry_interval: Duration::from_secs(file.retry_interval),
            connect_timeout: Duration::from_secs(file.connect_timeout),
            max_packet_size: file.max_packet_size,
            tls: file.tls,
        };

        config
            .validate_settings()
            .map_err(|e| ClientError::Config(e.to_string()))?;
        Ok(config)
    }
}

/// Per-connect overrides, mirroring `connect(client_id, user, password, clean_session, will)`.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Override client_id.
    pub client_id: Option<String>,
    /// Override username.
    pub username: Option<String>,
    /// Override password.
    pub password: Option<Vec<u8>>,
    /// Override clean_session.
    pub clean_session: Option<bool>,
    /// Override the last will.
    pub will: Option<Will>,
}

impl ConnectOptions {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            ..Default::default()
        }
    }

    pub fn credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<Vec<u8>>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn clean_session(mut self, clean: bool) -> Self {
        self.clean_session = Some(clean);
        self
    }

    pub fn will(mut self, will: Will) -> Self {
        self.will = Some(will);
        self
    }
}

/// On-disk form of [`ClientConfig`]. Durations are whole seconds.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct FileConfig {
    host: String,
    port: u16,
    client_id: String,
    username: Option<String>,
    password: Option<String>,
    keep_alive: u16,
    clean_session: bool,
    retry_interval: u64,
    connect_timeout: u64,
    max_packet_size: usize,
    will: Option<FileWill>,
    tls: Option<TlsConfig>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            client_id: String::new(),
            username: None,
            password: None,
            keep_alive: DEFAULT_KEEP_ALIVE,
            clean_session: true,
            retry_interval: DEFAULT_RETRY_INTERVAL.as_secs(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            max_packet_size: 0,
            will: None,
            tls: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileWill {
    topic: String,
    #[serde(default)]
    payload: String,
    #[serde(default)]
    qos: u8,
    #[serde(default)]
    retain: bool,
}

/// Substitute environment variables in a string.
/// Supports `${VAR}` and `${VAR:-default}` syntax.
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}")
        .map_err(|e| ClientError::Config(e.to_string()))?;
    Ok(re
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .to_string())
}
