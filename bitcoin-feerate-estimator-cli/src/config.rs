use anyhow::{bail, Result};
use bitcoin_feerate_estimator::EstimatorOptions;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::bitcoin::{BitcoinRpcConfig, Network};
use crate::cli::read_cookie_file;

/// Application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub rpc: RpcConfig,
    pub estimator: EstimatorOptions,
    pub http: HttpConfig,
}

/// Bitcoin RPC connection configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RpcConfig {
    /// Node host (default: localhost)
    pub host: String,
    /// Node RPC port (default: the network's port)
    pub port: Option<u16>,
    /// Connect over HTTPS
    pub secure: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Cookie file, alternative to username/password
    pub cookie: Option<PathBuf>,
    /// Per-request timeout in milliseconds (default: 30000)
    pub timeout_ms: u64,
    /// Network of the node (default: mainnet)
    pub network: Network,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: None,
            secure: false,
            username: None,
            password: None,
            cookie: None,
            timeout_ms: 30_000,
            network: Network::Mainnet,
        }
    }
}

/// Optional HTTP exposure of the latest result
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct HttpConfig {
    /// Address to serve on, e.g. `127.0.0.1:8080`; disabled when unset
    pub listen: Option<String>,
}

/// RPC username and password, resolved from any of the supported sources
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl RpcConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.network.default_port())
    }

    pub fn url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}/", scheme, self.host, self.port())
    }

    /// Resolves the credentials: explicit username/password, then an explicit
    /// cookie, then the network's default cookie file.
    pub fn credentials(&self) -> Result<Credentials> {
        if self.cookie.is_some() && (self.username.is_some() || self.password.is_some()) {
            bail!("An RPC cookie file cannot be combined with an RPC username or password");
        }

        let (username, password) = match (&self.username, &self.password, &self.cookie) {
            (Some(username), Some(password), _) => (username.clone(), password.clone()),
            (Some(_), None, _) | (None, Some(_), _) => {
                bail!("RPC username and password must be given together")
            }
            (None, None, Some(cookie)) => read_cookie_file(cookie)?,
            (None, None, None) => match self.network.default_cookie_path() {
                Some(path) if path.exists() => {
                    debug!("Using default cookie file {}", path.display());
                    read_cookie_file(&path)?
                }
                _ => bail!("Expected an RPC cookie file path or an RPC username & password"),
            },
        };

        if username.is_empty() || password.is_empty() {
            bail!("Unauthenticated RPC communication is not supported. Provide valid username and password");
        }

        Ok(Credentials { username, password })
    }

    /// Builds the RPC client configuration with resolved credentials.
    pub fn client_config(&self, credentials: Credentials) -> BitcoinRpcConfig {
        BitcoinRpcConfig {
            url: self.url(),
            username: credentials.username,
            password: credentials.password,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional file and environment variables
    ///
    /// The file is `path` when given, otherwise `FEERATE_CONFIG_FILE`, otherwise
    /// `config/default` and `config` when present. Environment variables use the
    /// `FEERATE_` prefix and `__` between nested keys, e.g. `FEERATE_RPC__PORT`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // Default values
            .set_default("rpc.host", "localhost")?
            .set_default("rpc.secure", false)?
            .set_default("rpc.timeout_ms", 30_000)?
            .set_default("rpc.network", "mainnet")?
            .set_default("estimator.mode", "txs")?
            .set_default(
                "estimator.refresh_seconds",
                EstimatorOptions::DEFAULT_REFRESH_SECONDS,
            )?
            .set_default("estimator.debug", false)?;

        let env_file = std::env::var("FEERATE_CONFIG_FILE").ok().map(PathBuf::from);
        match path.map(Path::to_path_buf).or(env_file) {
            Some(file) => builder = builder.add_source(File::from(file)),
            None => {
                builder = builder
                    .add_source(File::with_name("config/default").required(false))
                    .add_source(File::with_name("config").required(false));
            }
        }

        // Override with environment variables (FEERATE_ prefix)
        builder = builder.add_source(
            Environment::with_prefix("FEERATE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
