//! Command-line interface configuration

use anyhow::{bail, Context, Result};
use bitcoin_feerate_estimator::DistributionMode;
use clap::Parser;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::bitcoin::Network;
use crate::config::AppConfig;

/// Bitcoin fee rate estimator CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    // Bitcoin RPC options
    /// Connection string to the bitcoind RPC API, of the form <host>:<port>
    #[arg(short, long, value_parser = parse_connection)]
    pub connection: Option<(String, u16)>,

    /// Use HTTPS to connect to the bitcoind RPC API
    #[arg(short, long)]
    pub secure: bool,

    /// Username used to access the bitcoind RPC API
    #[arg(short, long, conflicts_with = "cookie", requires = "password")]
    pub username: Option<String>,

    /// Password used to access the bitcoind RPC API
    #[arg(short, long, conflicts_with = "cookie", requires = "username")]
    pub password: Option<String>,

    /// Cookie file to access the bitcoind RPC API
    #[arg(short = 'k', long)]
    pub cookie: Option<PathBuf>,

    /// Network of the node, used for the default port and cookie location
    #[arg(short, long)]
    pub network: Option<Network>,

    /// RPC request timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    // Estimator options
    /// Mode used for the estimate (txs | bundles)
    #[arg(short, long)]
    pub mode: Option<DistributionMode>,

    /// Delay in seconds between two computations of the estimate
    #[arg(short, long)]
    pub refresh: Option<u64>,

    /// Enable debug mode
    #[arg(long)]
    pub debug: bool,

    // Output
    /// Print every result as a JSON line on stdout
    #[arg(long)]
    pub json: bool,

    /// Serve the latest result over HTTP on <host>:<port>
    #[arg(long)]
    pub http_listen: Option<String>,

    // Logging
    /// Log filter (e.g., "bitcoin_feerate_estimator=debug")
    #[arg(long)]
    pub log_filter: Option<String>,

    /// Path to configuration file (overridden by CLI args)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Applies the flags given on the command line over `config`.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some((host, port)) = &self.connection {
            config.rpc.host = host.clone();
            config.rpc.port = Some(*port);
        }
        if self.secure {
            config.rpc.secure = true;
        }
        if let Some(network) = self.network {
            config.rpc.network = network;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.rpc.timeout_ms = timeout_ms;
        }

        // Credentials on the command line replace configured ones entirely
        if let Some(cookie) = &self.cookie {
            config.rpc.cookie = Some(cookie.clone());
            config.rpc.username = None;
            config.rpc.password = None;
        }
        if self.username.is_some() || self.password.is_some() {
            config.rpc.username = self.username.clone();
            config.rpc.password = self.password.clone();
            config.rpc.cookie = None;
        }

        if let Some(mode) = self.mode {
            config.estimator.mode = mode;
        }
        if let Some(refresh) = self.refresh {
            config.estimator.refresh_seconds = refresh;
        }
        if self.debug {
            config.estimator.debug = true;
        }
        if let Some(listen) = &self.http_listen {
            config.http.listen = Some(listen.clone());
        }
    }
}

/// Parses a `<host>:<port>` connection string.
pub fn parse_connection(value: &str) -> Result<(String, u16)> {
    let Some((host, port)) = value.rsplit_once(':') else {
        bail!("No port provided. Expected <host>:<port>");
    };

    let valid_host = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if !valid_host {
        bail!("Invalid format. Expected <host>:<port>");
    }

    let port: u32 = port.parse().context("Invalid port number")?;
    if port == 0 || port > u32::from(u16::MAX) {
        bail!("Port number out of range. Valid range is 1-65535.");
    }

    Ok((host.to_string(), port as u16))
}

/// Read Bitcoin Core cookie file and extract credentials
pub fn read_cookie_file(path: &Path) -> Result<(String, String)> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            bail!("File not found: {}", path.display())
        }
        Err(err) if err.kind() == ErrorKind::PermissionDenied => {
            bail!("Permission denied: {}", path.display())
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("Failed to read cookie file: {}", path.display()))
        }
    };

    let parts: Vec<&str> = contents.split(':').collect();
    if parts.len() != 2 {
        bail!("Cookie file is invalid (expected username:password)");
    }
    Ok((parts[0].trim().to_string(), parts[1].trim().to_string()))
}
