use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Bitcoin network the node runs on; decides default port and cookie location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Signet,
    Regtest,
}

impl Network {
    /// Default RPC port of Bitcoin Core on this network.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Mainnet => 8332,
            Self::Testnet => 18332,
            Self::Signet => 38332,
            Self::Regtest => 18443,
        }
    }

    /// Subdirectory of the data directory holding this network's files.
    fn data_subdir(&self) -> Option<&'static str> {
        match self {
            Self::Mainnet => None,
            Self::Testnet => Some("testnet3"),
            Self::Signet => Some("signet"),
            Self::Regtest => Some("regtest"),
        }
    }

    /// Cookie file written by a node using the default data directory.
    pub fn default_cookie_path(&self) -> Option<PathBuf> {
        let mut path = dirs::home_dir()?.join(".bitcoin");
        if let Some(subdir) = self.data_subdir() {
            path.push(subdir);
        }
        path.push(".cookie");
        Some(path)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Signet => "signet",
            Self::Regtest => "regtest",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" | "main" => Ok(Self::Mainnet),
            "testnet" | "test" => Ok(Self::Testnet),
            "signet" => Ok(Self::Signet),
            "regtest" => Ok(Self::Regtest),
            other => Err(format!("Invalid network name {other}")),
        }
    }
}
