use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Network the storefront transacts on
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
    Localnet,
}

impl Network {
    /// Convert a network name into a [`Network`]
    /// - mainnet, main -> Network::Mainnet
    /// - testnet, test -> Network::Testnet
    /// - devnet, dev -> Network::Devnet
    /// - localnet, local -> Network::Localnet
    ///
    /// Matching is case insensitive. If the conversion fails, return an error
    pub fn from_string(s: &str) -> Result<Self, Error> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Self::Mainnet),
            "testnet" | "test" => Ok(Self::Testnet),
            "devnet" | "dev" => Ok(Self::Devnet),
            "localnet" | "local" => Ok(Self::Localnet),
            _ => Err(Error::InvalidRequest(format!("unknown network {}", s))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Devnet => "devnet",
            Self::Localnet => "localnet",
        }
    }

    /// Public full node used when no endpoint is configured
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://fullnode.mainnet.sui.io:443",
            Self::Testnet => "https://fullnode.testnet.sui.io:443",
            Self::Devnet => "https://fullnode.devnet.sui.io:443",
            Self::Localnet => "http://127.0.0.1:9000",
        }
    }

    /// Chain identifier reported by the network's nodes. Devnet and localnet are regularly
    /// wiped and have no stable identifier.
    pub fn chain_identifier(&self) -> Option<&'static str> {
        match self {
            Self::Mainnet => Some("35834a8a"),
            Self::Testnet => Some("4c78adac"),
            Self::Devnet | Self::Localnet => None,
        }
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}
