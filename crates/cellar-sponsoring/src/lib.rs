use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

use cellar_common::{measure_duration, metric};
use cellar_ledger::transaction::TransactionKind;
use cellar_ledger::types::{Address, Digest};
use cellar_ledger::Network;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, instrument, warn};

use crate::relay::RelaySponsoring;

#[cfg(feature = "testing")]
pub mod mock;

mod relay;

#[macro_export]
macro_rules! log_if_error {
    ($e: expr) => {{
        let result = $e;
        match &result {
            Err(e @ Error::Configuration(_)) => error!(message=%e),
            Err(e @ Error::Unavailable(_)) => error!(message=%e),
            Err(e) => warn!(message=%e),
            _ => (),
        };
        result
    }};
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid sponsorship request: {0}")]
    InvalidRequest(String),

    #[error("sponsorship is not configured: {0}")]
    Configuration(String),

    /// The relay refused to pay for the transaction
    #[error("sponsorship declined: {0}")]
    Declined(String),

    #[error("sponsorship relay unavailable: {0}")]
    Unavailable(String),
}

/// Credential presented to the relay. Never printed.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelayCredential(String);

impl RelayCredential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub(crate) fn expose(&self) -> &str {
        self.0.trim()
    }
}

impl Debug for RelayCredential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("RelayCredential(<redacted>)")
    }
}

fn default_timeout() -> u64 {
    10
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RelayConfiguration {
    pub endpoint: String,

    #[serde(default)]
    pub api_key: RelayCredential,

    /// Seconds before a sponsorship request is abandoned
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Move call targets the relay is allowed to pay for. Empty lets the relay decide.
    #[serde(default)]
    pub allowed_move_call_targets: Vec<String>,

    #[serde(default)]
    pub allowed_addresses: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Configuration {
    #[cfg(feature = "testing")]
    #[serde(skip)]
    Mock(std::sync::Arc<dyn mock::MockSponsor>),

    None,
    Relay(RelayConfiguration),
}

impl Configuration {
    pub fn none() -> Self {
        Self::None
    }

    #[cfg(feature = "testing")]
    pub fn mock<T: mock::MockSponsor>(sponsor: T) -> Self {
        Self::Mock(std::sync::Arc::new(sponsor))
    }
}

/// A complete transaction whose gas is paid by the relay
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SponsoredTransaction {
    /// Transaction data in base64
    pub bytes: String,
    pub digest: Digest,

    /// Signature of the gas owner, when the relay provides one
    pub sponsor_signature: Option<String>,
}

#[derive(Clone)]
enum Sponsor {
    #[cfg(feature = "testing")]
    Mock(std::sync::Arc<dyn mock::MockSponsor>),

    None,
    Relay(RelaySponsoring),
}

#[derive(Clone)]
pub struct Client {
    sponsor: Sponsor,
}

impl Client {
    pub fn new(configuration: &Configuration) -> Result<Self, Error> {
        let sponsor = match configuration {
            #[cfg(feature = "testing")]
            Configuration::Mock(sponsor) => Sponsor::Mock(sponsor.clone()),

            Configuration::None => Sponsor::None,
            Configuration::Relay(configuration) => Sponsor::Relay(RelaySponsoring::new(configuration.clone())?),
        };

        Ok(Self { sponsor })
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.sponsor, Sponsor::None)
    }

    /// Ask the relay to pay for the transaction described by `transaction_kind_bytes`. The
    /// request is validated before anything is sent. Every successful call returns a new
    /// transaction, hence a new digest.
    #[instrument(name = "request_sponsorship", skip(self, transaction_kind_bytes), fields(network = %network))]
    pub async fn request_sponsorship(&self, transaction_kind_bytes: &[u8], sender: &str, network: Network) -> Result<SponsoredTransaction, Error> {
        let (result, duration) = measure_duration!(log_if_error!(self.sponsor(transaction_kind_bytes, sender, network).await));

        metric!(counter[sponsorship_request] = 1, network = network.as_str());
        metric!(histogram[sponsorship_request_duration_milliseconds] = duration.as_millis(), network = network.as_str());
        metric!(on error result => counter [ sponsorship_request_error ] = 1, network = network.as_str());

        result
    }

    async fn sponsor(&self, transaction_kind_bytes: &[u8], sender: &str, network: Network) -> Result<SponsoredTransaction, Error> {
        let sender = validate(transaction_kind_bytes, sender)?;

        match &self.sponsor {
            #[cfg(feature = "testing")]
            Sponsor::Mock(sponsor) => sponsor.sponsor(transaction_kind_bytes, sender, network).await,

            Sponsor::None => Err(Error::Configuration("sponsorship is disabled".to_string())),
            Sponsor::Relay(relay) => relay.sponsor(transaction_kind_bytes, sender, network).await,
        }
    }
}

fn validate(transaction_kind_bytes: &[u8], sender: &str) -> Result<Address, Error> {
    if transaction_kind_bytes.is_empty() {
        return Err(Error::InvalidRequest("transaction is empty".to_string()));
    }

    if sender.trim().is_empty() {
        return Err(Error::InvalidRequest("sender is missing".to_string()));
    }

    let sender = Address::from_hex(sender.trim()).map_err(|_| Error::InvalidRequest(format!("sender {} is not an account address", sender)))?;

    TransactionKind::from_bytes(transaction_kind_bytes).map_err(|_| Error::InvalidRequest("bytes are not a transaction kind".to_string()))?;

    Ok(sender)
}
