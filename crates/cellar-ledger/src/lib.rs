use cellar_common::service::fallback;
use cellar_common::{measure_duration, metric};
use jsonrpsee::core::ClientError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

pub mod crypto;
pub mod signing;
pub mod transaction;
pub mod types;

mod handle;
pub use handle::LedgerHandle;
pub use tracing;

mod network;
pub use network::Network;

#[cfg(feature = "testing")]
pub mod testing;

mod client;
use crate::client::models::CoinPage;
use crate::client::RpcClient;
use crate::signing::SignedTransaction;
use crate::transaction::{ExecutionResult, TransactionData};
use crate::types::{Address, Coin, Digest, ObjectId};

#[macro_export]
macro_rules! log_if_error {
    ($e: expr) => {
        match $e {
            Ok(v) => Ok(v),
            Err(error @ ($crate::Error::Ledger(_) | $crate::Error::InvalidRequest(_))) => {
                $crate::tracing::warn!(message=%error);
                Err(error)
            },
            Err(error) => {
                $crate::tracing::error!(message=%error);
                Err(error)
            },
        }
    };
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid address {0}")]
    InvalidAddress(String),

    #[error("invalid digest {0}")]
    InvalidDigest(String),

    #[error("invalid type {0}")]
    InvalidTypeTag(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("insufficient balance of {coin} ({coin_type}): {required} required, {available} available")]
    InsufficientBalance {
        coin: ObjectId,
        coin_type: String,
        required: u64,
        available: u64,
    },

    #[error("gas estimation failed: {0}")]
    GasEstimation(String),

    #[error("encoding error {0}")]
    Encoding(String),

    #[error("signing rejected: {0}")]
    SigningRejected(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The node answered with an error
    #[error("ledger error {0}")]
    Ledger(String),

    /// The node could not be reached
    #[error("transport error {0}")]
    Transport(String),

    #[error("endpoint serves chain {found}, expected {expected}")]
    ChainMismatch { expected: String, found: String },

    #[error("internal error {0}")]
    Internal(String),
}

impl From<ClientError> for Error {
    fn from(value: ClientError) -> Self {
        match value {
            ClientError::Call(error) => Self::Ledger(error.message().to_string()),
            ClientError::RequestTimeout => Self::Transport("request timeout".to_string()),
            ClientError::ParseError(e) => Self::Ledger(format!("unexpected response: {}", e)),
            e => Self::Transport(e.to_string()),
        }
    }
}

impl From<fallback::Error<ClientError>> for Error {
    fn from(value: fallback::Error<ClientError>) -> Self {
        match value {
            fallback::Error::Rejected => Self::Transport("no ledger endpoint available".to_string()),
            fallback::Error::Inner(e) => e.into(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Configuration {
    pub network: Network,

    /// Full node endpoint, the network's public node when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub fallbacks: Vec<String>,
}

impl Configuration {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            endpoint: None,
            timeout: default_timeout(),
            fallbacks: vec![],
        }
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(self.network.default_endpoint())
    }
}

#[derive(Clone)]
enum Provider {
    #[cfg(feature = "testing")]
    Mock(std::sync::Arc<dyn testing::MockLedger>),

    Rpc(RpcClient),
}

/// Client of the ledger's full nodes
#[derive(Clone)]
pub struct Client {
    network: Network,

    provider: Provider,
}

impl Client {
    /// Build a client over the configured endpoint and its fallbacks. No request is sent.
    pub fn new(configuration: &Configuration) -> Result<Self, Error> {
        let mut client = RpcClient::new(configuration.endpoint(), configuration.timeout)?;
        for fallback in &configuration.fallbacks {
            client = client.with_fallback(fallback, configuration.timeout)?;
        }

        Ok(Self {
            network: configuration.network,
            provider: Provider::Rpc(client),
        })
    }

    #[cfg(feature = "testing")]
    pub fn from_mock(network: Network, ledger: std::sync::Arc<dyn testing::MockLedger>) -> Self {
        Self {
            network,
            provider: Provider::Mock(ledger),
        }
    }

    /// Returns the network this client is bound to
    pub fn network(&self) -> Network {
        self.network
    }

    #[instrument(name = "chain_identifier", skip(self))]
    pub async fn chain_identifier(&self) -> Result<String, Error> {
        let (result, duration) = measure_duration!(log_if_error!(match &self.provider {
            #[cfg(feature = "testing")]
            Provider::Mock(ledger) => ledger.chain_identifier().await,

            Provider::Rpc(client) => client.chain_identifier().await,
        }));

        metric!(histogram[ledger_rpc] = duration.as_millis(), method = "chain_identifier");
        metric!(on error result => counter [ ledger_rpc_error ] = 1, method = "chain_identifier");

        result
    }

    /// Fetch every coin of `coin_type` owned by `owner`
    #[instrument(name = "fetch_coins", skip(self))]
    pub async fn fetch_coins(&self, owner: Address, coin_type: &str) -> Result<Vec<Coin>, Error> {
        let (result, duration) = measure_duration!(log_if_error!(match &self.provider {
            #[cfg(feature = "testing")]
            Provider::Mock(ledger) => ledger.fetch_coins(owner, coin_type).await,

            Provider::Rpc(client) => Self::fetch_all_coins(client, owner, coin_type).await,
        }));

        metric!(histogram[ledger_rpc] = duration.as_millis(), method = "fetch_coins");
        metric!(on error result => counter [ ledger_rpc_error ] = 1, method = "fetch_coins");

        result
    }

    async fn fetch_all_coins(client: &RpcClient, owner: Address, coin_type: &str) -> Result<Vec<Coin>, Error> {
        let mut coins = vec![];
        let mut cursor = None;

        loop {
            let CoinPage { data, next_cursor, has_next_page } = client.coins(owner, coin_type, cursor).await?;
            coins.extend(data.into_iter().map(|x| x.into_coin(owner)));

            match next_cursor {
                Some(next) if has_next_page => cursor = Some(next),
                _ => return Ok(coins),
            }
        }
    }

    /// Fetch the gas price of the current epoch, in MIST per gas unit
    #[instrument(name = "fetch_reference_gas_price", skip(self))]
    pub async fn fetch_reference_gas_price(&self) -> Result<u64, Error> {
        let (result, duration) = measure_duration!(log_if_error!(match &self.provider {
            #[cfg(feature = "testing")]
            Provider::Mock(ledger) => ledger.fetch_reference_gas_price().await,

            Provider::Rpc(client) => client.reference_gas_price().await,
        }));

        metric!(histogram[ledger_rpc] = duration.as_millis(), method = "fetch_reference_gas_price");
        metric!(on error result => counter [ ledger_rpc_error ] = 1, method = "fetch_reference_gas_price");

        result
    }

    /// Execute `transaction` without committing it
    #[instrument(name = "dry_run", skip_all)]
    pub async fn dry_run(&self, transaction: &TransactionData) -> Result<ExecutionResult, Error> {
        let (result, duration) = measure_duration!(log_if_error!(match &self.provider {
            #[cfg(feature = "testing")]
            Provider::Mock(ledger) => ledger.dry_run(transaction).await,

            Provider::Rpc(client) => match transaction.to_base64() {
                Ok(bytes) => client.dry_run(bytes).await.map(ExecutionResult::from),
                Err(e) => Err(e),
            },
        }));

        metric!(histogram[ledger_rpc] = duration.as_millis(), method = "dry_run");
        metric!(on error result => counter [ ledger_rpc_error ] = 1, method = "dry_run");

        result
    }

    /// Broadcast a signed transaction. The returned result is usually not final yet.
    #[instrument(name = "execute", skip_all, fields(digest = %transaction.digest()))]
    pub async fn execute(&self, transaction: &SignedTransaction) -> Result<ExecutionResult, Error> {
        let (result, duration) = measure_duration!(log_if_error!(match &self.provider {
            #[cfg(feature = "testing")]
            Provider::Mock(ledger) => ledger.execute(transaction).await,

            Provider::Rpc(client) => client
                .execute(transaction.transaction_bytes().to_string(), transaction.signatures().to_vec())
                .await
                .and_then(|x| x.into_result().ok_or_else(|| Error::Ledger("node returned no effects".to_string()))),
        }));

        metric!(counter[ledger_transaction_submitted] = 1, network = self.network.as_str());
        metric!(histogram[ledger_rpc] = duration.as_millis(), method = "execute");
        metric!(on error result => counter [ ledger_rpc_error ] = 1, method = "execute");

        result
    }

    /// Returns the transaction with `digest`, or `None` when the node does not know it
    #[instrument(name = "fetch_transaction", skip(self))]
    pub async fn fetch_transaction(&self, digest: Digest) -> Result<Option<ExecutionResult>, Error> {
        let (result, duration) = measure_duration!(log_if_error!(match &self.provider {
            #[cfg(feature = "testing")]
            Provider::Mock(ledger) => ledger.fetch_transaction(digest).await,

            Provider::Rpc(client) => client.transaction(digest).await.map(|x| x.and_then(|x| x.into_result())),
        }));

        metric!(histogram[ledger_rpc] = duration.as_millis(), method = "fetch_transaction");
        metric!(on error result => counter [ ledger_rpc_error ] = 1, method = "fetch_transaction");

        result
    }
}
