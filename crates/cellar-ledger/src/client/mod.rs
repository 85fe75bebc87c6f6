use std::ops::Deref;
use std::time::Duration;

use cellar_common::service::fallback::{FailurePredicate, WithFallback};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::ClientError;
use jsonrpsee::http_client::HttpClient;
use jsonrpsee::rpc_params;
use tracing::instrument;

pub mod models;

use crate::client::models::{CoinPage, DryRunModel, ResponseOptions, TransactionBlockModel};
use crate::types::{Address, Digest};
use crate::Error;

/// Message of the error returned by nodes for unknown digests
const TRANSACTION_NOT_FOUND: &str = "Could not find the referenced transaction";

macro_rules! call_with_fallback {
    ($self: ident . $method: ident ( $($arg: expr),* )) => {
        $self
            .0
            .call(|x| async move { x.$method( $($arg),* ).await })
            .await
            .map_err(Error::from)
    };
}

struct RpcEndpoint(HttpClient);

impl RpcEndpoint {
    fn new(endpoint: &str, timeout: u64) -> Result<Self, Error> {
        HttpClient::builder()
            .request_timeout(Duration::from_secs(timeout))
            .build(endpoint)
            .map(Self)
            .map_err(|e| Error::Transport(format!("invalid endpoint {}: {}", endpoint, e)))
    }

    async fn chain_identifier(&self) -> Result<String, ClientError> {
        self.request("sui_getChainIdentifier", rpc_params![]).await
    }

    async fn coins(&self, owner: Address, coin_type: String, cursor: Option<String>) -> Result<CoinPage, ClientError> {
        self.request("suix_getCoins", rpc_params![owner, coin_type, cursor]).await
    }

    async fn reference_gas_price(&self) -> Result<String, ClientError> {
        self.request("suix_getReferenceGasPrice", rpc_params![]).await
    }

    async fn dry_run(&self, transaction_bytes: String) -> Result<DryRunModel, ClientError> {
        self.request("sui_dryRunTransactionBlock", rpc_params![transaction_bytes]).await
    }

    async fn execute(&self, transaction_bytes: String, signatures: Vec<String>) -> Result<TransactionBlockModel, ClientError> {
        self.request(
            "sui_executeTransactionBlock",
            rpc_params![transaction_bytes, signatures, ResponseOptions::full(), "WaitForEffectsCert"],
        )
        .await
    }

    async fn transaction(&self, digest: Digest) -> Result<TransactionBlockModel, ClientError> {
        self.request("sui_getTransactionBlock", rpc_params![digest, ResponseOptions::full()]).await
    }
}

impl Deref for RpcEndpoint {
    type Target = HttpClient;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FailurePredicate<ClientError> for RpcEndpoint {
    fn is_err(&self, err: &ClientError) -> bool {
        matches!(err, ClientError::Transport(_) | ClientError::RequestTimeout | ClientError::RestartNeeded(_))
    }
}

/// JSON-RPC client over an ordered list of full nodes
#[derive(Clone)]
pub struct RpcClient(WithFallback<RpcEndpoint>);

impl RpcClient {
    pub fn new(endpoint: &str, timeout: u64) -> Result<Self, Error> {
        Ok(Self(WithFallback::new().with(RpcEndpoint::new(endpoint, timeout)?)))
    }

    pub fn with_fallback(mut self, endpoint: &str, timeout: u64) -> Result<Self, Error> {
        self.0 = self.0.with(RpcEndpoint::new(endpoint, timeout)?);
        Ok(self)
    }

    #[instrument(name = "sui_getChainIdentifier", skip(self))]
    pub async fn chain_identifier(&self) -> Result<String, Error> {
        call_with_fallback!(self.chain_identifier())
    }

    #[instrument(name = "suix_getCoins", skip(self))]
    pub async fn coins(&self, owner: Address, coin_type: &str, cursor: Option<String>) -> Result<CoinPage, Error> {
        let coin_type = coin_type.to_string();
        call_with_fallback!(self.coins(owner, coin_type, cursor))
    }

    #[instrument(name = "suix_getReferenceGasPrice", skip(self))]
    pub async fn reference_gas_price(&self) -> Result<u64, Error> {
        let price = call_with_fallback!(self.reference_gas_price())?;

        price
            .parse()
            .map_err(|_| Error::Ledger(format!("invalid reference gas price {}", price)))
    }

    #[instrument(name = "sui_dryRunTransactionBlock", skip_all)]
    pub async fn dry_run(&self, transaction_bytes: String) -> Result<DryRunModel, Error> {
        call_with_fallback!(self.dry_run(transaction_bytes))
    }

    #[instrument(name = "sui_executeTransactionBlock", skip_all)]
    pub async fn execute(&self, transaction_bytes: String, signatures: Vec<String>) -> Result<TransactionBlockModel, Error> {
        call_with_fallback!(self.execute(transaction_bytes, signatures))
    }

    /// Returns `None` when the node does not know the transaction yet
    #[instrument(name = "sui_getTransactionBlock", skip(self))]
    pub async fn transaction(&self, digest: Digest) -> Result<Option<TransactionBlockModel>, Error> {
        match call_with_fallback!(self.transaction(digest)) {
            Ok(transaction) => Ok(Some(transaction)),
            Err(Error::Ledger(message)) if message.contains(TRANSACTION_NOT_FOUND) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
