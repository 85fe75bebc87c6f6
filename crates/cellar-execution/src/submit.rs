use std::time::Duration;

use cellar_common::{measure_duration, metric};
use cellar_ledger::signing::SignedTransaction;
use cellar_ledger::transaction::ExecutionResult;
use cellar_ledger::types::Digest;
use cellar_ledger::{Client as LedgerClient, LedgerHandle};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::Error;

fn default_poll_interval() -> u64 {
    500
}

fn default_timeout() -> u64 {
    30_000
}

/// Confirmation wait, in milliseconds
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ConfirmationConfiguration {
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for ConfirmationConfiguration {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            timeout: default_timeout(),
        }
    }
}

/// Broadcasts signed transactions and waits for them to become final
#[derive(Clone)]
pub struct Submitter {
    ledger: LedgerHandle,
    configuration: ConfirmationConfiguration,
}

impl Submitter {
    pub fn new(ledger: LedgerHandle, configuration: ConfirmationConfiguration) -> Self {
        Self { ledger, configuration }
    }

    /// Submit `transaction` and wait for its finality. A transaction that executed but
    /// aborted is returned as a result with a failure status.
    ///
    /// When the broadcast gets no answer the node may still have accepted the transaction,
    /// its digest is then awaited like an accepted one.
    #[instrument(name = "submit", skip_all, fields(digest = %transaction.digest()))]
    pub async fn submit(&self, transaction: SignedTransaction) -> Result<ExecutionResult, Error> {
        let client = self.ledger.acquire().await.map_err(Error::from_connect)?;

        let (result, duration) = measure_duration!(self.submit_and_confirm(&client, transaction).await);

        metric!(histogram[submission_duration_milliseconds] = duration.as_millis(), network = client.network().as_str());
        metric!(on error result => counter [ submission_error ] = 1, network = client.network().as_str());

        result
    }

    async fn submit_and_confirm(&self, client: &LedgerClient, transaction: SignedTransaction) -> Result<ExecutionResult, Error> {
        let digest = transaction.digest();

        match client.execute(&transaction).await {
            Ok(result) if result.is_final() => return Ok(result),
            Ok(_) => (),
            Err(cellar_ledger::Error::Transport(e)) => warn!(%digest, message = %e, "broadcast unanswered, awaiting the transaction"),
            Err(e) => return Err(e.into()),
        }

        let timeout = Duration::from_millis(self.configuration.timeout);
        match tokio::time::timeout(timeout, self.wait_for_finality(client, digest)).await {
            Ok(result) => Ok(result),
            Err(_) => Err(Error::ConfirmationTimeout { digest }),
        }
    }

    /// Polls the node until the transaction is final. Failed polls are retried, the caller
    /// bounds the wait.
    async fn wait_for_finality(&self, client: &LedgerClient, digest: Digest) -> ExecutionResult {
        let interval = Duration::from_millis(self.configuration.poll_interval);

        loop {
            tokio::time::sleep(interval).await;

            match client.fetch_transaction(digest).await {
                Ok(Some(result)) if result.is_final() => return result,
                Ok(_) => debug!(%digest, "transaction not final yet"),
                Err(e) => warn!(%digest, message = %e, "confirmation poll failed"),
            }
        }
    }
}
