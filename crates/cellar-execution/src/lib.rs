use std::sync::Arc;

use cellar_common::{measure_duration, metric};
use cellar_ledger::signing::{InteractiveSigner, ProvidedSignature, Signer, UserSignature};
use cellar_ledger::transaction::ExecutionResult;
use cellar_ledger::{Configuration as LedgerConfiguration, LedgerHandle, Network};
use cellar_sponsoring::{Client as SponsoringClient, Configuration as SponsoringConfiguration, SponsoredTransaction};
use serde::Deserialize;
use tracing::instrument;

mod error;
pub use error::{Disposition, Error};

pub mod extract;
pub mod mint;
pub mod pipeline;
pub mod sink;
pub mod submit;

mod retry;
pub use retry::RetryPolicy;

#[cfg(feature = "testing")]
pub mod testing;

use crate::mint::MintConfiguration;
use crate::pipeline::{Pipeline, PipelineState};
use crate::sink::{OutcomeSink, TracingSink};
use crate::submit::{ConfirmationConfiguration, Submitter};

/// Execution client configuration
#[derive(Clone, Debug, Deserialize)]
pub struct Configuration {
    pub ledger: LedgerConfiguration,

    #[serde(default = "SponsoringConfiguration::none")]
    pub sponsoring: SponsoringConfiguration,

    #[serde(default)]
    pub confirmation: ConfirmationConfiguration,

    /// Applied to relay outages only
    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub mint: MintConfiguration,
}

/// Execution client running the sponsored and custodial flows against the ledger
#[derive(Clone)]
pub struct Client {
    ledger: LedgerHandle,
    sponsoring: SponsoringClient,
    submitter: Submitter,

    confirmation: ConfirmationConfiguration,
    retry: RetryPolicy,
    mint: MintConfiguration,

    sink: Arc<dyn OutcomeSink>,
}

impl Client {
    /// Creates a new client given a configuration. The ledger is only contacted on first use.
    pub fn new(configuration: &Configuration) -> Result<Self, Error> {
        let ledger = LedgerHandle::new(configuration.ledger.clone());

        Ok(Self {
            submitter: Submitter::new(ledger.clone(), configuration.confirmation),
            sponsoring: SponsoringClient::new(&configuration.sponsoring)?,
            ledger,

            confirmation: configuration.confirmation,
            retry: configuration.retry,
            mint: configuration.mint.clone(),

            sink: Arc::new(TracingSink),
        })
    }

    /// Replaces the ledger handle, e.g. with one wrapping a test double
    pub fn with_ledger(mut self, ledger: LedgerHandle) -> Self {
        self.submitter = Submitter::new(ledger.clone(), self.confirmation);
        self.ledger = ledger;
        self
    }

    pub fn with_sink<S: OutcomeSink>(mut self, sink: S) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn ledger(&self) -> &LedgerHandle {
        &self.ledger
    }

    pub fn network(&self) -> Network {
        self.ledger.configuration().network
    }

    pub fn is_sponsoring_enabled(&self) -> bool {
        self.sponsoring.is_enabled()
    }

    pub fn submitter(&self) -> &Submitter {
        &self.submitter
    }

    pub(crate) fn sink(&self) -> &dyn OutcomeSink {
        self.sink.as_ref()
    }

    pub(crate) fn mint_configuration(&self) -> &MintConfiguration {
        &self.mint
    }

    /// Requests a sponsorship for the kind-only `transaction_kind_bytes`. Relay outages are
    /// retried following the retry policy, each attempt with a new request.
    #[instrument(name = "sponsor", skip(self, transaction_kind_bytes))]
    pub async fn sponsor(&self, transaction_kind_bytes: &[u8], sender: &str) -> Result<SponsoredTransaction, Error> {
        let network = self.network();

        self.retry
            .retry(move || async move {
                self.sponsoring
                    .request_sponsorship(transaction_kind_bytes, sender, network)
                    .await
                    .map_err(Error::from)
            })
            .await
    }

    /// Starts a sponsored transaction attempt in `state`, signed by `signer`
    pub fn pipeline(&self, signer: Signer, state: PipelineState) -> Pipeline {
        Pipeline::new(self.clone(), signer, state)
    }

    /// Submits a sponsored transaction the user already signed in their wallet
    #[instrument(name = "execute_sponsored", skip_all, fields(digest = %sponsored.digest))]
    pub async fn execute_sponsored(&self, sponsored: SponsoredTransaction, signature: UserSignature) -> Result<ExecutionResult, Error> {
        let signer = Signer::Interactive(InteractiveSigner::new(ProvidedSignature::new(signature.address(), signature)));

        let (result, duration) = measure_duration!(self.pipeline(signer, PipelineState::Signing(sponsored)).run().await);

        metric!(counter[execution_request] = 1, method = "execute_sponsored");
        metric!(histogram[execution_request_duration_milliseconds] = duration.as_millis(), method = "execute_sponsored");
        if let Err(e) = &result {
            metric!(counter[execution_request_error] = 1, method = "execute_sponsored", error = e.kind());
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use cellar_ledger::testing::{InMemoryLedger, MockLedger};
    use cellar_ledger::transaction::{Operation, PureValue, TransactionBuilder};
    use cellar_ledger::types::Address;
    use cellar_ledger::{Client as LedgerClient, LedgerHandle, Network};
    use cellar_sponsoring::{Configuration as SponsoringConfiguration, RelayConfiguration, RelayCredential};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::testing::{sponsor_signer, user_signer, TestEnvironment};
    use crate::{Client, Error};

    fn purchase_kind() -> Vec<u8> {
        let mut builder = TransactionBuilder::new();
        builder
            .add_operation(Operation::move_call(Address::from_u8(0xaa), "shop", "purchase").with_argument(PureValue::U64(6)))
            .unwrap();

        builder.build_kind_only().unwrap().to_bytes().unwrap()
    }

    async fn relay_client(server: &MockServer) -> (TestEnvironment, Client) {
        let test = TestEnvironment::new(InMemoryLedger::new()).await;

        let mut configuration = TestEnvironment::configuration();
        configuration.sponsoring = SponsoringConfiguration::Relay(RelayConfiguration {
            endpoint: server.uri(),
            api_key: RelayCredential::new("relay-key"),
            timeout: 5,
            headers: HashMap::new(),
            allowed_move_call_targets: vec![],
            allowed_addresses: vec![],
        });

        let client = Client::new(&configuration).unwrap().with_ledger(test.client.ledger().clone());
        (test, client)
    }

    mod sponsor {
        use super::*;

        #[tokio::test]
        async fn declined_sponsorship_is_not_retried() {
            // Given
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/transaction-blocks/sponsor"))
                .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({ "errors": [{ "message": "daily budget exhausted" }] })))
                .mount(&server)
                .await;

            let (_test, client) = relay_client(&server).await;

            // When
            let result = client.sponsor(&purchase_kind(), &user_signer().address().to_hex()).await;

            // Then
            assert_eq!(result, Err(Error::SponsorshipDeclined("daily budget exhausted".to_string())));
            assert_eq!(server.received_requests().await.unwrap().len(), 1);
        }

        #[tokio::test]
        async fn relay_outage_is_retried_up_to_the_policy() {
            let server = MockServer::start().await;
            Mock::given(method("POST")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

            let (_test, client) = relay_client(&server).await;

            let result = client.sponsor(&purchase_kind(), &user_signer().address().to_hex()).await;

            assert!(matches!(result, Err(Error::SponsorshipUnavailable(_))));
            assert_eq!(server.received_requests().await.unwrap().len(), 3);
        }
    }

    mod execute_sponsored {
        use super::*;

        #[tokio::test]
        async fn wallet_signature_is_submitted_with_the_sponsor_signature() {
            // Given
            let test = TestEnvironment::new(InMemoryLedger::new()).await;
            let sponsored = test.client.sponsor(&purchase_kind(), &user_signer().address().to_hex()).await.unwrap();

            let bytes = STANDARD.decode(&sponsored.bytes).unwrap();
            let signature = cellar_ledger::signing::sign(&bytes, &user_signer()).await.unwrap();

            // When
            let result = test.client.execute_sponsored(sponsored.clone(), signature).await.unwrap();

            // Then
            assert_eq!(result.digest, sponsored.digest);
            assert_eq!(test.ledger.submissions()[0].signatures().len(), 2);
            assert_eq!(test.sink.outcomes().len(), 1);
        }

        #[tokio::test]
        async fn signature_of_another_account_is_refused() {
            // Given
            let test = TestEnvironment::new(InMemoryLedger::new()).await;
            let sponsored = test.client.sponsor(&purchase_kind(), &user_signer().address().to_hex()).await.unwrap();
            let signature = sponsor_signer().sign(&STANDARD.decode(&sponsored.bytes).unwrap());

            // When
            let result = test.client.execute_sponsored(sponsored, signature).await;

            // Then
            assert!(matches!(result, Err(Error::InvalidRequest(_))));
            assert!(test.ledger.submissions().is_empty());
        }

        #[tokio::test]
        async fn ledger_of_another_chain_is_a_configuration_error() {
            // Given
            let ledger = Arc::new(InMemoryLedger::new().with_chain_identifier("35834a8a"));
            let configuration = TestEnvironment::configuration();
            let handle = LedgerHandle::from_unverified_client(configuration.ledger.clone(), LedgerClient::from_mock(Network::Testnet, ledger.clone()));
            let client = Client::new(&configuration).unwrap().with_ledger(handle);

            let sponsored = client.sponsor(&purchase_kind(), &user_signer().address().to_hex()).await.unwrap();
            let signature = cellar_ledger::signing::sign(&STANDARD.decode(&sponsored.bytes).unwrap(), &user_signer()).await.unwrap();

            // When
            let result = client.execute_sponsored(sponsored, signature).await;

            // Then
            assert!(matches!(result, Err(Error::Configuration(_))));
            assert!(ledger.submissions().is_empty());
        }
    }
}
