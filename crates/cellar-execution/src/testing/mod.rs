use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cellar_ledger::signing::{CustodialKey, CustodialSigner, SignatureRequest, SignedTransaction, Signer, Wallet, WalletResponse};
use cellar_ledger::testing::InMemoryLedger;
use cellar_ledger::transaction::wire::GasData;
use cellar_ledger::transaction::{Operation, PureValue, TransactionBuilder, TransactionData, TransactionKind};
use cellar_ledger::types::{Address, Coin, Digest, ObjectRef, GAS_COIN_TYPE};
use cellar_ledger::{Client as LedgerClient, Configuration as LedgerConfiguration, LedgerHandle, Network};
use cellar_sponsoring::mock::MockSponsor;
use cellar_sponsoring::{Configuration as SponsoringConfiguration, Error as SponsoringError, SponsoredTransaction};

use crate::mint::{MintConfiguration, SharedObject};
use crate::sink::{ExecutionOutcome, OutcomeSink};
use crate::submit::ConfirmationConfiguration;
use crate::{Client, Configuration, RetryPolicy};

const USER_KEY: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
const CUSTODIAL_KEY: &str = "0x2222222222222222222222222222222222222222222222222222222222222222";
const SPONSOR_KEY: &str = "0x3333333333333333333333333333333333333333333333333333333333333333";

fn custodial(key: &str) -> CustodialSigner {
    CustodialSigner::from_key(&CustodialKey::new(key)).expect("test key is valid")
}

/// Storefront customer. Signs without asking.
pub fn user_signer() -> Signer {
    Signer::Custodial(Arc::new(custodial(USER_KEY)))
}

/// Account the service mints with
pub fn custodial_signer() -> CustodialSigner {
    custodial(CUSTODIAL_KEY)
}

/// Gas owner of the transactions sponsored by [`TestSponsor`]
pub fn sponsor_signer() -> CustodialSigner {
    custodial(SPONSOR_KEY)
}

pub fn gas_coin(owner: Address, id: u8, balance: u64) -> Coin {
    Coin {
        reference: ObjectRef {
            object_id: Address::from_u8(id),
            version: 1,
            digest: Digest::new([id; 32]),
        },
        owner,
        coin_type: GAS_COIN_TYPE.to_string(),
        balance,
    }
}

/// A purchase paid by the user, signed by the user
pub fn signed_transaction() -> SignedTransaction {
    let signer = custodial(USER_KEY);

    let mut builder = TransactionBuilder::new();
    builder
        .add_operation(Operation::move_call(Address::from_u8(0xaa), "shop", "purchase").with_argument(PureValue::U64(1)))
        .expect("operation is valid");

    let transaction = TransactionData::new(
        builder.build_kind_only().expect("kind builds"),
        signer.address(),
        GasData {
            payment: vec![gas_coin(signer.address(), 0xc0, 1_000_000_000).reference],
            owner: signer.address(),
            price: 1_000,
            budget: 5_000_000,
        },
    );

    let bytes = transaction.to_bytes().expect("transaction encodes");
    SignedTransaction::new(&transaction, vec![signer.sign(&bytes).to_base64()]).expect("transaction is signed")
}

/// Relay paying with a single coin of its own and countersigning every transaction
#[derive(Debug)]
pub struct TestSponsor {
    signer: CustodialSigner,
}

impl TestSponsor {
    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

#[async_trait]
impl MockSponsor for TestSponsor {
    fn new() -> Self
    where
        Self: Sized,
    {
        Self { signer: sponsor_signer() }
    }

    async fn sponsor(&self, transaction_kind_bytes: &[u8], sender: Address, _network: Network) -> Result<SponsoredTransaction, SponsoringError> {
        let invalid = |e: cellar_ledger::Error| SponsoringError::InvalidRequest(e.to_string());

        let kind = TransactionKind::from_bytes(transaction_kind_bytes).map_err(invalid)?;
        let transaction = TransactionData::new(
            kind,
            sender,
            GasData {
                payment: vec![gas_coin(self.address(), 0x5c, 10_000_000_000).reference],
                owner: self.address(),
                price: 1_000,
                budget: 5_000_000,
            },
        );

        let bytes = transaction.to_bytes().map_err(invalid)?;
        Ok(SponsoredTransaction {
            bytes: transaction.to_base64().map_err(invalid)?,
            digest: transaction.digest().map_err(invalid)?,
            sponsor_signature: Some(self.signer.sign(&bytes).to_base64()),
        })
    }
}

/// Wallet whose user refuses every request
pub struct DecliningWallet(pub Address);

#[async_trait]
impl Wallet for DecliningWallet {
    fn address(&self) -> Address {
        self.0
    }

    async fn request_signature(&self, _request: SignatureRequest) -> Result<WalletResponse, cellar_ledger::Error> {
        Ok(WalletResponse::Declined("user closed the wallet".to_string()))
    }
}

/// Sink keeping every outcome, clones share the same records
#[derive(Debug, Default, Clone)]
pub struct RecordingSink(Arc<Mutex<Vec<ExecutionOutcome>>>);

impl RecordingSink {
    pub fn outcomes(&self) -> Vec<ExecutionOutcome> {
        self.0.lock().expect("sink lock").clone()
    }
}

#[async_trait]
impl OutcomeSink for RecordingSink {
    async fn record(&self, outcome: ExecutionOutcome) {
        self.0.lock().expect("sink lock").push(outcome);
    }
}

pub struct TestEnvironment {
    pub configuration: Configuration,

    pub ledger: Arc<InMemoryLedger>,
    pub client: Client,
    pub sink: RecordingSink,
}

impl TestEnvironment {
    pub async fn new(ledger: InMemoryLedger) -> Self {
        Self::with_mint(ledger, |_| {}).await
    }

    /// Environment whose mint configuration is adjusted by `update`
    pub async fn with_mint(ledger: InMemoryLedger, update: impl FnOnce(&mut MintConfiguration)) -> Self {
        let mut configuration = Self::configuration();
        update(&mut configuration.mint);

        let ledger = Arc::new(ledger);
        let handle = LedgerHandle::from_client(configuration.ledger.clone(), LedgerClient::from_mock(Network::Testnet, ledger.clone())).await;

        let sink = RecordingSink::default();
        let client = Client::new(&configuration)
            .expect("configuration is valid")
            .with_ledger(handle)
            .with_sink(sink.clone());

        Self {
            configuration,
            ledger,
            client,
            sink,
        }
    }

    pub fn configuration() -> Configuration {
        Configuration {
            ledger: LedgerConfiguration::new(Network::Testnet),
            sponsoring: SponsoringConfiguration::mock(TestSponsor::new()),
            confirmation: ConfirmationConfiguration { poll_interval: 5, timeout: 200 },
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: 1,
                max_backoff: 2,
            },
            mint: MintConfiguration {
                custodial_key: Some(CustodialKey::new(CUSTODIAL_KEY)),
                reward_package: Some(Address::from_u8(0xe1)),
                reward_treasury: Some(SharedObject {
                    id: Address::from_u8(0xf1),
                    initial_shared_version: 3,
                }),
                bottle_package: Some(Address::from_u8(0xe2)),
                bottle_minter: Some(SharedObject {
                    id: Address::from_u8(0xf2),
                    initial_shared_version: 4,
                }),
                gas_budget: None,
            },
        }
    }
}
