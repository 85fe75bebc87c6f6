use std::sync::Arc;

use cellar_execution::mint::MintConfiguration;
use cellar_execution::testing::{custodial_signer, gas_coin, user_signer, TestEnvironment as ExecutionTestEnvironment};
use cellar_ledger::testing::{InMemoryLedger, MockLedger};
use cellar_ledger::transaction::{CreatedObject, Operation, PureValue, TransactionBuilder};
use cellar_ledger::types::{Address, Digest, ObjectId, ObjectRef};

use crate::context::{Context, RPCConfiguration};
use crate::middleware::AdminKey;
use crate::Configuration;

pub fn user_address() -> Address {
    user_signer().address()
}

/// Kind-only bytes of a storefront purchase
pub fn purchase_kind() -> Vec<u8> {
    let mut builder = TransactionBuilder::new();
    builder
        .add_operation(Operation::move_call(Address::from_u8(0xaa), "shop", "purchase").with_argument(PureValue::U64(3)))
        .unwrap();

    builder.build_kind_only().unwrap().to_bytes().unwrap()
}

pub struct TestEnvironment {
    context: Context,

    pub ledger: Arc<InMemoryLedger>,
}

impl TestEnvironment {
    pub const ADMIN_KEY: &'static str = "cellar-admin-key";
    pub const BOTTLE_ID: ObjectId = Address::new([0x52; 32]);

    pub async fn new() -> Self {
        Self::build(Self::ledger(), |_| {}).await
    }

    pub async fn with_ledger(ledger: InMemoryLedger) -> Self {
        Self::build(ledger, |_| {}).await
    }

    pub async fn with_mint(update: impl FnOnce(&mut MintConfiguration)) -> Self {
        Self::build(Self::ledger(), update).await
    }

    async fn build(ledger: InMemoryLedger, update: impl FnOnce(&mut MintConfiguration)) -> Self {
        let execution = ExecutionTestEnvironment::with_mint(ledger, update).await;
        let configuration = execution.configuration.clone();

        let configuration = Configuration {
            rpc: RPCConfiguration { port: 0 },
            admin_key: Some(AdminKey::new(Self::ADMIN_KEY)),

            ledger: configuration.ledger,
            sponsoring: configuration.sponsoring,
            confirmation: configuration.confirmation,
            retry: configuration.retry,
            mint: configuration.mint,
        };

        Self {
            context: Context {
                configuration,
                execution: execution.client,
            },

            ledger: execution.ledger,
        }
    }

    /// Ledger funding the custodial account and reporting a minted bottle
    fn ledger() -> InMemoryLedger {
        InMemoryLedger::new()
            .with_coin(gas_coin(custodial_signer().address(), 0xc1, 10_000_000_000))
            .with_created(CreatedObject {
                reference: ObjectRef {
                    object_id: Self::BOTTLE_ID,
                    version: 1,
                    digest: Digest::default(),
                },
                owner: Some(Address::from_u8(0xa1)),
                object_type: Some("0xe2::bottle::BottleNFT".to_string()),
            })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }
}
