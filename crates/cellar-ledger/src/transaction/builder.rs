use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, instrument};

use crate::transaction::gas::select_gas_coins;
use crate::transaction::wire::{Argument, CallArg, Command, GasData, ObjectArg, ProgrammableMoveCall, ProgrammableTransaction};
use crate::transaction::{
    ExecutionStatus, GasEstimate, ObjectArgument, Operation, OperationArgument, TransactionData, TransactionKind, MAX_GAS_BUDGET,
};
use crate::types::{Address, Coin, ObjectId, ObjectRef, GAS_COIN_TYPE};
use crate::{Client, Error};

/// Sender and gas parameters of a complete transaction. Values left unset are resolved
/// against the ledger when building.
#[derive(Debug, Clone)]
pub struct SenderContext {
    pub sender: Address,

    /// Pays for the gas, defaults to the sender
    pub gas_owner: Option<Address>,

    pub gas_budget: Option<u64>,
    pub gas_price: Option<u64>,
}

impl SenderContext {
    pub fn new(sender: Address) -> Self {
        Self {
            sender,
            gas_owner: None,
            gas_budget: None,
            gas_price: None,
        }
    }

    pub fn with_gas_owner(mut self, gas_owner: Address) -> Self {
        self.gas_owner = Some(gas_owner);
        self
    }

    pub fn with_gas_budget(mut self, gas_budget: u64) -> Self {
        self.gas_budget = Some(gas_budget);
        self
    }

    pub fn with_gas_price(mut self, gas_price: u64) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn gas_owner(&self) -> Address {
        self.gas_owner.unwrap_or(self.sender)
    }
}

/// Accumulates operations into a single transaction.
///
/// Operations keep their insertion order. Once a build succeeded, the builder is sealed and
/// no longer accepts operations, although it can be built again with the same result.
#[derive(Debug, Default)]
pub struct TransactionBuilder {
    operations: Vec<Operation>,
    coins: HashMap<ObjectId, Coin>,

    sealed: bool,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn add_operation(&mut self, operation: Operation) -> Result<&mut Self, Error> {
        if self.sealed {
            return Err(Error::InvalidRequest("transaction is already built".to_string()));
        }

        self.operations.push(operation);
        Ok(self)
    }

    /// Declare a coin whose balance is known, allowing spends of this coin to be checked
    /// without querying the ledger
    pub fn register_coin(&mut self, coin: Coin) -> &mut Self {
        self.coins.insert(coin.id(), coin);
        self
    }

    /// Build the transaction without sender nor gas information. Never performs network I/O.
    #[instrument(name = "build_kind_only", skip(self), fields(operations = self.operations.len()))]
    pub fn build_kind_only(&mut self) -> Result<TransactionKind, Error> {
        let kind = self.kind()?;
        self.sealed = true;

        Ok(kind)
    }

    /// Build a transaction ready to be signed. Gas price, gas coins and gas budget are resolved
    /// against the ledger unless given by `context`. The builder is only sealed once all of
    /// them are resolved.
    #[instrument(name = "build_complete", skip(self, client), fields(sender = %context.sender))]
    pub async fn build_complete(&mut self, context: &SenderContext, client: &Client) -> Result<TransactionData, Error> {
        let kind = self.kind()?;
        let gas_owner = context.gas_owner();

        let gas_price = match context.gas_price {
            Some(price) => price,
            None => client.fetch_reference_gas_price().await?,
        };

        // Coins given as arguments cannot also pay for gas
        let excluded: HashSet<ObjectId> = kind.programmable().input_objects().collect();
        let coins: Vec<Coin> = client
            .fetch_coins(gas_owner, GAS_COIN_TYPE)
            .await?
            .into_iter()
            .filter(|x| !excluded.contains(&x.id()))
            .collect();

        if coins.is_empty() {
            return Err(Error::GasEstimation(format!("no gas coin owned by {}", gas_owner)));
        }

        let budget = match context.gas_budget {
            Some(budget) => budget,
            None => Self::estimate_budget(&kind, context.sender, gas_owner, gas_price, &coins, client).await?,
        };

        if budget > MAX_GAS_BUDGET {
            return Err(Error::GasEstimation(format!("budget {} exceeds maximum of {}", budget, MAX_GAS_BUDGET)));
        }

        let payment: Vec<ObjectRef> = select_gas_coins(coins, budget)
            .ok_or_else(|| Error::GasEstimation(format!("gas coins of {} cannot cover a budget of {}", gas_owner, budget)))?
            .iter()
            .map(|x| x.reference)
            .collect();

        debug!(budget, gas_price, coins = payment.len(), "gas resolved");
        self.sealed = true;

        Ok(TransactionData::new(
            kind,
            context.sender,
            GasData {
                payment,
                owner: gas_owner,
                price: gas_price,
                budget,
            },
        ))
    }

    fn kind(&self) -> Result<TransactionKind, Error> {
        self.check_balances()?;

        Ok(TransactionKind::ProgrammableTransaction(self.resolve()?))
    }

    async fn estimate_budget(
        kind: &TransactionKind,
        sender: Address,
        gas_owner: Address,
        gas_price: u64,
        coins: &[Coin],
        client: &Client,
    ) -> Result<u64, Error> {
        let available = coins.iter().fold(0u64, |total, x| total.saturating_add(x.balance));
        let transaction = TransactionData::new(
            kind.clone(),
            sender,
            GasData {
                payment: coins.iter().map(|x| x.reference).collect(),
                owner: gas_owner,
                price: gas_price,
                budget: available.min(MAX_GAS_BUDGET),
            },
        );

        let result = client
            .dry_run(&transaction)
            .await
            .map_err(|e| Error::GasEstimation(format!("dry run failed: {}", e)))?;

        match result.status {
            ExecutionStatus::Success => Ok(GasEstimate::from(&result.gas_used).budget(gas_price)),
            ExecutionStatus::Failure { error } => Err(Error::GasEstimation(format!("dry run aborted: {}", error))),
        }
    }

    /// Spends declared against a registered coin must not exceed its balance. Spends of coins
    /// that were not registered are left to the ledger.
    fn check_balances(&self) -> Result<(), Error> {
        let mut spent: BTreeMap<ObjectId, u64> = BTreeMap::new();
        for spend in self.operations.iter().flat_map(|x| x.coin_spends.iter()) {
            let total = spent.entry(spend.coin).or_default();
            *total = total.saturating_add(spend.amount);
        }

        for (id, required) in spent {
            let Some(coin) = self.coins.get(&id) else { continue };

            if required > coin.balance {
                return Err(Error::InsufficientBalance {
                    coin: id,
                    coin_type: coin.coin_type.clone(),
                    required,
                    available: coin.balance,
                });
            }
        }

        Ok(())
    }

    fn resolve(&self) -> Result<ProgrammableTransaction, Error> {
        if self.operations.is_empty() {
            return Err(Error::InvalidRequest("transaction has no operation".to_string()));
        }

        let mut inputs: Vec<CallArg> = vec![];
        let mut objects: HashMap<ObjectId, u16> = HashMap::new();
        let mut commands = Vec::with_capacity(self.operations.len());

        for (index, operation) in self.operations.iter().enumerate() {
            let mut arguments = Vec::with_capacity(operation.arguments.len());

            for argument in &operation.arguments {
                let argument = match argument {
                    OperationArgument::Pure(value) => {
                        inputs.push(CallArg::Pure(value.to_bytes()?));
                        Argument::Input(input_index(inputs.len() - 1)?)
                    },
                    OperationArgument::Object(object) => match objects.get(&object.id()) {
                        Some(&position) => {
                            // Same shared object used mutably and immutably
                            if let (CallArg::Object(ObjectArg::SharedObject { mutable, .. }), ObjectArgument::Shared { mutable: requested, .. }) =
                                (&mut inputs[position as usize], object)
                            {
                                *mutable |= *requested;
                            }

                            Argument::Input(position)
                        },
                        None => {
                            inputs.push(CallArg::Object(object_arg(object)));

                            let position = input_index(inputs.len() - 1)?;
                            objects.insert(object.id(), position);
                            Argument::Input(position)
                        },
                    },
                    OperationArgument::Result(n) if (*n as usize) < index => Argument::Result(*n),
                    OperationArgument::NestedResult(n, m) if (*n as usize) < index => Argument::NestedResult(*n, *m),
                    OperationArgument::Result(n) | OperationArgument::NestedResult(n, _) => {
                        return Err(Error::InvalidRequest(format!(
                            "operation {} ({}) uses the result of operation {} which does not precede it",
                            index,
                            operation.target(),
                            n
                        )))
                    },
                };

                arguments.push(argument);
            }

            commands.push(Command::MoveCall(Box::new(ProgrammableMoveCall {
                package: operation.package,
                module: operation.module.clone(),
                function: operation.function.clone(),
                type_arguments: operation.type_arguments.clone(),
                arguments,
            })));
        }

        Ok(ProgrammableTransaction { inputs, commands })
    }
}

fn input_index(position: usize) -> Result<u16, Error> {
    u16::try_from(position).map_err(|_| Error::InvalidRequest("too many transaction inputs".to_string()))
}

fn object_arg(object: &ObjectArgument) -> ObjectArg {
    match object {
        ObjectArgument::Owned(reference) => ObjectArg::ImmOrOwnedObject(*reference),
        ObjectArgument::Shared {
            id,
            initial_shared_version,
            mutable,
        } => ObjectArg::SharedObject {
            id: *id,
            initial_shared_version: *initial_shared_version,
            mutable: *mutable,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::testing::{InMemoryLedger, MockLedger};
    use crate::transaction::wire::{Argument, CallArg, Command, ObjectArg};
    use crate::transaction::{GasUsed, ObjectArgument, Operation, OperationArgument, PureValue, SenderContext, TransactionBuilder};
    use crate::types::{Address, Coin, Digest, ObjectRef};
    use crate::{Client, Error, Network};

    const PACKAGE: Address = Address::from_u8(0xaa);
    const SENDER: Address = Address::from_u8(0x11);

    fn a_coin(id: u8, owner: Address, coin_type: &str, balance: u64) -> Coin {
        Coin {
            reference: ObjectRef {
                object_id: Address::from_u8(id),
                version: 3,
                digest: Digest::new([id; 32]),
            },
            owner,
            coin_type: coin_type.to_string(),
            balance,
        }
    }

    fn treasury() -> ObjectArgument {
        ObjectArgument::Shared {
            id: Address::from_u8(0x70),
            initial_shared_version: 1,
            mutable: true,
        }
    }

    fn reward_mint(amount: u64) -> Operation {
        Operation::move_call(PACKAGE, "reward", "mint")
            .with_argument(treasury())
            .with_argument(PureValue::U64(amount))
            .with_argument(PureValue::Address(SENDER))
    }

    fn client_on(ledger: InMemoryLedger) -> (Arc<InMemoryLedger>, Client) {
        let ledger = Arc::new(ledger);
        (ledger.clone(), Client::from_mock(Network::Testnet, ledger))
    }

    mod add_operation {
        use super::*;

        #[test]
        fn sealed_builder_rejects_operations() {
            // Given
            let mut builder = TransactionBuilder::new();
            builder.add_operation(reward_mint(50)).unwrap();
            builder.build_kind_only().unwrap();

            // When
            let result = builder.add_operation(reward_mint(10));

            // Then
            assert!(matches!(result, Err(Error::InvalidRequest(_))));
            assert_eq!(builder.operations().len(), 1);
        }

        #[test]
        fn failed_build_does_not_seal() {
            let mut builder = TransactionBuilder::new();
            assert!(builder.build_kind_only().is_err());

            assert!(!builder.is_sealed());
            assert!(builder.add_operation(reward_mint(50)).is_ok());
        }
    }

    mod build_kind_only {
        use super::*;

        #[test]
        fn operations_keep_their_order() {
            // Given
            let mut builder = TransactionBuilder::new();
            builder.add_operation(reward_mint(50)).unwrap();
            builder
                .add_operation(Operation::move_call(PACKAGE, "bottle", "mint").with_argument(PureValue::U64(1)))
                .unwrap();

            // When
            let kind = builder.build_kind_only().unwrap();

            // Then
            let calls: Vec<_> = kind.programmable().move_calls().map(|x| x.module.as_str()).collect();
            assert_eq!(calls, vec!["reward", "bottle"]);
        }

        #[test]
        fn repeated_objects_share_one_input() {
            // Given
            let mut builder = TransactionBuilder::new();
            builder.add_operation(reward_mint(50)).unwrap();
            builder.add_operation(reward_mint(25)).unwrap();

            // When
            let kind = builder.build_kind_only().unwrap();

            // Then
            let transaction = kind.programmable();
            assert_eq!(transaction.input_objects().count(), 1);
            assert_eq!(transaction.inputs.len(), 5);

            let Command::MoveCall(second) = &transaction.commands[1] else { panic!("expected move call") };
            assert_eq!(second.arguments[0], Argument::Input(0));
        }

        #[test]
        fn shared_object_becomes_mutable_when_any_use_is() {
            let read_only = ObjectArgument::Shared {
                id: Address::from_u8(0x70),
                initial_shared_version: 1,
                mutable: false,
            };

            let mut builder = TransactionBuilder::new();
            builder.add_operation(Operation::move_call(PACKAGE, "reward", "supply").with_argument(read_only)).unwrap();
            builder.add_operation(reward_mint(5)).unwrap();

            let kind = builder.build_kind_only().unwrap();

            assert!(matches!(kind.programmable().inputs[0], CallArg::Object(ObjectArg::SharedObject { mutable: true, .. })));
        }

        #[test]
        fn results_must_refer_to_earlier_operations() {
            // Given
            let mut builder = TransactionBuilder::new();
            builder
                .add_operation(Operation::move_call(PACKAGE, "bottle", "mint").with_argument(OperationArgument::Result(0)))
                .unwrap();

            // When
            let result = builder.build_kind_only();

            // Then
            assert!(matches!(result, Err(Error::InvalidRequest(_))));
        }

        #[test]
        fn results_of_earlier_operations_are_forwarded() {
            let mut builder = TransactionBuilder::new();
            builder.add_operation(reward_mint(1)).unwrap();
            builder
                .add_operation(Operation::move_call(PACKAGE, "bottle", "attach").with_argument(OperationArgument::NestedResult(0, 1)))
                .unwrap();

            let kind = builder.build_kind_only().unwrap();

            let Command::MoveCall(second) = &kind.programmable().commands[1] else { panic!("expected move call") };
            assert_eq!(second.arguments, vec![Argument::NestedResult(0, 1)]);
        }

        #[test]
        fn overspending_a_registered_coin_fails() {
            // Given
            let wine = a_coin(0x40, SENDER, "0xaa::wine::WINE", 100);
            let mut builder = TransactionBuilder::new();
            builder.register_coin(wine.clone());
            builder.add_operation(reward_mint(1).spending(wine.id(), 60)).unwrap();
            builder.add_operation(reward_mint(1).spending(wine.id(), 60)).unwrap();

            // When
            let result = builder.build_kind_only();

            // Then
            match result {
                Err(Error::InsufficientBalance { required, available, coin, .. }) => {
                    assert_eq!(required, 120);
                    assert_eq!(available, 100);
                    assert_eq!(coin, wine.id());
                },
                other => panic!("unexpected result {:?}", other),
            }
        }

        #[test]
        fn spends_of_unregistered_coins_are_not_checked() {
            let mut builder = TransactionBuilder::new();
            builder.add_operation(reward_mint(1).spending(Address::from_u8(0x41), u64::MAX)).unwrap();

            assert!(builder.build_kind_only().is_ok());
        }

        #[test]
        fn building_twice_gives_the_same_transaction() {
            let mut builder = TransactionBuilder::new();
            builder.add_operation(reward_mint(50)).unwrap();

            let first = builder.build_kind_only().unwrap();
            let second = builder.build_kind_only().unwrap();

            assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());
        }
    }

    mod build_complete {
        use super::*;

        #[tokio::test]
        async fn resolves_the_same_operations_as_kind_only() {
            // Given
            let (_, client) = client_on(
                InMemoryLedger::new()
                    .with_coin(a_coin(0x50, SENDER, "0x2::sui::SUI", 10_000_000_000))
                    .with_gas_price(750),
            );

            let mut builder = TransactionBuilder::new();
            builder.add_operation(reward_mint(50)).unwrap();

            // When
            let kind = builder.build_kind_only().unwrap();
            let data = builder.build_complete(&SenderContext::new(SENDER), &client).await.unwrap();

            // Then
            assert_eq!(data.kind(), &kind);
            assert_eq!(data.sender(), SENDER);
            assert_eq!(data.gas_data().price, 750);
            assert_eq!(data.gas_data().payment[0].object_id, Address::from_u8(0x50));
        }

        #[tokio::test]
        async fn budget_comes_from_the_dry_run() {
            // Given
            let (ledger, client) = client_on(
                InMemoryLedger::new()
                    .with_coin(a_coin(0x50, SENDER, "0x2::sui::SUI", 10_000_000_000))
                    .with_gas_price(1_000)
                    .with_dry_run_gas(GasUsed {
                        computation_cost: 1_000_000,
                        storage_cost: 3_000_000,
                        storage_rebate: 1_000_000,
                        non_refundable_storage_fee: 0,
                    }),
            );

            let mut builder = TransactionBuilder::new();
            builder.add_operation(reward_mint(50)).unwrap();

            // When
            let data = builder.build_complete(&SenderContext::new(SENDER), &client).await.unwrap();

            // Then
            assert_eq!(data.gas_data().budget, 1_000_000 + 1_000_000 + 3_000_000 - 1_000_000);
            assert_eq!(ledger.calls("dry_run"), 1);
            assert!(builder.is_sealed());
        }

        #[tokio::test]
        async fn given_budget_and_price_skip_the_ledger() {
            let (ledger, client) = client_on(InMemoryLedger::new().with_coin(a_coin(0x50, SENDER, "0x2::sui::SUI", 9_000)));

            let mut builder = TransactionBuilder::new();
            builder.add_operation(reward_mint(50)).unwrap();

            let context = SenderContext::new(SENDER).with_gas_budget(5_000).with_gas_price(800);
            let data = builder.build_complete(&context, &client).await.unwrap();

            assert_eq!(data.gas_data().budget, 5_000);
            assert_eq!(ledger.calls("dry_run"), 0);
            assert_eq!(ledger.calls("fetch_reference_gas_price"), 0);
        }

        #[tokio::test]
        async fn insufficient_balance_fails_before_any_ledger_call() {
            // Given
            let wine = a_coin(0x40, SENDER, "0xaa::wine::WINE", 10);
            let (ledger, client) = client_on(InMemoryLedger::new());

            let mut builder = TransactionBuilder::new();
            builder.register_coin(wine.clone());
            builder.add_operation(reward_mint(1).spending(wine.id(), 11)).unwrap();

            // When
            let result = builder.build_complete(&SenderContext::new(SENDER), &client).await;

            // Then
            assert!(matches!(result, Err(Error::InsufficientBalance { .. })));
            assert_eq!(ledger.total_calls(), 0);
        }

        #[tokio::test]
        async fn argument_coins_are_not_used_for_gas() {
            // Given
            let coin = a_coin(0x50, SENDER, "0x2::sui::SUI", 10_000_000_000);
            let (_, client) = client_on(InMemoryLedger::new().with_coin(coin.clone()));

            let mut builder = TransactionBuilder::new();
            builder
                .add_operation(Operation::move_call(PACKAGE, "shop", "pay").with_argument(ObjectArgument::Owned(coin.reference)))
                .unwrap();

            // When
            let result = builder.build_complete(&SenderContext::new(SENDER), &client).await;

            // Then
            assert!(matches!(result, Err(Error::GasEstimation(_))));
        }

        #[tokio::test]
        async fn failing_dry_run_is_a_gas_estimation_error() {
            let (_, client) = client_on(
                InMemoryLedger::new()
                    .with_coin(a_coin(0x50, SENDER, "0x2::sui::SUI", 10_000_000_000))
                    .with_dry_run_failure("MoveAbort in reward::mint"),
            );

            let mut builder = TransactionBuilder::new();
            builder.add_operation(reward_mint(50)).unwrap();

            match builder.build_complete(&SenderContext::new(SENDER), &client).await {
                Err(Error::GasEstimation(message)) => assert!(message.contains("MoveAbort")),
                other => panic!("unexpected result {:?}", other),
            }
            assert!(!builder.is_sealed());
            assert!(builder.add_operation(reward_mint(10)).is_ok());
        }

        #[tokio::test]
        async fn coins_too_small_for_the_budget_fail() {
            let (_, client) = client_on(InMemoryLedger::new().with_coin(a_coin(0x50, SENDER, "0x2::sui::SUI", 100)));

            let mut builder = TransactionBuilder::new();
            builder.add_operation(reward_mint(50)).unwrap();

            let result = builder
                .build_complete(&SenderContext::new(SENDER).with_gas_budget(1_000).with_gas_price(1), &client)
                .await;

            assert!(matches!(result, Err(Error::GasEstimation(_))));
        }

        #[tokio::test]
        async fn gas_is_paid_by_the_gas_owner() {
            let owner = Address::from_u8(0x22);
            let (_, client) = client_on(
                InMemoryLedger::new()
                    .with_coin(a_coin(0x50, SENDER, "0x2::sui::SUI", 10_000_000_000))
                    .with_coin(a_coin(0x51, owner, "0x2::sui::SUI", 10_000_000_000)),
            );

            let mut builder = TransactionBuilder::new();
            builder.add_operation(reward_mint(50)).unwrap();

            let data = builder
                .build_complete(&SenderContext::new(SENDER).with_gas_owner(owner), &client)
                .await
                .unwrap();

            assert_eq!(data.gas_data().owner, owner);
            assert_eq!(data.gas_data().payment[0].object_id, Address::from_u8(0x51));
        }
    }
}
