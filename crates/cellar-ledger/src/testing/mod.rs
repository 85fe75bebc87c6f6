use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::signing::SignedTransaction;
use crate::transaction::{CreatedObject, Event, ExecutionResult, ExecutionStatus, GasUsed, TransactionData};
use crate::types::{Address, Coin, Digest};
use crate::Error;

#[async_trait]
pub trait MockLedger: 'static + Send + Sync + Debug {
    fn new() -> Self
    where
        Self: Sized;

    async fn chain_identifier(&self) -> Result<String, Error> {
        unimplemented!()
    }

    async fn fetch_coins(&self, _owner: Address, _coin_type: &str) -> Result<Vec<Coin>, Error> {
        unimplemented!()
    }

    async fn fetch_reference_gas_price(&self) -> Result<u64, Error> {
        unimplemented!()
    }

    async fn dry_run(&self, _transaction: &TransactionData) -> Result<ExecutionResult, Error> {
        unimplemented!()
    }

    async fn execute(&self, _transaction: &SignedTransaction) -> Result<ExecutionResult, Error> {
        unimplemented!()
    }

    async fn fetch_transaction(&self, _digest: Digest) -> Result<Option<ExecutionResult>, Error> {
        unimplemented!()
    }
}

/// Ledger double keeping its state in memory. Executed transactions become final after
/// a configurable number of polls, or never.
#[derive(Debug)]
pub struct InMemoryLedger {
    chain_identifier: String,
    gas_price: u64,
    coins: Vec<Coin>,

    dry_run_gas: GasUsed,
    dry_run_failure: Option<String>,

    execute_error: Option<String>,
    execute_unanswered: bool,
    status: ExecutionStatus,
    created: Vec<CreatedObject>,
    events: Vec<Event>,
    final_after_polls: Option<usize>,

    executed: Mutex<HashMap<Digest, ExecutionResult>>,
    submissions: Mutex<Vec<SignedTransaction>>,
    polls: AtomicUsize,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl InMemoryLedger {
    pub fn with_chain_identifier(mut self, chain_identifier: &str) -> Self {
        self.chain_identifier = chain_identifier.to_string();
        self
    }

    pub fn with_gas_price(mut self, gas_price: u64) -> Self {
        self.gas_price = gas_price;
        self
    }

    pub fn with_coin(mut self, coin: Coin) -> Self {
        self.coins.push(coin);
        self
    }

    pub fn with_dry_run_gas(mut self, gas: GasUsed) -> Self {
        self.dry_run_gas = gas;
        self
    }

    pub fn with_dry_run_failure(mut self, error: &str) -> Self {
        self.dry_run_failure = Some(error.to_string());
        self
    }

    /// Broadcasts are rejected by the node with `error`
    pub fn with_execute_error(mut self, error: &str) -> Self {
        self.execute_error = Some(error.to_string());
        self
    }

    /// Broadcasts are accepted but the answer is lost, as on a request timeout
    pub fn with_unanswered_execute(mut self) -> Self {
        self.execute_unanswered = true;
        self
    }

    pub fn with_status(mut self, status: ExecutionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_created(mut self, object: CreatedObject) -> Self {
        self.created.push(object);
        self
    }

    pub fn with_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    /// `None` keeps executed transactions pending forever
    pub fn with_finality_after(mut self, polls: Option<usize>) -> Self {
        self.final_after_polls = polls;
        self
    }

    /// Number of calls made to `method`
    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or_default()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn submissions(&self) -> Vec<SignedTransaction> {
        self.submissions.lock().unwrap().clone()
    }

    fn record(&self, method: &'static str) {
        *self.calls.lock().unwrap().entry(method).or_default() += 1;
    }

    fn result(&self, digest: Digest, gas_used: GasUsed) -> ExecutionResult {
        ExecutionResult {
            digest,
            status: self.status.clone(),
            created: self.created.clone(),
            mutated: vec![],
            deleted: vec![],
            events: self.events.clone(),
            gas_used,
            checkpoint: None,
        }
    }
}

#[async_trait]
impl MockLedger for InMemoryLedger {
    fn new() -> Self
    where
        Self: Sized,
    {
        Self {
            chain_identifier: "4c78adac".to_string(),
            gas_price: 1_000,
            coins: vec![],
            dry_run_gas: GasUsed {
                computation_cost: 1_000_000,
                storage_cost: 2_000_000,
                storage_rebate: 1_000_000,
                non_refundable_storage_fee: 0,
            },
            dry_run_failure: None,
            execute_error: None,
            execute_unanswered: false,
            status: ExecutionStatus::Success,
            created: vec![],
            events: vec![],
            final_after_polls: Some(0),
            executed: Mutex::new(HashMap::new()),
            submissions: Mutex::new(vec![]),
            polls: AtomicUsize::new(0),
            calls: Mutex::new(HashMap::new()),
        }
    }

    async fn chain_identifier(&self) -> Result<String, Error> {
        self.record("chain_identifier");
        Ok(self.chain_identifier.clone())
    }

    async fn fetch_coins(&self, owner: Address, coin_type: &str) -> Result<Vec<Coin>, Error> {
        self.record("fetch_coins");
        Ok(self
            .coins
            .iter()
            .filter(|x| x.owner == owner && x.coin_type == coin_type)
            .cloned()
            .collect())
    }

    async fn fetch_reference_gas_price(&self) -> Result<u64, Error> {
        self.record("fetch_reference_gas_price");
        Ok(self.gas_price)
    }

    async fn dry_run(&self, transaction: &TransactionData) -> Result<ExecutionResult, Error> {
        self.record("dry_run");

        let mut result = self.result(transaction.digest()?, self.dry_run_gas);
        if let Some(error) = &self.dry_run_failure {
            result.status = ExecutionStatus::Failure { error: error.clone() };
        }

        Ok(result)
    }

    async fn execute(&self, transaction: &SignedTransaction) -> Result<ExecutionResult, Error> {
        self.record("execute");

        if let Some(error) = &self.execute_error {
            return Err(Error::Ledger(error.clone()));
        }

        let result = self.result(transaction.digest(), self.dry_run_gas);
        self.executed.lock().unwrap().insert(transaction.digest(), result.clone());
        self.submissions.lock().unwrap().push(transaction.clone());

        if self.execute_unanswered {
            return Err(Error::Transport("request timeout".to_string()));
        }

        Ok(result)
    }

    async fn fetch_transaction(&self, digest: Digest) -> Result<Option<ExecutionResult>, Error> {
        self.record("fetch_transaction");

        let Some(mut result) = self.executed.lock().unwrap().get(&digest).cloned() else {
            return Ok(None);
        };

        let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.final_after_polls.is_some_and(|x| polls > x) {
            result.checkpoint = Some(polls as u64);
        }

        Ok(Some(result))
    }
}
