use std::fmt::Debug;

use async_trait::async_trait;
use cellar_ledger::types::Address;
use cellar_ledger::Network;

use crate::{Error, SponsoredTransaction};

#[async_trait]
pub trait MockSponsor: 'static + Send + Sync + Debug {
    fn new() -> Self
    where
        Self: Sized;

    async fn sponsor(&self, _transaction_kind_bytes: &[u8], _sender: Address, _network: Network) -> Result<SponsoredTransaction, Error> {
        unimplemented!()
    }
}
