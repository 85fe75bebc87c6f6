use cellar_execution::mint::MintConfiguration;
use cellar_execution::submit::ConfirmationConfiguration;
use cellar_execution::RetryPolicy;
use cellar_ledger::Configuration as LedgerConfiguration;
use cellar_sponsoring::Configuration as SponsoringConfiguration;
use serde::{Deserialize, Serialize};

use crate::middleware::AdminKey;

#[derive(Clone, Debug, Deserialize)]
pub struct Configuration {
    pub rpc: RPCConfiguration,

    /// Required by the mint method when set
    #[serde(default)]
    pub admin_key: Option<AdminKey>,

    pub ledger: LedgerConfiguration,

    #[serde(default = "SponsoringConfiguration::none")]
    pub sponsoring: SponsoringConfiguration,

    #[serde(default)]
    pub confirmation: ConfirmationConfiguration,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub mint: MintConfiguration,
}

impl From<Configuration> for cellar_execution::Configuration {
    fn from(value: Configuration) -> Self {
        Self {
            ledger: value.ledger,
            sponsoring: value.sponsoring,
            confirmation: value.confirmation,
            retry: value.retry,
            mint: value.mint,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RPCConfiguration {
    pub port: u64,
}
