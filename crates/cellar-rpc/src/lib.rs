use cellar_execution::Error as ExecutionError;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObject;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cellar_execution::mint::BottleAttributes;

mod context;
pub use context::{Configuration, RPCConfiguration};

mod endpoint;
pub use endpoint::execute::{ExecuteSponsoredRequest, ExecuteSponsoredResponse};
pub use endpoint::mint::{MintBottleRequest, MintBottleResponse};
pub use endpoint::sponsor::{SponsorTransactionRequest, SponsorTransactionResponse};
pub use middleware::AdminKey;

mod middleware;

#[cfg(test)]
mod testing;

pub mod client;
pub mod server;

#[rpc(server, client)]
pub trait CellarAPI {
    #[method(name = "cellar_health", with_extensions)]
    async fn health(&self) -> Result<bool, Error>;

    #[method(name = "cellar_sponsorTransaction", with_extensions)]
    async fn sponsor_transaction(&self, params: SponsorTransactionRequest) -> Result<SponsorTransactionResponse, Error>;

    #[method(name = "cellar_executeSponsoredTransaction", with_extensions)]
    async fn execute_sponsored_transaction(&self, params: ExecuteSponsoredRequest) -> Result<ExecuteSponsoredResponse, Error>;

    #[method(name = "cellar_mintBottle", with_extensions)]
    async fn mint_bottle(&self, params: MintBottleRequest) -> Result<MintBottleResponse, Error>;
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("x-cellar-admin-key is invalid")]
    InvalidAdminKey,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl Error {
    /// Whether the error points at the service rather than at the caller
    pub fn is_alert(&self) -> bool {
        matches!(self, Self::Execution(e) if e.disposition() == cellar_execution::Disposition::Alert)
    }
}

/// Diagnostics attached to an error object
#[derive(Deserialize, Serialize, Debug, PartialEq)]
pub struct ErrorData {
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl<'a> From<Error> for ErrorObject<'a> {
    fn from(value: Error) -> Self {
        match value {
            Error::InvalidAdminKey => ErrorObject::owned(
                401,
                "The admin key is missing or invalid",
                Some(ErrorData {
                    kind: "invalid_admin_key".to_string(),
                    detail: None,
                }),
            ),
            Error::InvalidRequest(reason) => ErrorObject::owned(
                400,
                format!("The request is invalid: {}", reason),
                Some(ErrorData {
                    kind: "invalid_request".to_string(),
                    detail: Some(reason),
                }),
            ),
            Error::Execution(e) => {
                let code = match &e {
                    ExecutionError::InvalidRequest(_) | ExecutionError::InsufficientBalance(_) | ExecutionError::GasEstimation(_) => 400,
                    ExecutionError::SponsorshipDeclined(_) => 402,
                    ExecutionError::SigningRejected(_) => 403,
                    ExecutionError::SubmissionRejected(_) => 422,
                    ExecutionError::Configuration(_) => 500,
                    ExecutionError::SponsorshipUnavailable(_) => 503,
                    ExecutionError::ConfirmationTimeout { .. } => 504,
                };

                let detail = match &e {
                    ExecutionError::Configuration(_) => None,
                    e => Some(e.to_string()),
                };

                ErrorObject::owned(
                    code,
                    e.user_message(),
                    Some(ErrorData {
                        kind: e.kind().to_string(),
                        detail,
                    }),
                )
            },
        }
    }
}
