use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cellar_ledger::types::Digest;
use cellar_ledger::Network;
use cellar_sponsoring::SponsoredTransaction;
use serde::{Deserialize, Serialize};

use crate::endpoint::RequestContext;
use crate::Error;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SponsorTransactionRequest {
    /// Kind-only transaction in base64
    pub transaction_kind_bytes: String,
    pub sender: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SponsorTransactionResponse {
    /// Complete transaction in base64, to be signed by the sender
    pub bytes: String,
    pub digest: Digest,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsor_signature: Option<String>,
}

impl From<SponsoredTransaction> for SponsorTransactionResponse {
    fn from(value: SponsoredTransaction) -> Self {
        Self {
            bytes: value.bytes,
            digest: value.digest,
            sponsor_signature: value.sponsor_signature,
        }
    }
}

pub async fn sponsor_transaction_endpoint(ctx: &RequestContext<'_>, request: SponsorTransactionRequest) -> Result<SponsorTransactionResponse, Error> {
    ctx.check_network(request.network)?;

    let bytes = STANDARD
        .decode(request.transaction_kind_bytes.trim())
        .map_err(|_| Error::InvalidRequest("transaction_kind_bytes is not base64".to_string()))?;

    let sponsored = ctx.execution.sponsor(&bytes, &request.sender).await?;

    Ok(sponsored.into())
}
