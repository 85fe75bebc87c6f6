use cellar_execution::mint::{BottleAttributes, MintReceipt, MintRequest};
use cellar_ledger::transaction::ExecutionStatus;
use cellar_ledger::types::{Address, Digest, ObjectId};
use serde::{Deserialize, Serialize};

use crate::endpoint::RequestContext;
use crate::Error;

/// Absent fields deserialize empty and are refused with the invalid ones
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct MintBottleRequest {
    pub recipient: String,
    pub reward_amount: u64,
    pub bottle: BottleAttributes,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MintBottleResponse {
    pub digest: Digest,

    #[serde(flatten)]
    pub status: ExecutionStatus,

    pub nft_id: Option<ObjectId>,
    pub signer: Address,
}

impl From<MintReceipt> for MintBottleResponse {
    fn from(value: MintReceipt) -> Self {
        Self {
            digest: value.digest,
            status: value.status,
            nft_id: value.nft_id,
            signer: value.signer,
        }
    }
}

pub async fn mint_bottle_endpoint(ctx: &RequestContext<'_>, request: MintBottleRequest) -> Result<MintBottleResponse, Error> {
    ctx.validate_admin_key()?;

    let receipt = ctx
        .execution
        .mint(MintRequest {
            recipient: request.recipient,
            reward_amount: request.reward_amount,
            bottle: request.bottle,
        })
        .await?;

    Ok(receipt.into())
}
