use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Address, Digest, ObjectId, ObjectRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failure { error: String },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasUsed {
    pub computation_cost: u64,
    pub storage_cost: u64,
    pub storage_rebate: u64,
    pub non_refundable_storage_fee: u64,
}

/// An object created by a transaction, along with its type when the node reported it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedObject {
    pub reference: ObjectRef,
    pub owner: Option<Address>,
    pub object_type: Option<String>,
}

impl CreatedObject {
    pub fn id(&self) -> ObjectId {
        self.reference.object_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_type: String,
    pub sender: Address,
    pub payload: Value,
    pub sequence: u64,
}

/// Effects and events of an executed transaction. A transaction that was executed but
/// aborted is still an [`ExecutionResult`], with a [`ExecutionStatus::Failure`] status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub digest: Digest,
    pub status: ExecutionStatus,
    pub created: Vec<CreatedObject>,
    pub mutated: Vec<ObjectRef>,
    pub deleted: Vec<ObjectRef>,
    pub events: Vec<Event>,
    pub gas_used: GasUsed,

    /// Checkpoint including the transaction, known once it is final
    pub checkpoint: Option<u64>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, ExecutionStatus::Success)
    }

    pub fn is_final(&self) -> bool {
        self.checkpoint.is_some()
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            ExecutionStatus::Success => None,
            ExecutionStatus::Failure { error } => Some(error),
        }
    }
}
