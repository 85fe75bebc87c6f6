//! JSON shapes returned by the ledger's full node. Large integers are sent as strings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use crate::transaction::{CreatedObject, Event, ExecutionResult, ExecutionStatus, GasUsed};
use crate::types::{Address, Coin, Digest, ObjectId, ObjectRef};

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinModel {
    pub coin_type: String,
    pub coin_object_id: ObjectId,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub version: u64,
    pub digest: Digest,

    #[serde_as(as = "DisplayFromStr")]
    pub balance: u64,
}

impl CoinModel {
    pub fn into_coin(self, owner: Address) -> Coin {
        Coin {
            reference: ObjectRef {
                object_id: self.coin_object_id,
                version: self.version,
                digest: self.digest,
            },
            owner,
            coin_type: self.coin_type,
            balance: self.balance,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinPage {
    pub data: Vec<CoinModel>,
    pub next_cursor: Option<String>,
    pub has_next_page: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusModel {
    pub status: String,
    pub error: Option<String>,
}

impl From<StatusModel> for ExecutionStatus {
    fn from(value: StatusModel) -> Self {
        match value.status.as_str() {
            "success" => Self::Success,
            _ => Self::Failure {
                error: value.error.unwrap_or(value.status),
            },
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasUsedModel {
    #[serde_as(as = "DisplayFromStr")]
    pub computation_cost: u64,
    #[serde_as(as = "DisplayFromStr")]
    pub storage_cost: u64,
    #[serde_as(as = "DisplayFromStr")]
    pub storage_rebate: u64,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default)]
    pub non_refundable_storage_fee: u64,
}

impl From<GasUsedModel> for GasUsed {
    fn from(value: GasUsedModel) -> Self {
        Self {
            computation_cost: value.computation_cost,
            storage_cost: value.storage_cost,
            storage_rebate: value.storage_rebate,
            non_refundable_storage_fee: value.non_refundable_storage_fee,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRefModel {
    pub object_id: ObjectId,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub version: u64,
    pub digest: Digest,
}

impl From<ObjectRefModel> for ObjectRef {
    fn from(value: ObjectRefModel) -> Self {
        Self {
            object_id: value.object_id,
            version: value.version,
            digest: value.digest,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnedObjectModel {
    pub owner: Value,
    pub reference: ObjectRefModel,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectsModel {
    pub status: StatusModel,
    pub gas_used: GasUsedModel,
    pub transaction_digest: Digest,

    #[serde(default)]
    pub created: Vec<OwnedObjectModel>,
    #[serde(default)]
    pub mutated: Vec<OwnedObjectModel>,
    #[serde(default)]
    pub deleted: Vec<ObjectRefModel>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventIdModel {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub event_seq: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventModel {
    pub id: EventIdModel,
    #[serde(rename = "type")]
    pub event_type: String,
    pub sender: Address,
    #[serde(default)]
    pub parsed_json: Value,
}

impl From<EventModel> for Event {
    fn from(value: EventModel) -> Self {
        Self {
            event_type: value.event_type,
            sender: value.sender,
            payload: value.parsed_json,
            sequence: value.id.event_seq,
        }
    }
}

/// Entry of `objectChanges`, only used to learn the type of created objects
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectChangeModel {
    #[serde(rename = "type")]
    pub change: String,
    pub object_id: Option<ObjectId>,
    pub object_type: Option<String>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBlockModel {
    pub digest: Digest,
    pub effects: Option<EffectsModel>,
    #[serde(default)]
    pub events: Vec<EventModel>,
    #[serde(default)]
    pub object_changes: Vec<ObjectChangeModel>,

    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub checkpoint: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunModel {
    pub effects: EffectsModel,
    #[serde(default)]
    pub events: Vec<EventModel>,
    #[serde(default)]
    pub object_changes: Vec<ObjectChangeModel>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseOptions {
    pub show_effects: bool,
    pub show_events: bool,
    pub show_object_changes: bool,
}

impl ResponseOptions {
    pub fn full() -> Self {
        Self {
            show_effects: true,
            show_events: true,
            show_object_changes: true,
        }
    }
}

/// Address owning an object, when the owner is an account
fn address_owner(owner: &Value) -> Option<Address> {
    owner.get("AddressOwner").and_then(Value::as_str).and_then(|x| Address::from_hex(x).ok())
}

fn into_result(
    digest: Digest,
    effects: EffectsModel,
    events: Vec<EventModel>,
    object_changes: Vec<ObjectChangeModel>,
    checkpoint: Option<u64>,
) -> ExecutionResult {
    let types: HashMap<ObjectId, String> = object_changes
        .into_iter()
        .filter(|x| x.change == "created")
        .filter_map(|x| Some((x.object_id?, x.object_type?)))
        .collect();

    let created = effects
        .created
        .into_iter()
        .map(|x| {
            let reference = ObjectRef::from(x.reference);
            CreatedObject {
                owner: address_owner(&x.owner),
                object_type: types.get(&reference.object_id).cloned(),
                reference,
            }
        })
        .collect();

    ExecutionResult {
        digest,
        status: effects.status.into(),
        created,
        mutated: effects.mutated.into_iter().map(|x| x.reference.into()).collect(),
        deleted: effects.deleted.into_iter().map(ObjectRef::from).collect(),
        events: events.into_iter().map(Event::from).collect(),
        gas_used: effects.gas_used.into(),
        checkpoint,
    }
}

impl TransactionBlockModel {
    /// `None` when the node did not return effects
    pub fn into_result(self) -> Option<ExecutionResult> {
        let effects = self.effects?;

        Some(into_result(self.digest, effects, self.events, self.object_changes, self.checkpoint))
    }
}

impl From<DryRunModel> for ExecutionResult {
    fn from(value: DryRunModel) -> Self {
        let digest = value.effects.transaction_digest;
        into_result(digest, value.effects, value.events, value.object_changes, None)
    }
}
