//! Binary layout of transactions as accepted by the ledger. Every enum keeps the ledger's
//! variant order since BCS encodes variants by index.

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::crypto::transaction_digest;
use crate::types::{Address, Digest, ObjectId, ObjectRef, TypeTag};
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Argument {
    GasCoin,
    Input(u16),
    Result(u16),
    NestedResult(u16, u16),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectArg {
    ImmOrOwnedObject(ObjectRef),
    SharedObject { id: ObjectId, initial_shared_version: u64, mutable: bool },
    Receiving(ObjectRef),
}

impl ObjectArg {
    pub fn id(&self) -> ObjectId {
        match self {
            Self::ImmOrOwnedObject(reference) | Self::Receiving(reference) => reference.object_id,
            Self::SharedObject { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallArg {
    Pure(Vec<u8>),
    Object(ObjectArg),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgrammableMoveCall {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
    pub type_arguments: Vec<TypeTag>,
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    MoveCall(Box<ProgrammableMoveCall>),
    TransferObjects(Vec<Argument>, Argument),
    SplitCoins(Argument, Vec<Argument>),
    MergeCoins(Argument, Vec<Argument>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgrammableTransaction {
    pub inputs: Vec<CallArg>,
    pub commands: Vec<Command>,
}

impl ProgrammableTransaction {
    pub fn move_calls(&self) -> impl Iterator<Item = &ProgrammableMoveCall> {
        self.commands.iter().filter_map(|x| match x {
            Command::MoveCall(call) => Some(call.as_ref()),
            _ => None,
        })
    }

    /// Identifiers of the objects given as inputs
    pub fn input_objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.inputs.iter().filter_map(|x| match x {
            CallArg::Object(object) => Some(object.id()),
            CallArg::Pure(_) => None,
        })
    }
}

/// Transaction without sender nor gas, as exchanged with the sponsorship relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    ProgrammableTransaction(ProgrammableTransaction),
}

impl TransactionKind {
    pub fn programmable(&self) -> &ProgrammableTransaction {
        match self {
            Self::ProgrammableTransaction(transaction) => transaction,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        bcs::to_bytes(self).map_err(|e| Error::Encoding(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        bcs::from_bytes(bytes).map_err(|e| Error::Encoding(e.to_string()))
    }

    pub fn to_base64(&self) -> Result<String, Error> {
        Ok(BASE64_STANDARD.encode(self.to_bytes()?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasData {
    pub payment: Vec<ObjectRef>,
    pub owner: Address,
    pub price: u64,
    pub budget: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionExpiration {
    None,
    Epoch(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDataV1 {
    pub kind: TransactionKind,
    pub sender: Address,
    pub gas_data: GasData,
    pub expiration: TransactionExpiration,
}

/// Complete transaction, ready to be signed by its sender and gas owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionData {
    V1(TransactionDataV1),
}

impl TransactionData {
    pub fn new(kind: TransactionKind, sender: Address, gas_data: GasData) -> Self {
        Self::V1(TransactionDataV1 {
            kind,
            sender,
            gas_data,
            expiration: TransactionExpiration::None,
        })
    }

    pub fn kind(&self) -> &TransactionKind {
        match self {
            Self::V1(data) => &data.kind,
        }
    }

    pub fn sender(&self) -> Address {
        match self {
            Self::V1(data) => data.sender,
        }
    }

    pub fn gas_data(&self) -> &GasData {
        match self {
            Self::V1(data) => &data.gas_data,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        bcs::to_bytes(self).map_err(|e| Error::Encoding(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        bcs::from_bytes(bytes).map_err(|e| Error::Encoding(e.to_string()))
    }

    pub fn from_base64(s: &str) -> Result<Self, Error> {
        let bytes = BASE64_STANDARD.decode(s).map_err(|e| Error::Encoding(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_base64(&self) -> Result<String, Error> {
        Ok(BASE64_STANDARD.encode(self.to_bytes()?))
    }

    pub fn digest(&self) -> Result<Digest, Error> {
        Ok(transaction_digest(&self.to_bytes()?))
    }
}
