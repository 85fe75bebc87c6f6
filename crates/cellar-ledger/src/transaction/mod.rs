use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::types::{Address, ObjectId, ObjectRef, TypeTag};

mod builder;
pub use builder::{SenderContext, TransactionBuilder};

mod effects;
pub use effects::{CreatedObject, Event, ExecutionResult, ExecutionStatus, GasUsed};

mod gas;
pub use gas::{GasEstimate, GAS_SAFE_OVERHEAD, MAX_GAS_BUDGET};

pub mod wire;
pub use wire::{TransactionData, TransactionKind};

/// A value passed by value to a Move function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PureValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    Address(Address),
    String(String),
    Bytes(Vec<u8>),
    Vector(Vec<PureValue>),
    Option(Option<Box<PureValue>>),
}

impl PureValue {
    pub fn to_bytes(&self) -> Result<Vec<u8>, crate::Error> {
        bcs::to_bytes(self).map_err(|e| crate::Error::Encoding(e.to_string()))
    }
}

impl Serialize for PureValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::U8(value) => serializer.serialize_u8(*value),
            Self::U16(value) => serializer.serialize_u16(*value),
            Self::U32(value) => serializer.serialize_u32(*value),
            Self::U64(value) => serializer.serialize_u64(*value),
            Self::U128(value) => serializer.serialize_u128(*value),
            Self::Address(value) => value.serialize(serializer),
            Self::String(value) => serializer.serialize_str(value),
            Self::Bytes(value) => serializer.collect_seq(value),
            Self::Vector(values) => serializer.collect_seq(values),
            // Move options are vectors of at most one element
            Self::Option(value) => {
                let mut seq = serializer.serialize_seq(Some(value.iter().len()))?;
                if let Some(value) = value {
                    seq.serialize_element(value.as_ref())?;
                }
                seq.end()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectArgument {
    Owned(ObjectRef),
    Shared { id: ObjectId, initial_shared_version: u64, mutable: bool },
}

impl ObjectArgument {
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Owned(reference) => reference.object_id,
            Self::Shared { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationArgument {
    Pure(PureValue),
    Object(ObjectArgument),
    /// Value returned by an earlier operation of the same transaction
    Result(u16),
    NestedResult(u16, u16),
}

impl From<PureValue> for OperationArgument {
    fn from(value: PureValue) -> Self {
        Self::Pure(value)
    }
}

impl From<ObjectArgument> for OperationArgument {
    fn from(value: ObjectArgument) -> Self {
        Self::Object(value)
    }
}

/// Amount of a coin an operation is expected to consume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinSpend {
    pub coin: ObjectId,
    pub amount: u64,
}

/// A call to a Move function. Arguments are not type checked against the callee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
    pub type_arguments: Vec<TypeTag>,
    pub arguments: Vec<OperationArgument>,
    pub coin_spends: Vec<CoinSpend>,
}

impl Operation {
    pub fn move_call(package: ObjectId, module: &str, function: &str) -> Self {
        Self {
            package,
            module: module.to_string(),
            function: function.to_string(),
            type_arguments: vec![],
            arguments: vec![],
            coin_spends: vec![],
        }
    }

    pub fn with_type_argument(mut self, type_argument: TypeTag) -> Self {
        self.type_arguments.push(type_argument);
        self
    }

    pub fn with_argument(mut self, argument: impl Into<OperationArgument>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn spending(mut self, coin: ObjectId, amount: u64) -> Self {
        self.coin_spends.push(CoinSpend { coin, amount });
        self
    }

    /// `package::module::function`
    pub fn target(&self) -> String {
        format!("{}::{}::{}", self.package, self.module, self.function)
    }
}
