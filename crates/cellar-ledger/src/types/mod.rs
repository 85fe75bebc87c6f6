use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

mod tag;
pub use tag::{StructTag, TypeTag};

pub const ADDRESS_LENGTH: usize = 32;
pub const DIGEST_LENGTH: usize = 32;

/// Coin type paying for gas
pub const GAS_COIN_TYPE: &str = "0x2::sui::SUI";

/// Account or object identifier. Rendered as `0x` followed by 64 lowercase hex digits,
/// encoded as 32 raw bytes on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

/// Objects share the address space of accounts
pub type ObjectId = Address;

impl Address {
    pub const ZERO: Self = Self([0; ADDRESS_LENGTH]);

    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Short form used for framework addresses, e.g. `0x2`
    pub const fn from_u8(value: u8) -> Self {
        let mut bytes = [0; ADDRESS_LENGTH];
        bytes[ADDRESS_LENGTH - 1] = value;
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse an identifier of the form `0x` followed by 1 to 64 hex digits. Short forms are
    /// left padded with zeros.
    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let digits = s.strip_prefix("0x").ok_or_else(|| Error::InvalidAddress(s.to_string()))?;
        if digits.is_empty() || digits.len() > 2 * ADDRESS_LENGTH || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidAddress(s.to_string()));
        }

        let padded = format!("{:0>64}", digits);
        let mut bytes = [0; ADDRESS_LENGTH];
        hex::decode_to_slice(padded, &mut bytes).map_err(|_| Error::InvalidAddress(s.to_string()))?;

        Ok(Self(bytes))
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let value = String::deserialize(deserializer)?;
            Self::from_hex(&value).map_err(D::Error::custom)
        } else {
            <[u8; ADDRESS_LENGTH]>::deserialize(deserializer).map(Self)
        }
    }
}

/// 32 bytes digest rendered in base58. On the wire, digests are length prefixed byte arrays.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Digest([u8; DIGEST_LENGTH]);

impl Digest {
    pub const fn new(bytes: [u8; DIGEST_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LENGTH] {
        &self.0
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    pub fn from_base58(s: &str) -> Result<Self, Error> {
        let bytes = bs58::decode(s).into_vec().map_err(|_| Error::InvalidDigest(s.to_string()))?;

        Self::try_from(bytes.as_slice()).map_err(|_| Error::InvalidDigest(s.to_string()))
    }
}

impl TryFrom<&[u8]> for Digest {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; DIGEST_LENGTH] = value
            .try_into()
            .map_err(|_| Error::InvalidDigest(format!("expected {} bytes, got {}", DIGEST_LENGTH, value.len())))?;

        Ok(Self(bytes))
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl Debug for Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_base58())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let value = String::deserialize(deserializer)?;
            Self::from_base58(&value).map_err(D::Error::custom)
        } else {
            let bytes = Vec::<u8>::deserialize(deserializer)?;
            Self::try_from(bytes.as_slice()).map_err(D::Error::custom)
        }
    }
}

/// Reference to a specific version of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    pub object_id: ObjectId,
    pub version: u64,
    pub digest: Digest,
}

/// A coin whose owner, type and balance are known when building a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coin {
    pub reference: ObjectRef,
    pub owner: Address,
    pub coin_type: String,
    pub balance: u64,
}

impl Coin {
    pub fn id(&self) -> ObjectId {
        self.reference.object_id
    }
}
