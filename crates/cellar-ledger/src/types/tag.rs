use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::Address;
use crate::Error;

/// Move type. Variant order matches the ledger's wire encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    Bool,
    U8,
    U64,
    U128,
    Address,
    Signer,
    Vector(Box<TypeTag>),
    Struct(Box<StructTag>),
    U16,
    U32,
    U256,
}

/// Fully qualified struct type, e.g. `0x2::coin::Coin<0x2::sui::SUI>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructTag {
    pub address: Address,
    pub module: String,
    pub name: String,
    pub type_params: Vec<TypeTag>,
}

impl StructTag {
    pub fn new(address: Address, module: &str, name: &str) -> Self {
        Self {
            address,
            module: module.to_string(),
            name: name.to_string(),
            type_params: vec![],
        }
    }

    pub fn with_type_params(mut self, type_params: Vec<TypeTag>) -> Self {
        self.type_params = type_params;
        self
    }

    /// The native gas coin type `0x2::sui::SUI`
    pub fn gas() -> Self {
        Self::new(Address::from_u8(2), "sui", "SUI")
    }
}

impl Display for StructTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}::{}", self.address, self.module, self.name)?;
        if !self.type_params.is_empty() {
            let params = self.type_params.iter().map(|x| x.to_string()).collect::<Vec<_>>();
            write!(f, "<{}>", params.join(", "))?;
        }

        Ok(())
    }
}

impl Display for TypeTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::U8 => f.write_str("u8"),
            Self::U16 => f.write_str("u16"),
            Self::U32 => f.write_str("u32"),
            Self::U64 => f.write_str("u64"),
            Self::U128 => f.write_str("u128"),
            Self::U256 => f.write_str("u256"),
            Self::Address => f.write_str("address"),
            Self::Signer => f.write_str("signer"),
            Self::Vector(inner) => write!(f, "vector<{}>", inner),
            Self::Struct(inner) => write!(f, "{}", inner),
        }
    }
}

/// Split `s` on commas that are not nested in angle brackets
fn split_top_level(s: &str) -> Result<Vec<&str>, Error> {
    let mut parts = vec![];
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.checked_sub(1).ok_or_else(|| Error::InvalidTypeTag(s.to_string()))?,
            ',' if depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            },
            _ => {},
        }
    }

    if depth != 0 {
        return Err(Error::InvalidTypeTag(s.to_string()));
    }

    parts.push(s[start..].trim());
    Ok(parts)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FromStr for StructTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || Error::InvalidTypeTag(s.to_string());

        let (path, type_params) = match s.find('<') {
            Some(index) => {
                let inner = s[index + 1..].strip_suffix('>').ok_or_else(invalid)?;
                let params = split_top_level(inner)?
                    .into_iter()
                    .map(TypeTag::from_str)
                    .collect::<Result<Vec<_>, _>>()?;

                (&s[..index], params)
            },
            None => (s, vec![]),
        };

        let mut segments = path.split("::");
        let (Some(address), Some(module), Some(name), None) = (segments.next(), segments.next(), segments.next(), segments.next()) else {
            return Err(invalid());
        };

        if !is_identifier(module) || !is_identifier(name) {
            return Err(invalid());
        }

        Ok(Self {
            address: Address::from_hex(address).map_err(|_| invalid())?,
            module: module.to_string(),
            name: name.to_string(),
            type_params,
        })
    }
}

impl FromStr for TypeTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        Ok(match s {
            "bool" => Self::Bool,
            "u8" => Self::U8,
            "u16" => Self::U16,
            "u32" => Self::U32,
            "u64" => Self::U64,
            "u128" => Self::U128,
            "u256" => Self::U256,
            "address" => Self::Address,
            "signer" => Self::Signer,
            s if s.starts_with("vector<") => {
                let inner = s["vector<".len()..]
                    .strip_suffix('>')
                    .ok_or_else(|| Error::InvalidTypeTag(s.to_string()))?;

                Self::Vector(Box::new(Self::from_str(inner)?))
            },
            s => Self::Struct(Box::new(StructTag::from_str(s)?)),
        })
    }
}
