//! Recover domain identifiers from the effects of an executed transaction.
//!
//! Extraction never performs I/O and never fails: `None` means the transaction did not
//! produce anything matching, which callers must handle separately from an execution
//! failure.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use cellar_ledger::transaction::{Event, ExecutionResult};
use cellar_ledger::types::ObjectId;

/// Predicate over a fully qualified type such as `0xabc::bottle::BottleNFT`
#[derive(Clone)]
pub enum TypeMatcher {
    Exact(String),
    Contains(String),
    Suffix(String),
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl TypeMatcher {
    pub fn exact(value: impl Into<String>) -> Self {
        Self::Exact(value.into())
    }

    pub fn contains(value: impl Into<String>) -> Self {
        Self::Contains(value.into())
    }

    pub fn suffix(value: impl Into<String>) -> Self {
        Self::Suffix(value.into())
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    pub fn matches(&self, type_tag: &str) -> bool {
        match self {
            Self::Exact(value) => type_tag == value,
            Self::Contains(value) => type_tag.contains(value.as_str()),
            Self::Suffix(value) => type_tag.ends_with(value.as_str()),
            Self::Predicate(f) => f(type_tag),
        }
    }
}

impl Debug for TypeMatcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(value) => write!(f, "Exact({})", value),
            Self::Contains(value) => write!(f, "Contains({})", value),
            Self::Suffix(value) => write!(f, "Suffix({})", value),
            Self::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

/// Returns the first created object whose type matches
pub fn extract_created_object(result: &ExecutionResult, matcher: &TypeMatcher) -> Option<ObjectId> {
    result
        .created
        .iter()
        .find(|x| x.object_type.as_deref().is_some_and(|t| matcher.matches(t)))
        .map(|x| x.id())
}

/// Returns every created object whose type matches, in the order the node reported them
pub fn extract_created_objects(result: &ExecutionResult, matcher: &TypeMatcher) -> Vec<ObjectId> {
    result
        .created
        .iter()
        .filter(|x| x.object_type.as_deref().is_some_and(|t| matcher.matches(t)))
        .map(|x| x.id())
        .collect()
}

/// Returns the first emitted event whose type matches
pub fn extract_event<'a>(result: &'a ExecutionResult, matcher: &TypeMatcher) -> Option<&'a Event> {
    result.events.iter().find(|x| matcher.matches(&x.event_type))
}

#[cfg(test)]
mod tests {
    use cellar_ledger::transaction::{CreatedObject, Event, ExecutionResult, ExecutionStatus, GasUsed};
    use cellar_ledger::types::{Address, Digest, ObjectRef};
    use serde_json::json;

    use crate::extract::{extract_created_object, extract_created_objects, extract_event, TypeMatcher};

    fn created(id: u8, object_type: Option<&str>) -> CreatedObject {
        CreatedObject {
            reference: ObjectRef {
                object_id: Address::from_u8(id),
                version: 1,
                digest: Digest::default(),
            },
            owner: Some(Address::from_u8(0x11)),
            object_type: object_type.map(|x| x.to_string()),
        }
    }

    fn result() -> ExecutionResult {
        ExecutionResult {
            digest: Digest::new([1; 32]),
            status: ExecutionStatus::Success,
            created: vec![
                created(1, Some("0x2::coin::Coin<0xa::reward::REWARD>")),
                created(2, None),
                created(3, Some("0xb::bottle::BottleNFT")),
            ],
            mutated: vec![],
            deleted: vec![],
            events: vec![Event {
                event_type: "0xb::bottle::BottleMinted".to_string(),
                sender: Address::from_u8(0x11),
                payload: json!({ "sequence": "1" }),
                sequence: 0,
            }],
            gas_used: GasUsed::default(),
            checkpoint: Some(10),
        }
    }

    mod created_object {
        use super::*;

        #[test]
        fn finds_the_matching_type() {
            let id = extract_created_object(&result(), &TypeMatcher::contains("BottleNFT"));

            assert_eq!(id, Some(Address::from_u8(3)));
        }

        #[test]
        fn absent_type_is_none() {
            let id = extract_created_object(&result(), &TypeMatcher::contains("Corkscrew"));

            assert_eq!(id, None);
        }

        #[test]
        fn extraction_is_repeatable() {
            // Given
            let result = result();
            let matcher = TypeMatcher::suffix("::bottle::BottleNFT");

            // When
            let first = extract_created_object(&result, &matcher);
            let second = extract_created_object(&result, &matcher);

            // Then
            assert_eq!(first, second);
            assert!(first.is_some());
        }

        #[test]
        fn predicate_sees_every_typed_object() {
            let ids = extract_created_objects(&result(), &TypeMatcher::predicate(|x| x.starts_with("0x")));

            assert_eq!(ids, vec![Address::from_u8(1), Address::from_u8(3)]);
        }
    }

    mod event {
        use super::*;

        #[test]
        fn finds_event_by_exact_type() {
            let result = result();
            let event = extract_event(&result, &TypeMatcher::exact("0xb::bottle::BottleMinted")).unwrap();

            assert_eq!(event.payload["sequence"], "1");
        }

        #[test]
        fn missing_event_is_none() {
            assert!(extract_event(&result(), &TypeMatcher::exact("0xb::bottle::BottleBurned")).is_none());
        }
    }
}
