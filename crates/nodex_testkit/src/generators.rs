//! Property-based test generators using proptest.
//!
//! Provides strategies for generating entities, property values and
//! sequences of index operations.

use nodex_core::{EntityId, EntityRef, FieldValue, Scalar};
use proptest::prelude::*;

/// Strategy for generating entity IDs.
pub fn entity_id_strategy() -> impl Strategy<Value = EntityId> {
    prop::array::uniform16(any::<u8>()).prop_map(EntityId::from_bytes)
}

/// Strategy for generating node references.
pub fn node_strategy() -> impl Strategy<Value = EntityRef> {
    entity_id_strategy().prop_map(EntityRef::node)
}

/// Strategy for generating field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating lowercase words.
pub fn word_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,10}").expect("Invalid regex")
}

/// Strategy for generating short sentences of lowercase words.
pub fn sentence_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(word_strategy(), 1..6).prop_map(|words| words.join(" "))
}

/// Strategy for generating finite numbers in a bounded range.
pub fn number_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        (-1_000_000i64..1_000_000).prop_map(|i| i as f64),
        -1.0e6f64..1.0e6,
    ]
}

/// Strategy for generating scalars of every kind.
pub fn scalar_strategy() -> impl Strategy<Value = Scalar> {
    prop_oneof![
        any::<i64>().prop_map(Scalar::Int),
        number_strategy().prop_map(Scalar::Float),
        any::<bool>().prop_map(Scalar::Bool),
        word_strategy().prop_map(Scalar::Text),
    ]
}

/// Strategy for generating single or sequence field values.
pub fn field_value_strategy() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        3 => scalar_strategy().prop_map(FieldValue::Scalar),
        1 => prop::collection::vec(scalar_strategy(), 0..5).prop_map(FieldValue::Sequence),
    ]
}

/// One step of a generated indexing workload.
#[derive(Debug, Clone)]
pub enum IndexOp {
    /// Add `value` for the entity in `slot`.
    Add {
        /// Entity slot.
        slot: usize,
        /// Term value.
        value: String,
    },
    /// Remove `value` for the entity in `slot`.
    Remove {
        /// Entity slot.
        slot: usize,
        /// Term value.
        value: String,
    },
}

/// Strategy for generating add/remove workloads over `slots` entities.
///
/// Values come from a small vocabulary so adds and removes collide.
pub fn index_ops_strategy(slots: usize, max_len: usize) -> impl Strategy<Value = Vec<IndexOp>> {
    let value = prop::sample::select(vec!["red", "green", "blue", "cyan"]).prop_map(String::from);
    let op = (0..slots, value, any::<bool>()).prop_map(|(slot, value, add)| {
        if add {
            IndexOp::Add { slot, value }
        } else {
            IndexOp::Remove { slot, value }
        }
    });
    prop::collection::vec(op, 0..max_len)
}
