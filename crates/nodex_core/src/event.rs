//! Property change events.
//!
//! The graph store reports committed property changes and entity deletions
//! as [`ChangeEvent`]s. The registry consumes them through
//! [`IndexRegistry::apply_event`](crate::IndexRegistry::apply_event) to keep
//! indexes in step with entity properties.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use nodex_core::{
//!     ChangeEvent, EntityKind, EntityRef, FieldSpec, IndexConfig, IndexRegistry, MemoryEngine,
//! };
//!
//! let config = IndexConfig::new(EntityKind::Node, "Person").field("name", FieldSpec::exact());
//! let registry = IndexRegistry::new(Arc::new(MemoryEngine::new()), config).unwrap();
//!
//! let person = EntityRef::new_node();
//! let mut txn = registry.begin();
//! assert!(registry.apply_event(&mut txn, &ChangeEvent::set(person, "name", "alice")).unwrap());
//! assert!(!registry.apply_event(&mut txn, &ChangeEvent::set(person, "shoe", 42)).unwrap());
//! txn.commit().unwrap();
//! ```

use crate::entity::EntityRef;
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A committed change to an entity's properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A property was set, changed or removed.
    PropertyChanged {
        /// The entity.
        entity: EntityRef,
        /// Property name.
        field: String,
        /// Value before the change, if the property existed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old: Option<FieldValue>,
        /// Value after the change, if the property still exists.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new: Option<FieldValue>,
    },
    /// An entity was deleted.
    EntityDeleted {
        /// The entity.
        entity: EntityRef,
        /// Property values at the time of deletion.
        #[serde(default)]
        properties: HashMap<String, FieldValue>,
    },
}

impl ChangeEvent {
    /// A property set for the first time.
    pub fn set(entity: EntityRef, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        ChangeEvent::PropertyChanged {
            entity,
            field: field.into(),
            old: None,
            new: Some(value.into()),
        }
    }

    /// A property changed from `old` to `new`.
    pub fn changed(
        entity: EntityRef,
        field: impl Into<String>,
        old: impl Into<FieldValue>,
        new: impl Into<FieldValue>,
    ) -> Self {
        ChangeEvent::PropertyChanged {
            entity,
            field: field.into(),
            old: Some(old.into()),
            new: Some(new.into()),
        }
    }

    /// A property removed.
    pub fn unset(entity: EntityRef, field: impl Into<String>, old: impl Into<FieldValue>) -> Self {
        ChangeEvent::PropertyChanged {
            entity,
            field: field.into(),
            old: Some(old.into()),
            new: None,
        }
    }

    /// An entity deleted with its last known properties.
    pub fn deleted(entity: EntityRef, properties: HashMap<String, FieldValue>) -> Self {
        ChangeEvent::EntityDeleted { entity, properties }
    }

    /// Returns the affected entity.
    #[must_use]
    pub fn entity(&self) -> EntityRef {
        match self {
            ChangeEvent::PropertyChanged { entity, .. } | ChangeEvent::EntityDeleted { entity, .. } => {
                *entity
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Scalar;

    #[test]
    fn json_shape() {
        let entity = EntityRef::node(crate::EntityId::from_u128(1));
        let json = format!(
            r#"{{"type":"property_changed","entity":{{"kind":"node","id":"{}"}},"field":"tags","new":["a","b"]}}"#,
            entity.id
        );
        let event: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(
            event,
            ChangeEvent::set(
                entity,
                "tags",
                FieldValue::Sequence(vec![Scalar::from("a"), Scalar::from("b")])
            )
        );

        let deleted = ChangeEvent::deleted(entity, HashMap::from([("age".to_string(), 30.into())]));
        let back: ChangeEvent =
            serde_json::from_str(&serde_json::to_string(&deleted).unwrap()).unwrap();
        assert_eq!(back, deleted);
    }

    #[test]
    fn constructors_set_old_and_new() {
        let entity = EntityRef::new_node();
        match ChangeEvent::unset(entity, "name", "alice") {
            ChangeEvent::PropertyChanged { old, new, .. } => {
                assert_eq!(old, Some(FieldValue::from("alice")));
                assert_eq!(new, None);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(ChangeEvent::changed(entity, "age", 1, 2).entity(), entity);
    }
}
