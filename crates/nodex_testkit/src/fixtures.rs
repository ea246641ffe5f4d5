//! Test fixtures and registry helpers.
//!
//! Provides ready-made configurations and registries over a
//! [`MemoryEngine`], plus shortcuts for committing fields and collecting
//! query results.

use nodex_core::{
    ChangeEvent, EntityKind, EntityRef, FieldSpec, FieldValue, IndexConfig, IndexEngine,
    IndexRegistry, IndexType, MemoryEngine, Query, QueryOptions,
};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Node configuration with exact, numeric, fulltext and sequence fields.
///
/// | field   | index    | kind    |
/// |---------|----------|---------|
/// | `name`  | exact    | text    |
/// | `email` | exact    | text    |
/// | `age`   | exact    | numeric |
/// | `tags`  | exact    | text    |
/// | `bio`   | fulltext | text    |
pub fn person_config() -> IndexConfig {
    IndexConfig::new(EntityKind::Node, "Person")
        .field("name", FieldSpec::exact())
        .field("email", FieldSpec::exact())
        .field("age", FieldSpec::numeric())
        .field("tags", FieldSpec::exact())
        .field("bio", FieldSpec::fulltext())
}

/// Relationship configuration.
pub fn knows_config() -> IndexConfig {
    IndexConfig::new(EntityKind::Relationship, "Knows")
        .field("since", FieldSpec::numeric())
        .field("note", FieldSpec::fulltext())
}

/// A registry with the engine it runs on.
pub struct TestRegistry {
    /// The registry.
    pub registry: IndexRegistry,
    /// The engine, shared with the registry.
    pub engine: Arc<MemoryEngine>,
}

impl TestRegistry {
    /// Creates a registry for [`person_config`].
    pub fn memory() -> Self {
        Self::with_config(person_config())
    }

    /// Creates a registry for a configuration on a fresh engine.
    pub fn with_config(config: IndexConfig) -> Self {
        Self::on_engine(Arc::new(MemoryEngine::new()), config)
    }

    /// Creates a registry on an existing engine.
    pub fn on_engine(engine: Arc<MemoryEngine>, config: IndexConfig) -> Self {
        let shared: Arc<dyn IndexEngine> = engine.clone();
        let registry = IndexRegistry::new(shared, config).expect("Failed to create registry");
        Self { registry, engine }
    }
}

impl std::ops::Deref for TestRegistry {
    type Target = IndexRegistry;

    fn deref(&self) -> &Self::Target {
        &self.registry
    }
}

/// Runs a test with a fresh person registry.
pub fn with_registry<F, R>(f: F) -> R
where
    F: FnOnce(&IndexRegistry) -> R,
{
    let test = TestRegistry::memory();
    f(&test.registry)
}

/// Adds the given fields for an entity in one committed transaction.
pub fn commit_fields(registry: &IndexRegistry, entity: EntityRef, fields: &[(&str, FieldValue)]) {
    let mut txn = registry.begin();
    for (field, value) in fields {
        registry
            .add(&mut txn, entity, field, value)
            .expect("Failed to stage add");
    }
    txn.commit().expect("Failed to commit");
}

/// Applies events, one committed transaction each.
pub fn apply_events(registry: &IndexRegistry, events: &[ChangeEvent]) {
    for event in events {
        let mut txn = registry.begin();
        registry
            .apply_event(&mut txn, event)
            .expect("Failed to apply event");
        txn.commit().expect("Failed to commit");
    }
}

/// Runs a scoped query and returns the matched entities.
pub fn entities(registry: &IndexRegistry, query: Query, index_type: IndexType) -> Vec<EntityRef> {
    registry
        .query_scoped(query, QueryOptions::new().index_type(index_type), |q| {
            q.entities()
        })
        .expect("Query failed")
}

/// Writes a configuration to a temporary JSON file.
pub fn config_file(config: &IndexConfig) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    let json = config.to_json_string().expect("Failed to serialize config");
    file.write_all(json.as_bytes())
        .expect("Failed to write config");
    file
}

/// Renders events as JSON lines.
pub fn events_jsonl(events: &[ChangeEvent]) -> String {
    events
        .iter()
        .map(|e| serde_json::to_string(e).expect("Failed to serialize event"))
        .collect::<Vec<_>>()
        .join("\n")
}
