//! Index registry.
//!
//! The registry maps the fields of one entity type onto engine indexes. It
//! owns the [`IndexConfig`], resolves index types to handles (opening them
//! on first use) and turns field/value pairs into staged engine operations.
//!
//! # Invariants
//!
//! - A handle is held iff it was requested since the last full clear; no
//!   handle is opened eagerly
//! - At most one handle is held per index name
//! - Operations on fields that are not indexed return `Ok(false)` and open
//!   nothing
//! - A missing engine configuration fails handle creation; it is never
//!   defaulted

use crate::event::ChangeEvent;
use crate::config::{FieldKind, FieldSpec, IndexConfig};
use crate::engine::{IndexEngine, IndexHandle};
use crate::entity::EntityRef;
use crate::error::{CoreError, CoreResult};
use crate::query::{IndexQuery, Query, QueryBuilder, QueryOptions};
use crate::transaction::Transaction;
use crate::types::{EntityKind, IndexType};
use crate::value::{FieldValue, IndexValue, Scalar};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Registry of the indexes for one entity type.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use nodex_core::{
///     EntityKind, EntityRef, FieldSpec, IndexConfig, IndexRegistry, MemoryEngine, Query,
///     QueryOptions,
/// };
///
/// let config = IndexConfig::new(EntityKind::Node, "Person")
///     .field("name", FieldSpec::exact());
/// let registry = IndexRegistry::new(Arc::new(MemoryEngine::new()), config).unwrap();
///
/// let alice = EntityRef::new_node();
/// let mut txn = registry.begin();
/// assert!(registry.add(&mut txn, alice, "name", &"alice".into()).unwrap());
/// assert!(!registry.add(&mut txn, alice, "nickname", &"al".into()).unwrap());
/// txn.commit().unwrap();
///
/// let hits = registry
///     .query_scoped(Query::term("name", "alice"), QueryOptions::new(), |q| q.entities())
///     .unwrap();
/// assert_eq!(hits, vec![alice]);
/// ```
pub struct IndexRegistry {
    engine: Arc<dyn IndexEngine>,
    config: RwLock<IndexConfig>,
    handles: RwLock<HashMap<String, Arc<dyn IndexHandle>>>,
}

impl IndexRegistry {
    /// Creates a registry over an engine. No index is opened yet.
    pub fn new(engine: Arc<dyn IndexEngine>, config: IndexConfig) -> CoreResult<Self> {
        config.validate()?;
        debug!(
            base = config.base_name(),
            kind = %config.entity_kind(),
            "index registry created"
        );
        Ok(Self {
            engine,
            config: RwLock::new(config),
            handles: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the engine.
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn IndexEngine> {
        &self.engine
    }

    /// Returns a snapshot of the configuration.
    #[must_use]
    pub fn config(&self) -> IndexConfig {
        self.config.read().clone()
    }

    /// Returns the kind of entity indexed.
    #[must_use]
    pub fn entity_kind(&self) -> EntityKind {
        self.config.read().entity_kind()
    }

    /// Starts an engine transaction.
    #[must_use]
    pub fn begin(&self) -> Transaction {
        self.engine.begin()
    }

    /// Declares a field as indexed.
    pub fn index_field(&self, field: impl Into<String>, spec: FieldSpec) {
        let field = field.into();
        debug!(field = %field, index_type = %spec.index_type, "field indexed");
        self.config.write().declare(field, spec);
    }

    /// Returns true if the field is indexed.
    #[must_use]
    pub fn is_indexed(&self, field: &str) -> bool {
        self.config.read().is_indexed(field)
    }

    /// Returns the index type of an indexed field.
    #[must_use]
    pub fn index_type(&self, field: &str) -> Option<IndexType> {
        self.config.read().index_type(field)
    }

    /// Returns the indexed field names, sorted.
    #[must_use]
    pub fn fields(&self) -> Vec<String> {
        self.config.read().fields().map(str::to_string).collect()
    }

    /// Returns true if any field is declared on the index type.
    #[must_use]
    pub fn has_index_type(&self, index_type: IndexType) -> bool {
        self.config.read().has_index_type(index_type)
    }

    /// Returns the index name used for an index type.
    #[must_use]
    pub fn index_name(&self, index_type: IndexType) -> String {
        self.config.read().index_name_for_type(index_type)
    }

    /// Returns the names of the handles currently held, sorted.
    #[must_use]
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handles.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the handle for an index type, opening it on first use.
    pub fn index_for_type(&self, index_type: IndexType) -> CoreResult<Arc<dyn IndexHandle>> {
        let name = self.index_name(index_type);
        if let Some(handle) = self.handles.read().get(&name) {
            if !handle.is_deleted() {
                return Ok(Arc::clone(handle));
            }
        }

        let mut handles = self.handles.write();
        if let Some(handle) = handles.get(&name) {
            if !handle.is_deleted() {
                return Ok(Arc::clone(handle));
            }
            debug!(index = %name, "evicting deleted handle");
        }

        let handle = {
            let config = self.config.read();
            let settings = config.engine_settings(index_type)?;
            self.engine
                .open_or_create(config.entity_kind(), &name, settings)?
        };
        info!(index = %name, "index handle opened");
        handles.insert(name, Arc::clone(&handle));
        Ok(handle)
    }

    /// Stages `(field, value)` for the entity.
    ///
    /// Returns `Ok(false)` without opening an index if the field is not
    /// indexed. Sequences are added element-wise; numeric fields are wrapped
    /// for range queries.
    pub fn add(
        &self,
        txn: &mut Transaction,
        entity: EntityRef,
        field: &str,
        value: &FieldValue,
    ) -> CoreResult<bool> {
        let Some(spec) = self.config.read().field_spec(field) else {
            trace!(field, "add skipped, field not indexed");
            return Ok(false);
        };

        let values = value
            .scalars()
            .iter()
            .map(|scalar| IndexValue::wrap(field, spec.kind, scalar))
            .collect::<CoreResult<Vec<_>>>()?;
        let handle = self.index_for_type(spec.index_type)?;
        for value in values {
            txn.stage_add(&handle, entity, field, value)?;
        }
        Ok(true)
    }

    /// Stages removal of `(field, value)` for the entity.
    ///
    /// Values are wrapped the way [`add`](Self::add) wraps them and matched
    /// by canonical term, so `"7.0"` removes a stored `7`. A value a numeric
    /// field would reject is matched as raw text. Returns `Ok(false)` if the
    /// field is not indexed.
    pub fn remove(
        &self,
        txn: &mut Transaction,
        entity: EntityRef,
        field: &str,
        value: &FieldValue,
    ) -> CoreResult<bool> {
        let Some(spec) = self.config.read().field_spec(field) else {
            trace!(field, "remove skipped, field not indexed");
            return Ok(false);
        };

        let handle = self.index_for_type(spec.index_type)?;
        for scalar in value.scalars() {
            let value = IndexValue::wrap(field, spec.kind, scalar)
                .unwrap_or_else(|_| IndexValue::raw(scalar));
            txn.stage_remove(&handle, entity, field, value)?;
        }
        Ok(true)
    }

    /// Runs a query against the index chosen by `options`.
    ///
    /// The caller owns the returned query and must [`close`](IndexQuery::close)
    /// it (dropping also releases). Prefer [`query_scoped`](Self::query_scoped).
    pub fn query(&self, query: Query, options: QueryOptions) -> CoreResult<IndexQuery> {
        let handle = self.index_for_type(options.index_type)?;
        trace!(index = handle.name(), %query, wrapped = options.wrapped, "query");
        if options.wrapped {
            Ok(IndexQuery::Builder(QueryBuilder::new(handle, query)))
        } else {
            Ok(IndexQuery::Hits(handle.query(&query)?))
        }
    }

    /// Runs `f` with a query that is released when `f` returns, fails or
    /// panics.
    pub fn query_scoped<T, E, F>(&self, query: Query, options: QueryOptions, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut IndexQuery) -> Result<T, E>,
        E: From<CoreError>,
    {
        let mut scoped = self.query(query, options)?;
        let result = f(&mut scoped);
        scoped.close();
        result
    }

    /// Associates the entity with `(key, value)` unless another entity
    /// already holds the pair.
    ///
    /// Returns `Ok(None)` if the entity won; the add is staged in `txn`. Returns
    /// `Ok(Some(holder))` if the pair was taken. Concurrent callers for the
    /// same pair block until the winning transaction ends.
    pub fn put_if_absent(
        &self,
        txn: &mut Transaction,
        entity: EntityRef,
        key: &str,
        value: &Scalar,
        index_type: IndexType,
    ) -> CoreResult<Option<EntityRef>> {
        let kind = self
            .config
            .read()
            .field_spec(key)
            .map_or(FieldKind::Text, |spec| spec.kind);
        let value = IndexValue::wrap(key, kind, value)?;
        let handle = self.index_for_type(index_type)?;

        let outcome = handle.put_if_absent(txn, entity, key, &value)?;
        match outcome {
            None => debug!(index = handle.name(), key, %value, %entity, "put_if_absent won"),
            Some(holder) => {
                debug!(index = handle.name(), key, %value, %holder, "put_if_absent already held");
            }
        }
        Ok(outcome)
    }

    /// Detaches every field declaration. Indexes and their data stay.
    pub fn remove_index_config(&self) {
        let mut config = self.config.write();
        info!(base = config.base_name(), "index configuration removed");
        config.clear_fields();
    }

    /// Deletes the index of one type, or every held index when `None`.
    ///
    /// Deleted data is gone; the next request opens an empty index under the
    /// same name.
    pub fn remove_index_type(&self, index_type: Option<IndexType>) -> CoreResult<()> {
        match index_type {
            Some(index_type) => {
                let name = self.index_name(index_type);
                let held = self.handles.write().remove(&name);
                let handle = match held {
                    Some(handle) => Some(handle),
                    None if self.engine.exists(self.entity_kind(), &name) => {
                        let config = self.config.read();
                        let settings = config.engine_settings(index_type)?;
                        Some(self.engine.open_or_create(
                            config.entity_kind(),
                            &name,
                            settings,
                        )?)
                    }
                    None => None,
                };
                if let Some(handle) = handle {
                    handle.delete()?;
                    info!(index = %name, "index removed");
                }
            }
            None => {
                let drained: Vec<_> = self.handles.write().drain().collect();
                for (name, handle) in drained {
                    handle.delete()?;
                    info!(index = %name, "index removed");
                }
            }
        }
        Ok(())
    }

    /// Releases every held handle without deleting data.
    pub fn on_shutdown(&self) {
        let mut handles = self.handles.write();
        info!(released = handles.len(), "releasing index handles");
        handles.clear();
    }

    /// Reindexes a property change: removes `old` if present, then adds
    /// `new` if present.
    ///
    /// Returns `Ok(false)` if the field is not indexed.
    pub fn update_index_on(
        &self,
        txn: &mut Transaction,
        entity: EntityRef,
        field: &str,
        old: Option<&FieldValue>,
        new: Option<&FieldValue>,
    ) -> CoreResult<bool> {
        if !self.is_indexed(field) {
            return Ok(false);
        }
        if let Some(old) = old {
            self.remove(txn, entity, field, old)?;
        }
        if let Some(new) = new {
            self.add(txn, entity, field, new)?;
        }
        Ok(true)
    }

    /// Removes every indexed property of a deleted entity.
    ///
    /// Returns the number of fields removed.
    pub fn remove_index_on(
        &self,
        txn: &mut Transaction,
        entity: EntityRef,
        old_props: &HashMap<String, FieldValue>,
    ) -> CoreResult<usize> {
        let mut removed = 0;
        for field in self.fields() {
            if let Some(value) = old_props.get(&field) {
                if self.remove(txn, entity, &field, value)? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// Applies a change event. Returns whether any index was touched.
    pub fn apply_event(&self, txn: &mut Transaction, event: &ChangeEvent) -> CoreResult<bool> {
        match event {
            ChangeEvent::PropertyChanged {
                entity,
                field,
                old,
                new,
            } => self.update_index_on(txn, *entity, field, old.as_ref(), new.as_ref()),
            ChangeEvent::EntityDeleted { entity, properties } => {
                Ok(self.remove_index_on(txn, *entity, properties)? > 0)
            }
        }
    }
}

impl fmt::Debug for IndexRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handles = self.index_names();
        f.debug_struct("IndexRegistry")
            .field("config", &*self.config.read())
            .field("handles", &handles)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for IndexRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.index_names();
        {
            let config = self.config.read();
            write!(
                f,
                "{} {} ({} fields",
                config.entity_kind(),
                config.base_name(),
                config.fields().count()
            )?;
        }
        if names.is_empty() {
            write!(f, ", no open indexes)")
        } else {
            write!(f, ", open: {})", names.join(", "))
        }
    }
}
