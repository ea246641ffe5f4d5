//! In-process index engine.

use super::claims::{ClaimKey, ClaimTable};
use super::postings::IndexStore;
use super::{CursorLease, IndexEngine, IndexHandle};
use crate::config::EngineSettings;
use crate::entity::EntityRef;
use crate::error::{CoreError, CoreResult};
use crate::query::{Hits, Query};
use crate::transaction::Transaction;
use crate::types::{EntityKind, TransactionId};
use crate::value::IndexValue;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

#[derive(Debug)]
struct StoreEntry {
    data: RwLock<IndexStore>,
    deleted: AtomicBool,
}

type Catalog = Mutex<HashMap<(EntityKind, String), Arc<StoreEntry>>>;

/// Engine keeping every index in memory.
///
/// Index data lives in the engine, not in handles: dropping every handle
/// and reopening the same name sees the same data.
#[derive(Debug)]
pub struct MemoryEngine {
    catalog: Arc<Catalog>,
    claims: Arc<ClaimTable>,
    next_txid: AtomicU64,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(Mutex::new(HashMap::new())),
            claims: Arc::new(ClaimTable::new()),
            next_txid: AtomicU64::new(1),
        }
    }

    /// Returns the number of indexes holding data.
    #[must_use]
    pub fn index_count(&self) -> usize {
        self.catalog.lock().len()
    }

    /// Returns the names of all indexes, sorted.
    #[must_use]
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .catalog
            .lock()
            .keys()
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Returns the put-if-absent claim table.
    #[must_use]
    pub fn claims(&self) -> &Arc<ClaimTable> {
        &self.claims
    }
}

impl IndexEngine for MemoryEngine {
    fn open_or_create(
        &self,
        kind: EntityKind,
        name: &str,
        settings: &EngineSettings,
    ) -> CoreResult<Arc<dyn IndexHandle>> {
        let entry = {
            let mut catalog = self.catalog.lock();
            let entry = catalog.entry((kind, name.to_string())).or_insert_with(|| {
                info!(index = name, %kind, "creating index");
                Arc::new(StoreEntry {
                    data: RwLock::new(IndexStore::new(settings.clone())),
                    deleted: AtomicBool::new(false),
                })
            });
            Arc::clone(entry)
        };

        debug!(index = name, %kind, "opened index handle");
        let settings = entry.data.read().settings().clone();
        let handle: Arc<MemoryHandle> = Arc::new_cyclic(|this| MemoryHandle {
            this: this.clone(),
            name: name.to_string(),
            kind,
            settings,
            entry,
            catalog: Arc::clone(&self.catalog),
            claims: Arc::clone(&self.claims),
            cursors: Arc::new(AtomicUsize::new(0)),
        });
        Ok(handle as Arc<dyn IndexHandle>)
    }

    fn exists(&self, kind: EntityKind, name: &str) -> bool {
        self.catalog.lock().contains_key(&(kind, name.to_string()))
    }

    fn begin(&self) -> Transaction {
        Transaction::new(TransactionId::new(
            self.next_txid.fetch_add(1, Ordering::SeqCst),
        ))
    }
}

/// Handle to one index of a [`MemoryEngine`].
pub struct MemoryHandle {
    this: Weak<MemoryHandle>,
    name: String,
    kind: EntityKind,
    settings: EngineSettings,
    entry: Arc<StoreEntry>,
    catalog: Arc<Catalog>,
    claims: Arc<ClaimTable>,
    cursors: Arc<AtomicUsize>,
}

impl fmt::Debug for MemoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHandle")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("deleted", &self.is_deleted())
            .field("open_cursors", &self.open_cursors())
            .finish_non_exhaustive()
    }
}

impl MemoryHandle {
    fn ensure_live(&self) -> CoreResult<()> {
        if self.is_deleted() {
            Err(CoreError::index_deleted(&self.name))
        } else {
            Ok(())
        }
    }
}

impl IndexHandle for MemoryHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn entity_kind(&self) -> EntityKind {
        self.kind
    }

    fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn add(&self, entity: EntityRef, field: &str, value: &IndexValue) -> CoreResult<()> {
        self.check(entity, field)?;
        self.entry.data.write().add(entity, field, value);
        Ok(())
    }

    fn remove(&self, entity: EntityRef, field: &str, value: &IndexValue) -> CoreResult<bool> {
        self.check(entity, field)?;
        Ok(self.entry.data.write().remove(entity, field, value))
    }

    fn query(&self, query: &Query) -> CoreResult<Hits> {
        self.ensure_live()?;
        let mut entities: Vec<EntityRef> =
            self.entry.data.read().evaluate(query).into_iter().collect();
        entities.sort_unstable();
        Ok(Hits::new(&self.name, entities, self.open_cursor()))
    }

    fn field_values(&self, entity: EntityRef, field: &str) -> Vec<IndexValue> {
        self.entry.data.read().field_values(entity, field)
    }

    fn put_if_absent(
        &self,
        txn: &mut Transaction,
        entity: EntityRef,
        key: &str,
        value: &IndexValue,
    ) -> CoreResult<Option<EntityRef>> {
        txn.ensure_active()?;
        self.check(entity, key)?;

        let claim = ClaimKey::new(&self.name, key, value.term());
        if txn.holds_claim(&claim) {
            if let Some(staged) = txn.staged_add_for(&self.name, key, &claim.term) {
                return Ok(Some(staged));
            }
        }

        // Blocks while another transaction holds the pair.
        let guard = self.claims.acquire(claim, txn.id());

        if let Some(existing) = self.entry.data.read().first_holder(key, value) {
            debug!(index = %self.name, key, %existing, "put_if_absent found existing entity");
            return Ok(Some(existing));
        }

        let this: Arc<dyn IndexHandle> = self
            .this
            .upgrade()
            .ok_or_else(|| CoreError::index_deleted(&self.name))?;
        txn.stage_add(&this, entity, key, value.clone())?;
        txn.hold_claim(guard);
        debug!(index = %self.name, key, %entity, txid = %txn.id(), "put_if_absent claimed");
        Ok(None)
    }

    fn delete(&self) -> CoreResult<()> {
        if self.entry.deleted.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.entry.data.write().clear();

        let mut catalog = self.catalog.lock();
        let key = (self.kind, self.name.clone());
        if catalog
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current, &self.entry))
        {
            catalog.remove(&key);
        }
        info!(index = %self.name, "deleted index");
        Ok(())
    }

    fn is_deleted(&self) -> bool {
        self.entry.deleted.load(Ordering::SeqCst)
    }

    fn len(&self) -> usize {
        self.entry.data.read().len()
    }

    fn open_cursor(&self) -> CursorLease {
        CursorLease::acquire(&self.cursors)
    }

    fn open_cursors(&self) -> usize {
        self.cursors.load(Ordering::SeqCst)
    }
}
