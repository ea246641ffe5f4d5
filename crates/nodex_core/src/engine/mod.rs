//! Index engine contract.
//!
//! The registry never stores index data itself. It talks to an
//! [`IndexEngine`], which opens named [`IndexHandle`]s. An engine must
//! provide:
//!
//! - commit-time visibility: operations staged in a [`Transaction`] are
//!   applied to the handle only when the transaction commits
//! - exactly-one-writer `put_if_absent` per (handle, key, value), blocking
//!   concurrent callers until the first claimant commits or rolls back
//! - idempotent `open_or_create` for a given (kind, name)
//!
//! [`MemoryEngine`] is the in-process reference engine.

mod analyzer;
mod claims;
mod memory;
mod postings;

pub use analyzer::{Analyzer, TokenizerConfig};
pub use claims::{ClaimGuard, ClaimKey, ClaimTable};
pub use memory::{MemoryEngine, MemoryHandle};

use crate::config::EngineSettings;
use crate::entity::EntityRef;
use crate::error::{CoreError, CoreResult};
use crate::query::{Hits, Query};
use crate::transaction::Transaction;
use crate::types::EntityKind;
use crate::value::IndexValue;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The embedded index backend.
pub trait IndexEngine: Send + Sync {
    /// Opens the index `name` for entities of `kind`, creating it if needed.
    ///
    /// Data written to an index survives dropping every handle to it; only
    /// [`IndexHandle::delete`] removes it.
    fn open_or_create(
        &self,
        kind: EntityKind,
        name: &str,
        settings: &EngineSettings,
    ) -> CoreResult<Arc<dyn IndexHandle>>;

    /// Returns true if the engine holds data for the index.
    fn exists(&self, kind: EntityKind, name: &str) -> bool;

    /// Starts a new transaction.
    fn begin(&self) -> Transaction;
}

/// One named, queryable index opened by an engine.
pub trait IndexHandle: Send + Sync + fmt::Debug {
    /// Returns the index name.
    fn name(&self) -> &str;

    /// Returns the kind of entity this index holds.
    fn entity_kind(&self) -> EntityKind;

    /// Returns the settings the index was created with.
    fn settings(&self) -> &EngineSettings;

    /// Checks that an operation on the entity's `field` would be accepted,
    /// without applying it.
    ///
    /// Staging and commit call this for every operation before any is
    /// applied.
    fn check(&self, entity: EntityRef, _field: &str) -> CoreResult<()> {
        if self.is_deleted() {
            return Err(CoreError::index_deleted(self.name()));
        }
        if entity.kind != self.entity_kind() {
            return Err(CoreError::EntityKindMismatch {
                index: self.name().to_string(),
                expected: self.entity_kind().to_string(),
                actual: entity.kind.to_string(),
            });
        }
        Ok(())
    }

    /// Associates `value` under `field` with the entity, immediately.
    ///
    /// Callers normally go through [`Transaction::stage_add`], which invokes
    /// this at commit.
    fn add(&self, entity: EntityRef, field: &str, value: &IndexValue) -> CoreResult<()>;

    /// Removes the association matching `value`'s term, immediately.
    ///
    /// Returns whether anything was removed.
    fn remove(&self, entity: EntityRef, field: &str, value: &IndexValue) -> CoreResult<bool>;

    /// Runs a query against committed data.
    fn query(&self, query: &Query) -> CoreResult<Hits>;

    /// Returns the committed values stored for an entity's field.
    fn field_values(&self, entity: EntityRef, field: &str) -> Vec<IndexValue>;

    /// Associates `entity` with (key, value) unless another entity already
    /// holds the pair.
    ///
    /// Returns `None` if `entity` won; the add is staged in `txn`, and
    /// concurrent callers for the same pair block until `txn` ends. Returns
    /// `Some(holder)` if the pair is already held, by a committed entity or
    /// by an earlier call in the same transaction. The holder may be
    /// `entity` itself.
    fn put_if_absent(
        &self,
        txn: &mut Transaction,
        entity: EntityRef,
        key: &str,
        value: &IndexValue,
    ) -> CoreResult<Option<EntityRef>>;

    /// Deletes the index and all its data. Irreversible.
    fn delete(&self) -> CoreResult<()>;

    /// Returns true once the index has been deleted.
    fn is_deleted(&self) -> bool;

    /// Returns the number of stored (entity, field, value) associations.
    fn len(&self) -> usize;

    /// Returns true if the index holds no associations.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Opens a cursor lease counted by [`open_cursors`](Self::open_cursors).
    fn open_cursor(&self) -> CursorLease;

    /// Returns the number of cursors currently open on this index.
    fn open_cursors(&self) -> usize;
}

/// Accounting token for an open cursor.
///
/// The handle's open cursor count is incremented on creation and
/// decremented exactly once, on [`release`](Self::release) or drop.
#[derive(Debug)]
pub struct CursorLease {
    counter: Arc<AtomicUsize>,
    released: bool,
}

impl CursorLease {
    /// Opens a lease against a counter.
    #[must_use]
    pub fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self {
            counter: Arc::clone(counter),
            released: false,
        }
    }

    /// Releases the lease. Idempotent.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.counter.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Returns true once released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for CursorLease {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_counts_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut a = CursorLease::acquire(&counter);
        let b = CursorLease::acquire(&counter);
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        a.release();
        a.release();
        assert!(a.is_released());
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        drop(b);
        drop(a);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
