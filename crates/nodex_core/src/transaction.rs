//! Index transactions.
//!
//! A transaction buffers index mutations and put-if-absent claims. Nothing
//! staged is visible to queries until [`Transaction::commit`], which applies
//! the operations in staging order and then releases the claims. Dropping an
//! active transaction rolls it back.

use crate::engine::{ClaimGuard, ClaimKey, IndexHandle};
use crate::entity::EntityRef;
use crate::error::{CoreError, CoreResult};
use crate::types::TransactionId;
use crate::value::IndexValue;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can stage operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Add,
    Remove,
}

struct StagedOp {
    kind: OpKind,
    handle: Arc<dyn IndexHandle>,
    entity: EntityRef,
    field: String,
    value: IndexValue,
}

impl fmt::Debug for StagedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedOp")
            .field("kind", &self.kind)
            .field("index", &self.handle.name())
            .field("entity", &self.entity)
            .field("field", &self.field)
            .field("value", &self.value)
            .finish()
    }
}

/// A unit of index work.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    ops: Vec<StagedOp>,
    /// Released after the staged operations are applied or discarded.
    claims: Vec<ClaimGuard>,
}

impl Transaction {
    /// Creates an active transaction. Engines call this from `begin`.
    #[must_use]
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            ops: Vec::new(),
            claims: Vec::new(),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Fails unless the transaction is active.
    pub fn ensure_active(&self) -> CoreResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(CoreError::TransactionNotActive {
                txid: self.id.as_u64(),
            })
        }
    }

    /// Stages an add, applied to `handle` at commit.
    pub fn stage_add(
        &mut self,
        handle: &Arc<dyn IndexHandle>,
        entity: EntityRef,
        field: &str,
        value: IndexValue,
    ) -> CoreResult<()> {
        self.stage(OpKind::Add, handle, entity, field, value)
    }

    /// Stages a remove, applied to `handle` at commit.
    pub fn stage_remove(
        &mut self,
        handle: &Arc<dyn IndexHandle>,
        entity: EntityRef,
        field: &str,
        value: IndexValue,
    ) -> CoreResult<()> {
        self.stage(OpKind::Remove, handle, entity, field, value)
    }

    fn stage(
        &mut self,
        kind: OpKind,
        handle: &Arc<dyn IndexHandle>,
        entity: EntityRef,
        field: &str,
        value: IndexValue,
    ) -> CoreResult<()> {
        self.ensure_active()?;
        handle.check(entity, field)?;
        self.ops.push(StagedOp {
            kind,
            handle: Arc::clone(handle),
            entity,
            field: field.to_string(),
            value,
        });
        Ok(())
    }

    /// Returns the number of staged operations.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.ops.len()
    }

    /// Returns the entity whose add of (field, term) is staged on `index`,
    /// unless a later staged remove cancelled it.
    #[must_use]
    pub fn staged_add_for(&self, index: &str, field: &str, term: &str) -> Option<EntityRef> {
        let mut found = None;
        for op in &self.ops {
            if op.handle.name() != index || op.field != field || op.value.term() != term {
                continue;
            }
            match op.kind {
                OpKind::Add => found = Some(op.entity),
                OpKind::Remove if found == Some(op.entity) => found = None,
                OpKind::Remove => {}
            }
        }
        found
    }

    /// Returns true if this transaction holds the claim.
    #[must_use]
    pub fn holds_claim(&self, key: &ClaimKey) -> bool {
        self.claims.iter().any(|guard| guard.key() == key)
    }

    /// Keeps a claim until the transaction ends.
    pub fn hold_claim(&mut self, guard: ClaimGuard) {
        self.claims.push(guard);
    }

    /// Returns the number of claims held.
    #[must_use]
    pub fn claim_count(&self) -> usize {
        self.claims.len()
    }

    /// Applies every staged operation, then releases claims.
    ///
    /// Every operation is checked before any is applied. Operations whose
    /// index was deleted after staging are skipped; any other failed check
    /// rolls the transaction back and applies nothing. An engine error while
    /// applying stops the commit with earlier operations already applied.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.ensure_active()?;
        let ops = std::mem::take(&mut self.ops);
        debug!(txid = %self.id, ops = ops.len(), "committing index transaction");

        let mut checked = Vec::with_capacity(ops.len());
        for op in ops {
            match op.handle.check(op.entity, &op.field) {
                Ok(()) => checked.push(op),
                Err(CoreError::IndexDeleted { name }) => {
                    warn!(txid = %self.id, index = %name, field = %op.field, "index deleted before commit, skipping");
                }
                Err(err) => {
                    warn!(txid = %self.id, index = op.handle.name(), error = %err, "commit check failed, rolling back");
                    self.state = TransactionState::Aborted;
                    self.claims.clear();
                    return Err(err);
                }
            }
        }

        let mut result = Ok(());
        for op in checked {
            let applied = match op.kind {
                OpKind::Add => op.handle.add(op.entity, &op.field, &op.value),
                OpKind::Remove => op.handle.remove(op.entity, &op.field, &op.value).map(|_| ()),
            };
            match applied {
                Ok(()) => {}
                Err(CoreError::IndexDeleted { name }) => {
                    warn!(txid = %self.id, index = %name, field = %op.field, "index deleted before commit, skipping");
                }
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }

        self.state = TransactionState::Committed;
        self.claims.clear();
        result
    }

    /// Discards staged operations and releases claims.
    pub fn rollback(&mut self) -> CoreResult<()> {
        self.ensure_active()?;
        debug!(txid = %self.id, ops = self.ops.len(), "rolling back index transaction");
        self.ops.clear();
        self.state = TransactionState::Aborted;
        self.claims.clear();
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_active() {
            let _ = self.rollback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;
    use crate::engine::{CursorLease, IndexEngine, MemoryEngine};
    use crate::query::{Hits, Query};
    use crate::types::EntityKind;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

    fn setup() -> (MemoryEngine, Arc<dyn IndexHandle>) {
        let engine = MemoryEngine::new();
        let handle = engine
            .open_or_create(EntityKind::Node, "Person_exact", &EngineSettings::exact())
            .unwrap();
        (engine, handle)
    }

    fn text(s: &str) -> IndexValue {
        IndexValue::Text(s.to_string())
    }

    #[test]
    fn new_transaction_is_active() {
        let (engine, _) = setup();
        let txn = engine.begin();
        assert!(txn.is_active());
        assert_eq!(txn.state(), TransactionState::Active);
    }

    #[test]
    fn staged_ops_visible_after_commit() {
        let (engine, handle) = setup();
        let alice = EntityRef::new_node();

        let mut txn = engine.begin();
        txn.stage_add(&handle, alice, "name", text("alice")).unwrap();
        assert_eq!(txn.pending_len(), 1);
        assert!(handle.query(&Query::term("name", "alice")).unwrap().is_empty());

        txn.commit().unwrap();
        assert_eq!(txn.state(), TransactionState::Committed);
        assert_eq!(
            handle.query(&Query::term("name", "alice")).unwrap().first(),
            Some(alice)
        );
    }

    #[test]
    fn drop_rolls_back() {
        let (engine, handle) = setup();
        {
            let mut txn = engine.begin();
            txn.stage_add(&handle, EntityRef::new_node(), "name", text("x"))
                .unwrap();
        }
        assert!(handle.is_empty());
    }

    #[test]
    fn finished_transaction_rejects_work() {
        let (engine, handle) = setup();
        let mut txn = engine.begin();
        txn.rollback().unwrap();
        assert_eq!(txn.state(), TransactionState::Aborted);

        let err = txn
            .stage_add(&handle, EntityRef::new_node(), "name", text("x"))
            .unwrap_err();
        assert!(matches!(err, CoreError::TransactionNotActive { .. }));
        assert!(txn.commit().is_err());
    }

    #[test]
    fn kind_mismatch_is_rejected_at_staging() {
        let (engine, handle) = setup();
        let mut txn = engine.begin();
        let err = txn
            .stage_add(&handle, EntityRef::new_relationship(), "name", text("x"))
            .unwrap_err();
        assert!(matches!(err, CoreError::EntityKindMismatch { .. }));
    }

    #[test]
    fn remove_then_add_applies_in_order() {
        let (engine, handle) = setup();
        let e = EntityRef::new_node();
        handle.add(e, "name", &text("old")).unwrap();

        let mut txn = engine.begin();
        txn.stage_remove(&handle, e, "name", text("old")).unwrap();
        txn.stage_add(&handle, e, "name", text("new")).unwrap();
        txn.commit().unwrap();

        assert!(handle.query(&Query::term("name", "old")).unwrap().is_empty());
        assert_eq!(handle.field_values(e, "name"), vec![text("new")]);
    }

    #[test]
    fn deleted_index_is_skipped_at_commit() {
        let (engine, handle) = setup();
        let mut txn = engine.begin();
        txn.stage_add(&handle, EntityRef::new_node(), "name", text("x"))
            .unwrap();
        handle.delete().unwrap();
        txn.commit().unwrap();
        assert!(handle.is_deleted());
    }

    /// Wraps a handle and rejects one field once `reject` is set.
    #[derive(Debug)]
    struct RejectingHandle {
        inner: Arc<dyn IndexHandle>,
        field: &'static str,
        reject: AtomicBool,
    }

    impl IndexHandle for RejectingHandle {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn entity_kind(&self) -> EntityKind {
            self.inner.entity_kind()
        }

        fn settings(&self) -> &EngineSettings {
            self.inner.settings()
        }

        fn check(&self, entity: EntityRef, field: &str) -> CoreResult<()> {
            if field == self.field && self.reject.load(AtomicOrdering::SeqCst) {
                return Err(CoreError::invalid_value(field, "rejected by engine"));
            }
            self.inner.check(entity, field)
        }

        fn add(&self, entity: EntityRef, field: &str, value: &IndexValue) -> CoreResult<()> {
            self.inner.add(entity, field, value)
        }

        fn remove(&self, entity: EntityRef, field: &str, value: &IndexValue) -> CoreResult<bool> {
            self.inner.remove(entity, field, value)
        }

        fn query(&self, query: &Query) -> CoreResult<Hits> {
            self.inner.query(query)
        }

        fn field_values(&self, entity: EntityRef, field: &str) -> Vec<IndexValue> {
            self.inner.field_values(entity, field)
        }

        fn put_if_absent(
            &self,
            txn: &mut Transaction,
            entity: EntityRef,
            key: &str,
            value: &IndexValue,
        ) -> CoreResult<Option<EntityRef>> {
            self.inner.put_if_absent(txn, entity, key, value)
        }

        fn delete(&self) -> CoreResult<()> {
            self.inner.delete()
        }

        fn is_deleted(&self) -> bool {
            self.inner.is_deleted()
        }

        fn len(&self) -> usize {
            self.inner.len()
        }

        fn open_cursor(&self) -> CursorLease {
            self.inner.open_cursor()
        }

        fn open_cursors(&self) -> usize {
            self.inner.open_cursors()
        }
    }

    #[test]
    fn failed_check_applies_nothing() {
        let (engine, handle) = setup();
        let rejecting = Arc::new(RejectingHandle {
            inner: Arc::clone(&handle),
            field: "email",
            reject: AtomicBool::new(false),
        });
        let staged: Arc<dyn IndexHandle> = rejecting.clone();
        let e = EntityRef::new_node();

        let mut txn = engine.begin();
        txn.stage_add(&handle, e, "name", text("alice")).unwrap();
        txn.stage_add(&staged, e, "email", text("a@x")).unwrap();
        let guard = engine
            .claims()
            .acquire(ClaimKey::new("Person_exact", "email", "a@x"), txn.id());
        txn.hold_claim(guard);

        rejecting.reject.store(true, AtomicOrdering::SeqCst);
        let err = txn.commit().unwrap_err();

        assert!(matches!(err, CoreError::InvalidValue { .. }));
        assert_eq!(txn.state(), TransactionState::Aborted);
        assert!(handle.is_empty());
        assert!(engine.claims().is_empty());
    }

    #[test]
    fn staged_add_lookup_respects_removal() {
        let (engine, handle) = setup();
        let e = EntityRef::new_node();
        let mut txn = engine.begin();
        txn.stage_add(&handle, e, "email", text("a@x")).unwrap();
        assert_eq!(txn.staged_add_for("Person_exact", "email", "a@x"), Some(e));
        txn.stage_remove(&handle, e, "email", text("a@x")).unwrap();
        assert_eq!(txn.staged_add_for("Person_exact", "email", "a@x"), None);
    }
}
