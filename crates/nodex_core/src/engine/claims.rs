//! Put-if-absent claims.
//!
//! A claim is a transaction's exclusive hold on one (index, key, term)
//! triple. Acquiring a claim held by another transaction blocks until the
//! holder releases it, which happens when the holder's transaction commits
//! or rolls back. The waiter then re-checks committed data, so it sees the
//! winner's entity if the winner committed, or becomes the new claimant if
//! the winner rolled back.

use crate::types::TransactionId;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Identity of a claimable (index, key, term) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClaimKey {
    /// Index name.
    pub index: String,
    /// Field (key) name.
    pub key: String,
    /// Canonical term of the value.
    pub term: String,
}

impl ClaimKey {
    /// Creates a claim key.
    pub fn new(index: impl Into<String>, key: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            key: key.into(),
            term: term.into(),
        }
    }
}

impl fmt::Display for ClaimKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}={}]", self.index, self.key, self.term)
    }
}

/// Table of held claims with blocking acquisition.
#[derive(Debug, Default)]
pub struct ClaimTable {
    held: Mutex<HashMap<ClaimKey, TransactionId>>,
    released: Condvar,
}

impl ClaimTable {
    /// Creates an empty claim table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the claim for `owner`, blocking while another transaction
    /// holds it.
    ///
    /// If `owner` already holds the claim the returned guard does not
    /// release it on drop; the original guard stays responsible.
    pub fn acquire(self: &Arc<Self>, key: ClaimKey, owner: TransactionId) -> ClaimGuard {
        let mut held = self.held.lock();
        loop {
            match held.get(&key) {
                None => {
                    held.insert(key.clone(), owner);
                    trace!(claim = %key, %owner, "claim acquired");
                    return ClaimGuard {
                        table: Arc::clone(self),
                        key,
                        owns: true,
                    };
                }
                Some(holder) if *holder == owner => {
                    return ClaimGuard {
                        table: Arc::clone(self),
                        key,
                        owns: false,
                    };
                }
                Some(holder) => {
                    trace!(claim = %key, %owner, holder = %holder, "waiting for claim");
                    self.released.wait(&mut held);
                }
            }
        }
    }

    /// Returns the transaction holding a claim, if any.
    #[must_use]
    pub fn holder(&self, key: &ClaimKey) -> Option<TransactionId> {
        self.held.lock().get(key).copied()
    }

    /// Returns the number of held claims.
    #[must_use]
    pub fn len(&self) -> usize {
        self.held.lock().len()
    }

    /// Returns true if no claims are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &ClaimKey) {
        self.held.lock().remove(key);
        self.released.notify_all();
        trace!(claim = %key, "claim released");
    }
}

/// A held claim, released on drop.
#[derive(Debug)]
pub struct ClaimGuard {
    table: Arc<ClaimTable>,
    key: ClaimKey,
    owns: bool,
}

impl ClaimGuard {
    /// Returns the claimed key.
    #[must_use]
    pub fn key(&self) -> &ClaimKey {
        &self.key
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if self.owns {
            self.table.release(&self.key);
        }
    }
}
