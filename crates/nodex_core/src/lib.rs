//! # Nodex Core
//!
//! Index coordination for graph entities.
//!
//! This crate provides:
//! - [`IndexConfig`]: which fields of an entity type are indexed, and how
//! - [`IndexRegistry`]: lazily opened index handles and field-level
//!   add/remove/query operations
//! - [`IndexEngine`]/[`IndexHandle`]: the contract an index backend fulfils,
//!   with [`MemoryEngine`] as the in-process implementation
//! - [`Transaction`]: commit-time visibility and put-if-absent claims
//! - [`ChangeEvent`]: property changes that drive reindexing

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod entity;
mod error;
mod event;
mod query;
mod registry;
mod transaction;
mod types;
mod value;

pub use config::{EngineSettings, FieldKind, FieldSpec, IndexConfig};
pub use engine::{
    Analyzer, ClaimGuard, ClaimKey, ClaimTable, CursorLease, IndexEngine, IndexHandle,
    MemoryEngine, MemoryHandle, TokenizerConfig,
};
pub use entity::{EntityId, EntityRef};
pub use error::{CoreError, CoreResult};
pub use event::ChangeEvent;
pub use query::{Hits, IndexQuery, Order, Query, QueryBuilder, QueryOptions};
pub use registry::IndexRegistry;
pub use transaction::{Transaction, TransactionState};
pub use types::{EntityKind, IndexType, TransactionId};
pub use value::{FieldValue, IndexValue, NumericKey, Scalar, MAX_EXACT_INT};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
