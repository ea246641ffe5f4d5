//! # Nodex Testkit
//!
//! Test utilities for Nodex.
//!
//! This crate provides:
//! - Registry fixtures over an in-memory engine
//! - Property-based test generators using proptest
//! - Concurrency harnesses for put-if-absent races and bulk indexing
//!
//! ## Usage
//!
//! ```rust
//! use nodex_testkit::prelude::*;
//! use nodex_core::{EntityRef, IndexType, Query};
//!
//! with_registry(|registry| {
//!     let alice = EntityRef::new_node();
//!     commit_fields(registry, alice, &[("name", "alice".into())]);
//!     assert_eq!(
//!         entities(registry, Query::term("name", "alice"), IndexType::Exact),
//!         vec![alice]
//!     );
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
