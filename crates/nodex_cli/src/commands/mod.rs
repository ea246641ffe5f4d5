//! CLI command implementations.

pub mod inspect;
pub mod replay;

use thiserror::Error;

/// Errors raised by commands before reaching the core.
#[derive(Debug, Error)]
pub enum CliError {
    /// A line of the events file is not a valid change event.
    #[error("events line {line}: {source}")]
    Event {
        /// 1-based line number.
        line: usize,
        /// Parse failure.
        source: serde_json::Error,
    },

    /// Query flags were given without a field.
    #[error("--field is required with --term, --text, --prefix, --min or --max")]
    MissingField,

    /// More than one query form was requested.
    #[error("use only one of --term, --text, --prefix or --min/--max")]
    ConflictingQuery,
}
