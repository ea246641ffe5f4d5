//! Replay command implementation.
//!
//! Reads one [`ChangeEvent`] per line and applies each in its own
//! transaction to a registry over an in-memory engine. Blank lines and lines
//! starting with `#` are skipped.

use super::CliError;
use nodex_core::{
    ChangeEvent, IndexConfig, IndexRegistry, IndexType, MemoryEngine, Query, QueryOptions,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Query flags of the replay command.
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    /// Index type name.
    pub index: String,
    /// Queried field.
    pub field: Option<String>,
    /// Exact term.
    pub term: Option<String>,
    /// Fulltext text.
    pub text: Option<String>,
    /// Term prefix.
    pub prefix: Option<String>,
    /// Range lower bound.
    pub min: Option<f64>,
    /// Range upper bound.
    pub max: Option<f64>,
}

impl QueryArgs {
    /// Builds the query, or `None` if no query was requested.
    pub fn to_query(&self) -> Result<Option<Query>, CliError> {
        let ranged = self.min.is_some() || self.max.is_some();
        let forms = [self.term.is_some(), self.text.is_some(), self.prefix.is_some(), ranged]
            .into_iter()
            .filter(|given| *given)
            .count();
        if forms == 0 {
            return Ok(None);
        }
        if forms > 1 {
            return Err(CliError::ConflictingQuery);
        }
        let field = self.field.clone().ok_or(CliError::MissingField)?;

        let query = if let Some(term) = &self.term {
            Query::term(field, term.as_str())
        } else if let Some(text) = &self.text {
            Query::text(field, text.as_str())
        } else if let Some(prefix) = &self.prefix {
            Query::prefix(field, prefix.as_str())
        } else {
            Query::range(field, self.min, self.max, true, true)
        };
        Ok(Some(query))
    }
}

/// Entry count of one index after replay.
#[derive(Debug, Serialize)]
pub struct IndexSummary {
    /// Index name.
    pub name: String,
    /// Stored associations.
    pub entries: usize,
}

/// Replay result.
#[derive(Debug, Serialize)]
pub struct ReplayResult {
    /// Events read.
    pub events: usize,
    /// Events that touched an index.
    pub applied: usize,
    /// Indexes opened during replay.
    pub indexes: Vec<IndexSummary>,
    /// The query, if one was run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Matching entity ids, if a query was run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<String>>,
}

/// Parses an events file body.
pub fn parse_events(input: &str) -> Result<Vec<ChangeEvent>, CliError> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| CliError::Event { line: i + 1, source })
        })
        .collect()
}

/// Replays events against a fresh registry and optionally runs a query.
pub fn replay(
    config: IndexConfig,
    events: Vec<ChangeEvent>,
    args: &QueryArgs,
) -> Result<ReplayResult, Box<dyn std::error::Error>> {
    let query = args.to_query()?;
    let index_type: IndexType = args.index.parse()?;
    let registry = IndexRegistry::new(Arc::new(MemoryEngine::new()), config)?;

    let count = events.len();
    let mut applied = 0;
    for (i, event) in events.iter().enumerate() {
        let mut txn = registry.begin();
        if registry.apply_event(&mut txn, event)? {
            applied += 1;
        }
        txn.commit()?;
        debug!(event = i + 1, entity = %event.entity(), "event applied");
    }
    info!(events = count, applied, "replay complete");

    let mut indexes = Vec::new();
    for name in registry.index_names() {
        let index_type = IndexType::ALL
            .into_iter()
            .find(|t| registry.index_name(*t) == name)
            .ok_or_else(|| format!("unexpected index {name}"))?;
        let handle = registry.index_for_type(index_type)?;
        indexes.push(IndexSummary {
            name,
            entries: handle.len(),
        });
    }

    let (query_text, matches) = match query {
        Some(query) => {
            let text = query.to_string();
            let options = QueryOptions::new().index_type(index_type);
            let entities = registry.query_scoped(query, options, |q| q.entities())?;
            let ids = entities.iter().map(|e| e.id.to_string()).collect();
            (Some(text), Some(ids))
        }
        None => (None, None),
    };

    registry.on_shutdown();
    Ok(ReplayResult {
        events: count,
        applied,
        indexes,
        query: query_text,
        matches,
    })
}

/// Runs the replay command.
pub fn run(
    config_path: &Path,
    events_path: &Path,
    args: &QueryArgs,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = IndexConfig::from_json_file(config_path)?;
    let input = std::fs::read_to_string(events_path)?;
    let events = parse_events(&input)?;
    let result = replay(config, events, args)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &ReplayResult) {
    println!("Replayed {} events ({} indexed)", result.events, result.applied);
    println!();
    println!("Indexes:");
    if result.indexes.is_empty() {
        println!("  (none opened)");
    }
    for index in &result.indexes {
        println!("  {:<24} {} entries", index.name, index.entries);
    }

    if let (Some(query), Some(matches)) = (&result.query, &result.matches) {
        println!();
        println!("Query {query}: {} matches", matches.len());
        for id in matches {
            println!("  {id}");
        }
    }
}
