//! Index queries.
//!
//! A [`Query`] is a typed expression evaluated by an index handle. Queries
//! come back from the registry either as a [`QueryBuilder`] (the default,
//! refinable form) or as raw [`Hits`]. Both hold a cursor lease on the
//! handle until they are closed or dropped.

use crate::engine::{CursorLease, IndexHandle};
use crate::entity::EntityRef;
use crate::error::{CoreError, CoreResult};
use crate::types::IndexType;
use crate::value::{IndexValue, Scalar};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A query expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Every entity in the index.
    All,
    /// Entities holding exactly this value in the field.
    Term {
        /// Field name.
        field: String,
        /// Value to match, compared by canonical term.
        value: IndexValue,
    },
    /// Entities with a numerically indexed value in the range.
    Range {
        /// Field name.
        field: String,
        /// Lower bound, unbounded if `None`.
        min: Option<f64>,
        /// Upper bound, unbounded if `None`.
        max: Option<f64>,
        /// Whether `min` itself matches.
        min_inclusive: bool,
        /// Whether `max` itself matches.
        max_inclusive: bool,
    },
    /// Entities whose field contains every token of `text`.
    Text {
        /// Field name.
        field: String,
        /// Text to analyze.
        text: String,
    },
    /// Entities with a term in the field starting with `prefix`.
    Prefix {
        /// Field name.
        field: String,
        /// Term prefix.
        prefix: String,
    },
    /// Intersection. An empty list matches everything.
    And(Vec<Query>),
    /// Union. An empty list matches nothing.
    Or(Vec<Query>),
    /// Complement against every entity in the index.
    Not(Box<Query>),
}

impl Query {
    /// Matches every entity.
    #[must_use]
    pub fn all() -> Self {
        Query::All
    }

    /// Exact value match.
    #[must_use]
    pub fn term(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Query::Term {
            field: field.into(),
            value: IndexValue::raw(&value.into()),
        }
    }

    /// Exact match on a numerically indexed value.
    #[must_use]
    pub fn numeric(field: impl Into<String>, value: f64) -> Self {
        Query::Term {
            field: field.into(),
            value: IndexValue::Numeric(value),
        }
    }

    /// Numeric range with explicit bounds.
    #[must_use]
    pub fn range(
        field: impl Into<String>,
        min: Option<f64>,
        max: Option<f64>,
        min_inclusive: bool,
        max_inclusive: bool,
    ) -> Self {
        Query::Range {
            field: field.into(),
            min,
            max,
            min_inclusive,
            max_inclusive,
        }
    }

    /// Inclusive numeric range.
    #[must_use]
    pub fn between(field: impl Into<String>, min: f64, max: f64) -> Self {
        Self::range(field, Some(min), Some(max), true, true)
    }

    /// Tokenized text match.
    #[must_use]
    pub fn text(field: impl Into<String>, text: impl Into<String>) -> Self {
        Query::Text {
            field: field.into(),
            text: text.into(),
        }
    }

    /// Term prefix match.
    #[must_use]
    pub fn prefix(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Query::Prefix {
            field: field.into(),
            prefix: prefix.into(),
        }
    }

    /// Intersection of queries.
    #[must_use]
    pub fn and(queries: impl IntoIterator<Item = Query>) -> Self {
        Query::And(queries.into_iter().collect())
    }

    /// Union of queries.
    #[must_use]
    pub fn or(queries: impl IntoIterator<Item = Query>) -> Self {
        Query::Or(queries.into_iter().collect())
    }

    /// Complement of a query.
    #[must_use]
    pub fn not(query: Query) -> Self {
        Query::Not(Box::new(query))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, op: &str, queries: &[Query]) -> fmt::Result {
            write!(f, "(")?;
            for (i, q) in queries.iter().enumerate() {
                if i > 0 {
                    write!(f, " {op} ")?;
                }
                write!(f, "{q}")?;
            }
            write!(f, ")")
        }

        match self {
            Query::All => write!(f, "*"),
            Query::Term { field, value } => write!(f, "{field}:{value}"),
            Query::Range {
                field,
                min,
                max,
                min_inclusive,
                max_inclusive,
            } => {
                let open = if *min_inclusive { '[' } else { '{' };
                let close = if *max_inclusive { ']' } else { '}' };
                let lo = min.map_or_else(|| "*".to_string(), |v| v.to_string());
                let hi = max.map_or_else(|| "*".to_string(), |v| v.to_string());
                write!(f, "{field}:{open}{lo} TO {hi}{close}")
            }
            Query::Text { field, text } => write!(f, "{field}:\"{text}\""),
            Query::Prefix { field, prefix } => write!(f, "{field}:{prefix}*"),
            Query::And(queries) => list(f, "AND", queries),
            Query::Or(queries) => list(f, "OR", queries),
            Query::Not(inner) => write!(f, "NOT {inner}"),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

/// How the registry resolves and returns a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Index type to query.
    pub index_type: IndexType,
    /// Return a [`QueryBuilder`] instead of raw [`Hits`].
    pub wrapped: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            index_type: IndexType::Exact,
            wrapped: true,
        }
    }
}

impl QueryOptions {
    /// Default options: exact index, wrapped.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the index type.
    #[must_use]
    pub fn index_type(mut self, index_type: IndexType) -> Self {
        self.index_type = index_type;
        self
    }

    /// Requests raw hits instead of a builder.
    #[must_use]
    pub fn raw(mut self) -> Self {
        self.wrapped = false;
        self
    }
}

/// Entities matched by a query, in result order.
#[derive(Debug)]
pub struct Hits {
    index: String,
    entities: Vec<EntityRef>,
    lease: CursorLease,
}

impl Hits {
    /// Wraps engine results. The lease is released when the hits close.
    #[must_use]
    pub fn new(index: impl Into<String>, entities: Vec<EntityRef>, lease: CursorLease) -> Self {
        Self {
            index: index.into(),
            entities,
            lease,
        }
    }

    /// Returns the name of the index that produced the hits.
    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.index
    }

    /// Iterates the matched entities.
    pub fn iter(&self) -> std::slice::Iter<'_, EntityRef> {
        self.entities.iter()
    }

    /// Returns the matched entities.
    #[must_use]
    pub fn entities(&self) -> &[EntityRef] {
        &self.entities
    }

    /// Returns the number of matches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns the first match.
    #[must_use]
    pub fn first(&self) -> Option<EntityRef> {
        self.entities.first().copied()
    }

    /// Releases the cursor and drops the results. Idempotent.
    pub fn close(&mut self) {
        self.entities.clear();
        self.lease.release();
    }

    /// Returns true once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lease.is_released()
    }

    /// Consumes the hits, releasing the cursor.
    #[must_use]
    pub fn into_vec(self) -> Vec<EntityRef> {
        self.entities
    }

    fn entities_mut(&mut self) -> &mut Vec<EntityRef> {
        &mut self.entities
    }
}

impl<'a> IntoIterator for &'a Hits {
    type Item = &'a EntityRef;
    type IntoIter = std::slice::Iter<'a, EntityRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A refinable query bound to one index handle.
#[derive(Debug)]
pub struct QueryBuilder {
    handle: Arc<dyn IndexHandle>,
    query: Query,
    sort: Option<(String, Order)>,
    limit: Option<usize>,
    lease: CursorLease,
}

impl QueryBuilder {
    /// Binds a query to a handle, opening a cursor lease on it.
    #[must_use]
    pub fn new(handle: Arc<dyn IndexHandle>, query: Query) -> Self {
        let lease = handle.open_cursor();
        Self {
            handle,
            query,
            sort: None,
            limit: None,
            lease,
        }
    }

    /// Returns the current query expression.
    #[must_use]
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Returns the name of the queried index.
    #[must_use]
    pub fn index_name(&self) -> &str {
        self.handle.name()
    }

    /// Narrows the results to entities also matching `query`.
    #[must_use]
    pub fn and(mut self, query: Query) -> Self {
        self.query = match std::mem::replace(&mut self.query, Query::All) {
            Query::And(mut queries) => {
                queries.push(query);
                Query::And(queries)
            }
            current => Query::And(vec![current, query]),
        };
        self
    }

    /// Widens the results to entities matching `query`.
    #[must_use]
    pub fn or(mut self, query: Query) -> Self {
        self.query = match std::mem::replace(&mut self.query, Query::All) {
            Query::Or(mut queries) => {
                queries.push(query);
                Query::Or(queries)
            }
            current => Query::Or(vec![current, query]),
        };
        self
    }

    /// Excludes entities matching `query`.
    #[must_use]
    pub fn not(self, query: Query) -> Self {
        self.and(Query::not(query))
    }

    /// Orders results by the first stored value of `field`.
    ///
    /// Numbers sort before text; entities without a value sort last.
    #[must_use]
    pub fn sort_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.sort = Some((field.into(), order));
        self
    }

    /// Caps the number of results.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Runs the query.
    pub fn execute(&self) -> CoreResult<Hits> {
        if self.is_closed() {
            return Err(CoreError::QueryClosed {
                index: self.handle.name().to_string(),
            });
        }

        let mut hits = self.handle.query(&self.query)?;
        if let Some((field, order)) = &self.sort {
            let handle = &self.handle;
            let mut keyed: Vec<(Option<IndexValue>, EntityRef)> = hits
                .iter()
                .map(|e| (handle.field_values(*e, field).into_iter().next(), *e))
                .collect();
            keyed.sort_by(|(a, ea), (b, eb)| {
                let ord = match (a, b) {
                    (Some(a), Some(b)) => {
                        let ord = compare_values(a, b);
                        match order {
                            Order::Asc => ord,
                            Order::Desc => ord.reverse(),
                        }
                    }
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                ord.then_with(|| ea.cmp(eb))
            });
            *hits.entities_mut() = keyed.into_iter().map(|(_, e)| e).collect();
        }
        if let Some(limit) = self.limit {
            hits.entities_mut().truncate(limit);
        }
        Ok(hits)
    }

    /// Returns the first result.
    pub fn first(&self) -> CoreResult<Option<EntityRef>> {
        Ok(self.execute()?.first())
    }

    /// Returns the number of results.
    pub fn len(&self) -> CoreResult<usize> {
        Ok(self.execute()?.len())
    }

    /// Returns true if the query matches nothing.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Releases the cursor. Idempotent.
    pub fn close(&mut self) {
        self.lease.release();
    }

    /// Returns true once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lease.is_released()
    }
}

fn compare_values(a: &IndexValue, b: &IndexValue) -> Ordering {
    match (a, b) {
        (IndexValue::Numeric(a), IndexValue::Numeric(b)) => a.total_cmp(b),
        (IndexValue::Numeric(_), IndexValue::Text(_)) => Ordering::Less,
        (IndexValue::Text(_), IndexValue::Numeric(_)) => Ordering::Greater,
        (IndexValue::Text(a), IndexValue::Text(b)) => a.cmp(b),
    }
}

/// A query handed out by the registry.
///
/// The caller owns it and must release it with [`close`](Self::close);
/// dropping it also releases.
#[derive(Debug)]
pub enum IndexQuery {
    /// Refinable query (the default).
    Builder(QueryBuilder),
    /// Raw engine results.
    Hits(Hits),
}

impl IndexQuery {
    /// Returns the matched entities.
    pub fn entities(&self) -> CoreResult<Vec<EntityRef>> {
        match self {
            IndexQuery::Builder(builder) => Ok(builder.execute()?.into_vec()),
            IndexQuery::Hits(hits) => Ok(hits.entities().to_vec()),
        }
    }

    /// Returns the number of matches.
    pub fn len(&self) -> CoreResult<usize> {
        match self {
            IndexQuery::Builder(builder) => builder.len(),
            IndexQuery::Hits(hits) => Ok(hits.len()),
        }
    }

    /// Returns true if nothing matched.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the builder, if this is a wrapped query.
    #[must_use]
    pub fn as_builder(&self) -> Option<&QueryBuilder> {
        match self {
            IndexQuery::Builder(builder) => Some(builder),
            IndexQuery::Hits(_) => None,
        }
    }

    /// Consumes the query, returning the builder if wrapped.
    #[must_use]
    pub fn into_builder(self) -> Option<QueryBuilder> {
        match self {
            IndexQuery::Builder(builder) => Some(builder),
            IndexQuery::Hits(_) => None,
        }
    }

    /// Consumes the query, returning the raw hits if unwrapped.
    #[must_use]
    pub fn into_hits(self) -> Option<Hits> {
        match self {
            IndexQuery::Builder(_) => None,
            IndexQuery::Hits(hits) => Some(hits),
        }
    }

    /// Releases the query's cursor. Idempotent.
    pub fn close(&mut self) {
        match self {
            IndexQuery::Builder(builder) => builder.close(),
            IndexQuery::Hits(hits) => hits.close(),
        }
    }

    /// Returns true once released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        match self {
            IndexQuery::Builder(builder) => builder.is_closed(),
            IndexQuery::Hits(hits) => hits.is_closed(),
        }
    }
}
