//! In-memory postings for one index.
//!
//! Per field the store keeps:
//! - an inverted map: analyzed term → entity → reference count
//! - an ordered numeric map for range queries (numeric values only)
//! - the stored values per entity, used for removal and sorting
//!
//! Reference counts let several values of one entity share a term (two
//! fulltext values both containing "graph") without one removal hiding the
//! other.

use crate::config::EngineSettings;
use crate::entity::EntityRef;
use crate::query::Query;
use crate::value::{IndexValue, NumericKey};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;

type Postings = HashMap<EntityRef, usize>;

#[derive(Debug, Default)]
struct FieldPostings {
    terms: HashMap<String, Postings>,
    numeric: BTreeMap<NumericKey, Postings>,
    values: HashMap<EntityRef, Vec<IndexValue>>,
}

fn increment(postings: &mut Postings, entity: EntityRef) {
    *postings.entry(entity).or_insert(0) += 1;
}

/// Decrements and reports whether the postings list became empty.
fn decrement(postings: &mut Postings, entity: EntityRef) -> bool {
    if let Some(count) = postings.get_mut(&entity) {
        *count -= 1;
        if *count == 0 {
            postings.remove(&entity);
        }
    }
    postings.is_empty()
}

/// All data of one index.
#[derive(Debug)]
pub(crate) struct IndexStore {
    settings: EngineSettings,
    fields: HashMap<String, FieldPostings>,
    /// Number of stored values per entity.
    entities: HashMap<EntityRef, usize>,
    /// Total stored values.
    count: usize,
}

impl IndexStore {
    pub(crate) fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            fields: HashMap::new(),
            entities: HashMap::new(),
            count: 0,
        }
    }

    pub(crate) fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub(crate) fn len(&self) -> usize {
        self.count
    }

    pub(crate) fn clear(&mut self) {
        self.fields.clear();
        self.entities.clear();
        self.count = 0;
    }

    fn analyze(&self, text: &str) -> Vec<String> {
        let mut terms = self
            .settings
            .analyzer
            .analyze(text, &self.settings.tokenizer);
        terms.sort_unstable();
        terms.dedup();
        terms
    }

    /// Stores a value. Adding an identical value twice is a no-op.
    pub(crate) fn add(&mut self, entity: EntityRef, field: &str, value: &IndexValue) -> bool {
        let terms = self.analyze(&value.term());
        let postings = self.fields.entry(field.to_string()).or_default();

        let stored = postings.values.entry(entity).or_default();
        if stored.contains(value) {
            return false;
        }
        stored.push(value.clone());

        for term in terms {
            increment(postings.terms.entry(term).or_default(), entity);
        }
        if let Some(key) = value.numeric_key() {
            increment(postings.numeric.entry(key).or_default(), entity);
        }

        *self.entities.entry(entity).or_insert(0) += 1;
        self.count += 1;
        true
    }

    /// Removes the stored value whose term matches `value`'s term.
    pub(crate) fn remove(&mut self, entity: EntityRef, field: &str, value: &IndexValue) -> bool {
        let Some(postings) = self.fields.get_mut(field) else {
            return false;
        };
        let Some(stored) = postings.values.get_mut(&entity) else {
            return false;
        };

        let position = stored
            .iter()
            .position(|v| v == value)
            .or_else(|| {
                let term = value.term();
                stored.iter().position(|v| v.term() == term)
            });
        let Some(position) = position else {
            return false;
        };

        let removed = stored.swap_remove(position);
        if stored.is_empty() {
            postings.values.remove(&entity);
        }

        let terms = {
            let mut terms = self
                .settings
                .analyzer
                .analyze(&removed.term(), &self.settings.tokenizer);
            terms.sort_unstable();
            terms.dedup();
            terms
        };
        for term in terms {
            if let Some(entities) = postings.terms.get_mut(&term) {
                if decrement(entities, entity) {
                    postings.terms.remove(&term);
                }
            }
        }
        if let Some(key) = removed.numeric_key() {
            if let Some(entities) = postings.numeric.get_mut(&key) {
                if decrement(entities, entity) {
                    postings.numeric.remove(&key);
                }
            }
        }
        if postings.values.is_empty() {
            self.fields.remove(field);
        }

        if let Some(n) = self.entities.get_mut(&entity) {
            *n -= 1;
            if *n == 0 {
                self.entities.remove(&entity);
            }
        }
        self.count -= 1;
        true
    }

    pub(crate) fn field_values(&self, entity: EntityRef, field: &str) -> Vec<IndexValue> {
        self.fields
            .get(field)
            .and_then(|p| p.values.get(&entity))
            .cloned()
            .unwrap_or_default()
    }

    /// Returns one entity holding (field, value), preferring the smallest.
    pub(crate) fn first_holder(&self, field: &str, value: &IndexValue) -> Option<EntityRef> {
        let term = value.term();
        let postings = self.fields.get(field)?;
        postings
            .values
            .iter()
            .filter(|(_, values)| values.iter().any(|v| v.term() == term))
            .map(|(entity, _)| *entity)
            .min()
    }

    /// Evaluates a query against the stored data.
    pub(crate) fn evaluate(&self, query: &Query) -> HashSet<EntityRef> {
        match query {
            Query::All => self.entities.keys().copied().collect(),
            Query::Term { field, value } => self.term(field, value),
            Query::Text { field, text } => self.all_terms(field, &self.analyze(text)),
            Query::Prefix { field, prefix } => self.prefix(field, prefix),
            Query::Range {
                field,
                min,
                max,
                min_inclusive,
                max_inclusive,
            } => self.range(field, *min, *max, *min_inclusive, *max_inclusive),
            Query::And(queries) => {
                let mut iter = queries.iter();
                let Some(first) = iter.next() else {
                    return self.evaluate(&Query::All);
                };
                let mut result = self.evaluate(first);
                for query in iter {
                    if result.is_empty() {
                        break;
                    }
                    let next = self.evaluate(query);
                    result.retain(|e| next.contains(e));
                }
                result
            }
            Query::Or(queries) => queries.iter().flat_map(|q| self.evaluate(q)).collect(),
            Query::Not(inner) => {
                let excluded = self.evaluate(inner);
                self.entities
                    .keys()
                    .filter(|e| !excluded.contains(e))
                    .copied()
                    .collect()
            }
        }
    }

    fn term(&self, field: &str, value: &IndexValue) -> HashSet<EntityRef> {
        let mut result = self.all_terms(field, &self.analyze(&value.term()));
        let key = match value {
            IndexValue::Numeric(_) => value.numeric_key(),
            IndexValue::Text(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| !n.is_nan())
                .map(NumericKey::from_f64),
        };
        if let (Some(key), Some(postings)) = (key, self.fields.get(field)) {
            if let Some(entities) = postings.numeric.get(&key) {
                result.extend(entities.keys().copied());
            }
        }
        result
    }

    /// Entities matching every term.
    fn all_terms(&self, field: &str, terms: &[String]) -> HashSet<EntityRef> {
        let Some(postings) = self.fields.get(field) else {
            return HashSet::new();
        };
        let Some((first, rest)) = terms.split_first() else {
            return HashSet::new();
        };

        let mut result: HashSet<EntityRef> = match postings.terms.get(first) {
            Some(entities) => entities.keys().copied().collect(),
            None => return HashSet::new(),
        };
        for term in rest {
            match postings.terms.get(term) {
                Some(entities) => result.retain(|e| entities.contains_key(e)),
                None => return HashSet::new(),
            }
            if result.is_empty() {
                break;
            }
        }
        result
    }

    fn prefix(&self, field: &str, prefix: &str) -> HashSet<EntityRef> {
        let Some(postings) = self.fields.get(field) else {
            return HashSet::new();
        };
        let normalized = self
            .settings
            .analyzer
            .normalize(prefix, &self.settings.tokenizer);
        postings
            .terms
            .iter()
            .filter(|(term, _)| term.starts_with(&normalized))
            .flat_map(|(_, entities)| entities.keys().copied())
            .collect()
    }

    fn range(
        &self,
        field: &str,
        min: Option<f64>,
        max: Option<f64>,
        min_inclusive: bool,
        max_inclusive: bool,
    ) -> HashSet<EntityRef> {
        let Some(postings) = self.fields.get(field) else {
            return HashSet::new();
        };
        let lower = match min {
            Some(v) if min_inclusive => Bound::Included(NumericKey::from_f64(v)),
            Some(v) => Bound::Excluded(NumericKey::from_f64(v)),
            None => Bound::Unbounded,
        };
        let upper = match max {
            Some(v) if max_inclusive => Bound::Included(NumericKey::from_f64(v)),
            Some(v) => Bound::Excluded(NumericKey::from_f64(v)),
            None => Bound::Unbounded,
        };
        if let (Bound::Included(lo) | Bound::Excluded(lo), Bound::Included(hi) | Bound::Excluded(hi)) =
            (lower, upper)
        {
            // BTreeMap::range panics on inverted or empty-excluded bounds.
            let empty_exclusive = lo == hi && !(min_inclusive && max_inclusive);
            if lo > hi || empty_exclusive {
                return HashSet::new();
            }
        }
        postings
            .numeric
            .range((lower, upper))
            .flat_map(|(_, entities)| entities.keys().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact() -> IndexStore {
        IndexStore::new(EngineSettings::exact())
    }

    fn fulltext() -> IndexStore {
        IndexStore::new(EngineSettings::fulltext())
    }

    fn text(s: &str) -> IndexValue {
        IndexValue::Text(s.to_string())
    }

    #[test]
    fn numeric_text_term_matches_numeric_key() {
        let mut store = exact();
        let e = EntityRef::node(crate::EntityId::from_u128(1));
        store.add(e, "age", &IndexValue::Numeric(7.0));

        for query in ["7", "7.0", "7e0"] {
            let hits = store.evaluate(&Query::term("age", query));
            assert!(hits.contains(&e), "{query}");
        }
        assert!(store.evaluate(&Query::term("age", "8")).is_empty());
    }

    #[test]
    fn add_and_term_lookup() {
        let mut store = exact();
        let alice = EntityRef::new_node();
        let bob = EntityRef::new_node();

        assert!(store.add(alice, "name", &text("alice")));
        assert!(store.add(bob, "name", &text("bob")));
        assert!(!store.add(alice, "name", &text("alice")));

        let found = store.evaluate(&Query::term("name", "alice"));
        assert_eq!(found.len(), 1);
        assert!(found.contains(&alice));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn exact_is_case_sensitive() {
        let mut store = exact();
        let e = EntityRef::new_node();
        store.add(e, "name", &text("Alice"));
        assert!(store.evaluate(&Query::term("name", "alice")).is_empty());
        assert_eq!(store.evaluate(&Query::term("name", "Alice")).len(), 1);
    }

    #[test]
    fn remove_matches_by_term() {
        let mut store = exact();
        let e = EntityRef::new_node();
        store.add(e, "age", &IndexValue::Numeric(30.0));

        assert!(store.remove(e, "age", &text("30")));
        assert!(store.evaluate(&Query::between("age", 0.0, 100.0)).is_empty());
        assert!(store.evaluate(&Query::All).is_empty());
        assert_eq!(store.len(), 0);
        assert!(!store.remove(e, "age", &text("30")));
    }

    #[test]
    fn range_only_sees_numeric_values() {
        let mut store = exact();
        let a = EntityRef::new_node();
        let b = EntityRef::new_node();
        let c = EntityRef::new_node();
        store.add(a, "age", &IndexValue::Numeric(10.0));
        store.add(b, "age", &IndexValue::Numeric(20.0));
        store.add(c, "age", &text("15"));

        let found = store.evaluate(&Query::between("age", 5.0, 25.0));
        assert_eq!(found, HashSet::from([a, b]));

        let found = store.evaluate(&Query::range("age", Some(10.0), None, false, true));
        assert_eq!(found, HashSet::from([b]));

        assert!(store.evaluate(&Query::between("age", 30.0, 5.0)).is_empty());
        assert!(store
            .evaluate(&Query::range("age", Some(10.0), Some(10.0), true, false))
            .is_empty());
    }

    #[test]
    fn fulltext_shared_tokens_survive_partial_removal() {
        let mut store = fulltext();
        let e = EntityRef::new_node();
        store.add(e, "bio", &text("Graph databases"));
        store.add(e, "bio", &text("graph theory"));

        store.remove(e, "bio", &text("graph theory"));
        assert!(store.evaluate(&Query::text("bio", "GRAPH")).contains(&e));
        assert!(store.evaluate(&Query::text("bio", "theory")).is_empty());
    }

    #[test]
    fn text_query_requires_all_tokens() {
        let mut store = fulltext();
        let a = EntityRef::new_node();
        let b = EntityRef::new_node();
        store.add(a, "bio", &text("rust graph engine"));
        store.add(b, "bio", &text("rust compiler"));

        assert_eq!(store.evaluate(&Query::text("bio", "rust")).len(), 2);
        assert_eq!(
            store.evaluate(&Query::text("bio", "rust graph")),
            HashSet::from([a])
        );
        assert!(store.evaluate(&Query::text("bio", "")).is_empty());
    }

    #[test]
    fn prefix_and_boolean_queries() {
        let mut store = fulltext();
        let a = EntityRef::new_node();
        let b = EntityRef::new_node();
        store.add(a, "bio", &text("Stockholm"));
        store.add(b, "bio", &text("Stuttgart"));

        assert_eq!(store.evaluate(&Query::prefix("bio", "St")).len(), 2);
        assert_eq!(
            store.evaluate(&Query::prefix("bio", "sto")),
            HashSet::from([a])
        );

        let not_a = Query::not(Query::prefix("bio", "sto"));
        assert_eq!(store.evaluate(&not_a), HashSet::from([b]));

        let either = Query::or([Query::text("bio", "stockholm"), Query::text("bio", "stuttgart")]);
        assert_eq!(store.evaluate(&either).len(), 2);

        let both = Query::and([Query::prefix("bio", "st"), not_a]);
        assert_eq!(store.evaluate(&both), HashSet::from([b]));
    }

    #[test]
    fn first_holder_and_values() {
        let mut store = exact();
        let e = EntityRef::node(crate::EntityId::from_u128(7));
        store.add(e, "email", &text("a@example.com"));

        assert_eq!(store.first_holder("email", &text("a@example.com")), Some(e));
        assert_eq!(store.first_holder("email", &text("b@example.com")), None);
        assert_eq!(store.field_values(e, "email"), vec![text("a@example.com")]);

        store.clear();
        assert_eq!(store.len(), 0);
        assert!(store.field_values(e, "email").is_empty());
    }
}
