//! Integration tests for the registry lifecycle.

use nodex_core::{
    ChangeEvent, CoreError, EntityRef, FieldValue, IndexConfig, IndexEngine, IndexRegistry,
    IndexType, MemoryEngine, Order, Query, QueryOptions, Scalar,
};
use nodex_testkit::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

#[test]
fn registry_from_config_file() {
    let file = config_file(&person_config());
    let config = IndexConfig::from_json_file(file.path()).unwrap();
    let test = TestRegistry::with_config(config);

    let alice = EntityRef::new_node();
    commit_fields(&test, alice, &[("name", "alice".into()), ("age", 31.into())]);

    assert_eq!(
        entities(&test, Query::between("age", 30.0, 40.0), IndexType::Exact),
        vec![alice]
    );
    assert_eq!(test.index_names(), vec!["Person_exact".to_string()]);
}

#[test]
fn event_driven_reindexing() {
    let test = TestRegistry::memory();
    let bob = EntityRef::new_node();
    let carol = EntityRef::new_node();

    apply_events(
        &test,
        &[
            ChangeEvent::set(bob, "name", "bob"),
            ChangeEvent::set(bob, "bio", "Writes Rust at night"),
            ChangeEvent::set(bob, "age", "41.0"),
            ChangeEvent::set(carol, "name", "carol"),
            ChangeEvent::changed(bob, "name", "bob", "robert"),
            ChangeEvent::changed(bob, "age", "41.0", 42),
            ChangeEvent::set(carol, "shoe_size", 42),
        ],
    );

    assert!(entities(&test, Query::numeric("age", 41.0), IndexType::Exact).is_empty());
    assert_eq!(
        entities(&test, Query::term("age", "42"), IndexType::Exact),
        vec![bob]
    );
    assert!(entities(&test, Query::term("name", "bob"), IndexType::Exact).is_empty());
    assert_eq!(
        entities(&test, Query::term("name", "robert"), IndexType::Exact),
        vec![bob]
    );
    assert_eq!(
        entities(&test, Query::text("bio", "rust"), IndexType::Fulltext),
        vec![bob]
    );

    let mut properties = HashMap::new();
    properties.insert("name".to_string(), FieldValue::from("carol"));
    properties.insert("shoe_size".to_string(), FieldValue::from(42));
    apply_events(&test, &[ChangeEvent::deleted(carol, properties)]);

    assert!(entities(&test, Query::term("name", "carol"), IndexType::Exact).is_empty());
}

#[test]
fn data_survives_shutdown_on_shared_engine() {
    let engine = Arc::new(MemoryEngine::new());
    let dave = EntityRef::new_node();

    let first = TestRegistry::on_engine(Arc::clone(&engine), person_config());
    commit_fields(&first, dave, &[("email", "dave@example.com".into())]);
    first.on_shutdown();
    assert!(first.index_names().is_empty());

    let second = TestRegistry::on_engine(Arc::clone(&engine), person_config());
    assert_eq!(
        entities(&second, Query::term("email", "dave@example.com"), IndexType::Exact),
        vec![dave]
    );

    // The first registry reopens lazily after shutdown.
    assert_eq!(
        entities(&first, Query::term("email", "dave@example.com"), IndexType::Exact),
        vec![dave]
    );
}

#[test]
fn remove_index_type_deletes_unheld_data() {
    let engine = Arc::new(MemoryEngine::new());
    let erin = EntityRef::new_node();

    let writer = TestRegistry::on_engine(Arc::clone(&engine), person_config());
    commit_fields(&writer, erin, &[("bio", "gardening and chess".into())]);
    writer.on_shutdown();

    let other = TestRegistry::on_engine(Arc::clone(&engine), person_config());
    assert!(other.index_names().is_empty());
    other.remove_index_type(Some(IndexType::Fulltext)).unwrap();
    assert!(!engine.exists(other.entity_kind(), "Person_fulltext"));

    assert!(entities(&other, Query::text("bio", "chess"), IndexType::Fulltext).is_empty());
}

#[test]
fn remove_index_config_keeps_data() {
    let test = TestRegistry::memory();
    let frank = EntityRef::new_node();
    commit_fields(&test, frank, &[("name", "frank".into())]);

    test.remove_index_config();
    assert!(test.fields().is_empty());

    let mut txn = test.begin();
    let touched = test
        .add(&mut txn, EntityRef::new_node(), "name", &"frank".into())
        .unwrap();
    txn.commit().unwrap();
    assert!(!touched);

    assert_eq!(
        entities(&test, Query::term("name", "frank"), IndexType::Exact),
        vec![frank]
    );
}

#[test]
fn relationship_registry() {
    let test = TestRegistry::with_config(knows_config());
    let edge = EntityRef::new_relationship();
    commit_fields(&test, edge, &[("since", 2019.into()), ("note", "Met at RustConf".into())]);

    assert_eq!(
        entities(&test, Query::between("since", 2010.0, 2020.0), IndexType::Exact),
        vec![edge]
    );

    let mut txn = test.begin();
    let err = test
        .add(&mut txn, EntityRef::new_node(), "since", &2020.into())
        .unwrap_err();
    assert!(matches!(err, CoreError::EntityKindMismatch { .. }));
}

#[test]
fn wrapped_query_sorts_and_limits() {
    let test = TestRegistry::memory();
    let ages = [(45, "gail"), (23, "hank"), (37, "iris")];
    let mut people = Vec::new();
    for (age, name) in ages {
        let entity = EntityRef::new_node();
        commit_fields(&test, entity, &[("name", name.into()), ("age", age.into())]);
        people.push((age, entity));
    }
    people.sort_by_key(|(age, _)| *age);

    let mut builder = test
        .query(Query::all(), QueryOptions::new())
        .unwrap()
        .into_builder()
        .expect("wrapped query")
        .sort_by("age", Order::Desc)
        .limit(2);
    let oldest_two = builder.execute().unwrap().into_vec();
    assert_eq!(oldest_two, vec![people[2].1, people[1].1]);
    builder.close();
    assert!(builder.execute().is_err());

    let raw = test
        .query(Query::between("age", 30.0, 50.0), QueryOptions::new().raw())
        .unwrap();
    assert_eq!(raw.len().unwrap(), 2);
    assert!(raw.into_hits().is_some());
}

#[test]
fn query_scoped_releases_on_error() {
    let test = TestRegistry::memory();
    let handle = test.index_for_type(IndexType::Exact).unwrap();

    let result: Result<(), CoreError> =
        test.query_scoped(Query::all(), QueryOptions::new(), |_| {
            Err(CoreError::invalid_config("caller failed"))
        });
    assert!(result.is_err());
    assert_eq!(handle.open_cursors(), 0);
}

#[test]
fn put_if_absent_reports_existing_holder() {
    let test = TestRegistry::memory();
    let owner = EntityRef::new_node();
    commit_fields(&test, owner, &[("email", "owner@example.com".into())]);

    let mut txn = test.begin();
    let holder = test
        .put_if_absent(
            &mut txn,
            EntityRef::new_node(),
            "email",
            &Scalar::from("owner@example.com"),
            IndexType::Exact,
        )
        .unwrap();
    assert_eq!(holder, Some(owner));
    txn.commit().unwrap();
}

#[test]
fn display_lists_open_indexes() {
    let engine: Arc<dyn IndexEngine> = Arc::new(MemoryEngine::new());
    let registry = IndexRegistry::new(engine, person_config()).unwrap();
    assert!(registry.to_string().contains("no open indexes"));

    registry.index_for_type(IndexType::Exact).unwrap();
    assert!(registry.to_string().contains("Person_exact"));
}
