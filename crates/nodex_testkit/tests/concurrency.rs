//! Concurrency tests for put-if-absent and lazy handle creation.

use nodex_core::{EntityRef, IndexType, Query, Scalar};
use nodex_testkit::prelude::*;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn shared_registry() -> Arc<nodex_core::IndexRegistry> {
    Arc::new(TestRegistry::memory().registry)
}

#[test]
fn exactly_one_put_if_absent_wins() {
    let registry = shared_registry();
    let result = race_put_if_absent(&registry, &RaceConfig::default());

    let winners = result.winners();
    assert_eq!(winners.len(), 1);
    assert_eq!(result.holders().len(), 7);
    assert!(result.holders().iter().all(|h| *h == winners[0]));

    assert_eq!(
        entities(&registry, Query::term("email", "race@example.com"), IndexType::Exact),
        winners
    );
}

#[test]
fn rollback_reopens_the_race() {
    let registry = shared_registry();
    let result = race_put_if_absent(
        &registry,
        &RaceConfig {
            threads: 4,
            rollback_first_winner: true,
            ..RaceConfig::default()
        },
    );

    assert_eq!(result.rolled_back().len(), 1);
    let winners = result.winners();
    assert_eq!(winners.len(), 1);
    assert_ne!(result.rolled_back()[0], winners[0]);
    assert!(result.holders().iter().all(|h| *h == winners[0]));

    assert_eq!(
        entities(&registry, Query::term("email", "race@example.com"), IndexType::Exact),
        winners
    );
}

#[test]
fn numeric_race_on_relationships() {
    let registry = Arc::new(TestRegistry::with_config(knows_config()).registry);
    let result = race_put_if_absent(
        &registry,
        &RaceConfig {
            threads: 4,
            key: "since".to_string(),
            value: Scalar::Int(2001),
            hold: Duration::from_millis(5),
            rollback_first_winner: false,
        },
    );
    assert_eq!(result.winners().len(), 1);
    assert_eq!(
        entities(&registry, Query::between("since", 2001.0, 2001.0), IndexType::Exact),
        result.winners()
    );
}

#[test]
fn different_values_do_not_block() {
    let registry = shared_registry();
    let a = EntityRef::new_node();
    let b = EntityRef::new_node();

    let mut first = registry.begin();
    let mut second = registry.begin();
    let email_a = Scalar::from("a@example.com");
    let email_b = Scalar::from("b@example.com");
    assert_eq!(
        registry
            .put_if_absent(&mut first, a, "email", &email_a, IndexType::Exact)
            .unwrap(),
        None
    );
    assert_eq!(
        registry
            .put_if_absent(&mut second, b, "email", &email_b, IndexType::Exact)
            .unwrap(),
        None
    );
    second.commit().unwrap();
    first.commit().unwrap();
}

#[test]
fn concurrent_lookups_share_one_handle() {
    let registry = shared_registry();
    let barrier = Arc::new(Barrier::new(8));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.index_for_type(IndexType::Fulltext).unwrap()
            })
        })
        .collect();

    let handles: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    for handle in &handles[1..] {
        assert!(Arc::ptr_eq(&handles[0], handle));
    }
    assert_eq!(registry.index_names(), vec!["Person_fulltext".to_string()]);
}

#[test]
fn concurrent_adds_all_land() {
    let registry = shared_registry();
    let config = StressConfig {
        operations: 100,
        threads: 4,
        distinct_values: 10,
    };
    let result = stress_concurrent_adds(&registry, "name", &config);

    assert_eq!(result.failed_ops, 0);
    assert_eq!(result.successful_ops, 400);

    let handle = registry.index_for_type(IndexType::Exact).unwrap();
    assert_eq!(handle.len(), 400);
    assert_eq!(
        entities(&registry, Query::term("name", "v3"), IndexType::Exact).len(),
        40
    );
}
