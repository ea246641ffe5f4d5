//! Property tests for index contents against simple models.

use nodex_core::{EntityRef, FieldValue, IndexType, Query, MAX_EXACT_INT};
use nodex_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::HashSet;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn unindexed_fields_open_nothing(
        field in field_name_strategy(),
        value in field_value_strategy(),
    ) {
        let test = TestRegistry::memory();
        prop_assume!(!test.is_indexed(&field));

        let mut txn = test.begin();
        let touched = test.add(&mut txn, EntityRef::new_node(), &field, &value).unwrap();
        txn.commit().unwrap();

        prop_assert!(!touched);
        prop_assert!(test.index_names().is_empty());
        prop_assert_eq!(test.engine.index_count(), 0);
    }

    #[test]
    fn add_remove_matches_set_model(ops in index_ops_strategy(4, 40)) {
        let test = TestRegistry::memory();
        let slots: Vec<EntityRef> = (0..4).map(|_| EntityRef::new_node()).collect();
        let mut model: HashSet<(usize, String)> = HashSet::new();

        for op in ops {
            let mut txn = test.begin();
            match op {
                IndexOp::Add { slot, value } => {
                    test.add(&mut txn, slots[slot], "tags", &value.as_str().into()).unwrap();
                    model.insert((slot, value));
                }
                IndexOp::Remove { slot, value } => {
                    test.remove(&mut txn, slots[slot], "tags", &value.as_str().into()).unwrap();
                    model.remove(&(slot, value));
                }
            }
            txn.commit().unwrap();
        }

        for value in ["red", "green", "blue", "cyan"] {
            let found: HashSet<EntityRef> =
                entities(&test, Query::term("tags", value), IndexType::Exact)
                    .into_iter()
                    .collect();
            let expected: HashSet<EntityRef> = model
                .iter()
                .filter(|(_, v)| v == value)
                .map(|(slot, _)| slots[*slot])
                .collect();
            prop_assert_eq!(found, expected);
        }
    }

    #[test]
    fn range_matches_filter(
        ages in prop::collection::vec(0i64..120, 1..20),
        low in 0i64..120,
        span in 0i64..60,
    ) {
        let test = TestRegistry::memory();
        let high = low + span;
        let mut expected = HashSet::new();

        for age in &ages {
            let entity = EntityRef::new_node();
            commit_fields(&test, entity, &[("age", FieldValue::from(*age))]);
            if (low..=high).contains(age) {
                expected.insert(entity);
            }
        }

        let found: HashSet<EntityRef> = entities(
            &test,
            Query::between("age", low as f64, high as f64),
            IndexType::Exact,
        )
        .into_iter()
        .collect();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn numeric_remove_accepts_any_spelling(
        n in -(MAX_EXACT_INT as i64)..=(MAX_EXACT_INT as i64),
        spelling in 0usize..3,
    ) {
        let test = TestRegistry::memory();
        let entity = EntityRef::new_node();
        commit_fields(&test, entity, &[("age", FieldValue::from(n))]);

        let removal = match spelling {
            0 => FieldValue::from(format!("{n}.0")),
            1 => FieldValue::from(n as f64),
            _ => FieldValue::from(format!(" {n} ")),
        };
        let mut txn = test.begin();
        test.remove(&mut txn, entity, "age", &removal).unwrap();
        txn.commit().unwrap();

        prop_assert!(entities(&test, Query::all(), IndexType::Exact).is_empty());
    }

    #[test]
    fn fulltext_ignores_case(sentence in sentence_strategy()) {
        let test = TestRegistry::memory();
        let entity = EntityRef::new_node();
        commit_fields(&test, entity, &[("bio", sentence.to_uppercase().into())]);

        let word = sentence.split(' ').next().unwrap_or_default().to_string();
        prop_assert_eq!(
            entities(&test, Query::text("bio", word), IndexType::Fulltext),
            vec![entity]
        );
    }
}
