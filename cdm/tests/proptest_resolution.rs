mod shared;

use cdm::resolution::rename;
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use serde_json::{json, Value};
use shared::{corpus, names, resolve};
use std::collections::BTreeMap;

/// Attribute names mapped to whether the attribute is removed by guidance.
fn arb_declared() -> impl Strategy<Value = BTreeMap<String, bool>> {
    prop::collection::btree_map("[a-z][a-zA-Z]{0,7}", any::<bool>(), 1..8)
}

fn flat_entity(declared: &BTreeMap<String, bool>) -> Value {
    let attributes: Vec<Value> = declared
        .iter()
        .map(|(name, removed)| {
            if *removed {
                json!({ "name": name, "resolutionGuidance": { "removeAttribute": true } })
            } else {
                json!({ "name": name })
            }
        })
        .collect();
    json!([{ "entityName": "Flat", "hasAttributes": attributes }])
}

fn siblings_entity(reference_only: &[bool]) -> Value {
    let attributes: Vec<Value> = reference_only
        .iter()
        .enumerate()
        .map(|(i, by_reference)| {
            let imposed: Vec<&str> = if *by_reference { vec!["referenceOnly"] } else { vec![] };
            json!({
                "name": format!("s{}", i),
                "entity": "Address",
                "resolutionGuidance": { "imposedDirectives": imposed }
            })
        })
        .collect();
    json!([
        {
            "entityName": "Address",
            "hasAttributes": [{ "name": "id", "isPrimaryKey": true }, { "name": "street" }]
        },
        { "entityName": "Order", "hasAttributes": attributes }
    ])
}

proptest! {
    #![proptest_config(ProptestConfig {
        // Do not write `.proptest-regressions` files into the repo.
        failure_persistence: None,
        .. ProptestConfig::default()
    })]
    #[test]
    fn prop_flat_entity_keeps_declared_order(declared in arb_declared()) {
        let corpus = corpus(flat_entity(&declared));
        let resolved = resolve(&corpus, "Flat", &[]).unwrap();

        let expected: Vec<String> = declared
            .iter()
            .filter(|(_, removed)| !**removed)
            .map(|(name, _)| name.clone())
            .collect();
        prop_assert_eq!(names(&resolved), expected);
    }

    #[test]
    fn prop_resolution_is_idempotent(declared in arb_declared(), structured in any::<bool>()) {
        let corpus = corpus(flat_entity(&declared));
        let tags: &[&str] = if structured { &["structured"] } else { &[] };

        let first = resolve(&corpus, "Flat", tags).unwrap();
        let second = resolve(&corpus, "Flat", tags).unwrap();
        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn prop_imposed_directives_do_not_leak_to_siblings(
        reference_only in prop::collection::vec(any::<bool>(), 1..6)
    ) {
        let corpus = corpus(siblings_entity(&reference_only));
        let resolved = resolve(&corpus, "Order", &[]).unwrap();

        let mut expected = Vec::new();
        for (i, by_reference) in reference_only.iter().enumerate() {
            expected.push(format!("s{}Id", i));
            if !by_reference {
                expected.push(format!("s{}Street", i));
            }
        }
        prop_assert_eq!(names(&resolved), expected);
    }

    #[test]
    fn prop_rename_ordinal_format(attribute in "[a-z]{1,10}", ordinal in 0i64..1000) {
        prop_assert_eq!(
            rename("{a}{o}", &attribute, Some(ordinal), ""),
            format!("{}{}", attribute, ordinal)
        );
        prop_assert_eq!(rename("{a}{o}{M}", &attribute, None, ""), attribute.clone());
    }
}
