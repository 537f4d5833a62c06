//! Property-based tests for qfilter.

use proptest::prelude::*;
use qfilter::{
    compile, Connector, FieldDef, FieldIndex, FieldKind, FilterNode, LeafNode, ModelDef,
    Predicate, Schema,
};
use serde_json::{json, Value};

// ============================================================================
// Test helpers
// ============================================================================

const KINDS: &[FieldKind] = &[
    FieldKind::Char,
    FieldKind::Integer,
    FieldKind::Boolean,
    FieldKind::DateTime,
    FieldKind::Float,
    FieldKind::ForeignKey,
    FieldKind::ManyToMany,
    FieldKind::Reverse,
];

/// A schema of `M0..Mn` where every relation targets one of those models,
/// so cycles (including self-references) are common.
fn arb_schema() -> impl Strategy<Value = (Schema, usize)> {
    (1usize..5).prop_flat_map(|models| {
        let field = (0..KINDS.len(), 0..models);
        let fields = prop::collection::vec(field, 0..5);
        prop::collection::vec(fields, models).prop_map(move |per_model| {
            let mut schema = Schema::new();
            for (m, fields) in per_model.into_iter().enumerate() {
                let defs = fields
                    .into_iter()
                    .enumerate()
                    .map(|(i, (kind, target))| {
                        let kind = KINDS[kind];
                        let name = format!("f{i}");
                        if kind.is_relation() {
                            FieldDef::relation(name, kind, format!("M{target}"))
                        } else {
                            FieldDef::new(name, kind)
                        }
                    })
                    .collect();
                schema.insert(ModelDef::new(format!("M{m}"), defs));
            }
            (schema, models)
        })
    })
}

const PATHS: &[&str] = &["title", "publisher.name", "publication_date", "author.books"];
const LOOKUPS: &[&str] = &["startswith", "gte", "year__lt", "in", "isnull", "pk"];

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z ]{0,8}".prop_map(Value::from),
        prop::collection::vec(any::<i32>(), 0..3).prop_map(|v| json!(v)),
    ]
}

fn arb_leaf() -> impl Strategy<Value = FilterNode> {
    (
        prop::sample::select(PATHS),
        prop::option::of(prop::sample::select(LOOKUPS)),
        arb_value(),
    )
        .prop_map(|(path, lookup, value)| {
            let leaf = LeafNode::new(path, value);
            FilterNode::Leaf(match lookup {
                Some(lookup) => leaf.with_lookup(lookup),
                None => leaf,
            })
        })
}

fn arb_connector() -> impl Strategy<Value = Connector> {
    prop_oneof![Just(Connector::And), Just(Connector::Or), Just(Connector::Xor)]
}

fn arb_tree() -> impl Strategy<Value = FilterNode> {
    arb_leaf().prop_recursive(4, 32, 4, |inner| {
        (
            arb_connector(),
            any::<bool>(),
            prop::collection::vec(inner, 1..4),
        )
            .prop_map(|(connector, negated, children)| {
                let node = FilterNode::connector(connector, children);
                if negated {
                    node.negate()
                } else {
                    node
                }
            })
    })
}

/// Conditions `n > k` over records `{"n": ...}`.
fn arb_thresholds() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(-5i64..5, 1..6)
}

fn threshold(k: i64) -> Predicate {
    Predicate::lookup("n", "gt", k)
}

// ============================================================================
// Field index properties
// ============================================================================

proptest! {
    #[test]
    fn index_builds_on_any_schema((schema, models) in arb_schema()) {
        let index = FieldIndex::build(&schema, "M0");

        for node in index.iter() {
            // Every relation hop enters a model not yet on the path, so
            // paths are bounded by the number of models.
            prop_assert!(node.lookup_path.split('.').count() <= models);
        }
    }

    #[test]
    fn indexed_paths_resolve_to_themselves((schema, _) in arb_schema()) {
        let index = FieldIndex::build(&schema, "M0");

        for node in index.iter() {
            let found = index.find(node.lookup_path.split('.'));
            prop_assert_eq!(found.map(|n| n.lookup_path.as_str()), Some(node.lookup_path.as_str()));
        }
    }

    #[test]
    fn only_supported_kinds_are_indexed((schema, _) in arb_schema()) {
        let index = FieldIndex::build(&schema, "M0");
        let supported = schema
            .models[0]
            .fields
            .iter()
            .filter(|def| def.kind != FieldKind::Float)
            .count();

        prop_assert_eq!(index.root().children.len(), supported);
        for node in index.iter() {
            prop_assert!(node.descriptor.is_some());
        }
    }
}

// ============================================================================
// Filter tree properties
// ============================================================================

proptest! {
    #[test]
    fn compile_round_trips(tree in arb_tree()) {
        let predicate = compile(&tree);
        prop_assert_eq!(&predicate.to_tree(), &tree);
        prop_assert_eq!(predicate.to_value(), tree.to_value());
    }

    #[test]
    fn wire_form_round_trips(tree in arb_tree()) {
        let parsed = FilterNode::from_value(&tree.to_value());
        prop_assert_eq!(parsed, Ok(tree));
    }

    #[test]
    fn compiled_conditions_match_leaves(tree in arb_tree()) {
        let predicate = compile(&tree);
        let paths: Vec<_> = predicate.conditions().iter().map(|c| c.path.clone()).collect();
        let leaves: Vec<_> = tree.leaves().iter().map(|l| l.path.clone()).collect();
        prop_assert_eq!(paths, leaves);
    }
}

// ============================================================================
// Evaluation laws
// ============================================================================

proptest! {
    #[test]
    fn negation_inverts(ks in arb_thresholds(), connector in arb_connector(), n in -6i64..6) {
        let record = json!({"n": n});
        let predicate = Predicate::compound(connector, ks.into_iter().map(threshold).collect());

        let plain = predicate.evaluator().matches(&record);
        let negated = (!predicate.clone()).evaluator().matches(&record);
        prop_assert_eq!(negated, !plain);
        prop_assert_eq!(!!predicate.clone(), predicate);
    }

    #[test]
    fn xor_is_parity(ks in arb_thresholds(), n in -6i64..6) {
        let record = json!({"n": n});
        let trues = ks.iter().filter(|&&k| n > k).count();
        let predicate = Predicate::compound(Connector::Xor, ks.into_iter().map(threshold).collect());

        prop_assert_eq!(predicate.evaluator().matches(&record), trues % 2 == 1);
    }

    #[test]
    fn and_or_agree_with_children(ks in arb_thresholds(), n in -6i64..6) {
        let record = json!({"n": n});
        let results: Vec<bool> = ks.iter().map(|&k| n > k).collect();
        let children: Vec<_> = ks.into_iter().map(threshold).collect();

        let all = Predicate::compound(Connector::And, children.clone());
        let any = Predicate::compound(Connector::Or, children);
        prop_assert_eq!(all.evaluator().matches(&record), results.iter().all(|&r| r));
        prop_assert_eq!(any.evaluator().matches(&record), results.iter().any(|&r| r));
    }

    #[test]
    fn filter_agrees_with_matches(ns in prop::collection::vec(-6i64..6, 0..20), k in -5i64..5) {
        let records: Vec<Value> = ns.iter().map(|n| json!({"n": n})).collect();
        let evaluator = threshold(k).evaluator();

        let kept = evaluator.filter(&records);
        prop_assert_eq!(kept.len(), evaluator.count(&records));
        prop_assert_eq!(kept.len(), ns.iter().filter(|&&n| n > k).count());
        prop_assert_eq!(evaluator.any(&records), !kept.is_empty());
    }
}
