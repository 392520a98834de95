// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property-based tests for exhaustive enumeration over random acyclic graphs.

use fzg_strategy::{StrategyOptions, almost_all_count, run_enumeration};
use fzg_token::{GraphDocument, TokenSpec};
use proptest::prelude::*;

fn token_spec() -> impl Strategy<Value = TokenSpec> {
    let leaf = prop_oneof![
        "[a-c]{1,2}".prop_map(TokenSpec::constant),
        (0i64..3, 0i64..3).prop_map(|(from, span)| TokenSpec::Range {
            from,
            to: from + span,
            step: 1,
        }),
    ];
    leaf.prop_recursive(3, 12, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..3).prop_map(TokenSpec::concat),
            prop::collection::vec(inner.clone(), 1..3).prop_map(TokenSpec::one),
            inner.clone().prop_map(TokenSpec::optional),
            inner.prop_map(|item| TokenSpec::repeat(item, 0, 2)),
        ]
    })
}

/// A document whose start rule uses one shared rule from several places,
/// including as every item of a repeat.
fn shared_rule_document() -> impl Strategy<Value = GraphDocument> {
    (token_spec(), token_spec(), 1u32..3).prop_map(|(body, shared, min)| {
        GraphDocument::new(TokenSpec::concat([
            body,
            TokenSpec::repeat(TokenSpec::reference("S"), min, min + 1),
            TokenSpec::optional(TokenSpec::reference("S")),
        ]))
        .with_rule("S", shared)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(150))]

    #[test]
    fn shared_rules_enumerate_their_full_count(doc in shared_rule_document()) {
        let mut compiled = doc.compile().unwrap();
        let total = compiled.graph.total_permutation_count(compiled.root);
        let initial = compiled.graph.render(compiled.root);

        let root = fzg_unroll::unroll_pointers(&mut compiled.graph, compiled.root, 2);
        prop_assert_eq!(compiled.graph.render(root), initial);
        prop_assert_eq!(compiled.graph.total_permutation_count(root), total);
        prop_assume!(total <= 2_000);

        let count = run_enumeration("AllPermutations", &mut compiled.graph, root, &StrategyOptions::default())
            .unwrap()
            .count() as u64;
        prop_assert_eq!(count, total);
    }

    #[test]
    fn all_permutations_yields_total_count(spec in token_spec()) {
        let mut compiled = GraphDocument::new(spec).compile().unwrap();
        let total = compiled.graph.total_permutation_count(compiled.root);
        prop_assume!(total <= 2_000);

        let states = run_enumeration(
            "AllPermutations",
            &mut compiled.graph,
            compiled.root,
            &StrategyOptions::default(),
        )
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
        prop_assert_eq!(states.len() as u64, total);
    }

    #[test]
    fn almost_all_yields_its_count(spec in token_spec()) {
        let mut compiled = GraphDocument::new(spec).compile().unwrap();
        let expected = almost_all_count(&compiled.graph, compiled.root);
        prop_assume!(expected <= 2_000);

        let states = run_enumeration(
            "AlmostAllPermutations",
            &mut compiled.graph,
            compiled.root,
            &StrategyOptions::default(),
        )
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
        prop_assert_eq!(states.len() as u64, expected);
    }

    #[test]
    fn enumeration_is_reproducible(spec in token_spec()) {
        let compiled = GraphDocument::new(spec).compile().unwrap();
        prop_assume!(compiled.graph.total_permutation_count(compiled.root) <= 500);

        let run = |mut graph: fzg_token::Graph| {
            let states: Vec<String> =
                run_enumeration("AllPermutations", &mut graph, compiled.root, &StrategyOptions::default())
                    .unwrap()
                    .collect::<Result<_, _>>()
                    .unwrap();
            states
        };
        prop_assert_eq!(run(compiled.graph.clone()), run(compiled.graph.clone()));
    }

    #[test]
    fn permute_optionals_yields_power_of_two_states(spec in token_spec(), seed in any::<u64>()) {
        let mut compiled = GraphDocument::new(spec).compile().unwrap();
        let options = StrategyOptions { seed, limit: Some(256), ..Default::default() };
        let states = run_enumeration("PermuteOptionals", &mut compiled.graph, compiled.root, &options)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        prop_assert!(!states.is_empty());
        prop_assert!(states.len().is_power_of_two());
    }
}
