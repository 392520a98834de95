// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property-based tests for `fzg-token` over random acyclic graphs.

use fzg_token::{GraphDocument, TokenSpec};
use proptest::prelude::*;

/// Strategy: a small acyclic token tree.
fn token_spec() -> impl Strategy<Value = TokenSpec> {
    let leaf = prop_oneof![
        "[a-z]{0,3}".prop_map(TokenSpec::constant),
        (0i64..5, 0i64..4, 1i64..3).prop_map(|(from, span, step)| TokenSpec::Range {
            from,
            to: from + span,
            step,
        }),
    ];
    leaf.prop_recursive(4, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(TokenSpec::concat),
            prop::collection::vec(inner.clone(), 1..4).prop_map(TokenSpec::one),
            inner.clone().prop_map(TokenSpec::optional),
            (inner, 0u32..2, 0u32..2)
                .prop_map(|(item, min, extra)| TokenSpec::repeat(item, min, min + extra)),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn render_is_deterministic(spec in token_spec()) {
        let mut compiled = GraphDocument::new(spec).compile().unwrap();
        compiled.graph.prepare(compiled.root);
        let first = compiled.graph.render(compiled.root);
        prop_assert_eq!(&first, &compiled.graph.render(compiled.root));
    }

    #[test]
    fn clone_renders_like_original(spec in token_spec()) {
        let mut compiled = GraphDocument::new(spec).compile().unwrap();
        let g = &mut compiled.graph;
        let copy = g.deep_clone(compiled.root);
        prop_assert_eq!(g.render(compiled.root), g.render(copy));
        prop_assert_eq!(
            g.total_permutation_count(compiled.root),
            g.total_permutation_count(copy)
        );
    }

    #[test]
    fn total_count_is_positive(spec in token_spec()) {
        let compiled = GraphDocument::new(spec).compile().unwrap();
        prop_assert!(compiled.graph.total_permutation_count(compiled.root) >= 1);
    }

    #[test]
    fn every_local_permutation_is_reachable(spec in token_spec()) {
        let mut compiled = GraphDocument::new(spec).compile().unwrap();
        let g = &mut compiled.graph;
        let root = compiled.root;
        let count = g.permutation_count(root);
        for i in 1..=count {
            g.set_permutation(root, i).unwrap();
            prop_assert_eq!(g.permutation(root), i);
        }
        prop_assert!(g.set_permutation(root, count + 1).is_err());
    }

    #[test]
    fn last_reduction_restores_text(spec in token_spec()) {
        let mut compiled = GraphDocument::new(spec).compile().unwrap();
        let g = &mut compiled.graph;
        let root = compiled.root;
        let count = g.permutation_count(root);
        g.set_permutation(root, count).unwrap();
        let before = g.render(root);
        let reductions = g.reduction_count(root);
        if reductions > 0 {
            for i in 1..=reductions {
                g.reduce(root, i).unwrap();
            }
            prop_assert_eq!(g.render(root), before);
        }
    }
}
