// SPDX-License-Identifier: MIT OR Apache-2.0
//! Properties that only hold when the crates work together.

use std::collections::BTreeSet;

use fzg_reduce::{Feedback, reduce_with};
use fzg_strategy::{StrategyOptions, run_enumeration};
use fzg_token::{GraphDocument, TokenSpec};
use proptest::prelude::*;

fn token_spec() -> impl Strategy<Value = TokenSpec> {
    let leaf = prop_oneof![
        "[a-c]{0,2}".prop_map(TokenSpec::constant),
        (0i64..5, 0i64..4).prop_map(|(from, span)| TokenSpec::Range {
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
            (inner, 0u32..2).prop_map(|(item, min)| TokenSpec::repeat(item, min, min + 1)),
        ]
    })
}

/// A bare spec, or one whose start rule uses a shared rule from several
/// places, including as every item of a repeat with `min >= 1`.
fn document() -> impl Strategy<Value = GraphDocument> {
    prop_oneof![
        token_spec().prop_map(GraphDocument::new),
        (token_spec(), token_spec(), 1u32..3).prop_map(|(body, shared, min)| {
            GraphDocument::new(TokenSpec::concat([
                body,
                TokenSpec::repeat(TokenSpec::reference("S"), min, min + 1),
                TokenSpec::optional(TokenSpec::reference("S")),
            ]))
            .with_rule("S", shared)
        }),
    ]
}

/// A rule that refers to itself through a choice, wrapped around `body`.
fn recursive_doc(body: TokenSpec) -> GraphDocument {
    GraphDocument::new(TokenSpec::reference("R")).with_rule(
        "R",
        TokenSpec::concat([
            body,
            TokenSpec::one([TokenSpec::reference("R"), TokenSpec::constant("")]),
        ]),
    )
}

/// Every state of `doc`, or `None` when there are too many to walk.
fn all_states(doc: &GraphDocument, strategy: &str) -> Option<Vec<String>> {
    let mut compiled = doc.compile().unwrap();
    let root = fzg_unroll::unroll_pointers(&mut compiled.graph, compiled.root, 2);
    if compiled.graph.total_permutation_count(root) > 5_000 {
        return None;
    }
    let states = run_enumeration(strategy, &mut compiled.graph, root, &StrategyOptions::default())
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    Some(states)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn enumerated_states_match_back(doc in document()) {
        let states = all_states(&doc, "AllPermutations");
        prop_assume!(states.is_some());
        for text in states.unwrap_or_default().into_iter().take(50) {
            let mut compiled = doc.compile().unwrap();
            fzg_match::instantiate(&mut compiled.graph, compiled.root, &text).unwrap();
            prop_assert_eq!(compiled.graph.render(compiled.root), text);
        }
    }

    #[test]
    fn almost_all_texts_are_a_subset_of_all(doc in document()) {
        let (Some(all), Some(almost)) = (
            all_states(&doc, "AllPermutations"),
            all_states(&doc, "AlmostAllPermutations"),
        ) else {
            return Err(TestCaseError::reject("too many states"));
        };
        let all: BTreeSet<String> = all.into_iter().collect();
        let almost: BTreeSet<String> = almost.into_iter().collect();
        prop_assert!(almost.is_subset(&all));
    }

    #[test]
    fn unrolled_recursion_enumerates_its_full_count(spec in token_spec()) {
        let doc = recursive_doc(spec);
        let mut compiled = doc.compile().unwrap();
        prop_assert!(fzg_unroll::loop_exists(&compiled.graph, compiled.root));

        let root = fzg_unroll::unroll_pointers(&mut compiled.graph, compiled.root, 2);
        let total = compiled.graph.total_permutation_count(root);
        prop_assume!(total <= 2_000);
        let count = run_enumeration("AllPermutations", &mut compiled.graph, root, &StrategyOptions::default())
            .unwrap()
            .count() as u64;
        prop_assert_eq!(count, total);
    }

    #[test]
    fn reducing_any_state_never_grows(doc in document(), pick in any::<prop::sample::Index>(), good in any::<u64>()) {
        let Some(states) = all_states(&doc, "AllPermutations") else {
            return Err(TestCaseError::reject("too many states"));
        };
        let text = pick.get(&states).clone();

        let mut compiled = doc.compile().unwrap();
        fzg_match::instantiate(&mut compiled.graph, compiled.root, &text).unwrap();
        let mut call = 0u32;
        let report = reduce_with(&mut compiled.graph, compiled.root, |_| {
            call += 1;
            if (good >> (call % 64)) & 1 == 1 { Feedback::Good } else { Feedback::Bad }
        }).unwrap();
        prop_assert_eq!(&report.original, &text);
        prop_assert!(report.reduced.len() <= text.len());
    }
}
