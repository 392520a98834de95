// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz linear reduction with arbitrary verdict sequences.
//!
//! The reduced text never grows and every `Good` candidate stays reachable.
#![no_main]
use fzg_reduce::{Feedback, reduce_with};
use fzg_token::{Graph, NodeId};
use libfuzzer_sys::fuzz_target;

/// Build a small graph from bytes: each byte adds one node over copies of
/// earlier ones.
fn build(data: &[u8]) -> Option<(Graph, NodeId)> {
    let mut graph = Graph::new();
    let mut pool: Vec<NodeId> = vec![graph.constant("x"), graph.constant("yz")];
    for &b in data.iter().take(10) {
        let a = graph.deep_clone(pool[b as usize % pool.len()]);
        let c = graph.deep_clone(pool[(b as usize / 7) % pool.len()]);
        let node = match b % 4 {
            0 => graph.concat(vec![a, c]),
            1 => graph.optional(a),
            2 => graph.one(vec![a, c]).ok()?,
            _ => graph.repeat(a, 0, 2).ok()?,
        };
        pool.push(node);
    }
    let root = *pool.last()?;
    Some((graph, root))
}

fn expand(graph: &mut Graph, id: NodeId) {
    let count = graph.permutation_count(id);
    let _ = graph.set_permutation(id, count);
    for child in graph.active_children(id) {
        expand(graph, child);
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let (shape, verdicts) = rest.split_at((split as usize).min(rest.len()));
    let Some((mut graph, root)) = build(shape) else {
        return;
    };
    expand(&mut graph, root);

    let mut calls = 0usize;
    let report = reduce_with(&mut graph, root, |_| {
        let bit = verdicts.get(calls / 8).map_or(0, |b| (b >> (calls % 8)) & 1);
        calls += 1;
        if bit == 1 { Feedback::Good } else { Feedback::Bad }
    })
    .expect("linear reduction follows its own protocol");

    assert!(report.reduced.len() <= report.original.len());
    assert_eq!(report.stats.good + report.stats.bad, calls);
});
