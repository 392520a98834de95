// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subset sweep over the optionals of one random instance.

use fzg_token::{Graph, NodeId};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::random::{randomize, unroll_if_cyclic};
use crate::{Strategy, StrategyError};

/// Largest number of optionals one sweep can address.
pub const MAX_OPTIONALS: usize = 64;

/// `PermuteOptionals`: fix every other choice with one random pass, then
/// walk all `2^n` activation patterns of the `n` optionals found.
pub struct PermuteOptionals<'g> {
    graph: &'g mut Graph,
    root: NodeId,
    optionals: Vec<NodeId>,
    next: u128,
    end: u128,
}

impl<'g> PermuteOptionals<'g> {
    /// Set up the sweep. Fails with [`StrategyError::TooManyOptionals`] when
    /// more than [`MAX_OPTIONALS`] optionals are reachable.
    pub fn new(
        graph: &'g mut Graph,
        root: NodeId,
        seed: u64,
        max_repeat: usize,
    ) -> Result<Self, StrategyError> {
        let root = unroll_if_cyclic(graph, root, max_repeat);
        let mut rng = StdRng::seed_from_u64(seed);
        randomize(graph, root, &mut rng)?;

        let mut optionals = Vec::new();
        collect_optionals(graph, root, &mut optionals);
        if optionals.len() > MAX_OPTIONALS {
            return Err(StrategyError::TooManyOptionals {
                count: optionals.len(),
                limit: MAX_OPTIONALS,
            });
        }
        debug!(target: "fzg.strategy", optionals = optionals.len(), "collected optionals");

        let end = 1u128 << optionals.len();
        Ok(Self {
            graph,
            root,
            optionals,
            next: 0,
            end,
        })
    }

    /// Optionals in bit order.
    pub fn optionals(&self) -> &[NodeId] {
        &self.optionals
    }
}

/// Optionals in pre-order, not descending below inactive ones.
fn collect_optionals(graph: &Graph, id: NodeId, out: &mut Vec<NodeId>) {
    if graph.is_optional(id) {
        out.push(id);
        if !graph.is_active(id) {
            return;
        }
    }
    for child in graph.active_children(id) {
        collect_optionals(graph, child, out);
    }
}

impl Strategy for PermuteOptionals<'_> {
    fn name(&self) -> &'static str {
        "PermuteOptionals"
    }

    fn next_state(&mut self) -> Result<bool, StrategyError> {
        if self.next >= self.end {
            return Ok(false);
        }
        let bits = self.next;
        self.next += 1;
        for (i, &opt) in self.optionals.iter().enumerate() {
            if bits & (1 << i) != 0 {
                self.graph.activate(opt);
            } else {
                self.graph.deactivate(opt);
            }
        }
        self.graph.prepare(self.root);
        Ok(true)
    }

    fn graph(&self) -> &Graph {
        &*self.graph
    }

    fn root(&self) -> NodeId {
        self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_every_subset() {
        let mut g = Graph::new();
        let a = g.constant("a");
        let b = g.constant("b");
        let oa = g.optional(a);
        let ob = g.optional(b);
        let dash = g.constant("-");
        let root = g.concat(vec![oa, dash, ob]);
        let mut s = PermuteOptionals::new(&mut g, root, 0, 2).unwrap();
        assert_eq!(s.optionals(), [oa, ob]);
        let mut out = Vec::new();
        while s.next_state().unwrap() {
            out.push(s.render());
        }
        assert_eq!(out, ["-", "a-", "-b", "a-b"]);
    }

    #[test]
    fn graph_without_optionals_yields_once() {
        let mut g = Graph::new();
        let root = g.constant("x");
        let mut s = PermuteOptionals::new(&mut g, root, 0, 2).unwrap();
        assert!(s.next_state().unwrap());
        assert_eq!(s.render(), "x");
        assert!(!s.next_state().unwrap());
    }

    #[test]
    fn rejects_more_than_sixty_four_optionals() {
        let mut g = Graph::new();
        let items = (0..65)
            .map(|_| {
                let x = g.constant("x");
                g.optional(x)
            })
            .collect();
        let root = g.concat(items);
        assert!(matches!(
            PermuteOptionals::new(&mut g, root, 0, 2),
            Err(StrategyError::TooManyOptionals { count: 65, limit: 64 })
        ));
    }
}
