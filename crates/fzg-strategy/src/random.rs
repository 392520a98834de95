// SPDX-License-Identifier: MIT OR Apache-2.0
//! Seeded random generation.

use fzg_token::{Graph, NodeId};
use fzg_unroll::{loop_exists, unroll_pointers};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::{Strategy, StrategyError};

/// Outputs produced by [`RandomStrategy`] when no limit is given.
pub const DEFAULT_RANDOM_COUNT: usize = 1;

/// One uniformly random choice per active node and output.
pub struct RandomStrategy<'g> {
    graph: &'g mut Graph,
    root: NodeId,
    rng: StdRng,
    remaining: usize,
}

impl<'g> RandomStrategy<'g> {
    /// Self-referential graphs are unrolled with `max_repeat` first.
    pub fn new(
        graph: &'g mut Graph,
        root: NodeId,
        seed: u64,
        count: Option<usize>,
        max_repeat: usize,
    ) -> Self {
        let root = unroll_if_cyclic(graph, root, max_repeat);
        Self {
            graph,
            root,
            rng: StdRng::seed_from_u64(seed),
            remaining: count.unwrap_or(DEFAULT_RANDOM_COUNT),
        }
    }
}

impl Strategy for RandomStrategy<'_> {
    fn name(&self) -> &'static str {
        "random"
    }

    fn next_state(&mut self) -> Result<bool, StrategyError> {
        if self.remaining == 0 {
            return Ok(false);
        }
        self.remaining -= 1;
        randomize(self.graph, self.root, &mut self.rng)?;
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

pub(crate) fn unroll_if_cyclic(graph: &mut Graph, root: NodeId, max_repeat: usize) -> NodeId {
    if loop_exists(graph, root) {
        info!(target: "fzg.strategy", %root, max_repeat, "graph references itself, unrolling");
        unroll_pointers(graph, root, max_repeat)
    } else {
        root
    }
}

/// Pick a uniformly random local state for every node of the active tree,
/// top-down, so children are chosen after their parent's choice settled.
pub(crate) fn randomize(graph: &mut Graph, id: NodeId, rng: &mut StdRng) -> Result<(), StrategyError> {
    let count = graph.permutation_count(id);
    if count > 1 {
        graph.set_permutation(id, rng.gen_range(1..=count))?;
    }
    if graph.is_pointer(id) {
        if let Some(instance) = graph.materialize(id) {
            randomize(graph, instance, rng)?;
        }
        return Ok(());
    }
    for child in graph.active_children(id) {
        randomize(graph, child, rng)?;
    }
    Ok(())
}
