// SPDX-License-Identifier: MIT OR Apache-2.0
//! Exhaustive enumeration by mixed-radix counting.
//!
//! Every node with more than one local state is a digit. Digits are ordered
//! by a pre-order walk of the active tree, so which digits exist (and how
//! many) depends on the values of the digits before them. After each output
//! the last digit that can still grow is incremented, everything after it is
//! dropped, and the walk is repeated to rediscover the remaining digits from
//! their first value.
//!
//! An inactive optional contributes no digits for its subtree, so
//! [`Coverage::All`] already counts it as a single state. The relaxation of
//! [`Coverage::AlmostAll`] is about repeats only: items after the first copy
//! the first item's choices. It does not prune optional substructure.

use fzg_token::{Graph, NodeId, NodeKind};
use fzg_unroll::loop_exists;
use tracing::debug;

use crate::{Strategy, StrategyError};

/// Which parts of the cross product are walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// Every combination.
    All,
    /// Items of a repeat after the first copy the first item's choices.
    AlmostAll,
}

#[derive(Debug, Clone, Copy)]
struct Digit {
    node: NodeId,
    value: usize,
    radix: usize,
}

/// `AllPermutations` and `AlmostAllPermutations`.
pub struct Permutations<'g> {
    graph: &'g mut Graph,
    root: NodeId,
    coverage: Coverage,
    digits: Vec<Digit>,
    mirrors: Vec<(NodeId, NodeId)>,
    started: bool,
    done: bool,
}

impl<'g> Permutations<'g> {
    /// Prepare an enumeration of `root`. Refuses self-referential graphs.
    pub fn new(graph: &'g mut Graph, root: NodeId, coverage: Coverage) -> Result<Self, StrategyError> {
        if loop_exists(graph, root) {
            return Err(StrategyError::EndlessLoopDetected);
        }
        Ok(Self {
            graph,
            root,
            coverage,
            digits: Vec::new(),
            mirrors: Vec::new(),
            started: false,
            done: false,
        })
    }

    /// Re-walk the active tree, keeping the first `keep` digits and starting
    /// every digit after them at its first value.
    fn rebuild(&mut self, keep: usize) -> Result<(), StrategyError> {
        self.digits.truncate(keep);
        self.mirrors.clear();
        let mut cursor = 0;
        self.walk(self.root, keep, &mut cursor)?;
        for &(from, to) in self.mirrors.iter().rev() {
            self.graph.mirror_choices(from, to)?;
        }
        Ok(())
    }

    fn walk(&mut self, id: NodeId, keep: usize, cursor: &mut usize) -> Result<(), StrategyError> {
        let radix = self.graph.permutation_count(id);
        if radix > 1 {
            if *cursor < keep {
                let value = self.digits[*cursor].value;
                self.graph.set_permutation(id, value)?;
            } else {
                self.graph.set_permutation(id, 1)?;
                self.digits.push(Digit {
                    node: id,
                    value: 1,
                    radix,
                });
            }
            *cursor += 1;
        }

        if self.graph.is_pointer(id) {
            if let Some(instance) = self.graph.materialize(id) {
                self.walk(instance, keep, cursor)?;
            }
            return Ok(());
        }

        let mut children = self.graph.active_children(id);
        if self.coverage == Coverage::AlmostAll
            && matches!(self.graph.kind(id), NodeKind::Repeat(_))
            && children.len() > 1
        {
            let first = children[0];
            for &other in &children[1..] {
                self.mirrors.push((first, other));
            }
            children.truncate(1);
        }
        for child in children {
            self.walk(child, keep, cursor)?;
        }
        Ok(())
    }

    /// Increment the last digit with room left. Returns `false` once every
    /// digit is at its maximum.
    fn advance(&mut self) -> Result<bool, StrategyError> {
        let Some(pos) = self.digits.iter().rposition(|d| d.value < d.radix) else {
            return Ok(false);
        };
        self.digits[pos].value += 1;
        debug!(
            target: "fzg.strategy",
            digit = pos,
            node = %self.digits[pos].node,
            value = self.digits[pos].value,
            radix = self.digits[pos].radix,
            "advanced digit"
        );
        self.rebuild(pos + 1)?;
        Ok(true)
    }
}

impl Strategy for Permutations<'_> {
    fn name(&self) -> &'static str {
        match self.coverage {
            Coverage::All => "AllPermutations",
            Coverage::AlmostAll => "AlmostAllPermutations",
        }
    }

    fn next_state(&mut self) -> Result<bool, StrategyError> {
        if self.done {
            return Ok(false);
        }
        if !self.started {
            self.started = true;
            self.rebuild(0)?;
        } else if !self.advance()? {
            self.done = true;
            return Ok(false);
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

/// Number of states [`Coverage::AlmostAll`] yields for an acyclic graph,
/// saturating at `u64::MAX`.
pub fn almost_all_count(graph: &Graph, id: NodeId) -> u64 {
    match graph.kind(id) {
        NodeKind::Repeat(r) => {
            let item = almost_all_count(graph, r.template());
            (r.min()..=r.max()).fold(0u64, |acc, k| {
                acc.saturating_add(if k == 0 { 1 } else { item })
            })
        }
        NodeKind::Concat(children) => children
            .iter()
            .fold(1u64, |acc, &c| acc.saturating_mul(almost_all_count(graph, c))),
        NodeKind::One(o) => o
            .alternatives()
            .iter()
            .fold(0u64, |acc, &c| acc.saturating_add(almost_all_count(graph, c))),
        NodeKind::Optional(o) => 1u64.saturating_add(almost_all_count(graph, o.child())),
        NodeKind::Pointer(p) => p.target().map_or(1, |t| almost_all_count(graph, t)),
        NodeKind::Variable(v) => almost_all_count(graph, v.child()),
        NodeKind::Range(r) => r.len() as u64,
        NodeKind::Const(_)
        | NodeKind::SequenceNext(_)
        | NodeKind::SequenceExisting(_)
        | NodeKind::VariableRef(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(strategy: &mut dyn Strategy) -> Vec<String> {
        let mut out = Vec::new();
        while strategy.next_state().unwrap() {
            out.push(strategy.render());
        }
        out
    }

    fn digits(g: &mut Graph) -> NodeId {
        let alts = ["1", "2", "3"].iter().map(|s| g.constant(*s)).collect();
        g.one(alts).unwrap()
    }

    #[test]
    fn choice_yields_each_alternative() {
        let mut g = Graph::new();
        let root = digits(&mut g);
        let mut s = Permutations::new(&mut g, root, Coverage::All).unwrap();
        assert_eq!(collect(&mut s), ["1", "2", "3"]);
        assert!(!s.next_state().unwrap());
    }

    #[test]
    fn optional_then_mandatory() {
        let mut g = Graph::new();
        let one = g.constant("1");
        let opt = g.optional(one);
        let two = g.constant("2");
        let root = g.concat(vec![opt, two]);
        let mut s = Permutations::new(&mut g, root, Coverage::All).unwrap();
        assert_eq!(collect(&mut s), ["2", "12"]);
    }

    #[test]
    fn counting_order_is_last_digit_fastest() {
        let mut g = Graph::new();
        let a = g.constant("a");
        let b = g.constant("b");
        let ab = g.one(vec![a, b]).unwrap();
        let d = digits(&mut g);
        let root = g.concat(vec![ab, d]);
        let mut s = Permutations::new(&mut g, root, Coverage::All).unwrap();
        assert_eq!(collect(&mut s), ["a1", "a2", "a3", "b1", "b2", "b3"]);
    }

    #[test]
    fn repeat_expands_item_digits() {
        let mut g = Graph::new();
        let x = g.constant("x");
        let y = g.constant("y");
        let xy = g.one(vec![x, y]).unwrap();
        let root = g.repeat(xy, 0, 2).unwrap();
        let total = g.total_permutation_count(root);
        let mut s = Permutations::new(&mut g, root, Coverage::All).unwrap();
        let out = collect(&mut s);
        assert_eq!(out, ["", "x", "y", "xx", "xy", "yx", "yy"]);
        assert_eq!(out.len() as u64, total);
    }

    #[test]
    fn inactive_optional_is_one_state_under_both_coverages() {
        for coverage in [Coverage::All, Coverage::AlmostAll] {
            let mut g = Graph::new();
            let a = g.constant("a");
            let b = g.constant("b");
            let ab = g.one(vec![a, b]).unwrap();
            let opt = g.optional(ab);
            let bang = g.constant("!");
            let root = g.concat(vec![opt, bang]);
            assert_eq!(g.total_permutation_count(root), 3);
            let mut s = Permutations::new(&mut g, root, coverage).unwrap();
            assert_eq!(collect(&mut s), ["!", "a!", "b!"]);
        }
    }

    #[test]
    fn almost_all_mirrors_repeat_items() {
        let mut g = Graph::new();
        let x = g.constant("x");
        let y = g.constant("y");
        let xy = g.one(vec![x, y]).unwrap();
        let root = g.repeat(xy, 0, 2).unwrap();
        assert_eq!(almost_all_count(&g, root), 5);
        let mut s = Permutations::new(&mut g, root, Coverage::AlmostAll).unwrap();
        assert_eq!(collect(&mut s), ["", "x", "y", "xx", "yy"]);
    }

    #[test]
    fn refuses_self_reference() {
        let mut g = Graph::new();
        let a = g.constant("a");
        let ptr = g.pointer(None);
        let root = g.concat(vec![a, ptr]);
        g.set_pointer_target(ptr, Some(root));
        assert!(matches!(
            Permutations::new(&mut g, root, Coverage::All),
            Err(StrategyError::EndlessLoopDetected)
        ));
    }

    #[test]
    fn pointer_targets_are_enumerated_through_instances() {
        let mut g = Graph::new();
        let d = digits(&mut g);
        let ptr = g.pointer(Some(d));
        let dash = g.constant("-");
        let root = g.concat(vec![dash, ptr]);
        let mut s = Permutations::new(&mut g, root, Coverage::All).unwrap();
        assert_eq!(collect(&mut s), ["-1", "-2", "-3"]);
    }

    #[test]
    fn sequences_restart_per_output() {
        let mut g = Graph::new();
        let seq = g.sequence(1, 1);
        let n = g.sequence_next(seq);
        let x = g.constant("x");
        let xs = g.repeat(n, 1, 2).unwrap();
        let root = g.concat(vec![xs, x]);
        let mut s = Permutations::new(&mut g, root, Coverage::All).unwrap();
        assert_eq!(collect(&mut s), ["1x", "12x"]);
    }
}
