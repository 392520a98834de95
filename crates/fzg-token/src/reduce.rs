// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reduction spaces of optionals and repeats.
//!
//! An optional that is (or was) active reduces to "absent" (1) or "present"
//! (2). A repeat that held `n` items reduces to every subset of at least
//! `min` of those items, smallest subsets first; the last index always
//! restores all `n` items, so trying indices in order and falling back to the
//! maximum never loses content.

use crate::error::TokenError;
use crate::graph::Graph;
use crate::node::{NodeId, NodeKind, RepeatReduction};

impl Graph {
    /// Whether the node kind has a reduction space at all.
    pub fn is_reducible(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Optional(_) | NodeKind::Repeat(_))
    }

    /// Number of reduction states the node currently offers.
    ///
    /// Zero for inactive optionals and non-reducible kinds.
    pub fn reduction_count(&self, id: NodeId) -> usize {
        match self.kind(id) {
            NodeKind::Optional(o) if o.active || o.reducing => 2,
            NodeKind::Repeat(r) => {
                let n = r
                    .reduction
                    .as_ref()
                    .map_or(r.count as usize, |red| red.original.len());
                subset_count(n, r.min as usize)
            }
            _ => 0,
        }
    }

    /// Switch the node to reduction state `index`, 1-indexed.
    pub fn reduce(&mut self, id: NodeId, index: usize) -> Result<(), TokenError> {
        if !self.is_reducible(id) {
            return Err(TokenError::NotReducible(id));
        }
        let count = self.reduction_count(id);
        if index == 0 || index > count {
            return Err(TokenError::IndexOutOfBound {
                node: id,
                index,
                count,
            });
        }
        match self.kind_mut(id) {
            NodeKind::Optional(o) => {
                o.reducing = true;
                o.active = index == 2;
            }
            NodeKind::Repeat(r) => {
                let original = match r.reduction.take() {
                    Some(red) => red.original,
                    None => r.pool[..r.count as usize].to_vec(),
                };
                let kept = nth_subset(original.len(), r.min as usize, index - 1)
                    .into_iter()
                    .map(|i| original[i])
                    .collect();
                r.reduction = Some(RepeatReduction { original, kept });
            }
            _ => {}
        }
        Ok(())
    }

    /// Make the current reduction state the node's permanent state.
    pub fn settle_reduction(&mut self, id: NodeId) {
        match self.kind_mut(id) {
            NodeKind::Optional(o) => o.reducing = false,
            NodeKind::Repeat(r) => {
                if let Some(red) = r.reduction.take() {
                    r.count = red.kept.len() as u32;
                    r.pool = red.kept;
                }
            }
            _ => {}
        }
    }
}

/// `C(n, k)`, saturating at `usize::MAX`.
pub(crate) fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = match acc.checked_mul((n - i) as u128) {
            Some(v) => v / (i as u128 + 1),
            None => return usize::MAX,
        };
        if acc > usize::MAX as u128 {
            return usize::MAX;
        }
    }
    acc as usize
}

/// Number of subsets of `n` items holding at least `min` of them.
pub(crate) fn subset_count(n: usize, min: usize) -> usize {
    (min..=n).fold(0usize, |acc, l| acc.saturating_add(binomial(n, l)))
}

/// The `index`-th subset (0-based) of `0..n` with at least `min` members,
/// ordered by size and then lexicographically.
pub(crate) fn nth_subset(n: usize, min: usize, mut index: usize) -> Vec<usize> {
    for size in min..=n {
        let c = binomial(n, size);
        if index < c {
            return nth_combination(n, size, index);
        }
        index -= c;
    }
    (0..n).collect()
}

fn nth_combination(n: usize, size: usize, mut index: usize) -> Vec<usize> {
    let mut out = Vec::with_capacity(size);
    let mut next = 0;
    for pos in 0..size {
        let mut x = next;
        loop {
            let c = binomial(n - x - 1, size - pos - 1);
            if index < c {
                out.push(x);
                next = x + 1;
                break;
            }
            index -= c;
            x += 1;
        }
    }
    out
}
