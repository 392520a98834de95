// SPDX-License-Identifier: MIT OR Apache-2.0
//! fzg-unroll
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Cycle detection and bounded unrolling of pointer nodes.
//!
//! Pointers are the only edges in a token graph that may form cycles. Before
//! an exhaustive walk, [`loop_exists`] tells whether the graph can be walked
//! at all; [`unroll_pointers`] turns a self-referential graph into a finite
//! tree by replacing each pointer with a clone of its target, at most
//! `max_repeat` times per original target along any path.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use fzg_token::{Graph, NodeId, NodeKind, Removal};
use tracing::{debug, info};

/// Default bound on how often one original target is expanded along a path.
pub const DEFAULT_MAX_REPEAT: usize = 2;

/// Whether a pointer reachable from `root` leads back to an already visited
/// node.
///
/// Breadth-first over owned children. A pointer whose target has already been
/// visited reports a loop, which also flags targets shared by two pointers.
pub fn loop_exists(graph: &Graph, root: NodeId) -> bool {
    let mut visited = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);

    while let Some(id) = queue.pop_front() {
        if graph.is_pointer(id) {
            if let Some(target) = graph.pointer_target(id) {
                if !visited.insert(target) {
                    debug!(target: "fzg.unroll", pointer = %id, %target, "pointer revisits node");
                    return true;
                }
                queue.push_back(target);
            }
            continue;
        }
        for child in graph.structural_children(id) {
            if visited.insert(child) {
                queue.push_back(child);
            }
        }
    }
    false
}

struct Item {
    node: NodeId,
    parent: Option<NodeId>,
    seen: BTreeMap<NodeId, usize>,
}

/// Replace every pointer reachable from `root` by clones of its target, at
/// most `max_repeat` per original target along each path, and return the new
/// root.
///
/// Pointers beyond the bound are cut. Cutting prunes upward: a parent that
/// cannot live without the pointer is removed from its own parent, and so on.
/// If pruning reaches the root, the result is an empty concatenation.
pub fn unroll_pointers(graph: &mut Graph, root: NodeId, max_repeat: usize) -> NodeId {
    let templates = snapshot_targets(graph, root);
    let mut unroller = Unroller {
        graph,
        root,
        parents: HashMap::new(),
        detached: HashSet::new(),
        order: Vec::new(),
        expanded: 0,
        cut: 0,
    };

    let mut queue = VecDeque::from([Item {
        node: root,
        parent: None,
        seen: BTreeMap::new(),
    }]);

    while let Some(Item {
        node,
        parent,
        mut seen,
    }) = queue.pop_front()
    {
        if unroller.is_detached(node) {
            continue;
        }
        if templates.contains_key(&node) {
            *seen.entry(node).or_default() += 1;
        }

        if unroller.graph.is_pointer(node) {
            let expansion = unroller
                .graph
                .resolve(node)
                .and_then(|target| templates.get(&target).map(|&tpl| (target, tpl)));
            match expansion {
                Some((original, template)) if seen.get(&original).copied().unwrap_or(0) < max_repeat => {
                    let clone = unroller.graph.deep_clone(template);
                    unroller.splice(parent, node, clone);
                    *seen.entry(original).or_default() += 1;
                    debug!(
                        target: "fzg.unroll",
                        pointer = %node,
                        %original,
                        %clone,
                        depth = seen[&original],
                        "expanded pointer"
                    );
                    queue.push_back(Item {
                        node: clone,
                        parent,
                        seen,
                    });
                }
                _ => unroller.cut(node),
            }
            continue;
        }

        unroller.order.push(node);
        for child in unroller.graph.structural_children(node) {
            unroller.parents.insert(child, node);
            queue.push_back(Item {
                node: child,
                parent: Some(node),
                seen: seen.clone(),
            });
        }
    }

    // Innermost first, so outer repeats clone already refreshed templates.
    for &id in unroller.order.iter().rev() {
        if matches!(unroller.graph.kind(id), NodeKind::Repeat(_)) && !unroller.is_detached(id) {
            unroller.graph.refresh(id);
        }
    }

    info!(
        target: "fzg.unroll",
        expanded = unroller.expanded,
        cut = unroller.cut,
        max_repeat,
        "unrolled pointers"
    );
    unroller.root
}

/// Frozen copies of every node a reachable pointer chain resolves to, taken
/// before any mutation so sibling expansions never see each other's edits.
fn snapshot_targets(graph: &mut Graph, root: NodeId) -> BTreeMap<NodeId, NodeId> {
    let mut originals = Vec::new();
    let mut visited = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    while let Some(id) = queue.pop_front() {
        let next = if graph.is_pointer(id) {
            match graph.resolve(id) {
                Some(target) => {
                    if !originals.contains(&target) {
                        originals.push(target);
                    }
                    vec![target]
                }
                None => Vec::new(),
            }
        } else {
            graph.structural_children(id)
        };
        for child in next {
            if visited.insert(child) {
                queue.push_back(child);
            }
        }
    }

    originals
        .into_iter()
        .map(|original| (original, graph.deep_clone(original)))
        .collect()
}

struct Unroller<'g> {
    graph: &'g mut Graph,
    root: NodeId,
    parents: HashMap<NodeId, NodeId>,
    detached: HashSet<NodeId>,
    order: Vec<NodeId>,
    expanded: usize,
    cut: usize,
}

impl Unroller<'_> {
    fn is_detached(&self, mut id: NodeId) -> bool {
        loop {
            if self.detached.contains(&id) {
                return true;
            }
            match self.parents.get(&id) {
                Some(&parent) => id = parent,
                None => return false,
            }
        }
    }

    fn splice(&mut self, parent: Option<NodeId>, old: NodeId, new: NodeId) {
        self.expanded += 1;
        match parent {
            Some(parent) => {
                self.graph.replace_child(parent, old, new);
                self.parents.insert(new, parent);
            }
            None => self.root = new,
        }
    }

    fn cut(&mut self, pointer: NodeId) {
        self.cut += 1;
        self.graph.set_pointer_target(pointer, None);
        let mut child = pointer;
        loop {
            self.detached.insert(child);
            let Some(&parent) = self.parents.get(&child) else {
                debug!(target: "fzg.unroll", node = %child, "pruning reached the root");
                self.root = self.graph.concat(Vec::new());
                return;
            };
            match self.graph.remove_child(parent, child) {
                Removal::Kept => return,
                Removal::ParentInvalid => {
                    debug!(target: "fzg.unroll", node = %parent, "pruned invalid parent");
                    child = parent;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// `A = "a" (A | "")`
    fn self_referential() -> (Graph, NodeId) {
        let mut g = Graph::new();
        let a = g.constant("a");
        let ptr = g.pointer(None);
        let empty = g.constant("");
        let choice = g.one(vec![ptr, empty]).unwrap();
        let root = g.concat(vec![a, choice]);
        g.set_pointer_target(ptr, Some(root));
        (g, root)
    }

    #[test]
    fn tree_has_no_loop() {
        let mut g = Graph::new();
        let a = g.constant("a");
        let opt = g.optional(a);
        let root = g.concat(vec![opt]);
        assert!(!loop_exists(&g, root));
    }

    #[test]
    fn self_reference_is_a_loop() {
        let (g, root) = self_referential();
        assert!(loop_exists(&g, root));
    }

    #[test]
    fn dangling_pointer_is_not_a_loop() {
        let mut g = Graph::new();
        let ptr = g.pointer(None);
        let root = g.concat(vec![ptr]);
        assert!(!loop_exists(&g, root));
    }

    #[test]
    fn self_reference_unrolls_to_bound() {
        let (mut g, root) = self_referential();
        let root = unroll_pointers(&mut g, root, DEFAULT_MAX_REPEAT);
        assert!(!loop_exists(&g, root));
        assert_eq!(g.render(root), "aa");
        assert_eq!(g.total_permutation_count(root), 2);
    }

    #[test]
    fn bound_of_one_keeps_only_the_original() {
        let (mut g, root) = self_referential();
        let root = unroll_pointers(&mut g, root, 1);
        assert_eq!(g.render(root), "a");
        assert_eq!(g.total_permutation_count(root), 1);
    }

    #[test]
    fn pointer_to_pointer_cycle_is_cut() {
        let mut g = Graph::new();
        let p1 = g.pointer(None);
        let p2 = g.pointer(Some(p1));
        g.set_pointer_target(p1, Some(p2));
        let x = g.constant("x");
        let opt = g.optional(p1);
        let root = g.concat(vec![x, opt]);
        let root = unroll_pointers(&mut g, root, 2);
        assert_eq!(g.render(root), "x");
        assert_eq!(g.structural_children(root).len(), 1);
    }

    #[test]
    fn pruning_to_the_root_yields_empty_concat() {
        let mut g = Graph::new();
        let ptr = g.pointer(None);
        let root = g.concat(vec![ptr]);
        g.set_pointer_target(ptr, Some(root));
        let root = unroll_pointers(&mut g, root, 1);
        assert_eq!(g.render(root), "");
        assert!(matches!(g.kind(root), NodeKind::Concat(c) if c.is_empty()));
    }

    #[test]
    fn root_pointer_is_replaced() {
        let mut g = Graph::new();
        let x = g.constant("x");
        let root = g.pointer(Some(x));
        let root = unroll_pointers(&mut g, root, 2);
        assert!(!g.is_pointer(root));
        assert_eq!(g.render(root), "x");
    }
}
