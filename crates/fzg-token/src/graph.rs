// SPDX-License-Identifier: MIT OR Apache-2.0
//! Arena-backed token graph.
//!
//! Nodes live in a flat arena and refer to each other through [`NodeId`]
//! handles. Children are owned by exactly one parent; pointer nodes are the
//! only edges that may alias or form cycles. Every operation mutates the graph
//! in place, so the graph *is* the current state of a run.

use crate::error::TokenError;
use crate::node::{
    Forward, List, NodeId, NodeKind, OneToken, OptionalToken, PointerToken, RangeToken,
    RepeatToken, SequenceId, SequenceSlot, VariableRefToken, VariableToken,
};

/// Result of asking a parent to drop one of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The parent is still meaningful without the child.
    Kept,
    /// The parent lost something it cannot live without and must be removed
    /// by its own parent in turn.
    ParentInvalid,
}

/// Counter state behind [`NodeKind::SequenceNext`] and
/// [`NodeKind::SequenceExisting`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SequenceState {
    pub(crate) start: i64,
    pub(crate) step: i64,
    pub(crate) next: i64,
    pub(crate) issued: Vec<i64>,
}

impl SequenceState {
    pub(crate) fn reset(&mut self) {
        self.next = self.start;
        self.issued.clear();
    }
}

/// The token graph arena.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<NodeKind>,
    pub(crate) sequences: Vec<SequenceState>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes ever allocated, reachable or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node has been allocated yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Borrow the kind of a node.
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()]
    }

    pub(crate) fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.index()]
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(kind);
        id
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Fixed text.
    pub fn constant(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Const(text.into()))
    }

    /// One integer of `from..=to` in `step` increments. Starts at `from`.
    pub fn range(&mut self, from: i64, to: i64, step: i64) -> Result<NodeId, TokenError> {
        if step <= 0 || from > to {
            return Err(TokenError::InvalidRange { from, to, step });
        }
        Ok(self.push(NodeKind::Range(RangeToken {
            from,
            to,
            step,
            value: from,
        })))
    }

    /// All children in order.
    pub fn concat(&mut self, children: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::Concat(children))
    }

    /// Exactly one of `alternatives`; the first is active.
    pub fn one(&mut self, alternatives: Vec<NodeId>) -> Result<NodeId, TokenError> {
        if alternatives.is_empty() {
            return Err(TokenError::EmptyChoice);
        }
        Ok(self.push(NodeKind::One(OneToken {
            alternatives,
            active: 0,
        })))
    }

    /// `child` or nothing. Starts inactive.
    pub fn optional(&mut self, child: NodeId) -> NodeId {
        self.push(NodeKind::Optional(OptionalToken {
            child,
            active: false,
            reducing: false,
        }))
    }

    /// `min..=max` clones of `template`. Starts with `min` items.
    pub fn repeat(&mut self, template: NodeId, min: u32, max: u32) -> Result<NodeId, TokenError> {
        if min > max {
            return Err(TokenError::InvalidRepeat { min, max });
        }
        let pool = (0..min).map(|_| self.deep_clone(template)).collect();
        Ok(self.push(NodeKind::Repeat(RepeatToken {
            template,
            min,
            max,
            pool,
            count: min,
            reduction: None,
        })))
    }

    /// Reference to `target`, or a dangling pointer to be bound later.
    pub fn pointer(&mut self, target: Option<NodeId>) -> NodeId {
        self.push(NodeKind::Pointer(PointerToken {
            target,
            instance: None,
        }))
    }

    /// Rebind a pointer. Any materialized instance is dropped. Returns `false`
    /// when `pointer` is not a pointer node.
    pub fn set_pointer_target(&mut self, pointer: NodeId, target: Option<NodeId>) -> bool {
        match self.kind_mut(pointer) {
            NodeKind::Pointer(p) => {
                p.target = target;
                p.instance = None;
                true
            }
            _ => false,
        }
    }

    /// Register a sequence counter starting at `start`.
    pub fn sequence(&mut self, start: i64, step: i64) -> SequenceId {
        let id = SequenceId(self.sequences.len() as u32);
        self.sequences.push(SequenceState {
            start,
            step,
            next: start,
            issued: Vec::new(),
        });
        id
    }

    /// Slot that takes the next value of `sequence`.
    pub fn sequence_next(&mut self, sequence: SequenceId) -> NodeId {
        self.push(NodeKind::SequenceNext(SequenceSlot {
            sequence,
            value: None,
        }))
    }

    /// Slot that repeats the most recently issued value of `sequence`.
    pub fn sequence_existing(&mut self, sequence: SequenceId) -> NodeId {
        self.push(NodeKind::SequenceExisting(SequenceSlot {
            sequence,
            value: None,
        }))
    }

    /// Bind the text of `child` to `name` for later siblings.
    pub fn variable(&mut self, name: impl Into<String>, child: NodeId) -> NodeId {
        self.push(NodeKind::Variable(VariableToken {
            name: name.into(),
            child,
        }))
    }

    /// Render the text bound to `name`.
    pub fn variable_ref(&mut self, name: impl Into<String>) -> NodeId {
        self.push(NodeKind::VariableRef(VariableRefToken {
            name: name.into(),
            resolved: None,
        }))
    }

    // -----------------------------------------------------------------------
    // Capabilities
    // -----------------------------------------------------------------------

    /// Forward capability of a node, if it has one.
    pub fn as_forward(&self, id: NodeId) -> Option<&dyn Forward> {
        match self.kind(id) {
            NodeKind::Optional(o) => Some(o as &dyn Forward),
            NodeKind::Pointer(p) => Some(p as &dyn Forward),
            NodeKind::Variable(v) => Some(v as &dyn Forward),
            _ => None,
        }
    }

    /// List capability of a node, if it has one.
    pub fn as_list(&self, id: NodeId) -> Option<&dyn List> {
        match self.kind(id) {
            NodeKind::Concat(c) => Some(c as &dyn List),
            NodeKind::One(o) => Some(o as &dyn List),
            NodeKind::Repeat(r) => Some(r as &dyn List),
            _ => None,
        }
    }

    /// Whether the node is an optional.
    pub fn is_optional(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Optional(_))
    }

    /// Whether the node currently renders its content. Only optionals can be
    /// inactive.
    pub fn is_active(&self, id: NodeId) -> bool {
        match self.kind(id) {
            NodeKind::Optional(o) => o.active,
            _ => true,
        }
    }

    /// Activate an optional. Returns `false` for other kinds.
    pub fn activate(&mut self, id: NodeId) -> bool {
        self.set_optional(id, true)
    }

    /// Deactivate an optional. Returns `false` for other kinds.
    pub fn deactivate(&mut self, id: NodeId) -> bool {
        self.set_optional(id, false)
    }

    fn set_optional(&mut self, id: NodeId, active: bool) -> bool {
        match self.kind_mut(id) {
            NodeKind::Optional(o) => {
                o.active = active;
                true
            }
            _ => false,
        }
    }

    /// Whether the node is a pointer.
    pub fn is_pointer(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Pointer(_))
    }

    /// Target of a pointer node; `None` for dangling pointers and other kinds.
    pub fn pointer_target(&self, id: NodeId) -> Option<NodeId> {
        match self.kind(id) {
            NodeKind::Pointer(p) => p.target,
            _ => None,
        }
    }

    /// Follow a chain of pointers to the first non-pointer node.
    ///
    /// Returns `None` for dangling chains and for chains that loop back on
    /// themselves without reaching a non-pointer node.
    pub fn resolve(&self, id: NodeId) -> Option<NodeId> {
        let mut seen = vec![id];
        let mut current = id;
        while let NodeKind::Pointer(p) = self.kind(current) {
            let next = p.target?;
            if seen.contains(&next) {
                return None;
            }
            seen.push(next);
            current = next;
        }
        Some(current)
    }

    /// Whether the node holds counters rewound by [`Graph::prepare`].
    pub fn is_resettable(&self, id: NodeId) -> bool {
        matches!(
            self.kind(id),
            NodeKind::SequenceNext(_) | NodeKind::SequenceExisting(_)
        )
    }

    /// Whether the node takes part in variable scope resolution.
    pub fn is_scoped(&self, id: NodeId) -> bool {
        matches!(
            self.kind(id),
            NodeKind::Variable(_) | NodeKind::VariableRef(_)
        )
    }

    /// Children the node owns, including inactive ones.
    ///
    /// Pointer targets are not owned and are not listed; use
    /// [`Graph::pointer_target`] to follow them.
    pub fn structural_children(&self, id: NodeId) -> Vec<NodeId> {
        if let Some(list) = self.as_list(id) {
            return list.structural();
        }
        match self.kind(id) {
            NodeKind::Pointer(_) => Vec::new(),
            _ => self
                .as_forward(id)
                .and_then(|f| f.structural())
                .into_iter()
                .collect(),
        }
    }

    /// Children that currently render, in order. A pointer's active child is
    /// its materialized instance, or its target before materialization.
    pub fn active_children(&self, id: NodeId) -> Vec<NodeId> {
        if let Some(list) = self.as_list(id) {
            return list.active();
        }
        self.as_forward(id)
            .and_then(|f| f.active())
            .into_iter()
            .collect()
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// Current text of the subtree rooted at `root`.
    ///
    /// An unmaterialized pointer whose target is already being rendered
    /// further up renders as empty text.
    pub fn render(&self, root: NodeId) -> String {
        let mut out = String::new();
        let mut path = Vec::new();
        self.render_into(root, &mut out, &mut path);
        out
    }

    fn render_into(&self, id: NodeId, out: &mut String, path: &mut Vec<NodeId>) {
        path.push(id);
        match self.kind(id) {
            NodeKind::Const(s) => out.push_str(s),
            NodeKind::Range(r) => out.push_str(&r.value.to_string()),
            NodeKind::Concat(children) => {
                for &c in children {
                    self.render_into(c, out, path);
                }
            }
            NodeKind::One(o) => self.render_into(o.alternatives[o.active], out, path),
            NodeKind::Optional(o) => {
                if o.active {
                    self.render_into(o.child, out, path);
                }
            }
            NodeKind::Repeat(r) => {
                for &item in r.items() {
                    self.render_into(item, out, path);
                }
            }
            NodeKind::Pointer(p) => match (p.instance, p.target) {
                (Some(instance), target) => {
                    path.extend(target);
                    self.render_into(instance, out, path);
                    if target.is_some() {
                        path.pop();
                    }
                }
                (None, Some(target)) if !path.contains(&target) => {
                    self.render_into(target, out, path);
                }
                _ => {}
            },
            NodeKind::SequenceNext(s) | NodeKind::SequenceExisting(s) => {
                if let Some(v) = s.value {
                    out.push_str(&v.to_string());
                }
            }
            NodeKind::Variable(v) => self.render_into(v.child, out, path),
            NodeKind::VariableRef(v) => {
                if let Some(text) = &v.resolved {
                    out.push_str(text);
                }
            }
        }
        path.pop();
    }

    // -----------------------------------------------------------------------
    // Cloning
    // -----------------------------------------------------------------------

    /// Independent deep copy of the subtree rooted at `id`.
    ///
    /// Pointers are copied as pointers to the same target without their
    /// materialized instance; the copy materializes its own on demand.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let kind = match self.kind(id).clone() {
            kind @ (NodeKind::Const(_)
            | NodeKind::Range(_)
            | NodeKind::SequenceNext(_)
            | NodeKind::SequenceExisting(_)
            | NodeKind::VariableRef(_)) => kind,
            NodeKind::Concat(children) => {
                NodeKind::Concat(children.iter().map(|&c| self.deep_clone(c)).collect())
            }
            NodeKind::One(o) => NodeKind::One(OneToken {
                alternatives: o
                    .alternatives
                    .iter()
                    .map(|&c| self.deep_clone(c))
                    .collect(),
                active: o.active,
            }),
            NodeKind::Optional(o) => NodeKind::Optional(OptionalToken {
                child: self.deep_clone(o.child),
                active: o.active,
                reducing: false,
            }),
            NodeKind::Repeat(r) => {
                let template = self.deep_clone(r.template);
                let pool: Vec<NodeId> = r.items().iter().map(|&c| self.deep_clone(c)).collect();
                NodeKind::Repeat(RepeatToken {
                    template,
                    min: r.min,
                    max: r.max,
                    count: pool.len() as u32,
                    pool,
                    reduction: None,
                })
            }
            NodeKind::Pointer(p) => NodeKind::Pointer(PointerToken {
                target: p.target,
                instance: None,
            }),
            NodeKind::Variable(v) => NodeKind::Variable(VariableToken {
                child: self.deep_clone(v.child),
                name: v.name,
            }),
        };
        self.push(kind)
    }

    /// Give a pointer its private clone of the target, creating it on first
    /// use. Returns the instance, or `None` for dangling pointers and
    /// non-pointer nodes.
    pub fn materialize(&mut self, pointer: NodeId) -> Option<NodeId> {
        let (target, instance) = match self.kind(pointer) {
            NodeKind::Pointer(p) => (p.target, p.instance),
            _ => return None,
        };
        if instance.is_some() {
            return instance;
        }
        let clone = self.deep_clone(target?);
        if let NodeKind::Pointer(p) = self.kind_mut(pointer) {
            p.instance = Some(clone);
        }
        Some(clone)
    }

    // -----------------------------------------------------------------------
    // Permutations
    // -----------------------------------------------------------------------

    /// Number of node-local states.
    pub fn permutation_count(&self, id: NodeId) -> usize {
        match self.kind(id) {
            NodeKind::Range(r) => r.len(),
            NodeKind::One(o) => o.alternatives.len(),
            NodeKind::Optional(_) => 2,
            NodeKind::Repeat(r) => (r.max - r.min) as usize + 1,
            _ => 1,
        }
    }

    /// Currently selected node-local state, 1-indexed.
    pub fn permutation(&self, id: NodeId) -> usize {
        match self.kind(id) {
            NodeKind::Range(r) => r.index_of(r.value).unwrap_or(1),
            NodeKind::One(o) => o.active + 1,
            NodeKind::Optional(o) => {
                if o.active {
                    2
                } else {
                    1
                }
            }
            NodeKind::Repeat(r) => r.items().len().saturating_sub(r.min as usize) + 1,
            _ => 1,
        }
    }

    /// Switch a node (not its children) to its `index`-th state, 1-indexed.
    ///
    /// For a repeat, state `i` holds `min + i - 1` items; missing items are
    /// cloned from the template and kept in a pool for later reuse.
    pub fn set_permutation(&mut self, id: NodeId, index: usize) -> Result<(), TokenError> {
        let count = self.permutation_count(id);
        if index == 0 || index > count {
            return Err(TokenError::IndexOutOfBound {
                node: id,
                index,
                count,
            });
        }

        let grow = match self.kind(id) {
            NodeKind::Repeat(r) => {
                let wanted = r.min as usize + index - 1;
                Some((r.template, wanted.saturating_sub(r.pool.len())))
            }
            _ => None,
        };
        let mut fresh = Vec::new();
        if let Some((template, missing)) = grow {
            for _ in 0..missing {
                fresh.push(self.deep_clone(template));
            }
        }

        match self.kind_mut(id) {
            NodeKind::Range(r) => r.value = r.value_at(index),
            NodeKind::One(o) => o.active = index - 1,
            NodeKind::Optional(o) => {
                o.active = index == 2;
                o.reducing = false;
            }
            NodeKind::Repeat(r) => {
                r.pool.extend(fresh);
                r.count = r.min + index as u32 - 1;
                r.reduction = None;
            }
            _ => {}
        }
        Ok(())
    }

    /// Size of the full combinatorial space rooted at `id`, saturating at
    /// `u64::MAX`. A pointer back into its own ancestry counts as unbounded.
    pub fn total_permutation_count(&self, id: NodeId) -> u64 {
        let mut path = Vec::new();
        self.total_inner(id, &mut path)
    }

    fn total_inner(&self, id: NodeId, path: &mut Vec<NodeId>) -> u64 {
        path.push(id);
        let total = match self.kind(id) {
            NodeKind::Const(_)
            | NodeKind::SequenceNext(_)
            | NodeKind::SequenceExisting(_)
            | NodeKind::VariableRef(_) => 1,
            NodeKind::Range(r) => r.len() as u64,
            NodeKind::Concat(children) => children
                .iter()
                .fold(1u64, |acc, &c| acc.saturating_mul(self.total_inner(c, path))),
            NodeKind::One(o) => o
                .alternatives
                .iter()
                .fold(0u64, |acc, &c| acc.saturating_add(self.total_inner(c, path))),
            NodeKind::Optional(o) => 1u64.saturating_add(self.total_inner(o.child, path)),
            NodeKind::Repeat(r) => {
                let item = self.total_inner(r.template, path);
                repeat_total(item, r.min, r.max)
            }
            NodeKind::Pointer(p) => match p.target {
                Some(target) if path.contains(&target) => u64::MAX,
                Some(target) => self.total_inner(target, path),
                None => 1,
            },
            NodeKind::Variable(v) => self.total_inner(v.child, path),
        };
        path.pop();
        total
    }

    /// Copy every local choice of `src`'s active subtree onto `dst`.
    ///
    /// Both subtrees must have been cloned from the same template.
    pub fn mirror_choices(&mut self, src: NodeId, dst: NodeId) -> Result<(), TokenError> {
        if self.kind(src).name() != self.kind(dst).name()
            || self.permutation_count(src) != self.permutation_count(dst)
        {
            return Err(TokenError::ShapeMismatch {
                left: src,
                right: dst,
            });
        }
        let choice = self.permutation(src);
        self.set_permutation(dst, choice)?;
        if self.is_pointer(src) {
            self.materialize(src);
            self.materialize(dst);
        }
        let from = self.active_children(src);
        let to = self.active_children(dst);
        if from.len() != to.len() {
            return Err(TokenError::ShapeMismatch {
                left: src,
                right: dst,
            });
        }
        for (a, b) in from.into_iter().zip(to) {
            self.mirror_choices(a, b)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Structure editing
    // -----------------------------------------------------------------------

    /// Replace the owned child `old` of `parent` with `new`. Returns `false`
    /// when `old` is not a child of `parent`.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> bool {
        fn swap(slot: &mut NodeId, old: NodeId, new: NodeId) -> bool {
            if *slot == old {
                *slot = new;
                true
            } else {
                false
            }
        }

        match self.kind_mut(parent) {
            NodeKind::Concat(children) => children
                .iter_mut()
                .map(|c| swap(c, old, new))
                .fold(false, |a, b| a | b),
            NodeKind::One(o) => o
                .alternatives
                .iter_mut()
                .map(|c| swap(c, old, new))
                .fold(false, |a, b| a | b),
            NodeKind::Optional(o) => swap(&mut o.child, old, new),
            NodeKind::Repeat(r) => {
                let mut hit = swap(&mut r.template, old, new);
                for item in r.pool.iter_mut() {
                    hit |= swap(item, old, new);
                }
                hit
            }
            NodeKind::Pointer(p) => match p.instance.as_mut() {
                Some(instance) => swap(instance, old, new),
                None => false,
            },
            NodeKind::Variable(v) => swap(&mut v.child, old, new),
            _ => false,
        }
    }

    /// Drop the owned child `child` from `parent`.
    ///
    /// A concatenation survives losing a member that may render empty anyway
    /// (an optional, a repeat with `min == 0`); a choice survives while it has
    /// alternatives left. Single-child wrappers never survive.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Removal {
        let optional_member = self.kind(child).may_be_empty();
        match self.kind_mut(parent) {
            NodeKind::Concat(children) => {
                children.retain(|&c| c != child);
                if optional_member {
                    Removal::Kept
                } else {
                    Removal::ParentInvalid
                }
            }
            NodeKind::One(o) => {
                let Some(pos) = o.alternatives.iter().position(|&c| c == child) else {
                    return Removal::Kept;
                };
                o.alternatives.remove(pos);
                if o.alternatives.is_empty() {
                    return Removal::ParentInvalid;
                }
                if o.active > pos || o.active >= o.alternatives.len() {
                    o.active = o.active.saturating_sub(1);
                }
                Removal::Kept
            }
            NodeKind::Optional(_)
            | NodeKind::Repeat(_)
            | NodeKind::Pointer(_)
            | NodeKind::Variable(_) => Removal::ParentInvalid,
            _ => Removal::Kept,
        }
    }

    /// Rebuild derived state after a node's children were replaced: a repeat
    /// re-clones its items from the (new) template, a pointer drops its
    /// instance.
    pub fn refresh(&mut self, id: NodeId) {
        let rebuild = match self.kind(id) {
            NodeKind::Repeat(r) => Some((r.template, r.items().len())),
            NodeKind::Pointer(_) => {
                if let NodeKind::Pointer(p) = self.kind_mut(id) {
                    p.instance = None;
                }
                None
            }
            _ => None,
        };
        if let Some((template, count)) = rebuild {
            let pool: Vec<NodeId> = (0..count).map(|_| self.deep_clone(template)).collect();
            if let NodeKind::Repeat(r) = self.kind_mut(id) {
                r.count = pool.len() as u32;
                r.pool = pool;
                r.reduction = None;
            }
        }
    }
}

/// `Σ item^k` for `k` in `min..=max`, saturating.
pub(crate) fn repeat_total(item: u64, min: u32, max: u32) -> u64 {
    (min..=max).fold(0u64, |acc, k| acc.saturating_add(item.saturating_pow(k)))
}
