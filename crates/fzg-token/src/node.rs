// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node handles and the closed set of node kinds.

use std::fmt;

/// Stable handle of a node inside a [`Graph`](crate::Graph) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Position of the node in its arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle of a sequence counter owned by a [`Graph`](crate::Graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequenceId(pub(crate) u32);

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq{}", self.0)
    }
}

/// Integer range node state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeToken {
    pub(crate) from: i64,
    pub(crate) to: i64,
    pub(crate) step: i64,
    pub(crate) value: i64,
}

impl RangeToken {
    /// Inclusive lower bound.
    pub fn from(&self) -> i64 {
        self.from
    }

    /// Inclusive upper bound.
    pub fn to(&self) -> i64 {
        self.to
    }

    /// Distance between two consecutive values.
    pub fn step(&self) -> i64 {
        self.step
    }

    /// Currently selected value.
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Number of values in the range, saturating at `usize::MAX`.
    pub fn len(&self) -> usize {
        usize::try_from(self.steps() + 1).unwrap_or(usize::MAX)
    }

    /// Ranges always hold at least one value.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Largest value reachable from `from` in `step` increments.
    pub fn last(&self) -> i64 {
        let last = i128::from(self.from) + self.steps() * i128::from(self.step);
        i64::try_from(last).unwrap_or(self.to)
    }

    /// The `index`-th value, 1-indexed, clamped to the range.
    pub fn value_at(&self, index: usize) -> i64 {
        let offset = (index.max(1) as i128 - 1).min(self.steps());
        let value = i128::from(self.from) + offset * i128::from(self.step);
        i64::try_from(value).unwrap_or(self.to)
    }

    /// 1-indexed position of `value`, or `None` when the range never yields
    /// it.
    pub fn index_of(&self, value: i64) -> Option<usize> {
        if value < self.from || value > self.to {
            return None;
        }
        let offset = i128::from(value) - i128::from(self.from);
        let step = i128::from(self.step);
        if offset % step != 0 {
            return None;
        }
        usize::try_from(offset / step).ok()?.checked_add(1)
    }

    /// Number of increments from `from` to the last value. Computed wide so
    /// spans across the whole `i64` domain do not overflow.
    fn steps(&self) -> i128 {
        (i128::from(self.to) - i128::from(self.from)) / i128::from(self.step)
    }
}

/// Choice between alternatives; exactly one is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneToken {
    pub(crate) alternatives: Vec<NodeId>,
    pub(crate) active: usize,
}

impl OneToken {
    /// All alternatives in declaration order.
    pub fn alternatives(&self) -> &[NodeId] {
        &self.alternatives
    }

    /// Zero-based index of the active alternative.
    pub fn active_index(&self) -> usize {
        self.active
    }
}

/// Node that may be present or absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalToken {
    pub(crate) child: NodeId,
    pub(crate) active: bool,
    pub(crate) reducing: bool,
}

impl OptionalToken {
    /// The wrapped node, regardless of activation.
    pub fn child(&self) -> NodeId {
        self.child
    }

    /// Whether the child currently renders.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Bounded repetition of clones of a template node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatToken {
    pub(crate) template: NodeId,
    pub(crate) min: u32,
    pub(crate) max: u32,
    /// Instantiated items; only the first `count` are active.
    pub(crate) pool: Vec<NodeId>,
    pub(crate) count: u32,
    pub(crate) reduction: Option<RepeatReduction>,
}

/// Items a repeat held when its reduction started, and the subset kept now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RepeatReduction {
    pub(crate) original: Vec<NodeId>,
    pub(crate) kept: Vec<NodeId>,
}

impl RepeatToken {
    /// Template every item is cloned from.
    pub fn template(&self) -> NodeId {
        self.template
    }

    /// Minimum number of items.
    pub fn min(&self) -> u32 {
        self.min
    }

    /// Maximum number of items.
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Currently rendering items.
    pub fn items(&self) -> &[NodeId] {
        match &self.reduction {
            Some(r) => &r.kept,
            None => &self.pool[..self.count as usize],
        }
    }

    /// Whether a reduction is in progress on this repeat.
    pub fn is_reducing(&self) -> bool {
        self.reduction.is_some()
    }
}

/// Reference to a node owned elsewhere in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerToken {
    pub(crate) target: Option<NodeId>,
    pub(crate) instance: Option<NodeId>,
}

impl PointerToken {
    /// Shared node this pointer refers to.
    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    /// Private clone of the target, once materialized.
    pub fn instance(&self) -> Option<NodeId> {
        self.instance
    }
}

/// A slot that renders a value drawn from a sequence counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSlot {
    pub(crate) sequence: SequenceId,
    pub(crate) value: Option<i64>,
}

impl SequenceSlot {
    /// Counter this slot draws from.
    pub fn sequence(&self) -> SequenceId {
        self.sequence
    }

    /// Value assigned by the last prepare pass.
    pub fn value(&self) -> Option<i64> {
        self.value
    }
}

/// Named binding of a child's rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableToken {
    pub(crate) name: String,
    pub(crate) child: NodeId,
}

impl VariableToken {
    /// Variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node whose text is bound.
    pub fn child(&self) -> NodeId {
        self.child
    }
}

/// Use of a variable bound earlier in scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRefToken {
    pub(crate) name: String,
    pub(crate) resolved: Option<String>,
}

impl VariableRefToken {
    /// Referenced variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Text resolved by the last prepare pass.
    pub fn resolved(&self) -> Option<&str> {
        self.resolved.as_deref()
    }
}

/// Every node kind the graph knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Fixed text.
    Const(String),
    /// One integer out of an inclusive stepped range.
    Range(RangeToken),
    /// All children, in order.
    Concat(Vec<NodeId>),
    /// Exactly one of the alternatives.
    One(OneToken),
    /// Child or nothing.
    Optional(OptionalToken),
    /// `min..=max` clones of a template.
    Repeat(RepeatToken),
    /// Reference to a node owned elsewhere.
    Pointer(PointerToken),
    /// Next value of a sequence counter.
    SequenceNext(SequenceSlot),
    /// A value already issued by a sequence counter.
    SequenceExisting(SequenceSlot),
    /// Binds its child's text to a name.
    Variable(VariableToken),
    /// Renders the text bound to a name.
    VariableRef(VariableRefToken),
}

impl NodeKind {
    /// Short kind name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Const(_) => "Const",
            Self::Range(_) => "Range",
            Self::Concat(_) => "Concat",
            Self::One(_) => "One",
            Self::Optional(_) => "Optional",
            Self::Repeat(_) => "Repeat",
            Self::Pointer(_) => "Pointer",
            Self::SequenceNext(_) => "SequenceNext",
            Self::SequenceExisting(_) => "SequenceExisting",
            Self::Variable(_) => "Variable",
            Self::VariableRef(_) => "VariableRef",
        }
    }

    /// Kinds that can disappear from a concatenation without invalidating it.
    pub fn may_be_empty(&self) -> bool {
        match self {
            Self::Optional(_) => true,
            Self::Repeat(r) => r.min == 0,
            _ => false,
        }
    }
}

/// Capability: exactly one child, seen as active or structural.
pub trait Forward {
    /// Child that currently renders, if any.
    fn active(&self) -> Option<NodeId>;
    /// Child that exists regardless of activation.
    fn structural(&self) -> Option<NodeId>;
}

impl Forward for OptionalToken {
    fn active(&self) -> Option<NodeId> {
        self.active.then_some(self.child)
    }

    fn structural(&self) -> Option<NodeId> {
        Some(self.child)
    }
}

impl Forward for PointerToken {
    fn active(&self) -> Option<NodeId> {
        self.instance.or(self.target)
    }

    fn structural(&self) -> Option<NodeId> {
        self.target
    }
}

impl Forward for VariableToken {
    fn active(&self) -> Option<NodeId> {
        Some(self.child)
    }

    fn structural(&self) -> Option<NodeId> {
        Some(self.child)
    }
}

/// Capability: ordered children, seen as active or structural.
pub trait List {
    /// Children that currently render.
    fn active(&self) -> Vec<NodeId>;
    /// Full potential child set.
    fn structural(&self) -> Vec<NodeId>;
}

impl List for Vec<NodeId> {
    fn active(&self) -> Vec<NodeId> {
        self.clone()
    }

    fn structural(&self) -> Vec<NodeId> {
        self.clone()
    }
}

impl List for OneToken {
    fn active(&self) -> Vec<NodeId> {
        vec![self.alternatives[self.active]]
    }

    fn structural(&self) -> Vec<NodeId> {
        self.alternatives.clone()
    }
}

impl List for RepeatToken {
    fn active(&self) -> Vec<NodeId> {
        self.items().to_vec()
    }

    fn structural(&self) -> Vec<NodeId> {
        vec![self.template]
    }
}
