// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! fzg-filter
//!
//! Filters rewrite a graph before a strategy walks it. A filter looks at one
//! node and either leaves it alone or returns a replacement node.
//! [`apply_filters`] offers every reachable node to the filters in order; the
//! first replacement wins and is never offered to a filter again.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use fzg_error::{ErrorCode, HasErrorCode};
use fzg_token::{Graph, NodeId, NodeKind};
use thiserror::Error;
use tracing::debug;

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// A node-level graph rewrite.
pub trait Filter: Send + Sync {
    /// Registered name.
    fn name(&self) -> &str;

    /// Build a replacement for `node`, or return `None` to keep it.
    fn apply(&self, graph: &mut Graph, node: NodeId) -> Option<NodeId>;
}

/// A filter backed by a closure.
#[derive(Clone)]
pub struct FnFilter {
    name: String,
    rewrite: Arc<dyn Fn(&mut Graph, NodeId) -> Option<NodeId> + Send + Sync>,
}

impl std::fmt::Debug for FnFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnFilter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl FnFilter {
    /// Wrap `rewrite` under `name`.
    pub fn new<F>(name: impl Into<String>, rewrite: F) -> Self
    where
        F: Fn(&mut Graph, NodeId) -> Option<NodeId> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            rewrite: Arc::new(rewrite),
        }
    }
}

impl Filter for FnFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, graph: &mut Graph, node: NodeId) -> Option<NodeId> {
        (self.rewrite)(graph, node)
    }
}

// ---------------------------------------------------------------------------
// PositiveBoundaryValueAnalysis
// ---------------------------------------------------------------------------

/// Replaces every integer range by a choice of its first, middle and last
/// value.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositiveBoundaryValueAnalysis;

impl Filter for PositiveBoundaryValueAnalysis {
    fn name(&self) -> &str {
        "PositiveBoundaryValueAnalysis"
    }

    fn apply(&self, graph: &mut Graph, node: NodeId) -> Option<NodeId> {
        let NodeKind::Range(range) = graph.kind(node) else {
            return None;
        };
        let middle = range.value_at((range.len() - 1) / 2 + 1);
        let mut values = vec![range.from(), middle, range.last()];
        values.dedup();

        let mut alternatives: Vec<NodeId> =
            values.iter().map(|v| graph.constant(v.to_string())).collect();
        if alternatives.len() == 1 {
            return alternatives.pop();
        }
        graph.one(alternatives).ok()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Errors from filter lookup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// No filter is registered under the requested name.
    #[error("unknown filter '{name}' (available: {available})")]
    UnknownFilter {
        /// Requested name.
        name: String,
        /// Comma-separated registered names.
        available: String,
    },
}

impl HasErrorCode for FilterError {
    fn code(&self) -> ErrorCode {
        ErrorCode::FilterUnknown
    }
}

/// Names accepted by [`filter_by_name`].
pub const FILTER_NAMES: &[&str] = &["PositiveBoundaryValueAnalysis"];

/// Look up a built-in filter.
pub fn filter_by_name(name: &str) -> Result<Box<dyn Filter>, FilterError> {
    match name {
        "PositiveBoundaryValueAnalysis" => Ok(Box::new(PositiveBoundaryValueAnalysis)),
        other => Err(FilterError::UnknownFilter {
            name: other.to_string(),
            available: FILTER_NAMES.join(", "),
        }),
    }
}

/// Look up several built-in filters, failing on the first unknown name.
pub fn filters_by_name<S: AsRef<str>>(names: &[S]) -> Result<Vec<Box<dyn Filter>>, FilterError> {
    names.iter().map(|n| filter_by_name(n.as_ref())).collect()
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// Offer every node reachable from `root` to `filters` and splice in the
/// replacements. Returns the (possibly replaced) root.
///
/// Breadth-first over owned children and pointer targets. Replacements are
/// not traversed further.
pub fn apply_filters(graph: &mut Graph, root: NodeId, filters: &[Box<dyn Filter>]) -> NodeId {
    if filters.is_empty() {
        return root;
    }

    let mut root = root;
    let mut replaced: HashMap<NodeId, NodeId> = HashMap::new();
    let mut touched = Vec::new();
    let mut pointers = Vec::new();
    let mut visited = HashSet::from([root]);
    let mut queue = VecDeque::from([(root, None::<NodeId>)]);

    while let Some((node, parent)) = queue.pop_front() {
        let replacement = filters
            .iter()
            .find_map(|f| f.apply(graph, node).map(|new| (f.name().to_string(), new)));

        if let Some((filter, new)) = replacement {
            debug!(target: "fzg.filter", %filter, %node, replacement = %new, "replaced node");
            replaced.insert(node, new);
            match parent {
                Some(parent) if graph.is_pointer(parent) => {}
                Some(parent) => {
                    graph.replace_child(parent, node, new);
                    touched.push(parent);
                }
                None => root = new,
            }
            continue;
        }

        let next = if graph.is_pointer(node) {
            pointers.push(node);
            graph.pointer_target(node).into_iter().collect()
        } else {
            graph.structural_children(node)
        };
        for child in next {
            if visited.insert(child) {
                queue.push_back((child, Some(node)));
            }
        }
    }

    for pointer in pointers {
        if let Some(new) = graph.pointer_target(pointer).and_then(|t| replaced.get(&t)) {
            graph.set_pointer_target(pointer, Some(*new));
        }
    }
    for parent in touched {
        if matches!(graph.kind(parent), NodeKind::Repeat(_)) {
            graph.refresh(parent);
        }
    }
    root
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
