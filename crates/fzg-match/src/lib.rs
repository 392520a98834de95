// SPDX-License-Identifier: MIT OR Apache-2.0
//! fzg-match
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Instantiate a token graph from an observed text.
//!
//! [`instantiate`] searches the local choices of every node so that the
//! graph renders exactly the given text, leaving the graph in the matching
//! state. The search is a backtracking matcher in continuation-passing style:
//! each node matches a prefix of the remaining input and hands the position
//! after it to a continuation for the rest of the tree. Choices are tried in
//! order (first alternative, present optional, most repeat items first), so
//! the first complete match wins.
//!
//! Sequence slots match any decimal integer; their values are reassigned by
//! the next prepare pass. Variable references cannot be matched.

use fzg_error::{ErrorCode, HasErrorCode};
use fzg_token::{Graph, NodeId, NodeKind, TokenError};
use thiserror::Error;
use tracing::debug;

/// Default bound on nested match calls.
pub const DEFAULT_MAX_DEPTH: usize = 2048;

/// Errors from matching a text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// No combination of choices renders the text.
    #[error("text does not match the graph (matched up to byte {furthest})")]
    NoMatch {
        /// Furthest byte offset any partial match reached.
        furthest: usize,
    },

    /// Matching nested deeper than allowed, typically through left
    /// recursion.
    #[error("match depth exceeded {0}")]
    DepthExceeded(usize),

    /// The graph contains a node kind the matcher cannot handle.
    #[error("cannot match {kind} node {node}")]
    Unsupported {
        /// Offending node.
        node: NodeId,
        /// Its kind name.
        kind: &'static str,
    },

    /// A node rejected a state change.
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl HasErrorCode for MatchError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::Token(e) => e.code(),
            _ => ErrorCode::InstantiationFailed,
        }
    }
}

type Cont<'k, 'g, 't> = &'k mut dyn FnMut(&mut Matcher<'g, 't>, usize) -> Result<bool, MatchError>;

/// Backtracking matcher over one graph and one text.
pub struct Matcher<'g, 't> {
    graph: &'g mut Graph,
    text: &'t str,
    depth: usize,
    max_depth: usize,
    furthest: usize,
}

impl<'g, 't> Matcher<'g, 't> {
    /// Matcher with [`DEFAULT_MAX_DEPTH`].
    pub fn new(graph: &'g mut Graph, text: &'t str) -> Self {
        Self {
            graph,
            text,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            furthest: 0,
        }
    }

    /// Override the nesting bound.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Put the subtree under `root` into a state that renders the whole
    /// text.
    pub fn instantiate(&mut self, root: NodeId) -> Result<(), MatchError> {
        let matched = self.node(root, 0, &mut |m: &mut Matcher<'g, 't>, pos| Ok(pos == m.text.len()))?;
        if !matched {
            debug!(target: "fzg.match", furthest = self.furthest, len = self.text.len(), "no match");
            return Err(MatchError::NoMatch {
                furthest: self.furthest,
            });
        }
        self.graph.prepare(root);
        Ok(())
    }

    fn rest(&self, pos: usize) -> &'t str {
        &self.text[pos..]
    }

    fn advance(&mut self, pos: usize, len: usize) -> usize {
        let end = pos + len;
        self.furthest = self.furthest.max(end);
        end
    }

    fn node(&mut self, id: NodeId, pos: usize, k: Cont<'_, 'g, 't>) -> Result<bool, MatchError> {
        if self.depth >= self.max_depth {
            return Err(MatchError::DepthExceeded(self.max_depth));
        }
        self.depth += 1;
        let result = self.node_inner(id, pos, k);
        self.depth -= 1;
        result
    }

    fn node_inner(&mut self, id: NodeId, pos: usize, k: Cont<'_, 'g, 't>) -> Result<bool, MatchError> {
        match self.graph.kind(id).clone() {
            NodeKind::Const(s) => {
                if self.rest(pos).starts_with(s.as_str()) {
                    let end = self.advance(pos, s.len());
                    k(self, end)
                } else {
                    Ok(false)
                }
            }
            NodeKind::Range(r) => {
                for len in integer_prefixes(self.rest(pos)) {
                    let literal = &self.rest(pos)[..len];
                    let Ok(value) = literal.parse::<i64>() else {
                        continue;
                    };
                    if value.to_string() != literal {
                        continue;
                    }
                    let Some(index) = r.index_of(value) else {
                        continue;
                    };
                    self.graph.set_permutation(id, index)?;
                    let end = self.advance(pos, len);
                    if k(self, end)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            NodeKind::Concat(children) => self.sequence(&children, 0, pos, k),
            NodeKind::One(o) => {
                for (i, &alt) in o.alternatives().iter().enumerate() {
                    self.graph.set_permutation(id, i + 1)?;
                    if self.node(alt, pos, k)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            NodeKind::Optional(o) => {
                self.graph.set_permutation(id, 2)?;
                if self.node(o.child(), pos, k)? {
                    return Ok(true);
                }
                self.graph.set_permutation(id, 1)?;
                k(self, pos)
            }
            NodeKind::Repeat(r) => self.items(id, r.min() as usize, r.max() as usize, 0, pos, k),
            NodeKind::Pointer(_) => match self.graph.materialize(id) {
                Some(instance) => self.node(instance, pos, k),
                None => k(self, pos),
            },
            NodeKind::SequenceNext(_) | NodeKind::SequenceExisting(_) => {
                for len in integer_prefixes(self.rest(pos)).into_iter().rev() {
                    let end = self.advance(pos, len);
                    if k(self, end)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            NodeKind::Variable(v) => self.node(v.child(), pos, k),
            kind @ NodeKind::VariableRef(_) => Err(MatchError::Unsupported {
                node: id,
                kind: kind.name(),
            }),
        }
    }

    fn sequence(
        &mut self,
        children: &[NodeId],
        idx: usize,
        pos: usize,
        k: Cont<'_, 'g, 't>,
    ) -> Result<bool, MatchError> {
        match children.get(idx) {
            None => k(self, pos),
            Some(&child) => self.node(child, pos, &mut |m: &mut Matcher<'g, 't>, p| {
                m.sequence(children, idx + 1, p, k)
            }),
        }
    }

    /// Match repeat items from item `i` on, preferring one more item over
    /// stopping.
    fn items(
        &mut self,
        id: NodeId,
        min: usize,
        max: usize,
        i: usize,
        pos: usize,
        k: Cont<'_, 'g, 't>,
    ) -> Result<bool, MatchError> {
        if i < max {
            let count = (i + 1).max(min);
            self.graph.set_permutation(id, count - min + 1)?;
            let item = self.graph.active_children(id)[i];
            let more = self.node(item, pos, &mut |m: &mut Matcher<'g, 't>, p| {
                m.items(id, min, max, i + 1, p, k)
            })?;
            if more {
                return Ok(true);
            }
        }
        if i >= min {
            self.graph.set_permutation(id, i - min + 1)?;
            return k(self, pos);
        }
        Ok(false)
    }
}

/// Byte lengths of every prefix of `text` that reads as an optionally
/// negative decimal integer, shortest first.
fn integer_prefixes(text: &str) -> Vec<usize> {
    let sign = usize::from(text.starts_with('-'));
    let digits = text[sign..].bytes().take_while(u8::is_ascii_digit).count();
    (1..=digits).map(|d| sign + d).collect()
}

/// Put `graph` into a state under `root` that renders `text`.
pub fn instantiate(graph: &mut Graph, root: NodeId, text: &str) -> Result<(), MatchError> {
    Matcher::new(graph, text).instantiate(root)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
