// SPDX-License-Identifier: MIT OR Apache-2.0
//! fzg-reduce
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Feedback-driven reduction of an instantiated token graph.
//!
//! [`LinearReduction`] visits the reducible nodes of the active tree
//! top-down. For each node it offers the most reduced state first and waits
//! for a [`Feedback`] verdict; the first `Good` state is kept. If every state
//! short of the original was `Bad`, the node goes back to its original state
//! without asking. Children are visited only after their parent settled,
//! since the parent's choice decides which children still exist.
//!
//! Falling back to the original state assumes it still reproduces the
//! failure. That assumption is not re-checked.

use fzg_error::{ErrorCode, HasErrorCode};
use fzg_token::{Graph, NodeId, TokenError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Feedback & errors
// ---------------------------------------------------------------------------

/// Caller's verdict on a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    /// The candidate still shows the behaviour being reduced for.
    Good,
    /// It does not.
    Bad,
}

/// Errors from driving a reduction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReduceError {
    /// A new candidate was requested before the previous one was judged.
    #[error("feedback for the previous candidate is still outstanding")]
    FeedbackRequired,

    /// Feedback arrived with no candidate waiting for it.
    #[error("feedback given without an outstanding candidate")]
    UnexpectedFeedback,

    /// No reduction strategy is registered under the requested name.
    #[error("unknown reduction strategy '{0}'")]
    UnknownReduction(String),

    /// A node rejected a reduction index.
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl HasErrorCode for ReduceError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::FeedbackRequired | Self::UnexpectedFeedback => ErrorCode::FeedbackOutOfOrder,
            Self::UnknownReduction(_) => ErrorCode::StrategyUnknown,
            Self::Token(e) => e.code(),
        }
    }
}

/// Counters collected over one reduction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReductionStats {
    /// Candidates handed out.
    pub candidates: usize,
    /// Candidates judged `Good`.
    pub good: usize,
    /// Candidates judged `Bad`.
    pub bad: usize,
    /// Nodes put back into their original state without a verdict.
    pub restored: usize,
}

// ---------------------------------------------------------------------------
// LinearReduction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Attempt {
    node: NodeId,
    /// Reduction index the next candidate uses.
    index: usize,
    /// Index of the original state.
    max: usize,
}

/// Node-by-node reduction, one verdict per candidate.
///
/// Dropping the reduction mid-run puts the node under test back into its
/// original state, so the graph never stays in an unjudged candidate.
pub struct LinearReduction<'g> {
    graph: &'g mut Graph,
    root: NodeId,
    pending: Vec<NodeId>,
    attempt: Option<Attempt>,
    awaiting: bool,
    stats: ReductionStats,
}

impl<'g> LinearReduction<'g> {
    /// Start reducing the tree under `root`, which should already be
    /// instantiated to the text being reduced.
    pub fn new(graph: &'g mut Graph, root: NodeId) -> Self {
        graph.prepare(root);
        Self {
            graph,
            root,
            pending: vec![root],
            attempt: None,
            awaiting: false,
            stats: ReductionStats::default(),
        }
    }

    /// Produce the next candidate, or `None` when every node has settled.
    ///
    /// Fails with [`ReduceError::FeedbackRequired`] while the previous
    /// candidate has not been judged.
    pub fn next_candidate(&mut self) -> Result<Option<String>, ReduceError> {
        if self.awaiting {
            return Err(ReduceError::FeedbackRequired);
        }
        if self.attempt.is_none() && !self.find_next_node() {
            info!(
                target: "fzg.reduce",
                candidates = self.stats.candidates,
                good = self.stats.good,
                bad = self.stats.bad,
                restored = self.stats.restored,
                "reduction finished"
            );
            return Ok(None);
        }
        let Some(attempt) = self.attempt else {
            return Ok(None);
        };
        self.graph.reduce(attempt.node, attempt.index)?;
        self.graph.prepare(self.root);
        self.awaiting = true;
        self.stats.candidates += 1;
        debug!(
            target: "fzg.reduce",
            node = %attempt.node,
            index = attempt.index,
            max = attempt.max,
            "offering candidate"
        );
        Ok(Some(self.graph.render(self.root)))
    }

    /// Judge the outstanding candidate.
    pub fn feedback(&mut self, verdict: Feedback) -> Result<(), ReduceError> {
        if !self.awaiting {
            return Err(ReduceError::UnexpectedFeedback);
        }
        let Some(mut attempt) = self.attempt.take() else {
            return Err(ReduceError::UnexpectedFeedback);
        };
        self.awaiting = false;

        match verdict {
            Feedback::Good => {
                self.stats.good += 1;
                self.settle(attempt.node);
            }
            Feedback::Bad if attempt.index + 1 < attempt.max => {
                self.stats.bad += 1;
                attempt.index += 1;
                self.attempt = Some(attempt);
            }
            Feedback::Bad => {
                self.stats.bad += 1;
                self.stats.restored += 1;
                debug!(target: "fzg.reduce", node = %attempt.node, "no reduction held, restoring original");
                self.graph.reduce(attempt.node, attempt.max)?;
                self.settle(attempt.node);
            }
        }
        self.graph.prepare(self.root);
        Ok(())
    }

    /// Whether a candidate is waiting for its verdict.
    pub fn is_awaiting_feedback(&self) -> bool {
        self.awaiting
    }

    /// Counters so far.
    pub fn stats(&self) -> &ReductionStats {
        &self.stats
    }

    /// The graph in its current state.
    pub fn graph(&self) -> &Graph {
        &*self.graph
    }

    /// Current text.
    pub fn render(&self) -> String {
        self.graph.render(self.root)
    }

    /// Abandon the run, restoring the node under test.
    pub fn cancel(self) {}

    /// Pop pending nodes until one with at least two reduction states turns
    /// up; nodes without a choice hand their children on.
    fn find_next_node(&mut self) -> bool {
        while let Some(node) = self.pending.pop() {
            let max = self.graph.reduction_count(node);
            if max >= 2 {
                self.attempt = Some(Attempt {
                    node,
                    index: 1,
                    max,
                });
                return true;
            }
            self.push_children(node);
        }
        false
    }

    fn settle(&mut self, node: NodeId) {
        self.graph.settle_reduction(node);
        self.push_children(node);
    }

    fn push_children(&mut self, node: NodeId) {
        let children = if self.graph.is_pointer(node) {
            self.graph.materialize(node).into_iter().collect()
        } else {
            self.graph.active_children(node)
        };
        self.pending.extend(children.into_iter().rev());
    }
}

impl Drop for LinearReduction<'_> {
    fn drop(&mut self) {
        if let Some(attempt) = self.attempt.take() {
            debug!(target: "fzg.reduce", node = %attempt.node, "reduction cancelled, restoring node");
            if self.graph.reduce(attempt.node, attempt.max).is_ok() {
                self.graph.settle_reduction(attempt.node);
            }
            self.graph.prepare(self.root);
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Names accepted by [`run_reduction`].
pub const REDUCTION_NAMES: &[&str] = &["Linear"];

/// Start a named reduction strategy.
pub fn run_reduction<'g>(
    name: &str,
    graph: &'g mut Graph,
    root: NodeId,
) -> Result<LinearReduction<'g>, ReduceError> {
    match name {
        "Linear" => Ok(LinearReduction::new(graph, root)),
        other => Err(ReduceError::UnknownReduction(other.to_string())),
    }
}

/// Outcome of [`reduce_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionReport {
    /// Text before reduction.
    pub original: String,
    /// Text after reduction.
    pub reduced: String,
    /// Run counters.
    pub stats: ReductionStats,
}

/// Run a linear reduction to completion, judging candidates with `oracle`.
pub fn reduce_with<F>(graph: &mut Graph, root: NodeId, mut oracle: F) -> Result<ReductionReport, ReduceError>
where
    F: FnMut(&str) -> Feedback,
{
    let mut run = LinearReduction::new(graph, root);
    let original = run.render();
    while let Some(candidate) = run.next_candidate()? {
        let verdict = oracle(&candidate);
        run.feedback(verdict)?;
    }
    Ok(ReductionReport {
        original,
        reduced: run.render(),
        stats: run.stats().clone(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
