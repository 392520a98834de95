// SPDX-License-Identifier: MIT OR Apache-2.0
//! fzg-strategy
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Strategies walk a token graph and leave it in a new state on every step.
//!
//! A strategy is a resumable state machine: each call to
//! [`Strategy::next_state`] mutates the graph it exclusively borrows into the
//! next state and reports whether one was produced. Dropping a strategy ends
//! the run; nothing keeps working in the background. [`Enumeration`] wraps a
//! strategy as an iterator of rendered texts.

mod error;
mod optionals;
mod permutations;
mod random;

pub use error::StrategyError;
pub use optionals::{MAX_OPTIONALS, PermuteOptionals};
pub use permutations::{Coverage, Permutations, almost_all_count};
pub use random::{DEFAULT_RANDOM_COUNT, RandomStrategy};

use fzg_token::{Graph, NodeId};
use fzg_unroll::DEFAULT_MAX_REPEAT;
use tracing::debug;

/// A resumable walk over the states of a graph.
pub trait Strategy {
    /// Registered name.
    fn name(&self) -> &'static str;

    /// Move the graph to the next state. Returns `Ok(false)` once the walk is
    /// exhausted; further calls keep returning `Ok(false)`.
    fn next_state(&mut self) -> Result<bool, StrategyError>;

    /// The graph in its current state.
    fn graph(&self) -> &Graph;

    /// Root of the walked graph. May differ from the root the strategy was
    /// created with when the strategy unrolled it.
    fn root(&self) -> NodeId;

    /// Text of the current state.
    fn render(&self) -> String {
        self.graph().render(self.root())
    }
}

/// Knobs shared by all strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyOptions {
    /// Seed for strategies that make random choices.
    pub seed: u64,
    /// Stop after this many states.
    pub limit: Option<usize>,
    /// Unroll bound for strategies that accept self-referential graphs.
    pub max_repeat: usize,
}

impl Default for StrategyOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            limit: None,
            max_repeat: DEFAULT_MAX_REPEAT,
        }
    }
}

/// Names accepted by [`new_strategy`].
pub const STRATEGY_NAMES: &[&str] = &[
    "AllPermutations",
    "AlmostAllPermutations",
    "PermuteOptionals",
    "random",
];

/// Instantiate a strategy by its registered name.
pub fn new_strategy<'g>(
    name: &str,
    graph: &'g mut Graph,
    root: NodeId,
    options: &StrategyOptions,
) -> Result<Box<dyn Strategy + 'g>, StrategyError> {
    debug!(target: "fzg.strategy", strategy = name, %root, "creating strategy");
    let strategy: Box<dyn Strategy + 'g> = match name {
        "AllPermutations" => Box::new(Permutations::new(graph, root, Coverage::All)?),
        "AlmostAllPermutations" => Box::new(Permutations::new(graph, root, Coverage::AlmostAll)?),
        "PermuteOptionals" => Box::new(PermuteOptionals::new(
            graph,
            root,
            options.seed,
            options.max_repeat,
        )?),
        "random" => Box::new(RandomStrategy::new(
            graph,
            root,
            options.seed,
            options.limit,
            options.max_repeat,
        )),
        other => {
            return Err(StrategyError::UnknownStrategy {
                name: other.to_string(),
                available: STRATEGY_NAMES.join(", "),
            });
        }
    };
    Ok(strategy)
}

/// A strategy run seen as an iterator of rendered states.
///
/// Dropping the enumeration, or calling [`Enumeration::cancel`], ends the run
/// immediately; the graph stays in the last produced state and is usable
/// again once the borrow ends.
pub struct Enumeration<'g> {
    strategy: Box<dyn Strategy + 'g>,
    limit: Option<usize>,
    produced: usize,
    finished: bool,
}

impl<'g> Enumeration<'g> {
    /// Wrap an existing strategy.
    pub fn new(strategy: Box<dyn Strategy + 'g>, limit: Option<usize>) -> Self {
        Self {
            strategy,
            limit,
            produced: 0,
            finished: false,
        }
    }

    /// Number of states produced so far.
    pub fn produced(&self) -> usize {
        self.produced
    }

    /// The underlying strategy.
    pub fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }

    /// Stop the run.
    pub fn cancel(self) {
        debug!(
            target: "fzg.strategy",
            strategy = self.strategy.name(),
            produced = self.produced,
            "enumeration cancelled"
        );
    }
}

impl Iterator for Enumeration<'_> {
    type Item = Result<String, StrategyError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.limit.is_some_and(|l| self.produced >= l) {
            return None;
        }
        match self.strategy.next_state() {
            Ok(true) => {
                self.produced += 1;
                Some(Ok(self.strategy.render()))
            }
            Ok(false) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Start a named strategy on `root` and iterate its rendered states.
///
/// The exhaustive strategies refuse any graph where [`fzg_unroll::loop_exists`]
/// holds, and that includes two pointers sharing one target (a rule referenced
/// twice). Run [`fzg_unroll::unroll_pointers`] first and pass the returned root
/// when the graph came from a document with references.
pub fn run_enumeration<'g>(
    name: &str,
    graph: &'g mut Graph,
    root: NodeId,
    options: &StrategyOptions,
) -> Result<Enumeration<'g>, StrategyError> {
    let strategy = new_strategy(name, graph, root, options)?;
    Ok(Enumeration::new(strategy, options.limit))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
