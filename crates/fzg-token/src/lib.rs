// SPDX-License-Identifier: MIT OR Apache-2.0
//! fzg-token
//!
//! The token graph every other fuzzgraph crate operates on.
//!
//! A graph is an arena of nodes addressed by [`NodeId`]. Structural nodes
//! (concatenation, choice, optional, repeat) own their children; pointer
//! nodes refer to nodes owned elsewhere and are the only way to express
//! recursion. Each node exposes a local permutation space
//! ([`Graph::permutation_count`], [`Graph::set_permutation`]) and, for
//! optionals and repeats, a reduction space ([`Graph::reduction_count`],
//! [`Graph::reduce`]). Rendering concatenates the text of the active tree.
//!
//! Graphs are built either node by node through the constructors on
//! [`Graph`] or declaratively from a [`GraphDocument`].
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod debug;
/// Declarative graph documents (JSON/TOML).
pub mod document;
mod error;
mod graph;
mod node;
mod reduce;
mod scope;

pub use debug::View;
pub use document::{
    CompiledGraph, DEFAULT_REPEAT_MAX, DocumentError, DocumentWarning, GraphDocument,
    SequenceSpec, TokenSpec,
};
pub use error::TokenError;
pub use graph::{Graph, Removal};
pub use node::{
    Forward, List, NodeId, NodeKind, OneToken, OptionalToken, PointerToken, RangeToken,
    RepeatToken, SequenceId, SequenceSlot, VariableRefToken, VariableToken,
};
