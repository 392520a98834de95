// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised by graph operations.

use fzg_error::{ErrorCode, HasErrorCode};
use thiserror::Error;

use crate::node::NodeId;

/// Errors from node-level graph operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// A permutation or reduction index was outside `[1, count]`.
    #[error("index {index} out of bound for node {node} (valid range 1..={count})")]
    IndexOutOfBound {
        /// Node the index was applied to.
        node: NodeId,
        /// The rejected index.
        index: usize,
        /// Number of states the node currently has.
        count: usize,
    },

    /// The node kind has no reduction space.
    #[error("node {0} is not reducible")]
    NotReducible(NodeId),

    /// A range was declared with an empty or non-advancing span.
    #[error("invalid range {from}..={to} step {step}")]
    InvalidRange {
        /// Inclusive lower bound.
        from: i64,
        /// Inclusive upper bound.
        to: i64,
        /// Distance between consecutive values.
        step: i64,
    },

    /// A repeat was declared with `min > max`.
    #[error("invalid repeat bounds {min}..={max}")]
    InvalidRepeat {
        /// Minimum item count.
        min: u32,
        /// Maximum item count.
        max: u32,
    },

    /// A choice node was declared without alternatives.
    #[error("choice node needs at least one alternative")]
    EmptyChoice,

    /// Two nodes were expected to share a shape but do not.
    #[error("node {left} and node {right} differ in shape")]
    ShapeMismatch {
        /// Source node.
        left: NodeId,
        /// Destination node.
        right: NodeId,
    },
}

impl HasErrorCode for TokenError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::IndexOutOfBound { .. } | Self::NotReducible(_) => ErrorCode::IndexOutOfBound,
            Self::InvalidRange { .. } | Self::InvalidRepeat { .. } | Self::EmptyChoice => {
                ErrorCode::DocumentInvalid
            }
            Self::ShapeMismatch { .. } => ErrorCode::Internal,
        }
    }
}
