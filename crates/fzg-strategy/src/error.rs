// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised while setting up or advancing a strategy.

use fzg_error::{ErrorCode, HasErrorCode};
use fzg_token::TokenError;
use thiserror::Error;

/// Errors from strategy construction and iteration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StrategyError {
    /// No strategy is registered under the requested name.
    #[error("unknown strategy '{name}' (available: {available})")]
    UnknownStrategy {
        /// Requested name.
        name: String,
        /// Comma-separated registered names.
        available: String,
    },

    /// The graph references itself and cannot be enumerated exhaustively.
    #[error("endless loop detected: the graph references itself")]
    EndlessLoopDetected,

    /// More optionals than the subset counter can address.
    #[error("{count} optional nodes exceed the limit of {limit}")]
    TooManyOptionals {
        /// Optionals found.
        count: usize,
        /// Largest supported number.
        limit: usize,
    },

    /// A node rejected a state change.
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl HasErrorCode for StrategyError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownStrategy { .. } => ErrorCode::StrategyUnknown,
            Self::EndlessLoopDetected => ErrorCode::EndlessLoopDetected,
            Self::TooManyOptionals { .. } => ErrorCode::TooManyOptionals,
            Self::Token(e) => e.code(),
        }
    }
}
