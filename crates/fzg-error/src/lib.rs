// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stable error codes and categories shared by the fuzzgraph crates.
//!
//! Every crate keeps its own `thiserror` enum and maps each variant to an
//! [`ErrorCode`] through a `code()` method. [`FzgError`] is the unified
//! carrier used at the top of a run: a stable code, a human-readable message,
//! an optional cause and arbitrary key-value context.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed graph documents, unknown strategy or filter names, inputs
    /// that cannot be instantiated. Reported before generation starts.
    Construction,
    /// Contract violations such as out-of-range permutation indexes.
    Bounds,
    /// Graph shapes a run refuses to walk (unbounded self-reference).
    Structural,
    /// Failures of the external program harness.
    Harness,
    /// Configuration errors.
    Config,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Construction => "construction",
            Self::Bounds => "bounds",
            Self::Structural => "structural",
            Self::Harness => "harness",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Construction --
    /// Graph document failed to parse or is semantically invalid.
    DocumentInvalid,
    /// A rule reference names a rule that does not exist.
    RuleUndefined,
    /// Requested strategy name is not registered.
    StrategyUnknown,
    /// Requested filter name is not registered.
    FilterUnknown,
    /// A concrete input could not be mapped onto the graph.
    InstantiationFailed,

    // -- Bounds --
    /// A permutation or reduction index is outside the node's range.
    IndexOutOfBound,
    /// Reduction feedback arrived when none was expected, or was missing.
    FeedbackOutOfOrder,

    // -- Structural --
    /// The graph contains a self-reference the run cannot bound.
    EndlessLoopDetected,
    /// The graph has more optional nodes than the strategy can address.
    TooManyOptionals,

    // -- Harness --
    /// The external program could not be launched.
    HarnessSpawnFailed,
    /// The external program did not finish within its timeout.
    HarnessTimeout,
    /// Reading from or writing to the external program failed.
    HarnessIo,

    // -- Config --
    /// Configuration file or value is invalid.
    ConfigInvalid,

    // -- Internal --
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DocumentInvalid
            | Self::RuleUndefined
            | Self::StrategyUnknown
            | Self::FilterUnknown
            | Self::InstantiationFailed => ErrorCategory::Construction,

            Self::IndexOutOfBound | Self::FeedbackOutOfOrder => ErrorCategory::Bounds,

            Self::EndlessLoopDetected | Self::TooManyOptionals => ErrorCategory::Structural,

            Self::HarnessSpawnFailed | Self::HarnessTimeout | Self::HarnessIo => {
                ErrorCategory::Harness
            }

            Self::ConfigInvalid => ErrorCategory::Config,

            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"ENDLESS_LOOP_DETECTED"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentInvalid => "DOCUMENT_INVALID",
            Self::RuleUndefined => "RULE_UNDEFINED",
            Self::StrategyUnknown => "STRATEGY_UNKNOWN",
            Self::FilterUnknown => "FILTER_UNKNOWN",
            Self::InstantiationFailed => "INSTANTIATION_FAILED",
            Self::IndexOutOfBound => "INDEX_OUT_OF_BOUND",
            Self::FeedbackOutOfOrder => "FEEDBACK_OUT_OF_ORDER",
            Self::EndlessLoopDetected => "ENDLESS_LOOP_DETECTED",
            Self::TooManyOptionals => "TOO_MANY_OPTIONALS",
            Self::HarnessSpawnFailed => "HARNESS_SPAWN_FAILED",
            Self::HarnessTimeout => "HARNESS_TIMEOUT",
            Self::HarnessIo => "HARNESS_IO",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::Internal => "INTERNAL",
        }
    }

    /// Whether an error with this code is fatal to the whole run.
    ///
    /// Every code is fatal to the run that raised it; only construction and
    /// config errors are raised before any state has been produced.
    pub fn is_pre_flight(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Construction | ErrorCategory::Config | ErrorCategory::Structural
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FzgError
// ---------------------------------------------------------------------------

/// Unified fuzzgraph error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use fzg_error::{ErrorCode, FzgError};
///
/// let err = FzgError::new(ErrorCode::EndlessLoopDetected, "graph is recursive")
///     .with_context("strategy", "AllPermutations")
///     .with_context("max_repeat", 2);
/// assert_eq!(err.code, ErrorCode::EndlessLoopDetected);
/// ```
pub struct FzgError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl FzgError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Debug for FzgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("FzgError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for FzgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for FzgError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Implemented by every crate-local error enum so callers can lift it into an
/// [`FzgError`] without losing the stable code.
pub trait HasErrorCode: std::error::Error + Send + Sync + Sized + 'static {
    /// Stable code for this error value.
    fn code(&self) -> ErrorCode;

    /// Wrap `self` as the source of a new [`FzgError`].
    fn into_fzg(self) -> FzgError {
        FzgError::new(self.code(), self.to_string()).with_source(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
