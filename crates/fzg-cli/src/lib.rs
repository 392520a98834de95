// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Library half of the `fzg` binary. Subcommand bodies and output formatting
//! live here so they can be tested without spawning the process.

pub mod commands;
pub mod format;
