// SPDX-License-Identifier: MIT OR Apache-2.0
//! Output formatting for the `fzg` CLI.

use std::fmt;
use std::str::FromStr;

use fzg_exec::Feedback;
use serde::{Deserialize, Serialize};

use crate::commands::{CheckReport, FuzzRecord, FuzzSummary, ReduceSummary};

/// Supported output formats.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Plain text, one output per line.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::Json => "json",
        };
        f.write_str(s)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" | "jsonl" => Ok(Self::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Formats command results.
#[derive(Debug, Clone)]
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Create a formatter for `format`.
    #[must_use]
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// One generated output.
    #[must_use]
    pub fn format_record(&self, record: &FuzzRecord) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(record).unwrap_or_default(),
            OutputFormat::Text => match record.verdict {
                Some(v) => format!("[{}] {}", verdict_label(v), record.text),
                None => record.text.clone(),
            },
        }
    }

    /// Trailer of a `fuzz` run.
    #[must_use]
    pub fn format_fuzz_summary(&self, summary: &FuzzSummary) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(summary).unwrap_or_default(),
            OutputFormat::Text => format!(
                "{}: {} outputs ({} good, {} bad)",
                summary.strategy, summary.produced, summary.good, summary.bad
            ),
        }
    }

    /// Result of a `reduce` run.
    #[must_use]
    pub fn format_reduction(&self, summary: &ReduceSummary) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(summary).unwrap_or_default(),
            OutputFormat::Text => summary.reduced.clone(),
        }
    }

    /// Result of a `check` run.
    #[must_use]
    pub fn format_check(&self, report: &CheckReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => format_check_text(report),
        }
    }
}

fn verdict_label(verdict: Feedback) -> &'static str {
    match verdict {
        Feedback::Good => "good",
        Feedback::Bad => "bad",
    }
}

fn format_check_text(report: &CheckReport) -> String {
    let mut lines = vec![
        format!("rules:           {}", report.rules),
        format!("nodes:           {}", report.nodes),
        format!(
            "recursive:       {}",
            if report.recursive { "yes" } else { "no" }
        ),
        format!(
            "unrolled nodes:  {} (max_repeat {})",
            report.unrolled_nodes, report.max_repeat
        ),
        format!("optionals:       {}", report.optionals),
        format!("all:             {}", count(report.all_permutations)),
        format!("almost all:      {}", count(report.almost_all_permutations)),
    ];
    lines.extend(report.warnings.iter().map(|w| format!("warning: {w}")));
    lines.join("\n")
}

fn count(n: u64) -> String {
    if n == u64::MAX {
        "saturated".to_string()
    } else {
        n.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record(verdict: Option<Feedback>) -> FuzzRecord {
        FuzzRecord {
            index: 4,
            text: "12".into(),
            verdict,
        }
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("jsonl".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::Text.to_string(), "text");
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn text_records() {
        let f = Formatter::new(OutputFormat::Text);
        assert_eq!(f.format_record(&record(None)), "12");
        assert_eq!(f.format_record(&record(Some(Feedback::Bad))), "[bad] 12");
    }

    #[test]
    fn json_records_skip_missing_verdicts() {
        let f = Formatter::new(OutputFormat::Json);
        assert_eq!(f.format_record(&record(None)), r#"{"index":4,"text":"12"}"#);
        assert_eq!(
            f.format_record(&record(Some(Feedback::Good))),
            r#"{"index":4,"text":"12","verdict":"good"}"#
        );
    }

    #[test]
    fn check_text_marks_saturation() {
        let report = CheckReport {
            rules: 2,
            nodes: 9,
            recursive: true,
            max_repeat: 2,
            unrolled_nodes: 14,
            optionals: 1,
            all_permutations: u64::MAX,
            almost_all_permutations: 5,
            warnings: vec!["rule 'x' is never referenced".into()],
        };
        let text = Formatter::new(OutputFormat::Text).format_check(&report);
        assert!(text.contains("recursive:       yes"));
        assert!(text.contains("all:             saturated"));
        assert!(text.ends_with("warning: rule 'x' is never referenced"));
    }
}
