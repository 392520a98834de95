// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subcommand implementations for the `fzg` CLI.

use std::path::Path;

use anyhow::{Context, Result};
use fzg_config::FuzzConfig;
use fzg_exec::{ExecHarness, Feedback, Harness};
use fzg_strategy::{almost_all_count, run_enumeration};
use fzg_token::{CompiledGraph, Graph, GraphDocument, NodeId, View};
use serde::Serialize;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Graph loading
// ---------------------------------------------------------------------------

/// Load and compile a graph document (`.toml`, otherwise JSON).
pub fn load_graph(path: &Path) -> Result<CompiledGraph> {
    let document = GraphDocument::load(path)
        .with_context(|| format!("load graph document '{}'", path.display()))?;
    document
        .compile()
        .with_context(|| format!("compile graph document '{}'", path.display()))
}

/// Apply the configured filters, then unroll every pointer so strategies see
/// a finite tree.
pub fn prepare_for_fuzzing(compiled: CompiledGraph, config: &FuzzConfig) -> Result<(Graph, NodeId)> {
    let CompiledGraph {
        mut graph, root, ..
    } = compiled;
    let filters = fzg_filter::filters_by_name(&config.filters)?;
    let root = fzg_filter::apply_filters(&mut graph, root, &filters);
    let root = fzg_unroll::unroll_pointers(&mut graph, root, config.max_repeat());
    Ok((graph, root))
}

/// The harness configured for this run, if any.
pub fn harness_for(config: &FuzzConfig) -> Option<ExecHarness> {
    config.exec.clone().map(ExecHarness::new)
}

// ---------------------------------------------------------------------------
// fuzz
// ---------------------------------------------------------------------------

/// One generated output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FuzzRecord {
    /// Zero-based position in the run.
    pub index: usize,
    /// Rendered text.
    pub text: String,
    /// Harness verdict, when a harness is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Feedback>,
}

/// Counters for a finished `fuzz` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FuzzSummary {
    /// Strategy that produced the outputs.
    pub strategy: String,
    /// Outputs produced.
    pub produced: usize,
    /// Outputs judged `Good`.
    pub good: usize,
    /// Outputs judged `Bad`.
    pub bad: usize,
}

/// Run the configured strategy over the document at `graph_path`, handing
/// each output to `emit` as soon as it exists.
pub async fn fuzz<F>(
    graph_path: &Path,
    config: &FuzzConfig,
    harness: Option<&dyn Harness>,
    mut emit: F,
) -> Result<FuzzSummary>
where
    F: FnMut(&FuzzRecord) -> Result<()>,
{
    let compiled = load_graph(graph_path)?;
    let (mut graph, root) = prepare_for_fuzzing(compiled, config)?;

    let strategy = config.strategy_name();
    let options = config.strategy_options();
    let run = run_enumeration(strategy, &mut graph, root, &options)
        .with_context(|| format!("start strategy '{strategy}'"))?;

    let mut summary = FuzzSummary {
        strategy: strategy.to_string(),
        ..Default::default()
    };
    for (index, state) in run.enumerate() {
        let text = state.with_context(|| format!("strategy '{strategy}' failed"))?;
        let verdict = match harness {
            Some(h) => Some(h.verdict(&text).await.context("harness failed")?),
            None => None,
        };
        match verdict {
            Some(Feedback::Good) => summary.good += 1,
            Some(Feedback::Bad) => summary.bad += 1,
            None => {}
        }
        summary.produced += 1;
        emit(&FuzzRecord {
            index,
            text,
            verdict,
        })?;
    }
    info!(
        target: "fzg.cli",
        strategy,
        produced = summary.produced,
        good = summary.good,
        bad = summary.bad,
        "fuzz run finished"
    );
    Ok(summary)
}

// ---------------------------------------------------------------------------
// reduce
// ---------------------------------------------------------------------------

/// Result of a `reduce` run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReduceSummary {
    /// Input before reduction.
    pub original: String,
    /// Smallest input that kept a `Good` verdict.
    pub reduced: String,
    /// Whether the original input itself was judged `Good`.
    pub original_good: bool,
    /// Run counters.
    pub stats: fzg_reduce::ReductionStats,
}

/// Instantiate the document at `graph_path` as `input` and reduce it with
/// `harness`.
pub async fn reduce(
    graph_path: &Path,
    input: &str,
    config: &FuzzConfig,
    harness: &dyn Harness,
) -> Result<ReduceSummary> {
    let CompiledGraph {
        mut graph, root, ..
    } = load_graph(graph_path)?;
    fzg_match::instantiate(&mut graph, root, input).context("input does not match the graph")?;

    let original_good = harness.verdict(input).await.context("harness failed")? == Feedback::Good;
    if !original_good {
        warn!(target: "fzg.cli", "original input is judged bad; nothing smaller will be kept");
    }

    let name = config.reduction_name();
    let mut run = fzg_reduce::run_reduction(name, &mut graph, root)?;
    let original = run.render();
    while let Some(candidate) = run.next_candidate()? {
        let verdict = harness.verdict(&candidate).await.context("harness failed")?;
        run.feedback(verdict)?;
    }
    let summary = ReduceSummary {
        original,
        reduced: run.render(),
        original_good,
        stats: run.stats().clone(),
    };
    info!(
        target: "fzg.cli",
        original_len = summary.original.len(),
        reduced_len = summary.reduced.len(),
        candidates = summary.stats.candidates,
        "reduction finished"
    );
    Ok(summary)
}

// ---------------------------------------------------------------------------
// check / print
// ---------------------------------------------------------------------------

/// Structural facts about a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    /// Rules in the document.
    pub rules: usize,
    /// Nodes in the compiled graph.
    pub nodes: usize,
    /// Whether the graph refers back into itself.
    pub recursive: bool,
    /// Unroll bound used for the counts below.
    pub max_repeat: usize,
    /// Nodes reachable after unrolling.
    pub unrolled_nodes: usize,
    /// Optional nodes after unrolling.
    pub optionals: usize,
    /// `AllPermutations` output count (saturating).
    pub all_permutations: u64,
    /// `AlmostAllPermutations` output count (saturating).
    pub almost_all_permutations: u64,
    /// Non-fatal findings from compilation.
    pub warnings: Vec<String>,
}

/// Compile the document and report its shape.
pub fn check(graph_path: &Path, max_repeat: usize) -> Result<CheckReport> {
    let CompiledGraph {
        mut graph,
        root,
        rules,
        warnings,
    } = load_graph(graph_path)?;
    let nodes = graph.len();
    let recursive = fzg_unroll::loop_exists(&graph, root);
    let root = fzg_unroll::unroll_pointers(&mut graph, root, max_repeat);
    let reachable = reachable(&graph, root);

    Ok(CheckReport {
        rules: rules.len(),
        nodes,
        recursive,
        max_repeat,
        unrolled_nodes: reachable.len(),
        optionals: reachable.iter().filter(|&&n| graph.is_optional(n)).count(),
        all_permutations: graph.total_permutation_count(root),
        almost_all_permutations: almost_all_count(&graph, root),
        warnings: warnings.iter().map(ToString::to_string).collect(),
    })
}

/// Debug tree of the document, optionally unrolled first.
pub fn print_tree(graph_path: &Path, view: View, unroll: Option<usize>) -> Result<String> {
    let CompiledGraph {
        mut graph, root, ..
    } = load_graph(graph_path)?;
    let root = match unroll {
        Some(max_repeat) => fzg_unroll::unroll_pointers(&mut graph, root, max_repeat),
        None => root,
    };
    Ok(graph.debug_tree(root, view))
}

fn reachable(graph: &Graph, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        out.push(id);
        stack.extend(graph.structural_children(id));
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fzg_exec::ClosureHarness;
    use std::io::Write;

    fn document(json: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        f.write_all(json.as_bytes()).unwrap();
        f
    }

    const DIGITS: &str = r#"{
        "rules": {
            "START": { "type": "one", "alternatives": [
                { "type": "const", "value": "1" },
                { "type": "const", "value": "2" },
                { "type": "const", "value": "3" }
            ] }
        }
    }"#;

    const RECURSIVE: &str = r#"{
        "rules": {
            "START": { "type": "concat", "items": [
                { "type": "const", "value": "a" },
                { "type": "one", "alternatives": [
                    { "type": "ref", "rule": "START" },
                    { "type": "concat", "items": [] }
                ] }
            ] }
        }
    }"#;

    #[tokio::test]
    async fn fuzz_emits_every_choice() {
        let doc = document(DIGITS);
        let mut seen = Vec::new();
        let summary = fuzz(doc.path(), &FuzzConfig::default(), None, |r| {
            seen.push(r.text.clone());
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(seen, ["1", "2", "3"]);
        assert_eq!(summary.produced, 3);
    }

    #[tokio::test]
    async fn fuzz_counts_verdicts() {
        let doc = document(DIGITS);
        let harness = ClosureHarness::new(|t: &str| {
            if t == "2" { Feedback::Good } else { Feedback::Bad }
        });
        let summary = fuzz(doc.path(), &FuzzConfig::default(), Some(&harness), |_| Ok(()))
            .await
            .unwrap();
        assert_eq!((summary.good, summary.bad), (1, 2));
    }

    #[tokio::test]
    async fn fuzz_unrolls_recursive_documents() {
        let doc = document(RECURSIVE);
        let mut seen = Vec::new();
        fuzz(doc.path(), &FuzzConfig::default(), None, |r| {
            seen.push(r.text.clone());
            Ok(())
        })
        .await
        .unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|t| t.len() <= 2 && t.chars().all(|c| c == 'a')));
    }

    #[tokio::test]
    async fn reduce_keeps_the_smallest_good_input() {
        let doc = document(
            r#"{ "rules": { "START": { "type": "repeat", "min": 1, "max": 3, "item":
                { "type": "one", "alternatives": [
                    { "type": "const", "value": "1" },
                    { "type": "const", "value": "2" }
                ] } } } }"#,
        );
        let harness = ClosureHarness::new(|t: &str| {
            if t.contains('2') { Feedback::Good } else { Feedback::Bad }
        });
        let summary = reduce(doc.path(), "12", &FuzzConfig::default(), &harness)
            .await
            .unwrap();
        assert!(summary.original_good);
        assert_eq!(summary.original, "12");
        assert_eq!(summary.reduced, "2");
    }

    #[tokio::test]
    async fn reduce_rejects_unmatched_input() {
        let doc = document(DIGITS);
        let harness = ClosureHarness::new(|_: &str| Feedback::Good);
        let err = reduce(doc.path(), "7", &FuzzConfig::default(), &harness)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn check_reports_recursion_and_counts() {
        let doc = document(RECURSIVE);
        let report = check(doc.path(), 2).unwrap();
        assert!(report.recursive);
        assert_eq!(report.rules, 1);
        assert!(report.all_permutations >= 1);

        let doc = document(DIGITS);
        let report = check(doc.path(), 2).unwrap();
        assert!(!report.recursive);
        assert_eq!(report.all_permutations, 3);
        assert_eq!(report.optionals, 0);
    }

    #[test]
    fn print_shows_the_tree() {
        let doc = document(DIGITS);
        let tree = print_tree(doc.path(), View::Structural, None).unwrap();
        assert!(tree.contains("One"));
        assert_eq!(tree.matches("Const").count(), 3);
    }
}
