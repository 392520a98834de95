// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fzg_cli::commands;
use fzg_cli::format::{Formatter, OutputFormat};
use fzg_config::{FuzzConfig, load_config, merge_configs, validate_config};
use fzg_exec::{ExecSpec, Expectation, Harness, InputMode};
use fzg_token::View;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fzg", version, about = "Token-graph fuzzer and test-case reducer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    /// TOML config file; command-line flags take precedence.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate inputs from a graph document.
    Fuzz {
        /// Graph document (`.json` or `.toml`).
        #[arg(long)]
        graph: PathBuf,

        /// AllPermutations | AlmostAllPermutations | PermuteOptionals | random.
        #[arg(long)]
        strategy: Option<String>,

        /// How often a recursive rule may expand along one path.
        #[arg(long)]
        max_repeat: Option<usize>,

        /// Filter applied before generation. Can be repeated.
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Stop after this many outputs.
        #[arg(long)]
        limit: Option<usize>,

        /// Seed for randomised strategies.
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        #[command(flatten)]
        exec: ExecArgs,
    },

    /// Shrink an input while the harness keeps judging it good.
    Reduce {
        /// Graph document the input was generated from.
        #[arg(long)]
        graph: PathBuf,

        /// File holding the input to reduce.
        #[arg(long)]
        input: PathBuf,

        /// Write the reduced input here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        #[command(flatten)]
        exec: ExecArgs,
    },

    /// Report recursion and output counts of a graph document.
    Check {
        #[arg(long)]
        graph: PathBuf,

        #[arg(long)]
        max_repeat: Option<usize>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the node tree of a graph document.
    Print {
        #[arg(long)]
        graph: PathBuf,

        /// Show every alternative instead of the active state.
        #[arg(long)]
        structural: bool,

        /// Unroll recursion with this bound before printing.
        #[arg(long)]
        unroll: Option<usize>,
    },
}

/// Harness flags shared by `fuzz` and `reduce`.
#[derive(Args, Debug, Default)]
struct ExecArgs {
    /// Pass the input as a temp file path (substituted for `{}`) instead of stdin.
    #[arg(long)]
    exec_file: bool,

    /// Kill the harness after this many milliseconds.
    #[arg(long)]
    exec_timeout_ms: Option<u64>,

    /// Exit code that makes an input good.
    #[arg(long)]
    expect_exit: Option<i32>,

    /// Substring of stdout that makes an input good.
    #[arg(long)]
    expect_stdout: Option<String>,

    /// Substring of stderr that makes an input good.
    #[arg(long)]
    expect_stderr: Option<String>,

    /// Program and arguments of the harness. Must come last.
    #[arg(long, num_args = 1.., allow_hyphen_values = true, value_name = "CMD")]
    exec: Vec<String>,
}

impl ExecArgs {
    /// Layer the flags over the harness from the config file.
    fn apply(self, base: Option<ExecSpec>) -> Option<ExecSpec> {
        let mut spec = match self.exec.split_first() {
            Some((command, args)) => ExecSpec::new(command.clone()).with_args(args.iter().cloned()),
            None => base?,
        };
        if self.exec_file {
            spec.input = InputMode::File;
        }
        if self.exec_timeout_ms.is_some() {
            spec.timeout_ms = self.exec_timeout_ms;
        }
        let flags = Expectation {
            exit_code: self.expect_exit,
            stdout_contains: self.expect_stdout,
            stderr_contains: self.expect_stderr,
        };
        if !flags.is_empty() {
            spec.expect = flags;
        }
        Some(spec)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let file_config = load_config(cli.config.as_deref()).context("load config")?;

    let level = if cli.debug {
        "debug"
    } else {
        file_config.log_level()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("fzg={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Fuzz {
            graph,
            strategy,
            max_repeat,
            filters,
            limit,
            seed,
            format,
            exec,
        } => {
            let overlay = FuzzConfig {
                strategy,
                max_repeat,
                filters,
                limit,
                seed,
                ..Default::default()
            };
            let config = finish_config(file_config, overlay, exec)?;
            cmd_fuzz(graph, config, format).await
        }
        Commands::Reduce {
            graph,
            input,
            out,
            format,
            exec,
        } => {
            let config = finish_config(file_config, FuzzConfig::default(), exec)?;
            cmd_reduce(graph, input, out, config, format).await
        }
        Commands::Check {
            graph,
            max_repeat,
            format,
        } => {
            let overlay = FuzzConfig {
                max_repeat,
                ..Default::default()
            };
            let config = finish_config(file_config, overlay, ExecArgs::default())?;
            let report = commands::check(&graph, config.max_repeat())?;
            println!("{}", Formatter::new(format).format_check(&report));
            Ok(())
        }
        Commands::Print {
            graph,
            structural,
            unroll,
        } => {
            let view = if structural {
                View::Structural
            } else {
                View::Active
            };
            print!("{}", commands::print_tree(&graph, view, unroll)?);
            Ok(())
        }
    }
}

/// Merge the command-line overlay into the file config and validate it.
fn finish_config(base: FuzzConfig, overlay: FuzzConfig, exec: ExecArgs) -> Result<FuzzConfig> {
    let mut config = merge_configs(base, overlay);
    config.exec = exec.apply(config.exec.take());
    for w in validate_config(&config)? {
        warn!(target: "fzg.cli", "config: {w}");
    }
    Ok(config)
}

async fn cmd_fuzz(graph: PathBuf, config: FuzzConfig, format: OutputFormat) -> Result<()> {
    let harness = commands::harness_for(&config);
    let formatter = Formatter::new(format);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let summary = commands::fuzz(
        &graph,
        &config,
        harness.as_ref().map(|h| h as &dyn Harness),
        |record| {
            writeln!(out, "{}", formatter.format_record(record)).context("write output")
        },
    )
    .await?;
    if harness.is_some() {
        eprintln!("{}", formatter.format_fuzz_summary(&summary));
    }
    Ok(())
}

async fn cmd_reduce(
    graph: PathBuf,
    input: PathBuf,
    out: Option<PathBuf>,
    config: FuzzConfig,
    format: OutputFormat,
) -> Result<()> {
    let Some(harness) = commands::harness_for(&config) else {
        anyhow::bail!("reduce needs a harness: pass --exec or set [exec] in the config");
    };
    let text = std::fs::read_to_string(&input)
        .with_context(|| format!("read input '{}'", input.display()))?;

    let summary = commands::reduce(&graph, &text, &config, &harness).await?;
    match out {
        Some(path) => std::fs::write(&path, &summary.reduced)
            .with_context(|| format!("write reduced input '{}'", path.display()))?,
        None => println!("{}", Formatter::new(format).format_reduction(&summary)),
    }
    Ok(())
}
