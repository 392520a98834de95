// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for fuzzgraph runs.
//!
//! [`FuzzConfig`] carries the knobs a `fuzz` or `reduce` run needs: strategy,
//! unroll bound, seed, output limit, filters and an optional exec harness.
//! Unset fields fall back to documented defaults through the accessor
//! methods, which keeps [`merge_configs`] a plain field-wise overlay.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::path::Path;

use fzg_error::{ErrorCode, HasErrorCode};
use fzg_exec::ExecSpec;
use fzg_strategy::StrategyOptions;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file or an override could not be parsed.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

impl HasErrorCode for ConfigError {
    fn code(&self) -> ErrorCode {
        ErrorCode::ConfigInvalid
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory issues that do not prevent a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// The unroll bound is high enough to blow up the graph.
    LargeMaxRepeat {
        /// Configured bound.
        max_repeat: usize,
    },
    /// The harness timeout is unusually large.
    LargeTimeout {
        /// Timeout in milliseconds.
        timeout_ms: u64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::LargeMaxRepeat { max_repeat } => {
                write!(
                    f,
                    "max_repeat {max_repeat} may unroll recursive graphs into very large trees"
                )
            }
            ConfigWarning::LargeTimeout { timeout_ms } => {
                write!(f, "exec timeout of {timeout_ms}ms is large for a per-input harness")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Settings for a fuzzing or reduction run.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct FuzzConfig {
    /// Strategy name (see `fzg_strategy::STRATEGY_NAMES`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    /// Reduction strategy name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduction: Option<String>,

    /// How often a pointer may be expanded along one path when unrolling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_repeat: Option<usize>,

    /// Seed for randomised strategies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Stop after this many outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Filters applied in order before the strategy runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<String>,

    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Harness that judges each output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecSpec>,
}

impl FuzzConfig {
    /// Strategy name, defaulting to [`DEFAULT_STRATEGY`].
    pub fn strategy_name(&self) -> &str {
        self.strategy.as_deref().unwrap_or(DEFAULT_STRATEGY)
    }

    /// Reduction name, defaulting to [`DEFAULT_REDUCTION`].
    pub fn reduction_name(&self) -> &str {
        self.reduction.as_deref().unwrap_or(DEFAULT_REDUCTION)
    }

    /// Log level, defaulting to [`DEFAULT_LOG_LEVEL`].
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Unroll bound, defaulting to `fzg_unroll::DEFAULT_MAX_REPEAT`.
    pub fn max_repeat(&self) -> usize {
        self.max_repeat.unwrap_or(fzg_unroll::DEFAULT_MAX_REPEAT)
    }

    /// Strategy knobs derived from this config.
    pub fn strategy_options(&self) -> StrategyOptions {
        StrategyOptions {
            seed: self.seed.unwrap_or(0),
            limit: self.limit,
            max_repeat: self.max_repeat(),
        }
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Strategy used when none is configured.
pub const DEFAULT_STRATEGY: &str = "AllPermutations";

/// Reduction used when none is configured.
pub const DEFAULT_REDUCTION: &str = "Linear";

/// Log level used when none is configured.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Unroll bounds above this generate a warning.
const LARGE_MAX_REPEAT: usize = 8;

/// Maximum allowed harness timeout (one hour).
const MAX_TIMEOUT_MS: u64 = 3_600_000;

/// Harness timeouts above this generate a warning.
const LARGE_TIMEOUT_MS: u64 = 60_000;

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`FuzzConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`FuzzConfig::default()`].
///
/// Environment overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<FuzzConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => FuzzConfig::default(),
    };
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Parse a TOML string into a [`FuzzConfig`].
pub fn parse_toml(content: &str) -> Result<FuzzConfig, ConfigError> {
    toml::from_str::<FuzzConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognised variables:
/// - `FZG_STRATEGY`
/// - `FZG_LOG_LEVEL`
/// - `FZG_SEED`
/// - `FZG_MAX_REPEAT`
pub fn apply_env_overrides(config: &mut FuzzConfig) -> Result<(), ConfigError> {
    apply_overrides(config, |key| std::env::var(key).ok())
}

/// Apply overrides read through `lookup`, which maps a variable name to its
/// value.
pub fn apply_overrides<F>(config: &mut FuzzConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("FZG_STRATEGY") {
        config.strategy = Some(val);
    }
    if let Some(val) = lookup("FZG_LOG_LEVEL") {
        config.log_level = Some(val);
    }
    if let Some(val) = lookup("FZG_SEED") {
        config.seed = Some(parse_number("FZG_SEED", &val)?);
    }
    if let Some(val) = lookup("FZG_MAX_REPEAT") {
        config.max_repeat = Some(parse_number("FZG_MAX_REPEAT", &val)?);
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &str, val: &str) -> Result<T, ConfigError> {
    val.trim().parse().map_err(|_| ConfigError::ParseError {
        reason: format!("{key}: '{val}' is not a valid number"),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a configuration, returning advisory warnings.
///
/// Unknown names, zero bounds and bad harness settings are returned as a
/// [`ConfigError::ValidationError`]; soft issues come back as warnings.
pub fn validate_config(config: &FuzzConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if let Some(ref level) = config.log_level
        && !VALID_LOG_LEVELS.contains(&level.as_str())
    {
        errors.push(format!("invalid log_level '{level}'"));
    }

    if let Some(ref name) = config.strategy
        && !fzg_strategy::STRATEGY_NAMES.contains(&name.as_str())
    {
        errors.push(format!(
            "unknown strategy '{name}' (available: {})",
            fzg_strategy::STRATEGY_NAMES.join(", ")
        ));
    }

    if let Some(ref name) = config.reduction
        && !fzg_reduce::REDUCTION_NAMES.contains(&name.as_str())
    {
        errors.push(format!("unknown reduction '{name}'"));
    }

    for filter in &config.filters {
        if !fzg_filter::FILTER_NAMES.contains(&filter.as_str()) {
            errors.push(format!("unknown filter '{filter}'"));
        }
    }

    match config.max_repeat {
        Some(0) => errors.push("max_repeat must be at least 1".into()),
        Some(n) if n > LARGE_MAX_REPEAT => {
            warnings.push(ConfigWarning::LargeMaxRepeat { max_repeat: n });
        }
        _ => {}
    }

    if config.limit == Some(0) {
        errors.push("limit must be at least 1".into());
    }

    if let Some(exec) = &config.exec {
        if exec.command.trim().is_empty() {
            errors.push("exec: command must not be empty".into());
        }
        if let Some(t) = exec.timeout_ms {
            if t == 0 || t > MAX_TIMEOUT_MS {
                errors.push(format!(
                    "exec: timeout {t}ms out of range (1..{MAX_TIMEOUT_MS})"
                ));
            } else if t > LARGE_TIMEOUT_MS {
                warnings.push(ConfigWarning::LargeTimeout { timeout_ms: t });
            }
        }
    }

    if config.strategy.as_deref() == Some("random") && config.seed.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "seed".into(),
            hint: "random runs use seed 0 and repeat the same outputs".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Values in `overlay` take precedence over `base`.
///
/// A non-empty overlay filter list replaces the base list.
pub fn merge_configs(base: FuzzConfig, overlay: FuzzConfig) -> FuzzConfig {
    FuzzConfig {
        strategy: overlay.strategy.or(base.strategy),
        reduction: overlay.reduction.or(base.reduction),
        max_repeat: overlay.max_repeat.or(base.max_repeat),
        seed: overlay.seed.or(base.seed),
        limit: overlay.limit.or(base.limit),
        filters: if overlay.filters.is_empty() {
            base.filters
        } else {
            overlay.filters
        },
        log_level: overlay.log_level.or(base.log_level),
        exec: overlay.exec.or(base.exec),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_is_valid_and_resolves_defaults() {
        let cfg = FuzzConfig::default();
        assert!(validate_config(&cfg).unwrap().is_empty());
        assert_eq!(cfg.strategy_name(), "AllPermutations");
        assert_eq!(cfg.reduction_name(), "Linear");
        assert_eq!(cfg.log_level(), "info");
        assert_eq!(cfg.strategy_options(), StrategyOptions::default());
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
            strategy = "random"
            seed = 7
            limit = 20
            max_repeat = 3
            filters = ["PositiveBoundaryValueAnalysis"]
            log_level = "debug"

            [exec]
            command = "./parser"
            args = ["--file", "{}"]
            input = "file"
            timeout_ms = 500

            [exec.expect]
            exit_code = 101
            stderr_contains = "panicked"
        "#;
        let cfg = parse_toml(toml).unwrap();
        assert_eq!(cfg.strategy_name(), "random");
        assert_eq!(cfg.strategy_options().seed, 7);
        assert_eq!(cfg.max_repeat(), 3);
        let exec = cfg.exec.as_ref().unwrap();
        assert_eq!(exec.input, fzg_exec::InputMode::File);
        assert_eq!(exec.expect.exit_code, Some(101));
        assert!(validate_config(&cfg).unwrap().is_empty());
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            parse_toml("this is [not valid toml =").unwrap_err(),
            ConfigError::ParseError { .. }
        ));
        assert!(matches!(
            parse_toml("seed = \"seven\"").unwrap_err(),
            ConfigError::ParseError { .. }
        ));
    }

    #[test]
    fn empty_toml_parses_to_defaults() {
        assert_eq!(parse_toml("").unwrap(), FuzzConfig::default());
    }

    #[test]
    fn validation_collects_every_problem() {
        let cfg = FuzzConfig {
            strategy: Some("Shuffle".into()),
            reduction: Some("Binary".into()),
            filters: vec!["Nope".into()],
            max_repeat: Some(0),
            limit: Some(0),
            log_level: Some("verbose".into()),
            exec: Some(ExecSpec::new(" ")),
            ..Default::default()
        };
        let err = validate_config(&cfg).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigInvalid);
        let ConfigError::ValidationError { reasons } = err else {
            panic!("expected ValidationError");
        };
        assert_eq!(reasons.len(), 7, "{reasons:?}");
        assert!(reasons.iter().any(|r| r.contains("unknown strategy 'Shuffle'")));
    }

    #[test]
    fn timeout_bounds() {
        let mut cfg = FuzzConfig {
            exec: Some(ExecSpec::new("sut")),
            ..Default::default()
        };
        cfg.exec.as_mut().unwrap().timeout_ms = Some(0);
        assert!(validate_config(&cfg).is_err());

        cfg.exec.as_mut().unwrap().timeout_ms = Some(120_000);
        let warnings = validate_config(&cfg).unwrap();
        assert_eq!(warnings, [ConfigWarning::LargeTimeout { timeout_ms: 120_000 }]);
    }

    #[test]
    fn advisory_warnings() {
        let cfg = FuzzConfig {
            strategy: Some("random".into()),
            max_repeat: Some(12),
            ..Default::default()
        };
        let warnings = validate_config(&cfg).unwrap();
        assert!(warnings.contains(&ConfigWarning::LargeMaxRepeat { max_repeat: 12 }));
        assert!(
            warnings
                .iter()
                .any(|w| matches!(w, ConfigWarning::MissingOptionalField { field, .. } if field == "seed"))
        );
        assert!(warnings.iter().all(|w| !w.to_string().is_empty()));
    }

    #[test]
    fn merge_overlay_wins_field_by_field() {
        let base = FuzzConfig {
            strategy: Some("random".into()),
            seed: Some(1),
            filters: vec!["PositiveBoundaryValueAnalysis".into()],
            exec: Some(ExecSpec::new("base")),
            ..Default::default()
        };
        let overlay = FuzzConfig {
            seed: Some(9),
            limit: Some(3),
            ..Default::default()
        };
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.strategy.as_deref(), Some("random"));
        assert_eq!(merged.seed, Some(9));
        assert_eq!(merged.limit, Some(3));
        assert_eq!(merged.filters, ["PositiveBoundaryValueAnalysis"]);
        assert_eq!(merged.exec.unwrap().command, "base");
    }

    #[test]
    fn overrides_apply_and_reject_bad_numbers() {
        let vars = HashMap::from([
            ("FZG_STRATEGY", "PermuteOptionals"),
            ("FZG_SEED", "42"),
            ("FZG_MAX_REPEAT", "4"),
        ]);
        let mut cfg = FuzzConfig::default();
        apply_overrides(&mut cfg, |k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.strategy_name(), "PermuteOptionals");
        assert_eq!(cfg.seed, Some(42));
        assert_eq!(cfg.max_repeat(), 4);

        let err = apply_overrides(&mut cfg, |k| (k == "FZG_SEED").then(|| "x".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn load_from_file_and_missing_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "strategy = \"AlmostAllPermutations\"").unwrap();
        let cfg = load_config(Some(f.path())).unwrap();
        // FZG_STRATEGY in the environment would override the file.
        if std::env::var("FZG_STRATEGY").is_err() {
            assert_eq!(cfg.strategy_name(), "AlmostAllPermutations");
        }

        let err = load_config(Some(Path::new("/nonexistent/fzg.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn serde_roundtrip_and_schema() {
        let cfg = FuzzConfig {
            strategy: Some("random".into()),
            seed: Some(3),
            exec: Some(ExecSpec::new("sut").with_args(["{}"])),
            ..Default::default()
        };
        let text = toml::to_string(&cfg).unwrap();
        assert_eq!(parse_toml(&text).unwrap(), cfg);

        let schema = schemars::schema_for!(FuzzConfig);
        let json = serde_json::to_value(&schema).unwrap();
        assert!(json["properties"]["exec"].is_object());
    }
}
