// SPDX-License-Identifier: MIT OR Apache-2.0
//! Declarative graph documents.
//!
//! A [`GraphDocument`] names rules built from [`TokenSpec`] trees. Rules may
//! refer to each other by name, which compiles to pointer nodes, so documents
//! can express recursive grammars. Documents load from JSON or TOML.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use fzg_error::{ErrorCode, HasErrorCode};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::error::TokenError;
use crate::graph::Graph;
use crate::node::{NodeId, SequenceId};

/// Repeat upper bound used when a document leaves `max` out.
pub const DEFAULT_REPEAT_MAX: u32 = 2;

fn default_start() -> String {
    "START".into()
}

fn default_one() -> i64 {
    1
}

/// A named set of token rules with a designated start rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GraphDocument {
    /// Rule rendered as the root of the graph.
    #[serde(default = "default_start")]
    pub start: String,
    /// Rule bodies by name.
    pub rules: BTreeMap<String, TokenSpec>,
    /// Sequence counters by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sequences: BTreeMap<String, SequenceSpec>,
}

/// A sequence counter declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SequenceSpec {
    /// First value issued.
    #[serde(default = "default_one")]
    pub start: i64,
    /// Increment between issued values.
    #[serde(default = "default_one")]
    pub step: i64,
}

impl Default for SequenceSpec {
    fn default() -> Self {
        Self { start: 1, step: 1 }
    }
}

/// Serializable description of one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenSpec {
    /// Fixed text.
    Const {
        /// Text to emit.
        value: String,
    },
    /// Integer in `from..=to`.
    Range {
        /// Inclusive lower bound.
        from: i64,
        /// Inclusive upper bound.
        to: i64,
        /// Distance between values.
        #[serde(default = "default_one")]
        step: i64,
    },
    /// All items in order.
    Concat {
        /// Items to concatenate.
        items: Vec<TokenSpec>,
    },
    /// Exactly one alternative.
    One {
        /// Candidate alternatives.
        alternatives: Vec<TokenSpec>,
    },
    /// Item or nothing.
    Optional {
        /// Wrapped item.
        item: Box<TokenSpec>,
    },
    /// Bounded repetition.
    Repeat {
        /// Repeated item.
        item: Box<TokenSpec>,
        /// Minimum count.
        #[serde(default)]
        min: u32,
        /// Maximum count; defaults to the larger of `min` and 2.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<u32>,
    },
    /// Reference to another rule by name.
    Ref {
        /// Referenced rule.
        rule: String,
    },
    /// Next value of a named sequence.
    SequenceNext {
        /// Sequence name.
        sequence: String,
    },
    /// Most recent value of a named sequence.
    SequenceExisting {
        /// Sequence name.
        sequence: String,
    },
    /// Bind the item's text to a name.
    Variable {
        /// Variable name.
        name: String,
        /// Bound item.
        item: Box<TokenSpec>,
    },
    /// Text of a variable bound earlier.
    VariableRef {
        /// Variable name.
        name: String,
    },
}

impl TokenSpec {
    /// Fixed text.
    pub fn constant(value: impl Into<String>) -> Self {
        Self::Const {
            value: value.into(),
        }
    }

    /// Concatenation.
    pub fn concat(items: impl IntoIterator<Item = TokenSpec>) -> Self {
        Self::Concat {
            items: items.into_iter().collect(),
        }
    }

    /// Choice.
    pub fn one(alternatives: impl IntoIterator<Item = TokenSpec>) -> Self {
        Self::One {
            alternatives: alternatives.into_iter().collect(),
        }
    }

    /// Optional item.
    pub fn optional(item: TokenSpec) -> Self {
        Self::Optional {
            item: Box::new(item),
        }
    }

    /// Repetition.
    pub fn repeat(item: TokenSpec, min: u32, max: u32) -> Self {
        Self::Repeat {
            item: Box::new(item),
            min,
            max: Some(max),
        }
    }

    /// Rule reference.
    pub fn reference(rule: impl Into<String>) -> Self {
        Self::Ref { rule: rule.into() }
    }
}

/// Non-fatal findings from compiling a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentWarning {
    /// A rule nothing refers to and that is not the start rule.
    UnusedRule(String),
}

impl fmt::Display for DocumentWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnusedRule(name) => write!(f, "rule '{name}' is never referenced"),
        }
    }
}

/// Errors from loading or compiling a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The document file could not be read.
    #[error("failed to read document {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The text is not a well-formed document.
    #[error("failed to parse {format} document: {reason}")]
    Parse {
        /// `json` or `toml`.
        format: &'static str,
        /// Parser message.
        reason: String,
    },
    /// The start rule is not defined.
    #[error("start rule '{0}' is not defined")]
    MissingStart(String),
    /// A reference names a rule that is not defined.
    #[error("reference to undefined rule '{0}'")]
    UndefinedRule(String),
    /// A sequence slot names a sequence that is not declared.
    #[error("reference to undeclared sequence '{0}'")]
    UndefinedSequence(String),
    /// A token could not be built.
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl HasErrorCode for DocumentError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::UndefinedRule(_) | Self::UndefinedSequence(_) => ErrorCode::RuleUndefined,
            Self::Token(e) => e.code(),
            _ => ErrorCode::DocumentInvalid,
        }
    }
}

/// A compiled document.
#[derive(Debug, Clone)]
pub struct CompiledGraph {
    /// The graph arena.
    pub graph: Graph,
    /// Node of the start rule.
    pub root: NodeId,
    /// Node of every rule by name.
    pub rules: BTreeMap<String, NodeId>,
    /// Findings that did not stop compilation.
    pub warnings: Vec<DocumentWarning>,
}

impl GraphDocument {
    /// Document whose start rule is `root`.
    pub fn new(root: TokenSpec) -> Self {
        Self {
            start: default_start(),
            rules: BTreeMap::from([(default_start(), root)]),
            sequences: BTreeMap::new(),
        }
    }

    /// Add or replace a rule.
    pub fn with_rule(mut self, name: impl Into<String>, spec: TokenSpec) -> Self {
        self.rules.insert(name.into(), spec);
        self
    }

    /// Declare a sequence counter.
    pub fn with_sequence(mut self, name: impl Into<String>, start: i64, step: i64) -> Self {
        self.sequences.insert(name.into(), SequenceSpec { start, step });
        self
    }

    /// Parse a JSON document.
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(text).map_err(|e| DocumentError::Parse {
            format: "json",
            reason: e.to_string(),
        })
    }

    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, DocumentError> {
        toml::from_str(text).map_err(|e| DocumentError::Parse {
            format: "toml",
            reason: e.to_string(),
        })
    }

    /// Read a document from disk. Files ending in `.toml` parse as TOML,
    /// everything else as JSON.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&text),
            _ => Self::from_json(&text),
        }
    }

    /// Build the graph.
    ///
    /// Every rule compiles to its own subtree; references become pointers to
    /// the referenced rule's node, bound once all rules exist.
    pub fn compile(&self) -> Result<CompiledGraph, DocumentError> {
        if !self.rules.contains_key(&self.start) {
            return Err(DocumentError::MissingStart(self.start.clone()));
        }

        let mut compiler = Compiler {
            graph: Graph::new(),
            sequences: BTreeMap::new(),
            fixups: Vec::new(),
            referenced: BTreeSet::new(),
            repeats: Vec::new(),
        };
        for (name, spec) in &self.sequences {
            let id = compiler.graph.sequence(spec.start, spec.step);
            compiler.sequences.insert(name.clone(), id);
        }

        let mut rules = BTreeMap::new();
        for (name, spec) in &self.rules {
            let id = compiler.compile(spec)?;
            rules.insert(name.clone(), id);
        }

        let Compiler {
            mut graph,
            fixups,
            referenced,
            repeats,
            ..
        } = compiler;
        for (pointer, rule) in fixups {
            let target = rules
                .get(&rule)
                .copied()
                .ok_or_else(|| DocumentError::UndefinedRule(rule.clone()))?;
            graph.set_pointer_target(pointer, Some(target));
        }
        // Initial repeat items were cloned while references were still
        // unbound. Innermost first, so outer repeats clone refreshed templates.
        for id in repeats {
            graph.refresh(id);
        }

        let mut warnings = Vec::new();
        for name in rules.keys() {
            if name != &self.start && !referenced.contains(name) {
                warn!(target: "fzg.document", rule = %name, "rule is never referenced");
                warnings.push(DocumentWarning::UnusedRule(name.clone()));
            }
        }

        let root = rules[&self.start];
        Ok(CompiledGraph {
            graph,
            root,
            rules,
            warnings,
        })
    }
}

struct Compiler {
    graph: Graph,
    sequences: BTreeMap<String, SequenceId>,
    fixups: Vec<(NodeId, String)>,
    referenced: BTreeSet<String>,
    repeats: Vec<NodeId>,
}

impl Compiler {
    fn compile(&mut self, spec: &TokenSpec) -> Result<NodeId, DocumentError> {
        let id = match spec {
            TokenSpec::Const { value } => self.graph.constant(value.clone()),
            TokenSpec::Range { from, to, step } => self.graph.range(*from, *to, *step)?,
            TokenSpec::Concat { items } => {
                let children = items
                    .iter()
                    .map(|item| self.compile(item))
                    .collect::<Result<Vec<_>, _>>()?;
                self.graph.concat(children)
            }
            TokenSpec::One { alternatives } => {
                let children = alternatives
                    .iter()
                    .map(|item| self.compile(item))
                    .collect::<Result<Vec<_>, _>>()?;
                self.graph.one(children)?
            }
            TokenSpec::Optional { item } => {
                let child = self.compile(item)?;
                self.graph.optional(child)
            }
            TokenSpec::Repeat { item, min, max } => {
                let template = self.compile(item)?;
                let max = max.unwrap_or_else(|| (*min).max(DEFAULT_REPEAT_MAX));
                let repeat = self.graph.repeat(template, *min, max)?;
                if *min > 0 {
                    self.repeats.push(repeat);
                }
                repeat
            }
            TokenSpec::Ref { rule } => {
                let pointer = self.graph.pointer(None);
                self.fixups.push((pointer, rule.clone()));
                self.referenced.insert(rule.clone());
                pointer
            }
            TokenSpec::SequenceNext { sequence } => {
                let seq = self.sequence(sequence)?;
                self.graph.sequence_next(seq)
            }
            TokenSpec::SequenceExisting { sequence } => {
                let seq = self.sequence(sequence)?;
                self.graph.sequence_existing(seq)
            }
            TokenSpec::Variable { name, item } => {
                let child = self.compile(item)?;
                self.graph.variable(name.clone(), child)
            }
            TokenSpec::VariableRef { name } => self.graph.variable_ref(name.clone()),
        };
        Ok(id)
    }

    fn sequence(&self, name: &str) -> Result<SequenceId, DocumentError> {
        self.sequences
            .get(name)
            .copied()
            .ok_or_else(|| DocumentError::UndefinedSequence(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_json_document() {
        let doc = GraphDocument::from_json(
            r#"{
                "rules": {
                    "START": { "type": "concat", "items": [
                        { "type": "const", "value": "x=" },
                        { "type": "range", "from": 1, "to": 3 }
                    ]}
                }
            }"#,
        )
        .unwrap();
        let compiled = doc.compile().unwrap();
        assert_eq!(compiled.graph.render(compiled.root), "x=1");
        assert_eq!(compiled.graph.total_permutation_count(compiled.root), 3);
        assert!(compiled.warnings.is_empty());
    }

    #[test]
    fn compiles_toml_document() {
        let doc = GraphDocument::from_toml(
            r#"
            start = "expr"

            [rules.expr]
            type = "one"
            alternatives = [
                { type = "const", value = "a" },
                { type = "ref", rule = "pair" },
            ]

            [rules.pair]
            type = "concat"
            items = [
                { type = "const", value = "(" },
                { type = "ref", rule = "expr" },
                { type = "const", value = ")" },
            ]
            "#,
        )
        .unwrap();
        let compiled = doc.compile().unwrap();
        assert_eq!(compiled.graph.render(compiled.root), "a");
        assert_eq!(compiled.rules.len(), 2);
    }

    #[test]
    fn repeat_max_defaults() {
        let spec: TokenSpec =
            serde_json::from_str(r#"{"type":"repeat","item":{"type":"const","value":"x"},"min":3}"#)
                .unwrap();
        let compiled = GraphDocument::new(spec).compile().unwrap();
        let g = &compiled.graph;
        assert_eq!(g.permutation_count(compiled.root), 1);
        assert_eq!(g.render(compiled.root), "xxx");
    }

    #[test]
    fn reports_undefined_names() {
        let doc = GraphDocument::new(TokenSpec::reference("nope"));
        assert!(matches!(doc.compile(), Err(DocumentError::UndefinedRule(r)) if r == "nope"));

        let doc = GraphDocument::new(TokenSpec::SequenceNext {
            sequence: "ids".into(),
        });
        let err = doc.compile().unwrap_err();
        assert_eq!(err.code(), ErrorCode::RuleUndefined);

        let mut doc = GraphDocument::new(TokenSpec::constant("a"));
        doc.start = "main".into();
        assert!(matches!(doc.compile(), Err(DocumentError::MissingStart(_))));
    }

    #[test]
    fn warns_about_unused_rules() {
        let doc = GraphDocument::new(TokenSpec::constant("a"))
            .with_rule("spare", TokenSpec::constant("b"));
        let compiled = doc.compile().unwrap();
        assert_eq!(
            compiled.warnings,
            vec![DocumentWarning::UnusedRule("spare".into())]
        );
    }

    #[test]
    fn invalid_tokens_surface_as_errors() {
        let doc = GraphDocument::new(TokenSpec::one([]));
        assert!(matches!(
            doc.compile(),
            Err(DocumentError::Token(TokenError::EmptyChoice))
        ));
        let doc = GraphDocument::new(TokenSpec::repeat(TokenSpec::constant("x"), 3, 1));
        assert_eq!(doc.compile().unwrap_err().code(), ErrorCode::DocumentInvalid);
    }

    fn digits_rule(root: TokenSpec) -> GraphDocument {
        GraphDocument::new(root).with_rule(
            "D",
            TokenSpec::one([TokenSpec::constant("1"), TokenSpec::constant("2")]),
        )
    }

    #[test]
    fn initial_repeat_items_follow_rule_references() {
        let doc = digits_rule(TokenSpec::repeat(TokenSpec::reference("D"), 1, 1));
        let compiled = doc.compile().unwrap();
        assert_eq!(compiled.graph.render(compiled.root), "1");

        let doc = digits_rule(TokenSpec::repeat(TokenSpec::reference("D"), 2, 2));
        let compiled = doc.compile().unwrap();
        assert_eq!(compiled.graph.render(compiled.root), "11");
        assert_eq!(compiled.graph.total_permutation_count(compiled.root), 4);
    }

    #[test]
    fn nested_repeats_over_references_render_every_item() {
        let doc = digits_rule(TokenSpec::repeat(
            TokenSpec::concat([
                TokenSpec::repeat(TokenSpec::reference("D"), 2, 2),
                TokenSpec::constant(";"),
            ]),
            2,
            3,
        ));
        let compiled = doc.compile().unwrap();
        assert_eq!(compiled.graph.render(compiled.root), "11;11;");
    }

    #[test]
    fn malformed_text_is_a_parse_error() {
        let err = GraphDocument::from_json("{").unwrap_err();
        assert!(matches!(err, DocumentError::Parse { format: "json", .. }));
    }

    #[test]
    fn load_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.toml");
        std::fs::write(
            &path,
            "[rules.START]\ntype = \"const\"\nvalue = \"hi\"\n",
        )
        .unwrap();
        let compiled = GraphDocument::load(&path).unwrap().compile().unwrap();
        assert_eq!(compiled.graph.render(compiled.root), "hi");

        let missing = GraphDocument::load(&dir.path().join("none.json")).unwrap_err();
        assert!(matches!(missing, DocumentError::Io { .. }));
    }
}
