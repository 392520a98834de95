// SPDX-License-Identifier: MIT OR Apache-2.0
//! Indented tree dumps for diagnostics and snapshot tests.

use std::fmt::Write as _;

use crate::graph::Graph;
use crate::node::{NodeId, NodeKind};

/// Which children a dump follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Only children that currently render. Materialized pointer instances
    /// are followed; bare targets are not.
    Active,
    /// Every owned child, active or not. Pointer targets are never followed.
    Structural,
}

impl Graph {
    /// One line per node, indented two spaces per level.
    pub fn debug_tree(&self, root: NodeId, view: View) -> String {
        let mut out = String::new();
        self.debug_node(root, view, 0, &mut out);
        out
    }

    fn debug_node(&self, id: NodeId, view: View, depth: usize, out: &mut String) {
        let _ = writeln!(out, "{:indent$}{}", "", self.describe(id), indent = depth * 2);
        let children = match (view, self.kind(id)) {
            (View::Active, NodeKind::Pointer(p)) => p.instance().into_iter().collect(),
            (View::Active, _) => self.active_children(id),
            (View::Structural, _) => self.structural_children(id),
        };
        for c in children {
            self.debug_node(c, view, depth + 1, out);
        }
    }

    /// Single-line summary of a node and its local state.
    pub fn describe(&self, id: NodeId) -> String {
        let name = self.kind(id).name();
        match self.kind(id) {
            NodeKind::Const(s) => format!("{name} {id} {s:?}"),
            NodeKind::Range(r) => format!(
                "{name} {id} {}..={} step {} = {}",
                r.from(),
                r.to(),
                r.step(),
                r.value()
            ),
            NodeKind::Concat(_) => format!("{name} {id}"),
            NodeKind::One(o) => format!(
                "{name} {id} [{}/{}]",
                o.active_index() + 1,
                o.alternatives().len()
            ),
            NodeKind::Optional(o) => {
                let state = if o.is_active() { "on" } else { "off" };
                format!("{name} {id} {state}")
            }
            NodeKind::Repeat(r) => format!(
                "{name} {id} {}..={} x{}",
                r.min(),
                r.max(),
                r.items().len()
            ),
            NodeKind::Pointer(p) => {
                let mut line = match p.target() {
                    Some(t) => format!("{name} {id} -> {t}"),
                    None => format!("{name} {id} -> none"),
                };
                if let Some(instance) = p.instance() {
                    let _ = write!(line, " as {instance}");
                }
                line
            }
            NodeKind::SequenceNext(s) | NodeKind::SequenceExisting(s) => match s.value() {
                Some(v) => format!("{name} {id} {} = {v}", s.sequence()),
                None => format!("{name} {id} {} = ?", s.sequence()),
            },
            NodeKind::Variable(v) => format!("{name} {id} {}", v.name()),
            NodeKind::VariableRef(v) => match v.resolved() {
                Some(text) => format!("{name} {id} {} = {text:?}", v.name()),
                None => format!("{name} {id} {} = ?", v.name()),
            },
        }
    }
}
