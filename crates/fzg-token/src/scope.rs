// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pre-render pass: sequence counters, variable scopes and pointer
//! materialization.

use std::collections::BTreeMap;

use tracing::debug;

use crate::graph::Graph;
use crate::node::{NodeId, NodeKind};

impl Graph {
    /// Rewind every sequence counter to its start value.
    pub fn reset_sequences(&mut self) {
        for seq in &mut self.sequences {
            seq.reset();
        }
    }

    /// Bring derived state in line with the current choices before
    /// rendering.
    ///
    /// Walks the active tree from `root` in pre-order: sequence slots draw
    /// fresh values, variables bind their rendered text in the enclosing
    /// concatenation's scope, references pick up the nearest binding, and
    /// pointers receive their private instance. Pointers whose target is
    /// already being walked are left alone so cyclic graphs terminate.
    pub fn prepare(&mut self, root: NodeId) {
        self.reset_sequences();
        let mut scopes = vec![BTreeMap::new()];
        let mut path = Vec::new();
        self.prepare_node(root, &mut scopes, &mut path);
    }

    fn prepare_node(
        &mut self,
        id: NodeId,
        scopes: &mut Vec<BTreeMap<String, String>>,
        path: &mut Vec<NodeId>,
    ) {
        path.push(id);
        match self.kind(id).clone() {
            NodeKind::Const(_) | NodeKind::Range(_) => {}
            NodeKind::Concat(children) => {
                scopes.push(BTreeMap::new());
                for c in children {
                    self.prepare_node(c, scopes, path);
                }
                scopes.pop();
            }
            NodeKind::Pointer(p) => {
                let recursive = p.instance.is_none() && p.target.is_some_and(|t| path.contains(&t));
                if !recursive {
                    if let Some(instance) = self.materialize(id) {
                        path.extend(p.target);
                        self.prepare_node(instance, scopes, path);
                        if p.target.is_some() {
                            path.pop();
                        }
                    }
                }
            }
            NodeKind::SequenceNext(slot) => {
                let state = &mut self.sequences[slot.sequence.0 as usize];
                let value = state.next;
                // Pins at the integer bound instead of wrapping.
                state.next = state.next.saturating_add(state.step);
                state.issued.push(value);
                self.set_slot(id, Some(value));
            }
            NodeKind::SequenceExisting(slot) => {
                let value = self.sequences[slot.sequence.0 as usize].issued.last().copied();
                self.set_slot(id, value);
            }
            NodeKind::Variable(v) => {
                self.prepare_node(v.child, scopes, path);
                let text = self.render(v.child);
                if let Some(frame) = scopes.last_mut() {
                    frame.insert(v.name, text);
                }
            }
            NodeKind::VariableRef(v) => {
                let resolved = scopes.iter().rev().find_map(|frame| frame.get(&v.name).cloned());
                if resolved.is_none() {
                    debug!(target: "fzg.scope", name = %v.name, node = %id, "unresolved variable reference");
                }
                if let NodeKind::VariableRef(r) = self.kind_mut(id) {
                    r.resolved = resolved;
                }
            }
            NodeKind::One(_) | NodeKind::Optional(_) | NodeKind::Repeat(_) => {
                for c in self.active_children(id) {
                    self.prepare_node(c, scopes, path);
                }
            }
        }
        path.pop();
    }

    fn set_slot(&mut self, id: NodeId, value: Option<i64>) {
        if let NodeKind::SequenceNext(s) | NodeKind::SequenceExisting(s) = self.kind_mut(id) {
            s.value = value;
        }
    }
}
