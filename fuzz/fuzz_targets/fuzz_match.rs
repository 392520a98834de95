// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz the matcher: any state picked from a structured graph must match back
//! to the same text, and arbitrary text must never panic the matcher.
#![no_main]
use arbitrary::Arbitrary;
use fzg_token::{Graph, GraphDocument, NodeId, TokenSpec};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Shape {
    Const(u8),
    Range(u8, u8),
    Concat(Vec<Shape>),
    One(Vec<Shape>),
    Optional(Box<Shape>),
    Repeat(Box<Shape>, u8),
}

impl Shape {
    fn spec(&self, depth: usize) -> TokenSpec {
        if depth > 4 {
            return TokenSpec::constant("z");
        }
        match self {
            Shape::Const(b) => TokenSpec::constant(["", "a", "b", "ab"][*b as usize % 4]),
            Shape::Range(from, span) => TokenSpec::Range {
                from: i64::from(*from % 20),
                to: i64::from(*from % 20) + i64::from(*span % 12),
                step: 1,
            },
            Shape::Concat(items) => {
                TokenSpec::concat(items.iter().take(4).map(|s| s.spec(depth + 1)))
            }
            Shape::One(items) if items.is_empty() => TokenSpec::constant("o"),
            Shape::One(items) => TokenSpec::one(items.iter().take(3).map(|s| s.spec(depth + 1))),
            Shape::Optional(item) => TokenSpec::optional(item.spec(depth + 1)),
            Shape::Repeat(item, min) => {
                let min = u32::from(*min % 2);
                TokenSpec::repeat(item.spec(depth + 1), min, min + 2)
            }
        }
    }
}

#[derive(Debug, Arbitrary)]
struct Input {
    shape: Shape,
    choices: Vec<u8>,
    noise: String,
}

fn pick(graph: &mut Graph, id: NodeId, choices: &[u8], cursor: &mut usize) {
    let count = graph.permutation_count(id);
    let choice = choices.get(*cursor).copied().unwrap_or(0) as usize % count + 1;
    *cursor += 1;
    let _ = graph.set_permutation(id, choice);
    for child in graph.active_children(id) {
        pick(graph, child, choices, cursor);
    }
}

fuzz_target!(|input: Input| {
    let Ok(compiled) = GraphDocument::new(input.shape.spec(0)).compile() else {
        return;
    };
    let root = compiled.root;

    // --- rendered states match back ---
    let mut source = compiled.graph.clone();
    pick(&mut source, root, &input.choices, &mut 0);
    let text = source.render(root);
    let mut target = compiled.graph.clone();
    fzg_match::instantiate(&mut target, root, &text).expect("rendered state must match");
    assert_eq!(target.render(root), text);

    // --- arbitrary text never panics ---
    let mut target = compiled.graph;
    if fzg_match::instantiate(&mut target, root, &input.noise).is_ok() {
        assert_eq!(target.render(root), input.noise);
    }
});
