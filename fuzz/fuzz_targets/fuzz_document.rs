// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz the graph document compiler with arbitrary JSON and TOML text.
//!
//! Whatever compiles must render, report a loop status and unroll into a
//! pointer-free tree without panicking.
#![no_main]
use fzg_token::GraphDocument;
use fzg_unroll::{loop_exists, unroll_pointers};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    for document in [GraphDocument::from_json(text), GraphDocument::from_toml(text)] {
        let Ok(document) = document else {
            continue;
        };
        let Ok(compiled) = document.compile() else {
            continue;
        };
        let mut graph = compiled.graph;
        let root = compiled.root;

        // --- render terminates on cyclic graphs ---
        let _ = graph.render(root);
        let _ = loop_exists(&graph, root);

        // --- unrolling leaves a finite tree ---
        let root = unroll_pointers(&mut graph, root, 2);
        assert!(!loop_exists(&graph, root));
        assert!(graph.total_permutation_count(root) >= 1);
        let _ = graph.render(root);
    }
});
