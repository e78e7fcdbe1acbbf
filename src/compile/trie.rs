//! Trie compiler and bottom-up canonical reducer.

use crate::diagram::{signature, DiagramBuilder, Edge, NodeId, Signature};
use crate::value::Value;
use rayon::prelude::*;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::mem;
use tracing::debug;

/// Build the prefix trie of `rows` (labels already projected into the
/// chosen order), then reduce it canonically unless `reduce` is off.
///
/// Trie build is O(rows x depth) arc operations; reduction groups each
/// layer by structural signature and rewrites incoming arcs before the
/// next layer up is processed, so merging propagates in a single sweep.
pub(crate) fn compile_trie(depth: usize, rows: &[Vec<Value>], reduce: bool) -> DiagramBuilder {
    let mut builder = DiagramBuilder::new(depth);
    for row in rows {
        insert_row(&mut builder, row);
    }
    debug!(
        nodes = builder.nodes.len(),
        rows = rows.len(),
        "trie build complete"
    );
    if reduce && depth > 0 {
        reduce_in_place(&mut builder);
    }
    builder
}

fn insert_row(builder: &mut DiagramBuilder, row: &[Value]) {
    let mut current = builder.root;
    builder.nodes[current].reach_count += 1;
    for label in row {
        let next = match builder.nodes[current].edges.get_mut(label) {
            Some(edge) => {
                edge.count += 1;
                edge.target
            }
            None => {
                let layer = builder.nodes[current].layer;
                let child = builder.alloc(layer + 1);
                builder.nodes[current]
                    .edges
                    .insert(label.clone(), Edge { target: child, count: 1 });
                child
            }
        };
        builder.nodes[next].reach_count += 1;
        current = next;
    }
    builder.nodes[current].terminal_count += 1;
}

/// Bottom-up canonical merging, terminal layer first.
///
/// At each layer, nodes are grouped by structural signature (computed after
/// arc targets have been rewritten through the merges of the layer below);
/// each group's lowest id becomes the representative and absorbs the
/// others' counts. Orphaned nodes are left behind for finalization to drop.
fn reduce_in_place(builder: &mut DiagramBuilder) {
    let mut by_layer: Vec<Vec<NodeId>> = vec![Vec::new(); builder.depth + 1];
    for (id, node) in builder.nodes.iter().enumerate() {
        by_layer[node.layer].push(id);
    }

    let mut remap: HashMap<NodeId, NodeId> = HashMap::new();
    for layer in (0..=builder.depth).rev() {
        // Retarget this layer's arcs through the merges of the layer below.
        if !remap.is_empty() {
            for &id in &by_layer[layer] {
                for edge in builder.nodes[id].edges.values_mut() {
                    if let Some(&rep) = remap.get(&edge.target) {
                        edge.target = rep;
                    }
                }
            }
        }
        if layer == 0 {
            break;
        }

        let nodes = &builder.nodes;
        let signatures: Vec<(NodeId, Signature)> = by_layer[layer]
            .par_iter()
            .map(|&id| (id, signature(&nodes[id])))
            .collect();

        let mut canonical: HashMap<Signature, NodeId> = HashMap::new();
        let mut merged = 0usize;
        remap = HashMap::new();
        for (id, sig) in signatures {
            match canonical.entry(sig) {
                Entry::Occupied(entry) => {
                    let rep = *entry.get();
                    absorb(builder, rep, id);
                    remap.insert(id, rep);
                    merged += 1;
                }
                Entry::Vacant(entry) => {
                    entry.insert(id);
                }
            }
        }
        if merged > 0 {
            debug!(layer, merged, "reduced layer");
        }
    }
}

/// Fold `id`'s counts into its representative `rep`. Their signatures are
/// identical, so every label resolves to the same target.
fn absorb(builder: &mut DiagramBuilder, rep: NodeId, id: NodeId) {
    let (reach, terminal, edges) = {
        let node = &mut builder.nodes[id];
        (
            node.reach_count,
            node.terminal_count,
            mem::take(&mut node.edges),
        )
    };
    let keeper = &mut builder.nodes[rep];
    keeper.reach_count += reach;
    keeper.terminal_count += terminal;
    for (label, edge) in edges {
        if let Some(kept) = keeper.edges.get_mut(&label) {
            kept.count += edge.count;
        }
    }
}
