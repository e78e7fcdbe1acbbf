//! Incremental slice compiler.
//!
//! Builds the reduced diagram without materializing the trie. Rows are
//! processed sorted in the chosen order, so only the suffix of the most
//! recent row (the *active path*) is ever mutable: when the next row
//! diverges at layer `l`, every active node below `l` is final and is
//! interned through a per-layer signature index, either merging into an
//! equivalent registered node or becoming the canonical node for its
//! signature. Registered nodes are never split, which is what makes the
//! per-arc counts aggregate exactly as trie-then-reduce aggregates them.
//!
//! Peak memory is the reduced diagram plus one path of `depth` nodes.

use crate::diagram::{signature, DiagramBuilder, Edge, NodeId, Signature};
use crate::value::Value;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::mem;
use tracing::debug;

/// Compile `rows` (labels already projected into the chosen order) into a
/// reduced diagram.
pub(crate) fn compile_slice(depth: usize, rows: &[Vec<Value>]) -> DiagramBuilder {
    let mut builder = DiagramBuilder::new(depth);
    if rows.is_empty() || depth == 0 {
        for _ in rows {
            builder.nodes[builder.root].reach_count += 1;
            builder.nodes[builder.root].terminal_count += 1;
        }
        return builder;
    }

    let mut sorted: Vec<&Vec<Value>> = rows.iter().collect();
    sorted.sort();

    // signature -> canonical node id, one index per layer
    let mut register: Vec<HashMap<Signature, NodeId>> = vec![HashMap::new(); depth + 1];
    // active[l] = node at layer l on the current row's path
    let mut active: Vec<NodeId> = vec![builder.root];
    let mut previous: Option<&[Value]> = None;

    for row in sorted {
        let keep = previous.map_or(0, |prev| common_prefix(prev, row));
        if active.len() == depth + 1 {
            intern_suffix(&mut builder, &mut register, &mut active, keep);
        }

        builder.nodes[builder.root].reach_count += 1;
        for (layer, label) in row.iter().enumerate() {
            if layer < keep {
                // Shared prefix: the arc exists on the active path.
                if let Some(edge) = builder.nodes[active[layer]].edges.get_mut(label) {
                    edge.count += 1;
                }
                builder.nodes[active[layer + 1]].reach_count += 1;
            } else {
                let child = builder.alloc(layer + 1);
                builder.nodes[child].reach_count = 1;
                builder.nodes[active[layer]]
                    .edges
                    .insert(label.clone(), Edge { target: child, count: 1 });
                active.push(child);
            }
        }
        builder.nodes[active[depth]].terminal_count += 1;
        previous = Some(row.as_slice());
    }

    if active.len() == depth + 1 {
        intern_suffix(&mut builder, &mut register, &mut active, 0);
    }
    debug!(
        nodes = builder.live_size().0,
        rows = rows.len(),
        "slice build complete"
    );
    builder
}

fn common_prefix(a: &[Value], b: &[Value]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// Canonicalize the active path below layer `keep`, terminal end first.
///
/// Children are interned before their parent, so every signature is
/// computed over canonical child ids. A node matching a registered
/// signature is absorbed into the register entry and its single in-arc is
/// retargeted; otherwise it becomes the register entry itself.
fn intern_suffix(
    builder: &mut DiagramBuilder,
    register: &mut [HashMap<Signature, NodeId>],
    active: &mut Vec<NodeId>,
    keep: usize,
) {
    for layer in ((keep + 1)..=builder.depth).rev() {
        let id = active[layer];
        let sig = signature(&builder.nodes[id]);
        match register[layer].entry(sig) {
            Entry::Occupied(entry) => {
                let rep = *entry.get();
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
                // The freshly built node has exactly one in-arc, from its
                // active parent.
                let parent = active[layer - 1];
                for edge in builder.nodes[parent].edges.values_mut() {
                    if edge.target == id {
                        edge.target = rep;
                        break;
                    }
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(id);
            }
        }
    }
    active.truncate(keep + 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<Value>> {
        data.iter()
            .map(|row| row.iter().map(|v| Value::from(*v)).collect())
            .collect()
    }

    #[test]
    fn test_slice_merges_shared_suffixes() {
        let input = rows(&[
            &["a0", "b0", "c0"],
            &["a0", "b0", "c1"],
            &["a1", "b0", "c0"],
            &["a1", "b0", "c1"],
        ]);
        let builder = compile_slice(3, &input);
        assert_eq!(builder.live_size(), (4, 5));
    }

    #[test]
    fn test_slice_is_insensitive_to_row_order() {
        let forward = rows(&[&["a", "x"], &["b", "x"], &["a", "y"]]);
        let mut backward = forward.clone();
        backward.reverse();
        let one = compile_slice(2, &forward);
        let two = compile_slice(2, &backward);
        assert_eq!(one.live_size(), two.live_size());
    }

    #[test]
    fn test_slice_counts_duplicates() {
        let input = rows(&[&["x", "p"], &["x", "p"], &["x", "q"]]);
        let builder = compile_slice(2, &input);
        let root = builder.root;
        assert_eq!(builder.nodes[root].reach_count, 3);
        let x = builder.nodes[root].edges[&Value::from("x")];
        assert_eq!(x.count, 3);
        let p = builder.nodes[x.target].edges[&Value::from("p")];
        assert_eq!(builder.nodes[p.target].terminal_count, 2);
    }

    #[test]
    fn test_slice_empty_input() {
        let builder = compile_slice(3, &[]);
        assert_eq!(builder.live_size(), (1, 0));
    }

    #[test]
    fn test_slice_single_row() {
        let input = rows(&[&["a", "b"]]);
        let builder = compile_slice(2, &input);
        assert_eq!(builder.live_size(), (3, 2));
        assert_eq!(builder.nodes[builder.root].reach_count, 1);
    }
}
