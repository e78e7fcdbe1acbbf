//! # Layered Diagram Store
//!
//! The node/arc store behind a compiled multi-valued decision diagram. A
//! diagram is a layered DAG: nodes at layer `l` carry arcs labeled with the
//! values of the `l`-th dimension of the chosen order, pointing at nodes of
//! layer `l + 1`; layer `D` holds the terminals. Every arc records how many
//! input rows traversed it, every node how many rows passed through it.
//!
//! The compilers work against the mutable [`DiagramBuilder`] view;
//! [`DiagramBuilder::finalize`] drops orphaned nodes, reassigns ids in
//! layer-major order and freezes the result into the read-only [`Mdd`].

use crate::config::QueryConfig;
use crate::schema::{BinModel, Schema};
use crate::value::Value;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Index into the diagram's node table.
pub type NodeId = usize;

/// A labeled arc: target node plus the number of rows that traversed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub target: NodeId,
    pub count: u64,
}

/// One node of the layered DAG.
///
/// Edges are keyed by label in a sorted map, so each label appears at most
/// once per node and iteration order is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub layer: usize,
    pub edges: BTreeMap<Value, Edge>,
    pub reach_count: u64,
    pub terminal_count: u64,
}

impl Node {
    fn new(layer: usize) -> Self {
        Node {
            layer,
            ..Node::default()
        }
    }
}

/// Structural signature used for canonical merging: terminal tally plus the
/// sorted (label, child) list. Arc counts are excluded; they are aggregated
/// when nodes merge.
pub(crate) type Signature = (u64, Vec<(Value, NodeId)>);

pub(crate) fn signature(node: &Node) -> Signature {
    (
        node.terminal_count,
        node.edges
            .iter()
            .map(|(label, edge)| (label.clone(), edge.target))
            .collect(),
    )
}

/// Aggregate diagram statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiagramSize {
    pub nodes: usize,
    pub arcs: usize,
    /// Number of dimensions (the terminal layer index)
    pub layers: usize,
}

/// Read-only view of a node, for renderers and diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    pub id: NodeId,
    depth: usize,
    node: &'a Node,
}

/// Read-only view of one arc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeView<'a> {
    pub label: &'a Value,
    pub target: NodeId,
    pub count: u64,
}

impl<'a> NodeView<'a> {
    pub fn layer(&self) -> usize {
        self.node.layer
    }

    pub fn reach_count(&self) -> u64 {
        self.node.reach_count
    }

    pub fn terminal_count(&self) -> u64 {
        self.node.terminal_count
    }

    pub fn is_terminal(&self) -> bool {
        self.node.layer == self.depth
    }

    /// Outgoing arcs in sorted-label order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeView<'a>> + '_ {
        self.node.edges.iter().map(|(label, edge)| EdgeView {
            label,
            target: edge.target,
            count: edge.count,
        })
    }
}

/// A compiled, read-only multi-valued decision diagram.
#[derive(Debug)]
pub struct Mdd {
    pub(crate) order: Vec<String>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    pub(crate) depth: usize,
    pub(crate) reduced: bool,
    pub(crate) schema: Schema,
    pub(crate) bin_models: HashMap<String, BinModel>,
    pub(crate) alpha: f64,
    pub(crate) query_config: QueryConfig,
}

impl Mdd {
    /// The chosen dimension order, root to terminal.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Terminal layer index (= number of dimensions).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Laplace smoothing parameter used by `complete`.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Whether the canonical-reduction invariant holds by construction.
    pub fn is_reduced(&self) -> bool {
        self.reduced
    }

    /// Fitted bin model of a numeric dimension, if any.
    pub fn bin_model(&self, dimension: &str) -> Option<&BinModel> {
        self.bin_models.get(dimension)
    }

    pub fn size(&self) -> DiagramSize {
        DiagramSize {
            nodes: self.nodes.len(),
            arcs: self.nodes.iter().map(|n| n.edges.len()).sum(),
            layers: self.depth,
        }
    }

    /// Node counts per layer, root layer first.
    pub fn layer_widths(&self) -> Vec<usize> {
        let mut widths = vec![0usize; self.depth + 1];
        for node in &self.nodes {
            widths[node.layer] += 1;
        }
        widths
    }

    pub fn node(&self, id: NodeId) -> Option<NodeView<'_>> {
        self.nodes.get(id).map(|node| NodeView {
            id,
            depth: self.depth,
            node,
        })
    }

    /// All nodes in layer-major id order. Stable across reads.
    pub fn iter_nodes(&self) -> impl Iterator<Item = NodeView<'_>> {
        self.nodes.iter().enumerate().map(|(id, node)| NodeView {
            id,
            depth: self.depth,
            node,
        })
    }

    /// Nodes of one layer, in id order.
    pub fn layer_nodes(&self, layer: usize) -> impl Iterator<Item = NodeView<'_>> {
        self.iter_nodes().filter(move |v| v.layer() == layer)
    }

    /// Arc lookup by (node, label).
    pub fn edge(&self, id: NodeId, label: &Value) -> Option<(NodeId, u64)> {
        self.nodes
            .get(id)?
            .edges
            .get(label)
            .map(|e| (e.target, e.count))
    }

    pub(crate) fn node_ref(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Check the structural invariants; returns human-readable violations.
    ///
    /// Checks layering, count conservation, root/terminal totals, and (for
    /// reduced diagrams) signature canonicity. An empty diagram (zero rows)
    /// is a bare root and passes trivially.
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let total_rows = self.nodes[self.root].reach_count;

        for (id, node) in self.nodes.iter().enumerate() {
            for (label, edge) in &node.edges {
                match self.nodes.get(edge.target) {
                    Some(child) if child.layer == node.layer + 1 => {}
                    Some(child) => violations.push(format!(
                        "arc {id} --{label}--> {} jumps from layer {} to {}",
                        edge.target, node.layer, child.layer
                    )),
                    None => violations.push(format!(
                        "arc {id} --{label}--> {} targets a missing node",
                        edge.target
                    )),
                }
            }
            if node.layer < self.depth {
                let out: u64 = node.edges.values().map(|e| e.count).sum();
                if out != node.reach_count {
                    violations.push(format!(
                        "node {id}: outgoing count {out} != reach {}",
                        node.reach_count
                    ));
                }
                if node.terminal_count != 0 {
                    violations.push(format!("non-terminal node {id} has a terminal count"));
                }
                if node.edges.is_empty() && total_rows > 0 {
                    violations.push(format!("non-terminal node {id} has no arcs"));
                }
            } else {
                if node.reach_count != node.terminal_count {
                    violations.push(format!(
                        "terminal {id}: reach {} != terminal count {}",
                        node.reach_count, node.terminal_count
                    ));
                }
                if !node.edges.is_empty() {
                    violations.push(format!("terminal {id} has outgoing arcs"));
                }
            }
        }

        let terminal_total: u64 = self
            .nodes
            .iter()
            .filter(|n| n.layer == self.depth)
            .map(|n| n.terminal_count)
            .sum();
        if terminal_total != total_rows {
            violations.push(format!(
                "terminal total {terminal_total} != root reach {total_rows}"
            ));
        }

        if self.reduced {
            for layer in 1..=self.depth {
                let mut seen: HashSet<Signature> = HashSet::new();
                for node in self.nodes.iter().filter(|n| n.layer == layer) {
                    if !seen.insert(signature(node)) {
                        violations.push(format!("duplicate signature at layer {layer}"));
                    }
                }
            }
        }

        violations
    }
}

/// Mutable diagram under construction; used by the compilers.
#[derive(Debug)]
pub(crate) struct DiagramBuilder {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    pub(crate) depth: usize,
}

impl DiagramBuilder {
    /// Fresh builder holding only the root at layer 0.
    pub(crate) fn new(depth: usize) -> Self {
        DiagramBuilder {
            nodes: vec![Node::new(0)],
            root: 0,
            depth,
        }
    }

    /// Allocate a fresh node at `layer`.
    pub(crate) fn alloc(&mut self, layer: usize) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(layer));
        id
    }

    /// Nodes and arcs reachable from the root (merging leaves orphans
    /// behind until finalization).
    pub(crate) fn live_size(&self) -> (usize, usize) {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![self.root];
        seen[self.root] = true;
        let (mut nodes, mut arcs) = (0usize, 0usize);
        while let Some(id) = stack.pop() {
            nodes += 1;
            arcs += self.nodes[id].edges.len();
            for edge in self.nodes[id].edges.values() {
                if !seen[edge.target] {
                    seen[edge.target] = true;
                    stack.push(edge.target);
                }
            }
        }
        (nodes, arcs)
    }

    /// Freeze into a read-only diagram: drop orphans and reassign ids in
    /// layer-major order so iteration is stable.
    pub(crate) fn finalize(
        self,
        order: Vec<String>,
        schema: Schema,
        bin_models: HashMap<String, BinModel>,
        alpha: f64,
        reduced: bool,
        query_config: QueryConfig,
    ) -> Mdd {
        let mut reachable = vec![false; self.nodes.len()];
        let mut stack = vec![self.root];
        reachable[self.root] = true;
        while let Some(id) = stack.pop() {
            for edge in self.nodes[id].edges.values() {
                if !reachable[edge.target] {
                    reachable[edge.target] = true;
                    stack.push(edge.target);
                }
            }
        }

        let mut live: Vec<NodeId> = (0..self.nodes.len()).filter(|&id| reachable[id]).collect();
        live.sort_by_key(|&id| (self.nodes[id].layer, id));

        let mut remap: HashMap<NodeId, NodeId> = HashMap::with_capacity(live.len());
        for (new_id, &old_id) in live.iter().enumerate() {
            remap.insert(old_id, new_id);
        }

        let mut nodes = Vec::with_capacity(live.len());
        for &old_id in &live {
            let old = &self.nodes[old_id];
            let edges = old
                .edges
                .iter()
                .map(|(label, edge)| {
                    (
                        label.clone(),
                        Edge {
                            target: remap[&edge.target],
                            count: edge.count,
                        },
                    )
                })
                .collect();
            nodes.push(Node {
                layer: old.layer,
                edges,
                reach_count: old.reach_count,
                terminal_count: old.terminal_count,
            });
        }

        Mdd {
            order,
            nodes,
            root: remap[&self.root],
            depth: self.depth,
            reduced,
            schema,
            bin_models,
            alpha,
            query_config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Dimension, Schema};

    fn tiny_schema() -> Schema {
        Schema::new(vec![Dimension::categorical("a"), Dimension::categorical("b")])
            .expect("schema")
    }

    fn finalize(builder: DiagramBuilder) -> Mdd {
        builder.finalize(
            vec!["a".to_string(), "b".to_string()],
            tiny_schema(),
            HashMap::new(),
            0.1,
            false,
            QueryConfig::default(),
        )
    }

    /// Two rows sharing a prefix: (a=x, b=1), (a=x, b=2).
    fn hand_built() -> DiagramBuilder {
        let mut b = DiagramBuilder::new(2);
        let mid = b.alloc(1);
        let term = b.alloc(2);
        b.nodes[b.root].reach_count = 2;
        b.nodes[b.root].edges.insert(
            Value::from("x"),
            Edge {
                target: mid,
                count: 2,
            },
        );
        b.nodes[mid].reach_count = 2;
        b.nodes[mid].edges.insert(
            Value::from(1),
            Edge {
                target: term,
                count: 1,
            },
        );
        b.nodes[mid].edges.insert(
            Value::from(2),
            Edge {
                target: term,
                count: 1,
            },
        );
        b.nodes[term].reach_count = 2;
        b.nodes[term].terminal_count = 2;
        b
    }

    #[test]
    fn test_finalize_assigns_layer_major_ids() {
        let mdd = finalize(hand_built());
        assert_eq!(mdd.root(), 0);
        let layers: Vec<usize> = mdd.iter_nodes().map(|v| v.layer()).collect();
        assert_eq!(layers, vec![0, 1, 2]);
        assert_eq!(mdd.size(), DiagramSize { nodes: 3, arcs: 3, layers: 2 });
    }

    #[test]
    fn test_finalize_drops_orphans() {
        let mut b = hand_built();
        b.alloc(1); // never linked
        let mdd = finalize(b);
        assert_eq!(mdd.size().nodes, 3);
    }

    #[test]
    fn test_live_size_ignores_orphans() {
        let mut b = hand_built();
        b.alloc(2);
        assert_eq!(b.live_size(), (3, 3));
    }

    #[test]
    fn test_validate_clean_diagram() {
        let mdd = finalize(hand_built());
        assert!(mdd.validate().is_empty());
    }

    #[test]
    fn test_validate_flags_broken_conservation() {
        let mut b = hand_built();
        b.nodes[b.root].reach_count = 5;
        let mdd = finalize(b);
        assert!(!mdd.validate().is_empty());
    }

    #[test]
    fn test_edge_lookup() {
        let mdd = finalize(hand_built());
        let (mid, count) = mdd.edge(mdd.root(), &Value::from("x")).expect("arc");
        assert_eq!(count, 2);
        assert_eq!(mdd.edge(mid, &Value::from(3)), None);
        assert!(mdd.edge(mid, &Value::from(1)).is_some());
    }

    #[test]
    fn test_node_views() {
        let mdd = finalize(hand_built());
        let root = mdd.node(mdd.root()).expect("root");
        assert!(!root.is_terminal());
        assert_eq!(root.reach_count(), 2);
        let labels: Vec<String> = mdd
            .layer_nodes(1)
            .flat_map(|v| v.edges().map(|e| e.label.to_string()).collect::<Vec<_>>())
            .collect();
        assert_eq!(labels, vec!["1", "2"]);
        assert_eq!(mdd.layer_widths(), vec![1, 1, 1]);
    }
}
