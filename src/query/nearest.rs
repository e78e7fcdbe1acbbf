//! Distance-ranked nearest paths via A* over the layered DAG.

use super::{PathResult, QueryError};
use crate::diagram::{Mdd, NodeId};
use crate::value::{Pattern, Value};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;

/// Per-dimension distance functions `(wanted, have) -> non-negative real`.
///
/// Pattern dimensions with a distance function are soft targets: every arc
/// is considered at its distance. Pattern dimensions *without* one are hard
/// equality constraints. Wildcard dimensions contribute zero.
#[derive(Default)]
pub struct DistanceSet {
    functions: HashMap<String, Box<dyn Fn(&Value, &Value) -> f64>>,
}

impl DistanceSet {
    pub fn new() -> Self {
        DistanceSet::default()
    }

    /// Attach a distance function for one dimension.
    pub fn with(
        mut self,
        dimension: impl Into<String>,
        function: impl Fn(&Value, &Value) -> f64 + 'static,
    ) -> Self {
        self.functions.insert(dimension.into(), Box::new(function));
        self
    }

    fn get(&self, dimension: &str) -> Option<&(dyn Fn(&Value, &Value) -> f64)> {
        self.functions.get(dimension).map(|f| &**f)
    }
}

impl fmt::Debug for DistanceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dims: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        dims.sort_unstable();
        f.debug_struct("DistanceSet").field("dimensions", &dims).finish()
    }
}

/// Heuristic policy for the A* search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NearestHeuristic {
    /// h = 0; always admissible
    #[default]
    Zero,
    /// Sum of each remaining layer's cheapest arc distance; admissible for
    /// non-negative, per-dimension-independent distances
    LayerMinimum,
}

struct Frontier {
    estimate: f64,
    seq: u64,
    cost: f64,
    node: NodeId,
    labels: Vec<Value>,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    // Reversed: BinaryHeap is a max-heap, and we want the smallest
    // estimate first, FIFO on ties for a stable tie-break.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .estimate
            .total_cmp(&self.estimate)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl Mdd {
    /// k paths minimizing total per-dimension distance to `pattern`, with
    /// the zero heuristic.
    pub fn nearest(
        &self,
        pattern: &Pattern,
        distances: &DistanceSet,
        k: usize,
    ) -> Result<Vec<PathResult>, QueryError> {
        self.nearest_with(pattern, distances, k, NearestHeuristic::Zero)
    }

    /// k paths minimizing total per-dimension distance to `pattern`.
    ///
    /// A* over the layered DAG; terminal pops emit solutions in
    /// non-decreasing distance. Scores are negated distances so that
    /// higher is better, matching `complete`; the raw sum is under
    /// `details.distance`. Empty when no terminal is reachable under the
    /// pattern's hard constraints.
    pub fn nearest_with(
        &self,
        pattern: &Pattern,
        distances: &DistanceSet,
        k: usize,
        heuristic: NearestHeuristic,
    ) -> Result<Vec<PathResult>, QueryError> {
        let targets = self.bound_targets(pattern)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let arc_cost = |layer: usize, label: &Value| -> Option<f64> {
            match &targets[layer] {
                None => {
                    if label.is_missing() {
                        None // wildcards do not match missing
                    } else {
                        Some(0.0)
                    }
                }
                Some(want) => match distances.get(&self.order[layer]) {
                    Some(function) => Some(function(want, label)),
                    None => (label == want).then_some(0.0),
                },
            }
        };

        let remaining = self.remaining_bound(heuristic, &arc_cost);

        let mut heap: BinaryHeap<Frontier> = BinaryHeap::new();
        let mut seq = 0u64;
        heap.push(Frontier {
            estimate: remaining[0],
            seq,
            cost: 0.0,
            node: self.root,
            labels: Vec::new(),
        });

        let mut out = Vec::with_capacity(k);
        while let Some(entry) = heap.pop() {
            let node = self.node_ref(entry.node);
            if node.layer == self.depth {
                let mut details = HashMap::new();
                details.insert("distance".to_string(), entry.cost);
                out.push(PathResult {
                    path: self
                        .order
                        .iter()
                        .cloned()
                        .zip(entry.labels.into_iter())
                        .collect(),
                    score: -entry.cost,
                    details,
                });
                if out.len() == k {
                    break;
                }
                continue;
            }
            for (label, edge) in &node.edges {
                let Some(step) = arc_cost(node.layer, label) else {
                    continue;
                };
                let cost = entry.cost + step;
                seq += 1;
                let mut labels = entry.labels.clone();
                labels.push(label.clone());
                heap.push(Frontier {
                    estimate: cost + remaining[node.layer + 1],
                    seq,
                    cost,
                    node: edge.target,
                    labels,
                });
            }
        }
        Ok(out)
    }

    /// Per-layer admissible lower bound on the remaining distance.
    fn remaining_bound(
        &self,
        heuristic: NearestHeuristic,
        arc_cost: &dyn Fn(usize, &Value) -> Option<f64>,
    ) -> Vec<f64> {
        let mut bound = vec![0.0; self.depth + 1];
        if heuristic == NearestHeuristic::Zero {
            return bound;
        }
        let mut layer_min = vec![f64::INFINITY; self.depth];
        for node in &self.nodes {
            if node.layer == self.depth {
                continue;
            }
            for label in node.edges.keys() {
                if let Some(cost) = arc_cost(node.layer, label) {
                    if cost < layer_min[node.layer] {
                        layer_min[node.layer] = cost;
                    }
                }
            }
        }
        for layer in (0..self.depth).rev() {
            let step = if layer_min[layer].is_finite() {
                layer_min[layer]
            } else {
                0.0
            };
            bound[layer] = bound[layer + 1] + step;
        }
        bound
    }
}
