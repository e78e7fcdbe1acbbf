//! # Query Engine
//!
//! All queries take a [`Pattern`]: a partial row where absent dimensions
//! are wildcards. Wanted values of numeric dimensions are pushed through
//! the stored bin models before traversal, so callers probe with raw
//! numbers and already-binned interval labels interchangeably.
//!
//! Missing-value semantics: the missing token participates in arc matching
//! like any other label, but a *wildcard* never matches it. To reach rows
//! with a missing value in some dimension, bind that dimension to
//! [`Value::Missing`] explicitly.

mod complete;
mod nearest;

pub use nearest::{DistanceSet, NearestHeuristic};

use crate::diagram::{Mdd, NodeId};
use crate::schema::SchemaError;
use crate::value::{Pattern, Value};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Query-side failures. Queries that merely find nothing return empty
/// results, not errors.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Pattern references a dimension the diagram does not have
    #[error("dimension '{0}' is not part of the diagram")]
    UnknownDimension(String),

    /// `exists` needs a value for every dimension
    #[error("exists() requires a fully specified row; dimension '{0}' is unbound")]
    IncompleteRow(String),

    /// Bin application failures on wanted values
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// One ranked path returned by `complete` and `nearest`.
///
/// `score` is oriented so that higher is better for both: `complete`
/// returns the accumulated log-probability (also under `details.logprob`),
/// `nearest` the negated distance (raw sum under `details.distance`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathResult {
    pub path: BTreeMap<String, Value>,
    pub score: f64,
    pub details: HashMap<String, f64>,
}

impl Mdd {
    /// Resolve a pattern into per-layer targets (by the chosen order),
    /// normalizing missing forms and bin-applying numeric wanted values.
    pub(crate) fn bound_targets(
        &self,
        pattern: &Pattern,
    ) -> Result<Vec<Option<Value>>, QueryError> {
        for (dimension, _) in pattern.iter() {
            if !self.order.iter().any(|d| d == dimension) {
                return Err(QueryError::UnknownDimension(dimension.to_string()));
            }
        }
        let mut targets = Vec::with_capacity(self.depth);
        for dimension in &self.order {
            match pattern.get(dimension) {
                None => targets.push(None),
                Some(raw) => targets.push(Some(self.bind_value(dimension, raw)?)),
            }
        }
        Ok(targets)
    }

    pub(crate) fn bind_value(&self, dimension: &str, raw: &Value) -> Result<Value, QueryError> {
        let dim = self
            .schema
            .dimension(dimension)
            .ok_or_else(|| QueryError::UnknownDimension(dimension.to_string()))?;
        let normalized = dim.normalize(Some(raw));
        match self.bin_models.get(dimension) {
            Some(model) => Ok(model.apply(&normalized)?),
            None => Ok(normalized),
        }
    }

    /// Membership test for a fully specified row. O(depth) arc lookups.
    pub fn exists(&self, row: &Pattern) -> Result<bool, QueryError> {
        for (dimension, _) in row.iter() {
            if !self.order.iter().any(|d| d == dimension) {
                return Err(QueryError::UnknownDimension(dimension.to_string()));
            }
        }
        let mut current = self.root;
        for dimension in &self.order {
            let raw = row
                .get(dimension)
                .ok_or_else(|| QueryError::IncompleteRow(dimension.clone()))?;
            let want = self.bind_value(dimension, raw)?;
            match self.node_ref(current).edges.get(&want) {
                Some(edge) => current = edge.target,
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Number of input rows whose projection matches the pattern.
    ///
    /// Memoized weighted descent: a fixed layer follows the matching arc
    /// only, a wildcard layer sums over its arcs, each child's result
    /// scaled by `edge_count / reach(child)`, which collapses to the raw
    /// edge count whenever no constraint lies below.
    pub fn count(&self, pattern: &Pattern) -> Result<u64, QueryError> {
        let targets = self.bound_targets(pattern)?;
        let mut memo: HashMap<NodeId, f64> = HashMap::new();
        let total = self.count_below(self.root, &targets, &mut memo);
        Ok(total.round() as u64)
    }

    fn count_below(
        &self,
        id: NodeId,
        targets: &[Option<Value>],
        memo: &mut HashMap<NodeId, f64>,
    ) -> f64 {
        let node = self.node_ref(id);
        if node.layer == self.depth {
            return node.reach_count as f64;
        }
        if let Some(&cached) = memo.get(&id) {
            return cached;
        }
        let total = match &targets[node.layer] {
            Some(want) => match node.edges.get(want) {
                Some(edge) => {
                    let below = self.count_below(edge.target, targets, memo);
                    below * edge.count as f64 / self.node_ref(edge.target).reach_count as f64
                }
                None => 0.0,
            },
            None => {
                let mut sum = 0.0;
                for (label, edge) in &node.edges {
                    if label.is_missing() {
                        continue; // wildcards do not match missing
                    }
                    let below = self.count_below(edge.target, targets, memo);
                    sum += below * edge.count as f64
                        / self.node_ref(edge.target).reach_count as f64;
                }
                sum
            }
        };
        memo.insert(id, total);
        total
    }

    /// Enumerate matching paths, up to the configured default limit.
    pub fn matches(&self, pattern: &Pattern) -> Result<Vec<BTreeMap<String, Value>>, QueryError> {
        self.matches_with(pattern, self.query_config.limit)
    }

    /// Enumerate up to `limit` matching paths, deterministic in
    /// sorted-label DFS order.
    pub fn matches_with(
        &self,
        pattern: &Pattern,
        limit: usize,
    ) -> Result<Vec<BTreeMap<String, Value>>, QueryError> {
        let targets = self.bound_targets(pattern)?;
        let mut out = Vec::new();
        let mut path: Vec<Value> = Vec::with_capacity(self.depth);
        self.enumerate(self.root, &targets, &mut path, &mut out, limit);
        Ok(out)
    }

    fn enumerate(
        &self,
        id: NodeId,
        targets: &[Option<Value>],
        path: &mut Vec<Value>,
        out: &mut Vec<BTreeMap<String, Value>>,
        limit: usize,
    ) {
        if out.len() >= limit {
            return;
        }
        let node = self.node_ref(id);
        if node.layer == self.depth {
            out.push(
                self.order
                    .iter()
                    .cloned()
                    .zip(path.iter().cloned())
                    .collect(),
            );
            return;
        }
        match &targets[node.layer] {
            Some(want) => {
                if let Some(edge) = node.edges.get(want) {
                    path.push(want.clone());
                    self.enumerate(edge.target, targets, path, out, limit);
                    path.pop();
                }
            }
            None => {
                for (label, edge) in &node.edges {
                    if label.is_missing() {
                        continue;
                    }
                    path.push(label.clone());
                    self.enumerate(edge.target, targets, path, out, limit);
                    path.pop();
                    if out.len() >= limit {
                        break;
                    }
                }
            }
        }
    }
}
