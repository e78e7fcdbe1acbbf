//! Probability-ranked completion via beam search.

use super::{PathResult, QueryError};
use crate::diagram::{Mdd, NodeId};
use crate::value::{Pattern, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

struct Candidate {
    node: NodeId,
    logprob: f64,
    labels: Vec<Value>,
}

impl Mdd {
    /// Top-k completions of a partial pattern, ranked by conditional
    /// probability, using the configured default beam width.
    pub fn complete(&self, pattern: &Pattern, k: usize) -> Result<Vec<PathResult>, QueryError> {
        self.complete_with(pattern, k, self.query_config.beam)
    }

    /// Top-k completions with an explicit beam width.
    ///
    /// Beam search over the layered DAG. At a layer the pattern fixes,
    /// only the matching arc is followed and the score is untouched; free
    /// layers expand every arc and accumulate the log of the
    /// Laplace-smoothed conditional
    /// `(edge_count + alpha) / (reach + alpha * branching)`.
    /// Ties break by descending reach, then lexicographic labels. Returns
    /// an empty list when no path is consistent with the pattern.
    pub fn complete_with(
        &self,
        pattern: &Pattern,
        k: usize,
        beam: usize,
    ) -> Result<Vec<PathResult>, QueryError> {
        let targets = self.bound_targets(pattern)?;
        if k == 0 || beam == 0 {
            return Ok(Vec::new());
        }

        let mut frontier = vec![Candidate {
            node: self.root,
            logprob: 0.0,
            labels: Vec::new(),
        }];

        for layer in 0..self.depth {
            let mut next = Vec::new();
            for candidate in &frontier {
                let node = self.node_ref(candidate.node);
                let branching = node.edges.len() as f64;
                let fixed = targets[layer].as_ref();
                for (label, edge) in &node.edges {
                    match fixed {
                        Some(want) if want != label => continue,
                        Some(_) => next.push(Candidate {
                            node: edge.target,
                            logprob: candidate.logprob,
                            labels: extended(&candidate.labels, label),
                        }),
                        None => {
                            if label.is_missing() {
                                continue; // wildcards do not match missing
                            }
                            let p = (edge.count as f64 + self.alpha)
                                / (node.reach_count as f64 + self.alpha * branching);
                            next.push(Candidate {
                                node: edge.target,
                                logprob: candidate.logprob + p.ln(),
                                labels: extended(&candidate.labels, label),
                            });
                        }
                    }
                }
            }
            next.sort_by(|a, b| self.rank(a, b));
            next.truncate(beam);
            frontier = next;
            if frontier.is_empty() {
                break;
            }
        }

        Ok(frontier
            .into_iter()
            .take(k)
            .map(|candidate| {
                let mut details = HashMap::new();
                details.insert("logprob".to_string(), candidate.logprob);
                PathResult {
                    path: self
                        .order
                        .iter()
                        .cloned()
                        .zip(candidate.labels.into_iter())
                        .collect(),
                    score: candidate.logprob,
                    details,
                }
            })
            .collect())
    }

    fn rank(&self, a: &Candidate, b: &Candidate) -> Ordering {
        b.logprob
            .total_cmp(&a.logprob)
            .then_with(|| {
                self.node_ref(b.node)
                    .reach_count
                    .cmp(&self.node_ref(a.node).reach_count)
            })
            .then_with(|| a.labels.cmp(&b.labels))
    }
}

fn extended(labels: &[Value], label: &Value) -> Vec<Value> {
    let mut out = Vec::with_capacity(labels.len() + 1);
    out.extend_from_slice(labels);
    out.push(label.clone());
    out
}
