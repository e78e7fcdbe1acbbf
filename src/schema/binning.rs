//! Numeric-to-label quantization.
//!
//! A [`BinModel`] is fit once per numeric dimension, before compilation,
//! from the training values of that column. It maps every numeric value to
//! the interval-string label of the unique bin containing it; missing
//! values map to the missing label. Re-applying a model to one of its own
//! labels returns the label unchanged, so already-binned data passes
//! through query entry points untouched.

use super::{BinConfig, BinStrategy, SchemaError};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Fitted quantization model for one numeric dimension.
///
/// `edges` is the sorted, deduplicated bin edge list (`n + 1` edges for `n`
/// bins); an empty edge list is the degenerate model of a column with no
/// non-missing training values, which maps everything to missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinModel {
    dimension: String,
    edges: Vec<f64>,
    labels: Vec<String>,
}

impl BinModel {
    /// Fit a model from the non-missing training values of a column.
    ///
    /// Quantile strategy places interior cuts at the empirical quantiles
    /// `j/k`; fixed-width slices `[min, max]` evenly. Duplicate edges from
    /// heavy ties are collapsed, so the effective bin count may be lower
    /// than requested.
    pub fn fit(dimension: &str, values: &[f64], config: &BinConfig) -> Result<Self, SchemaError> {
        if config.bins == 0 && config.cut_points.is_none() {
            return Err(SchemaError::InvalidBinConfig {
                dimension: dimension.to_string(),
                reason: "bin count must be at least 1".to_string(),
            });
        }

        if let Some(points) = &config.cut_points {
            let mut edges: Vec<f64> = points.iter().copied().filter(|x| x.is_finite()).collect();
            edges.sort_by(f64::total_cmp);
            edges.dedup();
            if edges.len() < 2 {
                return Err(SchemaError::InvalidBinConfig {
                    dimension: dimension.to_string(),
                    reason: "explicit cut points must contain at least two distinct finite edges"
                        .to_string(),
                });
            }
            return Ok(BinModel::from_edges(dimension, edges));
        }

        let mut sorted: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);
        if sorted.is_empty() {
            // Degenerate: everything maps to missing.
            return Ok(BinModel {
                dimension: dimension.to_string(),
                edges: Vec::new(),
                labels: Vec::new(),
            });
        }

        let lo = sorted[0];
        let hi = sorted[sorted.len() - 1];
        let mut edges = Vec::with_capacity(config.bins + 1);
        edges.push(lo);
        match config.strategy {
            BinStrategy::Quantile => {
                for j in 1..config.bins {
                    edges.push(quantile(&sorted, j as f64 / config.bins as f64));
                }
            }
            BinStrategy::FixedWidth => {
                for j in 1..config.bins {
                    edges.push(lo + (hi - lo) * j as f64 / config.bins as f64);
                }
            }
        }
        edges.push(hi);
        edges.dedup();
        if edges.len() < 2 {
            // All training values identical; keep a single [v,v] bin.
            edges.push(lo);
        }
        Ok(BinModel::from_edges(dimension, edges))
    }

    fn from_edges(dimension: &str, edges: Vec<f64>) -> Self {
        let bins = edges.len() - 1;
        let labels = (0..bins)
            .map(|i| {
                if i + 1 == bins {
                    format!("[{},{}]", edges[i], edges[i + 1])
                } else {
                    format!("[{},{})", edges[i], edges[i + 1])
                }
            })
            .collect();
        BinModel {
            dimension: dimension.to_string(),
            edges,
            labels,
        }
    }

    /// Map a value to its bin label.
    ///
    /// Numbers map to their interval label (values outside the training
    /// range clamp into the first or last bin); missing maps to missing;
    /// one of this model's own labels passes through unchanged. Anything
    /// else is a schema error.
    pub fn apply(&self, value: &Value) -> Result<Value, SchemaError> {
        match value {
            Value::Missing => Ok(Value::Missing),
            Value::Int64(i) => Ok(self.bin_of(*i as f64)),
            Value::Float64(x) if x.is_nan() => Ok(Value::Missing),
            Value::Float64(x) => Ok(self.bin_of(*x)),
            Value::String(s) if self.labels.iter().any(|l| l == s) => Ok(value.clone()),
            other => Err(SchemaError::NotNumeric {
                dimension: self.dimension.clone(),
                value: other.truncated(40),
            }),
        }
    }

    fn bin_of(&self, x: f64) -> Value {
        if self.labels.is_empty() {
            return Value::Missing;
        }
        let pos = self.edges.partition_point(|e| *e <= x);
        let idx = pos.saturating_sub(1).min(self.labels.len() - 1);
        Value::String(self.labels[idx].clone())
    }

    pub fn dimension(&self) -> &str {
        &self.dimension
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Interval labels in bin order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Effective bin count after tie collapsing.
    pub fn bins(&self) -> usize {
        self.labels.len()
    }

    pub fn is_degenerate(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Empirical quantile with linear interpolation over a sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}
