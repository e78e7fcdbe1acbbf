//! # Schema Module
//!
//! Dimension metadata for the diagram compiler: each dimension declares a
//! name, a type, an optional ordinal rank map, an optional numeric bin
//! config, and a missing token. The schema fixes the dimension *set*; the
//! compilation *order* is chosen by the ordering engine and recorded on the
//! compiled diagram.
//!
//! ## Example
//!
//! ```rust
//! use tabledd::schema::{BinConfig, Dimension, Schema};
//!
//! let schema = Schema::new(vec![
//!     Dimension::categorical("region"),
//!     Dimension::ordinal("priority").with_rank(vec![("low".into(), 0), ("high".into(), 1)]),
//!     Dimension::numeric("qty").with_bins(BinConfig::quantile(4)),
//! ]).unwrap();
//!
//! assert_eq!(schema.len(), 3);
//! ```

pub mod binning;

pub use binning::BinModel;

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Default missing token recognized in raw string columns.
pub const DEFAULT_MISSING_TOKEN: &str = "__MISSING__";

/// Schema-level errors: unknown dimensions, type mismatches, bad bin
/// configs.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Dimension not declared by the schema
    #[error("dimension '{0}' is not part of the schema")]
    UnknownDimension(String),

    /// Two dimensions with the same name
    #[error("duplicate dimension '{0}' in schema")]
    DuplicateDimension(String),

    /// A schema must declare at least one dimension
    #[error("schema declares no dimensions")]
    EmptySchema,

    /// Non-numeric value routed into a numeric column
    #[error("dimension '{dimension}': expected a numeric value, got '{value}'")]
    NotNumeric { dimension: String, value: String },

    /// Invalid bin configuration (k < 1, bad cut points, ...)
    #[error("dimension '{dimension}': invalid bin config: {reason}")]
    InvalidBinConfig { dimension: String, reason: String },
}

/// Declared type of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionType {
    /// Unordered labels
    Categorical,
    /// Labels with a caller-declared rank
    Ordinal,
    /// Continuous values, quantized to interval labels before compilation
    Numeric,
    /// Anything goes; values are used as labels verbatim
    Mixed,
}

impl fmt::Display for DimensionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionType::Categorical => write!(f, "categorical"),
            DimensionType::Ordinal => write!(f, "ordinal"),
            DimensionType::Numeric => write!(f, "numeric"),
            DimensionType::Mixed => write!(f, "mixed"),
        }
    }
}

/// Quantization strategy for numeric dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinStrategy {
    /// Empirical quantiles of the non-missing training values
    Quantile,
    /// Equal-width intervals over the observed [min, max]
    FixedWidth,
}

/// Bin configuration for one numeric dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinConfig {
    pub strategy: BinStrategy,
    /// Requested bin count; heavy ties may collapse it
    pub bins: usize,
    /// Explicit bin edges; when set, fitting is data-independent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cut_points: Option<Vec<f64>>,
}

impl BinConfig {
    pub fn quantile(bins: usize) -> Self {
        BinConfig {
            strategy: BinStrategy::Quantile,
            bins,
            cut_points: None,
        }
    }

    pub fn fixed_width(bins: usize) -> Self {
        BinConfig {
            strategy: BinStrategy::FixedWidth,
            bins,
            cut_points: None,
        }
    }

    /// Use `edges` verbatim as the sorted bin edge list.
    pub fn explicit(edges: Vec<f64>) -> Self {
        BinConfig {
            strategy: BinStrategy::FixedWidth,
            bins: edges.len().saturating_sub(1),
            cut_points: Some(edges),
        }
    }
}

impl Default for BinConfig {
    fn default() -> Self {
        BinConfig::quantile(4)
    }
}

/// One named column of the input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    name: String,
    dtype: DimensionType,
    /// Ordinal rank pairs (value, rank); small by assumption
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rank: Option<Vec<(Value, i64)>>,
    /// Per-dimension bin config overriding the build default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bins: Option<BinConfig>,
    missing_token: String,
}

impl Dimension {
    fn new(name: impl Into<String>, dtype: DimensionType) -> Self {
        Dimension {
            name: name.into(),
            dtype,
            rank: None,
            bins: None,
            missing_token: DEFAULT_MISSING_TOKEN.to_string(),
        }
    }

    pub fn categorical(name: impl Into<String>) -> Self {
        Dimension::new(name, DimensionType::Categorical)
    }

    pub fn ordinal(name: impl Into<String>) -> Self {
        Dimension::new(name, DimensionType::Ordinal)
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Dimension::new(name, DimensionType::Numeric)
    }

    pub fn mixed(name: impl Into<String>) -> Self {
        Dimension::new(name, DimensionType::Mixed)
    }

    /// Attach an ordinal rank map.
    pub fn with_rank(mut self, rank: Vec<(Value, i64)>) -> Self {
        self.rank = Some(rank);
        self
    }

    /// Attach a bin config (numeric dimensions only; ignored otherwise).
    pub fn with_bins(mut self, bins: BinConfig) -> Self {
        self.bins = Some(bins);
        self
    }

    /// Override the missing token recognized in raw values.
    pub fn with_missing_token(mut self, token: impl Into<String>) -> Self {
        self.missing_token = token.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension_type(&self) -> DimensionType {
        self.dtype
    }

    pub fn is_numeric(&self) -> bool {
        self.dtype == DimensionType::Numeric
    }

    pub fn bin_config(&self) -> Option<&BinConfig> {
        self.bins.as_ref()
    }

    pub fn missing_token(&self) -> &str {
        &self.missing_token
    }

    /// Rank of a value under the ordinal rank map, if declared.
    pub fn rank_of(&self, value: &Value) -> Option<i64> {
        self.rank
            .as_ref()?
            .iter()
            .find(|(v, _)| v == value)
            .map(|(_, r)| *r)
    }

    /// Map a raw cell into its canonical form: absent values, explicit
    /// [`Value::Missing`], and strings equal to the missing token all read
    /// as missing; everything else passes through.
    pub fn normalize(&self, value: Option<&Value>) -> Value {
        match value {
            None | Some(Value::Missing) => Value::Missing,
            Some(Value::String(s)) if s == &self.missing_token => Value::Missing,
            Some(v) => v.clone(),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.dtype)
    }
}

/// Ordered set of dimensions declared by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    dimensions: Vec<Dimension>,
}

impl Schema {
    /// Build a schema, rejecting empty and duplicate declarations.
    pub fn new(dimensions: Vec<Dimension>) -> Result<Self, SchemaError> {
        if dimensions.is_empty() {
            return Err(SchemaError::EmptySchema);
        }
        for (i, dim) in dimensions.iter().enumerate() {
            if dimensions[..i].iter().any(|d| d.name == dim.name) {
                return Err(SchemaError::DuplicateDimension(dim.name.clone()));
            }
        }
        Ok(Schema { dimensions })
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.dimensions.iter().map(|d| d.name.clone()).collect()
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dimension> {
        self.dimensions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_rejects_duplicates() {
        let err = Schema::new(vec![
            Dimension::categorical("a"),
            Dimension::numeric("a"),
        ])
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateDimension(name) if name == "a"));
    }

    #[test]
    fn test_schema_rejects_empty() {
        assert!(matches!(Schema::new(vec![]), Err(SchemaError::EmptySchema)));
    }

    #[test]
    fn test_dimension_builders() {
        let dim = Dimension::numeric("qty")
            .with_bins(BinConfig::fixed_width(3))
            .with_missing_token("n/a");
        assert!(dim.is_numeric());
        assert_eq!(dim.bin_config().map(|b| b.bins), Some(3));
        assert_eq!(dim.missing_token(), "n/a");
    }

    #[test]
    fn test_normalize_missing_forms() {
        let dim = Dimension::categorical("region").with_missing_token("n/a");
        assert!(dim.normalize(None).is_missing());
        assert!(dim.normalize(Some(&Value::Missing)).is_missing());
        assert!(dim.normalize(Some(&Value::from("n/a"))).is_missing());
        assert_eq!(dim.normalize(Some(&Value::from("EU"))), Value::from("EU"));
    }

    #[test]
    fn test_rank_lookup() {
        let dim = Dimension::ordinal("priority")
            .with_rank(vec![(Value::from("low"), 0), (Value::from("high"), 1)]);
        assert_eq!(dim.rank_of(&Value::from("high")), Some(1));
        assert_eq!(dim.rank_of(&Value::from("mid")), None);
    }

    #[test]
    fn test_schema_lookup() {
        let schema = Schema::new(vec![
            Dimension::categorical("region"),
            Dimension::ordinal("priority"),
        ])
        .expect("schema");
        assert_eq!(schema.index_of("priority"), Some(1));
        assert!(schema.dimension("product").is_none());
        assert_eq!(schema.names(), vec!["region", "priority"]);
    }
}
