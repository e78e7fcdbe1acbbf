//! # TableDD
//!
//! Multi-valued decision diagrams over tabular data. A table of rows over a
//! fixed set of dimensions is compiled into a reduced, layered, labeled DAG
//! whose root-to-terminal paths are exactly the input rows (modulo numeric
//! binning), and which answers existence, counting, enumeration,
//! probability-ranked completion and distance-ranked nearest queries.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! Rows (dimension -> value maps)
//!     |
//! [Ordering Engine]       -> dimension permutation (fixed / heuristic / search)
//!     |
//! [Binning]               -> numeric values replaced by interval labels
//!     |
//! [Compiler]              -> trie + bottom-up reduction, or incremental slice
//!     |
//! Reduced MDD
//!     |
//! [Query Engine]          -> exists, count, matches, complete, nearest
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use std::collections::HashMap;
//! use tabledd::{MddBuilder, Pattern, Schema, Dimension, Value};
//!
//! let schema = Schema::new(vec![
//!     Dimension::categorical("region"),
//!     Dimension::ordinal("priority"),
//! ])?;
//!
//! let rows: Vec<HashMap<String, Value>> = vec![
//!     HashMap::from([
//!         ("region".to_string(), Value::from("EU")),
//!         ("priority".to_string(), Value::from(1)),
//!     ]),
//!     HashMap::from([
//!         ("region".to_string(), Value::from("EU")),
//!         ("priority".to_string(), Value::from(2)),
//!     ]),
//!     HashMap::from([
//!         ("region".to_string(), Value::from("US")),
//!         ("priority".to_string(), Value::from(1)),
//!     ]),
//! ];
//!
//! let mut builder = MddBuilder::new(schema);
//! let mdd = builder.fit(rows)?;
//!
//! assert_eq!(mdd.count(&Pattern::new())?, 3);
//! assert_eq!(mdd.count(&Pattern::new().with("region", "EU"))?, 2);
//! assert!(mdd.exists(&Pattern::new().with("region", "EU").with("priority", 1))?);
//! # Ok::<(), tabledd::MddError>(())
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `value` | Dynamic values, rows, patterns |
//! | `schema` | Dimension metadata, numeric binning |
//! | `diagram` | Layered node/arc store, invariants |
//! | `ordering` | Dimension permutation selection |
//! | `compile` | Trie + reducer, incremental slice compiler |
//! | `query` | exists / count / matches / complete / nearest |
//! | `builder` | Fit facade wiring the pipeline together |
//! | `config` | Layered configuration (TOML + env) |
//!
//! The core is single-threaded with respect to one diagram: construction
//! and queries assume exclusive access and return synchronously. Internal
//! parallelism (signature hashing during reduction) never leaks into the
//! observable contract.

pub mod builder;
pub mod compile;
pub mod config;
pub mod diagram;
mod error;
pub mod ordering;
pub mod query;
pub mod schema;
pub mod value;

// Re-export the public surface at the crate root
pub use builder::MddBuilder;
pub use compile::CompileError;
pub use config::{
    BuildConfig, CompileMethod, OrderingConfig, OrderingMode, OrderingObjective, QueryConfig,
};
pub use diagram::{DiagramSize, EdgeView, Mdd, NodeId, NodeView};
pub use error::{MddError, MddResult};
pub use ordering::{OrderingError, OrderingOutcome};
pub use query::{DistanceSet, NearestHeuristic, PathResult, QueryError};
pub use schema::{
    BinConfig, BinModel, BinStrategy, Dimension, DimensionType, Schema, SchemaError,
    DEFAULT_MISSING_TOKEN,
};
pub use value::{Pattern, Row, Value};
