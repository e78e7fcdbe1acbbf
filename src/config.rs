//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - tabledd.toml (default configuration)
//! - tabledd.local.toml (git-ignored local overrides)
//! - Environment variables (TABLEDD_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # tabledd.toml
//! ordering = "search"
//! method = "slice"
//! laplace_alpha = 0.05
//!
//! [ordering_config]
//! max_evals = 500
//! seed = 7
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! TABLEDD_METHOD=trie
//! TABLEDD_ORDERING_CONFIG__MAX_EVALS=50
//! ```

use crate::schema::BinConfig;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// How the dimension permutation is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderingMode {
    /// Use `fixed_order` verbatim (must be a permutation of the schema)
    Fixed,
    /// Entropy + cardinality ascending
    #[default]
    Heuristic,
    /// Randomized local search from the heuristic order
    Search,
}

/// Which compiler builds the diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompileMethod {
    /// Full prefix trie, then bottom-up canonical reduction
    #[default]
    Trie,
    /// Incremental reduced construction; peak memory tracks the reduced size
    Slice,
}

/// Objective minimized by the ordering search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingObjective {
    /// Sum over order prefixes of the distinct projected row count; cheap
    /// and correlates with trie size
    #[default]
    PrefixDistinctSum,
    /// Reduced node count (compiles per evaluation)
    Nodes,
    /// Reduced arc count (compiles per evaluation)
    Arcs,
    /// Node count plus arc count (compiles per evaluation)
    NodesPlusArcs,
}

/// Budget and policy for the randomized ordering search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderingConfig {
    /// Wall-clock budget in seconds; 0 stops the search immediately
    #[serde(default = "default_time_budget")]
    pub time_budget_s: f64,

    /// Maximum number of candidate evaluations
    #[serde(default = "default_max_evals")]
    pub max_evals: usize,

    /// Evaluation cap for compile-based objectives
    #[serde(default = "default_beam_width")]
    pub beam_width: usize,

    #[serde(default)]
    pub objective: OrderingObjective,

    /// RNG seed; identical seeds reproduce identical searches
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        OrderingConfig {
            time_budget_s: default_time_budget(),
            max_evals: default_max_evals(),
            beam_width: default_beam_width(),
            objective: OrderingObjective::default(),
            seed: default_seed(),
        }
    }
}

/// Per-diagram query defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Beam width for `complete`
    #[serde(default = "default_query_beam")]
    pub beam: usize,

    /// Path cap for `matches`
    #[serde(default = "default_match_limit")]
    pub limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            beam: default_query_beam(),
            limit: default_match_limit(),
        }
    }
}

/// Top-level build configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub ordering: OrderingMode,

    /// Required when `ordering = fixed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_order: Option<Vec<String>>,

    #[serde(default)]
    pub method: CompileMethod,

    /// Trie compiler only; disabling is for debugging and inspection
    #[serde(default = "default_true")]
    pub enable_reduction: bool,

    /// Laplace smoothing for `complete` conditionals
    #[serde(default = "default_alpha")]
    pub laplace_alpha: f64,

    /// Bin config for numeric dimensions without their own
    #[serde(default)]
    pub default_numeric_bins: BinConfig,

    #[serde(default)]
    pub ordering_config: OrderingConfig,

    #[serde(default)]
    pub query: QueryConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            ordering: OrderingMode::default(),
            fixed_order: None,
            method: CompileMethod::default(),
            enable_reduction: true,
            laplace_alpha: default_alpha(),
            default_numeric_bins: BinConfig::default(),
            ordering_config: OrderingConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Load configuration from the default locations.
    ///
    /// Merges in order:
    /// 1. tabledd.toml (base configuration)
    /// 2. tabledd.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (TABLEDD_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("tabledd.toml"))
            .merge(Toml::file("tabledd.local.toml"))
            .merge(Env::prefixed("TABLEDD_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("TABLEDD_").split("__"))
            .extract()
    }

    /// Config pinning the compilation order.
    pub fn fixed(order: Vec<String>) -> Self {
        BuildConfig {
            ordering: OrderingMode::Fixed,
            fixed_order: Some(order),
            ..BuildConfig::default()
        }
    }

    pub fn with_method(mut self, method: CompileMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_ordering(mut self, ordering: OrderingMode) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.laplace_alpha = alpha;
        self
    }
}

// Default value functions
fn default_true() -> bool { true }
fn default_alpha() -> f64 { 0.1 }
fn default_time_budget() -> f64 { 1.0 }
fn default_max_evals() -> usize { 200 }
fn default_beam_width() -> usize { 8 }
fn default_seed() -> u64 { 42 }
fn default_query_beam() -> usize { 25 }
fn default_match_limit() -> usize { 100 }
