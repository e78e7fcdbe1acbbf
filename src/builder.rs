//! # Build Facade
//!
//! [`MddBuilder`] orchestrates the full fit pipeline: validate rows against
//! the schema, fit bin models for the numeric columns, label every row,
//! choose a dimension order, compile (trie or slice), and finalize into a
//! read-only [`Mdd`].
//!
//! The builder retains the labeled rows it fit, so [`MddBuilder::append`]
//! can serve incremental append by rebuilding over the union.

use crate::compile::{compile_slice, compile_trie, CompileError};
use crate::config::{BuildConfig, CompileMethod};
use crate::diagram::Mdd;
use crate::error::MddResult;
use crate::ordering::{self, OrderingOutcome};
use crate::schema::{BinModel, Schema};
use crate::value::{Row, Value};
use std::collections::HashMap;
use tracing::{debug, info};

/// Compiles tables of rows into decision diagrams.
pub struct MddBuilder {
    schema: Schema,
    config: BuildConfig,
    bin_models: HashMap<String, BinModel>,
    /// Labeled rows in schema order, retained for append-by-rebuild
    labeled: Vec<Vec<Value>>,
    last_ordering: Option<OrderingOutcome>,
}

impl MddBuilder {
    pub fn new(schema: Schema) -> Self {
        MddBuilder {
            schema,
            config: BuildConfig::default(),
            bin_models: HashMap::new(),
            labeled: Vec::new(),
            last_ordering: None,
        }
    }

    pub fn with_config(mut self, config: BuildConfig) -> Self {
        self.config = config;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Diagnostics of the most recent order choice.
    pub fn last_ordering(&self) -> Option<&OrderingOutcome> {
        self.last_ordering.as_ref()
    }

    /// Compile a table of rows into a diagram. Replaces any previously
    /// fitted state; bin models are fit fresh from these rows.
    pub fn fit<I>(&mut self, rows: I) -> MddResult<Mdd>
    where
        I: IntoIterator<Item = Row>,
    {
        self.labeled.clear();
        self.bin_models.clear();
        let raw: Vec<Row> = rows.into_iter().collect();
        self.fit_bin_models(&raw)?;
        self.label_rows(&raw)?;
        self.build()
    }

    /// Add rows to the fitted table and rebuild the diagram over the
    /// union. Bin models are kept from the original fit, so appended
    /// numeric values land in the existing intervals.
    pub fn append<I>(&mut self, rows: I) -> MddResult<Mdd>
    where
        I: IntoIterator<Item = Row>,
    {
        let raw: Vec<Row> = rows.into_iter().collect();
        if self.bin_models.is_empty() {
            // Appending to a never-fitted builder: fit models from these rows.
            self.fit_bin_models(&raw)?;
        }
        self.label_rows(&raw)?;
        self.build()
    }

    fn fit_bin_models(&mut self, raw: &[Row]) -> MddResult<()> {
        for dim in self.schema.iter().filter(|d| d.is_numeric()) {
            let mut values = Vec::new();
            for row in raw {
                match dim.normalize(row.get(dim.name())) {
                    Value::Missing => {}
                    other => match other.as_f64() {
                        Some(x) if !x.is_nan() => values.push(x),
                        _ => {
                            return Err(CompileError::InvalidValue {
                                dimension: dim.name().to_string(),
                                value: other.truncated(40),
                                expected: "numeric",
                            }
                            .into())
                        }
                    },
                }
            }
            let config = dim
                .bin_config()
                .unwrap_or(&self.config.default_numeric_bins);
            let model = BinModel::fit(dim.name(), &values, config)?;
            debug!(
                dimension = dim.name(),
                bins = model.bins(),
                degenerate = model.is_degenerate(),
                "fitted bin model"
            );
            self.bin_models.insert(dim.name().to_string(), model);
        }
        Ok(())
    }

    fn label_rows(&mut self, raw: &[Row]) -> MddResult<()> {
        self.labeled.reserve(raw.len());
        for row in raw {
            let mut labels = Vec::with_capacity(self.schema.len());
            for dim in self.schema.iter() {
                let normalized = dim.normalize(row.get(dim.name()));
                let label = match self.bin_models.get(dim.name()) {
                    Some(model) => model.apply(&normalized).map_err(CompileError::from)?,
                    None => normalized,
                };
                labels.push(label);
            }
            self.labeled.push(labels);
        }
        Ok(())
    }

    fn build(&mut self) -> MddResult<Mdd> {
        if self.config.laplace_alpha.is_nan() || self.config.laplace_alpha < 0.0 {
            return Err(CompileError::InvalidConfig(format!(
                "laplace_alpha must be non-negative, got {}",
                self.config.laplace_alpha
            ))
            .into());
        }

        let names = self.schema.names();
        let outcome = ordering::choose_order(
            &names,
            &self.labeled,
            self.config.ordering,
            self.config.fixed_order.as_deref(),
            &self.config.ordering_config,
        )?;
        info!(
            order = ?outcome.order,
            strategy = ?outcome.strategy,
            objective = outcome.objective,
            evaluations = outcome.evaluations,
            "dimension order chosen"
        );

        let perm: Vec<usize> = outcome
            .order
            .iter()
            .map(|name| {
                self.schema
                    .index_of(name)
                    .unwrap_or_else(|| unreachable!("order is a schema permutation"))
            })
            .collect();
        let projected: Vec<Vec<Value>> = self
            .labeled
            .iter()
            .map(|row| perm.iter().map(|&i| row[i].clone()).collect())
            .collect();

        let depth = self.schema.len();
        let (builder, reduced) = match self.config.method {
            CompileMethod::Trie => (
                compile_trie(depth, &projected, self.config.enable_reduction),
                self.config.enable_reduction,
            ),
            CompileMethod::Slice => (compile_slice(depth, &projected), true),
        };

        let mdd = builder.finalize(
            outcome.order.clone(),
            self.schema.clone(),
            self.bin_models.clone(),
            self.config.laplace_alpha,
            reduced,
            self.config.query,
        );
        let size = mdd.size();
        info!(
            rows = self.labeled.len(),
            nodes = size.nodes,
            arcs = size.arcs,
            layers = size.layers,
            method = ?self.config.method,
            "diagram compiled"
        );
        self.last_ordering = Some(outcome);
        Ok(mdd)
    }
}
