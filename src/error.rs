//! Crate-level error aggregation.

use thiserror::Error;

/// Any failure surfaced by the build or query surface.
#[derive(Debug, Error)]
pub enum MddError {
    #[error(transparent)]
    Schema(#[from] crate::schema::SchemaError),

    #[error(transparent)]
    Ordering(#[from] crate::ordering::OrderingError),

    #[error(transparent)]
    Compile(#[from] crate::compile::CompileError),

    #[error(transparent)]
    Query(#[from] crate::query::QueryError),
}

/// Result alias for the public surface.
pub type MddResult<T> = Result<T, MddError>;
