//! # Compilation
//!
//! Two strategies build the same reduced diagram from labeled rows:
//!
//! - `trie` materializes the full prefix trie, then merges canonically
//!   bottom-up. Simple, but peak memory is the unreduced trie.
//! - `slice` builds the reduced diagram directly, interning nodes
//!   through a per-layer signature index; peak memory tracks the reduced
//!   size.
//!
//! For any input and order the two produce diagrams with identical node
//! counts, arc counts and per-arc counts, up to id renaming.

mod slice;
mod trie;

pub(crate) use slice::compile_slice;
pub(crate) use trie::compile_trie;

use thiserror::Error;

/// Compilation failures: rows inconsistent with the schema.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Binning and schema failures surfaced during fit
    #[error(transparent)]
    Schema(#[from] crate::schema::SchemaError),

    /// Row value that does not fit its column type
    #[error("dimension '{dimension}': row value '{value}' does not fit a {expected} column")]
    InvalidValue {
        dimension: String,
        value: String,
        expected: &'static str,
    },

    /// Bad build configuration (negative alpha, ...)
    #[error("invalid build configuration: {0}")]
    InvalidConfig(String),
}
