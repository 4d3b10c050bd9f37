//! Tensor capability for the parameter server.
//!
//! Provides the value types the model state is built from:
//! - Dense tensors with a validated value buffer
//! - Indexed slices (sparse row updates)
//! - Row-addressable embedding tables with lazy initialization

pub mod dense;
pub mod embedding;
pub mod slices;

pub use dense::Tensor;
pub use embedding::EmbeddingTable;
pub use slices::IndexedSlices;
