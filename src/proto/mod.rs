//! Wire messages exchanged with the transport layer.

pub mod messages;

pub use messages::{EmbeddingTableInfo, IndexedSlicesProto, ModelUpdate, TensorProto};
