//! Wire message definitions.
//!
//! These are the unvalidated forms that cross the transport boundary.
//! Validation happens when they are decoded into tensor-capability types
//! or applied to the model.

use crate::core::{ElementType, Error, Initializer, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Wire form of a dense tensor: element type tag, shape, flat value buffer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TensorProto {
    /// Element type tag
    pub dtype: ElementType,
    /// Ordered dimension sizes
    pub shape: Vec<u64>,
    /// Flat little-endian value buffer
    pub content: Vec<u8>,
}

/// Wire form of a sparse update: row ids plus their concatenated rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexedSlicesProto {
    /// Row indices
    pub ids: Vec<i64>,
    /// Rank-2 tensor holding one row per id
    pub concat_tensors: TensorProto,
}

/// Registration metadata for an embedding table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingTableInfo {
    /// Table name
    pub name: String,
    /// Row dimension
    pub dim: u64,
    /// Initializer for absent rows
    pub initializer: Initializer,
    /// Element type of the rows
    pub dtype: ElementType,
}

impl EmbeddingTableInfo {
    /// Create registration metadata with default initializer and dtype.
    pub fn new(name: &str, dim: u64) -> Self {
        Self {
            name: name.to_string(),
            dim,
            initializer: Initializer::default(),
            dtype: ElementType::default(),
        }
    }

    /// Set the initializer.
    pub fn with_initializer(mut self, initializer: Initializer) -> Self {
        self.initializer = initializer;
        self
    }

    /// Set the element type.
    pub fn with_dtype(mut self, dtype: ElementType) -> Self {
        self.dtype = dtype;
        self
    }
}

/// A parameter update pushed by a worker or coordinator.
///
/// All sections are optional and independent; a negative `version` means
/// "do not change the model version".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelUpdate {
    /// Embedding tables to register (idempotent)
    pub embedding_table_infos: Vec<EmbeddingTableInfo>,
    /// Dense parameters to replace, by name
    pub dense_parameters: HashMap<String, TensorProto>,
    /// Sparse updates to merge, by embedding table name
    pub embedding_tables: HashMap<String, IndexedSlicesProto>,
    /// Candidate model version; negative means unchanged
    pub version: i32,
}

impl Default for ModelUpdate {
    fn default() -> Self {
        Self {
            embedding_table_infos: Vec::new(),
            dense_parameters: HashMap::new(),
            embedding_tables: HashMap::new(),
            version: -1,
        }
    }
}

impl ModelUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table registration.
    pub fn with_table_info(mut self, info: EmbeddingTableInfo) -> Self {
        self.embedding_table_infos.push(info);
        self
    }

    /// Add a dense parameter.
    pub fn with_dense(mut self, name: &str, tensor: TensorProto) -> Self {
        self.dense_parameters.insert(name.to_string(), tensor);
        self
    }

    /// Add a sparse update.
    pub fn with_sparse(mut self, name: &str, slices: IndexedSlicesProto) -> Self {
        self.embedding_tables.insert(name.to_string(), slices);
        self
    }

    /// Set the candidate version.
    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Whether the update carries no content at all.
    pub fn is_empty(&self) -> bool {
        self.embedding_table_infos.is_empty()
            && self.dense_parameters.is_empty()
            && self.embedding_tables.is_empty()
            && self.version < 0
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::DecodeFailed(e.to_string()))
    }
}
