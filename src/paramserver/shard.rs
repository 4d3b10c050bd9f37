//! Shared shard state for concurrent access.
//!
//! Wraps the model in a reader-writer lock: updates are mutually
//! exclusive, readers run concurrently and always observe a fully-before
//! or fully-after snapshot of any update.

use crate::core::{now, Error, Result, Timestamp};
use crate::paramserver::model::Model;
use crate::proto::ModelUpdate;
use crate::tensor::Tensor;
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::Serialize;
use std::sync::RwLock;

/// Shard statistics.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ShardStats {
    pub updates_received: u64,
    pub updates_applied: u64,
    pub updates_rejected: u64,
    pub last_update: Option<Timestamp>,
    pub current_version: i32,
}

/// Summary of one dense parameter.
#[derive(Clone, Debug, Serialize)]
pub struct DenseParameterSummary {
    pub name: String,
    pub dtype: String,
    pub shape: Vec<usize>,
}

/// Summary of one embedding table.
#[derive(Clone, Debug, Serialize)]
pub struct EmbeddingTableSummary {
    pub name: String,
    pub dimension: usize,
    pub rows: usize,
}

/// Snapshot of shard contents for diagnostics.
#[derive(Clone, Debug, Serialize)]
pub struct ShardSummary {
    pub version: i32,
    pub initialized: bool,
    pub dense_parameters: Vec<DenseParameterSummary>,
    pub embedding_tables: Vec<EmbeddingTableSummary>,
    pub stats: ShardStats,
}

/// A model shard shared between concurrent worker connections.
#[derive(Debug, Default)]
pub struct ModelShard {
    /// The model state
    model: RwLock<Model>,
    /// Statistics
    stats: RwLock<ShardStats>,
}

impl ModelShard {
    /// Create an empty shard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an update into the shard. Returns the shard version after
    /// the merge.
    pub fn apply_update(&self, update: &ModelUpdate) -> Result<i32> {
        self.apply_update_guarded(update, false)
    }

    /// Merge an update, optionally rejecting a candidate version older
    /// than the current one. The staleness check runs under the same
    /// write lock as the merge, so it cannot race a concurrent update.
    pub fn apply_update_guarded(
        &self,
        update: &ModelUpdate,
        enforce_monotonic_version: bool,
    ) -> Result<i32> {
        let mut model = self.model.write().unwrap();

        if enforce_monotonic_version && update.version >= 0 && update.version < model.version() {
            self.record(false, model.version());
            return Err(Error::StaleVersion {
                current: model.version(),
                incoming: update.version,
            });
        }

        let outcome = model.apply_update(update);
        let version = model.version();
        self.record(outcome.is_ok(), version);
        outcome.map(|_| version)
    }

    /// Look up a dense parameter, returning an owned snapshot.
    pub fn dense_parameter(&self, name: &str) -> Option<Tensor> {
        self.model
            .read()
            .unwrap()
            .get_dense_parameter(name)
            .cloned()
    }

    /// Look up one embedding row without materializing it.
    pub fn embedding_vector(&self, table: &str, id: i64) -> Option<Vec<f32>> {
        self.model
            .read()
            .unwrap()
            .get_embedding_table(table)
            .and_then(|t| t.get(id).map(|r| r.to_vec()))
    }

    /// Look up embedding rows for a pull, materializing absent rows with
    /// the table's initializer. Takes the write lock because rows may be
    /// created.
    pub fn lookup_embedding_vectors(&self, table: &str, ids: &[i64]) -> Result<Vec<Vec<f32>>> {
        let mut model = self.model.write().unwrap();
        let table = model
            .get_embedding_table_mut(table)
            .ok_or_else(|| Error::EmbeddingTableNotFound(table.to_string()))?;
        Ok(ids.iter().map(|id| table.get_or_init(*id).to_vec()).collect())
    }

    /// Current model version.
    pub fn version(&self) -> i32 {
        self.model.read().unwrap().version()
    }

    /// Whether the shard has been initialized.
    pub fn initialized(&self) -> bool {
        self.model.read().unwrap().initialized()
    }

    /// Current statistics.
    pub fn stats(&self) -> ShardStats {
        self.stats.read().unwrap().clone()
    }

    /// Diagnostics summary of the shard contents.
    pub fn summary(&self) -> ShardSummary {
        let model = self.model.read().unwrap();
        let mut dense_parameters: Vec<DenseParameterSummary> = model
            .dense_parameter_names()
            .into_iter()
            .filter_map(|name| {
                model.get_dense_parameter(name).map(|t| DenseParameterSummary {
                    name: name.to_string(),
                    dtype: t.dtype().to_string(),
                    shape: t.shape().to_vec(),
                })
            })
            .collect();
        dense_parameters.sort_by(|a, b| a.name.cmp(&b.name));

        let mut embedding_tables: Vec<EmbeddingTableSummary> = model
            .embedding_table_names()
            .into_iter()
            .filter_map(|name| {
                model.get_embedding_table(name).map(|t| EmbeddingTableSummary {
                    name: name.to_string(),
                    dimension: t.dimension(),
                    rows: t.len(),
                })
            })
            .collect();
        embedding_tables.sort_by(|a, b| a.name.cmp(&b.name));

        ShardSummary {
            version: model.version(),
            initialized: model.initialized(),
            dense_parameters,
            embedding_tables,
            stats: self.stats(),
        }
    }

    /// Serialize the full shard state, LZ4-compressed.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let bytes = self.model.read().unwrap().to_bytes()?;
        Ok(compress_prepend_size(&bytes))
    }

    /// Replace the shard state from a snapshot.
    pub fn restore(&self, snapshot: &[u8]) -> Result<()> {
        let bytes = decompress_size_prepended(snapshot)
            .map_err(|e| Error::DecompressionFailed(e.to_string()))?;
        let restored = Model::from_bytes(&bytes)?;
        let version = restored.version();
        *self.model.write().unwrap() = restored;
        self.stats.write().unwrap().current_version = version;
        Ok(())
    }

    fn record(&self, applied: bool, version: i32) {
        let mut stats = self.stats.write().unwrap();
        stats.updates_received += 1;
        if applied {
            stats.updates_applied += 1;
            stats.last_update = Some(now());
        } else {
            stats.updates_rejected += 1;
        }
        stats.current_version = version;
    }
}
