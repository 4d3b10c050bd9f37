//! Transport-facing entry points for a parameter server shard.
//!
//! The transport layer hands serialized updates to `push_update` and
//! replies to workers from the pull accessors. All operations are
//! bounded, in-memory, and never retried here; retry policy belongs to
//! the transport.

use crate::core::Result;
use crate::paramserver::shard::{ModelShard, ShardStats};
use crate::proto::ModelUpdate;
use crate::tensor::Tensor;
use std::sync::Arc;
use tracing::debug;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Reject pushes whose candidate version is older than the shard's
    /// current version. Off by default: the coordinator's version is
    /// taken as authoritative, including regressions.
    pub enforce_version_monotonicity: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enforce_version_monotonicity: false,
        }
    }
}

/// Parameter server facade over one model shard.
pub struct ParameterServer {
    /// The shard this server fronts
    shard: Arc<ModelShard>,
    /// Server configuration
    config: ServerConfig,
}

impl ParameterServer {
    /// Create a server over a shard.
    pub fn new(shard: Arc<ModelShard>) -> Self {
        Self {
            shard,
            config: ServerConfig::default(),
        }
    }

    /// Create with configuration.
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// The shard behind this server.
    pub fn shard(&self) -> &Arc<ModelShard> {
        &self.shard
    }

    /// Decode and merge a serialized update. Returns the shard version
    /// after the merge.
    pub async fn push_update(&self, bytes: &[u8]) -> Result<i32> {
        let update = ModelUpdate::from_bytes(bytes)?;
        debug!(
            dense = update.dense_parameters.len(),
            sparse = update.embedding_tables.len(),
            version = update.version,
            "received update"
        );
        self.shard
            .apply_update_guarded(&update, self.config.enforce_version_monotonicity)
    }

    /// Pull a dense parameter for a worker.
    pub async fn pull_dense(&self, name: &str) -> Option<Tensor> {
        self.shard.dense_parameter(name)
    }

    /// Pull embedding rows for a worker, materializing absent rows with
    /// the table's initializer.
    pub async fn pull_embedding_vectors(&self, table: &str, ids: &[i64]) -> Result<Vec<Vec<f32>>> {
        self.shard.lookup_embedding_vectors(table, ids)
    }

    /// Current shard version.
    pub fn version(&self) -> i32 {
        self.shard.version()
    }

    /// Whether the shard has been initialized.
    pub fn initialized(&self) -> bool {
        self.shard.initialized()
    }

    /// Current statistics.
    pub fn stats(&self) -> ShardStats {
        self.shard.stats()
    }

    /// Shard contents as a JSON diagnostics document.
    pub fn summary_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.shard.summary())?)
    }
}
