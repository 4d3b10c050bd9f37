//! Parameter shard model state.
//!
//! One `Model` holds the dense parameters and embedding tables owned by a
//! single parameter server shard, plus the logical version of the full
//! parameter set. All mutation goes through [`Model::apply_update`].

use crate::core::{Error, Result};
use crate::proto::{EmbeddingTableInfo, ModelUpdate};
use crate::tensor::{EmbeddingTable, IndexedSlices, Tensor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Model state of one parameter server shard.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Model {
    /// Dense parameters by name
    dense_parameters: HashMap<String, Tensor>,
    /// Embedding tables by name
    embedding_tables: HashMap<String, EmbeddingTable>,
    /// Logical revision of the full parameter set
    version: i32,
    /// Whether at least one update has been applied successfully
    initialized: bool,
}

impl Model {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current model version.
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Whether the model has received a successful update.
    pub fn initialized(&self) -> bool {
        self.initialized
    }

    /// Look up a dense parameter. Absence is not an error.
    pub fn get_dense_parameter(&self, name: &str) -> Option<&Tensor> {
        self.dense_parameters.get(name)
    }

    /// Look up an embedding table. Absence is not an error.
    pub fn get_embedding_table(&self, name: &str) -> Option<&EmbeddingTable> {
        self.embedding_tables.get(name)
    }

    /// Mutable embedding table lookup, for lazy row materialization.
    pub fn get_embedding_table_mut(&mut self, name: &str) -> Option<&mut EmbeddingTable> {
        self.embedding_tables.get_mut(name)
    }

    /// Names of all dense parameters.
    pub fn dense_parameter_names(&self) -> Vec<&str> {
        self.dense_parameters.keys().map(|k| k.as_str()).collect()
    }

    /// Names of all embedding tables.
    pub fn embedding_table_names(&self) -> Vec<&str> {
        self.embedding_tables.keys().map(|k| k.as_str()).collect()
    }

    /// Register an embedding table. Re-registering an existing name is a
    /// no-op and preserves already-merged rows.
    pub fn register_embedding_table(&mut self, info: &EmbeddingTableInfo) {
        if self.embedding_tables.contains_key(&info.name) {
            return;
        }
        debug!(
            table = %info.name,
            dim = info.dim,
            "registering embedding table"
        );
        let table =
            EmbeddingTable::new(&info.name, info.dim as usize, info.initializer, info.dtype);
        self.embedding_tables.insert(info.name.clone(), table);
    }

    /// Merge an update into the model.
    ///
    /// The call is all-or-nothing: every payload is decoded and every
    /// referenced table name and row dimension is validated before the
    /// first mutation, so a failed call leaves the model exactly as it
    /// was. Registrations listed in the update itself satisfy the sparse
    /// phase. A non-negative update version is stored unconditionally;
    /// the coordinator is treated as authoritative.
    pub fn apply_update(&mut self, update: &ModelUpdate) -> Result<()> {
        let (dense, sparse) = self.validate(update)?;

        for info in &update.embedding_table_infos {
            self.register_embedding_table(info);
        }
        for (name, tensor) in dense {
            self.dense_parameters.insert(name, tensor);
        }
        for (name, slices) in sparse {
            let table = self
                .embedding_tables
                .get_mut(&name)
                .ok_or_else(|| Error::EmbeddingTableNotFound(name.clone()))?;
            table.set_vectors(&slices)?;
        }
        if update.version >= 0 {
            if update.version < self.version {
                warn!(
                    current = self.version,
                    incoming = update.version,
                    "model version regressed"
                );
            }
            self.version = update.version;
        }
        self.initialized = true;

        debug!(
            version = self.version,
            dense = self.dense_parameters.len(),
            tables = self.embedding_tables.len(),
            "update applied"
        );
        Ok(())
    }

    /// Decode and validate every section of an update without mutating.
    fn validate(
        &self,
        update: &ModelUpdate,
    ) -> Result<(Vec<(String, Tensor)>, Vec<(String, IndexedSlices)>)> {
        let mut dense = Vec::with_capacity(update.dense_parameters.len());
        for (name, proto) in &update.dense_parameters {
            let tensor = Tensor::from_proto(proto)
                .map_err(|e| name_decode_error("dense parameter", name, e))?;
            dense.push((name.clone(), tensor));
        }

        let mut sparse = Vec::with_capacity(update.embedding_tables.len());
        for (name, proto) in &update.embedding_tables {
            let dim = self.resolve_dimension(name, update).ok_or_else(|| {
                warn!(table = %name, "sparse update references unregistered table");
                Error::EmbeddingTableNotFound(name.clone())
            })?;
            let slices = IndexedSlices::from_proto(proto)
                .map_err(|e| name_decode_error("embedding table", name, e))?;
            for row in &slices.rows {
                if row.len() != dim {
                    return Err(Error::DimensionMismatch {
                        table: name.clone(),
                        expected: dim,
                        actual: row.len(),
                    });
                }
            }
            sparse.push((name.clone(), slices));
        }

        Ok((dense, sparse))
    }

    /// Dimension of a sparse target: an existing table, or one registered
    /// by this same update.
    fn resolve_dimension(&self, name: &str, update: &ModelUpdate) -> Option<usize> {
        self.embedding_tables
            .get(name)
            .map(|t| t.dimension())
            .or_else(|| {
                update
                    .embedding_table_infos
                    .iter()
                    .find(|i| i.name == name)
                    .map(|i| i.dim as usize)
            })
    }

    /// Serialize the full model state.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Restore a model from serialized state.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::DecodeFailed(e.to_string()))
    }
}

/// Prefix a decode error with the name of the entry that failed.
fn name_decode_error(kind: &str, name: &str, err: Error) -> Error {
    match err {
        Error::DecodeFailed(msg) => Error::DecodeFailed(format!("{} {}: {}", kind, name, msg)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ElementType, Initializer};
    use crate::proto::IndexedSlicesProto;

    fn dense_proto(values: &[f32]) -> crate::proto::TensorProto {
        Tensor::from_f32(vec![values.len()], values)
            .unwrap()
            .to_proto()
    }

    fn sparse_proto(indices: Vec<i64>, rows: Vec<Vec<f32>>) -> IndexedSlicesProto {
        IndexedSlices::new(indices, rows).unwrap().to_proto().unwrap()
    }

    #[test]
    fn test_fresh_model() {
        let model = Model::new();
        assert_eq!(model.version(), 0);
        assert!(!model.initialized());
        assert!(model.get_dense_parameter("w1").is_none());
        assert!(model.get_embedding_table("emb").is_none());
    }

    #[test]
    fn test_registration_is_idempotent() {
        let mut model = Model::new();
        let info = EmbeddingTableInfo::new("emb", 4);

        model.register_embedding_table(&info);
        let slices = IndexedSlices::new(vec![0], vec![vec![1.0; 4]]).unwrap();
        model
            .get_embedding_table_mut("emb")
            .unwrap()
            .set_vectors(&slices)
            .unwrap();

        // Re-registration must not wipe merged rows
        model.register_embedding_table(&EmbeddingTableInfo::new("emb", 4));
        assert_eq!(
            model.get_embedding_table("emb").unwrap().get(0).unwrap(),
            &[1.0; 4]
        );
    }

    #[test]
    fn test_dense_merge_is_full_overwrite() {
        let mut model = Model::new();

        let first = ModelUpdate::new().with_dense("w1", dense_proto(&[1.0, 1.0]));
        model.apply_update(&first).unwrap();

        let second = ModelUpdate::new().with_dense("w1", dense_proto(&[2.0, 2.0]));
        model.apply_update(&second).unwrap();

        let t2 = Tensor::from_f32(vec![2], &[2.0, 2.0]).unwrap();
        assert_eq!(model.get_dense_parameter("w1").unwrap(), &t2);
    }

    #[test]
    fn test_sparse_merge_overwrites_rows() {
        let mut model = Model::new();
        let register = ModelUpdate::new().with_table_info(EmbeddingTableInfo::new("emb", 4));
        model.apply_update(&register).unwrap();

        let first =
            ModelUpdate::new().with_sparse("emb", sparse_proto(vec![3], vec![vec![1.0; 4]]));
        model.apply_update(&first).unwrap();

        let second =
            ModelUpdate::new().with_sparse("emb", sparse_proto(vec![3], vec![vec![2.0; 4]]));
        model.apply_update(&second).unwrap();

        assert_eq!(
            model.get_embedding_table("emb").unwrap().get(3).unwrap(),
            &[2.0; 4]
        );
    }

    #[test]
    fn test_unknown_table_rejects_whole_update() {
        let mut model = Model::new();

        // Dense entry rides along with a sparse update for an unknown table
        let update = ModelUpdate::new()
            .with_dense("w1", dense_proto(&[1.0]))
            .with_sparse("x", sparse_proto(vec![0], vec![vec![1.0]]));

        let err = model.apply_update(&update).unwrap_err();
        match err {
            Error::EmbeddingTableNotFound(name) => assert_eq!(name, "x"),
            other => panic!("unexpected error: {other}"),
        }

        // Nothing from the same call was committed
        assert!(model.get_dense_parameter("w1").is_none());
        assert!(!model.initialized());
    }

    #[test]
    fn test_dimension_mismatch_rejects_and_preserves_rows() {
        let mut model = Model::new();
        let setup = ModelUpdate::new()
            .with_table_info(EmbeddingTableInfo::new("emb", 4))
            .with_sparse("emb", sparse_proto(vec![0], vec![vec![1.0; 4]]));
        model.apply_update(&setup).unwrap();

        let bad = ModelUpdate::new()
            .with_sparse("emb", sparse_proto(vec![1], vec![vec![1.0; 3]]))
            .with_version(9);
        let err = model.apply_update(&bad).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 4,
                actual: 3,
                ..
            }
        ));

        let table = model.get_embedding_table("emb").unwrap();
        assert_eq!(table.get(0).unwrap(), &[1.0; 4]);
        assert!(table.get(1).is_none());
        assert_eq!(model.version(), 0);
    }

    #[test]
    fn test_registration_in_same_update_satisfies_sparse_phase() {
        let mut model = Model::new();
        let update = ModelUpdate::new()
            .with_table_info(EmbeddingTableInfo::new("emb", 2))
            .with_sparse("emb", sparse_proto(vec![5], vec![vec![0.5, 0.5]]));

        model.apply_update(&update).unwrap();
        assert_eq!(
            model.get_embedding_table("emb").unwrap().get(5).unwrap(),
            &[0.5, 0.5]
        );
    }

    #[test]
    fn test_decode_failure_commits_nothing() {
        let mut model = Model::new();
        let bad_tensor = crate::proto::TensorProto {
            dtype: ElementType::F32,
            shape: vec![4],
            content: vec![0u8; 3],
        };
        let update = ModelUpdate::new()
            .with_dense("good", dense_proto(&[1.0]))
            .with_dense("bad", bad_tensor);

        assert!(matches!(
            model.apply_update(&update),
            Err(Error::DecodeFailed(_))
        ));
        assert!(model.get_dense_parameter("good").is_none());
        assert!(!model.initialized());
    }

    #[test]
    fn test_version_passthrough() {
        let mut model = Model::new();

        // Negative version leaves the version unchanged
        model
            .apply_update(&ModelUpdate::new().with_dense("w", dense_proto(&[0.0])))
            .unwrap();
        assert_eq!(model.version(), 0);

        model
            .apply_update(&ModelUpdate::new().with_version(5))
            .unwrap();
        assert_eq!(model.version(), 5);

        // A smaller non-negative version is stored unconditionally
        model
            .apply_update(&ModelUpdate::new().with_version(3))
            .unwrap();
        assert_eq!(model.version(), 3);
    }

    #[test]
    fn test_initialized_flag_lifecycle() {
        let mut model = Model::new();
        assert!(!model.initialized());

        model.apply_update(&ModelUpdate::new()).unwrap();
        assert!(model.initialized());

        // A later failed update does not clear the flag
        let bad = ModelUpdate::new().with_sparse("x", sparse_proto(vec![0], vec![vec![1.0]]));
        assert!(model.apply_update(&bad).is_err());
        assert!(model.initialized());
    }

    #[test]
    fn test_lazy_rows_use_registered_initializer() {
        let mut model = Model::new();
        let info = EmbeddingTableInfo::new("emb", 6).with_initializer(Initializer::Ones);
        model
            .apply_update(&ModelUpdate::new().with_table_info(info))
            .unwrap();

        let row = model.get_embedding_table_mut("emb").unwrap().get_or_init(42);
        assert_eq!(row, &[1.0; 6]);
    }

    #[test]
    fn test_state_bytes_roundtrip() {
        let mut model = Model::new();
        let update = ModelUpdate::new()
            .with_table_info(EmbeddingTableInfo::new("emb", 2))
            .with_dense("w1", dense_proto(&[1.0, 2.0]))
            .with_sparse("emb", sparse_proto(vec![1], vec![vec![3.0, 4.0]]))
            .with_version(7);
        model.apply_update(&update).unwrap();

        let restored = Model::from_bytes(&model.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.version(), 7);
        assert!(restored.initialized());
        assert_eq!(
            restored.get_dense_parameter("w1").unwrap().to_f32().unwrap(),
            vec![1.0, 2.0]
        );
        assert_eq!(
            restored.get_embedding_table("emb").unwrap().get(1).unwrap(),
            &[3.0, 4.0]
        );
    }
}
