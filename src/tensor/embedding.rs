//! Row-addressable embedding table.
//!
//! Only a subset of rows exists at any time; absent rows are materialized
//! with the table's initializer on first access. Merging a sparse update
//! overwrites rows, it never accumulates.

use crate::core::{ElementType, Error, Initializer, Result};
use crate::tensor::IndexedSlices;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A sparse embedding parameter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingTable {
    /// Table name
    name: String,
    /// Row dimension
    dimension: usize,
    /// Initializer for absent rows
    initializer: Initializer,
    /// Element type of the rows
    dtype: ElementType,
    /// Materialized rows
    vectors: HashMap<i64, Vec<f32>>,
}

impl EmbeddingTable {
    /// Create an empty table.
    pub fn new(name: &str, dimension: usize, initializer: Initializer, dtype: ElementType) -> Self {
        Self {
            name: name.to_string(),
            dimension,
            initializer,
            dtype,
            vectors: HashMap::new(),
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Row dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Initializer for absent rows.
    pub fn initializer(&self) -> Initializer {
        self.initializer
    }

    /// Element type.
    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    /// Number of materialized rows.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether no rows have been materialized.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Look up a row. Absent rows stay absent.
    pub fn get(&self, id: i64) -> Option<&[f32]> {
        self.vectors.get(&id).map(|v| v.as_slice())
    }

    /// Look up a row, materializing it with the initializer if absent.
    pub fn get_or_init(&mut self, id: i64) -> &[f32] {
        let (dimension, initializer) = (self.dimension, self.initializer);
        self.vectors
            .entry(id)
            .or_insert_with(|| initializer.materialize(dimension))
    }

    /// Overwrite the rows named by a sparse update.
    ///
    /// Row lengths are validated against the table dimension before any
    /// row is written, so a failed call leaves the table unchanged.
    pub fn set_vectors(&mut self, slices: &IndexedSlices) -> Result<()> {
        for row in &slices.rows {
            if row.len() != self.dimension {
                return Err(Error::DimensionMismatch {
                    table: self.name.clone(),
                    expected: self.dimension,
                    actual: row.len(),
                });
            }
        }
        for (index, row) in slices.indices.iter().zip(slices.rows.iter()) {
            self.vectors.insert(*index, row.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(dim: usize) -> EmbeddingTable {
        EmbeddingTable::new("emb", dim, Initializer::Zeros, ElementType::F32)
    }

    #[test]
    fn test_new_table_is_empty() {
        let t = table(4);
        assert!(t.is_empty());
        assert_eq!(t.dimension(), 4);
        assert!(t.get(0).is_none());
    }

    #[test]
    fn test_get_or_init_materializes_once() {
        let mut t = table(3);

        let row = t.get_or_init(7).to_vec();
        assert_eq!(row, vec![0.0; 3]);
        assert_eq!(t.len(), 1);

        // Second access returns the existing row
        t.get_or_init(7);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_get_or_init_uses_initializer() {
        let mut t = EmbeddingTable::new("emb", 8, Initializer::Ones, ElementType::F32);
        assert_eq!(t.get_or_init(0), &[1.0; 8]);
    }

    #[test]
    fn test_set_vectors_overwrites() {
        let mut t = table(4);

        let first = IndexedSlices::new(vec![3], vec![vec![1.0; 4]]).unwrap();
        t.set_vectors(&first).unwrap();
        assert_eq!(t.get(3).unwrap(), &[1.0; 4]);

        let second = IndexedSlices::new(vec![3], vec![vec![2.0; 4]]).unwrap();
        t.set_vectors(&second).unwrap();
        assert_eq!(t.get(3).unwrap(), &[2.0; 4]);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_set_vectors_rejects_dimension_mismatch() {
        let mut t = table(4);
        let good = IndexedSlices::new(vec![0], vec![vec![1.0; 4]]).unwrap();
        t.set_vectors(&good).unwrap();

        // One good row, one bad row: nothing may be written
        let bad = IndexedSlices::new(vec![1, 2], vec![vec![1.0; 4], vec![1.0; 3]]).unwrap();
        let err = t.set_vectors(&bad).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 4,
                actual: 3,
                ..
            }
        ));

        assert_eq!(t.len(), 1);
        assert!(t.get(1).is_none());
        assert_eq!(t.get(0).unwrap(), &[1.0; 4]);
    }

    #[test]
    fn test_set_vectors_duplicate_index_last_wins() {
        let mut t = table(2);
        let slices =
            IndexedSlices::new(vec![5, 5], vec![vec![1.0, 1.0], vec![9.0, 9.0]]).unwrap();
        t.set_vectors(&slices).unwrap();
        assert_eq!(t.get(5).unwrap(), &[9.0, 9.0]);
    }
}
