//! Indexed slices: sparse row updates for embedding tables.
//!
//! An indexed-slices value pairs integer row indices with row vectors.
//! Workers pre-combine gradients with `merge` and `deduplicate` before
//! pushing; the server merges rows last-write-wins.

use crate::core::{ElementType, Error, Result};
use crate::proto::IndexedSlicesProto;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A sparse update: parallel lists of row indices and row vectors.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexedSlices {
    /// Row indices
    pub indices: Vec<i64>,
    /// Row vectors, one per index
    pub rows: Vec<Vec<f32>>,
}

impl IndexedSlices {
    /// Create indexed slices, validating that the lists are parallel.
    pub fn new(indices: Vec<i64>, rows: Vec<Vec<f32>>) -> Result<Self> {
        if indices.len() != rows.len() {
            return Err(Error::DecodeFailed(format!(
                "indexed slices mismatch: {} indices, {} rows",
                indices.len(),
                rows.len()
            )));
        }
        Ok(Self { indices, rows })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the update is empty.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Reconstruct a sparse update from its wire form.
    ///
    /// The concatenated tensor must be rank 2 with a leading dimension
    /// equal to the id count, and must carry f32 values.
    pub fn from_proto(proto: &IndexedSlicesProto) -> Result<Self> {
        let tensor = Tensor::from_proto(&proto.concat_tensors)?;
        if tensor.shape().len() != 2 {
            return Err(Error::DecodeFailed(format!(
                "indexed slices expect a rank-2 tensor, got shape {:?}",
                tensor.shape()
            )));
        }
        let (n, dim) = (tensor.shape()[0], tensor.shape()[1]);
        if n != proto.ids.len() {
            return Err(Error::DecodeFailed(format!(
                "indexed slices mismatch: {} ids, {} rows",
                proto.ids.len(),
                n
            )));
        }
        let values = tensor.to_f32()?;
        let rows = values.chunks(dim.max(1)).map(|c| c.to_vec()).collect();
        Self::new(proto.ids.clone(), rows)
    }

    /// Convert to wire form. Rows must share one dimension.
    pub fn to_proto(&self) -> Result<IndexedSlicesProto> {
        let dim = self.rows.first().map(|r| r.len()).unwrap_or(0);
        if self.rows.iter().any(|r| r.len() != dim) {
            return Err(Error::SerializationError(
                "indexed slices rows have unequal lengths".to_string(),
            ));
        }
        let values: Vec<f32> = self.rows.iter().flatten().copied().collect();
        let tensor = Tensor::from_f32(vec![self.rows.len(), dim], &values)?;
        Ok(IndexedSlicesProto {
            ids: self.indices.clone(),
            concat_tensors: tensor.to_proto(),
        })
    }

    /// Concatenate several sparse updates into one.
    pub fn merge<'a, I>(slices: I) -> Self
    where
        I: IntoIterator<Item = &'a IndexedSlices>,
    {
        let mut merged = Self::default();
        for s in slices {
            merged.indices.extend_from_slice(&s.indices);
            merged.rows.extend(s.rows.iter().cloned());
        }
        merged
    }

    /// Sum rows sharing an index, keeping first-seen index order.
    pub fn deduplicate(&self) -> Self {
        let mut order: Vec<i64> = Vec::new();
        let mut combined: HashMap<i64, Vec<f32>> = HashMap::new();

        for (index, row) in self.indices.iter().zip(self.rows.iter()) {
            match combined.get_mut(index) {
                Some(acc) => {
                    for (a, v) in acc.iter_mut().zip(row.iter()) {
                        *a += v;
                    }
                }
                None => {
                    order.push(*index);
                    combined.insert(*index, row.clone());
                }
            }
        }

        let rows = order
            .iter()
            .map(|i| combined.remove(i).unwrap_or_default())
            .collect();
        Self {
            indices: order,
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::TensorProto;

    #[test]
    fn test_new_rejects_unparallel_lists() {
        let result = IndexedSlices::new(vec![0, 1], vec![vec![1.0]]);
        assert!(result.is_err());
    }

    #[test]
    fn test_proto_roundtrip() {
        let slices =
            IndexedSlices::new(vec![3, 7], vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let proto = slices.to_proto().unwrap();
        let restored = IndexedSlices::from_proto(&proto).unwrap();
        assert_eq!(restored, slices);
    }

    #[test]
    fn test_from_proto_rejects_rank_1_tensor() {
        let tensor = Tensor::from_f32(vec![4], &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let proto = IndexedSlicesProto {
            ids: vec![0, 1, 2, 3],
            concat_tensors: tensor.to_proto(),
        };
        assert!(IndexedSlices::from_proto(&proto).is_err());
    }

    #[test]
    fn test_from_proto_rejects_id_count_mismatch() {
        let tensor = Tensor::from_f32(vec![2, 2], &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let proto = IndexedSlicesProto {
            ids: vec![5],
            concat_tensors: tensor.to_proto(),
        };
        assert!(IndexedSlices::from_proto(&proto).is_err());
    }

    #[test]
    fn test_from_proto_rejects_f64_values() {
        let proto = IndexedSlicesProto {
            ids: vec![0],
            concat_tensors: TensorProto {
                dtype: crate::core::ElementType::F64,
                shape: vec![1, 2],
                content: vec![0u8; 16],
            },
        };
        assert!(IndexedSlices::from_proto(&proto).is_err());
    }

    #[test]
    fn test_merge_concatenates() {
        let a = IndexedSlices::new(vec![1], vec![vec![1.0, 1.0]]).unwrap();
        let b = IndexedSlices::new(vec![2, 3], vec![vec![2.0, 2.0], vec![3.0, 3.0]]).unwrap();

        let merged = IndexedSlices::merge([&a, &b]);
        assert_eq!(merged.indices, vec![1, 2, 3]);
        assert_eq!(merged.rows.len(), 3);
        assert_eq!(merged.rows[2], vec![3.0, 3.0]);
    }

    #[test]
    fn test_deduplicate_sums_shared_indices() {
        let slices = IndexedSlices::new(
            vec![4, 9, 4],
            vec![vec![1.0, 2.0], vec![5.0, 5.0], vec![10.0, 20.0]],
        )
        .unwrap();

        let deduped = slices.deduplicate();
        assert_eq!(deduped.indices, vec![4, 9]);
        assert_eq!(deduped.rows[0], vec![11.0, 22.0]);
        assert_eq!(deduped.rows[1], vec![5.0, 5.0]);
    }

    #[test]
    fn test_deduplicate_without_duplicates_is_identity() {
        let slices = IndexedSlices::new(vec![1, 2], vec![vec![1.0], vec![2.0]]).unwrap();
        assert_eq!(slices.deduplicate(), slices);
    }
}
