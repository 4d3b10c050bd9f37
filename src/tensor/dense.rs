//! Dense tensor representation.
//!
//! A tensor is an element type, a shape, and a flat little-endian value
//! buffer. No numeric kernels live here; the buffer is opaque to the
//! parameter server.

use crate::core::{ElementType, Error, Result};
use crate::proto::TensorProto;
use serde::{Deserialize, Serialize};

/// A dense tensor with a validated value buffer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    /// Element type of the buffer
    dtype: ElementType,
    /// Ordered dimension sizes
    shape: Vec<usize>,
    /// Flat little-endian value buffer
    content: Vec<u8>,
}

impl Tensor {
    /// Create a tensor, validating the buffer length against the shape.
    pub fn new(dtype: ElementType, shape: Vec<usize>, content: Vec<u8>) -> Result<Self> {
        let expected = element_count(&shape)? * dtype.byte_width();
        if content.len() != expected {
            return Err(Error::DecodeFailed(format!(
                "content size mismatch, shape {:?}, content length {}",
                shape,
                content.len()
            )));
        }
        Ok(Self {
            dtype,
            shape,
            content,
        })
    }

    /// Create an f32 tensor from values.
    pub fn from_f32(shape: Vec<usize>, values: &[f32]) -> Result<Self> {
        if values.len() != element_count(&shape)? {
            return Err(Error::DecodeFailed(format!(
                "value count mismatch, shape {:?}, got {} values",
                shape,
                values.len()
            )));
        }
        let content = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Ok(Self {
            dtype: ElementType::F32,
            shape,
            content,
        })
    }

    /// Element type.
    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    /// Shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Raw value buffer.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Number of elements.
    pub fn element_count(&self) -> usize {
        self.content.len() / self.dtype.byte_width()
    }

    /// Decode the buffer as f32 values.
    pub fn to_f32(&self) -> Result<Vec<f32>> {
        if self.dtype != ElementType::F32 {
            return Err(Error::DecodeFailed(format!(
                "expected f32 tensor, got {}",
                self.dtype
            )));
        }
        Ok(self
            .content
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    /// Reconstruct a tensor from its wire form.
    pub fn from_proto(proto: &TensorProto) -> Result<Self> {
        let shape = proto.shape.iter().map(|d| *d as usize).collect();
        Self::new(proto.dtype, shape, proto.content.clone())
    }

    /// Convert to wire form.
    pub fn to_proto(&self) -> TensorProto {
        TensorProto {
            dtype: self.dtype,
            shape: self.shape.iter().map(|d| *d as u64).collect(),
            content: self.content.clone(),
        }
    }
}

/// Total element count of a shape, rejecting overflow.
fn element_count(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, d| acc.checked_mul(*d))
        .ok_or_else(|| Error::DecodeFailed(format!("shape {:?} overflows element count", shape)))
}
