//! Common types used across tensorps modules.

use serde::{Deserialize, Serialize};

/// Element type of a tensor's value buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// 32-bit IEEE float
    F32,
    /// 64-bit IEEE float
    F64,
}

impl ElementType {
    /// Width of one element in bytes.
    pub fn byte_width(&self) -> usize {
        match self {
            ElementType::F32 => 4,
            ElementType::F64 => 8,
        }
    }
}

impl Default for ElementType {
    fn default() -> Self {
        Self::F32
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementType::F32 => write!(f, "f32"),
            ElementType::F64 => write!(f, "f64"),
        }
    }
}

/// How absent embedding rows are materialized on first access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Initializer {
    /// All zeros
    Zeros,
    /// All ones
    Ones,
    /// Uniform in [-0.05, 0.05]
    Uniform,
    /// Gaussian with mean 0, stddev 0.05
    Normal,
}

impl Default for Initializer {
    fn default() -> Self {
        Self::Zeros
    }
}

impl Initializer {
    /// Materialize a row of the given dimension.
    pub fn materialize(&self, dim: usize) -> Vec<f32> {
        use rand::Rng;
        match self {
            Initializer::Zeros => vec![0.0; dim],
            Initializer::Ones => vec![1.0; dim],
            Initializer::Uniform => {
                let mut rng = rand::thread_rng();
                (0..dim).map(|_| rng.gen::<f32>() * 0.1 - 0.05).collect()
            }
            Initializer::Normal => {
                let mut rng = rand::thread_rng();
                // Box-Muller transform, stddev 0.05
                (0..dim)
                    .map(|_| {
                        let u1: f32 = rng.gen::<f32>().max(f32::MIN_POSITIVE);
                        let u2: f32 = rng.gen();
                        let z = (-2.0 * u1.ln()).sqrt()
                            * (2.0 * std::f32::consts::PI * u2).cos();
                        0.05 * z
                    })
                    .collect()
            }
        }
    }
}

impl std::fmt::Display for Initializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Initializer::Zeros => write!(f, "zeros"),
            Initializer::Ones => write!(f, "ones"),
            Initializer::Uniform => write!(f, "uniform"),
            Initializer::Normal => write!(f, "normal"),
        }
    }
}

/// Timestamp wrapper for consistent serialization.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Get current UTC timestamp.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}
