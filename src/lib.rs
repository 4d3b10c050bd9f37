//! # tensorps - Parameter Server Model State
//!
//! The in-memory model state held by one shard of a distributed training
//! job, and the protocol for merging worker updates into it:
//! - **Tensor capability**: dense tensors, indexed slices, embedding tables
//! - **Model**: name-keyed parameter ownership, versioning, atomic merges
//! - **Shard**: lock-guarded shared state with snapshots and statistics
//!
//! ## Quick Start
//!
//! ```rust
//! use tensorps::paramserver::ModelShard;
//! use tensorps::proto::{EmbeddingTableInfo, ModelUpdate};
//! use tensorps::tensor::Tensor;
//!
//! let shard = ModelShard::new();
//! let update = ModelUpdate::new()
//!     .with_table_info(EmbeddingTableInfo::new("emb", 16))
//!     .with_dense("w1", Tensor::from_f32(vec![2], &[0.1, 0.2]).unwrap().to_proto())
//!     .with_version(1);
//!
//! let version = shard.apply_update(&update).unwrap();
//! assert_eq!(version, 1);
//! assert!(shard.initialized());
//! ```

pub mod core;
pub mod paramserver;
pub mod proto;
pub mod tensor;

pub use crate::core::error::{Error, Result};
