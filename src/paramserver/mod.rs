//! Parameter Server Module
//!
//! Holds one shard of a distributed training job's model state:
//! - Model container and merge protocol
//! - Lock-guarded shard for concurrent worker connections
//! - Transport-facing push/pull entry points

pub mod model;
pub mod server;
pub mod shard;

pub use model::Model;
pub use server::{ParameterServer, ServerConfig};
pub use shard::{ModelShard, ShardStats, ShardSummary};
