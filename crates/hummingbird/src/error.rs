//! Store error types

use std::time::Duration;
use thiserror::Error;

pub type KvResult<T> = Result<T, KvError>;

/// Errors raised by the table engine and the sharded store
#[derive(Error, Debug)]
pub enum KvError {
    /// No bucket in the key's probe order had room. Tables never grow, so
    /// this means the directory was under-provisioned for the workload.
    #[error("segment {segment} is full (hash {hash:#018x}); table cannot grow")]
    SegmentFull { segment: usize, hash: u64 },

    #[error("shard {shard} has stopped")]
    ShardStopped { shard: usize },

    #[error("shard {shard} did not reply within {timeout:?}")]
    ReadTimeout { shard: usize, timeout: Duration },

    #[error("invalid configuration: {field} must be at least {min}, got {value}")]
    InvalidConfiguration {
        field: &'static str,
        min: usize,
        value: usize,
    },

    #[error("failed to spawn worker for shard {shard}: {source}")]
    WorkerSpawn {
        shard: usize,
        #[source]
        source: std::io::Error,
    },
}
