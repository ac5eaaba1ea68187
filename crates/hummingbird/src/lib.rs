//! In-memory key-value store built on dash-style hash tables
//!
//! # Features
//! - Single-threaded dash table: segments of 56 regular + 4 stash buckets,
//!   home → neighbor → stash placement
//! - Shared-nothing sharding: one table per worker thread, reached only
//!   through bounded command queues
//! - Type-directed, fixed-width key encoding for seeded 64-bit hashing
//!
//! Capacity is fixed when a table is built. A worker whose table runs out
//! of room aborts the process rather than drop the write.
//!
//! ```
//! use hummingbird::ShardedStore;
//!
//! let store = ShardedStore::new(4, 10_000).unwrap();
//! store.set(7u64, "seven".to_string()).unwrap();
//!
//! assert_eq!(store.get(7).unwrap(), Some("seven".to_string()));
//! assert_eq!(store.get_or_default(8).unwrap(), (false, String::new()));
//! ```

pub mod error;
pub mod store;
pub mod table;
pub mod types;

pub use error::{KvError, KvResult};
pub use store::{ShardStats, ShardedStore, StoreConfig};
pub use table::{DashTable, SetOutcome, TableStats};
pub use types::{DashKey, TextKey};
