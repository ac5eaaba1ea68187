//! Sharded store: one dash table per worker thread
//!
//! Keys are routed by a coordinator-level hash to exactly one shard. All
//! access to a shard's table goes through its bounded command queue, so the
//! tables themselves need no locks.
//!
//! ## Guarantees
//!
//! - Commands to the same shard apply in submission order
//! - No ordering across shards
//! - `set` returns once the command is queued and blocks while the queue is full
//! - `get` blocks for the round trip through the owning worker

mod worker;

use crate::error::{KvError, KvResult};
use crate::table::TableStats;
use crate::types::DashKey;
use ahash::RandomState;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use std::hash::{BuildHasher, Hasher};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info};
use worker::{Command, ShardWorker};

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Number of shards, one worker thread each (default: logical CPUs)
    pub shard_count: usize,

    /// Expected number of keys across all shards (default: 100K).
    /// Capacity is fixed at construction, so size this generously.
    pub max_item_hint: usize,

    /// Pending commands buffered per shard before `set` blocks (default: 100)
    pub queue_capacity: usize,

    /// Deadline for a worker reply; `None` waits indefinitely (default)
    pub read_timeout: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            shard_count: num_cpus::get(),
            max_item_hint: 100_000,
            queue_capacity: 100,
            read_timeout: None,
        }
    }
}

impl StoreConfig {
    pub fn new(shard_count: usize, max_item_hint: usize) -> Self {
        Self {
            shard_count,
            max_item_hint,
            ..Default::default()
        }
    }

    pub fn with_shard_count(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count;
        self
    }

    pub fn with_max_item_hint(mut self, max_item_hint: usize) -> Self {
        self.max_item_hint = max_item_hint;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    fn validate(&self) -> KvResult<()> {
        if self.shard_count == 0 {
            return Err(KvError::InvalidConfiguration {
                field: "shard_count",
                min: 1,
                value: self.shard_count,
            });
        }
        if self.queue_capacity == 0 {
            return Err(KvError::InvalidConfiguration {
                field: "queue_capacity",
                min: 1,
                value: self.queue_capacity,
            });
        }
        Ok(())
    }
}

/// Occupancy of one shard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardStats {
    pub shard: usize,
    pub table: TableStats,
}

/// Concurrent key-value store made of independent single-threaded shards
pub struct ShardedStore<K, V> {
    /// Seeded independently of the per-shard tables
    hash_builder: RandomState,
    queues: Vec<Sender<Command<K, V>>>,
    read_timeout: Option<Duration>,
    /// Dropping the sender is the cancellation signal for every worker
    cancel: Mutex<Option<Sender<()>>>,
    /// Disconnects with `cancel`; replies that will never come are
    /// abandoned when it does
    stopped: Receiver<()>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<K, V> ShardedStore<K, V>
where
    K: DashKey + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Start `shard_count` workers, each sized for `max_item_hint / shard_count` keys
    pub fn new(shard_count: usize, max_item_hint: usize) -> KvResult<Self> {
        Self::with_config(StoreConfig::new(shard_count, max_item_hint))
    }

    pub fn with_config(config: StoreConfig) -> KvResult<Self> {
        config.validate()?;

        let per_shard_hint = config.max_item_hint / config.shard_count;
        let (cancel_tx, cancel_rx) = bounded::<()>(0);

        let mut queues = Vec::with_capacity(config.shard_count);
        let mut workers = Vec::with_capacity(config.shard_count);
        for shard in 0..config.shard_count {
            let (sender, receiver) = bounded(config.queue_capacity);
            let worker = ShardWorker::new(shard, per_shard_hint, receiver, cancel_rx.clone());
            let handle = match worker.spawn() {
                Ok(handle) => handle,
                Err(source) => {
                    error!("Failed to start shard {} worker: {}", shard, source);
                    stop_workers(cancel_tx, workers);
                    return Err(KvError::WorkerSpawn { shard, source });
                }
            };

            queues.push(sender);
            workers.push(handle);
        }

        info!(
            "Started sharded store: {} shards, {} keys per shard hint, queue capacity {}",
            config.shard_count, per_shard_hint, config.queue_capacity
        );

        Ok(Self {
            hash_builder: RandomState::new(),
            queues,
            read_timeout: config.read_timeout,
            cancel: Mutex::new(Some(cancel_tx)),
            stopped: cancel_rx,
            workers: Mutex::new(workers),
        })
    }

    /// Shard that owns `key`
    pub fn shard_for(&self, key: &K) -> usize {
        let mut hasher = self.hash_builder.build_hasher();
        key.write_key(&mut hasher);
        (hasher.finish() % self.queues.len() as u64) as usize
    }

    /// Queue a write for the owning shard.
    ///
    /// Returns once the command is queued, not once it is applied. Blocks
    /// while that shard's queue is full.
    pub fn set(&self, key: K, value: V) -> KvResult<()> {
        let shard = self.shard_for(&key);
        self.dispatch(shard, Command::Set { key, value })
    }

    /// Read `key` from its shard, waiting for the reply
    pub fn get(&self, key: K) -> KvResult<Option<V>> {
        let shard = self.shard_for(&key);
        let (reply, response) = bounded(1);
        self.dispatch(shard, Command::Get { key, reply })?;
        self.await_reply(shard, &response)
    }

    /// `(found, value)`, with `V::default()` for a missing key
    pub fn get_or_default(&self, key: K) -> KvResult<(bool, V)>
    where
        V: Default,
    {
        Ok(match self.get(key)? {
            Some(value) => (true, value),
            None => (false, V::default()),
        })
    }

    /// Per-shard occupancy, one round trip per shard
    pub fn stats(&self) -> KvResult<Vec<ShardStats>> {
        (0..self.queues.len())
            .map(|shard| {
                let (reply, response) = bounded(1);
                self.dispatch(shard, Command::Stats { reply })?;
                let table = self.await_reply(shard, &response)?;
                Ok(ShardStats { shard, table })
            })
            .collect()
    }

    /// Keys stored across all shards
    pub fn len(&self) -> KvResult<usize> {
        Ok(self.stats()?.iter().map(|s| s.table.items).sum())
    }

    fn dispatch(&self, shard: usize, command: Command<K, V>) -> KvResult<()> {
        self.queues[shard]
            .send(command)
            .map_err(|_| KvError::ShardStopped { shard })
    }

    /// Wait for a worker reply.
    ///
    /// A command still queued when its worker stops keeps the reply sender
    /// alive, so the wait also ends when the store is shut down.
    fn await_reply<T>(&self, shard: usize, response: &Receiver<T>) -> KvResult<T> {
        match self.read_timeout {
            Some(timeout) => select! {
                recv(response) -> reply => reply.map_err(|_| KvError::ShardStopped { shard }),
                recv(self.stopped) -> _ => Err(KvError::ShardStopped { shard }),
                default(timeout) => Err(KvError::ReadTimeout { shard, timeout }),
            },
            None => select! {
                recv(response) -> reply => reply.map_err(|_| KvError::ShardStopped { shard }),
                recv(self.stopped) -> _ => Err(KvError::ShardStopped { shard }),
            },
        }
    }
}

impl<K, V> ShardedStore<K, V> {
    pub fn shard_count(&self) -> usize {
        self.queues.len()
    }

    /// Whether the workers have not been told to stop yet
    pub fn is_running(&self) -> bool {
        self.cancel.lock().is_some()
    }

    /// Stop every worker and wait for them to exit.
    ///
    /// Commands still queued are discarded. Afterwards every call returns
    /// [`KvError::ShardStopped`]. Calling this more than once is a no-op.
    pub fn shutdown(&self) {
        let Some(cancel) = self.cancel.lock().take() else {
            return;
        };

        info!("Shutting down {} shard workers", self.queues.len());
        let workers = std::mem::take(&mut *self.workers.lock());
        stop_workers(cancel, workers);
        info!("Sharded store stopped");
    }
}

/// Signal every worker to stop and wait for all of them to exit
fn stop_workers(cancel: Sender<()>, workers: Vec<JoinHandle<()>>) {
    drop(cancel);
    for handle in workers {
        if let Err(e) = handle.join() {
            error!("Shard worker panicked: {:?}", e);
        }
    }
}

impl<K, V> Drop for ShardedStore<K, V> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_basic_set_get() {
        let store = ShardedStore::new(4, 1_000).unwrap();
        store.set(1u64, "one".to_string()).unwrap();
        store.set(2u64, "two".to_string()).unwrap();

        assert_eq!(store.get(1).unwrap(), Some("one".to_string()));
        assert_eq!(store.get(2).unwrap(), Some("two".to_string()));
    }

    #[test]
    fn test_get_nonexistent() {
        let store: ShardedStore<u64, String> = ShardedStore::new(2, 1_000).unwrap();
        assert_eq!(store.get(99).unwrap(), None);
        assert_eq!(store.get_or_default(99).unwrap(), (false, String::new()));
    }

    #[test]
    fn test_last_write_wins() {
        let store = ShardedStore::new(3, 1_000).unwrap();
        store.set("key", 1).unwrap();
        store.set("key", 2).unwrap();

        assert_eq!(store.get_or_default("key").unwrap(), (true, 2));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_shard_routing_is_deterministic() {
        let store: ShardedStore<u64, ()> = ShardedStore::new(8, 1_000).unwrap();
        for key in 0..1_000 {
            let shard = store.shard_for(&key);
            assert!(shard < 8);
            assert_eq!(store.shard_for(&key), shard);
        }
    }

    #[test]
    fn test_stats_cover_every_shard() {
        let store = ShardedStore::new(4, 4_000).unwrap();
        for i in 0..400u64 {
            store.set(i, i).unwrap();
        }

        let stats = store.stats().unwrap();
        assert_eq!(stats.len(), 4);
        assert_eq!(stats.iter().map(|s| s.shard).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(stats.iter().map(|s| s.table.items).sum::<usize>(), 400);
        assert!(stats.iter().all(|s| s.table.segments > 0));
    }

    #[test]
    fn test_invalid_configuration() {
        let result = ShardedStore::<u64, u64>::new(0, 1_000);
        assert!(matches!(
            result,
            Err(KvError::InvalidConfiguration { field: "shard_count", .. })
        ));

        let result =
            ShardedStore::<u64, u64>::with_config(StoreConfig::new(2, 10).with_queue_capacity(0));
        assert!(matches!(
            result,
            Err(KvError::InvalidConfiguration { field: "queue_capacity", .. })
        ));
    }

    #[test]
    fn test_shutdown_stops_workers() {
        let store = ShardedStore::new(2, 100).unwrap();
        store.set(1u64, 1u64).unwrap();
        assert!(store.is_running());

        store.shutdown();
        assert!(!store.is_running());

        assert!(matches!(store.set(2, 2), Err(KvError::ShardStopped { .. })));
        assert!(matches!(store.get(1), Err(KvError::ShardStopped { .. })));

        // Second call is a no-op
        store.shutdown();
    }

    #[test]
    fn test_pending_reply_ends_on_shutdown() {
        let store: Arc<ShardedStore<u64, u64>> = Arc::new(ShardedStore::new(1, 100).unwrap());

        // Reply sender that is never used, like a Get stranded in the queue
        let (_reply, response) = bounded::<Option<u64>>(1);

        let stopper = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                store.shutdown();
            })
        };

        let result = store.await_reply(0, &response);
        assert!(matches!(result, Err(KvError::ShardStopped { shard: 0 })));
        stopper.join().unwrap();
    }

    #[test]
    fn test_shutdown_wins_over_read_timeout() {
        let config = StoreConfig::new(1, 100).with_read_timeout(Duration::from_secs(30));
        let store: Arc<ShardedStore<u64, u64>> = Arc::new(ShardedStore::with_config(config).unwrap());
        let (_reply, response) = bounded::<Option<u64>>(1);

        let stopper = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                store.shutdown();
            })
        };

        let result = store.await_reply(0, &response);
        assert!(matches!(result, Err(KvError::ShardStopped { shard: 0 })));
        stopper.join().unwrap();
    }

    #[test]
    fn test_read_timeout_is_reported() {
        let timeout = Duration::from_millis(100);
        let config = StoreConfig::new(2, 100).with_read_timeout(timeout);
        let store: ShardedStore<u64, u64> = ShardedStore::with_config(config).unwrap();

        // Nothing will ever answer on this channel
        let (_reply, response) = bounded::<Option<u64>>(1);
        let result = store.await_reply(1, &response);
        assert!(matches!(
            result,
            Err(KvError::ReadTimeout { shard: 1, timeout: t }) if t == timeout
        ));

        // Replies inside the deadline still arrive
        store.set(7, 70).unwrap();
        assert_eq!(store.get(7).unwrap(), Some(70));
    }

    #[test]
    fn test_stop_workers_joins_running_workers() {
        let (cancel_tx, cancel_rx) = bounded(0);
        let mut queues = Vec::new();
        let mut workers = Vec::new();
        for shard in 0..3 {
            let (sender, receiver) = bounded::<Command<u64, u64>>(4);
            let worker = ShardWorker::new(shard, 100, receiver, cancel_rx.clone());
            workers.push(worker.spawn().unwrap());
            queues.push(sender);
        }

        // Queues stay connected, so only the cancel signal can stop them
        stop_workers(cancel_tx, workers);

        for queue in &queues {
            assert!(queue.send(Command::Set { key: 1, value: 1 }).is_err());
        }
    }

    #[test]
    fn test_default_config_uses_cpus() {
        let config = StoreConfig::default();
        assert_eq!(config.shard_count, num_cpus::get());
        assert_eq!(config.queue_capacity, 100);
        assert!(config.read_timeout.is_none());
    }
}
