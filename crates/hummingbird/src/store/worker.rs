//! Shard worker thread
//!
//! Each worker owns one `DashTable` for its whole life and drains a private
//! bounded queue in FIFO order, so commands for one shard apply in the order
//! they were sent. Workers stop on the store-wide cancellation signal and
//! drop whatever is still queued without applying it.

use crate::table::{DashTable, TableStats};
use crate::types::DashKey;
use crossbeam_channel::{select, Receiver, Sender};
use std::io;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

/// Command sent to a shard worker
pub(crate) enum Command<K, V> {
    /// Insert or overwrite, no reply
    Set { key: K, value: V },

    /// Read one key and reply on a single-use channel
    Get { key: K, reply: Sender<Option<V>> },

    /// Report table occupancy
    Stats { reply: Sender<TableStats> },
}

pub(crate) struct ShardWorker<K, V> {
    shard: usize,
    table: DashTable<K, V>,
    commands: Receiver<Command<K, V>>,
    /// Never carries a message; disconnects when the store shuts down
    cancel: Receiver<()>,
}

impl<K, V> ShardWorker<K, V>
where
    K: DashKey + Send + 'static,
    V: Clone + Send + 'static,
{
    pub(crate) fn new(
        shard: usize,
        max_item_hint: usize,
        commands: Receiver<Command<K, V>>,
        cancel: Receiver<()>,
    ) -> Self {
        Self {
            shard,
            table: DashTable::new(max_item_hint),
            commands,
            cancel,
        }
    }

    /// Move the worker onto its own named thread
    pub(crate) fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("hummingbird-shard-{}", self.shard))
            .spawn(move || self.run())
    }

    fn run(mut self) {
        debug!(
            "Shard {} worker started ({} segments)",
            self.shard,
            self.table.segment_count()
        );

        loop {
            let command = select! {
                recv(self.cancel) -> _ => {
                    // Dropped unapplied; pending readers see their reply
                    // channel disconnect
                    let discarded = self.commands.try_iter().count();
                    debug!(
                        "Shard {} received cancellation, discarded {} queued commands",
                        self.shard, discarded
                    );
                    break;
                },
                recv(self.commands) -> msg => match msg {
                    Ok(command) => command,
                    Err(_) => {
                        debug!("Shard {} command queue disconnected", self.shard);
                        break;
                    }
                },
            };

            self.handle(command);
        }

        debug!(
            "Shard {} worker stopped with {} keys",
            self.shard,
            self.table.len()
        );
    }

    fn handle(&mut self, command: Command<K, V>) {
        match command {
            Command::Set { key, value } => {
                if let Err(e) = self.table.set(key, value) {
                    // Dropping the write would lose data silently
                    error!("Shard {}: {}, aborting", self.shard, e);
                    std::process::abort();
                }
            }

            Command::Get { key, reply } => {
                // The caller may have given up waiting
                let _ = reply.send(self.table.get(&key).cloned());
            }

            Command::Stats { reply } => {
                let _ = reply.send(self.table.stats());
            }
        }
    }
}
