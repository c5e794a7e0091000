//! # LSM Tree
//!
//! The orchestration layer: a fixed-depth hierarchy of [`Level`]s fed by a
//! [`Buffer`], with `put`/`get`/`range`/`delete`/`load` as its public
//! surface. Writes are absorbed by the buffer and, on overflow, cascaded
//! down through the levels via [`LsmTree::merge_down`]; reads consult the
//! buffer first and then fan out across every run in parallel through a
//! [`Pool`] of worker threads, short-circuiting on the newest hit.
//!
//! ## Concurrency model
//!
//! The buffer and level hierarchy are mutated only on the calling thread;
//! `put`/`delete`/`load` take the relevant locks for the duration of the
//! mutation and never overlap with a concurrent search, since this crate's
//! API is synchronous (a `get`/`range` call only returns after its workers
//! have quiesced). Worker threads only ever call read-only [`Run`] methods
//! against `Arc`-shared runs snapshotted off the locked level state before
//! launch, so they never contend with the main thread's locks.
//!
//! ## Guarantees
//!
//! - **Newer-shadows-older:** runs are consulted buffer-first, then
//!   newest-to-oldest; the merge iterator's precedence ordering and the
//!   parallel search's min-index reconciliation both preserve this.
//! - **Tombstone masking:** a tombstone shadows older values the same way
//!   any other write does; it is only physically dropped once cascade merge
//!   pushes it into the deepest level.
//! - **No durability:** nothing here persists the level/run topology across
//!   process lifetimes; every run lives in a temp file removed on drop.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, error, trace};

use crate::buffer::Buffer;
use crate::config::LsmTreeConfig;
use crate::level::Level;
use crate::merge::MergeContext;
use crate::pool::{Pool, PoolError, Task};
use crate::run::{Run, RunError};
use crate::spinlock::Spinlock;
use crate::types::{Entry, Key, Value, ENTRY_SIZE, TOMBSTONE};

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("run error: {0}")]
    Run(#[from] RunError),

    #[error("worker pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no more space in tree")]
    CapacityExhausted,
}

/// An in-process LSM key-value store over fixed-width `i64` keys and values.
pub struct LsmTree {
    config: LsmTreeConfig,
    buffer: Mutex<Buffer>,
    levels: Mutex<Vec<Level>>,
    pool: Pool,
}

impl LsmTree {
    pub fn new(config: LsmTreeConfig) -> Self {
        let levels = (0..config.depth)
            .map(|i| {
                let max_run_size = config.buffer_max_entries * config.fanout.pow(i as u32);
                Level::new(config.fanout, max_run_size)
            })
            .collect();

        Self {
            buffer: Mutex::new(Buffer::new(config.buffer_max_entries)),
            levels: Mutex::new(levels),
            pool: Pool::new(config.thread_count),
            config,
        }
    }

    pub fn config(&self) -> &LsmTreeConfig {
        &self.config
    }

    /// Writes `(key, value)`. Flushes the buffer into a new level-0 run,
    /// cascading merges as needed to make room, when the buffer is full.
    pub fn put(&self, key: Key, value: Value) -> Result<(), TreeError> {
        {
            let mut buffer = self.buffer.lock().unwrap();
            if buffer.put(key, value) {
                return Ok(());
            }
        }

        let mut levels = self.levels.lock().unwrap();
        self.merge_down(&mut levels, 0)?;

        let mut buffer = self.buffer.lock().unwrap();
        debug!(entries = buffer.len(), "flushing buffer to level 0");

        let mut run = Run::new(levels[0].max_run_size, self.config.bf_bits_per_entry)?;
        run.map_write()?;
        for entry in buffer.range(Key::MIN, Key::MAX) {
            run.put(entry);
        }
        run.unmap();
        levels[0].runs.push_front(Arc::new(run));

        buffer.empty();
        assert!(
            buffer.put(key, value),
            "buffer must accept the triggering entry immediately after a flush"
        );
        Ok(())
    }

    /// `put(key, TOMBSTONE)`.
    pub fn delete(&self, key: Key) -> Result<(), TreeError> {
        self.put(key, TOMBSTONE)
    }

    /// Recursively frees a run slot at `levels[current]`, cascading into
    /// `current + 1` first if that level is itself full.
    fn merge_down(&self, levels: &mut [Level], current: usize) -> Result<(), TreeError> {
        if levels[current].remaining() > 0 {
            return Ok(());
        }
        if current == levels.len() - 1 {
            error!(level = current, "cascade merge: no more space in tree");
            return Err(TreeError::CapacityExhausted);
        }

        let next = current + 1;
        if levels[next].remaining() == 0 {
            self.merge_down(levels, next)?;
        }

        trace!(from = current, to = next, "cascade merge");

        let mut merger = MergeContext::new();
        for run in levels[current].runs.iter() {
            run.map_read()?;
            merger.add(run.mapped_entries());
            run.unmap();
        }

        let mut new_run = Run::new(levels[next].max_run_size, self.config.bf_bits_per_entry)?;
        new_run.map_write()?;

        let is_final_level = next == levels.len() - 1;
        let mut written = 0usize;
        while !merger.done() {
            let entry = merger.next().expect("done() false implies a next entry");
            if is_final_level && entry.value == TOMBSTONE {
                continue;
            }
            new_run.put(entry);
            written += 1;
        }
        new_run.unmap();

        debug!(
            from = current,
            to = next,
            merged_runs = levels[current].runs.len(),
            written,
            "cascade merge complete"
        );

        levels[next].runs.push_front(Arc::new(new_run));
        levels[current].runs.clear();
        Ok(())
    }

    /// Every run across every level, newest-first (level 0's head first,
    /// level 0's tail next, ..., down through the deepest level).
    fn snapshot_runs(&self) -> Vec<Arc<Run>> {
        let levels = self.levels.lock().unwrap();
        levels
            .iter()
            .flat_map(|level| level.runs.iter().cloned())
            .collect()
    }

    /// Point lookup: buffer first, then a parallel fan-out across every
    /// run, short-circuiting once the newest hit is known.
    pub fn get(&self, key: Key) -> Option<Value> {
        {
            let buffer = self.buffer.lock().unwrap();
            if let Some(value) = buffer.get(key) {
                return if value == TOMBSTONE { None } else { Some(value) };
            }
        }

        let runs: Arc<[Arc<Run>]> = self.snapshot_runs().into();
        if runs.is_empty() {
            return None;
        }

        let counter = Arc::new(AtomicUsize::new(0));
        let latest: Arc<Spinlock<(i64, Value)>> = Arc::new(Spinlock::new((-1, TOMBSTONE)));

        let task: Task = {
            let runs = Arc::clone(&runs);
            let counter = Arc::clone(&counter);
            let latest = Arc::clone(&latest);
            Arc::new(move || loop {
                if latest.lock().0 >= 0 {
                    return;
                }
                let current = counter.fetch_add(1, Ordering::Relaxed);
                let Some(run) = runs.get(current) else {
                    return;
                };
                match run.get(key) {
                    Ok(Some(value)) => {
                        let mut guard = latest.lock();
                        if guard.0 < 0 || (current as i64) < guard.0 {
                            *guard = (current as i64, value);
                        }
                        return;
                    }
                    Ok(None) => continue,
                    Err(err) => {
                        error!(%err, run_index = current, "fatal I/O error in search worker");
                        std::process::abort();
                    }
                }
            })
        };

        if self.pool.launch(task).is_err() {
            error!("search launched on a stopped worker pool");
            std::process::abort();
        }
        self.pool.wait_all();

        let (found_at, value) = *latest.lock();
        if found_at < 0 || value == TOMBSTONE {
            None
        } else {
            Some(value)
        }
    }

    /// Range lookup over `[start, end)`, merging the buffer and every run
    /// in parallel and collapsing to last-write-wins, tombstones dropped.
    pub fn range(&self, start: Key, end: Key) -> Vec<Entry> {
        if end <= start {
            return Vec::new();
        }
        let end_inclusive = end - 1;

        // Keyed by 0 = buffer, i+1 = the i-th run (newest-first), so
        // ascending iteration yields exactly the precedence order the
        // merge step requires.
        let ranges: Spinlock<std::collections::BTreeMap<usize, Vec<Entry>>> = {
            let buffer = self.buffer.lock().unwrap();
            let mut map = std::collections::BTreeMap::new();
            map.insert(0usize, buffer.range(start, end_inclusive));
            Spinlock::new(map)
        };
        let ranges = Arc::new(ranges);

        let runs: Arc<[Arc<Run>]> = self.snapshot_runs().into();
        if !runs.is_empty() {
            let counter = Arc::new(AtomicUsize::new(0));
            let task: Task = {
                let runs = Arc::clone(&runs);
                let counter = Arc::clone(&counter);
                let ranges = Arc::clone(&ranges);
                Arc::new(move || loop {
                    let current = counter.fetch_add(1, Ordering::Relaxed);
                    let Some(run) = runs.get(current) else {
                        return;
                    };
                    match run.range(start, end_inclusive) {
                        Ok(entries) => {
                            ranges.lock().insert(current + 1, entries);
                        }
                        Err(err) => {
                            error!(%err, run_index = current, "fatal I/O error in range worker");
                            std::process::abort();
                        }
                    }
                })
            };

            if self.pool.launch(task).is_err() {
                error!("range launched on a stopped worker pool");
                std::process::abort();
            }
            self.pool.wait_all();
        }

        let collected = {
            let mut guard = ranges.lock();
            std::mem::take(&mut *guard)
        };
        let mut merger = MergeContext::new();
        for (_, entries) in collected {
            merger.add(entries);
        }

        let mut out = Vec::new();
        while !merger.done() {
            let entry = merger.next().expect("done() false implies a next entry");
            if entry.value != TOMBSTONE {
                out.push(entry);
            }
        }
        out
    }

    /// Reads fixed-width `(key, value)` records sequentially from `path`
    /// and issues a `put` for each.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<(), TreeError> {
        let mut file = File::open(path)?;
        let mut buf = [0u8; ENTRY_SIZE];
        loop {
            match file.read_exact(&mut buf) {
                Ok(()) => {
                    let entry = Entry::decode(&buf);
                    self.put(entry.key, entry.value)?;
                }
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => break,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
