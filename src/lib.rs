//! # lsmkv
//!
//! A single-node, in-process key-value store built as a **Log-Structured
//! Merge (LSM) tree** over fixed-width `i64` keys and values. Point writes,
//! point reads, range reads, and deletes (via tombstones) are supported;
//! writes are absorbed by an in-memory [`Buffer`](buffer::Buffer) and
//! asynchronously compacted into an on-disk hierarchy of immutable, sorted,
//! memory-mapped [`Run`](run::Run)s.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        LsmTree                           │
//! │  ┌────────────┐      ┌─────────────────────────────────┐ │
//! │  │   Buffer    │ put  │  Level 0   Level 1  ...  Level N │ │
//! │  │ (bounded,   │─────▶│  [Run Run] [Run Run]     [Run]   │ │
//! │  │  sorted)    │flush │   newest→oldest within each level │ │
//! │  └────────────┘      └─────────────────────────────────┘ │
//! │        get/range fan out across Buffer + every Run        │
//! │        in parallel via a fixed-size worker Pool,          │
//! │        merged by precedence (buffer, then newest→oldest)  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! On buffer overflow, [`LsmTree::put`] first calls `merge_down` to
//! guarantee level 0 has a free run slot — recursively cascading runs into
//! deeper levels as needed — then serializes the buffer into a new run at
//! the head of level 0. Tombstones are only physically dropped once a
//! cascade merge pushes them into the deepest level.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`tree`] | Orchestration: put/get/range/delete/load, flush, cascade merge, parallel search |
//! | [`buffer`] | Bounded in-memory sorted write buffer |
//! | [`run`] | Immutable, memory-mapped, fence-pointer- and Bloom-indexed on-disk run |
//! | [`level`] | Fixed-capacity collection of runs |
//! | [`merge`] | K-way merge iterator with key + recency ordering |
//! | [`bloom`] | Probabilistic membership filter |
//! | [`pool`] | Fixed-size worker pool for parallel search |
//! | [`spinlock`] | Minimal test-and-set lock for short critical sections |
//! | [`config`] | Tunables and their defaults |
//! | [`types`] | Shared `Entry`/`Key`/`Value` types and wire constants |
//!
//! ## Key properties
//!
//! - **Newer shadows older.** Within a level, runs are ordered newest-first;
//!   across levels, lower indices are newer. Reads always resolve to the
//!   most recently written value for a key.
//! - **Bloom-filtered, page-indexed lookups.** Each run carries a Bloom
//!   filter and fence pointers, so a point lookup costs at most one page of
//!   I/O on a hit and none on a filter miss.
//! - **Parallel, short-circuiting search.** `get` fans out across every run
//!   on a worker pool and stops issuing work once the newest hit is known,
//!   reconciling concurrent results to the lowest (newest) run index.
//! - **No durability.** Nothing here persists the level/run topology across
//!   process lifetimes; this is an in-process store, not a recoverable one.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use lsmkv::config::LsmTreeConfig;
//! use lsmkv::tree::LsmTree;
//!
//! let tree = LsmTree::new(LsmTreeConfig::default());
//!
//! tree.put(1, 100).unwrap();
//! tree.put(2, 200).unwrap();
//! assert_eq!(tree.get(2), Some(200));
//!
//! tree.delete(1).unwrap();
//! assert_eq!(tree.get(1), None);
//!
//! let entries = tree.range(0, 3);
//! assert_eq!(entries.len(), 1); // just key 2; key 1 is a tombstone
//! ```

#![allow(dead_code)]

pub mod bloom;
pub mod buffer;
pub mod config;
pub mod level;
pub mod merge;
pub mod pool;
pub mod run;
pub mod spinlock;
pub mod tree;
pub mod types;

pub use config::LsmTreeConfig;
pub use tree::{LsmTree, TreeError};
pub use types::{Entry, Key, TOMBSTONE, Value};
