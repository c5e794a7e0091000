//! An immutable, key-sorted, memory-mapped run of entries backed by a temp
//! file, indexed by a fence-pointer block list and a [`BloomFilter`].
//!
//! A run goes through two disjoint phases. During *construction* (flush or
//! cascade merge output) the caller holds a uniquely-owned `Run` and drives
//! it through `map_write` → repeated `put` → `unmap`, after which it is
//! wrapped in an `Arc` and becomes part of a [`Level`](crate::level::Level).
//! Once shared, `get`/`range` are the only operations exercised, and they
//! never touch the run's bulk mapping slot — each opens its own short-lived,
//! page-local read mapping, so arbitrarily many calls (including concurrent
//! ones from different worker threads) can run against the same shared run
//! at once. The bulk mapping slot is still needed for `merge_down`, which
//! must read a full existing run's entries; that path takes its mapping
//! through a mutex since the run is already shared behind an `Arc` by then.


use std::fs::{File, OpenOptions};
use std::sync::Mutex;

use memmap2::{Mmap, MmapMut, MmapOptions};
use tempfile::{Builder as TempFileBuilder, TempPath};
use thiserror::Error;

use crate::bloom::BloomFilter;
use crate::types::{Entry, Key, Value, ENTRIES_PER_PAGE, ENTRY_SIZE, PAGE_SIZE};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

enum Mapping {
    None,
    Read(Mmap),
    Write(MmapMut),
}

pub struct Run {
    pub max_size: usize,
    size: usize,
    fence_pointers: Vec<Key>,
    max_key: Key,
    bloom: BloomFilter,
    temp_path: TempPath,
    mapping: Mutex<Mapping>,
}

impl Run {
    pub fn new(max_size: usize, bits_per_entry: f64) -> Result<Self, RunError> {
        let file = TempFileBuilder::new()
            .prefix("lsmkv-")
            .rand_bytes(6)
            .tempfile()?;
        let temp_path = file.into_temp_path();
        Ok(Self {
            max_size,
            size: 0,
            fence_pointers: Vec::with_capacity(max_size.div_ceil(ENTRIES_PER_PAGE).max(1)),
            max_key: Key::MIN,
            bloom: BloomFilter::new(max_size, bits_per_entry),
            temp_path,
            mapping: Mutex::new(Mapping::None),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Opens a full-extent read mapping. Requires no mapping currently held.
    pub fn map_read(&self) -> Result<(), RunError> {
        let mut guard = self.mapping.lock().unwrap();
        assert!(matches!(*guard, Mapping::None), "run already mapped");
        let file = File::open(&self.temp_path)?;
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        *guard = Mapping::Read(mmap);
        Ok(())
    }

    /// Opens a write mapping, truncating/extending the backing file to
    /// `max_size * sizeof(entry)` bytes. Requires no mapping currently held.
    pub fn map_write(&mut self) -> Result<(), RunError> {
        let guard = self.mapping.get_mut().unwrap();
        assert!(matches!(*guard, Mapping::None), "run already mapped");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.temp_path)?;
        file.set_len((self.max_size * ENTRY_SIZE) as u64)?;
        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        *guard = Mapping::Write(mmap);
        Ok(())
    }

    /// Releases the current bulk mapping. Requires a mapping to be held.
    pub fn unmap(&self) {
        let mut guard = self.mapping.lock().unwrap();
        assert!(!matches!(*guard, Mapping::None), "run has no mapping");
        *guard = Mapping::None;
    }

    /// Appends `entry` at the next slot. Requires a live write mapping,
    /// `size() < max_size`, and a key strictly greater than every key
    /// written so far.
    pub fn put(&mut self, entry: Entry) {
        assert!(self.size < self.max_size, "run is full");
        assert!(
            self.size == 0 || entry.key > self.max_key,
            "run put requires ascending keys"
        );

        self.bloom.set(entry.key);
        if self.size % ENTRIES_PER_PAGE == 0 {
            self.fence_pointers.push(entry.key);
        }
        self.max_key = entry.key;

        let offset = self.size * ENTRY_SIZE;
        let guard = self.mapping.get_mut().unwrap();
        let Mapping::Write(mmap) = guard else {
            panic!("run put requires a live write mapping");
        };
        mmap[offset..offset + ENTRY_SIZE].copy_from_slice(&entry.encode());
        self.size += 1;
    }

    /// Decodes every populated entry out of the currently held full-extent
    /// read mapping, in key order. Requires `map_read` to have been called.
    pub fn mapped_entries(&self) -> Vec<Entry> {
        let guard = self.mapping.lock().unwrap();
        let Mapping::Read(mmap) = &*guard else {
            panic!("run has no read mapping");
        };
        (0..self.size)
            .map(|i| {
                let off = i * ENTRY_SIZE;
                Entry::decode(&mmap[off..off + ENTRY_SIZE])
            })
            .collect()
    }

    fn page_index_for(&self, key: Key) -> usize {
        self.fence_pointers.partition_point(|&fp| fp <= key) - 1
    }

    /// Point lookup. Bloom-filtered and fence-pointer-indexed: at most one
    /// page of I/O on a hit, none on a filter miss.
    pub fn get(&self, key: Key) -> Result<Option<Value>, RunError> {
        if self.size == 0
            || key < self.fence_pointers[0]
            || key > self.max_key
            || !self.bloom.is_set(key)
        {
            return Ok(None);
        }

        let page_index = self.page_index_for(key);
        let page_entry_start = page_index * ENTRIES_PER_PAGE;
        let entries_in_page = ENTRIES_PER_PAGE.min(self.size - page_entry_start);
        let byte_start = page_entry_start * ENTRY_SIZE;
        let byte_len = entries_in_page * ENTRY_SIZE;

        let file = File::open(&self.temp_path)?;
        let mmap = unsafe {
            MmapOptions::new()
                .offset(byte_start as u64)
                .len(byte_len)
                .map(&file)?
        };

        for i in 0..entries_in_page {
            let off = i * ENTRY_SIZE;
            let entry = Entry::decode(&mmap[off..off + ENTRY_SIZE]);
            if entry.key == key {
                return Ok(Some(entry.value));
            }
        }
        Ok(None)
    }

    /// Range scan over `[start, end]` (inclusive), touching only the
    /// contiguous page span that can overlap the request.
    pub fn range(&self, start: Key, end: Key) -> Result<Vec<Entry>, RunError> {
        if self.size == 0 || start > self.max_key || self.fence_pointers[0] > end {
            return Ok(Vec::new());
        }

        let occupied_pages = self.size.div_ceil(ENTRIES_PER_PAGE);

        let start_page = if start < self.fence_pointers[0] {
            0
        } else {
            self.page_index_for(start)
        };
        let end_page = if end > self.max_key {
            occupied_pages
        } else {
            self.fence_pointers
                .partition_point(|&fp| fp <= end)
                .min(occupied_pages)
        };

        if start_page >= end_page {
            return Ok(Vec::new());
        }

        let first_entry = start_page * ENTRIES_PER_PAGE;
        let last_entry = (end_page * ENTRIES_PER_PAGE).min(self.size);
        let num_entries = last_entry - first_entry;

        let file = File::open(&self.temp_path)?;
        let mmap = unsafe {
            MmapOptions::new()
                .offset((first_entry * ENTRY_SIZE) as u64)
                .len(num_entries * ENTRY_SIZE)
                .map(&file)?
        };

        let mut out = Vec::new();
        for i in 0..num_entries {
            let off = i * ENTRY_SIZE;
            let entry = Entry::decode(&mmap[off..off + ENTRY_SIZE]);
            if entry.key >= start && entry.key <= end {
                out.push(entry);
            }
        }
        Ok(out)
    }
}

impl Drop for Run {
    fn drop(&mut self) {
        let guard = self.mapping.get_mut().unwrap();
        assert!(
            matches!(*guard, Mapping::None),
            "run dropped while still mapped"
        );
    }
}
