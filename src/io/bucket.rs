//! One shard of the block cache.
//!
//! A bucket owns the entries of the buffers currently hashed to it. An
//! entry carries the buffer's index in the pool, the block it is bound
//! to and its reference count, so everything the bucket lock protects
//! lives inside the bucket. Moving a buffer between buckets is moving
//! its entry.

use crate::{
    fs::{BlockNo, DeviceId},
    param::{NBUCKET, NBUF},
};
use arrayvec::ArrayVec;

/// Bucket that block `blockno` hashes to.
pub const fn bucket_of(blockno: BlockNo) -> usize {
    blockno as usize % NBUCKET
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// Index of the buffer in the pool.
    pub id: usize,
    /// Block the buffer is bound to, if any.
    pub key: Option<(DeviceId, BlockNo)>,
    /// Holders and pins. Zero means the buffer may be recycled.
    pub refcnt: u32,
}
impl Entry {
    pub const fn new(id: usize) -> Entry {
        Entry {
            id,
            key: None,
            refcnt: 0,
        }
    }
    pub fn is_free(&self) -> bool {
        self.refcnt == 0
    }
    pub fn holds(&self, dev: DeviceId, blockno: BlockNo) -> bool {
        self.key == Some((dev, blockno))
    }
    /// Claim the entry for a new block with one holder.
    pub fn bind(&mut self, dev: DeviceId, blockno: BlockNo) {
        debug_assert!(self.is_free());
        self.key = Some((dev, blockno));
        self.refcnt = 1;
    }
    pub fn unbind(&mut self) {
        debug_assert!(self.is_free());
        self.key = None;
    }
}

#[derive(Clone, Debug, Default)]
pub struct Bucket {
    entries: ArrayVec<Entry, NBUF>,
}
impl Bucket {
    pub const fn new() -> Bucket {
        Bucket {
            entries: ArrayVec::new_const(),
        }
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn contains(&self, id: usize) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }
    /// Append an entry. The pool has room for every buffer in one bucket.
    pub fn insert(&mut self, entry: Entry) {
        debug_assert!(!self.contains(entry.id));
        self.entries.push(entry);
    }
    pub fn get_mut(&mut self, id: usize) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|entry| entry.id == id)
    }
    pub fn find(&self, dev: DeviceId, blockno: BlockNo) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.holds(dev, blockno))
    }
    pub fn lookup(&mut self, dev: DeviceId, blockno: BlockNo) -> Option<&mut Entry> {
        self.entries
            .iter_mut()
            .find(|entry| entry.holds(dev, blockno))
    }
    /// First entry nobody holds.
    pub fn find_free(&mut self) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|entry| entry.is_free())
    }
    /// The free entry with the smallest tick, with the tick itself.
    /// Ties go to the earliest entry.
    pub fn lru_free<F>(&self, tick: F) -> Option<(usize, usize)>
    where
        F: Fn(usize) -> usize,
    {
        let mut best: Option<(usize, usize)> = None;
        for entry in self.entries.iter().filter(|entry| entry.is_free()) {
            let t = tick(entry.id);
            if best.map_or(true, |(_, oldest)| t < oldest) {
                best = Some((entry.id, t));
            }
        }
        best
    }
    /// Unlink buffer `id` if it is still here and still free.
    pub fn take_free(&mut self, id: usize) -> Option<Entry> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.id == id && entry.is_free())?;
        Some(self.entries.remove(index))
    }
}
