use super::bio::BufferCache;
use crate::{
    fs::{Block, BlockNo, DeviceId, BSIZE},
    hal::{clock::Clock, hardware::Disk},
    proc::scheduler::Scheduler,
    sync::sleeplock::Sleeplock,
};
use core::{
    fmt,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// One slot of the block cache.
pub struct Buffer {
    /// Has data been read from disk?
    valid: AtomicBool,
    /// Tick of the last read or write of this buffer.
    last_access: AtomicUsize,
    pub(crate) lock: Sleeplock<Block>,
}
impl Buffer {
    pub const fn new() -> Buffer {
        Buffer {
            valid: AtomicBool::new(false),
            last_access: AtomicUsize::new(0),
            lock: Sleeplock::new([0; BSIZE]),
        }
    }
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }
    pub(crate) fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::Release);
    }
    pub fn last_access(&self) -> usize {
        self.last_access.load(Ordering::Relaxed)
    }
    pub(crate) fn touch(&self, tick: usize) {
        self.last_access.store(tick, Ordering::Relaxed);
    }
}
impl Default for Buffer {
    fn default() -> Buffer {
        Buffer::new()
    }
}

/// A locked buffer holding one block.
///
/// The content lock belongs to the process that took it; passing a
/// `Buf` to another process and writing or releasing it there is a
/// lock misuse. Dropping a `Buf` releases it.
#[must_use = "dropping a Buf releases it"]
pub struct Buf<'c, D: Disk, C: Clock, S: Scheduler> {
    pub(crate) cache: &'c BufferCache<D, C, S>,
    pub(crate) id: usize,
    pub(crate) dev: DeviceId,
    pub(crate) blockno: BlockNo,
}
impl<'c, D: Disk, C: Clock, S: Scheduler> Buf<'c, D, C, S> {
    /// Index of the underlying buffer in the pool.
    pub fn id(&self) -> usize {
        self.id
    }
    pub fn dev(&self) -> DeviceId {
        self.dev
    }
    pub fn blockno(&self) -> BlockNo {
        self.blockno
    }
    /// Whether the data reflects the block on disk.
    pub fn is_valid(&self) -> bool {
        self.buffer().is_valid()
    }
    pub fn last_access(&self) -> usize {
        self.buffer().last_access()
    }
    pub(crate) fn buffer(&self) -> &'c Buffer {
        self.cache.buffer(self.id)
    }
}
/// A pin on a cached block, taken with `BufferCache::pin`.
///
/// The block stays bound to its buffer until the pin is handed back to
/// `BufferCache::unpin`. Holding a pin gives no access to the data.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pin keeps its buffer out of reuse until unpinned"]
pub struct Pin {
    pub(crate) id: usize,
    pub(crate) dev: DeviceId,
    pub(crate) blockno: BlockNo,
}
impl Pin {
    pub fn id(&self) -> usize {
        self.id
    }
    pub fn dev(&self) -> DeviceId {
        self.dev
    }
    pub fn blockno(&self) -> BlockNo {
        self.blockno
    }
}

impl<D: Disk, C: Clock, S: Scheduler> Deref for Buf<'_, D, C, S> {
    type Target = Block;

    fn deref(&self) -> &Block {
        // The content lock is held for as long as the Buf exists.
        unsafe { &*self.buffer().lock.as_ptr() }
    }
}
impl<D: Disk, C: Clock, S: Scheduler> DerefMut for Buf<'_, D, C, S> {
    fn deref_mut(&mut self) -> &mut Block {
        unsafe { &mut *self.buffer().lock.as_ptr() }
    }
}
impl<D: Disk, C: Clock, S: Scheduler> Drop for Buf<'_, D, C, S> {
    fn drop(&mut self) {
        self.cache.release(self);
    }
}
impl<D: Disk, C: Clock, S: Scheduler> fmt::Debug for Buf<'_, D, C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buf")
            .field("id", &self.id)
            .field("dev", &self.dev)
            .field("blockno", &self.blockno)
            .field("valid", &self.is_valid())
            .finish()
    }
}
