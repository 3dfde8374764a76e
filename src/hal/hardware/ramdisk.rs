//! Ramdisk that keeps every written block in memory.

use super::Disk;
use crate::{
    fs::{Block, BlockNo, DeviceId, BSIZE},
    sync::spinmutex::SpinMutex,
};
use alloc::{boxed::Box, collections::BTreeMap};
use core::sync::atomic::{AtomicUsize, Ordering};

/// In-memory disk. Blocks that were never written read as zeroes.
pub struct Ramdisk {
    blocks: SpinMutex<BTreeMap<(DeviceId, BlockNo), Box<Block>>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}
impl Ramdisk {
    pub const fn new() -> Ramdisk {
        Ramdisk {
            blocks: SpinMutex::new(BTreeMap::new()),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }
    /// Number of completed block reads.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
    /// Number of completed block writes.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
    /// Store a block directly, bypassing the transfer counters.
    pub fn load(&self, dev: DeviceId, blockno: BlockNo, data: &Block) {
        self.blocks.lock().insert((dev, blockno), Box::new(*data));
    }
    /// Copy of the stored block, bypassing the transfer counters.
    pub fn peek(&self, dev: DeviceId, blockno: BlockNo) -> Block {
        self.blocks
            .lock()
            .get(&(dev, blockno))
            .map_or([0; BSIZE], |block| **block)
    }
}
impl Default for Ramdisk {
    fn default() -> Ramdisk {
        Ramdisk::new()
    }
}
impl Disk for Ramdisk {
    fn read(&self, dev: DeviceId, blockno: BlockNo, data: &mut Block) {
        match self.blocks.lock().get(&(dev, blockno)) {
            Some(block) => data.copy_from_slice(&block[..]),
            None => data.fill(0),
        }
        self.reads.fetch_add(1, Ordering::Relaxed);
    }
    fn write(&self, dev: DeviceId, blockno: BlockNo, data: &Block) {
        self.blocks.lock().insert((dev, blockno), Box::new(*data));
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_blocks_read_as_zeroes() {
        let disk = Ramdisk::new();
        let mut data = [0xffu8; BSIZE];
        disk.read(1, 7, &mut data);
        assert!(data.iter().all(|&b| b == 0));
        assert_eq!(disk.reads(), 1);
        assert_eq!(disk.writes(), 0);
    }

    #[test]
    fn blocks_are_keyed_by_device() {
        let disk = Ramdisk::new();
        disk.write(1, 3, &[1; BSIZE]);
        disk.write(2, 3, &[2; BSIZE]);
        disk.write(1, 3, &[3; BSIZE]);

        let mut data = [0u8; BSIZE];
        disk.read(1, 3, &mut data);
        assert_eq!(data, [3; BSIZE]);
        disk.read(2, 3, &mut data);
        assert_eq!(data, [2; BSIZE]);
        assert_eq!(disk.writes(), 3);
        assert_eq!(disk.reads(), 2);
    }

    #[test]
    fn load_and_peek_skip_the_counters() {
        let disk = Ramdisk::new();
        disk.load(1, 9, &[9; BSIZE]);
        assert_eq!(disk.peek(1, 9), [9; BSIZE]);
        assert_eq!(disk.peek(1, 10), [0; BSIZE]);
        assert_eq!((disk.reads(), disk.writes()), (0, 0));
    }
}
