//! Device drivers and hardware implementations.

use crate::fs::{Block, BlockNo, DeviceId};

pub mod ramdisk;

/// Synchronous block device driver.
///
/// Both calls return only once the transfer is complete. A driver
/// that cannot complete a transfer faults the caller.
pub trait Disk: Sync {
    fn read(&self, dev: DeviceId, blockno: BlockNo, data: &mut Block);
    fn write(&self, dev: DeviceId, blockno: BlockNo, data: &Block);
}

impl<D: Disk + ?Sized> Disk for &D {
    fn read(&self, dev: DeviceId, blockno: BlockNo, data: &mut Block) {
        (**self).read(dev, blockno, data)
    }
    fn write(&self, dev: DeviceId, blockno: BlockNo, data: &Block) {
        (**self).write(dev, blockno, data)
    }
}
