//! Block addressing shared with the file system layer.

/// Block size.
pub const BSIZE: usize = 1024;

/// Device number of a block device.
pub type DeviceId = u32;
/// Block number within a device.
pub type BlockNo = u32;

/// Contents of one disk block.
pub type Block = [u8; BSIZE];

const _: () = assert!(BSIZE > 0);
