use crate::fs::{BlockNo, DeviceId};
use thiserror::Error;

/// Fatal block cache conditions. Both are bugs in the calling layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum BioError {
    /// Every buffer in the pool is held or pinned.
    #[error("bget: no buffers (dev {dev}, block {blockno})")]
    ResourceExhausted { dev: DeviceId, blockno: BlockNo },
    /// `op` was called without holding the buffer's content lock.
    #[error("{op}: buffer not locked by caller")]
    LockMisuse { op: &'static str },
}
