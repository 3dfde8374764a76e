//! Block buffer cache for an xv6-style kernel.
//!
//! A fixed pool of `NBUF` buffers caches disk blocks of `BSIZE` bytes.
//! The pool is sharded into `NBUCKET` buckets by block number so that
//! processes working on different blocks rarely contend; a bucket that
//! runs out of free buffers takes the least recently used free buffer
//! from another bucket.
//!
//! The cache runs on three pieces of the surrounding kernel: a [`Disk`]
//! driver, a [`Clock`] and the process [`Scheduler`]. With the `hosted`
//! feature, [`HostedBufferCache`] wires these to a ramdisk and the
//! host's threads.

#![cfg_attr(not(test), no_std)]

extern crate alloc;
#[cfg(all(feature = "hosted", not(test)))]
extern crate std;

pub mod fs;
pub mod hal;
pub mod io;
pub mod param;
pub mod proc;
pub mod sync;

pub use crate::{
    fs::{Block, BlockNo, DeviceId, BSIZE},
    hal::{
        clock::{Clock, Ticks},
        hardware::{ramdisk::Ramdisk, Disk},
    },
    io::{
        bio::{BioStats, BufferCache},
        buf::{Buf, Pin},
        error::BioError,
    },
    param::{NBUCKET, NBUF},
    proc::scheduler::{Pid, Scheduler},
};

#[cfg(any(test, feature = "hosted"))]
pub use crate::hal::platform::{HostedBufferCache, ThreadScheduler};
