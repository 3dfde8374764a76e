//! Running the block cache as an ordinary program, with OS threads
//! standing in for processes.

use crate::{
    hal::{clock::Ticks, hardware::ramdisk::Ramdisk},
    io::bio::BufferCache,
    proc::scheduler::{Channel, Pid, Scheduler},
};
use core::sync::atomic::{AtomicUsize, Ordering};

static NEXT_PID: AtomicUsize = AtomicUsize::new(1);

std::thread_local! {
    static PID: Pid = NEXT_PID.fetch_add(1, Ordering::Relaxed);
}

/// Scheduler backed by the host's threads.
///
/// Every thread gets its own pid the first time it asks for one.
/// Sleeping yields the thread, so `wakeup` has nothing to do.
#[derive(Copy, Clone, Debug, Default)]
pub struct ThreadScheduler;
impl Scheduler for ThreadScheduler {
    fn pid(&self) -> Pid {
        PID.with(|pid| *pid)
    }
    fn sleep(&self, _chan: Channel) {
        std::thread::yield_now();
    }
    fn wakeup(&self, _chan: Channel) {}
}

/// Block cache over a ramdisk, using host threads as processes.
pub type HostedBufferCache = BufferCache<Ramdisk, Ticks, ThreadScheduler>;

impl HostedBufferCache {
    pub fn hosted() -> HostedBufferCache {
        BufferCache::new(Ramdisk::new(), Ticks::new(), ThreadScheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn pids_are_per_thread() {
        let scheduler = ThreadScheduler;
        let mine = scheduler.pid();
        assert_ne!(mine, 0);
        assert_eq!(mine, scheduler.pid());

        let theirs = thread::spawn(|| ThreadScheduler.pid()).join().unwrap();
        assert_ne!(theirs, 0);
        assert_ne!(theirs, mine);
    }
}
