use crate::proc::scheduler::{Pid, Scheduler};
use core::{
    cell::UnsafeCell,
    ptr::addr_of,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

/// Long-term lock for processes.
///
/// Waiters give up the CPU through the scheduler instead of spinning,
/// so the holder may block on disk I/O. The lock remembers which
/// process holds it.
pub struct Sleeplock<T> {
    locked: AtomicBool,
    /// Process holding the lock, or zero.
    pid: AtomicUsize,
    inner: UnsafeCell<T>,
}
impl<T> Sleeplock<T> {
    pub const fn new(value: T) -> Sleeplock<T> {
        Sleeplock {
            locked: AtomicBool::new(false),
            pid: AtomicUsize::new(0),
            inner: UnsafeCell::new(value),
        }
    }
    fn chan(&self) -> usize {
        addr_of!(*self) as usize
    }
    /// Acquire the lock without a guard, sleeping until it is free.
    pub fn lock_unguarded<S: Scheduler>(&self, scheduler: &S) {
        while self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // Put the process to sleep until it gets released.
            scheduler.sleep(self.chan());
        }
        self.pid.store(scheduler.pid(), Ordering::Relaxed);
    }
    /// Release a lock taken with `lock_unguarded`.
    ///
    /// # Safety
    ///
    /// The caller must hold the lock and must not touch the
    /// protected value afterwards.
    pub unsafe fn unlock<S: Scheduler>(&self, scheduler: &S) {
        self.pid.store(0, Ordering::Relaxed);
        self.locked.store(false, Ordering::Release);
        scheduler.wakeup(self.chan());
    }
    /// Whether the current process holds the lock.
    pub fn holding<S: Scheduler>(&self, scheduler: &S) -> bool {
        self.locked.load(Ordering::Acquire) && self.holder() == scheduler.pid()
    }
    pub fn holder(&self) -> Pid {
        self.pid.load(Ordering::Relaxed)
    }
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
    /// Raw access to the protected value. Only dereference it while
    /// holding the lock.
    pub fn as_ptr(&self) -> *mut T {
        self.inner.get()
    }
}
unsafe impl<T> Sync for Sleeplock<T> where T: Send {}
