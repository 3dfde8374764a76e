/// Process identifier. Zero never names a process.
pub type Pid = usize;

/// Sleep channel: an address-sized token that `wakeup` matches against.
pub type Channel = usize;

/// The parts of the process scheduler that sleep-locks build on.
pub trait Scheduler: Sync {
    /// The current process. Must not be zero.
    fn pid(&self) -> Pid;
    /// Give up the CPU until `wakeup(chan)` is called somewhere else.
    ///
    /// May return spuriously; callers re-check their condition.
    fn sleep(&self, chan: Channel);
    /// Wake up all processes sleeping on `chan`.
    fn wakeup(&self, chan: Channel);
}

impl<S: Scheduler + ?Sized> Scheduler for &S {
    fn pid(&self) -> Pid {
        (**self).pid()
    }
    fn sleep(&self, chan: Channel) {
        (**self).sleep(chan)
    }
    fn wakeup(&self, chan: Channel) {
        (**self).wakeup(chan)
    }
}
