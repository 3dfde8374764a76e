use crate::sync::spinmutex::SpinMutex;

/// Source of clock ticks.
///
/// The count never decreases. It carries no wall-clock meaning.
pub trait Clock: Sync {
    fn ticks(&self) -> usize;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn ticks(&self) -> usize {
        (**self).ticks()
    }
}

/// Tick counter advanced by the timer interrupt.
pub struct Ticks {
    ticks: SpinMutex<usize>,
}
impl Ticks {
    pub const fn new() -> Ticks {
        Ticks {
            ticks: SpinMutex::new(0),
        }
    }
    /// Timer interrupt: advance the clock by one tick.
    pub fn clockintr(&self) {
        *self.ticks.lock() += 1;
    }
}
impl Default for Ticks {
    fn default() -> Ticks {
        Ticks::new()
    }
}
impl Clock for Ticks {
    fn ticks(&self) -> usize {
        *self.ticks.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clockintr_advances_ticks() {
        let clock = Ticks::new();
        assert_eq!(clock.ticks(), 0);
        clock.clockintr();
        clock.clockintr();
        assert_eq!(clock.ticks(), 2);
        assert_eq!((&clock).ticks(), 2);
    }
}
