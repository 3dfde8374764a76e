//! Hardware abstraction: the devices and timer the block cache runs on.

pub mod clock;
pub mod hardware;
pub mod platform;
