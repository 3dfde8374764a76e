#[cfg(any(test, feature = "hosted"))]
mod hosted;
#[cfg(any(test, feature = "hosted"))]
pub use hosted::*;
