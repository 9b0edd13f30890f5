pub mod sem;
pub mod shared;

#[cfg(feature = "posix")]
pub mod named;

pub use sem::{Sem, TrySem};
pub use shared::SharedCounterSemaphore;
