#![no_std]

//! Semaphores for coordinating threads and processes from inside a host
//! runtime that owns a global execution lock.
//!
//! [`SharedCounterSemaphore`] spins on an atomic word living in memory the
//! caller provides (typically a [`shm::SharedMemory`] mapping).
//! [`NamedKernelSemaphore`] wraps a POSIX named semaphore.

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod log;

pub mod error;
pub use error::{BindingError, Error, Interrupted, Result};

pub mod host;
pub use host::{Host, NoHost, SignalHost, SpinHost};

pub mod sync;
pub use sync::{Sem, SharedCounterSemaphore, TrySem};

#[cfg(feature = "posix")]
pub use sync::named::{NamedKernelSemaphore, OpenFlags, O_CREAT, O_EXCL};

#[cfg(feature = "posix")]
pub mod shm;

#[cfg(test)]
extern crate std;
