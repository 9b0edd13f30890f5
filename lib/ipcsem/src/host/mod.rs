//! Cooperation with the runtime that embeds the semaphores.
//!
//! A host owns a global execution lock that must be dropped around any wait
//! that may last, and is the only party that knows whether an asynchronous
//! interrupt is pending. Both capabilities are injected through [`Host`].

mod pending;
pub use pending::{PendingInterrupt, SIGNALS};

#[cfg(feature = "posix")]
pub mod signal;

pub mod spin;
pub use spin::{SpinHost, SpinHostGuard};

use crate::error::Interrupted;

pub trait Host {
    type Saved;

    /// Drop the execution lock, which the caller holds.
    fn release_lock(&self) -> Self::Saved;
    fn restore_lock(&self, saved: Self::Saved);

    fn check_interrupt(&self) -> Result<(), Interrupted>;

    fn unlocked(&self) -> Unlocked<'_, Self>
    where
        Self: Sized,
    {
        Unlocked::new(self)
    }
}

impl<H: Host> Host for &H {
    type Saved = H::Saved;
    fn release_lock(&self) -> Self::Saved {
        (**self).release_lock()
    }
    fn restore_lock(&self, saved: Self::Saved) {
        (**self).restore_lock(saved)
    }
    fn check_interrupt(&self) -> Result<(), Interrupted> {
        (**self).check_interrupt()
    }
}

/// Keeps the host lock released until dropped.
#[must_use = "the host lock is restored as soon as the guard is dropped"]
pub struct Unlocked<'h, H: Host> {
    host: &'h H,
    saved: Option<H::Saved>,
}

impl<'h, H: Host> Unlocked<'h, H> {
    pub fn new(host: &'h H) -> Self {
        Self {
            host,
            saved: Some(host.release_lock()),
        }
    }

    /// Run `f` with the lock held. On error the lock stays held and the
    /// guard no longer restores it.
    pub fn relock_for<T, E>(&mut self, f: impl FnOnce(&H) -> Result<T, E>) -> Result<T, E> {
        if let Some(saved) = self.saved.take() {
            self.host.restore_lock(saved);
        }
        let res = f(self.host);
        if res.is_ok() {
            self.saved = Some(self.host.release_lock());
        }
        res
    }

    pub fn is_released(&self) -> bool {
        self.saved.is_some()
    }
}

impl<H: Host> Drop for Unlocked<'_, H> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.host.restore_lock(saved);
        }
    }
}

/// No execution lock and no interrupts.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHost;

impl Host for NoHost {
    type Saved = ();
    fn release_lock(&self) -> Self::Saved {
        // Nothing
    }
    fn restore_lock(&self, _saved: Self::Saved) {
        // Nothing
    }
    fn check_interrupt(&self) -> Result<(), Interrupted> {
        Ok(())
    }
}

/// No execution lock; interrupts are the process signals recorded in
/// [`SIGNALS`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SignalHost;

impl Host for SignalHost {
    type Saved = ();
    fn release_lock(&self) -> Self::Saved {
        // Nothing
    }
    fn restore_lock(&self, _saved: Self::Saved) {
        // Nothing
    }
    fn check_interrupt(&self) -> Result<(), Interrupted> {
        SIGNALS.check()
    }
}
