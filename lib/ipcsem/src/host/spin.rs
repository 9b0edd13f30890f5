use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

use super::{Host, PendingInterrupt};
use crate::error::Interrupted;

/// A host whose execution lock is a spinlock, with its own interrupt slot.
///
/// Mostly useful to drive the semaphores the way an interpreter would, with
/// one thread at a time inside the "runtime".
pub struct SpinHost {
    lock: AtomicBool,
    interrupt: PendingInterrupt,
}

impl SpinHost {
    pub const fn new() -> Self {
        Self {
            lock: AtomicBool::new(false),
            interrupt: PendingInterrupt::new(),
        }
    }

    pub fn try_lock(&self) -> bool {
        self.lock
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    pub fn lock(&self) {
        loop {
            if self.try_lock() {
                return;
            }
            spin_loop();
        }
    }

    /// # Safety
    /// The caller must hold the lock.
    pub unsafe fn unlock(&self) {
        self.lock.store(false, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.lock.load(Ordering::Relaxed)
    }

    pub fn enter(&self) -> SpinHostGuard<'_> {
        self.lock();
        SpinHostGuard { host: self }
    }

    pub fn try_enter(&self) -> Option<SpinHostGuard<'_>> {
        self.try_lock().then(|| SpinHostGuard { host: self })
    }

    pub fn interrupt(&self, signal: i32) {
        self.interrupt.raise(signal)
    }

    pub fn pending(&self) -> &PendingInterrupt {
        &self.interrupt
    }
}

impl Default for SpinHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for SpinHost {
    type Saved = ();
    fn release_lock(&self) -> Self::Saved {
        debug_assert!(self.is_locked());
        unsafe { self.unlock() }
    }
    fn restore_lock(&self, _saved: Self::Saved) {
        self.lock()
    }
    fn check_interrupt(&self) -> Result<(), Interrupted> {
        self.interrupt.check()
    }
}

pub struct SpinHostGuard<'h> {
    host: &'h SpinHost,
}

impl<'h> SpinHostGuard<'h> {
    pub fn host(&self) -> &'h SpinHost {
        self.host
    }
}

impl Drop for SpinHostGuard<'_> {
    fn drop(&mut self) {
        unsafe { self.host.unlock() }
    }
}
