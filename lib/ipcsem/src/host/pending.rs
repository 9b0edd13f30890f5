use core::sync::atomic::{AtomicI32, Ordering};

use crate::error::Interrupted;

const NONE: i32 = -1;

/// A single pending interrupt slot, safe to raise from a signal handler.
pub struct PendingInterrupt {
    signal: AtomicI32,
}

/// Signals delivered to this process through [`super::signal::install`].
pub static SIGNALS: PendingInterrupt = PendingInterrupt::new();

impl PendingInterrupt {
    pub const fn new() -> Self {
        Self {
            signal: AtomicI32::new(NONE),
        }
    }

    /// Mark an interrupt as pending. A later raise overwrites an earlier one
    /// that has not been taken yet.
    pub fn raise(&self, signal: i32) {
        self.signal.store(signal, Ordering::Release);
    }

    pub fn take(&self) -> Option<i32> {
        if self.signal.load(Ordering::Relaxed) == NONE {
            return None;
        }
        match self.signal.swap(NONE, Ordering::Acquire) {
            NONE => None,
            sig => Some(sig),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.signal.load(Ordering::Relaxed) != NONE
    }

    pub fn check(&self) -> Result<(), Interrupted> {
        match self.take() {
            Some(signal) => Err(Interrupted { signal }),
            None => Ok(()),
        }
    }
}

impl Default for PendingInterrupt {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_clears() {
        let p = PendingInterrupt::new();
        assert!(!p.is_pending());
        p.raise(2);
        assert!(p.is_pending());
        assert_eq!(p.take(), Some(2));
        assert_eq!(p.take(), None);
    }

    #[test]
    fn check_reports_signal() {
        let p = PendingInterrupt::new();
        assert_eq!(p.check(), Ok(()));
        p.raise(0);
        assert_eq!(p.check(), Err(Interrupted { signal: 0 }));
        assert_eq!(p.check(), Ok(()));
    }
}
