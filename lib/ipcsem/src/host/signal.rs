use core::mem::zeroed;
use core::ptr::null_mut;

use errno::Errno;

use super::SIGNALS;
use crate::error::last_errno;
use crate::log::{debug, error};

extern "C" fn on_signal(signal: libc::c_int) {
    SIGNALS.raise(signal);
}

/// Route `signal` into [`SIGNALS`], so that a [`super::SignalHost`] waiter
/// gets interrupted by it.
pub fn install(signal: i32) -> Result<(), Errno> {
    unsafe {
        let mut action: libc::sigaction = zeroed();
        action.sa_sigaction = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(signal, &action, null_mut()) != 0 {
            let e = last_errno();
            error!("sigaction({}) failed: {}", signal, e);
            return Err(e);
        }
    }
    debug!("routing signal {} to pending interrupts", signal);
    Ok(())
}

/// Give `signal` back its default disposition.
pub fn uninstall(signal: i32) -> Result<(), Errno> {
    unsafe {
        if libc::signal(signal, libc::SIG_DFL) == libc::SIG_ERR {
            return Err(last_errno());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Interrupted};
    use crate::host::SignalHost;
    use crate::sync::SharedCounterSemaphore;

    use core::sync::atomic::{AtomicBool, AtomicIsize, Ordering};
    use std::thread;
    use std::time::Duration;

    // SIGNALS is process wide, so everything touching it runs in one test.
    #[test]
    fn signal_interrupts_starved_acquire() {
        install(libc::SIGUSR2).unwrap();
        unsafe { libc::raise(libc::SIGUSR2) };
        assert_eq!(SIGNALS.take(), Some(libc::SIGUSR2));

        let counter = AtomicIsize::new(0);
        let sem = SharedCounterSemaphore::from_atomic_with_host(&counter, true, SignalHost);
        let waiting = AtomicBool::new(false);
        let res = thread::scope(|s| {
            let waiter = s.spawn(|| {
                waiting.store(true, Ordering::SeqCst);
                sem.acquire()
            });
            while !waiting.load(Ordering::SeqCst) {
                thread::yield_now();
            }
            thread::sleep(Duration::from_millis(20));
            unsafe { libc::raise(libc::SIGUSR2) };
            waiter.join().unwrap()
        });
        assert_eq!(
            res,
            Err(Error::Interrupted(Interrupted {
                signal: libc::SIGUSR2
            }))
        );
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!SIGNALS.is_pending());
        uninstall(libc::SIGUSR2).unwrap();
    }

    #[test]
    fn bad_signal_is_rejected() {
        assert_eq!(install(-1), Err(Errno(libc::EINVAL)));
    }
}
