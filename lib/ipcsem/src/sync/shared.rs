//! Busy-wait semaphore over a counter in caller-provided memory.
//!
//! The counter is a single native-endian `isize` that any number of threads
//! and processes may map at once. Acquiring never enters the kernel: it
//! spins on the word and asks the [`Host`] for pending interrupts whenever
//! no permit is left.

use core::fmt;
use core::hint::spin_loop;
use core::mem::{align_of, size_of};
use core::sync::atomic::{AtomicIsize, Ordering};

use static_assertions::const_assert_eq;

use super::sem::{Sem, TrySem};
use crate::error::{BindingError, Error, Result};
use crate::host::{Host, NoHost};
use crate::log::debug;

pub type Word = isize;

/// Bytes a buffer must provide to back a [`SharedCounterSemaphore`].
pub const REQUIRED_MEMORY_SIZE: usize = size_of::<AtomicIsize>();
pub const REQUIRED_ALIGNMENT: usize = align_of::<AtomicIsize>();

const_assert_eq!(REQUIRED_MEMORY_SIZE, size_of::<Word>());

pub struct SharedCounterSemaphore<'a, H: Host = NoHost> {
    counter: Option<&'a AtomicIsize>,
    host: H,
}

impl<'a> SharedCounterSemaphore<'a, NoHost> {
    pub fn bind(buffer: &'a mut [u8], reset_to_zero: bool) -> Result<Self> {
        Self::bind_with_host(buffer, reset_to_zero, NoHost)
    }

    pub fn from_atomic(counter: &'a AtomicIsize, reset_to_zero: bool) -> Self {
        Self::from_atomic_with_host(counter, reset_to_zero, NoHost)
    }

    /// # Safety
    /// `ptr` must stay valid for `'a` and never be written non-atomically
    /// while the semaphore is bound.
    pub unsafe fn bind_raw(ptr: *mut u8, len: usize, reset_to_zero: bool) -> Result<Self> {
        Self::bind_raw_with_host(ptr, len, reset_to_zero, NoHost)
    }

    pub const fn required_memory_size() -> usize {
        REQUIRED_MEMORY_SIZE
    }
}

impl<'a, H: Host> SharedCounterSemaphore<'a, H> {
    pub fn bind_with_host(buffer: &'a mut [u8], reset_to_zero: bool, host: H) -> Result<Self> {
        unsafe { Self::bind_raw_with_host(buffer.as_mut_ptr(), buffer.len(), reset_to_zero, host) }
    }

    pub fn from_atomic_with_host(counter: &'a AtomicIsize, reset_to_zero: bool, host: H) -> Self {
        if reset_to_zero {
            counter.store(0, Ordering::Release);
        }
        debug!(
            "bound shared semaphore at {:p} (reset: {})",
            counter, reset_to_zero
        );
        Self {
            counter: Some(counter),
            host,
        }
    }

    /// # Safety
    /// See [`SharedCounterSemaphore::bind_raw`].
    pub unsafe fn bind_raw_with_host(
        ptr: *mut u8,
        len: usize,
        reset_to_zero: bool,
        host: H,
    ) -> Result<Self> {
        let counter = check_buffer(ptr, len)?;
        Ok(Self::from_atomic_with_host(&*counter, reset_to_zero, host))
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    fn counter(&self) -> Result<&'a AtomicIsize> {
        self.counter.ok_or(Error::Closed)
    }

    /// Spin until a permit is taken, keeping the host lock.
    pub fn acquire(&self) -> Result<()> {
        let counter = self.counter()?;
        let mut v = counter.load(Ordering::Relaxed);
        loop {
            if v > 0 {
                match counter.compare_exchange_weak(v, v - 1, Ordering::Acquire, Ordering::Relaxed)
                {
                    Ok(_) => return Ok(()),
                    // Contended: another acquirer or releaser moved the word.
                    Err(cur) => v = cur,
                }
            } else {
                if let Err(e) = self.host.check_interrupt() {
                    debug!("shared semaphore wait {}", e);
                    return Err(e.into());
                }
                spin_loop();
                v = counter.load(Ordering::Relaxed);
            }
        }
    }

    /// Like [`Self::acquire`], with the host lock released while spinning.
    /// The lock is held again whenever this returns, error or not.
    pub fn acquire_yielding_host_lock(&self) -> Result<()> {
        let counter = self.counter()?;
        let mut unlocked = self.host.unlocked();
        let mut v = counter.load(Ordering::Relaxed);
        loop {
            if v > 0 {
                match counter.compare_exchange_weak(v, v - 1, Ordering::Acquire, Ordering::Relaxed)
                {
                    Ok(_) => return Ok(()),
                    Err(cur) => v = cur,
                }
            } else {
                if let Err(e) = unlocked.relock_for(|host| host.check_interrupt()) {
                    debug!("shared semaphore wait {}", e);
                    return Err(e.into());
                }
                spin_loop();
                v = counter.load(Ordering::Relaxed);
            }
        }
    }

    /// Take a permit if one is available. Contention is retried, exhaustion
    /// is not.
    pub fn try_acquire(&self) -> Result<bool> {
        let counter = self.counter()?;
        let mut v = counter.load(Ordering::Relaxed);
        while v > 0 {
            match counter.compare_exchange_weak(v, v - 1, Ordering::Acquire, Ordering::Relaxed) {
                Ok(_) => return Ok(true),
                Err(cur) => v = cur,
            }
        }
        Ok(false)
    }

    /// Unbounded: releasing past the intended capacity is the caller's bug.
    pub fn release(&self) -> Result<()> {
        self.counter()?.fetch_add(1, Ordering::Release);
        Ok(())
    }

    pub fn value(&self) -> Result<Word> {
        Ok(self.counter()?.load(Ordering::Relaxed))
    }

    pub fn close(&mut self) {
        if self.counter.take().is_some() {
            debug!("unbound shared semaphore");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.counter.is_none()
    }
}

fn check_buffer(
    ptr: *mut u8,
    len: usize,
) -> core::result::Result<*const AtomicIsize, BindingError> {
    if ptr.is_null() {
        return Err(BindingError::Null);
    }
    if len != REQUIRED_MEMORY_SIZE {
        return Err(BindingError::WrongSize {
            expected: REQUIRED_MEMORY_SIZE,
            actual: len,
        });
    }
    if (ptr as usize) % REQUIRED_ALIGNMENT != 0 {
        return Err(BindingError::Misaligned {
            align: REQUIRED_ALIGNMENT,
        });
    }
    Ok(ptr as *const AtomicIsize)
}

impl<H: Host> Sem for SharedCounterSemaphore<'_, H> {
    fn acquire(&self) -> Result<()> {
        SharedCounterSemaphore::acquire(self)
    }
    fn release(&self) -> Result<()> {
        SharedCounterSemaphore::release(self)
    }
}

impl<H: Host> TrySem for SharedCounterSemaphore<'_, H> {
    fn try_acquire(&self) -> Result<bool> {
        SharedCounterSemaphore::try_acquire(self)
    }
}

impl<H: Host> fmt::Debug for SharedCounterSemaphore<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.counter {
            Some(counter) => f
                .debug_struct("SharedCounterSemaphore")
                .field("addr", &(counter as *const AtomicIsize))
                .field("value", &counter.load(Ordering::Relaxed))
                .finish(),
            None => f.write_str("SharedCounterSemaphore(closed)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Interrupted;
    use crate::host::SpinHost;

    use rand::{thread_rng, Rng};
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::thread;
    use std::time::Duration;
    use std::vec::Vec;

    #[repr(C, align(16))]
    struct Buf([u8; 32]);

    impl Buf {
        fn filled(b: u8) -> Self {
            Self([b; 32])
        }
        fn word(&mut self) -> &mut [u8] {
            &mut self.0[..REQUIRED_MEMORY_SIZE]
        }
    }

    #[test]
    fn required_size_is_native_word() {
        assert_eq!(
            SharedCounterSemaphore::required_memory_size(),
            size_of::<isize>()
        );
    }

    #[test]
    fn reset_overwrites_previous_content() {
        let mut buf = Buf::filled(0xa5);
        let sem = SharedCounterSemaphore::bind(buf.word(), true).unwrap();
        assert_eq!(sem.value(), Ok(0));
        assert_eq!(sem.try_acquire(), Ok(false));
    }

    #[test]
    fn bind_without_reset_keeps_count() {
        let mut buf = Buf::filled(0);
        buf.word().copy_from_slice(&3isize.to_ne_bytes());
        let sem = SharedCounterSemaphore::bind(buf.word(), false).unwrap();
        assert_eq!(sem.value(), Ok(3));
        for _ in 0..3 {
            sem.acquire().unwrap();
        }
        assert_eq!(sem.try_acquire(), Ok(false));
    }

    #[test]
    fn bad_buffers() {
        let mut buf = Buf::filled(0);
        assert_eq!(
            SharedCounterSemaphore::bind(&mut buf.0[..3], true).unwrap_err(),
            Error::Binding(BindingError::WrongSize {
                expected: REQUIRED_MEMORY_SIZE,
                actual: 3
            })
        );
        assert_eq!(
            SharedCounterSemaphore::bind(&mut buf.0[1..1 + REQUIRED_MEMORY_SIZE], true)
                .unwrap_err(),
            Error::Binding(BindingError::Misaligned {
                align: REQUIRED_ALIGNMENT
            })
        );
        let null = unsafe {
            SharedCounterSemaphore::bind_raw(core::ptr::null_mut(), REQUIRED_MEMORY_SIZE, true)
        };
        assert_eq!(null.unwrap_err(), Error::Binding(BindingError::Null));
        // A failed bind must not have touched the memory.
        assert_eq!(buf.0, [0; 32]);
    }

    #[test]
    fn n_releases_then_n_acquires() {
        let mut buf = Buf::filled(0);
        let sem = SharedCounterSemaphore::bind(buf.word(), true).unwrap();
        for _ in 0..10 {
            sem.release().unwrap();
        }
        for _ in 0..10 {
            sem.acquire().unwrap();
        }
        assert_eq!(sem.try_acquire(), Ok(false));
        assert_eq!(sem.try_acquire_tries(100), Ok(false));
        assert_eq!(sem.value(), Ok(0));
    }

    #[test]
    fn second_acquire_waits_for_release() {
        let mut buf = Buf::filled(0);
        let sem = SharedCounterSemaphore::bind(buf.word(), true).unwrap();
        sem.release().unwrap();
        sem.acquire().unwrap();
        assert_eq!(sem.try_acquire(), Ok(false));

        let done = AtomicBool::new(false);
        thread::scope(|s| {
            s.spawn(|| {
                sem.acquire().unwrap();
                done.store(true, Ordering::SeqCst);
            });
            thread::sleep(Duration::from_millis(50));
            assert!(!done.load(Ordering::SeqCst));
            sem.release().unwrap();
        });
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(sem.value(), Ok(0));
    }

    #[test]
    fn pending_interrupt_stops_starved_acquire() {
        let host = SpinHost::new();
        let word = AtomicIsize::new(0);
        let sem = SharedCounterSemaphore::from_atomic_with_host(&word, false, &host);
        host.interrupt(2);
        assert_eq!(
            sem.acquire(),
            Err(Error::Interrupted(Interrupted { signal: 2 }))
        );
        assert_eq!(word.load(Ordering::SeqCst), 0);

        let _inside = host.enter();
        host.interrupt(2);
        assert!(sem.acquire_yielding_host_lock().unwrap_err().is_interrupted());
        assert!(host.is_locked());
        assert_eq!(word.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn interrupt_is_ignored_while_permits_remain() {
        let host = SpinHost::new();
        let word = AtomicIsize::new(1);
        let sem = SharedCounterSemaphore::from_atomic_with_host(&word, false, &host);
        host.interrupt(2);
        sem.acquire().unwrap();
        assert!(host.pending().is_pending());
        assert!(sem.acquire().unwrap_err().is_interrupted());
    }

    #[test]
    fn interrupt_from_other_thread() {
        let host = SpinHost::new();
        let word = AtomicIsize::new(0);
        let sem = SharedCounterSemaphore::from_atomic_with_host(&word, false, &host);
        thread::scope(|s| {
            s.spawn(|| {
                let _inside = host.enter();
                let res = sem.acquire_yielding_host_lock();
                assert!(res.unwrap_err().is_interrupted());
                assert!(host.is_locked());
            });
            thread::sleep(Duration::from_millis(20));
            host.interrupt(15);
        });
        assert!(!host.is_locked());
        assert_eq!(word.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn yielding_acquire_lets_host_run() {
        let host = SpinHost::new();
        let word = AtomicIsize::new(0);
        let sem = SharedCounterSemaphore::from_atomic_with_host(&word, false, &host);
        let waiting = AtomicBool::new(false);
        thread::scope(|s| {
            s.spawn(|| {
                let _inside = host.enter();
                waiting.store(true, Ordering::SeqCst);
                sem.acquire_yielding_host_lock().unwrap();
                assert!(host.is_locked());
            });
            while !waiting.load(Ordering::SeqCst) {
                spin_loop();
            }
            // Only possible if the waiter gave the lock up.
            let _inside = host.enter();
            sem.release().unwrap();
        });
        assert_eq!(word.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn tokens_in_flight_never_exceed_permits() {
        const PERMITS: isize = 3;
        const THREADS: usize = 8;
        const ROUNDS: usize = 2000;

        let word = AtomicIsize::new(PERMITS);
        let in_flight = AtomicUsize::new(0);
        let max_seen = AtomicUsize::new(0);
        thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    // Each thread gets its own view of the same word.
                    let sem = SharedCounterSemaphore::from_atomic(&word, false);
                    for _ in 0..ROUNDS {
                        sem.acquire().unwrap();
                        let n = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(n, Ordering::SeqCst);
                        assert!(n <= PERMITS as usize);
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        sem.release().unwrap();
                    }
                });
            }
        });
        assert!(max_seen.load(Ordering::SeqCst) <= PERMITS as usize);
        assert_eq!(word.load(Ordering::SeqCst), PERMITS);
    }

    #[test]
    fn random_mix_conserves_permits() {
        const INITIAL: isize = 5;
        let word = AtomicIsize::new(INITIAL);
        let released = AtomicUsize::new(0);
        let acquired = AtomicUsize::new(0);
        thread::scope(|s| {
            for _ in 0..6 {
                s.spawn(|| {
                    let sem = SharedCounterSemaphore::from_atomic(&word, false);
                    let mut rng = thread_rng();
                    for _ in 0..5000 {
                        if rng.gen_bool(0.5) {
                            sem.release().unwrap();
                            released.fetch_add(1, Ordering::SeqCst);
                        } else if sem.try_acquire().unwrap() {
                            acquired.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });
        let released = released.load(Ordering::SeqCst) as isize;
        let acquired = acquired.load(Ordering::SeqCst) as isize;
        assert!(acquired <= released + INITIAL);
        assert_eq!(word.load(Ordering::SeqCst), INITIAL + released - acquired);
        assert!(word.load(Ordering::SeqCst) >= 0);
    }

    #[test]
    fn many_waiters_each_get_one_permit() {
        let word = AtomicIsize::new(0);
        let sem = SharedCounterSemaphore::from_atomic(&word, false);
        let woke = AtomicUsize::new(0);
        thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        sem.acquire().unwrap();
                        woke.fetch_add(1, Ordering::SeqCst);
                    })
                })
                .collect();
            thread::sleep(Duration::from_millis(20));
            assert_eq!(woke.load(Ordering::SeqCst), 0);
            for _ in 0..4 {
                sem.release().unwrap();
            }
            for h in handles {
                h.join().unwrap();
            }
        });
        assert_eq!(woke.load(Ordering::SeqCst), 4);
        assert_eq!(word.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn close_is_idempotent() {
        let mut buf = Buf::filled(0);
        let mut sem = SharedCounterSemaphore::bind(buf.word(), true).unwrap();
        sem.release().unwrap();
        sem.close();
        sem.close();
        assert!(sem.is_closed());
        assert_eq!(sem.acquire(), Err(Error::Closed));
        assert_eq!(sem.release(), Err(Error::Closed));
        drop(sem);
        assert_eq!(isize::from_ne_bytes(buf.word().try_into().unwrap()), 1);
    }
}
