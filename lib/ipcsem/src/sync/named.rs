//! POSIX named semaphores.

use alloc::ffi::CString;
use core::fmt;

use bitflags::bitflags;
use cfg_if::cfg_if;
use errno::Errno;

use super::sem::{Sem, TrySem};
use crate::error::{last_errno, Error, Result};
use crate::host::{Host, NoHost};
use crate::log::{debug, error, warn};

pub const O_CREAT: i32 = libc::O_CREAT;
pub const O_EXCL: i32 = libc::O_EXCL;

/// Permissions given to semaphores created by [`NamedKernelSemaphore::open`].
pub const MODE: libc::mode_t = 0o660;

bitflags! {
    pub struct OpenFlags: i32 {
        const CREATE = O_CREAT;
        const EXCLUSIVE = O_EXCL;
    }
}

pub struct NamedKernelSemaphore<H: Host = NoHost> {
    handle: *mut libc::sem_t,
    name: Option<CString>,
    host: H,
}

unsafe impl<H: Host + Send> Send for NamedKernelSemaphore<H> {}
unsafe impl<H: Host + Sync> Sync for NamedKernelSemaphore<H> {}

impl NamedKernelSemaphore<NoHost> {
    pub fn open(name: &str, flags: OpenFlags, initial_value: u32) -> Result<Self> {
        Self::open_with_host(name, flags, initial_value, NoHost)
    }
}

impl<H: Host> NamedKernelSemaphore<H> {
    pub fn open_with_host(name: &str, flags: OpenFlags, initial_value: u32, host: H) -> Result<Self> {
        let cname = CString::new(name).map_err(|_| Error::Open(Errno(libc::EINVAL)))?;
        let handle = unsafe {
            libc::sem_open(
                cname.as_ptr(),
                flags.bits(),
                MODE as libc::c_uint,
                initial_value as libc::c_uint,
            )
        };
        if handle == libc::SEM_FAILED {
            let e = last_errno();
            warn!("sem_open({}, {:?}) failed: {}", name, flags, e);
            return Err(Error::Open(e));
        }
        debug!("opened named semaphore {} ({:?}, {})", name, flags, initial_value);
        Ok(Self {
            handle,
            name: Some(cname),
            host,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_ref().and_then(|n| n.to_str().ok())
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    fn handle(&self) -> Result<*mut libc::sem_t> {
        match self.handle == libc::SEM_FAILED {
            true => Err(Error::Closed),
            false => Ok(self.handle),
        }
    }

    /// Block in the kernel with the host lock released.
    pub fn acquire(&self) -> Result<()> {
        let handle = self.handle()?;
        let _unlocked = self.host.unlocked();
        loop {
            if unsafe { libc::sem_wait(handle) } == 0 {
                return Ok(());
            }
            let e = last_errno();
            if e.0 != libc::EINTR {
                error!("sem_wait failed: {}", e);
                return Err(Error::Wait(e));
            }
        }
    }

    pub fn try_acquire(&self) -> Result<bool> {
        let handle = self.handle()?;
        loop {
            if unsafe { libc::sem_trywait(handle) } == 0 {
                return Ok(true);
            }
            match last_errno().0 {
                libc::EAGAIN => return Ok(false),
                libc::EINTR => continue,
                e => return Err(Error::Wait(Errno(e))),
            }
        }
    }

    pub fn release(&self) -> Result<()> {
        let handle = self.handle()?;
        if unsafe { libc::sem_post(handle) } != 0 {
            let e = last_errno();
            error!("sem_post failed: {}", e);
            return Err(Error::Post(e));
        }
        Ok(())
    }

    pub fn close(&mut self) {
        if self.handle == libc::SEM_FAILED {
            return;
        }
        unsafe { libc::sem_close(self.handle) };
        self.handle = libc::SEM_FAILED;
        debug!("closed named semaphore {:?}", self.name);
    }

    pub fn is_closed(&self) -> bool {
        self.handle == libc::SEM_FAILED
    }

    /// Remove the name from the system. Handles already open stay usable.
    pub fn unlink(&mut self) {
        if let Some(name) = self.name.take() {
            if let Err(e) = unlink_cstr(&name) {
                // A peer may have removed it first.
                warn!("sem_unlink({:?}) failed: {}", name, e);
            }
        }
    }
}

fn unlink_cstr(name: &CString) -> Result<()> {
    if unsafe { libc::sem_unlink(name.as_ptr()) } != 0 {
        return Err(Error::Unlink(last_errno()));
    }
    debug!("unlinked named semaphore {:?}", name);
    Ok(())
}

/// Remove a named semaphore without opening it.
pub fn unlink(name: &str) -> Result<()> {
    let cname = CString::new(name).map_err(|_| Error::Unlink(Errno(libc::EINVAL)))?;
    unlink_cstr(&cname)
}

cfg_if! {
    if #[cfg(not(target_os = "macos"))] {
        impl<H: Host> NamedKernelSemaphore<H> {
            pub fn value(&self) -> Result<i32> {
                let handle = self.handle()?;
                let mut value = 0;
                if unsafe { libc::sem_getvalue(handle, &mut value) } != 0 {
                    return Err(Error::Wait(last_errno()));
                }
                Ok(value)
            }
        }
    }
}

impl<H: Host> Drop for NamedKernelSemaphore<H> {
    fn drop(&mut self) {
        self.close()
    }
}

impl<H: Host> Sem for NamedKernelSemaphore<H> {
    fn acquire(&self) -> Result<()> {
        NamedKernelSemaphore::acquire(self)
    }
    fn release(&self) -> Result<()> {
        NamedKernelSemaphore::release(self)
    }
}

impl<H: Host> TrySem for NamedKernelSemaphore<H> {
    fn try_acquire(&self) -> Result<bool> {
        NamedKernelSemaphore::try_acquire(self)
    }
}

impl<H: Host> fmt::Debug for NamedKernelSemaphore<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedKernelSemaphore")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}
