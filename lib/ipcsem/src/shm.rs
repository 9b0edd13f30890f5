//! POSIX shared memory objects, to hand the same bytes to several processes.

use alloc::ffi::CString;
use core::fmt;
use core::ptr::null_mut;
use core::slice::{from_raw_parts, from_raw_parts_mut};

use errno::Errno;

use crate::error::{last_errno, BindingError, Error, Result};
use crate::log::{debug, warn};
use crate::sync::shared::{SharedCounterSemaphore, REQUIRED_MEMORY_SIZE};

const MODE: libc::mode_t = 0o600;

pub struct SharedMemory {
    fd: libc::c_int,
    addr: *mut u8,
    size: usize,
    writable: bool,
    name: Option<CString>,
}

unsafe impl Send for SharedMemory {}
unsafe impl Sync for SharedMemory {}

fn to_cname(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| Error::Shm(Errno(libc::EINVAL)))
}

impl SharedMemory {
    /// Create a new object of `size` bytes. Fails if the name exists.
    pub fn create(name: &str, size: usize) -> Result<Self> {
        let cname = to_cname(name)?;
        let fd = unsafe {
            libc::shm_open(
                cname.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                MODE as libc::c_uint,
            )
        };
        if fd < 0 {
            return Err(Error::Shm(last_errno()));
        }
        if unsafe { libc::ftruncate(fd, size as libc::off_t) } != 0 {
            let e = last_errno();
            unsafe {
                libc::shm_unlink(cname.as_ptr());
                libc::close(fd);
            }
            return Err(Error::Shm(e));
        }
        let shm = Self::map(fd, size, true, cname).map_err(|(e, cname)| {
            unsafe { libc::shm_unlink(cname.as_ptr()) };
            e
        })?;
        debug!("created shared memory {} ({} bytes)", name, size);
        Ok(shm)
    }

    /// Create an object sized for one [`SharedCounterSemaphore`].
    pub fn create_for_semaphore(name: &str) -> Result<Self> {
        Self::create(name, REQUIRED_MEMORY_SIZE)
    }

    pub fn open(name: &str) -> Result<Self> {
        Self::open_impl(name, true)
    }

    pub fn open_read_only(name: &str) -> Result<Self> {
        Self::open_impl(name, false)
    }

    fn open_impl(name: &str, writable: bool) -> Result<Self> {
        let cname = to_cname(name)?;
        let oflag = match writable {
            true => libc::O_RDWR,
            false => libc::O_RDONLY,
        };
        let fd = unsafe { libc::shm_open(cname.as_ptr(), oflag, 0 as libc::c_uint) };
        if fd < 0 {
            return Err(Error::Shm(last_errno()));
        }
        let mut stat: libc::stat = unsafe { core::mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut stat) } != 0 {
            let e = last_errno();
            unsafe { libc::close(fd) };
            return Err(Error::Shm(e));
        }
        Self::map(fd, stat.st_size as usize, writable, cname).map_err(|(e, _)| e)
    }

    fn map(
        fd: libc::c_int,
        size: usize,
        writable: bool,
        name: CString,
    ) -> core::result::Result<Self, (Error, CString)> {
        let prot = match writable {
            true => libc::PROT_READ | libc::PROT_WRITE,
            false => libc::PROT_READ,
        };
        let addr = match size {
            0 => null_mut(),
            _ => {
                let addr =
                    unsafe { libc::mmap(null_mut(), size, prot, libc::MAP_SHARED, fd, 0) };
                if addr == libc::MAP_FAILED {
                    let e = last_errno();
                    unsafe { libc::close(fd) };
                    return Err((Error::Shm(e), name));
                }
                addr as *mut u8
            }
        };
        Ok(Self {
            fd,
            addr,
            size,
            writable,
            name: Some(name),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.addr
    }

    pub fn bytes(&self) -> &[u8] {
        match self.addr.is_null() {
            true => &[],
            false => unsafe { from_raw_parts(self.addr, self.size) },
        }
    }

    pub fn bytes_mut(&mut self) -> core::result::Result<&mut [u8], BindingError> {
        if !self.writable {
            return Err(BindingError::ReadOnly);
        }
        match self.addr.is_null() {
            true => Ok(&mut []),
            false => Ok(unsafe { from_raw_parts_mut(self.addr, self.size) }),
        }
    }

    /// Bind a semaphore to the start of the mapping, which must be exactly
    /// one counter word long.
    pub fn semaphore(&mut self, reset_to_zero: bool) -> Result<SharedCounterSemaphore<'_>> {
        SharedCounterSemaphore::bind(self.bytes_mut()?, reset_to_zero)
    }

    /// Remove the name. Existing mappings stay valid.
    pub fn unlink(&mut self) {
        if let Some(name) = self.name.take() {
            if let Err(e) = unlink_cstr(&name) {
                // A peer may have removed it first.
                warn!("shm_unlink({:?}) failed: {}", name, e);
            }
        }
    }
}

fn unlink_cstr(name: &CString) -> Result<()> {
    if unsafe { libc::shm_unlink(name.as_ptr()) } != 0 {
        return Err(Error::Unlink(last_errno()));
    }
    debug!("unlinked shared memory {:?}", name);
    Ok(())
}

/// Remove a shared memory object by name.
pub fn unlink(name: &str) -> Result<()> {
    unlink_cstr(&to_cname(name)?)
}

impl Drop for SharedMemory {
    fn drop(&mut self) {
        unsafe {
            if !self.addr.is_null() {
                libc::munmap(self.addr.cast(), self.size);
            }
            libc::close(self.fd);
        }
    }
}

impl fmt::Debug for SharedMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMemory")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("writable", &self.writable)
            .finish()
    }
}
