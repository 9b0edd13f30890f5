use core::fmt;

pub use errno::Errno;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindingError {
    Null,
    WrongSize { expected: usize, actual: usize },
    Misaligned { align: usize },
    ReadOnly,
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            BindingError::Null => write!(f, "buffer is null"),
            BindingError::WrongSize { expected, actual } => {
                write!(f, "buffer is {} bytes, expected {}", actual, expected)
            }
            BindingError::Misaligned { align } => {
                write!(f, "buffer is not aligned to {} bytes", align)
            }
            BindingError::ReadOnly => write!(f, "buffer is not writable"),
        }
    }
}

/// A host interrupt observed while waiting on an exhausted semaphore.
///
/// `signal` is the signal number the host reported, or 0 when the
/// interrupt did not come from a signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Interrupted {
    pub signal: i32,
}

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.signal {
            0 => write!(f, "interrupted"),
            sig => write!(f, "interrupted by signal {}", sig),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    Binding(BindingError),
    Interrupted(Interrupted),
    Closed,
    Open(Errno),
    Wait(Errno),
    Post(Errno),
    Unlink(Errno),
    Shm(Errno),
}
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub fn errno(&self) -> Option<Errno> {
        match *self {
            Error::Open(e)
            | Error::Wait(e)
            | Error::Post(e)
            | Error::Unlink(e)
            | Error::Shm(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted(_))
    }
}

impl From<BindingError> for Error {
    fn from(e: BindingError) -> Self {
        Error::Binding(e)
    }
}

impl From<Interrupted> for Error {
    fn from(e: Interrupted) -> Self {
        Error::Interrupted(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Binding(e) => write!(f, "cannot bind semaphore: {}", e),
            Error::Interrupted(e) => e.fmt(f),
            Error::Closed => write!(f, "semaphore is closed"),
            Error::Open(e) => write!(f, "sem_open failed: {}", e),
            Error::Wait(e) => write!(f, "sem_wait failed: {}", e),
            Error::Post(e) => write!(f, "sem_post failed: {}", e),
            Error::Unlink(e) => write!(f, "unlink failed: {}", e),
            Error::Shm(e) => write!(f, "shared memory failed: {}", e),
        }
    }
}

impl core::error::Error for BindingError {}
impl core::error::Error for Interrupted {}
impl core::error::Error for Error {}

pub(crate) fn last_errno() -> Errno {
    errno::errno()
}
