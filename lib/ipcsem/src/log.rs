use core::fmt::{self, Arguments};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl Level {
    pub const fn term_fmt(self) -> &'static str {
        match self {
            Level::Debug => "2",
            Level::Info => "",
            Level::Warn => "1;33",
            Level::Error => "1;31",
            Level::Critical => "1;37;41",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Critical => "critical",
        })
    }
}

pub type LogHandler = fn(Level, Arguments<'_>);

static mut LOG_HANDLER: Option<LogHandler> = None;

/// # Safety
/// Must not race with any logging call or with [`clear_handler`].
pub unsafe fn set_handler(handler: LogHandler) {
    LOG_HANDLER = Some(handler);
}

/// # Safety
/// Same as [`set_handler`].
pub unsafe fn clear_handler() {
    LOG_HANDLER = None;
}

#[doc(hidden)]
pub fn log_impl(level: Level, args: Arguments<'_>) {
    // Handlers are only swapped before any semaphore is in use.
    if let Some(log) = unsafe { LOG_HANDLER } {
        log(level, args);
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __ipcsem_log {
    ($level:expr, $($args:tt)*) => {
        $crate::log::log_impl($level, format_args!($($args)*))
    };
}

#[cfg(feature = "log-debug")]
#[doc(hidden)]
#[macro_export]
macro_rules! __ipcsem_debug {
    ($($args:tt)*) => { $crate::__ipcsem_log!($crate::log::Level::Debug, $($args)*) };
}

#[cfg(not(feature = "log-debug"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __ipcsem_debug {
    ($($args:tt)*) => {{
        let _ = format_args!($($args)*);
    }};
}

#[cfg(feature = "log-info")]
#[doc(hidden)]
#[macro_export]
macro_rules! __ipcsem_info {
    ($($args:tt)*) => { $crate::__ipcsem_log!($crate::log::Level::Info, $($args)*) };
}

#[cfg(not(feature = "log-info"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __ipcsem_info {
    ($($args:tt)*) => {{
        let _ = format_args!($($args)*);
    }};
}

#[cfg(feature = "log-warn")]
#[doc(hidden)]
#[macro_export]
macro_rules! __ipcsem_warn {
    ($($args:tt)*) => { $crate::__ipcsem_log!($crate::log::Level::Warn, $($args)*) };
}

#[cfg(not(feature = "log-warn"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __ipcsem_warn {
    ($($args:tt)*) => {{
        let _ = format_args!($($args)*);
    }};
}

#[cfg(feature = "log-error")]
#[doc(hidden)]
#[macro_export]
macro_rules! __ipcsem_error {
    ($($args:tt)*) => { $crate::__ipcsem_log!($crate::log::Level::Error, $($args)*) };
}

#[cfg(not(feature = "log-error"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __ipcsem_error {
    ($($args:tt)*) => {{
        let _ = format_args!($($args)*);
    }};
}

#[cfg(feature = "log-critical")]
#[doc(hidden)]
#[macro_export]
macro_rules! __ipcsem_critical {
    ($($args:tt)*) => { $crate::__ipcsem_log!($crate::log::Level::Critical, $($args)*) };
}

#[cfg(not(feature = "log-critical"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __ipcsem_critical {
    ($($args:tt)*) => {{
        let _ = format_args!($($args)*);
    }};
}

pub use crate::__ipcsem_critical as critical;
pub use crate::__ipcsem_debug as debug;
pub use crate::__ipcsem_error as error;
pub use crate::__ipcsem_info as info;
pub use crate::__ipcsem_warn as warn;
