//! Interrupt handling for follow mode.
//!
//! SIGINT and SIGTERM set a process-wide flag instead of killing the process,
//! so `monitor --follow` can stop between polls and exit cleanly.

use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Flag set once SIGINT or SIGTERM has been received.
pub fn interrupted_flag() -> &'static AtomicBool {
    &INTERRUPTED
}

#[cfg(unix)]
extern "C" fn on_signal(_signum: libc::c_int) {
    // Only async-signal-safe work here.
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM to [`interrupted_flag`].
#[cfg(unix)]
pub fn install() {
    let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    // SAFETY: the handler only stores to an atomic.
    unsafe {
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }
}

#[cfg(not(unix))]
pub fn install() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_sigterm_sets_flag() {
        install();
        INTERRUPTED.store(false, Ordering::SeqCst);

        // SAFETY: raising a signal we just installed a handler for.
        unsafe {
            libc::raise(libc::SIGTERM);
        }

        assert!(interrupted_flag().load(Ordering::SeqCst));
        INTERRUPTED.store(false, Ordering::SeqCst);
    }
}
