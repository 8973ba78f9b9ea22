//! SIGINT → `Core::destroy` bridge. A signal handler may not safely reach
//! into `Core` directly (allocation and deallocation are not
//! async-signal-safe), so the handler here only flips a flag; `Core::run()`
//! checks it once per tick and runs the actual teardown from the loop
//! thread.

use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Installs a `SIGINT` handler that requests shutdown. Intended to be
/// called once, early in `main`, by a binary embedding this crate —
/// `Core::run()` itself never installs this on the caller's behalf, since a
/// library has no business claiming a process-wide signal without being
/// asked.
pub fn install() -> std::io::Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handle_sigint as usize;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut()) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

extern "C" fn handle_sigint(_signum: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

pub(crate) fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}
