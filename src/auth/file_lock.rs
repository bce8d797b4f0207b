//! Advisory file locking for cross-process coordination.
//!
//! The lock file is a zero-byte sentinel next to the data it protects; the
//! data file itself is never locked. `flock` advisory locks are per open
//! file description, so they serialize cooperating server processes on the
//! same host without any external dependency.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;

/// Exclusive advisory lock, released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Try to take the exclusive lock without blocking.
    ///
    /// Returns `Ok(None)` when another process (or open description) holds
    /// the lock.
    pub fn try_exclusive(path: &Path) -> io::Result<Option<Self>> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc == 0 {
            return Ok(Some(Self { file }));
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
            Ok(None)
        } else {
            Err(err)
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // The lock would die with the descriptor anyway; unlocking
        // explicitly keeps the held window as tight as possible.
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}
