//! Cross-process input lock
//!
//! Several bot processes can drive separate emulator windows on one desktop,
//! but there is only one mouse. An advisory lock on a shared file decides
//! which process may dispatch input at any moment.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use super::InputError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Advisory lock on a file shared by all bot processes
#[derive(Debug)]
pub struct InputFileLock {
    file: File,
    path: PathBuf,
}

impl InputFileLock {
    /// Open (creating if needed) the lock file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, InputError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(InputError::Lock)?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the lock, polling until `timeout` elapses
    pub fn acquire(&self, timeout: Duration) -> Result<InputLockGuard<'_>, InputError> {
        let deadline = Instant::now() + timeout;
        loop {
            match FileExt::try_lock_exclusive(&self.file) {
                Ok(()) => return Ok(InputLockGuard { lock: self }),
                Err(e) if is_contended(&e) => {
                    if Instant::now() >= deadline {
                        return Err(InputError::LockTimeout(timeout));
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(InputError::Lock(e)),
            }
        }
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Held lock; released on drop, including on early return
#[derive(Debug)]
pub struct InputLockGuard<'a> {
    lock: &'a InputFileLock,
}

impl Drop for InputLockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.lock.file) {
            log::warn!("Failed to release {}: {}", self.lock.path.display(), e);
        }
    }
}
