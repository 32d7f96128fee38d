//! Per-project advisory file lock
//!
//! `flock(LOCK_EX | LOCK_NB)` polled until a deadline. The lock belongs to the
//! open file description, so two acquisitions inside one process exclude each
//! other just like acquisitions from different processes on the same host.

use crate::workspace::error::{WorkspaceError, WorkspaceResult};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(600);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockEvent {
    Acquired,
    Released,
}

/// Instrumentation hook for lock acquisition order
pub trait LockObserver: Send + Sync {
    fn on_lock_event(&self, project_key: &str, event: LockEvent);
}

/// Held lock; released on drop
pub struct ProjectLockGuard {
    file: File,
    project_key: String,
    observer: Option<Arc<dyn LockObserver>>,
}

impl fmt::Debug for ProjectLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectLockGuard")
            .field("project_key", &self.project_key)
            .finish_non_exhaustive()
    }
}

impl Drop for ProjectLockGuard {
    fn drop(&mut self) {
        // Observer first: once unlocked another holder may already report Acquired
        if let Some(observer) = &self.observer {
            observer.on_lock_event(&self.project_key, LockEvent::Released);
        }
        if let Err(e) = unlock(&self.file) {
            log::warn!("Failed to release lock for {}: {}", self.project_key, e);
        }
        log::trace!("Released workspace lock for {}", self.project_key);
    }
}

/// Acquire the lock file at `path`, waiting up to `timeout`
pub async fn acquire(
    path: &Path,
    project_key: &str,
    timeout: Duration,
    observer: Option<Arc<dyn LockObserver>>,
) -> WorkspaceResult<ProjectLockGuard> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| WorkspaceError::io(path, e))?;

    let start = Instant::now();
    loop {
        let locked = try_flock_exclusive(&file).map_err(|source| WorkspaceError::Lock {
            path: path.to_path_buf(),
            source,
        })?;
        if locked {
            log::trace!("Acquired workspace lock for {}", project_key);
            if let Some(observer) = &observer {
                observer.on_lock_event(project_key, LockEvent::Acquired);
            }
            return Ok(ProjectLockGuard {
                file,
                project_key: project_key.to_string(),
                observer,
            });
        }

        let waited = start.elapsed();
        if waited >= timeout {
            return Err(WorkspaceError::LockTimeout {
                project_key: project_key.to_string(),
                waited_secs: waited.as_secs(),
            });
        }
        tokio::time::sleep(POLL_INTERVAL.min(timeout - waited)).await;
    }
}

fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: fd is a valid descriptor owned by `file` for the whole call
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK)
        {
            return Ok(false);
        }
        Err(err)
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Ok(true)
    }
}

fn unlock(file: &File) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: fd is a valid descriptor owned by `file`
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    #[cfg(not(unix))]
    {
        let _ = file;
    }
    Ok(())
}
