//! Advisory cross-process lock
//!
//! The lock is a directory created next to the guarded file. Directory
//! creation is atomic on every platform we target, so whoever creates it
//! owns the lock until it is removed. A lock left behind by a crashed
//! process is broken once it is older than the staleness timeout.
//!
//! Breaking is itself guarded by a second directory (`<lock>.break`), and
//! staleness is re-checked while holding it, so two waiters can never both
//! break the same lock.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use super::ConfigError;

/// Timing of lock acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Age after which an existing lock is considered abandoned
    pub stale_after: Duration,
    /// Delay between attempts
    pub retry_interval: Duration,
    /// Total time to keep trying
    pub timeout: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(10),
            retry_interval: Duration::from_millis(50),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Held lock; released on drop
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
}

impl DirLock {
    /// Lock directory guarding `target` (`<target>.lock`)
    pub fn lock_path(target: &Path) -> PathBuf {
        let mut name = target.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn break_path(lock: &Path) -> PathBuf {
        let mut name = lock.as_os_str().to_os_string();
        name.push(".break");
        PathBuf::from(name)
    }

    /// Acquire the lock guarding `target`
    pub async fn acquire(target: &Path, options: LockOptions) -> Result<Self, ConfigError> {
        let path = Self::lock_path(target);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let started = Instant::now();
        loop {
            match tokio::fs::create_dir(&path).await {
                Ok(()) => {
                    tracing::trace!(lock = %path.display(), "Lock acquired");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path, options.stale_after).await
                        && break_stale(&path, options.stale_after).await?
                    {
                        continue;
                    }
                    if started.elapsed() >= options.timeout {
                        return Err(ConfigError::LockTimeout(path));
                    }
                    tokio::time::sleep(options.retry_interval).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir(&self.path) {
            tracing::warn!(lock = %self.path.display(), error = %e, "Failed to release lock");
        }
    }
}

/// Remove `lock` if it is still stale once the break guard is held
///
/// Returns whether the caller should retry immediately.
async fn break_stale(lock: &Path, stale_after: Duration) -> Result<bool, ConfigError> {
    let guard = DirLock::break_path(lock);
    match tokio::fs::create_dir(&guard).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            // Another waiter is breaking it. A guard outliving the
            // staleness timeout belongs to a waiter that died mid-break.
            if is_stale(&guard, stale_after).await {
                tracing::warn!(guard = %guard.display(), "Removing abandoned break guard");
                let _ = tokio::fs::remove_dir(&guard).await;
            }
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    }

    let broken = if is_stale(lock, stale_after).await {
        tracing::warn!(lock = %lock.display(), "Breaking stale lock");
        match tokio::fs::remove_dir(lock).await {
            Ok(()) => Ok(true),
            // Released by its owner in the meantime
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    } else {
        // Already broken and re-taken by someone else
        Ok(true)
    };

    if let Err(e) = tokio::fs::remove_dir(&guard).await {
        tracing::warn!(guard = %guard.display(), error = %e, "Failed to remove break guard");
    }
    broken
}

async fn is_stale(path: &Path, stale_after: Duration) -> bool {
    let modified = match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(_) => return false,
    };
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age > stale_after)
        .unwrap_or(false)
}
