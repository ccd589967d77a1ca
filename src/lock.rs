//! Optional advisory lock around writes to a shared configuration file
//!
//! A run normally assumes it is the only writer. With `lock = true` each merge
//! takes an exclusive `flock` on `<file>.lock` and keeps it until the guard is
//! dropped, so two overlapping invocations serialize instead of interleaving.

use crate::error::{DeployError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Path of the lock file guarding `target`
pub fn lock_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Held lock; released when dropped
#[cfg(unix)]
pub struct FileLock {
    _file: std::fs::File,
    path: PathBuf,
}

#[cfg(unix)]
impl FileLock {
    /// Block until an exclusive lock on `<target>.lock` is held
    pub fn acquire(target: &Path) -> Result<Self> {
        use std::os::unix::io::AsRawFd;

        let path = lock_path(target);
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| DeployError::fs(&path, e))?;

        let fd = file.as_raw_fd();
        let result = unsafe { libc::flock(fd, libc::LOCK_EX) };
        if result != 0 {
            return Err(DeployError::fs(&path, std::io::Error::last_os_error()));
        }

        debug!(path = %path.display(), "Lock acquired");
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(not(unix))]
pub struct FileLock {
    path: PathBuf,
}

#[cfg(not(unix))]
impl FileLock {
    pub fn acquire(target: &Path) -> Result<Self> {
        let path = lock_path(target);
        std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| DeployError::fs(&path, e))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Take the lock only when `enabled`
pub fn maybe_lock(target: &Path, enabled: bool) -> Result<Option<FileLock>> {
    if enabled {
        FileLock::acquire(target).map(Some)
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path(Path::new("/etc/nginx/nginx.conf")),
            PathBuf::from("/etc/nginx/nginx.conf.lock")
        );
    }

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nginx.conf");

        {
            let lock = FileLock::acquire(&target).unwrap();
            assert!(lock.path().exists());
        }
        // Reacquiring after drop must not block
        let again = FileLock::acquire(&target).unwrap();
        assert_eq!(again.path(), lock_path(&target));
    }

    #[test]
    fn test_maybe_lock_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nginx.conf");

        assert!(maybe_lock(&target, false).unwrap().is_none());
        assert!(!lock_path(&target).exists());
        assert!(maybe_lock(&target, true).unwrap().is_some());
    }

    #[test]
    fn test_acquire_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("nginx.conf");
        assert!(matches!(
            FileLock::acquire(&target),
            Err(DeployError::FileSystemFailure { .. })
        ));
    }
}
