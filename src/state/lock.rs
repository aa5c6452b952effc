//! Working directory locking.
//!
//! Each live deployer holds an exclusive lock file inside its working
//! directory, so two deployers can never drive the same identity at once.
//! The lock is released when the guard is dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DeployError, EcatError, Result};

/// Name of the lock file inside a working directory.
pub const LOCK_FILE_NAME: &str = ".ecat.lock";

/// Lock expiry duration in seconds.
pub const LOCK_EXPIRY_SECS: i64 = 12 * 60 * 60; // 12 hours

/// Information about a working directory lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Unique lock identifier.
    pub lock_id: String,
    /// Who holds the lock.
    pub holder: String,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the lock expires.
    pub expires_at: DateTime<Utc>,
}

/// Guard for an acquired working directory lock.
#[derive(Debug)]
pub struct WorkingDirLock {
    /// Path of the lock file.
    path: PathBuf,
    /// Lock information written to the file.
    info: LockInfo,
}

impl LockInfo {
    /// Creates a new lock info.
    #[must_use]
    pub fn new(holder: &str) -> Self {
        let now = Utc::now();
        Self {
            lock_id: Uuid::new_v4().to_string(),
            holder: holder.to_string(),
            acquired_at: now,
            expires_at: now + chrono::Duration::seconds(LOCK_EXPIRY_SECS),
        }
    }

    /// Checks if the lock has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

impl WorkingDirLock {
    /// Acquires the lock for `working_dir`.
    ///
    /// An expired lock left behind by a crashed process is taken over. A lock
    /// file that cannot be parsed counts as held until its modification time
    /// is older than the expiry.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::WorkingDirLocked`] if another live holder owns
    /// the directory, or an IO error if the lock file cannot be written.
    pub async fn acquire(working_dir: &Path) -> Result<Self> {
        let path = working_dir.join(LOCK_FILE_NAME);
        let info = LockInfo::new(&generate_holder_id());

        match Self::create(&path, &info).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let existing = read_lock_info_async(&path).await;
                match existing {
                    Some(existing) if !existing.is_expired() => {
                        return Err(EcatError::Deploy(DeployError::WorkingDirLocked {
                            path,
                            holder: existing.holder,
                            since: existing.acquired_at.to_rfc3339(),
                        }));
                    }
                    // Unreadable: possibly still being written by its holder.
                    None if !is_older_than_expiry(&path).await => {
                        return Err(EcatError::Deploy(DeployError::WorkingDirLocked {
                            path,
                            holder: String::from("unknown"),
                            since: String::from("unknown"),
                        }));
                    }
                    _ => {
                        warn!("Taking over stale lock at {}", path.display());
                        tokio::fs::remove_file(&path).await?;
                        Self::create(&path, &info).await?;
                    }
                }
            }
            Err(e) => return Err(e.into()),
        }

        debug!("Acquired lock {} at {}", info.lock_id, path.display());
        Ok(Self { path, info })
    }

    async fn create(path: &Path, info: &LockInfo) -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path).await?;
        let content = serde_json::to_vec_pretty(info).map_err(std::io::Error::other)?;
        file.write_all(&content).await?;
        file.sync_all().await
    }

    /// Gets the lock info.
    #[must_use]
    pub const fn info(&self) -> &LockInfo {
        &self.info
    }

    /// Gets the lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkingDirLock {
    fn drop(&mut self) {
        // Only remove the file if it is still ours.
        let still_ours = read_lock_info(&self.path)
            .is_some_and(|info| info.lock_id == self.info.lock_id);

        if still_ours {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("Failed to release lock {}: {}", self.path.display(), e);
            } else {
                debug!("Released lock {}", self.info.lock_id);
            }
        }
    }
}

async fn read_lock_info_async(path: &Path) -> Option<LockInfo> {
    let content = tokio::fs::read(path).await.ok()?;
    serde_json::from_slice(&content).ok()
}

async fn is_older_than_expiry(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| i64::try_from(age.as_secs()).is_ok_and(|secs| secs > LOCK_EXPIRY_SECS))
}

// Used from Drop, which cannot await.
fn read_lock_info(path: &Path) -> Option<LockInfo> {
    let content = std::fs::read(path).ok()?;
    serde_json::from_slice(&content).ok()
}

/// Generates a unique holder identifier for the current process.
#[must_use]
pub fn generate_holder_id() -> String {
    let hostname = hostname::get().map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().to_string());

    let pid = std::process::id();
    let uuid = &Uuid::new_v4().to_string()[..8];

    format!("{hostname}-{pid}-{uuid}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let temp = TempDir::new().unwrap();
        let first = WorkingDirLock::acquire(temp.path()).await.unwrap();
        assert!(first.path().exists());
        assert!(!first.info().is_expired());

        let second = WorkingDirLock::acquire(temp.path()).await;
        assert!(matches!(
            second,
            Err(EcatError::Deploy(DeployError::WorkingDirLocked { .. }))
        ));
    }

    #[tokio::test]
    async fn test_fresh_unreadable_lock_is_held() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(LOCK_FILE_NAME), b"").unwrap();

        let result = WorkingDirLock::acquire(temp.path()).await;
        assert!(matches!(
            result,
            Err(EcatError::Deploy(DeployError::WorkingDirLocked { .. }))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_acquire_has_one_winner() {
        let temp = TempDir::new().unwrap();
        let (a, b) = tokio::join!(
            WorkingDirLock::acquire(temp.path()),
            WorkingDirLock::acquire(temp.path())
        );

        assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
    }

    #[tokio::test]
    async fn test_lock_released_on_drop() {
        let temp = TempDir::new().unwrap();
        let lock = WorkingDirLock::acquire(temp.path()).await.unwrap();
        let path = lock.path().to_path_buf();
        drop(lock);

        assert!(!path.exists());
        assert!(WorkingDirLock::acquire(temp.path()).await.is_ok());
    }

    #[tokio::test]
    async fn test_stale_lock_taken_over() {
        let temp = TempDir::new().unwrap();
        let mut stale = LockInfo::new("crashed-host-1-abcdef12");
        stale.expires_at = Utc::now() - chrono::Duration::seconds(1);
        std::fs::write(
            temp.path().join(LOCK_FILE_NAME),
            serde_json::to_vec(&stale).unwrap(),
        )
        .unwrap();

        let lock = WorkingDirLock::acquire(temp.path()).await.unwrap();
        assert_ne!(lock.info().lock_id, stale.lock_id);
    }

    #[test]
    fn test_holder_id_generation() {
        let id1 = generate_holder_id();
        let id2 = generate_holder_id();

        assert_ne!(id1, id2);

        let pid = std::process::id().to_string();
        assert!(id1.contains(&pid));
    }
}
