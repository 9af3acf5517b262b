// campaign-engine/src/lock.rs
// ============================================================================
// Module: Campaign Lock Manager
// Description: Directory-rename mutual exclusion with stale-owner recovery.
// Purpose: Ensure at most one `campaign run` reaches the main loop per
//          (outRoot, campaignId) pair.
// Dependencies: serde_json, thiserror, campaign-core::Timestamp
// ============================================================================

//! ## Overview
//! Directory creation is atomic on both POSIX and Windows, so the lock
//! primitive is `campaign.lock/` itself: creating it is the acquire, removing
//! it is the release. A lock holder writes `owner.json` with its pid and
//! acquisition time so a later invocation can decide whether the lock is
//! stale (owner process gone, or simply old) and reclaim it without human
//! intervention.

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::SystemTime;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use campaign_core::Timestamp;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Lock manager errors.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process holds the lock and `lockWait` expired (or was zero).
    #[error("lock held for campaign at {0}")]
    Held(PathBuf),
    /// Filesystem operation failed in a way that cannot be remediated.
    #[error("lock filesystem error at {path}: {source}")]
    Io {
        /// Path on which the operation failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// SECTION: Owner Metadata
// ============================================================================

/// Lock-owner metadata persisted as `campaign.lock/owner.json`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OwnerRecord {
    /// Process id of the lock holder.
    pub pid: u32,
    /// Wall-clock time the lock was acquired.
    pub started_at: Timestamp,
}

// ============================================================================
// SECTION: Lock Manager
// ============================================================================

/// Acquires and releases the per-campaign exclusive lock.
#[derive(Debug, Clone)]
pub struct LockManager {
    /// Directory containing `campaign.lock/` (the campaign's output subtree).
    campaign_dir: PathBuf,
    /// Age in milliseconds after which an existing lock is considered stale.
    stale_lock_ms: u64,
}

/// A held lock; removes `campaign.lock/` on drop (best-effort).
#[derive(Debug)]
pub struct LockGuard {
    lock_dir: PathBuf,
    /// Owner metadata recorded at acquisition time.
    pub owner: OwnerRecord,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ignored = fs::remove_dir_all(&self.lock_dir);
    }
}

impl LockManager {
    /// Creates a lock manager rooted at `campaign_dir` (the directory that
    /// will contain `campaign.lock/`).
    #[must_use]
    pub fn new(campaign_dir: PathBuf, stale_lock_ms: u64) -> Self {
        Self {
            campaign_dir,
            stale_lock_ms,
        }
    }

    fn lock_dir(&self) -> PathBuf {
        self.campaign_dir.join("campaign.lock")
    }

    /// Attempts to acquire the lock, polling with capped exponential backoff
    /// (20ms -> 200ms) until `lock_wait` elapses, then failing with
    /// [`LockError::Held`]. A `lock_wait` of zero tries exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Held`] if no attempt within `lock_wait` succeeds,
    /// or [`LockError::Io`] for unrecoverable filesystem failures.
    pub async fn acquire(
        &self,
        pid: u32,
        started_at: Timestamp,
        lock_wait: Duration,
    ) -> Result<LockGuard, LockError> {
        let deadline = tokio::time::Instant::now() + lock_wait;
        let mut backoff = Duration::from_millis(20);

        loop {
            if let Some(guard) = self.try_acquire_once(pid, started_at)? {
                return Ok(guard);
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(LockError::Held(self.lock_dir()));
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            tokio::time::sleep(backoff.min(remaining)).await;
            backoff = (backoff * 2).min(Duration::from_millis(200));
        }
    }

    /// Performs exactly one acquire attempt, reclaiming a stale lock if found.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Io`] on unrecoverable filesystem failures.
    fn try_acquire_once(
        &self,
        pid: u32,
        started_at: Timestamp,
    ) -> Result<Option<LockGuard>, LockError> {
        let lock_dir = self.lock_dir();

        fs::create_dir_all(&self.campaign_dir).map_err(|source| LockError::Io {
            path: self.campaign_dir.clone(),
            source,
        })?;

        match fs::create_dir(&lock_dir) {
            Ok(()) => {
                self.write_owner(&lock_dir, pid, started_at)?;
                return Ok(Some(LockGuard {
                    lock_dir,
                    owner: OwnerRecord {
                        pid,
                        started_at,
                    },
                }));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(source) => {
                return Err(LockError::Io {
                    path: lock_dir,
                    source,
                });
            }
        }

        if self.is_stale(&lock_dir)? {
            self.reclaim(&lock_dir)?;
            return self.try_acquire_once(pid, started_at);
        }

        Ok(None)
    }

    fn write_owner(
        &self,
        lock_dir: &Path,
        pid: u32,
        started_at: Timestamp,
    ) -> Result<(), LockError> {
        let owner_path = lock_dir.join("owner.json");
        let owner = OwnerRecord {
            pid,
            started_at,
        };
        let bytes = serde_json::to_vec_pretty(&owner).unwrap_or_default();
        fs::write(&owner_path, bytes).map_err(|source| LockError::Io {
            path: owner_path,
            source,
        })
    }

    fn is_stale(&self, lock_dir: &Path) -> Result<bool, LockError> {
        let owner_path = lock_dir.join("owner.json");
        let owner: Option<OwnerRecord> = fs::read(&owner_path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok());

        let age_exceeded = fs::metadata(lock_dir)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_none_or(|age| age.as_millis() >= u128::from(self.stale_lock_ms));

        let owner_dead = owner.is_none_or(|record| !pid_is_alive(record.pid));

        Ok(age_exceeded || owner_dead)
    }

    /// Moves an existing lock directory aside to a timestamped name so a
    /// fresh `create_dir` can proceed.
    fn reclaim(&self, lock_dir: &Path) -> Result<(), LockError> {
        let suffix = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|duration| duration.as_millis())
            .unwrap_or_default();
        let reclaimed = lock_dir.with_file_name(format!("campaign.lock.stale-{suffix}"));
        match fs::rename(lock_dir, &reclaimed) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LockError::Io {
                path: lock_dir.to_path_buf(),
                source,
            }),
        }
    }
}

/// Best-effort liveness check for a process id.
///
/// On Linux, existence of `/proc/<pid>` is authoritative. On platforms
/// without `/proc`, a dead owner cannot be distinguished from a live one by
/// pid alone, so the lock is treated as live (age-based staleness still
/// applies via `is_stale`'s `age_exceeded` branch).
#[cfg(target_os = "linux")]
fn pid_is_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
const fn pid_is_alive(_pid: u32) -> bool {
    true
}
