// campaign-engine/tests/lock_manager.rs
//! Exclusive acquire/release behavior and stale-owner reclaim.
#![allow(
    clippy::missing_docs_in_private_items,
    missing_docs,
    reason = "Test functions are self-describing by name; see campaign-cli's test suite for the same convention."
)]

use std::time::Duration;

use campaign_core::Timestamp;
use campaign_engine::lock::LockManager;

type TestResult = Result<(), String>;

#[tokio::test]
async fn acquire_then_release_allows_a_second_acquire() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let manager = LockManager::new(dir.path().to_path_buf(), 60_000);

    let guard = manager
        .acquire(1111, Timestamp::from_unix_millis(0), Duration::from_millis(50))
        .await
        .map_err(|err| err.to_string())?;
    drop(guard);

    manager
        .acquire(2222, Timestamp::from_unix_millis(1), Duration::from_millis(50))
        .await
        .map_err(|err| err.to_string())?;
    Ok(())
}

#[tokio::test]
async fn concurrent_acquire_fails_with_held_before_the_first_guard_drops() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let manager = LockManager::new(dir.path().to_path_buf(), 60_000);

    let _guard = manager
        .acquire(std::process::id(), Timestamp::from_unix_millis(0), Duration::from_millis(50))
        .await
        .map_err(|err| err.to_string())?;

    let second = manager
        .acquire(std::process::id(), Timestamp::from_unix_millis(0), Duration::from_millis(60))
        .await;
    if second.is_ok() {
        return Err("expected second acquire to fail while the first guard is held".to_string());
    }
    Ok(())
}

#[tokio::test]
async fn a_lock_owned_by_a_dead_pid_is_reclaimed() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let manager = LockManager::new(dir.path().to_path_buf(), 60_000);

    // Write an owner.json for a pid that cannot plausibly be alive, bypassing
    // the normal acquire path the way a crashed prior invocation would leave
    // its lock directory behind.
    let lock_dir = dir.path().join("campaign.lock");
    std::fs::create_dir_all(&lock_dir).map_err(|err| err.to_string())?;
    let owner = serde_json::json!({"pid": 999_999_999_u32, "started_at": 0});
    std::fs::write(lock_dir.join("owner.json"), serde_json::to_vec(&owner).map_err(|err| err.to_string())?)
        .map_err(|err| err.to_string())?;

    manager
        .acquire(std::process::id(), Timestamp::from_unix_millis(0), Duration::from_millis(200))
        .await
        .map_err(|err| format!("expected reclaim of a dead-owner lock to succeed: {err}"))?;
    Ok(())
}

#[tokio::test]
async fn guard_drop_removes_the_lock_directory_from_disk() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let manager = LockManager::new(dir.path().to_path_buf(), 60_000);
    let lock_dir = dir.path().join("campaign.lock");

    let guard = manager
        .acquire(1, Timestamp::from_unix_millis(0), Duration::from_millis(50))
        .await
        .map_err(|err| err.to_string())?;
    if !lock_dir.is_dir() {
        return Err("expected campaign.lock to exist while held".to_string());
    }
    drop(guard);
    if lock_dir.exists() {
        return Err("expected campaign.lock to be removed after drop".to_string());
    }
    Ok(())
}
