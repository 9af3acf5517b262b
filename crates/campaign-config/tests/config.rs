// campaign-config/tests/config.rs
//! Output-root precedence, version-floor enforcement, and shell detection.
#![allow(unsafe_code, reason = "test-only env mutation, serialized via ENV_LOCK")]

use std::fs;
use std::sync::Mutex;

use campaign_config::CampaignConfig;
use campaign_config::DEFAULT_OUT_ROOT;
use campaign_config::MIN_VERSION_ENV_VAR;
use campaign_config::OUT_ROOT_ENV_VAR;
use campaign_config::SHELL_ENV_VAR;
use campaign_config::detect_cleanup_shell;
use campaign_config::enforce_version_floor;
use campaign_config::resolve_out_root;

/// `std::env::set_var` races across tests in the same process; serialize the
/// handful of tests here that touch process-global environment variables.
static ENV_LOCK: Mutex<()> = Mutex::new(());

type TestResult = Result<(), String>;

#[test]
fn out_root_prefers_cli_flag_over_everything_else() -> TestResult {
    let _guard = ENV_LOCK.lock().map_err(|err| err.to_string())?;
    unsafe {
        std::env::set_var(OUT_ROOT_ENV_VAR, "/from/env");
    }
    let config = CampaignConfig {
        out_root: Some("/from/config".to_string()),
        ..CampaignConfig::default()
    };
    let resolved = resolve_out_root(Some("/from/cli"), Some("/from/spec"), &config);
    unsafe {
        std::env::remove_var(OUT_ROOT_ENV_VAR);
    }
    if resolved != "/from/cli" {
        return Err(format!("expected cli flag to win, got {resolved}"));
    }
    Ok(())
}

#[test]
fn out_root_falls_back_through_spec_then_env_then_config_then_default() -> TestResult {
    let _guard = ENV_LOCK.lock().map_err(|err| err.to_string())?;
    let config = CampaignConfig::default();

    if resolve_out_root(None, Some("/from/spec"), &config) != "/from/spec" {
        return Err("expected spec outRoot to win over env/config/default".to_string());
    }

    unsafe {
        std::env::set_var(OUT_ROOT_ENV_VAR, "/from/env");
    }
    let env_result = resolve_out_root(None, None, &config);
    unsafe {
        std::env::remove_var(OUT_ROOT_ENV_VAR);
    }
    if env_result != "/from/env" {
        return Err(format!("expected env fallback, got {env_result}"));
    }

    let configured = CampaignConfig {
        out_root: Some("/from/config".to_string()),
        ..CampaignConfig::default()
    };
    if resolve_out_root(None, None, &configured) != "/from/config" {
        return Err("expected config out_root fallback".to_string());
    }

    if resolve_out_root(None, None, &config) != DEFAULT_OUT_ROOT {
        return Err("expected hardcoded default when nothing else resolves".to_string());
    }
    Ok(())
}

#[test]
fn version_floor_passes_when_unset() -> TestResult {
    let _guard = ENV_LOCK.lock().map_err(|err| err.to_string())?;
    unsafe {
        std::env::remove_var(MIN_VERSION_ENV_VAR);
    }
    enforce_version_floor("0.0.1").map_err(|err| err.to_string())
}

#[test]
fn version_floor_rejects_below_floor() -> TestResult {
    let _guard = ENV_LOCK.lock().map_err(|err| err.to_string())?;
    unsafe {
        std::env::set_var(MIN_VERSION_ENV_VAR, "2.0.0");
    }
    let result = enforce_version_floor("1.9.9");
    unsafe {
        std::env::remove_var(MIN_VERSION_ENV_VAR);
    }
    let Err(err) = result else {
        return Err("expected a version floor violation".to_string());
    };
    if err.floor != "2.0.0" || err.current != "1.9.9" {
        return Err(format!("unexpected error fields: {err:?}"));
    }
    Ok(())
}

#[test]
fn version_floor_accepts_equal_or_above() -> TestResult {
    let _guard = ENV_LOCK.lock().map_err(|err| err.to_string())?;
    unsafe {
        std::env::set_var(MIN_VERSION_ENV_VAR, "1.4.0");
    }
    let at_floor = enforce_version_floor("1.4.0");
    let above_floor = enforce_version_floor("1.4.1");
    unsafe {
        std::env::remove_var(MIN_VERSION_ENV_VAR);
    }
    at_floor.map_err(|err| err.to_string())?;
    above_floor.map_err(|err| err.to_string())
}

#[test]
fn config_rejects_zero_stale_lock_ms() -> TestResult {
    let config = CampaignConfig {
        stale_lock_ms: 0,
        ..CampaignConfig::default()
    };
    if config.validate().is_ok() {
        return Err("expected stale_lock_ms=0 to be rejected".to_string());
    }
    Ok(())
}

#[test]
fn config_loads_from_explicit_toml_file() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("campaign.toml");
    fs::write(&path, "out_root = \"/explicit\"\nstale_lock_ms = 60000\n").map_err(|err| err.to_string())?;

    let loaded = CampaignConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if loaded.out_root.as_deref() != Some("/explicit") {
        return Err("expected out_root to load from file".to_string());
    }
    if loaded.stale_lock_ms != 60_000 {
        return Err("expected stale_lock_ms to load from file".to_string());
    }
    if loaded.lock_wait_ms != 5_000 {
        return Err("expected lock_wait_ms to keep its default".to_string());
    }
    Ok(())
}

#[test]
fn config_defaults_when_no_path_and_no_default_file_present() -> TestResult {
    let _guard = ENV_LOCK.lock().map_err(|err| err.to_string())?;
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let original = std::env::current_dir().map_err(|err| err.to_string())?;
    std::env::set_current_dir(dir.path()).map_err(|err| err.to_string())?;
    let loaded = CampaignConfig::load(None);
    std::env::set_current_dir(original).map_err(|err| err.to_string())?;

    let loaded = loaded.map_err(|err| err.to_string())?;
    if loaded.stale_lock_ms != 120_000 || loaded.out_root.is_some() {
        return Err("expected untouched defaults".to_string());
    }
    Ok(())
}

#[test]
fn shell_env_var_name_is_stable() -> TestResult {
    if SHELL_ENV_VAR != "SHELL" {
        return Err("SHELL_ENV_VAR changed unexpectedly".to_string());
    }
    Ok(())
}

#[test]
fn cleanup_shell_detects_zsh_by_basename() -> TestResult {
    let _guard = ENV_LOCK.lock().map_err(|err| err.to_string())?;
    unsafe {
        std::env::set_var(SHELL_ENV_VAR, "/usr/bin/zsh");
    }
    let detected = detect_cleanup_shell();
    unsafe {
        std::env::remove_var(SHELL_ENV_VAR);
    }
    if detected != "zsh" {
        return Err(format!("expected zsh, got {detected}"));
    }
    Ok(())
}

#[test]
fn cleanup_shell_defaults_to_bash_for_anything_else() -> TestResult {
    let _guard = ENV_LOCK.lock().map_err(|err| err.to_string())?;
    unsafe {
        std::env::set_var(SHELL_ENV_VAR, "/bin/fish");
    }
    let detected = detect_cleanup_shell();
    unsafe {
        std::env::remove_var(SHELL_ENV_VAR);
    }
    if detected != "bash" {
        return Err(format!("expected bash, got {detected}"));
    }
    Ok(())
}
