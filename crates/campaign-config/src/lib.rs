// campaign-config/src/lib.rs
// ============================================================================
// Module: Campaign Config Library
// Description: Output-root resolution, the version floor check, the stale-lock
//              threshold knob, and cleanup-hook shell detection.
// Purpose: Single source of truth for campaign.toml semantics.
// Dependencies: campaign-core, serde, toml
// ============================================================================

//! ## Overview
//! `campaign-config` is deliberately small: it owns every setting that sits
//! outside a campaign spec but still shapes how the engine runs one —
//! output-root resolution, the `ZCL_MIN_VERSION` floor enforced by the CLI,
//! the lock manager's stale-lock threshold, and which shell invokes cleanup
//! hooks. Config inputs are untrusted, like a campaign spec; loading fails
//! closed rather than guessing at a reasonable default for malformed input.

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Environment variable consulted when no `--out-root` flag is given.
pub const OUT_ROOT_ENV_VAR: &str = "ZCL_OUT_DIR";
/// Environment variable carrying the minimum accepted tool version.
pub const MIN_VERSION_ENV_VAR: &str = "ZCL_MIN_VERSION";
/// Environment variable used to select the cleanup-hook shell.
pub const SHELL_ENV_VAR: &str = "SHELL";
/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "campaign.toml";
/// Default output root used when nothing else resolves one.
pub const DEFAULT_OUT_ROOT: &str = "./campaign-out";
/// Default stale-lock threshold in milliseconds (2 minutes).
const DEFAULT_STALE_LOCK_MS: u64 = 120_000;
/// Default lock-wait budget in milliseconds before failing with `lock_held`.
const DEFAULT_LOCK_WAIT_MS: u64 = 5_000;
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024;
/// Shell invoked for cleanup hooks when `SHELL` is unset or unrecognized.
const DEFAULT_CLEANUP_SHELL: &str = "bash";

/// Errors raised while loading or validating `campaign.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config at {path}: {source}")]
    Io {
        /// Path that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file exceeded the size limit or was not valid TOML.
    #[error("failed to parse config at {path}: {message}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Human-readable parse failure.
        message: String,
    },
    /// A field failed validation.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Raised when the running tool's version is below the configured floor.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("tool version {current} is below the configured floor {floor} (set via {MIN_VERSION_ENV_VAR})")]
pub struct VersionFloorError {
    /// The floor read from `ZCL_MIN_VERSION`.
    pub floor: String,
    /// The running tool's own version.
    pub current: String,
}

/// Engine-facing settings not carried by a campaign spec.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignConfig {
    /// Default output root used when no `--out-root`/`ZCL_OUT_DIR`/spec value
    /// resolves one.
    #[serde(default)]
    pub out_root: Option<String>,
    /// Stale-lock threshold in milliseconds; see the lock manager's
    /// reclamation rule.
    #[serde(default = "default_stale_lock_ms")]
    pub stale_lock_ms: u64,
    /// Maximum time to poll for a held lock before failing, in milliseconds.
    #[serde(default = "default_lock_wait_ms")]
    pub lock_wait_ms: u64,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            out_root: None,
            stale_lock_ms: default_stale_lock_ms(),
            lock_wait_ms: default_lock_wait_ms(),
        }
    }
}

/// Default stale-lock threshold, in milliseconds.
const fn default_stale_lock_ms() -> u64 {
    DEFAULT_STALE_LOCK_MS
}

/// Default lock-wait budget, in milliseconds.
const fn default_lock_wait_ms() -> u64 {
    DEFAULT_LOCK_WAIT_MS
}

impl CampaignConfig {
    /// Loads configuration from `path`, or returns the default configuration
    /// when `path` is `None` and [`DEFAULT_CONFIG_NAME`] does not exist in the
    /// current directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a config file exists but cannot be read,
    /// exceeds the size limit, fails to parse, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = match path {
            Some(explicit) => explicit.to_path_buf(),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_NAME);
                if default_path.exists() {
                    default_path.to_path_buf()
                } else {
                    return Ok(Self::default());
                }
            }
        };

        let metadata = fs::metadata(&resolved).map_err(|source| ConfigError::Io {
            path: resolved.display().to_string(),
            source,
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Parse {
                path: resolved.display().to_string(),
                message: "config file exceeds size limit".to_string(),
            });
        }

        let content = fs::read_to_string(&resolved).map_err(|source| ConfigError::Io {
            path: resolved.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|err| ConfigError::Parse {
            path: resolved.display().to_string(),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a numeric setting is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stale_lock_ms == 0 {
            return Err(ConfigError::Invalid("stale_lock_ms must be greater than zero".to_string()));
        }
        if self.lock_wait_ms == 0 {
            return Err(ConfigError::Invalid("lock_wait_ms must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Resolves the effective output root.
///
/// Precedence, highest first: an explicit `--out-root` flag, the spec's own
/// `outRoot` field, the `ZCL_OUT_DIR` environment variable, this config's
/// `out_root` setting, then [`DEFAULT_OUT_ROOT`].
#[must_use]
pub fn resolve_out_root(
    cli_out_root: Option<&str>,
    spec_out_root: Option<&str>,
    config: &CampaignConfig,
) -> String {
    if let Some(value) = cli_out_root.filter(|value| !value.trim().is_empty()) {
        return value.to_string();
    }
    if let Some(value) = spec_out_root.filter(|value| !value.trim().is_empty()) {
        return value.to_string();
    }
    if let Ok(value) = env::var(OUT_ROOT_ENV_VAR) {
        if !value.trim().is_empty() {
            return value;
        }
    }
    if let Some(value) = config.out_root.as_deref().filter(|value| !value.trim().is_empty()) {
        return value.to_string();
    }
    DEFAULT_OUT_ROOT.to_string()
}

/// Enforces the `ZCL_MIN_VERSION` floor against the running tool's own
/// version.
///
/// Both versions are compared component-wise as dot-separated non-negative
/// integers (e.g. `1.4.2`); a missing trailing component is treated as `0`.
/// An unset or malformed floor is treated as no floor.
///
/// # Errors
///
/// Returns [`VersionFloorError`] when `current` sorts below the configured
/// floor.
pub fn enforce_version_floor(current: &str) -> Result<(), VersionFloorError> {
    let Ok(floor) = env::var(MIN_VERSION_ENV_VAR) else {
        return Ok(());
    };
    let Some(floor_parts) = parse_version(&floor) else {
        return Ok(());
    };
    let Some(current_parts) = parse_version(current) else {
        return Ok(());
    };
    if current_parts < floor_parts {
        return Err(VersionFloorError {
            floor,
            current: current.to_string(),
        });
    }
    Ok(())
}

/// Parses a dot-separated numeric version into a comparable vector.
fn parse_version(raw: &str) -> Option<Vec<u64>> {
    let trimmed = raw.trim().trim_start_matches('v');
    if trimmed.is_empty() {
        return None;
    }
    trimmed.split('.').map(|part| part.parse::<u64>().ok()).collect()
}

/// Detects which shell should invoke cleanup hooks.
///
/// Reads `SHELL`; if its final path component is `zsh`, returns `"zsh"`,
/// otherwise returns `"bash"` (the default when `SHELL` is unset,
/// unreadable, or any other shell).
#[must_use]
pub fn detect_cleanup_shell() -> String {
    match env::var(SHELL_ENV_VAR) {
        Ok(value) => {
            let name = value.rsplit('/').next().unwrap_or(value.as_str());
            if name == "zsh" {
                "zsh".to_string()
            } else {
                DEFAULT_CLEANUP_SHELL.to_string()
            }
        }
        Err(_) => DEFAULT_CLEANUP_SHELL.to_string(),
    }
}
