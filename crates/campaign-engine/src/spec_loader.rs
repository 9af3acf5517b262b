// campaign-engine/src/spec_loader.rs
// ============================================================================
// Module: Spec Loader
// Description: Loads a campaign spec and every flow's suite from disk.
// Purpose: Turn a spec path into a validated, policy-checked ParsedSpec.
// Dependencies: campaign-core, serde_json, serde_yaml
// ============================================================================

//! ## Overview
//! `campaign-core`'s spec types are I/O-free by design; this module does the
//! disk reads their doc comments defer to "the engine crate's job": decoding
//! the spec file by extension, materializing each flow's suite, and running
//! the pure mission-selection/prompt-mode/tool-driver checks from
//! `campaign_core` against the result.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use campaign_core::CampaignSpec;
use campaign_core::FlowId;
use campaign_core::MaterializedSuite;
use campaign_core::ParsedSpec;
use campaign_core::PromptModeViolationError;
use campaign_core::SpecError;
use campaign_core::enforce_tool_driver_shim_policy;
use campaign_core::resolve_mission_indexes;
use campaign_core::scan_forbidden_prompt_terms;
use thiserror::Error;

/// Errors raised while loading a campaign spec and its flow suites.
#[derive(Debug, Error)]
pub enum SpecLoadError {
    /// The spec or a suite file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The spec or a suite file's extension is not `.json`, `.yaml`, or `.yml`.
    #[error("{path} has an unrecognized extension (expected .json, .yaml, or .yml)")]
    UnknownExtension {
        /// Path with the unrecognized extension.
        path: String,
    },
    /// The spec or a suite file failed to decode.
    #[error("failed to decode {path}: {message}")]
    Decode {
        /// Path that failed to decode.
        path: String,
        /// Underlying decode error text (never `{:?}`).
        message: String,
    },
    /// The decoded spec failed structural validation.
    #[error(transparent)]
    Invalid(#[from] SpecError),
    /// `promptMode=mission-only` found a forbidden term in a resolved prompt.
    #[error(transparent)]
    PromptMode(#[from] PromptModeViolationError),
}

/// Loads, validates, and policy-checks the campaign spec at `spec_path`,
/// producing a [`ParsedSpec`] ready for execution.
///
/// # Errors
///
/// Returns [`SpecLoadError`] on any read, decode, structural-validation,
/// mission-selection, or policy failure.
pub fn load_parsed_spec(spec_path: &Path) -> Result<ParsedSpec, SpecLoadError> {
    let spec: CampaignSpec = decode_file(spec_path)?;
    spec.validate()?;

    let mission_indexes = resolve_mission_indexes(&spec.mission_source.selection, spec.total_missions)?;

    let mut flow_suites: BTreeMap<FlowId, MaterializedSuite> = BTreeMap::new();
    for flow in &spec.flows {
        let suite = materialize_suite(spec_path, flow)?;
        flow_suites.insert(flow.flow_id.clone(), suite);
    }

    scan_forbidden_prompt_terms(&spec, &mission_indexes, &flow_suites)?;
    enforce_tool_driver_shim_policy(&spec)?;

    Ok(ParsedSpec {
        spec,
        spec_path: absolute_path(spec_path),
        mission_indexes,
        flow_suites,
    })
}

/// Materializes one flow's suite from its inline definition or its
/// `suiteFile`, resolved relative to the spec file's own directory.
fn materialize_suite(
    spec_path: &Path,
    flow: &campaign_core::FlowSpec,
) -> Result<MaterializedSuite, SpecLoadError> {
    if let Some(inline) = &flow.suite {
        return Ok(MaterializedSuite {
            suite_id: inline.suite_id.clone(),
            missions: inline.missions.clone(),
        });
    }
    let Some(suite_file) = &flow.suite_file else {
        return Err(SpecLoadError::Invalid(SpecError::MissingSuite(flow.flow_id.to_string())));
    };
    let suite_path = resolve_relative(spec_path, suite_file);
    decode_file(&suite_path)
}

/// Resolves `candidate` relative to `base`'s parent directory, unless
/// `candidate` is already absolute.
fn resolve_relative(base: &Path, candidate: &str) -> PathBuf {
    let candidate_path = Path::new(candidate);
    if candidate_path.is_absolute() {
        return candidate_path.to_path_buf();
    }
    base.parent().map_or_else(|| candidate_path.to_path_buf(), |parent| parent.join(candidate_path))
}

/// Decodes a `.json`/`.yaml`/`.yml` file into `T`.
fn decode_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, SpecLoadError> {
    let bytes = fs::read(path).map_err(|source| SpecLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    match path.extension().and_then(std::ffi::OsStr::to_str) {
        Some("json") => serde_json::from_slice(&bytes).map_err(|err| SpecLoadError::Decode {
            path: path.display().to_string(),
            message: err.to_string(),
        }),
        Some("yaml" | "yml") => serde_yaml::from_slice(&bytes).map_err(|err| SpecLoadError::Decode {
            path: path.display().to_string(),
            message: err.to_string(),
        }),
        _ => Err(SpecLoadError::UnknownExtension {
            path: path.display().to_string(),
        }),
    }
}

/// Canonicalizes `path`, falling back to its given form if canonicalization
/// fails (e.g. the file was just deleted out from under us).
fn absolute_path(path: &Path) -> String {
    fs::canonicalize(path).map_or_else(|_| path.display().to_string(), |canonical| canonical.display().to_string())
}
