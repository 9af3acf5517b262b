// campaign-engine/src/persist.rs
// ============================================================================
// Module: Campaign Artifact Persister
// Description: Write-temp-then-rename atomic artifact writer.
// Purpose: Give every other engine component crash-consistent JSON/text writes.
// Dependencies: campaign-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every artifact the engine writes goes through [`ArtifactPersister`], which
//! always writes to a randomly-suffixed temp file in the target directory,
//! syncs it, then renames it over the final path. Renames within the same
//! directory are atomic on POSIX and Windows, so a reader never observes a
//! partially written file. Grounded in the `atomic_write` helper from
//! `iridite-tandem`'s orchestrator store (write-then-rename) and the
//! `ArtifactSink`/`ArtifactReader` trait split from the teacher's runpack
//! builder (a dedicated component owns every write path).

use std::fs;
use std::fs::File;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use campaign_core::CampaignId;
use campaign_core::FlowId;
use campaign_core::MaterializedSuite;
use campaign_core::ReasonCode;
use campaign_core::RunId;
use campaign_core::RunState;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Artifact persister errors.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Filesystem I/O failed for the given path.
    #[error("artifact io error at {path}: {source}")]
    Io {
        /// Path the operation was attempted against.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Serialization to JSON failed.
    #[error("artifact serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    /// A previously written artifact failed to decode.
    #[error("artifact decode error at {path}: {source}")]
    Decode {
        /// Path that failed to decode.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

// ============================================================================
// SECTION: Report / Summary Shapes
// ============================================================================

/// Campaign-level build report persisted as `report.json`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    /// Campaign identifier.
    pub campaign_id: CampaignId,
    /// Run identifier this report was generated from.
    pub run_id: RunId,
    /// Terminal or in-progress status, as a string.
    pub status: String,
    /// Missions completed so far.
    pub missions_completed: usize,
    /// Total missions declared by the spec.
    pub total_missions: usize,
    /// Every reason code recorded so far, sorted and deduplicated.
    pub reason_codes: Vec<ReasonCode>,
}

impl BuildReport {
    /// Derives a [`BuildReport`] from a run state.
    #[must_use]
    pub fn from_run_state(state: &RunState) -> Self {
        Self {
            campaign_id: state.campaign_id.clone(),
            run_id: state.run_id.clone(),
            status: state.status.as_str().to_string(),
            missions_completed: state.missions_completed,
            total_missions: state.total_missions,
            reason_codes: state.reason_codes.clone(),
        }
    }
}

/// Campaign-level build summary persisted as `summary.json`: a compact,
/// A/B-comparable view across flows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
    /// Campaign identifier.
    pub campaign_id: CampaignId,
    /// Per-mission pass/fail, in mission order.
    pub missions: Vec<MissionSummary>,
}

/// One mission's compact summary row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionSummary {
    /// Zero-based mission index.
    pub mission_index: usize,
    /// Whether the mission gate passed.
    pub ok: bool,
    /// Per-flow outcome label, keyed by flow id.
    pub flows: Vec<(FlowId, String)>,
}

impl BuildSummary {
    /// Derives a [`BuildSummary`] from a run state.
    #[must_use]
    pub fn from_run_state(state: &RunState) -> Self {
        let missions = state
            .missions
            .iter()
            .map(|gate| MissionSummary {
                mission_index: gate.mission_index,
                ok: gate.ok,
                flows: gate
                    .attempts
                    .iter()
                    .map(|attempt| (attempt.flow_id.clone(), attempt.status.as_str().to_string()))
                    .collect(),
            })
            .collect();
        Self {
            campaign_id: state.campaign_id.clone(),
            missions,
        }
    }
}

// ============================================================================
// SECTION: Artifact Persister
// ============================================================================

/// Write-temp-then-rename atomic writer for every campaign output artifact.
#[derive(Debug, Clone)]
pub struct ArtifactPersister {
    out_root: PathBuf,
}

impl ArtifactPersister {
    /// Creates a persister rooted at `out_root`.
    #[must_use]
    pub fn new(out_root: PathBuf) -> Self {
        Self {
            out_root,
        }
    }

    /// Returns `<outRoot>/campaigns/<campaignId>`.
    #[must_use]
    pub fn campaign_dir(&self, campaign_id: &CampaignId) -> PathBuf {
        self.out_root.join("campaigns").join(campaign_id.as_str())
    }

    /// Returns `<outRoot>/runs/<runId>`.
    #[must_use]
    pub fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.out_root.join("runs").join(run_id.as_str())
    }

    /// Writes `run-state.json` to both its run-level mirror and its
    /// campaign-level alias. Both copies are byte-identical.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if either write fails.
    pub fn write_run_state(&self, state: &RunState) -> Result<(), PersistError> {
        let run_path = self.run_dir(&state.run_id).join("run-state.json");
        let campaign_path = self.campaign_dir(&state.campaign_id).join("run-state.json");
        self.write_atomic_json(&run_path, state)?;
        self.write_atomic_json(&campaign_path, state)
    }

    /// Reads the campaign-level `run-state.json`, if one has been written.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the file exists but cannot be read or
    /// decoded.
    pub fn read_run_state(&self, campaign_id: &CampaignId) -> Result<Option<RunState>, PersistError> {
        let path = self.campaign_dir(campaign_id).join("run-state.json");
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|source| PersistError::Io {
            path: path.clone(),
            source,
        })?;
        let state = serde_json::from_slice(&bytes).map_err(|source| PersistError::Decode {
            path,
            source,
        })?;
        Ok(Some(state))
    }

    /// Writes `report.json` under the campaign directory.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the write fails.
    pub fn write_report(&self, report: &BuildReport) -> Result<(), PersistError> {
        let path = self.campaign_dir(&report.campaign_id).join("report.json");
        self.write_atomic_json(&path, report)
    }

    /// Writes `summary.json` under the campaign directory.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the write fails.
    pub fn write_summary(&self, summary: &BuildSummary) -> Result<(), PersistError> {
        let path = self.campaign_dir(&summary.campaign_id).join("summary.json");
        self.write_atomic_json(&path, summary)
    }

    /// Writes `RESULTS.md` under the campaign directory.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the write fails.
    pub fn write_results_md(&self, campaign_id: &CampaignId, markdown: &str) -> Result<(), PersistError> {
        let path = self.campaign_dir(campaign_id).join("RESULTS.md");
        self.write_atomic_bytes(&path, markdown.as_bytes())
    }

    /// Materializes a flow's suite to
    /// `generated-suites/<flowId>.suite.json` and returns its path.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the write fails.
    pub fn write_generated_suite(
        &self,
        campaign_id: &CampaignId,
        flow_id: &FlowId,
        suite: &MaterializedSuite,
    ) -> Result<PathBuf, PersistError> {
        let path = self
            .campaign_dir(campaign_id)
            .join("generated-suites")
            .join(format!("{flow_id}.suite.json"));
        self.write_atomic_json(&path, suite)?;
        Ok(path)
    }

    fn write_atomic_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), PersistError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_atomic_bytes(path, &bytes)
    }

    fn write_atomic_bytes(&self, path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|source| PersistError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let suffix: u64 = rand::thread_rng().r#gen();
        let tmp_path = dir.join(format!(
            "{}.tmp-{suffix:016x}",
            path.file_name().and_then(|name| name.to_str()).unwrap_or("artifact")
        ));

        let mut file = File::create(&tmp_path).map_err(|source| PersistError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        file.write_all(bytes).map_err(|source| PersistError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        file.sync_all().map_err(|source| PersistError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        drop(file);

        fs::rename(&tmp_path, path).map_err(|source| PersistError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
