// campaign-core/src/core/state.rs
// ============================================================================
// Module: Campaign Run State
// Description: AttemptStatus, FlowRun, MissionGate, and RunState record types.
// Purpose: Define the single mutable aggregate persisted by the execution engine.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! `RunState` is the single authoritative, persisted record of one campaign
//! invocation. It is built up incrementally by the execution engine — one
//! `FlowRun` and `MissionGate` per completed mission — and written atomically
//! after every mission and at every terminal transition. Nothing outside the
//! engine mutates it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::AttemptId;
use crate::core::identifiers::CampaignId;
use crate::core::identifiers::FlowId;
use crate::core::identifiers::MissionId;
use crate::core::identifiers::ReasonCode;
use crate::core::identifiers::RunId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Attempt Status
// ============================================================================

/// Outcome classification of one (flow, mission) attempt.
///
/// # Invariants
/// - `Valid` is reachable only once every configured gate has passed.
/// - `InfraFailed` takes priority over `Invalid` when both could apply (see
///   the gate evaluator's upgrade rule).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The attempt completed and passed every configured gate.
    Valid,
    /// The attempt completed but failed one or more gates.
    Invalid,
    /// The attempt was skipped by the runner before it ran.
    Skipped,
    /// The attempt could not be evaluated due to an infrastructure failure
    /// (timeout, spawn failure, runner-reported error code).
    InfraFailed,
}

impl AttemptOutcome {
    /// Stable lowercase label used in persisted artifacts and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Skipped => "skipped",
            Self::InfraFailed => "infra_failed",
        }
    }
}

/// Per-attempt outcome and supporting reason codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptStatus {
    /// Zero-based mission index, forced to `segmentOffset + positionInSummary`.
    pub mission_index: usize,
    /// Mission identifier as reported by the suite.
    pub mission_id: MissionId,
    /// Attempt identifier as reported by the child runner.
    pub attempt_id: AttemptId,
    /// Absolute filesystem path to the attempt directory, if the runner produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_dir: Option<String>,
    /// Outcome classification.
    pub status: AttemptOutcome,
    /// Opaque runner-specific reference (e.g. a session or trace id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_ref: Option<String>,
    /// Runner-reported error code, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_error_code: Option<String>,
    /// Auto-feedback code emitted by the runner, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_feedback_code: Option<String>,
    /// Deduplicated, sorted reason codes explaining the outcome.
    #[serde(default)]
    pub errors: Vec<ReasonCode>,
}

// ============================================================================
// SECTION: Flow Run
// ============================================================================

/// One flow's execution result for one mission segment (always exactly one
/// attempt; the runner adapter synthesizes a sentinel when the child produced
/// none).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRun {
    /// Flow identifier.
    pub flow_id: FlowId,
    /// Runner type tag copied from the flow spec.
    pub runner_type: String,
    /// Child-reported run identifier from the suite summary.
    pub run_id: String,
    /// Path to the materialized suite file passed to the child.
    pub suite_file: String,
    /// Child process exit code.
    pub exit_code: i32,
    /// Whether the child reported success (`suite summary ok == true`).
    pub ok: bool,
    /// Deduplicated, sorted reason codes for this flow run.
    #[serde(default)]
    pub errors: Vec<ReasonCode>,
    /// Bounded tail of the child's standard-error output.
    #[serde(default)]
    pub error_output: String,
    /// The attempts produced by this flow run (always exactly one element).
    pub attempts: Vec<AttemptStatus>,
}

// ============================================================================
// SECTION: Mission Gate
// ============================================================================

/// One attempt's gate-evaluator summary, as recorded on a `MissionGate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionGateAttempt {
    /// Flow identifier.
    pub flow_id: FlowId,
    /// Attempt identifier.
    pub attempt_id: AttemptId,
    /// Attempt directory path, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_dir: Option<String>,
    /// Outcome classification after gate evaluation (may be upgraded from the
    /// runner adapter's initial classification).
    pub status: AttemptOutcome,
    /// Whether the attempt is gate-clean.
    pub ok: bool,
    /// Deduplicated, sorted reason codes for this attempt.
    #[serde(default)]
    pub errors: Vec<ReasonCode>,
}

/// Per-mission cross-flow gate verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionGate {
    /// Zero-based mission index.
    pub mission_index: usize,
    /// Mission identifier.
    pub mission_id: MissionId,
    /// Whether every attempt for this mission is gate-clean.
    pub ok: bool,
    /// Deduplicated, sorted union of every attempt's gate errors.
    #[serde(default)]
    pub reasons: Vec<ReasonCode>,
    /// Per-flow attempt summaries for this mission.
    pub attempts: Vec<MissionGateAttempt>,
}

// ============================================================================
// SECTION: Run State
// ============================================================================

/// Terminal (or in-progress) status of a campaign invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The engine is actively executing and holds the campaign lock.
    Running,
    /// All mission gates passed with no fatal reason codes.
    Valid,
    /// At least one mission gate failed, or a fatal reason code was recorded.
    Invalid,
    /// The campaign-global deadline elapsed before completion.
    Aborted,
}

impl RunStatus {
    /// Stable lowercase label used in persisted artifacts and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Aborted => "aborted",
        }
    }
}

/// Lock-ownership metadata recorded on the run state while `status == running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockOwner {
    /// Process id of the owning engine invocation.
    pub pid: u32,
    /// Wall-clock time the lock was acquired.
    pub started_at: Timestamp,
}

/// The single mutable aggregate persisted after every transition.
///
/// # Invariants
/// - `missions_completed == missions.len()` and never exceeds `total_missions`.
/// - `status == Running` only while the engine holds the campaign lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    /// Schema version of this run-state document.
    pub schema_version: String,
    /// Campaign identifier.
    pub campaign_id: CampaignId,
    /// This invocation's run identifier.
    pub run_id: RunId,
    /// The prior run id this invocation resumed from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumed_from_run_id: Option<RunId>,
    /// Absolute path to the spec file used for this run.
    pub spec_path: String,
    /// Resolved output root for this run's artifacts.
    pub out_root: String,
    /// Current lifecycle status.
    pub status: RunStatus,
    /// Wall-clock time execution began.
    pub started_at: Timestamp,
    /// Wall-clock time execution reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
    /// Count of missions for which a `MissionGate` has been recorded.
    pub missions_completed: usize,
    /// Total missions declared by the spec.
    pub total_missions: usize,
    /// Whether this was a canary (partial) invocation.
    pub canary: bool,
    /// The resolved mission-index list this invocation is iterating.
    pub mission_indexes: Vec<usize>,
    /// One entry per (mission, flow) dispatch recorded so far, in dispatch order.
    #[serde(default)]
    pub flows: Vec<FlowRun>,
    /// One entry per completed mission, in mission order.
    #[serde(default)]
    pub missions: Vec<MissionGate>,
    /// Deduplicated, sorted union of every reason code recorded so far.
    #[serde(default)]
    pub reason_codes: Vec<ReasonCode>,
    /// Lock-ownership metadata while `status == running`.
    pub lock_owner: LockOwner,
}

impl RunState {
    /// Creates a freshly initialized, `running` run state.
    #[must_use]
    pub fn new_running(
        campaign_id: CampaignId,
        run_id: RunId,
        resumed_from_run_id: Option<RunId>,
        spec_path: String,
        out_root: String,
        total_missions: usize,
        canary: bool,
        mission_indexes: Vec<usize>,
        started_at: Timestamp,
        lock_owner: LockOwner,
    ) -> Self {
        Self {
            schema_version: "1".to_string(),
            campaign_id,
            run_id,
            resumed_from_run_id,
            spec_path,
            out_root,
            status: RunStatus::Running,
            started_at,
            finished_at: None,
            missions_completed: 0,
            total_missions,
            canary,
            mission_indexes,
            flows: Vec::new(),
            missions: Vec::new(),
            reason_codes: Vec::new(),
            lock_owner,
        }
    }

    /// Appends a mission's flow runs and gate verdict, updating
    /// `missions_completed` and merging reason codes.
    pub fn record_mission(&mut self, flow_runs: Vec<FlowRun>, gate: MissionGate) {
        for flow_run in &flow_runs {
            self.reason_codes.extend(flow_run.errors.iter().cloned());
        }
        self.reason_codes.extend(gate.reasons.iter().cloned());
        self.flows.extend(flow_runs);
        self.missions.push(gate);
        self.missions_completed = self.missions.len();
        self.dedupe_reason_codes();
    }

    /// Appends a standalone reason code (e.g. a cleanup-hook failure) without
    /// an associated mission.
    pub fn append_reason(&mut self, reason: ReasonCode) {
        self.reason_codes.push(reason);
        self.dedupe_reason_codes();
    }

    /// Sorts and deduplicates `reason_codes` for deterministic, byte-identical
    /// persistence across runs with identical inputs.
    fn dedupe_reason_codes(&mut self) {
        self.reason_codes.sort();
        self.reason_codes.dedup();
    }

    /// Computes and applies the terminal status, given whether the global
    /// deadline tripped.
    pub fn finish(&mut self, deadline_elapsed: bool, finished_at: Timestamp) {
        self.status = if deadline_elapsed {
            RunStatus::Aborted
        } else if self.missions.iter().all(|gate| gate.ok) && self.reason_codes.is_empty() {
            RunStatus::Valid
        } else {
            RunStatus::Invalid
        };
        self.finished_at = Some(finished_at);
        self.dedupe_reason_codes();
    }
}
