// campaign-core/src/core/spec.rs
// ============================================================================
// Module: Campaign Specification
// Description: CampaignSpec, FlowSpec, and the resolved ParsedSpec data model.
// Purpose: Define the canonical campaign spec shape plus pure resolution/validation helpers.
// Dependencies: crate::core::identifiers, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A `CampaignSpec` is the immutable, typed input to one campaign invocation.
//! This module defines its shape, the per-flow `FlowSpec`, and the pure
//! (I/O-free) resolution helpers that turn a spec plus materialized flow
//! suites into a `ParsedSpec`: mission-index resolution, the prompt-mode
//! forbidden-term scan, and the tool-driver/shim policy check. Loading the
//! spec file and each flow's suite file from disk is the engine crate's job;
//! everything here operates on already-decoded values so it stays unit
//! testable without a filesystem.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::CampaignId;
use crate::core::identifiers::FlowId;
use crate::core::identifiers::MissionId;
use crate::core::identifiers::SuiteId;

// ============================================================================
// SECTION: Campaign Specification
// ============================================================================

/// Prompt exposure mode for a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptMode {
    /// Only the mission's own prompt may be sent; forbidden terms are scanned for.
    MissionOnly,
    /// No forbidden-term scanning is applied.
    Free,
}

/// Pair-gate configuration: the cross-flow, per-mission verdict requiring all
/// flows' attempts to pass trace/artifact/timeout checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairGateSpec {
    /// Whether the pair-gate is evaluated at all.
    #[serde(default)]
    pub enabled: bool,
    /// Whether a failing mission gate halts the main loop immediately.
    #[serde(default)]
    pub stop_on_first_mission_failure: bool,
    /// Optional named trace-profile to apply for additional findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_profile: Option<String>,
}

impl Default for PairGateSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            stop_on_first_mission_failure: false,
            trace_profile: None,
        }
    }
}

/// External semantic validator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticSpec {
    /// Whether the semantic validator runs at all.
    #[serde(default)]
    pub enabled: bool,
    /// Path to the semantic rules file, required when `enabled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_path: Option<String>,
}

impl Default for SemanticSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            rules_path: None,
        }
    }
}

/// Prompt-mode forbidden-term policy configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoContextSpec {
    /// Case-sensitive terms that must not appear in any resolved prompt under `mission-only` mode.
    #[serde(default)]
    pub forbidden_prompt_terms: Vec<String>,
}

/// Timeout configuration for the whole campaign and its cleanup hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutsSpec {
    /// Campaign-global deadline in milliseconds; 0 disables the deadline.
    #[serde(default)]
    pub campaign_global_timeout_ms: u64,
    /// Per-cleanup-hook deadline in milliseconds.
    #[serde(default = "default_cleanup_hook_timeout_ms")]
    pub cleanup_hook_timeout_ms: u64,
}

const fn default_cleanup_hook_timeout_ms() -> u64 {
    30_000
}

impl Default for TimeoutsSpec {
    fn default() -> Self {
        Self {
            campaign_global_timeout_ms: 0,
            cleanup_hook_timeout_ms: default_cleanup_hook_timeout_ms(),
        }
    }
}

/// Mission-dispatch ordering across flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowMode {
    /// All flows of mission A run before mission B begins (default).
    PerMission,
    /// All missions of flow A run, then all missions of flow B.
    PerFlow,
}

impl Default for FlowMode {
    fn default() -> Self {
        Self::PerMission
    }
}

/// Execution-mode configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSpec {
    /// Resolved flow dispatch order.
    #[serde(default)]
    pub flow_mode: FlowMode,
}

/// Mission selection mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum SelectionMode {
    /// Select every mission index in `[0, totalMissions)`.
    All,
    /// Select an explicit, literal list of zero-based indexes.
    Indexes {
        /// The explicit indexes, in declared order.
        indexes: Vec<usize>,
    },
    /// Select a contiguous half-open range `[start, end)`.
    Range {
        /// Inclusive start index.
        start: usize,
        /// Exclusive end index.
        end: usize,
    },
}

impl Default for SelectionMode {
    fn default() -> Self {
        Self::All
    }
}

/// Mission-source configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionSourceSpec {
    /// Selection mode used to resolve `missionIndexes`.
    #[serde(default)]
    pub selection: SelectionMode,
}

/// Policy over what counts as a publishable terminal run-state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidRunPolicySpec {
    /// Statuses that are acceptable for publication; empty means "no additional restriction".
    #[serde(default)]
    pub statuses: Vec<String>,
    /// Whether publication requires `status == valid` (vs. merely `!= aborted`).
    #[serde(default = "default_true")]
    pub publish_requires_valid: bool,
    /// Name of the CLI flag that overrides the policy (documentation only; the engine honors `--force`).
    #[serde(default)]
    pub force_flag: Option<String>,
}

const fn default_true() -> bool {
    true
}

impl Default for InvalidRunPolicySpec {
    fn default() -> Self {
        Self {
            statuses: Vec::new(),
            publish_requires_valid: true,
            force_flag: None,
        }
    }
}

/// Output path overrides for the artifact persister.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    /// Override for the campaign-level report path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
    /// Override for the campaign-level summary path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_path: Option<String>,
    /// Override for the campaign-level RESULTS.md path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_md_path: Option<String>,
    /// Whether `campaign report`/`publish-check` should run automatically after `run`.
    #[serde(default)]
    pub publish_check: bool,
}

/// Canonical campaign specification (immutable input).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSpec {
    /// Spec schema version string.
    pub schema_version: String,
    /// Campaign identifier; must match `[A-Za-z0-9_.-]+`.
    pub campaign_id: CampaignId,
    /// Prompt exposure mode.
    #[serde(default = "default_prompt_mode")]
    pub prompt_mode: PromptMode,
    /// Total number of missions available for selection.
    pub total_missions: usize,
    /// Default number of missions for `campaign canary` when `--missions` is absent.
    #[serde(default = "default_canary_missions")]
    pub canary_missions: usize,
    /// Optional spec-level output-root override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_root: Option<String>,
    /// Stop the main loop on the first flow run with a non-zero exit code.
    #[serde(default)]
    pub fail_fast: bool,
    /// Pair-gate configuration.
    #[serde(default)]
    pub pair_gate: PairGateSpec,
    /// Semantic validator configuration.
    #[serde(default)]
    pub semantic: SemanticSpec,
    /// Forbidden-term policy configuration.
    #[serde(default)]
    pub no_context: NoContextSpec,
    /// Timeout configuration.
    #[serde(default)]
    pub timeouts: TimeoutsSpec,
    /// Execution-mode configuration.
    #[serde(default)]
    pub execution: ExecutionSpec,
    /// Mission-source configuration.
    #[serde(default)]
    pub mission_source: MissionSourceSpec,
    /// Publication policy over terminal run-state.
    #[serde(default)]
    pub invalid_run_policy: InvalidRunPolicySpec,
    /// Output path overrides.
    #[serde(default)]
    pub output: OutputSpec,
    /// Shell commands run once after the main loop completes, in declaration
    /// order, each bounded by `timeouts.cleanupHookTimeoutMs`.
    #[serde(default)]
    pub cleanup_hooks: Vec<String>,
    /// Per-flow runner configurations, in declaration order.
    pub flows: Vec<FlowSpec>,
    /// Opaque extension data preserved but not interpreted by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

fn default_prompt_mode() -> PromptMode {
    PromptMode::Free
}

const fn default_canary_missions() -> usize {
    3
}

impl CampaignSpec {
    /// Validates the structural invariants of the spec that do not require
    /// loaded suite data: unique flow ids, non-empty commands, recognized
    /// tool-driver kinds, and result-channel consistency.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] on the first violated invariant.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.flows.is_empty() {
            return Err(SpecError::NoFlows);
        }

        let mut seen_flow_ids: Vec<&FlowId> = Vec::new();
        for flow in &self.flows {
            if seen_flow_ids.contains(&&flow.flow_id) {
                return Err(SpecError::DuplicateFlowId(flow.flow_id.to_string()));
            }
            seen_flow_ids.push(&flow.flow_id);
            flow.validate()?;
        }

        Ok(())
    }
}

// ============================================================================
// SECTION: Flow Specification
// ============================================================================

/// Session-isolation mode for a flow's runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionIsolation {
    /// Spawn a fresh agent session per attempt (required for campaign semantics).
    FreshPerAttempt,
    /// Reuse a session across attempts.
    Shared,
}

/// Result-channel kind describing how the child reports completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResultChannel {
    /// Completion is reported via a JSON file at `path`.
    FileJson {
        /// Path to the result file, relative to the attempt directory.
        path: String,
    },
    /// Completion is reported via a marker string on stdout.
    Marker {
        /// The literal marker string to scan for.
        marker: String,
    },
}

/// Finalization policy for a flow's runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizationSpec {
    /// Finalization mode name (e.g. `"auto"`, `"manual"`).
    pub mode: String,
    /// Minimum conversation turn at which a result may be accepted.
    #[serde(default)]
    pub min_result_turn: u32,
    /// Channel used to detect completion.
    pub result_channel: ResultChannel,
}

/// Tool-driver kind for a flow's runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolDriverKind {
    /// Native tool-calling support (no shim required).
    Native,
    /// Prompted tool-call emulation (requires a parsing shim).
    PromptedShim,
    /// MCP-mediated tool calling.
    Mcp,
}

/// Tool-driver configuration for a flow's runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDriverSpec {
    /// The tool-driver kind in use.
    pub kind: ToolDriverKind,
}

/// MCP tuning knobs, honored only when `toolDriver.kind == mcp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpSpec {
    /// Maximum number of tool calls permitted per attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tool_calls: Option<u32>,
    /// Idle timeout in milliseconds before the MCP session is torn down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_ms: Option<u64>,
    /// Whether the MCP session shuts down automatically on completion.
    #[serde(default)]
    pub shutdown_on_complete: bool,
}

impl Default for McpSpec {
    fn default() -> Self {
        Self {
            max_tool_calls: None,
            idle_timeout_ms: None,
            shutdown_on_complete: false,
        }
    }
}

/// Runner configuration for one flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerSpec {
    /// Runner type tag (documentation/selection only; the engine always spawns `command`).
    #[serde(rename = "type")]
    pub runner_type: String,
    /// Runner mode string passed through to the child as `--mode`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Child process argv; `command[0]` must be non-empty.
    pub command: Vec<String>,
    /// Additional environment variables merged into the child's environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Shim names enabled for this runner.
    #[serde(default)]
    pub shims: Vec<String>,
    /// Tool-driver configuration.
    pub tool_driver: ToolDriverSpec,
    /// Session-isolation mode.
    #[serde(default = "default_session_isolation")]
    pub session_isolation: SessionIsolation,
    /// Feedback policy name passed through to the child as `--feedback-policy`.
    pub feedback_policy: String,
    /// Finalization configuration.
    pub finalization: FinalizationSpec,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// When the per-attempt timeout begins counting (e.g. `"spawn"`, `"first-tool-call"`).
    pub timeout_start: String,
    /// Whether strict validation is requested.
    #[serde(default)]
    pub strict: bool,
    /// Whether strict expectation evaluation is requested.
    #[serde(default)]
    pub strict_expect: bool,
    /// MCP tuning, honored when `toolDriver.kind == mcp`.
    #[serde(default)]
    pub mcp: McpSpec,
}

fn default_session_isolation() -> SessionIsolation {
    SessionIsolation::FreshPerAttempt
}

/// Per-flow runner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSpec {
    /// Flow identifier; unique within the spec.
    pub flow_id: FlowId,
    /// Path to an external suite file; mutually exclusive with `suite`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_file: Option<String>,
    /// Inline suite definition; mutually exclusive with `suiteFile`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite: Option<InlineSuite>,
    /// Runner configuration.
    pub runner: RunnerSpec,
}

impl FlowSpec {
    /// Validates invariants that do not require loaded suite data.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] on the first violated invariant.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.suite_file.is_none() && self.suite.is_none() {
            return Err(SpecError::MissingSuite(self.flow_id.to_string()));
        }
        if self.runner.command.first().map(String::as_str).unwrap_or("").is_empty() {
            return Err(SpecError::EmptyCommand(self.flow_id.to_string()));
        }
        if let ResultChannel::FileJson {
            path,
        } = &self.runner.finalization.result_channel
            && path.trim().is_empty()
        {
            return Err(SpecError::MissingResultChannelPath(self.flow_id.to_string()));
        }
        Ok(())
    }
}

/// Inline suite definition embedded directly in the spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineSuite {
    /// Suite identifier.
    pub suite_id: SuiteId,
    /// Missions in declaration order.
    pub missions: Vec<MissionDef>,
}

/// One mission definition as it appears in a suite (inline or file-backed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionDef {
    /// Mission identifier.
    pub id: MissionId,
    /// Resolved prompt text for this mission.
    pub prompt: String,
    /// Free-form tags associated with the mission.
    #[serde(default)]
    pub tags: Vec<String>,
}

// ============================================================================
// SECTION: Materialized Suite / Parsed Spec
// ============================================================================

/// A flow's suite after loading (from `suiteFile` or `suite`), indexed for lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializedSuite {
    /// Suite identifier.
    pub suite_id: SuiteId,
    /// Missions in declaration order; index in this vector is the mission index.
    pub missions: Vec<MissionDef>,
}

/// The campaign spec plus everything resolved prior to execution: the
/// absolute spec path, the deduplicated mission-index selection, and each
/// flow's materialized suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSpec {
    /// The underlying campaign spec.
    pub spec: CampaignSpec,
    /// Absolute path to the spec file on disk.
    pub spec_path: String,
    /// Resolved, deduplicated, order-preserved mission indexes.
    pub mission_indexes: Vec<usize>,
    /// Each flow's materialized suite, keyed by flow id.
    pub flow_suites: BTreeMap<FlowId, MaterializedSuite>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Campaign specification validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpecError {
    /// Spec declares no flows.
    #[error("campaign spec must declare at least one flow")]
    NoFlows,
    /// Duplicate flow identifiers detected.
    #[error("duplicate flowId: {0}")]
    DuplicateFlowId(String),
    /// Flow declares neither `suiteFile` nor an inline `suite`.
    #[error("flow {0} must declare suiteFile or an inline suite")]
    MissingSuite(String),
    /// Flow's `runner.command[0]` is empty.
    #[error("flow {0} runner.command must have a non-empty command[0]")]
    EmptyCommand(String),
    /// Flow uses a file-json result channel without a path.
    #[error("flow {0} resultChannel kind=file-json requires a path")]
    MissingResultChannelPath(String),
    /// A selected mission index falls outside `[0, totalMissions)`.
    #[error("mission index {0} is out of range for totalMissions={1}")]
    MissionIndexOutOfRange(usize, usize),
    /// A range selection has `start > end`.
    #[error("mission selection range start {0} exceeds end {1}")]
    InvalidRange(usize, usize),
    /// A flow's tool-driver/shim combination violates its declared requirement.
    #[error("flow {flow_id} tool-driver requirement violated: {detail}")]
    ToolDriverShim {
        /// The offending flow.
        flow_id: String,
        /// Human-readable detail of the violation.
        detail: String,
    },
}

/// A single forbidden-term hit under `promptMode=mission-only`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForbiddenTermHit {
    /// Flow in which the term was found.
    pub flow_id: FlowId,
    /// Mission index in which the term was found.
    pub mission_index: usize,
    /// The offending term.
    pub term: String,
}

/// Prompt-mode policy violation: one or more forbidden terms were found.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("prompt-mode policy violated: {} offending term(s)", .0.len())]
pub struct PromptModeViolationError(pub Vec<ForbiddenTermHit>);

// ============================================================================
// SECTION: Resolution Helpers
// ============================================================================

/// Resolves the raw `SelectionMode` into deduplicated, order-preserved,
/// range-checked mission indexes.
///
/// # Errors
///
/// Returns [`SpecError::MissionIndexOutOfRange`] or
/// [`SpecError::InvalidRange`] when the selection cannot be satisfied against
/// `total_missions`.
pub fn resolve_mission_indexes(
    selection: &SelectionMode,
    total_missions: usize,
) -> Result<Vec<usize>, SpecError> {
    let raw: Vec<usize> = match selection {
        SelectionMode::All => (0..total_missions).collect(),
        SelectionMode::Indexes {
            indexes,
        } => indexes.clone(),
        SelectionMode::Range {
            start,
            end,
        } => {
            if start > end {
                return Err(SpecError::InvalidRange(*start, *end));
            }
            (*start..*end).collect()
        }
    };

    let mut seen = std::collections::HashSet::with_capacity(raw.len());
    let mut resolved = Vec::with_capacity(raw.len());
    for index in raw {
        if index >= total_missions {
            return Err(SpecError::MissionIndexOutOfRange(index, total_missions));
        }
        if seen.insert(index) {
            resolved.push(index);
        }
    }
    Ok(resolved)
}

/// Windows a resolved mission-index list to at most `limit` entries.
///
/// Per the engine's design decision, a `limit` at or beyond the list's length
/// is a no-op rather than a usage error.
#[must_use]
pub fn window_mission_indexes(mission_indexes: &[usize], limit: Option<usize>) -> Vec<usize> {
    match limit {
        Some(limit) if limit < mission_indexes.len() => mission_indexes[..limit].to_vec(),
        _ => mission_indexes.to_vec(),
    }
}

/// Scans every resolved prompt across every flow-suite for forbidden terms
/// when `spec.promptMode == mission-only`. Returns `Ok(())` when the mode is
/// `free` or no forbidden terms are configured.
///
/// # Errors
///
/// Returns [`PromptModeViolationError`] carrying every `{flowId, missionIndex,
/// term}` hit (not just the first) when any is found.
pub fn scan_forbidden_prompt_terms(
    spec: &CampaignSpec,
    mission_indexes: &[usize],
    flow_suites: &BTreeMap<FlowId, MaterializedSuite>,
) -> Result<(), PromptModeViolationError> {
    if spec.prompt_mode != PromptMode::MissionOnly || spec.no_context.forbidden_prompt_terms.is_empty() {
        return Ok(());
    }

    let mut hits = Vec::new();
    for flow in &spec.flows {
        let Some(suite) = flow_suites.get(&flow.flow_id) else {
            continue;
        };
        for &mission_index in mission_indexes {
            let Some(mission) = suite.missions.get(mission_index) else {
                continue;
            };
            for term in &spec.no_context.forbidden_prompt_terms {
                if mission.prompt.contains(term.as_str()) {
                    hits.push(ForbiddenTermHit {
                        flow_id: flow.flow_id.clone(),
                        mission_index,
                        term: term.clone(),
                    });
                }
            }
        }
    }

    if hits.is_empty() {
        Ok(())
    } else {
        Err(PromptModeViolationError(hits))
    }
}

/// Enforces that each flow's `runner.toolDriver.kind` paired with
/// `runner.shims` satisfies its declared requirement: `promptedShim` requires
/// at least one shim to be configured, while `native`/`mcp` must not declare
/// shims (a shim implies prompted tool-call parsing).
///
/// # Errors
///
/// Returns [`SpecError::ToolDriverShim`] for the first flow that violates the
/// requirement.
pub fn enforce_tool_driver_shim_policy(spec: &CampaignSpec) -> Result<(), SpecError> {
    for flow in &spec.flows {
        match flow.runner.tool_driver.kind {
            ToolDriverKind::PromptedShim if flow.runner.shims.is_empty() => {
                return Err(SpecError::ToolDriverShim {
                    flow_id: flow.flow_id.to_string(),
                    detail: "toolDriver.kind=prompted-shim requires at least one shim".to_string(),
                });
            }
            ToolDriverKind::Native | ToolDriverKind::Mcp if !flow.runner.shims.is_empty() => {
                return Err(SpecError::ToolDriverShim {
                    flow_id: flow.flow_id.to_string(),
                    detail: format!(
                        "toolDriver.kind={} must not declare shims",
                        tool_driver_kind_label(flow.runner.tool_driver.kind)
                    ),
                });
            }
            ToolDriverKind::PromptedShim | ToolDriverKind::Native | ToolDriverKind::Mcp => {}
        }
    }
    Ok(())
}

/// Kebab-case label for a `ToolDriverKind`, matching the flag value the
/// runner adapter sends over `ZCL_TOOL_DRIVER_KIND`.
fn tool_driver_kind_label(kind: ToolDriverKind) -> &'static str {
    match kind {
        ToolDriverKind::Native => "native",
        ToolDriverKind::PromptedShim => "prompted-shim",
        ToolDriverKind::Mcp => "mcp",
    }
}
