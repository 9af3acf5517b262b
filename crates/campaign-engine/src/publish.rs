// campaign-engine/src/publish.rs
// ============================================================================
// Module: Publish-Check Policy
// Description: Computes whether a terminal RunState may be published.
// Purpose: Apply invalid-run policy, re-parse policy errors, and the
//          prompt-mode forbidden-term scan to one publish decision.
// Dependencies: campaign-core
// ============================================================================

//! ## Overview
//! [`evaluate_publish_check`] is pure: every input it needs (the terminal
//! `RunState`, the spec's `invalidRunPolicy`, and the outcome of re-parsing
//! the spec/scanning prompts) is supplied by the caller, which owns the
//! actual file I/O. This keeps the five-step decision unit-testable without
//! a filesystem, mirroring how `campaign-core`'s own resolution helpers stay
//! I/O-free.

use campaign_core::InvalidRunPolicySpec;
use campaign_core::PromptModeViolationError;
use campaign_core::ReasonCode;
use campaign_core::RunState;
use campaign_core::RunStatus;
use campaign_core::SpecError;

/// Everything [`evaluate_publish_check`] needs beyond the run state itself.
pub struct PublishCheckInput<'a> {
    /// The terminal run state being considered for publication.
    pub run_state: &'a RunState,
    /// The spec's publish policy.
    pub invalid_run_policy: &'a InvalidRunPolicySpec,
    /// The error from re-parsing the spec and re-checking its tool-driver/shim
    /// policy, if any.
    pub policy_error: Option<&'a SpecError>,
    /// The result of re-scanning every resolved prompt for forbidden terms
    /// under `promptMode=mission-only`, if the scan found any violations.
    pub prompt_mode_violation: Option<&'a PromptModeViolationError>,
    /// Whether `--force` was passed, overriding the computed verdict to
    /// `true` while preserving every recorded reason code.
    pub force: bool,
}

/// The outcome of a publish-check evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishCheckResult {
    /// Whether the run may be published.
    pub publish_ok: bool,
    /// Whether the prompt-mode forbidden-term scan passed.
    pub prompt_mode_compliance: bool,
    /// Whether the tool-driver/shim policy re-check passed.
    pub tool_driver_compliance: bool,
    /// Every reason code attached by this evaluation, sorted and deduplicated.
    pub reason_codes: Vec<ReasonCode>,
}

/// Evaluates the five-step publish-check algorithm.
#[must_use]
pub fn evaluate_publish_check(input: &PublishCheckInput<'_>) -> PublishCheckResult {
    let mut reason_codes = input.run_state.reason_codes.clone();

    // Step 1: base verdict from terminal status.
    let mut publish_ok = if input.invalid_run_policy.publish_requires_valid {
        input.run_state.status == RunStatus::Valid
    } else {
        input.run_state.status != RunStatus::Aborted
    };

    // Step 2: an explicit allow-list of statuses further restricts step 1.
    if !input.invalid_run_policy.statuses.is_empty() {
        let status_name = input.run_state.status.as_str();
        if !input.invalid_run_policy.statuses.iter().any(|allowed| allowed == status_name) {
            publish_ok = false;
        }
    }

    // Step 3: a policy error from the spec re-parse fails publication outright.
    let tool_driver_compliance = input.policy_error.is_none();
    if let Some(error) = input.policy_error {
        publish_ok = false;
        reason_codes.push(policy_error_reason(error));
    }

    // Step 4: a forbidden-term hit under mission-only mode fails publication.
    let prompt_mode_compliance = input.prompt_mode_violation.is_none();
    if input.prompt_mode_violation.is_some() {
        publish_ok = false;
        reason_codes.push(ReasonCode::ReasonPromptModePolicy);
    }

    reason_codes.sort();
    reason_codes.dedup();

    // Step 5: --force overrides the verdict but never erases recorded reasons.
    if input.force {
        publish_ok = true;
    }

    PublishCheckResult {
        publish_ok,
        prompt_mode_compliance,
        tool_driver_compliance,
        reason_codes,
    }
}

/// Maps a spec re-parse policy violation onto its reason code.
fn policy_error_reason(error: &SpecError) -> ReasonCode {
    match error {
        SpecError::ToolDriverShim {
            ..
        } => ReasonCode::ReasonToolDriverShim,
        SpecError::NoFlows
        | SpecError::DuplicateFlowId(_)
        | SpecError::MissingSuite(_)
        | SpecError::EmptyCommand(_)
        | SpecError::MissingResultChannelPath(_)
        | SpecError::MissionIndexOutOfRange(..)
        | SpecError::InvalidRange(..) => ReasonCode::Usage,
    }
}
