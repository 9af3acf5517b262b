// campaign-engine/src/runner.rs
// ============================================================================
// Module: Campaign Runner Adapter
// Description: Builds and drives one child-runner invocation for a (flow,
//              mission) pairing and classifies its result into a FlowRun.
// Purpose: Isolate every subprocess-spawning concern from the orchestrator.
// Dependencies: campaign-core, tokio, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The runner adapter treats the attempt runner as a black box invoked via
//! argv + env (see [`SUPPORT: External Interfaces`] in the top-level spec).
//! It builds the canonical flag set, spawns the child with
//! `kill_on_drop(true)`, races its completion against the supplied
//! cancellation scope, captures bounded stdout/stderr, parses the
//! stdout JSON suite summary, and classifies each reported attempt.
//! Subprocess mechanics (select! race, kill-on-drop, pipe draining) are
//! grounded in `agenticlaw-tools`'s cancellable bash tool.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tokio::io::AsyncReadExt as _;
use tokio::io::AsyncWriteExt as _;
use tokio::process::Command;
use tokio::sync::Mutex as AsyncMutex;

use campaign_core::AttemptId;
use campaign_core::AttemptOutcome;
use campaign_core::AttemptStatus;
use campaign_core::CampaignId;
use campaign_core::FlowId;
use campaign_core::FlowRun;
use campaign_core::FlowSpec;
use campaign_core::McpSpec;
use campaign_core::MissionId;
use campaign_core::ReasonCode;
use campaign_core::ResultChannel;
use campaign_core::SessionIsolation;
use campaign_core::ToolDriverKind;

use crate::cancellation::CancellationScope;

/// Default cap on captured child stdout, per spec's bounded in-memory buffer.
const STDOUT_CAPTURE_CAP: usize = 64 * 1024;
/// Cap on the raw stderr buffer retained for diagnostics/forwarding.
const STDERR_RAW_CAP: usize = 1024 * 1024;
/// Default cap on the stderr tail retained on `FlowRun.errorOutput`.
const STDERR_CAPTURE_CAP: usize = 4 * 1024;
/// Grace period after a cancellation signal before a child is force-killed.
const KILL_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Runner adapter errors.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The child process could not be spawned.
    #[error("failed to spawn flow {flow_id} runner: {source}")]
    Spawn {
        /// Flow that failed to spawn.
        flow_id: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The cancellation scope fired before the child exited.
    #[error("flow {0} runner cancelled before completion")]
    Cancelled(String),
}

// ============================================================================
// SECTION: Suite-Summary Wire Format
// ============================================================================

/// The child's stdout JSON suite summary (unknown fields tolerated).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteSummary {
    /// Child-reported run identifier.
    #[serde(default)]
    pub run_id: String,
    /// Child-reported overall success flag.
    #[serde(default)]
    pub ok: bool,
    /// Per-attempt results, in child-reported order.
    #[serde(default)]
    pub attempts: Vec<SuiteAttempt>,
}

/// One attempt entry in the suite summary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteAttempt {
    /// Mission identifier as reported by the suite.
    pub mission_id: String,
    /// Attempt identifier as reported by the child runner.
    #[serde(default)]
    pub attempt_id: String,
    /// Absolute filesystem path to the attempt directory, if produced.
    #[serde(default)]
    pub attempt_dir: Option<String>,
    /// Whether the attempt itself succeeded.
    #[serde(default)]
    pub ok: bool,
    /// Whether the runner skipped this attempt.
    #[serde(default)]
    pub skipped: bool,
    /// Runner-reported error code, if any.
    #[serde(default)]
    pub runner_error_code: Option<String>,
    /// Auto-feedback code emitted by the runner, if any.
    #[serde(default)]
    pub auto_feedback_code: Option<String>,
    /// Finalization verdict: overall `ok`, plus validate/expect detail.
    #[serde(default)]
    pub finish: FinishResult,
}

/// `finish{ok, validate{...}, expect{...}}` in the suite summary.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishResult {
    /// Overall finalization success; gates `valid` alongside `ok`.
    #[serde(default)]
    pub ok: bool,
    /// Schema/shape validation of the attempt's own artifacts.
    #[serde(default)]
    pub validate: ValidateResult,
    /// Prompt-declared expectation checks, if any were configured.
    #[serde(default)]
    pub expect: ExpectResult,
}

/// `finish.validate{ok, errors[]}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResult {
    /// Whether validation passed.
    #[serde(default)]
    pub ok: bool,
    /// Validation failure codes, if `ok` is false.
    #[serde(default)]
    pub errors: Vec<String>,
}

/// `finish.expect{evaluated, ok, failures[]}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectResult {
    /// Whether any expectations were configured and evaluated at all.
    #[serde(default)]
    pub evaluated: bool,
    /// Whether every evaluated expectation held.
    #[serde(default)]
    pub ok: bool,
    /// Failed expectation codes, if `evaluated` and not `ok`.
    #[serde(default)]
    pub failures: Vec<String>,
}

// ============================================================================
// SECTION: Runner Adapter
// ============================================================================

/// Produces one `FlowRun` per (flow, mission) pairing.
#[derive(Debug, Clone)]
pub struct RunnerAdapter {
    stdout_cap: usize,
    stderr_cap: usize,
}

impl Default for RunnerAdapter {
    fn default() -> Self {
        Self {
            stdout_cap: STDOUT_CAPTURE_CAP,
            stderr_cap: STDERR_CAPTURE_CAP,
        }
    }
}

/// Inputs shared across every (flow, mission) invocation in one campaign run.
pub struct RunInvocation<'a> {
    /// Campaign identifier.
    pub campaign_id: &'a CampaignId,
    /// Resolved output root.
    pub out_root: &'a str,
    /// Flow being invoked.
    pub flow: &'a FlowSpec,
    /// Path to this flow's materialized suite file on disk.
    pub suite_file: &'a str,
    /// Mission index within the resolved selection (used as both
    /// `--mission-offset` and the forced attempt mission index).
    pub mission_index: usize,
    /// Mission identifier at that index.
    pub mission_id: &'a MissionId,
    /// Whether `promptMode == mission-only`.
    pub prompt_mode_mission_only: bool,
    /// Whether `failFast` is configured at the campaign level.
    pub fail_fast: bool,
    /// Shared mutex serializing writes to the parent's stderr across
    /// concurrently running flows.
    pub stderr_mutex: Arc<AsyncMutex<()>>,
    /// Cancellation scope bounding this single invocation.
    pub scope: CancellationScope,
}

impl RunnerAdapter {
    /// Creates an adapter with the default capture-buffer caps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the argument list passed to `flow.runner.command[0]`: the
    /// canonical flag set, a `--` separator, then the remainder of
    /// `flow.runner.command` (the engine always spawns `command[0]` directly
    /// and forwards the rest of the configured command line after `--`).
    #[must_use]
    pub fn build_argv(invocation: &RunInvocation<'_>) -> Vec<String> {
        let runner = &invocation.flow.runner;
        let mut argv = vec![
            "--file".to_string(),
            invocation.suite_file.to_string(),
            "--out-root".to_string(),
            invocation.out_root.to_string(),
            "--campaign-id".to_string(),
            invocation.campaign_id.to_string(),
            "--session-isolation".to_string(),
            session_isolation_flag(runner.session_isolation),
            "--feedback-policy".to_string(),
            runner.feedback_policy.clone(),
            "--finalization-mode".to_string(),
            runner.finalization.mode.clone(),
            "--result-channel".to_string(),
            result_channel_kind(&runner.finalization.result_channel).to_string(),
            "--result-min-turn".to_string(),
            runner.finalization.min_result_turn.to_string(),
            "--parallel=1".to_string(),
            "--total".to_string(),
            "1".to_string(),
            "--mission-offset".to_string(),
            invocation.mission_index.to_string(),
        ];

        if invocation.fail_fast {
            argv.push("--fail-fast".to_string());
        }
        argv.push("--json".to_string());

        if let Some(mode) = &runner.mode {
            argv.push("--mode".to_string());
            argv.push(mode.clone());
        }
        if runner.timeout_ms > 0 {
            argv.push("--timeout-ms".to_string());
            argv.push(runner.timeout_ms.to_string());
        }
        argv.push("--timeout-start".to_string());
        argv.push(runner.timeout_start.clone());

        match &runner.finalization.result_channel {
            ResultChannel::FileJson {
                path,
            } => {
                argv.push("--result-file".to_string());
                argv.push(path.clone());
            }
            ResultChannel::Marker {
                marker,
            } => {
                argv.push("--result-marker".to_string());
                argv.push(marker.clone());
            }
        }

        if runner.strict {
            argv.push("--strict".to_string());
        }
        if runner.strict_expect {
            argv.push("--strict-expect".to_string());
        }
        for shim in &runner.shims {
            argv.push("--shim".to_string());
            argv.push(shim.clone());
        }

        argv.push("--".to_string());
        argv.extend(runner.command.iter().skip(1).cloned());
        argv
    }

    /// Builds the child environment: `flow.runner.env` plus the required
    /// campaign keys and optional MCP tuning keys.
    #[must_use]
    pub fn build_env(invocation: &RunInvocation<'_>) -> Vec<(String, String)> {
        let runner = &invocation.flow.runner;
        let mut env: Vec<(String, String)> = runner.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        env.push(("ZCL_CAMPAIGN_RUNNER_TYPE".to_string(), runner.runner_type.clone()));
        env.push(("ZCL_FRESH_AGENT_PER_ATTEMPT".to_string(), "1".to_string()));
        env.push(("ZCL_TOOL_DRIVER_KIND".to_string(), tool_driver_flag(runner.tool_driver.kind)));

        if invocation.prompt_mode_mission_only {
            env.push(("ZCL_PROMPT_MODE".to_string(), "mission-only".to_string()));
        }

        push_mcp_env(&mut env, &runner.mcp);
        env
    }

    /// Spawns the child, races it against cancellation, captures bounded
    /// stdout/stderr, and classifies the result into a `FlowRun`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Spawn`] if the child cannot be started.
    pub async fn run(&self, invocation: &RunInvocation<'_>) -> Result<FlowRun, RunnerError> {
        let flow_id = invocation.flow.flow_id.clone();
        let argv = Self::build_argv(invocation);
        let env = Self::build_env(invocation);

        let program = invocation.flow.runner.command.first().cloned().unwrap_or_default();
        let mut command = Command::new(program);
        command.args(&argv);
        command.envs(env);
        command.kill_on_drop(true);
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|source| RunnerError::Spawn {
            flow_id: flow_id.to_string(),
            source,
        })?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        tokio::select! {
            status = child.wait() => {
                let exit_code = status.map(|s| s.code().unwrap_or(-1)).unwrap_or(-1);
                let stdout = read_capped(stdout_pipe, self.stdout_cap).await;
                let stderr_full = read_capped(stderr_pipe, STDERR_RAW_CAP).await;
                self.emit_stderr(invocation, &stderr_full).await;
                let stderr_tail = tail(&stderr_full, self.stderr_cap);
                Ok(classify_output(
                    &invocation.flow.flow_id,
                    &invocation.flow.runner.runner_type,
                    invocation.suite_file,
                    exit_code,
                    &stdout,
                    &stderr_tail,
                    invocation.mission_index,
                    invocation.mission_id,
                ))
            }
            () = invocation.scope.cancelled() => {
                let _ = child.start_kill();
                let _ = tokio::time::timeout(KILL_GRACE, child.wait()).await;
                Err(RunnerError::Cancelled(flow_id.to_string()))
            }
        }
    }

    /// Serializes writes to the parent's stderr so parallel flows cannot
    /// interleave partial lines.
    async fn emit_stderr(&self, invocation: &RunInvocation<'_>, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let _guard = invocation.stderr_mutex.lock().await;
        let mut stderr = tokio::io::stderr();
        let _ = stderr.write_all(bytes).await;
        let _ = stderr.flush().await;
    }
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Turns raw child output into a `FlowRun`, handling parse failures per the
/// spec's `CampaignSummaryParse` / missing-summary rules.
fn classify_output(
    flow_id: &FlowId,
    runner_type: &str,
    suite_file: &str,
    exit_code: i32,
    stdout: &[u8],
    stderr_tail: &[u8],
    mission_index: usize,
    mission_id: &MissionId,
) -> FlowRun {
    let error_output = String::from_utf8_lossy(stderr_tail).into_owned();

    if stdout.is_empty() {
        let mut errors = vec![ReasonCode::CampaignMissingAttempt];
        if exit_code != 0 {
            errors.push(ReasonCode::FlowExit(exit_code));
        }
        errors.sort();
        errors.dedup();
        return FlowRun {
            flow_id: flow_id.clone(),
            runner_type: runner_type.to_string(),
            run_id: String::new(),
            suite_file: suite_file.to_string(),
            exit_code,
            ok: false,
            errors,
            error_output,
            attempts: vec![sentinel_attempt(mission_index, mission_id)],
        };
    }

    let summary: Result<SuiteSummary, serde_json::Error> = serde_json::from_slice(stdout);
    match summary {
        Ok(summary) => {
            let attempt = summary
                .attempts
                .first()
                .map(|raw| classify_attempt(raw, mission_index, mission_id))
                .unwrap_or_else(|| sentinel_attempt(mission_index, mission_id));

            let mut errors: Vec<ReasonCode> = attempt.errors.clone();
            if exit_code != 0 {
                errors.push(ReasonCode::FlowExit(exit_code));
            }
            errors.sort();
            errors.dedup();

            FlowRun {
                flow_id: flow_id.clone(),
                runner_type: runner_type.to_string(),
                run_id: summary.run_id,
                suite_file: suite_file.to_string(),
                exit_code,
                ok: summary.ok && exit_code == 0,
                errors,
                error_output,
                attempts: vec![attempt],
            }
        }
        Err(_parse_error) => {
            let mut errors = vec![ReasonCode::CampaignSummaryParse];
            if exit_code != 0 {
                errors.push(ReasonCode::FlowExit(exit_code));
            }
            errors.sort();
            errors.dedup();
            FlowRun {
                flow_id: flow_id.clone(),
                runner_type: runner_type.to_string(),
                run_id: String::new(),
                suite_file: suite_file.to_string(),
                exit_code,
                ok: false,
                errors,
                error_output,
                attempts: vec![sentinel_attempt(mission_index, mission_id)],
            }
        }
    }
}

/// Classifies a single suite-reported attempt into an `AttemptStatus`.
fn classify_attempt(raw: &SuiteAttempt, mission_index: usize, mission_id: &MissionId) -> AttemptStatus {
    let mut errors = Vec::new();
    let status = if raw.skipped {
        errors.push(ReasonCode::CampaignSkipped);
        AttemptOutcome::Skipped
    } else if raw.runner_error_code.is_some() || raw.auto_feedback_code.is_some() {
        AttemptOutcome::InfraFailed
    } else if raw.ok && raw.finish.ok {
        AttemptOutcome::Valid
    } else {
        if !raw.finish.validate.ok {
            errors.push(ReasonCode::CampaignValidateFailed);
        }
        if raw.finish.expect.evaluated && !raw.finish.expect.ok {
            errors.push(ReasonCode::CampaignExpectFailed);
        }
        AttemptOutcome::Invalid
    };

    errors.sort();
    errors.dedup();

    AttemptStatus {
        mission_index,
        mission_id: mission_id.clone(),
        attempt_id: AttemptId::new(raw.attempt_id.clone()),
        attempt_dir: raw.attempt_dir.clone(),
        status,
        runner_ref: None,
        runner_error_code: raw.runner_error_code.clone(),
        auto_feedback_code: raw.auto_feedback_code.clone(),
        errors,
    }
}

/// Synthesizes a failed `FlowRun` for a (flow, mission) pairing whose child
/// process could never be spawned, so the gate evaluator still sees it
/// rather than the flow silently vanishing from that mission's gate.
#[must_use]
pub fn spawn_failed_flow_run(
    flow_id: &FlowId,
    runner_type: &str,
    suite_file: &str,
    mission_index: usize,
    mission_id: &MissionId,
) -> FlowRun {
    FlowRun {
        flow_id: flow_id.clone(),
        runner_type: runner_type.to_string(),
        run_id: String::new(),
        suite_file: suite_file.to_string(),
        exit_code: -1,
        ok: false,
        errors: vec![ReasonCode::Spawn],
        error_output: String::new(),
        attempts: vec![sentinel_attempt(mission_index, mission_id)],
    }
}

/// Synthesizes the sentinel attempt used when the child produced none.
fn sentinel_attempt(mission_index: usize, mission_id: &MissionId) -> AttemptStatus {
    AttemptStatus {
        mission_index,
        mission_id: mission_id.clone(),
        attempt_id: AttemptId::new(String::new()),
        attempt_dir: None,
        status: AttemptOutcome::Invalid,
        runner_ref: None,
        runner_error_code: None,
        auto_feedback_code: None,
        errors: vec![ReasonCode::CampaignMissingAttempt],
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn session_isolation_flag(mode: SessionIsolation) -> String {
    match mode {
        SessionIsolation::FreshPerAttempt => "fresh-per-attempt".to_string(),
        SessionIsolation::Shared => "shared".to_string(),
    }
}

fn result_channel_kind(channel: &ResultChannel) -> &'static str {
    match channel {
        ResultChannel::FileJson {
            ..
        } => "file-json",
        ResultChannel::Marker {
            ..
        } => "marker",
    }
}

fn tool_driver_flag(kind: ToolDriverKind) -> String {
    match kind {
        ToolDriverKind::Native => "native".to_string(),
        ToolDriverKind::PromptedShim => "prompted-shim".to_string(),
        ToolDriverKind::Mcp => "mcp".to_string(),
    }
}

fn push_mcp_env(env: &mut Vec<(String, String)>, mcp: &McpSpec) {
    if let Some(max_calls) = mcp.max_tool_calls {
        env.push(("ZCL_MCP_MAX_TOOL_CALLS".to_string(), max_calls.to_string()));
    }
    if let Some(idle_ms) = mcp.idle_timeout_ms {
        env.push(("ZCL_MCP_IDLE_TIMEOUT_MS".to_string(), idle_ms.to_string()));
    }
    if mcp.shutdown_on_complete {
        env.push(("ZCL_MCP_SHUTDOWN_ON_COMPLETE".to_string(), "1".to_string()));
    }
}

/// Reads an optional child pipe up to `cap` bytes; the remainder is drained
/// and discarded so the child never blocks on backpressure.
async fn read_capped(pipe: Option<impl tokio::io::AsyncRead + Unpin>, cap: usize) -> Vec<u8> {
    let Some(mut pipe) = pipe else {
        return Vec::new();
    };
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 8192];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if buf.len() < cap {
                    let take = (cap - buf.len()).min(n);
                    buf.extend_from_slice(&chunk[..take]);
                }
            }
            Err(_) => break,
        }
    }
    buf
}

/// Returns the last `cap` bytes of `data` (a UTF-8-safe best-effort tail).
fn tail(data: &[u8], cap: usize) -> Vec<u8> {
    if data.len() <= cap {
        data.to_vec()
    } else {
        data[data.len() - cap..].to_vec()
    }
}

/// Absolute path under `<outRoot>/campaigns/<campaignId>/generated-suites/`.
#[must_use]
pub fn generated_suite_path(out_root: &str, campaign_id: &CampaignId, flow_id: &FlowId) -> PathBuf {
    PathBuf::from(out_root)
        .join("campaigns")
        .join(campaign_id.as_str())
        .join("generated-suites")
        .join(format!("{flow_id}.suite.json"))
}
