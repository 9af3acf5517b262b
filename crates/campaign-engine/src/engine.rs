// campaign-engine/src/engine.rs
// ============================================================================
// Module: Campaign Execution Engine
// Description: Orchestrates one campaign invocation: lock, main loop, cleanup
//              hooks, terminal status, persistence.
// Purpose: The single entry point tying lock manager, runner adapter, gate
//          evaluator, and artifact persister together.
// Dependencies: campaign-core, tokio, thiserror
// ============================================================================

//! ## Overview
//! [`ExecutionEngine::execute`] implements the eight-step algorithm: acquire
//! the campaign lock, establish a cancellation scope bounded by the global
//! timeout, initialize and persist a `running` `RunState`, resolve the
//! execution mode, run the main loop over missions (and, within each
//! mission, flows), run cleanup hooks, compute the terminal status, and
//! persist+release. The overall "acquire lock, loop, release" shape and its
//! `EngineError` variant style are grounded in the teacher's
//! `ControlPlane::run` and `ControlPlaneError` (`runtime/engine.rs`); unlike
//! the teacher, every component here is a concrete struct rather than an
//! injected trait object, since one campaign invocation only ever needs one
//! lock manager, one persister, and one runner adapter.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex as AsyncMutex;

use campaign_core::FlowMode;
use campaign_core::FlowRun;
use campaign_core::ParsedSpec;
use campaign_core::ReasonCode;
use campaign_core::RunId;
use campaign_core::RunState;
use campaign_core::RunStatus;
use campaign_core::Timestamp;

use crate::cancellation::CancellationScope;
use crate::gate::GateEvaluator;
use crate::lock::LockError;
use crate::lock::LockManager;
use crate::persist::ArtifactPersister;
use crate::persist::BuildReport;
use crate::persist::BuildSummary;
use crate::persist::PersistError;
use crate::runner::RunInvocation;
use crate::runner::RunnerAdapter;
use crate::runner::RunnerError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Execution engine errors that prevent a terminal `RunState` from being
/// produced at all (as opposed to being recorded as a reason code on one).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The campaign lock could not be acquired and the caller requested the
    /// error surfaced rather than folded into an `invalid` `RunState`.
    #[error(transparent)]
    Lock(#[from] LockError),
    /// Persisting an artifact failed.
    #[error(transparent)]
    Persist(#[from] PersistError),
}

// ============================================================================
// SECTION: Execution Options
// ============================================================================

/// Everything `Execute` needs beyond the parsed spec itself.
pub struct ExecutionOptions {
    /// Resolved output root.
    pub out_root: String,
    /// Freshly minted run identifier for this invocation.
    pub run_id: RunId,
    /// Whether this is a canary (partial) invocation.
    pub canary: bool,
    /// The prior run id this invocation resumes, if any.
    pub resumed_from_run_id: Option<RunId>,
    /// Resolved mission indexes to execute, in order.
    pub mission_indexes: Vec<usize>,
    /// Campaign-global deadline in milliseconds; 0 disables it.
    pub global_timeout_ms: u64,
    /// Per-cleanup-hook deadline in milliseconds.
    pub cleanup_hook_timeout_ms: u64,
    /// How long to wait for the campaign lock before failing.
    pub lock_wait: Duration,
    /// Age after which an existing lock is considered stale.
    pub stale_lock_ms: u64,
    /// Process id recorded as the lock owner.
    pub pid: u32,
    /// Shell used to invoke cleanup hooks (resolved from `SHELL` upstream).
    pub shell: String,
}

// ============================================================================
// SECTION: Execution Engine
// ============================================================================

/// Orchestrates one campaign invocation end to end.
pub struct ExecutionEngine {
    persister: ArtifactPersister,
    runner: RunnerAdapter,
    gate: GateEvaluator,
}

impl ExecutionEngine {
    /// Creates an engine rooted at `out_root`.
    #[must_use]
    pub fn new(out_root: PathBuf) -> Self {
        Self {
            persister: ArtifactPersister::new(out_root),
            runner: RunnerAdapter::new(),
            gate: GateEvaluator::new(),
        }
    }

    /// Runs one campaign invocation to completion (or abort), returning the
    /// terminal `RunState` and the process exit code (`0` valid, `2`
    /// otherwise).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] only when an artifact write fails outright;
    /// a held lock, a gate failure, or a cancelled run are all folded into
    /// the returned `RunState` instead.
    pub async fn execute(&self, parsed: &ParsedSpec, options: ExecutionOptions) -> Result<(RunState, i32), EngineError> {
        let campaign_dir = self.persister.campaign_dir(&parsed.spec.campaign_id);
        let lock_manager = LockManager::new(campaign_dir, options.stale_lock_ms);
        let started_at = Timestamp::now();

        let guard = match lock_manager.acquire(options.pid, started_at, options.lock_wait).await {
            Ok(guard) => guard,
            Err(LockError::Held(_)) => {
                let mut state = RunState::new_running(
                    parsed.spec.campaign_id.clone(),
                    options.run_id.clone(),
                    options.resumed_from_run_id.clone(),
                    parsed.spec_path.clone(),
                    options.out_root.clone(),
                    parsed.spec.total_missions,
                    options.canary,
                    options.mission_indexes.clone(),
                    started_at,
                    campaign_core::LockOwner {
                        pid: options.pid,
                        started_at,
                    },
                );
                state.append_reason(ReasonCode::LockHeld);
                state.finish(false, Timestamp::now());
                return Ok((state, 2));
            }
            Err(source @ LockError::Io { .. }) => return Err(EngineError::from(source)),
        };

        let scope = CancellationScope::root();
        scope.arm_deadline(Duration::from_millis(options.global_timeout_ms));

        let mut state = RunState::new_running(
            parsed.spec.campaign_id.clone(),
            options.run_id.clone(),
            options.resumed_from_run_id.clone(),
            parsed.spec_path.clone(),
            options.out_root.clone(),
            parsed.spec.total_missions,
            options.canary,
            options.mission_indexes.clone(),
            started_at,
            campaign_core::LockOwner {
                pid: guard.owner.pid,
                started_at: guard.owner.started_at,
            },
        );
        self.persister.write_run_state(&state)?;

        let flow_mode = if parsed.spec.pair_gate.enabled && parsed.spec.pair_gate.stop_on_first_mission_failure {
            FlowMode::PerMission
        } else {
            parsed.spec.execution.flow_mode
        };

        let stderr_mutex = Arc::new(AsyncMutex::new(()));
        let mut aborted = false;

        match flow_mode {
            FlowMode::PerMission => {
                aborted = self
                    .run_per_mission(parsed, &options, &scope, &stderr_mutex, &mut state)
                    .await?;
            }
            FlowMode::PerFlow => {
                aborted = self.run_per_flow(parsed, &options, &scope, &stderr_mutex, &mut state).await?;
            }
        }

        if !aborted {
            self.run_cleanup_hooks(parsed, &options, &scope, &mut state).await;
        }

        state.finish(aborted, Timestamp::now());
        self.persist_terminal(&state)?;
        drop(guard);

        let exit_code = if state.status == RunStatus::Valid { 0 } else { 2 };
        Ok((state, exit_code))
    }

    /// Runs the main loop in `per-mission` order: for each mission, every
    /// flow runs before the next mission begins.
    async fn run_per_mission(
        &self,
        parsed: &ParsedSpec,
        options: &ExecutionOptions,
        scope: &CancellationScope,
        stderr_mutex: &Arc<AsyncMutex<()>>,
        state: &mut RunState,
    ) -> Result<bool, EngineError> {
        let mut aborted = false;
        for &mission_index in &options.mission_indexes {
            if scope.is_cancelled() {
                aborted = true;
                break;
            }

            let flow_runs = self
                .run_mission_flows(parsed, options, mission_index, scope, stderr_mutex)
                .await;

            let mission_id = mission_id_at(parsed, mission_index);
            let gate = self
                .gate
                .evaluate(mission_index, &mission_id, &flow_runs, &parsed.spec.pair_gate, &parsed.spec.semantic);
            let gate_ok = gate.ok;
            let any_nonzero_exit = flow_runs.iter().any(|flow_run| flow_run.exit_code != 0);

            state.record_mission(flow_runs, gate);
            self.persister.write_run_state(state)?;

            if scope.is_cancelled() {
                aborted = true;
                break;
            }
            if parsed.spec.pair_gate.enabled && parsed.spec.pair_gate.stop_on_first_mission_failure && !gate_ok {
                break;
            }
            if parsed.spec.fail_fast && any_nonzero_exit {
                break;
            }
        }
        if aborted {
            state.append_reason(ReasonCode::GlobalTimeout);
        }
        Ok(aborted)
    }

    /// Runs the main loop in `per-flow` order: for each flow, every mission
    /// runs before the next flow begins. Mission gates are computed once all
    /// flows have contributed their attempt for that mission.
    async fn run_per_flow(
        &self,
        parsed: &ParsedSpec,
        options: &ExecutionOptions,
        scope: &CancellationScope,
        stderr_mutex: &Arc<AsyncMutex<()>>,
        state: &mut RunState,
    ) -> Result<bool, EngineError> {
        let mut by_mission: BTreeMap<usize, Vec<FlowRun>> = BTreeMap::new();
        let mut aborted = false;

        'flows: for flow in &parsed.spec.flows {
            let Some(suite) = parsed.flow_suites.get(&flow.flow_id) else {
                continue;
            };
            for &mission_index in &options.mission_indexes {
                if scope.is_cancelled() {
                    aborted = true;
                    break 'flows;
                }
                let suite_path = self.materialized_suite_path(parsed, flow, suite)?;
                let mission_id = suite
                    .missions
                    .get(mission_index)
                    .map_or_else(|| campaign_core::MissionId::new(String::new()), |mission| mission.id.clone());

                let invocation = RunInvocation {
                    campaign_id: &parsed.spec.campaign_id,
                    out_root: &options.out_root,
                    flow,
                    suite_file: &suite_path,
                    mission_index,
                    mission_id: &mission_id,
                    prompt_mode_mission_only: parsed.spec.prompt_mode == campaign_core::PromptMode::MissionOnly,
                    fail_fast: parsed.spec.fail_fast,
                    stderr_mutex: Arc::clone(stderr_mutex),
                    scope: scope.child(),
                };

                let flow_run = match self.runner.run(&invocation).await {
                    Ok(flow_run) => flow_run,
                    Err(RunnerError::Cancelled(_)) => {
                        aborted = true;
                        break 'flows;
                    }
                    Err(RunnerError::Spawn {
                        ..
                    }) => crate::runner::spawn_failed_flow_run(
                        &flow.flow_id,
                        &flow.runner.runner_type,
                        &suite_path,
                        mission_index,
                        &mission_id,
                    ),
                };

                let stop_fail_fast = parsed.spec.fail_fast && flow_run.exit_code != 0;
                by_mission.entry(mission_index).or_default().push(flow_run);
                if stop_fail_fast {
                    break 'flows;
                }
            }
        }

        if aborted {
            state.append_reason(ReasonCode::GlobalTimeout);
        }

        for &mission_index in &options.mission_indexes {
            let Some(flow_runs) = by_mission.remove(&mission_index) else {
                continue;
            };
            let mission_id = mission_id_at(parsed, mission_index);
            let gate = self
                .gate
                .evaluate(mission_index, &mission_id, &flow_runs, &parsed.spec.pair_gate, &parsed.spec.semantic);
            state.record_mission(flow_runs, gate);
            self.persister.write_run_state(state)?;
        }

        Ok(aborted)
    }

    /// Runs every flow of one mission sequentially, in declared order.
    async fn run_mission_flows(
        &self,
        parsed: &ParsedSpec,
        options: &ExecutionOptions,
        mission_index: usize,
        scope: &CancellationScope,
        stderr_mutex: &Arc<AsyncMutex<()>>,
    ) -> Vec<FlowRun> {
        let mut flow_runs = Vec::with_capacity(parsed.spec.flows.len());

        for flow in &parsed.spec.flows {
            let Some(suite) = parsed.flow_suites.get(&flow.flow_id) else {
                continue;
            };
            let Ok(suite_path) = self.materialized_suite_path(parsed, flow, suite) else {
                continue;
            };
            let mission_id = suite
                .missions
                .get(mission_index)
                .map_or_else(|| campaign_core::MissionId::new(String::new()), |mission| mission.id.clone());

            let invocation = RunInvocation {
                campaign_id: &parsed.spec.campaign_id,
                out_root: &options.out_root,
                flow,
                suite_file: &suite_path,
                mission_index,
                mission_id: &mission_id,
                prompt_mode_mission_only: parsed.spec.prompt_mode == campaign_core::PromptMode::MissionOnly,
                fail_fast: parsed.spec.fail_fast,
                stderr_mutex: Arc::clone(stderr_mutex),
                scope: scope.child(),
            };

            match self.runner.run(&invocation).await {
                Ok(flow_run) => flow_runs.push(flow_run),
                Err(RunnerError::Cancelled(_)) => {}
                Err(RunnerError::Spawn {
                    ..
                }) => flow_runs.push(crate::runner::spawn_failed_flow_run(
                    &flow.flow_id,
                    &flow.runner.runner_type,
                    &suite_path,
                    mission_index,
                    &mission_id,
                )),
            }
        }

        flow_runs
    }

    /// Materializes a flow's suite to disk, returning the path passed to the
    /// child as `--file`.
    fn materialized_suite_path(
        &self,
        parsed: &ParsedSpec,
        flow: &campaign_core::FlowSpec,
        suite: &campaign_core::MaterializedSuite,
    ) -> Result<String, EngineError> {
        let path = self.persister.write_generated_suite(&parsed.spec.campaign_id, &flow.flow_id, suite)?;
        Ok(path.display().to_string())
    }

    /// Runs every configured cleanup hook sequentially, bounding each with
    /// `cleanupHookTimeoutMs`. Failures append `ReasonCode::Io` but never
    /// revert recorded gate verdicts.
    async fn run_cleanup_hooks(
        &self,
        parsed: &ParsedSpec,
        options: &ExecutionOptions,
        scope: &CancellationScope,
        state: &mut RunState,
    ) {
        for hook in &parsed.spec.cleanup_hooks {
            let child = Command::new(&options.shell)
                .arg("-c")
                .arg(hook)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn();

            let Ok(mut child) = child else {
                state.append_reason(ReasonCode::Io);
                continue;
            };

            let deadline = Duration::from_millis(options.cleanup_hook_timeout_ms);
            tokio::select! {
                status = tokio::time::timeout(deadline, child.wait()) => {
                    if !matches!(status, Ok(Ok(status)) if status.success()) {
                        state.append_reason(ReasonCode::Io);
                    }
                }
                () = scope.cancelled() => {
                    let _ = child.start_kill();
                    state.append_reason(ReasonCode::GlobalTimeout);
                }
            }
        }
    }

    /// Writes every terminal artifact: run-state, report, summary, markdown.
    fn persist_terminal(&self, state: &RunState) -> Result<(), PersistError> {
        self.persister.write_run_state(state)?;
        self.persister.write_report(&BuildReport::from_run_state(state))?;
        self.persister.write_summary(&BuildSummary::from_run_state(state))?;
        let markdown = crate::markdown::render_results_md(state);
        self.persister.write_results_md(&state.campaign_id, &markdown)
    }
}

/// Looks up the mission identifier at `mission_index` from the first flow's
/// materialized suite (every flow suite shares the same mission ordering).
fn mission_id_at(parsed: &ParsedSpec, mission_index: usize) -> campaign_core::MissionId {
    parsed
        .flow_suites
        .values()
        .find_map(|suite| suite.missions.get(mission_index))
        .map_or_else(|| campaign_core::MissionId::new(String::new()), |mission| mission.id.clone())
}

// ============================================================================
// SECTION: Resume
// ============================================================================

/// Validates that a resume invocation targets the same campaign as the
/// spec it re-parsed, per the resume contract in the top-level spec.
#[derive(Debug, Error)]
pub enum ResumeError {
    /// The re-parsed spec's campaign id does not match the prior run.
    #[error("resume campaignId mismatch: prior={prior} current={current}")]
    CampaignIdMismatch {
        /// Campaign id recorded on the prior run state.
        prior: String,
        /// Campaign id in the freshly re-parsed spec.
        current: String,
    },
}

/// Confirms `campaignId` continuity and returns the full mission-index list
/// a resume must re-run (partial resume is not supported).
///
/// # Errors
///
/// Returns [`ResumeError::CampaignIdMismatch`] when the re-parsed spec
/// targets a different campaign than the prior run state.
pub fn resolve_resume_mission_indexes(prior: &RunState, parsed: &ParsedSpec) -> Result<Vec<usize>, ResumeError> {
    if prior.campaign_id != parsed.spec.campaign_id {
        return Err(ResumeError::CampaignIdMismatch {
            prior: prior.campaign_id.to_string(),
            current: parsed.spec.campaign_id.to_string(),
        });
    }
    Ok(parsed.mission_indexes.clone())
}
