// campaign-cli/src/lib.rs
// ============================================================================
// Module: Campaign CLI Library
// Description: Argument parsing and command dispatch for the `campaign` binary.
// Purpose: Keep the subcommand surface unit-testable independently of main().
// Dependencies: campaign-core, campaign-config, campaign-engine, clap, tokio
// ============================================================================

//! ## Overview
//! `campaign-cli` is a thin wiring layer: it parses arguments with `clap`'s
//! derive API, resolves configuration with `campaign-config`, and drives
//! `campaign-engine`'s [`campaign_engine::ExecutionEngine`] and
//! [`campaign_engine::ArtifactPersister`]. No subsystem lives here — every
//! side effect not already owned by `campaign-engine` (reading the CLI's own
//! `campaign.toml`, writing stdout/stderr) stays confined to this crate.
//! Grounded in the teacher's `decision-gate-cli` split between a `Cli`/
//! `Commands` clap surface in `main.rs` and reusable helpers in `lib.rs`,
//! generalized so the command surface itself is unit-testable via
//! [`clap::Parser::parse_from`] without spawning a process.

pub mod output;

use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use thiserror::Error;

use campaign_config::CampaignConfig;
use campaign_config::ConfigError;
use campaign_config::VersionFloorError;
use campaign_core::CampaignId;
use campaign_core::ForbiddenTermHit;
use campaign_core::InvalidCampaignId;
use campaign_core::InvalidRunPolicySpec;
use campaign_core::ParsedSpec;
use campaign_core::RunId;
use campaign_core::RunState;
use campaign_core::RunStatus;
use campaign_core::SpecError;
use campaign_core::Timestamp;
use campaign_core::enforce_tool_driver_shim_policy;
use campaign_core::resolve_mission_indexes;
use campaign_core::scan_forbidden_prompt_terms;
use campaign_core::window_mission_indexes;
use campaign_engine::ArtifactPersister;
use campaign_engine::BuildReport;
use campaign_engine::BuildSummary;
use campaign_engine::EngineError;
use campaign_engine::ExecutionEngine;
use campaign_engine::ExecutionOptions;
use campaign_engine::PersistError;
use campaign_engine::PublishCheckInput;
use campaign_engine::PublishCheckResult;
use campaign_engine::ResumeError;
use campaign_engine::SpecLoadError;
use campaign_engine::evaluate_publish_check;
use campaign_engine::load_parsed_spec;
use campaign_engine::render_results_md;
use campaign_engine::resolve_resume_mission_indexes;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Every error this crate can surface, mapped to one of the three exit codes
/// the top-level spec defines: usage/policy failures exit `2`, unexpected
/// I/O or decode failures exit `1` with a `ZCL_E_IO:` prefix.
#[derive(Debug, Error)]
pub enum CliError {
    /// Filesystem, decode, or other unexpected internal failure.
    #[error("ZCL_E_IO: {0}")]
    Io(String),
    /// Bad CLI arguments or a missing prior run.
    #[error("Usage: {0}")]
    Usage(String),
    /// A gate, publish, or version-floor policy was not satisfied.
    #[error("Policy: {0}")]
    Policy(String),
    /// A forbidden term was found in a prompt-mode flow's config or prompt.
    #[error("Policy: ReasonPromptModePolicy: {} violation(s)", violations.len())]
    PromptModePolicy {
        violations: Vec<ForbiddenTermHit>,
    },
}

impl CliError {
    /// Maps this error onto the process exit code the top-level spec defines.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Io(_) => 1,
            Self::Usage(_) | Self::Policy(_) | Self::PromptModePolicy {
                ..
            } => 2,
        }
    }
}

/// Maps a spec-loading failure onto the appropriate [`CliError`] variant.
fn spec_err_to_cli(err: SpecLoadError) -> CliError {
    match err {
        SpecLoadError::Io {
            ..
        } => CliError::Io(err.to_string()),
        SpecLoadError::UnknownExtension {
            ..
        }
        | SpecLoadError::Decode {
            ..
        }
        | SpecLoadError::Invalid(_) => CliError::Usage(err.to_string()),
        SpecLoadError::PromptMode(violation) => CliError::PromptModePolicy {
            violations: violation.0,
        },
    }
}

/// Maps an artifact-persistence failure onto [`CliError::Io`].
fn persist_err_to_cli(err: PersistError) -> CliError {
    CliError::Io(err.to_string())
}

/// Maps an execution-engine failure onto [`CliError::Io`].
fn engine_err_to_cli(err: EngineError) -> CliError {
    CliError::Io(err.to_string())
}

/// Maps a resume-continuity failure onto [`CliError::Usage`].
fn resume_err_to_cli(err: ResumeError) -> CliError {
    CliError::Usage(err.to_string())
}

/// Maps a config-loading failure onto [`CliError`].
fn config_err_to_cli(err: ConfigError) -> CliError {
    match err {
        ConfigError::Io {
            ..
        } => CliError::Io(err.to_string()),
        ConfigError::Parse {
            ..
        }
        | ConfigError::Invalid(_) => CliError::Usage(err.to_string()),
    }
}

/// Maps a version-floor violation onto [`CliError::Policy`].
fn version_floor_err_to_cli(err: VersionFloorError) -> CliError {
    CliError::Policy(format!("ZCL_E_VERSION_FLOOR: tool version {} below floor {}", err.current, err.floor))
}

/// Maps an invalid `--campaign-id` value onto [`CliError::Usage`].
fn campaign_id_err_to_cli(err: InvalidCampaignId) -> CliError {
    CliError::Usage(err.to_string())
}

// ============================================================================
// SECTION: Command-Line Surface
// ============================================================================

/// Flags shared by every subcommand, flattened into each variant rather than
/// hoisted onto [`Cli`] itself so `--out-root`/`--json` read naturally after
/// a subcommand's own flags.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Overrides the resolved output root for this invocation.
    #[arg(long = "out-root")]
    pub out_root: Option<String>,
    /// Emits a single JSON object on standard output instead of human text.
    #[arg(long)]
    pub json: bool,
}

/// The `campaign` subcommand surface, per the top-level spec's external
/// interfaces section.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validates a spec and its policy constraints without executing it.
    Lint {
        /// Path to the campaign spec file.
        #[arg(long)]
        spec: PathBuf,
        #[command(flatten)]
        global: GlobalArgs,
    },
    /// Executes every selected mission across every configured flow.
    Run {
        /// Path to the campaign spec file.
        #[arg(long)]
        spec: PathBuf,
        /// Caps the number of missions executed, counted after `--mission-offset`.
        #[arg(long)]
        missions: Option<usize>,
        /// Skips this many leading missions before applying `--missions`.
        #[arg(long = "mission-offset")]
        mission_offset: Option<usize>,
        #[command(flatten)]
        global: GlobalArgs,
    },
    /// Executes a bounded subset of missions (default 3) for a quick smoke run.
    Canary {
        /// Path to the campaign spec file.
        #[arg(long)]
        spec: PathBuf,
        /// Caps the number of missions executed; defaults to the spec's `canaryMissions`.
        #[arg(long)]
        missions: Option<usize>,
        /// Skips this many leading missions before applying `--missions`.
        #[arg(long = "mission-offset")]
        mission_offset: Option<usize>,
        #[command(flatten)]
        global: GlobalArgs,
    },
    /// Re-executes every mission of a prior invocation's spec from scratch.
    Resume {
        /// Campaign identifier of the prior run to resume.
        #[arg(long = "campaign-id")]
        campaign_id: String,
        #[command(flatten)]
        global: GlobalArgs,
    },
    /// Reports the last recorded run state for a campaign.
    Status {
        /// Campaign identifier to look up.
        #[arg(long = "campaign-id")]
        campaign_id: String,
        #[command(flatten)]
        global: GlobalArgs,
    },
    /// Regenerates `report.json`/`summary.json`/`RESULTS.md` from a terminal run state.
    Report {
        /// Campaign identifier whose last run state should be reported.
        #[arg(long = "campaign-id")]
        campaign_id: Option<String>,
        /// Spec file identifying the campaign, used instead of `--campaign-id`.
        #[arg(long)]
        spec: Option<PathBuf>,
        /// Comma-separated output formats to print on stdout (`json`, `md`).
        #[arg(long)]
        format: Option<String>,
        /// Regenerates the report even when the run state fails `invalidRunPolicy`.
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        global: GlobalArgs,
    },
    /// Evaluates whether a terminal run state may be published.
    PublishCheck {
        /// Campaign identifier whose last run state should be checked.
        #[arg(long = "campaign-id")]
        campaign_id: Option<String>,
        /// Spec file identifying the campaign, used instead of `--campaign-id`.
        #[arg(long)]
        spec: Option<PathBuf>,
        /// Overrides a failing verdict to `true`, preserving recorded reason codes.
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        global: GlobalArgs,
    },
    /// Validates a spec, the resolved output root, and the cleanup-hook shell.
    Doctor {
        /// Path to the campaign spec file.
        #[arg(long)]
        spec: PathBuf,
        #[command(flatten)]
        global: GlobalArgs,
    },
}

/// Top-level `campaign` command-line parser.
#[derive(Debug, Parser)]
#[command(name = "campaign", about = "Campaign execution engine", version)]
pub struct Cli {
    /// The invoked subcommand.
    #[command(subcommand)]
    pub command: Commands,
}

/// Extracts the `--json` flag shared by every subcommand, for use before a
/// command's own result (or the error that replaces it) is known.
const fn commands_json_flag(command: &Commands) -> bool {
    match command {
        Commands::Lint {
            global, ..
        }
        | Commands::Run {
            global, ..
        }
        | Commands::Canary {
            global, ..
        }
        | Commands::Resume {
            global, ..
        }
        | Commands::Status {
            global, ..
        }
        | Commands::Report {
            global, ..
        }
        | Commands::PublishCheck {
            global, ..
        }
        | Commands::Doctor {
            global, ..
        } => global.json,
    }
}

// ============================================================================
// SECTION: Command Outcome
// ============================================================================

/// The rendered result of one successful (or gracefully failed) command,
/// deferring the human-vs-JSON choice to [`CommandOutcome::emit`].
pub struct CommandOutcome {
    exit_code: u8,
    json: bool,
    human_text: String,
    json_value: serde_json::Value,
}

impl CommandOutcome {
    /// Builds an outcome from its already-rendered human and JSON forms.
    fn new(exit_code: u8, json: bool, human_text: String, json_value: serde_json::Value) -> Self {
        Self {
            exit_code,
            json,
            human_text,
            json_value,
        }
    }

    /// Builds the failure outcome a [`CliError`] renders as, in whichever
    /// mode the caller originally requested.
    fn from_error(err: &CliError, json: bool) -> Self {
        let message = err.to_string();
        if let CliError::PromptModePolicy {
            violations,
        } = err
        {
            let violations_json: Vec<serde_json::Value> = violations
                .iter()
                .map(|hit| {
                    serde_json::json!({
                        "flowId": hit.flow_id.as_str(),
                        "missionIndex": hit.mission_index,
                        "term": hit.term,
                    })
                })
                .collect();
            let json_value = serde_json::json!({
                "code": "ReasonPromptModePolicy",
                "violations": violations_json,
            });
            return Self::new(err.exit_code(), json, message, json_value);
        }
        let json_value = serde_json::json!({
            "ok": false,
            "reasonCodes": Vec::<String>::new(),
            "error": message,
        });
        Self::new(err.exit_code(), json, message, json_value)
    }

    /// Builds an outcome from a (terminal or in-progress) run state.
    fn from_run_state(state: &RunState, exit_code: u8, json: bool) -> Self {
        let reason_codes: Vec<String> = state.reason_codes.iter().map(ToString::to_string).collect();
        let human = format!(
            "{status}: {completed}/{total} missions complete, runId={run_id}",
            status = state.status.as_str(),
            completed = state.missions_completed,
            total = state.total_missions,
            run_id = state.run_id,
        );
        let json_value = serde_json::json!({
            "ok": state.status == RunStatus::Valid,
            "status": state.status.as_str(),
            "campaignId": state.campaign_id.as_str(),
            "runId": state.run_id.to_string(),
            "missionsCompleted": state.missions_completed,
            "totalMissions": state.total_missions,
            "reasonCodes": reason_codes,
        });
        Self::new(exit_code, json, human, json_value)
    }

    /// Builds an outcome from a publish-check verdict.
    fn from_publish_check(result: &PublishCheckResult, exit_code: u8, json: bool) -> Self {
        let reason_codes: Vec<String> = result.reason_codes.iter().map(ToString::to_string).collect();
        let human = format!(
            "publish-check: {verdict} (promptModeCompliance={prompt}, toolDriverCompliance={tool})",
            verdict = if result.publish_ok { "ok" } else { "blocked" },
            prompt = result.prompt_mode_compliance,
            tool = result.tool_driver_compliance,
        );
        let json_value = serde_json::json!({
            "ok": result.publish_ok,
            "promptModeCompliance": result.prompt_mode_compliance,
            "toolDriverCompliance": result.tool_driver_compliance,
            "reasonCodes": reason_codes,
        });
        Self::new(exit_code, json, human, json_value)
    }

    /// The process exit code this outcome maps to.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.exit_code
    }

    /// Writes this outcome's rendering to stdout (success) or stderr
    /// (failure); `--json` always renders as one object on stdout.
    pub fn emit(&self) {
        if self.json {
            let rendered = serde_json::to_string_pretty(&self.json_value).unwrap_or_else(|_| "{}".to_string());
            output::write_stdout_line(&rendered);
        } else if self.exit_code == 0 {
            output::write_stdout_line(&self.human_text);
        } else {
            output::write_stderr_line(&self.human_text);
        }
    }
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Runs the already-parsed [`Cli`] to completion and returns the process
/// exit code.
pub async fn dispatch(cli: Cli) -> ExitCode {
    let json = commands_json_flag(&cli.command);
    let outcome = match run_command(cli.command).await {
        Ok(outcome) => outcome,
        Err(err) => CommandOutcome::from_error(&err, json),
    };
    outcome.emit();
    ExitCode::from(outcome.exit_code())
}

/// Routes a parsed subcommand to its handler.
async fn run_command(command: Commands) -> Result<CommandOutcome, CliError> {
    match command {
        Commands::Lint {
            spec,
            global,
        } => handle_lint(&spec, &global),
        Commands::Run {
            spec,
            missions,
            mission_offset,
            global,
        } => handle_run(&spec, missions, mission_offset, &global).await,
        Commands::Canary {
            spec,
            missions,
            mission_offset,
            global,
        } => handle_canary(&spec, missions, mission_offset, &global).await,
        Commands::Resume {
            campaign_id,
            global,
        } => handle_resume(&campaign_id, &global).await,
        Commands::Status {
            campaign_id,
            global,
        } => handle_status(&campaign_id, &global),
        Commands::Report {
            campaign_id,
            spec,
            format,
            force,
            global,
        } => handle_report(campaign_id.as_deref(), spec.as_deref(), format.as_deref(), force, &global),
        Commands::PublishCheck {
            campaign_id,
            spec,
            force,
            global,
        } => handle_publish_check(campaign_id.as_deref(), spec.as_deref(), force, &global),
        Commands::Doctor {
            spec,
            global,
        } => handle_doctor(&spec, &global),
    }
}

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Loads and validates this invocation's `campaign.toml`, if any.
fn load_config() -> Result<CampaignConfig, CliError> {
    let config = CampaignConfig::load(None).map_err(config_err_to_cli)?;
    config.validate().map_err(config_err_to_cli)?;
    Ok(config)
}

/// Generates a fresh [`RunId`] from the current wall clock and an 8-character
/// random alphanumeric suffix.
fn fresh_run_id() -> RunId {
    use rand::Rng as _;
    use rand::distributions::Alphanumeric;

    let millis = Timestamp::now().as_unix_millis();
    let suffix: String = rand::thread_rng().sample_iter(&Alphanumeric).take(8).map(char::from).collect();
    RunId::generate(millis, &suffix)
}

/// Applies `--mission-offset` then `--missions` to a resolved mission-index
/// list, in that order.
fn windowed_missions(base: &[usize], offset: Option<usize>, limit: Option<usize>) -> Vec<usize> {
    let skipped: Vec<usize> = base.iter().copied().skip(offset.unwrap_or(0)).collect();
    window_mission_indexes(&skipped, limit)
}

/// Creates `out_root` if absent and confirms it is writable by probing a
/// throwaway file.
fn check_out_root_writable(out_root: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(out_root).map_err(|source| CliError::Io(format!("{}: {source}", out_root.display())))?;
    let probe = out_root.join(".campaign-doctor-probe");
    std::fs::write(&probe, b"ok").map_err(|source| CliError::Io(format!("{}: {source}", out_root.display())))?;
    let _ignored = std::fs::remove_file(&probe);
    Ok(())
}

/// Locates a campaign's last recorded run state and the spec it was run
/// from, accepting either `--spec` (freshly re-parsed) or `--campaign-id`
/// (whose prior run state records the spec path it used).
fn locate_run_state_and_spec(
    campaign_id_arg: Option<&str>,
    spec_arg: Option<&Path>,
    global: &GlobalArgs,
) -> Result<(RunState, ParsedSpec, String), CliError> {
    let config = load_config()?;

    if let Some(spec_path) = spec_arg {
        let parsed = load_parsed_spec(spec_path).map_err(spec_err_to_cli)?;
        let out_root = campaign_config::resolve_out_root(global.out_root.as_deref(), parsed.spec.out_root.as_deref(), &config);
        let persister = ArtifactPersister::new(PathBuf::from(&out_root));
        let state = persister
            .read_run_state(&parsed.spec.campaign_id)
            .map_err(persist_err_to_cli)?
            .ok_or_else(|| CliError::Usage(format!("no run recorded for campaign {}", parsed.spec.campaign_id)))?;
        return Ok((state, parsed, out_root));
    }

    let campaign_id_raw = campaign_id_arg.ok_or_else(|| CliError::Usage("requires --campaign-id or --spec".to_string()))?;
    let campaign_id = CampaignId::new(campaign_id_raw.to_string()).map_err(campaign_id_err_to_cli)?;
    let initial_out_root = campaign_config::resolve_out_root(global.out_root.as_deref(), None, &config);
    let persister = ArtifactPersister::new(PathBuf::from(&initial_out_root));
    let state = persister
        .read_run_state(&campaign_id)
        .map_err(persist_err_to_cli)?
        .ok_or_else(|| CliError::Usage(format!("no run recorded for campaign {campaign_id}")))?;
    let parsed = load_parsed_spec(Path::new(&state.spec_path)).map_err(spec_err_to_cli)?;
    let out_root = state.out_root.clone();
    Ok((state, parsed, out_root))
}

/// Refuses to regenerate a report for a still-running invocation, and
/// enforces `invalidRunPolicy` unless `--force` is given.
fn gate_report(state: &RunState, invalid_run_policy: &InvalidRunPolicySpec, force: bool) -> Result<(), CliError> {
    if state.status == RunStatus::Running {
        return Err(CliError::Usage("campaign run is still in progress".to_string()));
    }
    if force {
        return Ok(());
    }
    let acceptable = if invalid_run_policy.publish_requires_valid {
        state.status == RunStatus::Valid
    } else {
        state.status != RunStatus::Aborted
    };
    if acceptable {
        Ok(())
    } else {
        Err(CliError::Policy(format!(
            "run status {} does not satisfy invalidRunPolicy (use --force to override)",
            state.status.as_str()
        )))
    }
}

// ============================================================================
// SECTION: Command Handlers
// ============================================================================

/// Handles `campaign lint`.
fn handle_lint(spec: &Path, global: &GlobalArgs) -> Result<CommandOutcome, CliError> {
    let parsed = load_parsed_spec(spec).map_err(spec_err_to_cli)?;
    let human = format!(
        "lint ok: campaign={campaign_id} flows={flows} missionsSelected={missions}",
        campaign_id = parsed.spec.campaign_id,
        flows = parsed.spec.flows.len(),
        missions = parsed.mission_indexes.len(),
    );
    let json_value = serde_json::json!({
        "ok": true,
        "campaignId": parsed.spec.campaign_id.as_str(),
        "flows": parsed.spec.flows.len(),
        "totalMissions": parsed.spec.total_missions,
        "missionsSelected": parsed.mission_indexes.len(),
    });
    Ok(CommandOutcome::new(0, global.json, human, json_value))
}

/// Handles `campaign run`.
async fn handle_run(
    spec: &Path,
    missions: Option<usize>,
    mission_offset: Option<usize>,
    global: &GlobalArgs,
) -> Result<CommandOutcome, CliError> {
    let parsed = load_parsed_spec(spec).map_err(spec_err_to_cli)?;
    let config = load_config()?;
    campaign_config::enforce_version_floor(env!("CARGO_PKG_VERSION")).map_err(version_floor_err_to_cli)?;

    let mission_indexes = windowed_missions(&parsed.mission_indexes, mission_offset, missions);
    execute_campaign(&parsed, mission_indexes, false, None, global, &config, None).await
}

/// Handles `campaign canary`.
async fn handle_canary(
    spec: &Path,
    missions: Option<usize>,
    mission_offset: Option<usize>,
    global: &GlobalArgs,
) -> Result<CommandOutcome, CliError> {
    let parsed = load_parsed_spec(spec).map_err(spec_err_to_cli)?;
    let config = load_config()?;
    campaign_config::enforce_version_floor(env!("CARGO_PKG_VERSION")).map_err(version_floor_err_to_cli)?;

    let limit = Some(missions.unwrap_or(parsed.spec.canary_missions));
    let mission_indexes = windowed_missions(&parsed.mission_indexes, mission_offset, limit);
    execute_campaign(&parsed, mission_indexes, true, None, global, &config, None).await
}

/// Handles `campaign resume`.
async fn handle_resume(campaign_id: &str, global: &GlobalArgs) -> Result<CommandOutcome, CliError> {
    let campaign_id = CampaignId::new(campaign_id.to_string()).map_err(campaign_id_err_to_cli)?;
    let config = load_config()?;
    let out_root = campaign_config::resolve_out_root(global.out_root.as_deref(), None, &config);
    let persister = ArtifactPersister::new(PathBuf::from(&out_root));
    let prior = persister
        .read_run_state(&campaign_id)
        .map_err(persist_err_to_cli)?
        .ok_or_else(|| CliError::Usage(format!("no prior run recorded for campaign {campaign_id}")))?;

    let parsed = load_parsed_spec(Path::new(&prior.spec_path)).map_err(spec_err_to_cli)?;
    let mission_indexes = resolve_resume_mission_indexes(&prior, &parsed).map_err(resume_err_to_cli)?;
    let resumed_out_root = prior.out_root.clone();
    execute_campaign(
        &parsed,
        mission_indexes,
        prior.canary,
        Some(prior.run_id.clone()),
        global,
        &config,
        Some(resumed_out_root),
    )
    .await
}

/// Handles `campaign status`.
fn handle_status(campaign_id: &str, global: &GlobalArgs) -> Result<CommandOutcome, CliError> {
    let campaign_id = CampaignId::new(campaign_id.to_string()).map_err(campaign_id_err_to_cli)?;
    let config = load_config()?;
    let out_root = campaign_config::resolve_out_root(global.out_root.as_deref(), None, &config);
    let persister = ArtifactPersister::new(PathBuf::from(&out_root));
    let state = persister
        .read_run_state(&campaign_id)
        .map_err(persist_err_to_cli)?
        .ok_or_else(|| CliError::Usage(format!("no run recorded for campaign {campaign_id}")))?;
    Ok(CommandOutcome::from_run_state(&state, 0, global.json))
}

/// Handles `campaign report`.
fn handle_report(
    campaign_id: Option<&str>,
    spec: Option<&Path>,
    format: Option<&str>,
    force: bool,
    global: &GlobalArgs,
) -> Result<CommandOutcome, CliError> {
    let (state, parsed, out_root) = locate_run_state_and_spec(campaign_id, spec, global)?;
    gate_report(&state, &parsed.spec.invalid_run_policy, force)?;

    let persister = ArtifactPersister::new(PathBuf::from(&out_root));
    let report = BuildReport::from_run_state(&state);
    let summary = BuildSummary::from_run_state(&state);
    let markdown = render_results_md(&state);
    persister.write_report(&report).map_err(persist_err_to_cli)?;
    persister.write_summary(&summary).map_err(persist_err_to_cli)?;
    persister.write_results_md(&state.campaign_id, &markdown).map_err(persist_err_to_cli)?;

    let report_json = serde_json::to_value(&report).map_err(|source| CliError::Io(source.to_string()))?;
    let wants_markdown = format.is_some_and(|value| value.split(',').any(|part| part.trim() == "md"));
    let human = if wants_markdown {
        markdown
    } else {
        serde_json::to_string_pretty(&report).map_err(|source| CliError::Io(source.to_string()))?
    };

    Ok(CommandOutcome::new(0, global.json, human, report_json))
}

/// Handles `campaign publish-check`.
fn handle_publish_check(
    campaign_id: Option<&str>,
    spec: Option<&Path>,
    force: bool,
    global: &GlobalArgs,
) -> Result<CommandOutcome, CliError> {
    let (state, parsed, _out_root) = locate_run_state_and_spec(campaign_id, spec, global)?;

    let mission_check = resolve_mission_indexes(&parsed.spec.mission_source.selection, parsed.spec.total_missions);
    let shim_check = enforce_tool_driver_shim_policy(&parsed.spec);
    let policy_error: Option<SpecError> = mission_check.err().or_else(|| shim_check.err());
    let prompt_violation = scan_forbidden_prompt_terms(&parsed.spec, &parsed.mission_indexes, &parsed.flow_suites).err();

    let input = PublishCheckInput {
        run_state: &state,
        invalid_run_policy: &parsed.spec.invalid_run_policy,
        policy_error: policy_error.as_ref(),
        prompt_mode_violation: prompt_violation.as_ref(),
        force,
    };
    let result = evaluate_publish_check(&input);
    let exit_code = if result.publish_ok { 0 } else { 2 };
    Ok(CommandOutcome::from_publish_check(&result, exit_code, global.json))
}

/// Handles `campaign doctor`.
fn handle_doctor(spec: &Path, global: &GlobalArgs) -> Result<CommandOutcome, CliError> {
    let parsed = load_parsed_spec(spec).map_err(spec_err_to_cli)?;
    let config = load_config()?;
    campaign_config::enforce_version_floor(env!("CARGO_PKG_VERSION")).map_err(version_floor_err_to_cli)?;

    let out_root = campaign_config::resolve_out_root(global.out_root.as_deref(), parsed.spec.out_root.as_deref(), &config);
    check_out_root_writable(Path::new(&out_root))?;
    let shell = campaign_config::detect_cleanup_shell();

    let human = format!(
        "doctor ok: campaign={campaign_id} flows={flows} missionsSelected={missions} outRoot={out_root} shell={shell}",
        campaign_id = parsed.spec.campaign_id,
        flows = parsed.spec.flows.len(),
        missions = parsed.mission_indexes.len(),
    );
    let json_value = serde_json::json!({
        "ok": true,
        "campaignId": parsed.spec.campaign_id.as_str(),
        "flows": parsed.spec.flows.len(),
        "missionsSelected": parsed.mission_indexes.len(),
        "outRoot": out_root,
        "shell": shell,
    });
    Ok(CommandOutcome::new(0, global.json, human, json_value))
}

/// Resolves the output root and shell, mints a fresh run id, and executes
/// one campaign invocation end to end.
async fn execute_campaign(
    parsed: &ParsedSpec,
    mission_indexes: Vec<usize>,
    canary: bool,
    resumed_from_run_id: Option<RunId>,
    global: &GlobalArgs,
    config: &CampaignConfig,
    out_root_override: Option<String>,
) -> Result<CommandOutcome, CliError> {
    let out_root = out_root_override
        .unwrap_or_else(|| campaign_config::resolve_out_root(global.out_root.as_deref(), parsed.spec.out_root.as_deref(), config));
    let shell = campaign_config::detect_cleanup_shell();
    let run_id = fresh_run_id();

    let engine = ExecutionEngine::new(PathBuf::from(&out_root));
    let options = ExecutionOptions {
        out_root: out_root.clone(),
        run_id,
        canary,
        resumed_from_run_id,
        mission_indexes,
        global_timeout_ms: parsed.spec.timeouts.campaign_global_timeout_ms,
        cleanup_hook_timeout_ms: parsed.spec.timeouts.cleanup_hook_timeout_ms,
        lock_wait: Duration::from_millis(config.lock_wait_ms),
        stale_lock_ms: config.stale_lock_ms,
        pid: std::process::id(),
        shell,
    };

    let (state, exit_code) = engine.execute(parsed, options).await.map_err(engine_err_to_cli)?;
    let exit_code_u8 = if exit_code == 0 {
        0u8
    } else {
        2u8
    };
    Ok(CommandOutcome::from_run_state(&state, exit_code_u8, global.json))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::panic, reason = "unit tests for argument parsing only")]
mod tests {
    use clap::Parser as _;

    use super::Cli;
    use super::Commands;

    #[test]
    fn parses_run_with_missions_and_global_flags() {
        let cli = Cli::parse_from([
            "campaign",
            "run",
            "--spec",
            "spec.json",
            "--out-root",
            "/tmp/out",
            "--missions",
            "2",
            "--mission-offset",
            "1",
            "--json",
        ]);
        let Commands::Run {
            spec,
            missions,
            mission_offset,
            global,
        } = cli.command
        else {
            panic!("expected Commands::Run");
        };
        assert_eq!(spec.to_string_lossy(), "spec.json");
        assert_eq!(missions, Some(2));
        assert_eq!(mission_offset, Some(1));
        assert!(global.json);
        assert_eq!(global.out_root.as_deref(), Some("/tmp/out"));
    }

    #[test]
    fn canary_missions_and_offset_default_to_none() {
        let cli = Cli::parse_from(["campaign", "canary", "--spec", "spec.json"]);
        let Commands::Canary {
            missions,
            mission_offset,
            global,
            ..
        } = cli.command
        else {
            panic!("expected Commands::Canary");
        };
        assert_eq!(missions, None);
        assert_eq!(mission_offset, None);
        assert!(!global.json);
    }

    #[test]
    fn report_accepts_campaign_id_or_spec() {
        let by_id = Cli::parse_from(["campaign", "report", "--campaign-id", "demo"]);
        let Commands::Report {
            campaign_id, spec, ..
        } = by_id.command
        else {
            panic!("expected Commands::Report");
        };
        assert_eq!(campaign_id.as_deref(), Some("demo"));
        assert_eq!(spec, None);

        let by_spec = Cli::parse_from(["campaign", "report", "--spec", "spec.json", "--force"]);
        let Commands::Report {
            campaign_id, spec, force, ..
        } = by_spec.command
        else {
            panic!("expected Commands::Report");
        };
        assert_eq!(campaign_id, None);
        assert!(spec.is_some());
        assert!(force);
    }

    #[test]
    fn publish_check_force_flag_parses() {
        let cli = Cli::parse_from(["campaign", "publish-check", "--campaign-id", "demo", "--force"]);
        let Commands::PublishCheck {
            force, ..
        } = cli.command
        else {
            panic!("expected Commands::PublishCheck");
        };
        assert!(force);
    }

    #[test]
    fn resume_and_status_require_campaign_id() {
        let resume = Cli::try_parse_from(["campaign", "resume"]);
        assert!(resume.is_err());
        let status = Cli::try_parse_from(["campaign", "status", "--campaign-id", "demo"]);
        assert!(status.is_ok());
    }
}
