// campaign-engine/tests/persister.rs
//! Atomic write/read round trips for every artifact kind the engine persists.
#![allow(
    clippy::missing_docs_in_private_items,
    missing_docs,
    reason = "Test functions are self-describing by name; see campaign-cli's test suite for the same convention."
)]

use campaign_core::AttemptId;
use campaign_core::AttemptOutcome;
use campaign_core::AttemptStatus;
use campaign_core::CampaignId;
use campaign_core::FlowId;
use campaign_core::FlowRun;
use campaign_core::LockOwner;
use campaign_core::MissionGate;
use campaign_core::MissionGateAttempt;
use campaign_core::MissionId;
use campaign_core::RunId;
use campaign_core::RunState;
use campaign_core::Timestamp;
use campaign_engine::ArtifactPersister;
use campaign_engine::persist::BuildReport;
use campaign_engine::persist::BuildSummary;

type TestResult = Result<(), String>;

fn sample_state(campaign_id: &str, run_id: &str) -> Result<RunState, String> {
    let lock_owner = LockOwner {
        pid: 4242,
        started_at: Timestamp::from_unix_millis(1_000),
    };
    let mut state = RunState::new_running(
        CampaignId::new(campaign_id).map_err(|err| err.to_string())?,
        RunId::new(run_id),
        None,
        "/specs/demo.json".to_string(),
        "/out".to_string(),
        1,
        false,
        vec![0],
        Timestamp::from_unix_millis(1_000),
        lock_owner,
    );

    let attempt = MissionGateAttempt {
        flow_id: FlowId::new("flow-a"),
        attempt_id: AttemptId::new("attempt-0"),
        attempt_dir: None,
        status: AttemptOutcome::Valid,
        ok: true,
        errors: Vec::new(),
    };
    let gate = MissionGate {
        mission_index: 0,
        mission_id: MissionId::new("mission-0"),
        ok: true,
        reasons: Vec::new(),
        attempts: vec![attempt.clone()],
    };
    let flow_run = FlowRun {
        flow_id: FlowId::new("flow-a"),
        runner_type: "fake".to_string(),
        run_id: "child-run-1".to_string(),
        suite_file: "/out/generated-suites/flow-a.suite.json".to_string(),
        exit_code: 0,
        ok: true,
        errors: Vec::new(),
        error_output: String::new(),
        attempts: vec![AttemptStatus {
            mission_index: 0,
            mission_id: MissionId::new("mission-0"),
            attempt_id: AttemptId::new("attempt-0"),
            attempt_dir: None,
            status: AttemptOutcome::Valid,
            runner_ref: None,
            runner_error_code: None,
            auto_feedback_code: None,
            errors: Vec::new(),
        }],
    };
    state.record_mission(vec![flow_run], gate);
    state.finish(false, Timestamp::from_unix_millis(2_000));
    Ok(state)
}

#[test]
fn run_state_round_trips_through_both_its_mirrors() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let persister = ArtifactPersister::new(dir.path().to_path_buf());
    let state = sample_state("demo-persist", "0000000000001-aaa")?;

    persister.write_run_state(&state).map_err(|err| err.to_string())?;

    let run_path = persister.run_dir(&state.run_id).join("run-state.json");
    let campaign_path = persister.campaign_dir(&state.campaign_id).join("run-state.json");
    if !run_path.is_file() || !campaign_path.is_file() {
        return Err("expected both run-state.json mirrors to exist".to_string());
    }

    let run_bytes = std::fs::read(&run_path).map_err(|err| err.to_string())?;
    let campaign_bytes = std::fs::read(&campaign_path).map_err(|err| err.to_string())?;
    if run_bytes != campaign_bytes {
        return Err("expected byte-identical run-state mirrors".to_string());
    }

    let reloaded = persister
        .read_run_state(&state.campaign_id)
        .map_err(|err| err.to_string())?
        .ok_or("expected a run state to be readable back")?;
    if reloaded != state {
        return Err("round-tripped run state did not match the original".to_string());
    }
    Ok(())
}

#[test]
fn read_run_state_returns_none_when_nothing_was_ever_written() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let persister = ArtifactPersister::new(dir.path().to_path_buf());
    let campaign_id = CampaignId::new("never-run").map_err(|err| err.to_string())?;

    let reloaded = persister.read_run_state(&campaign_id).map_err(|err| err.to_string())?;
    if reloaded.is_some() {
        return Err("expected no run state for a campaign that never ran".to_string());
    }
    Ok(())
}

#[test]
fn write_report_and_summary_derive_from_run_state_and_are_readable() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let persister = ArtifactPersister::new(dir.path().to_path_buf());
    let state = sample_state("demo-report", "0000000000002-bbb")?;

    let report = BuildReport::from_run_state(&state);
    persister.write_report(&report).map_err(|err| err.to_string())?;
    let summary = BuildSummary::from_run_state(&state);
    persister.write_summary(&summary).map_err(|err| err.to_string())?;

    let report_path = persister.campaign_dir(&state.campaign_id).join("report.json");
    let summary_path = persister.campaign_dir(&state.campaign_id).join("summary.json");
    let report_value: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&report_path).map_err(|err| err.to_string())?).map_err(|err| err.to_string())?;
    let summary_value: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&summary_path).map_err(|err| err.to_string())?).map_err(|err| err.to_string())?;

    if report_value["status"] != "valid" || report_value["missionsCompleted"] != 1 {
        return Err(format!("unexpected report.json contents: {report_value}"));
    }
    if summary_value["missions"][0]["ok"] != true {
        return Err(format!("unexpected summary.json contents: {summary_value}"));
    }
    Ok(())
}

#[test]
fn write_results_md_and_generated_suite_land_under_the_campaign_directory() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let persister = ArtifactPersister::new(dir.path().to_path_buf());
    let campaign_id = CampaignId::new("demo-artifacts").map_err(|err| err.to_string())?;

    persister.write_results_md(&campaign_id, "# Campaign demo-artifacts\n").map_err(|err| err.to_string())?;
    let md_path = persister.campaign_dir(&campaign_id).join("RESULTS.md");
    let md = std::fs::read_to_string(&md_path).map_err(|err| err.to_string())?;
    if !md.starts_with("# Campaign demo-artifacts") {
        return Err(format!("unexpected RESULTS.md contents: {md}"));
    }

    let suite = campaign_core::MaterializedSuite {
        suite_id: campaign_core::SuiteId::new("suite-a"),
        missions: vec![campaign_core::MissionDef {
            id: MissionId::new("mission-0"),
            prompt: "do task 0".to_string(),
            tags: Vec::new(),
        }],
    };
    let flow_id = FlowId::new("flow-a");
    let written = persister
        .write_generated_suite(&campaign_id, &flow_id, &suite)
        .map_err(|err| err.to_string())?;
    if !written.is_file() {
        return Err("expected generated suite file to exist".to_string());
    }
    Ok(())
}

#[test]
fn no_partial_file_is_ever_observable_at_the_final_path() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let persister = ArtifactPersister::new(dir.path().to_path_buf());
    let state = sample_state("demo-atomic", "0000000000003-ccc")?;
    persister.write_run_state(&state).map_err(|err| err.to_string())?;

    let campaign_dir = persister.campaign_dir(&state.campaign_id);
    let leftover_tmp: Vec<_> = std::fs::read_dir(&campaign_dir)
        .map_err(|err| err.to_string())?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().contains(".tmp-"))
        .collect();
    if !leftover_tmp.is_empty() {
        return Err(format!("expected no leftover temp files, found {}", leftover_tmp.len()));
    }
    Ok(())
}
