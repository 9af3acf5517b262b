// campaign-engine/tests/publish_check.rs
//! The five-step publish-check algorithm: base verdict, status allow-list,
//! policy re-parse failure, prompt-mode violation, and the `--force` override.
#![allow(
    clippy::missing_docs_in_private_items,
    missing_docs,
    clippy::use_debug,
    reason = "Test-only fixture helpers and debug-formatted failure messages."
)]

use campaign_core::CampaignId;
use campaign_core::InvalidRunPolicySpec;
use campaign_core::LockOwner;
use campaign_core::PromptModeViolationError;
use campaign_core::ReasonCode;
use campaign_core::RunId;
use campaign_core::RunState;
use campaign_core::RunStatus;
use campaign_core::SpecError;
use campaign_core::Timestamp;
use campaign_engine::PublishCheckInput;
use campaign_engine::evaluate_publish_check;

type TestResult = Result<(), String>;

fn terminal_state(campaign_id: &str, status: RunStatus) -> Result<RunState, String> {
    let lock_owner = LockOwner {
        pid: 1,
        started_at: Timestamp::from_unix_millis(0),
    };
    let mut state = RunState::new_running(
        CampaignId::new(campaign_id).map_err(|err| err.to_string())?,
        RunId::generate(0, "publish-check"),
        None,
        "/specs/demo.json".to_string(),
        "/out".to_string(),
        1,
        false,
        vec![0],
        Timestamp::from_unix_millis(0),
        lock_owner,
    );
    state.status = status;
    Ok(state)
}

#[test]
fn a_valid_run_publishes_clean_under_the_default_policy() -> TestResult {
    let state = terminal_state("demo-valid", RunStatus::Valid)?;
    let policy = InvalidRunPolicySpec::default();
    let input = PublishCheckInput {
        run_state: &state,
        invalid_run_policy: &policy,
        policy_error: None,
        prompt_mode_violation: None,
        force: false,
    };
    let result = evaluate_publish_check(&input);
    if !result.publish_ok || !result.prompt_mode_compliance || !result.tool_driver_compliance {
        return Err(format!("expected a clean publish verdict for a valid run, got {result:?}"));
    }
    Ok(())
}

#[test]
fn an_invalid_run_fails_publication_when_the_policy_requires_valid() -> TestResult {
    let state = terminal_state("demo-invalid", RunStatus::Invalid)?;
    let policy = InvalidRunPolicySpec::default();
    let input = PublishCheckInput {
        run_state: &state,
        invalid_run_policy: &policy,
        policy_error: None,
        prompt_mode_violation: None,
        force: false,
    };
    let result = evaluate_publish_check(&input);
    if result.publish_ok {
        return Err("expected an invalid run to fail publication under the default policy".to_string());
    }
    Ok(())
}

#[test]
fn an_explicit_status_allow_list_further_restricts_the_base_verdict() -> TestResult {
    let state = terminal_state("demo-allow-list", RunStatus::Invalid)?;
    let policy = InvalidRunPolicySpec {
        statuses: vec!["invalid".to_string()],
        publish_requires_valid: false,
        force_flag: None,
    };
    let input = PublishCheckInput {
        run_state: &state,
        invalid_run_policy: &policy,
        policy_error: None,
        prompt_mode_violation: None,
        force: false,
    };
    let result = evaluate_publish_check(&input);
    if !result.publish_ok {
        return Err("expected invalid to be publishable once explicitly allow-listed".to_string());
    }

    let aborted_state = terminal_state("demo-allow-list-2", RunStatus::Aborted)?;
    let input2 = PublishCheckInput {
        run_state: &aborted_state,
        invalid_run_policy: &policy,
        policy_error: None,
        prompt_mode_violation: None,
        force: false,
    };
    let result2 = evaluate_publish_check(&input2);
    if result2.publish_ok {
        return Err("expected aborted to stay rejected when only invalid is allow-listed".to_string());
    }
    Ok(())
}

#[test]
fn a_policy_re_parse_error_fails_publication_and_is_recorded() -> TestResult {
    let state = terminal_state("demo-policy-error", RunStatus::Valid)?;
    let policy = InvalidRunPolicySpec::default();
    let error = SpecError::ToolDriverShim {
        flow_id: "flow-a".to_string(),
        detail: "shim not permitted under native tool driver".to_string(),
    };
    let input = PublishCheckInput {
        run_state: &state,
        invalid_run_policy: &policy,
        policy_error: Some(&error),
        prompt_mode_violation: None,
        force: false,
    };
    let result = evaluate_publish_check(&input);
    if result.publish_ok || result.tool_driver_compliance {
        return Err(format!("expected a policy re-parse error to fail publication, got {result:?}"));
    }
    if !result.reason_codes.contains(&ReasonCode::ReasonToolDriverShim) {
        return Err(format!("expected ReasonToolDriverShim among reasons, got {:?}", result.reason_codes));
    }
    Ok(())
}

#[test]
fn a_prompt_mode_violation_fails_publication_and_is_recorded() -> TestResult {
    let state = terminal_state("demo-prompt-mode", RunStatus::Valid)?;
    let policy = InvalidRunPolicySpec::default();
    let violation = PromptModeViolationError(vec![campaign_core::ForbiddenTermHit {
        flow_id: campaign_core::FlowId::new("flow-a"),
        mission_index: 0,
        term: "secret".to_string(),
    }]);
    let input = PublishCheckInput {
        run_state: &state,
        invalid_run_policy: &policy,
        policy_error: None,
        prompt_mode_violation: Some(&violation),
        force: false,
    };
    let result = evaluate_publish_check(&input);
    if result.publish_ok || result.prompt_mode_compliance {
        return Err(format!("expected a prompt-mode violation to fail publication, got {result:?}"));
    }
    if !result.reason_codes.contains(&ReasonCode::ReasonPromptModePolicy) {
        return Err(format!("expected ReasonPromptModePolicy among reasons, got {:?}", result.reason_codes));
    }
    Ok(())
}

#[test]
fn force_overrides_the_verdict_but_keeps_every_recorded_reason_code() -> TestResult {
    let state = terminal_state("demo-force", RunStatus::Invalid)?;
    let policy = InvalidRunPolicySpec::default();
    let violation = PromptModeViolationError(vec![campaign_core::ForbiddenTermHit {
        flow_id: campaign_core::FlowId::new("flow-a"),
        mission_index: 0,
        term: "secret".to_string(),
    }]);
    let input = PublishCheckInput {
        run_state: &state,
        invalid_run_policy: &policy,
        policy_error: None,
        prompt_mode_violation: Some(&violation),
        force: true,
    };
    let result = evaluate_publish_check(&input);
    if !result.publish_ok {
        return Err("expected --force to override a failing verdict".to_string());
    }
    if result.prompt_mode_compliance {
        return Err("expected --force to leave the underlying compliance flag honest".to_string());
    }
    if !result.reason_codes.contains(&ReasonCode::ReasonPromptModePolicy) {
        return Err(format!("expected --force to preserve recorded reasons, got {:?}", result.reason_codes));
    }
    Ok(())
}
