// campaign-core/tests/run_state.rs
//! RunState aggregation, completion counting, and terminal-status invariants.

use campaign_core::CampaignId;
use campaign_core::LockOwner;
use campaign_core::MissionGate;
use campaign_core::MissionId;
use campaign_core::ReasonCode;
use campaign_core::RunId;
use campaign_core::RunState;
use campaign_core::RunStatus;
use campaign_core::Timestamp;

fn lock_owner() -> LockOwner {
    LockOwner {
        pid: 1234,
        started_at: Timestamp::from_unix_millis(0),
    }
}

fn fresh_state(total_missions: usize, mission_indexes: Vec<usize>) -> RunState {
    RunState::new_running(
        CampaignId::new("demo").unwrap(),
        RunId::new("r1"),
        None,
        "/spec.yaml".to_string(),
        "/out".to_string(),
        total_missions,
        true,
        mission_indexes,
        Timestamp::from_unix_millis(0),
        lock_owner(),
    )
}

fn ok_gate(mission_index: usize) -> MissionGate {
    MissionGate {
        mission_index,
        mission_id: MissionId::new(format!("m{mission_index}")),
        ok: true,
        reasons: vec![],
        attempts: vec![],
    }
}

#[test]
fn record_mission_tracks_completion_count() {
    let mut state = fresh_state(5, vec![0, 1]);
    state.record_mission(vec![], ok_gate(0));
    assert_eq!(state.missions_completed, 1);
    assert_eq!(state.missions.len(), 1);
}

#[test]
fn missions_completed_never_exceeds_recorded_missions() {
    let mut state = fresh_state(5, vec![0, 1]);
    state.record_mission(vec![], ok_gate(0));
    state.record_mission(vec![], ok_gate(1));
    assert_eq!(state.missions_completed, state.missions.len());
}

#[test]
fn finish_marks_valid_when_all_gates_pass_and_no_reasons() {
    let mut state = fresh_state(1, vec![0]);
    state.record_mission(vec![], ok_gate(0));
    state.finish(false, Timestamp::from_unix_millis(10));
    assert_eq!(state.status, RunStatus::Valid);
    assert_eq!(state.finished_at, Some(Timestamp::from_unix_millis(10)));
}

#[test]
fn finish_marks_invalid_when_a_mission_gate_fails() {
    let mut state = fresh_state(1, vec![0]);
    state.record_mission(
        vec![],
        MissionGate {
            mission_index: 0,
            mission_id: MissionId::new("m0"),
            ok: false,
            reasons: vec![ReasonCode::CampaignTraceGate],
            attempts: vec![],
        },
    );
    state.finish(false, Timestamp::from_unix_millis(10));
    assert_eq!(state.status, RunStatus::Invalid);
}

#[test]
fn finish_marks_aborted_when_deadline_elapsed_even_with_passing_gates() {
    let mut state = fresh_state(1, vec![0]);
    state.record_mission(vec![], ok_gate(0));
    state.finish(true, Timestamp::from_unix_millis(10));
    assert_eq!(state.status, RunStatus::Aborted);
}

#[test]
fn reason_codes_are_sorted_and_deduplicated() {
    let mut state = fresh_state(1, vec![0]);
    state.append_reason(ReasonCode::Timeout);
    state.append_reason(ReasonCode::CampaignSkipped);
    state.append_reason(ReasonCode::Timeout);
    assert_eq!(state.reason_codes.len(), 2);
    assert!(state.reason_codes.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn reason_codes_deterministic_across_equal_inputs() {
    let mut a = fresh_state(1, vec![0]);
    let mut b = fresh_state(1, vec![0]);
    for code in [ReasonCode::CampaignTraceGate, ReasonCode::CampaignSkipped, ReasonCode::Timeout] {
        a.append_reason(code.clone());
    }
    for code in [ReasonCode::Timeout, ReasonCode::CampaignTraceGate, ReasonCode::CampaignSkipped] {
        b.append_reason(code.clone());
    }
    assert_eq!(a.reason_codes, b.reason_codes);
}
