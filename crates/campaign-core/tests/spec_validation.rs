// campaign-core/tests/spec_validation.rs
//! Mission-selection resolution and policy-check coverage.

use std::collections::BTreeMap;

use campaign_core::CampaignSpec;
use campaign_core::FlowId;
use campaign_core::FlowMode;
use campaign_core::FlowSpec;
use campaign_core::MaterializedSuite;
use campaign_core::MissionDef;
use campaign_core::MissionId;
use campaign_core::NoContextSpec;
use campaign_core::PromptMode;
use campaign_core::ResultChannel;
use campaign_core::RunnerSpec;
use campaign_core::SelectionMode;
use campaign_core::SessionIsolation;
use campaign_core::SpecError;
use campaign_core::SuiteId;
use campaign_core::ToolDriverKind;
use campaign_core::ToolDriverSpec;
use campaign_core::enforce_tool_driver_shim_policy;
use campaign_core::resolve_mission_indexes;
use campaign_core::scan_forbidden_prompt_terms;
use campaign_core::window_mission_indexes;

fn sample_flow(flow_id: &str, tool_driver: ToolDriverKind, shims: Vec<String>) -> FlowSpec {
    FlowSpec {
        flow_id: FlowId::new(flow_id),
        suite_file: None,
        suite: Some(campaign_core::InlineSuite {
            suite_id: SuiteId::new("suite-a"),
            missions: vec![],
        }),
        runner: RunnerSpec {
            runner_type: "agent".to_string(),
            mode: None,
            command: vec!["runner".to_string()],
            env: BTreeMap::new(),
            shims,
            tool_driver: ToolDriverSpec {
                kind: tool_driver,
            },
            session_isolation: SessionIsolation::FreshPerAttempt,
            feedback_policy: "auto".to_string(),
            finalization: campaign_core::FinalizationSpec {
                mode: "auto".to_string(),
                min_result_turn: 0,
                result_channel: ResultChannel::Marker {
                    marker: "DONE".to_string(),
                },
            },
            timeout_ms: 60_000,
            timeout_start: "spawn".to_string(),
            strict: false,
            strict_expect: false,
            mcp: campaign_core::McpSpec::default(),
        },
    }
}

fn sample_spec() -> CampaignSpec {
    CampaignSpec {
        schema_version: "1".to_string(),
        campaign_id: campaign_core::CampaignId::new("demo").unwrap(),
        prompt_mode: PromptMode::Free,
        total_missions: 5,
        canary_missions: 3,
        out_root: None,
        fail_fast: false,
        pair_gate: campaign_core::PairGateSpec::default(),
        semantic: campaign_core::SemanticSpec::default(),
        no_context: NoContextSpec::default(),
        timeouts: campaign_core::TimeoutsSpec::default(),
        execution: campaign_core::ExecutionSpec {
            flow_mode: FlowMode::PerMission,
        },
        mission_source: campaign_core::MissionSourceSpec::default(),
        invalid_run_policy: campaign_core::InvalidRunPolicySpec::default(),
        output: campaign_core::OutputSpec::default(),
        cleanup_hooks: Vec::new(),
        flows: vec![sample_flow("flowA", ToolDriverKind::Native, vec![])],
        extensions: None,
    }
}

#[test]
fn valid_spec_passes_structural_validation() {
    assert!(sample_spec().validate().is_ok());
}

#[test]
fn duplicate_flow_ids_are_rejected() {
    let mut spec = sample_spec();
    spec.flows.push(sample_flow("flowA", ToolDriverKind::Native, vec![]));
    assert_eq!(spec.validate(), Err(SpecError::DuplicateFlowId("flowA".to_string())));
}

#[test]
fn empty_command_is_rejected() {
    let mut spec = sample_spec();
    spec.flows[0].runner.command = vec![];
    assert_eq!(spec.validate(), Err(SpecError::EmptyCommand("flowA".to_string())));
}

#[test]
fn mission_selection_all_covers_full_range() {
    let resolved = resolve_mission_indexes(&SelectionMode::All, 5).unwrap();
    assert_eq!(resolved, vec![0, 1, 2, 3, 4]);
}

#[test]
fn mission_selection_dedupes_preserving_first_occurrence() {
    let selection = SelectionMode::Indexes {
        indexes: vec![2, 0, 2, 1],
    };
    assert_eq!(resolve_mission_indexes(&selection, 5).unwrap(), vec![2, 0, 1]);
}

#[test]
fn mission_selection_rejects_out_of_range_index() {
    let selection = SelectionMode::Indexes {
        indexes: vec![9],
    };
    assert!(matches!(
        resolve_mission_indexes(&selection, 5),
        Err(SpecError::MissionIndexOutOfRange(9, 5))
    ));
}

#[test]
fn missions_window_clamps_only_when_requested_limit_is_smaller() {
    let all = vec![0, 1, 2, 3, 4];
    assert_eq!(window_mission_indexes(&all, Some(2)), vec![0, 1]);
    assert_eq!(window_mission_indexes(&all, Some(100)), all);
    assert_eq!(window_mission_indexes(&all, None), all);
}

#[test]
fn prompt_mode_policy_flags_forbidden_term_with_location() {
    let mut spec = sample_spec();
    spec.prompt_mode = PromptMode::MissionOnly;
    spec.no_context.forbidden_prompt_terms = vec!["SECRET".to_string()];

    let mut suites = BTreeMap::new();
    suites.insert(
        FlowId::new("flowA"),
        MaterializedSuite {
            suite_id: SuiteId::new("suite-a"),
            missions: vec![
                MissionDef {
                    id: MissionId::new("m0"),
                    prompt: "do the task".to_string(),
                    tags: vec![],
                },
                MissionDef {
                    id: MissionId::new("m1"),
                    prompt: "the SECRET task".to_string(),
                    tags: vec![],
                },
            ],
        },
    );

    let err = scan_forbidden_prompt_terms(&spec, &[0, 1], &suites).unwrap_err();
    assert_eq!(err.0.len(), 1);
    assert_eq!(err.0[0].flow_id, FlowId::new("flowA"));
    assert_eq!(err.0[0].mission_index, 1);
    assert_eq!(err.0[0].term, "SECRET");
}

#[test]
fn prompt_mode_free_never_scans() {
    let spec = sample_spec();
    let suites = BTreeMap::new();
    assert!(scan_forbidden_prompt_terms(&spec, &[0], &suites).is_ok());
}

#[test]
fn tool_driver_shim_policy_requires_shim_for_prompted_shim_kind() {
    let mut spec = sample_spec();
    spec.flows = vec![sample_flow("flowA", ToolDriverKind::PromptedShim, vec![])];
    assert!(matches!(
        enforce_tool_driver_shim_policy(&spec),
        Err(SpecError::ToolDriverShim { .. })
    ));
}

#[test]
fn tool_driver_shim_policy_rejects_shims_on_native_driver() {
    let mut spec = sample_spec();
    spec.flows = vec![sample_flow("flowA", ToolDriverKind::Native, vec!["xml-shim".to_string()])];
    assert!(matches!(
        enforce_tool_driver_shim_policy(&spec),
        Err(SpecError::ToolDriverShim { .. })
    ));
}

#[test]
fn tool_driver_shim_policy_accepts_consistent_configuration() {
    let mut spec = sample_spec();
    spec.flows = vec![sample_flow("flowA", ToolDriverKind::PromptedShim, vec!["xml-shim".to_string()])];
    assert!(enforce_tool_driver_shim_policy(&spec).is_ok());
}
