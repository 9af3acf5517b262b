// campaign-core/src/core/mod.rs
// ============================================================================
// Module: Campaign Core Types
// Description: Canonical campaign spec and run-state structures.
// Purpose: Provide stable, serializable types shared by every campaign crate.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Campaign core types define the campaign/flow specification, the resolved
//! `ParsedSpec`, and the run-state record types. These are the canonical
//! source of truth for both the execution engine and the CLI's JSON output.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod hashing;
pub mod identifiers;
pub mod spec;
pub mod state;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use hashing::canonical_json_bytes;
pub use hashing::hash_bytes;
pub use hashing::hash_canonical_json;
pub use identifiers::AttemptId;
pub use identifiers::CampaignId;
pub use identifiers::FlowId;
pub use identifiers::InvalidCampaignId;
pub use identifiers::MissionId;
pub use identifiers::ReasonCode;
pub use identifiers::RunId;
pub use identifiers::SuiteId;
pub use spec::CampaignSpec;
pub use spec::ExecutionSpec;
pub use spec::FinalizationSpec;
pub use spec::FlowMode;
pub use spec::FlowSpec;
pub use spec::ForbiddenTermHit;
pub use spec::InlineSuite;
pub use spec::InvalidRunPolicySpec;
pub use spec::MaterializedSuite;
pub use spec::McpSpec;
pub use spec::MissionDef;
pub use spec::MissionSourceSpec;
pub use spec::NoContextSpec;
pub use spec::OutputSpec;
pub use spec::PairGateSpec;
pub use spec::ParsedSpec;
pub use spec::PromptMode;
pub use spec::PromptModeViolationError;
pub use spec::ResultChannel;
pub use spec::RunnerSpec;
pub use spec::SelectionMode;
pub use spec::SemanticSpec;
pub use spec::SessionIsolation;
pub use spec::SpecError;
pub use spec::TimeoutsSpec;
pub use spec::ToolDriverKind;
pub use spec::ToolDriverSpec;
pub use spec::enforce_tool_driver_shim_policy;
pub use spec::resolve_mission_indexes;
pub use spec::scan_forbidden_prompt_terms;
pub use spec::window_mission_indexes;
pub use state::AttemptOutcome;
pub use state::AttemptStatus;
pub use state::FlowRun;
pub use state::LockOwner;
pub use state::MissionGate;
pub use state::MissionGateAttempt;
pub use state::RunState;
pub use state::RunStatus;
pub use time::Timestamp;
