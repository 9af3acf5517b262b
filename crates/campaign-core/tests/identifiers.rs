// campaign-core/tests/identifiers.rs
//! Identifier construction and ordering invariants.

use campaign_core::CampaignId;
use campaign_core::ReasonCode;
use campaign_core::RunId;

#[test]
fn campaign_id_accepts_valid_characters() {
    assert!(CampaignId::new("demo-campaign_01.v2").is_ok());
}

#[test]
fn campaign_id_rejects_invalid_characters() {
    assert!(CampaignId::new("demo campaign").is_err());
    assert!(CampaignId::new("").is_err());
}

#[test]
fn run_id_orders_lexicographically_with_time() {
    let earlier = RunId::generate(1_700_000_000_000, "aaaa");
    let later = RunId::generate(1_700_000_000_001, "aaaa");
    assert!(earlier.as_str() < later.as_str());
}

#[test]
fn reason_code_flow_exit_displays_with_code() {
    assert_eq!(ReasonCode::FlowExit(7).to_string(), "CampaignFlowExit:7");
}

#[test]
fn reason_code_lock_held_displays_snake_case() {
    assert_eq!(ReasonCode::LockHeld.to_string(), "lock_held");
}
