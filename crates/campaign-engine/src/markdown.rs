// campaign-engine/src/markdown.rs
// ============================================================================
// Module: RESULTS.md Renderer
// Description: Deterministic markdown summary of a terminal RunState.
// Purpose: Give a human reviewer a single-file view of a campaign's outcome.
// Dependencies: campaign-core
// ============================================================================

//! ## Overview
//! Renders the same fixed section order every time: header, top failure
//! codes, per-mission verdicts, per-flow rows, then evidence paths. No wall
//! clock is read here; every timestamp comes from the `RunState` itself, so
//! two runs with identical inputs produce byte-identical output.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use campaign_core::FlowId;
use campaign_core::RunState;

/// Renders `RESULTS.md` for a (terminal or in-progress) run state.
#[must_use]
pub fn render_results_md(state: &RunState) -> String {
    let mut out = String::new();

    render_header(&mut out, state);
    render_top_failure_codes(&mut out, state);
    render_missions(&mut out, state);
    render_flows(&mut out, state);
    render_evidence_paths(&mut out, state);

    out
}

/// Writes the campaign id, run id, status, and mission-completion line.
fn render_header(out: &mut String, state: &RunState) {
    let _ = writeln!(out, "# Campaign {}", state.campaign_id);
    let _ = writeln!(out);
    let _ = writeln!(out, "- Run: {}", state.run_id);
    if let Some(resumed_from) = &state.resumed_from_run_id {
        let _ = writeln!(out, "- Resumed from: {resumed_from}");
    }
    let _ = writeln!(out, "- Status: {}", state.status.as_str());
    let _ = writeln!(out, "- missionsCompleted: `{}/{}`", state.missions_completed, state.total_missions);
    if state.canary {
        let _ = writeln!(out, "- Canary: true");
    }
    let _ = writeln!(out);
}

/// Writes the deduplicated, sorted reason-code list recorded on the run.
fn render_top_failure_codes(out: &mut String, state: &RunState) {
    let _ = writeln!(out, "## Top Failure Codes");
    if state.reason_codes.is_empty() {
        let _ = writeln!(out, "(none)");
    } else {
        for reason in &state.reason_codes {
            let _ = writeln!(out, "- {reason}");
        }
    }
    let _ = writeln!(out);
}

/// Writes one section per completed mission with its gate verdict and
/// per-flow attempt outcomes.
fn render_missions(out: &mut String, state: &RunState) {
    let _ = writeln!(out, "## Missions");
    for gate in &state.missions {
        let _ = writeln!(out, "### Mission {} ({})", gate.mission_index, gate.mission_id);
        let _ = writeln!(out, "- Verdict: {}", if gate.ok { "PASS" } else { "FAIL" });
        if !gate.reasons.is_empty() {
            let reasons: Vec<String> = gate.reasons.iter().map(ToString::to_string).collect();
            let _ = writeln!(out, "- Reasons: {}", reasons.join(", "));
        }
        for attempt in &gate.attempts {
            let marker = if attempt.ok { "PASS" } else { "FAIL" };
            let _ = writeln!(out, "  - `{}`: {} ({marker})", attempt.flow_id, attempt.status.as_str());
        }
        let _ = writeln!(out);
    }
}

/// Writes one row per recorded flow dispatch, in dispatch order.
fn render_flows(out: &mut String, state: &RunState) {
    let _ = writeln!(out, "## Flows");
    if state.flows.is_empty() {
        let _ = writeln!(out, "(none)");
    } else {
        for flow_run in &state.flows {
            let _ = writeln!(
                out,
                "- `{}` exit={} ok={} runId={}",
                flow_run.flow_id, flow_run.exit_code, flow_run.ok, flow_run.run_id
            );
        }
    }
    let _ = writeln!(out);
}

/// Writes every attempt directory recorded across every mission, deduplicated
/// by `(mission_index, flow_id)` and sorted for deterministic output.
fn render_evidence_paths(out: &mut String, state: &RunState) {
    let _ = writeln!(out, "## Evidence Paths");
    let mut paths: BTreeMap<(usize, FlowId), String> = BTreeMap::new();
    for gate in &state.missions {
        for attempt in &gate.attempts {
            if let Some(dir) = &attempt.attempt_dir {
                paths.insert((gate.mission_index, attempt.flow_id.clone()), dir.clone());
            }
        }
    }
    if paths.is_empty() {
        let _ = writeln!(out, "(none)");
    } else {
        for ((mission_index, flow_id), dir) in paths {
            let _ = writeln!(out, "- mission {mission_index} / flow `{flow_id}`: {dir}");
        }
    }
}
