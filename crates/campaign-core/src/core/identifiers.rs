// campaign-core/src/core/identifiers.rs
// ============================================================================
// Module: Campaign Identifiers
// Description: Canonical opaque identifiers for campaigns, flows, missions, and runs.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! This module defines the canonical string-based identifiers used throughout
//! the campaign execution engine. Most identifiers are opaque wrappers that
//! serialize as plain strings; `CampaignId` additionally enforces the
//! character-class invariant from the campaign spec at construction time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Campaign Identifier
// ============================================================================

/// Error returned when a [`CampaignId`] fails its character-class validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("campaignId {0} must match [A-Za-z0-9_.-]+")]
pub struct InvalidCampaignId(pub String);

/// Campaign identifier. Must match `[A-Za-z0-9_.-]+`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CampaignId(String);

impl CampaignId {
    /// Creates a new campaign identifier, validating its character class.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCampaignId`] when the value contains characters
    /// outside `[A-Za-z0-9_.-]`.
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidCampaignId> {
        let id = id.into();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
        if valid {
            Ok(Self(id))
        } else {
            Err(InvalidCampaignId(id))
        }
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for CampaignId {
    type Error = InvalidCampaignId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CampaignId> for String {
    fn from(value: CampaignId) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Plain String Identifiers
// ============================================================================

/// Declares a simple opaque string identifier with the shared constructor set.
macro_rules! string_identifier {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_identifier!(FlowId, "Identifier of a named runner configuration (`FlowSpec.flowId`).");
string_identifier!(MissionId, "Identifier of a single task within a flow's materialized suite.");
string_identifier!(AttemptId, "Identifier of one execution of one mission by one flow.");
string_identifier!(RunId, "Monotonically sortable identifier of one campaign invocation.");
string_identifier!(SuiteId, "Identifier of a flow's materialized suite.");

impl RunId {
    /// Generates a fresh [`RunId`] from the supplied unix-millis timestamp and
    /// a caller-supplied random suffix.
    ///
    /// The engine never reads wall-clock time itself (see
    /// [`crate::core::time`]); callers must supply both inputs so that
    /// generation stays deterministic and testable.
    ///
    /// Lexicographic ordering of the resulting string matches temporal
    /// ordering because the millisecond component is zero-padded to 13
    /// digits (sufficient until the year 5138).
    #[must_use]
    pub fn generate(unix_millis: i64, random_suffix: &str) -> Self {
        Self(format!("{unix_millis:013}-{random_suffix}"))
    }
}

// ============================================================================
// SECTION: Reason Codes
// ============================================================================

/// Stable, machine-readable failure/annotation code attached to gate
/// verdicts, flow runs, and the campaign run-state.
///
/// Reason codes are a closed enumeration so callers can match exhaustively;
/// the sole open variant is [`ReasonCode::FlowExit`], which carries the
/// child process's exit code per `CampaignFlowExit:<N>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Bad CLI arguments.
    Usage,
    /// Filesystem or decode failure.
    Io,
    /// Expected artifact absent.
    MissingArtifact,
    /// Child exceeded its timeout.
    Timeout,
    /// Child failed to start.
    Spawn,
    /// Child reported a disconnected stream.
    RuntimeStreamDisconnect,
    /// Child crashed.
    RuntimeCrash,
    /// Child reported an auth failure.
    RuntimeAuth,
    /// Child reported a rate limit.
    RuntimeRateLimit,
    /// Child reported a listener failure.
    RuntimeListenerFailure,
    /// Tool version below the configured floor.
    VersionFloor,
    /// No attempt was produced at all for a (flow, mission) pairing.
    CampaignMissingAttempt,
    /// Attempt status was not `valid` under an enabled pair-gate.
    CampaignAttemptNotValid,
    /// Attempt report could not be read or parsed.
    CampaignArtifactGate,
    /// Attempt's trace was absent, empty, or missing feedback.
    CampaignTraceGate,
    /// Attempt timed out before its first tool call, or a timeout was
    /// recorded in its failure histogram.
    CampaignTimeoutGate,
    /// The child's stdout suite-summary failed to parse.
    CampaignSummaryParse,
    /// The attempt was skipped by the runner.
    CampaignSkipped,
    /// The attempt's `finish.validate` check failed.
    CampaignValidateFailed,
    /// The attempt's `finish.expect` check was evaluated and failed.
    CampaignExpectFailed,
    /// A resolved prompt contained a forbidden term under `mission-only` mode.
    ReasonPromptModePolicy,
    /// A flow's tool-driver/shim combination violated its declared requirement.
    ReasonToolDriverShim,
    /// The external semantic validator reported or failed to evaluate.
    ReasonSemanticFailed,
    /// The campaign-global timeout elapsed.
    GlobalTimeout,
    /// Lock acquisition failed because another process holds it.
    LockHeld,
    /// A flow's child process exited with the given non-zero code.
    FlowExit(i32),
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage => write!(f, "Usage"),
            Self::Io => write!(f, "IO"),
            Self::MissingArtifact => write!(f, "MissingArtifact"),
            Self::Timeout => write!(f, "Timeout"),
            Self::Spawn => write!(f, "Spawn"),
            Self::RuntimeStreamDisconnect => write!(f, "RuntimeStreamDisconnect"),
            Self::RuntimeCrash => write!(f, "RuntimeCrash"),
            Self::RuntimeAuth => write!(f, "RuntimeAuth"),
            Self::RuntimeRateLimit => write!(f, "RuntimeRateLimit"),
            Self::RuntimeListenerFailure => write!(f, "RuntimeListenerFailure"),
            Self::VersionFloor => write!(f, "VersionFloor"),
            Self::CampaignMissingAttempt => write!(f, "CampaignMissingAttempt"),
            Self::CampaignAttemptNotValid => write!(f, "CampaignAttemptNotValid"),
            Self::CampaignArtifactGate => write!(f, "CampaignArtifactGate"),
            Self::CampaignTraceGate => write!(f, "CampaignTraceGate"),
            Self::CampaignTimeoutGate => write!(f, "CampaignTimeoutGate"),
            Self::CampaignSummaryParse => write!(f, "CampaignSummaryParse"),
            Self::CampaignSkipped => write!(f, "CampaignSkipped"),
            Self::CampaignValidateFailed => write!(f, "CampaignValidateFailed"),
            Self::CampaignExpectFailed => write!(f, "CampaignExpectFailed"),
            Self::ReasonPromptModePolicy => write!(f, "ReasonPromptModePolicy"),
            Self::ReasonToolDriverShim => write!(f, "ReasonToolDriverShim"),
            Self::ReasonSemanticFailed => write!(f, "ReasonSemanticFailed"),
            Self::GlobalTimeout => write!(f, "GlobalTimeout"),
            Self::LockHeld => write!(f, "lock_held"),
            Self::FlowExit(code) => write!(f, "CampaignFlowExit:{code}"),
        }
    }
}
