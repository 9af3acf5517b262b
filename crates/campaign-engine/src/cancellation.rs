// campaign-engine/src/cancellation.rs
// ============================================================================
// Module: Campaign Cancellation Scope
// Description: Hierarchical cancellation primitive shared by every blocking call.
// Purpose: Let a global deadline, a per-mission limit, or an explicit abort
//          propagate down to every child process and cleanup hook.
// Dependencies: tokio, tokio-util
// ============================================================================

//! ## Overview
//! The engine needs one cancellation primitive that composes: a root scope
//! bounded by `timeouts.campaignGlobalTimeoutMs`, child scopes per mission
//! (currently unused but reserved), and a leaf scope per spawned child
//! process. Cancelling a parent cancels every descendant; cancelling a child
//! never affects its parent or siblings.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

// ============================================================================
// SECTION: Cancellation Scope
// ============================================================================

/// A cancellation scope that can be derived into child scopes.
///
/// Grounded in the `tokio_util::sync::CancellationToken` parent/child
/// composition used for interrupt propagation in agent tool execution.
#[derive(Debug, Clone)]
pub struct CancellationScope {
    token: CancellationToken,
}

impl CancellationScope {
    /// Creates a fresh root scope with no parent.
    #[must_use]
    pub fn root() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Derives a child scope. Cancelling `self` cancels the child; cancelling
    /// the child has no effect on `self`.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    /// Cancels this scope and every descendant derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns whether this scope (or an ancestor) has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once this scope is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Spawns a background task that cancels this scope after `deadline`
    /// elapses, unless `deadline` is zero (meaning "no deadline").
    ///
    /// Returns a guard; dropping it does not cancel the timer, but the timer
    /// task exits harmlessly once the scope is already cancelled.
    pub fn arm_deadline(&self, deadline: Duration) {
        if deadline.is_zero() {
            return;
        }
        let scope = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(deadline) => scope.cancel(),
                () = scope.cancelled() => {}
            }
        });
    }
}

impl Default for CancellationScope {
    fn default() -> Self {
        Self::root()
    }
}
