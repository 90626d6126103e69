// Optimistic enable/disable switch
//
// The displayed value flips as soon as a toggle starts. The backend
// confirmation either commits it or rolls it back:
//
//   Committed(v) -> Pending { from: v, to: !v } -> Committed(to) | RolledBack(from)

use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleState {
    Committed(bool),
    Pending { from: bool, to: bool },
    RolledBack(bool),
}

impl ToggleState {
    /// Value shown to the user
    pub fn value(&self) -> bool {
        match *self {
            ToggleState::Committed(v) | ToggleState::RolledBack(v) => v,
            ToggleState::Pending { to, .. } => to,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ToggleState::Pending { .. })
    }
}

/// Result of one toggle attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Committed(bool),
    /// The backend refused or failed; `value` is the restored state
    RolledBack {
        value: bool,
        reason: Option<String>,
    },
    /// Another toggle was still pending
    Rejected,
}

#[derive(Debug)]
pub struct OptimisticToggle {
    state: Mutex<ToggleState>,
}

impl OptimisticToggle {
    pub fn new(initial: bool) -> Self {
        Self {
            state: Mutex::new(ToggleState::Committed(initial)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ToggleState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> ToggleState {
        *self.lock()
    }

    pub fn value(&self) -> bool {
        self.state().value()
    }

    /// Switch to `new_state` and await `confirm`. `Ok(true)` commits; `Ok(false)`
    /// or an error restores the previous value.
    pub async fn run<F>(&self, new_state: bool, confirm: F) -> ToggleOutcome
    where
        F: Future<Output = Result<bool>>,
    {
        let from = {
            let mut state = self.lock();
            if state.is_pending() {
                debug!("Toggle already pending");
                return ToggleOutcome::Rejected;
            }
            let from = state.value();
            *state = ToggleState::Pending { from, to: new_state };
            from
        };

        let confirmed = confirm.await;

        let mut state = self.lock();
        match confirmed {
            Ok(true) => {
                *state = ToggleState::Committed(new_state);
                ToggleOutcome::Committed(new_state)
            }
            Ok(false) => {
                *state = ToggleState::RolledBack(from);
                ToggleOutcome::RolledBack {
                    value: from,
                    reason: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Toggle failed, reverting");
                *state = ToggleState::RolledBack(from);
                ToggleOutcome::RolledBack {
                    value: from,
                    reason: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortalError;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_confirmed_toggle_commits() {
        let toggle = OptimisticToggle::new(false);
        let outcome = toggle.run(true, async { Ok(true) }).await;
        assert_eq!(outcome, ToggleOutcome::Committed(true));
        assert_eq!(toggle.state(), ToggleState::Committed(true));
    }

    #[tokio::test]
    async fn test_refusal_rolls_back() {
        let toggle = OptimisticToggle::new(true);
        let outcome = toggle.run(false, async { Ok(false) }).await;
        assert_eq!(
            outcome,
            ToggleOutcome::RolledBack {
                value: true,
                reason: None
            }
        );
        assert_eq!(toggle.state(), ToggleState::RolledBack(true));
        assert!(toggle.value());
    }

    #[tokio::test]
    async fn test_error_rolls_back_with_reason() {
        let toggle = OptimisticToggle::new(true);
        let outcome = toggle
            .run(false, async { Err(PortalError::http(500, "Internal Server Error", "boom")) })
            .await;
        match outcome {
            ToggleOutcome::RolledBack { value, reason } => {
                assert!(value);
                assert!(reason.unwrap().contains("boom"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pending_shows_new_value_and_rejects_second_toggle() {
        let toggle = Arc::new(OptimisticToggle::new(false));
        let (tx, rx) = oneshot::channel::<Result<bool>>();

        let running = {
            let toggle = toggle.clone();
            tokio::spawn(async move {
                toggle
                    .run(true, async move { rx.await.unwrap_or(Ok(false)) })
                    .await
            })
        };
        while !toggle.state().is_pending() {
            tokio::task::yield_now().await;
        }
        assert!(toggle.value());
        assert_eq!(toggle.run(false, async { Ok(true) }).await, ToggleOutcome::Rejected);

        tx.send(Ok(true)).unwrap();
        assert_eq!(running.await.unwrap(), ToggleOutcome::Committed(true));
        assert_eq!(toggle.state(), ToggleState::Committed(true));
    }
}
