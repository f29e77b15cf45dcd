//! # Remediation: one-shot actions for the managed producer account.
//!
//! [`RemediationManager::evaluate`] looks at the raw missed-block counter (not the
//! delta) of every observed producer and ignores all but the managed account.
//!
//! ## Actions
//! ```text
//! missed > failover.threshold   && enabled && !failover_triggered   → register_producer(backup key)
//! missed > unregister.threshold && enabled && !unregister_triggered → unregister_producer
//!                                                                    → stop polling
//! ```
//!
//! ## Rules
//! - Each triggered flag is set **before** its action runs: a failed action counts as
//!   attempted and never fires again in this process.
//! - An action error ends that `evaluate` call (later checks are skipped until the next
//!   round); the caller logs it.
//! - [`RemediationState`] is injected and owned here; nothing else mutates it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::ManagedAccount;
use crate::error::ActionError;

/// Arguments of `regproducer` used for failover.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterProducer {
    pub account: String,
    pub key: String,
    pub url: String,
    pub location: u16,
    pub permission: String,
}

/// External management operations.
///
/// Both operations are idempotent on chain and complete synchronously from the
/// caller's point of view.
#[async_trait]
pub trait ManagementActions: Send + Sync + 'static {
    /// (Re-)registers the producer, e.g. with a backup signing key.
    async fn register_producer(&self, req: &RegisterProducer) -> Result<(), ActionError>;

    /// Removes the producer from the schedule.
    async fn unregister_producer(&self, account: &str, permission: &str) -> Result<(), ActionError>;
}

/// Fire-once flags for the process lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RemediationState {
    pub failover_triggered: bool,
    pub unregister_triggered: bool,
}

/// Threshold-triggered actions on a single managed account.
pub struct RemediationManager {
    policy: ManagedAccount,
    state: RemediationState,
    actions: Arc<dyn ManagementActions>,
}

impl RemediationManager {
    /// Creates a manager with explicit starting state.
    pub fn new(
        policy: ManagedAccount,
        state: RemediationState,
        actions: Arc<dyn ManagementActions>,
    ) -> Self {
        Self {
            policy,
            state,
            actions,
        }
    }

    /// Managed account name.
    pub fn account(&self) -> &str {
        &self.policy.account
    }

    /// Current flags.
    pub fn state(&self) -> RemediationState {
        self.state
    }

    /// True once deregistration has been attempted; polling should stop.
    pub fn should_stop_polling(&self) -> bool {
        self.state.unregister_triggered
    }

    /// Checks both thresholds for one observation.
    pub async fn evaluate(&mut self, bp_name: &str, missed_count: u64) -> Result<(), ActionError> {
        if bp_name != self.policy.account {
            return Ok(());
        }

        let failover = &self.policy.failover;
        if missed_count > failover.threshold && failover.enabled && !self.state.failover_triggered {
            self.state.failover_triggered = true;
            warn!(
                account = bp_name,
                missed = missed_count,
                threshold = failover.threshold,
                "failover threshold crossed; re-registering with backup key"
            );
            let req = RegisterProducer {
                account: self.policy.account.clone(),
                key: failover.key.clone(),
                url: failover.url.clone(),
                location: failover.location,
                permission: failover.permission.clone(),
            };
            self.actions.register_producer(&req).await?;
            info!(account = bp_name, "failover done");
        }

        let unregister = &self.policy.unregister;
        if missed_count > unregister.threshold
            && unregister.enabled
            && !self.state.unregister_triggered
        {
            self.state.unregister_triggered = true;
            warn!(
                account = bp_name,
                missed = missed_count,
                threshold = unregister.threshold,
                "unregister threshold crossed; deregistering producer"
            );
            self.actions
                .unregister_producer(&self.policy.account, &unregister.permission)
                .await?;
            info!(account = bp_name, "producer unregistered");
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{FailoverSettings, UnregisterSettings};
    use std::sync::Mutex;

    /// Records every call; optionally fails them.
    #[derive(Default)]
    pub(crate) struct RecordingActions {
        pub calls: Mutex<Vec<String>>,
        pub fail: bool,
    }

    #[async_trait]
    impl ManagementActions for RecordingActions {
        async fn register_producer(&self, req: &RegisterProducer) -> Result<(), ActionError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("regproducer {} {}", req.account, req.key));
            if self.fail {
                return Err(ActionError::Rejected {
                    action: "regproducer",
                    message: "denied".into(),
                });
            }
            Ok(())
        }

        async fn unregister_producer(&self, account: &str, _permission: &str) -> Result<(), ActionError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("unregprod {account}"));
            if self.fail {
                return Err(ActionError::Rejected {
                    action: "unregprod",
                    message: "denied".into(),
                });
            }
            Ok(())
        }
    }

    pub(crate) fn policy(failover_at: u64, unregister_at: u64) -> ManagedAccount {
        ManagedAccount {
            account: "alpha".into(),
            failover: FailoverSettings {
                enabled: true,
                threshold: failover_at,
                key: "EOS6backup".into(),
                url: "https://alpha".into(),
                location: 0,
                permission: "alpha@active".into(),
            },
            unregister: UnregisterSettings {
                enabled: true,
                threshold: unregister_at,
                permission: "alpha@active".into(),
            },
        }
    }

    #[tokio::test]
    async fn test_other_accounts_ignored() {
        let actions = Arc::new(RecordingActions::default());
        let mut mgr = RemediationManager::new(policy(1, 2), RemediationState::default(), actions.clone());
        assert_eq!(mgr.account(), "alpha");
        mgr.evaluate("bravo", 1000).await.unwrap();
        assert!(actions.calls.lock().unwrap().is_empty());
        assert_eq!(mgr.state(), RemediationState::default());
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        let actions = Arc::new(RecordingActions::default());
        let mut mgr = RemediationManager::new(policy(10, 20), RemediationState::default(), actions.clone());
        mgr.evaluate("alpha", 10).await.unwrap();
        assert!(actions.calls.lock().unwrap().is_empty());
        mgr.evaluate("alpha", 11).await.unwrap();
        assert_eq!(*actions.calls.lock().unwrap(), ["regproducer alpha EOS6backup"]);
    }

    #[tokio::test]
    async fn test_fires_once_each() {
        let actions = Arc::new(RecordingActions::default());
        let mut mgr = RemediationManager::new(policy(10, 20), RemediationState::default(), actions.clone());

        mgr.evaluate("alpha", 15).await.unwrap();
        mgr.evaluate("alpha", 0).await.unwrap();
        mgr.evaluate("alpha", 15).await.unwrap();
        assert!(!mgr.should_stop_polling());

        mgr.evaluate("alpha", 25).await.unwrap();
        mgr.evaluate("alpha", 30).await.unwrap();

        assert_eq!(
            *actions.calls.lock().unwrap(),
            ["regproducer alpha EOS6backup", "unregprod alpha"]
        );
        assert!(mgr.should_stop_polling());
    }

    #[tokio::test]
    async fn test_disabled_actions_never_fire() {
        let actions = Arc::new(RecordingActions::default());
        let mut p = policy(1, 1);
        p.failover.enabled = false;
        p.unregister.enabled = false;
        let mut mgr = RemediationManager::new(p, RemediationState::default(), actions.clone());
        mgr.evaluate("alpha", 500).await.unwrap();
        assert!(actions.calls.lock().unwrap().is_empty());
        assert!(!mgr.should_stop_polling());
    }

    #[tokio::test]
    async fn test_failed_action_still_marks_attempted() {
        let actions = Arc::new(RecordingActions {
            fail: true,
            ..Default::default()
        });
        let mut mgr = RemediationManager::new(policy(10, 20), RemediationState::default(), actions.clone());

        // Failover error ends the call before the unregister check.
        let err = mgr.evaluate("alpha", 50).await.unwrap_err();
        assert_eq!(err.as_label(), "action_rejected");
        assert!(mgr.state().failover_triggered);
        assert!(!mgr.state().unregister_triggered);

        // Next round: failover is not retried, unregister runs (and fails) once.
        assert!(mgr.evaluate("alpha", 50).await.is_err());
        assert!(mgr.should_stop_polling());
        mgr.evaluate("alpha", 50).await.unwrap();

        assert_eq!(
            *actions.calls.lock().unwrap(),
            ["regproducer alpha EOS6backup", "unregprod alpha"]
        );
    }

    #[tokio::test]
    async fn test_injected_state_is_respected() {
        let actions = Arc::new(RecordingActions::default());
        let state = RemediationState {
            failover_triggered: true,
            unregister_triggered: false,
        };
        let mut mgr = RemediationManager::new(policy(10, 100), state, actions.clone());
        mgr.evaluate("alpha", 50).await.unwrap();
        assert!(actions.calls.lock().unwrap().is_empty());
    }
}
