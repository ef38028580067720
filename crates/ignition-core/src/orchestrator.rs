//! One start request, from gate to reply

use chrono::{DateTime, Local};
use ignition_util::RequesterId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::{
    Automation, AutomationOutcome, DenyReason, Gatekeeper, Verdict, render_admin_notification,
    render_denial, render_user_message,
};

/// What happened to a start request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartResult {
    Denied {
        reason: DenyReason,
        retry_after: Option<Duration>,
    },
    Completed(AutomationOutcome),
}

/// Reply for the delivery layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReply {
    pub user_message: String,
    /// Only set when an automation run happened
    pub admin_notification: Option<String>,
    pub result: StartResult,
}

/// Ties the [`Gatekeeper`] to an [`Automation`].
///
/// Holds no per-request state and never retries. Automation runs share a
/// fixed number of slots. A request takes its slot before the gate records
/// anything, so once the slots are closed a request is refused without
/// spending quota.
pub struct StartOrchestrator {
    gatekeeper: Gatekeeper,
    automation: Arc<dyn Automation>,
    slots: Arc<Semaphore>,
}

impl StartOrchestrator {
    pub fn new(
        gatekeeper: Gatekeeper,
        automation: Arc<dyn Automation>,
        max_concurrent_runs: usize,
    ) -> Self {
        Self {
            gatekeeper,
            automation,
            slots: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
        }
    }

    pub fn gatekeeper(&self) -> &Gatekeeper {
        &self.gatekeeper
    }

    /// Handle one start request
    pub async fn attempt_start(
        &self,
        requester_id: RequesterId,
        display_name: &str,
        now: DateTime<Local>,
    ) -> StartReply {
        let _permit = match self.slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(requester_id = %requester_id, error = %e, "Automation slots closed");
                let outcome = AutomationOutcome::unknown_error("automation is shutting down");
                return StartReply {
                    user_message: render_user_message(&outcome, display_name),
                    admin_notification: None,
                    result: StartResult::Completed(outcome),
                };
            }
        };

        let verdict = self
            .gatekeeper
            .check_and_reserve(requester_id, display_name, now);

        if let Verdict::Denied {
            reason,
            retry_after,
        } = verdict
        {
            if reason.is_internal() {
                warn!(requester_id = %requester_id, "Start refused, usage store unavailable");
            } else {
                debug!(requester_id = %requester_id, reason = reason.code(), "Start denied");
            }
            return StartReply {
                user_message: render_denial(&reason),
                admin_notification: None,
                result: StartResult::Denied {
                    reason,
                    retry_after,
                },
            };
        }

        info!(requester_id = %requester_id, display_name, "Running start automation");
        let outcome = self.automation.run().await;

        info!(
            requester_id = %requester_id,
            category = %outcome.category,
            success = outcome.success,
            "Start request finished"
        );

        StartReply {
            user_message: render_user_message(&outcome, display_name),
            admin_notification: Some(render_admin_notification(
                requester_id,
                display_name,
                &outcome,
            )),
            result: StartResult::Completed(outcome),
        }
    }

    /// Stop handing out automation slots; runs in progress finish normally
    pub fn shutdown(&self) {
        self.slots.close();
    }
}
