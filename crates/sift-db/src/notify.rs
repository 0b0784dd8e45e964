//! Escalation notifications.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// A conflict escalation addressed to one member with resolution authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationNotice {
    pub project_id: String,
    pub conflict_id: String,
    pub study_id: String,
    pub escalated_by: String,
    pub reason: String,
    pub recipient: String,
}

/// Delivery channel for escalation notices.
pub trait Notifier: Send + Sync {
    fn notify_escalation(&self, notice: &EscalationNotice) -> anyhow::Result<()>;
}

/// Default notifier: logs each notice.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_escalation(&self, notice: &EscalationNotice) -> anyhow::Result<()> {
        tracing::info!(
            conflict_id = %notice.conflict_id,
            recipient = %notice.recipient,
            escalated_by = %notice.escalated_by,
            reason = %notice.reason,
            "conflict escalated"
        );
        Ok(())
    }
}

/// In-memory notifier that records every notice.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notices: Mutex<Vec<EscalationNotice>>,
}

impl MemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn notices(&self) -> Vec<EscalationNotice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify_escalation(&self, notice: &EscalationNotice) -> anyhow::Result<()> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice.clone());
        Ok(())
    }
}
