use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::actor::{Actor, Role};
use crate::models::ids::OrderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub actor_id: String,
    pub role: Role,
    pub action: &'static str,
    pub order_id: Option<OrderId>,
    pub outcome: AuditOutcome,
    pub details: String,
}

impl AuditEntry {
    pub fn new(
        actor: &Actor,
        action: &'static str,
        order_id: Option<OrderId>,
        outcome: AuditOutcome,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            at: Utc::now(),
            actor_id: actor.id.clone(),
            role: actor.role,
            action,
            order_id,
            outcome,
            details: details.into(),
        }
    }
}

/// Bounded log of lifecycle attempts; the oldest entries are evicted first.
pub struct AuditLog {
    capacity: usize,
    entries: Mutex<VecDeque<AuditEntry>>,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn record(&self, entry: AuditEntry) {
        let mut entries = self.entries.lock().await;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Newest first.
    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.iter().rev().cloned().collect()
    }
}
