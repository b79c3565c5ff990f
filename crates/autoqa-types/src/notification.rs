//! Append-only user-facing notifications (spec.md §3, §7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    TestCompleted,
    TestFailed,
    HealingEvent,
    SystemAlert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        id: Uuid,
        user_id: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        metadata: HashMap<String, Value>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            kind,
            title: title.into(),
            message: message.into(),
            metadata,
            created_at,
        }
    }
}
