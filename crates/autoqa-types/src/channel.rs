//! Channel / Subscription / Message data model for the pub-sub layer
//! (spec.md §3, §4.5). The bus logic itself lives in `autoqa-events`; the
//! shapes are here so other crates (orchestrator, healing) can construct
//! messages without depending on the bus implementation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    Read,
    Write,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    Public,
    Private,
    Direct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,
    pub name: String,
    pub kind: ChannelKind,
    pub read: HashSet<String>,
    pub write: HashSet<String>,
    pub admin: HashSet<String>,
}

impl Channel {
    pub fn new(id: Uuid, name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            read: HashSet::new(),
            write: HashSet::new(),
            admin: HashSet::new(),
        }
    }

    /// Permissions a principal holds on this channel. Public channels grant
    /// implicit `read` to everyone (spec.md §4.5).
    pub fn granted_permissions(&self, principal: &str) -> HashSet<Permission> {
        let mut granted = HashSet::new();
        if self.kind == ChannelKind::Public || self.read.contains(principal) {
            granted.insert(Permission::Read);
        }
        if self.write.contains(principal) {
            granted.insert(Permission::Write);
        }
        if self.admin.contains(principal) {
            granted.insert(Permission::Admin);
        }
        granted
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: String,
    pub channel_id: Uuid,
    pub granted: HashSet<Permission>,
    pub filters: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub sender_id: String,
    pub kind: String,
    pub content: HashMap<String, Value>,
    pub timestamp: DateTime<Utc>,
    pub required_permissions: Option<HashSet<Permission>>,
}

impl Message {
    /// Delivery predicate from spec.md §4.5: a subscription receives the
    /// message iff (a) its granted permissions intersect any required
    /// permission the message declares (or the message declares none), and
    /// (b) every key in the subscription's filter map matches the
    /// message's content.
    pub fn matches(&self, granted: &HashSet<Permission>, filters: &HashMap<String, Value>) -> bool {
        let permission_ok = match &self.required_permissions {
            Some(required) if !required.is_empty() => {
                required.iter().any(|p| granted.contains(p))
            }
            _ => true,
        };
        if !permission_ok {
            return false;
        }
        filters
            .iter()
            .all(|(key, expected)| self.content.get(key) == Some(expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_channel_grants_implicit_read() {
        let channel = Channel::new(Uuid::new_v4(), "general", ChannelKind::Public);
        let granted = channel.granted_permissions("anyone");
        assert!(granted.contains(&Permission::Read));
        assert!(!granted.contains(&Permission::Write));
    }

    #[test]
    fn message_filter_must_match_every_key() {
        let mut content = HashMap::new();
        content.insert("severity".to_string(), Value::String("high".into()));
        content.insert("region".to_string(), Value::String("us".into()));
        let message = Message {
            id: Uuid::new_v4(),
            channel_id: Uuid::new_v4(),
            sender_id: "orchestrator".into(),
            kind: "execution-completed".into(),
            content,
            timestamp: Utc::now(),
            required_permissions: None,
        };

        let mut filters = HashMap::new();
        filters.insert("severity".to_string(), Value::String("high".into()));
        assert!(message.matches(&HashSet::new(), &filters));

        filters.insert("region".to_string(), Value::String("eu".into()));
        assert!(!message.matches(&HashSet::new(), &filters));
    }

    #[test]
    fn message_requiring_permission_filters_unauthorized_subscribers() {
        let mut required = HashSet::new();
        required.insert(Permission::Admin);
        let message = Message {
            id: Uuid::new_v4(),
            channel_id: Uuid::new_v4(),
            sender_id: "orchestrator".into(),
            kind: "system-alert".into(),
            content: HashMap::new(),
            timestamp: Utc::now(),
            required_permissions: Some(required),
        };

        let mut read_only = HashSet::new();
        read_only.insert(Permission::Read);
        assert!(!message.matches(&read_only, &HashMap::new()));

        let mut admin = HashSet::new();
        admin.insert(Permission::Admin);
        assert!(message.matches(&admin, &HashMap::new()));
    }
}
