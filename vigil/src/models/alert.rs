use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    #[default]
    Unread,
    Read,
    Acknowledged,
    Snoozed,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unread => write!(f, "unread"),
            Self::Read => write!(f, "read"),
            Self::Acknowledged => write!(f, "acknowledged"),
            Self::Snoozed => write!(f, "snoozed"),
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unread" => Ok(Self::Unread),
            "read" => Ok(Self::Read),
            "acknowledged" => Ok(Self::Acknowledged),
            "snoozed" => Ok(Self::Snoozed),
            _ => Err(format!("Unknown alert status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Relevant,
    Irrelevant,
    Snooze,
}

impl std::fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relevant => write!(f, "relevant"),
            Self::Irrelevant => write!(f, "irrelevant"),
            Self::Snooze => write!(f, "snooze"),
        }
    }
}

impl std::str::FromStr for FeedbackKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "relevant" => Ok(Self::Relevant),
            "irrelevant" => Ok(Self::Irrelevant),
            "snooze" => Ok(Self::Snooze),
            _ => Err(format!("Unknown feedback kind: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

/// Per-channel delivery outcome, recorded on the alert. Delivery never
/// rolls back persistence; the alert row is the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub channel: String,
    pub status: NotificationStatus,
    pub error: Option<String>,
}

/// A significant-change alert. At most one per (search_id, execution_id),
/// enforced by a unique index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub search_id: String,
    pub tenant_id: String,
    pub execution_id: String,
    pub triggered_at: DateTime<Utc>,
    pub confidence: f32,
    pub summary: String,
    pub key_changes: Vec<String>,
    pub reasoning: String,
    pub citations: Vec<String>,
    pub status: AlertStatus,
    pub feedback: Option<FeedbackKind>,
    pub feedback_comment: Option<String>,
    pub snooze_until: Option<DateTime<Utc>>,
    pub notifications: Vec<NotificationRecord>,
}

/// Append-only feedback entry driving the learning loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertFeedback {
    pub id: String,
    pub alert_id: String,
    pub search_id: String,
    pub user_id: String,
    pub feedback: FeedbackKind,
    pub comment: Option<String>,
    pub provided_at: DateTime<Utc>,
}
