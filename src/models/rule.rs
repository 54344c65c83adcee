// src/models/rule.rs

//! Subscribers, alert rules, and the notification audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bulletin::DangerLevel;

/// A push-notification recipient.
///
/// Managed by the account API; the pipeline only reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: String,

    /// Delivery token for the push provider. Absent when the subscriber
    /// has never registered a device.
    #[serde(default)]
    pub push_token: Option<String>,

    /// Global opt-out switch. When false, no rule owned by this
    /// subscriber ever produces a delivery attempt.
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
}

fn default_true() -> bool {
    true
}

/// A subscription rule: which changes (or reminder times) a subscriber
/// wants to hear about.
///
/// Managed by the account API; read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,

    pub subscriber_id: String,

    /// Scope to one location. Absent = applies to all locations.
    #[serde(default)]
    pub location_id: Option<String>,

    #[serde(default)]
    pub on_increase: bool,

    #[serde(default)]
    pub on_decrease: bool,

    /// Reject changes whose new level is below this.
    #[serde(default)]
    pub min_danger_level: Option<DangerLevel>,

    /// Reject changes whose new level is above this.
    #[serde(default)]
    pub max_danger_level: Option<DangerLevel>,

    /// Recurring reminder time of day as "HH:MM", when enabled.
    #[serde(default)]
    pub reminder_time: Option<String>,

    /// Weekday subset for the reminder ("mon" .. "sun").
    /// Absent = every day.
    #[serde(default)]
    pub reminder_weekdays: Option<Vec<String>>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// What triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Change,
    Reminder,
}

/// Outcome of one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    Failed,
    Skipped,
}

/// Append-only audit entry, one per dispatch attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub subscriber_id: String,

    #[serde(default)]
    pub location_id: Option<String>,

    pub kind: NotificationKind,

    pub title: String,
    pub body: String,

    pub outcome: DeliveryOutcome,

    pub created_at: DateTime<Utc>,
}
