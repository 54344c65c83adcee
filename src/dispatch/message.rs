// src/dispatch/message.rs

//! Notification message rendering.

use crate::models::{ChangeDirection, ChangeEvent, DangerLevel, LocationStatus};

const CHANGE_TITLE: &str = "Avalanche danger {direction}";
const CHANGE_BODY: &str = "{location}: danger level changed from {old} to {new}";
const REMINDER_TITLE: &str = "Avalanche bulletin for {location}";
const REMINDER_BODY: &str = "Current danger level {max} ({low} below, {high} above)";
const DIGEST_TITLE: &str = "Avalanche bulletin reminder";

/// Render a title/body pair for a danger-level change.
pub fn change_message(location_name: &str, event: &ChangeEvent) -> (String, String) {
    let direction = match event.direction() {
        ChangeDirection::Increase => "risen",
        ChangeDirection::Decrease => "dropped",
    };

    let title = CHANGE_TITLE.replace("{direction}", direction);
    let body = CHANGE_BODY
        .replace("{location}", location_name)
        .replace("{old}", &event.old_level.to_string())
        .replace("{new}", &event.new_level.to_string());
    (title, body)
}

/// Render a title/body pair for a recurring status reminder.
pub fn reminder_message(location_name: &str, status: &LocationStatus) -> (String, String) {
    let title = REMINDER_TITLE.replace("{location}", location_name);
    let body = REMINDER_BODY
        .replace("{max}", &status.danger.max.to_string())
        .replace("{low}", &status.danger.low.to_string())
        .replace("{high}", &status.danger.high.to_string());
    (title, body)
}

/// Render a digest reminder over several locations, for rules that are
/// not scoped to one location.
pub fn reminder_digest_message(entries: &[(String, DangerLevel)]) -> (String, String) {
    let body = if entries.is_empty() {
        "No monitored locations with a current bulletin".to_string()
    } else {
        entries
            .iter()
            .map(|(name, level)| format!("{name}: {level}"))
            .collect::<Vec<_>>()
            .join("; ")
    };
    (DIGEST_TITLE.to_string(), body)
}
