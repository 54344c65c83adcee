// src/rules/mod.rs

//! Notification rule evaluation.
//!
//! Pure matching of alert rules against detected change events and the
//! recurring-reminder schedule. Stateless and idempotent per invocation:
//! evaluating the same inputs twice yields the same matches both times.
//! De-duplication of actual sends is the caller's responsibility.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc};

use crate::models::{AlertRule, ChangeDirection, ChangeEvent, Subscriber};
use crate::utils::time::weekday_tag;

/// A rule that matched one change event.
#[derive(Debug, Clone)]
pub struct RuleMatch {
    pub rule: AlertRule,
    pub event: ChangeEvent,
}

/// Match active rules against detected change events.
///
/// Per event and rule, in order: the owning subscriber must have
/// notifications enabled; a location-scoped rule must reference the
/// event's location (global rules always pass); the change direction must
/// be subscribed; the new level must sit inside the optional
/// `[min, max]` gate. One match is produced per surviving (rule, event)
/// pair.
pub fn evaluate_changes(
    rules: &[AlertRule],
    subscribers: &[Subscriber],
    events: &[ChangeEvent],
) -> Vec<RuleMatch> {
    let subscriber_index = index_subscribers(subscribers);
    let mut matches = Vec::new();

    for event in events {
        if event.old_level == event.new_level {
            continue;
        }

        for rule in rules {
            if !rule_owner_enabled(rule, &subscriber_index) {
                continue;
            }
            if !matches_scope(rule, event) {
                continue;
            }
            if !matches_direction(rule, event) {
                continue;
            }
            if !matches_threshold(rule, event) {
                continue;
            }

            matches.push(RuleMatch {
                rule: rule.clone(),
                event: event.clone(),
            });
        }
    }

    log::debug!(
        "Rule evaluation: {} events x {} rules -> {} matches",
        events.len(),
        rules.len(),
        matches.len()
    );
    matches
}

/// Rules whose recurring reminder is due at `now`.
///
/// A rule is due when its reminder time equals the current minute
/// (exact "HH:MM" match, not a window) and either no weekday restriction
/// is set or today's weekday is in the configured set.
pub fn due_reminders<'a>(
    rules: &'a [AlertRule],
    subscribers: &[Subscriber],
    now: DateTime<Utc>,
) -> Vec<&'a AlertRule> {
    let subscriber_index = index_subscribers(subscribers);
    let minute = now.format("%H:%M").to_string();
    let today = weekday_tag(now.weekday());

    rules
        .iter()
        .filter(|rule| rule_owner_enabled(rule, &subscriber_index))
        .filter(|rule| rule.reminder_time.as_deref() == Some(minute.as_str()))
        .filter(|rule| match &rule.reminder_weekdays {
            None => true,
            Some(days) => days.iter().any(|d| d.eq_ignore_ascii_case(today)),
        })
        .collect()
}

fn index_subscribers(subscribers: &[Subscriber]) -> HashMap<&str, &Subscriber> {
    subscribers.iter().map(|s| (s.id.as_str(), s)).collect()
}

fn rule_owner_enabled(rule: &AlertRule, subscribers: &HashMap<&str, &Subscriber>) -> bool {
    if !rule.is_active {
        return false;
    }
    subscribers
        .get(rule.subscriber_id.as_str())
        .is_some_and(|s| s.notifications_enabled)
}

fn matches_scope(rule: &AlertRule, event: &ChangeEvent) -> bool {
    match &rule.location_id {
        None => true,
        Some(location_id) => *location_id == event.location_id,
    }
}

fn matches_direction(rule: &AlertRule, event: &ChangeEvent) -> bool {
    match event.direction() {
        ChangeDirection::Increase => rule.on_increase,
        ChangeDirection::Decrease => rule.on_decrease,
    }
}

fn matches_threshold(rule: &AlertRule, event: &ChangeEvent) -> bool {
    if let Some(min) = rule.min_danger_level {
        if event.new_level < min {
            return false;
        }
    }
    if let Some(max) = rule.max_danger_level {
        if event.new_level > max {
            return false;
        }
    }
    true
}
