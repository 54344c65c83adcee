// src/pipeline/changes.rs

//! Danger-level change detection.
//!
//! Compares a location's two most recent status snapshots; a change event
//! is emitted only when both exist and their `max` levels differ.

use crate::models::{ChangeEvent, LocationStatus};

/// Detect a change from a location's recent snapshots, newest first.
pub fn compare_recent(statuses: &[LocationStatus]) -> Option<ChangeEvent> {
    let [newest, previous, ..] = statuses else {
        return None;
    };

    if newest.danger.max == previous.danger.max {
        return None;
    }

    Some(ChangeEvent {
        location_id: newest.location_id.clone(),
        region_id: newest.region_id.clone(),
        old_level: previous.danger.max,
        new_level: newest.danger.max,
    })
}
