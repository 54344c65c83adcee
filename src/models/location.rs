// src/models/location.rs

//! Monitored locations and their computed danger snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bulletin::{Aspect, AvalancheProblem, DangerLevel};

/// A monitored point with an elevation range.
///
/// Maintained outside the pipeline; the pipeline only ever reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredLocation {
    pub id: String,

    pub name: String,

    pub lat: f64,
    pub lng: f64,

    /// Lowest relevant elevation, in meters.
    pub elevation_min: i32,

    /// Highest relevant elevation, in meters.
    pub elevation_max: i32,
}

/// Danger levels projected onto one location's elevation range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DangerScore {
    /// Level at the location's minimum elevation.
    pub low: DangerLevel,

    /// Level at the location's maximum elevation.
    pub high: DangerLevel,

    /// `max(low, high)`.
    pub max: DangerLevel,

    /// Union of aspects from every band that applied to either elevation.
    pub aspects: Vec<Aspect>,
}

/// One immutable per-(location, bulletin) danger snapshot.
///
/// Created once per location per sync cycle and never updated; change
/// detection compares the two most recent snapshots by creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationStatus {
    pub location_id: String,

    pub bulletin_id: String,

    /// Resolved warning region, when one could be assigned.
    #[serde(default)]
    pub region_id: Option<String>,

    pub danger: DangerScore,

    #[serde(default)]
    pub problems: Vec<AvalancheProblem>,

    pub created_at: DateTime<Utc>,
}

/// Direction of a detected danger-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDirection {
    Increase,
    Decrease,
}

/// A detected difference between a location's two most recent `max`
/// danger levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub location_id: String,

    #[serde(default)]
    pub region_id: Option<String>,

    pub old_level: DangerLevel,
    pub new_level: DangerLevel,
}

impl ChangeEvent {
    /// Direction of this change. Events are only emitted for differing
    /// levels, so equal levels never reach here.
    pub fn direction(&self) -> ChangeDirection {
        if self.new_level > self.old_level {
            ChangeDirection::Increase
        } else {
            ChangeDirection::Decrease
        }
    }
}
