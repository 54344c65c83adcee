// src/models/bulletin.rs

//! Bulletin entity and danger-rating domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ingested snapshot of provider data for a language variant.
///
/// Unique per `(external_id, language)`; re-ingesting the same external id
/// updates the stored row in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bulletin {
    /// Provider-supplied bulletin identifier, or a synthesized one when
    /// the feed omits it.
    pub external_id: String,

    /// Language variant this snapshot was fetched for (de/fr/it/en).
    pub language: String,

    /// Start of the validity window.
    pub valid_from: DateTime<Utc>,

    /// End of the validity window (exclusive).
    pub valid_until: DateTime<Utc>,

    /// Raw provider document, stored verbatim for downstream reuse.
    pub payload: serde_json::Value,

    /// Last ingestion time for this row.
    pub fetched_at: DateTime<Utc>,
}

impl Bulletin {
    /// Upsert key for this bulletin.
    pub fn key(&self) -> (&str, &str) {
        (self.external_id.as_str(), self.language.as_str())
    }
}

/// Avalanche danger level on the five-step European scale.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DangerLevel(u8);

impl DangerLevel {
    /// Lowest danger level; also the fallback when no band resolves.
    pub const LOW: DangerLevel = DangerLevel(1);

    /// Build a level from its numeric value. Valid range is 1..=5.
    pub fn new(value: u8) -> Option<Self> {
        (1..=5).contains(&value).then_some(Self(value))
    }

    /// Build a level from a provider level name.
    pub fn from_name(name: &str) -> Option<Self> {
        let value = match name.to_ascii_lowercase().as_str() {
            "low" => 1,
            "moderate" => 2,
            "considerable" => 3,
            "high" => 4,
            "very_high" => 5,
            _ => return None,
        };
        Some(Self(value))
    }

    /// Numeric value of this level.
    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for DangerLevel {
    fn default() -> Self {
        Self::LOW
    }
}

impl std::fmt::Display for DangerLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compass-direction classification a danger band applies to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Aspect {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Aspect {
    /// All aspects in compass order. Also the canonical ordering for
    /// de-duplicated aspect sets.
    pub const ALL: [Aspect; 8] = [
        Aspect::N,
        Aspect::NE,
        Aspect::E,
        Aspect::SE,
        Aspect::S,
        Aspect::SW,
        Aspect::W,
        Aspect::NW,
    ];

    /// Parse a provider aspect tag, case-insensitively.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "N" => Some(Aspect::N),
            "NE" => Some(Aspect::NE),
            "E" => Some(Aspect::E),
            "SE" => Some(Aspect::SE),
            "S" => Some(Aspect::S),
            "SW" => Some(Aspect::SW),
            "W" => Some(Aspect::W),
            "NW" => Some(Aspect::NW),
            _ => None,
        }
    }
}

/// Elevation range a band applies to. An absent bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElevationBand {
    #[serde(default)]
    pub lower: Option<i32>,
    #[serde(default)]
    pub upper: Option<i32>,
}

impl ElevationBand {
    /// Whether the band covers elevation `e`.
    pub fn applies_to(&self, e: i32) -> bool {
        self.lower.is_none_or(|lower| e >= lower)
            && self.upper.is_none_or(|upper| e <= upper)
    }
}

/// A danger value bound to an elevation range and a set of aspects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingBand {
    pub value: DangerLevel,

    #[serde(default)]
    pub elevation: ElevationBand,

    #[serde(default)]
    pub aspects: Vec<Aspect>,
}

/// An avalanche-problem descriptor carried by a bulletin feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvalancheProblem {
    /// Problem type tag (e.g. "wind_slab", "wet_snow").
    pub kind: String,

    #[serde(default)]
    pub aspects: Vec<Aspect>,

    #[serde(default)]
    pub elevation: ElevationBand,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_from_name_maps_fixed_table() {
        assert_eq!(DangerLevel::from_name("low"), DangerLevel::new(1));
        assert_eq!(DangerLevel::from_name("moderate"), DangerLevel::new(2));
        assert_eq!(DangerLevel::from_name("considerable"), DangerLevel::new(3));
        assert_eq!(DangerLevel::from_name("HIGH"), DangerLevel::new(4));
        assert_eq!(DangerLevel::from_name("very_high"), DangerLevel::new(5));
        assert_eq!(DangerLevel::from_name("extreme"), None);
    }

    #[test]
    fn level_rejects_out_of_range() {
        assert!(DangerLevel::new(0).is_none());
        assert!(DangerLevel::new(6).is_none());
        assert!(DangerLevel::new(5).is_some());
    }

    #[test]
    fn aspect_parse_is_case_insensitive() {
        assert_eq!(Aspect::parse("ne"), Some(Aspect::NE));
        assert_eq!(Aspect::parse("N"), Some(Aspect::N));
        assert_eq!(Aspect::parse("NNE"), None);
    }

    #[test]
    fn elevation_band_bounds() {
        let band = ElevationBand {
            lower: Some(2000),
            upper: None,
        };
        assert!(!band.applies_to(1999));
        assert!(band.applies_to(2000));
        assert!(band.applies_to(4000));

        let unbounded = ElevationBand::default();
        assert!(unbounded.applies_to(i32::MIN));
        assert!(unbounded.applies_to(i32::MAX));
    }
}
