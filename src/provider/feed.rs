// src/provider/feed.rs

//! Typed view of the provider bulletin document.
//!
//! The provider serves a JSON document with a feature collection under a
//! `regions` root key. The raw document is kept verbatim for storage; this
//! module provides a tolerant typed parse on top of it. Missing optional
//! fields never fail the parse; they fall back to empty defaults.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

/// A parsed provider document, with the verbatim payload retained.
#[derive(Debug, Clone)]
pub struct FeedDocument {
    /// Verbatim provider payload, stored unmodified on the bulletin.
    pub raw: Value,

    /// Provider bulletin identifier, when present.
    pub bulletin_id: Option<String>,

    pub features: Vec<Feature>,
}

impl FeedDocument {
    /// Parse a provider response body.
    ///
    /// Returns `Ok(None)` when the body is valid JSON but lacks the
    /// `regions` root marker: the provider serves such documents when no
    /// bulletin is published, and that is a no-data outcome, not an error.
    pub fn parse(raw: Value) -> Result<Option<Self>> {
        let document: RawDocument = serde_json::from_value(raw.clone())?;
        let Some(collection) = document.regions else {
            return Ok(None);
        };

        Ok(Some(Self {
            raw,
            bulletin_id: document.id,
            features: collection.features,
        }))
    }

    /// The validity window fields, taken from the first feature that
    /// carries them. Raw strings; parsing with fallbacks happens at
    /// ingestion time.
    pub fn validity_fields(&self) -> (Option<&str>, Option<&str>) {
        let from = self
            .features
            .iter()
            .find_map(|f| f.valid_from.as_deref());
        let until = self
            .features
            .iter()
            .find_map(|f| f.valid_until.as_deref());
        (from, until)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawDocument {
    #[serde(default)]
    id: Option<String>,

    #[serde(default)]
    regions: Option<RawCollection>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

/// One geographic feature of the bulletin.
#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    /// Named regions this feature covers.
    #[serde(default)]
    pub regions: Vec<RegionRef>,

    #[serde(default)]
    pub geometry: Option<RawGeometry>,

    #[serde(default)]
    pub valid_from: Option<String>,

    #[serde(default)]
    pub valid_until: Option<String>,

    #[serde(default)]
    pub danger_ratings: Vec<RawRating>,

    #[serde(default)]
    pub avalanche_problems: Vec<RawProblem>,
}

impl Feature {
    /// Whether this feature covers the given provider region id.
    pub fn covers(&self, region_id: &str) -> bool {
        self.regions.iter().any(|r| r.id == region_id)
    }
}

/// A named region reference inside a feature.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionRef {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,
}

/// Raw GeoJSON geometry, normalized later by `Geometry::from_geojson`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGeometry {
    #[serde(rename = "type")]
    pub kind: String,

    pub coordinates: Value,
}

/// Raw elevation-banded danger rating.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRating {
    pub value: RawLevel,

    #[serde(default)]
    pub elevation: Option<RawElevation>,

    #[serde(default)]
    pub aspects: Vec<String>,
}

/// Danger value as the provider spells it: a number 1-5 or a level name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawLevel {
    Number(i64),
    Name(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawElevation {
    #[serde(default)]
    pub lower: Option<i32>,

    #[serde(default)]
    pub upper: Option<i32>,
}

/// Raw avalanche-problem descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct RawProblem {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub aspects: Vec<String>,

    #[serde(default)]
    pub elevation: Option<RawElevation>,
}
