// src/danger/mod.rs

//! Danger-rating extraction and elevation projection.
//!
//! Turns a bulletin feature's raw rating payload into typed elevation
//! bands, then projects those bands onto a location's elevation range.

use std::collections::HashSet;

use crate::models::{Aspect, AvalancheProblem, DangerLevel, DangerScore, ElevationBand, RatingBand};
use crate::provider::feed::{Feature, RawElevation, RawLevel};

/// Rating bands and problem descriptors extracted from one feature.
#[derive(Debug, Clone, Default)]
pub struct RegionRating {
    pub bands: Vec<RatingBand>,
    pub problems: Vec<AvalancheProblem>,
}

/// Extract typed rating bands and avalanche problems from a feature.
///
/// Band order is preserved: later bands override earlier ones during
/// projection. Ratings with unknown level values or names are skipped
/// with a warning; they never abort extraction.
pub fn extract(feature: &Feature) -> RegionRating {
    let mut rating = RegionRating::default();

    for raw in &feature.danger_ratings {
        let Some(value) = parse_level(&raw.value) else {
            log::warn!("Skipping rating with unknown value: {:?}", raw.value);
            continue;
        };
        rating.bands.push(RatingBand {
            value,
            elevation: parse_elevation(raw.elevation.as_ref()),
            aspects: parse_aspects(&raw.aspects),
        });
    }

    for raw in &feature.avalanche_problems {
        rating.problems.push(AvalancheProblem {
            kind: raw.kind.clone(),
            aspects: parse_aspects(&raw.aspects),
            elevation: parse_elevation(raw.elevation.as_ref()),
        });
    }

    rating
}

/// Project rating bands onto a location's elevation range.
///
/// For each of the two elevations, the value of the last band (in input
/// order) covering it wins; overlapping bands are a deterministic
/// last-wins, not highest-wins. Aspects are the de-duplicated union over
/// every band that covered either elevation, in compass order. When no
/// band covers an elevation its level defaults to 1.
pub fn project(bands: &[RatingBand], elevation_min: i32, elevation_max: i32) -> DangerScore {
    let mut low = None;
    let mut high = None;
    let mut aspect_set: HashSet<Aspect> = HashSet::new();

    for band in bands {
        let covers_min = band.elevation.applies_to(elevation_min);
        let covers_max = band.elevation.applies_to(elevation_max);

        if covers_min {
            low = Some(band.value);
        }
        if covers_max {
            high = Some(band.value);
        }
        if covers_min || covers_max {
            aspect_set.extend(band.aspects.iter().copied());
        }
    }

    let low = low.unwrap_or(DangerLevel::LOW);
    let high = high.unwrap_or(DangerLevel::LOW);
    let aspects = Aspect::ALL
        .into_iter()
        .filter(|aspect| aspect_set.contains(aspect))
        .collect();

    DangerScore {
        low,
        high,
        max: low.max(high),
        aspects,
    }
}

fn parse_level(raw: &RawLevel) -> Option<DangerLevel> {
    match raw {
        RawLevel::Number(value) => u8::try_from(*value).ok().and_then(DangerLevel::new),
        RawLevel::Name(name) => DangerLevel::from_name(name),
    }
}

fn parse_elevation(raw: Option<&RawElevation>) -> ElevationBand {
    raw.map(|e| ElevationBand {
        lower: e.lower,
        upper: e.upper,
    })
    .unwrap_or_default()
}

fn parse_aspects(raw: &[String]) -> Vec<Aspect> {
    raw.iter()
        .filter_map(|tag| {
            let aspect = Aspect::parse(tag);
            if aspect.is_none() {
                log::warn!("Skipping unknown aspect tag '{tag}'");
            }
            aspect
        })
        .collect()
}
