// src/models/region.rs

//! Warning-region entity and polygon geometry.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A geographic point in latitude/longitude degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Ring set of a single polygon: one outer ring plus zero or more holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonRings {
    pub outer: Vec<Point>,

    #[serde(default)]
    pub holes: Vec<Vec<Point>>,
}

/// Region geometry, normalized from provider GeoJSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Geometry {
    Polygon(PolygonRings),
    MultiPolygon(Vec<PolygonRings>),
}

impl Geometry {
    /// Normalize a GeoJSON geometry object.
    ///
    /// GeoJSON positions are `[lng, lat, ...]`; the coordinate order is
    /// swapped here and any altitude component dropped. Ring order follows
    /// GeoJSON: the first ring is the outer boundary, the rest are holes.
    pub fn from_geojson(region: &str, kind: &str, coordinates: &serde_json::Value) -> Result<Self> {
        match kind {
            "Polygon" => {
                let rings: Vec<Vec<Vec<f64>>> = serde_json::from_value(coordinates.clone())
                    .map_err(|e| AppError::geometry(region, e))?;
                Ok(Geometry::Polygon(Self::rings_from_positions(region, rings)?))
            }
            "MultiPolygon" => {
                let polygons: Vec<Vec<Vec<Vec<f64>>>> =
                    serde_json::from_value(coordinates.clone())
                        .map_err(|e| AppError::geometry(region, e))?;
                let rings = polygons
                    .into_iter()
                    .map(|rings| Self::rings_from_positions(region, rings))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Geometry::MultiPolygon(rings))
            }
            other => Err(AppError::geometry(
                region,
                format!("unsupported geometry type '{other}'"),
            )),
        }
    }

    fn rings_from_positions(region: &str, rings: Vec<Vec<Vec<f64>>>) -> Result<PolygonRings> {
        let mut converted = rings
            .into_iter()
            .map(|ring| Self::ring_from_positions(region, ring))
            .collect::<Result<Vec<_>>>()?;

        if converted.is_empty() {
            return Err(AppError::geometry(region, "polygon has no rings"));
        }
        let outer = converted.remove(0);
        Ok(PolygonRings {
            outer,
            holes: converted,
        })
    }

    fn ring_from_positions(region: &str, ring: Vec<Vec<f64>>) -> Result<Vec<Point>> {
        if ring.len() < 3 {
            return Err(AppError::geometry(
                region,
                format!("ring has only {} vertices", ring.len()),
            ));
        }
        ring.into_iter()
            .map(|position| match position.as_slice() {
                [lng, lat, ..] => Ok(Point::new(*lat, *lng)),
                _ => Err(AppError::geometry(region, "position is not [lng, lat]")),
            })
            .collect()
    }

    /// All constituent polygons, as a slice-friendly iterator.
    pub fn polygons(&self) -> impl Iterator<Item = &PolygonRings> {
        match self {
            Geometry::Polygon(rings) => std::slice::from_ref(rings).iter(),
            Geometry::MultiPolygon(all) => all.iter(),
        }
    }
}

/// A named polygonal zone over which a danger rating is expressed.
///
/// Unique per provider region id; each sync overwrites the geometry and
/// bulletin link. Regions are not versioned historically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningRegion {
    /// Provider-assigned region identifier (e.g. "CH-7221").
    pub region_id: String,

    /// Display name, when the provider supplies one.
    #[serde(default)]
    pub name: Option<String>,

    pub geometry: Geometry,

    /// Bulletin that most recently described this region.
    pub bulletin_id: String,
}
