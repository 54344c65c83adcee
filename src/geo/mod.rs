// src/geo/mod.rs

//! Geospatial region resolution.
//!
//! Assigns a coordinate to a warning region: containment via ray casting,
//! with a nearest-vertex fallback for points that sit outside every
//! region (typically right on a provider boundary).
//!
//! Distances are planar Euclidean in degree space, not geodesic. That is
//! sufficient for picking the closest defined zone next to a boundary and
//! is not a general-purpose distance measurement.

use crate::models::{Point, PolygonRings, WarningRegion};

/// Find the region containing the point, if any.
///
/// A MultiPolygon region contains the point when any constituent polygon
/// does. Hole rings are subtracted: a point inside a hole is not
/// contained.
pub fn find_containing<'a>(
    lat: f64,
    lng: f64,
    regions: &'a [WarningRegion],
) -> Option<&'a WarningRegion> {
    let point = Point::new(lat, lng);
    regions
        .iter()
        .find(|region| region.geometry.polygons().any(|p| polygon_contains(p, point)))
}

/// Find the region with the smallest vertex distance to the point.
///
/// Total for non-empty input; ties resolve to the earliest region in
/// input order, so the result is deterministic.
pub fn find_nearest<'a>(
    lat: f64,
    lng: f64,
    regions: &'a [WarningRegion],
) -> Option<&'a WarningRegion> {
    let point = Point::new(lat, lng);
    let mut best: Option<(&WarningRegion, f64)> = None;

    for region in regions {
        let Some(distance_sq) = min_vertex_distance_sq(region, point) else {
            continue;
        };
        match best {
            Some((_, current)) if distance_sq >= current => {}
            _ => best = Some((region, distance_sq)),
        }
    }

    best.map(|(region, _)| region)
}

/// Point-in-polygon with holes subtracted.
fn polygon_contains(polygon: &PolygonRings, point: Point) -> bool {
    if !ring_contains(&polygon.outer, point) {
        return false;
    }
    !polygon.holes.iter().any(|hole| ring_contains(hole, point))
}

/// Ray-casting containment test against a single ring.
///
/// Casts a horizontal ray and counts edge crossings; the ring wraps, so
/// it does not need an explicit closing vertex.
fn ring_contains(ring: &[Point], point: Point) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;

    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[j];

        if (a.lat > point.lat) != (b.lat > point.lat) {
            let crossing = (b.lng - a.lng) * (point.lat - a.lat) / (b.lat - a.lat) + a.lng;
            if point.lng < crossing {
                inside = !inside;
            }
        }
        j = i;
    }

    inside
}

/// Squared planar distance from the point to the closest outer-ring
/// vertex of any constituent polygon.
fn min_vertex_distance_sq(region: &WarningRegion, point: Point) -> Option<f64> {
    region
        .geometry
        .polygons()
        .flat_map(|polygon| polygon.outer.iter())
        .map(|vertex| {
            let dlat = vertex.lat - point.lat;
            let dlng = vertex.lng - point.lng;
            dlat * dlat + dlng * dlng
        })
        .fold(None, |best, d| match best {
            Some(current) if current <= d => Some(current),
            _ => Some(d),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Geometry;

    fn square(origin_lat: f64, origin_lng: f64, size: f64) -> Vec<Point> {
        vec![
            Point::new(origin_lat, origin_lng),
            Point::new(origin_lat, origin_lng + size),
            Point::new(origin_lat + size, origin_lng + size),
            Point::new(origin_lat + size, origin_lng),
            Point::new(origin_lat, origin_lng),
        ]
    }

    fn make_region(id: &str, outer: Vec<Point>) -> WarningRegion {
        WarningRegion {
            region_id: id.to_string(),
            name: None,
            geometry: Geometry::Polygon(PolygonRings {
                outer,
                holes: Vec::new(),
            }),
            bulletin_id: "b1".to_string(),
        }
    }

    #[test]
    fn point_inside_is_contained() {
        let regions = vec![make_region("R1", square(46.0, 9.0, 1.0))];
        let found = find_containing(46.5, 9.5, &regions);
        assert_eq!(found.map(|r| r.region_id.as_str()), Some("R1"));
    }

    #[test]
    fn point_far_outside_is_not_contained() {
        let regions = vec![
            make_region("R1", square(46.0, 9.0, 1.0)),
            make_region("R2", square(47.5, 10.0, 1.0)),
        ];
        assert!(find_containing(30.0, -60.0, &regions).is_none());
    }

    #[test]
    fn point_in_hole_is_not_contained() {
        let region = WarningRegion {
            region_id: "R1".to_string(),
            name: None,
            geometry: Geometry::Polygon(PolygonRings {
                outer: square(0.0, 0.0, 10.0),
                holes: vec![square(4.0, 4.0, 2.0)],
            }),
            bulletin_id: "b1".to_string(),
        };
        let regions = vec![region];

        assert!(find_containing(5.0, 5.0, &regions).is_none());
        assert!(find_containing(2.0, 2.0, &regions).is_some());
    }

    #[test]
    fn multipolygon_matches_any_part() {
        let region = WarningRegion {
            region_id: "R1".to_string(),
            name: None,
            geometry: Geometry::MultiPolygon(vec![
                PolygonRings {
                    outer: square(0.0, 0.0, 1.0),
                    holes: Vec::new(),
                },
                PolygonRings {
                    outer: square(5.0, 5.0, 1.0),
                    holes: Vec::new(),
                },
            ]),
            bulletin_id: "b1".to_string(),
        };
        let regions = vec![region];

        assert!(find_containing(5.5, 5.5, &regions).is_some());
        assert!(find_containing(0.5, 0.5, &regions).is_some());
        assert!(find_containing(3.0, 3.0, &regions).is_none());
    }

    #[test]
    fn first_containing_region_wins() {
        let regions = vec![
            make_region("R1", square(0.0, 0.0, 10.0)),
            make_region("R2", square(4.0, 4.0, 10.0)),
        ];
        let found = find_containing(5.0, 5.0, &regions).unwrap();
        assert_eq!(found.region_id, "R1");
    }

    #[test]
    fn nearest_picks_smallest_vertex_distance() {
        let regions = vec![
            make_region("far", square(50.0, 50.0, 1.0)),
            make_region("near", square(46.0, 9.0, 1.0)),
        ];
        let found = find_nearest(45.9, 8.9, &regions).unwrap();
        assert_eq!(found.region_id, "near");
    }

    #[test]
    fn nearest_is_total_for_nonempty_input() {
        let regions = vec![make_region("only", square(46.0, 9.0, 1.0))];
        assert!(find_nearest(-89.0, 170.0, &regions).is_some());
    }

    #[test]
    fn nearest_of_nothing_is_none() {
        assert!(find_nearest(46.0, 9.0, &[]).is_none());
    }

    #[test]
    fn nearest_tie_resolves_to_input_order() {
        // Two unit squares mirrored around lng 0; the point sits exactly
        // between their closest vertices.
        let regions = vec![
            make_region("left", square(0.0, -2.0, 1.0)),
            make_region("right", square(0.0, 1.0, 1.0)),
        ];
        let found = find_nearest(0.0, 0.0, &regions).unwrap();
        assert_eq!(found.region_id, "left");
    }
}
