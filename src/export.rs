//! Translates [`PlanResult`]/[`ObliqueResult`] into GeoJSON, CSV, and a
//! summary-JSON document. Pure translation, no influence on planner
//! semantics.

use std::io::Write;

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::types::{ObliqueResult, PlanResult, Point, Route};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("writing csv record")]
    Csv(#[from] csv::Error),
    #[error("writing json")]
    Json(#[from] serde_json::Error),
    #[error("writing output")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;

fn point_coords(p: Point) -> Value {
    json!([p.lng().0, p.lat().0])
}

/// GeoJSON `FeatureCollection` for a single-direction plan: the polygon as a
/// `Polygon` feature, the route as a `LineString` feature, and one `Point`
/// feature per waypoint carrying its sequence index.
pub fn plan_to_geojson(polygon: &crate::types::Polygon, result: &PlanResult) -> Value {
    let mut features = vec![polygon_feature(polygon)];
    features.push(linestring_feature(&result.waypoints, &json!({})));
    features.extend(
        result
            .waypoints
            .iter()
            .enumerate()
            .map(|(i, p)| point_feature(*p, &json!({ "sequence": i }))),
    );

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

/// GeoJSON `FeatureCollection` for an oblique plan: the original polygon,
/// one `LineString` per direction, and one `Point` feature per waypoint
/// carrying its direction and gimbal pitch.
pub fn oblique_to_geojson(polygon: &crate::types::Polygon, result: &ObliqueResult) -> Value {
    let mut features = vec![polygon_feature(polygon)];
    for route in &result.routes {
        let props = json!({
            "direction_deg": route.direction_deg,
            "gimbal_pitch_deg": route.gimbal_pitch_deg,
        });
        features.push(linestring_feature(&route.waypoints, &props));
        for (i, p) in route.waypoints.iter().enumerate() {
            features.push(point_feature(
                *p,
                &json!({
                    "sequence": i,
                    "direction_deg": route.direction_deg,
                    "gimbal_pitch_deg": route.gimbal_pitch_deg,
                }),
            ));
        }
    }

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

fn polygon_feature(polygon: &crate::types::Polygon) -> Value {
    let mut ring: Vec<Value> = polygon.vertices().iter().map(|p| point_coords(*p)).collect();
    if let (Some(first), Some(last)) = (polygon.vertices().first(), polygon.vertices().last()) {
        if first.lat().0 != last.lat().0 || first.lng().0 != last.lng().0 {
            ring.push(point_coords(*first));
        }
    }
    json!({
        "type": "Feature",
        "geometry": { "type": "Polygon", "coordinates": [ring] },
        "properties": {},
    })
}

fn linestring_feature(waypoints: &[Point], properties: &Value) -> Value {
    let coords: Vec<Value> = waypoints.iter().map(|p| point_coords(*p)).collect();
    json!({
        "type": "Feature",
        "geometry": { "type": "LineString", "coordinates": coords },
        "properties": properties,
    })
}

fn point_feature(p: Point, properties: &Value) -> Value {
    json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": point_coords(p) },
        "properties": properties,
    })
}

#[derive(Serialize)]
struct WaypointRecord {
    route_index: usize,
    direction_deg: f64,
    gimbal_pitch_deg: f64,
    waypoint_index: usize,
    lat: f64,
    lng: f64,
}

/// Write one CSV row per waypoint: `route_index, direction_deg,
/// gimbal_pitch_deg, waypoint_index, lat, lng`.
pub fn routes_to_csv<W: Write>(writer: W, routes: &[Route]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for (route_index, route) in routes.iter().enumerate() {
        for (waypoint_index, p) in route.waypoints.iter().enumerate() {
            csv_writer.serialize(WaypointRecord {
                route_index,
                direction_deg: route.direction_deg,
                gimbal_pitch_deg: route.gimbal_pitch_deg,
                waypoint_index,
                lat: p.lat().0,
                lng: p.lng().0,
            })?;
        }
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write a single-direction plan as CSV, treating it as one route with
/// direction/pitch taken from `direction_deg`/`gimbal_pitch_deg` (0 for a
/// plain nadir plan).
pub fn plan_to_csv<W: Write>(writer: W, direction_deg: f64, result: &PlanResult) -> Result<()> {
    let route = Route {
        direction_deg,
        gimbal_pitch_deg: 0.0,
        waypoints: result.waypoints.clone(),
        distance_m: result.total_distance_m,
        label: "single".to_string(),
    };
    routes_to_csv(writer, std::slice::from_ref(&route))
}

/// Summary JSON for a single-direction plan: totals only.
pub fn plan_summary(result: &PlanResult) -> Value {
    json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "total_distance_m": result.total_distance_m,
        "total_lines": result.total_lines,
        "waypoint_count": result.waypoints.len(),
    })
}

/// Summary JSON for an oblique plan: totals plus expansion and edge-coverage
/// figures.
pub fn oblique_summary(result: &ObliqueResult) -> Value {
    json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "total_distance_m": result.total_distance_m,
        "total_route_count": result.total_route_count,
        "expansion_distance_m": result.expansion_distance_m,
        "edge_coverage_pct": result.edge_coverage_pct,
        "optimized": result.optimized,
        "rationale": result.rationale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points;

    #[test]
    fn plan_geojson_has_polygon_line_and_points() -> anyhow::Result<()> {
        let square = crate::types::Polygon::new(points![
            (0.0, 0.0),
            (0.0, 1.0),
            (1.0, 1.0),
            (1.0, 0.0)
        ])?;
        let result = PlanResult {
            waypoints: vec![crate::point!(0.1, 0.1), crate::point!(0.2, 0.2)],
            total_distance_m: 1000.0,
            total_lines: 1,
        };
        let geojson = plan_to_geojson(&square, &result);
        let features = geojson["features"].as_array().unwrap();
        assert_eq!(features.len(), 4); // polygon + linestring + 2 points
        Ok(())
    }

    #[test]
    fn csv_export_emits_one_row_per_waypoint() -> anyhow::Result<()> {
        let route = Route {
            direction_deg: 0.0,
            gimbal_pitch_deg: 0.0,
            waypoints: vec![crate::point!(0.0, 0.0), crate::point!(0.1, 0.1)],
            distance_m: 500.0,
            label: "r".to_string(),
        };
        let mut buf = Vec::new();
        routes_to_csv(&mut buf, &[route])?;
        let text = String::from_utf8(buf)?;
        assert_eq!(text.lines().count(), 3); // header + 2 rows
        Ok(())
    }
}
