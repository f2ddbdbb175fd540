//! Component U: adaptive grid sampling for coverage gaps, clustering, and
//! supplementary waypoint synthesis.

use std::collections::HashMap;

use tracing::instrument;

use crate::cache::{self, PolygonId};
use crate::geodesy;
use crate::sequence;
use crate::sweep::{self, strict_inside};
use crate::types::{PlannerConfig, Point, Polygon, SweepParams};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Generate a grid of sample points over the polygon's bounding box, spaced
/// by a cell size scaled by polygon area, clamped to
/// `PlannerConfig::grid_sample_clamp` total samples.
fn grid_samples(polygon: &Polygon, id: PolygonId, base_grid_m: f64, config: &PlannerConfig) -> Vec<Point> {
    let area = geodesy::area_m2(polygon);
    let area_factor = if area < 10_000.0 {
        0.2
    } else if area < 100_000.0 {
        0.3
    } else {
        0.5
    };
    let mut cell_m = base_grid_m * area_factor;

    let (min_lat, min_lng, max_lat, max_lng) = cache::bounds(polygon, id, config);
    let mean_lat_rad = ((min_lat + max_lat) / 2.0).to_radians();

    let mut width_m = (max_lng - min_lng) * mean_lat_rad.cos() * 111_320.0;
    let mut height_m = (max_lat - min_lat) * 111_320.0;
    width_m = width_m.max(1.0);
    height_m = height_m.max(1.0);

    let estimate = (width_m / cell_m).ceil() * (height_m / cell_m).ceil();
    let (min_cap, max_cap) = config.grid_sample_clamp;
    if estimate > max_cap as f64 {
        let scale = (estimate / max_cap as f64).sqrt();
        cell_m *= scale;
    } else if estimate < min_cap as f64 && estimate > 0.0 {
        let scale = (estimate / min_cap as f64).sqrt();
        cell_m *= scale.max(1e-6);
    }

    let cols = ((max_lng - min_lng) / (cell_m / (mean_lat_rad.cos() * 111_320.0))).ceil() as i64;
    let rows = ((max_lat - min_lat) / (cell_m / 111_320.0)).ceil() as i64;
    let cols = cols.max(1);
    let rows = rows.max(1);

    let mut samples = Vec::with_capacity((cols * rows) as usize);
    for row in 0..=rows {
        for col in 0..=cols {
            let lat = min_lat + (max_lat - min_lat) * (row as f64 / rows as f64);
            let lng = min_lng + (max_lng - min_lng) * (col as f64 / cols as f64);
            samples.push(Point::new_unchecked(lat, lng));
        }
    }
    samples
}

/// Samples inside the polygon whose nearest existing waypoint is farther
/// than `coverage_radius_m`.
fn uncovered_samples(
    samples: Vec<Point>,
    polygon: &Polygon,
    id: PolygonId,
    existing: &[Point],
    coverage_radius_m: f64,
    config: &PlannerConfig,
) -> Vec<Point> {
    let filter = |p: &Point| -> Option<Point> {
        if !cache::point_in_polygon(*p, polygon, id, config) {
            return None;
        }
        let nearest = existing
            .iter()
            .map(|w| geodesy::distance_m(*p, *w))
            .fold(f64::INFINITY, f64::min);
        if nearest > coverage_radius_m { Some(*p) } else { None }
    };

    #[cfg(feature = "rayon")]
    {
        samples.into_par_iter().filter_map(|p| filter(&p)).collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        samples.into_iter().filter_map(|p| filter(&p)).collect()
    }
}

/// Expanding-frontier clustering of uncovered points, keyed by a spatial
/// hash cell of size `cluster_cell_m`; a point joins a cluster if it lies
/// within `cluster_cell_m` of any point already in it.
fn cluster(points: Vec<Point>, cluster_cell_m: f64) -> Vec<Vec<Point>> {
    let mut cell_of = |p: &Point| -> (i64, i64) {
        let scale = cluster_cell_m / 111_320.0;
        ((p.lat().0 / scale).floor() as i64, (p.lng().0 / scale).floor() as i64)
    };

    let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, p) in points.iter().enumerate() {
        grid.entry(cell_of(p)).or_default().push(i);
    }

    let mut visited = vec![false; points.len()];
    let mut clusters = Vec::new();

    for start in 0..points.len() {
        if visited[start] {
            continue;
        }
        let mut frontier = vec![start];
        let mut members = Vec::new();
        visited[start] = true;

        while let Some(i) = frontier.pop() {
            members.push(i);
            let (cx, cy) = cell_of(&points[i]);
            for dx in -1..=1 {
                for dy in -1..=1 {
                    if let Some(candidates) = grid.get(&(cx + dx, cy + dy)) {
                        for &j in candidates {
                            if visited[j] {
                                continue;
                            }
                            if geodesy::distance_m(points[i], points[j]) <= cluster_cell_m {
                                visited[j] = true;
                                frontier.push(j);
                            }
                        }
                    }
                }
            }
        }

        clusters.push(members.into_iter().map(|i| points[i]).collect());
    }

    clusters
}

/// Synthesize waypoints to cover one cluster of uncovered points: a single
/// waypoint at the cluster centroid when the cluster is small, otherwise a
/// reduced sweep centered on it, falling back to a local grid.
fn synthesize_for_cluster(
    cluster_points: &[Point],
    polygon: &Polygon,
    id: PolygonId,
    params: &SweepParams,
    config: &PlannerConfig,
) -> Vec<Point> {
    let centroid = cluster_centroid(cluster_points);
    let span = cluster_span_m(cluster_points);
    let line_spacing = params.line_spacing();
    let point_spacing = params.point_spacing();
    let coverage_radius = 0.25 * params.photo_width_m.max(params.photo_length_m);

    if span < 0.8 * line_spacing {
        if cache::point_in_polygon(centroid, polygon, id, config) {
            return vec![centroid];
        }
        return Vec::new();
    }

    let lines = sweep::generate_sweep_lines(
        polygon,
        id,
        centroid,
        params.direction_deg,
        line_spacing,
        point_spacing,
        config,
    );

    let mut kept: Vec<Point> = lines
        .into_iter()
        .flat_map(|l| l.waypoints)
        .filter(|w| {
            cluster_points
                .iter()
                .any(|u| geodesy::distance_m(*w, *u) <= coverage_radius)
        })
        .collect();

    if kept.is_empty() {
        kept = local_grid_fallback(cluster_points, polygon, id, point_spacing, config);
    }

    kept
}

fn cluster_centroid(points: &[Point]) -> Point {
    let n = points.len() as f64;
    let (sum_lat, sum_lng) = points
        .iter()
        .fold((0.0, 0.0), |(sa, so), p| (sa + p.lat().0, so + p.lng().0));
    Point::new_unchecked(sum_lat / n, sum_lng / n)
}

fn cluster_span_m(points: &[Point]) -> f64 {
    let mut max_span = 0.0f64;
    for a in points {
        for b in points {
            max_span = max_span.max(geodesy::distance_m(*a, *b));
        }
    }
    max_span
}

fn local_grid_fallback(
    cluster_points: &[Point],
    polygon: &Polygon,
    id: PolygonId,
    point_spacing_m: f64,
    config: &PlannerConfig,
) -> Vec<Point> {
    let centroid = cluster_centroid(cluster_points);
    let mut out = Vec::new();
    for dx in -1..=1 {
        for dy in -1..=1 {
            let p = geodesy::offset(
                geodesy::offset(centroid, 0.0, dy as f64 * point_spacing_m),
                90.0,
                dx as f64 * point_spacing_m,
            );
            if cache::point_in_polygon(p, polygon, id, config) {
                out.push(p);
            }
        }
    }
    out
}

/// Add supplementary waypoints to cover grid-sampled gaps, deduplicating
/// against all existing waypoints (original plus every prior supplementary
/// pass) and connecting new segments with the same bridging rules as the
/// sequencer. Returns `true` if the route was already sufficiently covered
/// (fewer than 2 uncovered samples, or >= 98% coverage) and no repair ran.
#[instrument(level = "debug", skip(waypoints, polygon, params, config))]
pub fn repair_coverage(
    waypoints: &mut Vec<Point>,
    polygon: &Polygon,
    id: PolygonId,
    params: &SweepParams,
    config: &PlannerConfig,
) -> bool {
    let base_grid = params.photo_width_m.min(params.photo_length_m);
    let samples = grid_samples(polygon, id, base_grid, config);
    let coverage_radius = 0.25 * params.photo_width_m.max(params.photo_length_m);

    let total_in_polygon = samples
        .iter()
        .filter(|p| cache::point_in_polygon(**p, polygon, id, config))
        .count()
        .max(1);

    let uncovered = uncovered_samples(samples, polygon, id, waypoints, coverage_radius, config);
    let coverage_pct = 1.0 - uncovered.len() as f64 / total_in_polygon as f64;

    if uncovered.len() < 2 || coverage_pct >= 0.98 {
        return true;
    }

    let cluster_cell = (2.0 * params.line_spacing()).max(4.0 * params.point_spacing());
    let clusters = cluster(uncovered, cluster_cell);

    let dedup_threshold = 0.75 * params.point_spacing();

    for cluster_points in &clusters {
        let candidates = synthesize_for_cluster(cluster_points, polygon, id, params, config);
        for candidate in candidates {
            let too_close = waypoints
                .iter()
                .any(|w| geodesy::distance_m(*w, candidate) < dedup_threshold);
            if too_close {
                continue;
            }

            let tail = *waypoints.last().expect("waypoints non-empty when repairing");
            if strict_inside(tail, candidate, polygon, id, config) {
                waypoints.push(candidate);
            } else if let Some(bridge) = sequence::synthesize_bridge_for(tail, candidate, polygon, id, config) {
                waypoints.extend(bridge);
                waypoints.push(candidate);
            }
        }
    }

    false
}

/// `true` when the waypoint density exceeds `density_gate_multiplier` times
/// the expected density for the given spacings — the gate that decides
/// whether the stricter spacing validator runs at all.
pub fn density_gate_triggered(waypoints: &[Point], polygon_area_m2: f64, params: &SweepParams) -> bool {
    if polygon_area_m2 <= 0.0 {
        return false;
    }
    let density = waypoints.len() as f64 / polygon_area_m2;
    let expected = 1.0 / (params.line_spacing() * params.point_spacing());
    density > 1.5 * expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points;

    #[test]
    fn grid_samples_are_bounded() -> anyhow::Result<()> {
        let square = Polygon::new(points![(0.0, 0.0), (0.0, 0.01), (0.01, 0.01), (0.01, 0.0)])?;
        let id = PolygonId::of(&square);
        let config = PlannerConfig::default();
        let samples = grid_samples(&square, id, 10.0, &config);
        assert!(!samples.is_empty());
        Ok(())
    }

    #[test]
    fn clustering_groups_nearby_points() {
        let a = Point::new_unchecked(0.0, 0.0);
        let b = Point::new_unchecked(0.00001, 0.00001);
        let c = Point::new_unchecked(1.0, 1.0);
        let clusters = cluster(vec![a, b, c], 50.0);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn density_gate_triggers_only_above_multiplier() {
        let params = SweepParams {
            direction_deg: 0.0,
            photo_width_m: 10.0,
            photo_length_m: 10.0,
            side_overlap_pct: 0.0,
            forward_overlap_pct: 0.0,
            flight_height_m: 100.0,
            start_point: Point::default(),
        };
        let waypoints: Vec<Point> = (0..5).map(|i| Point::new_unchecked(i as f64, 0.0)).collect();
        assert!(!density_gate_triggered(&waypoints, 1_000_000.0, &params));
        assert!(density_gate_triggered(&waypoints, 1.0, &params));
    }
}
