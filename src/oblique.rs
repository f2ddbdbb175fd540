//! Component M: the oblique multi-direction driver. Selects a direction
//! count from gimbal pitch, buffers the polygon outward, runs the
//! single-pass pipeline once per direction, and filters results back down
//! to coverage of the original polygon.

use tracing::instrument;

use crate::cache::PolygonId;
use crate::geodesy;
use crate::planner;
use crate::simplify;
use crate::types::{ExpandedAreaInfo, ObliqueParams, PlannerConfig, Point, Polygon, Route};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Choose the set of sweep directions (relative offsets in degrees from the
/// requested primary direction) for a given gimbal pitch magnitude.
pub fn direction_offsets(gimbal_pitch_deg: f64) -> &'static [f64] {
    let p = gimbal_pitch_deg.abs();
    if p < 15.0 {
        &[0.0]
    } else if p < 30.0 {
        &[0.0, 90.0, 180.0]
    } else if p < 45.0 {
        &[0.0, 90.0, 180.0, 270.0]
    } else {
        &[0.0, 72.0, 144.0, 216.0, 288.0]
    }
}

/// Outward buffer distance for the given parameters, per the clamp in
/// SPEC_FULL §4.7.
pub fn expansion_distance_m(params: &ObliqueParams) -> f64 {
    let sweep = &params.sweep;
    let max_dim = sweep.photo_width_m.max(sweep.photo_length_m);
    let base = 0.6 * max_dim;

    let p = params.gimbal_pitch_deg.abs().to_radians();
    let tilt_offset = if params.gimbal_pitch_deg.abs() > 5.0 {
        sweep.flight_height_m * p.tan() * 0.5
    } else {
        0.0
    };

    let overlap_factor = 1.0 - 0.1 * sweep.side_overlap_pct.min(sweep.forward_overlap_pct) / 100.0;
    let d = (base + tilt_offset) * overlap_factor;

    d.clamp(0.3 * max_dim, 0.8 * max_dim + tilt_offset)
}

/// Buffer `polygon` outward by `distance_m`, enforcing counter-clockwise
/// winding and computing each vertex's offset along the angle bisector of
/// its two adjacent outward edge normals.
pub fn buffer_outward(polygon: &Polygon, distance_m: f64) -> Polygon {
    let mut vertices: Vec<Point> = polygon.vertices().to_vec();
    if !geodesy::is_ccw(polygon) {
        vertices.reverse();
    }

    let n = vertices.len();
    let mut buffered = Vec::with_capacity(n);

    for i in 0..n {
        let prev = vertices[(i + n - 1) % n];
        let curr = vertices[i];
        let next = vertices[(i + 1) % n];

        let normal_in = outward_normal_deg(prev, curr);
        let normal_out = outward_normal_deg(curr, next);

        let bisector = bisect_bearings(normal_in, normal_out);
        buffered.push(geodesy::offset(curr, bisector, distance_m));
    }

    Polygon::new(buffered).expect("buffered polygon retains vertex count")
}

/// Outward-facing normal of the directed edge `a -> b` for a CCW-wound
/// polygon: the edge bearing rotated -90 degrees.
fn outward_normal_deg(a: Point, b: Point) -> f64 {
    (geodesy::bearing_deg(a, b) - 90.0).rem_euclid(360.0)
}

fn bisect_bearings(a_deg: f64, b_deg: f64) -> f64 {
    let ax = a_deg.to_radians().cos() + b_deg.to_radians().cos();
    let ay = a_deg.to_radians().sin() + b_deg.to_radians().sin();
    if ax.abs() < 1e-12 && ay.abs() < 1e-12 {
        // Degenerate: straight angle or zero-length bisector, fall back to
        // one of the two normals.
        return a_deg;
    }
    ay.atan2(ax).to_degrees().rem_euclid(360.0)
}

/// Run the oblique multi-direction plan.
#[instrument(level = "debug", skip(params, config))]
pub fn plan_oblique(params: &ObliqueParams, config: &PlannerConfig) -> crate::PlannerResult<crate::types::ObliqueResult> {
    params.validate()?;

    let expansion = expansion_distance_m(params);
    let expanded_polygon = buffer_outward(&params.polygon, expansion);
    let original_id = PolygonId::of(&params.polygon);

    let offsets = direction_offsets(params.gimbal_pitch_deg);
    let primary_direction = params.sweep.direction_deg;

    let compute_route = |offset: &f64| -> Option<Route> {
        let direction = (primary_direction + offset).rem_euclid(360.0);
        let mut sweep_params = params.sweep;
        sweep_params.direction_deg = direction;

        let plan = planner::plan_multi_block_on(&expanded_polygon, &sweep_params, config.max_blocks_default, false, config);
        if plan.waypoints.is_empty() {
            return None;
        }

        let filtered = filter_to_original_coverage(
            &plan.waypoints,
            &params.polygon,
            original_id,
            &params.sweep,
            params.gimbal_pitch_deg,
            config,
        );
        if filtered.is_empty() {
            return None;
        }

        let simplified = simplify::simplify(&filtered);
        let distance = total_distance(&simplified);

        Some(Route {
            direction_deg: direction,
            gimbal_pitch_deg: params.gimbal_pitch_deg,
            waypoints: simplified,
            distance_m: distance,
            label: format!("direction_{direction:.0}"),
        })
    };

    #[cfg(feature = "rayon")]
    let routes: Vec<Route> = offsets.par_iter().filter_map(compute_route).collect();
    #[cfg(not(feature = "rayon"))]
    let routes: Vec<Route> = offsets.iter().filter_map(compute_route).collect();

    let total_distance_m = routes.iter().map(|r| r.distance_m).sum();
    let total_route_count = routes.len();
    let edge_coverage_pct = edge_coverage_percent(&routes, &params.polygon, &params.sweep);

    Ok(crate::types::ObliqueResult {
        routes,
        total_distance_m,
        total_route_count,
        optimized: true,
        rationale: format!(
            "{} direction(s) selected for gimbal pitch {:.1} deg",
            total_route_count, params.gimbal_pitch_deg
        ),
        expanded_polygon,
        expansion_distance_m: expansion,
        edge_coverage_pct,
    })
}

/// Filter waypoints from the expanded-polygon plan down to those that can
/// photograph the original polygon: inside it, or within an effective
/// coverage radius of it. A secondary interior sweep restores any waypoint
/// needed to cover residual samples the first filter would have dropped.
fn filter_to_original_coverage(
    waypoints: &[Point],
    original: &Polygon,
    original_id: PolygonId,
    sweep: &crate::types::SweepParams,
    gimbal_pitch_deg: f64,
    config: &PlannerConfig,
) -> Vec<Point> {
    let max_dim = sweep.photo_width_m.max(sweep.photo_length_m);
    let cos_pitch = gimbal_pitch_deg.to_radians().cos();

    let r = (max_dim * 0.5 * cos_pitch * (1.0 - 0.3 * sweep.side_overlap_pct.min(sweep.forward_overlap_pct) / 100.0))
        .max(0.4 * max_dim / 2.0);

    let mut kept: Vec<Point> = waypoints
        .iter()
        .copied()
        .filter(|w| {
            crate::cache::point_in_polygon(*w, original, original_id, config)
                || nearest_boundary_distance(*w, original) <= r
        })
        .collect();

    let half_r = r / 2.0;
    let residual = residual_uncovered_samples(original, &kept, half_r);
    if !residual.is_empty() {
        for discarded in waypoints {
            if kept.contains(discarded) {
                continue;
            }
            if residual.iter().any(|u| geodesy::distance_m(*discarded, *u) <= half_r) {
                kept.push(*discarded);
            }
        }
    }

    kept
}

fn nearest_boundary_distance(p: Point, polygon: &Polygon) -> f64 {
    polygon
        .edges()
        .map(|(a, b)| distance_to_segment(p, a, b))
        .fold(f64::INFINITY, f64::min)
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let ax = a.lng().0;
    let ay = a.lat().0;
    let bx = b.lng().0;
    let by = b.lat().0;
    let px = p.lng().0;
    let py = p.lat().0;

    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq < 1e-18 {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let closest = Point::new_unchecked(ay + dy * t, ax + dx * t);
    geodesy::distance_m(p, closest)
}

fn residual_uncovered_samples(polygon: &Polygon, kept: &[Point], radius_m: f64) -> Vec<Point> {
    let (min_lat, min_lng, max_lat, max_lng) = geodesy::bounds(polygon);
    let steps = 15;
    let mut uncovered = Vec::new();
    for row in 0..=steps {
        for col in 0..=steps {
            let lat = min_lat + (max_lat - min_lat) * (row as f64 / steps as f64);
            let lng = min_lng + (max_lng - min_lng) * (col as f64 / steps as f64);
            let p = Point::new_unchecked(lat, lng);
            if !geodesy::point_in_polygon(p, polygon) {
                continue;
            }
            let nearest = kept.iter().map(|w| geodesy::distance_m(p, *w)).fold(f64::INFINITY, f64::min);
            if nearest > radius_m {
                uncovered.push(p);
            }
        }
    }
    uncovered
}

fn edge_coverage_percent(routes: &[Route], polygon: &Polygon, sweep: &crate::types::SweepParams) -> f64 {
    let radius = 0.6 * sweep.photo_width_m.max(sweep.photo_length_m);
    let all_waypoints: Vec<Point> = routes.iter().flat_map(|r| r.waypoints.iter().copied()).collect();
    if all_waypoints.is_empty() {
        return 0.0;
    }

    let boundary_samples = sample_boundary_every(polygon, 10.0);
    if boundary_samples.is_empty() {
        return 0.0;
    }

    let covered = boundary_samples
        .iter()
        .filter(|s| all_waypoints.iter().any(|w| geodesy::distance_m(**s, *w) <= radius))
        .count();

    100.0 * covered as f64 / boundary_samples.len() as f64
}

fn sample_boundary_every(polygon: &Polygon, spacing_m: f64) -> Vec<Point> {
    let mut samples = Vec::new();
    for (a, b) in polygon.edges() {
        let edge_len = geodesy::distance_m(a, b);
        let n = (edge_len / spacing_m).floor().max(1.0) as usize;
        for i in 0..n {
            let t = i as f64 / n as f64;
            samples.push(Point::new_unchecked(
                a.lat().0 + (b.lat().0 - a.lat().0) * t,
                a.lng().0 + (b.lng().0 - a.lng().0) * t,
            ));
        }
    }
    samples
}

fn total_distance(waypoints: &[Point]) -> f64 {
    waypoints.windows(2).map(|w| geodesy::distance_m(w[0], w[1])).sum()
}

/// Expanded-polygon area accounting, without running the planner.
pub fn expanded_area_info(params: &ObliqueParams) -> crate::PlannerResult<ExpandedAreaInfo> {
    params.validate()?;

    let expansion = expansion_distance_m(params);
    let expanded_polygon = buffer_outward(&params.polygon, expansion);

    let original_area = geodesy::area_m2(&params.polygon);
    let expanded_area = geodesy::area_m2(&expanded_polygon);
    let area_increase_pct = if original_area > 0.0 {
        100.0 * (expanded_area - original_area) / original_area
    } else {
        0.0
    };

    Ok(ExpandedAreaInfo {
        expanded_polygon,
        expansion_distance_m: expansion,
        original_area_m2: original_area,
        expanded_area_m2: expanded_area,
        area_increase_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_counts_match_pitch_table() {
        assert_eq!(direction_offsets(-10.0).len(), 1);
        assert_eq!(direction_offsets(-20.0).len(), 3);
        assert_eq!(direction_offsets(-35.0).len(), 4);
        assert_eq!(direction_offsets(-60.0).len(), 5);
    }

    #[test]
    fn buffer_outward_grows_area() -> anyhow::Result<()> {
        let square = Polygon::new(crate::points![
            (0.0, 0.0),
            (0.0, 0.001),
            (0.001, 0.001),
            (0.001, 0.0)
        ])?;
        let buffered = buffer_outward(&square, 20.0);
        assert!(geodesy::area_m2(&buffered) > geodesy::area_m2(&square));
        Ok(())
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod proptests {
    use quickcheck::Arbitrary;
    use quickcheck_macros::quickcheck;

    use super::*;

    /// A roughly star-shaped simple polygon: points spread evenly in bearing
    /// around a center with a jittered radius.
    #[derive(Clone, Debug)]
    struct ArbSimplePolygon(Polygon);

    impl Arbitrary for ArbSimplePolygon {
        fn arbitrary(_g: &mut quickcheck::Gen) -> Self {
            let n = rand::random_range(4..=8usize);
            let center = Point::new_unchecked(rand::random_range(-60.0..=60.0), rand::random_range(-170.0..=170.0));
            let radius = rand::random_range(50.0..=500.0);
            let vertices: Vec<Point> = (0..n)
                .map(|i| {
                    let bearing = 360.0 * i as f64 / n as f64;
                    let jitter = rand::random_range(0.8..=1.2);
                    geodesy::offset(center, bearing, radius * jitter)
                })
                .collect();
            ArbSimplePolygon(Polygon::new(vertices).expect("generated ring has >= 4 vertices"))
        }
    }

    #[derive(Clone, Copy, Debug)]
    struct ArbExpansionDistance(f64);

    impl Arbitrary for ArbExpansionDistance {
        fn arbitrary(_g: &mut quickcheck::Gen) -> Self {
            ArbExpansionDistance(rand::random_range(1.0..=100.0))
        }
    }

    #[quickcheck]
    fn expansion_never_shrinks_the_polygon(poly: ArbSimplePolygon, dist: ArbExpansionDistance) -> bool {
        let buffered = buffer_outward(&poly.0, dist.0);
        geodesy::area_m2(&buffered) >= geodesy::area_m2(&poly.0)
    }
}
