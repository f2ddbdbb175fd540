//! Wires the geodesy, cache, sweep, sequence, coverage, and simplify
//! components together into the single-direction planning pipeline that
//! backs both `plan_single`/`plan_multi_block` and each direction of an
//! oblique plan.

use std::time::Instant;

use tracing::instrument;

use crate::cache::{self, PolygonId};
use crate::geodesy;
use crate::sequence;
use crate::simplify;
use crate::sweep;
use crate::types::{PlanResult, PlannerConfig, Point, Polygon, SweepParams};

/// Run one single-direction sweep-and-sequence pass, with no coverage
/// repair. Used directly by `plan_single` and as the inner pass for
/// multi-block planning and each oblique direction.
#[instrument(level = "debug", skip(polygon, params, config))]
pub fn plan_single_on(polygon: &Polygon, id: PolygonId, params: &SweepParams, config: &PlannerConfig) -> PlanResult {
    let started = Instant::now();

    let anchor = sequence::resolve_exterior_start_anchor(params.start_point, polygon);
    let lines = sweep::generate_sweep_lines(
        polygon,
        id,
        anchor,
        params.direction_deg,
        params.line_spacing(),
        params.point_spacing(),
        config,
    );
    let total_lines = lines.len();

    let waypoints = sequence::sequence(lines, polygon, id, params.start_point, config);
    let total_distance_m = total_distance(&waypoints);

    cache::record_plan_duration(started.elapsed());

    PlanResult {
        waypoints,
        total_distance_m,
        total_lines,
    }
}

/// Run the single-direction pipeline plus up to `max_blocks - 1`
/// supplementary coverage-repair passes, then simplify if requested.
#[instrument(level = "debug", skip(polygon, params, config))]
pub fn plan_multi_block_on(
    polygon: &Polygon,
    params: &SweepParams,
    max_blocks: usize,
    simplify_result: bool,
    config: &PlannerConfig,
) -> PlanResult {
    let id = PolygonId::of(polygon);
    let mut result = plan_single_on(polygon, id, params, config);

    if result.waypoints.is_empty() {
        return result;
    }

    for _ in 1..max_blocks.max(1) {
        let satisfied = crate::coverage::repair_coverage(&mut result.waypoints, polygon, id, params, config);
        if satisfied {
            break;
        }
    }

    if crate::coverage::density_gate_triggered(&result.waypoints, geodesy::area_m2(polygon), params) {
        enforce_minimum_spacing(&mut result.waypoints, 0.75 * params.point_spacing());
    }

    if simplify_result {
        result.waypoints = simplify::simplify(&result.waypoints);
    }

    result.total_distance_m = total_distance(&result.waypoints);
    result
}

/// Drop waypoints (after the first) that fall closer than `min_spacing_m` to
/// their predecessor, run only when the density gate in
/// [`crate::coverage::density_gate_triggered`] fires.
fn enforce_minimum_spacing(waypoints: &mut Vec<Point>, min_spacing_m: f64) {
    if waypoints.len() < 2 {
        return;
    }
    let mut out = vec![waypoints[0]];
    for &p in &waypoints[1..] {
        let last = *out.last().unwrap();
        if geodesy::distance_m(last, p) >= min_spacing_m {
            out.push(p);
        }
    }
    *waypoints = out;
}

fn total_distance(waypoints: &[Point]) -> f64 {
    waypoints.windows(2).map(|w| geodesy::distance_m(w[0], w[1])).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points;

    #[test]
    fn single_direction_plan_stays_inside_unit_square() -> anyhow::Result<()> {
        cache::reset();
        let square = Polygon::new(points![
            (0.0, 0.0),
            (0.000898, 0.0),
            (0.000898, 0.000898),
            (0.0, 0.000898)
        ])?;
        let params = SweepParams {
            direction_deg: 0.0,
            photo_width_m: 50.0,
            photo_length_m: 50.0,
            side_overlap_pct: 80.0,
            forward_overlap_pct: 80.0,
            flight_height_m: 100.0,
            start_point: crate::point!(0.0004, 0.0004),
        };
        let config = PlannerConfig::default();
        let id = PolygonId::of(&square);
        let result = plan_single_on(&square, id, &params, &config);
        assert!(!result.waypoints.is_empty());
        for w in &result.waypoints {
            assert!(geodesy::point_in_polygon(*w, &square));
        }
        Ok(())
    }

    #[test]
    fn multi_block_plan_improves_or_matches_coverage() -> anyhow::Result<()> {
        cache::reset();
        let square = Polygon::new(points![
            (0.0, 0.0),
            (0.000898, 0.0),
            (0.000898, 0.000898),
            (0.0, 0.000898)
        ])?;
        let params = SweepParams {
            direction_deg: 0.0,
            photo_width_m: 50.0,
            photo_length_m: 50.0,
            side_overlap_pct: 80.0,
            forward_overlap_pct: 80.0,
            flight_height_m: 100.0,
            start_point: crate::point!(0.0004, 0.0004),
        };
        let config = PlannerConfig::default();
        let result = plan_multi_block_on(&square, &params, 3, true, &config);
        assert!(!result.waypoints.is_empty());
        Ok(())
    }
}
