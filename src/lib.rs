//! A library for planning aerial survey flight paths for rotary-wing
//! photogrammetry drones.
//!
//! Given a closed polygon on the WGS-84 ellipsoid, a sweep direction,
//! camera footprint dimensions, forward/side overlap targets, and a starting
//! position, [`plan_single`] and [`plan_multi_block`] produce an ordered
//! sequence of waypoints whose photographic footprints cover the polygon,
//! while the connecting flight legs stay inside it. [`plan_oblique`] drives
//! the same pipeline across multiple sweep directions chosen from a gimbal
//! pitch, buffering the polygon outward first so the tilted footprints still
//! reach every edge.
//!
//! # Feature flags
//!
//! - `cli` enables the additional dependencies needed by the `aerosweep`
//!   binary (argument parsing, CLI error context, log formatting)
//! - `rayon` (default) parallelizes the line generator, the coverage-repair
//!   grid filter, and the oblique per-direction fan-out

pub mod cache;
pub mod coverage;
pub mod export;
pub mod geodesy;
mod measure;
pub mod oblique;
pub mod photogrammetry;
mod planner;
mod sequence;
mod simplify;
mod sweep;
pub mod testonly;
pub mod types;

use thiserror::Error;

use crate::types::{ExpandedAreaInfo, ObliqueParams, PlanResult, PlannerConfig, Point, Polygon, SweepParams, TypeError};

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("invalid input")]
    InvalidInput(#[from] TypeError),
}

pub type PlannerResult<T> = std::result::Result<T, PlannerError>;

/// Plan a single-direction sweep over `polygon`, with no coverage-gap
/// repair. `UnsatisfiableCoverage` (no sweep line survives clipping) is
/// reported as an empty [`PlanResult`], not as an error.
pub fn plan_single(polygon: &Polygon, params: &SweepParams) -> PlannerResult<PlanResult> {
    plan_single_with_config(polygon, params, &PlannerConfig::default())
}

pub fn plan_single_with_config(
    polygon: &Polygon,
    params: &SweepParams,
    config: &PlannerConfig,
) -> PlannerResult<PlanResult> {
    params.validate()?;
    let id = cache::PolygonId::of(polygon);
    Ok(planner::plan_single_on(polygon, id, params, config))
}

/// Plan a single-direction sweep, running up to `max_blocks - 1`
/// supplementary coverage-repair passes and, if `simplify` is set,
/// collapsing near-collinear waypoints before returning.
pub fn plan_multi_block(
    polygon: &Polygon,
    params: &SweepParams,
    max_blocks: usize,
    simplify: bool,
) -> PlannerResult<PlanResult> {
    plan_multi_block_with_config(polygon, params, max_blocks, simplify, &PlannerConfig::default())
}

pub fn plan_multi_block_with_config(
    polygon: &Polygon,
    params: &SweepParams,
    max_blocks: usize,
    simplify: bool,
    config: &PlannerConfig,
) -> PlannerResult<PlanResult> {
    params.validate()?;
    Ok(planner::plan_multi_block_on(polygon, params, max_blocks, simplify, config))
}

/// Plan an oblique multi-direction survey: selects 1/3/4/5 sweep directions
/// from the gimbal pitch, buffers the polygon outward, runs the
/// single-pass pipeline per direction, and filters results back to coverage
/// of the original polygon.
pub fn plan_oblique(params: &ObliqueParams) -> PlannerResult<crate::types::ObliqueResult> {
    plan_oblique_with_config(params, &PlannerConfig::default())
}

pub fn plan_oblique_with_config(
    params: &ObliqueParams,
    config: &PlannerConfig,
) -> PlannerResult<crate::types::ObliqueResult> {
    oblique::plan_oblique(params, config)
}

/// Report the outward-buffered polygon and area accounting for an oblique
/// plan's parameters, without running the planner itself.
pub fn expanded_area_info(params: &ObliqueParams) -> PlannerResult<ExpandedAreaInfo> {
    oblique::expanded_area_info(params)
}

/// Re-exported so callers constructing `Point`/`Polygon` values don't need a
/// separate angle-unit dependency of their own.
pub use crate::measure::{DEG, Degree};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points;

    #[test]
    fn plan_single_rejects_invalid_overlap() -> anyhow::Result<()> {
        let square = Polygon::new(points![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)])?;
        let params = SweepParams {
            direction_deg: 0.0,
            photo_width_m: 10.0,
            photo_length_m: 10.0,
            side_overlap_pct: 150.0,
            forward_overlap_pct: 80.0,
            flight_height_m: 100.0,
            start_point: Point::default(),
        };
        assert!(plan_single(&square, &params).is_err());
        Ok(())
    }

    #[test]
    fn plan_oblique_rejects_positive_gimbal_pitch() -> anyhow::Result<()> {
        let square = Polygon::new(points![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)])?;
        let params = ObliqueParams {
            sweep: SweepParams {
                direction_deg: 0.0,
                photo_width_m: 10.0,
                photo_length_m: 10.0,
                side_overlap_pct: 70.0,
                forward_overlap_pct: 70.0,
                flight_height_m: 100.0,
                start_point: Point::default(),
            },
            gimbal_pitch_deg: 10.0,
            polygon: square,
        };
        assert!(plan_oblique(&params).is_err());
        Ok(())
    }
}
