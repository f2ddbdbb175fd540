use thiserror::Error;

use crate::measure::{DEG, Degree};

#[derive(Error, Debug)]
pub enum TypeError {
    #[error("point invariant: invalid value {1:?} for {0:?}")]
    PointInvariant(PointDimension, Degree<f64>),
    #[error("polygon must have at least 3 vertices, got {0}")]
    PolygonTooSmall(usize),
    #[error("invalid overlap percentage {0}: must be in [0, 100]")]
    InvalidOverlap(f64),
    #[error("invalid dimension {1}: {0} must be positive")]
    NonPositiveDimension(&'static str, f64),
    #[error("gimbal pitch {0} must be <= 0 degrees")]
    PositiveGimbalPitch(f64),
}

pub type Result<T> = std::result::Result<T, TypeError>;

#[derive(Debug)]
pub enum PointDimension {
    Latitude,
    Longitude,
}

/// A point on the surface of the WGS-84 ellipsoid.
///
/// Enforces valid latitude and longitude values as type invariants.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Point {
    lat: Degree<f64>,
    lng: Degree<f64>,
}

impl Point {
    pub fn new(lat: Degree<f64>, lng: Degree<f64>) -> Result<Point> {
        if lat.0 < -90.0 || lat.0 > 90.0 {
            return Err(TypeError::PointInvariant(PointDimension::Latitude, lat));
        }
        if lng.0 < -180.0 || lng.0 > 180.0 {
            return Err(TypeError::PointInvariant(PointDimension::Longitude, lng));
        }
        Ok(Self { lat, lng })
    }

    /// Construct from raw decimal degrees without invariant checking; used
    /// internally once a value is already known to be valid (e.g. the
    /// output of an interior computation).
    pub(crate) fn new_unchecked(lat: f64, lng: f64) -> Point {
        Point {
            lat: Degree(lat),
            lng: Degree(lng),
        }
    }

    pub fn lat(&self) -> Degree<f64> {
        self.lat
    }

    pub fn lng(&self) -> Degree<f64> {
        self.lng
    }
}

impl Default for Point {
    fn default() -> Point {
        Point {
            lat: 0.0 * DEG,
            lng: 0.0 * DEG,
        }
    }
}

/// Instantiate a `Point` with tuple-like syntax: `point!(lat, lng)`.
#[macro_export]
macro_rules! point {
    ( $lat:expr, $lng:expr ) => {
        $crate::types::Point::new($lat * $crate::measure::DEG, $lng * $crate::measure::DEG)?
    };
}

/// Instantiate a `Vec<Point>` with tuple-like syntax.
#[macro_export]
macro_rules! points {
    ( $( ( $lat:expr, $lng:expr ) ),* $(,)? ) => {
        vec![ $( $crate::point!($lat, $lng) ),* ]
    };
}

/// A simple, closed polygon: an ordered ring of vertices with the closing
/// edge from the last vertex back to the first left implicit.
#[derive(Clone, Debug)]
pub struct Polygon {
    vertices: Vec<Point>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point>) -> Result<Polygon> {
        if vertices.len() < 3 {
            return Err(TypeError::PolygonTooSmall(vertices.len()));
        }
        Ok(Polygon { vertices })
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Edges as `(start, end)` pairs, including the implicit closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }
}

/// Parameters for a single-direction sweep.
#[derive(Clone, Copy, Debug)]
pub struct SweepParams {
    pub direction_deg: f64,
    pub photo_width_m: f64,
    pub photo_length_m: f64,
    pub side_overlap_pct: f64,
    pub forward_overlap_pct: f64,
    pub flight_height_m: f64,
    pub start_point: Point,
}

impl SweepParams {
    pub fn validate(&self) -> Result<()> {
        validate_overlap(self.side_overlap_pct)?;
        validate_overlap(self.forward_overlap_pct)?;
        validate_positive("photo_width_m", self.photo_width_m)?;
        validate_positive("photo_length_m", self.photo_length_m)?;
        validate_positive("flight_height_m", self.flight_height_m)?;
        Ok(())
    }

    pub fn line_spacing(&self) -> f64 {
        self.photo_width_m * (1.0 - self.side_overlap_pct / 100.0)
    }

    pub fn point_spacing(&self) -> f64 {
        self.photo_length_m * (1.0 - self.forward_overlap_pct / 100.0)
    }
}

pub(crate) fn validate_overlap(pct: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&pct) {
        return Err(TypeError::InvalidOverlap(pct));
    }
    Ok(())
}

pub(crate) fn validate_positive(name: &'static str, value: f64) -> Result<()> {
    if value <= 0.0 {
        return Err(TypeError::NonPositiveDimension(name, value));
    }
    Ok(())
}

/// Parameters for an oblique multi-direction plan.
#[derive(Clone, Debug)]
pub struct ObliqueParams {
    pub sweep: SweepParams,
    pub gimbal_pitch_deg: f64,
    pub polygon: Polygon,
}

impl ObliqueParams {
    pub fn validate(&self) -> Result<()> {
        self.sweep.validate()?;
        if self.gimbal_pitch_deg > 0.0 {
            return Err(TypeError::PositiveGimbalPitch(self.gimbal_pitch_deg));
        }
        Ok(())
    }
}

/// One planned flight route: an ordered waypoint sequence flown in a single
/// sweep direction.
#[derive(Clone, Debug)]
pub struct Route {
    pub direction_deg: f64,
    pub gimbal_pitch_deg: f64,
    pub waypoints: Vec<Point>,
    pub distance_m: f64,
    pub label: String,
}

/// Result of a single-direction plan.
#[derive(Clone, Debug)]
pub struct PlanResult {
    pub waypoints: Vec<Point>,
    pub total_distance_m: f64,
    pub total_lines: usize,
}

/// Result of an oblique multi-direction plan.
#[derive(Clone, Debug)]
pub struct ObliqueResult {
    pub routes: Vec<Route>,
    pub total_distance_m: f64,
    pub total_route_count: usize,
    pub optimized: bool,
    pub rationale: String,
    pub expanded_polygon: Polygon,
    pub expansion_distance_m: f64,
    pub edge_coverage_pct: f64,
}

/// Result of `expanded_area_info`.
#[derive(Clone, Debug)]
pub struct ExpandedAreaInfo {
    pub expanded_polygon: Polygon,
    pub expansion_distance_m: f64,
    pub original_area_m2: f64,
    pub expanded_area_m2: f64,
    pub area_increase_pct: f64,
}

/// Tunable constants backing the otherwise-hardcoded thresholds throughout
/// the planner. `PlannerConfig::default()` reproduces every documented
/// default verbatim.
#[derive(Clone, Copy, Debug)]
pub struct PlannerConfig {
    pub cache_size_threshold: usize,
    pub cache_sweep_interval_secs: u64,
    pub min_fallback_lines: usize,
    pub bridge_search_fanout: usize,
    pub grid_sample_clamp: (usize, usize),
    pub density_gate_multiplier: f64,
    pub max_blocks_default: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            cache_size_threshold: 10_000,
            cache_sweep_interval_secs: 300,
            min_fallback_lines: 3,
            bridge_search_fanout: 3,
            grid_sample_clamp: (200, 1500),
            density_gate_multiplier: 1.5,
            max_blocks_default: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_rejects_out_of_range_latitude() {
        assert!(Point::new(Degree(91.0), Degree(0.0)).is_err());
    }

    #[test]
    fn point_rejects_out_of_range_longitude() {
        assert!(Point::new(Degree(0.0), Degree(181.0)).is_err());
    }

    #[test]
    fn point_macro_builds_a_valid_point() -> anyhow::Result<()> {
        let p = point!(10.0, 20.0);
        assert_eq!(p.lat().0, 10.0);
        assert_eq!(p.lng().0, 20.0);
        Ok(())
    }

    #[test]
    fn polygon_requires_three_vertices() -> anyhow::Result<()> {
        let v = points![(0.0, 0.0), (1.0, 0.0)];
        assert!(matches!(Polygon::new(v), Err(TypeError::PolygonTooSmall(2))));
        Ok(())
    }

    #[test]
    fn sweep_params_spacing_derivation() {
        let p = SweepParams {
            direction_deg: 0.0,
            photo_width_m: 50.0,
            photo_length_m: 40.0,
            side_overlap_pct: 80.0,
            forward_overlap_pct: 75.0,
            flight_height_m: 100.0,
            start_point: Point::default(),
        };
        assert_eq!(p.line_spacing(), 10.0);
        assert_eq!(p.point_spacing(), 10.0);
    }

    macro_rules! overlap_boundary_test {
        ($name:ident, $value:expr, $expect_ok:expr) => {
            paste::paste! {
                #[test]
                fn [<overlap_ $name>]() {
                    assert_eq!(validate_overlap($value).is_ok(), $expect_ok);
                }
            }
        };
    }

    overlap_boundary_test!(negative_is_invalid, -1.0, false);
    overlap_boundary_test!(zero_is_valid, 0.0, true);
    overlap_boundary_test!(hundred_is_valid, 100.0, true);
    overlap_boundary_test!(over_hundred_is_invalid, 101.0, false);
}
