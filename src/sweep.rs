//! Component L: parallel sweep-line generation, clipping to the polygon, and
//! per-line waypoint emission.

use tracing::instrument;

use crate::cache::{self, PolygonId};
use crate::geodesy;
use crate::types::{PlannerConfig, Point, Polygon};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Map independent work items either in parallel (default, `rayon` feature)
/// or serially behind a single switch point.
macro_rules! iter_work {
    ($collection:expr, $body:expr) => {{
        #[cfg(feature = "rayon")]
        {
            $collection.into_par_iter().map($body).collect::<Vec<_>>()
        }
        #[cfg(not(feature = "rayon"))]
        {
            $collection.into_iter().map($body).collect::<Vec<_>>()
        }
    }};
}

/// One surviving sweep line: its in-polygon waypoints, in chord order.
#[derive(Clone, Debug)]
pub struct SweepLine {
    pub waypoints: Vec<Point>,
}

/// Strict-inside predicate: both endpoints inside, several interior samples
/// inside, and the leg crosses no polygon edge.
pub fn strict_inside(
    a: Point,
    b: Point,
    polygon: &Polygon,
    id: PolygonId,
    config: &PlannerConfig,
) -> bool {
    if !cache::point_in_polygon(a, polygon, id, config) || !cache::point_in_polygon(b, polygon, id, config) {
        return false;
    }

    let length = geodesy::distance_m(a, b);
    let samples = ((length / 20.0).round() as usize).clamp(2, 8);
    for i in 1..samples {
        let t = i as f64 / samples as f64;
        let lat = a.lat().0 + (b.lat().0 - a.lat().0) * t;
        let lng = a.lng().0 + (b.lng().0 - a.lng().0) * t;
        let sample = Point::new_unchecked(lat, lng);
        if !cache::point_in_polygon(sample, polygon, id, config) {
            return false;
        }
    }

    for (ea, eb) in polygon.edges() {
        if matches!(
            geodesy::segment_intersection(a, b, ea, eb),
            geodesy::Intersection::Point(_) | geodesy::Intersection::Collinear(_, _)
        ) {
            return false;
        }
    }

    true
}

fn midpoint_biased(a: Point, b: Point, centroid: Point, bias: f64) -> Point {
    let mid_lat = (a.lat().0 + b.lat().0) / 2.0;
    let mid_lng = (a.lng().0 + b.lng().0) / 2.0;
    let lat = mid_lat + (centroid.lat().0 - mid_lat) * bias;
    let lng = mid_lng + (centroid.lng().0 - mid_lng) * bias;
    Point::new_unchecked(lat, lng)
}

/// Number of sweep-line offsets to try on either side of the anchor,
/// `clamp(extent / spacing + 10, 20, 100)`.
fn half_line_count(max_extent_m: f64, line_spacing_m: f64) -> i64 {
    ((max_extent_m / line_spacing_m + 10.0).round() as i64).clamp(20, 100)
}

/// Generate the clipped, waypoint-populated sweep lines for one direction.
///
/// `direction_deg` is the along-line bearing; lines are offset perpendicular
/// to it. Returns the surviving lines in perpendicular-offset order (not yet
/// sequenced — see [`crate::sequence`]).
#[instrument(level = "debug", name = "generate_sweep_lines", skip(polygon, config))]
pub fn generate_sweep_lines(
    polygon: &Polygon,
    id: PolygonId,
    anchor: Point,
    direction_deg: f64,
    line_spacing_m: f64,
    point_spacing_m: f64,
    config: &PlannerConfig,
) -> Vec<SweepLine> {
    let extent = cache_aware_max_extent(polygon, id, config);
    let k = half_line_count(extent, line_spacing_m);
    let perp_deg = (direction_deg + 90.0).rem_euclid(360.0);
    let centroid = geodesy::centroid(polygon);

    let offsets: Vec<i64> = (-k..=k).collect();
    let lines: Vec<Vec<SweepLine>> = iter_work!(offsets, |k_offset| {
        build_one_line(
            polygon,
            id,
            anchor,
            direction_deg,
            perp_deg,
            k_offset,
            line_spacing_m,
            point_spacing_m,
            extent,
            centroid,
            config,
        )
    });

    let mut surviving: Vec<SweepLine> = lines.into_iter().flatten().collect();

    if surviving.len() < config.min_fallback_lines {
        tracing::debug!(
            surviving = surviving.len(),
            "primary sweep direction under-yielded, retrying perpendicular at half spacing"
        );
        let fallback_spacing = line_spacing_m / 2.0;
        let fallback_k = half_line_count(extent, fallback_spacing);
        let fallback_offsets: Vec<i64> = (-fallback_k..=fallback_k).collect();
        let fallback_lines: Vec<Vec<SweepLine>> = iter_work!(fallback_offsets, |k_offset| {
            build_one_line(
                polygon,
                id,
                anchor,
                perp_deg,
                direction_deg,
                k_offset,
                fallback_spacing,
                point_spacing_m,
                extent,
                centroid,
                config,
            )
        });
        surviving = fallback_lines.into_iter().flatten().collect();
    }

    surviving
}

fn cache_aware_max_extent(polygon: &Polygon, id: PolygonId, config: &PlannerConfig) -> f64 {
    let (min_lat, min_lng, max_lat, max_lng) = cache::bounds(polygon, id, config);
    let corner_a = Point::new_unchecked(min_lat, min_lng);
    let corner_b = Point::new_unchecked(max_lat, max_lng);
    cache::distance_m(corner_a, corner_b, config)
}

#[allow(clippy::too_many_arguments)]
fn build_one_line(
    polygon: &Polygon,
    id: PolygonId,
    anchor: Point,
    along_deg: f64,
    perp_deg: f64,
    k_offset: i64,
    line_spacing_m: f64,
    point_spacing_m: f64,
    extent: f64,
    centroid: Point,
    config: &PlannerConfig,
) -> Vec<SweepLine> {
    let offset_point = if k_offset == 0 {
        anchor
    } else {
        geodesy::offset(anchor, perp_deg, k_offset as f64 * line_spacing_m)
    };

    let far = 2.0 * extent;
    let line_start = geodesy::offset(offset_point, along_deg, -far);
    let line_end = geodesy::offset(offset_point, along_deg, far);

    let crossings = cache::line_polygon_intersections(line_start, line_end, polygon, id, config);
    if crossings.len() < 2 {
        return Vec::new();
    }

    // Crossings come paired; a concave polygon can yield more than one chord
    // per offset line, so every surviving pair is kept, not just the first.
    crossings
        .chunks_exact(2)
        .filter_map(|pair| try_chord(polygon, id, pair[0], pair[1], point_spacing_m, centroid, config))
        .collect()
}

fn try_chord(
    polygon: &Polygon,
    id: PolygonId,
    s: Point,
    e: Point,
    point_spacing_m: f64,
    centroid: Point,
    config: &PlannerConfig,
) -> Option<SweepLine> {
    let shrink = 0.02;
    let s2 = Point::new_unchecked(
        s.lat().0 + (e.lat().0 - s.lat().0) * shrink,
        s.lng().0 + (e.lng().0 - s.lng().0) * shrink,
    );
    let e2 = Point::new_unchecked(
        e.lat().0 + (s.lat().0 - e.lat().0) * shrink,
        e.lng().0 + (s.lng().0 - e.lng().0) * shrink,
    );

    if !strict_inside(s2, e2, polygon, id, config) {
        return None;
    }

    let length = cache::distance_m(s2, e2, config);
    let n = ((length / point_spacing_m).ceil() as usize + 1).max(2);

    let mut waypoints = Vec::with_capacity(n);
    let mut prev: Option<Point> = None;
    for i in 0..n {
        let t = i as f64 / (n - 1) as f64;
        let candidate = Point::new_unchecked(
            s2.lat().0 + (e2.lat().0 - s2.lat().0) * t,
            s2.lng().0 + (e2.lng().0 - s2.lng().0) * t,
        );

        if !cache::point_in_polygon(candidate, polygon, id, config) {
            continue;
        }

        if let Some(p) = prev {
            if !strict_inside(p, candidate, polygon, id, config) {
                let rescue = midpoint_biased(p, candidate, centroid, 0.10);
                if strict_inside(p, rescue, polygon, id, config)
                    && strict_inside(rescue, candidate, polygon, id, config)
                {
                    waypoints.push(rescue);
                } else {
                    continue;
                }
            }
        }

        waypoints.push(candidate);
        prev = Some(candidate);
    }

    if waypoints.len() < 2 {
        return None;
    }

    Some(SweepLine { waypoints })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points;

    #[test]
    fn unit_square_yields_multiple_lines() -> anyhow::Result<()> {
        cache::reset();
        let square = Polygon::new(points![
            (0.0, 0.0),
            (0.000898, 0.0),
            (0.000898, 0.000898),
            (0.0, 0.000898)
        ])?;
        let id = PolygonId::of(&square);
        let config = PlannerConfig::default();
        let anchor = geodesy::centroid(&square);
        let lines = generate_sweep_lines(&square, id, anchor, 0.0, 10.0, 10.0, &config);
        assert!(lines.len() >= 3, "expected several sweep lines, got {}", lines.len());
        for line in &lines {
            for w in &line.waypoints {
                assert!(geodesy::point_in_polygon(*w, &square));
            }
        }
        Ok(())
    }

    #[test]
    fn half_line_count_is_clamped() {
        assert_eq!(half_line_count(1.0, 1000.0), 20);
        assert_eq!(half_line_count(1_000_000.0, 10.0), 100);
    }

    #[test]
    fn concave_polygon_yields_two_chords_on_one_offset_line() -> anyhow::Result<()> {
        // A notch cut from the top-middle of a rectangle, so a line through
        // the notch's depth crosses the boundary four times (two chords).
        let unit = 0.001;
        let polygon = Polygon::new(points![
            (0.0, 0.0),
            (0.0, 3.0 * unit),
            (2.0 * unit, 3.0 * unit),
            (2.0 * unit, 2.0 * unit),
            (1.0 * unit, 2.0 * unit),
            (1.0 * unit, 1.0 * unit),
            (2.0 * unit, 1.0 * unit),
            (2.0 * unit, 0.0),
        ])?;
        let id = PolygonId::of(&polygon);
        let config = PlannerConfig::default();
        let centroid = geodesy::centroid(&polygon);
        let anchor = Point::new_unchecked(1.5 * unit, 1.5 * unit);

        let lines = build_one_line(&polygon, id, anchor, 90.0, 0.0, 0, 50.0, 20.0, 1000.0, centroid, &config);

        assert_eq!(lines.len(), 2, "expected two separate chords, got {}", lines.len());
        for line in &lines {
            for w in &line.waypoints {
                assert!(geodesy::point_in_polygon(*w, &polygon));
            }
        }
        Ok(())
    }
}
