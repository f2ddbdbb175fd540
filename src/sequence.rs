//! Component S: snake-order sequencing of sweep lines, with in-polygon
//! bridge synthesis for legs that would otherwise leave the polygon.

use tracing::instrument;

use crate::cache::PolygonId;
use crate::geodesy;
use crate::sweep::{SweepLine, strict_inside};
use crate::types::{PlannerConfig, Point, Polygon};

/// Order and concatenate sweep lines into one snake-pattern waypoint list,
/// inserting bridges between consecutive lines whose direct leg leaves the
/// polygon.
#[instrument(level = "debug", skip(lines, polygon, config))]
pub fn sequence(
    mut lines: Vec<SweepLine>,
    polygon: &Polygon,
    id: PolygonId,
    start: Point,
    config: &PlannerConfig,
) -> Vec<Point> {
    if lines.is_empty() {
        return Vec::new();
    }

    sort_lines_by_dominant_axis(&mut lines, start);

    let mut out: Vec<Point> = Vec::new();
    let mut reverse = false;

    for (i, line) in lines.into_iter().enumerate() {
        let mut waypoints = line.waypoints;
        if reverse {
            waypoints.reverse();
        }

        if i > 0 {
            let tail = *out.last().expect("non-empty after first line");
            let head = waypoints[0];
            if !strict_inside(tail, head, polygon, id, config) {
                if let Some(bridge) = synthesize_bridge_for(tail, head, polygon, id, config) {
                    out.extend(bridge);
                }
            }
        }

        out.extend(waypoints);
        reverse = !reverse;
    }

    final_cleanup(out, polygon, id, config)
}

/// Decide traversal order: sort by latitude if consecutive line midpoints
/// differ more in latitude than longitude, else by longitude; reverse if the
/// start point is nearer the far end.
fn sort_lines_by_dominant_axis(lines: &mut [SweepLine], start: Point) {
    if lines.len() < 2 {
        return;
    }

    let midpoints: Vec<Point> = lines
        .iter()
        .map(|l| {
            let n = l.waypoints.len();
            l.waypoints[n / 2]
        })
        .collect();

    let (lat_lo, lat_hi) = midpoints
        .iter()
        .map(|p| p.lat().0)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let lat_spread = lat_hi - lat_lo;

    let (lng_lo, lng_hi) = midpoints
        .iter()
        .map(|p| p.lng().0)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let lng_spread = lng_hi - lng_lo;

    let mut indices: Vec<usize> = (0..lines.len()).collect();
    if lat_spread >= lng_spread {
        indices.sort_by(|&a, &b| midpoints[a].lat().0.partial_cmp(&midpoints[b].lat().0).unwrap());
    } else {
        indices.sort_by(|&a, &b| midpoints[a].lng().0.partial_cmp(&midpoints[b].lng().0).unwrap());
    }

    let first_mid = midpoints[indices[0]];
    let last_mid = midpoints[*indices.last().unwrap()];
    if geodesy::distance_m(start, last_mid) < geodesy::distance_m(start, first_mid) {
        indices.reverse();
    }

    let reordered: Vec<SweepLine> = indices.into_iter().map(|i| lines[i].clone()).collect();
    lines.clone_from_slice(&reordered);
}

/// Attempt to synthesize a short in-polygon path between `tail` and `head`,
/// trying the polygon centroid first, then fraction-biased points along the
/// direct leg, then a ring of offsets around the centroid, then a bounded
/// two-candidate search. Also reused by [`crate::coverage`] when connecting
/// supplementary waypoints onto an existing route.
pub fn synthesize_bridge_for(
    tail: Point,
    head: Point,
    polygon: &Polygon,
    id: PolygonId,
    config: &PlannerConfig,
) -> Option<Vec<Point>> {
    let centroid = geodesy::centroid(polygon);

    if strict_inside(tail, centroid, polygon, id, config) && strict_inside(centroid, head, polygon, id, config) {
        return Some(vec![centroid]);
    }

    let mut candidates = Vec::new();
    for tenths in [1, 2, 3, 4] {
        let t = tenths as f64 / 5.0;
        let along = lerp(tail, head, t);
        for bias in [0.10, 0.20, 0.30] {
            candidates.push(bias_toward(along, centroid, bias));
        }
    }

    let leg_len = geodesy::distance_m(tail, head);
    for frac in [0.05, 0.10, 0.15] {
        let ring_dist = leg_len * frac;
        for bearing in [0.0, 90.0, 180.0, 270.0] {
            candidates.push(geodesy::offset(centroid, bearing, ring_dist));
        }
    }

    for candidate in &candidates {
        if strict_inside(tail, *candidate, polygon, id, config)
            && strict_inside(*candidate, head, polygon, id, config)
        {
            return Some(vec![*candidate]);
        }
    }

    let fanout = config.bridge_search_fanout;
    for a in candidates.iter().take(fanout) {
        for b in candidates.iter().take(fanout) {
            if strict_inside(tail, *a, polygon, id, config)
                && strict_inside(*a, *b, polygon, id, config)
                && strict_inside(*b, head, polygon, id, config)
            {
                return Some(vec![*a, *b]);
            }
        }
    }

    None
}

fn lerp(a: Point, b: Point, t: f64) -> Point {
    Point::new_unchecked(
        a.lat().0 + (b.lat().0 - a.lat().0) * t,
        a.lng().0 + (b.lng().0 - a.lng().0) * t,
    )
}

fn bias_toward(p: Point, target: Point, bias: f64) -> Point {
    Point::new_unchecked(
        p.lat().0 + (target.lat().0 - p.lat().0) * bias,
        p.lng().0 + (target.lng().0 - p.lng().0) * bias,
    )
}

/// Walk the accumulated route; for any leg that isn't strictly inside,
/// attempt one bridge insertion, and failing that drop the trailing
/// endpoint so the route never carries an exterior leg.
fn final_cleanup(points: Vec<Point>, polygon: &Polygon, id: PolygonId, config: &PlannerConfig) -> Vec<Point> {
    if points.is_empty() {
        return points;
    }

    let mut out = vec![points[0]];
    for &p in &points[1..] {
        let tail = *out.last().unwrap();
        if strict_inside(tail, p, polygon, id, config) {
            out.push(p);
            continue;
        }
        if let Some(bridge) = synthesize_bridge_for(tail, p, polygon, id, config) {
            let mut ok = true;
            let mut cursor = tail;
            for &b in &bridge {
                if !strict_inside(cursor, b, polygon, id, config) {
                    ok = false;
                    break;
                }
                cursor = b;
            }
            if ok && strict_inside(cursor, p, polygon, id, config) {
                out.extend(bridge);
                out.push(p);
                continue;
            }
        }
        tracing::error!("dropping inadmissible leg during final sequencing cleanup");
    }

    out
}

/// Resolve the sequencing anchor when the caller's start point lies outside
/// the polygon: try the centroid, then an interpolation from the nearest
/// boundary projection toward the centroid, then the centroid alone.
/// Governs ordering only — the external start point is never emitted.
pub fn resolve_exterior_start_anchor(start: Point, polygon: &Polygon) -> Point {
    let centroid = geodesy::centroid(polygon);
    if geodesy::point_in_polygon(start, polygon) {
        return start;
    }

    let nearest_boundary = nearest_boundary_projection(start, polygon);
    let candidate = lerp(nearest_boundary, centroid, 0.5);
    if geodesy::point_in_polygon(candidate, polygon) {
        return candidate;
    }

    centroid
}

fn nearest_boundary_projection(p: Point, polygon: &Polygon) -> Point {
    let mut best = polygon.vertices()[0];
    let mut best_dist = f64::INFINITY;
    for (a, b) in polygon.edges() {
        let candidate = closest_point_on_segment(p, a, b);
        let d = geodesy::distance_m(p, candidate);
        if d < best_dist {
            best_dist = d;
            best = candidate;
        }
    }
    best
}

fn closest_point_on_segment(p: Point, a: Point, b: Point) -> Point {
    let ax = a.lng().0;
    let ay = a.lat().0;
    let bx = b.lng().0;
    let by = b.lat().0;
    let px = p.lng().0;
    let py = p.lat().0;

    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;
    if len_sq < 1e-18 {
        return a;
    }

    let t = (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0);
    Point::new_unchecked(ay + dy * t, ax + dx * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points;

    #[test]
    fn exterior_start_falls_back_to_an_interior_anchor() -> anyhow::Result<()> {
        let square = Polygon::new(points![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)])?;
        let outside = crate::point!(5.0, 5.0);
        let anchor = resolve_exterior_start_anchor(outside, &square);
        assert!(geodesy::point_in_polygon(anchor, &square));
        Ok(())
    }

    #[test]
    fn interior_start_is_returned_unchanged() -> anyhow::Result<()> {
        let square = Polygon::new(points![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)])?;
        let inside = crate::point!(0.5, 0.5);
        let anchor = resolve_exterior_start_anchor(inside, &square);
        assert_eq!(anchor, inside);
        Ok(())
    }
}
