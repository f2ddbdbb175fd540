//! Pure-Rust geodesic primitives: Haversine distance with a planar
//! small-angle fallback, bearing, destination-point offset, point-in-polygon,
//! segment intersection, and polygon area/centroid/bounds.
//!
//! These are plain functions over `Point`/`Polygon`, with no cross-thread
//! state; the process-wide memoization of the expensive ones lives in
//! [`crate::cache`].

use crate::types::{Point, Polygon};

/// Mean radius of the Earth in meters, matching the WGS-84 convention used
/// throughout this crate.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

const SMALL_ANGLE_THRESHOLD_DEG: f64 = 1e-4;

/// Great-circle distance between two points, in meters.
///
/// Uses the Haversine formula. When both coordinate deltas are tiny
/// (`< 1e-4` degrees), a planar approximation at the mean latitude is used
/// instead since it's cheaper and accurate to well under 1% in that regime.
pub fn distance_m(a: Point, b: Point) -> f64 {
    let dlat = (b.lat().0 - a.lat().0).abs();
    let dlng = (b.lng().0 - a.lng().0).abs();
    if dlat < SMALL_ANGLE_THRESHOLD_DEG && dlng < SMALL_ANGLE_THRESHOLD_DEG {
        return planar_distance_m(a, b);
    }
    haversine_distance_m(a, b)
}

fn haversine_distance_m(a: Point, b: Point) -> f64 {
    let lat1 = a.lat().to_radians();
    let lat2 = b.lat().to_radians();
    let dlat = lat2 - lat1;
    let dlng = b.lng().to_radians() - a.lng().to_radians();

    let sin_dlat2 = (dlat / 2.0).sin();
    let sin_dlng2 = (dlng / 2.0).sin();
    let h = sin_dlat2 * sin_dlat2 + lat1.cos() * lat2.cos() * sin_dlng2 * sin_dlng2;
    let c = 2.0 * h.sqrt().clamp(-1.0, 1.0).asin();
    EARTH_RADIUS_M * c
}

fn planar_distance_m(a: Point, b: Point) -> f64 {
    let mean_lat_rad = ((a.lat().0 + b.lat().0) / 2.0).to_radians();
    let dlat = b.lat().0 - a.lat().0;
    let dlng = b.lng().0 - a.lng().0;
    let x = dlng * mean_lat_rad.cos();
    let y = dlat;
    (x * x + y * y).sqrt() * std::f64::consts::PI / 180.0 * EARTH_RADIUS_M
}

/// Initial compass bearing from `a` to `b`, in degrees `[0, 360)`.
pub fn bearing_deg(a: Point, b: Point) -> f64 {
    let lat1 = a.lat().to_radians();
    let lat2 = b.lat().to_radians();
    let dlng = b.lng().to_radians() - a.lng().to_radians();

    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// Destination point reached from `origin` traveling `distance_m` along
/// `bearing_deg`.
pub fn offset(origin: Point, bearing_deg: f64, distance_m: f64) -> Point {
    let ang_dist = distance_m / EARTH_RADIUS_M;
    let bearing = bearing_deg.to_radians();
    let lat1 = origin.lat().to_radians();
    let lng1 = origin.lng().to_radians();

    let lat2 = (lat1.sin() * ang_dist.cos() + lat1.cos() * ang_dist.sin() * bearing.cos()).asin();
    let lng2 = lng1
        + (bearing.sin() * ang_dist.sin() * lat1.cos())
            .atan2(ang_dist.cos() - lat1.sin() * lat2.sin());

    Point::new_unchecked(lat2.to_degrees(), wrap_lng_deg(lng2.to_degrees()))
}

fn wrap_lng_deg(lng: f64) -> f64 {
    let wrapped = (lng + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 { 180.0 } else { wrapped }
}

/// Axis-aligned bounding box of a polygon, `(min_lat, min_lng, max_lat, max_lng)`.
pub fn bounds(polygon: &Polygon) -> (f64, f64, f64, f64) {
    let mut min_lat = f64::INFINITY;
    let mut min_lng = f64::INFINITY;
    let mut max_lat = f64::NEG_INFINITY;
    let mut max_lng = f64::NEG_INFINITY;
    for v in polygon.vertices() {
        min_lat = min_lat.min(v.lat().0);
        min_lng = min_lng.min(v.lng().0);
        max_lat = max_lat.max(v.lat().0);
        max_lng = max_lng.max(v.lng().0);
    }
    (min_lat, min_lng, max_lat, max_lng)
}

/// Maximum extent of the polygon's bounding box diagonal, in meters.
pub fn max_extent_m(polygon: &Polygon) -> f64 {
    let (min_lat, min_lng, max_lat, max_lng) = bounds(polygon);
    let corner_a = Point::new_unchecked(min_lat, min_lng);
    let corner_b = Point::new_unchecked(max_lat, max_lng);
    distance_m(corner_a, corner_b)
}

/// True if `point` lies strictly inside `polygon`, using a horizontal
/// ray-cast test in longitude at the point's latitude.
///
/// Horizontal edges are skipped; each edge's latitude span is tested
/// half-open (`[min, max)`) so that a ray passing exactly through a vertex is
/// only counted once.
pub fn point_in_polygon(point: Point, polygon: &Polygon) -> bool {
    let py = point.lat().0;
    let px = point.lng().0;
    let mut inside = false;

    for (a, b) in polygon.edges() {
        let (ay, ax) = (a.lat().0, a.lng().0);
        let (by, bx) = (b.lat().0, b.lng().0);

        if (ay - by).abs() < 1e-10 {
            continue;
        }

        let (lo, hi) = if ay < by { (ay, by) } else { (by, ay) };
        if py < lo || py >= hi {
            continue;
        }

        let crossing_x = ax + (py - ay) / (by - ay) * (bx - ax);
        if crossing_x > px {
            inside = !inside;
        }
    }

    inside
}

/// Classification of how two segments relate, used by [`segment_intersection`].
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Intersection {
    None,
    Point(Point),
    /// The segments are collinear and overlap; endpoints of the overlap.
    Collinear(Point, Point),
}

fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

fn on_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> bool {
    let (min_x, max_x) = if a.0 < b.0 { (a.0, b.0) } else { (b.0, a.0) };
    let (min_y, max_y) = if a.1 < b.1 { (a.1, b.1) } else { (b.1, a.1) };
    p.0 >= min_x - 1e-12 && p.0 <= max_x + 1e-12 && p.1 >= min_y - 1e-12 && p.1 <= max_y + 1e-12
}

/// Intersection of two segments `(p1, p2)` and `(p3, p4)`, using the sign of
/// four cross products plus an explicit collinear-on-segment fallback.
pub fn segment_intersection(p1: Point, p2: Point, p3: Point, p4: Point) -> Intersection {
    let a = (p1.lng().0, p1.lat().0);
    let b = (p2.lng().0, p2.lat().0);
    let c = (p3.lng().0, p3.lat().0);
    let d = (p4.lng().0, p4.lat().0);

    let d1 = cross(c, d, a);
    let d2 = cross(c, d, b);
    let d3 = cross(a, b, c);
    let d4 = cross(a, b, d);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        let denom = (a.0 - b.0) * (c.1 - d.1) - (a.1 - b.1) * (c.0 - d.0);
        if denom.abs() < 1e-15 {
            return Intersection::None;
        }
        let t = ((a.0 - c.0) * (c.1 - d.1) - (a.1 - c.1) * (c.0 - d.0)) / denom;
        let x = a.0 + t * (b.0 - a.0);
        let y = a.1 + t * (b.1 - a.1);
        return Intersection::Point(Point::new_unchecked(y, x));
    }

    if d1.abs() < 1e-12 && d2.abs() < 1e-12 {
        return collinear_overlap(a, b, c, d);
    }

    if d1.abs() < 1e-12 && on_segment(a, c, d) {
        return Intersection::Point(p1);
    }
    if d2.abs() < 1e-12 && on_segment(b, c, d) {
        return Intersection::Point(p2);
    }
    if d3.abs() < 1e-12 && on_segment(c, a, b) {
        return Intersection::Point(p3);
    }
    if d4.abs() < 1e-12 && on_segment(d, a, b) {
        return Intersection::Point(p4);
    }

    Intersection::None
}

/// Overlap of two segments already known to lie on the same line: both
/// endpoints of `(c, d)` fall on the line through `(a, b)`. Projects onto
/// `a -> b`'s own axis to find the overlapping span, which may collapse to a
/// single touching point or be empty if the spans don't actually overlap.
fn collinear_overlap(a: (f64, f64), b: (f64, f64), c: (f64, f64), d: (f64, f64)) -> Intersection {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let len2 = dx * dx + dy * dy;
    if len2 < 1e-20 {
        return Intersection::None;
    }

    let axis = |p: (f64, f64)| -> f64 { (p.0 - a.0) * dx + (p.1 - a.1) * dy };
    let (lo_ab, hi_ab) = (0.0, len2);
    let (ta, tb) = (axis(c), axis(d));
    let (lo_cd, hi_cd) = if ta < tb { (ta, tb) } else { (tb, ta) };

    let lo = lo_ab.max(lo_cd);
    let hi = hi_ab.min(hi_cd);
    if lo > hi + 1e-12 {
        return Intersection::None;
    }

    let point_at = |t: f64| -> Point {
        let frac = t / len2;
        Point::new_unchecked(a.1 + frac * dy, a.0 + frac * dx)
    };
    let p_lo = point_at(lo);
    if (hi - lo).abs() < 1e-12 {
        return Intersection::Point(p_lo);
    }
    Intersection::Collinear(p_lo, point_at(hi))
}

/// All crossing points of an (infinite-length-simulated) line segment
/// `(line_start, line_end)` with `polygon`'s edges, deduplicated to 8 decimal
/// places and sorted along the segment's own direction. A sweep line running
/// along a polygon edge reports both endpoints of the collinear overlap.
pub fn line_polygon_intersections(line_start: Point, line_end: Point, polygon: &Polygon) -> Vec<Point> {
    let mut hits: Vec<Point> = Vec::new();

    for (a, b) in polygon.edges() {
        match segment_intersection(line_start, line_end, a, b) {
            Intersection::Point(p) => hits.push(p),
            Intersection::Collinear(p, q) => {
                hits.push(p);
                hits.push(q);
            }
            Intersection::None => {}
        }
    }

    hits.sort_by(|p, q| {
        let dp = distance_along(line_start, line_end, *p);
        let dq = distance_along(line_start, line_end, *q);
        dp.partial_cmp(&dq).unwrap_or(std::cmp::Ordering::Equal)
    });

    dedup_by_key8(hits)
}

fn distance_along(start: Point, end: Point, p: Point) -> f64 {
    let total = (end.lng().0 - start.lng().0, end.lat().0 - start.lat().0);
    let v = (p.lng().0 - start.lng().0, p.lat().0 - start.lat().0);
    total.0 * v.0 + total.1 * v.1
}

fn dedup_by_key8(points: Vec<Point>) -> Vec<Point> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(points.len());
    for p in points {
        let key = (
            format!("{:.8}", p.lat().0),
            format!("{:.8}", p.lng().0),
        );
        if seen.insert(key) {
            out.push(p);
        }
    }
    out
}

/// Unweighted mean of a polygon's vertex coordinates; used for bridge-point
/// guidance rather than a strict geometric centroid.
pub fn centroid(polygon: &Polygon) -> Point {
    let n = polygon.len() as f64;
    let (sum_lat, sum_lng) = polygon
        .vertices()
        .iter()
        .fold((0.0, 0.0), |(sa, so), v| (sa + v.lat().0, so + v.lng().0));
    Point::new_unchecked(sum_lat / n, sum_lng / n)
}

/// Signed area of the polygon in square meters, positive for counter-clockwise
/// winding, via the shoelace formula over a local equirectangular projection
/// anchored at the polygon's mean latitude.
pub fn signed_area_m2(polygon: &Polygon) -> f64 {
    let mean_lat_rad = polygon
        .vertices()
        .iter()
        .map(|v| v.lat().0)
        .sum::<f64>()
        .to_radians()
        / polygon.len() as f64;
    let cos_lat = mean_lat_rad.cos();

    let xy: Vec<(f64, f64)> = polygon
        .vertices()
        .iter()
        .map(|v| {
            let x = v.lng().0.to_radians() * cos_lat * EARTH_RADIUS_M;
            let y = v.lat().0.to_radians() * EARTH_RADIUS_M;
            (x, y)
        })
        .collect();

    let n = xy.len();
    let mut sum = 0.0;
    for i in 0..n {
        let (x0, y0) = xy[i];
        let (x1, y1) = xy[(i + 1) % n];
        sum += x0 * y1 - x1 * y0;
    }
    sum / 2.0
}

/// Unsigned polygon area in square meters.
pub fn area_m2(polygon: &Polygon) -> f64 {
    signed_area_m2(polygon).abs()
}

/// `true` if the polygon's vertices wind counter-clockwise.
pub fn is_ccw(polygon: &Polygon) -> bool {
    signed_area_m2(polygon) > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points;

    #[test]
    fn distance_matches_known_value() -> anyhow::Result<()> {
        // Roughly 111.2 km per degree of latitude near the equator.
        let a = crate::point!(0.0, 0.0);
        let b = crate::point!(1.0, 0.0);
        let d = distance_m(a, b);
        assert!((d - 111_195.0).abs() < 200.0, "got {d}");
        Ok(())
    }

    #[test]
    fn small_angle_and_haversine_agree_closely() -> anyhow::Result<()> {
        let a = crate::point!(40.0, -74.0);
        let b = crate::point!(40.00005, -74.00003);
        let small = planar_distance_m(a, b);
        let full = haversine_distance_m(a, b);
        assert!((small - full).abs() < 0.1, "small={small} full={full}");
        Ok(())
    }

    #[test]
    fn offset_and_bearing_are_inverse_ish() -> anyhow::Result<()> {
        let origin = crate::point!(10.0, 10.0);
        let dest = offset(origin, 45.0, 1000.0);
        let back_bearing = bearing_deg(origin, dest);
        assert!((back_bearing - 45.0).abs() < 1.0);
        let d = distance_m(origin, dest);
        assert!((d - 1000.0).abs() < 1.0);
        Ok(())
    }

    #[test]
    fn point_in_polygon_unit_square() -> anyhow::Result<()> {
        let square = Polygon::new(points![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)])?;
        assert!(point_in_polygon(crate::point!(0.5, 0.5), &square));
        assert!(!point_in_polygon(crate::point!(2.0, 2.0), &square));
        Ok(())
    }

    #[test]
    fn segment_intersection_crossing() -> anyhow::Result<()> {
        let p1 = crate::point!(0.0, 0.0);
        let p2 = crate::point!(1.0, 1.0);
        let p3 = crate::point!(0.0, 1.0);
        let p4 = crate::point!(1.0, 0.0);
        match segment_intersection(p1, p2, p3, p4) {
            Intersection::Point(p) => {
                assert!((p.lat().0 - 0.5).abs() < 1e-9);
                assert!((p.lng().0 - 0.5).abs() < 1e-9);
            }
            other => panic!("expected intersection point, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn segment_intersection_collinear_overlap() -> anyhow::Result<()> {
        let p1 = crate::point!(0.0, 0.0);
        let p2 = crate::point!(0.0, 2.0);
        let p3 = crate::point!(0.0, 1.0);
        let p4 = crate::point!(0.0, 3.0);
        match segment_intersection(p1, p2, p3, p4) {
            Intersection::Collinear(a, b) => {
                let lngs = [a.lng().0, b.lng().0];
                assert!(lngs.contains(&1.0) && lngs.contains(&2.0));
            }
            other => panic!("expected collinear overlap, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn shoelace_area_of_unit_square_is_positive_for_ccw() -> anyhow::Result<()> {
        let square = Polygon::new(points![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)])?;
        assert!(is_ccw(&square));
        assert!(area_m2(&square) > 0.0);
        Ok(())
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod proptests {
    use quickcheck::Arbitrary;
    use quickcheck_macros::quickcheck;

    use super::*;

    #[derive(Clone, Copy, Debug)]
    struct ArbPoint(Point);

    impl Arbitrary for ArbPoint {
        fn arbitrary(_g: &mut quickcheck::Gen) -> Self {
            let lat = rand::random_range(-89.0..=89.0);
            let lng = rand::random_range(-179.0..=179.0);
            ArbPoint(Point::new_unchecked(lat, lng))
        }
    }

    #[quickcheck]
    fn distance_is_symmetric(a: ArbPoint, b: ArbPoint) -> bool {
        (distance_m(a.0, b.0) - distance_m(b.0, a.0)).abs() < 1e-6
    }

    #[quickcheck]
    fn distance_satisfies_triangle_inequality(a: ArbPoint, b: ArbPoint, c: ArbPoint) -> bool {
        let ab = distance_m(a.0, b.0);
        let bc = distance_m(b.0, c.0);
        let ac = distance_m(a.0, c.0);
        // Slack accounts for the small-angle planar approximation's
        // documented <1% deviation from the full Haversine formula.
        ac <= ab + bc + 1.0 + 0.02 * (ab + bc)
    }
}
