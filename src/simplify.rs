//! Component O: collapses runs of near-collinear waypoints on a single
//! sweep leg while preserving true turn points.

use crate::geodesy;
use crate::types::Point;

const ANGLE_TOLERANCE_DEG: f64 = 2.0;
const TURN_THRESHOLD_DEG: f64 = 5.0 * ANGLE_TOLERANCE_DEG;
const LONG_LEG_FACTOR: f64 = 3.0;
const MAX_DEVIATION_M: f64 = 3.0;

/// Simplify a waypoint sequence, keeping every true turn point and the first
/// and last points, and dropping interior points on a straight run unless
/// their perpendicular deviation from the run's chord exceeds 3 m.
pub fn simplify(waypoints: &[Point]) -> Vec<Point> {
    if waypoints.len() <= 2 {
        return waypoints.to_vec();
    }

    let bearings: Vec<f64> = (0..waypoints.len() - 1)
        .map(|i| geodesy::bearing_deg(waypoints[i], waypoints[i + 1]))
        .collect();
    let leg_lengths: Vec<f64> = (0..waypoints.len() - 1)
        .map(|i| geodesy::distance_m(waypoints[i], waypoints[i + 1]))
        .collect();

    let mut out = vec![waypoints[0]];
    let mut segment_start_idx = 0usize;

    for i in 1..waypoints.len() - 1 {
        let b1 = bearings[i - 1];
        let b2 = bearings[i];
        let diff = angular_difference(b1, b2);

        let prev_leg = leg_lengths[i - 1];
        let next_leg = leg_lengths.get(i).copied().unwrap_or(prev_leg);
        let neighbor_avg = (prev_leg + next_leg) / 2.0;
        let is_long_leg = prev_leg > LONG_LEG_FACTOR * neighbor_avg;

        let is_turn = diff > TURN_THRESHOLD_DEG || is_long_leg;

        if is_turn {
            out.push(waypoints[i]);
            segment_start_idx = i;
            continue;
        }

        let deviation = perpendicular_deviation_m(waypoints[segment_start_idx], waypoints[i], waypoints[i - 1]);
        if deviation > MAX_DEVIATION_M {
            out.push(waypoints[i - 1]);
            segment_start_idx = i - 1;
        }
    }

    out.push(waypoints[waypoints.len() - 1]);
    out
}

fn angular_difference(a: f64, b: f64) -> f64 {
    let diff = (b - a).abs();
    diff.min(360.0 - diff)
}

/// Perpendicular distance in meters from `p` to the chord `start -> end`,
/// computed in a local planar projection anchored at `start`.
fn perpendicular_deviation_m(start: Point, end: Point, p: Point) -> f64 {
    let mean_lat_rad = start.lat().to_radians();
    let to_xy = |pt: Point| -> (f64, f64) {
        let x = (pt.lng().0 - start.lng().0).to_radians() * mean_lat_rad.cos() * geodesy::EARTH_RADIUS_M;
        let y = (pt.lat().0 - start.lat().0).to_radians() * geodesy::EARTH_RADIUS_M;
        (x, y)
    };

    let (ex, ey) = to_xy(end);
    let (px, py) = to_xy(p);

    let len = (ex * ex + ey * ey).sqrt();
    if len < 1e-9 {
        return (px * px + py * py).sqrt();
    }

    ((ex * py - ey * px) / len).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collinear_interior_points_are_removed() {
        let waypoints = vec![
            Point::new_unchecked(0.0, 0.0),
            Point::new_unchecked(0.0001, 0.0),
            Point::new_unchecked(0.0002, 0.0),
            Point::new_unchecked(0.0003, 0.0),
        ];
        let simplified = simplify(&waypoints);
        assert_eq!(simplified.len(), 2);
        assert_eq!(simplified[0], waypoints[0]);
        assert_eq!(simplified[1], waypoints[3]);
    }

    #[test]
    fn sharp_turn_is_preserved() {
        let waypoints = vec![
            Point::new_unchecked(0.0, 0.0),
            Point::new_unchecked(0.0001, 0.0),
            Point::new_unchecked(0.0001, 0.0001),
            Point::new_unchecked(0.0001, 0.0002),
        ];
        let simplified = simplify(&waypoints);
        assert!(simplified.len() >= 3, "expected the corner to survive, got {:?}", simplified);
    }

    #[test]
    fn is_idempotent() {
        let waypoints = vec![
            Point::new_unchecked(0.0, 0.0),
            Point::new_unchecked(0.0001, 0.00002),
            Point::new_unchecked(0.0002, 0.0),
            Point::new_unchecked(0.0003, 0.0),
            Point::new_unchecked(0.0003, 0.0005),
        ];
        let once = simplify(&waypoints);
        let twice = simplify(&once);
        assert_eq!(once.len(), twice.len());
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod proptests {
    use quickcheck::Arbitrary;
    use quickcheck_macros::quickcheck;

    use super::*;

    #[derive(Clone, Debug)]
    struct ArbRoute(Vec<Point>);

    impl Arbitrary for ArbRoute {
        fn arbitrary(_g: &mut quickcheck::Gen) -> Self {
            let n = rand::random_range(3..=12usize);
            let mut waypoints = vec![Point::new_unchecked(0.0, 0.0)];
            for _ in 1..n {
                let bearing = rand::random_range(0.0..360.0);
                let dist = rand::random_range(1.0..50.0);
                let prev = *waypoints.last().unwrap();
                waypoints.push(geodesy::offset(prev, bearing, dist));
            }
            ArbRoute(waypoints)
        }
    }

    #[quickcheck]
    fn simplify_is_idempotent(route: ArbRoute) -> bool {
        let once = simplify(&route.0);
        let twice = simplify(&once);
        once.len() == twice.len()
    }
}
