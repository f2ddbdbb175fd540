//! Process-wide memoization for the expensive operations in [`crate::geodesy`].
//!
//! Backed by [`dashmap`] concurrent hash maps so readers and writers never
//! fully block each other out. Each map has a size threshold; crossing it (or
//! letting [`PlannerConfig::cache_sweep_interval_secs`] elapse since the last
//! sweep) triggers a purge of maps larger than half the threshold.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::types::{PlannerConfig, Point, Polygon};

/// Stable content-derived identity for a polygon, computed once when it
/// enters the pipeline. An FNV-1a hash over vertex coordinates rounded to 9
/// decimal places (roughly 0.1 mm at the equator), so that two equal-valued
/// polygons hit the same cache entries, while a caller that mutates a
/// polygon in place is responsible for re-deriving the identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PolygonId(u64);

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

impl PolygonId {
    pub fn of(polygon: &Polygon) -> PolygonId {
        let mut hash = FNV_OFFSET_BASIS;
        for v in polygon.vertices() {
            for component in [v.lat().0, v.lng().0] {
                let rounded = (component * 1e9).round() as i64;
                for byte in rounded.to_le_bytes() {
                    hash ^= byte as u64;
                    hash = hash.wrapping_mul(FNV_PRIME);
                }
            }
        }
        PolygonId(hash)
    }
}

fn round_key(v: f64, decimals: i32) -> i64 {
    let scale = 10f64.powi(decimals);
    (v * scale).round() as i64
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct DistanceKey(i64, i64, i64, i64);

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct PointInPolygonKey(i64, i64, PolygonId);

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct LineIntersectionKey(i64, i64, i64, i64, PolygonId);

struct Caches {
    distance: DashMap<DistanceKey, f64>,
    point_in_polygon: DashMap<PointInPolygonKey, bool>,
    line_intersection: DashMap<LineIntersectionKey, Vec<Point>>,
    bounds: DashMap<PolygonId, (f64, f64, f64, f64)>,
    last_sweep: Mutex<Instant>,
}

impl Caches {
    fn new() -> Caches {
        Caches {
            distance: DashMap::new(),
            point_in_polygon: DashMap::new(),
            line_intersection: DashMap::new(),
            bounds: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    fn maybe_sweep(&self, config: &PlannerConfig) {
        let threshold = config.cache_size_threshold;
        let over_threshold = self.distance.len() > threshold
            || self.point_in_polygon.len() > threshold
            || self.line_intersection.len() > threshold
            || self.bounds.len() > threshold;

        let elapsed = {
            let mut last = self.last_sweep.lock().expect("cache sweep mutex poisoned");
            let elapsed = last.elapsed() >= Duration::from_secs(config.cache_sweep_interval_secs);
            if elapsed {
                *last = Instant::now();
            }
            elapsed
        };

        if over_threshold || elapsed {
            self.sweep(threshold);
        }
    }

    fn sweep(&self, threshold: usize) {
        let half = threshold / 2;
        if self.distance.len() > half {
            self.distance.clear();
        }
        if self.point_in_polygon.len() > half {
            self.point_in_polygon.clear();
        }
        if self.line_intersection.len() > half {
            self.line_intersection.clear();
        }
        if self.bounds.len() > half {
            self.bounds.clear();
        }
    }

    fn clear_all(&self) {
        self.distance.clear();
        self.point_in_polygon.clear();
        self.line_intersection.clear();
        self.bounds.clear();
    }
}

static CACHES: OnceLock<Caches> = OnceLock::new();

fn caches() -> &'static Caches {
    CACHES.get_or_init(Caches::new)
}

/// Cumulative count and total duration of planning calls, for a running
/// average available to callers through [`stats`].
struct Counters {
    count: AtomicU64,
    total_nanos: AtomicU64,
    guard: Mutex<()>,
}

static COUNTERS: OnceLock<Counters> = OnceLock::new();

fn counters() -> &'static Counters {
    COUNTERS.get_or_init(|| Counters {
        count: AtomicU64::new(0),
        total_nanos: AtomicU64::new(0),
        guard: Mutex::new(()),
    })
}

/// Record one planning call's wall-clock duration.
pub fn record_plan_duration(duration: Duration) {
    let counters = counters();
    let _guard = counters.guard.lock().expect("counters mutex poisoned");
    counters.count.fetch_add(1, Ordering::SeqCst);
    counters
        .total_nanos
        .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
}

/// `(call_count, average_duration)` across all planning calls recorded in
/// this process since the last [`reset`].
pub fn stats() -> (u64, Duration) {
    let counters = counters();
    let _guard = counters.guard.lock().expect("counters mutex poisoned");
    let count = counters.count.load(Ordering::SeqCst);
    let total = counters.total_nanos.load(Ordering::SeqCst);
    let avg = if count == 0 { Duration::ZERO } else { Duration::from_nanos(total / count) };
    (count, avg)
}

/// Clear every cache and reset the performance counters. Exposed for tests
/// (and any long-running host) to avoid cross-call bleed.
pub fn reset() {
    caches().clear_all();
    let counters = counters();
    let _guard = counters.guard.lock().expect("counters mutex poisoned");
    counters.count.store(0, Ordering::SeqCst);
    counters.total_nanos.store(0, Ordering::SeqCst);
}

pub fn distance_m(a: Point, b: Point, config: &PlannerConfig) -> f64 {
    let key = DistanceKey(
        round_key(a.lat().0, 8),
        round_key(a.lng().0, 8),
        round_key(b.lat().0, 8),
        round_key(b.lng().0, 8),
    );
    let c = caches();
    if let Some(v) = c.distance.get(&key) {
        return *v;
    }
    let value = crate::geodesy::distance_m(a, b);
    c.distance.insert(key, value);
    c.maybe_sweep(config);
    value
}

pub fn point_in_polygon(point: Point, polygon: &Polygon, id: PolygonId, config: &PlannerConfig) -> bool {
    let key = PointInPolygonKey(round_key(point.lat().0, 8), round_key(point.lng().0, 8), id);
    let c = caches();
    if let Some(v) = c.point_in_polygon.get(&key) {
        return *v;
    }
    let value = crate::geodesy::point_in_polygon(point, polygon);
    c.point_in_polygon.insert(key, value);
    c.maybe_sweep(config);
    value
}

pub fn line_polygon_intersections(
    line_start: Point,
    line_end: Point,
    polygon: &Polygon,
    id: PolygonId,
    config: &PlannerConfig,
) -> Vec<Point> {
    let key = LineIntersectionKey(
        round_key(line_start.lat().0, 6),
        round_key(line_start.lng().0, 6),
        round_key(line_end.lat().0, 6),
        round_key(line_end.lng().0, 6),
        id,
    );
    let c = caches();
    if let Some(v) = c.line_intersection.get(&key) {
        return v.clone();
    }
    let value = crate::geodesy::line_polygon_intersections(line_start, line_end, polygon);
    c.line_intersection.insert(key, value.clone());
    c.maybe_sweep(config);
    value
}

pub fn bounds(polygon: &Polygon, id: PolygonId, config: &PlannerConfig) -> (f64, f64, f64, f64) {
    let c = caches();
    if let Some(v) = c.bounds.get(&id) {
        return *v;
    }
    let value = crate::geodesy::bounds(polygon);
    c.bounds.insert(id, value);
    c.maybe_sweep(config);
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points;

    #[test]
    fn polygon_id_is_stable_for_equal_polygons() -> anyhow::Result<()> {
        let a = Polygon::new(points![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)])?;
        let b = Polygon::new(points![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)])?;
        assert_eq!(PolygonId::of(&a), PolygonId::of(&b));
        Ok(())
    }

    #[test]
    fn distance_cache_returns_consistent_value() -> anyhow::Result<()> {
        reset();
        let config = PlannerConfig::default();
        let a = crate::point!(0.0, 0.0);
        let b = crate::point!(1.0, 1.0);
        let d1 = distance_m(a, b, &config);
        let d2 = distance_m(a, b, &config);
        assert_eq!(d1, d2);
        Ok(())
    }

    #[test]
    fn reset_clears_counters() {
        record_plan_duration(Duration::from_millis(5));
        reset();
        let (count, avg) = stats();
        assert_eq!(count, 0);
        assert_eq!(avg, Duration::ZERO);
    }
}
