//! Pure pinhole-camera formulas relating ground sample distance, flight
//! altitude, sensor geometry, and footprint dimensions. These do not touch
//! planner state; they exist so a caller can turn a desired GSD into the
//! `flight_height_m`/`photo_width_m`/`photo_length_m` inputs `SweepParams`
//! needs.

/// Ground sample distance in centimeters per pixel, for a camera at the
/// given altitude.
pub fn gsd_from_altitude(altitude_m: f64, sensor_width_mm: f64, focal_length_mm: f64, image_width_px: u32) -> f64 {
    (altitude_m * sensor_width_mm * 100.0) / (focal_length_mm * image_width_px as f64)
}

/// Altitude above ground level needed to achieve the given GSD.
pub fn altitude_from_gsd(gsd_cm_per_px: f64, sensor_width_mm: f64, focal_length_mm: f64, image_width_px: u32) -> f64 {
    (gsd_cm_per_px * focal_length_mm * image_width_px as f64) / (sensor_width_mm * 100.0)
}

/// Ground footprint `(width_m, length_m)` of a single photo at the given
/// altitude.
pub fn footprint_from_altitude(
    altitude_m: f64,
    sensor_width_mm: f64,
    sensor_height_mm: f64,
    focal_length_mm: f64,
) -> (f64, f64) {
    let width_m = (altitude_m * sensor_width_mm) / focal_length_mm;
    let length_m = (altitude_m * sensor_height_mm) / focal_length_mm;
    (width_m, length_m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn altitude_and_gsd_are_inverse() {
        let altitude = 100.0;
        let gsd = gsd_from_altitude(altitude, 13.2, 8.8, 5472);
        let recovered = altitude_from_gsd(gsd, 13.2, 8.8, 5472);
        assert_relative_eq!(altitude, recovered, epsilon = 1e-9);
    }

    #[test]
    fn footprint_scales_linearly_with_altitude() {
        let (w1, l1) = footprint_from_altitude(50.0, 13.2, 8.8, 8.8);
        let (w2, l2) = footprint_from_altitude(100.0, 13.2, 8.8, 8.8);
        assert_relative_eq!(w2, w1 * 2.0, epsilon = 1e-9);
        assert_relative_eq!(l2, l1 * 2.0, epsilon = 1e-9);
    }
}
