/// Converts an image-space stage point into the pan/tilt angles the lamp
/// should point at, given the lamp's fixed origin.
///
/// The image y-axis grows downward while the stage's front-left origin
/// grows upward, so the caller is expected to have already flipped y (the
/// lamp loop does this before calling in: `yt = stage_height_m - p.y`).
pub fn compute_pan_tilt(target: (f64, f64, f64), origin: (f64, f64, f64)) -> (f64, f64) {
    let (dx, dy, dz) = (
        target.0 - origin.0,
        target.1 - origin.1,
        target.2 - origin.2,
    );
    let d = (dx * dx + dy * dy + dz * dz).sqrt();

    let pan_deg = dy.atan2(dx).to_degrees();
    let tilt_deg = (dz / d).asin().to_degrees();

    (pan_deg, tilt_deg)
}

/// `round((theta + theta_max/2) / theta_max * 255)` clamped to `[0, 255]`.
pub fn angle_to_dmx(theta_deg: f64, theta_max_deg: f64) -> u8 {
    let normalized = (theta_deg + theta_max_deg / 2.0) / theta_max_deg * 255.0;
    normalized.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_to_dmx_is_bounded_across_the_full_range() {
        let theta_max = 540.0;
        let mut theta = -theta_max / 2.0;
        while theta <= theta_max / 2.0 {
            let dmx = angle_to_dmx(theta, theta_max);
            assert!((0..=255).contains(&(dmx as i32)));
            theta += 17.0;
        }
    }

    #[test]
    fn angle_to_dmx_extremes_map_to_0_and_255() {
        assert_eq!(angle_to_dmx(-270.0, 540.0), 0);
        assert_eq!(angle_to_dmx(270.0, 540.0), 255);
        assert_eq!(angle_to_dmx(0.0, 540.0), 128);
    }

    #[test]
    fn s6_scenario_matches_the_specified_exact_dmx_values() {
        let origin = (0.0, 0.0, 5.0);
        let target = (1.0, -3.0, 0.0);

        let (pan_deg, tilt_deg) = compute_pan_tilt(target, origin);
        let pan_dmx = angle_to_dmx(pan_deg, 540.0);
        let tilt_dmx = angle_to_dmx(tilt_deg + 90.0, 270.0);

        assert_eq!(pan_dmx, 94);
        assert_eq!(tilt_dmx, 158);
    }
}
