//! Tilt-compensated magnetic heading, smoothed through a circular 1-D
//! Kalman filter.

use crate::types::Vec3;
use log::debug;
use std::f64::consts::PI;

/// Wraps an angle into (-pi, pi].
pub fn wrap_angle(mut angle: f64) -> f64 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle <= -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Tilt-compensated raw heading from an accelerometer/magnetometer pair.
/// The formula is preserved exactly as specified for behavioral
/// equivalence; do not "simplify" the signs.
pub fn tilt_compensated_heading(acc: Vec3, mag: Vec3) -> Option<f64> {
    let norm = acc.length();
    if norm == 0.0 {
        return None;
    }
    let a = Vec3::new(acc.x / norm, acc.y / norm, acc.z / norm);

    let pitch = (-a.y).asin();
    let roll = a.x.atan2(a.z);

    let mx = mag.x * pitch.cos() + mag.z * pitch.sin();
    let my = mag.x * roll.sin() * pitch.sin() + mag.y * roll.cos() - mag.z * roll.sin() * pitch.cos();

    Some((-my).atan2(mx))
}

/// One-dimensional circular Kalman filter over a heading estimate.
pub struct HeadingFilter {
    q: f64,
    r: f64,
    x: f64,
    p: f64,
}

impl HeadingFilter {
    pub fn new(q: f64, r: f64) -> Self {
        HeadingFilter { q, r, x: 0.0, p: 1.0 }
    }

    pub fn heading(&self) -> f64 {
        self.x
    }

    /// Folds one raw heading measurement into the filter, returning the
    /// updated (wrapped) estimate.
    pub fn update(&mut self, z: f64) -> f64 {
        self.p += self.q;

        let mut d = z - self.x;
        d = wrap_angle(d);

        let k = self.p / (self.p + self.r);
        self.x = wrap_angle(self.x + k * d);
        self.p *= 1.0 - k;

        debug!("heading updated: x={:.4} p={:.4}", self.x, self.p);
        self.x
    }
}

/// Consumes the latest accelerometer and magnetometer samples seen by the
/// engine, recomputing heading whenever either arrives (once both have been
/// observed at least once).
pub struct HeadingEstimator {
    filter: HeadingFilter,
    last_accel: Option<Vec3>,
    last_mag: Option<Vec3>,
}

impl HeadingEstimator {
    pub fn new(q: f64, r: f64) -> Self {
        HeadingEstimator {
            filter: HeadingFilter::new(q, r),
            last_accel: None,
            last_mag: None,
        }
    }

    pub fn heading(&self) -> f64 {
        self.filter.heading()
    }

    pub fn on_accelerometer(&mut self, sample: Vec3) -> Option<f64> {
        self.last_accel = Some(sample);
        self.recompute()
    }

    pub fn on_magnetometer(&mut self, sample: Vec3) -> Option<f64> {
        self.last_mag = Some(sample);
        self.recompute()
    }

    fn recompute(&mut self) -> Option<f64> {
        let acc = self.last_accel?;
        let mag = self.last_mag?;
        let raw = tilt_compensated_heading(acc, mag)?;
        Some(self.filter.update(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn tilt_compensation_flat_device_north() {
        // device held flat, acc points straight down (+z), mag points north (+x)
        let heading = tilt_compensated_heading(Vec3::new(0.0, 0.0, 9.8), Vec3::new(10.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(heading, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_acceleration_skips_update() {
        assert!(tilt_compensated_heading(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn kalman_wraps_output_into_range() {
        let mut filter = HeadingFilter::new(0.01, 0.10);
        for z in [3.10, -3.10, 3.13] {
            let x = filter.update(z);
            assert!(x > -PI && x <= PI);
        }
    }

    #[test]
    fn kalman_crosses_the_short_way_across_pi() {
        let mut filter = HeadingFilter::new(0.01, 0.10);
        let mut prev = filter.heading();
        let mut max_delta: f64 = 0.0;
        for z in [3.10, -3.10, 3.13] {
            let x = filter.update(z);
            let mut delta = x - prev;
            delta = wrap_angle(delta);
            max_delta = max_delta.max(delta.abs());
            prev = x;
        }
        assert!(max_delta < PI + 1e-6);
    }

    #[test]
    fn estimator_waits_for_both_samples() {
        let mut est = HeadingEstimator::new(0.01, 0.10);
        assert!(est.on_accelerometer(Vec3::new(0.0, 0.0, 9.8)).is_none());
        assert!(est.on_magnetometer(Vec3::new(10.0, 0.0, 0.0)).is_some());
    }

    #[test]
    fn wrap_angle_handles_boundary() {
        assert_relative_eq!(wrap_angle(PI), PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(-PI), PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(3.0 * PI), PI, epsilon = 1e-9);
    }
}
