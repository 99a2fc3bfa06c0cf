//! Sensor ingress: low-pass filtering and latest-value broadcast for raw
//! accelerometer/magnetometer/gyroscope samples, ahead of the step detector
//! and heading estimator.

use crate::observer::Subject;
use crate::types::Vec3;
use log::{trace, warn};

/// First-order IIR low-pass filter, `y[n] = (1-alpha)*y[n-1] + alpha*x[n]`.
/// The first sample bootstraps the filter rather than starting from zero.
struct LowPassFilter {
    alpha: f64,
    last_output: Vec3,
    initialized: bool,
}

impl LowPassFilter {
    fn new(alpha: f64) -> Self {
        LowPassFilter {
            alpha,
            last_output: Vec3::ZERO,
            initialized: false,
        }
    }

    fn update(&mut self, input: Vec3) -> Vec3 {
        if !self.initialized {
            self.last_output = input;
            self.initialized = true;
            return input;
        }
        self.last_output = self.last_output.scale(1.0 - self.alpha).add(input.scale(self.alpha));
        self.last_output
    }

    fn reset(&mut self) {
        self.initialized = false;
        self.last_output = Vec3::ZERO;
    }
}

/// Front door for raw sensor samples. Accelerometer is low-pass filtered;
/// magnetometer is forwarded unchanged; gyroscope is accepted but otherwise
/// unused by the core. Each stream is a [`Subject`] so late subscribers
/// immediately observe the latest sample.
pub struct SensorIngress {
    filter: LowPassFilter,
    pub accelerometer: Subject<Vec3>,
    pub magnetometer: Subject<Vec3>,
    pub gyroscope: Subject<Vec3>,
}

impl SensorIngress {
    pub fn new(alpha: f64) -> Self {
        SensorIngress {
            filter: LowPassFilter::new(alpha),
            accelerometer: Subject::new(),
            magnetometer: Subject::new(),
            gyroscope: Subject::new(),
        }
    }

    pub fn ingest_accelerometer(&mut self, sample: Vec3) {
        if !sample.is_finite() {
            warn!("dropping non-finite accelerometer sample");
            return;
        }
        let filtered = self.filter.update(sample);
        trace!("accel filtered: {:?}", filtered);
        self.accelerometer.publish(filtered);
    }

    pub fn ingest_magnetometer(&mut self, sample: Vec3) {
        if !sample.is_finite() {
            warn!("dropping non-finite magnetometer sample");
            return;
        }
        self.magnetometer.publish(sample);
    }

    pub fn ingest_gyroscope(&mut self, sample: Vec3) {
        if !sample.is_finite() {
            warn!("dropping non-finite gyroscope sample");
            return;
        }
        self.gyroscope.publish(sample);
    }

    /// Clears filter state and cached latest values so a subsequent start
    /// begins from the next sample, per the ingress contract.
    pub fn stop(&mut self) {
        self.filter.reset();
        self.accelerometer.clear_latest();
        self.magnetometer.clear_latest();
        self.gyroscope.clear_latest();
    }
}
