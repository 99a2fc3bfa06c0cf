//! Tunable constants for every subsystem, collected into one struct so a
//! host can override them (config file, CLI flags) without touching code.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Low-pass filter coefficient applied to accelerometer samples.
    pub ingress_alpha: f64,

    /// Step detector peak threshold, m/s^2.
    pub step_threshold: f64,
    /// Minimum milliseconds between two registered steps.
    pub step_min_interval_ms: i64,

    /// Heading Kalman filter process noise.
    pub heading_q: f64,
    /// Heading Kalman filter measurement noise.
    pub heading_r: f64,

    /// Fixed stride length, meters.
    pub stride_length_m: f64,

    /// Inactivity auto-finalize timeout, milliseconds.
    pub inactivity_timeout_ms: i64,

    /// Distance threshold for snap/split to consider an edge "close enough".
    pub snap_threshold_m: f64,
    /// Distance threshold for nearest-node lookup in findPath.
    pub node_snap_threshold_m: f64,
    /// Minimum total polyline length for a recording buffer to finalize.
    pub min_finalize_length_m: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            ingress_alpha: 0.10,
            step_threshold: 11.0,
            step_min_interval_ms: 300,
            heading_q: 0.01,
            heading_r: 0.10,
            stride_length_m: 0.7,
            inactivity_timeout_ms: 2_000,
            snap_threshold_m: 2.0,
            node_snap_threshold_m: 5.0,
            min_finalize_length_m: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.step_threshold, 11.0);
        assert_eq!(cfg.step_min_interval_ms, 300);
        assert_eq!(cfg.stride_length_m, 0.7);
        assert_eq!(cfg.inactivity_timeout_ms, 2_000);
    }
}
