//! The PDR integrator: glues sensor ingress, the step detector, the heading
//! estimator and the path manager together, and exposes the engine's public
//! command surface and output streams.

use crate::config::EngineConfig;
use crate::graph::{Graph, PathManager};
use crate::heading::HeadingEstimator;
use crate::ingress::SensorIngress;
use crate::observer::Subject;
use crate::step_detector::StepDetector;
use crate::types::{Vec2, Vec3};
use log::info;

pub struct PdrEngine {
    config: EngineConfig,

    ingress: SensorIngress,
    step_detector: StepDetector,
    heading: HeadingEstimator,
    path_manager: PathManager,

    position: Vec2,
    recording: bool,
    snapping: bool,
    started: bool,
    disposed: bool,
    /// Monotonic cache of the most recent sample timestamp seen by any
    /// ingest/tick call, consulted by the zero-argument command surface
    /// (`toggleRecording`, `toggleSnapping`) which the spec does not pass a
    /// timestamp into directly.
    clock_ms: i64,

    pub position_stream: Subject<Vec2>,
    pub heading_stream: Subject<f64>,
    pub step_count_stream: Subject<u64>,
    pub path_changed_stream: Subject<()>,
}

impl PdrEngine {
    pub fn new(config: EngineConfig) -> Self {
        let path_manager = PathManager::new(
            config.snap_threshold_m,
            config.node_snap_threshold_m,
            config.min_finalize_length_m,
            config.inactivity_timeout_ms,
        );
        let ingress = SensorIngress::new(config.ingress_alpha);
        let step_detector = StepDetector::new(config.step_threshold, config.step_min_interval_ms);
        let heading = HeadingEstimator::new(config.heading_q, config.heading_r);

        PdrEngine {
            config,
            ingress,
            step_detector,
            heading,
            path_manager,
            position: Vec2::ZERO,
            recording: false,
            snapping: false,
            started: false,
            disposed: false,
            clock_ms: i64::MIN,
            position_stream: Subject::new(),
            heading_stream: Subject::new(),
            step_count_stream: Subject::new(),
            path_changed_stream: Subject::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn is_snapping(&self) -> bool {
        self.snapping
    }

    pub fn has_path(&self) -> bool {
        self.path_manager.has_path()
    }

    pub fn graph(&self) -> &Graph {
        self.path_manager.graph()
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn step_count(&self) -> u64 {
        self.step_detector.step_count()
    }

    /// Begins accepting sensor samples. The local frame origin is the
    /// position at the moment of this call.
    pub fn start(&mut self) {
        if self.disposed {
            return;
        }
        self.started = true;
        self.position = Vec2::ZERO;
        info!("engine started");
    }

    /// Stops accepting sensor samples and clears ingress filter state, per
    /// the ingress contract (a subsequent start begins from the next
    /// sample).
    pub fn stop(&mut self) {
        if self.disposed || !self.started {
            return;
        }
        self.started = false;
        self.ingress.stop();
        info!("engine stopped");
    }

    /// Idempotent. Closes every output stream and cancels the inactivity
    /// timer. A second call is a no-op.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if self.recording {
            self.finish_recording();
        }
        self.position_stream.close();
        self.heading_stream.close();
        self.step_count_stream.close();
        self.path_changed_stream.close();
        self.disposed = true;
        info!("engine disposed");
    }

    /// §4.5.1: flips the recording session on/off.
    pub fn toggle_recording(&mut self) {
        if self.disposed {
            return;
        }
        if self.recording {
            self.finish_recording();
        } else {
            self.snapping = false;
            self.path_manager.start_recording(self.position);
            self.recording = true;
        }
    }

    fn finish_recording(&mut self) {
        self.path_manager.stop_recording();
        self.recording = false;
        self.snapping = true;
        self.path_changed_stream.publish(());
    }

    pub fn toggle_snapping(&mut self) {
        if self.disposed {
            return;
        }
        self.snapping = !self.snapping;
    }

    pub fn find_path(&self, start: Vec2, end: Vec2) -> Vec<Vec2> {
        self.path_manager.find_path(start, end)
    }

    fn advance_clock(&mut self, now_ms: i64) {
        self.clock_ms = self.clock_ms.max(now_ms);
    }

    pub fn ingest_accelerometer(&mut self, sample: Vec3, now_ms: i64) {
        if self.disposed || !self.started {
            return;
        }
        self.advance_clock(now_ms);
        self.ingress.ingest_accelerometer(sample);
        let Some(filtered) = self.ingress.accelerometer.latest().copied() else {
            return;
        };

        if let Some(h) = self.heading.on_accelerometer(filtered) {
            self.heading_stream.publish(h);
        }

        if self.step_detector.ingest(filtered, now_ms) {
            self.on_step(now_ms);
        }

        if self.path_manager.tick(self.clock_ms) {
            self.path_changed_stream.publish(());
        }
    }

    pub fn ingest_magnetometer(&mut self, sample: Vec3, now_ms: i64) {
        if self.disposed || !self.started {
            return;
        }
        self.advance_clock(now_ms);
        self.ingress.ingest_magnetometer(sample);
        let Some(latest) = self.ingress.magnetometer.latest().copied() else {
            return;
        };
        if let Some(h) = self.heading.on_magnetometer(latest) {
            self.heading_stream.publish(h);
        }
    }

    pub fn ingest_gyroscope(&mut self, sample: Vec3, now_ms: i64) {
        if self.disposed || !self.started {
            return;
        }
        self.advance_clock(now_ms);
        self.ingress.ingest_gyroscope(sample);
    }

    /// Host-driven poll; advances the inactivity timer even when no sample
    /// has arrived recently.
    pub fn tick(&mut self, now_ms: i64) {
        if self.disposed || !self.started {
            return;
        }
        self.advance_clock(now_ms);
        if self.path_manager.tick(self.clock_ms) {
            self.path_changed_stream.publish(());
        }
    }

    /// §4.4: on every step, update dead-reckoned position from the current
    /// heading and fixed stride, optionally record, optionally snap, then
    /// emit. `step_count` is published before `position`, per the ordering
    /// guarantee.
    fn on_step(&mut self, now_ms: i64) {
        self.step_count_stream.publish(self.step_detector.step_count());

        let h = self.heading.heading();
        self.position = Vec2::new(
            self.position.x + self.config.stride_length_m * h.sin(),
            self.position.y - self.config.stride_length_m * h.cos(),
        );

        if self.recording {
            self.path_manager.record_step(self.position, now_ms);
        }

        let emitted = if self.snapping && self.path_manager.has_path() {
            self.path_manager.snap(self.position, true)
        } else {
            self.position
        };
        self.position_stream.publish(emitted);
    }
}
