//! Pedestrian dead reckoning with an online, user-constructed walkable-path
//! graph: step detection, tilt-compensated heading, PCA-based path
//! finalization, snapping and shortest-path routing.

pub mod config;
pub mod engine;
pub mod graph;
pub mod heading;
pub mod ingress;
pub mod observer;
pub mod step_detector;
pub mod types;

pub use config::EngineConfig;
pub use engine::PdrEngine;
pub use graph::{Edge, Graph, Node, PathManager};
pub use types::{Vec2, Vec3};
