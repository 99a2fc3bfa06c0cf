use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pdr_tracker_rs::{EngineConfig, PdrEngine, Vec3};
use serde::Deserialize;
use serde_json::json;

/// Replays a recorded sensor session through a PdrEngine and prints the
/// resulting position/heading/step-count/path-changed stream as JSON lines.
#[derive(Parser, Debug)]
struct Args {
    /// Path to a session_*.json log.
    #[arg(long)]
    log: PathBuf,

    /// Fixed stride length, meters.
    #[arg(long, default_value = "0.7")]
    stride_length: f64,

    /// Step detector peak threshold, m/s^2.
    #[arg(long, default_value = "11.0")]
    step_threshold: f64,

    /// Minimum milliseconds between two registered steps.
    #[arg(long, default_value = "300")]
    step_min_interval_ms: i64,
}

#[derive(Deserialize)]
struct Sample {
    x: f64,
    y: f64,
    z: f64,
}

impl From<Sample> for Vec3 {
    fn from(s: Sample) -> Self {
        Vec3::new(s.x, s.y, s.z)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum Command {
    Start,
    Stop,
    Dispose,
    ToggleRecording,
    ToggleSnapping,
}

#[derive(Deserialize)]
struct Reading {
    timestamp: i64,
    accel: Option<Sample>,
    mag: Option<Sample>,
    gyro: Option<Sample>,
    command: Option<Command>,
}

#[derive(Deserialize)]
struct SessionLog {
    readings: Vec<Reading>,
}

fn load_log(path: &PathBuf) -> Result<SessionLog> {
    let file = File::open(path).with_context(|| format!("opening session log {}", path.display()))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).with_context(|| format!("parsing session log {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let log = load_log(&args.log)?;

    let mut config = EngineConfig::default();
    config.stride_length_m = args.stride_length;
    config.step_threshold = args.step_threshold;
    config.step_min_interval_ms = args.step_min_interval_ms;

    let mut engine = PdrEngine::new(config);
    engine.position_stream.subscribe(|p| {
        println!("{}", json!({"type": "position", "x": p.x, "y": p.y}));
    });
    engine.heading_stream.subscribe(|h| {
        println!("{}", json!({"type": "heading", "radians": h}));
    });
    engine.step_count_stream.subscribe(|c| {
        println!("{}", json!({"type": "step_count", "count": c}));
    });
    engine.path_changed_stream.subscribe(|_| {
        println!("{}", json!({"type": "path_changed"}));
    });

    engine.start();

    for reading in log.readings {
        if let Some(cmd) = reading.command {
            match cmd {
                Command::Start => engine.start(),
                Command::Stop => engine.stop(),
                Command::Dispose => engine.dispose(),
                Command::ToggleRecording => engine.toggle_recording(),
                Command::ToggleSnapping => engine.toggle_snapping(),
            }
        }
        if let Some(accel) = reading.accel {
            engine.ingest_accelerometer(accel.into(), reading.timestamp);
        }
        if let Some(mag) = reading.mag {
            engine.ingest_magnetometer(mag.into(), reading.timestamp);
        }
        if let Some(gyro) = reading.gyro {
            engine.ingest_gyroscope(gyro.into(), reading.timestamp);
        }
        engine.tick(reading.timestamp);
    }

    engine.dispose();

    eprintln!(
        "replay complete: {} steps, {} nodes, {} edges",
        engine.step_count(),
        engine.graph().nodes.len(),
        engine.graph().edges.len()
    );

    Ok(())
}
