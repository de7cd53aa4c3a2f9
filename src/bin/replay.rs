//! replay - deterministic scenario run
//!
//! Feeds each frame of a scripted scenario through the control cycle on a
//! simulated clock and prints one JSON cycle report per line, followed by a
//! summary. No threads, no timing jitter: the same scenario and config always
//! produce the same output.

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracking_kernel::{
    control_loop_for, ControlSignals, DetectionSet, RecordingActuator, Scenario, StopSignal,
    TrackerConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Scenario file: {"frames": [[{"label", "confidence", "box"}, ...], ...]}
    #[arg(long)]
    scenario: PathBuf,
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "TRACKER_CONFIG")]
    config: Option<PathBuf>,
    /// Simulated time between frames.
    #[arg(long, default_value_t = 10)]
    step_ms: u64,
    /// Replay with aiming disabled.
    #[arg(long)]
    no_aim: bool,
}

#[derive(Serialize)]
struct ReplaySummary {
    frames: usize,
    cycles_with_target: u64,
    moves: usize,
    total_dx: i32,
    total_dy: i32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let cfg = TrackerConfig::load_from(args.config.as_deref())?;
    let scenario = Scenario::from_file(&args.scenario)?;
    log::info!(
        "replaying {} frames from {}",
        scenario.frames.len(),
        args.scenario.display()
    );

    let signals = ControlSignals::new(!args.no_aim, true, StopSignal::new());
    let mut control = control_loop_for(&cfg, signals);
    let mut actuator = RecordingActuator::default();

    let start = Instant::now();
    let step = Duration::from_millis(args.step_ms);
    let mut cycles_with_target = 0u64;

    for (i, detections) in scenario.frames.into_iter().enumerate() {
        let now = start + step * i as u32;
        let set = DetectionSet::new(detections, i as u64, now);
        let report = control.cycle(Some(set), now, &mut actuator);
        if report.target_index.is_some() {
            cycles_with_target += 1;
        }
        println!("{}", serde_json::to_string(&report)?);
    }

    let (total_dx, total_dy) = actuator.total();
    let summary = ReplaySummary {
        frames: control.cycles() as usize,
        cycles_with_target,
        moves: actuator.moves.len(),
        total_dx,
        total_dy,
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
