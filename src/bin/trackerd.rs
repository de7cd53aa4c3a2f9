//! trackerd - target tracking daemon
//!
//! This daemon:
//! 1. Loads configuration (file from TRACKER_CONFIG or --config, then env overrides)
//! 2. Starts the capture and detection pumps on background threads
//! 3. Runs the control cycle on the main thread until Ctrl-C, `quit`, or --cycles
//! 4. Reads console commands from stdin: aim, overlay, debug, status, quit

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::thread;

use tracking_kernel::{
    control_loop_for, select_backend, ControlSignals, LogActuator, Pipeline, StopSignal,
    SyntheticConfig, SyntheticSource, TrackerConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "TRACKER_CONFIG")]
    config: Option<PathBuf>,
    /// Stop after this many control cycles.
    #[arg(long)]
    cycles: Option<u64>,
    /// Start with aiming disabled.
    #[arg(long)]
    no_aim: bool,
    /// Start with per-cycle diagnostic reports enabled (logged at debug).
    #[arg(long)]
    overlay: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = TrackerConfig::load_from(args.config.as_deref())?;

    let region = cfg.capture_region();
    log::info!(
        "capture region {}x{} at ({}, {}), fov searching={} focused={} trigger={}",
        region.width,
        region.height,
        region.left,
        region.top,
        cfg.fov.searching_radius,
        cfg.fov.focused_radius,
        cfg.fov.trigger_radius
    );

    let backend = select_backend(&cfg)?;
    let source = SyntheticSource::new(SyntheticConfig {
        url: "stub://screen".to_string(),
        region,
        max_frames: None,
    })?;

    let stop = StopSignal::new();
    let signals = ControlSignals::new(
        cfg.control.aim_enabled && !args.no_aim,
        cfg.control.overlay_enabled || args.overlay,
        stop.clone(),
    );
    signals.log_status();

    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.raise())
            .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
    }
    spawn_console(signals.clone())?;

    let pipeline = Pipeline::spawn(Box::new(source), backend, cfg.pipeline, stop.clone())?;
    let mut control = control_loop_for(&cfg, signals);
    let mut actuator = LogActuator::new();

    log::info!("trackerd running (Ctrl-C to stop)");
    let summary = control.run(
        &pipeline,
        &mut actuator,
        cfg.control.cycle,
        cfg.control.health_log,
        args.cycles,
    );

    log::info!("shutting down pipeline...");
    let counters = pipeline.shutdown()?;
    log::info!(
        "done: cycles={} fresh_sets={} targeted={} moves={} in {:.2}s",
        summary.cycles,
        summary.fresh_sets,
        summary.cycles_with_target,
        summary.moves,
        summary.elapsed.as_secs_f64()
    );
    log::info!(
        "pipeline: frames={} dropped={} inferences={} results_dropped={} capture_errors={} detect_errors={}",
        counters.frames_captured,
        counters.frames_dropped,
        counters.inferences,
        counters.results_dropped,
        counters.capture_errors,
        counters.detect_errors
    );
    Ok(())
}

/// Line-oriented toggles on stdin. EOF leaves the daemon running.
fn spawn_console(signals: ControlSignals) -> Result<()> {
    thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match line.trim() {
                    "aim" => {
                        signals.toggle_aim();
                    }
                    "overlay" => {
                        signals.toggle_overlay();
                    }
                    "debug" => {
                        signals.toggle_debug();
                    }
                    "status" => signals.log_status(),
                    "quit" | "exit" => {
                        signals.stop().raise();
                        break;
                    }
                    "" => {}
                    other => log::warn!(
                        "unknown command '{}' (aim, overlay, debug, status, quit)",
                        other
                    ),
                }
            }
        })
        .map_err(|e| anyhow!("failed to spawn console thread: {}", e))?;
    Ok(())
}
