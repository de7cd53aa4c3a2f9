//! Control cycle.
//!
//! The control loop runs on the caller's thread. It never waits on the
//! pipeline: each cycle takes a fresh detection set if one is ready and
//! otherwise keeps evaluating the last one it received. Selection and motion
//! run every cycle so the focus hysteresis decays on its own clock.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::actuate::PointerActuator;
use crate::aim::{
    AimMode, AimState, Displacement, MotionPlanner, Selection, TargetSelector,
};
use crate::detect::{Detection, DetectionSet};
use crate::geometry::Point;
use crate::pipeline::{Pipeline, StopSignal};

/// Externally toggled switches. Polled by the control loop, never decided by it.
#[derive(Clone, Debug)]
pub struct ControlSignals {
    aim: Arc<AtomicBool>,
    overlay: Arc<AtomicBool>,
    debug: Arc<AtomicBool>,
    stop: StopSignal,
}

impl ControlSignals {
    pub fn new(aim_enabled: bool, overlay_enabled: bool, stop: StopSignal) -> Self {
        Self {
            aim: Arc::new(AtomicBool::new(aim_enabled)),
            overlay: Arc::new(AtomicBool::new(overlay_enabled)),
            debug: Arc::new(AtomicBool::new(false)),
            stop,
        }
    }

    pub fn aim_enabled(&self) -> bool {
        self.aim.load(Ordering::Relaxed)
    }

    pub fn overlay_enabled(&self) -> bool {
        self.overlay.load(Ordering::Relaxed)
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub fn stop(&self) -> &StopSignal {
        &self.stop
    }

    pub fn toggle_aim(&self) -> bool {
        let on = !self.aim.fetch_xor(true, Ordering::Relaxed);
        self.log_status();
        on
    }

    pub fn toggle_overlay(&self) -> bool {
        let on = !self.overlay.fetch_xor(true, Ordering::Relaxed);
        self.log_status();
        on
    }

    pub fn toggle_debug(&self) -> bool {
        let on = !self.debug.fetch_xor(true, Ordering::Relaxed);
        self.log_status();
        on
    }

    pub fn log_status(&self) {
        log::info!(
            "status: aim={} overlay={} debug={}",
            on_off(self.aim_enabled()),
            on_off(self.overlay_enabled()),
            on_off(self.debug_enabled())
        );
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}

/// Everything a diagnostic overlay would draw for one cycle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub frame_sequence: Option<u64>,
    pub mode: AimMode,
    pub active_radius: f32,
    pub detections: Vec<Detection>,
    pub target_index: Option<usize>,
    pub target_distance: Option<f32>,
    pub move_vector: Option<Point>,
    pub applied: Option<Displacement>,
    /// Trigger radius, only reported while debug is on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_radius: Option<f32>,
}

pub struct ControlLoop {
    selector: TargetSelector,
    planner: MotionPlanner,
    state: AimState,
    current: Option<DetectionSet>,
    signals: ControlSignals,
    cycles: u64,
}

impl ControlLoop {
    pub fn new(selector: TargetSelector, planner: MotionPlanner, signals: ControlSignals) -> Self {
        Self {
            selector,
            planner,
            state: AimState::new(),
            current: None,
            signals,
            cycles: 0,
        }
    }

    pub fn state(&self) -> AimState {
        self.state
    }

    pub fn signals(&self) -> &ControlSignals {
        &self.signals
    }

    /// Cycles evaluated so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// One selection + planning pass at `now`.
    ///
    /// `fresh` replaces the held detection set; `None` keeps evaluating the last one.
    pub fn cycle(
        &mut self,
        fresh: Option<DetectionSet>,
        now: Instant,
        actuator: &mut dyn PointerActuator,
    ) -> CycleReport {
        if let Some(set) = fresh {
            self.current = Some(set);
        }
        self.cycles += 1;

        let selection: Selection =
            self.selector
                .evaluate(&mut self.state, self.current.as_ref(), now);
        let motion = self
            .planner
            .plan(&selection, self.signals.aim_enabled(), now, actuator);

        CycleReport {
            cycle: self.cycles,
            frame_sequence: self.current.as_ref().map(|s| s.frame_sequence),
            mode: selection.mode,
            active_radius: selection.active_radius,
            detections: self
                .current
                .as_ref()
                .map(|s| s.detections.clone())
                .unwrap_or_default(),
            target_index: selection.target.as_ref().map(|t| t.index),
            target_distance: selection.target.as_ref().map(|t| t.distance),
            move_vector: motion.offset,
            applied: motion.applied,
            trigger_radius: self
                .signals
                .debug_enabled()
                .then(|| self.selector.settings().trigger_radius),
        }
    }

    /// Drive cycles against a running pipeline until stop (or `max_cycles`).
    pub fn run(
        &mut self,
        pipeline: &Pipeline,
        actuator: &mut dyn PointerActuator,
        cycle_interval: Duration,
        health_interval: Duration,
        max_cycles: Option<u64>,
    ) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        let mut last_health = Instant::now();
        let mut cycles_since_health = 0u64;

        while !self.signals.stop().is_raised() {
            if max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }
            let fresh = pipeline.try_latest();
            if fresh.is_some() {
                summary.fresh_sets += 1;
            }
            let report = self.cycle(fresh, Instant::now(), actuator);
            summary.cycles += 1;
            cycles_since_health += 1;
            if report.target_index.is_some() {
                summary.cycles_with_target += 1;
            }
            if report.applied.is_some() {
                summary.moves += 1;
            }

            if self.signals.overlay_enabled() {
                match serde_json::to_string(&report) {
                    Ok(line) => log::debug!("cycle {}", line),
                    Err(e) => log::warn!("failed to encode cycle report: {}", e),
                }
            }

            if last_health.elapsed() >= health_interval {
                let elapsed = last_health.elapsed().as_secs_f64();
                let stats = pipeline.stats();
                log::info!(
                    "cycles/s={:.1} mode={:?} frames={} dropped={} inferences={} errors={}/{}",
                    cycles_since_health as f64 / elapsed.max(f64::EPSILON),
                    self.state.mode,
                    stats.frames_captured,
                    stats.frames_dropped,
                    stats.inferences,
                    stats.capture_errors,
                    stats.detect_errors
                );
                last_health = Instant::now();
                cycles_since_health = 0;
            }

            if !cycle_interval.is_zero() {
                thread::sleep(cycle_interval);
            }
        }

        summary.elapsed = started.elapsed();
        summary
    }
}

/// Totals from `ControlLoop::run`.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct RunSummary {
    pub cycles: u64,
    pub fresh_sets: u64,
    pub cycles_with_target: u64,
    pub moves: u64,
    #[serde(skip)]
    pub elapsed: Duration,
}
