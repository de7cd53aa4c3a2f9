//! Tracking Kernel
//!
//! Real-time target acquisition: capture a small screen region, run an object
//! detector on it, pick one target and turn it into smoothed relative pointer
//! motion.
//!
//! # Architecture
//!
//! ```text
//! FrameSource → CapturePump → [frame slot] → DetectionPump → [result slot]
//!     → ControlLoop (TargetSelector → MotionPlanner) → PointerActuator
//! ```
//!
//! Capture and detection run on their own threads and hand off through
//! latest-wins slots, so a slow detector only ever sees the newest frame. The
//! control loop polls the result slot without blocking.
//!
//! # Module Structure
//!
//! - `geometry`: points, boxes, containment and circle tests
//! - `frame`: captured rasters and the capture region
//! - `ingest`: frame sources
//! - `detect`: detector backends, detections and the backend registry
//! - `pipeline`: hand-off slots and the capture/detection pumps
//! - `aim`: mode state, target selection, motion planning
//! - `actuate`: pointer actuators
//! - `control`: control signals and the control cycle
//! - `config`: layered configuration (file, defaults, env)

pub mod actuate;
pub mod aim;
pub mod config;
pub mod control;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod pipeline;

pub use actuate::{LogActuator, PointerActuator, RecordingActuator};
pub use aim::{
    AimMode, AimState, Displacement, MotionPlanner, SelectorSettings, Selection, Target,
    TargetSelector,
};
pub use config::TrackerConfig;
pub use control::{ControlLoop, ControlSignals, CycleReport, RunSummary};
pub use detect::{BackendRegistry, Detection, DetectionSet, DetectorBackend, Scenario, StubBackend};
pub use frame::{CaptureRegion, Frame, PixelFormat};
pub use geometry::{box_intersects_circle, is_box_inside, is_point_inside, BoundingBox, Point};
pub use ingest::{FrameSource, SyntheticConfig, SyntheticSource};
pub use pipeline::{Pipeline, PipelineSettings, PumpCounters, StopSignal};

/// Build the selector, planner and control loop for a loaded configuration.
pub fn control_loop_for(cfg: &TrackerConfig, signals: ControlSignals) -> ControlLoop {
    let center = cfg.capture_region().center();
    let selector = TargetSelector::new(cfg.selector_settings(), center);
    let planner = MotionPlanner::new(cfg.motion, center);
    ControlLoop::new(selector, planner, signals)
}

/// Register the backends compiled into this build and select the configured one.
pub fn select_backend(cfg: &TrackerConfig) -> anyhow::Result<detect::SharedBackend> {
    let mut registry = BackendRegistry::new();
    let stub = match &cfg.detector.scenario_path {
        Some(path) => StubBackend::from_scenario_file(path)?,
        None => StubBackend::default(),
    };
    registry.register(stub);

    #[cfg(feature = "backend-tract")]
    {
        if let Some(model_path) = &cfg.detector.model_path {
            registry.register(detect::TractBackend::new(
                model_path,
                cfg.detector.input_size,
                cfg.detector.labels.clone(),
            )?);
        }
    }

    log::info!("detector backends: {}", registry.list().join(", "));
    registry.select(&cfg.detector.backend)
}
