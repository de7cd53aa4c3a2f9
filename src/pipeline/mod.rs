//! Capture → detection pipeline.
//!
//! Two free-running threads connected by latest-wins slots:
//!
//! ```text
//! FrameSource → CapturePump → [frame slot] → DetectionPump → [result slot] → control loop
//! ```
//!
//! The detector is the slow stage. Frames the detector never sees are simply
//! replaced in the frame slot; results the control loop never polls are
//! replaced in the result slot. Nothing queues, so every consumer always works
//! on the freshest item available. Both pumps poll a shared `StopSignal`;
//! shutdown completes within one frame-wait timeout.

mod capture;
mod detection;
mod slot;

pub use capture::CapturePump;
pub use detection::DetectionPump;
pub use slot::LatestSlot;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::detect::{DetectionSet, SharedBackend};
use crate::frame::Frame;
use crate::ingest::FrameSource;

/// Process-wide stop flag shared by the pumps and the control loop.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters updated by the pumps.
#[derive(Debug, Default)]
pub struct PumpStats {
    frames_captured: AtomicU64,
    frames_dropped: AtomicU64,
    capture_errors: AtomicU64,
    inferences: AtomicU64,
    results_dropped: AtomicU64,
    detect_errors: AtomicU64,
}

/// Point-in-time copy of `PumpStats`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PumpCounters {
    pub frames_captured: u64,
    pub frames_dropped: u64,
    pub capture_errors: u64,
    pub inferences: u64,
    pub results_dropped: u64,
    pub detect_errors: u64,
}

impl PumpStats {
    pub fn snapshot(&self) -> PumpCounters {
        PumpCounters {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            capture_errors: self.capture_errors.load(Ordering::Relaxed),
            inferences: self.inferences.load(Ordering::Relaxed),
            results_dropped: self.results_dropped.load(Ordering::Relaxed),
            detect_errors: self.detect_errors.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Pump timing knobs.
#[derive(Clone, Copy, Debug)]
pub struct PipelineSettings {
    /// Sleep between capture iterations.
    pub capture_yield: Duration,
    /// Longest the detection pump waits for a frame before re-checking stop.
    pub frame_wait: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            capture_yield: Duration::from_millis(7),
            frame_wait: Duration::from_millis(1000),
        }
    }
}

/// Running capture and detection threads.
pub struct Pipeline {
    results: Arc<LatestSlot<DetectionSet>>,
    stats: Arc<PumpStats>,
    stop: StopSignal,
    capture: JoinHandle<()>,
    detection: JoinHandle<()>,
}

impl Pipeline {
    /// Start both pumps on named threads.
    pub fn spawn(
        source: Box<dyn FrameSource>,
        backend: SharedBackend,
        settings: PipelineSettings,
        stop: StopSignal,
    ) -> Result<Self> {
        let frames: Arc<LatestSlot<Frame>> = Arc::new(LatestSlot::new());
        let results = Arc::new(LatestSlot::new());
        let stats = Arc::new(PumpStats::default());

        let capture_pump = CapturePump::new(
            source,
            Arc::clone(&frames),
            stop.clone(),
            Arc::clone(&stats),
            settings.capture_yield,
        );
        let detection_pump = DetectionPump::new(
            backend,
            frames,
            Arc::clone(&results),
            stop.clone(),
            Arc::clone(&stats),
            settings.frame_wait,
        );

        let capture = thread::Builder::new()
            .name("capture".into())
            .spawn(move || capture_pump.run())
            .context("failed to spawn capture thread")?;
        let detection = match thread::Builder::new()
            .name("detection".into())
            .spawn(move || detection_pump.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                stop.raise();
                let _ = capture.join();
                return Err(anyhow!("failed to spawn detection thread: {}", e));
            }
        };

        Ok(Self {
            results,
            stats,
            stop,
            capture,
            detection,
        })
    }

    /// Newest detection set, if one arrived since the last call. Never blocks.
    pub fn try_latest(&self) -> Option<DetectionSet> {
        self.results.take()
    }

    pub fn stats(&self) -> PumpCounters {
        self.stats.snapshot()
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// True once both pump threads have exited.
    pub fn is_finished(&self) -> bool {
        self.capture.is_finished() && self.detection.is_finished()
    }

    /// Raise stop and join both pumps.
    pub fn shutdown(self) -> Result<PumpCounters> {
        self.stop.raise();
        self.capture
            .join()
            .map_err(|_| anyhow!("capture thread panicked"))?;
        self.detection
            .join()
            .map_err(|_| anyhow!("detection thread panicked"))?;
        Ok(self.stats.snapshot())
    }
}
