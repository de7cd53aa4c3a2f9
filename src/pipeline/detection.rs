use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;

use super::{LatestSlot, PumpStats, StopSignal};
use crate::detect::{DetectionSet, SharedBackend};
use crate::frame::Frame;

/// Runs the detector on the freshest frame and publishes the result.
pub struct DetectionPump {
    backend: SharedBackend,
    frames: Arc<LatestSlot<Frame>>,
    results: Arc<LatestSlot<DetectionSet>>,
    stop: StopSignal,
    stats: Arc<PumpStats>,
    frame_wait: Duration,
}

impl DetectionPump {
    pub fn new(
        backend: SharedBackend,
        frames: Arc<LatestSlot<Frame>>,
        results: Arc<LatestSlot<DetectionSet>>,
        stop: StopSignal,
        stats: Arc<PumpStats>,
        frame_wait: Duration,
    ) -> Self {
        Self {
            backend,
            frames,
            results,
            stop,
            stats,
            frame_wait,
        }
    }

    pub fn run(self) {
        log::info!("detection pump started");
        while !self.stop.is_raised() {
            let Some(frame) = self.frames.take_timeout(self.frame_wait) else {
                continue;
            };

            let outcome = self
                .backend
                .lock()
                .map_err(|_| anyhow!("detector lock poisoned"))
                .and_then(|mut backend| backend.detect(&frame));
            drop(frame);

            match outcome {
                Ok(set) => {
                    PumpStats::bump(&self.stats.inferences);
                    log::debug!(
                        "frame {}: {} detections, latency {:.1}ms",
                        set.frame_sequence,
                        set.len(),
                        set.captured_at.elapsed().as_secs_f64() * 1000.0
                    );
                    if self.results.publish(set).is_some() {
                        PumpStats::bump(&self.stats.results_dropped);
                    }
                }
                Err(e) => {
                    PumpStats::bump(&self.stats.detect_errors);
                    log::warn!("detection failed: {:#}", e);
                }
            }
        }
        log::info!("detection pump stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Detection, DetectorBackend, Scenario, StubBackend};
    use crate::frame::PixelFormat;
    use crate::geometry::BoundingBox;
    use anyhow::Result;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Instant;

    struct FailingBackend;

    impl DetectorBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&mut self, _frame: &Frame) -> Result<DetectionSet> {
            Err(anyhow!("model exploded"))
        }
    }

    fn frame(sequence: u64) -> Frame {
        Frame::new(vec![0; 3], 1, 1, PixelFormat::Rgb8, sequence).unwrap()
    }

    #[test]
    fn detection_pump_publishes_results_and_stops_within_timeout() {
        let frames = Arc::new(LatestSlot::new());
        let results = Arc::new(LatestSlot::new());
        let stats = Arc::new(PumpStats::default());
        let stop = StopSignal::new();
        let scenario = Scenario {
            frames: vec![vec![Detection::new(
                "enemy",
                0.9,
                BoundingBox::new(0.0, 0.0, 4.0, 4.0),
            )]],
        };
        let backend: SharedBackend = Arc::new(Mutex::new(StubBackend::new(scenario)));
        let pump = DetectionPump::new(
            backend,
            Arc::clone(&frames),
            Arc::clone(&results),
            stop.clone(),
            Arc::clone(&stats),
            Duration::from_millis(20),
        );
        let handle = thread::spawn(move || pump.run());

        frames.publish(frame(42));
        let set = results
            .take_timeout(Duration::from_secs(5))
            .expect("detection result");
        assert_eq!(set.frame_sequence, 42);
        assert_eq!(set.len(), 1);

        let stopped_at = Instant::now();
        stop.raise();
        handle.join().unwrap();
        assert!(stopped_at.elapsed() < Duration::from_secs(2));
        assert_eq!(stats.snapshot().inferences, 1);
    }

    #[test]
    fn detector_errors_are_counted_and_skipped() {
        let frames = Arc::new(LatestSlot::new());
        let results: Arc<LatestSlot<DetectionSet>> = Arc::new(LatestSlot::new());
        let stats = Arc::new(PumpStats::default());
        let stop = StopSignal::new();
        let backend: SharedBackend = Arc::new(Mutex::new(FailingBackend));
        let pump = DetectionPump::new(
            backend,
            Arc::clone(&frames),
            Arc::clone(&results),
            stop.clone(),
            Arc::clone(&stats),
            Duration::from_millis(10),
        );
        let handle = thread::spawn(move || pump.run());

        frames.publish(frame(1));
        let deadline = Instant::now() + Duration::from_secs(5);
        while stats.snapshot().detect_errors == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        frames.publish(frame(2));
        while stats.snapshot().detect_errors < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        stop.raise();
        handle.join().unwrap();

        assert_eq!(stats.snapshot().detect_errors, 2);
        assert!(results.is_empty());
    }
}
