use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{LatestSlot, PumpStats, StopSignal};
use crate::frame::Frame;
use crate::ingest::FrameSource;

/// Pulls frames from a source into the frame slot as fast as the yield allows.
pub struct CapturePump {
    source: Box<dyn FrameSource>,
    frames: Arc<LatestSlot<Frame>>,
    stop: StopSignal,
    stats: Arc<PumpStats>,
    yield_interval: Duration,
}

impl CapturePump {
    pub fn new(
        source: Box<dyn FrameSource>,
        frames: Arc<LatestSlot<Frame>>,
        stop: StopSignal,
        stats: Arc<PumpStats>,
        yield_interval: Duration,
    ) -> Self {
        Self {
            source,
            frames,
            stop,
            stats,
            yield_interval,
        }
    }

    pub fn run(mut self) {
        log::info!("capture pump started ({})", self.source.name());
        while !self.stop.is_raised() {
            match self.source.capture() {
                Ok(Some(frame)) => {
                    PumpStats::bump(&self.stats.frames_captured);
                    if self.frames.publish(frame).is_some() {
                        PumpStats::bump(&self.stats.frames_dropped);
                    }
                }
                Ok(None) => {
                    log::info!("frame source {} exhausted, stopping", self.source.name());
                    self.stop.raise();
                    break;
                }
                Err(e) => {
                    PumpStats::bump(&self.stats.capture_errors);
                    log::warn!("capture failed: {:#}", e);
                }
            }
            thread::sleep(self.yield_interval);
        }
        log::info!("capture pump stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CaptureRegion, PixelFormat};
    use anyhow::{anyhow, Result};

    /// Fails every other call, ends after `limit` calls.
    struct FlakySource {
        calls: u64,
        limit: u64,
    }

    impl FrameSource for FlakySource {
        fn name(&self) -> &str {
            "flaky"
        }

        fn region(&self) -> CaptureRegion {
            CaptureRegion {
                left: 0,
                top: 0,
                width: 1,
                height: 1,
            }
        }

        fn capture(&mut self) -> Result<Option<Frame>> {
            self.calls += 1;
            if self.calls > self.limit {
                return Ok(None);
            }
            if self.calls % 2 == 0 {
                return Err(anyhow!("grab failed"));
            }
            Frame::new(vec![0; 3], 1, 1, PixelFormat::Rgb8, self.calls).map(Some)
        }
    }

    #[test]
    fn capture_pump_survives_errors_and_stops_on_exhaustion() {
        let frames = Arc::new(LatestSlot::new());
        let stats = Arc::new(PumpStats::default());
        let stop = StopSignal::new();
        let pump = CapturePump::new(
            Box::new(FlakySource { calls: 0, limit: 6 }),
            Arc::clone(&frames),
            stop.clone(),
            Arc::clone(&stats),
            Duration::ZERO,
        );

        pump.run();

        assert!(stop.is_raised());
        let counters = stats.snapshot();
        assert_eq!(counters.frames_captured, 3);
        assert_eq!(counters.capture_errors, 3);
        assert_eq!(counters.frames_dropped, 2);
        assert_eq!(frames.take().map(|f| f.sequence), Some(5));
    }
}
