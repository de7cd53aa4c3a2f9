use anyhow::Result;

use crate::detect::result::DetectionSet;
use crate::frame::Frame;

/// Detector backend trait.
///
/// A backend maps one frame to zero or more labeled boxes in frame-local
/// pixel coordinates. Latency is unbounded and usually the slowest stage of
/// the pipeline; callers run it on the detection thread only.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// The returned set must carry `frame.sequence` and `frame.captured_at`.
    fn detect(&mut self, frame: &Frame) -> Result<DetectionSet>;

    /// Optional warm-up hook, called once before the pipeline starts.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
