//! Frame sources.
//!
//! A source captures the fixed `CaptureRegion` on demand. The screen-grab
//! primitive itself lives outside this crate; what ships here is:
//! - `SyntheticSource` (`stub://` regions) for demos and tests
//!
//! Sources must be callable at high frequency. They MUST NOT:
//! - Buffer frames internally (the pipeline hand-off does that)
//! - Block indefinitely inside `capture`

pub mod synthetic;

pub use synthetic::{SyntheticConfig, SyntheticSource};

use anyhow::Result;

use crate::frame::{CaptureRegion, Frame};

/// Producer of timestamped region rasters.
pub trait FrameSource: Send {
    /// Source identifier for logs.
    fn name(&self) -> &str;

    /// Region every frame covers.
    fn region(&self) -> CaptureRegion;

    /// Capture the current contents of the region.
    ///
    /// `Ok(None)` means the source is exhausted and the pipeline should stop.
    /// An `Err` is treated as a transient failure for this iteration.
    fn capture(&mut self) -> Result<Option<Frame>>;
}
