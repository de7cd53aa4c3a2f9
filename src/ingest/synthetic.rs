//! Synthetic frame source.
//!
//! Generates BGRA rasters of the configured region without touching the
//! screen. Used by `trackerd` when no platform grabber is wired in, and by the
//! pipeline tests.

use anyhow::{anyhow, Result};

use super::FrameSource;
use crate::frame::{CaptureRegion, Frame, PixelFormat};

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Source label, must start with `stub://`.
    pub url: String,
    pub region: CaptureRegion,
    /// Stop after this many frames. `None` runs forever.
    pub max_frames: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            url: "stub://screen".to_string(),
            region: CaptureRegion {
                left: 0,
                top: 0,
                width: 64,
                height: 64,
            },
            max_frames: None,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    /// Simulated scene state, advanced every 50 frames.
    scene_state: u8,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if !config.url.starts_with("stub://") {
            return Err(anyhow!(
                "synthetic source requires a stub:// url, got {}",
                config.url
            ));
        }
        if config.region.width == 0 || config.region.height == 0 {
            return Err(anyhow!("capture region must not be empty"));
        }
        log::info!(
            "SyntheticSource: {} capturing {}x{} at ({}, {})",
            config.url,
            config.region.width,
            config.region.height,
            config.region.left,
            config.region.top
        );
        Ok(Self {
            config,
            frame_count: 0,
            scene_state: 0,
        })
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let region = self.config.region;
        let len = region.width as usize * region.height as usize * 4;

        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let mut pixels = vec![0u8; len];
        for (i, chunk) in pixels.chunks_exact_mut(4).enumerate() {
            let base = (i as u64 + self.frame_count + self.scene_state as u64) % 256;
            chunk[0] = base as u8;
            chunk[1] = (base as u8).wrapping_add(self.scene_state);
            chunk[2] = rand::random::<u8>() >> 5;
            chunk[3] = 255;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.config.url
    }

    fn region(&self) -> CaptureRegion {
        self.config.region
    }

    fn capture(&mut self) -> Result<Option<Frame>> {
        if let Some(max) = self.config.max_frames {
            if self.frame_count >= max {
                return Ok(None);
            }
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        let region = self.config.region;
        let frame = Frame::new(
            pixels,
            region.width,
            region.height,
            PixelFormat::Bgra8,
            self.frame_count,
        )?;
        Ok(Some(frame))
    }
}
