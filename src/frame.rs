//! Captured frames and the capture region they cover.
//!
//! - `Frame`: one raster of the capture region plus its capture instant.
//! - `CaptureRegion`: the fixed screen rectangle every frame covers.
//!
//! Frames move through the pipeline by value. A stage that holds a frame owns
//! it exclusively; nothing mutates a frame after the source produced it.

use anyhow::{anyhow, Result};
use std::time::Instant;

use crate::geometry::Point;

/// Pixel layout of `Frame::pixels`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// 4 bytes per pixel, blue first (typical screen grab layout).
    Bgra8,
    /// 3 bytes per pixel.
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// Raster of the capture region.
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Monotonic per-source frame counter, starting at 1.
    pub sequence: u64,
    pub captured_at: Instant,
}

impl Frame {
    /// Wrap raw pixels. Fails when the buffer length does not match the dimensions.
    pub fn new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        sequence: u64,
    ) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(format.bytes_per_pixel()))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} bytes for {}x{} {:?}, received {}",
                expected,
                width,
                height,
                format,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            format,
            sequence,
            captured_at: Instant::now(),
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGB triple at `(x, y)`, regardless of the stored layout.
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let bpp = self.format.bytes_per_pixel();
        let idx = (y as usize * self.width as usize + x as usize) * bpp;
        let px = &self.pixels[idx..idx + bpp];
        match self.format {
            PixelFormat::Bgra8 => [px[2], px[1], px[0]],
            PixelFormat::Rgb8 => [px[0], px[1], px[2]],
        }
    }
}

/// Screen rectangle covered by every captured frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureRegion {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    /// Square region of side `floor(radius_basis * scale)` centered on the screen.
    pub fn centered(screen_width: u32, screen_height: u32, radius_basis: f32, scale: f32) -> Self {
        let side = (radius_basis * scale).max(0.0) as u32;
        let left = (screen_width as f32 / 2.0 - side as f32 / 2.0) as i32;
        let top = (screen_height as f32 / 2.0 - side as f32 / 2.0) as i32;
        Self {
            left,
            top,
            width: side,
            height: side,
        }
    }

    /// Center of the region in region-local coordinates.
    pub fn center(&self) -> Point {
        Point::new(self.width as f32 / 2.0, self.height as f32 / 2.0)
    }
}
