use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, DetectionSet};
use crate::frame::Frame;

/// Scripted scene description, one detection list per inference pass.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Scenario {
    pub frames: Vec<Vec<Detection>>,
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid scenario {}: {}", path.display(), e))
    }
}

/// Stub backend for testing. Replays a scripted scenario, one entry per frame,
/// wrapping around at the end. An empty scenario always yields no detections.
pub struct StubBackend {
    scenario: Scenario,
    cursor: usize,
}

impl StubBackend {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            cursor: 0,
        }
    }

    pub fn from_scenario_file(path: &Path) -> Result<Self> {
        Ok(Self::new(Scenario::from_file(path)?))
    }

    fn next_detections(&mut self) -> Vec<Detection> {
        if self.scenario.frames.is_empty() {
            return Vec::new();
        }
        let detections = self.scenario.frames[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.scenario.frames.len();
        detections
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new(Scenario::default())
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionSet> {
        Ok(DetectionSet::new(
            self.next_detections(),
            frame.sequence,
            frame.captured_at,
        ))
    }
}
