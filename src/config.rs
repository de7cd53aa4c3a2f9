use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::aim::{MotionSettings, SelectorSettings};
use crate::frame::CaptureRegion;
use crate::pipeline::PipelineSettings;

const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_SCREEN_WIDTH: u32 = 1920;
const DEFAULT_SCREEN_HEIGHT: u32 = 1080;
const DEFAULT_REGION_SCALE: f32 = 2.5;
const DEFAULT_CAPTURE_YIELD_MS: u64 = 7;
const DEFAULT_SEARCHING_RADIUS: f32 = 160.0;
const DEFAULT_FOCUSED_RADIUS: f32 = 70.0;
const DEFAULT_TRIGGER_RADIUS: f32 = 20.0;
const DEFAULT_HYSTERESIS_MS: u64 = 150;
const DEFAULT_SMOOTHING_SEARCHING: f32 = 4.5;
const DEFAULT_SMOOTHING_FOCUSED: f32 = 6.0;
const DEFAULT_MIN_INTERVAL_MS: u64 = 15;
const DEFAULT_FRAME_WAIT_MS: u64 = 1000;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CYCLE_MS: u64 = 1;
const DEFAULT_HEALTH_LOG_SECS: u64 = 5;

const DEFAULT_PRIORITIES: &[&str] = &[
    "head",
    "head_paper",
    "body",
    "body_paper",
    "enemy",
    "enemy_paper",
    "enemy_scan",
    "enemy_paper_scan",
    "legs",
    "legs_paper",
];
const DEFAULT_TRIGGER_LABELS: &[&str] = &[
    "head",
    "head_paper",
    "body",
    "body_paper",
    "enemy",
    "enemy_paper",
    "enemy_scan",
    "enemy_paper_scan",
];
const DEFAULT_CONTAINER_LABELS: &[&str] = &["enemy", "enemy_paper", "enemy_scan", "enemy_paper_scan"];
const DEFAULT_ENGAGE_LABELS: &[&str] = &["head", "head_paper", "body", "body_paper"];

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TrackerConfigFile {
    confidence_threshold: Option<f32>,
    hysteresis_ms: Option<u64>,
    capture: Option<CaptureConfigFile>,
    fov: Option<FovConfigFile>,
    targeting: Option<TargetingConfigFile>,
    motion: Option<MotionConfigFile>,
    pipeline: Option<PipelineConfigFile>,
    detector: Option<DetectorConfigFile>,
    control: Option<ControlConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CaptureConfigFile {
    screen_width: Option<u32>,
    screen_height: Option<u32>,
    radius_basis: Option<f32>,
    region_scale: Option<f32>,
    yield_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FovConfigFile {
    searching_radius: Option<f32>,
    focused_radius: Option<f32>,
    trigger_radius: Option<f32>,
    engage_radius: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TargetingConfigFile {
    priorities: Option<Vec<String>>,
    trigger_labels: Option<Vec<String>>,
    container_labels: Option<Vec<String>>,
    /// Explicit `null` or absence keeps the default; `[]` is rejected at validation.
    engage_labels: Option<Vec<String>>,
    engage_all_parts: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct MotionConfigFile {
    smoothing_searching: Option<f32>,
    smoothing_focused: Option<f32>,
    min_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PipelineConfigFile {
    frame_wait_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
    labels: Option<Vec<String>>,
    scenario_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ControlConfigFile {
    cycle_ms: Option<u64>,
    aim_enabled: Option<bool>,
    overlay_enabled: Option<bool>,
    health_log_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub confidence_threshold: f32,
    pub hysteresis: Duration,
    pub capture: CaptureSettings,
    pub fov: FovSettings,
    pub targeting: TargetingSettings,
    pub motion: MotionSettings,
    pub pipeline: PipelineSettings,
    pub detector: DetectorSettings,
    pub control: ControlSettings,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub screen_width: u32,
    pub screen_height: u32,
    pub radius_basis: f32,
    pub region_scale: f32,
}

#[derive(Debug, Clone)]
pub struct FovSettings {
    pub searching_radius: f32,
    pub focused_radius: f32,
    pub trigger_radius: f32,
    pub engage_radius: f32,
}

#[derive(Debug, Clone)]
pub struct TargetingSettings {
    pub priorities: Vec<String>,
    pub trigger_labels: Vec<String>,
    pub container_labels: Vec<String>,
    /// `None` admits every part label.
    pub engage_labels: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub input_size: u32,
    pub labels: Vec<String>,
    pub scenario_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ControlSettings {
    pub cycle: Duration,
    pub aim_enabled: bool,
    pub overlay_enabled: bool,
    pub health_log: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::from_file(TrackerConfigFile::default())
    }
}

impl TrackerConfig {
    /// Load from `TRACKER_CONFIG` (if set), apply env overrides, validate.
    pub fn load() -> Result<Self> {
        let path = std::env::var("TRACKER_CONFIG").ok().map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Load from an explicit file (or defaults), apply env overrides, validate.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => TrackerConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(file: TrackerConfigFile) -> Self {
        let capture = file.capture.unwrap_or_default();
        let fov = file.fov.unwrap_or_default();
        let targeting = file.targeting.unwrap_or_default();
        let motion = file.motion.unwrap_or_default();
        let pipeline = file.pipeline.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let control = file.control.unwrap_or_default();

        let searching_radius = fov.searching_radius.unwrap_or(DEFAULT_SEARCHING_RADIUS);
        let focused_radius = fov.focused_radius.unwrap_or(DEFAULT_FOCUSED_RADIUS);
        let trigger_radius = fov.trigger_radius.unwrap_or(DEFAULT_TRIGGER_RADIUS);
        let engage_radius = fov
            .engage_radius
            .unwrap_or((focused_radius + trigger_radius) / 2.0);

        let priorities = targeting
            .priorities
            .unwrap_or_else(|| to_strings(DEFAULT_PRIORITIES));
        let engage_labels = if targeting.engage_all_parts.unwrap_or(false) {
            None
        } else {
            Some(
                targeting
                    .engage_labels
                    .unwrap_or_else(|| to_strings(DEFAULT_ENGAGE_LABELS)),
            )
        };

        Self {
            confidence_threshold: file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            hysteresis: Duration::from_millis(file.hysteresis_ms.unwrap_or(DEFAULT_HYSTERESIS_MS)),
            capture: CaptureSettings {
                screen_width: capture.screen_width.unwrap_or(DEFAULT_SCREEN_WIDTH),
                screen_height: capture.screen_height.unwrap_or(DEFAULT_SCREEN_HEIGHT),
                radius_basis: capture.radius_basis.unwrap_or(searching_radius),
                region_scale: capture.region_scale.unwrap_or(DEFAULT_REGION_SCALE),
            },
            fov: FovSettings {
                searching_radius,
                focused_radius,
                trigger_radius,
                engage_radius,
            },
            targeting: TargetingSettings {
                trigger_labels: targeting
                    .trigger_labels
                    .unwrap_or_else(|| to_strings(DEFAULT_TRIGGER_LABELS)),
                container_labels: targeting
                    .container_labels
                    .unwrap_or_else(|| to_strings(DEFAULT_CONTAINER_LABELS)),
                engage_labels,
                priorities: priorities.clone(),
            },
            motion: MotionSettings {
                smoothing_searching: motion
                    .smoothing_searching
                    .unwrap_or(DEFAULT_SMOOTHING_SEARCHING),
                smoothing_focused: motion.smoothing_focused.unwrap_or(DEFAULT_SMOOTHING_FOCUSED),
                min_interval: Duration::from_millis(
                    motion.min_interval_ms.unwrap_or(DEFAULT_MIN_INTERVAL_MS),
                ),
            },
            pipeline: PipelineSettings {
                capture_yield: Duration::from_millis(
                    capture.yield_ms.unwrap_or(DEFAULT_CAPTURE_YIELD_MS),
                ),
                frame_wait: Duration::from_millis(
                    pipeline.frame_wait_ms.unwrap_or(DEFAULT_FRAME_WAIT_MS),
                ),
            },
            detector: DetectorSettings {
                backend: detector
                    .backend
                    .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
                model_path: detector.model_path,
                input_size: detector.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
                labels: detector.labels.unwrap_or(priorities),
                scenario_path: detector.scenario_path,
            },
            control: ControlSettings {
                cycle: Duration::from_millis(control.cycle_ms.unwrap_or(DEFAULT_CYCLE_MS)),
                aim_enabled: control.aim_enabled.unwrap_or(true),
                overlay_enabled: control.overlay_enabled.unwrap_or(false),
                health_log: Duration::from_secs(
                    control.health_log_secs.unwrap_or(DEFAULT_HEALTH_LOG_SECS),
                ),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("TRACKER_CONFIDENCE") {
            self.confidence_threshold = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("TRACKER_CONFIDENCE must be a number between 0 and 1"))?;
        }
        if let Ok(backend) = std::env::var("TRACKER_DETECTOR_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_string();
            }
        }
        if let Ok(path) = std::env::var("TRACKER_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(path) = std::env::var("TRACKER_SCENARIO") {
            if !path.trim().is_empty() {
                self.detector.scenario_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(priorities) = std::env::var("TRACKER_PRIORITIES") {
            let parsed = split_csv(&priorities);
            if !parsed.is_empty() {
                self.targeting.priorities = parsed;
            }
        }
        if let Ok(hysteresis) = std::env::var("TRACKER_HYSTERESIS_MS") {
            let ms: u64 = hysteresis.trim().parse().map_err(|_| {
                anyhow!("TRACKER_HYSTERESIS_MS must be an integer number of milliseconds")
            })?;
            self.hysteresis = Duration::from_millis(ms);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!(
                "confidence_threshold must be within 0..=1, got {}",
                self.confidence_threshold
            ));
        }
        for (name, value) in [
            ("fov.searching_radius", self.fov.searching_radius),
            ("fov.focused_radius", self.fov.focused_radius),
            ("fov.trigger_radius", self.fov.trigger_radius),
            ("fov.engage_radius", self.fov.engage_radius),
            ("motion.smoothing_searching", self.motion.smoothing_searching),
            ("motion.smoothing_focused", self.motion.smoothing_focused),
            ("capture.radius_basis", self.capture.radius_basis),
            ("capture.region_scale", self.capture.region_scale),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(anyhow!("{} must be a positive number, got {}", name, value));
            }
        }
        if self.capture.screen_width == 0 || self.capture.screen_height == 0 {
            return Err(anyhow!("capture screen size must be non-zero"));
        }
        let region = self.capture_region();
        if region.width == 0 || region.width > self.capture.screen_width.min(self.capture.screen_height) {
            return Err(anyhow!(
                "capture region side {} does not fit a {}x{} screen",
                region.width,
                self.capture.screen_width,
                self.capture.screen_height
            ));
        }
        if self.pipeline.frame_wait.is_zero() {
            return Err(anyhow!("pipeline.frame_wait_ms must be greater than zero"));
        }
        if matches!(&self.targeting.engage_labels, Some(labels) if labels.is_empty()) {
            return Err(anyhow!(
                "targeting.engage_labels is empty; set engage_all_parts to admit every part"
            ));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector.input_size must be greater than zero"));
        }
        Ok(())
    }

    /// Square capture region centered on the configured screen.
    pub fn capture_region(&self) -> CaptureRegion {
        CaptureRegion::centered(
            self.capture.screen_width,
            self.capture.screen_height,
            self.capture.radius_basis,
            self.capture.region_scale,
        )
    }

    pub fn selector_settings(&self) -> SelectorSettings {
        SelectorSettings {
            confidence_threshold: self.confidence_threshold,
            searching_radius: self.fov.searching_radius,
            focused_radius: self.fov.focused_radius,
            trigger_radius: self.fov.trigger_radius,
            engage_radius: self.fov.engage_radius,
            hysteresis: self.hysteresis,
            priorities: self.targeting.priorities.clone(),
            trigger_labels: to_set(&self.targeting.trigger_labels),
            container_labels: to_set(&self.targeting.container_labels),
            engage_labels: self.targeting.engage_labels.as_deref().map(to_set),
        }
    }
}

fn read_config_file(path: &Path) -> Result<TrackerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn to_set(values: &[String]) -> HashSet<String> {
    values.iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_tuning() {
        let cfg = TrackerConfig::default();
        assert_eq!(cfg.confidence_threshold, 0.5);
        assert_eq!(cfg.fov.engage_radius, 45.0);
        assert_eq!(cfg.hysteresis, Duration::from_millis(150));
        assert_eq!(cfg.capture_region().width, 400);
        assert_eq!(cfg.detector.labels, cfg.targeting.priorities);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn selector_settings_carry_label_sets() {
        let cfg = TrackerConfig::default();
        let settings = cfg.selector_settings();
        assert!(settings.container_labels.contains("enemy_scan"));
        assert!(!settings.container_labels.contains("head"));
        assert!(settings.trigger_labels.contains("body_paper"));
        assert!(!settings.trigger_labels.contains("legs"));
        assert_eq!(settings.engage_labels.map(|l| l.len()), Some(4));
    }

    #[test]
    fn engage_all_parts_clears_label_filter() {
        let file: TrackerConfigFile =
            serde_json::from_str(r#"{"targeting": {"engage_all_parts": true}}"#).unwrap();
        let cfg = TrackerConfig::from_file(file);
        assert!(cfg.targeting.engage_labels.is_none());
        assert!(cfg.selector_settings().engage_labels.is_none());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = TrackerConfig::default();
        cfg.confidence_threshold = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = TrackerConfig::default();
        cfg.motion.smoothing_focused = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrackerConfig::default();
        cfg.capture.radius_basis = 1000.0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrackerConfig::default();
        cfg.targeting.engage_labels = Some(Vec::new());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let parsed: Result<TrackerConfigFile, _> = serde_json::from_str(r#"{"fov": {"radius": 3}}"#);
        assert!(parsed.is_err());
    }
}
