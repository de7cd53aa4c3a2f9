use serde::Serialize;
use std::time::{Duration, Instant};

use super::selector::Selection;
use super::state::AimMode;
use crate::actuate::PointerActuator;
use crate::geometry::Point;

#[derive(Clone, Copy, Debug)]
pub struct MotionSettings {
    /// Divisor applied while Searching. Smaller approaches faster.
    pub smoothing_searching: f32,
    /// Divisor applied while Focused.
    pub smoothing_focused: f32,
    pub min_interval: Duration,
}

/// Integer pointer displacement in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Displacement {
    pub dx: i32,
    pub dy: i32,
}

impl Displacement {
    pub fn is_zero(&self) -> bool {
        self.dx == 0 && self.dy == 0
    }
}

/// What the planner did in one cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotionOutcome {
    /// Raw offset from the capture center to the target, before smoothing.
    pub offset: Option<Point>,
    /// Displacement handed to the actuator, if any.
    pub applied: Option<Displacement>,
}

/// `offset / smoothing`, truncated toward zero.
pub fn smoothed_displacement(offset: Point, smoothing: f32) -> Displacement {
    Displacement {
        dx: (offset.x / smoothing) as i32,
        dy: (offset.y / smoothing) as i32,
    }
}

pub struct MotionPlanner {
    settings: MotionSettings,
    center: Point,
    last_action: Option<Instant>,
}

impl MotionPlanner {
    pub fn new(settings: MotionSettings, center: Point) -> Self {
        Self {
            settings,
            center,
            last_action: None,
        }
    }

    pub fn smoothing_for(&self, mode: AimMode) -> f32 {
        match mode {
            AimMode::Searching => self.settings.smoothing_searching,
            AimMode::Focused => self.settings.smoothing_focused,
        }
    }

    pub fn last_action(&self) -> Option<Instant> {
        self.last_action
    }

    fn interval_elapsed(&self, now: Instant) -> bool {
        self.last_action
            .map_or(true, |t| now.saturating_duration_since(t) >= self.settings.min_interval)
    }

    /// Move toward the selected target if aiming is enabled and the interval allows.
    pub fn plan(
        &mut self,
        selection: &Selection,
        aim_enabled: bool,
        now: Instant,
        actuator: &mut dyn PointerActuator,
    ) -> MotionOutcome {
        let Some(target) = selection.target.as_ref() else {
            return MotionOutcome::default();
        };
        if !aim_enabled || !self.interval_elapsed(now) {
            return MotionOutcome::default();
        }

        let center = target.detection.center();
        let offset = Point::new(center.x - self.center.x, center.y - self.center.y);
        let step = smoothed_displacement(offset, self.smoothing_for(selection.mode));
        if step.is_zero() {
            return MotionOutcome {
                offset: Some(offset),
                applied: None,
            };
        }

        actuator.move_relative(step.dx, step.dy);
        self.last_action = Some(now);
        MotionOutcome {
            offset: Some(offset),
            applied: Some(step),
        }
    }
}
