//! Target selection state machine.
//!
//! Each control cycle:
//! 1. Keep detections above the confidence threshold.
//! 2. Decide Searching/Focused. A trigger-label detection centered within the
//!    trigger radius focuses immediately; focus then persists for the
//!    hysteresis window after the trigger is lost.
//! 3. Keep detections within the active radius (focused radius when Focused,
//!    searching radius otherwise).
//! 4. Each container is represented by its highest-priority enclosed part, or
//!    by itself when it encloses none.
//! 5. When Focused, parts touching the engage circle join as extra candidates
//!    even without an enclosing container.
//! 6. The candidate nearest the capture center wins; the first one wins ties.

use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use super::state::{AimMode, AimState};
use crate::detect::{Detection, DetectionSet};
use crate::geometry::{box_intersects_circle, is_box_inside, Point};

#[derive(Clone, Debug)]
pub struct SelectorSettings {
    pub confidence_threshold: f32,
    pub searching_radius: f32,
    pub focused_radius: f32,
    pub trigger_radius: f32,
    /// Radius of the circle that admits loose parts while Focused.
    pub engage_radius: f32,
    pub hysteresis: Duration,
    /// Label priority, highest first.
    pub priorities: Vec<String>,
    pub trigger_labels: HashSet<String>,
    pub container_labels: HashSet<String>,
    /// Part labels admitted by the engage circle. `None` admits every part.
    pub engage_labels: Option<HashSet<String>>,
}

/// The detection chosen for one cycle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Target {
    /// Index into the evaluated `DetectionSet`.
    pub index: usize,
    pub detection: Detection,
    /// Distance from the capture center.
    pub distance: f32,
}

/// Outcome of one evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub mode: AimMode,
    pub active_radius: f32,
    pub target: Option<Target>,
}

pub struct TargetSelector {
    settings: SelectorSettings,
    center: Point,
}

impl TargetSelector {
    pub fn new(settings: SelectorSettings, center: Point) -> Self {
        Self { settings, center }
    }

    pub fn settings(&self) -> &SelectorSettings {
        &self.settings
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn radius_for(&self, mode: AimMode) -> f32 {
        match mode {
            AimMode::Searching => self.settings.searching_radius,
            AimMode::Focused => self.settings.focused_radius,
        }
    }

    /// Run one cycle over `set` (or nothing, on underrun) at `now`.
    pub fn evaluate(
        &self,
        state: &mut AimState,
        set: Option<&DetectionSet>,
        now: Instant,
    ) -> Selection {
        let detections = set.map(|s| s.detections.as_slice()).unwrap_or(&[]);
        let confident: Vec<usize> = match set {
            Some(s) => s.confident(self.settings.confidence_threshold).collect(),
            None => Vec::new(),
        };

        let mode = self.update_mode(state, detections, &confident, now);
        let active_radius = self.radius_for(mode);
        let target = self
            .pick(detections, &confident, mode, active_radius)
            .map(|(index, distance)| Target {
                index,
                detection: detections[index].clone(),
                distance,
            });

        Selection {
            mode,
            active_radius,
            target,
        }
    }

    fn update_mode(
        &self,
        state: &mut AimState,
        detections: &[Detection],
        confident: &[usize],
        now: Instant,
    ) -> AimMode {
        let triggered = confident.iter().any(|&i| {
            let det = &detections[i];
            self.settings.trigger_labels.contains(&det.label)
                && self.center.distance_to(det.center()) <= self.settings.trigger_radius
        });

        let mode = if triggered {
            state.last_focus = Some(now);
            AimMode::Focused
        } else if state
            .last_focus
            .is_some_and(|t| now.saturating_duration_since(t) < self.settings.hysteresis)
        {
            AimMode::Focused
        } else {
            AimMode::Searching
        };

        if mode != state.mode {
            log::debug!("aim mode {:?} -> {:?}", state.mode, mode);
        }
        state.mode = mode;
        mode
    }

    fn pick(
        &self,
        detections: &[Detection],
        confident: &[usize],
        mode: AimMode,
        radius: f32,
    ) -> Option<(usize, f32)> {
        let in_view: Vec<(usize, f32)> = confident
            .iter()
            .map(|&i| (i, self.center.distance_to(detections[i].center())))
            .filter(|&(_, distance)| distance <= radius)
            .collect();
        let (containers, parts): (Vec<(usize, f32)>, Vec<(usize, f32)>) = in_view
            .into_iter()
            .partition(|&(i, _)| self.is_container(&detections[i]));

        let mut candidates: Vec<(usize, f32)> = containers
            .iter()
            .map(|&(ci, cd)| {
                let outer = &detections[ci].bbox;
                parts
                    .iter()
                    .filter(|&&(pi, _)| is_box_inside(&detections[pi].bbox, outer))
                    .min_by_key(|&&(pi, _)| self.priority_rank(&detections[pi].label))
                    .copied()
                    .unwrap_or((ci, cd))
            })
            .collect();

        if mode == AimMode::Focused {
            candidates.extend(confident.iter().filter_map(|&i| {
                let det = &detections[i];
                let engaged = !self.is_container(det)
                    && self.engages(&det.label)
                    && box_intersects_circle(&det.bbox, self.center, self.settings.engage_radius);
                engaged.then(|| (i, self.center.distance_to(det.center())))
            }));
        }

        candidates.into_iter().fold(None, |best, cand| match best {
            Some(b) if b.1 <= cand.1 => Some(b),
            _ => Some(cand),
        })
    }

    fn is_container(&self, det: &Detection) -> bool {
        self.settings.container_labels.contains(&det.label)
    }

    fn engages(&self, label: &str) -> bool {
        self.settings
            .engage_labels
            .as_ref()
            .map_or(true, |labels| labels.contains(label))
    }

    /// Position in the priority list; unlisted labels rank last.
    fn priority_rank(&self, label: &str) -> usize {
        self.settings
            .priorities
            .iter()
            .position(|p| p == label)
            .unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    fn labels(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn settings() -> SelectorSettings {
        SelectorSettings {
            confidence_threshold: 0.5,
            searching_radius: 200.0,
            focused_radius: 70.0,
            trigger_radius: 20.0,
            engage_radius: 45.0,
            hysteresis: Duration::from_millis(150),
            priorities: ["head", "body", "enemy", "legs"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            trigger_labels: labels(&["head", "body", "enemy"]),
            container_labels: labels(&["enemy"]),
            engage_labels: Some(labels(&["head", "body"])),
        }
    }

    fn det(label: &str, x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection::new(label, 0.9, BoundingBox::new(x1, y1, x2, y2))
    }

    fn set(detections: Vec<Detection>) -> DetectionSet {
        DetectionSet::new(detections, 1, Instant::now())
    }

    fn selector(settings: SelectorSettings) -> TargetSelector {
        TargetSelector::new(settings, Point::new(50.0, 50.0))
    }

    #[test]
    fn container_is_represented_by_enclosed_head() {
        let mut no_trigger = settings();
        no_trigger.trigger_labels.clear();
        let sel = selector(no_trigger);
        let input = set(vec![det("enemy", 0.0, 0.0, 100.0, 100.0), det("head", 40.0, 40.0, 60.0, 60.0)]);

        let out = sel.evaluate(&mut AimState::new(), Some(&input), Instant::now());

        assert_eq!(out.mode, AimMode::Searching);
        assert_eq!(out.active_radius, 200.0);
        let target = out.target.expect("target");
        assert_eq!(target.detection.label, "head");
        assert_eq!(target.index, 1);
        assert_eq!(target.distance, 0.0);
    }

    #[test]
    fn representative_follows_priority_not_input_order() {
        let mut no_trigger = settings();
        no_trigger.trigger_labels.clear();
        let sel = selector(no_trigger);
        let container = det("enemy", 0.0, 0.0, 100.0, 100.0);
        let body = det("body", 45.0, 45.0, 55.0, 55.0);
        let head = det("head", 10.0, 10.0, 20.0, 20.0);

        for order in [
            vec![container.clone(), body.clone(), head.clone()],
            vec![head.clone(), container.clone(), body.clone()],
            vec![body.clone(), head.clone(), container.clone()],
        ] {
            let out = sel.evaluate(&mut AimState::new(), Some(&set(order)), Instant::now());
            assert_eq!(out.target.expect("target").detection.label, "head");
        }
    }

    #[test]
    fn unlisted_part_labels_rank_last() {
        let mut no_trigger = settings();
        no_trigger.trigger_labels.clear();
        let sel = selector(no_trigger);
        let input = set(vec![
            det("enemy", 0.0, 0.0, 100.0, 100.0),
            det("arm", 45.0, 45.0, 55.0, 55.0),
            det("legs", 30.0, 70.0, 40.0, 90.0),
        ]);
        let out = sel.evaluate(&mut AimState::new(), Some(&input), Instant::now());
        assert_eq!(out.target.expect("target").detection.label, "legs");
    }

    #[test]
    fn low_confidence_and_out_of_view_detections_are_ignored() {
        let sel = selector(settings());
        let mut weak = det("enemy", 40.0, 40.0, 60.0, 60.0);
        weak.confidence = 0.5;
        let far = det("enemy", 400.0, 400.0, 420.0, 420.0);
        let out = sel.evaluate(&mut AimState::new(), Some(&set(vec![weak, far])), Instant::now());
        assert_eq!(out.mode, AimMode::Searching);
        assert!(out.target.is_none());
    }

    #[test]
    fn empty_and_missing_sets_yield_no_target() {
        let sel = selector(settings());
        let mut state = AimState::new();
        assert!(sel.evaluate(&mut state, None, Instant::now()).target.is_none());
        assert!(sel
            .evaluate(&mut state, Some(&set(Vec::new())), Instant::now())
            .target
            .is_none());
    }

    #[test]
    fn trigger_focuses_and_shrinks_radius() {
        let sel = selector(settings());
        let mut state = AimState::new();
        let now = Instant::now();
        // enemy centered 10px away triggers focus; the second enemy is 100px away
        let input = set(vec![det("enemy", 50.0, 40.0, 70.0, 60.0), det("enemy", 140.0, 40.0, 160.0, 60.0)]);

        let out = sel.evaluate(&mut state, Some(&input), now);

        assert_eq!(out.mode, AimMode::Focused);
        assert_eq!(out.active_radius, 70.0);
        assert_eq!(state.last_focus, Some(now));
        assert_eq!(out.target.expect("target").index, 0);
    }

    #[test]
    fn focus_holds_for_hysteresis_window_then_reverts() {
        let sel = selector(settings());
        let mut state = AimState::new();
        let t = Instant::now();
        let trigger = set(vec![det("head", 45.0, 45.0, 55.0, 55.0)]);
        let nothing = set(Vec::new());

        assert_eq!(sel.evaluate(&mut state, Some(&trigger), t).mode, AimMode::Focused);
        for ms in [0, 1, 50, 100, 149] {
            let at = t + Duration::from_millis(ms);
            assert_eq!(sel.evaluate(&mut state, Some(&nothing), at).mode, AimMode::Focused, "{ms}ms");
        }
        for ms in [150, 151, 500] {
            let at = t + Duration::from_millis(ms);
            assert_eq!(sel.evaluate(&mut state, Some(&nothing), at).mode, AimMode::Searching, "{ms}ms");
        }
        assert_eq!(state.mode, AimMode::Searching);
    }

    #[test]
    fn focused_mode_admits_loose_parts_touching_engage_circle() {
        let sel = selector(settings());
        let mut state = AimState::new();
        let now = Instant::now();
        // enemy triggers focus; head sits outside the enemy box but its edge is 40px from center
        let input = set(vec![
            det("enemy", 55.0, 40.0, 75.0, 60.0),
            det("head", 90.0, 48.0, 96.0, 52.0),
        ]);
        let out = sel.evaluate(&mut state, Some(&input), now);
        assert_eq!(out.mode, AimMode::Focused);
        // enemy (distance 15) still wins over the loose head (distance 43)
        assert_eq!(out.target.as_ref().map(|t| t.index), Some(0));

        // once the enemy is gone the loose head is engaged while focus holds
        let later = set(vec![det("head", 90.0, 48.0, 96.0, 52.0)]);
        let out = sel.evaluate(&mut state, Some(&later), now + Duration::from_millis(10));
        assert_eq!(out.mode, AimMode::Focused);
        assert_eq!(out.target.expect("loose head").detection.label, "head");
    }

    #[test]
    fn searching_mode_ignores_loose_parts() {
        let mut no_trigger = settings();
        no_trigger.trigger_labels.clear();
        let sel = selector(no_trigger);
        let input = set(vec![det("head", 90.0, 48.0, 96.0, 52.0)]);
        let out = sel.evaluate(&mut AimState::new(), Some(&input), Instant::now());
        assert!(out.target.is_none());
    }

    #[test]
    fn engage_labels_restrict_loose_parts() {
        let sel = selector(settings());
        let mut state = AimState::new();
        let now = Instant::now();
        let input = set(vec![
            det("head", 45.0, 45.0, 55.0, 55.0),
            det("legs", 60.0, 60.0, 70.0, 70.0),
        ]);
        let out = sel.evaluate(&mut state, Some(&input), now);
        assert_eq!(out.target.expect("target").detection.label, "head");

        let mut any_part = settings();
        any_part.engage_labels = None;
        let sel = selector(any_part);
        let legs_only = set(vec![det("legs", 60.0, 60.0, 70.0, 70.0)]);
        state.last_focus = Some(now);
        let out = sel.evaluate(&mut state, Some(&legs_only), now);
        assert_eq!(out.target.expect("legs").detection.label, "legs");
    }

    #[test]
    fn equidistant_candidates_resolve_to_first_encountered() {
        let mut no_trigger = settings();
        no_trigger.trigger_labels.clear();
        let sel = selector(no_trigger);
        let left = det("enemy", 0.0, 40.0, 20.0, 60.0);
        let right = det("enemy", 80.0, 40.0, 100.0, 60.0);
        let input = set(vec![left, right]);
        for _ in 0..10 {
            let out = sel.evaluate(&mut AimState::new(), Some(&input), Instant::now());
            assert_eq!(out.target.expect("target").index, 0);
        }
    }
}
