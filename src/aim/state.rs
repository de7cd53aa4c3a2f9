use serde::Serialize;
use std::time::Instant;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AimMode {
    #[default]
    Searching,
    Focused,
}

/// Mode plus the instant focus was last triggered directly.
///
/// Owned by the control loop and passed into every selector evaluation, so the
/// hysteresis window can be driven with any clock in tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct AimState {
    pub mode: AimMode,
    pub last_focus: Option<Instant>,
}

impl AimState {
    pub fn new() -> Self {
        Self::default()
    }
}
