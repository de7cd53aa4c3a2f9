//! Pointer actuators.
//!
//! The OS injection primitive is outside this crate. Shipped actuators:
//! - `LogActuator`: dry run, logs every displacement
//! - `RecordingActuator`: keeps displacements in memory (replay, tests)

/// Applies a relative pointer displacement. Failures are the actuator's concern.
pub trait PointerActuator {
    fn move_relative(&mut self, dx: i32, dy: i32);
}

/// Logs displacements instead of moving anything.
#[derive(Debug, Default)]
pub struct LogActuator {
    moves: u64,
}

impl LogActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn moves(&self) -> u64 {
        self.moves
    }
}

impl PointerActuator for LogActuator {
    fn move_relative(&mut self, dx: i32, dy: i32) {
        self.moves += 1;
        log::debug!("pointer move #{}: dx={} dy={}", self.moves, dx, dy);
    }
}

#[derive(Debug, Default)]
pub struct RecordingActuator {
    pub moves: Vec<(i32, i32)>,
}

impl RecordingActuator {
    /// Sum of all recorded displacements.
    pub fn total(&self) -> (i32, i32) {
        self.moves
            .iter()
            .fold((0, 0), |(x, y), (dx, dy)| (x + dx, y + dy))
    }
}

impl PointerActuator for RecordingActuator {
    fn move_relative(&mut self, dx: i32, dy: i32) {
        self.moves.push((dx, dy));
    }
}
