//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Input polling
//! - Logging backends

use crate::sim::TickInput;

/// One poll of the input device
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputState {
    /// -1..1
    pub move_x: f32,
    /// -1..1, positive is down
    pub move_y: f32,
    pub fire: bool,
    pub alt_fire: bool,
    pub precision: bool,
    pub gamepad_connected: bool,
}

impl InputState {
    /// Sanitize the snapshot into a simulation input
    pub fn to_tick_input(&self, auto_fire: bool) -> TickInput {
        TickInput {
            move_x: crate::finite_or(self.move_x, 0.0).clamp(-1.0, 1.0),
            move_y: crate::finite_or(self.move_y, 0.0).clamp(-1.0, 1.0),
            fire: self.fire,
            alt_fire: self.alt_fire,
            precision: self.precision,
            auto_fire,
        }
    }
}

/// Anything that can be polled once per frame
pub trait InputSource {
    fn poll(&mut self) -> InputState;
}

/// No device: always idle
#[derive(Debug, Default, Clone, Copy)]
pub struct NullInput;

impl InputSource for NullInput {
    fn poll(&mut self) -> InputState {
        InputState::default()
    }
}

/// Replays a fixed sequence of polls, holding the last one
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    frames: Vec<InputState>,
    cursor: usize,
}

impl ScriptedInput {
    pub fn new(frames: Vec<InputState>) -> Self {
        Self { frames, cursor: 0 }
    }

    /// Hold one state forever
    pub fn constant(state: InputState) -> Self {
        Self::new(vec![state])
    }

    pub fn polled(&self) -> usize {
        self.cursor
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> InputState {
        let state = self
            .frames
            .get(self.cursor)
            .or(self.frames.last())
            .copied()
            .unwrap_or_default();
        self.cursor += 1;
        state
    }
}

/// Install the logging backend for this platform; safe to call twice
#[cfg(target_arch = "wasm32")]
pub fn init_logging() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        log::debug!("Logger already initialised");
    }
}

/// Install the logging backend for this platform; safe to call twice
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_input_holds_last_frame() {
        let fire = InputState {
            fire: true,
            ..Default::default()
        };
        let mut input = ScriptedInput::new(vec![InputState::default(), fire]);
        assert!(!input.poll().fire);
        assert!(input.poll().fire);
        assert!(input.poll().fire);
        assert_eq!(input.polled(), 3);
        assert_eq!(ScriptedInput::default().poll(), InputState::default());
    }

    #[test]
    fn test_tick_input_is_sanitized() {
        let raw = InputState {
            move_x: f32::NAN,
            move_y: 4.0,
            precision: true,
            ..Default::default()
        };
        let t = raw.to_tick_input(true);
        assert_eq!(t.move_x, 0.0);
        assert_eq!(t.move_y, 1.0);
        assert!(t.precision && t.auto_fire);
    }
}
