//! Nova Strike - A vertical arcade shooter simulation core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (enemies, boss, spawning, collisions, economy)
//! - `game`: Frame loop controller owning the simulation and its collaborators
//! - `platform`: Input source abstraction and logging setup
//! - `audio` / `render`: Collaborator interfaces the frame loop hands off to
//! - `persistence`: Key-value storage for progress, meta and settings
//! - `tuning`: Data-driven level, theme and difficulty tables

pub mod audio;
pub mod game;
pub mod persistence;
pub mod platform;
pub mod render;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use game::{Game, Services};
pub use settings::Settings;

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Fixed simulation timestep in milliseconds
    pub const SIM_DT_MS: f64 = 1000.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Playfield dimensions (portrait, origin top-left, +y down)
    pub const VIEW_WIDTH: f32 = 720.0;
    pub const VIEW_HEIGHT: f32 = 960.0;
    /// Distance outside the view before entities are culled
    pub const CULL_MARGIN: f32 = 80.0;

    /// Player defaults
    pub const PLAYER_RADIUS: f32 = 16.0;
    pub const PLAYER_SPEED: f32 = 320.0;
    pub const PLAYER_START_LIVES: u8 = 3;
    pub const PLAYER_FIRE_INTERVAL_MS: f32 = 160.0;
    pub const PLAYER_ALT_FIRE_INTERVAL_MS: f32 = 900.0;
    pub const PLAYER_BULLET_SPEED: f32 = 720.0;
    pub const PLAYER_INVULN_MS: f64 = 1500.0;
    /// Negative padding shrinks the player's hitbox
    pub const PLAYER_HIT_PADDING: f32 = -6.0;

    /// Bullets
    pub const BULLET_MAX_AGE_MS: f64 = 3000.0;
    pub const BULLET_RADIUS: f32 = 4.0;
    pub const ENEMY_BULLET_RADIUS: f32 = 5.0;

    /// Boss timing
    pub const TELEGRAPH_MS: f64 = 500.0;
    pub const BOSS_MERCY_MS: f64 = 1200.0;
    pub const EXIT_GATE_DELAY_MS: f64 = 1500.0;

    /// Weapon token level cap
    pub const MAX_WEAPON_LEVEL: u8 = 4;

    /// Visual caps
    pub const MAX_PARTICLES: usize = 400;
    pub const TOAST_MS: f64 = 2200.0;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Unit vector for an angle (0 = +x, π/2 = +y/down)
#[inline]
pub fn direction(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

/// Angle from `from` toward `to`
#[inline]
pub fn angle_to(from: Vec2, to: Vec2) -> f32 {
    let d = to - from;
    d.y.atan2(d.x)
}

/// Coalesce a non-finite value to a default
#[inline]
pub fn finite_or(value: f32, default: f32) -> f32 {
    if value.is_finite() { value } else { default }
}

/// Order a (min, max) pair and coalesce non-finite ends
#[inline]
pub fn ordered_range(range: (f32, f32), default: (f32, f32)) -> (f32, f32) {
    let lo = finite_or(range.0, default.0);
    let hi = finite_or(range.1, default.1);
    if lo <= hi { (lo, hi) } else { (hi, lo) }
}
