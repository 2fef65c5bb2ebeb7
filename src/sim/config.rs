//! Difficulty / spawn configuration resolver
//!
//! Merges the base spawn parameters, a level's overrides and the difficulty
//! mode into one normalized [`SpawnConfig`]. Resolution happens once per
//! level; the spawner and enemy code read the result without re-deriving
//! defaults.

use serde::{Deserialize, Serialize};

use crate::tuning::{DifficultyMode, EnemyWeights, LevelSpawnTweaks};
use crate::{finite_or, ordered_range};

/// Probability / floor factor applied to spawn counts under assist mode
pub const ASSIST_DENSITY: f32 = 0.7;

/// Fully resolved spawn parameters for one level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Mean gap between asteroid batches (default 1400 ms)
    pub asteroid_interval_ms: f32,
    /// Fractional jitter applied to the asteroid gap (default 0.3)
    pub asteroid_jitter: f32,
    /// Asteroids per batch before scaling (default 1..=2)
    pub asteroid_batch: (u32, u32),
    /// Gap between random waves (default 3800..6200 ms)
    pub wave_interval_ms: (f32, f32),
    /// Global spawn count multiplier (default 1.0)
    pub density: f32,
    /// Enemy velocity multiplier from difficulty (default 1.0)
    pub speed: f32,
    /// Theme-driven velocity multiplier (default 1.0)
    pub theme_speed: f32,
    /// Enemy hit point multiplier (default 1.0)
    pub hp: f32,
    /// Enemy fire-rate multiplier (default 1.0)
    pub fire_rate: f32,
    /// Strafer shot cooldown range (default 1400..2400 ms)
    pub strafer_fire_ms: (f32, f32),
    /// Turret shot cooldown range (default 1600..2600 ms)
    pub turret_fire_ms: (f32, f32),
    /// Drones spawned by a dying splitter (default 2..=3)
    pub splitter_children: (u32, u32),
    /// Shield pulse cooldown range (default 3000..4500 ms)
    pub shield_interval_ms: (f32, f32),
    /// Shield pulse radius (default 170 px)
    pub shield_radius: f32,
    /// Max enemies one emitter keeps shielded (default 3)
    pub shield_cap: u32,
    /// Shield lifetime (default 4000 ms)
    pub shield_duration_ms: f32,
    /// Enemy bullet speed (default 240 px/s)
    pub enemy_bullet_speed: f32,
    /// Assist mode spawn damping
    pub assist: bool,
    pub enemy_weights: EnemyWeights,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            asteroid_interval_ms: 1400.0,
            asteroid_jitter: 0.3,
            asteroid_batch: (1, 2),
            wave_interval_ms: (3800.0, 6200.0),
            density: 1.0,
            speed: 1.0,
            theme_speed: 1.0,
            hp: 1.0,
            fire_rate: 1.0,
            strafer_fire_ms: (1400.0, 2400.0),
            turret_fire_ms: (1600.0, 2600.0),
            splitter_children: (2, 3),
            shield_interval_ms: (3000.0, 4500.0),
            shield_radius: 170.0,
            shield_cap: 3,
            shield_duration_ms: 4000.0,
            enemy_bullet_speed: 240.0,
            assist: false,
            enemy_weights: EnemyWeights::default(),
        }
    }
}

impl SpawnConfig {
    /// Merge base, level overrides and difficulty into one config
    pub fn resolve(
        base: &SpawnConfig,
        tweaks: &LevelSpawnTweaks,
        weights: &EnemyWeights,
        mode: DifficultyMode,
        theme_speed: f32,
        assist: bool,
    ) -> SpawnConfig {
        let mut cfg = base.clone();

        if let Some(v) = tweaks.asteroid_interval_ms {
            cfg.asteroid_interval_ms = v;
        }
        if let Some(v) = tweaks.asteroid_batch {
            cfg.asteroid_batch = v;
        }
        if let Some(v) = tweaks.wave_interval_ms {
            cfg.wave_interval_ms = v;
        }
        if let Some(v) = tweaks.density {
            cfg.density = v;
        }
        if let Some(v) = tweaks.strafer_fire_ms {
            cfg.strafer_fire_ms = v;
        }
        if let Some(v) = tweaks.turret_fire_ms {
            cfg.turret_fire_ms = v;
        }
        if let Some(v) = tweaks.splitter_children {
            cfg.splitter_children = v;
        }
        if let Some(v) = tweaks.shield_cap {
            cfg.shield_cap = v;
        }
        if let Some(v) = tweaks.enemy_bullet_speed {
            cfg.enemy_bullet_speed = v;
        }

        cfg.enemy_weights = *weights;
        cfg.density *= mode.density();
        cfg.speed *= mode.speed();
        cfg.hp *= mode.hp();
        cfg.fire_rate *= mode.fire_rate();
        cfg.theme_speed = theme_speed;
        cfg.assist = assist;

        cfg.normalized()
    }

    /// Coalesce every numeric field to a usable value
    pub fn normalized(mut self) -> SpawnConfig {
        let d = SpawnConfig::default();

        self.asteroid_interval_ms = positive_or(self.asteroid_interval_ms, d.asteroid_interval_ms);
        self.asteroid_jitter = finite_or(self.asteroid_jitter, d.asteroid_jitter).clamp(0.0, 0.9);
        self.asteroid_batch = ordered_counts(self.asteroid_batch);
        self.wave_interval_ms = positive_range(self.wave_interval_ms, d.wave_interval_ms);
        self.density = finite_or(self.density, d.density).max(0.0);
        self.speed = positive_or(self.speed, d.speed);
        self.theme_speed = positive_or(self.theme_speed, d.theme_speed);
        self.hp = positive_or(self.hp, d.hp);
        self.fire_rate = positive_or(self.fire_rate, d.fire_rate);
        self.strafer_fire_ms = positive_range(self.strafer_fire_ms, d.strafer_fire_ms);
        self.turret_fire_ms = positive_range(self.turret_fire_ms, d.turret_fire_ms);
        self.splitter_children = ordered_counts(self.splitter_children);
        self.shield_interval_ms = positive_range(self.shield_interval_ms, d.shield_interval_ms);
        self.shield_radius = finite_or(self.shield_radius, d.shield_radius).max(0.0);
        self.shield_duration_ms = positive_or(self.shield_duration_ms, d.shield_duration_ms);
        self.enemy_bullet_speed = positive_or(self.enemy_bullet_speed, d.enemy_bullet_speed);
        self.enemy_weights = self.enemy_weights.normalized();
        self
    }

    /// Combined velocity multiplier applied at spawn time
    pub fn velocity_scale(&self) -> f32 {
        self.speed * self.theme_speed
    }

    /// Scale a cooldown by the enemy fire rate
    pub fn cooldown(&self, ms: f32) -> f32 {
        ms / self.fire_rate
    }
}

fn positive_or(value: f32, default: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        default
    }
}

fn positive_range(range: (f32, f32), default: (f32, f32)) -> (f32, f32) {
    let (lo, hi) = ordered_range(range, default);
    if lo <= 0.0 { default } else { (lo, hi) }
}

fn ordered_counts((a, b): (u32, u32)) -> (u32, u32) {
    (a.min(b), a.max(b))
}
