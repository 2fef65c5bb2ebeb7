//! Spawner and wave scheduler
//!
//! Two jittered timers drive continuous spawning: asteroid batches and
//! weighted-random enemy waves. A level may also author a schedule of waves
//! at fixed level times. Both timers and the schedule stop while a boss is
//! alive; once the main boss has been spawned they stay stopped for the rest
//! of the level.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::boss::{spawn_boss, spawn_mid_boss};
use super::config::{ASSIST_DENSITY, SpawnConfig};
use super::enemy::spawn_enemy;
use super::state::{EnemyType, GameState, chance, range_f32, range_u32};
use crate::consts::*;

/// A fixed count or an inclusive range, e.g. `3` or `[2, 4]` in level JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CountSpec {
    Fixed(u32),
    Range(u32, u32),
}

impl CountSpec {
    /// Draw the unscaled count
    pub fn base(&self, rng: &mut Pcg32) -> u32 {
        match *self {
            CountSpec::Fixed(n) => n,
            CountSpec::Range(a, b) => range_u32(rng, a.min(b), a.max(b)),
        }
    }
}

/// Placement of a wave's members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Formation {
    /// Evenly spaced across the top, or stacked at the side for strafers
    Line,
    /// Mirrored couples around a centre column
    Pair,
    Column,
    Vee,
    #[default]
    Scatter,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveParams {
    pub formation: Formation,
    /// Centre column; random when absent
    pub x: Option<f32>,
}

/// A level-authored wave at a fixed level time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledWave {
    /// Level seconds
    pub at: f32,
    pub kind: EnemyType,
    pub count: CountSpec,
    #[serde(default)]
    pub params: WaveParams,
}

/// A candidate for the random wave timer
#[derive(Debug, Clone, PartialEq)]
pub struct WavePattern {
    pub kind: EnemyType,
    pub count: CountSpec,
    pub formation: Formation,
    pub weight: f32,
}

/// Random wave candidates before level weights are applied
pub fn default_patterns() -> Vec<WavePattern> {
    vec![
        WavePattern {
            kind: EnemyType::Strafer,
            count: CountSpec::Range(3, 4),
            formation: Formation::Line,
            weight: 3.0,
        },
        WavePattern {
            kind: EnemyType::Drone,
            count: CountSpec::Range(2, 4),
            formation: Formation::Vee,
            weight: 3.0,
        },
        WavePattern {
            kind: EnemyType::Turret,
            count: CountSpec::Range(1, 2),
            formation: Formation::Pair,
            weight: 2.0,
        },
        WavePattern {
            kind: EnemyType::Splitter,
            count: CountSpec::Fixed(1),
            formation: Formation::Scatter,
            weight: 1.5,
        },
        WavePattern {
            kind: EnemyType::ShieldDrone,
            count: CountSpec::Fixed(1),
            formation: Formation::Column,
            weight: 1.0,
        },
        WavePattern {
            kind: EnemyType::Asteroid,
            count: CountSpec::Range(3, 5),
            formation: Formation::Scatter,
            weight: 1.0,
        },
    ]
}

/// Pick an index with probability proportional to its weight.
///
/// Non-positive or non-finite weights never win. The draw walks the list
/// subtracting weights; if rounding leaves it unexhausted the last eligible
/// candidate wins. Returns `None` when nothing is eligible.
pub fn pick_weighted(weights: &[f32], rng: &mut Pcg32) -> Option<usize> {
    let eligible = |w: f32| w.is_finite() && w > 0.0;
    let total: f32 = weights.iter().copied().filter(|w| eligible(*w)).sum();
    if total <= 0.0 {
        return None;
    }
    let mut draw = rng.random_range(0.0..total);
    let mut last = None;
    for (i, w) in weights.iter().copied().enumerate() {
        if !eligible(w) {
            continue;
        }
        last = Some(i);
        draw -= w;
        if draw < 0.0 {
            return Some(i);
        }
    }
    last
}

/// Scale a base spawn count by type weight and density, then apply assist
/// damping.
///
/// A positive weight and density never scale a non-zero base below one.
/// Under assist a count of one survives with probability [`ASSIST_DENSITY`]
/// and larger counts are floored, never below one.
pub fn resolve_count(base: u32, type_weight: f32, density: f32, assist: bool, rng: &mut Pcg32) -> u32 {
    let usable = |v: f32| v.is_finite() && v > 0.0;
    if base == 0 || !usable(type_weight) || !usable(density) {
        return 0;
    }
    let scaled = (base as f32 * type_weight * density).round();
    let count = if scaled.is_finite() { (scaled as u32).max(1) } else { base };
    if !assist {
        return count;
    }
    match count {
        1 => u32::from(chance(rng, ASSIST_DENSITY)),
        n => ((n as f32 * ASSIST_DENSITY).floor() as u32).max(1),
    }
}

/// Spawner timers and schedule cursor for one level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spawner {
    pub asteroid_timer_ms: f32,
    pub wave_timer_ms: f32,
    /// Authored waves in time order
    pub schedule: Vec<ScheduledWave>,
    /// Index of the next undispatched schedule entry
    pub cursor: usize,
    pub patterns: Vec<WavePattern>,
    pub mid_boss_spawned: bool,
    pub boss_spawned: bool,
}

impl Spawner {
    pub fn new(cfg: &SpawnConfig, schedule: &[ScheduledWave], rng: &mut Pcg32) -> Self {
        let mut schedule: Vec<ScheduledWave> =
            schedule.iter().filter(|w| w.at.is_finite()).cloned().collect();
        // Stable, so equal times keep their authored order
        schedule.sort_by(|a, b| a.at.total_cmp(&b.at));
        Self {
            asteroid_timer_ms: asteroid_gap(cfg, rng),
            wave_timer_ms: range_f32(rng, cfg.wave_interval_ms.0, cfg.wave_interval_ms.1),
            schedule,
            cursor: 0,
            patterns: default_patterns(),
            mid_boss_spawned: false,
            boss_spawned: false,
        }
    }

    /// Whether continuous spawning is stopped
    pub fn is_suspended(&self, boss_alive: bool) -> bool {
        boss_alive || self.boss_spawned
    }

    /// Undispatched schedule entries
    pub fn pending(&self) -> &[ScheduledWave] {
        &self.schedule[self.cursor.min(self.schedule.len())..]
    }
}

fn asteroid_gap(cfg: &SpawnConfig, rng: &mut Pcg32) -> f32 {
    let j = cfg.asteroid_jitter;
    cfg.asteroid_interval_ms * (1.0 + range_f32(rng, -j, j))
}

/// Run boss triggers, the schedule and both timers for one tick
pub fn update_spawner(state: &mut GameState, dt_ms: f32) {
    let mut spawner = std::mem::take(&mut state.spawner);

    check_boss_triggers(&mut spawner, state);

    let suspended = spawner.is_suspended(state.boss.is_some());
    dispatch_schedule(&mut spawner, state, suspended);

    if !suspended {
        spawner.asteroid_timer_ms -= dt_ms;
        if spawner.asteroid_timer_ms <= 0.0 {
            spawner.asteroid_timer_ms = asteroid_gap(&state.config, &mut state.rng);
            spawn_asteroid_batch(state);
        }

        spawner.wave_timer_ms -= dt_ms;
        if spawner.wave_timer_ms <= 0.0 {
            let (lo, hi) = state.config.wave_interval_ms;
            spawner.wave_timer_ms = range_f32(&mut state.rng, lo, hi);
            spawn_random_wave(&spawner.patterns, state);
        }
    }

    state.spawner = spawner;
}

/// The main boss waits for a live mid-boss to fall; a mid-boss that has not
/// appeared by the time the main boss is due is skipped.
fn check_boss_triggers(spawner: &mut Spawner, state: &mut GameState) {
    if spawner.boss_spawned || state.boss.is_some() {
        return;
    }
    if state.time >= state.level_ctx.boss_at {
        spawn_boss(state);
        spawner.boss_spawned = true;
        spawner.mid_boss_spawned = true;
        return;
    }
    if spawner.mid_boss_spawned {
        return;
    }
    if let Some(at) = state.level_ctx.mid_boss_at {
        if state.time >= at {
            spawner.mid_boss_spawned = true;
            spawn_mid_boss(state);
        }
    }
}

/// Fire every entry that has come due, in order. Entries that come due while
/// spawning is suspended are consumed without spawning.
fn dispatch_schedule(spawner: &mut Spawner, state: &mut GameState, suspended: bool) {
    while let Some(wave) = spawner.schedule.get(spawner.cursor) {
        if state.time < wave.at as f64 {
            break;
        }
        let wave = wave.clone();
        spawner.cursor += 1;
        if suspended {
            log::debug!("Skipped scheduled {} wave at {:.1}s", wave.kind.name(), wave.at);
            continue;
        }
        let base = wave.count.base(&mut state.rng);
        let spawned = spawn_wave(state, wave.kind, base, wave.params.formation, wave.params.x);
        log::debug!(
            "Scheduled wave at {:.1}s: {} x{}",
            wave.at,
            wave.kind.name(),
            spawned
        );
    }
}

fn spawn_asteroid_batch(state: &mut GameState) {
    let (lo, hi) = state.config.asteroid_batch;
    let base = range_u32(&mut state.rng, lo, hi);
    spawn_wave(state, EnemyType::Asteroid, base, Formation::Scatter, None);
}

/// Pick a pattern by its own weight; the level's type weight only scales the
/// count, in `spawn_wave`
fn spawn_random_wave(patterns: &[WavePattern], state: &mut GameState) {
    let weights: Vec<f32> = patterns.iter().map(|p| p.weight).collect();
    let Some(idx) = pick_weighted(&weights, &mut state.rng) else {
        return;
    };
    let pattern = &patterns[idx];
    let base = pattern.count.base(&mut state.rng);
    let spawned = spawn_wave(state, pattern.kind, base, pattern.formation, None);
    log::debug!("Random wave: {} x{} ({:?})", pattern.kind.name(), spawned, pattern.formation);
}

/// Resolve the count for `kind` and place the members. Returns how many
/// spawned.
pub fn spawn_wave(
    state: &mut GameState,
    kind: EnemyType,
    base: u32,
    formation: Formation,
    x: Option<f32>,
) -> u32 {
    let weight = state.config.enemy_weights.get(kind);
    let count = resolve_count(
        base,
        weight,
        state.config.density,
        state.config.assist,
        &mut state.rng,
    );
    if count == 0 {
        return 0;
    }

    let margin = kind.radius() + 40.0;
    let centre = x
        .filter(|v| v.is_finite())
        .unwrap_or_else(|| range_f32(&mut state.rng, margin, VIEW_WIDTH - margin))
        .clamp(margin, VIEW_WIDTH - margin);

    if kind == EnemyType::Strafer {
        // Strafers enter from one side and cross the screen
        let from_left = state.rng.random_bool(0.5);
        for i in 0..count {
            let stagger = 45.0 * i as f32;
            let x = if from_left {
                -kind.radius() - stagger
            } else {
                VIEW_WIDTH + kind.radius() + stagger
            };
            let y = 110.0 + if formation == Formation::Line { 0.0 } else { 40.0 * i as f32 };
            spawn_enemy(state, kind, Vec2::new(x, y));
        }
        return count;
    }

    for i in 0..count {
        let pos = match formation {
            Formation::Line => {
                let span = VIEW_WIDTH - 2.0 * margin;
                let step = span / count as f32;
                Vec2::new(margin + step * (i as f32 + 0.5), -40.0)
            }
            Formation::Pair => {
                let side = if i % 2 == 0 { -1.0 } else { 1.0 };
                Vec2::new(centre + side * 60.0, -40.0 - 50.0 * (i / 2) as f32)
            }
            Formation::Column => Vec2::new(centre, -40.0 - 60.0 * i as f32),
            Formation::Vee => {
                let rank = i.div_ceil(2) as f32;
                let side = if i % 2 == 0 { 1.0 } else { -1.0 };
                Vec2::new(centre + side * rank * 50.0, -40.0 - rank * 40.0)
            }
            Formation::Scatter => Vec2::new(
                range_f32(&mut state.rng, margin, VIEW_WIDTH - margin),
                range_f32(&mut state.rng, -90.0, -30.0),
            ),
        };
        let pos = Vec2::new(pos.x.clamp(kind.radius(), VIEW_WIDTH - kind.radius()), pos.y);
        spawn_enemy(state, kind, pos);
    }
    count
}
