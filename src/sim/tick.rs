//! Fixed timestep simulation tick
//!
//! Core game loop that advances the simulation deterministically. The order
//! of the stages below is part of the contract: input, timers and weather,
//! spawning, motion, boss, collisions, economy.

use glam::Vec2;

use super::boss::{update_boss, update_exit_gate};
use super::bullets::{Bounds, advance};
use super::collision::{circles_overlap, resolve_collisions};
use super::economy::update_economy;
use super::enemy::update_enemies;
use super::events::{GameEvent, SoundCue};
use super::pool::BulletOwner;
use super::spawner::update_spawner;
use super::state::{GamePhase, GameState, MuzzleFlash};
use crate::consts::*;
use crate::{direction, finite_or};

const MUZZLE_FLASH_MS: f64 = 60.0;
const HEAVY_SHOT_DAMAGE: f32 = 4.0;
const HEAVY_SHOT_RADIUS: f32 = 9.0;
const TWIN_OFFSET: f32 = 8.0;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickInput {
    /// Horizontal stick, -1..1
    pub move_x: f32,
    /// Vertical stick, -1..1 (positive is down)
    pub move_y: f32,
    pub fire: bool,
    pub alt_fire: bool,
    /// Halve move speed for fine dodging
    pub precision: bool,
    /// Fire continuously without holding the button
    pub auto_fire: bool,
}

/// Advance the game state by one fixed timestep of `dt` seconds
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32) {
    // Nothing moves once the level is decided
    if state.phase != GamePhase::Playing {
        return;
    }
    let dt = finite_or(dt, 0.0).clamp(0.0, 0.1);
    let dt_ms = dt * 1000.0;
    state.now += dt_ms as f64;
    state.time += dt as f64;

    if let Some(event) = state.weather.update(dt_ms, state.time, &mut state.rng) {
        state.emit(event);
    }
    let now = state.now;
    if state.toast.as_ref().is_some_and(|t| now >= t.hide_at) {
        state.toast = None;
    }
    state.muzzle_flashes.retain(|f| now < f.until);

    update_spawner(state, dt_ms);

    update_player(state, input, dt);
    update_enemies(state, dt_ms);

    let bounds = Bounds::view(CULL_MARGIN);
    let wind = state.weather.wind;
    let GameState {
        bullets,
        enemy_bullets,
        pool,
        ..
    } = state;
    advance(bullets, pool, now, &bounds, wind);
    advance(enemy_bullets, pool, now, &bounds, wind);

    update_boss(state, dt_ms);
    update_exit_gate(state);

    if resolve_collisions(state) {
        return;
    }

    update_economy(state, dt_ms);
    update_particles(state, dt);
    check_exit_gate(state);
}

/// Move the ship and fire
fn update_player(state: &mut GameState, input: &TickInput, dt: f32) {
    let dt_ms = dt * 1000.0;
    let mut stick = Vec2::new(
        finite_or(input.move_x, 0.0).clamp(-1.0, 1.0),
        finite_or(input.move_y, 0.0).clamp(-1.0, 1.0),
    );
    if stick.length_squared() > 1.0 {
        stick = stick.normalize();
    }

    let p = &mut state.player;
    let speed = if input.precision { p.speed * 0.5 } else { p.speed };
    p.vel = stick * speed;
    p.pos += p.vel * dt;
    p.pos.x = p.pos.x.clamp(p.r, VIEW_WIDTH - p.r);
    p.pos.y = p.pos.y.clamp(p.r, VIEW_HEIGHT - p.r);

    p.fire_cooldown_ms = (p.fire_cooldown_ms - dt_ms).max(0.0);
    p.alt_cooldown_ms = (p.alt_cooldown_ms - dt_ms).max(0.0);

    if (input.fire || input.auto_fire) && p.fire_cooldown_ms <= 0.0 {
        p.fire_cooldown_ms = p.fire_interval_ms;
        fire_volley(state);
    }
    if input.alt_fire && state.player.alt_cooldown_ms <= 0.0 {
        state.player.alt_cooldown_ms = PLAYER_ALT_FIRE_INTERVAL_MS;
        fire_heavy(state);
    }
}

/// Muzzle offsets and angles for each weapon level
fn volley_pattern(level: u8) -> &'static [(f32, f32)] {
    const UP: f32 = -std::f32::consts::FRAC_PI_2;
    match level {
        0 | 1 => &[(0.0, UP)],
        2 => &[(-TWIN_OFFSET, UP), (TWIN_OFFSET, UP)],
        3 => &[(0.0, UP - 0.12), (0.0, UP), (0.0, UP + 0.12)],
        _ => &[
            (0.0, UP - 0.24),
            (0.0, UP - 0.12),
            (0.0, UP),
            (0.0, UP + 0.12),
            (0.0, UP + 0.24),
        ],
    }
}

fn fire_volley(state: &mut GameState) {
    let level = state.player.weapon_level;
    let muzzle = state.player.pos - Vec2::new(0.0, state.player.r);
    for &(dx, angle) in volley_pattern(level) {
        let mut b = state.pool.fire(
            BulletOwner::Player,
            muzzle + Vec2::new(dx, 0.0),
            direction(angle) * PLAYER_BULLET_SPEED,
            BULLET_RADIUS,
            1.0,
            state.now,
            0,
        );
        b.level = level;
        state.bullets.push(b);
    }
    state.muzzle_flashes.push(MuzzleFlash {
        pos: muzzle,
        until: state.now + MUZZLE_FLASH_MS,
    });
    state.play(SoundCue::Pew);
}

/// Slow, heavy single shot
fn fire_heavy(state: &mut GameState) {
    let muzzle = state.player.pos - Vec2::new(0.0, state.player.r);
    let b = state.pool.fire(
        BulletOwner::Player,
        muzzle,
        Vec2::new(0.0, -PLAYER_BULLET_SPEED * 0.6),
        HEAVY_SHOT_RADIUS,
        HEAVY_SHOT_DAMAGE,
        state.now,
        1,
    );
    state.bullets.push(b);
    state.muzzle_flashes.push(MuzzleFlash {
        pos: muzzle,
        until: state.now + MUZZLE_FLASH_MS,
    });
    state.play(SoundCue::Pew);
}

fn update_particles(state: &mut GameState, dt: f32) {
    for p in state.particles.iter_mut() {
        p.pos += p.vel * dt;
        p.vel *= 0.96;
        p.life -= dt * 1.6;
    }
    state.particles.retain(|p| p.life > 0.0);
}

/// Touching the exit gate completes the level
fn check_exit_gate(state: &mut GameState) {
    let Some(gate) = state.exit_gate.as_ref() else {
        return;
    };
    if !circles_overlap(state.player.pos, state.player.r, gate.pos, gate.r, 0.0) {
        return;
    }
    state.phase = GamePhase::LevelComplete;
    state.play(SoundCue::Upgrade);
    let level = state.level();
    state.emit(GameEvent::LevelComplete { level });
    log::info!("Level {} complete: score={} kills={}", level, state.score, state.kills);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::ExitGate;
    use crate::tuning::{DifficultyMode, LevelDef, LevelTable, Theme};

    fn state(seed: u64) -> GameState {
        let table = LevelTable::builtin();
        let level = table.level(1).cloned().unwrap_or_else(|| LevelDef::fallback(1));
        GameState::new(seed, &level, table.theme(&level.theme), DifficultyMode::Normal, false)
    }

    fn quiet(seed: u64) -> GameState {
        let mut s = GameState::new(seed, &LevelDef::fallback(2), Theme::default(), DifficultyMode::Normal, false);
        s.weather = crate::sim::weather::Weather::calm();
        s.spawner.asteroid_timer_ms = f32::MAX;
        s.spawner.wave_timer_ms = f32::MAX;
        s
    }

    #[test]
    fn test_weapon_levels_volley_sizes() {
        for (level, expected) in [(1u8, 1usize), (2, 2), (3, 3), (4, 5)] {
            let mut s = quiet(1);
            s.player.weapon_level = level;
            let input = TickInput {
                fire: true,
                ..Default::default()
            };
            tick(&mut s, &input, SIM_DT);
            assert_eq!(s.bullets.len(), expected, "level {}", level);
            assert!(s.bullets.iter().all(|b| b.level == level));
            assert_eq!(s.muzzle_flashes.len(), 1);
            assert!(s.sounds.contains(&SoundCue::Pew));
        }
    }

    #[test]
    fn test_fire_cooldown_and_auto_fire() {
        let mut s = quiet(2);
        let input = TickInput {
            auto_fire: true,
            ..Default::default()
        };
        // 160 ms interval at 120 Hz: 2 volleys in 200 ms
        for _ in 0..24 {
            tick(&mut s, &input, SIM_DT);
        }
        assert_eq!(s.bullets.len(), 2);
    }

    #[test]
    fn test_alt_fire_heavy_shot() {
        let mut s = quiet(3);
        let input = TickInput {
            alt_fire: true,
            ..Default::default()
        };
        tick(&mut s, &input, SIM_DT);
        tick(&mut s, &input, SIM_DT);
        assert_eq!(s.bullets.len(), 1);
        assert_eq!(s.bullets[0].damage, HEAVY_SHOT_DAMAGE);
    }

    #[test]
    fn test_precision_halves_movement() {
        let mut a = quiet(4);
        let mut b = quiet(4);
        let fast = TickInput {
            move_x: 1.0,
            ..Default::default()
        };
        let slow = TickInput {
            precision: true,
            ..fast
        };
        let start = a.player.pos.x;
        tick(&mut a, &fast, 0.1);
        tick(&mut b, &slow, 0.1);
        let da = a.player.pos.x - start;
        let db = b.player.pos.x - start;
        assert!((da - 2.0 * db).abs() < 1e-3);
    }

    #[test]
    fn test_player_stays_in_view() {
        let mut s = quiet(5);
        let input = TickInput {
            move_x: -1.0,
            move_y: 1.0,
            ..Default::default()
        };
        for _ in 0..600 {
            tick(&mut s, &input, SIM_DT);
        }
        assert_eq!(s.player.pos.x, s.player.r);
        assert_eq!(s.player.pos.y, VIEW_HEIGHT - s.player.r);
    }

    #[test]
    fn test_exit_gate_completes_level() {
        let mut s = quiet(6);
        s.exit_gate = Some(ExitGate {
            pos: s.player.pos,
            r: 40.0,
        });
        tick(&mut s, &TickInput::default(), SIM_DT);
        assert_eq!(s.phase, GamePhase::LevelComplete);
        assert!(s.events.contains(&GameEvent::LevelComplete { level: 2 }));

        // Frozen afterwards
        let now = s.now;
        tick(&mut s, &TickInput::default(), SIM_DT);
        assert_eq!(s.now, now);
    }

    #[test]
    fn test_toast_hides() {
        let mut s = quiet(7);
        s.show_toast("hello");
        for _ in 0..((TOAST_MS / 1000.0 * 120.0) as usize + 2) {
            tick(&mut s, &TickInput::default(), SIM_DT);
        }
        assert!(s.toast.is_none());
    }

    #[test]
    fn test_determinism() {
        // Two states with same seed should produce identical results
        let mut a = state(99_999);
        let mut b = state(99_999);
        for i in 0..2400 {
            let input = TickInput {
                move_x: ((i / 90) % 3) as f32 - 1.0,
                fire: i % 7 != 0,
                ..Default::default()
            };
            tick(&mut a, &input, SIM_DT);
            tick(&mut b, &input, SIM_DT);
        }
        assert_eq!(a.score, b.score);
        assert_eq!(a.enemies, b.enemies);
        assert_eq!(a.enemy_bullets, b.enemy_bullets);
        assert_eq!(a.player, b.player);
        assert_eq!(a.events, b.events);
    }

    #[test]
    fn test_non_finite_dt_is_ignored() {
        let mut s = quiet(8);
        tick(&mut s, &TickInput::default(), f32::NAN);
        assert_eq!(s.now, 0.0);
        assert_eq!(s.time, 0.0);
    }
}
