//! Enemy construction, per-variant motion and firing, death handlers
//!
//! Difficulty and theme speed factors are baked into velocities and
//! accelerations when an enemy is built; the per-tick rules never rescale.

use glam::Vec2;
use rand_pcg::Pcg32;

use super::config::SpawnConfig;
use super::pool::{Bullet, BulletOwner, BulletPool};
use super::state::{
    Enemy, EnemyKind, EnemyShield, EnemyType, GameState, Player, range_f32, range_u32,
};
use super::weather::jitter_angle;
use crate::consts::*;
use crate::{angle_to, direction};

/// Seconds of player velocity a strafer leads its shots by
const STRAFER_LEAD_S: f32 = 0.35;
const STRAFER_WOBBLE_RATE: f32 = 3.0;
const SPLITTER_WOBBLE_RATE: f32 = 2.0;
const SHIELD_DRONE_WOBBLE_RATE: f32 = 1.6;
/// Max scatter of splitter children around the parent's last position
pub const SPLITTER_CHILD_SCATTER: f32 = 8.0;

const ENEMY_BULLET_COLOUR: u32 = 2;

/// Build an enemy of `kind` at `pos`, with config scaling applied
pub fn build_enemy(
    id: u32,
    kind: EnemyType,
    pos: Vec2,
    cfg: &SpawnConfig,
    rng: &mut Pcg32,
) -> Enemy {
    let s = cfg.velocity_scale();
    let (vel, kind_data) = match kind {
        EnemyType::Asteroid => (
            Vec2::new(range_f32(rng, -60.0, 60.0), range_f32(rng, 60.0, 120.0)) * s,
            EnemyKind::Asteroid {
                spin: range_f32(rng, -2.0, 2.0),
            },
        ),
        EnemyType::Strafer => {
            let heading = if pos.x < VIEW_WIDTH / 2.0 { 1.0 } else { -1.0 };
            let (lo, hi) = cfg.strafer_fire_ms;
            (
                Vec2::new(heading * range_f32(rng, 130.0, 170.0) * s, 0.0),
                EnemyKind::Strafer {
                    fire_cooldown_ms: cfg.cooldown(range_f32(rng, lo, hi)),
                    fire_range_ms: (lo, hi),
                    wobble_phase: range_f32(rng, 0.0, std::f32::consts::TAU),
                    wobble_amp: 28.0,
                    anchor_y: pos.y,
                    drift_y: 20.0 * s,
                },
            )
        }
        EnemyType::Drone => (
            Vec2::new(0.0, 80.0 * s),
            EnemyKind::Drone {
                accel: 260.0 * s,
                max_speed: 190.0 * s,
            },
        ),
        EnemyType::Turret => {
            let (lo, hi) = cfg.turret_fire_ms;
            (
                Vec2::new(0.0, 40.0 * s),
                EnemyKind::Turret {
                    fire_cooldown_ms: cfg.cooldown(range_f32(rng, lo, hi)),
                    fire_range_ms: (lo, hi),
                },
            )
        }
        EnemyType::Splitter => (
            Vec2::ZERO,
            EnemyKind::Splitter {
                wobble_phase: range_f32(rng, 0.0, std::f32::consts::TAU),
                accel: 140.0 * s,
                max_speed: 110.0 * s,
                drift_y: 45.0 * s,
                child_range: cfg.splitter_children,
            },
        ),
        EnemyType::ShieldDrone => {
            let (lo, hi) = cfg.shield_interval_ms;
            (
                Vec2::ZERO,
                EnemyKind::ShieldDrone {
                    wobble_phase: 0.0,
                    anchor_x: pos.x,
                    amp: 60.0,
                    drift_y: 35.0 * s,
                    pulse_cooldown_ms: range_f32(rng, lo, hi) * 0.5,
                    pulse_range_ms: (lo, hi),
                    radius: cfg.shield_radius,
                    cap: cfg.shield_cap,
                    duration_ms: cfg.shield_duration_ms,
                },
            )
        }
    };

    let hp = (kind.base_hp() * cfg.hp).max(1.0);
    Enemy {
        id,
        pos,
        vel,
        r: kind.radius(),
        hp,
        max_hp: hp,
        shield: None,
        kind: kind_data,
    }
}

/// Build and insert an enemy, returning its id
pub fn spawn_enemy(state: &mut GameState, kind: EnemyType, pos: Vec2) -> u32 {
    let id = state.next_entity_id();
    let enemy = build_enemy(id, kind, pos, &state.config, &mut state.rng);
    log::debug!("Spawned {} #{} at ({:.0}, {:.0})", kind.name(), id, pos.x, pos.y);
    state.enemies.push(enemy);
    id
}

/// Fire one enemy bullet along `aim`, applying squall jitter
#[allow(clippy::too_many_arguments)]
pub fn fire_enemy_shot(
    pool: &mut BulletPool,
    out: &mut Vec<Bullet>,
    rng: &mut Pcg32,
    owner: BulletOwner,
    origin: Vec2,
    aim: f32,
    spread: f32,
    speed: f32,
    now: f64,
) {
    let angle = jitter_angle(aim, spread, rng);
    let bullet = pool.fire(
        owner,
        origin,
        direction(angle) * speed,
        ENEMY_BULLET_RADIUS,
        1.0,
        now,
        ENEMY_BULLET_COLOUR,
    );
    out.push(bullet);
}

/// A shield pulse collected during motion and applied afterwards
struct ShieldPulse {
    emitter: u32,
    pos: Vec2,
    radius: f32,
    cap: u32,
    duration_ms: f32,
}

/// Advance every enemy by one tick
pub fn update_enemies(state: &mut GameState, dt_ms: f32) {
    let dt = dt_ms / 1000.0;
    let GameState {
        enemies,
        enemy_bullets,
        pool,
        rng,
        player,
        weather,
        config,
        now,
        ..
    } = state;
    let spread = weather.enemy_spread();
    let mut pulses = Vec::new();

    for i in (0..enemies.len()).rev() {
        let e = &mut enemies[i];

        if let Some(shield) = e.shield.as_mut() {
            shield.timer_ms -= dt_ms;
            if shield.timer_ms <= 0.0 {
                e.shield = None;
            }
        }

        let alive = match &mut e.kind {
            EnemyKind::Asteroid { .. } => {
                e.pos += e.vel * dt;
                bounce_horizontal(&mut e.pos, &mut e.vel, e.r);
                true
            }
            EnemyKind::Strafer {
                fire_cooldown_ms,
                fire_range_ms,
                wobble_phase,
                wobble_amp,
                anchor_y,
                drift_y,
            } => {
                e.pos.x += e.vel.x * dt;
                *anchor_y += *drift_y * dt;
                *wobble_phase += STRAFER_WOBBLE_RATE * dt;
                e.pos.y = *anchor_y + wobble_phase.sin() * *wobble_amp;

                *fire_cooldown_ms -= dt_ms;
                if *fire_cooldown_ms <= 0.0 {
                    *fire_cooldown_ms =
                        config.cooldown(range_f32(rng, fire_range_ms.0, fire_range_ms.1));
                    let aim = angle_to(e.pos, lead_target(player));
                    fire_enemy_shot(
                        pool,
                        enemy_bullets,
                        rng,
                        BulletOwner::Enemy,
                        e.pos,
                        aim,
                        spread,
                        config.enemy_bullet_speed,
                        *now,
                    );
                }
                !exited_horizontally(e.pos.x, e.vel.x)
            }
            EnemyKind::Drone { accel, max_speed } => {
                let steer = (player.pos - e.pos).normalize_or_zero();
                e.vel += steer * *accel * dt;
                e.vel = e.vel.clamp_length_max(*max_speed);
                e.pos += e.vel * dt;
                !outside_horizontal(e.pos.x)
            }
            EnemyKind::Turret {
                fire_cooldown_ms,
                fire_range_ms,
            } => {
                e.pos += e.vel * dt;
                bounce_horizontal(&mut e.pos, &mut e.vel, e.r);

                *fire_cooldown_ms -= dt_ms;
                if *fire_cooldown_ms <= 0.0 {
                    *fire_cooldown_ms =
                        config.cooldown(range_f32(rng, fire_range_ms.0, fire_range_ms.1));
                    let aim = angle_to(e.pos, player.pos);
                    fire_enemy_shot(
                        pool,
                        enemy_bullets,
                        rng,
                        BulletOwner::Enemy,
                        e.pos,
                        aim,
                        spread,
                        config.enemy_bullet_speed,
                        *now,
                    );
                }
                true
            }
            EnemyKind::Splitter {
                wobble_phase,
                accel,
                max_speed,
                drift_y,
                ..
            } => {
                *wobble_phase += SPLITTER_WOBBLE_RATE * dt;
                let toward = (player.pos.x - e.pos.x).signum();
                let wobble = wobble_phase.sin() * 0.5;
                e.vel.x = (e.vel.x + (toward + wobble) * *accel * dt).clamp(-*max_speed, *max_speed);
                e.vel.y = *drift_y + wobble_phase.cos() * 20.0;
                e.pos += e.vel * dt;
                bounce_horizontal(&mut e.pos, &mut e.vel, e.r);
                true
            }
            EnemyKind::ShieldDrone {
                wobble_phase,
                anchor_x,
                amp,
                drift_y,
                pulse_cooldown_ms,
                pulse_range_ms,
                radius,
                cap,
                duration_ms,
            } => {
                *wobble_phase += SHIELD_DRONE_WOBBLE_RATE * dt;
                e.pos.x = *anchor_x + wobble_phase.sin() * *amp;
                e.pos.y += *drift_y * dt;

                *pulse_cooldown_ms -= dt_ms;
                if *pulse_cooldown_ms <= 0.0 {
                    *pulse_cooldown_ms = range_f32(rng, pulse_range_ms.0, pulse_range_ms.1);
                    pulses.push(ShieldPulse {
                        emitter: e.id,
                        pos: e.pos,
                        radius: *radius,
                        cap: *cap,
                        duration_ms: *duration_ms,
                    });
                }
                true
            }
        };

        // Fallback cull below the view, whatever the variant
        if !alive || e.pos.y > VIEW_HEIGHT + CULL_MARGIN {
            enemies.swap_remove(i);
        }
    }

    for pulse in pulses {
        apply_shield_pulse(enemies, &pulse);
    }
}

/// Where a strafer aims: ahead of the player along their velocity
fn lead_target(player: &Player) -> Vec2 {
    player.pos + player.vel * STRAFER_LEAD_S
}

fn bounce_horizontal(pos: &mut Vec2, vel: &mut Vec2, r: f32) {
    if (pos.x < r && vel.x < 0.0) || (pos.x > VIEW_WIDTH - r && vel.x > 0.0) {
        vel.x = -vel.x;
    }
}

fn outside_horizontal(x: f32) -> bool {
    x < -CULL_MARGIN || x > VIEW_WIDTH + CULL_MARGIN
}

/// Past the far edge in the direction of travel
fn exited_horizontally(x: f32, vx: f32) -> bool {
    (vx > 0.0 && x > VIEW_WIDTH + CULL_MARGIN) || (vx < 0.0 && x < -CULL_MARGIN)
}

/// Grant or refresh shields around an emitter, up to its cap
fn apply_shield_pulse(enemies: &mut [Enemy], pulse: &ShieldPulse) {
    let mut held = enemies
        .iter()
        .filter(|e| e.shield.is_some_and(|s| s.emitter == pulse.emitter))
        .count() as u32;
    let r2 = pulse.radius * pulse.radius;

    for e in enemies.iter_mut() {
        if e.id == pulse.emitter || e.pos.distance_squared(pulse.pos) > r2 {
            continue;
        }
        match e.shield.as_mut() {
            Some(s) if s.emitter != pulse.emitter => {}
            Some(s) => s.timer_ms = pulse.duration_ms,
            None if held < pulse.cap => {
                e.shield = Some(EnemyShield {
                    emitter: pulse.emitter,
                    timer_ms: pulse.duration_ms,
                });
                held += 1;
            }
            None => {}
        }
    }
}

/// Variant-specific side effects of a destroyed enemy. Runs once per enemy,
/// after it has been removed from `state.enemies`.
pub fn on_enemy_death(state: &mut GameState, enemy: &Enemy) {
    match enemy.kind {
        EnemyKind::Splitter { child_range, .. } => {
            let children = range_u32(&mut state.rng, child_range.0, child_range.1);
            for _ in 0..children {
                let offset = Vec2::new(
                    range_f32(&mut state.rng, -SPLITTER_CHILD_SCATTER, SPLITTER_CHILD_SCATTER),
                    range_f32(&mut state.rng, -SPLITTER_CHILD_SCATTER, SPLITTER_CHILD_SCATTER),
                ) * std::f32::consts::FRAC_1_SQRT_2;
                spawn_enemy(state, EnemyType::Drone, enemy.pos + offset);
            }
            log::debug!("Splitter #{} split into {} drones", enemy.id, children);
        }
        EnemyKind::ShieldDrone { .. } => {
            for e in state.enemies.iter_mut() {
                if e.shield.is_some_and(|s| s.emitter == enemy.id) {
                    e.shield = None;
                }
            }
        }
        EnemyKind::Asteroid { .. }
        | EnemyKind::Strafer { .. }
        | EnemyKind::Drone { .. }
        | EnemyKind::Turret { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::{DifficultyMode, LevelDef, Theme};

    fn state() -> GameState {
        let mut s = GameState::new(
            42,
            &LevelDef::fallback(1),
            Theme::default(),
            DifficultyMode::Normal,
            false,
        );
        s.weather = crate::sim::weather::Weather::calm();
        s
    }

    fn first_bullet_angle(s: &GameState) -> f32 {
        let v = s.enemy_bullets[0].vel;
        v.y.atan2(v.x)
    }

    #[test]
    fn test_asteroid_reflects_on_edge() {
        let mut s = state();
        spawn_enemy(&mut s, EnemyType::Asteroid, Vec2::new(5.0, 100.0));
        s.enemies[0].vel = Vec2::new(-50.0, 10.0);
        update_enemies(&mut s, 16.0);
        assert!(s.enemies[0].vel.x > 0.0);
    }

    #[test]
    fn test_turret_fires_exact_aim_without_squall() {
        let mut s = state();
        s.player.pos = Vec2::new(500.0, 800.0);
        spawn_enemy(&mut s, EnemyType::Turret, Vec2::new(200.0, 100.0));
        if let EnemyKind::Turret { fire_cooldown_ms, .. } = &mut s.enemies[0].kind {
            *fire_cooldown_ms = 1.0;
        }
        update_enemies(&mut s, 10.0);
        assert_eq!(s.enemy_bullets.len(), 1);
        let origin = s.enemies[0].pos;
        let expected = angle_to(origin, s.player.pos);
        assert!((first_bullet_angle(&s) - expected).abs() < 1e-5);
        // Horizontal position stays fixed
        assert_eq!(s.enemies[0].pos.x, 200.0);
    }

    #[test]
    fn test_strafer_leads_moving_player() {
        let mut s = state();
        s.player.pos = Vec2::new(360.0, 800.0);
        s.player.vel = Vec2::new(300.0, 0.0);
        spawn_enemy(&mut s, EnemyType::Strafer, Vec2::new(100.0, 200.0));
        if let EnemyKind::Strafer { fire_cooldown_ms, .. } = &mut s.enemies[0].kind {
            *fire_cooldown_ms = 0.5;
        }
        update_enemies(&mut s, 1.0);
        let origin = s.enemies[0].pos;
        let lead = angle_to(origin, lead_target(&s.player));
        let direct = angle_to(origin, s.player.pos);
        assert!((first_bullet_angle(&s) - lead).abs() < 1e-5);
        assert!(lead < direct);
    }

    #[test]
    fn test_strafer_removed_after_crossing() {
        let mut s = state();
        spawn_enemy(&mut s, EnemyType::Strafer, Vec2::new(VIEW_WIDTH + CULL_MARGIN - 1.0, 200.0));
        // Spawned on the right half, so it heads left and stays
        update_enemies(&mut s, 16.0);
        assert_eq!(s.enemies.len(), 1);
        s.enemies[0].pos.x = -CULL_MARGIN - 1.0;
        update_enemies(&mut s, 16.0);
        assert!(s.enemies.is_empty());
    }

    #[test]
    fn test_drone_steers_toward_player() {
        let mut s = state();
        s.player.pos = Vec2::new(600.0, 300.0);
        spawn_enemy(&mut s, EnemyType::Drone, Vec2::new(100.0, 300.0));
        let before = s.enemies[0].vel;
        update_enemies(&mut s, 100.0);
        let after = s.enemies[0].vel;
        // Acceleration, not an instant velocity set
        assert!(after.x > before.x);
        assert!(after.x < 190.0);
    }

    #[test]
    fn test_fallback_cull_below_view() {
        let mut s = state();
        spawn_enemy(&mut s, EnemyType::Turret, Vec2::new(300.0, VIEW_HEIGHT + CULL_MARGIN + 1.0));
        update_enemies(&mut s, 1.0);
        assert!(s.enemies.is_empty());
    }

    #[test]
    fn test_speed_factor_applied_at_spawn() {
        let mut slow = state();
        let mut fast = state();
        fast.config.speed = 2.0;
        spawn_enemy(&mut slow, EnemyType::Drone, Vec2::new(100.0, 100.0));
        spawn_enemy(&mut fast, EnemyType::Drone, Vec2::new(100.0, 100.0));
        assert!((fast.enemies[0].vel.y - 2.0 * slow.enemies[0].vel.y).abs() < 1e-4);
    }

    #[test]
    fn test_shield_pulse_respects_cap_and_foreign_emitters() {
        let mut s = state();
        s.config.shield_cap = 2;
        let emitter = spawn_enemy(&mut s, EnemyType::ShieldDrone, Vec2::new(360.0, 200.0));
        let mut others = Vec::new();
        for dx in [-40.0, -20.0, 20.0, 40.0] {
            others.push(spawn_enemy(&mut s, EnemyType::Turret, Vec2::new(360.0 + dx, 200.0)));
        }
        // One neighbour is already shielded by someone else
        s.enemies[1].shield = Some(EnemyShield {
            emitter: 999,
            timer_ms: 10_000.0,
        });
        if let EnemyKind::ShieldDrone { pulse_cooldown_ms, wobble_phase, .. } = &mut s.enemies[0].kind {
            *pulse_cooldown_ms = 1.0;
            *wobble_phase = 0.0;
        }
        update_enemies(&mut s, 1.0);

        let mine = s
            .enemies
            .iter()
            .filter(|e| e.shield.is_some_and(|sh| sh.emitter == emitter))
            .count();
        assert_eq!(mine, 2);
        let foreign = s.enemies.iter().find(|e| e.id == others[0]).unwrap();
        assert_eq!(foreign.shield.unwrap().emitter, 999);
        let me = s.enemies.iter().find(|e| e.id == emitter).unwrap();
        assert!(me.shield.is_none());
    }

    #[test]
    fn test_shield_drone_death_strips_its_shields() {
        let mut s = state();
        let emitter = spawn_enemy(&mut s, EnemyType::ShieldDrone, Vec2::new(100.0, 100.0));
        spawn_enemy(&mut s, EnemyType::Turret, Vec2::new(120.0, 100.0));
        spawn_enemy(&mut s, EnemyType::Turret, Vec2::new(140.0, 100.0));
        s.enemies[1].shield = Some(EnemyShield { emitter, timer_ms: 500.0 });
        s.enemies[2].shield = Some(EnemyShield { emitter: 77, timer_ms: 500.0 });
        let dead = s.enemies.remove(0);
        on_enemy_death(&mut s, &dead);
        assert!(s.enemies[0].shield.is_none());
        assert_eq!(s.enemies[1].shield.unwrap().emitter, 77);
    }
}
