//! Collision detection and damage resolution
//!
//! Everything is circle vs circle, plus the boss beam's point test. The
//! resolution order is fixed: player bullets against enemies, player bullets
//! against the boss, then every hazard against the player. A hit that ends
//! the run stops the remaining checks for that tick.

use glam::Vec2;

use super::boss::{damage_boss, defeat_boss};
use super::economy::{clear_power, roll_weapon_drop};
use super::enemy::on_enemy_death;
use super::events::{GameEvent, SoundCue};
use super::state::{Enemy, GamePhase, GameState, PowerKind};
use crate::consts::*;

const PLAYER_PARTICLE_COLOR: u32 = 1;

/// Whether two circles touch. `pad` grows (or, negative, shrinks) the reach;
/// touching exactly at the reach counts.
#[inline]
pub fn circles_overlap(a: Vec2, ra: f32, b: Vec2, rb: f32, pad: f32) -> bool {
    let reach = ra + rb + pad;
    if reach < 0.0 {
        return false;
    }
    a.distance_squared(b) <= reach * reach
}

/// Run every collision pass for one tick. Returns true if the player was
/// defeated.
pub fn resolve_collisions(state: &mut GameState) -> bool {
    player_bullets_vs_enemies(state);
    player_bullets_vs_boss(state);
    hazards_vs_player(state)
}

/// Each bullet damages at most one enemy and is consumed by the hit.
/// A shield absorbs the hit in place of HP.
fn player_bullets_vs_enemies(state: &mut GameState) {
    let mut any_hit = false;
    for bi in (0..state.bullets.len()).rev() {
        let b = &state.bullets[bi];
        let Some(ei) = state
            .enemies
            .iter()
            .position(|e| !e.is_dead() && circles_overlap(b.pos, b.r, e.pos, e.r, 0.0))
        else {
            continue;
        };

        let bullet = state.bullets.remove(bi);
        let damage = bullet.damage;
        state.pool.release(bullet);
        any_hit = true;

        let e = &mut state.enemies[ei];
        if e.shield.take().is_some() {
            continue;
        }
        e.hp -= damage;
    }

    if any_hit {
        state.play(SoundCue::Hit);
    }

    let mut dead = Vec::new();
    for i in (0..state.enemies.len()).rev() {
        if state.enemies[i].is_dead() {
            dead.push(state.enemies.swap_remove(i));
        }
    }
    for enemy in dead {
        destroy_enemy(state, &enemy);
    }
}

/// Side effects of a destroyed enemy, once per enemy. The enemy must already
/// be out of `state.enemies`.
pub fn destroy_enemy(state: &mut GameState, enemy: &Enemy) {
    let kind = enemy.enemy_type();
    state.kills += 1;
    state.add_score(kind.score());
    state.spawn_particles(enemy.pos, 14, 200.0, 2 + kind as u32);
    state.play(SoundCue::Explode);
    on_enemy_death(state, enemy);
    roll_weapon_drop(state, enemy.pos);
    state.emit(GameEvent::EnemyKilled {
        kind,
        x: enemy.pos.x,
        y: enemy.pos.y,
    });
}

/// A boss still flying in is out of reach; shots pass it by
fn player_bullets_vs_boss(state: &mut GameState) {
    for bi in (0..state.bullets.len()).rev() {
        let Some((pos, r)) = state
            .boss
            .as_ref()
            .filter(|b| !b.is_entering())
            .map(|b| (b.pos, b.r))
        else {
            return;
        };
        let b = &state.bullets[bi];
        if !circles_overlap(b.pos, b.r, pos, r, 0.0) {
            continue;
        }
        let bullet = state.bullets.remove(bi);
        let damage = bullet.damage;
        state.pool.release(bullet);

        if damage_boss(state, damage).defeated {
            defeat_boss(state);
            return;
        }
    }
}

/// Enemy bodies, the boss body, enemy bullets and the beam, in that order
fn hazards_vs_player(state: &mut GameState) -> bool {
    let pad = PLAYER_HIT_PADDING;

    if !state.player.is_invulnerable(state.now) {
        let (ppos, pr) = (state.player.pos, state.player.r);
        if let Some(i) = state
            .enemies
            .iter()
            .position(|e| circles_overlap(ppos, pr, e.pos, e.r, pad))
        {
            // Ramming destroys the enemy too
            let enemy = state.enemies.swap_remove(i);
            destroy_enemy(state, &enemy);
            if hit_player(state) {
                return true;
            }
        }
    }

    if let Some((pos, r)) = state.boss.as_ref().map(|b| (b.pos, b.r)) {
        if circles_overlap(state.player.pos, state.player.r, pos, r, pad) && hit_player(state) {
            return true;
        }
    }

    if !state.player.is_invulnerable(state.now) {
        let (ppos, pr) = (state.player.pos, state.player.r);
        for i in (0..state.enemy_bullets.len()).rev() {
            let b = &state.enemy_bullets[i];
            if !circles_overlap(ppos, pr, b.pos, b.r, pad) {
                continue;
            }
            let bullet = state.enemy_bullets.remove(i);
            state.pool.release(bullet);
            if hit_player(state) {
                return true;
            }
            // Invulnerable now; the rest pass through
            break;
        }
    }

    let in_beam = state
        .boss
        .as_ref()
        .is_some_and(|b| b.beam_hits(state.player.pos));
    in_beam && hit_player(state)
}

/// Apply one hit to the player. Returns true when it ends the run.
///
/// Hits inside the invulnerability window are ignored. A shield power
/// absorbs the hit; otherwise a life is lost. Either way the boss holds fire
/// for the mercy window.
pub fn hit_player(state: &mut GameState) -> bool {
    let now = state.now;
    if state.player.is_invulnerable(now) || state.phase != GamePhase::Playing {
        return false;
    }
    state.player.hits_taken += 1;
    state.player.invuln_until = now + PLAYER_INVULN_MS;
    state.boss_mercy_until = now + BOSS_MERCY_MS;

    if state.player.has_power(PowerKind::Shield) {
        clear_power(state);
        state.play(SoundCue::Zap);
        let lives = state.player.lives;
        state.emit(GameEvent::PlayerHit { lives, absorbed: true });
        return false;
    }

    state.player.lives = state.player.lives.saturating_sub(1);
    let lives = state.player.lives;
    state.play(SoundCue::Hit);
    state.spawn_particles(state.player.pos, 24, 240.0, PLAYER_PARTICLE_COLOR);
    state.emit(GameEvent::PlayerHit { lives, absorbed: false });
    log::info!("Player hit, {} lives left", lives);

    if lives == 0 {
        state.phase = GamePhase::GameOver;
        state.emit(GameEvent::PlayerDefeated);
        log::info!("Game over: score={} kills={}", state.score, state.kills);
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::boss::{Boss, BossConfig, BossStage};
    use crate::sim::economy::apply_power;
    use crate::sim::enemy::spawn_enemy;
    use crate::sim::pool::BulletOwner;
    use crate::sim::state::{EnemyKind, EnemyShield, EnemyType};
    use crate::tuning::{DifficultyMode, LevelDef, Theme};
    use proptest::prelude::*;

    fn state() -> GameState {
        let mut s = GameState::new(
            4,
            &LevelDef::fallback(1),
            Theme::default(),
            DifficultyMode::Normal,
            false,
        );
        s.economy.cfg.drop_chance = 0.0;
        s
    }

    fn player_shot(s: &mut GameState, pos: Vec2, damage: f32) {
        let b = s.pool.fire(BulletOwner::Player, pos, Vec2::ZERO, BULLET_RADIUS, damage, s.now, 0);
        s.bullets.push(b);
    }

    fn enemy_shot(s: &mut GameState, pos: Vec2) {
        let b = s.pool.fire(BulletOwner::Enemy, pos, Vec2::ZERO, ENEMY_BULLET_RADIUS, 1.0, s.now, 0);
        s.enemy_bullets.push(b);
    }

    #[test]
    fn test_touching_counts() {
        assert!(circles_overlap(Vec2::ZERO, 3.0, Vec2::new(5.0, 0.0), 2.0, 0.0));
        assert!(!circles_overlap(Vec2::ZERO, 3.0, Vec2::new(5.1, 0.0), 2.0, 0.0));
        assert!(!circles_overlap(Vec2::ZERO, 1.0, Vec2::ZERO, 1.0, -3.0));
    }

    #[test]
    fn test_one_bullet_one_enemy() {
        let mut s = state();
        let pos = Vec2::new(300.0, 300.0);
        spawn_enemy(&mut s, EnemyType::Turret, pos);
        spawn_enemy(&mut s, EnemyType::Turret, pos);
        player_shot(&mut s, pos, 1.0);
        resolve_collisions(&mut s);
        assert!(s.bullets.is_empty());
        let total_hp: f32 = s.enemies.iter().map(|e| e.hp).sum();
        let full: f32 = s.enemies.iter().map(|e| e.max_hp).sum();
        assert_eq!(full - total_hp, 1.0);
        assert_eq!(s.pool.free_len(), 1);
    }

    #[test]
    fn test_shield_absorbs_hit() {
        let mut s = state();
        let pos = Vec2::new(300.0, 300.0);
        spawn_enemy(&mut s, EnemyType::Drone, pos);
        s.enemies[0].shield = Some(EnemyShield { emitter: 99, timer_ms: 1000.0 });
        player_shot(&mut s, pos, 5.0);
        resolve_collisions(&mut s);
        assert_eq!(s.enemies.len(), 1);
        assert!(s.enemies[0].shield.is_none());
        assert_eq!(s.enemies[0].hp, s.enemies[0].max_hp);
    }

    #[test]
    fn test_kill_side_effects_once() {
        let mut s = state();
        let pos = Vec2::new(300.0, 300.0);
        spawn_enemy(&mut s, EnemyType::Drone, pos);
        player_shot(&mut s, pos, 5.0);
        player_shot(&mut s, pos, 5.0);
        resolve_collisions(&mut s);
        assert!(s.enemies.is_empty());
        assert_eq!(s.kills, 1);
        assert_eq!(s.score, EnemyType::Drone.score() as u64);
        // The second bullet found nothing alive to hit
        assert_eq!(s.bullets.len(), 1);
        assert!(s.sounds.contains(&SoundCue::Explode));
    }

    #[test]
    fn test_splitter_kill_spawns_children() {
        let mut s = state();
        let pos = Vec2::new(300.0, 300.0);
        spawn_enemy(&mut s, EnemyType::Splitter, pos);
        if let EnemyKind::Splitter { child_range, .. } = &mut s.enemies[0].kind {
            *child_range = (2, 3);
        }
        s.enemies[0].hp = 1.0;
        player_shot(&mut s, pos, 1.0);
        resolve_collisions(&mut s);
        assert!((2..=3).contains(&s.enemies.len()));
        assert!(s.enemies.iter().all(|e| e.enemy_type() == EnemyType::Drone));
    }

    #[test]
    fn test_boss_defeat_once() {
        let mut s = state();
        let mut boss = Boss::main(&BossConfig::default(), 1.0);
        boss.stage = BossStage::Active;
        boss.pos = Vec2::new(360.0, 200.0);
        boss.hp = 1.0;
        s.boss = Some(boss);
        player_shot(&mut s, Vec2::new(360.0, 200.0), 2.0);
        player_shot(&mut s, Vec2::new(360.0, 200.0), 2.0);
        resolve_collisions(&mut s);
        assert!(s.boss.is_none());
        assert_eq!(s.weapon_drops.len(), 1);
        assert_eq!(s.score, 5000);
        assert!(s.sounds.contains(&SoundCue::BossDown));
    }

    #[test]
    fn test_entering_boss_lets_shots_through() {
        let mut s = state();
        let boss = Boss::main(&BossConfig::default(), 1.0);
        let pos = boss.pos;
        s.boss = Some(boss);
        player_shot(&mut s, pos, 50.0);
        resolve_collisions(&mut s);
        assert_eq!(s.bullets.len(), 1);
        let boss = s.boss.as_ref().unwrap();
        assert!(boss.is_entering());
        assert_eq!(boss.hp, boss.max_hp);
    }

    #[test]
    fn test_player_hit_invuln_and_mercy() {
        let mut s = state();
        s.now = 1000.0;
        let p = s.player.pos;
        enemy_shot(&mut s, p);
        enemy_shot(&mut s, p);
        let lives = s.player.lives;
        assert!(!resolve_collisions(&mut s));
        assert_eq!(s.player.lives, lives - 1);
        assert_eq!(s.enemy_bullets.len(), 1);
        assert_eq!(s.boss_mercy_until, 1000.0 + BOSS_MERCY_MS);
        assert_eq!(s.player.invuln_until, 1000.0 + PLAYER_INVULN_MS);

        // Still invulnerable
        s.now = 2000.0;
        resolve_collisions(&mut s);
        assert_eq!(s.player.lives, lives - 1);
    }

    #[test]
    fn test_shield_power_absorbs() {
        let mut s = state();
        let cfg = s.economy.cfg.clone();
        apply_power(&mut s.player, PowerKind::Shield, 0.0, &cfg);
        let p = s.player.pos;
        enemy_shot(&mut s, p);
        let lives = s.player.lives;
        resolve_collisions(&mut s);
        assert_eq!(s.player.lives, lives);
        assert!(s.player.power.is_none());
        assert!(s.events.contains(&GameEvent::PlayerHit { lives, absorbed: true }));
    }

    #[test]
    fn test_defeat_short_circuits() {
        let mut s = state();
        s.player.lives = 1;
        let p = s.player.pos;
        spawn_enemy(&mut s, EnemyType::Turret, p);
        enemy_shot(&mut s, p);
        assert!(resolve_collisions(&mut s));
        assert_eq!(s.phase, GamePhase::GameOver);
        // The enemy bullet pass never ran
        assert_eq!(s.enemy_bullets.len(), 1);
        assert!(s.events.contains(&GameEvent::PlayerDefeated));
    }

    proptest! {
        #[test]
        fn prop_padding_boundary(r1 in 0.5f32..50.0, r2 in 0.5f32..50.0, p in -0.4f32..20.0, extra in 0.01f32..10.0) {
            let d = r1 + r2 + p;
            let a = Vec2::ZERO;
            prop_assert!(circles_overlap(a, r1, Vec2::new(d, 0.0), r2, p));
            prop_assert!(!circles_overlap(a, r1, Vec2::new(d + extra, 0.0), r2, p));
        }
    }
}
