//! Power-up and weapon-token economy
//!
//! Timed powers (shield, rapid, boost) fall from the top on an interval and
//! never repeat the previous random type. Only one power is active at a time;
//! picking up another overwrites it. Weapon tokens drop from kills by chance,
//! from bosses always, and once per level as a fallback if none has dropped.

use glam::Vec2;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::collision::circles_overlap;
use super::events::{GameEvent, SoundCue};
use super::state::{
    ActivePower, GameState, Player, PowerKind, PowerUp, WeaponDrop, chance, range_f32, range_u32,
};
use crate::consts::*;
use crate::finite_or;

const PICKUP_RADIUS: f32 = 14.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Gap between random power-up spawns (default 16 s)
    pub interval_ms: f32,
    pub fall_speed: f32,
    /// How long an uncollected capsule stays (default 9 s); never shorter
    /// than its fall to the bottom edge
    pub lifetime_ms: f32,
    /// Active power duration (default 8 s)
    pub duration_ms: f32,
    /// Fire interval multiplier while rapid is active
    pub rapid_factor: f32,
    /// Move speed multiplier while boost is active
    pub boost_factor: f32,
    /// Weapon token chance per kill (default 0.06)
    pub drop_chance: f32,
    /// Force power-ups at the checkpoints below
    pub guaranteed_powerups: bool,
    /// Level seconds of each guaranteed power-up
    pub checkpoints_s: Vec<f32>,
    /// Level seconds by which one weapon token is guaranteed
    pub guaranteed_weapon_s: f32,
    /// Extra pickup reach
    pub pickup_padding: f32,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            interval_ms: 16_000.0,
            fall_speed: 70.0,
            lifetime_ms: 9_000.0,
            duration_ms: 8_000.0,
            rapid_factor: 0.5,
            boost_factor: 1.35,
            drop_chance: 0.06,
            guaranteed_powerups: false,
            checkpoints_s: vec![20.0, 45.0, 70.0],
            guaranteed_weapon_s: 35.0,
            pickup_padding: 6.0,
        }
    }
}

impl EconomyConfig {
    /// Coalesce fields and fold in the difficulty interval factor and assist
    pub fn normalized(mut self, interval_factor: f32, assist: bool) -> Self {
        let d = Self::default();
        let positive = |v: f32, d: f32| if v.is_finite() && v > 0.0 { v } else { d };
        let factor = positive(interval_factor, 1.0);

        self.interval_ms = positive(self.interval_ms, d.interval_ms) * factor;
        self.fall_speed = positive(self.fall_speed, d.fall_speed);
        self.lifetime_ms = positive(self.lifetime_ms, d.lifetime_ms);
        self.duration_ms = positive(self.duration_ms, d.duration_ms);
        self.rapid_factor = positive(self.rapid_factor, d.rapid_factor);
        self.boost_factor = positive(self.boost_factor, d.boost_factor);
        self.drop_chance = finite_or(self.drop_chance, d.drop_chance).clamp(0.0, 1.0);
        self.checkpoints_s.retain(|t| t.is_finite() && *t >= 0.0);
        self.checkpoints_s.sort_by(f32::total_cmp);
        self.guaranteed_weapon_s = positive(self.guaranteed_weapon_s, d.guaranteed_weapon_s);
        self.pickup_padding = finite_or(self.pickup_padding, d.pickup_padding);

        if assist {
            self.interval_ms *= 0.75;
            self.drop_chance = (self.drop_chance * 1.5).min(1.0);
        }
        self
    }
}

/// Economy timers and counters for one level
#[derive(Debug, Clone, PartialEq)]
pub struct Economy {
    pub cfg: EconomyConfig,
    pub powerup_timer_ms: f32,
    /// Type of the last randomly spawned capsule
    pub last_powerup: Option<PowerKind>,
    /// Type of the last guaranteed grant
    pub last_guaranteed_powerup: Option<PowerKind>,
    /// Guaranteed grants so far; also indexes the next checkpoint
    pub powerups_granted_l1: u32,
    pub weapon_drops_this_level: u32,
}

impl Economy {
    pub fn new(cfg: EconomyConfig) -> Self {
        Self {
            powerup_timer_ms: cfg.interval_ms,
            cfg,
            last_powerup: None,
            last_guaranteed_powerup: None,
            powerups_granted_l1: 0,
            weapon_drops_this_level: 0,
        }
    }
}

/// Random type different from `last`
pub fn pick_powerup_kind(rng: &mut Pcg32, last: Option<PowerKind>) -> PowerKind {
    let choices: Vec<PowerKind> = PowerKind::ALL
        .into_iter()
        .filter(|k| Some(*k) != last)
        .collect();
    let idx = range_u32(rng, 0, choices.len() as u32 - 1) as usize;
    choices[idx]
}

/// Next type in the fixed rotation after `last`
pub fn next_guaranteed_kind(last: Option<PowerKind>) -> PowerKind {
    match last {
        None | Some(PowerKind::Boost) => PowerKind::Shield,
        Some(PowerKind::Shield) => PowerKind::Rapid,
        Some(PowerKind::Rapid) => PowerKind::Boost,
    }
}

/// Activate `kind`, replacing any current power without stacking
pub fn apply_power(player: &mut Player, kind: PowerKind, now: f64, cfg: &EconomyConfig) {
    player.reset_stats();
    match kind {
        PowerKind::Rapid => player.fire_interval_ms *= cfg.rapid_factor,
        PowerKind::Boost => player.speed *= cfg.boost_factor,
        PowerKind::Shield => {}
    }
    player.power = Some(ActivePower {
        kind,
        until: now + cfg.duration_ms as f64,
    });
}

/// Drop the active power and restore baseline stats
pub fn clear_power(state: &mut GameState) -> Option<PowerKind> {
    let kind = state.player.power.take()?.kind;
    state.player.reset_stats();
    Some(kind)
}

/// Expiry for a pickup released at `pos`, long enough to fall off screen
fn pickup_expiry(state: &GameState, pos: Vec2) -> f64 {
    let cfg = &state.economy.cfg;
    let fall_ms = (VIEW_HEIGHT + PICKUP_RADIUS - pos.y).max(0.0) / cfg.fall_speed * 1000.0;
    state.now + cfg.lifetime_ms.max(fall_ms) as f64
}

fn spawn_powerup(state: &mut GameState, kind: PowerKind, pos: Vec2, guaranteed: bool) {
    let id = state.next_entity_id();
    let expires_at = pickup_expiry(state, pos);
    state.powerups.push(PowerUp {
        id,
        kind,
        pos,
        vel: Vec2::new(0.0, state.economy.cfg.fall_speed),
        r: PICKUP_RADIUS,
        expires_at,
        guaranteed,
    });
    log::debug!("Power-up {} at ({:.0}, {:.0}) guaranteed={}", kind.name(), pos.x, pos.y, guaranteed);
}

/// Drop a weapon token at `pos`
pub fn spawn_weapon_drop(state: &mut GameState, pos: Vec2) {
    let id = state.next_entity_id();
    let expires_at = pickup_expiry(state, pos);
    state.weapon_drops.push(WeaponDrop {
        id,
        pos,
        vel: Vec2::new(0.0, state.economy.cfg.fall_speed),
        r: PICKUP_RADIUS,
        expires_at,
    });
    state.economy.weapon_drops_this_level += 1;
}

/// Per-kill weapon token roll
pub fn roll_weapon_drop(state: &mut GameState, pos: Vec2) -> bool {
    let p = state.economy.cfg.drop_chance;
    if chance(&mut state.rng, p) {
        spawn_weapon_drop(state, pos);
        true
    } else {
        false
    }
}

/// Grant the next guaranteed power-up if a checkpoint has passed and the
/// player holds no power. At most one grant per call.
fn grant_guaranteed_powerup(state: &mut GameState) {
    let eco = &state.economy;
    if !eco.cfg.guaranteed_powerups || state.level() != 1 || state.player.power.is_some() {
        return;
    }
    let Some(&at) = eco.cfg.checkpoints_s.get(eco.powerups_granted_l1 as usize) else {
        return;
    };
    if state.time * 1000.0 < at as f64 * 1000.0 {
        return;
    }

    let kind = next_guaranteed_kind(eco.last_guaranteed_powerup);
    let pos = Vec2::new(
        state.player.pos.x.clamp(40.0, VIEW_WIDTH - 40.0),
        (state.player.pos.y - 140.0).max(60.0),
    );
    spawn_powerup(state, kind, pos, true);

    let eco = &mut state.economy;
    eco.last_guaranteed_powerup = Some(kind);
    eco.powerups_granted_l1 += 1;
    eco.powerup_timer_ms = eco.cfg.interval_ms;
    log::info!("Guaranteed {} at {:.1}s", kind.name(), state.time);
}

/// Run timers, movement, expiry and pickups for one tick
pub fn update_economy(state: &mut GameState, dt_ms: f32) {
    let dt = dt_ms / 1000.0;
    let now = state.now;

    if state.player.power.is_some_and(|p| now >= p.until) {
        if let Some(kind) = clear_power(state) {
            log::debug!("Power {} expired", kind.name());
            state.emit(GameEvent::PowerUpExpired { kind });
        }
    }

    state.economy.powerup_timer_ms -= dt_ms;
    if state.economy.powerup_timer_ms <= 0.0 {
        state.economy.powerup_timer_ms = state.economy.cfg.interval_ms;
        let kind = pick_powerup_kind(&mut state.rng, state.economy.last_powerup);
        state.economy.last_powerup = Some(kind);
        let x = range_f32(&mut state.rng, 60.0, VIEW_WIDTH - 60.0);
        spawn_powerup(state, kind, Vec2::new(x, -PICKUP_RADIUS), false);
    }

    grant_guaranteed_powerup(state);

    if state.economy.weapon_drops_this_level == 0
        && state.time >= state.economy.cfg.guaranteed_weapon_s as f64
    {
        // Released just above the ship, like a guaranteed power-up
        let pos = Vec2::new(
            state.player.pos.x.clamp(40.0, VIEW_WIDTH - 40.0),
            (state.player.pos.y - 140.0).max(60.0),
        );
        spawn_weapon_drop(state, pos);
        log::info!("Guaranteed weapon token at {:.1}s", state.time);
    }

    let bottom = VIEW_HEIGHT + PICKUP_RADIUS;
    for p in state.powerups.iter_mut() {
        p.pos += p.vel * dt;
    }
    for w in state.weapon_drops.iter_mut() {
        w.pos += w.vel * dt;
    }
    state.powerups.retain(|p| now < p.expires_at && p.pos.y <= bottom);
    state.weapon_drops.retain(|w| now < w.expires_at && w.pos.y <= bottom);

    collect_pickups(state);
}

fn collect_pickups(state: &mut GameState) {
    let pad = state.economy.cfg.pickup_padding;
    let (ppos, pr) = (state.player.pos, state.player.r);

    let mut i = 0;
    while i < state.powerups.len() {
        let p = &state.powerups[i];
        if !circles_overlap(ppos, pr, p.pos, p.r, pad) {
            i += 1;
            continue;
        }
        let kind = state.powerups.remove(i).kind;
        let cfg = state.economy.cfg.clone();
        apply_power(&mut state.player, kind, state.now, &cfg);
        state.play(SoundCue::Upgrade);
        state.show_toast(format!("{} online", kind.name()));
        state.emit(GameEvent::PowerUpCollected { kind });
    }

    let mut i = 0;
    while i < state.weapon_drops.len() {
        let w = &state.weapon_drops[i];
        if !circles_overlap(ppos, pr, w.pos, w.r, pad) {
            i += 1;
            continue;
        }
        state.weapon_drops.remove(i);
        let level = (state.player.weapon_level + 1).min(MAX_WEAPON_LEVEL);
        state.player.weapon_level = level;
        state.play(SoundCue::Upgrade);
        state.show_toast(format!("Weapon level {}", level));
        state.emit(GameEvent::WeaponUpgraded { level });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::{DifficultyMode, LevelDef, Theme};
    use rand::SeedableRng;

    fn level1() -> LevelDef {
        let mut l = LevelDef::fallback(1);
        l.economy.guaranteed_powerups = true;
        l
    }

    fn state(level: &LevelDef) -> GameState {
        GameState::new(21, level, Theme::default(), DifficultyMode::Normal, false)
    }

    #[test]
    fn test_normalized_scales_interval_and_assist() {
        let cfg = EconomyConfig::default().normalized(1.3, false);
        assert!((cfg.interval_ms - 16_000.0 * 1.3).abs() < 1e-2);
        let assisted = EconomyConfig::default().normalized(1.0, true);
        assert_eq!(assisted.interval_ms, 12_000.0);
        assert!((assisted.drop_chance - 0.09).abs() < 1e-6);
        let bad = EconomyConfig {
            interval_ms: f32::NAN,
            drop_chance: 7.0,
            ..Default::default()
        }
        .normalized(f32::INFINITY, false);
        assert_eq!(bad.interval_ms, 16_000.0);
        assert_eq!(bad.drop_chance, 1.0);
    }

    #[test]
    fn test_random_kind_never_repeats() {
        let mut rng = Pcg32::seed_from_u64(2);
        let mut last = None;
        for _ in 0..500 {
            let k = pick_powerup_kind(&mut rng, last);
            assert_ne!(Some(k), last);
            last = Some(k);
        }
    }

    #[test]
    fn test_power_overwrites_without_stacking() {
        let cfg = EconomyConfig::default();
        let mut p = Player::new(3);
        apply_power(&mut p, PowerKind::Rapid, 0.0, &cfg);
        assert_eq!(p.fire_interval_ms, PLAYER_FIRE_INTERVAL_MS * 0.5);
        apply_power(&mut p, PowerKind::Boost, 1000.0, &cfg);
        assert_eq!(p.fire_interval_ms, PLAYER_FIRE_INTERVAL_MS);
        assert_eq!(p.speed, PLAYER_SPEED * 1.35);
        assert_eq!(p.power.unwrap().until, 1000.0 + cfg.duration_ms as f64);
    }

    #[test]
    fn test_expiry_reverts_once() {
        let mut s = state(&level1());
        let cfg = s.economy.cfg.clone();
        apply_power(&mut s.player, PowerKind::Boost, 0.0, &cfg);
        s.now = cfg.duration_ms as f64;
        update_economy(&mut s, 20.0);
        update_economy(&mut s, 20.0);
        assert!(s.player.power.is_none());
        assert_eq!(s.player.speed, PLAYER_SPEED);
        let expired = s
            .events
            .iter()
            .filter(|e| matches!(e, GameEvent::PowerUpExpired { .. }))
            .count();
        assert_eq!(expired, 1);
    }

    #[test]
    fn test_guaranteed_powerup_at_checkpoint() {
        let mut s = state(&level1());
        s.economy.last_guaranteed_powerup = Some(PowerKind::Shield);
        s.time = 19.99;
        update_economy(&mut s, 20.0);
        assert!(s.powerups.iter().all(|p| !p.guaranteed));

        s.time = 20.0;
        update_economy(&mut s, 20.0);
        let granted: Vec<&PowerUp> = s.powerups.iter().filter(|p| p.guaranteed).collect();
        assert_eq!(granted.len(), 1);
        assert_ne!(granted[0].kind, PowerKind::Shield);
        assert_eq!(s.economy.powerups_granted_l1, 1);
        assert_eq!(s.economy.powerup_timer_ms, s.economy.cfg.interval_ms);

        // Not again until the next checkpoint
        s.time = 30.0;
        update_economy(&mut s, 20.0);
        assert_eq!(s.economy.powerups_granted_l1, 1);
    }

    #[test]
    fn test_guaranteed_powerup_waits_for_no_power() {
        let mut s = state(&level1());
        let cfg = s.economy.cfg.clone();
        apply_power(&mut s.player, PowerKind::Shield, 0.0, &cfg);
        s.time = 25.0;
        s.now = 100.0;
        update_economy(&mut s, 20.0);
        assert_eq!(s.economy.powerups_granted_l1, 0);
    }

    #[test]
    fn test_guaranteed_only_on_level_one() {
        let mut l = LevelDef::fallback(2);
        l.economy.guaranteed_powerups = true;
        let mut s = state(&l);
        s.time = 21.0;
        update_economy(&mut s, 20.0);
        assert_eq!(s.economy.powerups_granted_l1, 0);
    }

    #[test]
    fn test_pickup_applies_power_and_weapon_cap() {
        let mut s = state(&level1());
        s.player.weapon_level = MAX_WEAPON_LEVEL;
        let pos = s.player.pos;
        spawn_powerup(&mut s, PowerKind::Rapid, pos, false);
        spawn_weapon_drop(&mut s, pos);
        update_economy(&mut s, 1.0);
        assert!(s.player.has_power(PowerKind::Rapid));
        assert_eq!(s.player.weapon_level, MAX_WEAPON_LEVEL);
        assert!(s.powerups.is_empty() && s.weapon_drops.is_empty());
        assert!(s.sounds.contains(&SoundCue::Upgrade));
    }

    #[test]
    fn test_guaranteed_weapon_token_once() {
        let mut s = state(&LevelDef::fallback(2));
        s.time = 34.0;
        update_economy(&mut s, 20.0);
        assert_eq!(s.economy.weapon_drops_this_level, 0);
        s.time = 35.0;
        update_economy(&mut s, 20.0);
        update_economy(&mut s, 20.0);
        assert_eq!(s.economy.weapon_drops_this_level, 1);
        assert_eq!(s.weapon_drops.len(), 1);
    }

    #[test]
    fn test_idle_player_receives_guaranteed_token() {
        let mut s = state(&LevelDef::fallback(2));
        s.economy.cfg.interval_ms = f32::MAX;
        s.economy.powerup_timer_ms = f32::MAX;
        let home = s.player.pos;
        s.time = 35.0;
        for _ in 0..500 {
            s.time += 0.02;
            s.now += 20.0;
            update_economy(&mut s, 20.0);
        }
        assert_eq!(s.player.pos, home);
        assert_eq!(s.player.weapon_level, 2);
        assert!(s.weapon_drops.is_empty());
        assert!(s.events.contains(&GameEvent::WeaponUpgraded { level: 2 }));
    }

    #[test]
    fn test_top_spawned_capsule_outlives_its_fall() {
        let mut s = state(&LevelDef::fallback(2));
        s.economy.powerup_timer_ms = f32::MAX;
        spawn_powerup(&mut s, PowerKind::Rapid, Vec2::new(40.0, -PICKUP_RADIUS), false);
        let fall_ms = (VIEW_HEIGHT + 2.0 * PICKUP_RADIUS) / s.economy.cfg.fall_speed * 1000.0;
        assert!(s.powerups[0].expires_at >= fall_ms as f64 - 1e-3);

        // Fills the screen height before it is dropped
        let mut lowest = f32::MIN;
        while !s.powerups.is_empty() {
            lowest = lowest.max(s.powerups[0].pos.y);
            s.now += 20.0;
            update_economy(&mut s, 20.0);
        }
        assert!(lowest > s.player.pos.y);
    }

    #[test]
    fn test_capsules_expire_and_leave_screen() {
        let mut s = state(&LevelDef::fallback(2));
        spawn_powerup(&mut s, PowerKind::Shield, Vec2::new(100.0, VIEW_HEIGHT), false);
        spawn_powerup(&mut s, PowerKind::Rapid, Vec2::new(100.0, 100.0), false);
        update_economy(&mut s, 500.0);
        assert_eq!(s.powerups.len(), 1);
        s.now = s.powerups[0].expires_at;
        update_economy(&mut s, 1.0);
        assert!(s.powerups.is_empty());
    }
}
