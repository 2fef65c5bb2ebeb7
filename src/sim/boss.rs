//! Boss and mid-boss state machine
//!
//! The main boss enters from above, then runs one attack pattern per phase.
//! Phases advance only forward, driven by the health ratio crossing the
//! configured thresholds. Every phase entry resets the pattern scratch state,
//! cancels the beam and opens a telegraph window during which nothing fires.
//!
//! The mercy window (`GameState::boss_mercy_until`) is orthogonal to phases:
//! pattern timers keep counting down, but no attack is launched while it is
//! open. A timer that expires during mercy fires as soon as mercy ends.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::economy::spawn_weapon_drop;
use super::enemy::{fire_enemy_shot, spawn_enemy};
use super::events::{GameEvent, SoundCue};
use super::pool::BulletOwner;
use super::state::{EnemyType, ExitGate, GameState, range_f32};
use crate::consts::*;
use crate::{angle_to, finite_or, normalize_angle};

/// How long the phase-change flash runs
const SPECIAL_CUE_MS: f32 = 900.0;
/// How long the arrival banner runs
const INTRO_MS: f32 = 1200.0;

const BOSS_PARTICLE_COLOR: u32 = 7;

/// Main boss tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BossConfig {
    pub hp: f32,
    pub radius: f32,
    /// Number of phases, 1..=3
    pub max_phase: u8,
    /// Descending health-ratio breakpoints; `thresholds[n-1]` ends phase n
    pub thresholds: Vec<f32>,
    pub entry_y: f32,
    pub enter_speed: f32,
    pub base_speed: f32,
    /// Extra sweep speed per phase beyond the first
    pub phase_speed_step: f32,
    pub float_amp: f32,
    pub margin: f32,

    pub spread_ms: f32,
    pub spread_angle: f32,
    pub spread_speed: f32,

    pub ring_ms: f32,
    pub ring_waves: u32,
    pub ring_wave_gap_ms: f32,
    pub ring_count: u32,
    pub ring_speed: f32,
    pub ring_speed_step: f32,
    /// Half-width of each safe gap on the first wave (rad)
    pub ring_gap: f32,
    pub ring_gap_step: f32,

    pub escort_ms: f32,
    pub escort_count: u32,
    pub beam_cooldown_ms: f32,
    pub beam_charge_ms: f32,
    pub beam_duration_ms: f32,
    /// Total angle the beam sweeps over its duration (rad)
    pub beam_sweep: f32,
    pub beam_half_width: f32,
    pub beam_length: f32,
    pub beam_safe_lanes: u32,
    pub beam_lane_half_width: f32,

    pub bonus_score: u32,
}

impl Default for BossConfig {
    fn default() -> Self {
        Self {
            hp: 1800.0,
            radius: 64.0,
            max_phase: 3,
            thresholds: vec![0.66, 0.33],
            entry_y: 170.0,
            enter_speed: 90.0,
            base_speed: 70.0,
            phase_speed_step: 30.0,
            float_amp: 14.0,
            margin: 90.0,
            spread_ms: 1100.0,
            spread_angle: 0.22,
            spread_speed: 260.0,
            ring_ms: 2600.0,
            ring_waves: 3,
            ring_wave_gap_ms: 200.0,
            ring_count: 20,
            ring_speed: 150.0,
            ring_speed_step: 25.0,
            ring_gap: 0.22,
            ring_gap_step: 0.04,
            escort_ms: 5200.0,
            escort_count: 2,
            beam_cooldown_ms: 6500.0,
            beam_charge_ms: 900.0,
            beam_duration_ms: 2600.0,
            beam_sweep: 1.4,
            beam_half_width: 0.32,
            beam_length: 1100.0,
            beam_safe_lanes: 1,
            beam_lane_half_width: 0.07,
            bonus_score: 5000,
        }
    }
}

impl BossConfig {
    /// Clean thresholds and clamp the phase count to what they support
    pub fn normalized(mut self) -> Self {
        let d = Self::default();
        self.hp = positive(self.hp, d.hp);
        self.radius = positive(self.radius, d.radius);
        self.max_phase = self.max_phase.clamp(1, 3);

        self.thresholds.retain(|t| t.is_finite() && *t > 0.0 && *t < 1.0);
        self.thresholds.sort_by(|a, b| b.total_cmp(a));
        self.thresholds.dedup();
        self.thresholds.truncate(self.max_phase as usize - 1);
        self.max_phase = self.thresholds.len() as u8 + 1;

        self.entry_y = finite_or(self.entry_y, d.entry_y);
        self.enter_speed = positive(self.enter_speed, d.enter_speed);
        self.base_speed = finite_or(self.base_speed, d.base_speed).max(0.0);
        self.phase_speed_step = finite_or(self.phase_speed_step, d.phase_speed_step).max(0.0);
        self.float_amp = finite_or(self.float_amp, d.float_amp);
        self.margin = finite_or(self.margin, d.margin).clamp(0.0, VIEW_WIDTH / 2.0 - 1.0);
        self.spread_ms = positive(self.spread_ms, d.spread_ms);
        self.spread_angle = finite_or(self.spread_angle, d.spread_angle);
        self.spread_speed = positive(self.spread_speed, d.spread_speed);
        self.ring_ms = positive(self.ring_ms, d.ring_ms);
        self.ring_wave_gap_ms = positive(self.ring_wave_gap_ms, d.ring_wave_gap_ms);
        self.ring_speed = positive(self.ring_speed, d.ring_speed);
        self.ring_speed_step = finite_or(self.ring_speed_step, d.ring_speed_step);
        self.ring_gap = finite_or(self.ring_gap, d.ring_gap).clamp(0.0, PI / 2.0);
        self.ring_gap_step = finite_or(self.ring_gap_step, d.ring_gap_step);
        self.escort_ms = positive(self.escort_ms, d.escort_ms);
        self.beam_cooldown_ms = positive(self.beam_cooldown_ms, d.beam_cooldown_ms);
        self.beam_charge_ms = finite_or(self.beam_charge_ms, d.beam_charge_ms).max(0.0);
        self.beam_duration_ms = positive(self.beam_duration_ms, d.beam_duration_ms);
        self.beam_sweep = finite_or(self.beam_sweep, d.beam_sweep);
        self.beam_half_width = positive(self.beam_half_width, d.beam_half_width);
        self.beam_length = positive(self.beam_length, d.beam_length);
        self.beam_safe_lanes = self.beam_safe_lanes.max(1);
        self.beam_lane_half_width = positive(self.beam_lane_half_width, d.beam_lane_half_width);
        self
    }

    /// Sweep speed in a phase
    pub fn speed_for_phase(&self, phase: u8) -> f32 {
        self.base_speed + self.phase_speed_step * phase.saturating_sub(1) as f32
    }
}

/// Mid-boss tuning: one phase, no thresholds, no beam
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidBossConfig {
    pub hp: f32,
    pub radius: f32,
    pub entry_y: f32,
    pub enter_speed: f32,
    pub speed: f32,
    pub margin: f32,
    pub burst_ms: f32,
    pub burst_count: u32,
    pub burst_speed: f32,
    pub spread_ms: f32,
    pub spread_angle: f32,
    pub spread_speed: f32,
    pub bonus_score: u32,
}

impl Default for MidBossConfig {
    fn default() -> Self {
        Self {
            hp: 500.0,
            radius: 44.0,
            entry_y: 150.0,
            enter_speed: 110.0,
            speed: 110.0,
            margin: 70.0,
            burst_ms: 2600.0,
            burst_count: 14,
            burst_speed: 170.0,
            spread_ms: 1400.0,
            spread_angle: 0.25,
            spread_speed: 230.0,
            bonus_score: 1500,
        }
    }
}

impl MidBossConfig {
    pub fn normalized(mut self) -> Self {
        let d = Self::default();
        self.hp = positive(self.hp, d.hp);
        self.radius = positive(self.radius, d.radius);
        self.entry_y = finite_or(self.entry_y, d.entry_y);
        self.enter_speed = positive(self.enter_speed, d.enter_speed);
        self.speed = finite_or(self.speed, d.speed).max(0.0);
        self.margin = finite_or(self.margin, d.margin).clamp(0.0, VIEW_WIDTH / 2.0 - 1.0);
        self.burst_ms = positive(self.burst_ms, d.burst_ms);
        self.burst_speed = positive(self.burst_speed, d.burst_speed);
        self.spread_ms = positive(self.spread_ms, d.spread_ms);
        self.spread_angle = finite_or(self.spread_angle, d.spread_angle);
        self.spread_speed = positive(self.spread_speed, d.spread_speed);
        self
    }
}

fn positive(value: f32, default: f32) -> f32 {
    if value.is_finite() && value > 0.0 { value } else { default }
}

/// Which boss this is, with its tuning
#[derive(Debug, Clone, PartialEq)]
pub enum BossKind {
    Main(BossConfig),
    Mid(MidBossConfig),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BossStage {
    /// Descending toward `target_y`; invulnerable and silent
    Entering { target_y: f32 },
    Active,
}

/// Phase 1 scratch: aimed three-shot spread
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadState {
    pub cooldown_ms: f32,
}

/// Phase 2 scratch: multi-wave ring bursts
#[derive(Debug, Clone, PartialEq)]
pub struct RingState {
    pub cooldown_ms: f32,
    /// Index of the next wave within the current burst
    pub wave: u32,
    pub waves_left: u32,
    pub wave_timer_ms: f32,
    /// Centre angles of the two safe gaps for this burst
    pub gaps: [f32; 2],
    pub rotation: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrageMove {
    Escort,
    Beam,
}

/// Phase 3 scratch: escorts alternating with the beam
#[derive(Debug, Clone, PartialEq)]
pub struct BarrageState {
    pub attack_timer_ms: f32,
    pub next: BarrageMove,
}

/// Mid-boss scratch
#[derive(Debug, Clone, PartialEq)]
pub struct PatrolState {
    pub burst_cooldown_ms: f32,
    pub spread_cooldown_ms: f32,
}

/// Per-phase pattern state, rebuilt on every phase entry
#[derive(Debug, Clone, PartialEq)]
pub enum PhasePattern {
    Spread(SpreadState),
    Rings(RingState),
    Barrage(BarrageState),
    Patrol(PatrolState),
}

impl PhasePattern {
    pub fn for_phase(phase: u8, cfg: &BossConfig) -> Self {
        match phase {
            1 => PhasePattern::Spread(SpreadState {
                cooldown_ms: cfg.spread_ms,
            }),
            2 => PhasePattern::Rings(RingState {
                cooldown_ms: cfg.ring_ms * 0.5,
                wave: 0,
                waves_left: 0,
                wave_timer_ms: 0.0,
                gaps: [0.0; 2],
                rotation: 0.0,
            }),
            _ => PhasePattern::Barrage(BarrageState {
                attack_timer_ms: cfg.escort_ms * 0.5,
                next: BarrageMove::Escort,
            }),
        }
    }

    pub fn for_mid(cfg: &MidBossConfig) -> Self {
        PhasePattern::Patrol(PatrolState {
            burst_cooldown_ms: cfg.burst_ms,
            spread_cooldown_ms: cfg.spread_ms,
        })
    }
}

/// Rotating area-hazard beam
#[derive(Debug, Clone, PartialEq)]
pub struct Beam {
    pub origin: Vec2,
    /// Current centre angle
    pub angle: f32,
    pub start_angle: f32,
    pub end_angle: f32,
    /// Remaining warm-up before the beam becomes harmful
    pub charge_ms: f32,
    pub elapsed_ms: f32,
    pub duration_ms: f32,
    pub half_width: f32,
    pub length: f32,
    /// Safe lane centres as offsets from `angle`; they rotate with the beam
    pub safe_lanes: Vec<f32>,
    pub lane_half_width: f32,
}

impl Beam {
    pub fn is_firing(&self) -> bool {
        self.charge_ms <= 0.0
    }

    pub fn is_done(&self) -> bool {
        self.is_firing() && self.elapsed_ms >= self.duration_ms
    }

    /// Advance charge, then the sweep from start to end angle
    pub fn update(&mut self, dt_ms: f32, origin: Vec2) {
        self.origin = origin;
        if self.charge_ms > 0.0 {
            self.charge_ms -= dt_ms;
            return;
        }
        self.elapsed_ms += dt_ms;
        let t = (self.elapsed_ms / self.duration_ms).clamp(0.0, 1.0);
        self.angle = self.start_angle + (self.end_angle - self.start_angle) * t;
    }

    /// Whether `p` sits inside the harmful part of the beam
    pub fn contains(&self, p: Vec2) -> bool {
        if !self.is_firing() {
            return false;
        }
        let d = p - self.origin;
        if d.length_squared() > self.length * self.length {
            return false;
        }
        let rel = normalize_angle(d.y.atan2(d.x) - self.angle);
        if rel.abs() > self.half_width {
            return false;
        }
        !self
            .safe_lanes
            .iter()
            .any(|lane| normalize_angle(rel - lane).abs() <= self.lane_half_width)
    }
}

/// Result of one damage application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DamageOutcome {
    pub phases_advanced: u8,
    pub defeated: bool,
}

/// The boss record
#[derive(Debug, Clone, PartialEq)]
pub struct Boss {
    pub kind: BossKind,
    pub pos: Vec2,
    pub r: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub phase: u8,
    pub max_phase: u8,
    pub thresholds: Vec<f32>,
    pub stage: BossStage,
    pub pattern: PhasePattern,
    pub beam: Option<Beam>,
    /// No attacks fire while `now` is below this
    pub telegraph_until: f64,
    pub special_cue_timer_ms: f32,
    pub warning_timer_ms: f32,
    pub intro_timer_ms: f32,
    /// Horizontal sweep direction, ±1
    pub heading: f32,
    pub float_phase: f32,
    pub base_y: f32,
}

impl Boss {
    /// Main boss just above the view, about to enter
    pub fn main(cfg: &BossConfig, hp_scale: f32) -> Self {
        let cfg = cfg.clone().normalized();
        let hp = cfg.hp * hp_scale.max(0.1);
        Self {
            pos: Vec2::new(VIEW_WIDTH / 2.0, -cfg.radius),
            r: cfg.radius,
            hp,
            max_hp: hp,
            phase: 1,
            max_phase: cfg.max_phase,
            thresholds: cfg.thresholds.clone(),
            stage: BossStage::Entering {
                target_y: cfg.entry_y,
            },
            pattern: PhasePattern::for_phase(1, &cfg),
            beam: None,
            telegraph_until: 0.0,
            special_cue_timer_ms: 0.0,
            warning_timer_ms: 0.0,
            intro_timer_ms: 0.0,
            heading: 1.0,
            float_phase: 0.0,
            base_y: cfg.entry_y,
            kind: BossKind::Main(cfg),
        }
    }

    /// Mid-boss just above the view, about to enter
    pub fn mid(cfg: &MidBossConfig, hp_scale: f32) -> Self {
        let cfg = cfg.clone().normalized();
        let hp = cfg.hp * hp_scale.max(0.1);
        Self {
            pos: Vec2::new(VIEW_WIDTH / 2.0, -cfg.radius),
            r: cfg.radius,
            hp,
            max_hp: hp,
            phase: 1,
            max_phase: 1,
            thresholds: Vec::new(),
            stage: BossStage::Entering {
                target_y: cfg.entry_y,
            },
            pattern: PhasePattern::for_mid(&cfg),
            beam: None,
            telegraph_until: 0.0,
            special_cue_timer_ms: 0.0,
            warning_timer_ms: 0.0,
            intro_timer_ms: 0.0,
            heading: 1.0,
            float_phase: 0.0,
            base_y: cfg.entry_y,
            kind: BossKind::Mid(cfg),
        }
    }

    pub fn is_mid(&self) -> bool {
        matches!(self.kind, BossKind::Mid(_))
    }

    pub fn is_entering(&self) -> bool {
        matches!(self.stage, BossStage::Entering { .. })
    }

    pub fn is_telegraphing(&self, now: f64) -> bool {
        now < self.telegraph_until
    }

    pub fn health_ratio(&self) -> f32 {
        if self.max_hp > 0.0 {
            (self.hp / self.max_hp).max(0.0)
        } else {
            0.0
        }
    }

    /// Subtract HP, then walk every threshold the new ratio has dropped
    /// below. Phase only moves forward and never passes `max_phase`.
    pub fn apply_damage(&mut self, amount: f32, now: f64) -> DamageOutcome {
        let amount = finite_or(amount, 0.0).max(0.0);
        self.hp -= amount;

        let mut outcome = DamageOutcome::default();
        let ratio = self.health_ratio();
        while self.phase < self.max_phase {
            let Some(&threshold) = self.thresholds.get(self.phase as usize - 1) else {
                break;
            };
            if ratio >= threshold {
                break;
            }
            self.phase += 1;
            self.enter_phase(now);
            outcome.phases_advanced += 1;
        }
        outcome.defeated = self.hp <= 0.0;
        outcome
    }

    /// Reset scratch state for the current phase
    fn enter_phase(&mut self, now: f64) {
        if let BossKind::Main(cfg) = &self.kind {
            self.pattern = PhasePattern::for_phase(self.phase, cfg);
        }
        self.beam = None;
        self.warning_timer_ms = 0.0;
        self.telegraph_until = now + TELEGRAPH_MS;
        self.special_cue_timer_ms = SPECIAL_CUE_MS;
    }

    /// Whether `p` is inside the active beam
    pub fn beam_hits(&self, p: Vec2) -> bool {
        self.beam.as_ref().is_some_and(|b| b.contains(p))
    }
}

/// Spawn the level's main boss
pub fn spawn_boss(state: &mut GameState) {
    let boss = Boss::main(&state.level_ctx.boss, state.config.hp);
    log::info!(
        "Boss arriving: hp={:.0} phases={} at t={:.1}s",
        boss.max_hp,
        boss.max_phase,
        state.time
    );
    state.boss = Some(boss);
    state.show_toast("WARNING: Capital ship inbound");
    state.emit(GameEvent::BossSpawned { mid: false });
}

/// Spawn the level's mid-boss, if it has one
pub fn spawn_mid_boss(state: &mut GameState) -> bool {
    let Some(cfg) = state.level_ctx.mid_boss.clone() else {
        return false;
    };
    let boss = Boss::mid(&cfg, state.config.hp);
    log::info!("Mid-boss arriving: hp={:.0} at t={:.1}s", boss.max_hp, state.time);
    state.boss = Some(boss);
    state.show_toast("Interceptor approaching");
    state.emit(GameEvent::BossSpawned { mid: true });
    true
}

/// Damage the boss and run phase-change cues. Returns the outcome; the
/// caller handles defeat.
pub fn damage_boss(state: &mut GameState, amount: f32) -> DamageOutcome {
    let now = state.now;
    let Some(boss) = state.boss.as_mut() else {
        return DamageOutcome::default();
    };
    if boss.is_entering() {
        return DamageOutcome::default();
    }
    let outcome = boss.apply_damage(amount, now);
    let (phase, pos) = (boss.phase, boss.pos);

    if outcome.phases_advanced > 0 && !outcome.defeated {
        log::info!("Boss entered phase {} ({} crossed)", phase, outcome.phases_advanced);
        state.spawn_particles(pos, 30, 260.0, BOSS_PARTICLE_COLOR);
        state.play(SoundCue::Explode);
        state.show_toast(format!("Phase {}", phase));
        state.emit(GameEvent::BossPhaseChanged { phase });
    }
    outcome
}

/// Remove a defeated boss and pay out its rewards exactly once
pub fn defeat_boss(state: &mut GameState) {
    let Some(boss) = state.boss.take() else {
        return;
    };
    let mid = boss.is_mid();
    let bonus = match &boss.kind {
        BossKind::Main(cfg) => cfg.bonus_score,
        BossKind::Mid(cfg) => cfg.bonus_score,
    };
    log::info!("{} defeated at t={:.1}s", if mid { "Mid-boss" } else { "Boss" }, state.time);

    state.spawn_particles(boss.pos, 90, 420.0, BOSS_PARTICLE_COLOR);
    state.play(SoundCue::BossDown);
    state.add_score(bonus);
    state.show_toast(if mid { "Interceptor down!" } else { "Capital ship destroyed!" });
    spawn_weapon_drop(state, boss.pos);
    state.emit(GameEvent::BossDefeated {
        mid,
        x: boss.pos.x,
        y: boss.pos.y,
    });

    if !mid {
        state.boss_defeated_at = Some(state.now);
    }
}

/// Open the exit gate a short delay after the main boss falls
pub fn update_exit_gate(state: &mut GameState) {
    let Some(defeated_at) = state.boss_defeated_at else {
        return;
    };
    if state.exit_gate.is_none() && state.now - defeated_at >= EXIT_GATE_DELAY_MS {
        state.exit_gate = Some(ExitGate {
            pos: Vec2::new(VIEW_WIDTH / 2.0, 260.0),
            r: 40.0,
        });
        state.show_toast("Exit gate open");
    }
}

/// Advance the boss by one tick
pub fn update_boss(state: &mut GameState, dt_ms: f32) {
    let Some(mut boss) = state.boss.take() else {
        return;
    };
    let dt = dt_ms / 1000.0;

    boss.special_cue_timer_ms = (boss.special_cue_timer_ms - dt_ms).max(0.0);
    boss.warning_timer_ms = (boss.warning_timer_ms - dt_ms).max(0.0);
    boss.intro_timer_ms = (boss.intro_timer_ms - dt_ms).max(0.0);

    if let BossStage::Entering { target_y } = boss.stage {
        let speed = match &boss.kind {
            BossKind::Main(cfg) => cfg.enter_speed,
            BossKind::Mid(cfg) => cfg.enter_speed,
        };
        boss.pos.y += speed * dt;
        if boss.pos.y >= target_y {
            boss.pos.y = target_y;
            boss.base_y = target_y;
            boss.stage = BossStage::Active;
            boss.intro_timer_ms = INTRO_MS;
            log::debug!("Boss reached station at y={:.0}", target_y);
        }
        state.boss = Some(boss);
        return;
    }

    move_boss(&mut boss, dt);

    if let Some(beam) = boss.beam.as_mut() {
        beam.update(dt_ms, boss.pos);
        if beam.is_done() {
            boss.beam = None;
        }
    }

    let can_fire = !boss.is_telegraphing(state.now) && state.boss_fire_factor() > 0.0;
    match &boss.kind {
        BossKind::Main(cfg) => {
            let cfg = cfg.clone();
            run_main_pattern(state, &mut boss, &cfg, dt_ms, can_fire);
        }
        BossKind::Mid(cfg) => {
            let cfg = cfg.clone();
            run_mid_pattern(state, &mut boss, &cfg, dt_ms, can_fire);
        }
    }

    state.boss = Some(boss);
}

/// Horizontal sweep and vertical float; sweep speed grows with phase
fn move_boss(boss: &mut Boss, dt: f32) {
    let (speed, margin, float_amp) = match &boss.kind {
        BossKind::Main(cfg) => (cfg.speed_for_phase(boss.phase), cfg.margin, cfg.float_amp),
        BossKind::Mid(cfg) => (cfg.speed, cfg.margin, 0.0),
    };
    boss.pos.x += boss.heading * speed * dt;
    if boss.pos.x < margin {
        boss.pos.x = margin;
        boss.heading = 1.0;
    } else if boss.pos.x > VIEW_WIDTH - margin {
        boss.pos.x = VIEW_WIDTH - margin;
        boss.heading = -1.0;
    }
    boss.float_phase += dt * 1.3;
    boss.pos.y = boss.base_y + boss.float_phase.sin() * float_amp;
}

fn run_main_pattern(state: &mut GameState, boss: &mut Boss, cfg: &BossConfig, dt_ms: f32, can_fire: bool) {
    let rate = state.config.fire_rate;
    let origin = boss.pos;
    match &mut boss.pattern {
        PhasePattern::Spread(s) => {
            s.cooldown_ms -= dt_ms;
            if s.cooldown_ms <= 0.0 && can_fire {
                s.cooldown_ms = cfg.spread_ms / rate;
                aimed_spread(state, origin, cfg.spread_angle, cfg.spread_speed);
            }
        }
        PhasePattern::Rings(r) => {
            if r.waves_left > 0 {
                r.wave_timer_ms -= dt_ms;
                if r.wave_timer_ms <= 0.0 && can_fire {
                    emit_ring_wave(state, origin, cfg, r);
                    r.wave += 1;
                    r.waves_left -= 1;
                    r.wave_timer_ms = cfg.ring_wave_gap_ms;
                }
            } else {
                r.cooldown_ms -= dt_ms;
                if r.cooldown_ms <= 0.0 && can_fire {
                    r.cooldown_ms = cfg.ring_ms / rate;
                    r.wave = 0;
                    r.waves_left = cfg.ring_waves.max(1);
                    r.wave_timer_ms = 0.0;
                    let aim = angle_to(origin, state.player.pos);
                    // Lanes flank the player so a short sidestep always clears
                    r.gaps = [aim - 0.6, aim + 0.6];
                    r.rotation = range_f32(&mut state.rng, 0.0, TAU);
                }
            }
        }
        PhasePattern::Barrage(b) => {
            if boss.beam.is_none() {
                b.attack_timer_ms -= dt_ms;
                if b.attack_timer_ms <= 0.0 && can_fire {
                    match b.next {
                        BarrageMove::Escort => {
                            spawn_escorts(state, origin, cfg.escort_count);
                            b.attack_timer_ms = cfg.escort_ms;
                            b.next = BarrageMove::Beam;
                        }
                        BarrageMove::Beam => {
                            boss.beam = Some(charge_beam(state, origin, cfg));
                            boss.warning_timer_ms = cfg.beam_charge_ms;
                            b.attack_timer_ms = cfg.beam_cooldown_ms / rate;
                            b.next = BarrageMove::Escort;
                        }
                    }
                }
            }
        }
        PhasePattern::Patrol(_) => {}
    }
}

fn run_mid_pattern(state: &mut GameState, boss: &mut Boss, cfg: &MidBossConfig, dt_ms: f32, can_fire: bool) {
    let origin = boss.pos;
    let PhasePattern::Patrol(p) = &mut boss.pattern else {
        return;
    };
    p.burst_cooldown_ms -= dt_ms;
    if p.burst_cooldown_ms <= 0.0 && can_fire {
        p.burst_cooldown_ms = cfg.burst_ms;
        radial_burst(state, origin, cfg.burst_count, cfg.burst_speed);
    }
    p.spread_cooldown_ms -= dt_ms;
    if p.spread_cooldown_ms <= 0.0 && can_fire {
        p.spread_cooldown_ms = cfg.spread_ms;
        aimed_spread(state, origin, cfg.spread_angle, cfg.spread_speed);
    }
}

/// Three shots centred on the player
fn aimed_spread(state: &mut GameState, origin: Vec2, spread: f32, speed: f32) {
    let aim = angle_to(origin, state.player.pos);
    let jitter = state.weather.enemy_spread();
    let GameState {
        pool,
        enemy_bullets,
        rng,
        now,
        ..
    } = state;
    for offset in [-spread, 0.0, spread] {
        fire_enemy_shot(pool, enemy_bullets, rng, BulletOwner::Boss, origin, aim + offset, jitter, speed, *now);
    }
}

/// Evenly spaced ring with a random rotation
fn radial_burst(state: &mut GameState, origin: Vec2, count: u32, speed: f32) {
    let rotation = range_f32(&mut state.rng, 0.0, TAU);
    let jitter = state.weather.enemy_spread();
    let GameState {
        pool,
        enemy_bullets,
        rng,
        now,
        ..
    } = state;
    for i in 0..count {
        let angle = rotation + TAU * i as f32 / count as f32;
        fire_enemy_shot(pool, enemy_bullets, rng, BulletOwner::Boss, origin, angle, jitter, speed, *now);
    }
}

/// One ring of a burst; later waves are faster, wider and have wider gaps
fn emit_ring_wave(state: &mut GameState, origin: Vec2, cfg: &BossConfig, ring: &RingState) {
    let wave = ring.wave as f32;
    let count = cfg.ring_count + 2 * ring.wave;
    let speed = cfg.ring_speed + cfg.ring_speed_step * wave;
    let width = ENEMY_BULLET_RADIUS + wave;
    let gap = cfg.ring_gap + cfg.ring_gap_step * wave;
    let jitter = state.weather.enemy_spread();

    let GameState {
        pool,
        enemy_bullets,
        rng,
        now,
        ..
    } = state;
    for i in 0..count {
        let angle = ring.rotation + TAU * i as f32 / count as f32;
        if in_gap(angle, &ring.gaps, gap) {
            continue;
        }
        fire_enemy_shot(pool, enemy_bullets, rng, BulletOwner::Boss, origin, angle, jitter, speed, *now);
        if let Some(b) = enemy_bullets.last_mut() {
            b.r = width;
        }
    }
}

/// Whether `angle` falls inside any safe gap
pub fn in_gap(angle: f32, gaps: &[f32], half_width: f32) -> bool {
    gaps.iter()
        .any(|g| normalize_angle(angle - g).abs() <= half_width)
}

fn spawn_escorts(state: &mut GameState, origin: Vec2, count: u32) {
    for i in 0..count {
        let side = if i % 2 == 0 { -1.0 } else { 1.0 };
        let offset = Vec2::new(side * (60.0 + 20.0 * (i / 2) as f32), 30.0);
        spawn_enemy(state, EnemyType::Drone, origin + offset);
    }
    state.play(SoundCue::Zap);
    log::debug!("Boss launched {} escorts", count);
}

/// Start a beam charging; it sweeps across the lower half of the field
fn charge_beam(state: &mut GameState, origin: Vec2, cfg: &BossConfig) -> Beam {
    let dir = if state.rng.random_bool(0.5) { 1.0 } else { -1.0 };
    let start_angle = FRAC_PI_2 - dir * cfg.beam_sweep / 2.0;
    let end_angle = FRAC_PI_2 + dir * cfg.beam_sweep / 2.0;
    let lane_span = (cfg.beam_half_width - cfg.beam_lane_half_width).max(0.0) * 0.8;
    let safe_lanes = (0..cfg.beam_safe_lanes)
        .map(|_| range_f32(&mut state.rng, -lane_span, lane_span))
        .collect();
    state.play(SoundCue::Zap);
    Beam {
        origin,
        angle: start_angle,
        start_angle,
        end_angle,
        charge_ms: cfg.beam_charge_ms,
        elapsed_ms: 0.0,
        duration_ms: cfg.beam_duration_ms,
        half_width: cfg.beam_half_width,
        length: cfg.beam_length,
        safe_lanes,
        lane_half_width: cfg.beam_lane_half_width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::{DifficultyMode, LevelDef, Theme};
    use proptest::prelude::*;

    fn state() -> GameState {
        let mut level = LevelDef::fallback(2);
        level.mid_boss = Some(MidBossConfig::default());
        let mut s = GameState::new(5, &level, Theme::default(), DifficultyMode::Normal, false);
        s.weather = crate::sim::weather::Weather::calm();
        s
    }

    fn active(mut boss: Boss) -> Boss {
        if let BossStage::Entering { target_y } = boss.stage {
            boss.pos.y = target_y;
            boss.base_y = target_y;
        }
        boss.stage = BossStage::Active;
        boss
    }

    #[test]
    fn test_thresholds_normalized() {
        let cfg = BossConfig {
            max_phase: 3,
            thresholds: vec![0.2, f32::NAN, 0.7, 1.5],
            ..Default::default()
        }
        .normalized();
        assert_eq!(cfg.thresholds, vec![0.7, 0.2]);
        assert_eq!(cfg.max_phase, 3);

        let short = BossConfig {
            max_phase: 3,
            thresholds: vec![0.5],
            ..Default::default()
        }
        .normalized();
        assert_eq!(short.max_phase, 2);
    }

    #[test]
    fn test_single_hit_crosses_two_thresholds() {
        let mut boss = active(Boss::main(&BossConfig::default(), 1.0));
        let out = boss.apply_damage(boss.max_hp * 0.8, 1000.0);
        assert_eq!(out.phases_advanced, 2);
        assert_eq!(boss.phase, 3);
        assert!(!out.defeated);
        assert!(matches!(boss.pattern, PhasePattern::Barrage(_)));
        assert_eq!(boss.telegraph_until, 1000.0 + TELEGRAPH_MS);
    }

    #[test]
    fn test_phase_entry_clears_beam() {
        let mut boss = active(Boss::main(&BossConfig::default(), 1.0));
        boss.beam = Some(Beam {
            origin: Vec2::ZERO,
            angle: 0.0,
            start_angle: 0.0,
            end_angle: 1.0,
            charge_ms: 0.0,
            elapsed_ms: 0.0,
            duration_ms: 1000.0,
            half_width: 0.3,
            length: 500.0,
            safe_lanes: vec![],
            lane_half_width: 0.05,
        });
        boss.apply_damage(boss.max_hp * 0.4, 0.0);
        assert_eq!(boss.phase, 2);
        assert!(boss.beam.is_none());
    }

    #[test]
    fn test_damage_ignored_while_entering() {
        let mut s = state();
        spawn_boss(&mut s);
        let out = damage_boss(&mut s, 99999.0);
        assert_eq!(out, DamageOutcome::default());
        assert_eq!(s.boss.as_ref().unwrap().hp, s.boss.as_ref().unwrap().max_hp);
    }

    #[test]
    fn test_entrance_then_active() {
        let mut s = state();
        spawn_boss(&mut s);
        for _ in 0..400 {
            update_boss(&mut s, 20.0);
        }
        let boss = s.boss.as_ref().unwrap();
        assert_eq!(boss.stage, BossStage::Active);
        assert!(s.enemy_bullets.len() > 0);
    }

    #[test]
    fn test_mid_boss_single_burst_after_cadence() {
        let mut s = state();
        let mut mid = active(Boss::mid(&MidBossConfig::default(), 1.0));
        if let PhasePattern::Patrol(p) = &mut mid.pattern {
            p.spread_cooldown_ms = f32::MAX;
        }
        s.boss = Some(mid);

        let dt = 20.0;
        for step in 1..=130 {
            s.now = step as f64 * dt as f64;
            update_boss(&mut s, dt);
            if step < 130 {
                assert!(s.enemy_bullets.is_empty(), "burst fired early at step {}", step);
            }
        }
        assert_eq!(s.enemy_bullets.len(), 14);
    }

    #[test]
    fn test_mercy_suppresses_but_timers_run() {
        let mut s = state();
        let mut boss = active(Boss::main(&BossConfig::default(), 1.0));
        if let PhasePattern::Spread(sp) = &mut boss.pattern {
            sp.cooldown_ms = 100.0;
        }
        s.boss = Some(boss);
        s.boss_mercy_until = 1000.0;

        for step in 1..=10 {
            s.now = step as f64 * 50.0;
            update_boss(&mut s, 50.0);
        }
        assert!(s.enemy_bullets.is_empty());
        if let PhasePattern::Spread(sp) = &s.boss.as_ref().unwrap().pattern {
            assert!(sp.cooldown_ms <= 0.0);
        }

        // First tick after mercy fires immediately
        s.now = 1050.0;
        update_boss(&mut s, 50.0);
        assert_eq!(s.enemy_bullets.len(), 3);
    }

    #[test]
    fn test_telegraph_blocks_fire() {
        let mut s = state();
        let mut boss = active(Boss::main(&BossConfig::default(), 1.0));
        boss.apply_damage(boss.max_hp * 0.4, 0.0);
        if let PhasePattern::Rings(r) = &mut boss.pattern {
            r.cooldown_ms = 0.0;
        }
        s.boss = Some(boss);
        s.now = 100.0;
        update_boss(&mut s, 20.0);
        assert!(s.enemy_bullets.is_empty());
        s.now = TELEGRAPH_MS + 1.0;
        update_boss(&mut s, 20.0);
        update_boss(&mut s, 20.0);
        assert!(!s.enemy_bullets.is_empty());
    }

    fn step(s: &mut GameState, dt: f32) {
        s.now += dt as f64;
        update_boss(s, dt);
    }

    fn drones(s: &GameState) -> usize {
        s.enemies.iter().filter(|e| e.enemy_type() == EnemyType::Drone).count()
    }

    fn next_move(s: &GameState) -> Option<BarrageMove> {
        match &s.boss.as_ref()?.pattern {
            PhasePattern::Barrage(b) => Some(b.next),
            _ => None,
        }
    }

    #[test]
    fn test_barrage_alternates_escorts_and_beam() {
        let mut s = state();
        let cfg = BossConfig::default();
        let mut boss = active(Boss::main(&cfg, 1.0));
        boss.apply_damage(boss.max_hp * 0.8, 0.0);
        if let PhasePattern::Barrage(b) = &mut boss.pattern {
            b.attack_timer_ms = 0.0;
        }
        s.boss = Some(boss);
        s.now = TELEGRAPH_MS;
        let dt = 20.0;

        // Escorts first, once the phase telegraph is over
        step(&mut s, dt);
        assert_eq!(drones(&s), cfg.escort_count as usize);
        assert_eq!(next_move(&s), Some(BarrageMove::Beam));
        assert!(s.boss.as_ref().unwrap().beam.is_none());

        // Then a beam that charges before it can hurt
        let mut guard = 0;
        while s.boss.as_ref().unwrap().beam.is_none() && guard < 400 {
            step(&mut s, dt);
            guard += 1;
        }
        let boss = s.boss.as_ref().unwrap();
        let beam = boss.beam.as_ref().expect("beam charging");
        assert!(!beam.is_firing());
        assert!(boss.warning_timer_ms > 0.0);
        assert!(!boss.beam_hits(boss.pos + crate::direction(beam.angle) * 200.0));
        assert_eq!(next_move(&s), Some(BarrageMove::Escort));

        let mut fired = false;
        guard = 0;
        while s.boss.as_ref().unwrap().beam.is_some() && guard < 400 {
            step(&mut s, dt);
            fired |= s.boss.as_ref().unwrap().beam.as_ref().is_some_and(|b| b.is_firing());
            guard += 1;
        }
        assert!(fired);
        assert!(s.boss.as_ref().unwrap().beam.is_none());
        assert_eq!(drones(&s), cfg.escort_count as usize);

        // And back to escorts
        guard = 0;
        while drones(&s) == cfg.escort_count as usize && guard < 600 {
            step(&mut s, dt);
            guard += 1;
        }
        assert_eq!(drones(&s), 2 * cfg.escort_count as usize);
        assert_eq!(next_move(&s), Some(BarrageMove::Beam));
    }

    #[test]
    fn test_ring_wave_leaves_two_gaps() {
        let mut s = state();
        let cfg = BossConfig::default().normalized();
        let ring = RingState {
            cooldown_ms: 0.0,
            wave: 0,
            waves_left: 1,
            wave_timer_ms: 0.0,
            gaps: [FRAC_PI_2 - 0.6, FRAC_PI_2 + 0.6],
            rotation: 0.0,
        };
        emit_ring_wave(&mut s, Vec2::new(360.0, 200.0), &cfg, &ring);
        let fired = s.enemy_bullets.len() as u32;
        assert!(fired < cfg.ring_count);
        for b in &s.enemy_bullets {
            let a = b.vel.y.atan2(b.vel.x);
            assert!(!in_gap(a, &ring.gaps, cfg.ring_gap - 1e-4));
        }

        let later = RingState { wave: 2, ..ring.clone() };
        s.enemy_bullets.clear();
        emit_ring_wave(&mut s, Vec2::new(360.0, 200.0), &cfg, &later);
        let speed = s.enemy_bullets[0].vel.length();
        assert!((speed - (cfg.ring_speed + 2.0 * cfg.ring_speed_step)).abs() < 1e-2);
        assert_eq!(s.enemy_bullets[0].r, ENEMY_BULLET_RADIUS + 2.0);
    }

    #[test]
    fn test_beam_geometry_rotation_and_lane() {
        let mut beam = Beam {
            origin: Vec2::ZERO,
            angle: 0.0,
            start_angle: 0.0,
            end_angle: FRAC_PI_2,
            charge_ms: 100.0,
            elapsed_ms: 0.0,
            duration_ms: 1000.0,
            half_width: 0.3,
            length: 500.0,
            safe_lanes: vec![0.15],
            lane_half_width: 0.05,
        };
        let ahead = Vec2::new(200.0, 0.0);
        // Charging beams are harmless
        assert!(!beam.contains(ahead));
        beam.update(100.0, Vec2::ZERO);
        assert!(beam.contains(ahead));
        // Safe lane at +0.15 rad
        assert!(!beam.contains(crate::direction(0.15) * 200.0));
        // Out of reach
        assert!(!beam.contains(Vec2::new(600.0, 0.0)));

        // Sweep to the end: the beam now points down
        beam.update(1000.0, Vec2::ZERO);
        assert!((beam.angle - FRAC_PI_2).abs() < 1e-5);
        assert!(!beam.contains(ahead));
        assert!(beam.contains(Vec2::new(0.0, 200.0)));
        assert!(beam.is_done());
    }

    #[test]
    fn test_defeat_pays_out_once() {
        let mut s = state();
        s.boss = Some(active(Boss::main(&BossConfig::default(), 1.0)));
        s.now = 5000.0;
        defeat_boss(&mut s);
        defeat_boss(&mut s);
        assert!(s.boss.is_none());
        assert_eq!(s.weapon_drops.len(), 1);
        assert_eq!(s.boss_defeated_at, Some(5000.0));
        assert_eq!(
            s.events.iter().filter(|e| matches!(e, GameEvent::BossDefeated { .. })).count(),
            1
        );

        update_exit_gate(&mut s);
        assert!(s.exit_gate.is_none());
        s.now = 5000.0 + EXIT_GATE_DELAY_MS;
        update_exit_gate(&mut s);
        assert!(s.exit_gate.is_some());
    }

    proptest! {
        #[test]
        fn prop_phase_monotonic(hits in prop::collection::vec(0.0f32..600.0, 1..40)) {
            let mut boss = active(Boss::main(&BossConfig::default(), 1.0));
            let mut last = boss.phase;
            for (i, dmg) in hits.into_iter().enumerate() {
                let before_ratio = boss.health_ratio();
                let out = boss.apply_damage(dmg, i as f64 * 10.0);
                prop_assert!(boss.phase >= last);
                prop_assert!(boss.phase <= boss.max_phase);
                prop_assert_eq!(boss.phase - last, out.phases_advanced);
                // Phase matches the number of thresholds above the ratio
                let crossed = boss.thresholds.iter().filter(|t| boss.health_ratio() < **t).count() as u8;
                prop_assert_eq!(boss.phase, 1 + crossed);
                prop_assert!(boss.health_ratio() <= before_ratio);
                last = boss.phase;
            }
        }
    }
}
