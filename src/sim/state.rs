//! Game state and core simulation types
//!
//! [`GameState`] is the single mutable root for one level of a run. It is
//! owned by the frame loop and mutated only by the systems `tick` calls.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::boss::{Boss, BossConfig, MidBossConfig};
use super::config::SpawnConfig;
use super::economy::{Economy, EconomyConfig};
use super::events::{GameEvent, SoundCue};
use super::pool::{Bullet, BulletPool};
use super::spawner::Spawner;
use super::weather::Weather;
use crate::consts::*;
use crate::tuning::{DifficultyMode, LevelDef, Theme};

/// Current phase of the level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Active gameplay
    Playing,
    /// Player reached the exit gate
    LevelComplete,
    /// Out of lives
    GameOver,
}

/// Enemy variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyType {
    Asteroid,
    Strafer,
    Drone,
    Turret,
    Splitter,
    ShieldDrone,
}

impl EnemyType {
    pub const ALL: [EnemyType; 6] = [
        EnemyType::Asteroid,
        EnemyType::Strafer,
        EnemyType::Drone,
        EnemyType::Turret,
        EnemyType::Splitter,
        EnemyType::ShieldDrone,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EnemyType::Asteroid => "asteroid",
            EnemyType::Strafer => "strafer",
            EnemyType::Drone => "drone",
            EnemyType::Turret => "turret",
            EnemyType::Splitter => "splitter",
            EnemyType::ShieldDrone => "shield-drone",
        }
    }

    /// Base points awarded on kill
    pub fn score(&self) -> u32 {
        match self {
            EnemyType::Asteroid => 50,
            EnemyType::Strafer => 120,
            EnemyType::Drone => 80,
            EnemyType::Turret => 150,
            EnemyType::Splitter => 200,
            EnemyType::ShieldDrone => 250,
        }
    }

    /// Base hit points before the difficulty multiplier
    pub fn base_hp(&self) -> f32 {
        match self {
            EnemyType::Asteroid => 3.0,
            EnemyType::Strafer => 2.0,
            EnemyType::Drone => 1.0,
            EnemyType::Turret => 5.0,
            EnemyType::Splitter => 6.0,
            EnemyType::ShieldDrone => 4.0,
        }
    }

    pub fn radius(&self) -> f32 {
        match self {
            EnemyType::Asteroid => 22.0,
            EnemyType::Strafer => 16.0,
            EnemyType::Drone => 12.0,
            EnemyType::Turret => 20.0,
            EnemyType::Splitter => 24.0,
            EnemyType::ShieldDrone => 18.0,
        }
    }
}

/// One-hit damage shield granted by a shield-drone
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnemyShield {
    /// Id of the granting shield-drone
    pub emitter: u32,
    /// Remaining lifetime (ms)
    pub timer_ms: f32,
}

/// Variant-specific enemy data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EnemyKind {
    Asteroid {
        spin: f32,
    },
    Strafer {
        fire_cooldown_ms: f32,
        fire_range_ms: (f32, f32),
        wobble_phase: f32,
        wobble_amp: f32,
        anchor_y: f32,
        drift_y: f32,
    },
    Drone {
        accel: f32,
        max_speed: f32,
    },
    Turret {
        fire_cooldown_ms: f32,
        fire_range_ms: (f32, f32),
    },
    Splitter {
        wobble_phase: f32,
        accel: f32,
        max_speed: f32,
        drift_y: f32,
        child_range: (u32, u32),
    },
    ShieldDrone {
        wobble_phase: f32,
        anchor_x: f32,
        amp: f32,
        drift_y: f32,
        pulse_cooldown_ms: f32,
        pulse_range_ms: (f32, f32),
        radius: f32,
        cap: u32,
        duration_ms: f32,
    },
}

/// An enemy entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    pub r: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub shield: Option<EnemyShield>,
    pub kind: EnemyKind,
}

impl Enemy {
    pub fn enemy_type(&self) -> EnemyType {
        match self.kind {
            EnemyKind::Asteroid { .. } => EnemyType::Asteroid,
            EnemyKind::Strafer { .. } => EnemyType::Strafer,
            EnemyKind::Drone { .. } => EnemyType::Drone,
            EnemyKind::Turret { .. } => EnemyType::Turret,
            EnemyKind::Splitter { .. } => EnemyType::Splitter,
            EnemyKind::ShieldDrone { .. } => EnemyType::ShieldDrone,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0.0
    }
}

/// Timed player buffs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerKind {
    Shield,
    Rapid,
    Boost,
}

impl PowerKind {
    pub const ALL: [PowerKind; 3] = [PowerKind::Shield, PowerKind::Rapid, PowerKind::Boost];

    pub fn name(&self) -> &'static str {
        match self {
            PowerKind::Shield => "shield",
            PowerKind::Rapid => "rapid",
            PowerKind::Boost => "boost",
        }
    }
}

/// The one active timed power
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivePower {
    pub kind: PowerKind,
    /// Absolute expiry (host ms)
    pub until: f64,
}

/// The player's ship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub pos: Vec2,
    pub vel: Vec2,
    pub r: f32,
    pub lives: u8,
    /// Current move speed (boost raises it)
    pub speed: f32,
    /// Current primary fire interval (rapid lowers it)
    pub fire_interval_ms: f32,
    pub fire_cooldown_ms: f32,
    pub alt_cooldown_ms: f32,
    pub invuln_until: f64,
    pub power: Option<ActivePower>,
    /// Weapon token level, 1..=MAX_WEAPON_LEVEL
    pub weapon_level: u8,
    /// Hits taken this level (shield absorbs included)
    pub hits_taken: u32,
}

impl Player {
    pub fn new(lives: u8) -> Self {
        Self {
            pos: Vec2::new(VIEW_WIDTH / 2.0, VIEW_HEIGHT - 110.0),
            vel: Vec2::ZERO,
            r: PLAYER_RADIUS,
            lives,
            speed: PLAYER_SPEED,
            fire_interval_ms: PLAYER_FIRE_INTERVAL_MS,
            fire_cooldown_ms: 0.0,
            alt_cooldown_ms: 0.0,
            invuln_until: 0.0,
            power: None,
            weapon_level: 1,
            hits_taken: 0,
        }
    }

    /// Restore speed and fire rate to baseline
    pub fn reset_stats(&mut self) {
        self.speed = PLAYER_SPEED;
        self.fire_interval_ms = PLAYER_FIRE_INTERVAL_MS;
    }

    pub fn has_power(&self, kind: PowerKind) -> bool {
        self.power.is_some_and(|p| p.kind == kind)
    }

    pub fn is_invulnerable(&self, now: f64) -> bool {
        now < self.invuln_until
    }
}

/// A falling power-up capsule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerUp {
    pub id: u32,
    pub kind: PowerKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub r: f32,
    pub expires_at: f64,
    /// Spawned by the guaranteed-grant path
    pub guaranteed: bool,
}

/// A falling weapon upgrade token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponDrop {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    pub r: f32,
    pub expires_at: f64,
}

/// A particle for visual effects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub color: u32,
    pub life: f32, // 0-1, decreases over time
    pub size: f32,
}

/// Short-lived flash at a gun muzzle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuzzleFlash {
    pub pos: Vec2,
    pub until: f64,
}

/// The single pending on-screen notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toast {
    pub text: String,
    pub hide_at: f64,
}

/// Level exit that appears after the boss falls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitGate {
    pub pos: Vec2,
    pub r: f32,
}

/// Per-level values copied out of the data tables
#[derive(Debug, Clone, PartialEq)]
pub struct LevelContext {
    pub level: u32,
    pub theme: Theme,
    pub boss_at: f64,
    pub mid_boss_at: Option<f64>,
    pub boss: BossConfig,
    pub mid_boss: Option<MidBossConfig>,
}

/// Uniform f32 in [lo, hi); returns `lo` for an empty or unbounded range
pub fn range_f32(rng: &mut Pcg32, lo: f32, hi: f32) -> f32 {
    if hi > lo && (hi - lo).is_finite() {
        rng.random_range(lo..hi)
    } else {
        lo
    }
}

/// Uniform u32 in [lo, hi]
pub fn range_u32(rng: &mut Pcg32, lo: u32, hi: u32) -> u32 {
    if hi > lo { rng.random_range(lo..=hi) } else { lo }
}

/// Bernoulli trial with a clamped probability
pub fn chance(rng: &mut Pcg32, p: f32) -> bool {
    let p = if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
    rng.random_bool(p as f64)
}

/// Complete state for one level of a run
#[derive(Debug, Clone)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    pub rng: Pcg32,
    pub phase: GamePhase,
    /// Seconds elapsed in the current level
    pub time: f64,
    /// Host clock (ms) of the most recent tick
    pub now: f64,
    pub score: u64,
    pub kills: u32,
    pub score_multiplier: f32,
    pub player: Player,
    pub enemies: Vec<Enemy>,
    pub bullets: Vec<Bullet>,
    pub enemy_bullets: Vec<Bullet>,
    pub pool: BulletPool,
    pub boss: Option<Boss>,
    /// Host ms when the main boss fell
    pub boss_defeated_at: Option<f64>,
    /// Boss fire is suppressed while `now` is below this
    pub boss_mercy_until: f64,
    pub exit_gate: Option<ExitGate>,
    pub powerups: Vec<PowerUp>,
    pub weapon_drops: Vec<WeaponDrop>,
    pub particles: Vec<Particle>,
    pub muzzle_flashes: Vec<MuzzleFlash>,
    pub toast: Option<Toast>,
    pub config: SpawnConfig,
    pub level_ctx: LevelContext,
    pub spawner: Spawner,
    pub economy: Economy,
    pub weather: Weather,
    pub assist_enabled: bool,
    /// Audio cues raised this tick, drained by the frame loop
    pub sounds: Vec<SoundCue>,
    /// Gameplay events raised this tick, drained by the frame loop
    pub events: Vec<GameEvent>,
    next_id: u32,
}

impl GameState {
    /// Build the state for one level
    pub fn new(
        seed: u64,
        level: &LevelDef,
        theme: Theme,
        mode: DifficultyMode,
        assist: bool,
    ) -> Self {
        let config = SpawnConfig::resolve(
            &SpawnConfig::default(),
            &level.tweaks,
            &level.enemy_weights,
            mode,
            theme.speed_multiplier,
            assist,
        );
        let economy_cfg: EconomyConfig = level
            .economy
            .clone()
            .normalized(mode.powerup_interval(), assist);
        let mut rng = Pcg32::seed_from_u64(seed ^ ((level.number as u64) << 32));
        let spawner = Spawner::new(&config, &level.schedule, &mut rng);
        let economy = Economy::new(economy_cfg);
        let weather = Weather::new(level.weather.clone().normalized(), &mut rng);

        let lives = PLAYER_START_LIVES + u8::from(assist);
        log::info!(
            "Level {} ({}) mode={} assist={} density={:.2}",
            level.number,
            level.name,
            mode.as_str(),
            assist,
            config.density
        );

        Self {
            seed,
            rng,
            phase: GamePhase::Playing,
            time: 0.0,
            now: 0.0,
            score: 0,
            kills: 0,
            score_multiplier: mode.score_multiplier(),
            player: Player::new(lives),
            enemies: Vec::new(),
            bullets: Vec::new(),
            enemy_bullets: Vec::new(),
            pool: BulletPool::new(),
            boss: None,
            boss_defeated_at: None,
            boss_mercy_until: 0.0,
            exit_gate: None,
            powerups: Vec::new(),
            weapon_drops: Vec::new(),
            particles: Vec::new(),
            muzzle_flashes: Vec::new(),
            toast: None,
            config,
            level_ctx: LevelContext {
                level: level.number,
                theme,
                boss_at: level.boss_at as f64,
                mid_boss_at: level.mid_boss_at.map(f64::from),
                boss: level.boss.clone().normalized(),
                mid_boss: level.mid_boss.clone().map(MidBossConfig::normalized),
            },
            spawner,
            economy,
            weather,
            assist_enabled: assist,
            sounds: Vec::new(),
            events: Vec::new(),
            next_id: 1,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn level(&self) -> u32 {
        self.level_ctx.level
    }

    pub fn play(&mut self, cue: SoundCue) {
        self.sounds.push(cue);
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Show a toast, replacing any pending one
    pub fn show_toast(&mut self, text: impl Into<String>) {
        self.toast = Some(Toast {
            text: text.into(),
            hide_at: self.now + TOAST_MS,
        });
    }

    /// Boss fire multiplier; 0 inside the mercy window
    pub fn boss_fire_factor(&self) -> f32 {
        if self.now < self.boss_mercy_until { 0.0 } else { 1.0 }
    }

    pub fn add_score(&mut self, base: u32) {
        let gained = (base as f32 * self.score_multiplier).round().max(0.0) as u64;
        self.score += gained;
    }

    /// Radial particle burst
    pub fn spawn_particles(&mut self, pos: Vec2, count: usize, speed: f32, color: u32) {
        for _ in 0..count {
            if self.particles.len() >= MAX_PARTICLES {
                break;
            }
            let angle = range_f32(&mut self.rng, 0.0, std::f32::consts::TAU);
            let s = range_f32(&mut self.rng, speed * 0.3, speed);
            let size = range_f32(&mut self.rng, 2.0, 5.0);
            self.particles.push(Particle {
                pos,
                vel: crate::direction(angle) * s,
                color,
                life: 1.0,
                size,
            });
        }
    }

    /// Return every live bullet to the pool and clear transient collections
    pub fn drain(&mut self) {
        self.pool.release_all(&mut self.bullets);
        self.pool.release_all(&mut self.enemy_bullets);
        self.enemies.clear();
        self.powerups.clear();
        self.weapon_drops.clear();
        self.particles.clear();
        self.muzzle_flashes.clear();
        self.boss = None;
        self.exit_gate = None;
        self.toast = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::pool::BulletOwner;

    fn state() -> GameState {
        GameState::new(
            7,
            &LevelDef::fallback(1),
            Theme::default(),
            DifficultyMode::Normal,
            false,
        )
    }

    #[test]
    fn test_assist_grants_extra_life() {
        let normal = state();
        let assisted = GameState::new(
            7,
            &LevelDef::fallback(1),
            Theme::default(),
            DifficultyMode::Normal,
            true,
        );
        assert_eq!(assisted.player.lives, normal.player.lives + 1);
        assert!(assisted.config.assist);
    }

    #[test]
    fn test_toast_replaces_pending() {
        let mut s = state();
        s.now = 1000.0;
        s.show_toast("first");
        s.now = 1500.0;
        s.show_toast("second");
        let toast = s.toast.clone().unwrap();
        assert_eq!(toast.text, "second");
        assert_eq!(toast.hide_at, 1500.0 + TOAST_MS);
    }

    #[test]
    fn test_drain_returns_bullets_to_pool() {
        let mut s = state();
        for _ in 0..3 {
            let b = s.pool.fire(BulletOwner::Player, Vec2::ZERO, Vec2::ZERO, 1.0, 1.0, 0.0, 0);
            s.bullets.push(b);
        }
        let b = s.pool.fire(BulletOwner::Enemy, Vec2::ZERO, Vec2::ZERO, 1.0, 1.0, 0.0, 0);
        s.enemy_bullets.push(b);
        s.drain();
        assert!(s.bullets.is_empty() && s.enemy_bullets.is_empty());
        assert_eq!(s.pool.free_len(), 4);
    }

    #[test]
    fn test_particles_capped() {
        let mut s = state();
        s.spawn_particles(Vec2::ZERO, MAX_PARTICLES + 50, 100.0, 0);
        assert_eq!(s.particles.len(), MAX_PARTICLES);
    }

    #[test]
    fn test_chance_clamps() {
        let mut rng = Pcg32::seed_from_u64(1);
        assert!(!chance(&mut rng, f32::NAN));
        assert!(chance(&mut rng, 4.0));
        assert!(!chance(&mut rng, -1.0));
    }
}
