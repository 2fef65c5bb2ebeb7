//! Render collaborator
//!
//! After all simulation steps of a frame the controller builds a [`FrameView`]
//! borrowing the state's entity collections and hands it to a [`Renderer`].
//! Renderers only read; nothing here can mutate the game.

use crate::sim::boss::Beam;
use crate::sim::pool::Bullet;
use crate::sim::state::{
    Enemy, ExitGate, GamePhase, GameState, MuzzleFlash, Particle, Player, PowerUp, Toast, WeaponDrop,
};
use crate::sim::PowerKind;
use crate::tuning::Theme;

/// Per-frame caps, mirroring what a GPU instance buffer would hold
pub const MAX_BULLETS: usize = 1024;
pub const MAX_ENEMIES: usize = 128;
pub const MAX_PARTICLES: usize = crate::consts::MAX_PARTICLES;

/// Heads-up display values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hud {
    pub score: u64,
    pub lives: u8,
    pub level: u32,
    pub weapon_level: u8,
    pub power: Option<PowerKind>,
    /// Remaining boss health 0..1, if a boss is up
    pub boss_health: Option<f32>,
    pub paused: bool,
    pub phase: GamePhase,
}

/// Boss as the renderer needs it
#[derive(Debug, Clone, Copy)]
pub struct BossView<'a> {
    pub pos: glam::Vec2,
    pub r: f32,
    pub phase: u8,
    pub mid: bool,
    pub telegraphing: bool,
    pub beam: Option<&'a Beam>,
}

/// Borrowed snapshot of one frame
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub theme: &'a Theme,
    pub player: &'a Player,
    pub player_blink: bool,
    pub enemies: &'a [Enemy],
    pub bullets: &'a [Bullet],
    pub enemy_bullets: &'a [Bullet],
    pub boss: Option<BossView<'a>>,
    pub powerups: &'a [PowerUp],
    pub weapon_drops: &'a [WeaponDrop],
    pub particles: &'a [Particle],
    pub muzzle_flashes: &'a [MuzzleFlash],
    pub exit_gate: Option<&'a ExitGate>,
    pub toast: Option<&'a Toast>,
    /// Squall darkening, 0..1
    pub dim: f32,
    pub wind: f32,
    pub hud: Hud,
}

impl<'a> FrameView<'a> {
    pub fn from_state(state: &'a GameState, paused: bool) -> Self {
        let cap = |len: usize, max: usize| len.min(max);
        let boss = state.boss.as_ref().map(|b| BossView {
            pos: b.pos,
            r: b.r,
            phase: b.phase,
            mid: b.is_mid(),
            telegraphing: b.is_telegraphing(state.now),
            beam: b.beam.as_ref(),
        });
        // Blink at 10 Hz while invulnerable
        let player_blink =
            state.player.is_invulnerable(state.now) && (state.now / 100.0) as u64 % 2 == 0;

        Self {
            theme: &state.level_ctx.theme,
            player: &state.player,
            player_blink,
            enemies: &state.enemies[..cap(state.enemies.len(), MAX_ENEMIES)],
            bullets: &state.bullets[..cap(state.bullets.len(), MAX_BULLETS)],
            enemy_bullets: &state.enemy_bullets[..cap(state.enemy_bullets.len(), MAX_BULLETS)],
            boss,
            powerups: &state.powerups,
            weapon_drops: &state.weapon_drops,
            particles: &state.particles[..cap(state.particles.len(), MAX_PARTICLES)],
            muzzle_flashes: &state.muzzle_flashes,
            exit_gate: state.exit_gate.as_ref(),
            toast: state.toast.as_ref(),
            dim: state.weather.dim,
            wind: state.weather.wind,
            hud: Hud {
                score: state.score,
                lives: state.player.lives,
                level: state.level(),
                weapon_level: state.player.weapon_level,
                power: state.player.power.map(|p| p.kind),
                boss_health: state.boss.as_ref().map(|b| b.health_ratio()),
                paused,
                phase: state.phase,
            },
        }
    }

    /// Palette entry, wrapping; white if the theme has none
    pub fn color(&self, index: usize) -> u32 {
        let palette = &self.theme.palette;
        if palette.is_empty() {
            0xffffff
        } else {
            palette[index % palette.len()]
        }
    }

    /// Number of drawable instances
    pub fn instance_count(&self) -> usize {
        1 + self.enemies.len()
            + self.bullets.len()
            + self.enemy_bullets.len()
            + usize::from(self.boss.is_some())
            + self.powerups.len()
            + self.weapon_drops.len()
            + self.particles.len()
            + self.muzzle_flashes.len()
            + usize::from(self.exit_gate.is_some())
    }
}

/// Draws a frame; called once per frame after the simulation
pub trait Renderer {
    fn render(&mut self, frame: &FrameView<'_>);
}

/// Draws nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _frame: &FrameView<'_>) {}
}

/// Summary of the last frame rendered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub frames: u64,
    pub instances: usize,
    pub enemies: usize,
    pub bullets: usize,
    pub boss_beam: bool,
    pub toast: Option<String>,
    pub hud: Option<Hud>,
}

/// Keeps per-frame statistics instead of drawing
#[derive(Debug, Default, Clone)]
pub struct RecordingRenderer {
    pub last: FrameStats,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, frame: &FrameView<'_>) {
        self.last = FrameStats {
            frames: self.last.frames + 1,
            instances: frame.instance_count(),
            enemies: frame.enemies.len(),
            bullets: frame.bullets.len() + frame.enemy_bullets.len(),
            boss_beam: frame.boss.is_some_and(|b| b.beam.is_some()),
            toast: frame.toast.map(|t| t.text.clone()),
            hud: Some(frame.hud),
        };
    }
}
