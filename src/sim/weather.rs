//! Wind and squall weather
//!
//! Wind is a slow sinusoidal horizontal drift applied to every bullet.
//! A squall is a timed window that dims the scene, doubles the wind and adds
//! angular jitter to newly fired enemy bullets.

use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::events::GameEvent;
use super::state::range_f32;
use crate::{finite_or, ordered_range};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Weather runs at all (default true)
    pub enabled: bool,
    /// Peak horizontal wind (default 16 px/s)
    pub wind_max: f32,
    /// Wind oscillation period (default 14 s)
    pub wind_period_s: f32,
    /// Gap between squalls (default 24..40 s)
    pub squall_interval_ms: (f32, f32),
    /// Squall length (default 6 s)
    pub squall_duration_ms: f32,
    /// Max jitter added to enemy shots during a squall (default 0.18 rad)
    pub squall_spread: f32,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            wind_max: 16.0,
            wind_period_s: 14.0,
            squall_interval_ms: (24_000.0, 40_000.0),
            squall_duration_ms: 6_000.0,
            squall_spread: 0.18,
        }
    }
}

impl WeatherConfig {
    pub fn normalized(mut self) -> Self {
        let d = Self::default();
        self.wind_max = finite_or(self.wind_max, d.wind_max).max(0.0);
        self.wind_period_s = finite_or(self.wind_period_s, d.wind_period_s).max(1.0);
        self.squall_interval_ms = ordered_range(self.squall_interval_ms, d.squall_interval_ms);
        if self.squall_interval_ms.0 <= 0.0 {
            self.squall_interval_ms = d.squall_interval_ms;
        }
        self.squall_duration_ms = finite_or(self.squall_duration_ms, d.squall_duration_ms).max(0.0);
        self.squall_spread = finite_or(self.squall_spread, d.squall_spread).max(0.0);
        self
    }
}

/// Live weather state
#[derive(Debug, Clone, PartialEq)]
pub struct Weather {
    pub cfg: WeatherConfig,
    /// Current horizontal drift (px/s)
    pub wind: f32,
    pub squall_active: bool,
    /// Counts down to the next squall, or to the end of the active one
    pub squall_timer_ms: f32,
    /// Visual dimming, 0-1
    pub dim: f32,
}

impl Weather {
    pub fn new(cfg: WeatherConfig, rng: &mut Pcg32) -> Self {
        let (lo, hi) = cfg.squall_interval_ms;
        let squall_timer_ms = range_f32(rng, lo, hi);
        Self {
            cfg,
            wind: 0.0,
            squall_active: false,
            squall_timer_ms,
            dim: 0.0,
        }
    }

    /// Calm weather that never changes
    pub fn calm() -> Self {
        Self {
            cfg: WeatherConfig {
                enabled: false,
                ..Default::default()
            },
            wind: 0.0,
            squall_active: false,
            squall_timer_ms: f32::MAX,
            dim: 0.0,
        }
    }

    /// Advance wind and the squall cycle; returns a squall transition event
    pub fn update(&mut self, dt_ms: f32, time_s: f64, rng: &mut Pcg32) -> Option<GameEvent> {
        if !self.cfg.enabled {
            self.wind = 0.0;
            self.squall_active = false;
            self.dim = 0.0;
            return None;
        }

        let phase = (time_s as f32 / self.cfg.wind_period_s) * std::f32::consts::TAU;
        let gust = if self.squall_active { 2.0 } else { 1.0 };
        self.wind = self.cfg.wind_max * phase.sin() * gust;

        let target_dim = if self.squall_active { 1.0 } else { 0.0 };
        let step = dt_ms / 800.0;
        self.dim = if self.dim < target_dim {
            (self.dim + step).min(target_dim)
        } else {
            (self.dim - step).max(target_dim)
        };

        self.squall_timer_ms -= dt_ms;
        if self.squall_timer_ms > 0.0 {
            return None;
        }

        if self.squall_active {
            self.squall_active = false;
            let (lo, hi) = self.cfg.squall_interval_ms;
            self.squall_timer_ms = range_f32(rng, lo, hi);
            log::debug!("Squall ended");
            Some(GameEvent::SquallEnded)
        } else {
            self.squall_active = true;
            self.squall_timer_ms = self.cfg.squall_duration_ms;
            log::info!("Squall rolling in for {} ms", self.cfg.squall_duration_ms);
            Some(GameEvent::SquallStarted)
        }
    }

    /// Jitter scalar for enemy shots; zero outside a squall
    pub fn enemy_spread(&self) -> f32 {
        if self.squall_active {
            self.cfg.squall_spread
        } else {
            0.0
        }
    }
}

/// Apply squall jitter to an aim angle. A zero spread returns `aim` untouched
/// and draws nothing from the RNG.
pub fn jitter_angle(aim: f32, spread: f32, rng: &mut Pcg32) -> f32 {
    if spread <= 0.0 {
        return aim;
    }
    aim + range_f32(rng, -spread, spread)
}
