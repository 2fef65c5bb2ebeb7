//! Data-driven game balance
//!
//! Static, read-only lookup tables: difficulty modes, themes and level
//! definitions. The simulation only ever reads these and merges copies of the
//! values it needs at level start.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::boss::{BossConfig, MidBossConfig};
use crate::sim::economy::EconomyConfig;
use crate::sim::spawner::{CountSpec, Formation, ScheduledWave, WaveParams};
use crate::sim::state::EnemyType;
use crate::sim::weather::WeatherConfig;

/// Player-selectable difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DifficultyMode {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl DifficultyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyMode::Easy => "easy",
            DifficultyMode::Normal => "normal",
            DifficultyMode::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(DifficultyMode::Easy),
            "normal" | "medium" => Some(DifficultyMode::Normal),
            "hard" => Some(DifficultyMode::Hard),
            _ => None,
        }
    }

    /// Spawn density multiplier
    pub fn density(&self) -> f32 {
        match self {
            DifficultyMode::Easy => 0.8,
            DifficultyMode::Normal => 1.0,
            DifficultyMode::Hard => 1.3,
        }
    }

    /// Enemy velocity/acceleration multiplier
    pub fn speed(&self) -> f32 {
        match self {
            DifficultyMode::Easy => 0.85,
            DifficultyMode::Normal => 1.0,
            DifficultyMode::Hard => 1.2,
        }
    }

    /// Enemy and boss hit point multiplier
    pub fn hp(&self) -> f32 {
        match self {
            DifficultyMode::Easy => 0.8,
            DifficultyMode::Normal => 1.0,
            DifficultyMode::Hard => 1.35,
        }
    }

    /// Enemy fire rate multiplier (cooldowns are divided by this)
    pub fn fire_rate(&self) -> f32 {
        match self {
            DifficultyMode::Easy => 0.8,
            DifficultyMode::Normal => 1.0,
            DifficultyMode::Hard => 1.25,
        }
    }

    /// Power-up interval multiplier (longer on harder modes)
    pub fn powerup_interval(&self) -> f32 {
        match self {
            DifficultyMode::Easy => 0.8,
            DifficultyMode::Normal => 1.0,
            DifficultyMode::Hard => 1.3,
        }
    }

    pub fn score_multiplier(&self) -> f32 {
        match self {
            DifficultyMode::Easy => 0.75,
            DifficultyMode::Normal => 1.0,
            DifficultyMode::Hard => 1.5,
        }
    }
}

/// Per-type spawn weights for a level (1.0 = baseline, 0.0 = never)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyWeights {
    pub asteroid: f32,
    pub strafer: f32,
    pub drone: f32,
    pub turret: f32,
    pub splitter: f32,
    pub shield_drone: f32,
}

impl Default for EnemyWeights {
    fn default() -> Self {
        Self {
            asteroid: 1.0,
            strafer: 1.0,
            drone: 1.0,
            turret: 1.0,
            splitter: 1.0,
            shield_drone: 1.0,
        }
    }
}

impl EnemyWeights {
    pub fn get(&self, kind: EnemyType) -> f32 {
        match kind {
            EnemyType::Asteroid => self.asteroid,
            EnemyType::Strafer => self.strafer,
            EnemyType::Drone => self.drone,
            EnemyType::Turret => self.turret,
            EnemyType::Splitter => self.splitter,
            EnemyType::ShieldDrone => self.shield_drone,
        }
    }

    /// Negative or non-finite weights become 0
    pub fn normalized(mut self) -> Self {
        for w in [
            &mut self.asteroid,
            &mut self.strafer,
            &mut self.drone,
            &mut self.turret,
            &mut self.splitter,
            &mut self.shield_drone,
        ] {
            if !w.is_finite() || *w < 0.0 {
                *w = 0.0;
            }
        }
        self
    }
}

/// Optional per-level overrides of the base spawn parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelSpawnTweaks {
    pub asteroid_interval_ms: Option<f32>,
    pub asteroid_batch: Option<(u32, u32)>,
    pub wave_interval_ms: Option<(f32, f32)>,
    pub density: Option<f32>,
    pub strafer_fire_ms: Option<(f32, f32)>,
    pub turret_fire_ms: Option<(f32, f32)>,
    pub splitter_children: Option<(u32, u32)>,
    pub shield_cap: Option<u32>,
    pub enemy_bullet_speed: Option<f32>,
}

/// Visual theme; only `speed_multiplier` feeds the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub key: String,
    #[serde(default = "one")]
    pub speed_multiplier: f32,
    #[serde(default)]
    pub palette: Vec<u32>,
}

fn one() -> f32 {
    1.0
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            key: "nebula".to_string(),
            speed_multiplier: 1.0,
            palette: vec![0x0b0f2a, 0x39c5ff, 0xff4f79, 0xffd166],
        }
    }
}

/// One authored level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDef {
    pub number: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub theme: String,
    /// Level seconds at which the main boss arrives
    pub boss_at: f32,
    #[serde(default)]
    pub mid_boss_at: Option<f32>,
    #[serde(default)]
    pub tweaks: LevelSpawnTweaks,
    #[serde(default)]
    pub enemy_weights: EnemyWeights,
    #[serde(default)]
    pub schedule: Vec<ScheduledWave>,
    #[serde(default)]
    pub boss: BossConfig,
    #[serde(default)]
    pub mid_boss: Option<MidBossConfig>,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub economy: EconomyConfig,
}

impl LevelDef {
    /// Minimal level used when a lookup misses
    pub fn fallback(number: u32) -> Self {
        Self {
            number,
            name: format!("Sector {}", number),
            theme: String::new(),
            boss_at: 90.0,
            mid_boss_at: None,
            tweaks: LevelSpawnTweaks::default(),
            enemy_weights: EnemyWeights::default(),
            schedule: Vec::new(),
            boss: BossConfig::default(),
            mid_boss: None,
            weather: WeatherConfig::default(),
            economy: EconomyConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TuningError {
    #[error("invalid level table: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("level table has no levels")]
    Empty,
}

/// All levels and themes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelTable {
    pub levels: Vec<LevelDef>,
    #[serde(default)]
    pub themes: Vec<Theme>,
}

impl Default for LevelTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LevelTable {
    /// Parse a table from JSON
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let mut table: LevelTable = serde_json::from_str(json)?;
        if table.levels.is_empty() {
            return Err(TuningError::Empty);
        }
        table.levels.sort_by_key(|l| l.number);
        Ok(table)
    }

    pub fn level(&self, number: u32) -> Option<&LevelDef> {
        self.levels.iter().find(|l| l.number == number)
    }

    pub fn last_level(&self) -> u32 {
        self.levels.iter().map(|l| l.number).max().unwrap_or(1)
    }

    /// Theme lookup; unknown keys fall back to the default theme
    pub fn theme(&self, key: &str) -> Theme {
        self.themes
            .iter()
            .find(|t| t.key == key)
            .cloned()
            .unwrap_or_default()
    }

    /// Built-in three-level campaign
    pub fn builtin() -> Self {
        let level1 = LevelDef {
            number: 1,
            name: "Outer Belt".to_string(),
            theme: "nebula".to_string(),
            boss_at: 95.0,
            mid_boss_at: None,
            tweaks: LevelSpawnTweaks {
                density: Some(0.85),
                ..Default::default()
            },
            enemy_weights: EnemyWeights {
                turret: 0.5,
                splitter: 0.3,
                shield_drone: 0.0,
                ..Default::default()
            },
            schedule: vec![
                ScheduledWave {
                    at: 4.0,
                    kind: EnemyType::Strafer,
                    count: CountSpec::Fixed(3),
                    params: WaveParams {
                        formation: Formation::Line,
                        x: None,
                    },
                },
                ScheduledWave {
                    at: 12.0,
                    kind: EnemyType::Drone,
                    count: CountSpec::Range(2, 3),
                    params: WaveParams::default(),
                },
                ScheduledWave {
                    at: 30.0,
                    kind: EnemyType::Turret,
                    count: CountSpec::Fixed(2),
                    params: WaveParams {
                        formation: Formation::Pair,
                        x: None,
                    },
                },
            ],
            boss: BossConfig {
                hp: 1400.0,
                max_phase: 2,
                thresholds: vec![0.5],
                ..Default::default()
            },
            mid_boss: None,
            weather: WeatherConfig {
                enabled: false,
                ..Default::default()
            },
            economy: EconomyConfig {
                guaranteed_powerups: true,
                ..Default::default()
            },
        };

        let level2 = LevelDef {
            number: 2,
            name: "Ion Drift".to_string(),
            theme: "ion".to_string(),
            boss_at: 110.0,
            mid_boss_at: Some(50.0),
            tweaks: LevelSpawnTweaks::default(),
            enemy_weights: EnemyWeights {
                shield_drone: 0.6,
                ..Default::default()
            },
            schedule: vec![ScheduledWave {
                at: 8.0,
                kind: EnemyType::Splitter,
                count: CountSpec::Range(1, 2),
                params: WaveParams::default(),
            }],
            boss: BossConfig::default(),
            mid_boss: Some(MidBossConfig::default()),
            weather: WeatherConfig::default(),
            economy: EconomyConfig::default(),
        };

        let level3 = LevelDef {
            number: 3,
            name: "Storm Core".to_string(),
            theme: "storm".to_string(),
            boss_at: 120.0,
            mid_boss_at: Some(55.0),
            tweaks: LevelSpawnTweaks {
                density: Some(1.2),
                wave_interval_ms: Some((3200.0, 5200.0)),
                ..Default::default()
            },
            enemy_weights: EnemyWeights {
                asteroid: 0.7,
                shield_drone: 1.2,
                splitter: 1.3,
                ..Default::default()
            },
            schedule: Vec::new(),
            boss: BossConfig {
                hp: 2400.0,
                ..Default::default()
            },
            mid_boss: Some(MidBossConfig {
                hp: 700.0,
                ..Default::default()
            }),
            weather: WeatherConfig {
                squall_spread: 0.24,
                ..Default::default()
            },
            economy: EconomyConfig::default(),
        };

        Self {
            levels: vec![level1, level2, level3],
            themes: vec![
                Theme::default(),
                Theme {
                    key: "ion".to_string(),
                    speed_multiplier: 1.05,
                    palette: vec![0x07131f, 0x4df3c9, 0xf25f5c, 0xfff07c],
                },
                Theme {
                    key: "storm".to_string(),
                    speed_multiplier: 1.1,
                    palette: vec![0x120b1e, 0xb388ff, 0xff6e40, 0xe0e0e0],
                },
            ],
        }
    }
}
