//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Audio and listeners are reached only through the cue and event queues
//! - No rendering or platform dependencies

pub mod boss;
pub mod bullets;
pub mod collision;
pub mod config;
pub mod economy;
pub mod enemy;
pub mod events;
pub mod pool;
pub mod spawner;
pub mod state;
pub mod tick;
pub mod weather;

pub use boss::{Beam, Boss, BossConfig, BossKind, MidBossConfig, PhasePattern};
pub use bullets::{Bounds, advance};
pub use collision::{circles_overlap, resolve_collisions};
pub use config::{ASSIST_DENSITY, SpawnConfig};
pub use economy::{Economy, EconomyConfig};
pub use events::{EventBus, GameEvent, ListenerError, SoundCue};
pub use pool::{Bullet, BulletOwner, BulletPool};
pub use spawner::{CountSpec, Formation, ScheduledWave, Spawner, WaveParams, pick_weighted, resolve_count};
pub use state::{Enemy, EnemyKind, EnemyType, GamePhase, GameState, Player, PowerKind};
pub use tick::{TickInput, tick};
pub use weather::{Weather, WeatherConfig};
