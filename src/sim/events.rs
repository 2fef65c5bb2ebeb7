//! Frame events and the best-effort listener bus
//!
//! The simulation never calls collaborators directly. It appends
//! [`SoundCue`]s and [`GameEvent`]s to the state during a tick; the frame loop
//! drains them afterwards and fans them out.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::{EnemyType, PowerKind};

/// Symbolic audio cue names understood by the audio collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundCue {
    Hit,
    Explode,
    Upgrade,
    BossDown,
    Zap,
    Pew,
}

impl SoundCue {
    /// Cue id as the audio collaborator knows it
    pub fn id(&self) -> &'static str {
        match self {
            SoundCue::Hit => "hit",
            SoundCue::Explode => "explode",
            SoundCue::Upgrade => "upgrade",
            SoundCue::BossDown => "bossDown",
            SoundCue::Zap => "zap",
            SoundCue::Pew => "pew",
        }
    }
}

/// Gameplay events emitted during a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    EnemyKilled { kind: EnemyType, x: f32, y: f32 },
    PlayerHit { lives: u8, absorbed: bool },
    PlayerDefeated,
    PowerUpCollected { kind: PowerKind },
    PowerUpExpired { kind: PowerKind },
    WeaponUpgraded { level: u8 },
    BossSpawned { mid: bool },
    BossPhaseChanged { phase: u8 },
    BossDefeated { mid: bool, x: f32, y: f32 },
    SquallStarted,
    SquallEnded,
    LevelComplete { level: u32 },
}

/// Failure reported by a listener
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("listener rejected event: {0}")]
    Rejected(String),
}

type Listener = Box<dyn FnMut(&GameEvent) -> Result<(), ListenerError>>;

/// Best-effort fan-out of frame events.
///
/// Every subscriber sees every event in emission order. A subscriber that
/// returns an error is logged and stays subscribed; later subscribers still
/// receive the event and the frame carries on.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(u32, Listener)>,
    next_id: u32,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener, returning a handle for `unsubscribe`
    pub fn subscribe<F>(&mut self, listener: F) -> u32
    where
        F: FnMut(&GameEvent) -> Result<(), ListenerError> + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: u32) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver one event to every listener, returning how many failed
    pub fn emit(&mut self, event: &GameEvent) -> usize {
        let mut failures = 0;
        for (id, listener) in self.listeners.iter_mut() {
            if let Err(e) = listener(event) {
                failures += 1;
                log::warn!("Event listener {} failed on {:?}: {}", id, event, e);
            }
        }
        failures
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
