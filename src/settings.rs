//! Player preferences
//!
//! Persisted as their own document, separate from progress and meta.

use serde::{Deserialize, Serialize};

use crate::persistence::{self, Document, Storage};
use crate::tuning::DifficultyMode;

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub difficulty: DifficultyMode,

    // === Accessibility ===
    /// Gentler spawns, more power-ups, one extra life
    pub assist: bool,
    /// Fire without holding the button
    pub auto_fire: bool,

    // === Audio ===
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    pub muted: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            difficulty: DifficultyMode::Normal,
            assist: false,
            auto_fire: false,
            master_volume: 0.8,
            muted: false,
        }
    }
}

impl Document for Settings {
    const KEY: &'static str = "nova_strike_settings";
}

impl Settings {
    /// Read settings, falling back to defaults on any failure
    pub fn load(storage: &dyn Storage) -> Self {
        persistence::load_or_default::<Self>(storage).sanitized()
    }

    pub fn save(&self, storage: &mut dyn Storage) {
        persistence::save_or_warn(storage, self);
    }

    /// Clamp values a hand-edited document could break
    pub fn sanitized(mut self) -> Self {
        self.master_volume = crate::finite_or(self.master_volume, 0.8).clamp(0.0, 1.0);
        self
    }

    /// Volume actually sent to the audio sink
    pub fn effective_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.master_volume }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStorage;

    #[test]
    fn test_round_trip() {
        let mut storage = MemoryStorage::new();
        let settings = Settings {
            difficulty: DifficultyMode::Hard,
            assist: true,
            auto_fire: true,
            ..Default::default()
        };
        settings.save(&mut storage);
        assert_eq!(Settings::load(&storage), settings);
    }

    #[test]
    fn test_partial_and_broken_documents() {
        let mut storage = MemoryStorage::new();
        storage
            .set(Settings::KEY, r#"{ "assist": true, "master_volume": 7.5 }"#)
            .unwrap();
        let s = Settings::load(&storage);
        assert!(s.assist);
        assert_eq!(s.difficulty, DifficultyMode::Normal);
        assert_eq!(s.master_volume, 1.0);

        storage.set(Settings::KEY, "[]").unwrap();
        assert_eq!(Settings::load(&storage), Settings::default());
    }

    #[test]
    fn test_mute_zeroes_volume() {
        let s = Settings {
            muted: true,
            ..Default::default()
        };
        assert_eq!(s.effective_volume(), 0.0);
    }
}
