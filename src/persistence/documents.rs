use serde::{Deserialize, Serialize};

use super::Document;

/// Campaign progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
    pub highest_unlocked_level: u32,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            highest_unlocked_level: 1,
        }
    }
}

impl Progress {
    /// Raise the unlocked level; never lowers it
    pub fn unlock(&mut self, level: u32) -> bool {
        if level > self.highest_unlocked_level {
            self.highest_unlocked_level = level;
            true
        } else {
            false
        }
    }
}

impl Document for Progress {
    const KEY: &'static str = "nova_strike_progress";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Achievement {
    /// First enemy destroyed
    FirstBlood,
    MidBossDown,
    BossSlayer,
    /// Level cleared without taking a hit
    Flawless,
    /// Reached level 3
    Veteran,
    /// 500 kills across all runs
    Exterminator,
}

impl Achievement {
    pub fn title(&self) -> &'static str {
        match self {
            Achievement::FirstBlood => "First Blood",
            Achievement::MidBossDown => "Interceptor Down",
            Achievement::BossSlayer => "Boss Slayer",
            Achievement::Flawless => "Flawless",
            Achievement::Veteran => "Veteran",
            Achievement::Exterminator => "Exterminator",
        }
    }
}

/// Lifetime counters and achievements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Meta {
    pub runs: u32,
    pub kills: u64,
    pub bosses_defeated: u32,
    pub best_score: u64,
    pub achievements: Vec<Achievement>,
}

impl Meta {
    pub fn has(&self, a: Achievement) -> bool {
        self.achievements.contains(&a)
    }

    /// Returns true if newly unlocked
    pub fn unlock(&mut self, a: Achievement) -> bool {
        if self.has(a) {
            return false;
        }
        self.achievements.push(a);
        true
    }

    /// Unlock whatever the counters now justify
    pub fn check_counters(&mut self) -> Vec<Achievement> {
        let mut unlocked = Vec::new();
        let mut try_unlock = |meta: &mut Meta, a, cond: bool| {
            if cond && meta.unlock(a) {
                unlocked.push(a);
            }
        };
        try_unlock(self, Achievement::FirstBlood, self.kills > 0);
        try_unlock(self, Achievement::BossSlayer, self.bosses_defeated > 0);
        try_unlock(self, Achievement::Exterminator, self.kills >= 500);
        unlocked
    }
}

impl Document for Meta {
    const KEY: &'static str = "nova_strike_meta";
}
