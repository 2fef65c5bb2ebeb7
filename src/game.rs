//! Frame loop controller
//!
//! [`Game`] owns the [`GameState`] and the injected collaborators. Each host
//! frame it polls input once, runs as many fixed simulation steps as the
//! elapsed time allows, forwards the queued sound cues and events, writes
//! persistence checkpoints and finally hands a read-only view to the renderer.

use crate::audio::{AudioSink, NullAudio};
use crate::consts::*;
use crate::persistence::{self, Achievement, MemoryStorage, Meta, Progress, Storage};
use crate::platform::{InputSource, NullInput};
use crate::render::{FrameView, NullRenderer, Renderer};
use crate::settings::Settings;
use crate::sim::{EventBus, GameEvent, GamePhase, GameState, ListenerError, tick};
use crate::tuning::{LevelDef, LevelTable};

/// The collaborators a game talks to
pub struct Services {
    pub input: Box<dyn InputSource>,
    pub audio: Box<dyn AudioSink>,
    pub renderer: Box<dyn Renderer>,
    pub storage: Box<dyn Storage>,
}

impl Services {
    /// No devices, volatile storage
    pub fn headless() -> Self {
        Self {
            input: Box::new(NullInput),
            audio: Box::new(NullAudio),
            renderer: Box::new(NullRenderer),
            storage: Box::new(MemoryStorage::new()),
        }
    }
}

/// Where a run stands, for hosts and logs
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub level: u32,
    pub score: u64,
    pub kills: u32,
    pub lives: u8,
    pub phase: GamePhase,
    pub run_over: bool,
}

/// Game instance holding all state
pub struct Game {
    state: GameState,
    services: Services,
    bus: EventBus,
    table: LevelTable,
    settings: Settings,
    progress: Progress,
    meta: Meta,
    seed: u64,
    paused: bool,
    accumulator: f32,
    last_time: Option<f64>,
    /// Score banked from finished levels of this run
    banked_score: u64,
    /// Kills banked from finished levels of this run
    banked_kills: u32,
    run_over: bool,
}

impl Game {
    /// Read persisted documents and start a run at level 1
    pub fn new(seed: u64, table: LevelTable, services: Services) -> Self {
        let settings = Settings::load(services.storage.as_ref());
        let progress = persistence::load_or_default::<Progress>(services.storage.as_ref());
        let meta = persistence::load_or_default::<Meta>(services.storage.as_ref());
        let state = Self::build_level(&table, &settings, seed, 1);

        let mut game = Self {
            state,
            services,
            bus: EventBus::new(),
            table,
            settings,
            progress,
            meta,
            seed,
            paused: false,
            accumulator: 0.0,
            last_time: None,
            banked_score: 0,
            banked_kills: 0,
            run_over: false,
        };
        game.apply_audio_settings();
        log::info!(
            "Nova Strike starting: seed={} unlocked={} runs={}",
            seed,
            game.progress.highest_unlocked_level,
            game.meta.runs
        );
        game
    }

    fn build_level(table: &LevelTable, settings: &Settings, seed: u64, number: u32) -> GameState {
        let level = table
            .level(number)
            .cloned()
            .unwrap_or_else(|| LevelDef::fallback(number));
        let theme = table.theme(&level.theme);
        GameState::new(seed, &level, theme, settings.difficulty, settings.assist)
    }

    /// One host frame at absolute time `now_ms`
    pub fn frame(&mut self, now_ms: f64) {
        let dt = match self.last_time {
            Some(last) => ((now_ms - last) / 1000.0) as f32,
            None => SIM_DT,
        };
        self.last_time = Some(now_ms);

        if !self.paused {
            self.update(dt);
        }

        let view = FrameView::from_state(&self.state, self.paused);
        self.services.renderer.render(&view);
    }

    /// Run simulation ticks
    fn update(&mut self, dt: f32) {
        let dt = crate::finite_or(dt, 0.0).clamp(0.0, 0.1);
        self.accumulator += dt;

        let input = self
            .services
            .input
            .poll()
            .to_tick_input(self.settings.auto_fire);

        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            tick(&mut self.state, &input, SIM_DT);
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        if substeps == MAX_SUBSTEPS && self.accumulator >= SIM_DT {
            log::debug!("Dropping {:.1} ms of sim backlog", self.accumulator * 1000.0);
            self.accumulator = 0.0;
        }

        self.dispatch();
    }

    /// Forward queued cues and events, then act on them
    fn dispatch(&mut self) {
        for cue in self.state.sounds.drain(..) {
            self.services.audio.play(cue);
        }

        let events = std::mem::take(&mut self.state.events);
        let mut unlocked = Vec::new();
        let mut level_complete = None;
        for event in &events {
            match event {
                GameEvent::EnemyKilled { .. } => self.meta.kills += 1,
                GameEvent::BossDefeated { mid: true, .. } => {
                    unlocked.extend(self.unlock(Achievement::MidBossDown));
                    self.checkpoint();
                }
                GameEvent::BossDefeated { mid: false, .. } => {
                    self.meta.bosses_defeated += 1;
                    self.checkpoint();
                }
                GameEvent::LevelComplete { level } => level_complete = Some(*level),
                GameEvent::PlayerDefeated => self.end_run(),
                _ => {}
            }
            self.bus.emit(event);
        }
        unlocked.extend(self.meta.check_counters());

        if let Some(level) = level_complete {
            unlocked.extend(self.complete_level(level));
        }
        for a in unlocked {
            log::info!("Achievement unlocked: {}", a.title());
            self.state.show_toast(format!("Achievement: {}", a.title()));
        }
    }

    fn unlock(&mut self, a: Achievement) -> Option<Achievement> {
        self.meta.unlock(a).then_some(a)
    }

    /// Write progress and meta
    fn checkpoint(&mut self) {
        let storage = self.services.storage.as_mut();
        persistence::save_or_warn(storage, &self.progress);
        persistence::save_or_warn(storage, &self.meta);
    }

    fn complete_level(&mut self, level: u32) -> Vec<Achievement> {
        let mut unlocked = Vec::new();
        if self.state.player.hits_taken == 0 {
            unlocked.extend(self.unlock(Achievement::Flawless));
        }

        let last = self.table.last_level();
        let next = level + 1;
        if next <= last {
            self.progress.unlock(next);
            if next >= 3 {
                unlocked.extend(self.unlock(Achievement::Veteran));
            }
        }
        self.checkpoint();

        if next > last {
            log::info!("Campaign complete");
            self.end_run();
        } else {
            self.start_level(next);
        }
        unlocked
    }

    /// Move to `number`, carrying score, lives and weapon level
    fn start_level(&mut self, number: u32) {
        self.banked_score += self.state.score;
        self.banked_kills += self.state.kills;
        let lives = self.state.player.lives;
        let weapon = self.state.player.weapon_level;

        self.state.drain();
        self.state = Self::build_level(&self.table, &self.settings, self.seed, number);
        self.state.player.lives = lives;
        self.state.player.weapon_level = weapon;
        self.accumulator = 0.0;
    }

    /// Record the finished run and persist it
    fn end_run(&mut self) {
        if self.run_over {
            return;
        }
        self.run_over = true;
        self.meta.runs += 1;
        self.meta.best_score = self.meta.best_score.max(self.run_score());
        log::info!(
            "Run over: score={} level={} runs={}",
            self.run_score(),
            self.state.level(),
            self.meta.runs
        );
        self.checkpoint();
    }

    /// Start a fresh run at level 1
    pub fn restart(&mut self, seed: u64) {
        self.state.drain();
        self.seed = seed;
        self.state = Self::build_level(&self.table, &self.settings, seed, 1);
        self.accumulator = 0.0;
        self.last_time = None;
        self.banked_score = 0;
        self.banked_kills = 0;
        self.run_over = false;
        self.paused = false;
        log::info!("Restarted with seed {}", seed);
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            log::info!("{}", if paused { "Paused" } else { "Resumed" });
        }
        self.paused = paused;
        // Do not count the paused span as elapsed time
        self.last_time = None;
    }

    pub fn toggle_pause(&mut self) {
        self.set_paused(!self.paused);
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Store new settings; difficulty and assist apply from the next level
    pub fn apply_settings(&mut self, settings: Settings) {
        self.settings = settings.sanitized();
        self.settings.save(self.services.storage.as_mut());
        self.apply_audio_settings();
    }

    fn apply_audio_settings(&mut self) {
        self.services.audio.set_volume(self.settings.master_volume);
        self.services.audio.set_muted(self.settings.muted);
    }

    /// Register an event listener
    pub fn subscribe<F>(&mut self, listener: F) -> u32
    where
        F: FnMut(&GameEvent) -> Result<(), ListenerError> + 'static,
    {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: u32) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Direct access for host debug tools
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn storage(&self) -> &dyn Storage {
        self.services.storage.as_ref()
    }

    pub fn run_score(&self) -> u64 {
        self.banked_score + self.state.score
    }

    pub fn is_run_over(&self) -> bool {
        self.run_over
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            level: self.state.level(),
            score: self.run_score(),
            kills: self.banked_kills + self.state.kills,
            lives: self.state.player.lives,
            phase: self.state.phase,
            run_over: self.run_over,
        }
    }
}
