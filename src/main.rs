//! Nova Strike entry point
//!
//! Runs a scripted, headless session: a pilot weaving across the lower half of
//! the screen with the trigger held, logging each gameplay event and a summary
//! at the end. Usage: `nova-strike [seed] [seconds]`.

use nova_strike::audio::AudioSink;
#[cfg(not(target_arch = "wasm32"))]
use nova_strike::audio::NullAudio;
use nova_strike::persistence::{MemoryStorage, Storage};
use nova_strike::platform::{self, InputState, ScriptedInput};
use nova_strike::render::NullRenderer;
use nova_strike::sim::GameEvent;
use nova_strike::tuning::LevelTable;
use nova_strike::{Game, Services};

/// Host frame length (60 Hz display)
const FRAME_MS: f64 = 1000.0 / 60.0;

/// A slow side-to-side weave, firing throughout
fn pilot_script(frames: usize) -> Vec<InputState> {
    (0..frames)
        .map(|i| {
            let t = i as f32 * FRAME_MS as f32 / 1000.0;
            InputState {
                move_x: (t * 0.9).sin(),
                move_y: if (t as u32) % 6 < 3 { 0.2 } else { -0.2 },
                fire: true,
                alt_fire: i % 90 == 0,
                precision: (t as u32) % 10 == 9,
                gamepad_connected: false,
            }
        })
        .collect()
}

#[cfg(target_arch = "wasm32")]
fn storage() -> Box<dyn Storage> {
    match nova_strike::persistence::LocalStorage::open() {
        Ok(local) => Box::new(local),
        Err(e) => {
            log::warn!("{}, progress will not persist", e);
            Box::new(MemoryStorage::new())
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn storage() -> Box<dyn Storage> {
    Box::new(MemoryStorage::new())
}

#[cfg(target_arch = "wasm32")]
fn audio() -> Box<dyn AudioSink> {
    Box::new(nova_strike::audio::WebAudio::new())
}

#[cfg(not(target_arch = "wasm32"))]
fn audio() -> Box<dyn AudioSink> {
    Box::new(NullAudio)
}

fn main() {
    platform::init_logging();

    let mut args = std::env::args().skip(1);
    let seed = args.next().and_then(|s| s.parse().ok()).unwrap_or(0x5EED_u64);
    let seconds: f64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(120.0);
    let frames = (seconds * 1000.0 / FRAME_MS).max(0.0) as usize;

    log::info!("Nova Strike (headless) seed={} duration={}s", seed, seconds);

    let services = Services {
        input: Box::new(ScriptedInput::new(pilot_script(frames))),
        audio: audio(),
        renderer: Box::new(NullRenderer),
        storage: storage(),
    };
    let mut game = Game::new(seed, LevelTable::builtin(), services);
    game.subscribe(|event| {
        match event {
            GameEvent::EnemyKilled { .. } => log::debug!("{:?}", event),
            _ => log::info!("{:?}", event),
        }
        Ok(())
    });

    for i in 0..frames {
        game.frame(i as f64 * FRAME_MS);
        if game.is_run_over() {
            break;
        }
    }

    let summary = game.summary();
    log::info!(
        "Finished: level={} score={} kills={} lives={} phase={:?} sim_time={:.1}s",
        summary.level,
        summary.score,
        summary.kills,
        summary.lives,
        summary.phase,
        game.state().now / 1000.0
    );
    log::info!(
        "Meta: runs={} kills={} bosses={} achievements={}",
        game.meta().runs,
        game.meta().kills,
        game.meta().bosses_defeated,
        game.meta().achievements.len()
    );
}
