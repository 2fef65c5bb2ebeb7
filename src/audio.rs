//! Audio collaborator
//!
//! The frame loop drains [`SoundCue`]s from the simulation and hands each one
//! to an [`AudioSink`]. Playback is fire-and-forget: sinks never report back
//! and must not block.
//!
//! On the web, [`WebAudio`] synthesizes every cue procedurally with the Web
//! Audio API, so no sample files are needed.

use crate::sim::SoundCue;

/// Receives cues from the frame loop
pub trait AudioSink {
    fn play(&mut self, cue: SoundCue);

    /// Master volume (0.0 - 1.0)
    fn set_volume(&mut self, _volume: f32) {}

    fn set_muted(&mut self, _muted: bool) {}
}

/// Discards every cue
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play(&mut self, _cue: SoundCue) {}
}

/// Keeps every cue it is given, for headless runs and tests
#[derive(Debug, Default, Clone)]
pub struct RecordingAudio {
    pub played: Vec<SoundCue>,
    pub muted: bool,
}

impl RecordingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, cue: SoundCue) -> usize {
        self.played.iter().filter(|c| **c == cue).count()
    }
}

impl AudioSink for RecordingAudio {
    fn play(&mut self, cue: SoundCue) {
        if !self.muted {
            self.played.push(cue);
        }
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::WebAudio;

#[cfg(target_arch = "wasm32")]
mod web {
    use web_sys::{AudioContext, GainNode, OscillatorNode, OscillatorType};

    use super::AudioSink;
    use crate::sim::SoundCue;

    /// Procedural sound effects on a browser AudioContext
    pub struct WebAudio {
        ctx: Option<AudioContext>,
        master_volume: f32,
        muted: bool,
    }

    impl Default for WebAudio {
        fn default() -> Self {
            Self::new()
        }
    }

    impl WebAudio {
        pub fn new() -> Self {
            // May fail outside a secure context
            let ctx = AudioContext::new().ok();
            if ctx.is_none() {
                log::warn!("Failed to create AudioContext - audio disabled");
            }
            Self {
                ctx,
                master_volume: 0.8,
                muted: false,
            }
        }

        fn effective_volume(&self) -> f32 {
            if self.muted { 0.0 } else { self.master_volume }
        }

        fn create_osc(
            ctx: &AudioContext,
            freq: f32,
            osc_type: OscillatorType,
        ) -> Option<(OscillatorNode, GainNode)> {
            let osc = ctx.create_oscillator().ok()?;
            let gain = ctx.create_gain().ok()?;
            osc.set_type(osc_type);
            osc.frequency().set_value(freq);
            osc.connect_with_audio_node(&gain).ok()?;
            gain.connect_with_audio_node(&ctx.destination()).ok()?;
            Some((osc, gain))
        }

        /// One enveloped tone, optionally sweeping to `end_freq`
        fn tone(
            ctx: &AudioContext,
            vol: f32,
            freq: f32,
            end_freq: Option<f32>,
            osc_type: OscillatorType,
            delay: f64,
            length: f64,
        ) {
            let Some((osc, gain)) = Self::create_osc(ctx, freq, osc_type) else {
                return;
            };
            let t = ctx.current_time() + delay;
            gain.gain().set_value_at_time(vol, t).ok();
            gain.gain()
                .exponential_ramp_to_value_at_time(0.01, t + length)
                .ok();
            if let Some(end) = end_freq {
                osc.frequency().set_value_at_time(freq, t).ok();
                osc.frequency()
                    .exponential_ramp_to_value_at_time(end, t + length)
                    .ok();
            }
            osc.start_with_when(t).ok();
            osc.stop_with_when(t + length + 0.05).ok();
        }
    }

    impl AudioSink for WebAudio {
        fn play(&mut self, cue: SoundCue) {
            let vol = self.effective_volume();
            if vol <= 0.0 {
                return;
            }
            let Some(ctx) = &self.ctx else { return };

            // Browsers suspend the context until a user gesture
            if ctx.state() == web_sys::AudioContextState::Suspended {
                let _ = ctx.resume();
            }

            match cue {
                SoundCue::Pew => {
                    Self::tone(ctx, vol * 0.12, 900.0, Some(500.0), OscillatorType::Square, 0.0, 0.06);
                }
                SoundCue::Hit => {
                    Self::tone(ctx, vol * 0.5, 150.0, Some(60.0), OscillatorType::Sine, 0.0, 0.1);
                    Self::tone(ctx, vol * 0.2, 300.0, None, OscillatorType::Triangle, 0.0, 0.05);
                }
                SoundCue::Explode => {
                    Self::tone(ctx, vol * 0.5, 100.0, Some(30.0), OscillatorType::Sawtooth, 0.0, 0.4);
                    Self::tone(ctx, vol * 0.2, 1500.0, None, OscillatorType::Square, 0.0, 0.1);
                }
                SoundCue::Zap => {
                    Self::tone(ctx, vol * 0.3, 120.0, Some(400.0), OscillatorType::Square, 0.0, 0.2);
                    Self::tone(ctx, vol * 0.3, 60.0, None, OscillatorType::Sawtooth, 0.0, 0.3);
                }
                SoundCue::Upgrade => {
                    for (i, freq) in [600.0, 800.0, 1000.0].iter().enumerate() {
                        Self::tone(ctx, vol * 0.25, *freq, None, OscillatorType::Sine, i as f64 * 0.08, 0.15);
                    }
                }
                SoundCue::BossDown => {
                    Self::tone(ctx, vol * 0.5, 80.0, Some(30.0), OscillatorType::Sawtooth, 0.0, 0.8);
                    for (i, freq) in [400.0, 500.0, 600.0, 800.0].iter().enumerate() {
                        Self::tone(ctx, vol * 0.3, *freq, None, OscillatorType::Triangle, 0.3 + i as f64 * 0.1, 0.4);
                    }
                }
            }
        }

        fn set_volume(&mut self, volume: f32) {
            self.master_volume = crate::finite_or(volume, 0.8).clamp(0.0, 1.0);
        }

        fn set_muted(&mut self, muted: bool) {
            self.muted = muted;
        }
    }
}
