//! Ambient vocalisation timing.

use serde::{Deserialize, Serialize};

use crate::events::SoundCue;

/// Cues drawn from for ambient sounds. Idle is twice as likely as alert.
pub const AMBIENT_CUES: [SoundCue; 3] = [SoundCue::Idle, SoundCue::Alert, SoundCue::Idle];

/// Ambient sound settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    /// Play ambient sounds at all
    pub enabled: bool,
    /// Shortest delay before an agent's first sound
    pub first_delay_min: f32,
    /// Longest delay before an agent's first sound
    pub first_delay_max: f32,
    /// Shortest delay between later sounds
    pub repeat_delay_min: f32,
    /// Longest delay between later sounds
    pub repeat_delay_max: f32,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            first_delay_min: 5.0,
            first_delay_max: 15.0,
            repeat_delay_min: 8.0,
            repeat_delay_max: 20.0,
        }
    }
}

impl AmbientConfig {
    /// Clamp values to sensible ranges.
    pub fn validate(&mut self) {
        self.first_delay_min = self.first_delay_min.max(0.0);
        self.first_delay_max = self.first_delay_max.max(self.first_delay_min);
        self.repeat_delay_min = self.repeat_delay_min.max(0.1);
        self.repeat_delay_max = self.repeat_delay_max.max(self.repeat_delay_min);
    }
}

/// Random source for ambient sound timing and cue choice.
#[derive(Debug, Clone)]
pub struct AmbientVoice {
    config: AmbientConfig,
    rng: fastrand::Rng,
}

impl AmbientVoice {
    /// Creates a voice with a seeded RNG.
    #[must_use]
    pub fn new(config: AmbientConfig, seed: u64) -> Self {
        Self {
            config,
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Returns whether ambient sounds are on.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Delay before a new agent's first sound, `None` when disabled.
    pub fn first_delay(&mut self) -> Option<f32> {
        let (min, max) = (self.config.first_delay_min, self.config.first_delay_max);
        self.config.enabled.then(|| self.uniform(min, max))
    }

    /// Delay until the following sound, `None` when disabled.
    pub fn next_delay(&mut self) -> Option<f32> {
        let (min, max) = (self.config.repeat_delay_min, self.config.repeat_delay_max);
        self.config.enabled.then(|| self.uniform(min, max))
    }

    /// Picks the cue to play.
    pub fn pick_cue(&mut self) -> SoundCue {
        AMBIENT_CUES[self.rng.usize(..AMBIENT_CUES.len())]
    }

    fn uniform(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.rng.f32()
    }
}
