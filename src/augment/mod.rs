//! Perturbed copies of a signal used to enlarge the training set.
//!
//! Variants are generated in a fixed order: time-stretch, pitch-shift, noise.
//! The first two may fail independently and are then left out; noise
//! injection is plain arithmetic and always succeeds.

pub mod noise;
pub mod pitch;
pub mod stretch;

use tracing::debug;

pub use noise::{add_noise, GaussianNoise, NoiseSource};
pub use pitch::pitch_shift;
pub use stretch::time_stretch;

use crate::types::SignalBuffer;

pub const STRETCH_RATE: f32 = 1.1;
pub const PITCH_SHIFT_STEPS: f32 = -2.0;
pub const NOISE_SCALE: f32 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AugmentationKind {
    TimeStretch,
    PitchShift,
    Noise,
}

impl AugmentationKind {
    /// Whether a failure for this variant should drop it rather than fail the file.
    pub fn is_optional(self) -> bool {
        !matches!(self, AugmentationKind::Noise)
    }

    pub fn name(self) -> &'static str {
        match self {
            AugmentationKind::TimeStretch => "time_stretch",
            AugmentationKind::PitchShift => "pitch_shift",
            AugmentationKind::Noise => "noise",
        }
    }
}

/// One derived signal and the transform that produced it.
#[derive(Debug, Clone)]
pub struct Augmented {
    pub kind: AugmentationKind,
    pub signal: SignalBuffer,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AugmentationGenerator {
    pub stretch_rate: f32,
    pub pitch_steps: f32,
    pub noise_scale: f32,
}

impl Default for AugmentationGenerator {
    fn default() -> Self {
        Self {
            stretch_rate: STRETCH_RATE,
            pitch_steps: PITCH_SHIFT_STEPS,
            noise_scale: NOISE_SCALE,
        }
    }
}

impl AugmentationGenerator {
    /// Produce between one and three variants; the noise variant is always last.
    pub fn generate(&self, signal: &SignalBuffer, noise: &mut dyn NoiseSource) -> Vec<Augmented> {
        let mut variants = Vec::with_capacity(3);

        match time_stretch(signal, self.stretch_rate) {
            Ok(stretched) => variants.push(Augmented {
                kind: AugmentationKind::TimeStretch,
                signal: stretched,
            }),
            Err(err) => debug!(error = %err, "dropping time-stretch variant"),
        }

        match pitch_shift(signal, self.pitch_steps) {
            Ok(shifted) => variants.push(Augmented {
                kind: AugmentationKind::PitchShift,
                signal: shifted,
            }),
            Err(err) => debug!(error = %err, "dropping pitch-shift variant"),
        }

        variants.push(Augmented {
            kind: AugmentationKind::Noise,
            signal: add_noise(signal, self.noise_scale, noise),
        });

        variants
    }
}
