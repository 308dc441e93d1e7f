//! Pitch shift by whole or fractional semitones at constant tempo
//!
//! Stretches by `2^(-n/12)` and resamples back to the original length, so
//! duration is preserved while every frequency is scaled by `2^(n/12)`.

use anyhow::{ensure, Context, Result};

use super::stretch::time_stretch;
use crate::audio::resample::resample_to_length;
use crate::types::SignalBuffer;

pub fn pitch_shift(signal: &SignalBuffer, semitones: f32) -> Result<SignalBuffer> {
    ensure!(
        semitones.is_finite(),
        "pitch shift must be finite, got {}",
        semitones
    );
    ensure!(!signal.is_empty(), "cannot pitch-shift an empty signal");
    if semitones.abs() < 1e-6 {
        return Ok(signal.clone());
    }

    let rate = 2.0_f32.powf(-semitones / 12.0);
    let stretched = time_stretch(signal, rate)
        .with_context(|| format!("failed to stretch by {rate:.4} for pitch shift"))?;
    let samples = resample_to_length(stretched.samples(), signal.len())?;
    Ok(signal.derive(samples))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_length_and_rate() {
        let samples = (0..16_000)
            .map(|i| (i as f32 * 0.05).sin() * 0.3)
            .collect::<Vec<_>>();
        let signal = SignalBuffer::new(samples, 16_000);
        let shifted = pitch_shift(&signal, -2.0).unwrap();
        assert_eq!(shifted.len(), signal.len());
        assert_eq!(shifted.sample_rate(), 16_000);
        assert!(shifted.samples().iter().all(|s| s.is_finite()));
    }

    #[test]
    fn zero_steps_is_identity() {
        let signal = SignalBuffer::new(vec![0.2; 100], 8_000);
        assert_eq!(pitch_shift(&signal, 0.0).unwrap(), signal);
    }

    #[test]
    fn empty_signal_fails() {
        let empty = SignalBuffer::new(Vec::new(), 8_000);
        assert!(pitch_shift(&empty, -2.0).is_err());
    }
}
