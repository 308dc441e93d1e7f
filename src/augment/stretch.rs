//! Time-stretch: change tempo without changing pitch
//!
//! Uses ssstretch (Signalsmith Stretch) for pitch-preserving time-stretch.

use anyhow::{ensure, Result};
use ssstretch::Stretch;

use crate::types::SignalBuffer;

/// Stretch `signal` so it plays `rate` times faster (`rate > 1.0` shortens it).
///
/// The output holds `ceil(len / rate)` samples at the original sample rate.
///
/// # Examples
/// ```
/// use storyprep::augment::stretch::time_stretch;
/// use storyprep::types::SignalBuffer;
///
/// let signal = SignalBuffer::new(vec![0.1; 22_050], 22_050);
/// let faster = time_stretch(&signal, 1.1).unwrap();
/// assert!(faster.len() < signal.len());
/// ```
pub fn time_stretch(signal: &SignalBuffer, rate: f32) -> Result<SignalBuffer> {
    ensure!(
        rate.is_finite() && rate > 0.0,
        "stretch rate must be positive, got {}",
        rate
    );
    ensure!(!signal.is_empty(), "cannot stretch an empty signal");
    ensure!(signal.sample_rate() > 0, "sample rate must be positive");
    // Rate 1.0 is a plain copy; skip the stretcher and its latency
    if is_identity_rate(rate) {
        return Ok(signal.clone());
    }

    let mut stretch = configured_stretch(signal.sample_rate());
    let samples = collect_stretched_samples(&mut stretch, signal.samples(), rate);
    ensure!(!samples.is_empty(), "time stretch produced no output");
    ensure!(
        samples.iter().all(|s| s.is_finite()),
        "time stretch produced non-finite samples"
    );

    Ok(signal.derive(samples))
}

fn is_identity_rate(rate: f32) -> bool {
    (rate - 1.0).abs() < 1e-6
}

/// Single-channel stretcher with Signalsmith's default block and interval.
fn configured_stretch(sample_rate: u32) -> Stretch {
    let mut stretch = Stretch::new();
    stretch.preset_default(1, sample_rate as f32);
    stretch
}

fn collect_stretched_samples(stretch: &mut Stretch, input: &[f32], rate: f32) -> Vec<f32> {
    let desired_output = (((input.len() as f64) / (rate as f64)).ceil() as usize).max(1);
    // Ask for latency extra samples so the tail is not cut short
    let latency = stretch.output_latency().max(0) as usize;
    let output_request = desired_output + latency;
    let inputs = vec![input.to_vec()];
    let mut outputs = vec![Vec::new()];
    stretch.process_vec(
        &inputs,
        input.len() as i32,
        &mut outputs,
        output_request as i32,
    );

    let mut samples = outputs.into_iter().next().unwrap_or_default();
    // Drain whatever is still buffered inside the stretcher
    let mut flush_outputs = vec![Vec::new()];
    stretch.flush_vec(&mut flush_outputs, latency as i32);
    if let Some(mut channel) = flush_outputs.into_iter().next() {
        samples.append(&mut channel);
    }

    // leading output is the stretcher's latency
    if samples.len() >= desired_output + latency {
        samples.drain(..latency);
    }
    samples.truncate(desired_output);
    samples
}
