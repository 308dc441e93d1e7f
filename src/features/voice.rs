//! Voice-quality measures: mean F0, local jitter, local shimmer and HNR.
//!
//! Analysis is best effort. [`VoiceAnalyzer::analyze_or_default`] never fails;
//! anything that goes wrong collapses the whole tuple to [`VoiceQuality::ZERO`].

use std::panic::{self, AssertUnwindSafe};

use anyhow::{ensure, Context, Result};
use aus::analysis;
use tracing::debug;

use crate::audio::resample;
use crate::types::SignalBuffer;

const ANALYSIS_RATE: u32 = 16_000;
const PITCH_FLOOR: f64 = 75.0;
const PITCH_CEILING: f64 = 500.0;
const FRAME_SECONDS: f64 = 0.04;
const HNR_HOP_SECONDS: f64 = 0.01;
const SILENCE_ENERGY: f64 = 1e-10;
const MAX_CORRELATION: f64 = 1.0 - 1e-6;
const MIN_CORRELATION: f64 = 1e-6;
// Two samples per period is the shortest resolvable pitch
const NYQUIST_LAG: usize = 2;

/// The four voice-quality scalars appended to every feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VoiceQuality {
    pub f0_mean: f32,
    pub jitter: f32,
    pub shimmer: f32,
    pub hnr: f32,
}

impl VoiceQuality {
    pub const ZERO: Self = Self {
        f0_mean: 0.0,
        jitter: 0.0,
        shimmer: 0.0,
        hnr: 0.0,
    };

    pub const FIELD_NAMES: [&'static str; 4] = ["f0_mean", "jitter", "shimmer", "hnr"];

    pub fn to_array(self) -> [f32; 4] {
        [self.f0_mean, self.jitter, self.shimmer, self.hnr]
    }
}

/// Bounds applied when comparing neighbouring glottal periods.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodLimits {
    /// Shortest admissible period in seconds
    pub shortest: f64,
    /// Longest admissible period in seconds
    pub longest: f64,
    pub max_period_factor: f64,
    pub max_amplitude_factor: f64,
}

impl Default for PeriodLimits {
    fn default() -> Self {
        Self {
            shortest: 0.0001,
            longest: 0.02,
            max_period_factor: 1.3,
            max_amplitude_factor: 1.6,
        }
    }
}

impl PeriodLimits {
    fn admits(&self, period: f64) -> bool {
        period >= self.shortest && period <= self.longest
    }
}

#[derive(Debug, Clone, Copy)]
struct VoicedFrame {
    start: usize,
    f0: f64,
}

#[derive(Debug, Clone)]
pub struct VoiceAnalyzer {
    pitch_floor: f64,
    pitch_ceiling: f64,
    limits: PeriodLimits,
}

impl Default for VoiceAnalyzer {
    fn default() -> Self {
        Self {
            pitch_floor: PITCH_FLOOR,
            pitch_ceiling: PITCH_CEILING,
            limits: PeriodLimits::default(),
        }
    }
}

impl VoiceAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the analysis, substituting all zeros on any failure.
    pub fn analyze_or_default(&self, signal: &SignalBuffer) -> VoiceQuality {
        // pYIN and friends may panic on degenerate buffers; treat that like an error.
        match panic::catch_unwind(AssertUnwindSafe(|| self.analyze(signal))) {
            Ok(Ok(quality)) => quality,
            Ok(Err(err)) => {
                debug!(error = %err, "voice analysis failed; using zero voice features");
                VoiceQuality::ZERO
            }
            Err(_) => {
                debug!("voice analysis panicked; using zero voice features");
                VoiceQuality::ZERO
            }
        }
    }

    /// Undefined measures (no voiced frames, no usable periods) come back as 0.
    pub fn analyze(&self, signal: &SignalBuffer) -> Result<VoiceQuality> {
        ensure!(!signal.is_empty(), "cannot analyse an empty signal");
        ensure!(
            signal.samples().iter().all(|s| s.is_finite()),
            "signal contains non-finite samples"
        );
        let resampled =
            resample::linear_resample(signal.samples(), signal.sample_rate(), ANALYSIS_RATE)
                .with_context(|| {
                    format!(
                        "failed to resample audio from {} Hz to {} Hz",
                        signal.sample_rate(),
                        ANALYSIS_RATE
                    )
                })?;
        let audio: Vec<f64> = resampled.into_iter().map(|s| s as f64).collect();
        let frame_len = frame_length_samples();
        ensure!(
            audio.len() >= frame_len,
            "signal is shorter than one analysis frame"
        );

        let (timestamps, pitches, voiced_flags, _confidence) = analysis::pyin_pitch_estimator(
            &audio,
            ANALYSIS_RATE,
            self.pitch_floor,
            self.pitch_ceiling,
            frame_len,
        );
        let frames = self.voiced_frames(&timestamps, &pitches, &voiced_flags);
        let f0_mean = mean(frames.iter().map(|frame| frame.f0)).unwrap_or(0.0);

        let pulses = self.point_process(&audio, &frames, frame_len);
        let periods = periods_of(&pulses);
        let jitter = self.local_jitter(&periods).unwrap_or(0.0);
        let shimmer = self
            .local_shimmer(&periods, &period_amplitudes(&audio, &pulses))
            .unwrap_or(0.0);
        let hnr = self.harmonics_to_noise(&audio).unwrap_or(0.0);

        let quality = VoiceQuality {
            f0_mean: f0_mean as f32,
            jitter: jitter as f32,
            shimmer: shimmer as f32,
            hnr: hnr as f32,
        };
        ensure!(
            quality.to_array().iter().all(|v| v.is_finite()),
            "voice measures are not finite: {:?}",
            quality
        );
        Ok(quality)
    }

    fn voiced_frames(&self, timestamps: &[f64], pitches: &[f64], voiced: &[bool]) -> Vec<VoicedFrame> {
        timestamps
            .iter()
            .zip(pitches.iter())
            .zip(voiced.iter())
            .filter_map(|((&time, &f0), &flag)| {
                let usable = flag
                    && f0.is_finite()
                    && f0 >= self.pitch_floor * 0.5
                    && f0 <= self.pitch_ceiling * 2.0;
                usable.then(|| VoicedFrame {
                    start: (time * ANALYSIS_RATE as f64).round().max(0.0) as usize,
                    f0,
                })
            })
            .collect()
    }

    /// Glottal pulse positions (sample indices), one per period inside voiced frames.
    fn point_process(&self, audio: &[f64], frames: &[VoicedFrame], frame_len: usize) -> Vec<usize> {
        let mut pulses = Vec::new();
        for frame in frames {
            let period = ANALYSIS_RATE as f64 / frame.f0;
            let end = (frame.start + frame_len).min(audio.len());
            if frame.start >= end {
                continue;
            }
            let first_end = (frame.start + period.ceil() as usize).min(end);
            let mut pulse = peak_index(audio, frame.start, first_end);
            loop {
                pulses.push(pulse);
                let low = pulse + (0.7 * period) as usize;
                let high = (pulse + (1.3 * period).ceil() as usize).min(end);
                if low >= high {
                    break;
                }
                pulse = peak_index(audio, low, high);
            }
        }

        pulses.sort_unstable();
        let min_gap = (0.5 * ANALYSIS_RATE as f64 / self.pitch_ceiling) as usize;
        let mut merged: Vec<usize> = Vec::with_capacity(pulses.len());
        for pulse in pulses {
            match merged.last() {
                Some(&last) if pulse - last < min_gap => {}
                _ => merged.push(pulse),
            }
        }
        merged
    }

    fn local_jitter(&self, periods: &[f64]) -> Option<f64> {
        let mut total = 0.0;
        let mut count = 0usize;
        for pair in periods.windows(2) {
            if self.comparable_periods(pair[0], pair[1]) {
                total += (pair[1] - pair[0]).abs();
                count += 1;
            }
        }
        let mean_period = mean(periods.iter().copied().filter(|&p| self.limits.admits(p)))?;
        (count > 0 && mean_period > 0.0).then(|| (total / count as f64) / mean_period)
    }

    fn local_shimmer(&self, periods: &[f64], amplitudes: &[f64]) -> Option<f64> {
        let mut total = 0.0;
        let mut count = 0usize;
        for idx in 1..periods.len().min(amplitudes.len()) {
            let (a_prev, a_next) = (amplitudes[idx - 1], amplitudes[idx]);
            if self.comparable_periods(periods[idx - 1], periods[idx])
                && ratio(a_prev, a_next) <= self.limits.max_amplitude_factor
            {
                total += (a_next - a_prev).abs();
                count += 1;
            }
        }
        let mean_amplitude = mean(
            periods
                .iter()
                .zip(amplitudes.iter())
                .filter(|(period, _)| self.limits.admits(**period))
                .map(|(_, amplitude)| *amplitude),
        )?;
        (count > 0 && mean_amplitude > 0.0).then(|| (total / count as f64) / mean_amplitude)
    }

    fn comparable_periods(&self, a: f64, b: f64) -> bool {
        self.limits.admits(a) && self.limits.admits(b) && ratio(a, b) <= self.limits.max_period_factor
    }

    /// Mean HNR (dB) over non-silent frames.
    ///
    /// Each frame takes its strongest autocorrelation peak between the
    /// Nyquist lag and the pitch floor; there is no upper pitch limit.
    fn harmonics_to_noise(&self, audio: &[f64]) -> Option<f64> {
        let window = frame_length_samples();
        let hop = ((ANALYSIS_RATE as f64 * HNR_HOP_SECONDS) as usize).max(1);
        let max_lag = ((ANALYSIS_RATE as f64 / self.pitch_floor).ceil() as usize).min(window - 1);

        let mut values = Vec::new();
        let mut start = 0;
        while start + window <= audio.len() {
            let frame = &audio[start..start + window];
            let energy: f64 = frame.iter().map(|s| s * s).sum();
            if energy > SILENCE_ENERGY {
                if let Some(r) = peak_autocorrelation(frame, max_lag) {
                    values.push(10.0 * (r / (1.0 - r)).log10());
                }
            }
            start += hop;
        }
        mean(values.into_iter())
    }
}

fn frame_length_samples() -> usize {
    ((ANALYSIS_RATE as f64 * FRAME_SECONDS) as usize).max(1)
}

fn periods_of(pulses: &[usize]) -> Vec<f64> {
    pulses
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64 / ANALYSIS_RATE as f64)
        .collect()
}

/// Peak absolute amplitude inside each period.
fn period_amplitudes(audio: &[f64], pulses: &[usize]) -> Vec<f64> {
    pulses
        .windows(2)
        .map(|w| audio[w[0]..w[1]].iter().fold(0.0_f64, |acc, s| acc.max(s.abs())))
        .collect()
}

fn peak_index(audio: &[f64], start: usize, end: usize) -> usize {
    (start..end)
        .max_by(|&a, &b| audio[a].abs().total_cmp(&audio[b].abs()))
        .unwrap_or(start)
}

/// Highest local maximum of the normalised autocorrelation for lags
/// `2..=max_lag`, clamped into (0, 1).
fn peak_autocorrelation(frame: &[f64], max_lag: usize) -> Option<f64> {
    let last = max_lag.min(frame.len().saturating_sub(2));
    if last < NYQUIST_LAG {
        return None;
    }
    let r: Vec<f64> = (0..=last + 1)
        .map(|lag| normalized_autocorrelation(frame, lag))
        .collect();
    (NYQUIST_LAG..=last)
        .filter(|&lag| r[lag] >= r[lag - 1] && r[lag] > r[lag + 1])
        .map(|lag| r[lag])
        .fold(None, |best: Option<f64>, value| Some(best.map_or(value, |b| b.max(value))))
        .map(|peak| peak.clamp(MIN_CORRELATION, MAX_CORRELATION))
}

fn normalized_autocorrelation(frame: &[f64], lag: usize) -> f64 {
    let head = &frame[..frame.len() - lag];
    let tail = &frame[lag..];
    let cross: f64 = head.iter().zip(tail).map(|(a, b)| a * b).sum();
    let head_energy: f64 = head.iter().map(|s| s * s).sum();
    let tail_energy: f64 = tail.iter().map(|s| s * s).sum();
    let denominator = (head_energy * tail_energy).sqrt();
    if denominator > 0.0 {
        cross / denominator
    } else {
        0.0
    }
}

fn ratio(a: f64, b: f64) -> f64 {
    let (low, high) = if a < b { (a, b) } else { (b, a) };
    if low <= 0.0 {
        f64::INFINITY
    } else {
        high / low
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
