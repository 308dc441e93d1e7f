use anyhow::{ensure, Result};
use aus::analysis;
use aus::analysis::mel::MelFilterbank;
use aus::spectrum;
use aus::WindowType;
use ndarray::Array2;

use super::statistics::{delta, feature_major};
use crate::types::SignalBuffer;

pub(crate) const FFT_SIZE: usize = 2048;
pub(crate) const HOP_SIZE: usize = 512;
pub const CHROMA_BINS: usize = 12;
pub const CONTRAST_BANDS: usize = 7;
/// Mel bands behind the cepstrum; also the largest usable `n_mfcc`.
pub const MEL_BANDS: usize = 128;
const MEL_MIN_FREQ: f64 = 20.0;
const MEL_FLOOR: f64 = 1e-10;
const CONTRAST_MIN_FREQ: f64 = 200.0;
const CONTRAST_QUANTILE: f64 = 0.02;
const CONTRAST_EPSILON: f64 = 1e-10;

/// Spectral descriptors of one signal. Every matrix is `(rows, frames)`.
#[derive(Debug, Clone)]
pub struct SpectralMatrices {
    pub mfcc: Array2<f32>,
    pub delta: Array2<f32>,
    pub chroma: Array2<f32>,
    pub contrast: Array2<f32>,
}

/// Compute MFCC, MFCC delta, chroma and spectral contrast for `signal`.
///
/// Callers are expected to have rejected buffers shorter than one second.
pub fn compute_spectral(signal: &SignalBuffer, n_mfcc: usize) -> Result<SpectralMatrices> {
    ensure!(
        (1..=MEL_BANDS).contains(&n_mfcc),
        "n_mfcc must be between 1 and {}, got {}",
        MEL_BANDS,
        n_mfcc
    );
    ensure!(!signal.is_empty(), "cannot analyse an empty signal");
    let sample_rate = signal.sample_rate();
    let audio: Vec<f64> = signal.samples().iter().map(|&s| s as f64).collect();

    let stft = spectrum::rstft(&audio, FFT_SIZE, HOP_SIZE, WindowType::Hanning);
    let (magnitude, _) = spectrum::complex_to_polar_rstft(&stft);
    let power = analysis::make_power_spectrogram(&magnitude);
    let freqs = spectrum::rfftfreq(FFT_SIZE, sample_rate);

    let filterbank = MelFilterbank::new(
        MEL_MIN_FREQ,
        (sample_rate as f64) / 2.0,
        MEL_BANDS,
        &freqs,
        true,
    );
    let mel: Vec<Vec<f64>> = analysis::mel::make_mel_spectrogram(&power, &filterbank)
        .into_iter()
        .map(|frame| frame.into_iter().map(|v| v.max(MEL_FLOOR)).collect())
        .collect();
    let mfcc_frames = analysis::mel::mfcc_spectrogram(&mel, n_mfcc, None);
    let mfcc = feature_major(&mfcc_frames, n_mfcc)?;
    let delta = delta(&mfcc);

    let chroma = feature_major(&chroma_frames(&power, &freqs), CHROMA_BINS)?;
    let contrast = feature_major(
        &contrast_frames(&magnitude, &freqs, sample_rate as f64 / 2.0),
        CONTRAST_BANDS,
    )?;

    Ok(SpectralMatrices {
        mfcc,
        delta,
        chroma,
        contrast,
    })
}

/// Pitch class of `freq` with C = 0 and A = 9 (A4 = 440 Hz).
pub(crate) fn pitch_class(freq: f64) -> usize {
    let semitones_from_a = (12.0 * (freq / 440.0).log2()).round() as i64;
    (semitones_from_a + 9).rem_euclid(CHROMA_BINS as i64) as usize
}

/// Fold each power frame into 12 pitch classes, normalised by the frame maximum.
fn chroma_frames(power: &[Vec<f64>], freqs: &[f64]) -> Vec<Vec<f64>> {
    let classes: Vec<Option<usize>> = freqs
        .iter()
        .map(|&f| (f > 0.0).then(|| pitch_class(f)))
        .collect();

    power
        .iter()
        .map(|frame| {
            let mut bins = vec![0.0; CHROMA_BINS];
            for (value, class) in frame.iter().zip(classes.iter()) {
                if let Some(class) = class {
                    bins[*class] += value;
                }
            }
            let peak = bins.iter().cloned().fold(0.0_f64, f64::max);
            if peak > 0.0 {
                bins.iter_mut().for_each(|b| *b /= peak);
            }
            bins
        })
        .collect()
}

/// Octave band edges: `[0, 200), [200, 400), ... [6400, nyquist]`.
fn contrast_band_edges(nyquist: f64) -> Vec<(f64, f64)> {
    let mut edges = Vec::with_capacity(CONTRAST_BANDS);
    let mut low = 0.0;
    let mut high = CONTRAST_MIN_FREQ;
    for band in 0..CONTRAST_BANDS {
        if band == CONTRAST_BANDS - 1 {
            high = f64::INFINITY;
        }
        edges.push((low, high.min(nyquist + 1.0)));
        low = high;
        high *= 2.0;
    }
    edges
}

fn contrast_frames(magnitude: &[Vec<f64>], freqs: &[f64], nyquist: f64) -> Vec<Vec<f64>> {
    let edges = contrast_band_edges(nyquist);
    let band_bins: Vec<Vec<usize>> = edges
        .iter()
        .map(|&(low, high)| {
            freqs
                .iter()
                .enumerate()
                .filter(|(_, f)| **f >= low && **f < high)
                .map(|(idx, _)| idx)
                .collect()
        })
        .collect();

    magnitude
        .iter()
        .map(|frame| {
            band_bins
                .iter()
                .map(|bins| band_contrast(frame, bins))
                .collect()
        })
        .collect()
}

/// Peak-minus-valley level (dB) of one sub-band; 0 when the band has no bins.
fn band_contrast(frame: &[f64], bins: &[usize]) -> f64 {
    let mut values: Vec<f64> = bins.iter().filter_map(|&idx| frame.get(idx).copied()).collect();
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let take = ((CONTRAST_QUANTILE * values.len() as f64).round() as usize).max(1);
    let valley = values[..take].iter().sum::<f64>() / take as f64;
    let peak = values[values.len() - take..].iter().sum::<f64>() / take as f64;
    10.0 * ((peak + CONTRAST_EPSILON).log10() - (valley + CONTRAST_EPSILON).log10())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Axis;

    const SAMPLE_RATE: u32 = 16_000;

    fn tone(freq: f32, seconds: f32) -> SignalBuffer {
        let total = (SAMPLE_RATE as f32 * seconds) as usize;
        let samples = (0..total)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin() * 0.5)
            .collect();
        SignalBuffer::new(samples, SAMPLE_RATE)
    }

    #[test]
    fn matrices_have_expected_row_counts() {
        let matrices = compute_spectral(&tone(220.0, 1.5), 13).unwrap();
        assert_eq!(matrices.mfcc.len_of(Axis(0)), 13);
        assert_eq!(matrices.delta.dim(), matrices.mfcc.dim());
        assert_eq!(matrices.chroma.len_of(Axis(0)), CHROMA_BINS);
        assert_eq!(matrices.contrast.len_of(Axis(0)), CONTRAST_BANDS);
        assert!(matrices.mfcc.len_of(Axis(1)) > 0);
    }

    #[test]
    fn chroma_peaks_at_pitch_class_of_a() {
        let matrices = compute_spectral(&tone(440.0, 1.0), 13).unwrap();
        let mean = matrices.chroma.mean_axis(Axis(1)).unwrap();
        let strongest = mean
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(idx, _)| idx)
            .unwrap();
        assert_eq!(strongest, 9);
    }

    #[test]
    fn pitch_classes_follow_equal_temperament() {
        assert_eq!(pitch_class(440.0), 9);
        assert_eq!(pitch_class(880.0), 9);
        assert_eq!(pitch_class(261.63), 0);
        assert_eq!(pitch_class(493.88), 11);
    }

    #[test]
    fn band_edges_cover_seven_octave_bands() {
        let edges = contrast_band_edges(8_000.0);
        assert_eq!(edges.len(), CONTRAST_BANDS);
        assert_eq!(edges[0], (0.0, 200.0));
        assert_eq!(edges[1], (200.0, 400.0));
        assert_eq!(edges[6].0, 6_400.0);
    }

    #[test]
    fn cepstral_count_is_bounded_by_mel_bands() {
        let signal = tone(220.0, 1.0);
        let widest = compute_spectral(&signal, MEL_BANDS).unwrap();
        assert_eq!(widest.mfcc.len_of(Axis(0)), MEL_BANDS);
        assert!(compute_spectral(&signal, MEL_BANDS + 1).is_err());
        assert!(compute_spectral(&signal, 0).is_err());
    }

    #[test]
    fn empty_band_has_zero_contrast() {
        assert_eq!(band_contrast(&[1.0, 2.0], &[]), 0.0);
    }
}
