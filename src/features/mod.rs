mod spectral;
mod statistics;
mod voice;

use anyhow::{ensure, Result};
use ndarray::Array2;
use tracing::debug;

pub use spectral::{compute_spectral, SpectralMatrices, CHROMA_BINS, CONTRAST_BANDS, MEL_BANDS};
pub use statistics::{delta, Reducer};
pub use voice::{PeriodLimits, VoiceAnalyzer, VoiceQuality};

use crate::types::{FeatureVector, SignalBuffer};

pub const DEFAULT_N_MFCC: usize = 13;
pub const VOICE_FIELDS: usize = 4;
/// Cepstral coefficients are taken from a fixed mel filterbank.
pub const MAX_N_MFCC: usize = MEL_BANDS;

/// Vector length for a given cepstral coefficient count: `3 * n_mfcc + 23`.
pub const fn dimension_for(n_mfcc: usize) -> usize {
    3 * n_mfcc + CHROMA_BINS + CONTRAST_BANDS + VOICE_FIELDS
}

/// Spectral matrix a field group is summarised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectralSource {
    Mfcc,
    Delta,
    Chroma,
    Contrast,
}

impl SpectralSource {
    pub fn name(self) -> &'static str {
        match self {
            SpectralSource::Mfcc => "mfcc",
            SpectralSource::Delta => "delta",
            SpectralSource::Chroma => "chroma",
            SpectralSource::Contrast => "contrast",
        }
    }

    fn select(self, matrices: &SpectralMatrices) -> &Array2<f32> {
        match self {
            SpectralSource::Mfcc => &matrices.mfcc,
            SpectralSource::Delta => &matrices.delta,
            SpectralSource::Chroma => &matrices.chroma,
            SpectralSource::Contrast => &matrices.contrast,
        }
    }
}

/// One contiguous run of vector entries: a reducer applied to a spectral matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldGroup {
    pub source: SpectralSource,
    pub reducer: Reducer,
    pub width: usize,
}

impl FieldGroup {
    pub fn name(&self) -> String {
        format!("{}_{}", self.source.name(), self.reducer.name())
    }
}

/// Field order of every feature vector produced for a given `n_mfcc`:
/// `[mfcc_mean, mfcc_std, delta_mean, chroma_mean, contrast_mean, f0_mean, jitter, shimmer, hnr]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureLayout {
    n_mfcc: usize,
    groups: Vec<FieldGroup>,
}

impl FeatureLayout {
    pub fn new(n_mfcc: usize) -> Result<Self> {
        ensure!(
            (1..=MAX_N_MFCC).contains(&n_mfcc),
            "n_mfcc must be between 1 and {}, got {}",
            MAX_N_MFCC,
            n_mfcc
        );
        let group = |source, reducer, width| FieldGroup {
            source,
            reducer,
            width,
        };
        Ok(Self {
            n_mfcc,
            groups: vec![
                group(SpectralSource::Mfcc, Reducer::Mean, n_mfcc),
                group(SpectralSource::Mfcc, Reducer::Std, n_mfcc),
                group(SpectralSource::Delta, Reducer::Mean, n_mfcc),
                group(SpectralSource::Chroma, Reducer::Mean, CHROMA_BINS),
                group(SpectralSource::Contrast, Reducer::Mean, CONTRAST_BANDS),
            ],
        })
    }

    pub fn n_mfcc(&self) -> usize {
        self.n_mfcc
    }

    pub fn groups(&self) -> &[FieldGroup] {
        &self.groups
    }

    pub fn dimension(&self) -> usize {
        self.groups.iter().map(|g| g.width).sum::<usize>() + VOICE_FIELDS
    }

    /// Descriptive per-entry names, e.g. `mfcc_mean_1` or `hnr`.
    pub fn field_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.dimension());
        for group in &self.groups {
            let prefix = group.name();
            names.extend((1..=group.width).map(|i| format!("{prefix}_{i}")));
        }
        names.extend(VoiceQuality::FIELD_NAMES.iter().map(|n| n.to_string()));
        names
    }
}

/// Turns one signal buffer into one fixed-length feature vector.
#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    layout: FeatureLayout,
    voice: VoiceAnalyzer,
}

impl FeatureAssembler {
    pub fn new(n_mfcc: usize) -> Result<Self> {
        Ok(Self {
            layout: FeatureLayout::new(n_mfcc)?,
            voice: VoiceAnalyzer::new(),
        })
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    pub fn dimension(&self) -> usize {
        self.layout.dimension()
    }

    /// Buffers shorter than one second map to the all-zero vector.
    pub fn assemble(&self, signal: &SignalBuffer) -> Result<FeatureVector> {
        ensure!(signal.sample_rate() > 0, "sample rate must be positive");
        let dimension = self.dimension();
        if signal.is_shorter_than_one_second() {
            debug!(
                samples = signal.len(),
                sample_rate = signal.sample_rate(),
                "signal shorter than one second; using zero vector"
            );
            return Ok(FeatureVector::zeros(dimension));
        }

        let matrices = compute_spectral(signal, self.layout.n_mfcc())?;
        let mut values = Vec::with_capacity(dimension);
        for group in self.layout.groups() {
            let reduced = group.reducer.reduce(group.source.select(&matrices))?;
            ensure!(
                reduced.len() == group.width,
                "{} produced {} values, expected {}",
                group.name(),
                reduced.len(),
                group.width
            );
            values.extend(reduced.iter().copied());
        }
        values.extend(self.voice.analyze_or_default(signal).to_array());

        ensure!(
            values.len() == dimension,
            "assembled {} values, expected {}",
            values.len(),
            dimension
        );
        Ok(FeatureVector::from(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voiced_like(seconds: f32, rate: u32) -> SignalBuffer {
        let total = (rate as f32 * seconds) as usize;
        let samples = (0..total)
            .map(|i| {
                let t = i as f32 / rate as f32;
                let two_pi = 2.0 * std::f32::consts::PI;
                0.3 * (two_pi * 150.0 * t).sin() + 0.1 * (two_pi * 300.0 * t).sin()
            })
            .collect();
        SignalBuffer::new(samples, rate)
    }

    #[test]
    fn dimension_matches_formula() {
        assert_eq!(dimension_for(13), 62);
        for n_mfcc in [1, 13, 20, 40] {
            let layout = FeatureLayout::new(n_mfcc).unwrap();
            assert_eq!(layout.dimension(), 3 * n_mfcc + 23);
            assert_eq!(layout.field_names().len(), layout.dimension());
        }
    }

    #[test]
    fn rejects_coefficient_counts_outside_filterbank() {
        assert!(FeatureLayout::new(0).is_err());
        assert!(FeatureAssembler::new(0).is_err());
        assert!(FeatureLayout::new(MAX_N_MFCC + 1).is_err());
        assert!(FeatureAssembler::new(200).is_err());
    }

    #[test]
    fn widest_layout_assembles_full_vector() {
        let assembler = FeatureAssembler::new(MAX_N_MFCC).unwrap();
        let vector = assembler.assemble(&voiced_like(1.1, 16_000)).unwrap();
        assert_eq!(vector.len(), 3 * MAX_N_MFCC + 23);
        assert!(vector.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn field_names_follow_vector_order() {
        let names = FeatureLayout::new(13).unwrap().field_names();
        assert_eq!(names[0], "mfcc_mean_1");
        assert_eq!(names[13], "mfcc_std_1");
        assert_eq!(names[26], "delta_mean_1");
        assert_eq!(names[39], "chroma_mean_1");
        assert_eq!(names[51], "contrast_mean_1");
        assert_eq!(&names[58..], &["f0_mean", "jitter", "shimmer", "hnr"]);
    }

    #[test]
    fn voiced_signal_yields_full_vector() {
        let assembler = FeatureAssembler::new(13).unwrap();
        let vector = assembler.assemble(&voiced_like(1.2, 16_000)).unwrap();
        assert_eq!(vector.len(), 62);
        assert!(vector.as_slice().iter().all(|v| v.is_finite()));
        assert!(!vector.is_all_zero());
    }

    #[test]
    fn half_second_signal_yields_zero_vector() {
        let assembler = FeatureAssembler::new(13).unwrap();
        let vector = assembler.assemble(&voiced_like(0.5, 16_000)).unwrap();
        assert_eq!(vector, FeatureVector::zeros(62));
    }

    #[test]
    fn silent_signal_keeps_dimension() {
        let assembler = FeatureAssembler::new(20).unwrap();
        let silence = SignalBuffer::new(vec![0.0; 17_000], 16_000);
        let vector = assembler.assemble(&silence).unwrap();
        assert_eq!(vector.len(), 83);
        assert!(vector.as_slice().iter().all(|v| v.is_finite()));
    }
}
