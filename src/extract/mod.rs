//! Single-file and batch feature extraction.

pub mod batch;
pub mod table;

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

pub use batch::{extract_features_batch, BatchExtractor, EmptyBatchError, InputTable};
pub use table::{BatchTable, RowDiagnostic};

use crate::audio::{SignalLoader, SymphoniaLoader};
use crate::augment::{AugmentationGenerator, GaussianNoise, NoiseSource};
use crate::config::ExtractionConfig;
use crate::features::FeatureAssembler;
use crate::types::{FeatureVector, SignalBuffer};

/// Loads one file and turns it into one feature vector, plus up to three more
/// for augmented variants when augmentation is enabled.
pub struct FeatureExtractor<L = SymphoniaLoader> {
    loader: L,
    assembler: FeatureAssembler,
    augment: bool,
    generator: AugmentationGenerator,
    noise: Box<dyn NoiseSource>,
}

impl FeatureExtractor<SymphoniaLoader> {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        Self::with_loader(SymphoniaLoader, config)
    }
}

impl<L: SignalLoader> FeatureExtractor<L> {
    pub fn with_loader(loader: L, config: &ExtractionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            loader,
            assembler: FeatureAssembler::new(config.n_mfcc)?,
            augment: config.augment,
            generator: AugmentationGenerator::default(),
            noise: Box::new(GaussianNoise::from_seed(config.noise_seed)),
        })
    }

    /// Replace the noise source used by the noise-injection variant.
    pub fn with_noise_source(mut self, noise: impl NoiseSource + 'static) -> Self {
        self.noise = Box::new(noise);
        self
    }

    /// Replace the augmentation settings (rates, steps and noise scale).
    pub fn with_generator(mut self, generator: AugmentationGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn dimension(&self) -> usize {
        self.assembler.dimension()
    }

    pub fn assembler(&self) -> &FeatureAssembler {
        &self.assembler
    }

    pub fn augments(&self) -> bool {
        self.augment
    }

    /// Load errors propagate; nothing about the file is retried or skipped here.
    pub fn extract_file(&mut self, path: &Path) -> Result<Vec<FeatureVector>> {
        let signal = self
            .loader
            .load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        debug!(
            path = %path.display(),
            samples = signal.len(),
            sample_rate = signal.sample_rate(),
            "loaded signal"
        );
        self.extract_signal(&signal)
    }

    /// Vectors for `signal` followed by those of its augmented variants.
    pub fn extract_signal(&mut self, signal: &SignalBuffer) -> Result<Vec<FeatureVector>> {
        let mut vectors = vec![self.assembler.assemble(signal)?];
        if !self.augment {
            return Ok(vectors);
        }

        for variant in self.generator.generate(signal, self.noise.as_mut()) {
            match self.assembler.assemble(&variant.signal) {
                Ok(vector) => vectors.push(vector),
                Err(err) if variant.kind.is_optional() => {
                    debug!(variant = variant.kind.name(), error = %err, "dropping augmented vector");
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("Failed to extract {} variant", variant.kind.name())
                    })
                }
            }
        }
        Ok(vectors)
    }
}

impl<L: fmt::Debug> fmt::Debug for FeatureExtractor<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("loader", &self.loader)
            .field("n_mfcc", &self.assembler.layout().n_mfcc())
            .field("augment", &self.augment)
            .finish_non_exhaustive()
    }
}

/// Extract feature vectors from one audio file with default settings.
///
/// Returns one vector, or two to four when `augment` is set.
pub fn extract_features<P: AsRef<Path>>(
    path: P,
    n_mfcc: usize,
    augment: bool,
) -> Result<Vec<FeatureVector>> {
    let config = ExtractionConfig {
        n_mfcc,
        augment,
        ..ExtractionConfig::default()
    };
    FeatureExtractor::new(&config)?.extract_file(path.as_ref())
}
