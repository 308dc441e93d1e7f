use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::SignalBuffer;

/// Supplier of independent standard-normal draws.
pub trait NoiseSource {
    fn standard_normal(&mut self) -> f32;
}

impl<F: FnMut() -> f32> NoiseSource for F {
    fn standard_normal(&mut self) -> f32 {
        self()
    }
}

/// Gaussian noise from a `StdRng` via the Box-Muller transform.
#[derive(Debug, Clone)]
pub struct GaussianNoise {
    rng: StdRng,
    spare: Option<f64>,
}

impl GaussianNoise {
    /// Unseeded source for production use.
    pub fn from_entropy() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }

    fn from_rng(rng: StdRng) -> Self {
        Self { rng, spare: None }
    }
}

impl NoiseSource for GaussianNoise {
    fn standard_normal(&mut self) -> f32 {
        if let Some(spare) = self.spare.take() {
            return spare as f32;
        }
        // u1 in (0, 1] keeps ln(u1) finite
        let u1: f64 = 1.0 - self.rng.gen::<f64>();
        let u2: f64 = self.rng.gen::<f64>();
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f64::consts::PI * u2;
        self.spare = Some(radius * theta.sin());
        (radius * theta.cos()) as f32
    }
}

/// New buffer with `scale * N(0, 1)` added independently to every sample.
pub fn add_noise(signal: &SignalBuffer, scale: f32, source: &mut dyn NoiseSource) -> SignalBuffer {
    let samples = signal
        .samples()
        .iter()
        .map(|&s| s + scale * source.standard_normal())
        .collect();
    signal.derive(samples)
}
