use anyhow::{ensure, Context, Result};
use ndarray::{Array1, Array2, Axis};

const DELTA_WINDOW: usize = 2;

/// Per-row summary taken across the time (column) axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Mean,
    /// Population standard deviation
    Std,
}

impl Reducer {
    pub fn name(self) -> &'static str {
        match self {
            Reducer::Mean => "mean",
            Reducer::Std => "std",
        }
    }

    /// Collapse a `(rows, frames)` matrix into one value per row.
    pub fn reduce(self, matrix: &Array2<f32>) -> Result<Array1<f32>> {
        ensure!(
            matrix.len_of(Axis(1)) > 0,
            "cannot summarise a feature matrix with no frames"
        );
        let reduced = match self {
            Reducer::Mean => matrix
                .mean_axis(Axis(1))
                .context("feature matrix has no frames")?,
            Reducer::Std => matrix.std_axis(Axis(1), 0.0),
        };
        Ok(reduced.mapv(finite_or_zero))
    }
}

pub(crate) fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Build a `(features, frames)` matrix from frame-major rows.
///
/// `frames[t][k]` is feature `k` at frame `t`; the result is transposed so that
/// each row is one feature track over time.
pub(crate) fn feature_major(frames: &[Vec<f64>], features: usize) -> Result<Array2<f32>> {
    let mut matrix = Array2::zeros((features, frames.len()));
    for (t, frame) in frames.iter().enumerate() {
        ensure!(
            frame.len() >= features,
            "frame {} has {} values, expected at least {}",
            t,
            frame.len(),
            features
        );
        for (k, value) in frame.iter().take(features).enumerate() {
            matrix[[k, t]] = *value as f32;
        }
    }
    Ok(matrix)
}

/// First-order regression delta along the time axis with edge replication.
pub fn delta(input: &Array2<f32>) -> Array2<f32> {
    let (rows, frames) = input.dim();
    let mut output = Array2::zeros((rows, frames));
    if frames == 0 {
        return output;
    }
    let denominator = 2.0 * (1..=DELTA_WINDOW).map(|n| (n * n) as f32).sum::<f32>();

    for t in 0..frames {
        let mut numerator = Array1::<f32>::zeros(rows);
        for n in 1..=DELTA_WINDOW {
            let prev = input.column(t.saturating_sub(n));
            let next = input.column((t + n).min(frames - 1));
            numerator.scaled_add(n as f32, &(&next - &prev));
        }
        output.column_mut(t).assign(&(numerator / denominator));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn mean_and_std_reduce_across_time() {
        let matrix = array![[1.0_f32, 3.0], [2.0, 2.0]];
        let mean = Reducer::Mean.reduce(&matrix).unwrap();
        let std = Reducer::Std.reduce(&matrix).unwrap();
        assert_eq!(mean.to_vec(), vec![2.0, 2.0]);
        assert_abs_diff_eq!(std[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(std[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn reducers_reject_empty_time_axis() {
        let matrix = Array2::<f32>::zeros((3, 0));
        assert!(Reducer::Mean.reduce(&matrix).is_err());
        assert!(Reducer::Std.reduce(&matrix).is_err());
    }

    #[test]
    fn non_finite_summaries_become_zero() {
        let matrix = array![[f32::NEG_INFINITY, 1.0]];
        assert_eq!(Reducer::Mean.reduce(&matrix).unwrap()[0], 0.0);
    }

    #[test]
    fn delta_of_linear_ramp_is_slope_in_the_interior() {
        let ramp = Array2::from_shape_fn((1, 10), |(_, t)| 2.0 * t as f32);
        let d = delta(&ramp);
        assert_eq!(d.dim(), (1, 10));
        for t in 2..8 {
            assert_abs_diff_eq!(d[[0, t]], 2.0, epsilon = 1e-5);
        }
        assert!(d[[0, 0]] < 2.0);
    }

    #[test]
    fn delta_of_constant_is_zero() {
        let flat = Array2::from_elem((3, 5), 4.0_f32);
        assert!(delta(&flat).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn feature_major_transposes_frames() {
        let frames = vec![vec![1.0, 2.0, 9.0], vec![3.0, 4.0, 9.0]];
        let matrix = feature_major(&frames, 2).unwrap();
        assert_eq!(matrix, array![[1.0_f32, 3.0], [2.0, 4.0]]);
        assert!(feature_major(&frames, 4).is_err());
    }
}
