use anyhow::{ensure, Result};

/// Linearly resample `samples` from `source_rate` to `target_rate`.
pub fn linear_resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    ensure!(source_rate > 0, "source sample rate must be positive");
    ensure!(target_rate > 0, "target sample rate must be positive");
    if samples.is_empty() || source_rate == target_rate {
        return Ok(samples.to_vec());
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = ((samples.len() as f64) * ratio).ceil().max(1.0) as usize;
    Ok(interpolate(samples, output_len, 1.0 / ratio))
}

/// Linearly stretch or squeeze `samples` so the result holds exactly
/// `target_len` samples spanning the same content.
pub fn resample_to_length(samples: &[f32], target_len: usize) -> Result<Vec<f32>> {
    ensure!(!samples.is_empty(), "cannot resample an empty signal");
    if target_len == samples.len() {
        return Ok(samples.to_vec());
    }
    let step = if target_len > 1 {
        (samples.len() - 1) as f64 / (target_len - 1) as f64
    } else {
        0.0
    };
    Ok(interpolate(samples, target_len, step))
}

/// Read `output_len` points from `samples`, advancing `step` input samples per output sample.
fn interpolate(samples: &[f32], output_len: usize, step: f64) -> Vec<f32> {
    let last_index = samples.len() - 1;
    (0..output_len)
        .map(|i| {
            let position = (i as f64 * step).min(last_index as f64);
            let left = position.floor() as usize;
            let right = (left + 1).min(last_index);
            let t = (position - left as f64) as f32;
            samples[left] * (1.0 - t) + samples[right] * t
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{linear_resample, resample_to_length};

    #[test]
    fn preserves_constant_signal_after_resample() {
        let input = vec![0.5; 480];
        let resampled = linear_resample(&input, 48_000, 16_000).unwrap();
        let expected_len = ((input.len() as f32) * 16_000_f32 / 48_000_f32).ceil() as usize;
        assert_eq!(resampled.len(), expected_len);
        assert!(resampled.iter().all(|&sample| (sample - 0.5).abs() < 1e-6));
    }

    #[test]
    fn resample_to_length_hits_exact_length_and_endpoints() {
        let ramp: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let longer = resample_to_length(&ramp, 199).unwrap();
        assert_eq!(longer.len(), 199);
        assert_eq!(longer[0], 0.0);
        assert!((longer[198] - 99.0).abs() < 1e-4);
        assert!((longer[1] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn resample_to_length_rejects_empty_input() {
        assert!(resample_to_length(&[], 10).is_err());
    }
}
