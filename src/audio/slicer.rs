use crate::types::SignalBuffer;

/// Number of samples covered by one `duration_secs` segment at `sample_rate`.
pub fn samples_per_segment(duration_secs: u32, sample_rate: u32) -> usize {
    duration_secs as usize * sample_rate as usize
}

/// Cut `signal` into consecutive whole segments of `duration_secs` each.
///
/// Segment `i` covers samples `[i * S, (i + 1) * S)`; a trailing remainder
/// shorter than one segment is dropped.
pub fn fixed_duration_segments(signal: &SignalBuffer, duration_secs: u32) -> Vec<SignalBuffer> {
    let span = samples_per_segment(duration_secs, signal.sample_rate());
    if span == 0 {
        return Vec::new();
    }
    signal
        .samples()
        .chunks_exact(span)
        .map(|chunk| signal.derive(chunk.to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_partial_tail() {
        // 95 seconds at a 100 Hz toy rate
        let signal = SignalBuffer::new(vec![0.0; 9_500], 100);
        let segments = fixed_duration_segments(&signal, 30);
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.len() == 3_000));
        assert!(segments.iter().all(|s| s.sample_rate() == 100));
    }

    #[test]
    fn keeps_sample_order() {
        let samples: Vec<f32> = (0..40).map(|i| i as f32).collect();
        let signal = SignalBuffer::new(samples, 10);
        let segments = fixed_duration_segments(&signal, 2);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].samples()[0], 20.0);
        assert_eq!(segments[1].samples()[19], 39.0);
    }

    #[test]
    fn shorter_than_one_segment_yields_nothing() {
        let signal = SignalBuffer::new(vec![0.0; 299], 10);
        assert!(fixed_duration_segments(&signal, 30).is_empty());
    }

    #[test]
    fn zero_duration_yields_nothing() {
        let signal = SignalBuffer::new(vec![0.0; 10], 10);
        assert!(fixed_duration_segments(&signal, 0).is_empty());
    }
}
