use crate::types::SignalBuffer;
use anyhow::{Context, Result};
use std::path::Path;

/// Write a signal buffer as a mono 16-bit PCM WAV file
pub fn write_wav<P: AsRef<Path>>(signal: &SignalBuffer, path: P) -> Result<()> {
    let path = path.as_ref();

    // Segments are always mono 16-bit PCM at the source rate
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: signal.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    // Create the WAV writer
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;

    for &sample in signal.samples() {
        // Clamp to [-1.0, 1.0] and scale to i16 range
        let clamped = sample.clamp(-1.0, 1.0);
        writer
            .write_sample((clamped * 32767.0) as i16)
            .context("Failed to write audio sample")?;
    }

    // Header sizes are only patched in on finalize
    writer.finalize().context("Failed to finalize WAV file")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let signal = SignalBuffer::new(vec![2.0, -2.0, 0.0], 8_000);
        write_wav(&signal, &path).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8_000);
        let written: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(written, vec![32767, -32767, 0]);
    }
}
