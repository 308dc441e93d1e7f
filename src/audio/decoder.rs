use crate::types::SignalBuffer;
use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Source of decoded signal buffers.
///
/// Extractors and the segmenter are generic over this so the codec can be
/// swapped out (or faked in tests).
pub trait SignalLoader {
    fn load(&self, path: &Path) -> Result<SignalBuffer>;
}

/// Default loader backed by symphonia. Mixes down to mono and keeps the
/// file's native sample rate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaLoader;

impl SignalLoader for SymphoniaLoader {
    fn load(&self, path: &Path) -> Result<SignalBuffer> {
        decode_audio(path)
    }
}

/// Decode an audio file to a mono signal buffer at its native sample rate
pub fn decode_audio<P: AsRef<Path>>(path: P) -> Result<SignalBuffer> {
    let path = path.as_ref();

    // Open the file
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Extension is only a hint; the probe reads the header
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    // Probe the container
    let probe_result = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("Failed to probe audio format of {}", path.display()))?;
    let mut format = probe_result.format;

    // First track with a real codec
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio tracks found in file")?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .context("Sample rate not specified in audio file")?;

    // Decoder for that track
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create decoder")?;

    // Mono samples for the whole file
    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                // End of stream
                break;
            }
            Err(err) => return Err(err).context("Failed to read packet"),
        };

        // Skip packets of other tracks (cover art, secondary streams)
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .context("Failed to decode audio packet")?;
        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);

        // Any sample format -> interleaved f32 in [-1.0, 1.0]
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        downmix_interleaved(buffer.samples(), channels, &mut samples);
    }

    Ok(SignalBuffer::new(samples, sample_rate))
}

/// Average interleaved frames into mono samples, appending to `out`.
fn downmix_interleaved(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels == 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}
