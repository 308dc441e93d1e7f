//! Core types for the storyprep feature pipeline

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decoded mono audio (f32 samples) at its native sampling rate.
///
/// Buffers are never mutated after construction; transforms such as
/// augmentation always produce a new buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SignalBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Samples, nominally in [-1.0, 1.0]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds (0.0 when the sample rate is zero)
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// True when the buffer holds less than one second of audio.
    pub fn is_shorter_than_one_second(&self) -> bool {
        self.samples.len() < self.sample_rate as usize
    }

    /// Derive a new buffer at the same sample rate.
    pub fn derive(&self, samples: Vec<f32>) -> Self {
        Self::new(samples, self.sample_rate)
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// Fixed-length feature vector for one signal buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn zeros(dimension: usize) -> Self {
        Self(vec![0.0; dimension])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn is_all_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0.0)
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl From<FeatureVector> for Vec<f32> {
    fn from(vector: FeatureVector) -> Self {
        vector.0
    }
}

/// One feature vector together with the row metadata it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub vector: FeatureVector,
    pub filepath: String,
    /// Label copied verbatim from the input row; opaque to the extractor
    pub label: Option<Value>,
}

/// One row of the source-recording metadata consumed by the segmenter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRow {
    pub filename: String,
    #[serde(rename = "Language")]
    pub language: String,
    #[serde(rename = "Story_type")]
    pub story_type: String,
}

/// Metadata describing one fixed-duration segment written by the segmenter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMetadata {
    pub original_file: String,
    /// 1-based index of the segment within `original_file`
    pub segment_id: usize,
    pub segment_path: String,
    /// Configured segment duration in seconds
    pub duration: u32,
    pub label: u8,
    #[serde(rename = "Language")]
    pub language: String,
    #[serde(rename = "Story_type")]
    pub story_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_signal_detection_uses_sample_rate() {
        let short = SignalBuffer::new(vec![0.0; 15_999], 16_000);
        let exact = SignalBuffer::new(vec![0.0; 16_000], 16_000);
        assert!(short.is_shorter_than_one_second());
        assert!(!exact.is_shorter_than_one_second());
        assert_eq!(exact.duration_secs(), 1.0);
    }

    #[test]
    fn derived_buffer_keeps_rate_and_leaves_source_untouched() {
        let source = SignalBuffer::new(vec![0.25; 4], 8_000);
        let derived = source.derive(vec![0.5; 2]);
        assert_eq!(derived.sample_rate(), 8_000);
        assert_eq!(source.samples(), &[0.25; 4]);
        assert_eq!(derived.len(), 2);
    }

    #[test]
    fn segment_metadata_uses_source_column_names() {
        let meta = SegmentMetadata {
            original_file: "story1.wav".to_string(),
            segment_id: 1,
            segment_path: "out/story1_seg1.wav".to_string(),
            duration: 30,
            label: 1,
            language: "English".to_string(),
            story_type: "true story".to_string(),
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["Language"], "English");
        assert_eq!(value["Story_type"], "true story");
        assert_eq!(value["segment_id"], 1);
    }
}
