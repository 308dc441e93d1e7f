//! storyprep - segment labelled story recordings and turn the segments into
//! fixed-length feature vectors (spectral descriptors plus voice quality)
//! for a downstream classifier.

pub mod audio;
pub mod augment;
pub mod config;
pub mod extract;
pub mod features;
pub mod segment;
pub mod types;

pub use config::{ExtractionConfig, SegmentConfig};
pub use extract::{
    extract_features, extract_features_batch, BatchExtractor, BatchTable, EmptyBatchError,
    FeatureExtractor, InputTable,
};
pub use features::{dimension_for, FeatureAssembler, FeatureLayout};
pub use segment::Segmenter;
pub use types::{ExtractionResult, FeatureVector, SegmentMetadata, SignalBuffer};
