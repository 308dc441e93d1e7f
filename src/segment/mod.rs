//! Fixed-duration segmentation of labelled source recordings.
//!
//! Each source file listed in the metadata table is cut into whole
//! `segment_duration`-second WAV segments; the remainder is dropped.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::audio::slicer::fixed_duration_segments;
use crate::audio::{write_wav, SignalLoader, SymphoniaLoader};
use crate::config::SegmentConfig;
use crate::types::{MetadataRow, SegmentMetadata};

/// Trimmed, lower-cased story type.
pub fn normalize_story_type(story_type: &str) -> String {
    story_type.trim().to_lowercase()
}

/// 1 when the normalised story type mentions "true", otherwise 0.
pub fn label_for_story_type(story_type: &str) -> u8 {
    u8::from(normalize_story_type(story_type).contains("true"))
}

/// Read the metadata table from a JSON array of records.
pub fn load_metadata(path: &Path) -> Result<Vec<MetadataRow>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read metadata table {}", path.display()))?;
    serde_json::from_str(&raw).context("Failed to parse metadata table JSON")
}

#[derive(Debug, Clone)]
pub struct Segmenter<L = SymphoniaLoader> {
    loader: L,
    config: SegmentConfig,
}

impl Segmenter<SymphoniaLoader> {
    pub fn new(config: SegmentConfig) -> Self {
        Self::with_loader(SymphoniaLoader, config)
    }
}

impl<L: SignalLoader> Segmenter<L> {
    pub fn with_loader(loader: L, config: SegmentConfig) -> Self {
        Self { loader, config }
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    /// Segment every listed file. Missing or unreadable sources are logged and
    /// skipped; only configuration and output-directory problems are errors.
    pub fn run(&self, rows: &[MetadataRow]) -> Result<Vec<SegmentMetadata>> {
        self.config.validate()?;
        fs::create_dir_all(&self.config.output_dir).with_context(|| {
            format!(
                "Failed to create output directory {:?}",
                self.config.output_dir
            )
        })?;

        let mut segments = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            let source = self.config.input_dir.join(&row.filename);
            if !source.exists() {
                warn!(file = %row.filename, "skipping missing source file");
                continue;
            }

            let before = segments.len();
            match self.segment_file(row, &source, &mut segments) {
                Ok(()) => info!(
                    file = %row.filename,
                    segments = segments.len() - before,
                    progress = %format!("{}/{}", index + 1, rows.len()),
                    "segmented source file"
                ),
                Err(err) => warn!(
                    file = %row.filename,
                    error = %format!("{err:#}"),
                    "failed to segment source file"
                ),
            }
        }

        info!(
            files = rows.len(),
            segments = segments.len(),
            "segmentation finished"
        );
        Ok(segments)
    }

    /// Segments written before a failure keep their metadata rows.
    fn segment_file(
        &self,
        row: &MetadataRow,
        source: &Path,
        out: &mut Vec<SegmentMetadata>,
    ) -> Result<()> {
        let signal = self.loader.load(source)?;
        let story_type = normalize_story_type(&row.story_type);
        let label = label_for_story_type(&story_type);
        let stem = Path::new(&row.filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| row.filename.clone());

        for (idx, segment) in fixed_duration_segments(&signal, self.config.segment_duration)
            .iter()
            .enumerate()
        {
            let segment_id = idx + 1;
            let path = self
                .config
                .output_dir
                .join(format!("{stem}_seg{segment_id}.wav"));
            write_wav(segment, &path)?;
            out.push(SegmentMetadata {
                original_file: row.filename.clone(),
                segment_id,
                segment_path: path.to_string_lossy().replace('\\', "/"),
                duration: self.config.segment_duration,
                label,
                language: row.language.clone(),
                story_type: story_type.clone(),
            });
        }
        Ok(())
    }
}
