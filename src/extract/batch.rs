use std::any::Any;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use anyhow::{anyhow, ensure, Context, Result};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::table::{BatchTable, RowDiagnostic};
use super::FeatureExtractor;
use crate::audio::{SignalLoader, SymphoniaLoader};
use crate::config::ExtractionConfig;
use crate::types::{ExtractionResult, FeatureVector, SegmentMetadata};

const LABEL_COLUMN: &str = "label";

/// Returned (inside `anyhow::Error`) when a batch produces no feature rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyBatchError {
    pub input_rows: usize,
    pub skipped_rows: usize,
    /// One entry per skipped row, in input order
    pub diagnostics: Vec<RowDiagnostic>,
}

impl Display for EmptyBatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "No features extracted from {} input rows ({} skipped); check your input paths or files",
            self.input_rows, self.skipped_rows
        )
    }
}

impl Error for EmptyBatchError {}

/// Rows of arbitrary columns; only the path column and `label` are read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputTable {
    rows: Vec<Map<String, Value>>,
}

impl InputTable {
    pub fn from_records(rows: Vec<Map<String, Value>>) -> Self {
        Self { rows }
    }

    /// Parse a JSON array of objects.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let rows: Vec<Map<String, Value>> =
            serde_json::from_str(raw).context("Failed to parse input table JSON")?;
        Ok(Self { rows })
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read input table {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    /// Build the table straight from segmenter output.
    pub fn from_segments(segments: &[SegmentMetadata]) -> Result<Self> {
        let rows = segments
            .iter()
            .map(|segment| match serde_json::to_value(segment)? {
                Value::Object(map) => Ok(map),
                other => Err(anyhow!("segment metadata serialised to {other}")),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Map<String, Value>] {
        &self.rows
    }
}

/// Runs the single-file extractor over every row of an input table, skipping
/// rows that fail instead of aborting the batch.
#[derive(Debug)]
pub struct BatchExtractor<L = SymphoniaLoader> {
    extractor: FeatureExtractor<L>,
    path_column: String,
    dimension: usize,
}

impl BatchExtractor<SymphoniaLoader> {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        Self::with_loader(SymphoniaLoader, config)
    }
}

impl<L: SignalLoader> BatchExtractor<L> {
    pub fn with_loader(loader: L, config: &ExtractionConfig) -> Result<Self> {
        Ok(Self::from_extractor(
            FeatureExtractor::with_loader(loader, config)?,
            &config.path_column,
        ))
    }

    pub fn from_extractor(extractor: FeatureExtractor<L>, path_column: &str) -> Self {
        Self {
            dimension: extractor.dimension(),
            extractor,
            path_column: path_column.to_string(),
        }
    }

    /// Require every vector to hold `dimension` values instead of the
    /// extractor's own, e.g. when appending to an existing feature table.
    pub fn with_expected_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn extractor_mut(&mut self) -> &mut FeatureExtractor<L> {
        &mut self.extractor
    }

    /// Every output vector is checked against the expected dimension; a
    /// row with any mismatching vector is skipped whole.
    pub fn run(&mut self, table: &InputTable) -> Result<BatchTable> {
        let dimension = self.dimension;
        let mut rows = Vec::new();
        let mut diagnostics = Vec::new();

        info!(
            rows = table.len(),
            path_column = %self.path_column,
            augment = self.extractor.augments(),
            "starting batch feature extraction"
        );

        for (row_index, record) in table.rows().iter().enumerate() {
            // Rows without a usable path fail on their own
            let Some(filepath) = record.get(&self.path_column).and_then(Value::as_str) else {
                skip_row(
                    &mut diagnostics,
                    row_index,
                    None,
                    format!("row has no '{}' path value", self.path_column),
                );
                continue;
            };

            // Base vector first, then any augmented variants
            match self.extract_row(Path::new(filepath), dimension) {
                Ok(vectors) => {
                    let label = label_of(record);
                    rows.extend(vectors.into_iter().map(|vector| ExtractionResult {
                        vector,
                        filepath: filepath.to_string(),
                        label: label.clone(),
                    }));
                }
                Err(err) => skip_row(
                    &mut diagnostics,
                    row_index,
                    Some(filepath.to_string()),
                    format!("{err:#}"),
                ),
            }
        }

        // Nothing to hand downstream
        if rows.is_empty() {
            return Err(EmptyBatchError {
                input_rows: table.len(),
                skipped_rows: diagnostics.len(),
                diagnostics,
            }
            .into());
        }

        info!(
            output_rows = rows.len(),
            skipped_rows = diagnostics.len(),
            dimension,
            "batch feature extraction finished"
        );
        Ok(BatchTable::new(dimension, rows, diagnostics))
    }

    fn extract_row(&mut self, path: &Path, dimension: usize) -> Result<Vec<FeatureVector>> {
        let extractor = &mut self.extractor;
        // A panic anywhere in analysis costs this row only
        let vectors = panic::catch_unwind(AssertUnwindSafe(|| extractor.extract_file(path)))
            .map_err(|payload| anyhow!("feature extraction panicked: {}", panic_message(&*payload)))??;

        // Partial output is discarded along with the row
        for (idx, vector) in vectors.iter().enumerate() {
            ensure!(
                vector.len() == dimension,
                "vector {} has {} values, expected {}",
                idx,
                vector.len(),
                dimension
            );
        }
        Ok(vectors)
    }
}

fn skip_row(
    diagnostics: &mut Vec<RowDiagnostic>,
    row_index: usize,
    filepath: Option<String>,
    message: String,
) {
    warn!(
        row = row_index,
        filepath = filepath.as_deref().unwrap_or("<missing>"),
        error = %message,
        "skipping row"
    );
    diagnostics.push(RowDiagnostic {
        row_index,
        filepath,
        message,
    });
}

fn label_of(record: &Map<String, Value>) -> Option<Value> {
    record
        .get(LABEL_COLUMN)
        .filter(|value| !value.is_null())
        .cloned()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Extract a feature table for every row of `table` using default loading.
pub fn extract_features_batch(table: &InputTable, config: &ExtractionConfig) -> Result<BatchTable> {
    BatchExtractor::new(config)?.run(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::dimension_for;
    use crate::types::SignalBuffer;
    use serde_json::json;

    /// Serves a 1.1 s tone for file names starting with "ok"; anything else fails to load.
    struct PatternLoader;

    impl SignalLoader for PatternLoader {
        fn load(&self, path: &Path) -> Result<SignalBuffer> {
            let readable = path
                .file_name()
                .map_or(false, |name| name.to_string_lossy().starts_with("ok"));
            ensure!(readable, "unreadable file {}", path.display());
            let samples = (0..17_600)
                .map(|i| (i as f32 * 0.06).sin() * 0.3)
                .collect();
            Ok(SignalBuffer::new(samples, 16_000))
        }
    }

    fn records(values: Value) -> InputTable {
        let rows = match values {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        InputTable::from_records(rows)
    }

    fn batch(augment: bool) -> BatchExtractor<PatternLoader> {
        let config = ExtractionConfig {
            augment,
            noise_seed: Some(1),
            ..ExtractionConfig::default()
        };
        BatchExtractor::with_loader(PatternLoader, &config).unwrap()
    }

    #[test]
    fn failed_rows_are_skipped_with_diagnostics() {
        let table = records(json!([
            {"segment_path": "ok_1.wav", "label": 1},
            {"segment_path": "broken.wav", "label": 0},
            {"segment_path": "ok_2.wav", "label": "x", "Language": "English"},
            {"label": 1}
        ]));
        let result = batch(false).run(&table).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.rows()[0].filepath, "ok_1.wav");
        assert_eq!(result.rows()[0].label, Some(json!(1)));
        assert_eq!(result.rows()[1].label, Some(json!("x")));
        assert_eq!(result.diagnostics().len(), 2);
        assert_eq!(result.diagnostics()[0].row_index, 1);
        assert_eq!(result.diagnostics()[1].filepath, None);
        assert_eq!(result.dimension(), 62);
    }

    #[test]
    fn augmented_rows_inherit_parent_metadata() {
        let table = records(json!([
            {"segment_path": "ok_a.wav", "label": 1},
            {"segment_path": "ok_b.wav"}
        ]));
        let result = batch(true).run(&table).unwrap();

        let a_rows: Vec<_> = result.rows().iter().filter(|r| r.filepath == "ok_a.wav").collect();
        assert!((2..=4).contains(&a_rows.len()));
        assert!(a_rows.iter().all(|r| r.label == Some(json!(1))));
        assert!(result
            .rows()
            .iter()
            .filter(|r| r.filepath == "ok_b.wav")
            .all(|r| r.label.is_none()));
        // rows of one file are contiguous and come first for the first file
        assert!(result.rows()[..a_rows.len()]
            .iter()
            .all(|r| r.filepath == "ok_a.wav"));
    }

    #[test]
    fn empty_table_is_a_hard_error() {
        let err = batch(false).run(&InputTable::default()).unwrap_err();
        let empty = err.downcast_ref::<EmptyBatchError>().unwrap();
        assert_eq!(empty.input_rows, 0);
    }

    #[test]
    fn all_rows_failing_is_a_hard_error() {
        let table = records(json!([
            {"segment_path": "missing_1.wav"},
            {"segment_path": "missing_2.wav"}
        ]));
        let err = batch(false).run(&table).unwrap_err();
        let empty = err.downcast_ref::<EmptyBatchError>().unwrap();
        assert_eq!(empty.input_rows, 2);
        assert_eq!(empty.skipped_rows, 2);
        let skipped: Vec<_> = empty.diagnostics.iter().map(|d| d.row_index).collect();
        assert_eq!(skipped, vec![0, 1]);
        assert_eq!(empty.diagnostics[1].filepath.as_deref(), Some("missing_2.wav"));
    }

    #[test]
    fn vectors_of_unexpected_length_skip_their_row() {
        let mut extractor = batch(false).with_expected_dimension(dimension_for(20));
        let table = records(json!([{"segment_path": "ok_1.wav", "label": 1}]));

        let err = extractor.run(&table).unwrap_err();
        let empty = err.downcast_ref::<EmptyBatchError>().unwrap();
        assert_eq!(empty.skipped_rows, 1);
        assert_eq!(empty.diagnostics[0].row_index, 0);
        assert!(
            empty.diagnostics[0].message.contains("has 62 values, expected 83"),
            "{}",
            empty.diagnostics[0].message
        );
    }

    #[test]
    fn matching_expected_dimension_keeps_rows() {
        let mut extractor = batch(false).with_expected_dimension(62);
        let table = records(json!([{"segment_path": "ok_1.wav"}]));
        let result = extractor.run(&table).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.column_names().len(), 64);
    }

    #[test]
    fn custom_path_column_is_honoured() {
        let config = ExtractionConfig {
            path_column: "wav".to_string(),
            ..ExtractionConfig::default()
        };
        let mut extractor = BatchExtractor::with_loader(PatternLoader, &config).unwrap();
        let table = records(json!([{"wav": "ok.wav"}, {"segment_path": "ok.wav"}]));
        let result = extractor.run(&table).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.diagnostics().len(), 1);
    }

    #[test]
    fn segments_convert_to_input_rows() {
        let segments = vec![SegmentMetadata {
            original_file: "story.wav".to_string(),
            segment_id: 1,
            segment_path: "out/story_seg1.wav".to_string(),
            duration: 30,
            label: 1,
            language: "English".to_string(),
            story_type: "true story".to_string(),
        }];
        let table = InputTable::from_segments(&segments).unwrap();
        assert_eq!(table.rows()[0]["segment_path"], json!("out/story_seg1.wav"));
        assert_eq!(table.rows()[0]["label"], json!(1));
    }
}
