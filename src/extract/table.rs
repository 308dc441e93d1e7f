use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::types::ExtractionResult;

/// Why one input row contributed nothing to a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowDiagnostic {
    /// 0-based position in the input table
    pub row_index: usize,
    pub filepath: Option<String>,
    pub message: String,
}

/// Tabular batch output: feature columns `f1..fD`, then `label` and `filepath`.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTable {
    dimension: usize,
    rows: Vec<ExtractionResult>,
    diagnostics: Vec<RowDiagnostic>,
}

impl BatchTable {
    pub(crate) fn new(
        dimension: usize,
        rows: Vec<ExtractionResult>,
        diagnostics: Vec<RowDiagnostic>,
    ) -> Self {
        Self {
            dimension,
            rows,
            diagnostics,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[ExtractionResult] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ExtractionResult> {
        self.rows
    }

    pub fn diagnostics(&self) -> &[RowDiagnostic] {
        &self.diagnostics
    }

    pub fn feature_columns(&self) -> Vec<String> {
        (1..=self.dimension).map(|i| format!("f{i}")).collect()
    }

    pub fn column_names(&self) -> Vec<String> {
        let mut columns = self.feature_columns();
        columns.push("label".to_string());
        columns.push("filepath".to_string());
        columns
    }

    /// One JSON object per row, keyed by column name.
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        let columns = self.feature_columns();
        self.rows
            .iter()
            .map(|row| {
                let mut record = Map::with_capacity(self.dimension + 2);
                for (name, value) in columns.iter().zip(row.vector.as_slice()) {
                    let number = Number::from_f64(*value as f64).map_or(Value::Null, Value::Number);
                    record.insert(name.clone(), number);
                }
                record.insert("label".to_string(), row.label.clone().unwrap_or(Value::Null));
                record.insert("filepath".to_string(), Value::String(row.filepath.clone()));
                record
            })
            .collect()
    }

    /// Write the records as a JSON array.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.to_records())
            .with_context(|| format!("Failed to write feature table to {}", path.display()))
    }
}
