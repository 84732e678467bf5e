//! Result reporting
//!
//! Per-unit results are collected into a [`ResultTable`] whose columns follow
//! the run configuration's biomarker order. The table renders as delimited
//! text with `name (unit)` header cells, or is encoded into a JSON report
//! carrying producer and run provenance.

use crate::error::ComputeError;
use crate::{PRODUCER_NAME, VERSION};
use chrono::Utc;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// One reported biomarker value in its reporting unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BiomarkerValue {
    pub name: String,
    pub value: f64,
    pub unit: String,
}

/// A biomarker that could not be computed for a unit
#[derive(Debug, Clone, PartialEq)]
pub struct BiomarkerFailure {
    pub biomarker: String,
    pub error: ComputeError,
}

impl Serialize for BiomarkerFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BiomarkerFailure", 3)?;
        state.serialize_field("biomarker", &self.biomarker)?;
        state.serialize_field("kind", self.error.kind())?;
        state.serialize_field("message", &self.error.to_string())?;
        state.end()
    }
}

/// All requested biomarkers for one experimental unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitResult {
    pub id: String,
    /// One entry per requested biomarker, NaN where computation failed
    pub values: Vec<BiomarkerValue>,
    pub failures: Vec<BiomarkerFailure>,
}

impl UnitResult {
    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|v| v.name == name).map(|v| v.value)
    }

    pub fn failure(&self, name: &str) -> Option<&ComputeError> {
        self.failures
            .iter()
            .find(|f| f.biomarker == name)
            .map(|f| &f.error)
    }
}

/// A table column: biomarker name and reporting unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub unit: String,
}

impl Column {
    /// Header cell text, `name (unit)`
    pub fn header(&self) -> String {
        format!("{} ({})", self.name, self.unit)
    }
}

/// Delimited-text conventions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFormat {
    pub delimiter: String,
    pub line_ending: String,
    /// Prepend an `id` column
    pub include_ids: bool,
}

impl Default for TableFormat {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            line_ending: "\n".to_string(),
            include_ids: true,
        }
    }
}

/// Results of a run across all processed units
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    columns: Vec<Column>,
    rows: Vec<UnitResult>,
}

impl ResultTable {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: UnitResult) {
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[UnitResult] {
        &self.rows
    }

    /// Number of failed cells across all units
    pub fn failure_count(&self) -> usize {
        self.rows.iter().map(|r| r.failures.len()).sum()
    }

    pub fn header_line(&self, format: &TableFormat) -> String {
        let mut cells: Vec<String> = Vec::with_capacity(self.columns.len() + 1);
        if format.include_ids {
            cells.push("id".to_string());
        }
        cells.extend(self.columns.iter().map(Column::header));
        cells.join(&format.delimiter)
    }

    fn row_line(&self, row: &UnitResult, format: &TableFormat) -> String {
        let mut cells: Vec<String> = Vec::with_capacity(self.columns.len() + 1);
        if format.include_ids {
            cells.push(row.id.clone());
        }
        for column in &self.columns {
            let value = row.value(&column.name).unwrap_or(f64::NAN);
            cells.push(format_value(value));
        }
        cells.join(&format.delimiter)
    }

    /// Render header and one row per unit
    pub fn to_delimited(&self, format: &TableFormat) -> String {
        let mut out = self.header_line(format);
        out.push_str(&format.line_ending);
        for row in &self.rows {
            out.push_str(&self.row_line(row, format));
            out.push_str(&format.line_ending);
        }
        out
    }
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        value.to_string()
    }
}

/// Report producer metadata
#[derive(Debug, Clone, Serialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub run_id: String,
}

/// One unit's entry in the JSON report
#[derive(Debug, Clone, Serialize)]
pub struct ReportUnit {
    pub id: String,
    /// Values keyed by biomarker name in column order; `null` where
    /// computation failed
    #[serde(serialize_with = "ordered_values")]
    pub values: Vec<(String, Option<f64>)>,
    pub failures: Vec<BiomarkerFailure>,
}

/// Writes name/value pairs as a JSON object without reordering the keys
fn ordered_values<S: Serializer>(values: &[(String, Option<f64>)], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(values.len()))?;
    for (name, value) in values {
        map.serialize_entry(name, value)?;
    }
    map.end()
}

/// JSON document describing a whole run
#[derive(Debug, Clone, Serialize)]
pub struct BiomarkerReport {
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    pub columns: Vec<Column>,
    pub units: Vec<ReportUnit>,
}

/// Encodes result tables as JSON reports
pub struct ReportEncoder {
    run_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create an encoder with a fresh run ID
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific run ID
    pub fn with_run_id(run_id: String) -> Self {
        Self { run_id }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn encode(&self, table: &ResultTable) -> BiomarkerReport {
        let units = table
            .rows()
            .iter()
            .map(|row| ReportUnit {
                id: row.id.clone(),
                values: row
                    .values
                    .iter()
                    .map(|v| (v.name.clone(), Some(v.value).filter(|x| x.is_finite())))
                    .collect(),
                failures: row.failures.clone(),
            })
            .collect();

        BiomarkerReport {
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                run_id: self.run_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            columns: table.columns().to_vec(),
            units,
        }
    }

    pub fn encode_to_json(&self, table: &ResultTable) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.encode(table))
    }
}
