//! Clinical table input and harmonization into typed survival records.
//!
//! The raw table is never modified: [`harmonize`] validates the schema once,
//! coerces time and status cell by cell, and returns fresh
//! [`ClinicalRecord`]s for every row that survived.

use std::io;

use tracing::info;

use crate::error::{SurvivalError, Result};

/// sample identifier column shared with the mutation data
pub const SAMPLE_COLUMN: &str = "Tumor_Sample_Barcode";
pub const DEFAULT_TIME_COLUMN: &str = "Time";
pub const DEFAULT_STATUS_COLUMN: &str = "Status";

/// one cell of a clinical table
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    /// numeric time; anything unparseable or infinite is missing
    pub fn as_time(&self) -> Option<f64> {
        let time = match self {
            Value::Number(x) => *x,
            Value::Text(s) => s.trim().parse::<f64>().ok()?,
            Value::Bool(_) | Value::Missing => return None,
        };
        time.is_finite().then_some(time)
    }

    /// integer status; booleans map to 1/0, numbers are truncated
    pub fn as_status(&self) -> Option<i32> {
        match self {
            Value::Number(x) => truncate(*x),
            Value::Bool(b) => Some(i32::from(*b)),
            Value::Text(s) => {
                let s = s.trim();
                if s.eq_ignore_ascii_case("true") {
                    Some(1)
                } else if s.eq_ignore_ascii_case("false") {
                    Some(0)
                } else if let Ok(i) = s.parse::<i32>() {
                    Some(i)
                } else {
                    truncate(s.parse::<f64>().ok()?)
                }
            }
            Value::Missing => None,
        }
    }

    pub fn as_sample_id(&self) -> Option<String> {
        match self {
            Value::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(x) => Some(x.to_string()),
            _ => None,
        }
    }

    /// cell text from a delimited file; blanks and NA are missing
    fn parse_cell(raw: &str) -> Self {
        match raw.trim() {
            "" | "NA" | "N/A" | "NaN" | "null" => Value::Missing,
            s => Value::Text(s.to_string()),
        }
    }
}

fn truncate(x: f64) -> Option<i32> {
    (x.is_finite() && x.abs() < i32::MAX as f64).then(|| x.trunc() as i32)
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(x)
    }
}

impl From<i32> for Value {
    fn from(x: i32) -> Self {
        Value::Number(f64::from(x))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Missing, Into::into)
    }
}

/// raw clinical table: named columns, one row per sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClinicalTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ClinicalTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(SurvivalError::invalid_dimensions(format!(
                "row has {} cells, table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// builder-style push for tests and literals
    pub fn with_row(mut self, row: Vec<Value>) -> Result<Self> {
        self.push_row(row)?;
        Ok(self)
    }

    /// read a delimited table with a header line
    pub fn from_reader<R: io::Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(false)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let mut table = Self::new(columns);
        for record in csv_reader.records() {
            let record = record?;
            table.push_row(record.iter().map(Value::parse_cell).collect())?;
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| SurvivalError::missing_column(name, &self.columns))
    }
}

/// a sample with usable follow-up
#[derive(Debug, Clone, PartialEq)]
pub struct ClinicalRecord {
    pub sample_id: String,
    pub time: f64,
    pub status: i32,
}

/// records that survived harmonization plus how many rows didn't
#[derive(Debug, Clone, PartialEq)]
pub struct Harmonized {
    pub records: Vec<ClinicalRecord>,
    pub n_input: usize,
    pub n_dropped: usize,
}

/// validate the schema, coerce time/status and drop unusable rows
pub fn harmonize(table: &ClinicalTable, time_column: &str, status_column: &str) -> Result<Harmonized> {
    let sample_idx = table.require(SAMPLE_COLUMN)?;
    let time_idx = table.require(time_column)?;
    let status_idx = table.require(status_column)?;

    let records: Vec<ClinicalRecord> = table
        .rows
        .iter()
        .filter_map(|row| {
            Some(ClinicalRecord {
                sample_id: row[sample_idx].as_sample_id()?,
                time: row[time_idx].as_time()?,
                status: row[status_idx].as_status()?,
            })
        })
        .collect();

    let n_input = table.n_rows();
    let n_dropped = n_input - records.len();
    if n_dropped > 0 {
        info!(
            "removed {} samples with NA's in {} or {}",
            n_dropped, time_column, status_column
        );
    }

    Ok(Harmonized { records, n_input, n_dropped })
}

/// how integer status codes map onto events, as survival's Surv() reads them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCoding {
    /// 0 = censored, 1 = event
    ZeroOne,
    /// 1 = censored, 2 = event
    OneTwo,
}

impl EventCoding {
    pub fn detect(records: &[ClinicalRecord]) -> Result<Self> {
        let statuses = || records.iter().map(|r| r.status);

        if statuses().all(|s| s == 0 || s == 1) {
            Ok(EventCoding::ZeroOne)
        } else if statuses().all(|s| s == 1 || s == 2) {
            Ok(EventCoding::OneTwo)
        } else {
            let mut found: Vec<i32> = statuses().collect();
            found.sort_unstable();
            found.dedup();
            Err(SurvivalError::StatusCoding { found })
        }
    }

    pub fn is_event(self, status: i32) -> bool {
        match self {
            EventCoding::ZeroOne => status == 1,
            EventCoding::OneTwo => status == 2,
        }
    }
}
