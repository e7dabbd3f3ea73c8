//! Data shapes shared across the pipeline stages.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw bytes of an uploaded object, as fetched from the store.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub bucket: String,
    pub key: String,
    pub bytes: Vec<u8>,
}

impl RawFile {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Lowercase hex SHA-256 of a file's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    pub const LEN: usize = 64;

    /// Wrap an existing hex digest. Returns `None` unless it is 64 lowercase hex chars.
    pub fn parse(hex: &str) -> Option<Self> {
        let ok = hex.len() == Self::LEN
            && hex
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        ok.then(|| Self(hex.to_string()))
    }

    pub(crate) fn from_hex_unchecked(hex: String) -> Self {
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One data record as read from the file: header name → raw field, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Zero-based position among data rows (header excluded).
    pub index: usize,
    pub fields: Vec<(String, String)>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }
}

/// A typed cell after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    /// The raw text could not be coerced to the declared column type.
    Unparsed(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view used by range rules.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text written to an output CSV cell.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) | Value::Unparsed(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// A row in canonical shape: one value per schema column, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub index: usize,
    pub values: Vec<(String, Value)>,
}

impl NormalizedRow {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }
}

/// Terminal state of a row after validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Valid,
    Invalid { reasons: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub row: NormalizedRow,
    pub verdict: Verdict,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self.verdict, Verdict::Valid)
    }

    pub fn reasons(&self) -> &[String] {
        match &self.verdict {
            Verdict::Valid => &[],
            Verdict::Invalid { reasons } => reasons,
        }
    }
}

/// Outcome of one ingestion run, returned to the caller and logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub run_id: String,
    pub source_key: String,
    pub digest: ContentDigest,
    pub total_rows: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub skipped: bool,
    pub output_paths: Vec<String>,
    pub elapsed_ms: u64,
}
