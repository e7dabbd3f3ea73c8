use std::fmt;
use thiserror::Error;

/// Failures reported by an object store adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store rejected request: {message}")]
    Rejected { message: String },
}

impl From<csv::Error> for StoreError {
    fn from(err: csv::Error) -> Self {
        StoreError::Io(err.into())
    }
}

/// Structural problems with an uploaded CSV file.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("file has no header row")]
    MissingHeader,

    #[error("header column {position} has an empty name")]
    EmptyColumnName { position: usize },

    #[error("headers '{first}' and '{second}' both normalize to column '{canonical}'")]
    DuplicateColumn {
        first: String,
        second: String,
        canonical: String,
    },

    #[error("line {line}: expected {expected} fields, found {found}")]
    InconsistentColumns {
        line: u64,
        expected: u64,
        found: u64,
    },

    #[error("line {line}: content is not valid UTF-8")]
    Encoding { line: u64 },

    #[error("CSV read failed: {0}")]
    Csv(String),
}

impl From<csv::Error> for ParseError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        match err.kind() {
            csv::ErrorKind::UnequalLengths {
                expected_len, len, ..
            } => ParseError::InconsistentColumns {
                line,
                expected: *expected_len,
                found: *len,
            },
            csv::ErrorKind::Utf8 { .. } => ParseError::Encoding { line },
            _ => ParseError::Csv(err.to_string()),
        }
    }
}

/// The schema definition itself is malformed.
#[derive(Error, Debug)]
pub enum SchemaConfigError {
    #[error("schema declares no columns")]
    NoColumns,

    #[error("column {position} has an empty name")]
    EmptyColumnName { position: usize },

    #[error("column '{0}' is declared more than once")]
    DuplicateColumn(String),

    #[error("column name '{0}' is reserved for the errors output")]
    ReservedColumn(String),

    #[error("column '{column}': invalid pattern: {message}")]
    InvalidPattern { column: String, message: String },

    #[error("column '{column}': rule '{rule}' does not apply to type '{column_type}'")]
    RuleNotApplicable {
        column: String,
        rule: String,
        column_type: String,
    },

    #[error("column '{column}': rule '{rule}' has min greater than max")]
    InvertedBounds { column: String, rule: String },

    #[error("schema document is invalid: {0}")]
    Shape(String),
}

/// Errors that abort an ingestion run.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("cannot read {bucket}/{key}: {source}")]
    Fetch {
        bucket: String,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("malformed CSV: {0}")]
    Parse(#[from] ParseError),

    #[error("schema configuration error: {0}")]
    SchemaConfig(#[from] SchemaConfigError),

    #[error("write of {key} failed: {source}")]
    Write {
        key: String,
        #[source]
        source: StoreError,
    },
}

/// Pipeline stages that can fail, in execution order. Hashing, normalization
/// and validation are infallible and have no variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    DedupCheck,
    Parse,
    Serialize,
    WriteInvalid,
    WriteValid,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::DedupCheck => "dedup_check",
            Stage::Parse => "parse",
            Stage::Serialize => "serialize",
            Stage::WriteInvalid => "write_invalid",
            Stage::WriteValid => "write_valid",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A failed run: which stage stopped it and why.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: IngestError,
}

impl StageError {
    pub fn new(stage: Stage, source: impl Into<IngestError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// Errors from loading runtime configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("environment variable {var}: {message}")]
    Env { var: String, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Schema(#[from] SchemaConfigError),
}

pub type Result<T> = std::result::Result<T, IngestError>;
