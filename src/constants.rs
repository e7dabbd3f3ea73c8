//! Defaults and names shared between the CLI, configuration and pipeline.

pub const DEFAULT_CONFIG_PATH: &str = "ingest.toml";
pub const DEFAULT_STORE_ROOT: &str = "data";
pub const DEFAULT_BUCKET: &str = "uploads";

// Output layout in the destination bucket
pub const DEFAULT_PROCESSED_PREFIX: &str = "processed";
pub const DEFAULT_ERRORS_PREFIX: &str = "errors";
pub const OUTPUT_EXTENSION: &str = "csv";

// Invalid partition
pub const REASONS_COLUMN: &str = "reasons";
pub const REASON_SEPARATOR: &str = ";";

/// Cell values read as null (compared case-insensitively after trimming).
pub const DEFAULT_NULL_TOKENS: &[&str] = &["", "null", "na", "n/a", "nan", "none"];

// Environment overrides
pub const ENV_CONFIG_PATH: &str = "INGEST_CONFIG";
pub const ENV_STORE_ROOT: &str = "INGEST_STORE_ROOT";
pub const ENV_SOURCE_BUCKET: &str = "INGEST_SOURCE_BUCKET";
pub const ENV_DESTINATION_BUCKET: &str = "INGEST_DESTINATION_BUCKET";
pub const ENV_LOG_DIR: &str = "INGEST_LOG_DIR";
