use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app::ingest_use_case::IngestSettings;
use crate::constants::{
    DEFAULT_BUCKET, DEFAULT_ERRORS_PREFIX, DEFAULT_PROCESSED_PREFIX, DEFAULT_STORE_ROOT,
    ENV_DESTINATION_BUCKET, ENV_LOG_DIR, ENV_SOURCE_BUCKET, ENV_STORE_ROOT,
};
use crate::error::ConfigError;
use crate::pipeline::output::OutputLayout;
use crate::schema::{Schema, SchemaDefinition};

/// Filesystem-backed object store settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub root: PathBuf,
    pub source_bucket: String,
    pub destination_bucket: String,
    pub processed_prefix: String,
    pub errors_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_STORE_ROOT),
            source_bucket: DEFAULT_BUCKET.to_string(),
            destination_bucket: DEFAULT_BUCKET.to_string(),
            processed_prefix: DEFAULT_PROCESSED_PREFIX.to_string(),
            errors_prefix: DEFAULT_ERRORS_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// When set, a daily-rolling JSON log file is written here.
    pub dir: Option<PathBuf>,
    /// Render console output as JSON instead of the human format.
    pub json: bool,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    store: StoreConfig,
    #[serde(default)]
    logging: LoggingConfig,
    schema: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub schema_definition: SchemaDefinition,
    pub schema: Arc<Schema>,
}

impl Config {
    /// Read and validate a TOML config file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Parse without consulting the environment.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;
        let schema_definition = SchemaDefinition::from_json_value(&raw.schema)?;
        let schema = Schema::compile(&schema_definition)?;
        let config = Self {
            store: raw.store,
            logging: raw.logging,
            schema_definition,
            schema: Arc::new(schema),
        };
        config.check()?;
        Ok(config)
    }

    /// Override store and logging settings from `lookup` (normally the process
    /// environment). Set-but-empty variables are rejected.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |var: &str| -> Result<Option<String>, ConfigError> {
            match lookup(var) {
                Some(value) if value.trim().is_empty() => Err(ConfigError::Env {
                    var: var.to_string(),
                    message: "is set but empty".to_string(),
                }),
                other => Ok(other.map(|v| v.trim().to_string())),
            }
        };

        if let Some(root) = non_empty(ENV_STORE_ROOT)? {
            self.store.root = PathBuf::from(root);
        }
        if let Some(bucket) = non_empty(ENV_SOURCE_BUCKET)? {
            self.store.source_bucket = bucket;
        }
        if let Some(bucket) = non_empty(ENV_DESTINATION_BUCKET)? {
            self.store.destination_bucket = bucket;
        }
        if let Some(dir) = non_empty(ENV_LOG_DIR)? {
            self.logging.dir = Some(PathBuf::from(dir));
        }
        self.check()
    }

    pub fn ingest_settings(&self) -> IngestSettings {
        IngestSettings {
            source_bucket: self.store.source_bucket.clone(),
            destination_bucket: self.store.destination_bucket.clone(),
            layout: OutputLayout {
                processed_prefix: self.store.processed_prefix.clone(),
                errors_prefix: self.store.errors_prefix.clone(),
            },
        }
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.store.source_bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("store.source_bucket is empty".into()));
        }
        if self.store.destination_bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("store.destination_bucket is empty".into()));
        }
        // Equal prefixes would make the errors artifact overwrite the dedup marker
        if self.store.processed_prefix.trim_matches('/') == self.store.errors_prefix.trim_matches('/') {
            return Err(ConfigError::Invalid(
                "store.processed_prefix and store.errors_prefix must differ".into(),
            ));
        }
        Ok(())
    }
}
