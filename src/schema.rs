//! Schema definition: the columns an upload is expected to carry, their
//! types, and the per-row rules applied by the validator.

use chrono::NaiveDate;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::constants::{DEFAULT_NULL_TOKENS, REASONS_COLUMN};
use crate::error::SchemaConfigError;
use crate::pipeline::processing::normalize::canonical_column_name;

const SCHEMA_DOCUMENT: &str = include_str!("../schemas/ingest_schema.v1.json");

static SCHEMA_SHAPE: Lazy<Result<JSONSchema, String>> = Lazy::new(|| {
    let doc: serde_json::Value = serde_json::from_str(SCHEMA_DOCUMENT).map_err(|e| e.to_string())?;
    JSONSchema::compile(&doc).map_err(|e| e.to_string())
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Integer,
    Number,
    Boolean,
    Date,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Number => "number",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A row rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// Inclusive bounds on a date column.
    DateRange {
        #[serde(default)]
        earliest: Option<NaiveDate>,
        #[serde(default)]
        latest: Option<NaiveDate>,
    },
    Length {
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
    },
    Pattern {
        pattern: String,
    },
    OneOf {
        values: Vec<String>,
    },
    Email,
}

impl RuleSpec {
    fn kind(&self) -> &'static str {
        match self {
            RuleSpec::Range { .. } => "range",
            RuleSpec::DateRange { .. } => "date_range",
            RuleSpec::Length { .. } => "length",
            RuleSpec::Pattern { .. } => "pattern",
            RuleSpec::OneOf { .. } => "one_of",
            RuleSpec::Email => "email",
        }
    }

    fn applies_to(&self, column_type: ColumnType) -> bool {
        match self {
            RuleSpec::Range { .. } => {
                matches!(column_type, ColumnType::Integer | ColumnType::Number)
            }
            RuleSpec::DateRange { .. } => column_type == ColumnType::Date,
            RuleSpec::Length { .. }
            | RuleSpec::Pattern { .. }
            | RuleSpec::OneOf { .. }
            | RuleSpec::Email => column_type == ColumnType::String,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            required: false,
            unique: false,
            rules: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn rule(mut self, rule: RuleSpec) -> Self {
        self.rules.push(rule);
        self
    }
}

/// The `[schema]` section of the configuration, before compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub null_tokens: Option<Vec<String>>,
}

impl SchemaDefinition {
    /// Check a raw document against the bundled JSON Schema, then deserialize it.
    pub fn from_json_value(value: &serde_json::Value) -> Result<Self, SchemaConfigError> {
        check_shape(value)?;
        serde_json::from_value(value.clone()).map_err(|e| SchemaConfigError::Shape(e.to_string()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, SchemaConfigError> {
        let value: serde_json::Value =
            toml::from_str(text).map_err(|e| SchemaConfigError::Shape(e.to_string()))?;
        Self::from_json_value(&value)
    }
}

fn check_shape(value: &serde_json::Value) -> Result<(), SchemaConfigError> {
    let compiled = SCHEMA_SHAPE
        .as_ref()
        .map_err(|e| SchemaConfigError::Shape(format!("bundled schema document: {}", e)))?;
    if let Err(errors) = compiled.validate(value) {
        let messages: Vec<String> = errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{} at {}", e, path)
                }
            })
            .collect();
        return Err(SchemaConfigError::Shape(messages.join("; ")));
    }
    Ok(())
}

/// A compiled row rule.
#[derive(Debug, Clone)]
pub enum Rule {
    Range { min: Option<f64>, max: Option<f64> },
    DateRange {
        earliest: Option<NaiveDate>,
        latest: Option<NaiveDate>,
    },
    Length { min: Option<usize>, max: Option<usize> },
    Pattern(Regex),
    OneOf(Vec<String>),
    Email,
}

#[derive(Debug, Clone)]
pub struct Column {
    /// Canonical (snake_case) column name.
    pub name: String,
    pub column_type: ColumnType,
    pub required: bool,
    pub unique: bool,
    pub rules: Vec<Rule>,
}

/// Validated, ready-to-use schema.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,
    null_tokens: Vec<String>,
}

impl Schema {
    pub fn compile(definition: &SchemaDefinition) -> Result<Self, SchemaConfigError> {
        if definition.columns.is_empty() {
            return Err(SchemaConfigError::NoColumns);
        }

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(definition.columns.len());
        for (position, spec) in definition.columns.iter().enumerate() {
            let name = canonical_column_name(&spec.name);
            if name.is_empty() {
                return Err(SchemaConfigError::EmptyColumnName { position });
            }
            if name == REASONS_COLUMN {
                return Err(SchemaConfigError::ReservedColumn(name));
            }
            if !seen.insert(name.clone()) {
                return Err(SchemaConfigError::DuplicateColumn(name));
            }

            let mut rules = Vec::with_capacity(spec.rules.len());
            for rule in &spec.rules {
                rules.push(compile_rule(&name, spec.column_type, rule)?);
            }

            columns.push(Column {
                name,
                column_type: spec.column_type,
                required: spec.required,
                unique: spec.unique,
                rules,
            });
        }

        let null_tokens = definition
            .null_tokens
            .clone()
            .unwrap_or_else(|| DEFAULT_NULL_TOKENS.iter().map(|s| s.to_string()).collect())
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .collect();

        Ok(Self {
            columns,
            null_tokens,
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// True when a trimmed cell should be read as null. The empty string always is.
    pub fn is_null_token(&self, trimmed: &str) -> bool {
        trimmed.is_empty() || self.null_tokens.iter().any(|t| t.eq_ignore_ascii_case(trimmed))
    }
}

fn compile_rule(
    column: &str,
    column_type: ColumnType,
    spec: &RuleSpec,
) -> Result<Rule, SchemaConfigError> {
    if !spec.applies_to(column_type) {
        return Err(SchemaConfigError::RuleNotApplicable {
            column: column.to_string(),
            rule: spec.kind().to_string(),
            column_type: column_type.to_string(),
        });
    }

    let inverted = || SchemaConfigError::InvertedBounds {
        column: column.to_string(),
        rule: spec.kind().to_string(),
    };

    let rule = match spec {
        RuleSpec::Range { min, max } => {
            if let (Some(lo), Some(hi)) = (min, max) {
                if lo > hi {
                    return Err(inverted());
                }
            }
            Rule::Range {
                min: *min,
                max: *max,
            }
        }
        RuleSpec::DateRange { earliest, latest } => {
            if let (Some(lo), Some(hi)) = (earliest, latest) {
                if lo > hi {
                    return Err(inverted());
                }
            }
            Rule::DateRange {
                earliest: *earliest,
                latest: *latest,
            }
        }
        RuleSpec::Length { min, max } => {
            if let (Some(lo), Some(hi)) = (min, max) {
                if lo > hi {
                    return Err(inverted());
                }
            }
            Rule::Length {
                min: *min,
                max: *max,
            }
        }
        RuleSpec::Pattern { pattern } => {
            let anchored = format!("^(?:{})$", pattern);
            let re = Regex::new(&anchored).map_err(|e| SchemaConfigError::InvalidPattern {
                column: column.to_string(),
                message: e.to_string(),
            })?;
            Rule::Pattern(re)
        }
        RuleSpec::OneOf { values } => Rule::OneOf(values.clone()),
        RuleSpec::Email => Rule::Email,
    };
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
null_tokens = ["", "n/a"]

[[columns]]
name = "User ID"
type = "string"
required = true
unique = true

[[columns]]
name = "amount"
type = "number"
required = true
rules = [{ kind = "range", min = 0.0, max = 1000.0 }]

[[columns]]
name = "signup_date"
type = "date"
rules = [{ kind = "date_range", earliest = "2000-01-01" }]
"#;

    #[test]
    fn compiles_sample_with_canonical_names() {
        let def = SchemaDefinition::from_toml_str(SAMPLE).unwrap();
        let schema = Schema::compile(&def).unwrap();
        let names: Vec<&str> = schema.column_names().collect();
        assert_eq!(names, vec!["user_id", "amount", "signup_date"]);
        assert!(schema.columns()[0].unique);
        assert!(schema.is_null_token("N/A"));
        assert!(!schema.is_null_token("null"));
    }

    #[test]
    fn default_null_tokens_apply_when_unset() {
        let def = SchemaDefinition {
            columns: vec![ColumnSpec::new("id", ColumnType::String)],
            null_tokens: None,
        };
        let schema = Schema::compile(&def).unwrap();
        assert!(schema.is_null_token("NULL"));
        assert!(schema.is_null_token(""));
        assert!(!schema.is_null_token("0"));
    }

    #[test]
    fn rejects_duplicate_canonical_names() {
        let def = SchemaDefinition {
            columns: vec![
                ColumnSpec::new("User Id", ColumnType::String),
                ColumnSpec::new("user_id", ColumnType::String),
            ],
            null_tokens: None,
        };
        assert!(matches!(
            Schema::compile(&def),
            Err(SchemaConfigError::DuplicateColumn(name)) if name == "user_id"
        ));
    }

    #[test]
    fn reasons_column_name_is_reserved() {
        let def = SchemaDefinition {
            columns: vec![
                ColumnSpec::new("id", ColumnType::Integer),
                ColumnSpec::new("Reasons", ColumnType::String),
            ],
            null_tokens: None,
        };
        assert!(matches!(
            Schema::compile(&def),
            Err(SchemaConfigError::ReservedColumn(name)) if name == "reasons"
        ));
    }

    #[test]
    fn date_bounds_need_date_range() {
        let toml = r#"
[[columns]]
name = "joined"
type = "date"
rules = [{ kind = "range", min = 0 }]
"#;
        let def = SchemaDefinition::from_toml_str(toml).unwrap();
        assert!(matches!(
            Schema::compile(&def),
            Err(SchemaConfigError::RuleNotApplicable { rule, column_type, .. })
                if rule == "range" && column_type == "date"
        ));
    }

    #[test]
    fn rejects_rule_on_wrong_type() {
        let def = SchemaDefinition {
            columns: vec![ColumnSpec::new("name", ColumnType::String).rule(RuleSpec::Range {
                min: Some(1.0),
                max: None,
            })],
            null_tokens: None,
        };
        assert!(matches!(
            Schema::compile(&def),
            Err(SchemaConfigError::RuleNotApplicable { .. })
        ));
    }

    #[test]
    fn rejects_bad_regex_and_inverted_bounds() {
        let bad_regex = SchemaDefinition {
            columns: vec![ColumnSpec::new("code", ColumnType::String).rule(RuleSpec::Pattern {
                pattern: "([a-z".into(),
            })],
            null_tokens: None,
        };
        assert!(matches!(
            Schema::compile(&bad_regex),
            Err(SchemaConfigError::InvalidPattern { .. })
        ));

        let inverted = SchemaDefinition {
            columns: vec![ColumnSpec::new("qty", ColumnType::Integer).rule(RuleSpec::Range {
                min: Some(10.0),
                max: Some(1.0),
            })],
            null_tokens: None,
        };
        assert!(matches!(
            Schema::compile(&inverted),
            Err(SchemaConfigError::InvertedBounds { .. })
        ));
    }

    #[test]
    fn empty_schema_is_rejected() {
        let def = SchemaDefinition {
            columns: Vec::new(),
            null_tokens: None,
        };
        assert!(matches!(Schema::compile(&def), Err(SchemaConfigError::NoColumns)));
    }

    #[test]
    fn shape_check_flags_unknown_type_and_keys() {
        let doc = serde_json::json!({
            "columns": [{ "name": "id", "type": "uuid" }]
        });
        assert!(matches!(
            SchemaDefinition::from_json_value(&doc),
            Err(SchemaConfigError::Shape(_))
        ));

        let doc = serde_json::json!({
            "columns": [{ "name": "id", "type": "string", "nullable": true }]
        });
        assert!(matches!(
            SchemaDefinition::from_json_value(&doc),
            Err(SchemaConfigError::Shape(_))
        ));
    }
}
