use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{NormalizedRow, Row, Value};
use crate::schema::{ColumnType, Schema};

static CAMEL_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{Ll}|\p{Nd})(\p{Lu})").expect("camel-case boundary regex"));
static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{Alphabetic}\p{Nd}]+").expect("separator regex"));

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y"];

/// Canonical snake_case column name: `" Signup Date "`, `"signupDate"` and
/// `"SIGNUP-DATE"` all become `"signup_date"`.
pub fn canonical_column_name(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('\u{feff}');
    let split = CAMEL_BOUNDARY.replace_all(trimmed, "${1}_${2}");
    let lower = split.to_lowercase();
    NON_WORD.replace_all(&lower, "_").trim_matches('_').to_string()
}

/// Coerce a trimmed, non-null cell toward the declared column type.
/// Anything that cannot be read unambiguously is kept as `Value::Unparsed`.
pub fn coerce(trimmed: &str, column_type: ColumnType) -> Value {
    let parsed = match column_type {
        ColumnType::String => Some(Value::Text(trimmed.to_string())),
        ColumnType::Integer => parse_integer(trimmed).map(Value::Integer),
        ColumnType::Number => trimmed
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Value::Number),
        ColumnType::Boolean => parse_boolean(trimmed).map(Value::Boolean),
        ColumnType::Date => parse_date(trimmed).map(Value::Date),
    };
    parsed.unwrap_or_else(|| Value::Unparsed(trimmed.to_string()))
}

fn parse_integer(s: &str) -> Option<i64> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(i);
    }
    // Integral floats such as "3.0" are unambiguous
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_boolean(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Trait for turning raw rows into the schema's canonical shape
pub trait Normalizer {
    fn normalize(&self, row: &Row) -> NormalizedRow;

    /// One output per input, same order.
    fn normalize_all(&self, rows: &[Row]) -> Vec<NormalizedRow> {
        rows.iter().map(|row| self.normalize(row)).collect()
    }
}

/// Normalizer driven by a compiled schema
pub struct SchemaNormalizer {
    schema: Arc<Schema>,
}

impl SchemaNormalizer {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema }
    }
}

impl Normalizer for SchemaNormalizer {
    fn normalize(&self, row: &Row) -> NormalizedRow {
        let by_canonical: HashMap<String, &str> = row
            .fields
            .iter()
            .map(|(name, value)| (canonical_column_name(name), value.as_str()))
            .collect();

        let values = self
            .schema
            .columns()
            .iter()
            .map(|column| {
                let value = match by_canonical.get(&column.name) {
                    None => Value::Null,
                    Some(raw) => {
                        let trimmed = raw.trim();
                        if self.schema.is_null_token(trimmed) {
                            Value::Null
                        } else {
                            coerce(trimmed, column.column_type)
                        }
                    }
                };
                (column.name.clone(), value)
            })
            .collect();

        NormalizedRow {
            index: row.index,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSpec, SchemaDefinition};

    fn schema() -> Arc<Schema> {
        let def = SchemaDefinition {
            columns: vec![
                ColumnSpec::new("id", ColumnType::String).required(),
                ColumnSpec::new("amount", ColumnType::Number),
                ColumnSpec::new("qty", ColumnType::Integer),
                ColumnSpec::new("active", ColumnType::Boolean),
                ColumnSpec::new("signup_date", ColumnType::Date),
            ],
            null_tokens: None,
        };
        Arc::new(Schema::compile(&def).unwrap())
    }

    fn row(index: usize, fields: &[(&str, &str)]) -> Row {
        Row {
            index,
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn canonical_names() {
        assert_eq!(canonical_column_name(" Signup Date "), "signup_date");
        assert_eq!(canonical_column_name("signupDate"), "signup_date");
        assert_eq!(canonical_column_name("SIGNUP-DATE"), "signup_date");
        assert_eq!(canonical_column_name("Amount (USD)"), "amount_usd");
        assert_eq!(canonical_column_name("UserID"), "user_id");
        assert_eq!(canonical_column_name("__"), "");
    }

    #[test]
    fn coerces_by_declared_type() {
        assert_eq!(coerce("10.5", ColumnType::Number), Value::Number(10.5));
        assert_eq!(coerce("3.0", ColumnType::Integer), Value::Integer(3));
        assert_eq!(coerce("3.5", ColumnType::Integer), Value::Unparsed("3.5".into()));
        assert_eq!(coerce("Yes", ColumnType::Boolean), Value::Boolean(true));
        assert_eq!(coerce("NaN", ColumnType::Number), Value::Unparsed("NaN".into()));
        assert_eq!(
            coerce("03/15/2024", ColumnType::Date),
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        );
        assert_eq!(
            coerce("2024-03-15T10:00:00Z", ColumnType::Date),
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        );
        assert_eq!(coerce("2024-13-40", ColumnType::Date), Value::Unparsed("2024-13-40".into()));
    }

    #[test]
    fn maps_headers_trims_and_fills_missing_columns() {
        let normalizer = SchemaNormalizer::new(schema());
        let out = normalizer.normalize(&row(4, &[("  ID ", " 42 "), ("Amount", "n/a"), ("extra", "x")]));

        assert_eq!(out.index, 4);
        let names: Vec<&str> = out.values.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["id", "amount", "qty", "active", "signup_date"]);
        assert_eq!(out.get("id"), Some(&Value::Text("42".into())));
        assert_eq!(out.get("amount"), Some(&Value::Null));
        assert_eq!(out.get("qty"), Some(&Value::Null));
        assert!(out.get("extra").is_none());
    }

    #[test]
    fn one_to_one_and_order_preserving() {
        let normalizer = SchemaNormalizer::new(schema());
        let rows: Vec<Row> = (0..5).map(|i| row(i, &[("id", "x")])).collect();
        let out = normalizer.normalize_all(&rows);
        assert_eq!(out.len(), rows.len());
        assert!(out.iter().enumerate().all(|(i, r)| r.index == i));
    }
}
