use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::{NormalizedRow, ValidationResult, Value, Verdict};
use crate::schema::{Column, Rule, Schema};

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("email regex"));

/// Reason codes attached to invalid rows, rendered as `<code>:<column>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCode {
    MissingRequiredField,
    TypeMismatch,
    OutOfRange,
    InvalidLength,
    PatternMismatch,
    NotAllowed,
    InvalidEmail,
    DuplicateValue,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::MissingRequiredField => "missing_required_field",
            ReasonCode::TypeMismatch => "type_mismatch",
            ReasonCode::OutOfRange => "out_of_range",
            ReasonCode::InvalidLength => "invalid_length",
            ReasonCode::PatternMismatch => "pattern_mismatch",
            ReasonCode::NotAllowed => "not_allowed",
            ReasonCode::InvalidEmail => "invalid_email",
            ReasonCode::DuplicateValue => "duplicate_value",
        }
    }

    pub fn for_column(&self, column: &str) -> String {
        format!("{}:{}", self.as_str(), column)
    }
}

/// Trait for implementing row validation
pub trait Validator {
    /// Check one row on its own. Every failing check contributes a reason.
    fn validate(&self, row: NormalizedRow) -> ValidationResult;

    /// Validate a whole file's rows, preserving input order.
    fn validate_all(&self, rows: Vec<NormalizedRow>) -> Vec<ValidationResult> {
        rows.into_iter().map(|row| self.validate(row)).collect()
    }
}

/// Validator driven by a compiled schema
pub struct SchemaValidator {
    schema: Arc<Schema>,
}

impl SchemaValidator {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema }
    }

    fn check_column(&self, column: &Column, value: &Value, reasons: &mut Vec<String>) {
        match value {
            Value::Null => {
                if column.required {
                    reasons.push(ReasonCode::MissingRequiredField.for_column(&column.name));
                }
            }
            Value::Unparsed(_) => {
                reasons.push(ReasonCode::TypeMismatch.for_column(&column.name));
            }
            typed => {
                for rule in &column.rules {
                    if let Some(code) = check_rule(rule, typed) {
                        reasons.push(code.for_column(&column.name));
                    }
                }
            }
        }
    }

    /// Later rows repeating a unique value already held by an earlier valid
    /// row are demoted. Only rows that stay valid claim their values.
    fn enforce_unique(&self, results: &mut [ValidationResult]) {
        let unique: Vec<&Column> = self.schema.columns().iter().filter(|c| c.unique).collect();
        if unique.is_empty() {
            return;
        }

        let mut seen: Vec<HashSet<String>> = vec![HashSet::new(); unique.len()];
        for result in results.iter_mut().filter(|r| r.is_valid()) {
            let mut claims = Vec::with_capacity(unique.len());
            let mut duplicates = Vec::new();
            for (slot, column) in unique.iter().enumerate() {
                match result.row.get(&column.name) {
                    Some(value) if !value.is_null() => {
                        let key = value.render();
                        if seen[slot].contains(&key) {
                            duplicates.push(ReasonCode::DuplicateValue.for_column(&column.name));
                        } else {
                            claims.push((slot, key));
                        }
                    }
                    _ => {}
                }
            }

            if duplicates.is_empty() {
                for (slot, key) in claims {
                    seen[slot].insert(key);
                }
            } else {
                result.verdict = Verdict::Invalid {
                    reasons: duplicates,
                };
            }
        }
    }
}

fn check_rule(rule: &Rule, value: &Value) -> Option<ReasonCode> {
    let passed = match (rule, value) {
        (Rule::Range { min, max }, v) => match v.as_f64() {
            Some(n) => min.map_or(true, |lo| n >= lo) && max.map_or(true, |hi| n <= hi),
            None => true,
        },
        (Rule::DateRange { earliest, latest }, Value::Date(d)) => {
            earliest.map_or(true, |lo| *d >= lo) && latest.map_or(true, |hi| *d <= hi)
        }
        (Rule::Length { min, max }, Value::Text(s)) => {
            let len = s.chars().count();
            min.map_or(true, |lo| len >= lo) && max.map_or(true, |hi| len <= hi)
        }
        (Rule::Pattern(re), Value::Text(s)) => re.is_match(s),
        (Rule::OneOf(allowed), Value::Text(s)) => allowed.iter().any(|a| a == s),
        (Rule::Email, Value::Text(s)) => EMAIL.is_match(s),
        _ => true,
    };
    if passed {
        return None;
    }
    Some(match rule {
        Rule::Range { .. } | Rule::DateRange { .. } => ReasonCode::OutOfRange,
        Rule::Length { .. } => ReasonCode::InvalidLength,
        Rule::Pattern(_) => ReasonCode::PatternMismatch,
        Rule::OneOf(_) => ReasonCode::NotAllowed,
        Rule::Email => ReasonCode::InvalidEmail,
    })
}

impl Validator for SchemaValidator {
    fn validate(&self, row: NormalizedRow) -> ValidationResult {
        let mut reasons = Vec::new();
        for column in self.schema.columns() {
            match row.get(&column.name) {
                Some(value) => self.check_column(column, value, &mut reasons),
                None if column.required => {
                    reasons.push(ReasonCode::MissingRequiredField.for_column(&column.name));
                }
                None => {}
            }
        }

        let verdict = if reasons.is_empty() {
            Verdict::Valid
        } else {
            Verdict::Invalid { reasons }
        };
        ValidationResult { row, verdict }
    }

    fn validate_all(&self, rows: Vec<NormalizedRow>) -> Vec<ValidationResult> {
        let mut results: Vec<ValidationResult> =
            rows.into_iter().map(|row| self.validate(row)).collect();
        self.enforce_unique(&mut results);
        results
    }
}
