//! Validation System - Rule Synthesis
//!
//! Rules are a closed, tagged set combined into one ordered pipeline per
//! field: type coercion, then pattern, then bounds, then required-ness.
//! The order is fixed so error selection is deterministic.

use crate::schema::{FieldType, FieldValue, FormField, FormSchema, SchemaError};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FieldRequired,
    TypeMismatch,
    FormatInvalid,
    BelowMinimum,
    AboveMaximum,
    TooShort,
    TooLong,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field_id: String,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    pub fn from_errors(errors: Vec<FieldError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn error_for(&self, field_id: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field_id == field_id)
    }
}

/// The value kinds a `TypeCheck` rule can demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Numeric,
    Bool,
}

/// One validation step. Pipelines are built by [`RuleSet::synthesize`] and
/// evaluated in declaration order.
#[derive(Debug, Clone)]
pub enum Rule {
    TypeCheck(ValueKind),
    Pattern { regex: Regex, message: String },
    NumericRange { min: Option<f64>, max: Option<f64> },
    LengthRange { min: Option<usize>, max: Option<usize> },
    Required,
}

#[derive(Debug, Clone)]
pub struct FieldRules {
    label: String,
    pipeline: Vec<Rule>,
}

/// Field-keyed validation rules for one schema. Synthesized once per
/// schema; schemas are immutable for the session so this never goes stale.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: HashMap<String, FieldRules>,
}

impl RuleSet {
    pub fn synthesize(schema: &FormSchema) -> Result<Self, SchemaError> {
        let mut rules = HashMap::new();
        for field in schema.fields() {
            rules.insert(field.id.clone(), synthesize_field(field)?);
        }
        Ok(Self { rules })
    }

    /// Validate one field value against its pipeline. Fields without rules
    /// (unknown ids) pass permissively.
    pub fn check(&self, field_id: &str, value: Option<&FieldValue>) -> Result<(), FieldError> {
        match self.rules.get(field_id) {
            Some(field_rules) => apply_pipeline(field_id, field_rules, value),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Per-type rule synthesis. Mirrors the portal's rendering strategies:
/// email and tel are patterned text, numbers get range bounds, checkboxes
/// are booleans, and everything else (text, url, select, unknown) is text
/// with optional pattern and length bounds.
fn synthesize_field(field: &FormField) -> Result<FieldRules, SchemaError> {
    let spec = field.validation.clone().unwrap_or_default();
    let mut pipeline = Vec::new();

    match &field.field_type {
        FieldType::Email => {
            pipeline.push(Rule::TypeCheck(ValueKind::Text));
            pipeline.push(Rule::Pattern {
                regex: compile(EMAIL_PATTERN, field)?,
                message: "Invalid email address".to_string(),
            });
        }
        FieldType::Number => {
            pipeline.push(Rule::TypeCheck(ValueKind::Numeric));
            if spec.min.is_some() || spec.max.is_some() {
                pipeline.push(Rule::NumericRange {
                    min: spec.min,
                    max: spec.max,
                });
            }
        }
        FieldType::Tel => {
            pipeline.push(Rule::TypeCheck(ValueKind::Text));
            if let Some(pattern) = &spec.pattern {
                pipeline.push(Rule::Pattern {
                    regex: compile(pattern, field)?,
                    message: "Invalid phone number format".to_string(),
                });
            }
        }
        FieldType::Checkbox => {
            pipeline.push(Rule::TypeCheck(ValueKind::Bool));
        }
        FieldType::Text | FieldType::Url | FieldType::Select | FieldType::Other(_) => {
            pipeline.push(Rule::TypeCheck(ValueKind::Text));
            if let Some(pattern) = &spec.pattern {
                pipeline.push(Rule::Pattern {
                    regex: compile(pattern, field)?,
                    message: format!("Invalid {} format", field.label.to_lowercase()),
                });
            }
            if spec.min_length.is_some() || spec.max_length.is_some() {
                pipeline.push(Rule::LengthRange {
                    min: spec.min_length,
                    max: spec.max_length,
                });
            }
        }
    }

    if field.required {
        pipeline.push(Rule::Required);
    }

    Ok(FieldRules {
        label: field.label.clone(),
        pipeline,
    })
}

fn compile(pattern: &str, field: &FormField) -> Result<Regex, SchemaError> {
    Regex::new(pattern).map_err(|source| SchemaError::InvalidPattern {
        field: field.id.clone(),
        source,
    })
}

/// Run the pipeline in order; the first failing rule wins. Empty values
/// skip every rule except `Required`, so a required empty field reports
/// `FieldRequired` rather than a type or format error.
fn apply_pipeline(
    field_id: &str,
    field_rules: &FieldRules,
    value: Option<&FieldValue>,
) -> Result<(), FieldError> {
    let empty = value.map_or(true, FieldValue::is_empty);
    let label = &field_rules.label;

    for rule in &field_rules.pipeline {
        match rule {
            Rule::Required => {
                if empty {
                    return Err(error(
                        field_id,
                        ErrorKind::FieldRequired,
                        format!("{} is required", label),
                    ));
                }
            }
            _ if empty => continue,
            Rule::TypeCheck(kind) => check_type(field_id, *kind, value)?,
            Rule::Pattern { regex, message } => {
                let text = value.map(FieldValue::to_text).unwrap_or_default();
                if !regex.is_match(&text) {
                    return Err(error(field_id, ErrorKind::FormatInvalid, message.clone()));
                }
            }
            Rule::NumericRange { min, max } => {
                let n = value.and_then(FieldValue::as_numeric).unwrap_or_default();
                if let Some(min) = min {
                    if n < *min {
                        return Err(error(
                            field_id,
                            ErrorKind::BelowMinimum,
                            format!("Minimum value is {}", min),
                        ));
                    }
                }
                if let Some(max) = max {
                    if n > *max {
                        return Err(error(
                            field_id,
                            ErrorKind::AboveMaximum,
                            format!("Maximum value is {}", max),
                        ));
                    }
                }
            }
            Rule::LengthRange { min, max } => {
                let len = value
                    .map(|v| v.to_text().chars().count())
                    .unwrap_or_default();
                if let Some(min) = min {
                    if len < *min {
                        return Err(error(
                            field_id,
                            ErrorKind::TooShort,
                            format!("Minimum length is {} characters", min),
                        ));
                    }
                }
                if let Some(max) = max {
                    if len > *max {
                        return Err(error(
                            field_id,
                            ErrorKind::TooLong,
                            format!("Maximum length is {} characters", max),
                        ));
                    }
                }
            }
        }
    }
    Ok(())
}

fn check_type(
    field_id: &str,
    kind: ValueKind,
    value: Option<&FieldValue>,
) -> Result<(), FieldError> {
    match (kind, value) {
        // Any scalar coerces to text; the text check only fixes the
        // rendering used by the pattern and length rules downstream.
        (ValueKind::Text, _) | (_, None) => Ok(()),
        (ValueKind::Numeric, Some(v)) if v.as_numeric().is_some() => Ok(()),
        (ValueKind::Numeric, Some(_)) => Err(error(
            field_id,
            ErrorKind::TypeMismatch,
            "Must be a number".to_string(),
        )),
        (ValueKind::Bool, Some(v)) if v.as_bool().is_some() => Ok(()),
        (ValueKind::Bool, Some(_)) => Err(error(
            field_id,
            ErrorKind::TypeMismatch,
            "Must be a boolean".to_string(),
        )),
    }
}

fn error(field_id: &str, kind: ErrorKind, message: String) -> FieldError {
    FieldError {
        field_id: field_id.to_string(),
        kind,
        message,
    }
}
