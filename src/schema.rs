//! Form Schemas - Enforceable Contracts
//!
//! Schemas are declared by the remote service and are read-only for the
//! session. Structural problems are rejected at load time, never at
//! keystroke time.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub type FormId = String;

/// A single form value. Comparisons are strict: a `Text("true")` never
/// equals a `Bool(true)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Empty means "the user has entered nothing": an empty text value.
    /// `false` and `0` are real inputs.
    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Text(t) if t.is_empty())
    }

    /// Numeric coercion: numbers pass through, numeric-looking text parses.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(t) => t.trim().parse().ok(),
            FieldValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// String rendering used by pattern and length rules.
    pub fn to_text(&self) -> String {
        match self {
            FieldValue::Text(t) => t.clone(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Bool(b) => b.to_string(),
        }
    }
}

/// Current values of one form session, keyed by field id.
pub type FormValues = HashMap<String, FieldValue>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    pub id: FormId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub sections: Vec<FormSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSection {
    pub id: String,
    pub title: String,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Option<Vec<FieldOption>>,
    #[serde(default)]
    pub depends_on: Option<DependsOn>,
    #[serde(default)]
    pub validation: Option<ValidationSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Email,
    Number,
    Tel,
    Url,
    Select,
    Checkbox,
    /// Unrecognized types render and validate as permissive text.
    #[serde(untagged)]
    Other(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldOption {
    pub label: String,
    pub value: String,
}

/// Weak reference to another field in the same schema. The target is
/// resolved by id at evaluation time; its existence is checked at load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependsOn {
    pub field: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSpec {
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Duplicate section id: {0}")]
    DuplicateSection(String),

    #[error("Duplicate field id: {0}")]
    DuplicateField(String),

    #[error("Field {field} depends on unknown field {target}")]
    DanglingDependency { field: String, target: String },

    #[error("Field {0} depends on itself")]
    SelfDependency(String),

    #[error("Invalid pattern on field {field}: {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("Schema decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FormSchema {
    /// All fields in render order, across sections.
    pub fn fields(&self) -> impl Iterator<Item = &FormField> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }

    pub fn field_by_id(&self, id: &str) -> Option<&FormField> {
        self.fields().find(|f| f.id == id)
    }

    /// Structural validation, run once when a schema enters the session.
    /// Section ids must be unique, field ids must be unique across the
    /// whole schema, dependency targets must exist, and declared patterns
    /// must compile.
    pub fn check(&self) -> Result<(), SchemaError> {
        let mut section_ids = HashSet::new();
        for section in &self.sections {
            if !section_ids.insert(section.id.as_str()) {
                return Err(SchemaError::DuplicateSection(section.id.clone()));
            }
        }

        let mut field_ids = HashSet::new();
        for field in self.fields() {
            if !field_ids.insert(field.id.as_str()) {
                return Err(SchemaError::DuplicateField(field.id.clone()));
            }
            if let Some(pattern) = field.validation.as_ref().and_then(|v| v.pattern.as_deref()) {
                Regex::new(pattern).map_err(|source| SchemaError::InvalidPattern {
                    field: field.id.clone(),
                    source,
                })?;
            }
        }

        crate::conditions::check_dependencies(self)
    }
}

/// Load schemas from a directory of JSON files. Files that fail to decode
/// or fail the structural check are skipped with a warning; this is a
/// development convenience, the strict path is the remote fetch.
pub fn load_schemas_from_dir(dir: &Path) -> Result<Vec<FormSchema>, std::io::Error> {
    let mut schemas = Vec::new();
    if dir.exists() {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map_or(false, |e| e == "json") {
                let content = match fs::read_to_string(&path) {
                    Ok(c) => c,
                    Err(e) => {
                        log::warn!("skipping unreadable schema file {}: {}", path.display(), e);
                        continue;
                    }
                };
                match serde_json::from_str::<FormSchema>(&content) {
                    Ok(schema) => match schema.check() {
                        Ok(()) => schemas.push(schema),
                        Err(e) => log::warn!("skipping invalid schema {}: {}", schema_name(&path), e),
                    },
                    Err(e) => log::warn!("skipping undecodable schema {}: {}", schema_name(&path), e),
                }
            }
        }
    }
    Ok(schemas)
}

fn schema_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(id: &str, field_type: FieldType) -> FormField {
        FormField {
            id: id.to_string(),
            field_type,
            label: id.to_string(),
            required: false,
            options: None,
            depends_on: None,
            validation: None,
        }
    }

    fn schema_with(fields: Vec<FormField>) -> FormSchema {
        FormSchema {
            id: "test".to_string(),
            title: "Test".to_string(),
            description: String::new(),
            sections: vec![FormSection {
                id: "main".to_string(),
                title: "Main".to_string(),
                fields,
            }],
        }
    }

    #[test]
    fn unknown_field_type_decodes_as_other() {
        let json = r#"{"id":"x","type":"signature","label":"Sign here","required":false}"#;
        let field: FormField = serde_json::from_str(json).unwrap();
        assert_eq!(field.field_type, FieldType::Other("signature".to_string()));
    }

    #[test]
    fn field_value_equality_is_strict() {
        assert_ne!(FieldValue::Text("true".into()), FieldValue::Bool(true));
        assert_ne!(FieldValue::Text("1".into()), FieldValue::Number(1.0));
        assert_eq!(FieldValue::Text("yes".into()), FieldValue::Text("yes".into()));
    }

    #[test]
    fn duplicate_field_ids_rejected() {
        let schema = schema_with(vec![field("a", FieldType::Text), field("a", FieldType::Text)]);
        assert!(matches!(schema.check(), Err(SchemaError::DuplicateField(_))));
    }

    #[test]
    fn invalid_pattern_rejected_at_load() {
        let mut f = field("a", FieldType::Text);
        f.validation = Some(ValidationSpec {
            pattern: Some("(unclosed".to_string()),
            ..Default::default()
        });
        let schema = schema_with(vec![f]);
        assert!(matches!(schema.check(), Err(SchemaError::InvalidPattern { .. })));
    }

    #[test]
    fn wire_names_are_camel_case() {
        let json = r#"{
            "id": "age",
            "type": "number",
            "label": "Age",
            "required": true,
            "dependsOn": {"field": "hasLicense", "value": true},
            "validation": {"min": 16, "maxLength": 3}
        }"#;
        let field: FormField = serde_json::from_str(json).unwrap();
        let dep = field.depends_on.unwrap();
        assert_eq!(dep.field, "hasLicense");
        assert_eq!(dep.value, FieldValue::Bool(true));
        assert_eq!(field.validation.unwrap().max_length, Some(3));
    }
}
