//! Conditional Visibility
//!
//! A field with a dependency is shown only while the target field holds
//! exactly the expected value. Hidden fields are never validated and never
//! reach the submission payload.

use crate::schema::{FormField, FormSchema, FormValues, SchemaError};
use std::collections::HashSet;

/// Strict-equality visibility gate. A missing target value hides the field;
/// there is no coercion across value kinds.
pub fn is_visible(field: &FormField, values: &FormValues) -> bool {
    match &field.depends_on {
        None => true,
        Some(dep) => values.get(&dep.field).map_or(false, |v| *v == dep.value),
    }
}

/// Load-time check of the dependency graph: every edge must point at an
/// existing field, and never at the declaring field itself. A dangling
/// reference is a schema error, not a silently hidden field.
pub fn check_dependencies(schema: &FormSchema) -> Result<(), SchemaError> {
    let ids: HashSet<&str> = schema.fields().map(|f| f.id.as_str()).collect();

    for field in schema.fields() {
        if let Some(dep) = &field.depends_on {
            if dep.field == field.id {
                return Err(SchemaError::SelfDependency(field.id.clone()));
            }
            if !ids.contains(dep.field.as_str()) {
                return Err(SchemaError::DanglingDependency {
                    field: field.id.clone(),
                    target: dep.field.clone(),
                });
            }
        }
    }
    Ok(())
}
