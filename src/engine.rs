//! Form Engine - Session Lifecycle
//!
//! CRITICAL: submit MUST validate internally. No bypass.
//!
//! A `FormSession` binds one schema to live editable values: edits
//! re-validate and re-evaluate visibility, drafts persist as a side
//! channel, and submission goes through a sink trait so the transport is
//! injected, never ambient.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::conditions::is_visible;
use crate::draft::DraftStore;
use crate::schema::{FieldType, FieldValue, FormField, FormSchema, FormValues, SchemaError};
use crate::table::FormSubmission;
use crate::validation::{FieldError, RuleSet, ValidationReport};

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_RUN_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_run_count() -> u32 {
    VALIDATION_RUN_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_run_count() {
    VALIDATION_RUN_COUNT.store(0, Ordering::SeqCst);
}

/// How long the `Saved` auto-save status is shown before decaying to
/// `Idle`.
pub const SAVED_STATUS_DECAY: Duration = Duration::from_secs(3);

/// Observation-only auto-save indicator. It never blocks editing or
/// submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoSaveStatus {
    Idle,
    Saving,
    Saved,
    Error,
}

/// The `POST /forms/submit` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub form_id: String,
    pub data: FormValues,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_draft: bool,
}

fn is_false(value: &bool) -> bool {
    !value
}

/// Transport-level submission failure, already stripped of transport
/// detail. Recoverable: the session keeps its values for a retry.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SinkError {
    pub message: String,
}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Where completed applications go. Implemented by the HTTP client; tests
/// inject recording fakes.
pub trait SubmissionSink {
    fn submit_form(&self, request: &SubmitRequest) -> Result<FormSubmission, SinkError>;
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Validation failed on {} field(s)", .0.errors.len())]
    Validation(ValidationReport),

    #[error("Submission failed: {0}")]
    Sink(#[source] SinkError),
}

/// One live form-filling session. Owns the values for its lifetime; all
/// mutation goes through `&mut self`, so there is no concurrent edit path.
pub struct FormSession {
    schema: FormSchema,
    rules: RuleSet,
    values: FormValues,
    errors: HashMap<String, FieldError>,
    drafts: Option<DraftStore>,
    status: AutoSaveStatus,
    saved_at: Option<Instant>,
    submitted: bool,
}

impl FormSession {
    /// Bind a schema. The schema is checked structurally and its rules are
    /// synthesized up front; a malformed schema is a fatal load error, not
    /// something discovered mid-edit.
    ///
    /// Values are seeded from field-type defaults, overlaid with
    /// `initial`, and finally overlaid with a stored draft when a draft
    /// store is attached (auto-save on).
    pub fn start(
        schema: FormSchema,
        initial: Option<FormValues>,
        drafts: Option<DraftStore>,
    ) -> Result<Self, SchemaError> {
        schema.check()?;
        let rules = RuleSet::synthesize(&schema)?;

        let mut values = type_defaults(&schema);
        if let Some(initial) = initial {
            values.extend(initial);
        }
        if let Some(store) = &drafts {
            if let Some(draft) = store.load(&schema.id) {
                log::debug!("restored draft for form {}", schema.id);
                values.extend(draft);
            }
        }

        Ok(Self {
            schema,
            rules,
            values,
            errors: HashMap::new(),
            drafts,
            status: AutoSaveStatus::Idle,
            saved_at: None,
            submitted: false,
        })
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn submitted(&self) -> bool {
        self.submitted
    }

    pub fn field_error(&self, field_id: &str) -> Option<&FieldError> {
        self.errors.get(field_id)
    }

    /// Fields currently shown, in render order.
    pub fn visible_fields(&self) -> Vec<&FormField> {
        self.schema
            .fields()
            .filter(|f| is_visible(f, &self.values))
            .collect()
    }

    /// Auto-save indicator with the timed decay applied: `Saved` reads as
    /// `Idle` once the decay window has passed.
    pub fn auto_save_status(&self) -> AutoSaveStatus {
        match (self.status, self.saved_at) {
            (AutoSaveStatus::Saved, Some(at)) if at.elapsed() >= SAVED_STATUS_DECAY => {
                AutoSaveStatus::Idle
            }
            (status, _) => status,
        }
    }

    /// Apply one edit: store the value, re-validate the edited field,
    /// re-evaluate visibility everywhere (any edit may reveal or hide any
    /// dependent field), and schedule a draft write when auto-save is on.
    pub fn set_value(&mut self, field_id: &str, value: FieldValue) {
        if self.schema.field_by_id(field_id).is_none() {
            log::warn!("ignoring edit to unknown field {}", field_id);
            return;
        }
        self.values.insert(field_id.to_string(), value);
        self.refresh_errors(field_id);
        self.persist_draft();
    }

    fn refresh_errors(&mut self, edited: &str) {
        let hidden: Vec<String> = self
            .schema
            .fields()
            .filter(|f| !is_visible(f, &self.values))
            .map(|f| f.id.clone())
            .collect();
        for id in hidden {
            self.errors.remove(&id);
        }

        let visible = self
            .schema
            .field_by_id(edited)
            .map_or(false, |f| is_visible(f, &self.values));
        if visible {
            match self.rules.check(edited, self.values.get(edited)) {
                Ok(()) => {
                    self.errors.remove(edited);
                }
                Err(e) => {
                    self.errors.insert(edited.to_string(), e);
                }
            }
        }
    }

    fn persist_draft(&mut self) {
        let Some(store) = &self.drafts else {
            return;
        };
        self.status = AutoSaveStatus::Saving;
        match store.save(&self.schema.id, &self.values) {
            Ok(()) => {
                self.status = AutoSaveStatus::Saved;
                self.saved_at = Some(Instant::now());
            }
            Err(e) => {
                log::error!("draft save failed for form {}: {}", self.schema.id, e);
                self.status = AutoSaveStatus::Error;
            }
        }
    }

    /// Validate every currently visible field, in render order. Hidden
    /// fields never contribute errors.
    pub fn validate(&self) -> ValidationReport {
        #[cfg(feature = "test-hooks")]
        VALIDATION_RUN_COUNT.fetch_add(1, Ordering::SeqCst);

        let mut errors = Vec::new();
        for field in self.schema.fields() {
            if !is_visible(field, &self.values) {
                continue;
            }
            if let Err(e) = self.rules.check(&field.id, self.values.get(&field.id)) {
                errors.push(e);
            }
        }
        ValidationReport::from_errors(errors)
    }

    /// Values of the visible fields only. Hidden fields keep their stored
    /// values in memory but are omitted here, so they never reach the
    /// submission payload.
    pub fn visible_values(&self) -> FormValues {
        self.visible_fields()
            .into_iter()
            .filter_map(|f| {
                self.values
                    .get(&f.id)
                    .map(|v| (f.id.clone(), v.clone()))
            })
            .collect()
    }

    /// Submit the session through the sink.
    ///
    /// MANDATORY: validation always runs first; a failing report returns
    /// without touching the sink. On sink success the draft is cleared; on
    /// sink failure the values are left intact for retry. The payload is
    /// always the live in-memory values, never the draft.
    pub fn submit(&mut self, sink: &dyn SubmissionSink) -> Result<FormSubmission, SubmitError> {
        let report = self.validate();
        if !report.valid {
            self.errors = report
                .errors
                .iter()
                .map(|e| (e.field_id.clone(), e.clone()))
                .collect();
            return Err(SubmitError::Validation(report));
        }
        self.errors.clear();

        let request = SubmitRequest {
            form_id: self.schema.id.clone(),
            data: self.visible_values(),
            is_draft: false,
        };
        let ack = sink.submit_form(&request).map_err(SubmitError::Sink)?;

        if let Some(store) = &self.drafts {
            if let Err(e) = store.delete(&self.schema.id) {
                log::warn!("failed to clear draft for form {}: {}", self.schema.id, e);
            }
        }
        self.submitted = true;
        log::debug!("form {} submitted as {}", self.schema.id, ack.id);
        Ok(ack)
    }
}

/// Type defaults for a fresh session: empty text everywhere, `false` for
/// checkboxes.
fn type_defaults(schema: &FormSchema) -> FormValues {
    schema
        .fields()
        .map(|f| {
            let default = match f.field_type {
                FieldType::Checkbox => FieldValue::Bool(false),
                _ => FieldValue::Text(String::new()),
            };
            (f.id.clone(), default)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FormSection;

    fn text_field(id: &str, required: bool) -> FormField {
        FormField {
            id: id.to_string(),
            field_type: FieldType::Text,
            label: id.to_string(),
            required,
            options: None,
            depends_on: None,
            validation: None,
        }
    }

    fn schema() -> FormSchema {
        FormSchema {
            id: "home".to_string(),
            title: "Home Insurance".to_string(),
            description: String::new(),
            sections: vec![FormSection {
                id: "main".to_string(),
                title: "Main".to_string(),
                fields: vec![text_field("address", true)],
            }],
        }
    }

    #[test]
    fn defaults_seed_every_field() {
        let session = FormSession::start(schema(), None, None).unwrap();
        assert_eq!(
            session.values().get("address"),
            Some(&FieldValue::Text(String::new()))
        );
    }

    #[test]
    fn edit_updates_field_error_state() {
        let mut session = FormSession::start(schema(), None, None).unwrap();
        session.set_value("address", FieldValue::Text(String::new()));
        assert!(session.field_error("address").is_some());
        session.set_value("address", FieldValue::Text("12 Elm St".to_string()));
        assert!(session.field_error("address").is_none());
    }

    #[test]
    fn auto_save_status_decays_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let store = DraftStore::open(dir.path()).unwrap();
        let mut session = FormSession::start(schema(), None, Some(store)).unwrap();

        assert_eq!(session.auto_save_status(), AutoSaveStatus::Idle);
        session.set_value("address", FieldValue::Text("12 Elm St".to_string()));
        assert_eq!(session.auto_save_status(), AutoSaveStatus::Saved);

        session.saved_at = Some(Instant::now() - SAVED_STATUS_DECAY);
        assert_eq!(session.auto_save_status(), AutoSaveStatus::Idle);
    }

    #[test]
    fn failed_draft_write_degrades_status_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = DraftStore::open(dir.path()).unwrap();
        let mut session = FormSession::start(schema(), None, Some(store)).unwrap();

        // Point the store at a path that cannot be a directory entry's
        // parent anymore.
        drop(std::fs::remove_dir_all(dir.path()));
        session.set_value("address", FieldValue::Text("12 Elm St".to_string()));
        assert_eq!(session.auto_save_status(), AutoSaveStatus::Error);
        assert_eq!(
            session.values().get("address"),
            Some(&FieldValue::Text("12 Elm St".to_string()))
        );
    }

    #[test]
    fn edits_to_unknown_fields_are_ignored() {
        let mut session = FormSession::start(schema(), None, None).unwrap();
        session.set_value("ghost", FieldValue::Bool(true));
        assert!(session.values().get("ghost").is_none());
    }
}
