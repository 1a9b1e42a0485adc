//! CoverForm Core - Insurance Application Portal Engine
//!
//! # The Five Rules (Non-Negotiable)
//! 1. Schemas Are Contracts
//! 2. A Submit Always Validates
//! 3. Hidden Fields Never Block, Never Leak
//! 4. Drafts Are A Side Channel
//! 5. Late Responses Are Discarded

pub mod client;
pub mod conditions;
pub mod draft;
pub mod engine;
pub mod schema;
pub mod session;
pub mod table;
pub mod validation;

pub use client::{ClientError, PortalClient, DEFAULT_API_URL};
pub use conditions::is_visible;
pub use draft::{DraftError, DraftStore};
pub use engine::{
    AutoSaveStatus, FormSession, SinkError, SubmissionSink, SubmitError, SubmitRequest,
};
pub use schema::{
    DependsOn, FieldOption, FieldType, FieldValue, FormField, FormId, FormSchema, FormSection,
    FormValues, SchemaError, ValidationSpec,
};
pub use session::{LoadToken, PortalSession};
pub use table::{
    FormSubmission, SortConfig, SortDirection, SubmissionTable, SubmissionsPage, TableView,
    PAGE_SIZE,
};
pub use validation::{ErrorKind, FieldError, RuleSet, ValidationReport};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
