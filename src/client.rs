//! Remote Service Client
//!
//! Thin JSON client over the portal service. Transport and decode
//! failures are converted to `ClientError` here, at the boundary; raw
//! reqwest or serde errors never reach engine or table code.

use crate::engine::{SinkError, SubmissionSink, SubmitRequest};
use crate::schema::{FormSchema, SchemaError};
use crate::table::{FormSubmission, SubmissionsPage};
use reqwest::blocking::{Client, Response};
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://assignment.devotel.io";

const FORMS_PATH: &str = "/api/insurance/forms";
const SUBMIT_PATH: &str = "/api/insurance/forms/submit";
const SUBMISSIONS_PATH: &str = "/api/insurance/forms/submissions";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service returned status {0}")]
    Status(u16),

    #[error("Response decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Schema rejected: {0}")]
    Schema(#[from] SchemaError),
}

pub struct PortalClient {
    http: Client,
    base_url: String,
}

impl PortalClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Fetch the available form schemas. Every schema is structurally
    /// checked before it is handed out; one malformed schema fails the
    /// whole fetch rather than leaking a partially usable list.
    pub fn get_forms(&self) -> Result<Vec<FormSchema>, ClientError> {
        let body = self.get_text(FORMS_PATH)?;
        let schemas: Vec<FormSchema> = serde_json::from_str(&body)?;
        for schema in &schemas {
            schema.check()?;
        }
        log::debug!("fetched {} form schema(s)", schemas.len());
        Ok(schemas)
    }

    /// Submit a completed (or draft-flagged) application.
    pub fn submit_form(&self, request: &SubmitRequest) -> Result<FormSubmission, ClientError> {
        let response = self.http.post(self.url(SUBMIT_PATH)).json(request).send()?;
        let body = Self::read_ok(response)?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch past submissions plus their runtime-discovered column set.
    pub fn get_submissions(&self) -> Result<SubmissionsPage, ClientError> {
        let body = self.get_text(SUBMISSIONS_PATH)?;
        Ok(serde_json::from_str(&body)?)
    }

    fn get_text(&self, path: &str) -> Result<String, ClientError> {
        let response = self.http.get(self.url(path)).send()?;
        Self::read_ok(response)
    }

    fn read_ok(response: Response) -> Result<String, ClientError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }
        Ok(response.text()?)
    }
}

impl SubmissionSink for PortalClient {
    fn submit_form(&self, request: &SubmitRequest) -> Result<FormSubmission, SinkError> {
        PortalClient::submit_form(self, request).map_err(|e| {
            log::error!("submission to {} failed: {}", self.base_url, e);
            SinkError::new(e.to_string())
        })
    }
}
