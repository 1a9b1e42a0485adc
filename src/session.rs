//! Portal Session - Explicit App State
//!
//! One constructed object holds the fetched schema list, the selected
//! form, and the submissions table. It is passed to whoever needs it;
//! nothing here is a global. Fetches are epoch-guarded: a response that
//! arrives after a newer fetch began is discarded, never applied to
//! stale state.

use crate::schema::{FormId, FormSchema};
use crate::table::{SubmissionTable, SubmissionsPage};

/// Opaque token tying a fetch to the state it may update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadToken(u64);

#[derive(Default)]
pub struct PortalSession {
    schemas: Vec<FormSchema>,
    selected_form_id: Option<FormId>,
    schema_epoch: u64,
    submissions: Option<SubmissionTable>,
    submissions_epoch: u64,
}

impl PortalSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of a schema fetch. Starting a newer fetch
    /// invalidates every token handed out before it.
    pub fn begin_schema_load(&mut self) -> LoadToken {
        self.schema_epoch += 1;
        LoadToken(self.schema_epoch)
    }

    /// Apply a fetched schema list. Returns false (and changes nothing)
    /// when the token is stale. The first schema is auto-selected when
    /// the current selection is absent or no longer exists.
    pub fn apply_schemas(&mut self, token: LoadToken, schemas: Vec<FormSchema>) -> bool {
        if token.0 != self.schema_epoch {
            log::debug!("discarding stale schema fetch (epoch {})", token.0);
            return false;
        }
        self.schemas = schemas;
        let selection_gone = self
            .selected_form_id
            .as_ref()
            .map_or(true, |id| self.form_by_id(id).is_none());
        if selection_gone {
            self.selected_form_id = self.schemas.first().map(|s| s.id.clone());
        }
        true
    }

    pub fn schemas(&self) -> &[FormSchema] {
        &self.schemas
    }

    pub fn form_by_id(&self, id: &str) -> Option<&FormSchema> {
        self.schemas.iter().find(|s| s.id == id)
    }

    pub fn select_form(&mut self, id: impl Into<FormId>) {
        self.selected_form_id = Some(id.into());
    }

    pub fn selected_form(&self) -> Option<&FormSchema> {
        self.selected_form_id
            .as_deref()
            .and_then(|id| self.form_by_id(id))
    }

    /// Mark the start of a submissions fetch.
    pub fn begin_submissions_load(&mut self) -> LoadToken {
        self.submissions_epoch += 1;
        LoadToken(self.submissions_epoch)
    }

    /// Apply a fetched submissions page, replacing the table. Stale
    /// tokens are discarded.
    pub fn apply_submissions(&mut self, token: LoadToken, page: SubmissionsPage) -> bool {
        if token.0 != self.submissions_epoch {
            log::debug!("discarding stale submissions fetch (epoch {})", token.0);
            return false;
        }
        self.submissions = Some(SubmissionTable::new(page));
        true
    }

    pub fn submissions(&self) -> Option<&SubmissionTable> {
        self.submissions.as_ref()
    }

    pub fn submissions_mut(&mut self) -> Option<&mut SubmissionTable> {
        self.submissions.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FormSection;

    fn schema(id: &str) -> FormSchema {
        FormSchema {
            id: id.to_string(),
            title: id.to_uppercase(),
            description: String::new(),
            sections: vec![FormSection {
                id: "main".to_string(),
                title: "Main".to_string(),
                fields: vec![],
            }],
        }
    }

    #[test]
    fn first_schema_is_auto_selected() {
        let mut session = PortalSession::new();
        let token = session.begin_schema_load();
        assert!(session.apply_schemas(token, vec![schema("auto"), schema("home")]));
        assert_eq!(session.selected_form().unwrap().id, "auto");
    }

    #[test]
    fn explicit_selection_survives_refresh() {
        let mut session = PortalSession::new();
        let token = session.begin_schema_load();
        session.apply_schemas(token, vec![schema("auto"), schema("home")]);
        session.select_form("home");

        let token = session.begin_schema_load();
        session.apply_schemas(token, vec![schema("auto"), schema("home")]);
        assert_eq!(session.selected_form().unwrap().id, "home");
    }

    #[test]
    fn stale_schema_fetch_is_discarded() {
        let mut session = PortalSession::new();
        let stale = session.begin_schema_load();
        let fresh = session.begin_schema_load();

        assert!(!session.apply_schemas(stale, vec![schema("stale")]));
        assert!(session.schemas().is_empty());

        assert!(session.apply_schemas(fresh, vec![schema("fresh")]));
        assert_eq!(session.selected_form().unwrap().id, "fresh");
    }

    #[test]
    fn stale_submissions_fetch_is_discarded() {
        let mut session = PortalSession::new();
        let stale = session.begin_submissions_load();
        let fresh = session.begin_submissions_load();

        let empty = || SubmissionsPage {
            columns: vec![],
            data: vec![],
        };
        assert!(!session.apply_submissions(stale, empty()));
        assert!(session.submissions().is_none());
        assert!(session.apply_submissions(fresh, empty()));
        assert!(session.submissions().is_some());
    }
}
