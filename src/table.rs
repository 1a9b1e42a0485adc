//! Submissions Table - Client-Side Projection
//!
//! Filters, sorts, paginates, and projects an in-memory record set.
//! Search and sort always run over the full column set; the visible-column
//! selection changes only which cells are projected.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

pub const PAGE_SIZE: usize = 10;

/// One submitted application as returned by the service: an id plus an
/// open set of field values. The column set is discovered at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSubmission {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl FormSubmission {
    /// Cell lookup by column name. `id` lives outside the open field map.
    pub fn cell(&self, column: &str) -> Option<Value> {
        if column == "id" {
            Some(Value::String(self.id.clone()))
        } else {
            self.fields.get(column).cloned()
        }
    }
}

/// The `GET /forms/submissions` response shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionsPage {
    pub columns: Vec<String>,
    pub data: Vec<FormSubmission>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SortConfig {
    pub key: Option<String>,
    pub direction: SortDirection,
}

/// Projected snapshot of the current table state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableView {
    pub rows: Vec<TableRow>,
    pub page: usize,
    pub page_count: usize,
    pub total: usize,
    pub visible_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableRow {
    pub id: String,
    pub cells: Map<String, Value>,
}

/// In-memory table over one fetched record set. All state is ephemeral
/// and client-side; nothing here is persisted.
#[derive(Debug, Clone)]
pub struct SubmissionTable {
    columns: Vec<String>,
    records: Vec<FormSubmission>,
    visible_columns: Vec<String>,
    sort: SortConfig,
    query: String,
    page: usize,
}

impl SubmissionTable {
    pub fn new(page: SubmissionsPage) -> Self {
        Self {
            visible_columns: page.columns.clone(),
            columns: page.columns,
            records: page.data,
            sort: SortConfig::default(),
            query: String::new(),
            page: 1,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn visible_columns(&self) -> &[String] {
        &self.visible_columns
    }

    pub fn sort(&self) -> &SortConfig {
        &self.sort
    }

    pub fn page(&self) -> usize {
        self.effective_page()
    }

    /// Set the search query. Any change snaps back to the first page so a
    /// narrowed result set is never viewed through a stale page index.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.page = 1;
    }

    /// Toggle sorting: the active column flips asc to desc and back, a new
    /// column starts ascending.
    pub fn toggle_sort(&mut self, column: &str) {
        let direction = match (&self.sort.key, self.sort.direction) {
            (Some(key), SortDirection::Asc) if key == column => SortDirection::Desc,
            _ => SortDirection::Asc,
        };
        self.sort = SortConfig {
            key: Some(column.to_string()),
            direction,
        };
    }

    /// Select a page (1-indexed). Out-of-range values clamp to the nearest
    /// valid page rather than showing a silently empty one.
    pub fn set_page(&mut self, page: usize) {
        let last = self.page_count().max(1);
        self.page = page.clamp(1, last);
    }

    /// Restrict projection to a subset of the available columns. Unknown
    /// names are dropped; filtering and sorting scope is unaffected.
    pub fn set_visible_columns(&mut self, columns: Vec<String>) {
        self.visible_columns = columns
            .into_iter()
            .filter(|c| self.columns.iter().any(|known| known == c))
            .collect();
    }

    pub fn page_count(&self) -> usize {
        let total = self.filtered().len();
        (total + PAGE_SIZE - 1) / PAGE_SIZE
    }

    /// Filtered + sorted + paginated + projected rows.
    pub fn view(&self) -> TableView {
        let mut matches = self.filtered();

        if let Some(key) = &self.sort.key {
            matches.sort_by(|a, b| {
                let ordering = cmp_cells(a.cell(key).as_ref(), b.cell(key).as_ref());
                match self.sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        let total = matches.len();
        let page_count = (total + PAGE_SIZE - 1) / PAGE_SIZE;
        let page = self.effective_page();
        let start = (page - 1) * PAGE_SIZE;

        let rows = matches
            .into_iter()
            .skip(start)
            .take(PAGE_SIZE)
            .map(|record| TableRow {
                id: record.id.clone(),
                cells: self
                    .visible_columns
                    .iter()
                    .map(|col| (col.clone(), record.cell(col).unwrap_or(Value::Null)))
                    .collect(),
            })
            .collect();

        TableView {
            rows,
            page,
            page_count,
            total,
            visible_columns: self.visible_columns.clone(),
        }
    }

    fn effective_page(&self) -> usize {
        self.page.clamp(1, self.page_count().max(1))
    }

    /// Case-insensitive substring match against every field value except
    /// `id` (the id never lands in the open field map), across all
    /// columns, visible or not.
    fn filtered(&self) -> Vec<&FormSubmission> {
        if self.query.is_empty() {
            return self.records.iter().collect();
        }
        let needle = self.query.to_lowercase();
        self.records
            .iter()
            .filter(|record| {
                record
                    .fields
                    .values()
                    .any(|value| render_value(value).to_lowercase().contains(&needle))
            })
            .collect()
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Three-way comparison on raw cell values: numbers numerically, strings
/// lexicographically, otherwise by kind rank so mixed columns still order
/// deterministically. Missing cells sort first.
fn cmp_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => cmp_values(a, b),
    }
}

fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64(), y.as_f64());
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, name: &str, age: i64) -> FormSubmission {
        let mut fields = Map::new();
        fields.insert("name".to_string(), json!(name));
        fields.insert("age".to_string(), json!(age));
        FormSubmission {
            id: id.to_string(),
            fields,
        }
    }

    fn table(records: Vec<FormSubmission>) -> SubmissionTable {
        SubmissionTable::new(SubmissionsPage {
            columns: vec!["id".to_string(), "name".to_string(), "age".to_string()],
            data: records,
        })
    }

    #[test]
    fn empty_query_matches_everything() {
        let t = table(vec![record("1", "Jane", 30), record("2", "Omar", 41)]);
        assert_eq!(t.view().total, 2);
    }

    #[test]
    fn search_is_case_insensitive_and_any_field() {
        let mut t = table(vec![record("1", "Jane", 30), record("2", "Omar", 41)]);
        t.set_query("JANE");
        assert_eq!(t.view().total, 1);
        t.set_query("41");
        assert_eq!(t.view().total, 1);
    }

    #[test]
    fn id_is_excluded_from_search() {
        let mut t = table(vec![record("match-me", "Jane", 30)]);
        t.set_query("match-me");
        assert_eq!(t.view().total, 0);
    }

    #[test]
    fn toggle_cycles_asc_desc_asc_and_new_column_resets() {
        let mut t = table(vec![record("1", "Jane", 30)]);
        t.toggle_sort("name");
        assert_eq!(t.sort().direction, SortDirection::Asc);
        t.toggle_sort("name");
        assert_eq!(t.sort().direction, SortDirection::Desc);
        t.toggle_sort("name");
        assert_eq!(t.sort().direction, SortDirection::Asc);
        t.toggle_sort("name");
        t.toggle_sort("age");
        assert_eq!(t.sort().key.as_deref(), Some("age"));
        assert_eq!(t.sort().direction, SortDirection::Asc);
    }

    #[test]
    fn sort_orders_numbers_numerically() {
        let mut t = table(vec![
            record("1", "a", 100),
            record("2", "b", 9),
            record("3", "c", 30),
        ]);
        t.toggle_sort("age");
        let ages: Vec<i64> = t
            .view()
            .rows
            .iter()
            .map(|r| r.cells["age"].as_i64().unwrap())
            .collect();
        assert_eq!(ages, vec![9, 30, 100]);
    }

    #[test]
    fn no_sort_key_keeps_fetch_order() {
        let t = table(vec![record("2", "b", 2), record("1", "a", 1)]);
        let view = t.view();
        let ids: Vec<&str> = view.rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[test]
    fn projection_does_not_change_filter_scope() {
        let mut t = table(vec![record("1", "Jane", 30)]);
        t.set_visible_columns(vec!["name".to_string()]);
        t.set_query("30");
        // age is hidden but still searched
        assert_eq!(t.view().total, 1);
        assert_eq!(t.view().rows[0].cells.len(), 1);
        assert!(t.view().rows[0].cells.contains_key("name"));
    }

    #[test]
    fn unknown_visible_columns_are_dropped() {
        let mut t = table(vec![record("1", "Jane", 30)]);
        t.set_visible_columns(vec!["name".to_string(), "ghost".to_string()]);
        assert_eq!(t.visible_columns(), ["name".to_string()]);
    }

    #[test]
    fn out_of_range_page_clamps() {
        let mut t = table((0..25).map(|i| record(&i.to_string(), "x", i)).collect());
        t.set_page(99);
        assert_eq!(t.page(), 3);
        t.set_page(0);
        assert_eq!(t.page(), 1);
    }
}
