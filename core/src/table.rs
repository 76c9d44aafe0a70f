//! Paginated table view-model.
//!
//! # Design
//! `render_table` turns records plus column specs into a `TableView`: plain
//! rows of already-formatted cell text and, when paginating, one page control
//! per page. It does no I/O and knows nothing about markup; `crate::html`
//! turns a `TableView` into HTML, and other front ends can walk the same
//! structure.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

/// One row of backend data, keyed by field name.
pub type Record = Map<String, Value>;

/// Maps a field's raw value (absent when the record lacks the key) to the
/// text shown in the cell.
pub type Formatter = Arc<dyn Fn(Option<&Value>) -> String + Send + Sync>;

pub const NO_DATA: &str = "No hay datos disponibles";
pub const PLACEHOLDER: &str = "-";
pub const DEFAULT_PER_PAGE: usize = 10;

/// Column description: which record key, what header, how to format.
#[derive(Clone)]
pub struct FieldSpec {
    pub key: String,
    pub label: String,
    formatter: Option<Formatter>,
}

impl FieldSpec {
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            formatter: None,
        }
    }

    pub fn with_formatter(
        mut self,
        formatter: impl Fn(Option<&Value>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    /// Cell text for `record`: the formatter's output if there is one,
    /// otherwise the raw value or the placeholder.
    pub fn render(&self, record: &Record) -> String {
        let value = record.get(&self.key);
        match &self.formatter {
            Some(format) => format(value),
            None => display_value(value),
        }
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("formatter", &self.formatter.is_some())
            .finish()
    }
}

/// Absent, `null`, `false`, `0` and `""` render as nothing.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Raw cell text: strings unquoted, other values as JSON, blanks as `-`.
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None => PLACEHOLDER.to_string(),
        Some(v) if is_blank(v) => PLACEHOLDER.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(v) => v.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub pagination: bool,
    /// 1-based; 0 is read as 1.
    pub page: usize,
    /// 0 is read as 1.
    pub per_page: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            pagination: false,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl RenderOptions {
    pub fn paginated(page: usize, per_page: usize) -> Self {
        Self {
            pagination: true,
            page,
            per_page,
        }
    }

    fn page(&self) -> usize {
        self.page.max(1)
    }

    fn per_page(&self) -> usize {
        self.per_page.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableView {
    /// No records at all: show the message instead of a table.
    Empty { message: String },
    Table(Table),
}

impl TableView {
    pub fn is_empty(&self) -> bool {
        matches!(self, TableView::Empty { .. })
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            TableView::Table(table) => Some(table),
            TableView::Empty { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Column header, repeated per cell for stacked mobile layouts.
    pub label: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub controls: Vec<PageControl>,
}

impl Pagination {
    pub fn page_count(&self) -> usize {
        self.controls.len()
    }

    pub fn active_page(&self) -> Option<usize> {
        self.controls.iter().find(|c| c.active).map(|c| c.page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageControl {
    pub page: usize,
    pub active: bool,
}

impl PageControl {
    /// What activating this control asks the caller to do.
    pub fn event(&self) -> PageChange {
        PageChange { page: self.page }
    }
}

/// Request to show another page, routed back to whoever owns the page state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageChange {
    pub page: usize,
}

pub fn page_count(total: usize, per_page: usize) -> usize {
    total.div_ceil(per_page.max(1))
}

pub fn render_table(records: &[Record], fields: &[FieldSpec], options: &RenderOptions) -> TableView {
    if records.is_empty() {
        return TableView::Empty {
            message: NO_DATA.to_string(),
        };
    }

    let visible: &[Record] = if options.pagination {
        let start = (options.page() - 1).saturating_mul(options.per_page());
        let end = start.saturating_add(options.per_page()).min(records.len());
        records.get(start..end).unwrap_or(&[])
    } else {
        records
    };

    let rows = visible
        .iter()
        .map(|record| Row {
            cells: fields
                .iter()
                .map(|field| Cell {
                    label: field.label.clone(),
                    text: field.render(record),
                })
                .collect(),
        })
        .collect();

    let pagination = (options.pagination && records.len() > options.per_page()).then(|| {
        let current = options.page();
        Pagination {
            controls: (1..=page_count(records.len(), options.per_page()))
                .map(|page| PageControl {
                    page,
                    active: page == current,
                })
                .collect(),
        }
    });

    TableView::Table(Table {
        headers: fields.iter().map(|f| f.label.clone()).collect(),
        rows,
        pagination,
    })
}
