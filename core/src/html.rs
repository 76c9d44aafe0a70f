//! HTML backend for table and chart views.
//!
//! All cell text and labels are escaped. Page buttons carry their target in
//! `data-page`; binding a click handler to it is up to the hosting page.

use std::fmt;

use crate::chart::ChartView;
use crate::table::{Pagination, Table, TableView};

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

pub fn table(view: &TableView) -> String {
    match view {
        TableView::Empty { message } => {
            format!("<div class=\"no-data\">{}</div>", escape(message))
        }
        TableView::Table(table) => TableMarkup(table).to_string(),
    }
}

struct TableMarkup<'a>(&'a Table);

impl fmt::Display for TableMarkup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.0;
        f.write_str("<div class=\"table-container\"><table class=\"data-table\"><thead><tr>")?;
        for header in &table.headers {
            write!(f, "<th>{}</th>", escape(header))?;
        }
        f.write_str("</tr></thead><tbody>")?;
        for row in &table.rows {
            f.write_str("<tr>")?;
            for cell in &row.cells {
                write!(
                    f,
                    "<td data-label=\"{}\">{}</td>",
                    escape(&cell.label),
                    escape(&cell.text)
                )?;
            }
            f.write_str("</tr>")?;
        }
        f.write_str("</tbody></table>")?;
        if let Some(pagination) = &table.pagination {
            write!(f, "{}", PaginationMarkup(pagination))?;
        }
        f.write_str("</div>")
    }
}

struct PaginationMarkup<'a>(&'a Pagination);

impl fmt::Display for PaginationMarkup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<div class=\"pagination\">")?;
        for control in &self.0.controls {
            let class = if control.active {
                "page-btn active"
            } else {
                "page-btn"
            };
            write!(
                f,
                "<button class=\"{class}\" data-page=\"{page}\">{page}</button>",
                page = control.page
            )?;
        }
        f.write_str("</div>")
    }
}

/// Canvas plus the inline config the page's chart script picks up.
pub fn chart(view: &ChartView) -> String {
    let config = view.config.to_string().replace("</", "<\\/");
    format!(
        "<canvas id=\"{id}\" width=\"{w}\" height=\"{h}\"></canvas>\
         <script type=\"application/json\" data-chart-for=\"{id}\">{config}</script>",
        id = escape(&view.element_id),
        w = view.width,
        h = view.height,
    )
}
