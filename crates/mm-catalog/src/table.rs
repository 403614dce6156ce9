//! Markdown rendering of search results
//!
//! Author: hephaex@gmail.com

use crate::projection::DisplayRow;

/// Column headers, in display order
pub const COLUMNS: [&str; 8] = [
    "Year",
    "Title",
    "Genre",
    "Director",
    "Nationality",
    "Synopsis",
    "Similarity Score",
    "Wikipedia Link",
];

/// Results table with 1-based row numbers
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    rows: Vec<Vec<String>>,
    synopsis_width: Option<usize>,
}

impl ResultTable {
    pub fn new(rows: &[DisplayRow]) -> Self {
        Self {
            rows: rows.iter().map(cells).collect(),
            synopsis_width: None,
        }
    }

    /// Truncate synopses to at most `width` characters
    pub fn with_synopsis_width(mut self, width: usize) -> Self {
        self.synopsis_width = Some(width);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Convert to markdown format
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str("| # |");
        for h in COLUMNS {
            md.push_str(&format!(" {h} |"));
        }
        md.push('\n');

        md.push_str("| --- |");
        for _ in COLUMNS {
            md.push_str(" --- |");
        }
        md.push('\n');

        for (n, row) in self.rows.iter().enumerate() {
            md.push_str(&format!("| {} |", n + 1));
            for (col, cell) in row.iter().enumerate() {
                let cell = match self.synopsis_width {
                    Some(width) if COLUMNS[col] == "Synopsis" => truncate(cell, width),
                    _ => cell.clone(),
                };
                md.push_str(&format!(" {} |", escape(&cell)));
            }
            md.push('\n');
        }

        md
    }
}

fn cells(row: &DisplayRow) -> Vec<String> {
    vec![
        row.year.to_string(),
        row.title.clone(),
        row.genre.clone(),
        row.director.clone(),
        row.nationality.clone(),
        row.synopsis.clone(),
        row.score.to_string(),
        row.wiki_url.clone(),
    ]
}

/// Keep a cell on one line and out of the column separators
fn escape(cell: &str) -> String {
    cell.replace('|', "\\|")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
