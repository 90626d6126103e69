// Output formatting for CLI

use aci_core::table::{TableRow, TableView};
use anyhow::{Context, Result};
use serde::Serialize;

/// Widest a table column is allowed to grow
const MAX_COLUMN_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s {
            "json" => OutputFormat::Json,
            "yaml" => OutputFormat::Yaml,
            _ => OutputFormat::Text,
        }
    }

    /// Structured output; text output is handled by each command
    pub fn print_value<T: Serialize>(&self, value: &T) -> Result<()> {
        match self {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(value).context("Failed to encode JSON")?;
                println!("{}", json);
            }
            OutputFormat::Yaml => {
                let yaml = serde_yaml::to_string(value).context("Failed to encode YAML")?;
                print!("{}", yaml);
            }
            OutputFormat::Text => {}
        }
        Ok(())
    }

    pub fn is_text(&self) -> bool {
        matches!(self, OutputFormat::Text)
    }
}

/// Print a simple key-value pair for text output
pub fn print_field(label: &str, value: &str) {
    println!("{:<14} {}", format!("{}:", label), value);
}

/// Print a table header
pub fn print_table_header(columns: &[(&str, usize)]) {
    let header: String = columns
        .iter()
        .map(|(name, width)| format!("{:<width$}", name, width = width))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", header.trim_end());
}

/// Print a table row
pub fn print_table_row(values: &[(&str, usize)]) {
    let row: String = values
        .iter()
        .map(|(val, width)| format!("{:<width$}", truncate(val, *width), width = width))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", row.trim_end());
}

/// Cut `value` to `width` characters, marking the cut with "..."
pub fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    if width <= 3 {
        return value.chars().take(width).collect();
    }
    let kept: String = value.chars().take(width - 3).collect();
    format!("{}...", kept)
}

/// Column widths fitted to the header and the cells, capped
pub fn column_widths(columns: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(name.len()))
                .max()
                .unwrap_or(0)
                .min(MAX_COLUMN_WIDTH)
        })
        .collect()
}

/// Print the current page of a table view with a page footer
pub fn print_table<T: TableRow>(view: &TableView<T>, empty_message: &str) {
    if view.total_rows() == 0 {
        println!("{}", empty_message);
        return;
    }

    let columns = view.columns();
    let rows = view.page_cells();
    let widths = column_widths(columns, &rows);
    let headers: Vec<String> = columns.iter().map(|c| c.to_uppercase()).collect();

    print_table_header(
        &headers
            .iter()
            .zip(&widths)
            .map(|(name, width)| (name.as_str(), *width))
            .collect::<Vec<_>>(),
    );
    for row in &rows {
        print_table_row(
            &row.iter()
                .zip(&widths)
                .map(|(cell, width)| (cell.as_str(), *width))
                .collect::<Vec<_>>(),
        );
    }
    if view.page_count() > 1 {
        println!(
            "\nPage {} of {} ({} rows)",
            view.current_page(),
            view.page_count(),
            view.total_rows()
        );
    }
}
