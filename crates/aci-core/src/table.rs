// Table view over portal collections
//
// Rows expose their columns as strings through TableRow. The view applies,
// in order: global filter, column filters, sort, pagination.

use std::cmp::Ordering;

use crate::app::{App, AppConfig};
use crate::function::AppFunction;
use crate::linked_account::LinkedAccount;

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// A row that can be rendered in a table
pub trait TableRow {
    /// Column names in display order
    const COLUMNS: &'static [&'static str];

    /// Cell text for `column`; unknown columns are empty
    fn cell(&self, column: &str) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

/// Filtered, sorted and paginated view of a row set
#[derive(Debug, Clone)]
pub struct TableView<T> {
    rows: Vec<T>,
    global_filter: Option<String>,
    column_filters: Vec<(String, String)>,
    sort: Option<SortSpec>,
    page_size: usize,
    /// 1-based
    page: usize,
}

impl<T: TableRow> TableView<T> {
    pub fn new(rows: Vec<T>) -> Self {
        Self {
            rows,
            global_filter: None,
            column_filters: Vec::new(),
            sort: None,
            page_size: DEFAULT_PAGE_SIZE,
            page: 1,
        }
    }

    /// Match rows where any column contains `filter`, ignoring case
    pub fn with_global_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        self.global_filter = (!filter.is_empty()).then(|| filter.to_lowercase());
        self
    }

    /// Match rows where `column` contains `value`, ignoring case
    pub fn with_column_filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.column_filters
            .push((column.into(), value.into().to_lowercase()));
        self
    }

    pub fn sort_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(SortSpec {
            column: column.into(),
            direction,
        });
        self
    }

    /// Rows per page; zero is treated as one
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Select a 1-based page. Out-of-range pages clamp when read.
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn columns(&self) -> &'static [&'static str] {
        T::COLUMNS
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn matches(&self, row: &T) -> bool {
        if let Some(filter) = &self.global_filter {
            let hit = T::COLUMNS
                .iter()
                .any(|c| row.cell(c).to_lowercase().contains(filter.as_str()));
            if !hit {
                return false;
            }
        }
        self.column_filters
            .iter()
            .all(|(column, value)| row.cell(column).to_lowercase().contains(value.as_str()))
    }

    /// All rows passing the filters, in sort order
    pub fn filtered_rows(&self) -> Vec<&T> {
        let mut rows: Vec<&T> = self.rows.iter().filter(|r| self.matches(r)).collect();
        if let Some(sort) = &self.sort {
            // sort_by is stable, so equal cells keep their input order
            rows.sort_by(|a, b| {
                let ordering = compare_cells(&a.cell(&sort.column), &b.cell(&sort.column));
                match sort.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }
        rows
    }

    pub fn total_rows(&self) -> usize {
        self.rows.iter().filter(|r| self.matches(r)).count()
    }

    /// Number of pages, never less than one
    pub fn page_count(&self) -> usize {
        self.total_rows().div_ceil(self.page_size).max(1)
    }

    /// The selected page clamped to `1..=page_count`
    pub fn current_page(&self) -> usize {
        self.page.clamp(1, self.page_count())
    }

    pub fn page_rows(&self) -> Vec<&T> {
        let start = (self.current_page() - 1) * self.page_size;
        self.filtered_rows()
            .into_iter()
            .skip(start)
            .take(self.page_size)
            .collect()
    }

    /// Cell text of the current page
    pub fn page_cells(&self) -> Vec<Vec<String>> {
        self.page_rows()
            .into_iter()
            .map(|row| T::COLUMNS.iter().map(|c| row.cell(c)).collect())
            .collect()
    }
}

/// Numbers compare numerically, everything else case-insensitively
fn compare_cells(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

// ============================================================================
// Portal rows
// ============================================================================

impl TableRow for App {
    const COLUMNS: &'static [&'static str] = &["name", "display_name", "provider", "categories", "active"];

    fn cell(&self, column: &str) -> String {
        match column {
            "name" => self.name.clone(),
            "display_name" => self.label().to_string(),
            "provider" => self.provider.clone(),
            "categories" => self.categories.join(", "),
            "active" => self.active.to_string(),
            _ => String::new(),
        }
    }
}

impl TableRow for AppConfig {
    const COLUMNS: &'static [&'static str] = &["app_name", "security_scheme", "enabled", "all_functions_enabled"];

    fn cell(&self, column: &str) -> String {
        match column {
            "app_name" => self.app_name.clone(),
            "security_scheme" => self.security_scheme.as_str().to_string(),
            "enabled" => self.enabled.to_string(),
            "all_functions_enabled" => self.all_functions_enabled.to_string(),
            _ => String::new(),
        }
    }
}

impl TableRow for LinkedAccount {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "app_name",
        "linked_account_owner_id",
        "security_scheme",
        "enabled",
        "last_used_at",
    ];

    fn cell(&self, column: &str) -> String {
        match column {
            "id" => self.id.clone(),
            "app_name" => self.app_name.clone(),
            "linked_account_owner_id" => self.linked_account_owner_id.clone(),
            "security_scheme" => self.security_scheme.as_str().to_string(),
            "enabled" => self.enabled.to_string(),
            "last_used_at" => self.last_used_at.clone().unwrap_or_default(),
            _ => String::new(),
        }
    }
}

impl TableRow for AppFunction {
    const COLUMNS: &'static [&'static str] = &["name", "description"];

    fn cell(&self, column: &str) -> String {
        match column {
            "name" => self.name.clone(),
            "description" => self.description.clone(),
            _ => String::new(),
        }
    }
}
