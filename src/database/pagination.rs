use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

// Keeps `offset()` inside i64 for any clamped limit.
const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// Page-number pagination as requested through `?page=&limit=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Page {
    /// Clamps out of range values instead of rejecting them.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Fields are public, so the product can still be out of range for hand-built pages.
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit.max(0))
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub rows: Vec<T>,
    pub total_rows: i64,
    pub page: i64,
    pub page_count: i64,
    pub next_page: Option<i64>,
    pub prev_page: Option<i64>,
    pub message: Option<String>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, page: Page) -> Self {
        if rows.is_empty() {
            return Self::no_rows(total_rows, page);
        }
        let page_count = (total_rows + page.limit - 1) / page.limit;

        let next_page = (page.page < page_count).then_some(page.page + 1);
        let prev_page = (page.page > 1).then_some((page.page - 1).min(page_count));

        Self {
            message: Some(format!(
                "{} - {} / {}",
                page.offset() + 1,
                (page.offset() + rows.len() as i64).min(total_rows),
                total_rows
            )),
            rows,
            total_rows,
            page: page.page,
            page_count,
            next_page,
            prev_page,
        }
    }

    /// An empty page. `total_rows` can be non-zero when the requested page is past the end.
    pub fn no_rows(total_rows: i64, page: Page) -> Self {
        let page_count = (total_rows + page.limit - 1) / page.limit;

        Self {
            rows: vec![],
            total_rows,
            page: page.page,
            page_count,
            next_page: None,
            prev_page: (page_count > 0).then_some(page_count),
            message: Some(String::from("No results")),
        }
    }
}
