//! Page windows without a count query.
//!
//! A page of size `n` is fetched as `n + 1` rows; the extra row only tells
//! whether a next page exists and is trimmed before the page is returned.

use serde::Serialize;

/// Default page size.
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Page size bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSettings {
    pub default_size: u32,
    pub max_size: u32,
}

impl PageSettings {
    /// Bounds for a default page size; the maximum is three times the
    /// default.
    pub fn new(default_size: u32) -> Self {
        let default_size = default_size.max(1);
        Self {
            default_size,
            max_size: default_size.saturating_mul(3),
        }
    }

    /// Override the maximum; it never drops below the default size.
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size.max(self.default_size);
        self
    }
}

impl Default for PageSettings {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    /// 1-based page number
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// Normalise raw request parameters.
    ///
    /// A missing or zero page becomes 1. A missing page size uses the
    /// default; any size is clamped into `[1, max_size]`.
    pub fn new(page: Option<u32>, per_page: Option<u32>, settings: &PageSettings) -> Self {
        let page = page.unwrap_or(1).max(1);
        let per_page = per_page
            .unwrap_or(settings.default_size)
            .clamp(1, settings.max_size.max(1));
        Self { page, per_page }
    }

    /// Rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    /// Rows to fetch: one more than the page size.
    pub fn fetch_limit(&self) -> u32 {
        self.per_page.saturating_add(1)
    }
}

/// One page of results with navigation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub has_next: bool,
    pub has_prev: bool,
    pub next_page: Option<u32>,
    pub prev_page: Option<u32>,
}

impl<T> Page<T> {
    /// Build a page from up to `fetch_limit()` rows.
    pub fn from_rows(request: PageRequest, mut rows: Vec<T>) -> Self {
        let per_page = request.per_page as usize;
        let has_next = rows.len() > per_page;
        rows.truncate(per_page);

        let has_prev = request.page > 1;
        Self {
            items: rows,
            page: request.page,
            per_page: request.per_page,
            has_next,
            has_prev,
            next_page: has_next.then(|| request.page + 1),
            prev_page: has_prev.then(|| request.page - 1),
        }
    }

    /// Same navigation metadata over different items.
    pub fn with_items<U>(self, items: Vec<U>) -> Page<U> {
        Page {
            items,
            page: self.page,
            per_page: self.per_page,
            has_next: self.has_next,
            has_prev: self.has_prev,
            next_page: self.next_page,
            prev_page: self.prev_page,
        }
    }
}
