//! Pagination of query results.
//!
//! [`Collection::page`](crate::collection::Collection::page) turns a [`PaginationParams`] into a
//! `LIMIT offset, count` window and asks the server for the number of rows the query would have
//! produced without it, so a [`Page`] always knows its neighbours.

use serde::{Deserialize, Serialize};

/// A single page of query results.
///
/// # Example
///
/// ```ignore
/// let page = users.page(&query, PaginationParams::new(2, 10)).await?;
///
/// assert_eq!(page.previous_page, Some(1));
/// for user in &page.items {
///     println!("{}", user.handle());
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items contained in this page.
    pub items: Vec<T>,
    /// Total number of matching rows across all pages.
    pub count: u64,
    /// The next page number, if more rows exist.
    pub next_page: Option<u64>,
    /// The previous page number, unless this is the first page.
    pub previous_page: Option<u64>,
}

impl<T> Page<T> {
    /// Assembles a page from the rows of one window and the total row count.
    pub fn new(items: Vec<T>, params: &PaginationParams, count: u64) -> Self {
        let end = params.offset().saturating_add(items.len() as u64);
        let page = params.page();

        Self {
            items,
            count,
            next_page: (end < count).then(|| page + 1),
            previous_page: (page > 1).then(|| page - 1),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            count: self.count,
            next_page: self.next_page,
            previous_page: self.previous_page,
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }
}

/// Which page to retrieve and how many items it holds.
///
/// Pages are 1-indexed; page `0` is treated as page `1`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct PaginationParams {
    pub page: u64,
    pub per_page: u64,
}

impl PaginationParams {
    /// # Arguments
    ///
    /// * `page` - The page number (1-indexed)
    /// * `per_page` - Number of items per page
    pub fn new(page: u64, per_page: u64) -> Self {
        Self { page, per_page }
    }

    /// The effective page number.
    pub fn page(&self) -> u64 {
        self.page.max(1)
    }

    /// Number of rows to skip before this page.
    ///
    /// ```ignore
    /// assert_eq!(PaginationParams::new(3, 20).offset(), 40);
    /// ```
    pub fn offset(&self) -> u64 {
        (self.page() - 1).saturating_mul(self.per_page)
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 10 }
    }
}
