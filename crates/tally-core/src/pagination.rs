//! # Pagination
//!
//! Page/limit normalisation for list endpoints and the page envelope they
//! return.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

/// Requested page. Missing or out-of-range values fall back to defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        PageRequest {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// 1-based page number, at least 1.
    pub fn page(&self) -> u32 {
        self.page.filter(|p| *p >= 1).unwrap_or(1)
    }

    /// Page size in `1..=MAX_PAGE_LIMIT`, default [`DEFAULT_PAGE_LIMIT`].
    pub fn limit(&self) -> u32 {
        match self.limit {
            Some(0) | None => DEFAULT_PAGE_LIMIT,
            Some(l) => l.min(MAX_PAGE_LIMIT),
        }
    }

    /// Row offset for SQL `OFFSET`.
    pub fn offset(&self) -> i64 {
        (i64::from(self.page()) - 1) * i64::from(self.limit())
    }
}

/// Pagination block of a list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    /// `total_pages = ceil(total / limit)`.
    pub fn new(request: &PageRequest, total: i64) -> Self {
        let limit = request.limit();
        let total = total.max(0);
        Pagination {
            page: request.page(),
            limit,
            total,
            total_pages: (total + i64::from(limit) - 1) / i64::from(limit),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: &PageRequest, total: i64) -> Self {
        Page {
            items,
            pagination: Pagination::new(request, total),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
