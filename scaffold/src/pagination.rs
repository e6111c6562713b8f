//! Page tracking for paginated scaffolds.
//!
//! The server tells the client how many pages exist through response headers:
//!
//! - `X-Total-Pages: N` gives the last page directly.
//! - `X-Total-Count: C` gives the record count; combined with a configured
//!   `limit` it yields `ceil(C / limit)` pages.
//!
//! When neither signal can be used the known pages are left as they were.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScaffoldError};
use crate::http::HttpResponse;

pub const TOTAL_PAGES_HEADER: &str = "x-total-pages";
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// The `paginate` registration option: `true`/`false` or `{ limit: N }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Paginate {
    Enabled(bool),
    Sized { limit: u32 },
}

impl Default for Paginate {
    fn default() -> Self {
        Paginate::Enabled(false)
    }
}

impl From<bool> for Paginate {
    fn from(enabled: bool) -> Self {
        Paginate::Enabled(enabled)
    }
}

impl Paginate {
    pub fn limit(limit: u32) -> Self {
        Paginate::Sized { limit }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Paginate::Enabled(false))
    }

    /// Initial pagination state, or `None` when pagination is off.
    pub fn initial_state(&self) -> Option<PaginationState> {
        match *self {
            Paginate::Enabled(false) => None,
            Paginate::Enabled(true) => Some(PaginationState::new(None)),
            Paginate::Sized { limit } => Some(PaginationState::new(Some(limit))),
        }
    }
}

/// Pagination parameters appended to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub limit: Option<u32>,
    pub page: u32,
}

/// How many pages a response says exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSignal {
    TotalPages(u32),
    TotalCount(u64),
}

impl PageSignal {
    /// Read the signal from response headers. Unparsable values count as absent.
    pub fn from_response(response: &HttpResponse) -> Option<Self> {
        if let Some(pages) = response
            .header(TOTAL_PAGES_HEADER)
            .and_then(|v| v.trim().parse().ok())
        {
            return Some(PageSignal::TotalPages(pages));
        }
        response
            .header(TOTAL_COUNT_HEADER)
            .and_then(|v| v.trim().parse().ok())
            .map(PageSignal::TotalCount)
    }

    /// The last page number this signal implies for the given page size.
    pub fn last_page(&self, limit: Option<u32>) -> Option<u32> {
        match *self {
            PageSignal::TotalPages(pages) => Some(pages),
            PageSignal::TotalCount(count) => {
                let limit = u64::from(limit.filter(|l| *l > 0)?);
                u32::try_from(count.div_ceil(limit)).ok()
            }
        }
    }
}

/// Page size, current page and known pages of a paginated scaffold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationState {
    limit: Option<u32>,
    current: u32,
    pages: Vec<u32>,
}

impl PaginationState {
    pub fn new(limit: Option<u32>) -> Self {
        Self {
            limit,
            current: 1,
            pages: Vec::new(),
        }
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn pages(&self) -> &[u32] {
        &self.pages
    }

    pub fn set_current(&mut self, page: u32) -> Result<()> {
        if page == 0 {
            return Err(ScaffoldError::InvalidPage(page));
        }
        self.current = page;
        Ok(())
    }

    pub fn params(&self) -> PageParams {
        PageParams {
            limit: self.limit,
            page: self.current,
        }
    }

    /// Recompute `pages` from a response signal. Returns whether anything changed.
    pub fn apply(&mut self, signal: Option<PageSignal>) -> bool {
        let Some(last) = signal.and_then(|s| s.last_page(self.limit)) else {
            tracing::debug!(?signal, "No usable page signal; keeping known pages");
            return false;
        };
        let pages: Vec<u32> = (1..=last).collect();
        let changed = pages != self.pages;
        self.pages = pages;
        changed
    }
}
