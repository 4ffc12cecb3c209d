//! Case search and pagination without a reliable total count.
//!
//! The backend only tells us whether another page exists, so the
//! displayed total is either exact (`n`) or a lower bound (`n+`).
//! Every page change is a fresh round trip; unseen pages are never cached.

use std::fmt;

use chrono::{Months, NaiveDate};
use tracing::debug;

use crate::backend::{BackendError, Page, SearchQuery};
use crate::model::Case;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PagePhase {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed {
        message: String,
    },
}

/// Position in a paged result set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchCursor {
    /// 1-based
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
}

/// Identifies one issued page request. Only the latest ticket is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageTicket {
    pub seq: u64,
    pub page: u32,
    pub page_size: u32,
}

/// Result count shown to the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TotalEstimate {
    Exact(usize),
    AtLeast(usize),
}

impl TotalEstimate {
    pub fn count(&self) -> usize {
        match self {
            TotalEstimate::Exact(n) | TotalEstimate::AtLeast(n) => *n,
        }
    }
}

impl fmt::Display for TotalEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TotalEstimate::Exact(n) => write!(f, "{}", n),
            TotalEstimate::AtLeast(n) => write!(f, "{}+", n),
        }
    }
}

/// Page state for one paged listing.
#[derive(Clone, Debug)]
pub struct Paginator<T> {
    cursor: SearchCursor,
    items: Vec<T>,
    /// Row offset of `items`, from the page they were fetched for
    items_offset: usize,
    phase: PagePhase,
    latest: u64,
}

impl<T> Paginator<T> {
    pub fn new(page_size: u32) -> Self {
        Self {
            cursor: SearchCursor {
                page: 1,
                page_size: page_size.max(1),
                has_more: false,
            },
            items: Vec::new(),
            items_offset: 0,
            phase: PagePhase::Idle,
            latest: 0,
        }
    }

    pub fn cursor(&self) -> SearchCursor {
        self.cursor
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn phase(&self) -> &PagePhase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, PagePhase::Loading)
    }

    /// Issue a request for `page` (clamped to 1) at the current page size.
    pub fn issue(&mut self, page: u32) -> PageTicket {
        self.latest += 1;
        self.cursor.page = page.max(1);
        self.phase = PagePhase::Loading;
        PageTicket {
            seq: self.latest,
            page: self.cursor.page,
            page_size: self.cursor.page_size,
        }
    }

    /// Change the page size and go back to page 1.
    pub fn resize(&mut self, page_size: u32) -> PageTicket {
        self.cursor.page_size = page_size.max(1);
        self.issue(1)
    }

    /// Clear results and forget any pending request.
    pub fn reset(&mut self) {
        self.latest += 1;
        self.cursor.page = 1;
        self.cursor.has_more = false;
        self.items.clear();
        self.items_offset = 0;
        self.phase = PagePhase::Idle;
    }

    /// Apply a response. Returns `false` if a newer request has been
    /// issued since, in which case the response is dropped.
    pub fn apply(&mut self, ticket: PageTicket, result: Result<Page<T>, BackendError>) -> bool {
        if ticket.seq != self.latest {
            debug!(
                seq = ticket.seq,
                latest = self.latest,
                page = ticket.page,
                "discarding stale page response"
            );
            return false;
        }

        self.items_offset = (ticket.page.max(1) as usize - 1) * ticket.page_size as usize;
        match result {
            Ok(page) => {
                self.items = page.items;
                self.cursor.has_more = page.has_more;
                self.phase = PagePhase::Ready;
            }
            Err(err) => {
                self.items.clear();
                self.cursor.has_more = false;
                self.phase = PagePhase::Failed {
                    message: err.to_string(),
                };
            }
        }
        true
    }

    /// Total shown for the current page, once it has loaded.
    pub fn total_estimate(&self) -> Option<TotalEstimate> {
        if self.phase != PagePhase::Ready {
            return None;
        }
        let seen = self.offset() + self.items.len();
        Some(if self.cursor.has_more {
            TotalEstimate::AtLeast(seen)
        } else {
            TotalEstimate::Exact(seen)
        })
    }

    /// 1-based inclusive row range of the current page, if it has rows.
    pub fn range(&self) -> Option<(usize, usize)> {
        if self.items.is_empty() {
            return None;
        }
        let start = self.offset() + 1;
        Some((start, start + self.items.len() - 1))
    }

    pub fn has_prev(&self) -> bool {
        self.cursor.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.cursor.has_more
    }

    /// 1-based row number of the item at `index` on this page.
    pub fn row_number(&self, index: usize) -> usize {
        self.offset() + index + 1
    }

    fn offset(&self) -> usize {
        self.items_offset
    }
}

/// A search request ready to send, tagged with its ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
    pub ticket: PageTicket,
    pub query: SearchQuery,
}

/// Case search controller: the active term plus its paginator.
#[derive(Clone, Debug)]
pub struct CaseSearch {
    pager: Paginator<Case>,
    term: String,
    recent_months: u32,
}

impl CaseSearch {
    pub fn new(page_size: u32, recent_months: u32) -> Self {
        Self {
            pager: Paginator::new(page_size),
            term: String::new(),
            recent_months,
        }
    }

    pub fn pager(&self) -> &Paginator<Case> {
        &self.pager
    }

    pub fn cases(&self) -> &[Case] {
        self.pager.items()
    }

    /// The term of the last issued search (empty for recent cases).
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Start a new search for `term` at page 1. An empty term asks for
    /// recent cases within the lookback window.
    pub fn search(&mut self, term: &str, today: NaiveDate) -> SearchRequest {
        self.search_at(term, 1, today)
    }

    /// Start a new search for `term` directly at `page`.
    pub fn search_at(&mut self, term: &str, page: u32, today: NaiveDate) -> SearchRequest {
        self.term = term.trim().to_string();
        let ticket = self.pager.issue(page);
        self.request(ticket, today)
    }

    /// Re-issue the active search for another page.
    pub fn change_page(&mut self, page: u32, today: NaiveDate) -> Option<SearchRequest> {
        if page == 0 {
            return None;
        }
        let ticket = self.pager.issue(page);
        Some(self.request(ticket, today))
    }

    /// Change the page size; restarts from page 1.
    pub fn change_page_size(&mut self, page_size: u32, today: NaiveDate) -> Option<SearchRequest> {
        if page_size == 0 {
            return None;
        }
        let ticket = self.pager.resize(page_size);
        Some(self.request(ticket, today))
    }

    pub fn clear(&mut self) {
        self.term.clear();
        self.pager.reset();
    }

    pub fn apply(
        &mut self,
        ticket: PageTicket,
        result: Result<Page<Case>, BackendError>,
    ) -> bool {
        self.pager.apply(ticket, result)
    }

    fn request(&self, ticket: PageTicket, today: NaiveDate) -> SearchRequest {
        let (case_number, created_after) = if self.term.is_empty() {
            let since = if self.recent_months == 0 {
                None
            } else {
                today.checked_sub_months(Months::new(self.recent_months))
            };
            (None, since)
        } else {
            (Some(self.term.clone()), None)
        };

        SearchRequest {
            ticket,
            query: SearchQuery {
                case_number,
                created_after,
                page: ticket.page,
                page_size: ticket.page_size,
            },
        }
    }
}
