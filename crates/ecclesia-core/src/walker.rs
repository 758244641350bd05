//! Pagination walker
//!
//! Drives a [`PageFetcher`] from page 1, following the server-supplied
//! `nextPage` cursor until it is absent. Fetches are strictly sequential:
//! page N's response is the only source of the cursor for page N+1.

use async_trait::async_trait;
use log::{debug, warn};
use std::marker::PhantomData;

use crate::error::CoreResult;
use crate::types::{FilterCriteria, Page};

/// Source of filtered pages for one collection
#[async_trait]
pub trait PageFetcher<T>: Send + Sync {
    /// Fetch one page of records matching `criteria`
    async fn fetch_page(&self, criteria: &FilterCriteria, page: u32, limit: u32) -> CoreResult<Page<T>>;
}

/// A single pass over every page of a filtered collection
///
/// The walker is not restartable: once it has returned `None` (end of the
/// collection, a tripped cursor guard, or after yielding an error) it stays
/// exhausted. Start a fresh walk for every aggregation run.
pub struct PageWalker<'a, T, F: ?Sized> {
    fetcher: &'a F,
    criteria: FilterCriteria,
    page_size: u32,
    next: Option<u32>,
    fetches: usize,
    guard_tripped: bool,
    _records: PhantomData<fn() -> T>,
}

/// Start a walk over `fetcher` with the given criteria and page size
pub fn walk<'a, T, F>(fetcher: &'a F, criteria: &FilterCriteria, page_size: u32) -> PageWalker<'a, T, F>
where
    F: PageFetcher<T> + ?Sized,
{
    PageWalker::new(fetcher, criteria.clone(), page_size)
}

impl<'a, T, F> PageWalker<'a, T, F>
where
    F: PageFetcher<T> + ?Sized,
{
    pub fn new(fetcher: &'a F, criteria: FilterCriteria, page_size: u32) -> Self {
        Self {
            fetcher,
            criteria,
            page_size: page_size.max(1),
            next: Some(1),
            fetches: 0,
            guard_tripped: false,
            _records: PhantomData,
        }
    }

    /// Fetch the next page, or `None` once the walk is over
    ///
    /// A failed fetch is returned once and ends the walk; there is no retry.
    pub async fn next_page(&mut self) -> Option<CoreResult<Page<T>>> {
        let page = self.next.take()?;
        self.fetches += 1;
        debug!("walking page {} (limit {})", page, self.page_size);

        match self.fetcher.fetch_page(&self.criteria, page, self.page_size).await {
            Ok(result) => {
                self.next = match result.pagination.next_page {
                    Some(next) if next > page => Some(next),
                    Some(next) => {
                        // The cursor is the only termination signal; a
                        // non-increasing one would loop forever.
                        warn!(
                            "backend reported nextPage {} after page {}, ending walk",
                            next, page
                        );
                        self.guard_tripped = true;
                        None
                    }
                    None => None,
                };
                Some(Ok(result))
            }
            Err(e) => {
                debug!("page {} failed: {}", page, e);
                Some(Err(e))
            }
        }
    }

    /// Number of fetch calls issued so far
    pub fn fetch_count(&self) -> usize {
        self.fetches
    }

    /// Whether the walk ended because the backend sent a non-increasing cursor
    pub fn terminated_by_guard(&self) -> bool {
        self.guard_tripped
    }

    pub fn is_finished(&self) -> bool {
        self.next.is_none()
    }

    /// Walk to the end, collecting every record in page order
    pub async fn collect_records(mut self) -> CoreResult<Vec<T>> {
        let mut records = Vec::new();
        while let Some(page) = self.next_page().await {
            records.extend(page?.records);
        }
        Ok(records)
    }
}
