//! Alert classifier
//!
//! Lists active stock records whose quantity is at or below their threshold.
//! Listing is keyset paginated on (branch, product, color, brand) so a scan
//! can stop early and resume later from a cursor.

use std::sync::Arc;

use shared::{AlertCursor, AlertFilter, AlertView, Page};

use crate::error::AppResult;
use crate::store::LedgerStore;

#[derive(Clone)]
pub struct AlertClassifier {
    store: Arc<dyn LedgerStore>,
}

impl AlertClassifier {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// One page of alerts strictly after `after`.
    ///
    /// `next_cursor` is set whenever the page came back full; the following
    /// page may still turn out empty.
    pub async fn list_alerts(
        &self,
        filter: &AlertFilter,
        after: Option<AlertCursor>,
        limit: u32,
    ) -> AppResult<Page<AlertView>> {
        if filter.status.is_some_and(|s| !s.is_alert()) {
            return Ok(Page::empty());
        }

        let limit = limit.max(1);
        let data = self
            .store
            .scan_alerts(filter, after.map(|c| c.0), limit)
            .await?;

        let next_cursor = if data.len() as u32 >= limit {
            data.last().map(|view| AlertCursor(view.key))
        } else {
            None
        };

        tracing::debug!(
            count = data.len(),
            more = next_cursor.is_some(),
            "Alert page scanned"
        );
        Ok(Page { data, next_cursor })
    }

    /// Lazy pager over every matching alert
    pub fn pager(&self, filter: AlertFilter, page_size: u32) -> AlertPager {
        AlertPager {
            classifier: self.clone(),
            filter,
            page_size: page_size.max(1),
            cursor: None,
            done: false,
        }
    }
}

/// Pulls alert pages on demand.
///
/// Nothing is read until [`AlertPager::next_page`] is called, and the
/// position can be saved with [`AlertPager::cursor`] and restored with
/// [`AlertPager::resume_from`].
pub struct AlertPager {
    classifier: AlertClassifier,
    filter: AlertFilter,
    page_size: u32,
    cursor: Option<AlertCursor>,
    done: bool,
}

impl AlertPager {
    /// Next non-empty page, or `None` once the scan is exhausted
    pub async fn next_page(&mut self) -> AppResult<Option<Vec<AlertView>>> {
        if self.done {
            return Ok(None);
        }

        let page = self
            .classifier
            .list_alerts(&self.filter, self.cursor, self.page_size)
            .await?;

        match page.next_cursor {
            Some(cursor) => self.cursor = Some(cursor),
            None => self.done = true,
        }

        if page.data.is_empty() {
            self.done = true;
            return Ok(None);
        }
        Ok(Some(page.data))
    }

    /// Position after the last page returned
    pub fn cursor(&self) -> Option<AlertCursor> {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.done
    }

    /// Continue a scan from a saved position
    pub fn resume_from(mut self, cursor: AlertCursor) -> Self {
        self.cursor = Some(cursor);
        self.done = false;
        self
    }

    /// Drain the remaining pages
    pub async fn collect_all(mut self) -> AppResult<Vec<AlertView>> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page);
        }
        Ok(all)
    }
}
