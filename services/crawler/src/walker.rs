use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use syncline_common::error::SynclineResult;

/// One paged listing of child records under a parent scope.
#[async_trait]
pub trait PagedSource: Send + Sync {
    type Item: Send;

    async fn fetch_page(
        &self,
        scope: &str,
        limit: usize,
        offset: usize,
    ) -> SynclineResult<Vec<Self::Item>>;
}

/// Drives a paged source to exhaustion for one scope.
///
/// A full page triggers the next fetch; an empty or short page ends the
/// scope. `max_items`, when set, truncates the result even mid-page. A fixed
/// delay between page fetches paces the source.
#[derive(Debug, Clone)]
pub struct Walker {
    pub page_size: usize,
    pub max_items: Option<usize>,
    pub page_delay: Duration,
}

impl Walker {
    pub async fn collect_scope<S: PagedSource>(
        &self,
        source: &S,
        scope: &str,
    ) -> SynclineResult<Vec<S::Item>> {
        let mut items = Vec::new();
        let mut offset = 0;

        loop {
            let page = source.fetch_page(scope, self.page_size, offset).await?;
            let page_len = page.len();
            if page_len == 0 {
                break;
            }
            items.extend(page);

            if let Some(max) = self.max_items {
                if items.len() >= max {
                    items.truncate(max);
                    break;
                }
            }
            if page_len < self.page_size {
                break;
            }

            offset += self.page_size;
            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        Ok(items)
    }
}

/// Aggregate bookkeeping for one crawl invocation: scope/item counters,
/// current-position markers and accumulated error messages. Flushed into the
/// crawl-summary row when the crawl ends.
#[derive(Debug)]
pub struct CrawlProgress {
    pub source: String,
    pub total_scopes: usize,
    pub completed_scopes: usize,
    pub total_items: usize,
    pub completed_items: usize,
    pub current_scope: Option<String>,
    pub current_item: Option<String>,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CrawlProgress {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            total_scopes: 0,
            completed_scopes: 0,
            total_items: 0,
            completed_items: 0,
            current_scope: None,
            current_item: None,
            errors: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record_error(&mut self, message: String) {
        tracing::warn!(source = %self.source, error = %message, "crawl error recorded");
        self.errors.push(message);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves `total` items in pages of up to `page_size`, counting fetches.
    struct CountingSource {
        total: usize,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl PagedSource for CountingSource {
        type Item = usize;

        async fn fetch_page(
            &self,
            _scope: &str,
            limit: usize,
            offset: usize,
        ) -> SynclineResult<Vec<usize>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let end = std::cmp::min(offset + limit, self.total);
            Ok((offset..end).collect())
        }
    }

    fn walker(page_size: usize, max_items: Option<usize>) -> Walker {
        Walker {
            page_size,
            max_items,
            page_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn terminates_on_short_final_page() {
        // 3 full pages of 10, then a final page of 9
        let source = CountingSource {
            total: 39,
            fetches: AtomicUsize::new(0),
        };

        let items = walker(10, None)
            .collect_scope(&source, "scope")
            .await
            .expect("walk");

        assert_eq!(items.len(), 39);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn terminates_on_empty_first_page() {
        let source = CountingSource {
            total: 0,
            fetches: AtomicUsize::new(0),
        };

        let items = walker(10, None)
            .collect_scope(&source, "scope")
            .await
            .expect("walk");

        assert!(items.is_empty());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exact_multiple_needs_one_extra_fetch() {
        // 20 items at page size 10: two full pages, then an empty page
        let source = CountingSource {
            total: 20,
            fetches: AtomicUsize::new(0),
        };

        let items = walker(10, None)
            .collect_scope(&source, "scope")
            .await
            .expect("walk");

        assert_eq!(items.len(), 20);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn max_items_truncates_mid_page() {
        let source = CountingSource {
            total: 100,
            fetches: AtomicUsize::new(0),
        };

        let items = walker(10, Some(15))
            .collect_scope(&source, "scope")
            .await
            .expect("walk");

        assert_eq!(items.len(), 15);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetch_error_propagates_to_caller() {
        struct FailingSource;

        #[async_trait]
        impl PagedSource for FailingSource {
            type Item = usize;

            async fn fetch_page(
                &self,
                _scope: &str,
                _limit: usize,
                _offset: usize,
            ) -> SynclineResult<Vec<usize>> {
                Err(syncline_common::error::SynclineError::Source(
                    "boom".to_string(),
                ))
            }
        }

        let result = walker(10, None).collect_scope(&FailingSource, "scope").await;
        assert!(result.is_err());
    }

    #[test]
    fn progress_records_errors_and_finishes() {
        let mut progress = CrawlProgress::new("tracker");
        progress.record_error("scope one: fetch failed".to_string());
        progress.record_error("scope two: fetch failed".to_string());
        progress.finish();

        assert_eq!(progress.errors.len(), 2);
        assert!(progress.finished_at.is_some());
    }
}
