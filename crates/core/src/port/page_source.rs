// Page Source Port (Paginated Fetcher)

use crate::domain::{BatchItem, Cursor};
use crate::error::Result;
use async_trait::async_trait;

/// Ordered, resumable access to an external record collection.
///
/// Pages are sorted ascending by `order_key` and bounded strictly greater
/// than the given cursor, so no item is handed out twice across resumed
/// runs and records created behind the cursor concurrently are still
/// picked up by later pages. An empty page signals exhaustion (not an
/// error) and terminates the engine's run loop.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the next page after `after` (no bound on fresh start)
    async fn fetch_page(&self, after: Option<&Cursor>, limit: u32) -> Result<Vec<BatchItem>>;

    /// Total record count for progress display, `None` if not cheaply known
    async fn count(&self) -> Result<Option<u64>> {
        Ok(None)
    }
}

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// In-memory page source over a fixed item list (tests).
    ///
    /// Cursors compare lexicographically, so numeric order keys should be
    /// zero-padded by the test fixture.
    pub struct VecPageSource {
        items: Vec<BatchItem>,
        fetches: AtomicU64,
        /// Fail fetches once this many pages have been served
        fail_after_pages: Option<u64>,
    }

    impl VecPageSource {
        pub fn new(mut items: Vec<BatchItem>) -> Self {
            items.sort_by(|a, b| a.order_key.as_str().cmp(b.order_key.as_str()));
            Self {
                items,
                fetches: AtomicU64::new(0),
                fail_after_pages: None,
            }
        }

        pub fn failing_after(mut self, pages: u64) -> Self {
            self.fail_after_pages = Some(pages);
            self
        }

        pub fn fetch_count(&self) -> u64 {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageSource for VecPageSource {
        async fn fetch_page(&self, after: Option<&Cursor>, limit: u32) -> Result<Vec<BatchItem>> {
            let served = self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(max) = self.fail_after_pages {
                if served >= max {
                    return Err(AppError::Remote("source unavailable".to_string()));
                }
            }
            let page = self
                .items
                .iter()
                .filter(|item| match after {
                    Some(cursor) => item.order_key.as_str() > cursor.as_str(),
                    None => true,
                })
                .take(limit as usize)
                .cloned()
                .collect();
            Ok(page)
        }

        async fn count(&self) -> Result<Option<u64>> {
            Ok(Some(self.items.len() as u64))
        }
    }
}
