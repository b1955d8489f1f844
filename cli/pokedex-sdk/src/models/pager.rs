//! Incremental pagination over the catalog list endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use pokedex_catalog::{CatalogClientError, ClientTrait, ListEntry};
use serde::Serialize;
use tracing::{debug, instrument};

/// Number of entries requested per page.
pub const PAGE_SIZE: u32 = 20;

/// Cursor and accumulated results of one browsing session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginationState {
    pub offset: u32,
    pub page_size: u32,
    pub has_more: bool,
    pub accumulated: Vec<ListEntry>,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            offset: 0,
            page_size: PAGE_SIZE,
            has_more: true,
            accumulated: Vec::new(),
        }
    }
}

impl PaginationState {
    /// Record a successfully fetched page.
    fn apply_page(&mut self, page: Vec<ListEntry>) {
        self.has_more = page.len() == self.page_size as usize;
        self.offset += self.page_size;
        self.accumulated.extend(page);
    }
}

/// Observable phase of a [CatalogPager].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PagerState {
    /// Nothing loaded yet
    Empty,
    /// First page in flight
    Loading,
    Ready,
    /// A further page is in flight
    LoadingMore,
    /// The last page has been received
    Exhausted,
}

/// Result of a successful page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched and appended, with this many entries.
    Loaded(usize),
    /// Another load was already running; nothing was requested.
    InFlight,
    /// There are no more pages; nothing was requested.
    Exhausted,
    /// The page arrived after a [CatalogPager::reset] and was dropped.
    Discarded,
}

#[derive(Debug, Default)]
struct PagerInner {
    pagination: PaginationState,
    /// Bumped by [CatalogPager::reset] so that results of loads started
    /// before the reset are dropped.
    generation: u64,
}

/// Marks a page load as in flight for as long as it is alive.
struct LoadingGuard<'a>(&'a AtomicBool);

impl<'a> LoadingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the [PaginationState] of one session and fetches pages in order.
///
/// At most one page load runs at a time: a load requested while another is
/// in flight returns immediately without a network call, so page `N + 1` is
/// never requested before page `N` returned.
#[derive(Debug)]
pub struct CatalogPager<C> {
    client: Arc<C>,
    loading: AtomicBool,
    inner: Mutex<PagerInner>,
}

impl<C: ClientTrait> CatalogPager<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            loading: AtomicBool::new(false),
            inner: Mutex::new(PagerInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PagerInner> {
        self.inner.lock().expect("pager mutex poisoned")
    }

    /// Forget all results and rewind to the first page.
    ///
    /// A load that is still in flight completes but its result is discarded.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.pagination = PaginationState::default();
        inner.generation += 1;
        debug!(generation = inner.generation, "pager reset");
    }

    /// Fetch the first page and replace the accumulated entries with it.
    ///
    /// On failure the accumulated entries are cleared, the offset rewinds to
    /// the first page and `has_more` is left as it was. Returns [LoadOutcome::InFlight] without fetching if a load
    /// is already running.
    #[instrument(skip(self))]
    pub async fn load_first_page(&self) -> Result<LoadOutcome, CatalogClientError> {
        let Some(_guard) = LoadingGuard::acquire(&self.loading) else {
            debug!("page load already in flight");
            return Ok(LoadOutcome::InFlight);
        };

        let (generation, page_size) = {
            let inner = self.lock();
            (inner.generation, inner.pagination.page_size)
        };

        let result = self.client.fetch_page(page_size, 0).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            debug!("discarding first page fetched before reset");
            return Ok(LoadOutcome::Discarded);
        }

        match result {
            Ok(page) => {
                let loaded = page.len();
                let pagination = &mut inner.pagination;
                pagination.accumulated.clear();
                pagination.offset = 0;
                pagination.apply_page(page);
                debug!(loaded, has_more = pagination.has_more, "loaded first page");
                Ok(LoadOutcome::Loaded(loaded))
            },
            Err(err) => {
                inner.pagination.accumulated.clear();
                inner.pagination.offset = 0;
                Err(err)
            },
        }
    }

    /// Fetch the page at the current offset and append it.
    ///
    /// A no-op if there are no more pages or a load is already in flight.
    /// On failure the state is left untouched so the call can be retried.
    #[instrument(skip(self))]
    pub async fn load_next_page(&self) -> Result<LoadOutcome, CatalogClientError> {
        if !self.has_more() {
            return Ok(LoadOutcome::Exhausted);
        }
        let Some(_guard) = LoadingGuard::acquire(&self.loading) else {
            debug!("page load already in flight");
            return Ok(LoadOutcome::InFlight);
        };

        let (generation, page_size, offset) = {
            let inner = self.lock();
            // re-check now that we hold the flag
            if !inner.pagination.has_more {
                return Ok(LoadOutcome::Exhausted);
            }
            (
                inner.generation,
                inner.pagination.page_size,
                inner.pagination.offset,
            )
        };

        let page = self.client.fetch_page(page_size, offset).await?;

        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(offset, "discarding page fetched before reset");
            return Ok(LoadOutcome::Discarded);
        }

        let loaded = page.len();
        inner.pagination.apply_page(page);
        debug!(
            offset,
            loaded,
            has_more = inner.pagination.has_more,
            "loaded next page"
        );
        Ok(LoadOutcome::Loaded(loaded))
    }

    /// Entries loaded so far, in list order.
    pub fn entries(&self) -> Vec<ListEntry> {
        self.lock().pagination.accumulated.clone()
    }

    pub fn snapshot(&self) -> PaginationState {
        self.lock().pagination.clone()
    }

    pub fn has_more(&self) -> bool {
        self.lock().pagination.has_more
    }

    pub fn offset(&self) -> u32 {
        self.lock().pagination.offset
    }

    pub fn page_size(&self) -> u32 {
        self.lock().pagination.page_size
    }

    pub fn state(&self) -> PagerState {
        let loading = self.loading.load(Ordering::Acquire);
        let inner = self.lock();
        let pagination = &inner.pagination;
        let started = pagination.offset > 0;

        match (loading, started, pagination.has_more) {
            (true, false, _) => PagerState::Loading,
            (true, true, _) => PagerState::LoadingMore,
            (false, false, _) => PagerState::Empty,
            (false, true, true) => PagerState::Ready,
            (false, true, false) => PagerState::Exhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pokedex_catalog::MockClient;
    use pretty_assertions::assert_eq;

    use super::*;

    fn page(start: u32, len: u32) -> Vec<ListEntry> {
        (start..start + len)
            .map(|n| {
                ListEntry::new(
                    format!("entity-{n}"),
                    format!("https://pokeapi.co/api/v2/pokemon/{n}/"),
                )
            })
            .collect()
    }

    fn pager(client: &MockClient) -> CatalogPager<MockClient> {
        CatalogPager::new(Arc::new(client.clone()))
    }

    #[tokio::test]
    async fn first_page_replaces_entries_and_advances_offset() {
        let client = MockClient::new();
        client.push_page_response(page(1, 20));
        let pager = pager(&client);
        assert_eq!(pager.state(), PagerState::Empty);

        let outcome = pager.load_first_page().await.unwrap();

        assert_eq!(outcome, LoadOutcome::Loaded(20));
        assert_eq!(pager.entries(), page(1, 20));
        assert_eq!(pager.offset(), 20);
        assert!(pager.has_more());
        assert_eq!(pager.state(), PagerState::Ready);
        assert_eq!(client.calls(), vec![pokedex_catalog::MockCall::Page {
            limit: 20,
            offset: 0
        }]);
    }

    #[tokio::test]
    async fn short_page_exhausts_the_list() {
        let client = MockClient::new();
        client.push_page_response(page(1, 20));
        client.push_page_response(page(21, 17));
        let pager = pager(&client);

        pager.load_first_page().await.unwrap();
        assert!(pager.has_more());

        let outcome = pager.load_next_page().await.unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded(17));
        assert!(!pager.has_more());
        assert_eq!(pager.entries().len(), 37);
        assert_eq!(pager.offset(), 40);
        assert_eq!(pager.state(), PagerState::Exhausted);
    }

    #[tokio::test]
    async fn next_page_after_exhaustion_is_a_noop() {
        let client = MockClient::new();
        client.push_page_response(page(1, 5));
        let pager = pager(&client);
        pager.load_first_page().await.unwrap();
        let before = pager.snapshot();

        let outcome = pager.load_next_page().await.unwrap();

        assert_eq!(outcome, LoadOutcome::Exhausted);
        assert_eq!(pager.snapshot(), before);
        assert_eq!(client.page_calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_next_page_calls_fetch_once() {
        let client = MockClient::new().with_latency(Duration::from_millis(50));
        client.push_page_response(page(1, 20));
        client.push_page_response(page(21, 20));
        let pager = pager(&client);
        pager.load_first_page().await.unwrap();

        let (a, b, c) = tokio::join!(
            pager.load_next_page(),
            pager.load_next_page(),
            pager.load_next_page()
        );

        let mut outcomes = vec![a.unwrap(), b.unwrap(), c.unwrap()];
        outcomes.sort_by_key(|outcome| matches!(outcome, LoadOutcome::InFlight));
        assert_eq!(outcomes, vec![
            LoadOutcome::Loaded(20),
            LoadOutcome::InFlight,
            LoadOutcome::InFlight
        ]);
        assert_eq!(client.page_calls(), 2);
        assert_eq!(pager.entries().len(), 40);
        assert_eq!(pager.offset(), 40);
    }

    #[tokio::test]
    async fn failed_next_page_leaves_state_and_can_retry() {
        let client = MockClient::new();
        client.push_page_response(page(1, 20));
        client.push_page_error("connection reset");
        client.push_page_response(page(21, 20));
        let pager = pager(&client);
        pager.load_first_page().await.unwrap();
        let before = pager.snapshot();

        let err = pager.load_next_page().await.unwrap_err();
        assert!(err.to_string().contains("pokemon"));
        assert_eq!(pager.snapshot(), before);
        assert_eq!(pager.state(), PagerState::Ready);

        let outcome = pager.load_next_page().await.unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded(20));
        assert_eq!(client.calls()[2], pokedex_catalog::MockCall::Page {
            limit: 20,
            offset: 20
        });
    }

    #[tokio::test]
    async fn failed_first_page_clears_entries_keeps_has_more() {
        let client = MockClient::new();
        client.push_page_response(page(1, 20));
        client.push_page_error("offline");
        let pager = pager(&client);
        pager.load_first_page().await.unwrap();

        pager.load_first_page().await.unwrap_err();

        assert!(pager.entries().is_empty());
        assert!(pager.has_more());
    }

    #[tokio::test]
    async fn failed_first_page_rewinds_offset() {
        let client = MockClient::new();
        client.push_page_response(page(1, 20));
        client.push_page_error("offline");
        client.push_page_response(page(1, 20));
        let pager = pager(&client);
        pager.load_first_page().await.unwrap();

        pager.load_first_page().await.unwrap_err();
        assert_eq!(pager.offset(), 0);
        assert_eq!(pager.state(), PagerState::Empty);

        pager.load_next_page().await.unwrap();
        assert_eq!(client.calls()[2], pokedex_catalog::MockCall::Page {
            limit: 20,
            offset: 0
        });
        assert_eq!(pager.entries(), page(1, 20));
    }

    #[tokio::test]
    async fn reset_rewinds_to_first_page() {
        let client = MockClient::new();
        client.push_page_response(page(1, 3));
        client.push_page_response(page(1, 20));
        let pager = pager(&client);
        pager.load_first_page().await.unwrap();
        assert!(!pager.has_more());

        pager.reset();
        assert_eq!(pager.snapshot(), PaginationState::default());
        assert_eq!(pager.state(), PagerState::Empty);

        pager.load_first_page().await.unwrap();
        assert_eq!(pager.entries(), page(1, 20));
        assert!(pager.has_more());
    }

    #[tokio::test]
    async fn reset_discards_in_flight_result() {
        let client = MockClient::new().with_latency(Duration::from_millis(50));
        client.push_page_response(page(1, 20));
        let pager = pager(&client);

        let (outcome, ()) = tokio::join!(pager.load_first_page(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            pager.reset();
        });

        assert_eq!(outcome.unwrap(), LoadOutcome::Discarded);
        assert!(pager.entries().is_empty());
        assert_eq!(pager.offset(), 0);
    }
}
