//! The browsing session consumed by a front end.
//!
//! A [BrowseSession] ties one pager, one detail cache and one aggregator to
//! a shared catalog client. Per-card lookups never surface errors, a card
//! whose detail could not be fetched simply has no image or types yet.

use std::path::PathBuf;
use std::sync::Arc;

use pokedex_catalog::{CatalogClientError, ClientTrait, EntityId, ListEntry};
use tracing::debug;
use url::Url;

use crate::models::composite::CompositeDetail;
use crate::models::pager::{CatalogPager, LoadOutcome, PagerState};
use crate::providers::aggregator::{CompositeError, DetailAggregator};
use crate::providers::detail_cache::{DerivedCacheEntry, DetailCache};

#[derive(Debug)]
pub struct BrowseSession<C> {
    pager: CatalogPager<C>,
    cache: DetailCache<C>,
    aggregator: DetailAggregator<C>,
}

impl<C> BrowseSession<C>
where
    C: ClientTrait + 'static,
{
    /// Start a session, loading the durable cache at `cache_path` first so
    /// that cached cards are available before the first page arrives.
    pub fn open(client: C, cache_path: impl Into<PathBuf>) -> Self {
        let client = Arc::new(client);
        let cache = DetailCache::load(Arc::clone(&client), cache_path);
        debug!(cached = cache.len(), "opened browse session");

        Self {
            pager: CatalogPager::new(Arc::clone(&client)),
            cache,
            aggregator: DetailAggregator::new(client),
        }
    }

    pub fn cache(&self) -> &DetailCache<C> {
        &self.cache
    }

    /// Rewind the pager and load the first page again.
    ///
    /// Callers must not overlap this with another page load. If one is in
    /// flight anyway, the pager is still reset, this returns
    /// [LoadOutcome::InFlight] without fetching and the other load's result
    /// is discarded, leaving the session empty.
    pub async fn reset_and_load_first_page(&self) -> Result<LoadOutcome, CatalogClientError> {
        self.pager.reset();
        self.pager.load_first_page().await
    }

    pub async fn load_next_page(&self) -> Result<LoadOutcome, CatalogClientError> {
        self.pager.load_next_page().await
    }

    pub fn entries(&self) -> Vec<ListEntry> {
        self.pager.entries()
    }

    pub fn has_more(&self) -> bool {
        self.pager.has_more()
    }

    pub fn pager_state(&self) -> PagerState {
        self.pager.state()
    }

    pub fn id_for(&self, entry: &ListEntry) -> Option<EntityId> {
        entry.id()
    }

    /// Populate the cache for `entry` if needed and return its entry.
    async fn derived_for(&self, entry: &ListEntry) -> Option<DerivedCacheEntry> {
        let id = self.id_for(entry)?;
        self.cache.ensure(id).await;
        self.cache.get(id)
    }

    /// The card image of `entry`, fetching its detail if not cached.
    pub async fn sprite_url_for(&self, entry: &ListEntry) -> Option<Url> {
        self.derived_for(entry).await?.image_ref
    }

    /// The type labels of `entry` in slot order, empty while unknown.
    pub async fn types_for(&self, entry: &ListEntry) -> Vec<String> {
        self.derived_for(entry)
            .await
            .and_then(|derived| derived.types)
            .unwrap_or_default()
    }

    pub async fn fetch_composite(&self, id: EntityId) -> Result<CompositeDetail, CompositeError> {
        self.aggregator.fetch_composite(id).await
    }
}
