//! Assemble the detail screen from the detail and species endpoints.

use std::sync::Arc;

use futures::{FutureExt, TryFutureExt};
use pokedex_catalog::{CatalogClientError, ClientTrait, EntityId};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::models::composite::CompositeDetail;
use crate::utils::single_flight::SingleFlight;

/// Failure of one of the two requests behind a [CompositeDetail].
///
/// Either failure fails the whole composite, there is no partial result.
#[derive(Debug, Clone, Error)]
pub enum CompositeError {
    #[error("failed to fetch details of #{id}")]
    Detail {
        id: EntityId,
        #[source]
        source: Arc<CatalogClientError>,
    },
    #[error("failed to fetch description of #{id}")]
    Species {
        id: EntityId,
        #[source]
        source: Arc<CatalogClientError>,
    },
}

impl CompositeError {
    /// The underlying catalog error.
    pub fn client_error(&self) -> &CatalogClientError {
        match self {
            CompositeError::Detail { source, .. } | CompositeError::Species { source, .. } => {
                source.as_ref()
            },
        }
    }
}

type CompositeResult = Result<CompositeDetail, CompositeError>;

/// Fetches detail and species concurrently and merges them.
///
/// Overlapping requests for the same id share one pair of fetches.
pub struct DetailAggregator<C> {
    client: Arc<C>,
    flights: SingleFlight<EntityId, CompositeResult>,
}

impl<C> std::fmt::Debug for DetailAggregator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetailAggregator")
            .field("flights", &self.flights)
            .finish_non_exhaustive()
    }
}

impl<C> DetailAggregator<C>
where
    C: ClientTrait + 'static,
{
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            flights: SingleFlight::new(),
        }
    }

    #[instrument(skip_all, fields(%id))]
    pub async fn fetch_composite(&self, id: EntityId) -> CompositeResult {
        let client = Arc::clone(&self.client);
        self.flights
            .run(id, move || fetch_both(client, id).boxed())
            .await
    }
}

async fn fetch_both<C: ClientTrait>(client: Arc<C>, id: EntityId) -> CompositeResult {
    let detail = client
        .fetch_detail(id)
        .map_err(|e| CompositeError::Detail {
            id,
            source: Arc::new(e),
        });
    let species = client
        .fetch_species(id)
        .map_err(|e| CompositeError::Species {
            id,
            source: Arc::new(e),
        });

    let (detail, species) = futures::future::try_join(detail, species).await?;
    let composite = CompositeDetail::new(detail, &species);
    debug!(
        has_description = composite.description.is_some(),
        "assembled composite detail"
    );
    Ok(composite)
}
