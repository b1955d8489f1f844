//! Catalog client wrapper around `reqwest`.

use std::fmt::Debug;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{self, HeaderMap};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::config::CatalogClientConfig;
use crate::error::CatalogClientError;
use crate::types::{EntityDetail, EntityId, ListEntry, PageResponse, SpeciesInfo};

/// A client for the catalog service.
///
/// This is a thin wrapper around a [reqwest::Client] that handles:
/// - HTTP client configuration with timeouts and default headers
/// - URL construction for the three read-only endpoints
/// - decoding and error classification of responses
pub struct CatalogClient {
    client: reqwest::Client,
    config: CatalogClientConfig,
}

impl Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("catalog_url", &self.config.catalog_url)
            .finish_non_exhaustive()
    }
}

impl CatalogClient {
    /// Create a new catalog client from configuration.
    pub fn new(config: CatalogClientConfig) -> Result<Self, CatalogClientError> {
        let client = build_http_client(&config)?;
        Ok(Self { client, config })
    }

    /// Get the configured catalog URL.
    pub fn catalog_url(&self) -> &str {
        &self.config.catalog_url
    }

    /// Update the client configuration and recreate the client.
    pub fn update_config(
        &mut self,
        update: impl FnOnce(&mut CatalogClientConfig),
    ) -> Result<(), CatalogClientError> {
        let mut modified_config = self.config.clone();
        update(&mut modified_config);
        *self = Self::new(modified_config)?;
        Ok(())
    }

    /// Joins `path` onto the configured base URL.
    ///
    /// The base is treated as a directory regardless of a trailing slash,
    /// so `https://host/api/v2` and `https://host/api/v2/` are equivalent.
    fn endpoint(&self, path: &str) -> Result<Url, CatalogClientError> {
        let base = self.config.catalog_url.trim_end_matches('/');
        Url::parse(&format!("{base}/{path}")).map_err(|e| {
            CatalogClientError::InvalidRequest(format!(
                "'{base}/{path}' is not a valid URL: {e}"
            ))
        })
    }

    /// Issue a single GET and decode the body as `T`.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, CatalogClientError> {
        debug!(%url, "sending catalog request");

        let network_error = |source| CatalogClientError::Network {
            url: url.clone(),
            source,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(network_error)?;

        let body = response.bytes().await.map_err(network_error)?;

        serde_json::from_slice(&body).map_err(|source| CatalogClientError::Decode {
            url: url.clone(),
            source,
        })
    }
}

// ---------------------------------------------------------------------------
// Catalog trait
// ---------------------------------------------------------------------------

/// The complete catalog API interface.
///
/// This trait enables alternate implementations:
/// - **HTTP**: REST calls to the catalog API via [`CatalogClient`]
/// - **Mock** (tests): scripted responses without HTTP via `MockClient`
///
/// The returned futures are `Send` so callers can spawn one task per card.
pub trait ClientTrait: Send + Sync {
    /// Fetch `limit` list entries starting at `offset`.
    fn fetch_page(
        &self,
        limit: u32,
        offset: u32,
    ) -> impl Future<Output = Result<Vec<ListEntry>, CatalogClientError>> + Send;

    /// Fetch the full detail record of one entity.
    fn fetch_detail(
        &self,
        id: EntityId,
    ) -> impl Future<Output = Result<EntityDetail, CatalogClientError>> + Send;

    /// Fetch the species record (description entries) of one entity.
    fn fetch_species(
        &self,
        id: EntityId,
    ) -> impl Future<Output = Result<SpeciesInfo, CatalogClientError>> + Send;
}

impl ClientTrait for CatalogClient {
    #[instrument(skip(self))]
    async fn fetch_page(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ListEntry>, CatalogClientError> {
        let mut url = self.endpoint("pokemon/")?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());

        let page: PageResponse = self.get_json(url).await?;

        debug!(n_entries = page.results.len(), "received page");
        Ok(page.results)
    }

    #[instrument(skip_all, fields(%id))]
    async fn fetch_detail(&self, id: EntityId) -> Result<EntityDetail, CatalogClientError> {
        let url = self.endpoint(&format!("pokemon/{id}"))?;
        self.get_json(url).await
    }

    #[instrument(skip_all, fields(%id))]
    async fn fetch_species(&self, id: EntityId) -> Result<SpeciesInfo, CatalogClientError> {
        let url = self.endpoint(&format!("pokemon-species/{id}"))?;
        self.get_json(url).await
    }
}

// ---------------------------------------------------------------------------
// HTTP client builder
// ---------------------------------------------------------------------------

/// Build the HTTP client shared by all requests of a [CatalogClient].
fn build_http_client(config: &CatalogClientConfig) -> Result<reqwest::Client, CatalogClientError> {
    let mut headers = HeaderMap::new();

    for (key, value) in &config.extra_headers {
        headers.insert(
            header::HeaderName::from_str(key).map_err(
                |e: header::InvalidHeaderName| CatalogClientError::InvalidRequest(e.to_string()),
            )?,
            header::HeaderValue::from_str(value).map_err(
                |e: header::InvalidHeaderValue| CatalogClientError::InvalidRequest(e.to_string()),
            )?,
        );
    }

    debug!(
        catalog_url = %config.catalog_url,
        extra_headers = config.extra_headers.len(),
        "building catalog HTTP client"
    );

    let client_builder = reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(15))
        .timeout(Duration::from_secs(60));

    let client_builder = if let Some(ref user_agent) = config.user_agent {
        client_builder.user_agent(user_agent)
    } else {
        client_builder
    };

    client_builder
        .build()
        .map_err(|e| CatalogClientError::InvalidRequest(e.to_string()))
}
