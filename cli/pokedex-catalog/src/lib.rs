//! HTTP client for the read-only creature catalog API.
//!
//! This crate provides:
//! - HTTP client construction ([CatalogClient]) for the list, detail and
//!   species endpoints
//! - The [ClientTrait] seam consumed by the SDK, so tests can swap in a
//!   [MockClient] (feature `tests`)
//! - Wire types decoded from the API and the error taxonomy for fetches
//!
//! ## Usage
//!
//! ```ignore
//! use pokedex_catalog::{CatalogClient, CatalogClientConfig, ClientTrait};
//!
//! let client = CatalogClient::new(CatalogClientConfig::default())?;
//! let first_page = client.fetch_page(20, 0).await?;
//! ```

mod client;
mod config;
mod error;
pub mod types;

#[cfg(any(test, feature = "tests"))]
mod mock;

pub use client::{CatalogClient, ClientTrait};
pub use config::{CatalogClientConfig, DEFAULT_CATALOG_URL};
pub use error::CatalogClientError;
#[cfg(any(test, feature = "tests"))]
pub use mock::{MockCall, MockClient};
pub use types::{EntityDetail, EntityId, ListEntry, SpeciesInfo};
