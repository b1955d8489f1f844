//! Configuration types for catalog client construction.

use std::collections::BTreeMap;

/// Public PokeAPI instance, used unless the configuration names another one.
pub const DEFAULT_CATALOG_URL: &str = "https://pokeapi.co/api/v2";

/// Configuration for catalog client construction.
#[derive(Debug, Clone)]
pub struct CatalogClientConfig {
    /// Base URL for the catalog API, without the resource path.
    pub catalog_url: String,
    /// Additional headers to include in requests.
    pub extra_headers: BTreeMap<String, String>,
    /// Overrides the default `User-Agent` of the HTTP client.
    pub user_agent: Option<String>,
}

impl Default for CatalogClientConfig {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            extra_headers: BTreeMap::new(),
            user_agent: None,
        }
    }
}
