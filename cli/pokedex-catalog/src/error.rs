//! Error handling for catalog API operations.

use thiserror::Error;
use url::Url;

/// Common error type for catalog API operations.
///
/// Every fetch makes a single attempt, so each variant describes the one
/// request that failed.
#[derive(Debug, Error)]
pub enum CatalogClientError {
    /// Transport level failure, including non-success HTTP statuses.
    #[error("could not fetch '{url}'")]
    Network {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    /// The response body did not match the expected shape.
    #[error("unexpected response from '{url}'")]
    Decode {
        url: Url,
        #[source]
        source: serde_json::Error,
    },

    /// The request URL could not be constructed.
    ///
    /// Inputs are validated integers, so this indicates a misconfigured
    /// catalog URL rather than a recoverable condition.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl CatalogClientError {
    /// Whether the failure happened below the HTTP layer or at the status line.
    pub fn is_network(&self) -> bool {
        matches!(self, CatalogClientError::Network { .. })
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, CatalogClientError::Decode { .. })
    }
}
