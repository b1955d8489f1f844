//! Browsing, caching and aggregation on top of the catalog client.
//!
//! - [models::pager::CatalogPager] pages through the catalog list
//! - [providers::detail_cache::DetailCache] keeps the card fields of every
//!   entity in memory and in a snapshot file
//! - [providers::aggregator::DetailAggregator] assembles the detail screen
//! - [session::BrowseSession] bundles the three for a front end

pub mod models;
pub mod providers;
pub mod session;
pub mod utils;

pub use pokedex_catalog;
