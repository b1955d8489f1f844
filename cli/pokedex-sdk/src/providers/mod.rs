pub mod aggregator;
pub mod detail_cache;
