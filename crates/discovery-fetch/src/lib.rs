//! discovery-fetch
//!
//! Turns a facet snapshot and a cursor into a normalized [`Page`] for one
//! collection. `native` holds the backend's per-collection record shapes;
//! nothing outside this crate depends on them.
//!
//! [`Page`]: discovery_core::types::Page

pub mod catalog;
pub mod fetcher;
pub mod native;
pub mod normalize;
pub mod params;

pub use catalog::MemoryCatalog;
pub use fetcher::ResultFetcher;
