//! discovery-engine
//!
//! Orchestrates a discovery session: debounced query input, concurrent
//! per-collection fetches, merging, paging and optimistic engagement, all
//! published as one [`ViewModel`] through a [`StateStore`].

pub mod debounce;
pub mod engine;
pub mod store;
pub mod view;

pub use debounce::QueryDebouncer;
pub use engine::DiscoveryEngine;
pub use store::{StateStore, WatchStore};
pub use view::{EnginePhase, ViewModel};
