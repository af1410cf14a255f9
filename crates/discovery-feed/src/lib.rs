//! discovery-feed
//!
//! Client-side feed state: the deduplicated, sorted working set, per-collection
//! pagination, and the optimistic engagement overlay. Everything here is
//! synchronous; the engine decides when to call it.

pub mod aggregator;
pub mod engagement;
pub mod pagination;

pub use aggregator::{MergeMode, ResultAggregator, WorkingSet};
pub use engagement::EngagementOverlay;
pub use pagination::{PagerState, PaginationController};
