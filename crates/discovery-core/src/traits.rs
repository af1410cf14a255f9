use async_trait::async_trait;

use crate::error::TransportError;
use crate::types::{
    Direction, EngagementCounters, EngagementField, EntityType, FacetQueryParams, ItemKey,
    PageCursor, RawPage,
};

/// Backend query capability. Implementations own URLs, HTTP and auth; the
/// engine only hands over parameters and a cursor.
#[async_trait]
pub trait FetchCapability: Send + Sync {
    async fn fetch(
        &self,
        entity_type: EntityType,
        params: &FacetQueryParams,
        cursor: &PageCursor,
    ) -> Result<RawPage, TransportError>;
}

/// Backend mutation capability for likes and follows.
///
/// Returns the server's view of the item's counters when it has one.
#[async_trait]
pub trait EngagementCapability: Send + Sync {
    async fn submit(
        &self,
        item_key: &ItemKey,
        field: EngagementField,
        direction: Direction,
    ) -> Result<Option<EngagementCounters>, TransportError>;
}
