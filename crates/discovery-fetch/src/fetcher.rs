use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use discovery_core::config::EngineConfig;
use discovery_core::error::{FetchCause, FetchError};
use discovery_core::facets::FacetState;
use discovery_core::traits::FetchCapability;
use discovery_core::types::{EntityType, Page, PageCursor};

use crate::normalize::normalize_records;
use crate::params::query_params;

/// Issues one bounded request per call and normalizes the response.
#[derive(Clone)]
pub struct ResultFetcher {
    capability: Arc<dyn FetchCapability>,
    page_size: u32,
    timeout: Duration,
}

impl ResultFetcher {
    pub fn new(capability: Arc<dyn FetchCapability>, page_size: u32, timeout: Duration) -> Self {
        Self { capability, page_size, timeout }
    }

    pub fn from_config(capability: Arc<dyn FetchCapability>, config: &EngineConfig) -> Self {
        Self::new(capability, config.page_size, config.fetch_timeout())
    }

    /// Fetches the page at `cursor`. On any failure the caller's cursor is
    /// the one to retry with; nothing is advanced.
    pub async fn fetch_page(
        &self,
        entity_type: EntityType,
        facets: &FacetState,
        cursor: &PageCursor,
    ) -> Result<Page, FetchError> {
        let params = query_params(entity_type, facets, self.page_size);
        if params.is_unconstrained() {
            debug!(entity = %entity_type, "no applicable filters, skipping collection");
            return Ok(Page {
                entity_type,
                items: Vec::new(),
                next_cursor: PageCursor { exhausted: true, ..cursor.clone() },
                is_last: true,
            });
        }

        debug!(entity = %entity_type, position = cursor.position, "fetching page");
        let request = self.capability.fetch(entity_type, &params, cursor);
        let raw = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(entity = %entity_type, error = %e, "fetch failed");
                return Err(FetchError::new(entity_type, FetchCause::Transport(e.message)));
            }
            Err(_) => {
                warn!(entity = %entity_type, timeout = ?self.timeout, "fetch timed out");
                return Err(FetchError::new(entity_type, FetchCause::Timeout(self.timeout)));
            }
        };

        let received = raw.records.len();
        let items = normalize_records(entity_type, raw.records, cursor.position)?;
        let page_size = usize::try_from(self.page_size).unwrap_or(usize::MAX);
        let is_last = raw.end_of_collection || received < page_size;
        let next_cursor = PageCursor {
            token: raw.next_token,
            position: cursor.position.saturating_add(u32::try_from(received).unwrap_or(u32::MAX)),
            exhausted: is_last,
        };
        debug!(entity = %entity_type, count = received, is_last, "page fetched");
        Ok(Page { entity_type, items, next_cursor, is_last })
    }
}
