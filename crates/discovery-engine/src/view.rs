use std::collections::BTreeMap;

use discovery_core::error::FetchError;
use discovery_core::facets::FacetState;
use discovery_core::types::{EntityType, ItemKey, ResultItem};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnginePhase {
    /// No active query; nothing is fetched.
    #[default]
    Idle,
    /// First pages of a new search are in flight.
    Searching,
    /// Results are presented; more pages may be loading.
    Ready,
}

/// Everything the presentation layer renders, published after each state change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewModel {
    pub facets: FacetState,
    pub phase: EnginePhase,
    pub items: Vec<ResultItem>,
    pub is_searching: bool,
    pub is_loading_more: bool,
    pub has_more: bool,
    pub errors_by_entity_type: BTreeMap<EntityType, FetchError>,
    pub item_errors: BTreeMap<ItemKey, String>,
}

impl ViewModel {
    pub fn item(&self, key: &ItemKey) -> Option<&ResultItem> {
        self.items.iter().find(|i| i.entity_type == key.entity_type && i.id == key.id)
    }
}
