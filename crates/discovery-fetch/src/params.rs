use discovery_core::facets::FacetState;
use discovery_core::types::{EntityType, FacetQueryParams};

/// Maps a facet snapshot onto one collection's query parameters.
///
/// - recipe: text, tags, difficulty, time range
/// - community: text, tags
/// - user: text
pub fn query_params(
    entity_type: EntityType,
    facets: &FacetState,
    page_size: u32,
) -> FacetQueryParams {
    let text = Some(facets.query_text()).filter(|t| !t.is_empty()).map(str::to_string);
    let tags: Vec<String> = facets.tags().iter().cloned().collect();
    match entity_type {
        EntityType::Recipe => FacetQueryParams {
            text,
            tags,
            difficulty: facets.difficulty(),
            time_range: facets.time_range(),
            page_size,
        },
        EntityType::Community => {
            FacetQueryParams { text, tags, page_size, ..FacetQueryParams::default() }
        }
        EntityType::User => FacetQueryParams { text, page_size, ..FacetQueryParams::default() },
    }
}
