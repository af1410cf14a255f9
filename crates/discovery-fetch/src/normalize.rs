use serde::de::DeserializeOwned;
use serde_json::Value;

use discovery_core::error::{FetchCause, FetchError};
use discovery_core::types::{EngagementCounters, EntityType, ResultItem, ViewerFlags};

use crate::native::{RawCommunity, RawRecipe, RawUser};

/// Maps a backend record onto the common result shape.
pub trait Normalize {
    fn into_item(self, source_rank: u32) -> ResultItem;
}

impl Normalize for RawRecipe {
    fn into_item(self, source_rank: u32) -> ResultItem {
        ResultItem {
            id: self.recipe_id.to_string(),
            entity_type: EntityType::Recipe,
            title: self.name,
            summary: self.description,
            thumbnail_uri: self.image_url,
            author_ref: self.author_username,
            counters: EngagementCounters {
                likes: self.likes_count,
                comments: self.comments_count,
                ..EngagementCounters::default()
            },
            tags: self.tags,
            created_at: self.created_at,
            source_rank,
            viewer: ViewerFlags { liked: self.liked_by_viewer, following: false },
        }
    }
}

impl Normalize for RawCommunity {
    fn into_item(self, source_rank: u32) -> ResultItem {
        ResultItem {
            id: self.slug,
            entity_type: EntityType::Community,
            title: self.name,
            summary: self.about,
            thumbnail_uri: self.banner_url,
            author_ref: self.owner,
            counters: EngagementCounters {
                members: self.member_count,
                ..EngagementCounters::default()
            },
            tags: self.category_tags,
            created_at: self.created,
            source_rank,
            viewer: ViewerFlags { liked: false, following: self.is_member },
        }
    }
}

impl Normalize for RawUser {
    fn into_item(self, source_rank: u32) -> ResultItem {
        let title = self.display_name.clone().unwrap_or_else(|| self.username.clone());
        ResultItem {
            id: self.username.clone(),
            entity_type: EntityType::User,
            title,
            summary: self.bio,
            thumbnail_uri: self.avatar_url,
            author_ref: Some(self.username),
            counters: EngagementCounters {
                followers: self.follower_count,
                ..EngagementCounters::default()
            },
            tags: Vec::new(),
            created_at: self.joined_at,
            source_rank,
            viewer: ViewerFlags { liked: false, following: self.followed_by_viewer },
        }
    }
}

fn decode<T: DeserializeOwned + Normalize>(
    record: Value,
    source_rank: u32,
) -> Result<ResultItem, serde_json::Error> {
    serde_json::from_value::<T>(record).map(|raw| raw.into_item(source_rank))
}

/// Decodes a page of records. Ranks continue from `first_rank`; one bad
/// record fails the whole page so the cursor is not advanced past it.
pub fn normalize_records(
    entity_type: EntityType,
    records: Vec<Value>,
    first_rank: u32,
) -> Result<Vec<ResultItem>, FetchError> {
    let mut items = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let rank = first_rank.saturating_add(u32::try_from(index).unwrap_or(u32::MAX));
        let decoded = match entity_type {
            EntityType::Recipe => decode::<RawRecipe>(record, rank),
            EntityType::Community => decode::<RawCommunity>(record, rank),
            EntityType::User => decode::<RawUser>(record, rank),
        };
        let item = decoded.map_err(|e| {
            FetchError::new(entity_type, FetchCause::Decode(format!("record {index}: {e}")))
        })?;
        items.push(item);
    }
    Ok(items)
}
