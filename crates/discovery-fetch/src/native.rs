//! Backend record shapes, one per collection.
//!
//! Field names follow the backend's API. Only `normalize` and the in-memory
//! catalog (which plays the backend) look at these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use discovery_core::types::Difficulty;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecipe {
    pub recipe_id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub image_url: Option<String>,
    pub author_username: Option<String>,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub comments_count: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub difficulty: Option<Difficulty>,
    pub cook_time_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub liked_by_viewer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCommunity {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub about: String,
    pub banner_url: Option<String>,
    pub owner: Option<String>,
    #[serde(default)]
    pub member_count: u64,
    #[serde(default)]
    pub category_tags: Vec<String>,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub is_member: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawUser {
    pub username: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: String,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub follower_count: u64,
    pub joined_at: DateTime<Utc>,
    #[serde(default)]
    pub followed_by_viewer: bool,
}
