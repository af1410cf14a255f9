//! Domain types shared by the fetcher, the feed state and the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A searchable collection on the backend.
///
/// Declaration order is the canonical order used for fan-out, error maps and
/// deduplication precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Recipe,
    Community,
    User,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [EntityType::Recipe, EntityType::Community, EntityType::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recipe => "recipe",
            Self::Community => "community",
            Self::User => "user",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recipe" | "recipes" => Ok(Self::Recipe),
            "community" | "communities" => Ok(Self::Community),
            "user" | "users" => Ok(Self::User),
            other => Err(Error::InvalidValue(format!("unknown entity type '{other}'"))),
        }
    }
}

/// Non-empty set of entity types. At least one collection is always searched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<EntityType>", into = "Vec<EntityType>")]
pub struct EntitySet(BTreeSet<EntityType>);

impl EntitySet {
    /// Returns `None` when `types` is empty.
    pub fn new(types: impl IntoIterator<Item = EntityType>) -> Option<Self> {
        let set: BTreeSet<EntityType> = types.into_iter().collect();
        if set.is_empty() { None } else { Some(Self(set)) }
    }

    pub fn all() -> Self {
        Self(EntityType::ALL.into_iter().collect())
    }

    pub fn single(entity_type: EntityType) -> Self {
        Self(BTreeSet::from([entity_type]))
    }

    pub fn contains(&self, entity_type: EntityType) -> bool {
        self.0.contains(&entity_type)
    }

    /// Iterates in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = EntityType> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Never true; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Adds or removes `entity_type`. Removing the last type yields `None`.
    pub fn toggled(&self, entity_type: EntityType) -> Option<Self> {
        let mut set = self.0.clone();
        if !set.remove(&entity_type) {
            set.insert(entity_type);
        }
        Self::new(set)
    }
}

impl Default for EntitySet {
    fn default() -> Self {
        Self::all()
    }
}

impl TryFrom<Vec<EntityType>> for EntitySet {
    type Error = Error;

    fn try_from(types: Vec<EntityType>) -> Result<Self, Self::Error> {
        Self::new(types)
            .ok_or_else(|| Error::InvalidValue("entity type set must not be empty".to_string()))
    }
}

impl From<EntitySet> for Vec<EntityType> {
    fn from(set: EntitySet) -> Self {
        set.0.into_iter().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(Error::InvalidValue(format!("unknown difficulty '{other}'"))),
        }
    }
}

/// Total cooking time bucket, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    Under15,
    Under30,
    Under60,
    Over60,
}

impl TimeRange {
    pub fn contains(&self, minutes: u32) -> bool {
        match self {
            Self::Under15 => minutes <= 15,
            Self::Under30 => minutes <= 30,
            Self::Under60 => minutes <= 60,
            Self::Over60 => minutes > 60,
        }
    }
}

impl FromStr for TimeRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "under15" | "under_15" => Ok(Self::Under15),
            "under30" | "under_30" => Ok(Self::Under30),
            "under60" | "under_60" => Ok(Self::Under60),
            "over60" | "over_60" => Ok(Self::Over60),
            other => Err(Error::InvalidValue(format!("unknown time range '{other}'"))),
        }
    }
}

/// Client-side ordering of the working set. Never sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Relevance,
    Newest,
    Popular,
}

impl FromStr for SortMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relevance" => Ok(Self::Relevance),
            "newest" => Ok(Self::Newest),
            "popular" => Ok(Self::Popular),
            other => Err(Error::InvalidValue(format!("unknown sort mode '{other}'"))),
        }
    }
}

/// Global identity of a result: ids are only unique within their entity type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub entity_type: EntityType,
    pub id: String,
}

impl ItemKey {
    pub fn new(entity_type: EntityType, id: impl Into<String>) -> Self {
        Self { entity_type, id: id.into() }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounters {
    pub likes: u64,
    pub comments: u64,
    pub members: u64,
    pub followers: u64,
}

impl EngagementCounters {
    /// Score used by the `popular` sort mode.
    pub fn popularity(&self) -> u64 {
        self.likes + self.comments + self.members + self.followers
    }
}

/// Current viewer's relationship to an item, as last known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerFlags {
    pub liked: bool,
    pub following: bool,
}

/// Normalized superset shape for recipes, communities and users.
///
/// - `source_rank`: backend order within the entity's collection, lower is
///   more relevant; continues across pages
/// - `counters`: only the counters meaningful for the entity type are non-zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    pub id: String,
    pub entity_type: EntityType,
    pub title: String,
    pub summary: String,
    pub thumbnail_uri: Option<String>,
    pub author_ref: Option<String>,
    pub counters: EngagementCounters,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub source_rank: u32,
    pub viewer: ViewerFlags,
}

impl ResultItem {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.entity_type, self.id.clone())
    }
}

/// Per-collection position. `token` is opaque; `None` means page 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    pub token: Option<String>,
    pub position: u32,
    pub exhausted: bool,
}

impl PageCursor {
    pub fn first_page() -> Self {
        Self::default()
    }

    pub fn is_first_page(&self) -> bool {
        self.token.is_none() && self.position == 0
    }
}

/// A normalized page for one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub entity_type: EntityType,
    pub items: Vec<ResultItem>,
    pub next_cursor: PageCursor,
    pub is_last: bool,
}

/// What the fetch capability hands back before decoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPage {
    pub records: Vec<serde_json::Value>,
    pub next_token: Option<String>,
    #[serde(default)]
    pub end_of_collection: bool,
}

/// Query parameters for one collection, derived from a facet snapshot.
/// Facets that are meaningless for the collection are already dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetQueryParams {
    pub text: Option<String>,
    pub tags: Vec<String>,
    pub difficulty: Option<Difficulty>,
    pub time_range: Option<TimeRange>,
    pub page_size: u32,
}

impl FacetQueryParams {
    /// No filter survived the per-collection mapping.
    pub fn is_unconstrained(&self) -> bool {
        self.text.is_none()
            && self.tags.is_empty()
            && self.difficulty.is_none()
            && self.time_range.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementField {
    Likes,
    Following,
}

impl fmt::Display for EngagementField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Likes => "likes",
            Self::Following => "following",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaState {
    Pending,
    Confirmed,
    RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeltaId(pub u64);

impl fmt::Display for DeltaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delta#{}", self.0)
    }
}

/// One optimistic engagement mutation and its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagementDelta {
    pub id: DeltaId,
    pub item_key: ItemKey,
    pub field: EngagementField,
    pub direction: Direction,
    pub state: DeltaState,
}
