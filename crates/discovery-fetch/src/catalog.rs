//! In-memory backend loaded from a directory of JSON files.
//!
//! Layout: `<dir>/recipes/**/*.json`, `<dir>/communities/**/*.json`,
//! `<dir>/users/**/*.json`. Each file holds one record or an array of records.
//! Serves pages with offset tokens and applies the same filters the real
//! backend does: case-insensitive text match, any-of tag match, difficulty and
//! cooking-time bucket.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

use discovery_core::error::TransportError;
use discovery_core::traits::{EngagementCapability, FetchCapability};
use discovery_core::types::{
    Direction, EngagementCounters, EngagementField, EntityType, FacetQueryParams, ItemKey,
    PageCursor, RawPage, TimeRange,
};

use crate::native::{RawCommunity, RawRecipe, RawUser};
use crate::normalize::Normalize;

#[derive(Debug, Clone, Default)]
pub struct CatalogRecords {
    pub recipes: Vec<RawRecipe>,
    pub communities: Vec<RawCommunity>,
    pub users: Vec<RawUser>,
}

/// One request the catalog served, kept for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogCall {
    pub entity_type: EntityType,
    pub params: FacetQueryParams,
    pub cursor: PageCursor,
}

#[derive(Default)]
pub struct MemoryCatalog {
    records: Mutex<CatalogRecords>,
    calls: Mutex<Vec<CatalogCall>>,
}

impl MemoryCatalog {
    pub fn new(records: CatalogRecords) -> Self {
        Self { records: Mutex::new(records), calls: Mutex::new(Vec::new()) }
    }

    pub fn load_dir(dir: &Path) -> Result<Self> {
        Self::load_dir_with(dir, |_, _, _| {})
    }

    /// Like [`MemoryCatalog::load_dir`], reporting `(done, total, path)` per file.
    pub fn load_dir_with(dir: &Path, mut on_file: impl FnMut(usize, usize, &Path)) -> Result<Self> {
        let files = list_json_files(dir);
        if files.is_empty() {
            warn!(dir = %dir.display(), "no catalog files found");
        }
        let mut records = CatalogRecords::default();
        for (index, path) in files.iter().enumerate() {
            on_file(index + 1, files.len(), path);
            let relative = path.strip_prefix(dir).unwrap_or(path);
            let collection = relative.components().next().and_then(|c| c.as_os_str().to_str());
            let Some(collection) = collection else { continue };
            let Ok(entity_type) = collection.parse::<EntityType>() else {
                warn!(path = %path.display(), "skipping file outside a known collection");
                continue;
            };
            let text =
                fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let value: Value = serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            let values = match value {
                Value::Array(values) => values,
                other => vec![other],
            };
            for value in values {
                match entity_type {
                    EntityType::Recipe => records.recipes.push(decode(value, entity_type, path)?),
                    EntityType::Community => {
                        records.communities.push(decode(value, entity_type, path)?)
                    }
                    EntityType::User => records.users.push(decode(value, entity_type, path)?),
                }
            }
        }
        info!(
            recipes = records.recipes.len(),
            communities = records.communities.len(),
            users = records.users.len(),
            "catalog loaded"
        );
        Ok(Self::new(records))
    }

    pub fn len(&self, entity_type: EntityType) -> usize {
        let records = self.lock_records();
        match entity_type {
            EntityType::Recipe => records.recipes.len(),
            EntityType::Community => records.communities.len(),
            EntityType::User => records.users.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        EntityType::ALL.iter().all(|t| self.len(*t) == 0)
    }

    pub fn calls(&self) -> Vec<CatalogCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn lock_records(&self) -> MutexGuard<'_, CatalogRecords> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn matching(
        &self,
        entity_type: EntityType,
        params: &FacetQueryParams,
    ) -> Result<Vec<Value>, TransportError> {
        let records = self.lock_records();
        let text = params.text.as_deref();
        let mut hits: Vec<(u8, usize, Value)> = Vec::new();
        match entity_type {
            EntityType::Recipe => {
                for (order, r) in records.recipes.iter().enumerate() {
                    let Some(score) = text_score(text, &r.name, &[r.description.as_str()]) else {
                        continue;
                    };
                    if !any_tag(&params.tags, &r.tags) {
                        continue;
                    }
                    if params.difficulty.is_some_and(|d| r.difficulty != Some(d)) {
                        continue;
                    }
                    let cooks_in = |range: TimeRange| {
                        r.cook_time_minutes.is_some_and(|minutes| range.contains(minutes))
                    };
                    if params.time_range.is_some_and(|range| !cooks_in(range)) {
                        continue;
                    }
                    hits.push((score, order, to_value(r)?));
                }
            }
            EntityType::Community => {
                for (order, c) in records.communities.iter().enumerate() {
                    let Some(score) = text_score(text, &c.name, &[c.about.as_str()]) else {
                        continue;
                    };
                    if !any_tag(&params.tags, &c.category_tags) {
                        continue;
                    }
                    hits.push((score, order, to_value(c)?));
                }
            }
            EntityType::User => {
                for (order, u) in records.users.iter().enumerate() {
                    let display = u.display_name.as_deref().unwrap_or_default();
                    let fields = [display, u.bio.as_str()];
                    let Some(score) = text_score(text, &u.username, &fields) else { continue };
                    hits.push((score, order, to_value(u)?));
                }
            }
        }
        hits.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        Ok(hits.into_iter().map(|(_, _, value)| value).collect())
    }
}

#[async_trait]
impl FetchCapability for MemoryCatalog {
    async fn fetch(
        &self,
        entity_type: EntityType,
        params: &FacetQueryParams,
        cursor: &PageCursor,
    ) -> Result<RawPage, TransportError> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(CatalogCall {
            entity_type,
            params: params.clone(),
            cursor: cursor.clone(),
        });
        let matches = self.matching(entity_type, params)?;
        let offset = match cursor.token.as_deref() {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| TransportError::new(format!("malformed cursor token '{token}'")))?,
            None => usize::try_from(cursor.position).unwrap_or(usize::MAX),
        };
        let page_size = usize::try_from(params.page_size).unwrap_or(usize::MAX);
        let records: Vec<Value> = matches.iter().skip(offset).take(page_size).cloned().collect();
        let end = offset.saturating_add(records.len());
        let end_of_collection = end >= matches.len();
        Ok(RawPage {
            records,
            next_token: if end_of_collection { None } else { Some(end.to_string()) },
            end_of_collection,
        })
    }
}

#[async_trait]
impl EngagementCapability for MemoryCatalog {
    async fn submit(
        &self,
        item_key: &ItemKey,
        field: EngagementField,
        direction: Direction,
    ) -> Result<Option<EngagementCounters>, TransportError> {
        let up = direction == Direction::Increment;
        let mut records = self.lock_records();
        let missing = || TransportError::new(format!("{item_key} does not exist"));
        let counters = match (item_key.entity_type, field) {
            (EntityType::Recipe, EngagementField::Likes) => {
                let r = records
                    .recipes
                    .iter_mut()
                    .find(|r| r.recipe_id.to_string() == item_key.id)
                    .ok_or_else(missing)?;
                r.likes_count = step(r.likes_count, up);
                r.liked_by_viewer = up;
                r.clone().into_item(0).counters
            }
            (EntityType::Community, EngagementField::Following) => {
                let c = records
                    .communities
                    .iter_mut()
                    .find(|c| c.slug == item_key.id)
                    .ok_or_else(missing)?;
                c.member_count = step(c.member_count, up);
                c.is_member = up;
                c.clone().into_item(0).counters
            }
            (EntityType::User, EngagementField::Following) => {
                let u = records
                    .users
                    .iter_mut()
                    .find(|u| u.username == item_key.id)
                    .ok_or_else(missing)?;
                u.follower_count = step(u.follower_count, up);
                u.followed_by_viewer = up;
                u.clone().into_item(0).counters
            }
            (entity_type, field) => {
                let message = format!("{field} is not supported for {entity_type}");
                return Err(TransportError::new(message));
            }
        };
        Ok(Some(counters))
    }
}

fn step(value: u64, up: bool) -> u64 {
    if up { value.saturating_add(1) } else { value.saturating_sub(1) }
}

fn to_value<T: Serialize>(record: &T) -> Result<Value, TransportError> {
    serde_json::to_value(record).map_err(|e| TransportError::new(e.to_string()))
}

/// `Some(2)` title hit, `Some(1)` body hit, `Some(0)` no text filter.
fn text_score(query: Option<&str>, title: &str, body: &[&str]) -> Option<u8> {
    let Some(query) = query else { return Some(0) };
    let query = query.to_lowercase();
    if title.to_lowercase().contains(&query) {
        Some(2)
    } else if body.iter().any(|b| b.to_lowercase().contains(&query)) {
        Some(1)
    } else {
        None
    }
}

fn decode<T: DeserializeOwned>(value: Value, entity_type: EntityType, path: &Path) -> Result<T> {
    serde_json::from_value(value)
        .with_context(|| format!("decoding {entity_type} record in {}", path.display()))
}

// Any selected tag matches.
fn any_tag(selected: &[String], tags: &[String]) -> bool {
    selected.is_empty() || tags.iter().any(|t| selected.contains(&t.to_lowercase()))
}

fn list_json_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let entries = walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok());
    for entry in entries.filter(|e| e.file_type().is_file()) {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    files
}
