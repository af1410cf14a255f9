//! Immutable filter selection.
//!
//! Every control produces a new [`FacetState`] snapshot. Comparing two
//! snapshots with [`FacetState::is_search_equivalent`] tells the engine whether
//! it must refetch or may just re-sort what it already has.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::{Difficulty, EntitySet, EntityType, SortMode, TimeRange};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetState {
    free_text: String,
    entity_types: EntitySet,
    tags: BTreeSet<String>,
    difficulty: Option<Difficulty>,
    time_range: Option<TimeRange>,
    sort_mode: SortMode,
}

/// Partial change applied on top of a snapshot. `None` leaves a field as is;
/// `difficulty`/`time_range` use `Some(None)` to clear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetChange {
    pub free_text: Option<String>,
    pub entity_types: Option<EntitySet>,
    pub tags: Option<BTreeSet<String>>,
    pub difficulty: Option<Option<Difficulty>>,
    pub time_range: Option<Option<TimeRange>>,
    pub sort_mode: Option<SortMode>,
}

impl FacetChange {
    pub fn free_text(mut self, text: impl Into<String>) -> Self {
        self.free_text = Some(text.into());
        self
    }

    pub fn entity_types(mut self, types: EntitySet) -> Self {
        self.entity_types = Some(types);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = Some(tags.into_iter().filter_map(|t| normalize_tag(t.as_ref())).collect());
        self
    }

    pub fn difficulty(mut self, difficulty: Option<Difficulty>) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn time_range(mut self, time_range: Option<TimeRange>) -> Self {
        self.time_range = Some(time_range);
        self
    }

    pub fn sort_mode(mut self, sort_mode: SortMode) -> Self {
        self.sort_mode = Some(sort_mode);
        self
    }
}

/// Trimmed, lower-cased; empty tags are dropped.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().to_lowercase();
    if tag.is_empty() { None } else { Some(tag) }
}

impl FacetState {
    pub fn new(entity_types: EntitySet, sort_mode: SortMode) -> Self {
        Self { entity_types, sort_mode, ..Self::default() }
    }

    pub fn free_text(&self) -> &str {
        &self.free_text
    }

    /// The text that is actually sent to the backend.
    pub fn query_text(&self) -> &str {
        self.free_text.trim()
    }

    pub fn entity_types(&self) -> &EntitySet {
        &self.entity_types
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }

    pub fn time_range(&self) -> Option<TimeRange> {
        self.time_range
    }

    pub fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    pub fn apply(&self, change: FacetChange) -> FacetState {
        let mut next = self.clone();
        if let Some(text) = change.free_text {
            next.free_text = text;
        }
        if let Some(types) = change.entity_types {
            next.entity_types = types;
        }
        if let Some(tags) = change.tags {
            next.tags = tags;
        }
        if let Some(difficulty) = change.difficulty {
            next.difficulty = difficulty;
        }
        if let Some(time_range) = change.time_range {
            next.time_range = time_range;
        }
        if let Some(sort_mode) = change.sort_mode {
            next.sort_mode = sort_mode;
        }
        next
    }

    pub fn with_query(&self, text: impl Into<String>) -> FacetState {
        self.apply(FacetChange::default().free_text(text))
    }

    /// Adds the tag if absent, removes it if present. Blank tags are ignored.
    pub fn toggling_tag(&self, tag: &str) -> FacetState {
        let Some(tag) = normalize_tag(tag) else { return self.clone() };
        let mut tags = self.tags.clone();
        if !tags.remove(&tag) {
            tags.insert(tag);
        }
        self.apply(FacetChange { tags: Some(tags), ..FacetChange::default() })
    }

    /// Removing the last entity type is refused and returns an unchanged copy.
    pub fn toggling_entity_type(&self, entity_type: EntityType) -> FacetState {
        match self.entity_types.toggled(entity_type) {
            Some(types) => self.apply(FacetChange::default().entity_types(types)),
            None => self.clone(),
        }
    }

    pub fn with_difficulty(&self, difficulty: Option<Difficulty>) -> FacetState {
        self.apply(FacetChange::default().difficulty(difficulty))
    }

    pub fn with_time_range(&self, time_range: Option<TimeRange>) -> FacetState {
        self.apply(FacetChange::default().time_range(time_range))
    }

    pub fn with_sort_mode(&self, sort_mode: SortMode) -> FacetState {
        self.apply(FacetChange::default().sort_mode(sort_mode))
    }

    /// True when both snapshots would issue the same requests. Sort mode is
    /// client-side only and is ignored.
    pub fn is_search_equivalent(&self, other: &FacetState) -> bool {
        self.query_text() == other.query_text()
            && self.entity_types == other.entity_types
            && self.tags == other.tags
            && self.difficulty == other.difficulty
            && self.time_range == other.time_range
    }

    /// False means "no active query": fetching is suppressed entirely.
    pub fn has_active_query(&self) -> bool {
        !self.query_text().is_empty()
            || !self.tags.is_empty()
            || self.difficulty.is_some()
            || self.time_range.is_some()
    }
}
