//! Merging per-collection pages into one ordered working set.
//!
//! # Ordering
//!
//! The active sort key first, then `source_rank` asc, `created_at` desc, `id`
//! asc and entity type. The chain is total, so merging identical inputs
//! always yields the same order.
//!
//! # Deduplication
//!
//! By [`ItemKey`]. The first copy seen wins: pages are visited in entity-type
//! declaration order, and on append the copy already in the set is kept so
//! its engagement state is not overwritten by a staler refetch.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use discovery_core::types::{EntityType, ItemKey, Page, ResultItem, SortMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// New search: the previous working set is discarded.
    Replace,
    /// Load more: new items are inserted among the existing ones.
    Append,
}

/// Ordered, duplicate-free sequence of results currently presented.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingSet {
    items: Vec<ResultItem>,
    keys: HashSet<ItemKey>,
}

impl WorkingSet {
    pub fn items(&self) -> &[ResultItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, key: &ItemKey) -> bool {
        self.keys.contains(key)
    }

    pub fn get(&self, key: &ItemKey) -> Option<&ResultItem> {
        if !self.contains(key) {
            return None;
        }
        self.items.iter().find(|i| i.entity_type == key.entity_type && i.id == key.id)
    }

    pub(crate) fn get_mut(&mut self, key: &ItemKey) -> Option<&mut ResultItem> {
        if !self.contains(key) {
            return None;
        }
        self.items.iter_mut().find(|i| i.entity_type == key.entity_type && i.id == key.id)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.keys.clear();
    }

    /// Inserts at the sorted position unless the key is already present.
    fn insert_sorted(&mut self, item: ResultItem, sort_mode: SortMode) -> bool {
        if !self.keys.insert(item.key()) {
            return false;
        }
        let at = self
            .items
            .partition_point(|existing| compare(existing, &item, sort_mode) == Ordering::Less);
        self.items.insert(at, item);
        true
    }
}

/// Stable total order for `sort_mode`.
pub fn compare(a: &ResultItem, b: &ResultItem, sort_mode: SortMode) -> Ordering {
    let primary = match sort_mode {
        SortMode::Relevance => Ordering::Equal,
        SortMode::Newest => b.created_at.cmp(&a.created_at),
        SortMode::Popular => b.counters.popularity().cmp(&a.counters.popularity()),
    };
    primary
        .then_with(|| a.source_rank.cmp(&b.source_rank))
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.entity_type.cmp(&b.entity_type))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn merge(
        &self,
        existing: WorkingSet,
        new_pages: BTreeMap<EntityType, Page>,
        sort_mode: SortMode,
        mode: MergeMode,
    ) -> WorkingSet {
        let mut set = match mode {
            MergeMode::Replace => WorkingSet::default(),
            MergeMode::Append => existing,
        };
        let before = set.len();
        let mut incoming = 0usize;
        let mut duplicates = 0usize;

        match mode {
            MergeMode::Replace => {
                for page in new_pages.into_values() {
                    for item in page.items {
                        incoming += 1;
                        if set.keys.insert(item.key()) {
                            set.items.push(item);
                        } else {
                            duplicates += 1;
                        }
                    }
                }
                set.items.sort_by(|a, b| compare(a, b, sort_mode));
            }
            MergeMode::Append => {
                // Counters may have moved since the last sort; insertion
                // needs the existing items in order.
                set.items.sort_by(|a, b| compare(a, b, sort_mode));
                for page in new_pages.into_values() {
                    for item in page.items {
                        incoming += 1;
                        if !set.insert_sorted(item, sort_mode) {
                            duplicates += 1;
                        }
                    }
                }
            }
        }

        debug!(
            ?mode,
            ?sort_mode,
            before,
            incoming,
            duplicates,
            after = set.len(),
            "merged pages into working set"
        );
        set
    }

    /// Re-applies the stable sort only. Used when nothing but the sort mode changed.
    pub fn resort(&self, set: &mut WorkingSet, sort_mode: SortMode) {
        set.items.sort_by(|a, b| compare(a, b, sort_mode));
    }
}
