//! Per-collection paging state.
//!
//! Each selected entity type owns one pager: `Idle` → `Fetching` → `Idle`
//! again, or `Exhausted` once the backend reports the last page. A failed
//! request puts the pager back to `Idle` with its cursor untouched and marks
//! it retryable.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use discovery_core::types::{EntitySet, EntityType, PageCursor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerState {
    Idle,
    Fetching,
    Exhausted,
}

#[derive(Debug, Clone)]
struct Pager {
    state: PagerState,
    cursor: PageCursor,
    retryable: bool,
}

impl Pager {
    fn fresh() -> Self {
        Self { state: PagerState::Idle, cursor: PageCursor::first_page(), retryable: false }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaginationController {
    pagers: BTreeMap<EntityType, Pager>,
}

impl PaginationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts over on the first page for exactly `entity_types`.
    pub fn reset(&mut self, entity_types: &EntitySet) {
        self.pagers = entity_types.iter().map(|t| (t, Pager::fresh())).collect();
        debug!(collections = self.pagers.len(), "pagination reset");
    }

    pub fn clear(&mut self) {
        self.pagers.clear();
    }

    /// Moves an idle pager to `Fetching` and hands out the cursor to request.
    /// `None` when the pager is unknown, already fetching, or exhausted.
    pub fn request_more(&mut self, entity_type: EntityType) -> Option<PageCursor> {
        let pager = self.pagers.get_mut(&entity_type)?;
        if pager.state != PagerState::Idle {
            trace!(entity = %entity_type, state = ?pager.state, "request ignored");
            return None;
        }
        pager.state = PagerState::Fetching;
        Some(pager.cursor.clone())
    }

    /// Records a successful page. Returns `false` if the pager was not
    /// waiting for one, in which case nothing changes.
    pub fn complete(
        &mut self,
        entity_type: EntityType,
        next_cursor: PageCursor,
        is_last: bool,
    ) -> bool {
        let Some(pager) = self.pagers.get_mut(&entity_type) else { return false };
        if pager.state != PagerState::Fetching {
            return false;
        }
        pager.cursor = PageCursor { exhausted: is_last, ..next_cursor };
        pager.state = if is_last { PagerState::Exhausted } else { PagerState::Idle };
        pager.retryable = false;
        true
    }

    /// Records a failed request. The cursor stays where it was.
    pub fn fail(&mut self, entity_type: EntityType) -> bool {
        let Some(pager) = self.pagers.get_mut(&entity_type) else { return false };
        if pager.state != PagerState::Fetching {
            return false;
        }
        pager.state = PagerState::Idle;
        pager.retryable = true;
        true
    }

    pub fn state(&self, entity_type: EntityType) -> Option<PagerState> {
        self.pagers.get(&entity_type).map(|p| p.state)
    }

    pub fn cursor(&self, entity_type: EntityType) -> Option<&PageCursor> {
        self.pagers.get(&entity_type).map(|p| &p.cursor)
    }

    pub fn is_retryable(&self, entity_type: EntityType) -> bool {
        self.pagers.get(&entity_type).is_some_and(|p| p.retryable)
    }

    pub fn has_any_more(&self) -> bool {
        self.pagers.values().any(|p| p.state != PagerState::Exhausted)
    }

    pub fn is_fetching_any(&self) -> bool {
        self.pagers.values().any(|p| p.state == PagerState::Fetching)
    }

    /// Collections that could be asked for another page right now.
    pub fn idle(&self) -> Vec<EntityType> {
        self.pagers.iter().filter(|(_, p)| p.state == PagerState::Idle).map(|(t, _)| *t).collect()
    }

    pub fn retryable(&self) -> Vec<EntityType> {
        self.pagers
            .iter()
            .filter(|(_, p)| p.retryable && p.state == PagerState::Idle)
            .map(|(t, _)| *t)
            .collect()
    }
}
