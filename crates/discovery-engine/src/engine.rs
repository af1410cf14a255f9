//! Discovery session orchestrator.
//!
//! # State
//!
//! All session state lives in one [`EngineState`] behind a `std::sync::Mutex`.
//! Every control and every task completion takes the lock, mutates, publishes
//! the resulting view model and releases it; the lock is never held across an
//! `.await`. Observers therefore only ever see whole transitions.
//!
//! # Searches
//!
//! A search is identified by a generation number. Each spawned fetch carries
//! the generation it was issued for; a result whose generation is no longer
//! current is dropped on arrival. Nothing is aborted: superseded requests
//! simply finish into the void.
//!
//! First pages of a search are collected until every selected collection has
//! answered (or failed) and then merged in one replace. Pages from load more
//! are appended as each one arrives.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::error::Elapsed;
use tracing::{debug, info, warn};

use discovery_core::config::EngineConfig;
use discovery_core::error::{FetchError, Result};
use discovery_core::facets::FacetState;
use discovery_core::traits::{EngagementCapability, FetchCapability};
use discovery_core::types::{
    Difficulty, Direction, EngagementCounters, EngagementDelta, EngagementField, EntitySet,
    EntityType, ItemKey, Page, PageCursor, SortMode, TimeRange,
};
use discovery_core::TransportError;
use discovery_fetch::ResultFetcher;
use discovery_feed::{
    EngagementOverlay, MergeMode, PaginationController, ResultAggregator, WorkingSet,
};

use crate::debounce::QueryDebouncer;
use crate::store::StateStore;
use crate::view::{EnginePhase, ViewModel};

type Submission = std::result::Result<
    std::result::Result<Option<EngagementCounters>, TransportError>,
    Elapsed,
>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    Search,
    More,
}

#[derive(Debug, Default)]
struct SearchBatch {
    awaiting: BTreeSet<EntityType>,
    pages: BTreeMap<EntityType, Page>,
}

struct EngineState {
    facets: FacetState,
    /// Snapshot the current results were requested for.
    searched: Option<FacetState>,
    generation: u64,
    phase: EnginePhase,
    working_set: WorkingSet,
    pagination: PaginationController,
    overlay: EngagementOverlay,
    errors: BTreeMap<EntityType, FetchError>,
    item_errors: BTreeMap<ItemKey, String>,
    batch: Option<SearchBatch>,
    search_scheduled: bool,
    in_flight: usize,
}

impl EngineState {
    fn new(facets: FacetState) -> Self {
        Self {
            facets,
            searched: None,
            generation: 0,
            phase: EnginePhase::Idle,
            working_set: WorkingSet::default(),
            pagination: PaginationController::new(),
            overlay: EngagementOverlay::new(),
            errors: BTreeMap::new(),
            item_errors: BTreeMap::new(),
            batch: None,
            search_scheduled: false,
            in_flight: 0,
        }
    }

    fn view(&self) -> ViewModel {
        let ready = self.phase == EnginePhase::Ready;
        ViewModel {
            facets: self.facets.clone(),
            phase: self.phase,
            items: self.working_set.items().to_vec(),
            is_searching: self.phase == EnginePhase::Searching,
            is_loading_more: ready && self.pagination.is_fetching_any(),
            has_more: ready && self.pagination.has_any_more(),
            errors_by_entity_type: self.errors.clone(),
            item_errors: self.item_errors.clone(),
        }
    }

    fn is_settled(&self) -> bool {
        !self.search_scheduled && self.in_flight == 0
    }

    /// Back to the no-query state. Bumping the generation orphans anything in flight.
    fn reset_idle(&mut self) {
        self.generation += 1;
        self.searched = None;
        self.phase = EnginePhase::Idle;
        self.working_set.clear();
        self.pagination.clear();
        self.errors.clear();
        self.item_errors.clear();
        self.batch = None;
        self.search_scheduled = false;
    }

    fn finish_search(&mut self, aggregator: &ResultAggregator) {
        let batch = self.batch.take().unwrap_or_default();
        self.overlay.detach_all();
        let previous = std::mem::take(&mut self.working_set);
        self.working_set =
            aggregator.merge(previous, batch.pages, self.facets.sort_mode(), MergeMode::Replace);
        self.overlay.reapply(&mut self.working_set);
        let working_set = &self.working_set;
        self.item_errors.retain(|key, _| working_set.contains(key));
        self.phase = EnginePhase::Ready;
        info!(
            generation = self.generation,
            count = self.working_set.len(),
            failed = self.errors.len(),
            "search settled"
        );
    }

    fn append_page(&mut self, aggregator: &ResultAggregator, page: Page) {
        let previous = std::mem::take(&mut self.working_set);
        let pages = BTreeMap::from([(page.entity_type, page)]);
        self.working_set =
            aggregator.merge(previous, pages, self.facets.sort_mode(), MergeMode::Append);
        self.overlay.reapply(&mut self.working_set);
    }

    fn engage(
        &mut self,
        key: &ItemKey,
        field: EngagementField,
        direction: Direction,
    ) -> Result<EngagementDelta> {
        self.overlay.apply_optimistic(&mut self.working_set, key, field, direction)
    }

    fn engagement_confirmed(
        &mut self,
        delta: &EngagementDelta,
        counters: Option<EngagementCounters>,
    ) {
        if let Err(e) = self.overlay.confirm(delta.id) {
            warn!(delta = %delta.id, error = %e, "confirmation for untracked delta");
            return;
        }
        if let Some(counters) = counters {
            self.overlay.reconcile(&mut self.working_set, &delta.item_key, counters);
        }
        self.item_errors.remove(&delta.item_key);
    }

    fn engagement_failed(&mut self, delta: &EngagementDelta, reason: String) {
        if let Err(e) = self.overlay.rollback(&mut self.working_set, delta.id) {
            warn!(delta = %delta.id, error = %e, "rollback for untracked delta");
            return;
        }
        self.item_errors.insert(delta.item_key.clone(), reason);
    }
}

struct Inner {
    fetcher: ResultFetcher,
    engagement: Arc<dyn EngagementCapability>,
    store: Arc<dyn StateStore>,
    debouncer: QueryDebouncer,
    aggregator: ResultAggregator,
    timeout: Duration,
    state: Mutex<EngineState>,
    settled: Notify,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &EngineState) {
        self.store.publish(&state.view());
        if state.is_settled() {
            self.settled.notify_waiters();
        }
    }

    fn start_search(self: &Arc<Self>) {
        let mut state = self.lock();
        state.search_scheduled = false;
        if !state.facets.has_active_query() {
            self.publish(&state);
            return;
        }
        state.generation += 1;
        let generation = state.generation;
        let facets = state.facets.clone();
        state.searched = Some(facets.clone());
        state.pagination.reset(facets.entity_types());
        state.errors.clear();
        state.phase = EnginePhase::Searching;
        state.batch = Some(SearchBatch {
            awaiting: facets.entity_types().iter().collect(),
            pages: BTreeMap::new(),
        });
        info!(
            generation,
            query = facets.query_text(),
            collections = facets.entity_types().len(),
            "search started"
        );

        for entity_type in facets.entity_types().iter() {
            if let Some(cursor) = state.pagination.request_more(entity_type) {
                self.spawn_fetch(&mut state, FetchKind::Search, entity_type, cursor);
            }
        }
        self.publish(&state);
    }

    /// Requests the next page of each collection in `entity_types` that is idle.
    fn fetch_more(
        self: &Arc<Self>,
        state: &mut EngineState,
        entity_types: Vec<EntityType>,
    ) -> usize {
        let mut issued = 0;
        for entity_type in entity_types {
            if let Some(cursor) = state.pagination.request_more(entity_type) {
                self.spawn_fetch(state, FetchKind::More, entity_type, cursor);
                issued += 1;
            }
        }
        issued
    }

    fn spawn_fetch(
        self: &Arc<Self>,
        state: &mut EngineState,
        kind: FetchKind,
        entity_type: EntityType,
        cursor: PageCursor,
    ) {
        let Some(facets) = state.searched.clone() else { return };
        let generation = state.generation;
        state.in_flight += 1;
        debug!(
            generation,
            entity = %entity_type,
            ?kind,
            position = cursor.position,
            "fetch issued"
        );
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = inner.fetcher.fetch_page(entity_type, &facets, &cursor).await;
            inner.on_page(generation, kind, entity_type, result);
        });
    }

    fn on_page(
        &self,
        generation: u64,
        kind: FetchKind,
        entity_type: EntityType,
        result: std::result::Result<Page, FetchError>,
    ) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        if generation != state.generation {
            debug!(
                generation,
                current = state.generation,
                entity = %entity_type,
                "stale page discarded"
            );
            if state.is_settled() {
                self.settled.notify_waiters();
            }
            return;
        }

        match result {
            Ok(page) => {
                state.pagination.complete(entity_type, page.next_cursor.clone(), page.is_last);
                state.errors.remove(&entity_type);
                debug!(
                    generation,
                    entity = %entity_type,
                    count = page.items.len(),
                    is_last = page.is_last,
                    "page received"
                );
                match kind {
                    FetchKind::Search => {
                        if let Some(batch) = state.batch.as_mut() {
                            batch.pages.insert(entity_type, page);
                        }
                    }
                    FetchKind::More => state.append_page(&self.aggregator, page),
                }
            }
            Err(e) => {
                warn!(generation, entity = %entity_type, error = %e, "collection fetch failed");
                state.pagination.fail(entity_type);
                state.errors.insert(entity_type, e);
            }
        }

        if kind == FetchKind::Search {
            let done = state.batch.as_mut().is_some_and(|batch| {
                batch.awaiting.remove(&entity_type);
                batch.awaiting.is_empty()
            });
            if done {
                state.finish_search(&self.aggregator);
            }
        }
        self.publish(&state);
    }

    fn on_engagement(&self, delta: &EngagementDelta, outcome: Submission) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        match outcome {
            Ok(Ok(counters)) => {
                debug!(delta = %delta.id, key = %delta.item_key, "engagement accepted");
                state.engagement_confirmed(delta, counters);
            }
            Ok(Err(e)) => {
                warn!(delta = %delta.id, key = %delta.item_key, error = %e, "engagement rejected");
                state.engagement_failed(delta, e.message);
            }
            Err(_) => {
                warn!(
                    delta = %delta.id,
                    key = %delta.item_key,
                    timeout = ?self.timeout,
                    "engagement timed out"
                );
                state.engagement_failed(delta, format!("timed out after {:?}", self.timeout));
            }
        }
        self.publish(&state);
    }
}

/// Handle to one discovery session. Cheap to clone; clones share the session.
///
/// Controls must be called from within a tokio runtime: searches, pages and
/// engagement submissions run as spawned tasks.
#[derive(Clone)]
pub struct DiscoveryEngine {
    inner: Arc<Inner>,
}

impl DiscoveryEngine {
    pub fn new(
        fetch: Arc<dyn FetchCapability>,
        engagement: Arc<dyn EngagementCapability>,
        store: Arc<dyn StateStore>,
        config: &EngineConfig,
    ) -> Self {
        let facets = FacetState::new(config.default_entity_types.clone(), config.default_sort);
        let inner = Arc::new(Inner {
            fetcher: ResultFetcher::from_config(fetch, config),
            engagement,
            store,
            debouncer: QueryDebouncer::new(config.debounce()),
            aggregator: ResultAggregator::new(),
            timeout: config.fetch_timeout(),
            state: Mutex::new(EngineState::new(facets)),
            settled: Notify::new(),
        });
        inner.publish(&inner.lock());
        Self { inner }
    }

    pub fn view(&self) -> ViewModel {
        self.inner.lock().view()
    }

    pub fn facets(&self) -> FacetState {
        self.inner.lock().facets.clone()
    }

    pub fn set_query(&self, text: &str) {
        self.update_facets(|f| f.with_query(text));
    }

    pub fn toggle_tag(&self, tag: &str) {
        self.update_facets(|f| f.toggling_tag(tag));
    }

    pub fn set_difficulty(&self, difficulty: Option<Difficulty>) {
        self.update_facets(|f| f.with_difficulty(difficulty));
    }

    pub fn set_time_range(&self, time_range: Option<TimeRange>) {
        self.update_facets(|f| f.with_time_range(time_range));
    }

    pub fn set_sort_mode(&self, sort_mode: SortMode) {
        self.update_facets(|f| f.with_sort_mode(sort_mode));
    }

    pub fn set_entity_types(&self, entity_types: EntitySet) {
        self.update_facets(|f| {
            f.apply(discovery_core::FacetChange::default().entity_types(entity_types))
        });
    }

    /// Deselecting the last selected type is ignored.
    pub fn toggle_entity_type(&self, entity_type: EntityType) {
        self.update_facets(|f| f.toggling_entity_type(entity_type));
    }

    fn update_facets(&self, change: impl FnOnce(&FacetState) -> FacetState) {
        let mut state = self.inner.lock();
        let next = change(&state.facets);
        if next == state.facets {
            return;
        }
        state.facets = next;

        if !state.facets.has_active_query() {
            self.inner.debouncer.cancel();
            state.reset_idle();
            debug!(generation = state.generation, "query cleared");
        } else {
            if state.searched.as_ref().is_some_and(|s| s.is_search_equivalent(&state.facets)) {
                if self.inner.debouncer.cancel() {
                    debug!("pending search dropped, results already match");
                }
                state.search_scheduled = false;
            } else {
                state.search_scheduled = true;
                let weak = Arc::downgrade(&self.inner);
                self.inner.debouncer.schedule(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.start_search();
                    }
                });
            }
            // Results on screen follow the sort mode even while a search is pending.
            let sort_mode = state.facets.sort_mode();
            let st = &mut *state;
            self.inner.aggregator.resort(&mut st.working_set, sort_mode);
        }
        self.inner.publish(&state);
    }

    /// Searches now instead of waiting for the debounce delay. With nothing
    /// pending, re-runs the current search. Returns whether a search started.
    pub fn submit(&self) -> bool {
        if self.inner.debouncer.flush() {
            return true;
        }
        if !self.inner.lock().facets.has_active_query() {
            return false;
        }
        self.inner.start_search();
        true
    }

    /// Requests the next page of every collection that is neither exhausted
    /// nor already fetching. Returns the number of fetches issued.
    pub fn load_more(&self) -> usize {
        let mut state = self.inner.lock();
        if state.phase != EnginePhase::Ready {
            return 0;
        }
        let idle = state.pagination.idle();
        let issued = self.inner.fetch_more(&mut state, idle);
        if issued > 0 {
            debug!(generation = state.generation, issued, "loading more");
            self.inner.publish(&state);
        }
        issued
    }

    /// Re-issues fetches for collections whose last request failed, from the
    /// cursor that failed.
    pub fn retry(&self) -> usize {
        let mut state = self.inner.lock();
        if state.phase != EnginePhase::Ready {
            return 0;
        }
        let failed: Vec<EntityType> = state
            .pagination
            .retryable()
            .into_iter()
            .filter(|t| state.errors.contains_key(t))
            .collect();
        let issued = self.inner.fetch_more(&mut state, failed);
        if issued > 0 {
            info!(generation = state.generation, issued, "retrying failed collections");
            self.inner.publish(&state);
        }
        issued
    }

    pub fn like(&self, key: &ItemKey) -> Result<EngagementDelta> {
        self.engage(key, EngagementField::Likes, Direction::Increment)
    }

    pub fn unlike(&self, key: &ItemKey) -> Result<EngagementDelta> {
        self.engage(key, EngagementField::Likes, Direction::Decrement)
    }

    pub fn follow(&self, key: &ItemKey) -> Result<EngagementDelta> {
        self.engage(key, EngagementField::Following, Direction::Increment)
    }

    pub fn unfollow(&self, key: &ItemKey) -> Result<EngagementDelta> {
        self.engage(key, EngagementField::Following, Direction::Decrement)
    }

    fn engage(
        &self,
        key: &ItemKey,
        field: EngagementField,
        direction: Direction,
    ) -> Result<EngagementDelta> {
        let mut state = self.inner.lock();
        let delta = state.engage(key, field, direction)?;
        state.in_flight += 1;

        let inner = Arc::clone(&self.inner);
        let submitted = delta.clone();
        tokio::spawn(async move {
            let outcome = tokio::time::timeout(
                inner.timeout,
                inner.engagement.submit(&submitted.item_key, submitted.field, submitted.direction),
            )
            .await;
            inner.on_engagement(&submitted, outcome);
        });
        self.inner.publish(&state);
        Ok(delta)
    }

    /// Resolves once no search is scheduled and no fetch or engagement
    /// submission is in flight.
    pub async fn settled(&self) {
        loop {
            let notified = self.inner.settled.notified();
            if self.inner.lock().is_settled() {
                return;
            }
            notified.await;
        }
    }
}
