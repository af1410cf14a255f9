//! Optimistic engagement overlay.
//!
//! A like or follow changes the working set immediately and is tracked as a
//! pending delta until the backend answers. Confirmation drops the delta
//! (optionally adopting server counters); failure restores the exact values
//! the item had before the optimistic change.
//!
//! At most one delta may be pending per item and field. Replacing the working
//! set with fresh results detaches every pending delta; [`EngagementOverlay::reapply`]
//! then applies them to the new copies so the user does not see a flicker.

use std::collections::BTreeMap;

use tracing::{debug, info};

use discovery_core::error::{Error, Result};
use discovery_core::types::{
    DeltaId, DeltaState, Direction, EngagementCounters, EngagementDelta, EngagementField,
    EntityType, ItemKey, ResultItem,
};

use crate::aggregator::WorkingSet;

/// Counter value and viewer flag as they were before a delta touched them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Prior {
    counter: u64,
    flag: bool,
}

#[derive(Debug, Clone)]
struct Tracked {
    delta: EngagementDelta,
    // None while detached, or when the item already carried the target flag.
    prior: Option<Prior>,
}

#[derive(Debug, Default)]
pub struct EngagementOverlay {
    next_id: u64,
    pending: BTreeMap<DeltaId, Tracked>,
}

impl EngagementOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_optimistic(
        &mut self,
        set: &mut WorkingSet,
        key: &ItemKey,
        field: EngagementField,
        direction: Direction,
    ) -> Result<EngagementDelta> {
        if !supports(key.entity_type, field) {
            return Err(Error::Unsupported { entity_type: key.entity_type, field });
        }
        if self.is_pending(key, field) {
            return Err(Error::Conflict { key: key.clone(), field });
        }
        let item = set.get_mut(key).ok_or_else(|| Error::ItemNotFound(key.clone()))?;
        let target = direction == Direction::Increment;
        if flag(item, field) == target {
            return Err(Error::Redundant { key: key.clone(), field });
        }
        let prior = apply_to(item, field, direction);

        self.next_id += 1;
        let delta = EngagementDelta {
            id: DeltaId(self.next_id),
            item_key: key.clone(),
            field,
            direction,
            state: DeltaState::Pending,
        };
        debug!(delta = %delta.id, key = %key, %field, ?direction, "optimistic change applied");
        self.pending.insert(delta.id, Tracked { delta: delta.clone(), prior: Some(prior) });
        Ok(delta)
    }

    /// Backend accepted the change. The optimistic values stay.
    pub fn confirm(&mut self, id: DeltaId) -> Result<EngagementDelta> {
        let tracked = self.pending.remove(&id).ok_or(Error::UnknownDelta(id))?;
        debug!(delta = %id, key = %tracked.delta.item_key, "engagement confirmed");
        Ok(EngagementDelta { state: DeltaState::Confirmed, ..tracked.delta })
    }

    /// Backend rejected the change. The item gets back the counter and flag it
    /// had right before the optimistic change, if it is still presented.
    pub fn rollback(&mut self, set: &mut WorkingSet, id: DeltaId) -> Result<EngagementDelta> {
        let tracked = self.pending.remove(&id).ok_or(Error::UnknownDelta(id))?;
        let delta = tracked.delta;
        if let (Some(prior), Some(item)) = (tracked.prior, set.get_mut(&delta.item_key)) {
            restore(item, delta.field, prior);
        }
        info!(delta = %id, key = %delta.item_key, field = %delta.field, "engagement rolled back");
        Ok(EngagementDelta { state: DeltaState::RolledBack, ..delta })
    }

    /// Adopts authoritative counters for `key`. Changes still pending on the
    /// item are layered back on top. Returns `false` if the item is gone.
    pub fn reconcile(
        &mut self,
        set: &mut WorkingSet,
        key: &ItemKey,
        counters: EngagementCounters,
    ) -> bool {
        let Some(item) = set.get_mut(key) else { return false };
        item.counters = counters;
        let applied = self
            .pending
            .values_mut()
            .filter(|t| &t.delta.item_key == key && t.prior.is_some());
        for tracked in applied {
            let prior = apply_to(item, tracked.delta.field, tracked.delta.direction);
            tracked.prior = Some(prior);
        }
        true
    }

    /// Forgets which items pending deltas were applied to. Called before the
    /// working set is replaced.
    pub fn detach_all(&mut self) {
        for tracked in self.pending.values_mut() {
            tracked.prior = None;
        }
    }

    /// Applies detached deltas to the items now in `set`. Items that already
    /// show the target state are left alone. Returns how many were applied.
    pub fn reapply(&mut self, set: &mut WorkingSet) -> usize {
        let mut applied = 0;
        for tracked in self.pending.values_mut().filter(|t| t.prior.is_none()) {
            let delta = &tracked.delta;
            let Some(item) = set.get_mut(&delta.item_key) else { continue };
            if flag(item, delta.field) == (delta.direction == Direction::Increment) {
                continue;
            }
            tracked.prior = Some(apply_to(item, delta.field, delta.direction));
            applied += 1;
        }
        if applied > 0 {
            debug!(applied, "pending engagement re-applied to fresh results");
        }
        applied
    }

    pub fn is_pending(&self, key: &ItemKey, field: EngagementField) -> bool {
        self.pending.values().any(|t| &t.delta.item_key == key && t.delta.field == field)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn supports(entity_type: EntityType, field: EngagementField) -> bool {
    matches!(
        (entity_type, field),
        (EntityType::Recipe, EngagementField::Likes)
            | (EntityType::Community | EntityType::User, EngagementField::Following)
    )
}

fn flag(item: &ResultItem, field: EngagementField) -> bool {
    match field {
        EngagementField::Likes => item.viewer.liked,
        EngagementField::Following => item.viewer.following,
    }
}

// Following counts members on communities and followers on users.
fn counter_mut(item: &mut ResultItem, field: EngagementField) -> &mut u64 {
    match (field, item.entity_type) {
        (EngagementField::Likes, _) => &mut item.counters.likes,
        (EngagementField::Following, EntityType::Community) => &mut item.counters.members,
        (EngagementField::Following, _) => &mut item.counters.followers,
    }
}

fn apply_to(item: &mut ResultItem, field: EngagementField, direction: Direction) -> Prior {
    let up = direction == Direction::Increment;
    let prior = Prior { counter: *counter_mut(item, field), flag: flag(item, field) };
    let counter = counter_mut(item, field);
    *counter = if up { counter.saturating_add(1) } else { counter.saturating_sub(1) };
    set_flag(item, field, up);
    prior
}

fn restore(item: &mut ResultItem, field: EngagementField, prior: Prior) {
    *counter_mut(item, field) = prior.counter;
    set_flag(item, field, prior.flag);
}

fn set_flag(item: &mut ResultItem, field: EngagementField, value: bool) {
    match field {
        EngagementField::Likes => item.viewer.liked = value,
        EngagementField::Following => item.viewer.following = value,
    }
}
