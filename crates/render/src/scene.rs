//! Scene container: item registry fed by batched transactions.
//!
//! Any thread may build and enqueue a [`Transaction`]; only the render thread
//! calls [`Scene::process_transactions`], so update closures always run there.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::graveyard::Graveyard;
use crate::item::ItemId;
use crate::payload::PayloadProxy;
use crate::status::{StatusGetter, StatusValue};
use crate::transition::{FadeObjectParams, TransitionId, TransitionStage, TransitionType};

pub type Payload = Arc<dyn PayloadProxy>;
pub type UpdateFn = Box<dyn FnOnce() + Send>;

enum Operation {
    Reset {
        id: ItemId,
        payload: Payload,
        status_getters: Vec<StatusGetter>,
    },
    Update {
        id: ItemId,
        func: UpdateFn,
    },
    Remove {
        id: ItemId,
    },
    ResetTransition {
        id: ItemId,
        transition: TransitionType,
    },
}

/// Ordered batch of scene edits.
#[derive(Default)]
pub struct Transaction {
    operations: Vec<Operation>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("operations", &self.operations.len())
            .finish()
    }
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset_item(&mut self, id: ItemId, payload: Payload, status_getters: Vec<StatusGetter>) {
        self.operations.push(Operation::Reset {
            id,
            payload,
            status_getters,
        });
    }

    pub fn update_item(&mut self, id: ItemId, func: UpdateFn) {
        self.operations.push(Operation::Update { id, func });
    }

    pub fn remove_item(&mut self, id: ItemId) {
        self.operations.push(Operation::Remove { id });
    }

    pub fn reset_transition_on_item(&mut self, id: ItemId, transition: TransitionType) {
        self.operations
            .push(Operation::ResetTransition { id, transition });
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn merge(&mut self, other: Transaction) {
        self.operations.extend(other.operations);
    }
}

struct SceneItem {
    payload: Payload,
    status_getters: Vec<StatusGetter>,
    transition: TransitionId,
}

/// Snapshot of an item's scene-side state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemState {
    pub transition: TransitionId,
}

/// What one call to [`Scene::process_transactions`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub reset: usize,
    pub updated: usize,
    pub removed: usize,
    pub transitions: usize,
    pub skipped: usize,
}

#[derive(Default)]
pub struct Scene {
    next_id: AtomicU32,
    items: RwLock<BTreeMap<ItemId, SceneItem>>,
    pending: Mutex<Vec<Transaction>>,
    transitions: TransitionStage,
    graveyard: Graveyard,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("items", &self.items.read().len())
            .field("pending", &self.pending.lock().len())
            .field("transitions", &self.transitions.len())
            .finish()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh item id. Ids are never reused.
    pub fn allocate_id(&self) -> ItemId {
        ItemId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn enqueue_transaction(&self, transaction: Transaction) {
        if !transaction.is_empty() {
            self.pending.lock().push(transaction);
        }
    }

    pub fn has_pending_transactions(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// Apply every queued transaction in order. Render thread only.
    pub fn process_transactions(&self, now_usec: u64) -> ProcessStats {
        let _span = tracing::trace_span!("process_transactions").entered();
        let batches = std::mem::take(&mut *self.pending.lock());
        let mut stats = ProcessStats::default();
        for operation in batches.into_iter().flat_map(|t| t.operations) {
            match operation {
                Operation::Reset {
                    id,
                    payload,
                    status_getters,
                } => {
                    let previous = self.items.write().insert(
                        id,
                        SceneItem {
                            payload,
                            status_getters,
                            transition: TransitionId::INVALID,
                        },
                    );
                    if let Some(old) = previous {
                        self.retire(old);
                    }
                    stats.reset += 1;
                }
                Operation::Update { id, func } => {
                    // Closures may query the scene, so no lock is held while they run.
                    if self.items.read().contains_key(&id) {
                        func();
                        stats.updated += 1;
                    } else {
                        tracing::trace!(item = id.raw(), "update for unknown item skipped");
                        stats.skipped += 1;
                    }
                }
                Operation::Remove { id } => {
                    let removed = self.items.write().remove(&id);
                    match removed {
                        Some(item) => {
                            self.retire(item);
                            stats.removed += 1;
                        }
                        None => stats.skipped += 1,
                    }
                }
                Operation::ResetTransition { id, transition } => {
                    let payload = self.items.read().get(&id).map(|i| Arc::clone(&i.payload));
                    let Some(payload) = payload else {
                        stats.skipped += 1;
                        continue;
                    };
                    let properties = payload.fade_properties(transition);
                    let transition_id = self.transitions.add(id, transition, now_usec, properties);
                    let previous = self
                        .items
                        .write()
                        .get_mut(&id)
                        .map(|item| std::mem::replace(&mut item.transition, transition_id));
                    if let Some(previous) = previous.filter(|t| t.is_valid()) {
                        self.transitions.remove(previous);
                    }
                    stats.transitions += 1;
                }
            }
        }
        self.retire_finished_transitions(now_usec);
        stats
    }

    fn retire(&self, item: SceneItem) {
        if item.transition.is_valid() {
            self.transitions.remove(item.transition);
        }
        self.graveyard.bury(item.payload);
        self.graveyard.bury(item.status_getters);
    }

    fn retire_finished_transitions(&self, now_usec: u64) {
        let finished = self.transitions.retire_finished(now_usec);
        if finished.is_empty() {
            return;
        }
        let mut items = self.items.write();
        for (transition, id) in finished {
            if let Some(item) = items.get_mut(&id).filter(|i| i.transition == transition) {
                item.transition = TransitionId::INVALID;
            }
        }
    }

    pub fn item_count(&self) -> usize {
        self.items.read().len()
    }

    pub fn item_ids(&self) -> Vec<ItemId> {
        self.items.read().keys().copied().collect()
    }

    pub fn item_exists(&self, id: ItemId) -> bool {
        self.items.read().contains_key(&id)
    }

    /// State of a live item, `None` for unknown ids.
    pub fn item_safe(&self, id: ItemId) -> Option<ItemState> {
        self.items.read().get(&id).map(|item| ItemState {
            transition: item.transition,
        })
    }

    pub fn payload(&self, id: ItemId) -> Option<Payload> {
        self.items
            .read()
            .get(&id)
            .map(|item| Arc::clone(&item.payload))
    }

    pub fn item_status(&self, id: ItemId) -> Vec<StatusValue> {
        self.items
            .read()
            .get(&id)
            .map(|item| item.status_getters.iter().map(|getter| getter()).collect())
            .unwrap_or_default()
    }

    pub fn transition_params(&self, id: TransitionId, now_usec: u64) -> Option<FadeObjectParams> {
        self.transitions.params(id, now_usec)
    }

    pub fn transitions(&self) -> &TransitionStage {
        &self.transitions
    }

    pub fn graveyard(&self) -> &Graveyard {
        &self.graveyard
    }
}
