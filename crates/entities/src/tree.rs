use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use worldspace_common::EntityId;

use crate::item::EntityItem;
use crate::properties::EntityProperties;
use crate::types::EntityType;

/// A record produced by every structural change or edit in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEvent {
    Added {
        id: EntityId,
        entity_type: EntityType,
    },
    Deleted { id: EntityId },
    Edited { id: EntityId },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),
    #[error("entity {0} already exists")]
    DuplicateId(EntityId),
}

/// The set of live entities.
///
/// Items are handed out as `Arc`s so renderers can keep reading an entity that
/// has just been deleted; deletion only drops the tree's reference. Iteration
/// is in `EntityId` order.
#[derive(Debug, Default)]
pub struct EntityTree {
    entities: BTreeMap<EntityId, Arc<EntityItem>>,
    event_log: Vec<TreeEvent>,
}

impl EntityTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<TreeEvent> {
        std::mem::take(&mut self.event_log)
    }

    pub fn events(&self) -> &[TreeEvent] {
        &self.event_log
    }

    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityItem>> {
        self.entities.values()
    }

    /// Add a new entity. Returns its id.
    pub fn add_entity(
        &mut self,
        entity_type: EntityType,
        properties: EntityProperties,
        now_usec: u64,
    ) -> EntityId {
        let id = EntityId::new();
        self.insert(Arc::new(EntityItem::new(id, entity_type, properties, now_usec)));
        id
    }

    /// Add an entity with a caller-chosen id.
    pub fn add_with_id(
        &mut self,
        id: EntityId,
        entity_type: EntityType,
        properties: EntityProperties,
        now_usec: u64,
    ) -> Result<Arc<EntityItem>, EditError> {
        if self.entities.contains_key(&id) {
            return Err(EditError::DuplicateId(id));
        }
        let item = Arc::new(EntityItem::new(id, entity_type, properties, now_usec));
        self.insert(Arc::clone(&item));
        Ok(item)
    }

    fn insert(&mut self, item: Arc<EntityItem>) {
        let id = item.id();
        let entity_type = item.entity_type();
        self.entities.insert(id, item);
        self.event_log.push(TreeEvent::Added { id, entity_type });
        tracing::debug!(entity = %id.short(), ?entity_type, "entity added");
    }

    /// Remove an entity. Returns it if it existed.
    pub fn delete_entity(&mut self, id: EntityId) -> Option<Arc<EntityItem>> {
        let item = self.entities.remove(&id);
        if item.is_some() {
            self.event_log.push(TreeEvent::Deleted { id });
            tracing::debug!(entity = %id.short(), "entity deleted");
        }
        item
    }

    pub fn get(&self, id: EntityId) -> Option<&Arc<EntityItem>> {
        self.entities.get(&id)
    }

    /// Apply a local edit and log it.
    pub fn edit(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut EntityProperties),
    ) -> Result<(), EditError> {
        let item = self.entities.get(&id).ok_or(EditError::EntityNotFound(id))?;
        item.edit(f);
        self.event_log.push(TreeEvent::Edited { id });
        Ok(())
    }

    /// Apply an edit received from the network, stamping the remote-edit time.
    pub fn apply_remote_edit(
        &mut self,
        id: EntityId,
        now_usec: u64,
        f: impl FnOnce(&mut EntityProperties),
    ) -> Result<(), EditError> {
        self.edit(id, f)?;
        if let Some(item) = self.entities.get(&id) {
            item.mark_edited_from_remote(now_usec);
        }
        Ok(())
    }
}
