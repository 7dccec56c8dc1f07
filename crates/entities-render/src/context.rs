//! Services shared by every entity renderer, passed explicitly instead of
//! looked up globally.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::RwLock;
use uuid::Uuid;
use worldspace_common::{Clock, EntityId};
use worldspace_render::GeometryCache;

use crate::config::EntityRendererConfig;
use crate::fade::LayeredZones;
use crate::mirror::PortalExit;
use crate::renderer::EntityRenderer;

/// Receiving ends of the queues renderers feed. Owned by the update driver.
#[derive(Debug)]
pub struct RenderQueues {
    /// Entities whose change handler fired.
    pub entity_changes: Receiver<EntityId>,
    /// Entities that asked for an unconditional update next tick.
    pub render_requests: Receiver<EntityId>,
}

pub struct RenderContext {
    config: EntityRendererConfig,
    clock: Arc<dyn Clock>,
    geometry: Arc<GeometryCache>,
    entity_changes: Sender<EntityId>,
    render_requests: Sender<EntityId>,
    session_id: RwLock<Option<Uuid>>,
    layered_zones: RwLock<LayeredZones>,
    renderables: RwLock<HashMap<EntityId, Weak<EntityRenderer>>>,
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("config", &self.config)
            .field("session_id", &*self.session_id.read())
            .field("layered_zones", &self.layered_zones.read().len())
            .field("renderables", &self.renderables.read().len())
            .finish()
    }
}

impl RenderContext {
    pub fn new(config: EntityRendererConfig, clock: Arc<dyn Clock>) -> (Arc<Self>, RenderQueues) {
        let (changes_tx, changes_rx) = unbounded();
        let (requests_tx, requests_rx) = unbounded();
        let ctx = Arc::new(Self {
            config,
            clock,
            geometry: Arc::new(GeometryCache::new()),
            entity_changes: changes_tx,
            render_requests: requests_tx,
            session_id: RwLock::new(None),
            layered_zones: RwLock::new(LayeredZones::default()),
            renderables: RwLock::new(HashMap::new()),
        });
        let queues = RenderQueues {
            entity_changes: changes_rx,
            render_requests: requests_rx,
        };
        (ctx, queues)
    }

    pub fn config(&self) -> &EntityRendererConfig {
        &self.config
    }

    pub fn now(&self) -> u64 {
        self.clock.now_usec()
    }

    pub fn geometry(&self) -> &GeometryCache {
        &self.geometry
    }

    /// Sender handed to entities as their change handler.
    pub fn change_sender(&self) -> Sender<EntityId> {
        self.entity_changes.clone()
    }

    /// Ask the driver to update `entity` next tick regardless of its dirty state.
    pub fn request_render_update(&self, entity: EntityId) {
        // The driver owns the receiver; after it is gone requests are moot.
        let _ = self.render_requests.send(entity);
    }

    /// Local session, used to tell "mine" from "other" in status indicators.
    pub fn session_id(&self) -> Option<Uuid> {
        *self.session_id.read()
    }

    pub fn set_session_id(&self, id: Option<Uuid>) {
        *self.session_id.write() = id;
    }

    pub fn layered_zones(&self) -> LayeredZones {
        self.layered_zones.read().clone()
    }

    pub fn set_layered_zones(&self, zones: LayeredZones) {
        *self.layered_zones.write() = zones;
    }

    pub(crate) fn register_renderable(&self, renderer: &Arc<EntityRenderer>) {
        self.renderables
            .write()
            .insert(renderer.entity().id(), Arc::downgrade(renderer));
    }

    /// Drop the entry for `renderer`'s entity only while it still points at
    /// `renderer`; a replacement registered under the same id stays.
    pub(crate) fn unregister_renderable(&self, renderer: &EntityRenderer) {
        let entity = renderer.entity().id();
        let mut renderables = self.renderables.write();
        if renderables
            .get(&entity)
            .is_some_and(|w| std::ptr::eq(w.as_ptr(), renderer))
        {
            renderables.remove(&entity);
        }
    }

    pub fn renderable_for_entity(&self, entity: EntityId) -> Option<Arc<EntityRenderer>> {
        self.renderables.read().get(&entity).and_then(Weak::upgrade)
    }

    /// Resolve a portal's exit to a registered renderable.
    pub fn portal_exit(&self, exit: EntityId) -> Option<PortalExit> {
        let renderer = self.renderable_for_entity(exit)?;
        let item_id = renderer.item_id();
        if !item_id.is_valid() {
            return None;
        }
        let entity = renderer.entity();
        Some(PortalExit {
            position: entity.world_position(),
            rotation: entity.world_orientation(),
            item_id,
        })
    }
}
