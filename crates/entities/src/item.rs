use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel::Sender;
use glam::{Quat, Vec3};
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;
use worldspace_common::{Aabb, EntityId, Transform};

use crate::properties::EntityProperties;
use crate::types::{EntityHostType, EntityType};

/// Velocities below this are considered at rest.
const MOVING_EPSILON_SQUARED: f32 = 1.0e-8;

/// Handle returned by [`EntityItem::register_change_handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangeHandlerId(u64);

/// A live entity shared between the simulation and the renderers.
///
/// Properties sit behind a read/write lock; the dirty flags the renderers poll
/// every frame are atomics so checking them never blocks. Every edit enqueues
/// the entity id on each registered change channel.
#[derive(Debug)]
pub struct EntityItem {
    id: EntityId,
    entity_type: EntityType,
    created_usec: u64,
    properties: RwLock<EntityProperties>,
    needs_render_update: AtomicBool,
    needs_zone_occlusion_update: AtomicBool,
    visually_ready: AtomicBool,
    physics_active: AtomicBool,
    last_edited_from_remote: AtomicU64,
    last_broadcast: AtomicU64,
    change_handlers: Mutex<BTreeMap<ChangeHandlerId, Sender<EntityId>>>,
    next_handler_id: AtomicU64,
}

impl EntityItem {
    pub fn new(
        id: EntityId,
        entity_type: EntityType,
        properties: EntityProperties,
        created_usec: u64,
    ) -> Self {
        Self {
            id,
            entity_type,
            created_usec,
            properties: RwLock::new(properties),
            needs_render_update: AtomicBool::new(true),
            needs_zone_occlusion_update: AtomicBool::new(true),
            visually_ready: AtomicBool::new(true),
            physics_active: AtomicBool::new(false),
            last_edited_from_remote: AtomicU64::new(created_usec),
            last_broadcast: AtomicU64::new(created_usec),
            change_handlers: Mutex::new(BTreeMap::new()),
            next_handler_id: AtomicU64::new(1),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn created(&self) -> u64 {
        self.created_usec
    }

    /// Run `f` against the current properties under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&EntityProperties) -> R) -> R {
        f(&self.properties.read())
    }

    pub fn properties(&self) -> EntityProperties {
        self.properties.read().clone()
    }

    /// Mutate properties, flag the entity for a render update and notify
    /// change handlers.
    pub fn edit(&self, f: impl FnOnce(&mut EntityProperties)) {
        let zones_changed = {
            let mut props = self.properties.write();
            let zones_before = props.render_with_zones.clone();
            f(&mut props);
            zones_before != props.render_with_zones
        };
        if zones_changed {
            self.needs_zone_occlusion_update
                .store(true, Ordering::Release);
        }
        self.needs_render_update.store(true, Ordering::Release);
        self.notify_changed();
    }

    pub fn world_position(&self) -> Vec3 {
        self.properties.read().transform.position
    }

    pub fn world_orientation(&self) -> Quat {
        self.properties.read().transform.rotation
    }

    pub fn visible(&self) -> bool {
        self.properties.read().visible
    }

    pub fn transform_to_center(&self) -> Transform {
        self.properties.read().transform_to_center()
    }

    /// Center transform used for billboards. Entities are unparented, so the
    /// local rotation is the world rotation.
    pub fn transform_to_center_with_only_local_rotation(&self) -> Transform {
        let props = self.properties.read();
        let mut transform = props.transform_to_center();
        transform.rotation = props.transform.rotation;
        transform
    }

    /// World-space bound of the entity's dimensions box.
    pub fn aa_box(&self) -> Aabb {
        let props = self.properties.read();
        let mut transform = props.transform_to_center();
        transform.scale = props.dimensions;
        Aabb::from_transformed_unit_cube(&transform)
    }

    pub fn is_moving_relative_to_parent(&self) -> bool {
        let props = self.properties.read();
        props.velocity.length_squared() > MOVING_EPSILON_SQUARED
            || props.angular_velocity.length_squared() > MOVING_EPSILON_SQUARED
    }

    pub fn needs_render_update(&self) -> bool {
        self.needs_render_update.load(Ordering::Acquire)
    }

    pub fn set_needs_render_update(&self, value: bool) {
        self.needs_render_update.store(value, Ordering::Release);
    }

    pub fn needs_zone_occlusion_update(&self) -> bool {
        self.needs_zone_occlusion_update.load(Ordering::Acquire)
    }

    pub fn reset_needs_zone_occlusion_update(&self) {
        self.needs_zone_occlusion_update
            .store(false, Ordering::Release);
    }

    /// False while external resources (meshes, textures) are still loading.
    pub fn is_visually_ready(&self) -> bool {
        self.visually_ready.load(Ordering::Acquire)
    }

    pub fn set_visually_ready(&self, ready: bool) {
        let was = self.visually_ready.swap(ready, Ordering::AcqRel);
        if was != ready {
            self.notify_changed();
        }
    }

    pub fn is_physics_active(&self) -> bool {
        self.physics_active.load(Ordering::Acquire)
    }

    pub fn set_physics_active(&self, active: bool) {
        self.physics_active.store(active, Ordering::Release);
    }

    pub fn last_edited_from_remote(&self) -> u64 {
        self.last_edited_from_remote.load(Ordering::Acquire)
    }

    pub fn mark_edited_from_remote(&self, now_usec: u64) {
        self.last_edited_from_remote
            .store(now_usec, Ordering::Release);
    }

    pub fn last_broadcast(&self) -> u64 {
        self.last_broadcast.load(Ordering::Acquire)
    }

    pub fn mark_broadcast(&self, now_usec: u64) {
        self.last_broadcast.store(now_usec, Ordering::Release);
    }

    pub fn simulation_owner(&self) -> Option<Uuid> {
        self.properties.read().simulation_owner
    }

    pub fn has_actions(&self) -> bool {
        self.properties.read().has_actions
    }

    pub fn host_type(&self) -> EntityHostType {
        self.properties.read().host_type
    }

    pub fn is_avatar_entity(&self) -> bool {
        self.host_type() == EntityHostType::Avatar
    }

    pub fn is_local_entity(&self) -> bool {
        self.host_type() == EntityHostType::Local
    }

    /// An avatar entity owned by the given session.
    pub fn is_my_avatar_entity(&self, session_id: Option<Uuid>) -> bool {
        let props = self.properties.read();
        props.host_type == EntityHostType::Avatar
            && session_id.is_some()
            && props.owning_avatar_id == session_id
    }

    /// Subscribe a channel to change notifications for this entity.
    pub fn register_change_handler(&self, sender: Sender<EntityId>) -> ChangeHandlerId {
        let id = ChangeHandlerId(self.next_handler_id.fetch_add(1, Ordering::Relaxed));
        self.change_handlers.lock().insert(id, sender);
        tracing::trace!(entity = %self.id.short(), handler = id.0, "change handler registered");
        id
    }

    pub fn deregister_change_handler(&self, id: ChangeHandlerId) -> bool {
        let removed = self.change_handlers.lock().remove(&id).is_some();
        if removed {
            tracing::trace!(
                entity = %self.id.short(),
                handler = id.0,
                "change handler deregistered"
            );
        }
        removed
    }

    pub fn change_handler_count(&self) -> usize {
        self.change_handlers.lock().len()
    }

    fn notify_changed(&self) {
        let mut handlers = self.change_handlers.lock();
        // Receivers that hung up are dropped for good.
        handlers.retain(|_, sender| sender.send(self.id).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn make_item() -> EntityItem {
        EntityItem::new(
            EntityId::new(),
            EntityType::Box,
            EntityProperties::default(),
            0,
        )
    }

    #[test]
    fn edit_sets_dirty_flag_and_notifies() {
        let item = make_item();
        item.set_needs_render_update(false);
        let (tx, rx) = unbounded();
        item.register_change_handler(tx);

        item.edit(|p| p.visible = false);
        assert!(item.needs_render_update());
        assert!(!item.visible());
        assert_eq!(rx.try_recv().unwrap(), item.id());
    }

    #[test]
    fn deregistered_handler_gets_nothing() {
        let item = make_item();
        let (tx, rx) = unbounded();
        let handle = item.register_change_handler(tx);
        assert!(item.deregister_change_handler(handle));
        assert!(!item.deregister_change_handler(handle));

        item.edit(|p| p.alpha = 0.5);
        assert!(rx.try_recv().is_err());
        assert_eq!(item.change_handler_count(), 0);
    }

    #[test]
    fn disconnected_handlers_are_pruned() {
        let item = make_item();
        let (tx, rx) = unbounded();
        item.register_change_handler(tx);
        drop(rx);
        item.edit(|p| p.alpha = 0.5);
        assert_eq!(item.change_handler_count(), 0);
    }

    #[test]
    fn zone_edit_raises_occlusion_flag() {
        let item = make_item();
        item.reset_needs_zone_occlusion_update();
        item.edit(|p| p.alpha = 0.3);
        assert!(!item.needs_zone_occlusion_update());
        item.edit(|p| p.render_with_zones.push(EntityId::new()));
        assert!(item.needs_zone_occlusion_update());
    }

    #[test]
    fn aa_box_follows_dimensions() {
        let item = make_item();
        item.edit(|p| {
            p.transform.position = Vec3::new(10.0, 0.0, 0.0);
            p.dimensions = Vec3::new(2.0, 4.0, 6.0);
        });
        let bound = item.aa_box();
        assert!(bound.center().abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-5));
        assert!(bound.scale.abs_diff_eq(Vec3::new(2.0, 4.0, 6.0), 1e-5));
    }

    #[test]
    fn moving_follows_velocity() {
        let item = make_item();
        assert!(!item.is_moving_relative_to_parent());
        item.edit(|p| p.velocity = Vec3::X);
        assert!(item.is_moving_relative_to_parent());
    }

    #[test]
    fn my_avatar_entity_requires_session_match() {
        let item = make_item();
        let me = Uuid::new_v4();
        item.edit(|p| {
            p.host_type = EntityHostType::Avatar;
            p.owning_avatar_id = Some(me);
        });
        assert!(item.is_avatar_entity());
        assert!(item.is_my_avatar_entity(Some(me)));
        assert!(!item.is_my_avatar_entity(Some(Uuid::new_v4())));
        assert!(!item.is_my_avatar_entity(None));
    }

    #[test]
    fn visual_readiness_change_notifies_once() {
        let item = make_item();
        let (tx, rx) = unbounded();
        item.register_change_handler(tx);
        item.set_visually_ready(false);
        item.set_visually_ready(false);
        assert_eq!(rx.try_iter().count(), 1);
        assert!(!item.is_visually_ready());
    }
}
