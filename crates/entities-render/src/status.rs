//! Debug status indicators attached to every entity item.

use std::sync::Arc;

use worldspace_common::time::elapsed_secs;
use worldspace_entities::{EntityHostType, EntityItem};
use worldspace_render::{StatusGetter, StatusIcon, StatusValue};

use crate::context::RenderContext;

/// Recency indicator: full size right after `last_usec`, shrinking to nothing
/// over `threshold_secs`. Fresh shows `fresh_hue`, stale `stale_hue`.
fn recency(
    last_usec: u64,
    now_usec: u64,
    threshold_secs: f32,
    fresh_hue: f32,
    stale_hue: f32,
    icon: StatusIcon,
) -> StatusValue {
    let normalized = if threshold_secs > 0.0 {
        elapsed_secs(last_usec, now_usec) / threshold_secs
    } else {
        f32::INFINITY
    };
    let hue = if normalized > 1.0 {
        stale_hue
    } else {
        fresh_hue
    };
    StatusValue::new(1.0 - normalized, hue, icon)
}

pub fn remote_edit_status(entity: &EntityItem, ctx: &RenderContext) -> StatusValue {
    recency(
        entity.last_edited_from_remote(),
        ctx.now(),
        ctx.config().remote_edit_threshold_secs,
        StatusValue::RED,
        StatusValue::GREEN,
        StatusIcon::PacketReceived,
    )
}

pub fn broadcast_status(entity: &EntityItem, ctx: &RenderContext) -> StatusValue {
    recency(
        entity.last_broadcast(),
        ctx.now(),
        ctx.config().broadcast_threshold_secs,
        StatusValue::CYAN,
        StatusValue::MAGENTA,
        StatusIcon::PacketSent,
    )
}

pub fn physics_status(entity: &EntityItem) -> StatusValue {
    let scale = if entity.is_physics_active() { 1.0 } else { 0.0 };
    StatusValue::new(scale, StatusValue::BLUE, StatusIcon::ActiveInPhysics)
}

pub fn simulation_owner_status(entity: &EntityItem, ctx: &RenderContext) -> StatusValue {
    match entity.simulation_owner() {
        Some(owner) if Some(owner) == ctx.session_id() => {
            StatusValue::new(1.0, StatusValue::BLUE, StatusIcon::SimulationOwner)
        }
        Some(_) => StatusValue::new(1.0, StatusValue::RED, StatusIcon::OtherSimulationOwner),
        None => StatusValue::new(0.0, StatusValue::RED, StatusIcon::OtherSimulationOwner),
    }
}

pub fn actions_status(entity: &EntityItem) -> StatusValue {
    let scale = if entity.has_actions() { 1.0 } else { 0.0 };
    StatusValue::new(scale, StatusValue::GREEN, StatusIcon::HasActions)
}

pub fn host_type_status(entity: &EntityItem, ctx: &RenderContext) -> StatusValue {
    match entity.host_type() {
        EntityHostType::Avatar if entity.is_my_avatar_entity(ctx.session_id()) => {
            StatusValue::new(1.0, StatusValue::GREEN, StatusIcon::EntityHostType)
        }
        EntityHostType::Avatar => {
            StatusValue::new(1.0, StatusValue::RED, StatusIcon::EntityHostType)
        }
        EntityHostType::Local => {
            StatusValue::new(1.0, StatusValue::BLUE, StatusIcon::EntityHostType)
        }
        EntityHostType::Domain => {
            StatusValue::new(0.0, StatusValue::RED, StatusIcon::EntityHostType)
        }
    }
}

/// The six indicators, in display order.
pub fn status_getters(entity: &Arc<EntityItem>, ctx: &Arc<RenderContext>) -> Vec<StatusGetter> {
    let (e, c) = (Arc::clone(entity), Arc::clone(ctx));
    let remote: StatusGetter = Box::new(move || remote_edit_status(&e, &c));
    let (e, c) = (Arc::clone(entity), Arc::clone(ctx));
    let broadcast: StatusGetter = Box::new(move || broadcast_status(&e, &c));
    let e = Arc::clone(entity);
    let physics: StatusGetter = Box::new(move || physics_status(&e));
    let (e, c) = (Arc::clone(entity), Arc::clone(ctx));
    let owner: StatusGetter = Box::new(move || simulation_owner_status(&e, &c));
    let e = Arc::clone(entity);
    let actions: StatusGetter = Box::new(move || actions_status(&e));
    let (e, c) = (Arc::clone(entity), Arc::clone(ctx));
    let host: StatusGetter = Box::new(move || host_type_status(&e, &c));
    vec![remote, broadcast, physics, owner, actions, host]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EntityRendererConfig;
    use uuid::Uuid;
    use worldspace_common::{EntityId, ManualClock, USECS_PER_SECOND};
    use worldspace_entities::{EntityProperties, EntityType};

    fn setup() -> (Arc<EntityItem>, Arc<RenderContext>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let (ctx, _queues) = RenderContext::new(EntityRendererConfig::default(), clock.clone());
        let entity = Arc::new(EntityItem::new(
            EntityId::new(),
            EntityType::Box,
            EntityProperties::default(),
            0,
        ));
        (entity, ctx, clock)
    }

    #[test]
    fn remote_edit_fades_from_red_to_green() {
        let (entity, ctx, clock) = setup();
        clock.set(USECS_PER_SECOND / 10);
        let fresh = remote_edit_status(&entity, &ctx);
        assert_eq!(fresh.hue, StatusValue::RED);
        assert!((fresh.scale - 0.5).abs() < 1e-4);

        clock.set(USECS_PER_SECOND);
        let stale = remote_edit_status(&entity, &ctx);
        assert_eq!(stale.hue, StatusValue::GREEN);
        assert!(!stale.is_shown());

        entity.mark_edited_from_remote(USECS_PER_SECOND);
        assert!(remote_edit_status(&entity, &ctx).is_shown());
    }

    #[test]
    fn broadcast_uses_longer_window() {
        let (entity, ctx, clock) = setup();
        clock.set(USECS_PER_SECOND * 3 / 10);
        let value = broadcast_status(&entity, &ctx);
        assert_eq!(value.hue, StatusValue::CYAN);
        assert!(value.is_shown());
        assert_eq!(value.icon, StatusIcon::PacketSent);
    }

    #[test]
    fn simulation_ownership() {
        let (entity, ctx, _clock) = setup();
        assert!(!simulation_owner_status(&entity, &ctx).is_shown());

        let me = Uuid::new_v4();
        ctx.set_session_id(Some(me));
        entity.edit(|p| p.simulation_owner = Some(me));
        let mine = simulation_owner_status(&entity, &ctx);
        assert_eq!(mine.hue, StatusValue::BLUE);
        assert_eq!(mine.icon, StatusIcon::SimulationOwner);

        entity.edit(|p| p.simulation_owner = Some(Uuid::new_v4()));
        let other = simulation_owner_status(&entity, &ctx);
        assert_eq!(other.icon, StatusIcon::OtherSimulationOwner);
        assert!(other.is_shown());
    }

    #[test]
    fn host_type_colors() {
        let (entity, ctx, _clock) = setup();
        assert!(!host_type_status(&entity, &ctx).is_shown());

        entity.edit(|p| p.host_type = EntityHostType::Local);
        assert_eq!(host_type_status(&entity, &ctx).hue, StatusValue::BLUE);

        let me = Uuid::new_v4();
        ctx.set_session_id(Some(me));
        entity.edit(|p| {
            p.host_type = EntityHostType::Avatar;
            p.owning_avatar_id = Some(me);
        });
        assert_eq!(host_type_status(&entity, &ctx).hue, StatusValue::GREEN);
        entity.edit(|p| p.owning_avatar_id = Some(Uuid::new_v4()));
        assert_eq!(host_type_status(&entity, &ctx).hue, StatusValue::RED);
    }

    #[test]
    fn flags_toggle_indicators() {
        let (entity, ctx, _clock) = setup();
        assert!(!physics_status(&entity).is_shown());
        assert!(!actions_status(&entity).is_shown());
        entity.set_physics_active(true);
        entity.edit(|p| p.has_actions = true);
        assert!(physics_status(&entity).is_shown());
        assert!(actions_status(&entity).is_shown());
        assert_eq!(status_getters(&entity, &ctx).len(), 6);
    }
}
