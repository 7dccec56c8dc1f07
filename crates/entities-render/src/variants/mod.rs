//! Per-entity-type renderer variants and the registry that picks them.

mod shape;
mod zone;

pub use shape::ShapeRenderer;
pub use zone::ZoneRenderer;

use worldspace_common::Aabb;
use worldspace_entities::EntityType;
use worldspace_render::{ItemKey, RenderArgs, ShapeKey};

use crate::renderer::EntityRenderer;

/// What each variant supplies on top of the base renderer. Both update
/// phases are explicit; `base` is the renderer that owns the variant.
pub trait TypedRenderer: Send + Sync {
    fn label(&self) -> &'static str;

    fn on_add_to_scene(&self, base: &EntityRenderer);

    fn on_remove_from_scene(&self, base: &EntityRenderer);

    /// Variant-specific dirty check, on top of the base checks.
    fn needs_render_update(&self, base: &EntityRenderer) -> bool;

    /// Any thread; runs right after the base synchronous phase.
    fn do_render_update_synchronous(&self, base: &EntityRenderer);

    /// Render thread only; runs right after the base asynchronous phase.
    fn do_render_update_asynchronous(&self, base: &EntityRenderer);

    fn is_transparent(&self, base: &EntityRenderer) -> bool;

    fn key(&self, base: &EntityRenderer) -> ItemKey;

    fn shape_key(&self, base: &EntityRenderer) -> ShapeKey;

    fn bound(&self, base: &EntityRenderer) -> Aabb;

    fn render(&self, base: &EntityRenderer, args: &mut RenderArgs<'_>);
}

#[derive(Debug)]
pub enum RendererVariant {
    Shape(ShapeRenderer),
    Zone(ZoneRenderer),
}

impl RendererVariant {
    fn typed(&self) -> &dyn TypedRenderer {
        match self {
            RendererVariant::Shape(r) => r,
            RendererVariant::Zone(r) => r,
        }
    }

    pub fn as_shape(&self) -> Option<&ShapeRenderer> {
        match self {
            RendererVariant::Shape(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_zone(&self) -> Option<&ZoneRenderer> {
        match self {
            RendererVariant::Zone(r) => Some(r),
            _ => None,
        }
    }
}

impl TypedRenderer for RendererVariant {
    fn label(&self) -> &'static str {
        self.typed().label()
    }

    fn on_add_to_scene(&self, base: &EntityRenderer) {
        self.typed().on_add_to_scene(base)
    }

    fn on_remove_from_scene(&self, base: &EntityRenderer) {
        self.typed().on_remove_from_scene(base)
    }

    fn needs_render_update(&self, base: &EntityRenderer) -> bool {
        self.typed().needs_render_update(base)
    }

    fn do_render_update_synchronous(&self, base: &EntityRenderer) {
        self.typed().do_render_update_synchronous(base)
    }

    fn do_render_update_asynchronous(&self, base: &EntityRenderer) {
        self.typed().do_render_update_asynchronous(base)
    }

    fn is_transparent(&self, base: &EntityRenderer) -> bool {
        self.typed().is_transparent(base)
    }

    fn key(&self, base: &EntityRenderer) -> ItemKey {
        self.typed().key(base)
    }

    fn shape_key(&self, base: &EntityRenderer) -> ShapeKey {
        self.typed().shape_key(base)
    }

    fn bound(&self, base: &EntityRenderer) -> Aabb {
        self.typed().bound(base)
    }

    fn render(&self, base: &EntityRenderer, args: &mut RenderArgs<'_>) {
        self.typed().render(base, args)
    }
}

pub type Constructor = fn(EntityType) -> RendererVariant;

/// Entity types with a renderer. Anything not listed is not drawn.
const REGISTRY: &[(EntityType, Constructor)] = &[
    (EntityType::Box, ShapeRenderer::variant),
    (EntityType::Sphere, ShapeRenderer::variant),
    (EntityType::Shape, ShapeRenderer::variant),
    (EntityType::Zone, ZoneRenderer::variant),
];

pub fn constructor_for(entity_type: EntityType) -> Option<Constructor> {
    REGISTRY
        .iter()
        .find(|(t, _)| *t == entity_type)
        .map(|(_, constructor)| *constructor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_and_zones_are_registered() {
        for t in [EntityType::Box, EntityType::Sphere, EntityType::Shape] {
            let constructor = constructor_for(t).unwrap();
            assert!(constructor(t).as_shape().is_some());
        }
        let zone = constructor_for(EntityType::Zone).unwrap();
        assert!(zone(EntityType::Zone).as_zone().is_some());
    }

    #[test]
    fn other_types_have_no_renderer() {
        for t in [EntityType::Unknown, EntityType::Model, EntityType::Text, EntityType::Light] {
            assert!(constructor_for(t).is_none());
        }
    }
}
