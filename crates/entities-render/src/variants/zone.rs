//! Zone entities: no geometry, they push their environment onto the zone stage.

use bitflags::bitflags;
use glam::{Quat, Vec3};
use parking_lot::RwLock;
use worldspace_common::Aabb;
use worldspace_entities::{ComponentMode, EntityType, ZonePropertyGroup};
use worldspace_render::zone_stage::{AmbientLight, Bloom, Haze, KeyLight, Skybox};
use worldspace_render::{ItemKey, RenderArgs, ShapeKey, ZoneStageEntry};

use super::{RendererVariant, TypedRenderer};
use crate::renderer::EntityRenderer;

bitflags! {
    /// Components that must be rebuilt on the next asynchronous update.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct ZoneDirty: u8 {
        const KEY_LIGHT = 1 << 0;
        const AMBIENT_LIGHT = 1 << 1;
        const SKYBOX = 1 << 2;
        const HAZE = 1 << 3;
        const BLOOM = 1 << 4;
    }
}

fn rgb(color: [u8; 3]) -> Vec3 {
    Vec3::new(color[0] as f32, color[1] as f32, color[2] as f32) / 255.0
}

#[derive(Debug, Default)]
struct ZoneState {
    position: Vec3,
    rotation: Quat,
    dimensions: Vec3,
    visible: bool,
    zone: ZonePropertyGroup,
    dirty: ZoneDirty,
    entry: Option<ZoneStageEntry>,
}

impl ZoneState {
    /// Copy `zone` and flag every component whose mode or settings changed.
    fn take_zone(&mut self, zone: &ZonePropertyGroup) {
        let old = &self.zone;
        if old.key_light_mode != zone.key_light_mode || old.key_light != zone.key_light {
            self.dirty |= ZoneDirty::KEY_LIGHT;
        }
        if old.ambient_light_mode != zone.ambient_light_mode
            || old.ambient_light != zone.ambient_light
        {
            self.dirty |= ZoneDirty::AMBIENT_LIGHT;
        }
        if old.skybox_mode != zone.skybox_mode || old.skybox != zone.skybox {
            self.dirty |= ZoneDirty::SKYBOX;
        }
        if old.haze_mode != zone.haze_mode || old.haze != zone.haze {
            self.dirty |= ZoneDirty::HAZE;
        }
        if old.bloom_mode != zone.bloom_mode || old.bloom != zone.bloom {
            self.dirty |= ZoneDirty::BLOOM;
        }
        self.zone = zone.clone();
    }
}

#[derive(Debug)]
pub struct ZoneRenderer {
    state: RwLock<ZoneState>,
}

impl ZoneRenderer {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ZoneState {
                dirty: ZoneDirty::all(),
                ..ZoneState::default()
            }),
        }
    }

    pub fn variant(_entity_type: EntityType) -> RendererVariant {
        RendererVariant::Zone(Self::new())
    }

    /// The entry this zone contributes, once the asynchronous phase has run.
    pub fn stage_entry(&self) -> Option<ZoneStageEntry> {
        self.state.read().entry.clone()
    }
}

impl Default for ZoneRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TypedRenderer for ZoneRenderer {
    fn label(&self) -> &'static str {
        "zone"
    }

    fn on_add_to_scene(&self, _base: &EntityRenderer) {}

    fn on_remove_from_scene(&self, _base: &EntityRenderer) {}

    fn needs_render_update(&self, base: &EntityRenderer) -> bool {
        let state = self.state.read();
        !state.dirty.is_empty()
            || base.entity().read(|p| {
                p.transform.position != state.position
                    || p.transform.rotation != state.rotation
                    || p.dimensions != state.dimensions
                    || p.visible != state.visible
                    || p.zone != state.zone
            })
    }

    fn do_render_update_synchronous(&self, base: &EntityRenderer) {
        let (position, rotation, dimensions, visible, zone) = base.entity().read(|p| {
            (
                p.transform.position,
                p.transform.rotation,
                p.dimensions,
                p.visible,
                p.zone.clone(),
            )
        });
        let mut state = self.state.write();
        state.position = position;
        state.rotation = rotation;
        state.dimensions = dimensions;
        state.visible = visible;
        state.take_zone(&zone);
    }

    fn do_render_update_asynchronous(&self, base: &EntityRenderer) {
        let mut state = self.state.write();
        let dirty = state.dirty;
        let zone = &state.zone;
        let mut entry = state.entry.clone().unwrap_or(ZoneStageEntry {
            zone: base.entity().id(),
            bound: Aabb::default(),
            key_light: None,
            ambient_light: None,
            skybox: None,
            haze: None,
            bloom: None,
        });
        if dirty.contains(ZoneDirty::KEY_LIGHT) {
            let enabled = zone.key_light_mode == ComponentMode::Enabled;
            entry.key_light = enabled.then(|| KeyLight {
                color: rgb(zone.key_light.color),
                intensity: zone.key_light.intensity,
                direction: zone.key_light.direction,
                cast_shadows: zone.key_light.cast_shadows,
            });
        }
        if dirty.contains(ZoneDirty::AMBIENT_LIGHT) {
            let enabled = zone.ambient_light_mode == ComponentMode::Enabled;
            entry.ambient_light = enabled.then_some(AmbientLight {
                intensity: zone.ambient_light.intensity,
            });
        }
        if dirty.contains(ZoneDirty::SKYBOX) {
            let enabled = zone.skybox_mode == ComponentMode::Enabled;
            entry.skybox = enabled.then(|| Skybox {
                color: rgb(zone.skybox.color),
            });
        }
        if dirty.contains(ZoneDirty::HAZE) {
            let enabled = zone.haze_mode == ComponentMode::Enabled;
            entry.haze = enabled.then(|| Haze {
                range: zone.haze.range,
                color: rgb(zone.haze.color),
            });
        }
        if dirty.contains(ZoneDirty::BLOOM) {
            let enabled = zone.bloom_mode == ComponentMode::Enabled;
            entry.bloom = enabled.then_some(Bloom {
                intensity: zone.bloom.intensity,
                threshold: zone.bloom.threshold,
                size: zone.bloom.size,
            });
        }
        if !dirty.is_empty() {
            tracing::trace!(
                entity = %base.entity().id().short(),
                components = entry.component_count(),
                "zone stage entry rebuilt"
            );
        }
        state.entry = Some(entry);
        state.dirty = ZoneDirty::empty();
    }

    fn is_transparent(&self, _base: &EntityRenderer) -> bool {
        false
    }

    fn key(&self, base: &EntityRenderer) -> ItemKey {
        let mut builder = ItemKey::builder()
            .with_type_meta()
            .with_tag_bits(base.tag_mask())
            .with_layer(base.item_layer());
        if !base.is_visible() {
            builder = builder.with_invisible();
        }
        builder.build()
    }

    fn shape_key(&self, _base: &EntityRenderer) -> ShapeKey {
        ShapeKey::default()
    }

    fn bound(&self, base: &EntityRenderer) -> Aabb {
        base.base_bound()
    }

    fn render(&self, base: &EntityRenderer, args: &mut RenderArgs<'_>) {
        let Some(mut entry) = self.stage_entry() else {
            return;
        };
        entry.bound = base.bound();
        args.zone_stack.push(entry);
    }
}
