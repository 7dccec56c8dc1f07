use glam::Vec3;

use crate::batch::Batch;
use crate::frustum::ViewFrustum;
use crate::scene::Scene;
use crate::shape_key::ShapeKey;
use crate::zone_stage::ZoneStageEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderMode {
    #[default]
    Default,
    Shadow,
    Mirror,
    SecondaryCamera,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderMethod {
    #[default]
    Deferred,
    Forward,
}

/// Counters accumulated over a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderDetails {
    pub items_drawn: usize,
    pub triangles_rendered: usize,
    pub material_switches: usize,
}

/// Everything a payload sees while drawing.
pub struct RenderArgs<'a> {
    pub scene: &'a Scene,
    pub now_usec: u64,
    pub render_mode: RenderMode,
    pub render_method: RenderMethod,
    pub mirror_depth: u32,
    pub view_frustum: ViewFrustum,
    /// Position of the primary camera; shadow passes billboard toward it.
    pub primary_view_position: Vec3,
    pub global_shape_key: ShapeKey,
    pub item_shape_key: ShapeKey,
    pub enable_texturing: bool,
    pub batch: Batch,
    pub details: RenderDetails,
    pub zone_stack: Vec<ZoneStageEntry>,
}

impl<'a> RenderArgs<'a> {
    pub fn new(scene: &'a Scene, view_frustum: ViewFrustum, now_usec: u64) -> Self {
        Self {
            scene,
            now_usec,
            render_mode: RenderMode::Default,
            render_method: RenderMethod::Deferred,
            mirror_depth: 0,
            primary_view_position: view_frustum.position(),
            view_frustum,
            global_shape_key: ShapeKey::default(),
            item_shape_key: ShapeKey::default(),
            enable_texturing: true,
            batch: Batch::new(),
            details: RenderDetails::default(),
            zone_stack: Vec::new(),
        }
    }

    /// Camera position billboards should face in this pass. Shadow and
    /// mirror passes keep facing the primary camera.
    pub fn billboard_view_position(&self) -> Vec3 {
        if self.render_mode == RenderMode::Shadow || self.mirror_depth > 0 {
            self.primary_view_position
        } else {
            self.view_frustum.position()
        }
    }

    /// Whether previous-frame transforms should advance in this pass.
    pub fn tracks_motion(&self) -> bool {
        matches!(self.render_mode, RenderMode::Default | RenderMode::Mirror)
    }
}
