//! Priority-ordered material layers per attachment point.
//!
//! # Invariants
//! - The top of a stack is its highest-priority layer; among equal
//!   priorities the most recently pushed wins.
//! - Resolved state is recomputed only through [`MultiMaterial::update`],
//!   which clears [`MultiMaterial::should_update`].

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Vec3;
use worldspace_render::{CullFaceMode, Material, MaterialKey, MaterialMappingMode, Outline};

/// Attachment point of an entity's own material.
pub const BASE_MATERIAL: &str = "0";

/// Up to this many equal-priority layers blend into one draw.
pub const MAX_BLENDED_LAYERS: u8 = 3;

#[derive(Debug, Clone)]
pub struct MaterialLayer {
    pub material: Arc<Material>,
    pub priority: u16,
}

impl MaterialLayer {
    pub fn new(material: Arc<Material>, priority: u16) -> Self {
        Self { material, priority }
    }
}

/// Result of resolving a stack: what the top layers contribute to a draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedMaterial {
    pub key: MaterialKey,
    pub albedo: Vec3,
    pub opacity: f32,
    pub cull_face: CullFaceMode,
    pub mapping_mode: MaterialMappingMode,
    pub outline: Option<Outline>,
    pub layers: u8,
    pub splat_map: bool,
}

impl Default for ResolvedMaterial {
    fn default() -> Self {
        Self {
            key: MaterialKey::default(),
            albedo: Vec3::ONE,
            opacity: 1.0,
            cull_face: CullFaceMode::Back,
            mapping_mode: MaterialMappingMode::Uv,
            outline: None,
            layers: 1,
            splat_map: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct MultiMaterial {
    // Ascending priority; the last element is the top.
    layers: Vec<MaterialLayer>,
    // Revisions observed by the last resolve, parallel to `layers`.
    seen_revisions: Vec<u64>,
    needs_update: bool,
    resolved: ResolvedMaterial,
}

impl MultiMaterial {
    pub fn new() -> Self {
        Self {
            needs_update: true,
            ..Self::default()
        }
    }

    pub fn push(&mut self, layer: MaterialLayer) {
        let at = self
            .layers
            .partition_point(|l| l.priority <= layer.priority);
        self.layers.insert(at, layer);
        self.needs_update = true;
    }

    /// Remove the layer holding exactly this material. Returns whether one was found.
    pub fn remove(&mut self, material: &Arc<Material>) -> bool {
        let Some(at) = self
            .layers
            .iter()
            .position(|l| Arc::ptr_eq(&l.material, material))
        else {
            return false;
        };
        self.layers.remove(at);
        self.needs_update = true;
        true
    }

    pub fn top(&self) -> Option<&MaterialLayer> {
        self.layers.last()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers were pushed/removed or a material was edited since the last resolve.
    pub fn should_update(&self) -> bool {
        self.needs_update
            || self.seen_revisions.len() != self.layers.len()
            || self
                .layers
                .iter()
                .zip(&self.seen_revisions)
                .any(|(l, seen)| l.material.revision() != *seen)
    }

    pub fn set_needs_update(&mut self) {
        self.needs_update = true;
    }

    pub fn update(&mut self) {
        self.seen_revisions = self.layers.iter().map(|l| l.material.revision()).collect();
        self.needs_update = false;

        let Some(top) = self.layers.last() else {
            self.resolved = ResolvedMaterial::default();
            return;
        };
        let top_state = top.material.state();
        let blended: Vec<&MaterialLayer> = self
            .layers
            .iter()
            .rev()
            .take_while(|l| l.priority == top.priority)
            .take(MAX_BLENDED_LAYERS as usize)
            .collect();
        let key = blended
            .iter()
            .skip(1)
            .fold(top_state.key(), |key, l| key.union(l.material.key()));

        self.resolved = ResolvedMaterial {
            key,
            albedo: top_state.albedo,
            opacity: top_state.opacity,
            cull_face: top_state.cull_face,
            mapping_mode: top_state.mapping_mode,
            outline: top_state.outline,
            layers: blended.len() as u8,
            splat_map: key.is_splat_map(),
        };
        tracing::trace!(
            material = %top_state.name,
            layers = blended.len(),
            "material stack resolved"
        );
    }

    pub fn resolved(&self) -> &ResolvedMaterial {
        &self.resolved
    }

    pub fn key(&self) -> MaterialKey {
        self.resolved.key
    }

    pub fn cull_face_mode(&self) -> CullFaceMode {
        self.resolved.cull_face
    }

    pub fn layers(&self) -> u8 {
        self.resolved.layers
    }

    pub fn is_splat_map(&self) -> bool {
        self.resolved.splat_map
    }

    pub fn mapping_mode(&self) -> MaterialMappingMode {
        self.resolved.mapping_mode
    }

    pub fn outline(&self) -> Option<Outline> {
        self.resolved.outline
    }

    pub fn has_outline(&self) -> bool {
        self.resolved.outline.is_some()
    }
}

/// Stacks keyed by attachment point name.
pub type MaterialMap = BTreeMap<String, MultiMaterial>;
