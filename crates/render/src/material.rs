//! Materials shared between renderables.
//!
//! A [`Material`] is interior-mutable: the owner edits it in place and every
//! edit bumps a revision counter that stacks use for dirty tracking.

use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use glam::Vec3;
use parking_lot::RwLock;
use serde::Deserialize;
use worldspace_common::Aabb;

use crate::shape_key::CullFaceMode;

bitflags! {
    /// Texture channels a material samples.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MapChannel: u32 {
        const ALBEDO = 1 << 0;
        const METALLIC = 1 << 1;
        const ROUGHNESS = 1 << 2;
        const NORMAL = 1 << 3;
        const OCCLUSION = 1 << 4;
        const LIGHTMAP = 1 << 5;
        const EMISSIVE = 1 << 6;
        const SCATTERING = 1 << 7;
        const OPACITY = 1 << 8;
        const SPLAT = 1 << 9;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MaterialFlags: u32 {
        const EMISSIVE = 1 << 0;
        const UNLIT = 1 << 1;
        const METALLIC = 1 << 2;
        const SCATTERING = 1 << 3;
        const TRANSLUCENT = 1 << 4;
    }
}

/// Summary of what a material needs from the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialKey {
    flags: MaterialFlags,
    maps: MapChannel,
}

impl Default for MaterialKey {
    fn default() -> Self {
        Self {
            flags: MaterialFlags::empty(),
            maps: MapChannel::empty(),
        }
    }
}

impl MaterialKey {
    pub fn new(flags: MaterialFlags, maps: MapChannel) -> Self {
        Self { flags, maps }
    }

    pub fn flags(&self) -> MaterialFlags {
        self.flags
    }

    pub fn maps(&self) -> MapChannel {
        self.maps
    }

    pub fn is_emissive(&self) -> bool {
        self.flags.contains(MaterialFlags::EMISSIVE)
    }

    pub fn is_unlit(&self) -> bool {
        self.flags.contains(MaterialFlags::UNLIT)
    }

    pub fn is_metallic(&self) -> bool {
        self.flags.contains(MaterialFlags::METALLIC)
    }

    pub fn is_scattering(&self) -> bool {
        self.flags.contains(MaterialFlags::SCATTERING)
    }

    pub fn is_translucent(&self) -> bool {
        self.flags.contains(MaterialFlags::TRANSLUCENT)
    }

    pub fn is_map_channel(&self, channel: MapChannel) -> bool {
        self.maps.intersects(channel)
    }

    pub fn has_any_map(&self) -> bool {
        !self.maps.is_empty()
    }

    pub fn is_normal_map(&self) -> bool {
        self.maps.contains(MapChannel::NORMAL)
    }

    pub fn is_light_map(&self) -> bool {
        self.maps.contains(MapChannel::LIGHTMAP)
    }

    pub fn is_splat_map(&self) -> bool {
        self.maps.contains(MapChannel::SPLAT)
    }

    pub fn union(self, other: MaterialKey) -> MaterialKey {
        MaterialKey {
            flags: self.flags | other.flags,
            maps: self.maps | other.maps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaterialMappingMode {
    #[default]
    Uv,
    Triplanar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutlineWidthMode {
    /// Width in pixels.
    #[default]
    Absolute,
    /// Width in world units, projected at the item's distance.
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outline {
    pub width_mode: OutlineWidthMode,
    pub width: f32,
    pub color: Vec3,
}

/// Runtime state of a material driven by user-supplied shader data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProceduralState {
    pub ready: bool,
    pub fading: bool,
    pub fade_start_usec: u64,
    pub has_vertex_shader: bool,
    /// Bound override supplied alongside a vertex shader.
    pub bound: Option<Aabb>,
}

#[derive(Debug, Deserialize)]
struct ProceduralUserData {
    #[serde(rename = "ProceduralEntity")]
    procedural: Option<ProceduralData>,
}

#[derive(Debug, Deserialize)]
struct ProceduralData {
    #[serde(rename = "shaderUrl", default)]
    shader_url: String,
    #[serde(rename = "vertexShaderUrl", default)]
    vertex_shader_url: String,
    #[serde(default)]
    bound: Option<ProceduralBound>,
}

#[derive(Debug, Deserialize)]
struct ProceduralBound {
    center: [f32; 3],
    scale: [f32; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialState {
    pub name: String,
    pub albedo: Vec3,
    pub opacity: f32,
    pub unlit: bool,
    pub emissive: Vec3,
    pub metallic: f32,
    pub scattering: f32,
    pub maps: MapChannel,
    pub cull_face: CullFaceMode,
    pub mapping_mode: MaterialMappingMode,
    pub outline: Option<Outline>,
    pub procedural: Option<ProceduralState>,
    procedural_source: String,
}

impl MaterialState {
    fn new(name: String) -> Self {
        Self {
            name,
            albedo: Vec3::ONE,
            opacity: 1.0,
            unlit: false,
            emissive: Vec3::ZERO,
            metallic: 0.0,
            scattering: 0.0,
            maps: MapChannel::empty(),
            cull_face: CullFaceMode::Back,
            mapping_mode: MaterialMappingMode::Uv,
            outline: None,
            procedural: None,
            procedural_source: String::new(),
        }
    }

    pub fn key(&self) -> MaterialKey {
        let mut flags = MaterialFlags::empty();
        if self.emissive != Vec3::ZERO || self.maps.contains(MapChannel::EMISSIVE) {
            flags |= MaterialFlags::EMISSIVE;
        }
        if self.unlit {
            flags |= MaterialFlags::UNLIT;
        }
        if self.metallic > 0.0 || self.maps.contains(MapChannel::METALLIC) {
            flags |= MaterialFlags::METALLIC;
        }
        if self.scattering > 0.0 || self.maps.contains(MapChannel::SCATTERING) {
            flags |= MaterialFlags::SCATTERING;
        }
        if self.opacity < 1.0 || self.maps.contains(MapChannel::OPACITY) {
            flags |= MaterialFlags::TRANSLUCENT;
        }
        MaterialKey::new(flags, self.maps)
    }
}

#[derive(Debug)]
pub struct Material {
    state: RwLock<MaterialState>,
    revision: AtomicU64,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(MaterialState::new(name.into())),
            revision: AtomicU64::new(0),
        }
    }

    /// Incremented on every edit.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    pub fn state(&self) -> MaterialState {
        self.state.read().clone()
    }

    pub fn key(&self) -> MaterialKey {
        self.state.read().key()
    }

    pub fn edit(&self, f: impl FnOnce(&mut MaterialState)) {
        f(&mut self.state.write());
        self.revision.fetch_add(1, Ordering::AcqRel);
    }

    fn edit_if_changed(&self, f: impl FnOnce(&mut MaterialState) -> bool) -> bool {
        let changed = f(&mut self.state.write());
        if changed {
            self.revision.fetch_add(1, Ordering::AcqRel);
        }
        changed
    }

    pub fn set_albedo(&self, albedo: Vec3) -> bool {
        self.edit_if_changed(|s| std::mem::replace(&mut s.albedo, albedo) != albedo)
    }

    pub fn set_opacity(&self, opacity: f32) -> bool {
        self.edit_if_changed(|s| std::mem::replace(&mut s.opacity, opacity) != opacity)
    }

    pub fn set_unlit(&self, unlit: bool) -> bool {
        self.edit_if_changed(|s| std::mem::replace(&mut s.unlit, unlit) != unlit)
    }

    /// Parse shader data out of an entity's user data. Returns true when the
    /// procedural description changed. Unparseable data clears it.
    pub fn set_procedural_data(&self, user_data: &str, now_usec: u64) -> bool {
        self.edit_if_changed(|s| {
            if s.procedural_source == user_data {
                return false;
            }
            s.procedural_source = user_data.to_string();
            let parsed = serde_json::from_str::<ProceduralUserData>(user_data)
                .ok()
                .and_then(|d| d.procedural);
            let next = parsed.map(|data| {
                let has_vertex_shader = !data.vertex_shader_url.is_empty();
                let ready = !data.shader_url.is_empty();
                ProceduralState {
                    ready,
                    fading: ready,
                    fade_start_usec: now_usec,
                    has_vertex_shader,
                    bound: data
                        .bound
                        .filter(|_| has_vertex_shader)
                        .map(|b| Aabb::from_center(Vec3::from(b.center), Vec3::from(b.scale))),
                }
            });
            if next.is_none() && !user_data.is_empty() && s.procedural.is_some() {
                tracing::debug!(material = %s.name, "procedural data dropped");
            }
            let changed = s.procedural != next;
            s.procedural = next;
            changed
        })
    }

    pub fn procedural(&self) -> Option<ProceduralState> {
        self.state.read().procedural
    }

    pub fn is_procedural(&self) -> bool {
        self.state.read().procedural.is_some()
    }

    /// Procedural and ready to draw.
    pub fn ready_procedural(&self) -> Option<ProceduralState> {
        self.procedural().filter(|p| p.ready)
    }

    pub fn set_procedural_fading(&self, fading: bool) {
        self.edit_if_changed(|s| match s.procedural.as_mut() {
            Some(p) if p.fading != fading => {
                p.fading = fading;
                true
            }
            _ => false,
        });
    }

    pub fn outline(&self) -> Option<Outline> {
        self.state.read().outline
    }

    pub fn cull_face_mode(&self) -> CullFaceMode {
        self.state.read().cull_face
    }

    pub fn mapping_mode(&self) -> MaterialMappingMode {
        self.state.read().mapping_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_material_has_empty_key() {
        let m = Material::new("base");
        let key = m.key();
        assert!(!key.is_translucent());
        assert!(!key.has_any_map());
        assert!(!key.is_emissive());
    }

    #[test]
    fn opacity_makes_translucent() {
        let m = Material::new("base");
        assert!(m.set_opacity(0.5));
        assert!(!m.set_opacity(0.5));
        assert!(m.key().is_translucent());
    }

    #[test]
    fn edits_bump_revision() {
        let m = Material::new("base");
        let r0 = m.revision();
        m.set_albedo(Vec3::X);
        assert!(m.revision() > r0);
        let r1 = m.revision();
        m.set_albedo(Vec3::X);
        assert_eq!(m.revision(), r1);
    }

    #[test]
    fn maps_drive_predicates() {
        let m = Material::new("layered");
        m.edit(|s| s.maps = MapChannel::NORMAL | MapChannel::LIGHTMAP);
        let key = m.key();
        assert!(key.is_normal_map());
        assert!(key.is_light_map());
        assert!(key.is_map_channel(MapChannel::NORMAL));
        assert!(!key.is_splat_map());
    }

    #[test]
    fn procedural_data_parses_from_user_data() {
        let m = Material::new("base");
        let data = r#"{"ProceduralEntity": {"shaderUrl": "shader.fs"}}"#;
        assert!(m.set_procedural_data(data, 10));
        let p = m.ready_procedural().unwrap();
        assert!(p.fading);
        assert_eq!(p.fade_start_usec, 10);
        assert!(p.bound.is_none());
        assert!(!m.set_procedural_data(data, 20));
    }

    #[test]
    fn procedural_bound_needs_vertex_shader() {
        let m = Material::new("base");
        let data = r#"{"ProceduralEntity": {"shaderUrl": "a.fs", "vertexShaderUrl": "a.vs",
            "bound": {"center": [0, 1, 0], "scale": [2, 2, 2]}}}"#;
        m.set_procedural_data(data, 0);
        let bound = m.procedural().unwrap().bound.unwrap();
        assert_eq!(bound.center(), Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn procedural_without_shader_is_not_ready() {
        let m = Material::new("base");
        m.set_procedural_data(r#"{"ProceduralEntity": {}}"#, 0);
        assert!(m.is_procedural());
        assert!(m.ready_procedural().is_none());
    }

    #[test]
    fn garbage_user_data_clears_procedural() {
        let m = Material::new("base");
        m.set_procedural_data(r#"{"ProceduralEntity": {"shaderUrl": "a.fs"}}"#, 0);
        assert!(m.set_procedural_data("not json", 0));
        assert!(!m.is_procedural());
    }
}
