use glam::Vec3;
use worldspace_common::{Aabb, EntityId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyLight {
    pub color: Vec3,
    pub intensity: f32,
    pub direction: Vec3,
    pub cast_shadows: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Skybox {
    pub color: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Haze {
    pub range: f32,
    pub color: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bloom {
    pub intensity: f32,
    pub threshold: f32,
    pub size: f32,
}

/// One zone's environment contribution for the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneStageEntry {
    pub zone: EntityId,
    pub bound: Aabb,
    pub key_light: Option<KeyLight>,
    pub ambient_light: Option<AmbientLight>,
    pub skybox: Option<Skybox>,
    pub haze: Option<Haze>,
    pub bloom: Option<Bloom>,
}

impl ZoneStageEntry {
    pub fn component_count(&self) -> usize {
        [
            self.key_light.is_some(),
            self.ambient_light.is_some(),
            self.skybox.is_some(),
            self.haze.is_some(),
            self.bloom.is_some(),
        ]
        .into_iter()
        .filter(|b| *b)
        .count()
    }
}
