use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::types::ComponentMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyLightProperties {
    pub color: [u8; 3],
    pub intensity: f32,
    pub direction: Vec3,
    pub cast_shadows: bool,
}

impl Default for KeyLightProperties {
    fn default() -> Self {
        Self {
            color: [255, 255, 255],
            intensity: 1.0,
            direction: Vec3::new(0.0, -1.0, 0.0),
            cast_shadows: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientLightProperties {
    pub intensity: f32,
    pub url: String,
}

impl Default for AmbientLightProperties {
    fn default() -> Self {
        Self {
            intensity: 0.5,
            url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyboxProperties {
    pub color: [u8; 3],
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HazeProperties {
    pub range: f32,
    pub color: [u8; 3],
}

impl Default for HazeProperties {
    fn default() -> Self {
        Self {
            range: 1000.0,
            color: [128, 154, 179],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomProperties {
    pub intensity: f32,
    pub threshold: f32,
    pub size: f32,
}

impl Default for BloomProperties {
    fn default() -> Self {
        Self {
            intensity: 0.25,
            threshold: 0.7,
            size: 0.9,
        }
    }
}

/// Environment settings carried by zone entities.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ZonePropertyGroup {
    pub key_light_mode: ComponentMode,
    pub key_light: KeyLightProperties,
    pub ambient_light_mode: ComponentMode,
    pub ambient_light: AmbientLightProperties,
    pub skybox_mode: ComponentMode,
    pub skybox: SkyboxProperties,
    pub haze_mode: ComponentMode,
    pub haze: HazeProperties,
    pub bloom_mode: ComponentMode,
    pub bloom: BloomProperties,
}
