use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use worldspace_common::{EntityId, Transform};

use crate::types::{
    BillboardMode, ComponentMode, EntityHostType, EntityShape, MirrorMode, PrimitiveMode,
    PulseMode, RenderLayer,
};
use crate::zone::ZonePropertyGroup;

/// Color/alpha oscillation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulsePropertyGroup {
    pub min: f32,
    pub max: f32,
    /// Seconds per cycle. Zero disables pulsing.
    pub period: f32,
    pub color_mode: PulseMode,
    pub alpha_mode: PulseMode,
}

impl Default for PulsePropertyGroup {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            period: 1.0,
            color_mode: PulseMode::None,
            alpha_mode: PulseMode::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FadeTiming {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

/// Authoring-side description of an enter/leave dissolve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FadePropertyGroup {
    /// Seconds.
    pub duration: f32,
    pub timing: FadeTiming,
    pub noise_speed: Vec3,
    pub noise_size: Vec3,
    pub noise_level: f32,
    pub base_size: Vec3,
    pub base_level: f32,
    pub edge_inner_color: [u8; 3],
    pub edge_inner_alpha: f32,
    pub edge_outer_color: [u8; 3],
    pub edge_outer_alpha: f32,
    pub edge_width: f32,
    pub inverted: bool,
}

impl Default for FadePropertyGroup {
    fn default() -> Self {
        Self {
            duration: 1.0,
            timing: FadeTiming::Linear,
            noise_speed: Vec3::ZERO,
            noise_size: Vec3::ONE,
            noise_level: 1.0,
            base_size: Vec3::ONE,
            base_level: 0.0,
            edge_inner_color: [255, 255, 255],
            edge_inner_alpha: 1.0,
            edge_outer_color: [255, 255, 255],
            edge_outer_alpha: 1.0,
            edge_width: 0.1,
            inverted: false,
        }
    }
}

/// Everything an entity carries that the renderers read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityProperties {
    pub transform: Transform,
    pub dimensions: Vec3,
    /// Local-space anchor of `transform.position`, (0.5, 0.5, 0.5) is the center.
    pub registration_point: Vec3,
    pub visible: bool,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,

    pub billboard_mode: BillboardMode,
    pub primitive_mode: PrimitiveMode,
    pub render_layer: RenderLayer,
    pub can_cast_shadow: bool,
    pub cull_with_parent: bool,
    pub cauterized: bool,
    pub visible_in_secondary_camera: bool,
    pub mirror_mode: MirrorMode,
    pub portal_exit_id: Option<EntityId>,
    pub render_with_zones: Vec<EntityId>,

    pub shape: EntityShape,
    pub color: [u8; 3],
    pub alpha: f32,
    pub unlit: bool,
    pub inner_radius: f32,
    pub pulse: PulsePropertyGroup,
    pub user_data: String,

    pub fade_in_mode: ComponentMode,
    pub fade_in: FadePropertyGroup,
    pub fade_out_mode: ComponentMode,
    pub fade_out: FadePropertyGroup,

    pub host_type: EntityHostType,
    pub owning_avatar_id: Option<Uuid>,
    pub simulation_owner: Option<Uuid>,
    pub has_actions: bool,

    pub zone: ZonePropertyGroup,
}

impl Default for EntityProperties {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            dimensions: Vec3::new(0.1, 0.1, 0.1),
            registration_point: Vec3::splat(0.5),
            visible: true,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            billboard_mode: BillboardMode::None,
            primitive_mode: PrimitiveMode::Solid,
            render_layer: RenderLayer::World,
            can_cast_shadow: true,
            cull_with_parent: false,
            cauterized: false,
            visible_in_secondary_camera: true,
            mirror_mode: MirrorMode::None,
            portal_exit_id: None,
            render_with_zones: Vec::new(),
            shape: EntityShape::Cube,
            color: [255, 255, 255],
            alpha: 1.0,
            unlit: false,
            inner_radius: 0.0,
            pulse: PulsePropertyGroup::default(),
            user_data: String::new(),
            fade_in_mode: ComponentMode::Inherit,
            fade_in: FadePropertyGroup::default(),
            fade_out_mode: ComponentMode::Inherit,
            fade_out: FadePropertyGroup::default(),
            host_type: EntityHostType::Domain,
            owning_avatar_id: None,
            simulation_owner: None,
            has_actions: false,
            zone: ZonePropertyGroup::default(),
        }
    }
}

impl EntityProperties {
    pub fn at(position: Vec3) -> Self {
        Self {
            transform: Transform {
                position,
                ..Transform::default()
            },
            ..Self::default()
        }
    }

    /// Transform placing the origin at the geometric center, unit scale.
    pub fn transform_to_center(&self) -> Transform {
        let offset = (Vec3::splat(0.5) - self.registration_point) * self.dimensions;
        Transform {
            position: self.transform.position + self.transform.rotation * offset,
            rotation: self.transform.rotation,
            scale: Vec3::ONE,
        }
    }

    pub fn color_vec3(&self) -> Vec3 {
        Vec3::new(
            self.color[0] as f32,
            self.color[1] as f32,
            self.color[2] as f32,
        ) / 255.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn centered_registration_keeps_position() {
        let props = EntityProperties::at(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(
            props.transform_to_center().position,
            Vec3::new(1.0, 2.0, 3.0)
        );
    }

    #[test]
    fn corner_registration_offsets_center() {
        let props = EntityProperties {
            dimensions: Vec3::new(2.0, 2.0, 2.0),
            registration_point: Vec3::ZERO,
            transform: Transform {
                rotation: Quat::IDENTITY,
                ..Transform::default()
            },
            ..EntityProperties::default()
        };
        assert_eq!(props.transform_to_center().position, Vec3::ONE);
    }

    #[test]
    fn color_normalizes() {
        let props = EntityProperties {
            color: [255, 0, 51],
            ..EntityProperties::default()
        };
        let expected = Vec3::new(1.0, 0.0, 0.2);
        assert!(props.color_vec3().abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn properties_deserialize_with_defaults() {
        let props: EntityProperties =
            serde_json::from_str(r#"{"visible": false, "alpha": 0.5}"#).unwrap();
        assert!(!props.visible);
        assert_eq!(props.alpha, 0.5);
        assert_eq!(props.registration_point, Vec3::splat(0.5));
    }
}
