//! Enter/leave fade timing and the conversion from authored fade groups to
//! render-side fade properties.

use glam::{Vec3, Vec4};
use worldspace_common::EntityId;
use worldspace_common::time::elapsed_secs;
use worldspace_entities::{ComponentMode, FadePropertyGroup, FadeTiming};
use worldspace_render::{FadeProperties, TransitionType};

/// Linear fade progress, clamped to `[0, 1]`. A non-positive duration is
/// already finished.
pub fn fade_ratio(start_usec: u64, now_usec: u64, duration_secs: f32) -> f32 {
    if duration_secs <= 0.0 {
        return 1.0;
    }
    (elapsed_secs(start_usec, now_usec) / duration_secs).clamp(0.0, 1.0)
}

/// Fade bookkeeping of one renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FadeState {
    fading: bool,
    start_usec: u64,
}

impl FadeState {
    pub fn start(&mut self, now_usec: u64) {
        self.fading = true;
        self.start_usec = now_usec;
    }

    pub fn start_usec(&self) -> u64 {
        self.start_usec
    }

    /// The raw flag; may lag the clock until the next [`FadeState::update`].
    pub fn flag(&self) -> bool {
        self.fading
    }

    pub fn ratio(&self, now_usec: u64, duration_secs: f32) -> f32 {
        if self.fading {
            fade_ratio(self.start_usec, now_usec, duration_secs)
        } else {
            1.0
        }
    }

    /// Fading and not yet complete at `now_usec`.
    pub fn is_active(&self, now_usec: u64, duration_secs: f32) -> bool {
        self.fading && fade_ratio(self.start_usec, now_usec, duration_secs) < 1.0
    }

    /// Clear the flag once the ratio reaches 1. Returns whether still fading.
    pub fn update(&mut self, now_usec: u64, duration_secs: f32) -> bool {
        if self.fading {
            self.fading = fade_ratio(self.start_usec, now_usec, duration_secs) < 1.0;
        }
        self.fading
    }
}

fn color(rgb: [u8; 3], alpha: f32) -> Vec4 {
    let rgb = Vec3::new(rgb[0] as f32, rgb[1] as f32, rgb[2] as f32) / 255.0;
    rgb.extend(alpha)
}

fn inverse_size(size: Vec3) -> Vec3 {
    Vec3::new(
        if size.x != 0.0 { 1.0 / size.x } else { 0.0 },
        if size.y != 0.0 { 1.0 / size.y } else { 0.0 },
        if size.z != 0.0 { 1.0 / size.z } else { 0.0 },
    )
}

fn timing(timing: FadeTiming) -> worldspace_render::FadeTiming {
    match timing {
        FadeTiming::Linear => worldspace_render::FadeTiming::Linear,
        FadeTiming::EaseIn => worldspace_render::FadeTiming::EaseIn,
        FadeTiming::EaseOut => worldspace_render::FadeTiming::EaseOut,
        FadeTiming::EaseInOut => worldspace_render::FadeTiming::EaseInOut,
    }
}

/// Colors normalized from 0-255, sizes inverted.
pub fn fade_properties_from_group(group: &FadePropertyGroup) -> FadeProperties {
    FadeProperties {
        duration_secs: group.duration,
        timing: timing(group.timing),
        noise_speed: group.noise_speed,
        noise_inv_size: inverse_size(group.noise_size),
        noise_level: group.noise_level,
        base_inv_size: inverse_size(group.base_size),
        base_level: group.base_level,
        edge_inner_color: color(group.edge_inner_color, group.edge_inner_alpha),
        edge_outer_color: color(group.edge_outer_color, group.edge_outer_alpha),
        edge_width: group.edge_width,
        inverted: group.inverted,
    }
}

/// Fade settings of one zone the viewer is inside.
#[derive(Debug, Clone, PartialEq)]
pub struct LayeredZone {
    pub id: EntityId,
    pub volume: f32,
    pub fade_in_mode: ComponentMode,
    pub fade_in: FadePropertyGroup,
    pub fade_out_mode: ComponentMode,
    pub fade_out: FadePropertyGroup,
}

impl LayeredZone {
    fn group(&self, transition: TransitionType) -> Option<&FadePropertyGroup> {
        let (mode, group) = match transition {
            TransitionType::ElementEnterDomain => (self.fade_in_mode, &self.fade_in),
            TransitionType::ElementLeaveDomain => (self.fade_out_mode, &self.fade_out),
        };
        (mode == ComponentMode::Enabled).then_some(group)
    }
}

/// Zones containing the viewer, innermost (smallest) first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayeredZones {
    zones: Vec<LayeredZone>,
}

impl LayeredZones {
    pub fn new(mut zones: Vec<LayeredZone>) -> Self {
        zones.sort_by(|a, b| a.volume.total_cmp(&b.volume).then(a.id.cmp(&b.id)));
        Self { zones }
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.zones.iter().map(|z| z.id)
    }

    pub fn have_fade(&self, transition: TransitionType) -> bool {
        self.zones.iter().any(|z| z.group(transition).is_some())
    }

    /// The innermost enabled zone's fade, or defaults.
    pub fn fade_properties(&self, transition: TransitionType) -> FadeProperties {
        self.zones
            .iter()
            .find_map(|z| z.group(transition))
            .map(fade_properties_from_group)
            .unwrap_or_default()
    }
}
