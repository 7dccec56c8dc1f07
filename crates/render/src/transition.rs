//! Enter/leave dissolve transitions and their per-item parameter block.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use parking_lot::RwLock;
use worldspace_common::time::elapsed_secs;

use crate::item::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionType {
    ElementEnterDomain,
    ElementLeaveDomain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionId(u32);

impl TransitionId {
    pub const INVALID: TransitionId = TransitionId(u32::MAX);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl Default for TransitionId {
    fn default() -> Self {
        Self::INVALID
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FadeTiming {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl FadeTiming {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            FadeTiming::Linear => t,
            FadeTiming::EaseIn => t * t,
            FadeTiming::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            FadeTiming::EaseInOut => t * t * (3.0 - 2.0 * t),
        }
    }
}

/// Render-side dissolve description. Colors are normalized, sizes inverted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeProperties {
    pub duration_secs: f32,
    pub timing: FadeTiming,
    pub noise_speed: Vec3,
    pub noise_inv_size: Vec3,
    pub noise_level: f32,
    pub base_inv_size: Vec3,
    pub base_level: f32,
    pub edge_inner_color: Vec4,
    pub edge_outer_color: Vec4,
    pub edge_width: f32,
    pub inverted: bool,
}

impl Default for FadeProperties {
    fn default() -> Self {
        Self {
            duration_secs: 1.0,
            timing: FadeTiming::Linear,
            noise_speed: Vec3::ZERO,
            noise_inv_size: Vec3::ONE,
            noise_level: 1.0,
            base_inv_size: Vec3::ONE,
            base_level: 0.0,
            edge_inner_color: Vec4::ONE,
            edge_outer_color: Vec4::ONE,
            edge_width: 0.1,
            inverted: false,
        }
    }
}

/// GPU layout of the per-object fade parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct FadeObjectParams {
    /// xyz: noise offset, w: threshold.
    pub noise_offset: [f32; 4],
    /// xyz: inverse noise size, w: noise level.
    pub noise_inv_size: [f32; 4],
    /// xyz: inverse base size, w: base level.
    pub base_inv_size: [f32; 4],
    pub edge_inner_color: [f32; 4],
    pub edge_outer_color: [f32; 4],
    /// x: edge width, y: 1 when inverted.
    pub edge: [f32; 4],
}

impl FadeObjectParams {
    pub fn threshold(&self) -> f32 {
        self.noise_offset[3]
    }
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    item: ItemId,
    kind: TransitionType,
    start_usec: u64,
    properties: FadeProperties,
}

impl Transition {
    fn progress(&self, now_usec: u64) -> f32 {
        if self.properties.duration_secs <= 0.0 {
            return 1.0;
        }
        let elapsed = elapsed_secs(self.start_usec, now_usec);
        (elapsed / self.properties.duration_secs).clamp(0.0, 1.0)
    }

    fn params(&self, now_usec: u64) -> FadeObjectParams {
        let p = &self.properties;
        let elapsed = elapsed_secs(self.start_usec, now_usec);
        let mut threshold = p.timing.apply(self.progress(now_usec));
        if self.kind == TransitionType::ElementLeaveDomain {
            threshold = 1.0 - threshold;
        }
        let offset = p.noise_speed * elapsed;
        FadeObjectParams {
            noise_offset: [offset.x, offset.y, offset.z, threshold],
            noise_inv_size: p.noise_inv_size.extend(p.noise_level).to_array(),
            base_inv_size: p.base_inv_size.extend(p.base_level).to_array(),
            edge_inner_color: p.edge_inner_color.to_array(),
            edge_outer_color: p.edge_outer_color.to_array(),
            edge: [p.edge_width, if p.inverted { 1.0 } else { 0.0 }, 0.0, 0.0],
        }
    }
}

/// Active transitions keyed by id.
#[derive(Debug, Default)]
pub struct TransitionStage {
    transitions: RwLock<HashMap<TransitionId, Transition>>,
    next_id: AtomicU32,
}

impl TransitionStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &self,
        item: ItemId,
        kind: TransitionType,
        start_usec: u64,
        properties: FadeProperties,
    ) -> TransitionId {
        let id = TransitionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.transitions.write().insert(
            id,
            Transition {
                item,
                kind,
                start_usec,
                properties,
            },
        );
        id
    }

    pub fn remove(&self, id: TransitionId) -> bool {
        self.transitions.write().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.transitions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn item(&self, id: TransitionId) -> Option<ItemId> {
        self.transitions.read().get(&id).map(|t| t.item)
    }

    pub fn params(&self, id: TransitionId, now_usec: u64) -> Option<FadeObjectParams> {
        self.transitions.read().get(&id).map(|t| t.params(now_usec))
    }

    /// Drop finished transitions, returning the items they belonged to.
    pub fn retire_finished(&self, now_usec: u64) -> Vec<(TransitionId, ItemId)> {
        let mut finished = Vec::new();
        self.transitions.write().retain(|id, t| {
            let done = t.progress(now_usec) >= 1.0;
            if done {
                finished.push((*id, t.item));
            }
            !done
        });
        finished
    }
}
