use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::Transform;

/// Axis-aligned box stored as a minimum corner plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub corner: Vec3,
    pub scale: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            corner: Vec3::ZERO,
            scale: Vec3::ZERO,
        }
    }
}

impl Aabb {
    pub fn new(corner: Vec3, scale: Vec3) -> Self {
        Self { corner, scale }
    }

    pub fn from_center(center: Vec3, scale: Vec3) -> Self {
        Self {
            corner: center - scale * 0.5,
            scale,
        }
    }

    /// Bound of a unit cube centered on the origin after `transform`.
    pub fn from_transformed_unit_cube(transform: &Transform) -> Self {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for i in 0..8 {
            let local = Vec3::new(
                if i & 1 == 0 { -0.5 } else { 0.5 },
                if i & 2 == 0 { -0.5 } else { 0.5 },
                if i & 4 == 0 { -0.5 } else { 0.5 },
            );
            let p = transform.transform_point(local);
            min = min.min(p);
            max = max.max(p);
        }
        Self::new(min, max - min)
    }

    pub fn center(&self) -> Vec3 {
        self.corner + self.scale * 0.5
    }

    pub fn max_corner(&self) -> Vec3 {
        self.corner + self.scale
    }

    /// Replace the extent while keeping the box centered where it was.
    pub fn set_scale_stay_centered(&mut self, scale: Vec3) {
        let center = self.center();
        self.scale = scale;
        self.corner = center - scale * 0.5;
    }

    pub fn contains(&self, point: Vec3) -> bool {
        let max = self.max_corner();
        point.cmpge(self.corner).all() && point.cmple(max).all()
    }
}
