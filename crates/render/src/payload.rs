use std::collections::HashSet;

use worldspace_common::{Aabb, EntityId};

use crate::args::RenderArgs;
use crate::frustum::ViewFrustum;
use crate::item::{ItemId, ItemKey};
use crate::shape_key::ShapeKey;
use crate::transition::{FadeProperties, TransitionType};

/// What the scene and its traversal need from a registered item.
pub trait PayloadProxy: Send + Sync {
    fn key(&self) -> ItemKey;

    fn shape_key(&self) -> ShapeKey;

    fn bound(&self) -> Aabb;

    fn render(&self, args: &mut RenderArgs<'_>);

    /// Append the item ids this payload stands for. Returns how many were added.
    fn meta_fetch_meta_sub_items(&self, sub_items: &mut Vec<ItemId>) -> usize;

    fn passes_zone_occlusion_test(&self, active_zones: &HashSet<EntityId>) -> bool;

    /// Turn `frustum` into the reflected view. Returns the portal exit item, if any.
    fn compute_mirror_view(&self, frustum: &mut ViewFrustum) -> ItemId;

    fn fade_properties(&self, transition: TransitionType) -> FadeProperties;

    /// Short label for debug output.
    fn label(&self) -> String;
}
