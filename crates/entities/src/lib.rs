//! Entities: the shared entity items the renderers read, and the tree that owns them.
//!
//! # Invariants
//! - Every property edit marks the item as needing a render update and
//!   notifies every registered change channel.
//! - Changing `render_with_zones` raises the zone-occlusion flag until a
//!   renderer resets it.
//! - Tree iteration order is deterministic (`EntityId` order).

pub mod item;
pub mod properties;
pub mod tree;
pub mod types;
pub mod zone;

pub use item::{ChangeHandlerId, EntityItem};
pub use properties::{EntityProperties, FadePropertyGroup, FadeTiming, PulsePropertyGroup};
pub use tree::{EditError, EntityTree, TreeEvent};
pub use types::{
    BillboardMode, ComponentMode, EntityHostType, EntityShape, EntityType, MirrorMode,
    PrimitiveMode, PulseMode, RenderLayer,
};
pub use zone::ZonePropertyGroup;

pub fn crate_info() -> &'static str {
    "worldspace-entities v0.1.0"
}
