//! Render scene: item registry, classification keys, materials, transitions
//! and a renderer-agnostic traversal.
//!
//! # Invariants
//! - Items only change through [`Transaction`]s applied by
//!   [`Scene::process_transactions`] on the render thread.
//! - Keys are immutable once built.
//! - Removed payloads are dropped only when the graveyard is collected.
//!
//! # Workaround
//! [`DebugTextRenderer`] stands in for a GPU backend: it runs the frame
//! traversal and records batches, then reports them as text.

pub mod args;
pub mod batch;
pub mod frustum;
pub mod geometry;
pub mod graveyard;
pub mod item;
pub mod material;
pub mod payload;
mod renderer;
pub mod scene;
pub mod shape_key;
pub mod status;
pub mod transition;
pub mod zone_stage;

pub use args::{RenderArgs, RenderDetails, RenderMethod, RenderMode};
pub use batch::{Batch, BatchCommand, DrawShape};
pub use frustum::ViewFrustum;
pub use geometry::{GeometryCache, GeometryShape};
pub use graveyard::Graveyard;
pub use item::{ItemFlags, ItemId, ItemKey, ItemKeyBuilder, ItemLayer, ViewTags};
pub use material::{
    MapChannel, Material, MaterialKey, MaterialMappingMode, Outline, OutlineWidthMode,
    ProceduralState,
};
pub use payload::PayloadProxy;
pub use renderer::{DebugTextRenderer, FrameReport, FrameStats, RenderView, Renderer};
pub use scene::{ItemState, Payload, ProcessStats, Scene, Transaction, UpdateFn};
pub use shape_key::{CullFaceMode, ShapeKey, ShapeKeyBuilder};
pub use status::{StatusGetter, StatusIcon, StatusValue};
pub use transition::{
    FadeObjectParams, FadeProperties, FadeTiming, TransitionId, TransitionStage, TransitionType,
};
pub use zone_stage::ZoneStageEntry;

pub fn crate_info() -> &'static str {
    "worldspace-render v0.1.0"
}
