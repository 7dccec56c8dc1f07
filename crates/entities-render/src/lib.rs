//! Entity renderers: the bridge between live entities and the render scene.
//!
//! [`EntityTreeRenderer`] owns one [`EntityRenderer`] per representable
//! entity. Each renderer runs a synchronous update on the simulation side and
//! queues an asynchronous one that the scene runs on the render thread; the
//! draw traversal only ever sees it through [`worldspace_render::PayloadProxy`].
//!
//! # Invariants
//! - Unsupported entity types and missing entities produce no renderer.
//! - A renderer's item id is invalidated before the renderer can be added
//!   again; queued asynchronous updates for a stale id do nothing.
//! - Change notifications travel through the [`RenderQueues`] channels; no
//!   renderer calls into another thread directly.
//! - Nothing in this crate returns an error to the draw path.

pub mod billboard;
pub mod config;
pub mod context;
pub mod fade;
pub mod material_stack;
pub mod mirror;
pub mod pipeline;
pub mod pulse;
pub mod renderer;
pub mod status;
pub mod tree_renderer;
pub mod variants;

pub use config::{ConfigError, EntityRendererConfig};
pub use context::{RenderContext, RenderQueues};
pub use fade::{FadeState, LayeredZone, LayeredZones};
pub use material_stack::{
    BASE_MATERIAL, MaterialLayer, MaterialMap, MultiMaterial, ResolvedMaterial,
};
pub use mirror::{PortalExit, compute_mirror_view};
pub use pipeline::Pipeline;
pub use pulse::calculate_pulse_color;
pub use renderer::{EntityRenderer, OutlineStyle};
pub use tree_renderer::{EntityTreeRenderer, TreeUpdateStats};
pub use variants::{RendererVariant, ShapeRenderer, TypedRenderer, ZoneRenderer};

pub fn crate_info() -> &'static str {
    "worldspace-entities-render v0.1.0"
}
