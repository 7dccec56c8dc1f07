//! Per-tick driver that keeps one renderer per representable entity in the tree.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use glam::Vec3;
use worldspace_common::{Clock, EntityId, USECS_PER_SECOND};
use worldspace_entities::{EntityTree, EntityType, TreeEvent};
use worldspace_render::{Scene, Transaction, TransitionType};

use crate::config::EntityRendererConfig;
use crate::context::{RenderContext, RenderQueues};
use crate::fade::{LayeredZone, LayeredZones};
use crate::renderer::EntityRenderer;

/// What one [`EntityTreeRenderer::update`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeUpdateStats {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
    pub fading_out: usize,
}

#[derive(Debug)]
struct FadingOut {
    renderer: Arc<EntityRenderer>,
    deadline_usec: u64,
}

/// Owns the renderers and turns tree events and change notifications into
/// scene transactions.
#[derive(Debug)]
pub struct EntityTreeRenderer {
    ctx: Arc<RenderContext>,
    queues: RenderQueues,
    renderables: BTreeMap<EntityId, Arc<EntityRenderer>>,
    fading_out: Vec<FadingOut>,
}

impl EntityTreeRenderer {
    pub fn new(config: EntityRendererConfig, clock: Arc<dyn Clock>) -> Self {
        let (ctx, queues) = RenderContext::new(config, clock);
        Self {
            ctx,
            queues,
            renderables: BTreeMap::new(),
            fading_out: Vec::new(),
        }
    }

    pub fn context(&self) -> &Arc<RenderContext> {
        &self.ctx
    }

    pub fn renderable(&self, id: EntityId) -> Option<&Arc<EntityRenderer>> {
        self.renderables.get(&id)
    }

    pub fn renderable_count(&self) -> usize {
        self.renderables.len()
    }

    pub fn fading_out_count(&self) -> usize {
        self.fading_out.len()
    }

    /// One simulation tick: refresh the layered zones around `viewer`, apply
    /// tree events, update whatever changed and retire finished leave fades.
    /// The resulting transaction is queued on `scene`.
    pub fn update(
        &mut self,
        tree: &mut EntityTree,
        scene: &Scene,
        viewer: Vec3,
    ) -> TreeUpdateStats {
        let _span = tracing::info_span!("entity_tree_render_update").entered();
        let mut stats = TreeUpdateStats::default();
        let mut transaction = Transaction::new();

        self.ctx.set_layered_zones(layered_zones_at(tree, viewer));

        for event in tree.drain_events() {
            match event {
                TreeEvent::Added { id, .. } => {
                    if let Some(old) = self.renderables.remove(&id) {
                        old.remove_from_scene(&mut transaction);
                    }
                    let ctx = &self.ctx;
                    if let Some(renderer) =
                        EntityRenderer::add_to_scene(tree.get(id), scene, ctx, &mut transaction)
                    {
                        self.renderables.insert(id, renderer);
                        stats.added += 1;
                    }
                }
                TreeEvent::Deleted { id } => {
                    let Some(renderer) = self.renderables.remove(&id) else {
                        continue;
                    };
                    if renderer.wants_fade_out() {
                        renderer.fade(&mut transaction, TransitionType::ElementLeaveDomain);
                        let duration = renderer.fade_duration_secs();
                        let deadline_usec =
                            self.ctx.now() + (duration.max(0.0) * USECS_PER_SECOND as f32) as u64;
                        tracing::debug!(entity = %id.short(), duration, "leave fade started");
                        self.fading_out.push(FadingOut {
                            renderer,
                            deadline_usec,
                        });
                    } else {
                        renderer.remove_from_scene(&mut transaction);
                        stats.removed += 1;
                    }
                }
                // Edits reach us through the change queue.
                TreeEvent::Edited { .. } => {}
            }
        }

        let changed: BTreeSet<EntityId> = self.queues.entity_changes.try_iter().collect();
        let requested: BTreeSet<EntityId> = self.queues.render_requests.try_iter().collect();
        for id in changed.union(&requested) {
            let Some(renderer) = self.lookup(*id) else {
                continue;
            };
            if requested.contains(id) || renderer.needs_render_update() {
                renderer.update_in_scene(&mut transaction);
                stats.updated += 1;
            }
        }

        let now = self.ctx.now();
        let (expired, remaining): (Vec<_>, Vec<_>) = std::mem::take(&mut self.fading_out)
            .into_iter()
            .partition(|f| now >= f.deadline_usec);
        for fading in expired {
            fading.renderer.remove_from_scene(&mut transaction);
            stats.removed += 1;
        }
        self.fading_out = remaining;
        stats.fading_out = self.fading_out.len();

        if !transaction.is_empty() {
            scene.enqueue_transaction(transaction);
        }
        tracing::debug!(
            added = stats.added,
            removed = stats.removed,
            updated = stats.updated,
            fading_out = stats.fading_out,
            "tree render update"
        );
        stats
    }

    fn lookup(&self, id: EntityId) -> Option<Arc<EntityRenderer>> {
        self.renderables.get(&id).cloned().or_else(|| {
            self.fading_out
                .iter()
                .find(|f| f.renderer.entity().id() == id)
                .map(|f| Arc::clone(&f.renderer))
        })
    }

    /// Remove every renderer, fading or not, without leave fades.
    pub fn clear(&mut self, scene: &Scene) {
        let mut transaction = Transaction::new();
        let count = self.renderables.len() + self.fading_out.len();
        for renderer in std::mem::take(&mut self.renderables).into_values() {
            renderer.remove_from_scene(&mut transaction);
        }
        for fading in self.fading_out.drain(..) {
            fading.renderer.remove_from_scene(&mut transaction);
        }
        self.queues.entity_changes.try_iter().for_each(drop);
        self.queues.render_requests.try_iter().for_each(drop);
        scene.enqueue_transaction(transaction);
        tracing::debug!(count, "tree renderer cleared");
    }
}

/// Zone entities whose box contains `viewer`, sized by their volume.
fn layered_zones_at(tree: &EntityTree, viewer: Vec3) -> LayeredZones {
    let zones = tree
        .entities()
        .filter(|e| e.entity_type() == EntityType::Zone && e.aa_box().contains(viewer))
        .map(|e| {
            e.read(|p| LayeredZone {
                id: e.id(),
                volume: p.dimensions.x * p.dimensions.y * p.dimensions.z,
                fade_in_mode: p.fade_in_mode,
                fade_in: p.fade_in,
                fade_out_mode: p.fade_out_mode,
                fade_out: p.fade_out,
            })
        })
        .collect();
    LayeredZones::new(zones)
}
