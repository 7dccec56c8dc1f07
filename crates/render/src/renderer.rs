use std::collections::HashSet;
use std::fmt::Write;

use worldspace_common::EntityId;

use crate::args::{RenderArgs, RenderDetails, RenderMode};
use crate::frustum::ViewFrustum;
use crate::item::{ItemId, ViewTags};
use crate::scene::Scene;

/// Camera and clock for one frame.
#[derive(Debug, Clone, Copy)]
pub struct RenderView {
    pub frustum: ViewFrustum,
    pub now_usec: u64,
    pub render_mode: RenderMode,
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            frustum: ViewFrustum::looking_at(glam::Vec3::new(0.0, 10.0, 10.0), glam::Vec3::ZERO),
            now_usec: 0,
            render_mode: RenderMode::Default,
        }
    }
}

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// The renderer walks the scene's registered items for a view. It never
/// edits entities; everything it draws comes from payloads.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame of the given scene from the given view.
    fn render(&self, scene: &Scene, view: &RenderView) -> Self::Output;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub items: usize,
    pub drawn: usize,
    pub culled_by_zone: usize,
    pub culled_by_tag: usize,
    pub mirrors: usize,
    pub active_zones: usize,
    pub triangles: usize,
    pub material_switches: usize,
    pub draw_commands: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub text: String,
    pub stats: FrameStats,
}

/// Debug text renderer, stands in for a GPU backend.
///
/// Runs the same traversal a GPU frame would: a zone pass, then every shape
/// item filtered by view tags and zone occlusion, recursing into mirrors,
/// and reports what was drawn.
#[derive(Debug)]
pub struct DebugTextRenderer {
    max_mirror_depth: u32,
}

impl Default for DebugTextRenderer {
    fn default() -> Self {
        Self::new(1)
    }
}

struct Pass<'s> {
    scene: &'s Scene,
    ids: Vec<ItemId>,
    active_zones: HashSet<EntityId>,
    stats: FrameStats,
    out: String,
}

impl DebugTextRenderer {
    pub fn new(max_mirror_depth: u32) -> Self {
        Self { max_mirror_depth }
    }

    pub fn max_mirror_depth(&self) -> u32 {
        self.max_mirror_depth
    }

    fn zone_pass(&self, pass: &mut Pass<'_>, view: &RenderView) {
        let mut args = RenderArgs::new(pass.scene, view.frustum, view.now_usec);
        for id in &pass.ids {
            let Some(payload) = pass.scene.payload(*id) else {
                continue;
            };
            let key = payload.key();
            if key.is_meta() && !key.is_shape() {
                payload.render(&mut args);
            }
        }
        let eye = view.frustum.position();
        pass.active_zones = args
            .zone_stack
            .iter()
            .filter(|entry| entry.bound.contains(eye))
            .map(|entry| entry.zone)
            .collect();
        pass.stats.active_zones = pass.active_zones.len();
        for entry in &args.zone_stack {
            let _ = writeln!(
                pass.out,
                "  zone [{}] components={} active={}",
                entry.zone.short(),
                entry.component_count(),
                pass.active_zones.contains(&entry.zone)
            );
        }
    }

    fn shape_pass(
        &self,
        pass: &mut Pass<'_>,
        frustum: ViewFrustum,
        view: &RenderView,
        render_mode: RenderMode,
        depth: u32,
        skip: &[ItemId],
    ) -> RenderDetails {
        let indent = "  ".repeat(depth as usize + 1);
        let required_tag = match render_mode {
            RenderMode::SecondaryCamera => ViewTags::SECONDARY_VIEW,
            _ => ViewTags::MAIN_VIEW,
        };
        let mut args = RenderArgs::new(pass.scene, frustum, view.now_usec);
        args.render_mode = render_mode;
        args.mirror_depth = depth;
        args.primary_view_position = view.frustum.position();

        let ids = pass.ids.clone();
        for id in ids {
            if skip.contains(&id) {
                continue;
            }
            let Some(payload) = pass.scene.payload(id) else {
                continue;
            };
            let key = payload.key();
            if !key.is_shape() || !key.is_visible() {
                continue;
            }
            // Cauterized items lose the main-view tag but still show in mirrors.
            if depth == 0 && !key.tags().contains(required_tag) {
                pass.stats.culled_by_tag += 1;
                continue;
            }
            if !payload.passes_zone_occlusion_test(&pass.active_zones) {
                pass.stats.culled_by_zone += 1;
                let _ = writeln!(pass.out, "{indent}[{:>4}] culled by zone", id.raw());
                continue;
            }

            let before = args.details;
            let commands_before = args.batch.commands().len();
            args.item_shape_key = payload.shape_key();
            payload.render(&mut args);
            let drew = args.batch.commands().len() > commands_before;
            if drew {
                args.details.items_drawn += 1;
                pass.stats.drawn += 1;
            }
            let bound = payload.bound();
            let c = bound.center();
            let _ = writeln!(
                pass.out,
                "{indent}[{:>4}] {} center=({:.2}, {:.2}, {:.2}) {}{} tris={}",
                id.raw(),
                payload.label(),
                c.x,
                c.y,
                c.z,
                if key.is_transparent() {
                    "transparent"
                } else {
                    "opaque"
                },
                if drew { "" } else { " (skipped)" },
                args.details.triangles_rendered - before.triangles_rendered,
            );

            if key.is_mirror() && depth < self.max_mirror_depth {
                let mut mirrored = frustum;
                let exit = payload.compute_mirror_view(&mut mirrored);
                pass.stats.mirrors += 1;
                let p = mirrored.position();
                let _ = writeln!(
                    pass.out,
                    "{indent}  mirror view eye=({:.2}, {:.2}, {:.2}){}",
                    p.x,
                    p.y,
                    p.z,
                    if exit.is_valid() {
                        format!(" exit={}", exit.raw())
                    } else {
                        String::new()
                    }
                );
                let mut nested_skip = skip.to_vec();
                nested_skip.push(id);
                if exit.is_valid() {
                    nested_skip.push(exit);
                }
                let nested = self.shape_pass(
                    pass,
                    mirrored,
                    view,
                    RenderMode::Mirror,
                    depth + 1,
                    &nested_skip,
                );
                args.details.triangles_rendered += nested.triangles_rendered;
                args.details.material_switches += nested.material_switches;
                args.details.items_drawn += nested.items_drawn;
            }
        }
        pass.stats.draw_commands += args.batch.draw_count();
        args.details
    }
}

impl Renderer for DebugTextRenderer {
    type Output = FrameReport;

    fn render(&self, scene: &Scene, view: &RenderView) -> FrameReport {
        let _span = tracing::info_span!("debug_text_render").entered();
        let mut pass = Pass {
            scene,
            ids: scene.item_ids(),
            active_zones: HashSet::new(),
            stats: FrameStats::default(),
            out: String::new(),
        };
        pass.stats.items = pass.ids.len();

        let eye = view.frustum.position();
        let fwd = view.frustum.forward();
        let _ = writeln!(pass.out, "=== Scene (items={}) ===", pass.stats.items);
        let _ = writeln!(
            pass.out,
            "Camera: eye=({:.1}, {:.1}, {:.1}) forward=({:.2}, {:.2}, {:.2})",
            eye.x, eye.y, eye.z, fwd.x, fwd.y, fwd.z
        );

        self.zone_pass(&mut pass, view);
        let details = self.shape_pass(&mut pass, view.frustum, view, view.render_mode, 0, &[]);
        pass.stats.triangles = details.triangles_rendered;
        pass.stats.material_switches = details.material_switches;

        let s = pass.stats;
        let _ = writeln!(
            pass.out,
            "drawn={} culled(zone)={} culled(tag)={} mirrors={} triangles={} material_switches={}",
            s.drawn, s.culled_by_zone, s.culled_by_tag, s.mirrors, s.triangles, s.material_switches
        );
        tracing::debug!(drawn = s.drawn, triangles = s.triangles, "frame rendered");
        FrameReport {
            text: pass.out,
            stats: pass.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemKey, ItemKeyBuilder};
    use crate::payload::PayloadProxy;
    use crate::scene::Transaction;
    use crate::shape_key::ShapeKey;
    use crate::transition::{FadeProperties, TransitionType};
    use crate::zone_stage::ZoneStageEntry;
    use crate::geometry::GeometryShape;
    use crate::batch::DrawShape;
    use glam::{Mat4, Vec3, Vec4};
    use std::sync::Arc;
    use worldspace_common::Aabb;

    struct TestItem {
        key: ItemKey,
        zones: Vec<EntityId>,
        zone_entry: Option<ZoneStageEntry>,
    }

    impl TestItem {
        fn shape() -> Self {
            Self {
                key: ItemKeyBuilder::new().with_type_shape().build(),
                zones: Vec::new(),
                zone_entry: None,
            }
        }
    }

    impl PayloadProxy for TestItem {
        fn key(&self) -> ItemKey {
            self.key
        }
        fn shape_key(&self) -> ShapeKey {
            ShapeKey::default()
        }
        fn bound(&self) -> Aabb {
            Aabb::from_center(Vec3::ZERO, Vec3::ONE)
        }
        fn render(&self, args: &mut RenderArgs<'_>) {
            if let Some(entry) = &self.zone_entry {
                args.zone_stack.push(entry.clone());
                return;
            }
            args.batch
                .set_model_transform(Mat4::IDENTITY, Mat4::IDENTITY);
            args.batch.draw_shape(DrawShape {
                shape: GeometryShape::Cube,
                color: Vec4::ONE,
                wireframe: false,
                instanced: true,
                forward: false,
                cull_face: Default::default(),
                torus_id: None,
            });
            args.details.triangles_rendered += GeometryShape::Cube.triangle_count();
        }
        fn meta_fetch_meta_sub_items(&self, _sub_items: &mut Vec<ItemId>) -> usize {
            0
        }
        fn passes_zone_occlusion_test(&self, active_zones: &HashSet<EntityId>) -> bool {
            self.zones.is_empty() || self.zones.iter().any(|z| active_zones.contains(z))
        }
        fn compute_mirror_view(&self, frustum: &mut ViewFrustum) -> ItemId {
            frustum.set_position(-frustum.position());
            ItemId::INVALID
        }
        fn fade_properties(&self, _transition: TransitionType) -> FadeProperties {
            FadeProperties::default()
        }
        fn label(&self) -> String {
            "test".into()
        }
    }

    fn add(scene: &Scene, item: TestItem) -> ItemId {
        let id = scene.allocate_id();
        let mut t = Transaction::new();
        t.reset_item(id, Arc::new(item), Vec::new());
        scene.enqueue_transaction(t);
        scene.process_transactions(0);
        id
    }

    #[test]
    fn empty_scene_report() {
        let scene = Scene::new();
        let report = DebugTextRenderer::default().render(&scene, &RenderView::default());
        assert!(report.text.contains("items=0"));
        assert_eq!(report.stats.drawn, 0);
    }

    #[test]
    fn shapes_are_drawn_and_counted() {
        let scene = Scene::new();
        add(&scene, TestItem::shape());
        add(&scene, TestItem::shape());
        let report = DebugTextRenderer::default().render(&scene, &RenderView::default());
        assert_eq!(report.stats.drawn, 2);
        assert_eq!(report.stats.triangles, 24);
        assert_eq!(report.stats.draw_commands, 2);
    }

    #[test]
    fn zone_occlusion_culls_outside_zones() {
        let scene = Scene::new();
        let zone = EntityId::new();
        let other = EntityId::new();
        let mut zone_item = TestItem::shape();
        zone_item.key = ItemKeyBuilder::new().with_type_meta().build();
        zone_item.zone_entry = Some(ZoneStageEntry {
            zone,
            bound: Aabb::from_center(Vec3::ZERO, Vec3::splat(100.0)),
            key_light: None,
            ambient_light: None,
            skybox: None,
            haze: None,
            bloom: None,
        });
        add(&scene, zone_item);

        let mut inside = TestItem::shape();
        inside.zones = vec![zone];
        add(&scene, inside);
        let mut outside = TestItem::shape();
        outside.zones = vec![other];
        add(&scene, outside);

        let report = DebugTextRenderer::default().render(&scene, &RenderView::default());
        assert_eq!(report.stats.active_zones, 1);
        assert_eq!(report.stats.drawn, 1);
        assert_eq!(report.stats.culled_by_zone, 1);
    }

    #[test]
    fn mirrors_recurse_to_max_depth() {
        let scene = Scene::new();
        let mut mirror = TestItem::shape();
        mirror.key = ItemKeyBuilder::new()
            .with_type_shape()
            .with_mirror()
            .build();
        add(&scene, mirror);
        add(&scene, TestItem::shape());

        let report = DebugTextRenderer::new(1).render(&scene, &RenderView::default());
        assert_eq!(report.stats.mirrors, 1);
        // Mirror and plain shape at depth 0, plain shape again inside the mirror.
        assert_eq!(report.stats.drawn, 3);

        let flat = DebugTextRenderer::new(0).render(&scene, &RenderView::default());
        assert_eq!(flat.stats.mirrors, 0);
        assert_eq!(flat.stats.drawn, 2);
    }

    #[test]
    fn untagged_items_are_skipped_in_main_view() {
        let scene = Scene::new();
        let mut item = TestItem::shape();
        item.key = ItemKeyBuilder::new()
            .with_type_shape()
            .with_tag_bits(ViewTags::SECONDARY_VIEW)
            .build();
        add(&scene, item);
        let report = DebugTextRenderer::default().render(&scene, &RenderView::default());
        assert_eq!(report.stats.culled_by_tag, 1);
        assert_eq!(report.stats.drawn, 0);
    }
}
