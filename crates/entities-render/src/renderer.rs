//! Base entity renderer: scene registration, the two-phase update, keys,
//! fades and material stacks shared by every variant.
//!
//! # Invariants
//! - A renderer holds at most one scene item id; removal invalidates it before
//!   any new registration.
//! - Synchronous fields (transform, bound, visibility, moving) change only
//!   under the `sync` write lock.
//! - Asynchronous fields change only from the deferred update closure, which
//!   the scene runs on the render thread.
//! - Locks are never held across calls into the variant.

use std::collections::HashSet;
use std::f32::consts::SQRT_2;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use glam::{Vec3, Vec4};
use parking_lot::{Mutex, RwLock};
use worldspace_common::{Aabb, EntityId, Transform};
use worldspace_entities::{
    BillboardMode, ChangeHandlerId, ComponentMode, EntityItem, EntityProperties,
    FadePropertyGroup, MirrorMode, PrimitiveMode, RenderLayer,
};
use worldspace_render::{
    FadeObjectParams, FadeProperties, ItemId, ItemKey, ItemKeyBuilder, ItemLayer, Material,
    OutlineWidthMode, Payload, PayloadProxy, RenderArgs, RenderMode, Scene, ShapeKey, Transaction,
    TransitionType, ViewFrustum, ViewTags,
};

use crate::context::RenderContext;
use crate::fade::{FadeState, fade_properties_from_group, fade_ratio};
use crate::material_stack::{BASE_MATERIAL, MaterialLayer, MaterialMap, ResolvedMaterial};
use crate::mirror;
use crate::pipeline::{self, Pipeline};
use crate::status;
use crate::variants::{self, RendererVariant, TypedRenderer};

/// Fields refreshed by the synchronous phase.
#[derive(Debug, Clone, Copy, Default)]
struct SyncState {
    model_transform: Transform,
    bound: Aabb,
    moving: bool,
    visible: bool,
    prev_transparent: bool,
    fade: FadeState,
    fade_duration_secs: f32,
}

/// Fields refreshed by the asynchronous phase.
#[derive(Debug, Clone)]
struct AsyncState {
    visible_in_secondary_camera: bool,
    render_layer: RenderLayer,
    billboard_mode: BillboardMode,
    primitive_mode: PrimitiveMode,
    can_cast_shadow: bool,
    cull_with_parent: bool,
    cauterized: bool,
    mirror_mode: MirrorMode,
    portal_exit_id: Option<EntityId>,
    render_with_zones: HashSet<EntityId>,
    fade_out_mode: ComponentMode,
    fade_out: FadePropertyGroup,
}

impl AsyncState {
    fn from_properties(props: &EntityProperties) -> Self {
        let mut state = Self {
            visible_in_secondary_camera: false,
            render_layer: RenderLayer::World,
            billboard_mode: BillboardMode::None,
            primitive_mode: PrimitiveMode::Solid,
            can_cast_shadow: false,
            cull_with_parent: false,
            cauterized: false,
            mirror_mode: MirrorMode::None,
            portal_exit_id: None,
            render_with_zones: props.render_with_zones.iter().copied().collect(),
            fade_out_mode: ComponentMode::Inherit,
            fade_out: FadePropertyGroup::default(),
        };
        state.copy_from(props);
        state
    }

    fn copy_from(&mut self, props: &EntityProperties) {
        self.visible_in_secondary_camera = props.visible_in_secondary_camera;
        self.render_layer = props.render_layer;
        self.billboard_mode = props.billboard_mode;
        self.primitive_mode = props.primitive_mode;
        self.can_cast_shadow = props.can_cast_shadow;
        self.cull_with_parent = props.cull_with_parent;
        self.cauterized = props.cauterized;
        self.mirror_mode = props.mirror_mode;
        self.portal_exit_id = props.portal_exit_id;
        self.fade_out_mode = props.fade_out_mode;
        self.fade_out = props.fade_out;
    }

    fn is_mirror(&self) -> bool {
        self.mirror_mode == MirrorMode::Mirror
            || (self.mirror_mode == MirrorMode::Portal && self.portal_exit_id.is_some())
    }
}

/// Outline as drawn: a width in pixels and a color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlineStyle {
    pub width_px: f32,
    pub color: Vec3,
}

impl Default for OutlineStyle {
    fn default() -> Self {
        Self {
            width_px: 2.0,
            color: Vec3::ONE,
        }
    }
}

/// One per live entity with a visual representation. The scene owns it
/// through its payload; the tree renderer keeps a handle for updates.
pub struct EntityRenderer {
    entity: Arc<EntityItem>,
    ctx: Arc<RenderContext>,
    item_id: AtomicU32,
    sync: RwLock<SyncState>,
    async_state: RwLock<AsyncState>,
    materials: Mutex<MaterialMap>,
    change_handler: Mutex<Option<ChangeHandlerId>>,
    variant: RendererVariant,
}

impl std::fmt::Debug for EntityRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRenderer")
            .field("entity", &self.entity.id())
            .field("variant", &self.variant.label())
            .field("item_id", &self.item_id())
            .finish()
    }
}

impl EntityRenderer {
    fn new(entity: Arc<EntityItem>, ctx: Arc<RenderContext>, variant: RendererVariant) -> Self {
        let async_state = entity.read(AsyncState::from_properties);
        Self {
            entity,
            ctx,
            item_id: AtomicU32::new(ItemId::INVALID.raw()),
            sync: RwLock::new(SyncState::default()),
            async_state: RwLock::new(async_state),
            materials: Mutex::new(MaterialMap::new()),
            change_handler: Mutex::new(None),
            variant,
        }
    }

    /// Build the renderer for `entity` and register it with the scene.
    ///
    /// Returns `None` for a missing entity or a type with no renderer.
    pub fn add_to_scene(
        entity: Option<&Arc<EntityItem>>,
        scene: &Scene,
        ctx: &Arc<RenderContext>,
        transaction: &mut Transaction,
    ) -> Option<Arc<Self>> {
        let Some(entity) = entity else {
            tracing::debug!("add_to_scene without an entity");
            return None;
        };
        let Some(constructor) = variants::constructor_for(entity.entity_type()) else {
            tracing::debug!(
                entity = %entity.id().short(),
                entity_type = ?entity.entity_type(),
                "no renderer for entity type"
            );
            return None;
        };
        let renderer = Arc::new(Self::new(
            Arc::clone(entity),
            Arc::clone(ctx),
            constructor(entity.entity_type()),
        ));

        let id = scene.allocate_id();
        renderer.item_id.store(id.raw(), Ordering::Release);
        let payload: Payload = renderer.clone();
        transaction.reset_item(id, payload, status::status_getters(entity, ctx));
        if ctx.config().fade_on_add && renderer.wants_fade_in() {
            renderer.fade(transaction, TransitionType::ElementEnterDomain);
        }
        renderer.on_add_to_scene();
        ctx.register_renderable(&renderer);
        renderer.update_in_scene(transaction);
        tracing::debug!(
            entity = %entity.id().short(),
            item = id.raw(),
            variant = renderer.variant.label(),
            "renderer added"
        );
        Some(renderer)
    }

    fn on_add_to_scene(&self) {
        let sender = self.ctx.change_sender();
        let handler = self.entity.register_change_handler(sender);
        *self.change_handler.lock() = Some(handler);
        self.variant.on_add_to_scene(self);
    }

    fn on_remove_from_scene(&self) {
        if let Some(handler) = self.change_handler.lock().take() {
            self.entity.deregister_change_handler(handler);
        }
        self.variant.on_remove_from_scene(self);
    }

    /// Tear down and release the item id.
    pub fn remove_from_scene(&self, transaction: &mut Transaction) {
        self.on_remove_from_scene();
        let id = ItemId::from_raw(self.item_id.swap(ItemId::INVALID.raw(), Ordering::AcqRel));
        if id.is_valid() {
            transaction.remove_item(id);
        }
        self.ctx.unregister_renderable(self);
        tracing::debug!(entity = %self.entity.id().short(), item = id.raw(), "renderer removed");
    }

    /// Run the synchronous phase now and queue the asynchronous phase for the
    /// render thread.
    pub fn update_in_scene(self: &Arc<Self>, transaction: &mut Transaction) {
        let id = self.item_id();
        if !id.is_valid() {
            tracing::trace!(entity = %self.entity.id().short(), "update skipped, not in scene");
            return;
        }
        self.do_render_update_synchronous();

        let weak = Arc::downgrade(self);
        transaction.update_item(
            id,
            Box::new(move || {
                // Removal may have happened while this was queued.
                if let Some(renderer) = weak.upgrade().filter(|r| r.item_id() == id) {
                    renderer.do_render_update_asynchronous();
                }
            }),
        );
    }

    fn do_render_update_synchronous(&self) {
        // Cleared before the snapshot so an edit racing with it stays flagged.
        self.entity.set_needs_render_update(false);
        let now = self.ctx.now();
        let transparent = self.is_transparent();
        let ready = self.entity.is_visually_ready();
        let billboard = self.async_state.read().billboard_mode != BillboardMode::None;
        let model_transform = self.entity_model_transform(billboard);
        let bound = self.entity.aa_box();
        let moving = self.entity.is_moving_relative_to_parent();
        let visible = self.entity.visible();
        {
            let mut sync = self.sync.write();
            let duration = sync.fade_duration_secs;
            let fading = sync.fade.is_active(now, duration);
            if fading || sync.prev_transparent != transparent || !ready {
                self.ctx.request_render_update(self.entity.id());
            }
            sync.fade.update(now, duration);
            sync.prev_transparent = transparent;
            sync.model_transform = model_transform;
            sync.bound = bound;
            sync.moving = moving;
            sync.visible = visible;
        }
        self.variant.do_render_update_synchronous(self);
    }

    fn do_render_update_asynchronous(&self) {
        let props = self.entity.properties();
        {
            let mut state = self.async_state.write();
            state.copy_from(&props);
            if self.entity.needs_zone_occlusion_update() {
                self.entity.reset_needs_zone_occlusion_update();
                state.render_with_zones = props.render_with_zones.iter().copied().collect();
            }
        }
        self.variant.do_render_update_asynchronous(self);
    }

    fn entity_model_transform(&self, billboard: bool) -> Transform {
        if billboard {
            self.entity.transform_to_center_with_only_local_rotation()
        } else {
            self.entity.transform_to_center()
        }
    }

    /// Cheap check the driver makes before scheduling an update.
    pub fn needs_render_update(&self) -> bool {
        let now = self.ctx.now();
        let (fading, prev_transparent) = {
            let sync = self.sync.read();
            (sync.fade.is_active(now, sync.fade_duration_secs), sync.prev_transparent)
        };
        if fading || prev_transparent != self.is_transparent() {
            return true;
        }
        self.needs_render_update_from_entity() || self.variant.needs_render_update(self)
    }

    fn needs_render_update_from_entity(&self) -> bool {
        let entity = &self.entity;
        if entity.needs_render_update()
            || !entity.is_visually_ready()
            || entity.needs_zone_occlusion_update()
        {
            return true;
        }
        let billboard = self.async_state.read().billboard_mode != BillboardMode::None;
        let transform = self.entity_model_transform(billboard);
        let bound = entity.aa_box();
        let moving = entity.is_moving_relative_to_parent();
        let visible = entity.visible();
        let sync = self.sync.read();
        bound != sync.bound
            || transform != sync.model_transform
            || moving != sync.moving
            || visible != sync.visible
    }

    /// Start an enter or leave fade and attach the matching transition.
    pub fn fade(&self, transaction: &mut Transaction, transition: TransitionType) {
        let id = self.item_id();
        if !id.is_valid() {
            return;
        }
        let duration = self.fade_properties(transition).duration_secs;
        {
            let mut sync = self.sync.write();
            sync.fade.start(self.ctx.now());
            sync.fade_duration_secs = duration;
        }
        transaction.reset_transition_on_item(id, transition);
        tracing::debug!(entity = %self.entity.id().short(), ?transition, "fade started");
    }

    pub fn is_fading(&self) -> bool {
        let sync = self.sync.read();
        sync.fade.is_active(self.ctx.now(), sync.fade_duration_secs)
    }

    /// Progress of the current fade, 1 when not fading.
    pub fn fade_ratio(&self) -> f32 {
        let sync = self.sync.read();
        sync.fade.ratio(self.ctx.now(), sync.fade_duration_secs)
    }

    /// Seconds the current or last fade lasts.
    pub fn fade_duration_secs(&self) -> f32 {
        self.sync.read().fade_duration_secs
    }

    pub fn wants_fade_in(&self) -> bool {
        match self.entity.read(|p| p.fade_in_mode) {
            ComponentMode::Enabled => true,
            ComponentMode::Inherit => self
                .ctx
                .layered_zones()
                .have_fade(TransitionType::ElementEnterDomain),
            ComponentMode::Disabled => false,
        }
    }

    pub fn wants_fade_out(&self) -> bool {
        match self.async_state.read().fade_out_mode {
            ComponentMode::Enabled => true,
            ComponentMode::Inherit => self
                .ctx
                .layered_zones()
                .have_fade(TransitionType::ElementLeaveDomain),
            ComponentMode::Disabled => false,
        }
    }

    /// Dissolve settings for `transition`: the entity's own group when
    /// enabled, otherwise the layered zones'.
    pub fn fade_properties(&self, transition: TransitionType) -> FadeProperties {
        let own = match transition {
            TransitionType::ElementEnterDomain => {
                let (mode, fade) = self.entity.read(|p| (p.fade_in_mode, p.fade_in));
                (mode == ComponentMode::Enabled).then_some(fade)
            }
            TransitionType::ElementLeaveDomain => {
                let state = self.async_state.read();
                let enabled = state.fade_out_mode == ComponentMode::Enabled;
                enabled.then_some(state.fade_out)
            }
        };
        match own {
            Some(group) => fade_properties_from_group(&group),
            None => self.ctx.layered_zones().fade_properties(transition),
        }
    }

    /// Current per-object fade parameters, defaults when no transition runs.
    pub fn fade_params(&self, scene: &Scene) -> FadeObjectParams {
        scene
            .item_safe(self.item_id())
            .filter(|state| state.transition.is_valid())
            .and_then(|state| scene.transition_params(state.transition, self.ctx.now()))
            .unwrap_or_default()
    }

    pub fn entity(&self) -> &Arc<EntityItem> {
        &self.entity
    }

    pub fn context(&self) -> &Arc<RenderContext> {
        &self.ctx
    }

    pub fn item_id(&self) -> ItemId {
        ItemId::from_raw(self.item_id.load(Ordering::Acquire))
    }

    pub fn is_valid(&self) -> bool {
        self.item_id().is_valid()
    }

    pub fn variant(&self) -> &RendererVariant {
        &self.variant
    }

    pub fn model_transform(&self) -> Transform {
        self.sync.read().model_transform
    }

    pub fn is_visible(&self) -> bool {
        self.sync.read().visible
    }

    pub fn is_moving(&self) -> bool {
        self.sync.read().moving
    }

    pub fn billboard_mode(&self) -> BillboardMode {
        self.async_state.read().billboard_mode
    }

    pub fn primitive_mode(&self) -> PrimitiveMode {
        self.async_state.read().primitive_mode
    }

    pub fn is_cauterized(&self) -> bool {
        self.async_state.read().cauterized
    }

    pub fn mirror_mode(&self) -> MirrorMode {
        self.async_state.read().mirror_mode
    }

    /// Mirrors, and portals that name an exit.
    pub fn is_mirror(&self) -> bool {
        self.async_state.read().is_mirror()
    }

    pub fn is_transparent(&self) -> bool {
        self.variant.is_transparent(self)
    }

    /// Transparency contributed by an enter/leave fade in progress.
    pub fn is_fade_transparent(&self) -> bool {
        self.is_fading()
    }

    pub fn tag_mask(&self) -> ViewTags {
        let state = self.async_state.read();
        let mut tags = ViewTags::empty();
        if !state.cauterized {
            tags |= ViewTags::MAIN_VIEW;
        }
        if state.visible_in_secondary_camera {
            tags |= ViewTags::SECONDARY_VIEW;
        }
        tags
    }

    pub fn item_layer(&self) -> ItemLayer {
        match self.async_state.read().render_layer {
            RenderLayer::World => ItemLayer::Scene3d,
            RenderLayer::Front => ItemLayer::Front3d,
            RenderLayer::Hud => ItemLayer::Hud3d,
        }
    }

    /// Scene key shared by shape-like variants. Transparency takes precedence
    /// over shadow casting.
    pub fn item_key_builder(&self) -> ItemKeyBuilder {
        let transparent = self.is_transparent();
        let has_outline = self.has_outline();
        let visible = self.is_visible();
        let tags = self.tag_mask();
        let layer = self.item_layer();
        let state = self.async_state.read();

        let mut builder = ItemKey::builder()
            .with_type_shape()
            .with_tag_bits(tags)
            .with_layer(layer);
        if transparent {
            builder = builder.with_transparent();
        } else if state.can_cast_shadow {
            builder = builder.with_shadow_caster();
        }
        if state.cull_with_parent {
            builder = builder.with_sub_meta_culled();
        }
        if state.is_mirror() {
            builder = builder.with_mirror();
        }
        if !visible {
            builder = builder.with_invisible();
        }
        if has_outline {
            builder = builder.with_outline();
        }
        builder
    }

    pub fn key(&self) -> ItemKey {
        self.variant.key(self)
    }

    pub fn shape_key(&self) -> ShapeKey {
        self.variant.shape_key(self)
    }

    /// Synchronous bound, widened so a billboard fits whatever way it turns.
    pub fn base_bound(&self) -> Aabb {
        let mut bound = self.sync.read().bound;
        if self.billboard_mode() != BillboardMode::None {
            let max = bound.scale.max_element();
            bound.set_scale_stay_centered(Vec3::splat(SQRT_2 * max));
        }
        bound
    }

    pub fn bound(&self) -> Aabb {
        self.variant.bound(self)
    }

    /// Procedural vertex-shader bound, placed at the model origin, when the
    /// top material supplies one; the base bound otherwise.
    pub fn material_bound(&self) -> Aabb {
        let procedural_bound = self
            .materials
            .lock()
            .get(BASE_MATERIAL)
            .and_then(|stack| stack.top())
            .and_then(|top| top.material.ready_procedural())
            .filter(|p| p.has_vertex_shader)
            .and_then(|p| p.bound);
        match procedural_bound {
            Some(b) => Aabb::from_center(self.model_transform().position + b.center(), b.scale),
            None => self.base_bound(),
        }
    }

    /// Draw gate: visible, and cauterized items only outside the main view.
    pub fn should_render(&self, args: &RenderArgs<'_>) -> bool {
        if !self.is_valid() || !self.is_visible() {
            return false;
        }
        !self.is_cauterized() || args.render_mode != RenderMode::Default || args.mirror_depth > 0
    }

    pub fn render(&self, args: &mut RenderArgs<'_>) {
        if !self.should_render(args) {
            return;
        }
        self.variant.render(self, args);
    }

    pub fn passes_zone_occlusion_test(&self, active_zones: &HashSet<EntityId>) -> bool {
        let state = self.async_state.read();
        let zones = &state.render_with_zones;
        zones.is_empty() || zones.iter().any(|z| active_zones.contains(z))
    }

    pub fn meta_fetch_meta_sub_items(&self, sub_items: &mut Vec<ItemId>) -> usize {
        let id = self.item_id();
        if id.is_valid() {
            sub_items.push(id);
            1
        } else {
            0
        }
    }

    /// Reflect `frustum` through this mirror, or through this portal to its exit.
    pub fn compute_mirror_view(&self, frustum: &mut ViewFrustum) -> ItemId {
        let (mode, exit_id) = {
            let state = self.async_state.read();
            (state.mirror_mode, state.portal_exit_id)
        };
        let exit = match (mode, exit_id) {
            (MirrorMode::Portal, Some(exit_id)) => {
                let exit = self.ctx.portal_exit(exit_id);
                if exit.is_none() {
                    tracing::trace!(
                        entity = %self.entity.id().short(),
                        "portal exit unresolved, mirroring"
                    );
                }
                exit
            }
            _ => None,
        };
        mirror::compute_mirror_view(
            frustum,
            self.entity.world_position(),
            self.entity.world_orientation(),
            mode,
            exit,
        )
    }

    /// Base-stack outline converted to pixels for a viewport `viewport_height` tall.
    pub fn outline_style(&self, frustum: &ViewFrustum, viewport_height: u32) -> OutlineStyle {
        let outline = {
            let materials = self.materials.lock();
            match materials.get(BASE_MATERIAL) {
                Some(stack) => stack.outline(),
                None => return OutlineStyle::default(),
            }
        };
        let Some(outline) = outline else {
            return OutlineStyle::default();
        };
        let width_px = match outline.width_mode {
            OutlineWidthMode::Absolute => outline.width,
            OutlineWidthMode::Relative => {
                let distance = (self.model_transform().position - frustum.position())
                    .length()
                    .max(frustum.near());
                let view_height = 2.0 * distance * (frustum.fov() * 0.5).tan();
                outline.width * viewport_height as f32 / view_height
            }
        };
        OutlineStyle {
            width_px,
            color: outline.color,
        }
    }

    pub fn pipeline_type(&self) -> Pipeline {
        let mirror = self.is_mirror();
        pipeline::pipeline_type(&self.materials.lock(), mirror)
    }

    /// Push `layer` onto the stack at `attachment` and schedule an update.
    pub fn add_material(&self, attachment: &str, layer: MaterialLayer) {
        self.materials
            .lock()
            .entry(attachment.to_string())
            .or_default()
            .push(layer);
        self.ctx.request_render_update(self.entity.id());
    }

    pub fn remove_material(&self, attachment: &str, material: &Arc<Material>) -> bool {
        let removed = self
            .materials
            .lock()
            .get_mut(attachment)
            .is_some_and(|stack| stack.remove(material));
        if removed {
            self.ctx.request_render_update(self.entity.id());
        }
        removed
    }

    /// Exclusive access to the material stacks.
    pub fn with_materials<R>(&self, f: impl FnOnce(&mut MaterialMap) -> R) -> R {
        f(&mut self.materials.lock())
    }

    /// Resolved base stack, `None` when the renderer has no base material.
    pub fn resolved_base_material(&self) -> Option<ResolvedMaterial> {
        self.materials
            .lock()
            .get(BASE_MATERIAL)
            .map(|stack| *stack.resolved())
    }

    /// Resolved base albedo and opacity, white when there is no base stack.
    pub fn base_color(&self) -> Vec4 {
        self.resolved_base_material()
            .map(|m| m.albedo.extend(m.opacity))
            .unwrap_or(Vec4::ONE)
    }

    pub fn has_outline(&self) -> bool {
        self.materials
            .lock()
            .get(BASE_MATERIAL)
            .is_some_and(|stack| stack.has_outline())
    }

    /// Dirty base stack or a procedural material still fading in.
    pub fn needs_render_update_from_materials(&self) -> bool {
        let materials = self.materials.lock();
        let Some(stack) = materials.get(BASE_MATERIAL) else {
            return false;
        };
        stack.should_update()
            || stack
                .top()
                .and_then(|top| top.material.procedural())
                .is_some_and(|p| p.fading)
    }

    /// Advance procedural fades and resolve the base stack if anything changed.
    pub fn update_materials(&self, changed: bool) {
        let now = self.ctx.now();
        let duration = self.ctx.config().fade_duration_secs;
        let mut request = false;
        {
            let mut materials = self.materials.lock();
            let Some(stack) = materials.get_mut(BASE_MATERIAL) else {
                return;
            };
            if changed {
                stack.set_needs_update();
            }
            if let Some(top) = stack.top()
                && let Some(p) = top.material.procedural().filter(|p| p.fading)
            {
                let ratio = fade_ratio(p.fade_start_usec, now, duration);
                top.material.set_procedural_fading(ratio < 1.0);
                request = true;
            }
            if stack.should_update() {
                stack.update();
                request = true;
            }
        }
        if request {
            self.ctx.request_render_update(self.entity.id());
        }
    }

    /// Transparency contributed by materials: a fading procedural or a
    /// translucent resolved key.
    pub fn materials_transparent(&self) -> bool {
        let materials = self.materials.lock();
        let Some(stack) = materials.get(BASE_MATERIAL) else {
            return false;
        };
        stack
            .top()
            .and_then(|top| top.material.procedural())
            .is_some_and(|p| p.fading)
            || stack.key().is_translucent()
    }

    /// Fade ratio of the top procedural material, 1 when none is fading.
    pub fn procedural_fade_ratio(&self) -> f32 {
        let fading = self
            .materials
            .lock()
            .get(BASE_MATERIAL)
            .and_then(|stack| stack.top())
            .and_then(|top| top.material.procedural())
            .filter(|p| p.fading);
        match fading {
            Some(p) => {
                let duration = self.ctx.config().fade_duration_secs;
                fade_ratio(p.fade_start_usec, self.ctx.now(), duration)
            }
            None => 1.0,
        }
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.variant.label(), self.entity.id().short())
    }
}

impl PayloadProxy for EntityRenderer {
    fn key(&self) -> ItemKey {
        EntityRenderer::key(self)
    }

    fn shape_key(&self) -> ShapeKey {
        EntityRenderer::shape_key(self)
    }

    fn bound(&self) -> Aabb {
        EntityRenderer::bound(self)
    }

    fn render(&self, args: &mut RenderArgs<'_>) {
        EntityRenderer::render(self, args)
    }

    fn meta_fetch_meta_sub_items(&self, sub_items: &mut Vec<ItemId>) -> usize {
        EntityRenderer::meta_fetch_meta_sub_items(self, sub_items)
    }

    fn passes_zone_occlusion_test(&self, active_zones: &HashSet<EntityId>) -> bool {
        EntityRenderer::passes_zone_occlusion_test(self, active_zones)
    }

    fn compute_mirror_view(&self, frustum: &mut ViewFrustum) -> ItemId {
        EntityRenderer::compute_mirror_view(self, frustum)
    }

    fn fade_properties(&self, transition: TransitionType) -> FadeProperties {
        EntityRenderer::fade_properties(self, transition)
    }

    fn label(&self) -> String {
        EntityRenderer::label(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EntityRendererConfig;
    use crate::context::RenderQueues;
    use crate::fade::{LayeredZone, LayeredZones};
    use worldspace_common::{Clock, ManualClock, USECS_PER_SECOND};
    use worldspace_entities::{EntityType, FadeTiming};
    use worldspace_render::{Outline, TransitionId};

    struct Harness {
        scene: Scene,
        ctx: Arc<RenderContext>,
        queues: RenderQueues,
        clock: Arc<ManualClock>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_config(EntityRendererConfig::default())
        }

        fn with_config(config: EntityRendererConfig) -> Self {
            let clock = Arc::new(ManualClock::new(USECS_PER_SECOND));
            let (ctx, queues) = RenderContext::new(config, clock.clone());
            Self {
                scene: Scene::new(),
                ctx,
                queues,
                clock,
            }
        }

        fn entity(&self, entity_type: EntityType, props: EntityProperties) -> Arc<EntityItem> {
            Arc::new(EntityItem::new(EntityId::new(), entity_type, props, self.clock.now_usec()))
        }

        fn add(&self, entity: &Arc<EntityItem>) -> Arc<EntityRenderer> {
            let mut t = Transaction::new();
            let renderer =
                EntityRenderer::add_to_scene(Some(entity), &self.scene, &self.ctx, &mut t)
                    .expect("renderer");
            self.commit(t);
            renderer
        }

        fn commit(&self, t: Transaction) {
            self.scene.enqueue_transaction(t);
            self.scene.process_transactions(self.clock.now_usec());
        }

        /// Run update cycles until nothing asks for more.
        fn settle(&self, renderer: &Arc<EntityRenderer>) {
            for _ in 0..8 {
                let requested = self.queues.render_requests.try_iter().count() > 0;
                self.queues.entity_changes.try_iter().for_each(drop);
                if !requested && !renderer.needs_render_update() {
                    return;
                }
                let mut t = Transaction::new();
                renderer.update_in_scene(&mut t);
                self.commit(t);
            }
        }
    }

    fn no_fade() -> EntityProperties {
        EntityProperties {
            fade_in_mode: ComponentMode::Disabled,
            ..EntityProperties::default()
        }
    }

    #[test]
    fn null_entity_and_unsupported_types_yield_nothing() {
        let h = Harness::new();
        let mut t = Transaction::new();
        let missing = EntityRenderer::add_to_scene(None, &h.scene, &h.ctx, &mut t);
        assert!(missing.is_none());
        let model = h.entity(EntityType::Model, EntityProperties::default());
        let unsupported = EntityRenderer::add_to_scene(Some(&model), &h.scene, &h.ctx, &mut t);
        assert!(unsupported.is_none());
        assert!(t.is_empty());
    }

    #[test]
    fn add_registers_item_status_and_handler() {
        let h = Harness::new();
        let entity = h.entity(EntityType::Box, no_fade());
        let renderer = h.add(&entity);
        assert!(renderer.is_valid());
        assert!(h.scene.item_exists(renderer.item_id()));
        assert_eq!(h.scene.item_status(renderer.item_id()).len(), 6);
        assert_eq!(entity.change_handler_count(), 1);
        assert!(h.ctx.renderable_for_entity(entity.id()).is_some());
    }

    #[test]
    fn remove_invalidates_id_and_deregisters_handler() {
        let h = Harness::new();
        let entity = h.entity(EntityType::Sphere, no_fade());
        let renderer = h.add(&entity);
        let id = renderer.item_id();

        let mut t = Transaction::new();
        renderer.remove_from_scene(&mut t);
        assert!(!renderer.is_valid());
        assert_eq!(entity.change_handler_count(), 0);
        h.commit(t);
        assert!(!h.scene.item_exists(id));
        assert!(h.ctx.renderable_for_entity(entity.id()).is_none());

        // Edits after removal reach nobody, and updates are no-ops.
        h.queues.entity_changes.try_iter().for_each(drop);
        entity.edit(|p| p.alpha = 0.5);
        assert!(h.queues.entity_changes.try_recv().is_err());
        let mut t = Transaction::new();
        renderer.update_in_scene(&mut t);
        assert!(t.is_empty());
    }

    #[test]
    fn visibility_change_is_seen_without_the_dirty_flag() {
        let h = Harness::new();
        let entity = h.entity(EntityType::Box, no_fade());
        let renderer = h.add(&entity);
        h.settle(&renderer);
        assert!(!renderer.needs_render_update());

        // An edit whose flag was consumed by a concurrent synchronous pass.
        entity.edit(|p| p.visible = false);
        entity.set_needs_render_update(false);
        assert!(renderer.needs_render_update());

        let mut t = Transaction::new();
        renderer.update_in_scene(&mut t);
        h.commit(t);
        assert!(!renderer.needs_render_update());
    }

    #[test]
    fn edit_during_update_keeps_the_dirty_flag() {
        let h = Harness::new();
        let entity = h.entity(EntityType::Box, no_fade());
        let renderer = h.add(&entity);
        h.settle(&renderer);

        let mut t = Transaction::new();
        renderer.update_in_scene(&mut t);
        // Lands after the synchronous snapshot, before the render thread runs.
        entity.edit(|p| p.alpha = 0.25);
        h.commit(t);
        assert!(entity.needs_render_update());
        assert!(renderer.needs_render_update());
    }

    #[test]
    fn queued_async_update_after_removal_is_harmless() {
        let h = Harness::new();
        let entity = h.entity(EntityType::Shape, no_fade());
        let renderer = h.add(&entity);

        let mut t = Transaction::new();
        renderer.update_in_scene(&mut t);
        renderer.remove_from_scene(&mut t);
        h.commit(t);
        assert_eq!(h.scene.item_count(), 0);
    }

    #[test]
    fn edits_notify_the_change_queue() {
        let h = Harness::new();
        let entity = h.entity(EntityType::Box, no_fade());
        let _renderer = h.add(&entity);
        h.queues.entity_changes.try_iter().for_each(drop);
        entity.edit(|p| p.color = [10, 20, 30]);
        assert_eq!(h.queues.entity_changes.try_recv().unwrap(), entity.id());
    }

    #[test]
    fn needs_render_update_settles() {
        let h = Harness::new();
        let entity = h.entity(EntityType::Box, no_fade());
        let renderer = h.add(&entity);
        h.settle(&renderer);
        assert!(!renderer.needs_render_update());

        entity.edit(|p| p.transform.position = Vec3::new(3.0, 0.0, 0.0));
        assert!(renderer.needs_render_update());
        h.settle(&renderer);
        assert!(!renderer.needs_render_update());
    }

    #[test]
    fn fade_keeps_renderer_dirty_until_complete() {
        let h = Harness::new();
        let entity = h.entity(EntityType::Box, no_fade());
        let renderer = h.add(&entity);
        h.settle(&renderer);

        let mut t = Transaction::new();
        renderer.fade(&mut t, TransitionType::ElementEnterDomain);
        h.commit(t);
        assert!(renderer.needs_render_update());
        assert!(renderer.is_transparent());

        h.clock.advance_secs(0.5);
        assert!(renderer.needs_render_update());
        assert!((renderer.fade_ratio() - 0.5).abs() < 1e-3);

        h.clock.advance_secs(0.6);
        assert!(!renderer.is_fading());
        h.settle(&renderer);
        assert!(!renderer.needs_render_update());
        assert_eq!(renderer.fade_ratio(), 1.0);
    }

    #[test]
    fn bound_is_fresh_after_synchronous_update() {
        let h = Harness::new();
        let entity = h.entity(EntityType::Box, no_fade());
        let renderer = h.add(&entity);
        entity.edit(|p| {
            p.transform.position = Vec3::new(0.0, 5.0, 0.0);
            p.dimensions = Vec3::new(2.0, 2.0, 2.0);
        });
        let mut t = Transaction::new();
        renderer.update_in_scene(&mut t);
        let bound = renderer.bound();
        assert!(bound.center().abs_diff_eq(Vec3::new(0.0, 5.0, 0.0), 1e-5));
        assert!(bound.scale.abs_diff_eq(Vec3::splat(2.0), 1e-5));
    }

    #[test]
    fn billboard_bound_is_widened() {
        let h = Harness::new();
        let entity = h.entity(
            EntityType::Shape,
            EntityProperties {
                billboard_mode: BillboardMode::Full,
                dimensions: Vec3::new(1.0, 2.0, 0.5),
                ..no_fade()
            },
        );
        let renderer = h.add(&entity);
        let bound = renderer.bound();
        assert!(bound.scale.abs_diff_eq(Vec3::splat(2.0 * SQRT_2), 1e-4));
    }

    #[test]
    fn key_reflects_entity_flags() {
        let h = Harness::new();
        let entity = h.entity(
            EntityType::Box,
            EntityProperties {
                cull_with_parent: true,
                visible_in_secondary_camera: false,
                render_layer: RenderLayer::Front,
                ..no_fade()
            },
        );
        let renderer = h.add(&entity);
        h.settle(&renderer);
        let key = renderer.key();
        assert!(key.is_shape());
        assert!(key.is_shadow_caster());
        assert!(!key.is_transparent());
        assert!(key.is_sub_meta_culled());
        assert_eq!(key.tags(), ViewTags::MAIN_VIEW);
        assert_eq!(key.layer(), ItemLayer::Front3d);

        entity.edit(|p| {
            p.alpha = 0.5;
            p.visible = false;
            p.cauterized = true;
        });
        h.settle(&renderer);
        let key = renderer.key();
        assert!(key.is_transparent());
        assert!(!key.is_shadow_caster());
        assert!(!key.is_visible());
        assert!(key.tags().is_empty());
    }

    #[test]
    fn mirror_flag_needs_portal_exit() {
        let h = Harness::new();
        let entity = h.entity(
            EntityType::Shape,
            EntityProperties {
                mirror_mode: MirrorMode::Portal,
                ..no_fade()
            },
        );
        let renderer = h.add(&entity);
        assert!(!renderer.key().is_mirror());
        entity.edit(|p| p.portal_exit_id = Some(EntityId::new()));
        h.settle(&renderer);
        assert!(renderer.key().is_mirror());
        assert_eq!(renderer.pipeline_type(), Pipeline::Mirror);
    }

    #[test]
    fn portal_resolves_registered_exit() {
        let h = Harness::new();
        let exit_at = Vec3::new(20.0, 0.0, 0.0);
        let exit_entity = h.entity(EntityType::Box, EntityProperties::at(exit_at));
        let exit = h.add(&exit_entity);
        let portal_entity = h.entity(
            EntityType::Shape,
            EntityProperties {
                mirror_mode: MirrorMode::Portal,
                portal_exit_id: Some(exit_entity.id()),
                ..no_fade()
            },
        );
        let portal = h.add(&portal_entity);

        let mut frustum = ViewFrustum::new(Vec3::new(0.0, 0.0, 5.0), glam::Quat::IDENTITY);
        assert_eq!(portal.compute_mirror_view(&mut frustum), exit.item_id());
        let through = Vec3::new(20.0, 0.0, -5.0);
        assert!(frustum.position().abs_diff_eq(through, 1e-4));
    }

    #[test]
    fn unresolved_portal_mirrors() {
        let h = Harness::new();
        let entity = h.entity(
            EntityType::Shape,
            EntityProperties {
                mirror_mode: MirrorMode::Portal,
                portal_exit_id: Some(EntityId::new()),
                ..no_fade()
            },
        );
        let renderer = h.add(&entity);
        let mut frustum = ViewFrustum::new(Vec3::new(1.0, 0.0, 2.0), glam::Quat::IDENTITY);
        assert_eq!(renderer.compute_mirror_view(&mut frustum), ItemId::INVALID);
        let reflected = Vec3::new(1.0, 0.0, -2.0);
        assert!(frustum.position().abs_diff_eq(reflected, 1e-5));
    }

    #[test]
    fn zone_occlusion_truth_table() {
        let h = Harness::new();
        let zone_a = EntityId::new();
        let zone_b = EntityId::new();
        let entity = h.entity(EntityType::Box, no_fade());
        let renderer = h.add(&entity);

        let none = HashSet::new();
        let only_a: HashSet<_> = [zone_a].into_iter().collect();
        let only_b: HashSet<_> = [zone_b].into_iter().collect();

        assert!(renderer.passes_zone_occlusion_test(&none));
        assert!(renderer.passes_zone_occlusion_test(&only_a));

        entity.edit(|p| p.render_with_zones = vec![zone_a]);
        h.settle(&renderer);
        assert!(!renderer.passes_zone_occlusion_test(&none));
        assert!(renderer.passes_zone_occlusion_test(&only_a));
        assert!(!renderer.passes_zone_occlusion_test(&only_b));
    }

    #[test]
    fn meta_fetch_reports_own_id_while_valid() {
        let h = Harness::new();
        let entity = h.entity(EntityType::Box, no_fade());
        let renderer = h.add(&entity);
        let mut items = Vec::new();
        assert_eq!(renderer.meta_fetch_meta_sub_items(&mut items), 1);
        assert_eq!(items, vec![renderer.item_id()]);

        let mut t = Transaction::new();
        renderer.remove_from_scene(&mut t);
        assert_eq!(renderer.meta_fetch_meta_sub_items(&mut items), 0);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn render_gate_hides_cauterized_in_main_view() {
        let h = Harness::new();
        let entity = h.entity(
            EntityType::Box,
            EntityProperties {
                cauterized: true,
                ..no_fade()
            },
        );
        let renderer = h.add(&entity);
        h.settle(&renderer);

        let frustum = ViewFrustum::default();
        let mut args = RenderArgs::new(&h.scene, frustum, h.clock.now_usec());
        assert!(!renderer.should_render(&args));
        args.mirror_depth = 1;
        assert!(renderer.should_render(&args));
        args.mirror_depth = 0;
        args.render_mode = RenderMode::Shadow;
        assert!(renderer.should_render(&args));

        entity.edit(|p| p.visible = false);
        h.settle(&renderer);
        assert!(!renderer.should_render(&args));
    }

    #[test]
    fn enter_fade_follows_entity_and_zones() {
        let h = Harness::new();
        let entity = h.entity(
            EntityType::Box,
            EntityProperties {
                fade_in_mode: ComponentMode::Enabled,
                fade_in: FadePropertyGroup {
                    duration: 2.0,
                    timing: FadeTiming::EaseIn,
                    ..FadePropertyGroup::default()
                },
                ..EntityProperties::default()
            },
        );
        let renderer = h.add(&entity);
        assert!(renderer.is_fading());
        let state = h.scene.item_safe(renderer.item_id()).unwrap();
        assert!(state.transition.is_valid());
        let props = renderer.fade_properties(TransitionType::ElementEnterDomain);
        assert_eq!(props.duration_secs, 2.0);

        // Inherit with no zones: no fade.
        let plain = h.entity(EntityType::Box, EntityProperties::default());
        let plain_renderer = h.add(&plain);
        assert!(!plain_renderer.is_fading());
        let plain_state = h.scene.item_safe(plain_renderer.item_id()).unwrap();
        assert_eq!(plain_state.transition, TransitionId::INVALID);

        // Inherit inside a zone that fades things in.
        h.ctx.set_layered_zones(LayeredZones::new(vec![LayeredZone {
            id: EntityId::new(),
            volume: 8.0,
            fade_in_mode: ComponentMode::Enabled,
            fade_in: FadePropertyGroup {
                duration: 3.0,
                ..FadePropertyGroup::default()
            },
            fade_out_mode: ComponentMode::Disabled,
            fade_out: FadePropertyGroup::default(),
        }]));
        let zoned = h.entity(EntityType::Box, EntityProperties::default());
        let zoned_renderer = h.add(&zoned);
        assert!(zoned_renderer.is_fading());
        assert_eq!(
            zoned_renderer
                .fade_properties(TransitionType::ElementEnterDomain)
                .duration_secs,
            3.0
        );
        assert!(!zoned_renderer.wants_fade_out());
    }

    #[test]
    fn fade_params_come_from_the_transition_stage() {
        let h = Harness::new();
        let entity = h.entity(
            EntityType::Box,
            EntityProperties {
                fade_in_mode: ComponentMode::Enabled,
                ..EntityProperties::default()
            },
        );
        let renderer = h.add(&entity);
        h.clock.advance_secs(0.25);
        let params = renderer.fade_params(&h.scene);
        assert!((params.threshold() - 0.25).abs() < 1e-3);

        let idle = h.entity(EntityType::Box, no_fade());
        let idle_renderer = h.add(&idle);
        let idle_params = idle_renderer.fade_params(&h.scene);
        assert_eq!(idle_params, FadeObjectParams::default());
    }

    #[test]
    fn fade_disabled_by_config() {
        let h = Harness::with_config(EntityRendererConfig {
            fade_on_add: false,
            ..EntityRendererConfig::default()
        });
        let entity = h.entity(
            EntityType::Box,
            EntityProperties {
                fade_in_mode: ComponentMode::Enabled,
                ..EntityProperties::default()
            },
        );
        let renderer = h.add(&entity);
        assert!(!renderer.is_fading());
    }

    #[test]
    fn outline_style_defaults_and_scales() {
        let h = Harness::new();
        let entity = h.entity(EntityType::Box, no_fade());
        let renderer = h.add(&entity);
        let frustum = ViewFrustum::new(Vec3::new(0.0, 0.0, 10.0), glam::Quat::IDENTITY);
        let style = renderer.outline_style(&frustum, 1080);
        assert_eq!(style, OutlineStyle::default());

        let material = Arc::new(Material::new("outlined"));
        material.edit(|s| {
            s.outline = Some(Outline {
                width_mode: OutlineWidthMode::Relative,
                width: 0.1,
                color: Vec3::X,
            });
        });
        renderer.add_material(BASE_MATERIAL, MaterialLayer::new(material, 10));
        h.settle(&renderer);
        assert!(renderer.key().has_outline());

        let style = renderer.outline_style(&frustum, 1080);
        let expected = 0.1 * 1080.0 / (2.0 * 10.0 * (frustum.fov() * 0.5).tan());
        assert!((style.width_px - expected).abs() < 1e-3);
        assert_eq!(style.color, Vec3::X);
    }

    #[test]
    fn added_material_wins_and_can_be_removed() {
        let h = Harness::new();
        let entity = h.entity(EntityType::Box, no_fade());
        let renderer = h.add(&entity);
        h.settle(&renderer);
        assert_eq!(renderer.pipeline_type(), Pipeline::Simple);

        let material = Arc::new(Material::new("shiny"));
        material.edit(|s| s.metallic = 1.0);
        renderer.add_material(BASE_MATERIAL, MaterialLayer::new(Arc::clone(&material), 1));
        assert!(renderer.needs_render_update());
        assert_eq!(renderer.pipeline_type(), Pipeline::Material);

        assert!(renderer.remove_material(BASE_MATERIAL, &material));
        assert_eq!(renderer.pipeline_type(), Pipeline::Simple);
        assert!(!renderer.remove_material("missing", &material));
    }

    #[test]
    fn procedural_fade_drives_transparency() {
        let h = Harness::new();
        let entity = h.entity(
            EntityType::Shape,
            EntityProperties {
                user_data: r#"{"ProceduralEntity": {"shaderUrl": "fx.fs"}}"#.to_string(),
                ..no_fade()
            },
        );
        let renderer = h.add(&entity);
        assert_eq!(renderer.pipeline_type(), Pipeline::Procedural);
        assert!(renderer.materials_transparent());
        assert!(renderer.needs_render_update_from_materials());

        h.clock.advance_secs(1.5);
        h.settle(&renderer);
        assert!(!renderer.materials_transparent());
        assert!(!renderer.needs_render_update());
        assert_eq!(renderer.procedural_fade_ratio(), 1.0);
    }

    #[test]
    fn concurrent_queries_during_updates() {
        let h = Harness::new();
        let entity = h.entity(EntityType::Box, no_fade());
        let renderer = h.add(&entity);
        std::thread::scope(|s| {
            let reader = &renderer;
            s.spawn(move || {
                for _ in 0..200 {
                    let _ = reader.needs_render_update();
                    let _ = reader.key();
                    let _ = reader.bound();
                }
            });
            for i in 0..50 {
                entity.edit(|p| p.transform.position.x = i as f32);
                let mut t = Transaction::new();
                renderer.update_in_scene(&mut t);
                h.commit(t);
            }
        });
        let last = Vec3::new(49.0, 0.0, 0.0);
        assert!(renderer.model_transform().position.abs_diff_eq(last, 1e-5));
    }
}
