//! Box, sphere and shape entities: one built-in mesh with a base material.

use std::sync::Arc;

use glam::{Mat4, Vec3};
use parking_lot::{Mutex, RwLock};
use worldspace_common::{Aabb, Transform};
use worldspace_entities::{EntityShape, EntityType, PrimitiveMode, PulseMode, PulsePropertyGroup};
use worldspace_render::{
    DrawShape, GeometryShape, ItemKey, Material, RenderArgs, RenderMethod, ShapeKey,
    ShapeKeyBuilder,
};

use super::{RendererVariant, TypedRenderer};
use crate::billboard::billboard_rotation;
use crate::material_stack::{BASE_MATERIAL, MaterialLayer};
use crate::pipeline::{Pipeline, ShapeKeyInputs, update_shape_key_builder};
use crate::pulse::calculate_pulse_color;
use crate::renderer::EntityRenderer;

/// Unit sphere mesh has radius 1; entity dimensions are diameters.
const SPHERE_ENTITY_SCALE: f32 = 0.5;

pub fn geometry_shape(shape: EntityShape) -> GeometryShape {
    match shape {
        EntityShape::Triangle => GeometryShape::Triangle,
        EntityShape::Quad => GeometryShape::Quad,
        EntityShape::Hexagon => GeometryShape::Hexagon,
        EntityShape::Octagon => GeometryShape::Octagon,
        EntityShape::Circle => GeometryShape::Circle,
        EntityShape::Cube => GeometryShape::Cube,
        EntityShape::Sphere => GeometryShape::Sphere,
        EntityShape::Tetrahedron => GeometryShape::Tetrahedron,
        EntityShape::Octahedron => GeometryShape::Octahedron,
        EntityShape::Dodecahedron => GeometryShape::Dodecahedron,
        EntityShape::Icosahedron => GeometryShape::Icosahedron,
        EntityShape::Torus => GeometryShape::Torus,
        EntityShape::Cone => GeometryShape::Cone,
        EntityShape::Cylinder => GeometryShape::Cylinder,
    }
}

#[derive(Debug, Clone, Copy)]
struct ShapeState {
    shape: EntityShape,
    render_transform: Transform,
    pulse: PulsePropertyGroup,
    inner_radius: f32,
}

#[derive(Debug, Default)]
struct DrawState {
    prev_transform: Option<Mat4>,
    torus_id: Option<u32>,
}

#[derive(Debug)]
pub struct ShapeRenderer {
    entity_type: EntityType,
    material: Arc<Material>,
    state: RwLock<ShapeState>,
    draw: Mutex<DrawState>,
}

impl ShapeRenderer {
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            material: Arc::new(Material::new("shape")),
            state: RwLock::new(ShapeState {
                shape: EntityShape::Cube,
                render_transform: Transform::default(),
                pulse: PulsePropertyGroup::default(),
                inner_radius: 0.0,
            }),
            draw: Mutex::new(DrawState::default()),
        }
    }

    pub fn variant(entity_type: EntityType) -> RendererVariant {
        RendererVariant::Shape(Self::new(entity_type))
    }

    /// Box and sphere entities ignore the shape property.
    fn resolve_shape(&self, shape: EntityShape) -> EntityShape {
        match self.entity_type {
            EntityType::Box => EntityShape::Cube,
            EntityType::Sphere => EntityShape::Sphere,
            _ => shape,
        }
    }

    pub fn shape(&self) -> EntityShape {
        self.state.read().shape
    }

    pub fn render_transform(&self) -> Transform {
        self.state.read().render_transform
    }

    pub fn inner_radius(&self) -> f32 {
        self.state.read().inner_radius
    }

    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    pub fn torus_id(&self) -> Option<u32> {
        self.draw.lock().torus_id
    }
}

impl TypedRenderer for ShapeRenderer {
    fn label(&self) -> &'static str {
        "shape"
    }

    fn on_add_to_scene(&self, base: &EntityRenderer) {
        base.with_materials(|materials| {
            materials
                .entry(BASE_MATERIAL.to_string())
                .or_default()
                .push(MaterialLayer::new(Arc::clone(&self.material), 0));
        });
    }

    fn on_remove_from_scene(&self, base: &EntityRenderer) {
        if let Some(id) = self.draw.lock().torus_id.take() {
            base.context().geometry().release_torus_id(id);
        }
    }

    fn needs_render_update(&self, base: &EntityRenderer) -> bool {
        base.needs_render_update_from_materials()
    }

    fn do_render_update_synchronous(&self, base: &EntityRenderer) {
        let (shape, dimensions) = base.entity().read(|p| (p.shape, p.dimensions));
        let shape = self.resolve_shape(shape);
        let mut transform = base.model_transform();
        if shape == EntityShape::Sphere {
            transform.post_scale(Vec3::splat(SPHERE_ENTITY_SCALE));
        }
        transform.post_scale(dimensions);

        let mut state = self.state.write();
        state.shape = shape;
        state.render_transform = transform;
    }

    fn do_render_update_asynchronous(&self, base: &EntityRenderer) {
        let props = base.entity().properties();
        {
            let mut state = self.state.write();
            state.pulse = props.pulse;
            state.inner_radius = props.inner_radius;
        }
        let now = base.context().now();
        let mut changed = self.material.set_albedo(props.color_vec3());
        changed |= self.material.set_opacity(props.alpha);
        changed |= self.material.set_unlit(props.unlit);
        changed |= self.material.set_procedural_data(&props.user_data, now);
        base.update_materials(changed);
    }

    fn is_transparent(&self, base: &EntityRenderer) -> bool {
        self.state.read().pulse.alpha_mode != PulseMode::None
            || base.is_fade_transparent()
            || base.materials_transparent()
    }

    fn key(&self, base: &EntityRenderer) -> ItemKey {
        base.item_key_builder().build()
    }

    fn shape_key(&self, base: &EntityRenderer) -> ShapeKey {
        let inputs = ShapeKeyInputs {
            transparent: self.is_transparent(base),
            wireframe: base.primitive_mode() == PrimitiveMode::Lines,
            mirror: base.is_mirror(),
            fading: base.is_fading(),
        };
        let builder = base.with_materials(|materials| {
            update_shape_key_builder(ShapeKeyBuilder::new(), materials, inputs)
        });
        builder.build()
    }

    fn bound(&self, base: &EntityRenderer) -> Aabb {
        base.material_bound()
    }

    fn render(&self, base: &EntityRenderer, args: &mut RenderArgs<'_>) {
        let state = *self.state.read();
        let resolved = base.resolved_base_material().unwrap_or_default();
        let color = calculate_pulse_color(
            resolved.albedo.extend(resolved.opacity),
            &state.pulse,
            base.entity().created(),
            args.now_usec,
        );
        if color.w == 0.0 {
            return;
        }

        let geometry = geometry_shape(state.shape);
        let lines = base.primitive_mode() == PrimitiveMode::Lines;
        let wireframe = args.global_shape_key.is_wireframe() || lines;
        let mut transform = state.render_transform;
        transform.rotation = billboard_rotation(
            transform.position,
            transform.rotation,
            base.billboard_mode(),
            args.billboard_view_position(),
            state.shape.billboards_rotated(),
        );
        let current = transform.to_mat4();

        let torus_id = {
            let mut draw = self.draw.lock();
            let previous = draw.prev_transform.unwrap_or(current);
            args.batch.set_model_transform(current, previous);
            if args.tracks_motion() {
                draw.prev_transform = Some(current);
            }
            if state.shape == EntityShape::Torus && draw.torus_id.is_none() {
                draw.torus_id = Some(base.context().geometry().allocate_torus_id());
            }
            draw.torus_id
        };

        let mut shape = DrawShape {
            shape: geometry,
            color,
            wireframe,
            instanced: false,
            forward: args.render_method == RenderMethod::Forward,
            cull_face: resolved.cull_face,
            torus_id,
        };
        match base.pipeline_type() {
            Pipeline::Procedural => {
                shape.color.w *= base.procedural_fade_ratio();
                args.batch.prepare_procedural(shape.color.w < 1.0);
            }
            Pipeline::Simple => {
                shape.color.w *= base.fade_ratio();
                shape.instanced = shape.color.w >= 1.0;
            }
            Pipeline::Material | Pipeline::Mirror => {
                args.batch.bind_material(resolved.key, resolved.layers);
                args.details.material_switches += 1;
            }
        }
        args.batch.draw_shape(shape);
        args.details.triangles_rendered += geometry.triangle_count();
    }
}
