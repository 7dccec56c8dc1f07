//! Draw pipeline selection and shape-key derivation from material stacks.

use worldspace_render::{CullFaceMode, MaterialMappingMode, ShapeKeyBuilder};

use crate::material_stack::{BASE_MATERIAL, MaterialMap};

/// How a renderable is drawn. Earlier variants in the selection order win:
/// `Mirror`, then `Procedural`, then `Material`, then `Simple`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Pipeline {
    #[default]
    Simple,
    Material,
    Procedural,
    Mirror,
}

/// Pick the pipeline for a renderable. `mirror` is true for mirrors and for
/// portals with a resolved exit.
pub fn pipeline_type(materials: &MaterialMap, mirror: bool) -> Pipeline {
    if mirror {
        return Pipeline::Mirror;
    }
    let Some(top) = materials.get(BASE_MATERIAL).and_then(|stack| stack.top()) else {
        return Pipeline::Simple;
    };
    if top.material.ready_procedural().is_some() {
        return Pipeline::Procedural;
    }
    let key = top.material.key();
    if key.is_emissive() || key.is_metallic() || key.is_scattering() || key.has_any_map() {
        Pipeline::Material
    } else {
        Pipeline::Simple
    }
}

/// Inputs the renderer contributes to its shape key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShapeKeyInputs {
    pub transparent: bool,
    pub wireframe: bool,
    pub mirror: bool,
    pub fading: bool,
}

/// Resolve a dirty base stack, then fold material state into `builder`.
pub fn update_shape_key_builder(
    mut builder: ShapeKeyBuilder,
    materials: &mut MaterialMap,
    inputs: ShapeKeyInputs,
) -> ShapeKeyBuilder {
    if let Some(stack) = materials
        .get_mut(BASE_MATERIAL)
        .filter(|s| s.should_update())
    {
        stack.update();
    }
    if inputs.transparent {
        builder = builder.with_translucent();
    }
    if inputs.wireframe {
        builder = builder.with_wireframe();
    }
    if inputs.fading {
        builder = builder.with_fade();
    }

    let base = materials.get(BASE_MATERIAL);
    let cull_face = base.map_or(CullFaceMode::Back, |s| s.cull_face_mode());
    builder = builder.with_cull_face_mode(cull_face);

    match pipeline_type(materials, inputs.mirror) {
        Pipeline::Material => {
            if let Some(stack) = base {
                let key = stack.key();
                builder = builder.with_material().with_layers(stack.layers());
                if key.is_normal_map() {
                    builder = builder.with_tangents();
                }
                if key.is_light_map() {
                    builder = builder.with_lightmap();
                }
                if stack.mapping_mode() == MaterialMappingMode::Triplanar {
                    builder = builder.with_triplanar();
                } else if stack.is_splat_map() {
                    builder = builder.with_splat_map();
                }
            }
        }
        Pipeline::Procedural => builder = builder.with_own_pipeline(),
        Pipeline::Simple | Pipeline::Mirror => {}
    }

    if base.is_some_and(|s| s.key().is_unlit()) {
        builder = builder.with_unlit();
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::material_stack::{MaterialLayer, MultiMaterial};
    use worldspace_render::{MapChannel, Material, ShapeKey};

    fn map_with(material: Material) -> (MaterialMap, Arc<Material>) {
        let material = Arc::new(material);
        let mut stack = MultiMaterial::new();
        stack.push(MaterialLayer::new(Arc::clone(&material), 0));
        let mut map = MaterialMap::new();
        map.insert(BASE_MATERIAL.to_string(), stack);
        (map, material)
    }

    fn default_key(map: &mut MaterialMap) -> ShapeKey {
        update_shape_key_builder(ShapeKeyBuilder::new(), map, ShapeKeyInputs::default())
            .build()
    }

    const PROCEDURAL: &str = r#"{"ProceduralEntity": {"shaderUrl": "shader.fs"}}"#;

    #[test]
    fn no_materials_is_simple() {
        assert_eq!(pipeline_type(&MaterialMap::new(), false), Pipeline::Simple);
    }

    #[test]
    fn mirror_wins_over_everything() {
        let m = Material::new("m");
        m.set_procedural_data(PROCEDURAL, 0);
        m.edit(|s| s.metallic = 1.0);
        let (map, _) = map_with(m);
        assert_eq!(pipeline_type(&map, true), Pipeline::Mirror);
        assert_eq!(pipeline_type(&map, false), Pipeline::Procedural);
    }

    #[test]
    fn procedural_needs_readiness() {
        let m = Material::new("m");
        m.set_procedural_data(r#"{"ProceduralEntity": {"shaderUrl": ""}}"#, 0);
        let (map, _) = map_with(m);
        assert_eq!(pipeline_type(&map, false), Pipeline::Simple);
    }

    #[test]
    fn maps_or_lighting_terms_select_material() {
        let m = Material::new("m");
        m.edit(|s| s.maps = MapChannel::ALBEDO);
        let (map, _) = map_with(m);
        assert_eq!(pipeline_type(&map, false), Pipeline::Material);

        let e = Material::new("e");
        e.edit(|s| s.emissive = glam::Vec3::ONE);
        let (map, _) = map_with(e);
        assert_eq!(pipeline_type(&map, false), Pipeline::Material);
    }

    #[test]
    fn material_key_carries_map_features() {
        let m = Material::new("m");
        m.edit(|s| {
            s.maps = MapChannel::NORMAL | MapChannel::LIGHTMAP | MapChannel::SPLAT;
        });
        let (mut map, _) = map_with(m);
        let key = default_key(&mut map);
        assert!(key.has_material());
        assert!(key.has_tangents());
        assert!(key.has_lightmap());
        assert!(key.is_splat_map());
        assert!(!key.is_triplanar());
    }

    #[test]
    fn triplanar_wins_over_splat() {
        let m = Material::new("m");
        m.edit(|s| {
            s.maps = MapChannel::SPLAT;
            s.mapping_mode = MaterialMappingMode::Triplanar;
        });
        let (mut map, _) = map_with(m);
        let key = default_key(&mut map);
        assert!(key.is_triplanar());
        assert!(!key.is_splat_map());
    }

    #[test]
    fn procedural_gets_own_pipeline() {
        let m = Material::new("m");
        m.set_procedural_data(PROCEDURAL, 0);
        let (mut map, _) = map_with(m);
        let key = default_key(&mut map);
        assert!(key.has_own_pipeline());
        assert!(!key.has_material());
    }

    #[test]
    fn entity_inputs_and_unlit() {
        let m = Material::new("m");
        m.set_unlit(true);
        m.edit(|s| s.cull_face = CullFaceMode::Front);
        let (mut map, _) = map_with(m);
        let inputs = ShapeKeyInputs {
            transparent: true,
            wireframe: true,
            ..ShapeKeyInputs::default()
        };
        let key = update_shape_key_builder(ShapeKeyBuilder::new(), &mut map, inputs).build();
        assert!(key.is_translucent());
        assert!(key.is_wireframe());
        assert!(key.is_unlit());
        assert_eq!(key.cull_face_mode(), CullFaceMode::Front);
    }

    #[test]
    fn dirty_stack_is_resolved_once() {
        let (mut map, material) = map_with(Material::new("m"));
        default_key(&mut map);
        assert!(!map[BASE_MATERIAL].should_update());
        material.set_opacity(0.25);
        assert!(map[BASE_MATERIAL].should_update());
        default_key(&mut map);
        assert!(map[BASE_MATERIAL].key().is_translucent());
    }
}
