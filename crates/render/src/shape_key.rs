use bitflags::bitflags;

bitflags! {
    /// Pipeline selection bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShapeFlags: u32 {
        const OWN_PIPELINE = 1 << 0;
        const MATERIAL = 1 << 1;
        const TRANSLUCENT = 1 << 2;
        const WIREFRAME = 1 << 3;
        const UNLIT = 1 << 4;
        const TANGENTS = 1 << 5;
        const LIGHTMAP = 1 << 6;
        const TRIPLANAR = 1 << 7;
        const SPLAT_MAP = 1 << 8;
        const FADE = 1 << 9;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullFaceMode {
    #[default]
    Back,
    Front,
    None,
}

/// Immutable pipeline key. Built with [`ShapeKeyBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeKey {
    flags: ShapeFlags,
    layers: u8,
    cull_face: CullFaceMode,
}

impl Default for ShapeKey {
    fn default() -> Self {
        ShapeKeyBuilder::new().build()
    }
}

impl ShapeKey {
    /// Key for items that bind their own pipeline.
    pub fn own_pipeline() -> Self {
        ShapeKeyBuilder::new().with_own_pipeline().build()
    }

    pub fn flags(&self) -> ShapeFlags {
        self.flags
    }

    pub fn layers(&self) -> u8 {
        self.layers
    }

    pub fn cull_face_mode(&self) -> CullFaceMode {
        self.cull_face
    }

    pub fn has_own_pipeline(&self) -> bool {
        self.flags.contains(ShapeFlags::OWN_PIPELINE)
    }

    pub fn has_material(&self) -> bool {
        self.flags.contains(ShapeFlags::MATERIAL)
    }

    pub fn is_translucent(&self) -> bool {
        self.flags.contains(ShapeFlags::TRANSLUCENT)
    }

    pub fn is_wireframe(&self) -> bool {
        self.flags.contains(ShapeFlags::WIREFRAME)
    }

    pub fn is_unlit(&self) -> bool {
        self.flags.contains(ShapeFlags::UNLIT)
    }

    pub fn has_tangents(&self) -> bool {
        self.flags.contains(ShapeFlags::TANGENTS)
    }

    pub fn has_lightmap(&self) -> bool {
        self.flags.contains(ShapeFlags::LIGHTMAP)
    }

    pub fn is_triplanar(&self) -> bool {
        self.flags.contains(ShapeFlags::TRIPLANAR)
    }

    pub fn is_splat_map(&self) -> bool {
        self.flags.contains(ShapeFlags::SPLAT_MAP)
    }

    pub fn is_faded(&self) -> bool {
        self.flags.contains(ShapeFlags::FADE)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ShapeKeyBuilder {
    flags: ShapeFlags,
    layers: u8,
    cull_face: CullFaceMode,
}

impl Default for ShapeKeyBuilder {
    fn default() -> Self {
        Self {
            flags: ShapeFlags::empty(),
            layers: 1,
            cull_face: CullFaceMode::Back,
        }
    }
}

impl ShapeKeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_own_pipeline(mut self) -> Self {
        self.flags |= ShapeFlags::OWN_PIPELINE;
        self
    }

    pub fn with_material(mut self) -> Self {
        self.flags |= ShapeFlags::MATERIAL;
        self
    }

    pub fn with_translucent(mut self) -> Self {
        self.flags |= ShapeFlags::TRANSLUCENT;
        self
    }

    pub fn with_wireframe(mut self) -> Self {
        self.flags |= ShapeFlags::WIREFRAME;
        self
    }

    pub fn with_unlit(mut self) -> Self {
        self.flags |= ShapeFlags::UNLIT;
        self
    }

    pub fn with_tangents(mut self) -> Self {
        self.flags |= ShapeFlags::TANGENTS;
        self
    }

    pub fn with_lightmap(mut self) -> Self {
        self.flags |= ShapeFlags::LIGHTMAP;
        self
    }

    pub fn with_triplanar(mut self) -> Self {
        self.flags |= ShapeFlags::TRIPLANAR;
        self
    }

    pub fn with_splat_map(mut self) -> Self {
        self.flags |= ShapeFlags::SPLAT_MAP;
        self
    }

    pub fn with_fade(mut self) -> Self {
        self.flags |= ShapeFlags::FADE;
        self
    }

    /// Number of blended material layers, clamped to 1..=3.
    pub fn with_layers(mut self, layers: u8) -> Self {
        self.layers = layers.clamp(1, 3);
        self
    }

    pub fn with_cull_face_mode(mut self, mode: CullFaceMode) -> Self {
        self.cull_face = mode;
        self
    }

    pub fn build(self) -> ShapeKey {
        ShapeKey {
            flags: self.flags,
            layers: self.layers,
            cull_face: self.cull_face,
        }
    }
}
