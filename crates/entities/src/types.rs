use serde::{Deserialize, Serialize};

/// Closed set of entity types known to the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntityType {
    #[default]
    Unknown,
    Box,
    Sphere,
    Shape,
    Model,
    Text,
    Image,
    Web,
    ParticleEffect,
    ProceduralParticleEffect,
    Line,
    PolyLine,
    PolyVox,
    Grid,
    Gizmo,
    Light,
    Zone,
    Material,
}

/// Geometry of a shape entity. Order matters: flat shapes come before
/// `Cube`, extruded/curved ones after `Icosahedron`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum EntityShape {
    Triangle,
    Quad,
    Hexagon,
    Octagon,
    Circle,
    #[default]
    Cube,
    Sphere,
    Tetrahedron,
    Octahedron,
    Dodecahedron,
    Icosahedron,
    Torus,
    Cone,
    Cylinder,
}

impl EntityShape {
    /// Flat or non-platonic shapes get an extra 90 degree tilt when billboarded.
    pub fn billboards_rotated(self) -> bool {
        self < EntityShape::Cube || self > EntityShape::Icosahedron
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BillboardMode {
    #[default]
    None,
    Yaw,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PrimitiveMode {
    #[default]
    Solid,
    Lines,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderLayer {
    #[default]
    World,
    Front,
    Hud,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MirrorMode {
    #[default]
    None,
    Mirror,
    Portal,
}

/// Whether a component is inherited from enclosing zones, forced off, or on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ComponentMode {
    #[default]
    Inherit,
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PulseMode {
    #[default]
    None,
    InPhase,
    OutPhase,
}

/// Who hosts an entity: the domain server, an avatar, or only this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntityHostType {
    #[default]
    Domain,
    Avatar,
    Local,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_and_round_shapes_billboard_rotated() {
        assert!(EntityShape::Quad.billboards_rotated());
        assert!(EntityShape::Circle.billboards_rotated());
        assert!(EntityShape::Torus.billboards_rotated());
        assert!(!EntityShape::Cube.billboards_rotated());
        assert!(!EntityShape::Icosahedron.billboards_rotated());
    }

    #[test]
    fn defaults() {
        assert_eq!(EntityType::default(), EntityType::Unknown);
        assert_eq!(ComponentMode::default(), ComponentMode::Inherit);
        assert_eq!(MirrorMode::default(), MirrorMode::None);
    }
}
