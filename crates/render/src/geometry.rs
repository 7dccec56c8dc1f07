use glam::Vec4;
use parking_lot::Mutex;

/// Built-in meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryShape {
    Triangle,
    Quad,
    Hexagon,
    Octagon,
    Circle,
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

impl GeometryShape {
    pub fn triangle_count(self) -> usize {
        match self {
            GeometryShape::Triangle => 1,
            GeometryShape::Quad => 2,
            GeometryShape::Hexagon => 4,
            GeometryShape::Octagon => 6,
            GeometryShape::Circle => 64,
            GeometryShape::Cube => 12,
            GeometryShape::Sphere => 320,
            GeometryShape::Tetrahedron => 4,
            GeometryShape::Octahedron => 8,
            GeometryShape::Dodecahedron => 36,
            GeometryShape::Icosahedron => 20,
            GeometryShape::Torus => 1152,
            GeometryShape::Cone => 128,
            GeometryShape::Cylinder => 256,
        }
    }
}

#[derive(Debug, Default)]
struct TorusIds {
    next: u32,
    free: Vec<u32>,
    live: usize,
}

/// Shared mesh bookkeeping. Tori are parameterized per entity so each one
/// holds an id until released.
#[derive(Debug, Default)]
pub struct GeometryCache {
    torus: Mutex<TorusIds>,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_torus_id(&self) -> u32 {
        let mut torus = self.torus.lock();
        torus.live += 1;
        if let Some(id) = torus.free.pop() {
            return id;
        }
        let id = torus.next;
        torus.next += 1;
        id
    }

    pub fn release_torus_id(&self, id: u32) {
        let mut torus = self.torus.lock();
        if id < torus.next && !torus.free.contains(&id) {
            torus.free.push(id);
            torus.live = torus.live.saturating_sub(1);
        } else {
            tracing::warn!(id, "release of unknown torus id");
        }
    }

    pub fn live_torus_count(&self) -> usize {
        self.torus.lock().live
    }

    /// Pack a color into RGBA8, channel-clamped.
    pub fn to_compact_color(color: Vec4) -> u32 {
        let c = (color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
        (c.x as u32) | ((c.y as u32) << 8) | ((c.z as u32) << 16) | ((c.w as u32) << 24)
    }
}
