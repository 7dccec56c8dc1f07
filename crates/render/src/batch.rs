use glam::{Mat4, Vec4};

use crate::geometry::GeometryShape;
use crate::material::MaterialKey;
use crate::shape_key::CullFaceMode;

/// A recorded draw command.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchCommand {
    SetModelTransform { current: Mat4, previous: Mat4 },
    BindMaterial { key: MaterialKey, layers: u8 },
    PrepareProcedural { translucent: bool },
    DrawShape(DrawShape),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawShape {
    pub shape: GeometryShape,
    /// Final color, alpha included.
    pub color: Vec4,
    pub wireframe: bool,
    pub instanced: bool,
    pub forward: bool,
    pub cull_face: CullFaceMode,
    pub torus_id: Option<u32>,
}

/// Commands recorded for one pass, in order.
#[derive(Debug, Default, Clone)]
pub struct Batch {
    commands: Vec<BatchCommand>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_model_transform(&mut self, current: Mat4, previous: Mat4) {
        self.commands
            .push(BatchCommand::SetModelTransform { current, previous });
    }

    pub fn bind_material(&mut self, key: MaterialKey, layers: u8) {
        self.commands
            .push(BatchCommand::BindMaterial { key, layers });
    }

    pub fn prepare_procedural(&mut self, translucent: bool) {
        self.commands
            .push(BatchCommand::PrepareProcedural { translucent });
    }

    pub fn draw_shape(&mut self, draw: DrawShape) {
        self.commands.push(BatchCommand::DrawShape(draw));
    }

    pub fn commands(&self) -> &[BatchCommand] {
        &self.commands
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, BatchCommand::DrawShape(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}
