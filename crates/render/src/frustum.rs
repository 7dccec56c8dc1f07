use glam::{Mat4, Quat, Vec3};

/// Camera position, orientation and projection for one render pass.
///
/// Projection uses the GL clip convention (z in [-1, 1]) so an oblique near
/// plane can be spliced into its third row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewFrustum {
    position: Vec3,
    orientation: Quat,
    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,
    projection: Mat4,
}

impl Default for ViewFrustum {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 10.0, 15.0), Quat::IDENTITY)
    }
}

impl ViewFrustum {
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        let fov = 60.0_f32.to_radians();
        let aspect = 16.0 / 9.0;
        let near = 0.1;
        let far = 1000.0;
        Self {
            position,
            orientation,
            fov,
            aspect,
            near,
            far,
            projection: Mat4::perspective_rh_gl(fov, aspect, near, far),
        }
    }

    /// Camera at `eye` looking toward `target` with +Y up.
    pub fn looking_at(eye: Vec3, target: Vec3) -> Self {
        let view = Mat4::look_at_rh(eye, target, Vec3::Y);
        let (_, rotation, _) = view.inverse().to_scale_rotation_translation();
        Self::new(eye, rotation)
    }

    /// Camera from yaw/pitch angles in radians.
    pub fn from_yaw_pitch(position: Vec3, yaw: f32, pitch: f32) -> Self {
        let pitch = pitch.clamp(-89.0_f32.to_radians(), 89.0_f32.to_radians());
        Self::new(
            position,
            Quat::from_rotation_y(yaw) * Quat::from_rotation_x(pitch),
        )
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Quat) {
        self.orientation = orientation;
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn set_perspective(&mut self, fov: f32, aspect: f32, near: f32, far: f32) {
        self.fov = fov;
        self.aspect = aspect;
        self.near = near;
        self.far = far;
        self.projection = Mat4::perspective_rh_gl(fov, aspect, near, far);
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.orientation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.orientation * Vec3::Y
    }

    /// Camera-to-world transform.
    pub fn view(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }

    /// World-to-camera transform.
    pub fn view_matrix(&self) -> Mat4 {
        self.view().inverse()
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }
}
