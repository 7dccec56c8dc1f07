//! Camera-facing rotations for billboarded entities.

use std::f32::consts::FRAC_PI_2;

use glam::{Mat3, Quat, Vec3};
use worldspace_entities::BillboardMode;

const DEGENERATE_EPSILON: f32 = 1.0e-6;

/// Rotation that turns the entity's +Z toward `camera_position`.
///
/// `Yaw` only spins around world +Y; `Full` also pitches. When the camera sits
/// on the entity (or straight above it for `Full`) the authored rotation is
/// kept. `rotate_90x` tilts flat shapes so their face, not their edge, shows.
pub fn billboard_rotation(
    position: Vec3,
    rotation: Quat,
    mode: BillboardMode,
    camera_position: Vec3,
    rotate_90x: bool,
) -> Quat {
    let facing = match mode {
        BillboardMode::None => return rotation,
        BillboardMode::Yaw => {
            let to_camera = camera_position - position;
            let flat = Vec3::new(to_camera.x, 0.0, to_camera.z);
            if flat.length_squared() < DEGENERATE_EPSILON {
                return rotation;
            }
            Quat::from_rotation_y(flat.x.atan2(flat.z))
        }
        BillboardMode::Full => {
            let Some(z) = (camera_position - position).try_normalize() else {
                return rotation;
            };
            let Some(x) = Vec3::Y.cross(z).try_normalize() else {
                return rotation;
            };
            let y = z.cross(x);
            Quat::from_mat3(&Mat3::from_cols(x, y, z))
        }
    };
    if rotate_90x {
        facing * Quat::from_rotation_x(FRAC_PI_2)
    } else {
        facing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_keeps_rotation() {
        let r = Quat::from_rotation_z(0.3);
        let kept = billboard_rotation(Vec3::ZERO, r, BillboardMode::None, Vec3::X, true);
        assert_eq!(kept, r);
    }

    #[test]
    fn yaw_faces_camera_horizontally() {
        let r = billboard_rotation(
            Vec3::ZERO,
            Quat::IDENTITY,
            BillboardMode::Yaw,
            Vec3::new(5.0, 3.0, 0.0),
            false,
        );
        assert!((r * Vec3::Z).abs_diff_eq(Vec3::X, 1e-5));
        assert!((r * Vec3::Y).abs_diff_eq(Vec3::Y, 1e-5));
    }

    #[test]
    fn full_faces_camera_directly() {
        let camera = Vec3::new(3.0, 4.0, 0.0);
        let r = billboard_rotation(
            Vec3::ZERO,
            Quat::IDENTITY,
            BillboardMode::Full,
            camera,
            false,
        );
        assert!((r * Vec3::Z).abs_diff_eq(camera.normalize(), 1e-5));
        assert!((r * Vec3::X).y.abs() < 1e-5);
    }

    #[test]
    fn degenerate_camera_keeps_rotation() {
        let r = Quat::from_rotation_y(1.0);
        let above = Vec3::new(0.0, 10.0, 0.0);
        for mode in [BillboardMode::Yaw, BillboardMode::Full] {
            assert_eq!(billboard_rotation(Vec3::ZERO, r, mode, above, false), r);
        }
    }

    #[test]
    fn flat_shapes_tilt_toward_camera() {
        let r = billboard_rotation(
            Vec3::ZERO,
            Quat::IDENTITY,
            BillboardMode::Yaw,
            Vec3::new(0.0, 0.0, 4.0),
            true,
        );
        // A quad's normal is +Y; after the tilt it points at the camera.
        assert!((r * Vec3::Y).abs_diff_eq(Vec3::Z, 1e-5));
    }
}
