//! Reflected camera for mirror and portal passes.

use std::f32::consts::PI;

use glam::{Mat4, Quat, Vec3, Vec4};
use worldspace_entities::MirrorMode;
use worldspace_render::{ItemId, ViewFrustum};

/// Resolved far side of a portal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalExit {
    pub position: Vec3,
    pub rotation: Quat,
    pub item_id: ItemId,
}

fn sign(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Replace `frustum` with the view through a mirror or portal surface and
/// clip its near plane to the exit surface. A portal without a resolved exit
/// behaves as a plain mirror. Returns the exit's item id, or
/// [`ItemId::INVALID`].
pub fn compute_mirror_view(
    frustum: &mut ViewFrustum,
    mirror_position: Vec3,
    mirror_rotation: Quat,
    mode: MirrorMode,
    exit: Option<PortalExit>,
) -> ItemId {
    let in_to_world = Mat4::from_rotation_translation(mirror_rotation, mirror_position);
    let world_to_in = in_to_world.inverse();

    let exit = exit.filter(|_| mode == MirrorMode::Portal);
    let portal = exit.is_some();
    let (out_position, out_rotation, exit_item) = match exit {
        Some(e) => (e.position, e.rotation, e.item_id),
        None => (mirror_position, mirror_rotation, ItemId::INVALID),
    };
    let out_to_world = Mat4::from_rotation_translation(out_rotation, out_position);

    let mut camera_in = world_to_in.transform_point3(frustum.position());
    camera_in.z = -camera_in.z;
    if portal {
        camera_in.x = -camera_in.x;
    }
    let camera_position = out_to_world.transform_point3(camera_in);

    // Assumes world up is +Y.
    let relative = mirror_rotation.inverse() * frustum.orientation();
    let rotation_in = relative.normalize();
    let reflected = Quat::from_xyzw(-rotation_in.x, -rotation_in.y, rotation_in.z, rotation_in.w);
    let mut mirrored = reflected * Quat::from_axis_angle(Vec3::Y, PI);
    if portal {
        mirrored = Quat::from_xyzw(mirrored.x, -mirrored.y, -mirrored.z, mirrored.w);
    }
    let camera_rotation = (out_rotation * mirrored).normalize();

    frustum.set_position(camera_position);
    frustum.set_orientation(camera_rotation);

    // Oblique near plane on the exit surface (Lengyel).
    let world_to_camera = frustum.view_matrix();
    let plane_position = world_to_camera.transform_point3(out_position);
    let plane_normal = world_to_camera.transform_vector3(out_rotation * Vec3::NEG_Z);
    let mut clip_plane = plane_normal.extend(-plane_normal.dot(plane_position));
    if clip_plane.w > 0.0 {
        clip_plane = -clip_plane;
    }

    let mut projection = frustum.projection();
    let q = Vec4::new(
        (sign(clip_plane.x) + projection.z_axis.x) / projection.x_axis.x,
        (sign(clip_plane.y) + projection.z_axis.y) / projection.y_axis.y,
        -1.0,
        (1.0 + projection.z_axis.z) / projection.w_axis.z,
    );
    let c = clip_plane * (2.0 / clip_plane.dot(q));
    projection.x_axis.z = c.x;
    projection.y_axis.z = c.y;
    projection.z_axis.z = c.z + 1.0;
    projection.w_axis.z = c.w;
    frustum.set_projection(projection);

    exit_item
}
