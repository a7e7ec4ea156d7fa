//! Geometry helpers shared by the camera and manipulation controllers.
//!
//! Conventions: right-handed, Z up, cameras look down +Y. Euler angles are
//! heading/pitch/roll in degrees, where heading turns about Z, pitch about X
//! and roll about Y, composed as `Rz(h) * Rx(p) * Ry(r)`.

use crate::scene::{NodeId, SceneGraph};
use crate::viewport::DisplayRegionContext;
use glam::{DMat3, DMat4, DQuat, DVec2, DVec3};

pub const EPSILON: f64 = 1e-6;

pub const X_AXIS: DVec3 = DVec3::X;
pub const Y_AXIS: DVec3 = DVec3::Y;
pub const Z_AXIS: DVec3 = DVec3::Z;

/// Axis of a constraint or a plane normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn unit(self) -> DVec3 {
        match self {
            Axis::X => X_AXIS,
            Axis::Y => Y_AXIS,
            Axis::Z => Z_AXIS,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Axis::X => 'x',
            Axis::Y => 'y',
            Axis::Z => 'z',
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'x' | 'X' => Some(Axis::X),
            'y' | 'Y' => Some(Axis::Y),
            'z' | 'Z' => Some(Axis::Z),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("line is parallel to the plane or has zero length")]
    DegenerateIntersection,
}

/// Intersects a line with a plane.
pub fn plane_intersect(
    line_origin: DVec3,
    line_dir: DVec3,
    plane_origin: DVec3,
    plane_normal: DVec3,
) -> Result<DVec3, GeometryError> {
    let denom = line_dir.dot(plane_normal);
    if denom.abs() < EPSILON {
        return Err(GeometryError::DegenerateIntersection);
    }
    let t = (plane_origin - line_origin).dot(plane_normal) / denom;
    Ok(line_origin + line_dir * t)
}

/// Scales a camera-space point so that it lies on the near plane.
pub fn near_projection(point_in_camera: DVec3, near: f64) -> DVec3 {
    if point_in_camera.y.abs() < EPSILON {
        DVec3::new(0.0, near, 0.0)
    } else {
        point_in_camera * (near / point_in_camera.y)
    }
}

/// Origin of `node` in `camera` space, projected onto the near plane.
pub fn get_near_projection_point(
    scene: &SceneGraph,
    node: NodeId,
    camera: NodeId,
    near: f64,
) -> Option<DVec3> {
    let p = scene.pos_relative(node, camera)?;
    Some(near_projection(p, near))
}

/// Screen position of `node` in the region's NDC as `(x, near, y)`.
///
/// Points outside the viewport are clamped to its border.
pub fn get_screen_xy(
    scene: &SceneGraph,
    node: NodeId,
    dr: &DisplayRegionContext,
) -> Option<DVec3> {
    let p = scene.pos_relative(node, dr.cam())?;
    let proj = if dr.kind().is_orthographic() {
        DVec3::new(p.x, dr.near, p.z)
    } else {
        near_projection(p, dr.near)
    };
    let x = proj.x.clamp(dr.left, dr.right);
    let z = proj.z.clamp(dr.bottom, dr.top);
    let percent_x = (x - dr.left) / (dr.right - dr.left);
    let percent_y = (z - dr.bottom) / (dr.top - dr.bottom);
    Some(DVec3::new(
        2.0 * percent_x - 1.0,
        proj.y,
        2.0 * percent_y - 1.0,
    ))
}

/// Polar angle in degrees of the mouse around a screen-space centre.
///
/// `centre` is an `(x, near, y)` triple as returned by [`get_screen_xy`].
pub fn get_crank_angle(centre: DVec3, mouse: DVec2) -> f64 {
    let x = mouse.x - centre.x;
    let y = mouse.y - centre.z;
    180.0 + y.atan2(x).to_degrees()
}

/// Wraps an angle delta into `[-180, 180)`.
pub fn wrap_degrees(delta: f64) -> f64 {
    (delta + 180.0).rem_euclid(360.0) - 180.0
}

/// Shortest-path spherical interpolation, always unit length.
///
/// `q0` is flipped into `q1`'s hemisphere first, so `cos_omega` is never
/// negative and nearly opposite ends (`q` and `-q`, the same rotation)
/// take the linear blend.
pub fn q_slerp(q0: DQuat, q1: DQuat, t: f64) -> DQuat {
    let mut a = q0;
    let mut cos_omega = a.dot(q1);
    if cos_omega < 0.0 {
        cos_omega = -cos_omega;
        a = -a;
    }
    let result = if cos_omega > 1.0 - EPSILON {
        a * (1.0 - t) + q1 * t
    } else {
        let omega = cos_omega.acos();
        let sin_omega = omega.sin();
        let scale0 = ((1.0 - t) * omega).sin() / sin_omega;
        let scale1 = (t * omega).sin() / sin_omega;
        a * scale0 + q1 * scale1
    };
    result.normalize()
}

/// Applies an hpr delta expressed in `base` space to `node`, keeping its
/// position and scale.
pub fn rel_hpr(scene: &mut SceneGraph, node: NodeId, base: NodeId, hpr: DVec3) -> Option<()> {
    let node_to_base = scene.mat_relative(node, base)?;
    let base_to_node = node_to_base.inverse();
    let node_to_parent = scene.local_mat(node)?;
    let delta = DMat4::from_quat(hpr_to_quat(hpr));
    let composed = node_to_parent * base_to_node * delta * node_to_base;
    let (_, rotation, _) = composed.to_scale_rotation_translation();
    scene.set_quat(node, rotation.normalize())
}

pub fn hpr_to_quat(hpr: DVec3) -> DQuat {
    DQuat::from_rotation_z(hpr.x.to_radians())
        * DQuat::from_rotation_x(hpr.y.to_radians())
        * DQuat::from_rotation_y(hpr.z.to_radians())
}

pub fn quat_to_hpr(q: DQuat) -> DVec3 {
    mat3_to_hpr(&DMat3::from_quat(q.normalize()))
}

/// Extracts heading/pitch/roll in degrees from a pure rotation matrix.
pub fn mat3_to_hpr(m: &DMat3) -> DVec3 {
    let m00 = m.x_axis.x;
    let m10 = m.x_axis.y;
    let m20 = m.x_axis.z;
    let m01 = m.y_axis.x;
    let m11 = m.y_axis.y;
    let m21 = m.y_axis.z;
    let m22 = m.z_axis.z;

    let sp = m21.clamp(-1.0, 1.0);
    let pitch = sp.asin();
    let (heading, roll) = if sp.abs() < 1.0 - 1e-9 {
        ((-m01).atan2(m11), (-m20).atan2(m22))
    } else {
        (m10.atan2(m00), 0.0)
    };
    DVec3::new(heading.to_degrees(), pitch.to_degrees(), roll.to_degrees())
}

/// Angle in degrees between two rotations, ignoring quaternion sign.
pub fn rotation_angle_between(a: DQuat, b: DQuat) -> f64 {
    let d = a.normalize().dot(b.normalize()).abs().min(1.0);
    (2.0 * d.acos()).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: DVec3, b: DVec3, eps: f64) -> bool {
        (a - b).abs().max_element() < eps
    }

    #[test]
    fn plane_intersect_at_plane_origin_returns_point() {
        let p = DVec3::new(1.0, -2.0, 3.5);
        for d in [DVec3::new(0.3, 1.0, 0.0), DVec3::new(-1.0, 2.0, 5.0), DVec3::Z] {
            let n = DVec3::new(0.2, 0.4, 1.0).normalize();
            let hit = plane_intersect(p, d, p, n).unwrap();
            assert!(close(hit, p, 1e-12));
        }
    }

    #[test]
    fn plane_intersect_rejects_parallel_lines() {
        let err = plane_intersect(DVec3::ZERO, DVec3::X, DVec3::Z, DVec3::Z);
        assert_eq!(err, Err(GeometryError::DegenerateIntersection));
        let err = plane_intersect(DVec3::ZERO, DVec3::ZERO, DVec3::Z, DVec3::Z);
        assert_eq!(err, Err(GeometryError::DegenerateIntersection));
    }

    #[test]
    fn plane_intersect_hits_ground() {
        let hit = plane_intersect(
            DVec3::new(0.0, 0.0, 10.0),
            DVec3::new(1.0, 0.0, -1.0),
            DVec3::ZERO,
            DVec3::Z,
        )
        .unwrap();
        assert!(close(hit, DVec3::new(10.0, 0.0, 0.0), 1e-12));
    }

    #[test]
    fn near_projection_handles_camera_plane() {
        assert_eq!(near_projection(DVec3::new(3.0, 0.0, 1.0), 1.0), DVec3::new(0.0, 1.0, 0.0));
        let p = near_projection(DVec3::new(2.0, 10.0, -4.0), 1.0);
        assert!(close(p, DVec3::new(0.2, 1.0, -0.4), 1e-12));
    }

    #[test]
    fn crank_angle_quadrants() {
        let centre = DVec3::new(0.0, 1.0, 0.0);
        assert!((get_crank_angle(centre, DVec2::new(1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((get_crank_angle(centre, DVec2::new(0.0, 1.0)) - 270.0).abs() < 1e-9);
        assert!((get_crank_angle(centre, DVec2::new(0.0, -1.0)) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn wrap_degrees_range() {
        assert!((wrap_degrees(350.0) + 10.0).abs() < 1e-9);
        assert!((wrap_degrees(-190.0) - 170.0).abs() < 1e-9);
        assert!((wrap_degrees(45.0) - 45.0).abs() < 1e-9);
    }

    #[test]
    fn slerp_endpoints_and_unit_length() {
        let a = hpr_to_quat(DVec3::new(10.0, 20.0, 30.0));
        let b = hpr_to_quat(DVec3::new(-80.0, 5.0, 170.0));
        assert!(rotation_angle_between(q_slerp(a, b, 0.0), a) < 1e-6);
        assert!(rotation_angle_between(q_slerp(a, b, 1.0), b) < 1e-6);
        for i in 0..=20 {
            let q = q_slerp(a, b, i as f64 / 20.0);
            assert!((q.length() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn slerp_same_hemisphere_is_exact_at_zero() {
        let a = hpr_to_quat(DVec3::new(10.0, 0.0, 0.0));
        let b = hpr_to_quat(DVec3::new(40.0, 0.0, 0.0));
        let q = q_slerp(a, b, 0.0);
        assert!((q - a).length() < 1e-12);
        let mid = quat_to_hpr(q_slerp(a, b, 0.5));
        assert!((mid.x - 25.0).abs() < 1e-9);
    }

    #[test]
    fn slerp_between_negated_ends_stays_put() {
        let q = hpr_to_quat(DVec3::new(30.0, -20.0, 45.0));
        for i in 0..=4 {
            let r = q_slerp(q, -q, i as f64 / 4.0);
            assert!(rotation_angle_between(r, q) < 1e-6);
            assert!((r.length() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn slerp_nearly_identical_uses_linear_blend() {
        let a = DQuat::IDENTITY;
        let b = hpr_to_quat(DVec3::new(1e-5, 0.0, 0.0));
        let q = q_slerp(a, b, 0.5);
        assert!((q.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn hpr_round_trip() {
        for hpr in [
            DVec3::new(90.0, 0.0, 0.0),
            DVec3::new(135.0, -35.264, 0.0),
            DVec3::new(-30.0, 45.0, 60.0),
            DVec3::new(0.0, -89.0, 10.0),
        ] {
            let back = quat_to_hpr(hpr_to_quat(hpr));
            assert!(close(back, hpr, 1e-9), "{hpr:?} -> {back:?}");
        }
    }

    #[test]
    fn heading_turns_forward_toward_negative_x() {
        let q = hpr_to_quat(DVec3::new(90.0, 0.0, 0.0));
        assert!(close(q * DVec3::Y, DVec3::new(-1.0, 0.0, 0.0), 1e-12));
        let q = hpr_to_quat(DVec3::new(0.0, 90.0, 0.0));
        assert!(close(q * DVec3::Y, DVec3::Z, 1e-12));
    }

    #[test]
    fn axis_letters() {
        for axis in Axis::ALL {
            assert_eq!(Axis::from_letter(axis.letter()), Some(axis));
            assert_eq!(axis.unit()[axis.index()], 1.0);
        }
        assert_eq!(Axis::from_letter('w'), None);
    }
}
