use std::f32::consts::PI;

use glam::{Mat4, Quat, Vec4};

use crate::aperture::Aperture;

const CLIP_SCALE_EPS: f32 = 1.0e-6;

fn half_turn() -> Mat4 {
    Mat4::from_rotation_y(PI)
}

/// Rigid transform carrying world points in front of `source` to the matching
/// points at `destination`, flipped half a turn about the aperture's up axis.
pub fn source_to_destination(source: &Aperture, destination: &Aperture) -> Mat4 {
    destination.world_matrix() * half_turn() * source.world_matrix().inverse()
}

/// Rotational part of [`source_to_destination`].
pub fn rotation_delta(source: &Aperture, destination: &Aperture) -> Quat {
    (destination.orientation * Quat::from_rotation_y(PI) * source.orientation.inverse())
        .normalize()
}

/// World matrix of the virtual camera that stands to `destination` as the real
/// camera (with world matrix `camera_world`) stands to `source`.
pub fn destination_camera_world(
    source: &Aperture,
    destination: &Aperture,
    camera_world: Mat4,
) -> Mat4 {
    source_to_destination(source, destination) * camera_world
}

/// View matrix for rendering what lies beyond `destination` as seen through `source`.
///
/// Equal to `inverse(destination_camera_world(..))`, expanded so no general
/// inverse of the camera is needed.
pub fn compute_destination_view(
    source: &Aperture,
    destination: &Aperture,
    camera_view: Mat4,
) -> Mat4 {
    camera_view * source.world_matrix() * half_turn() * destination.world_matrix().inverse()
}

pub fn clip_sign(value: f32) -> f32 {
    if value < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Replaces the near plane of an OpenGL-style perspective `projection` with the
/// plane of `destination`, as seen from `destination_view`.
///
/// The plane is oriented so the virtual camera lies on its negative side; only
/// geometry past the aperture survives clipping. Falls back to `projection`
/// when the plane is edge-on to the camera.
pub fn compute_clipped_projection(
    destination: &Aperture,
    destination_view: Mat4,
    projection: Mat4,
) -> Mat4 {
    // Planes transform by the inverse transpose; the view is rigid so its
    // inverse is the camera's world matrix.
    let mut clip_plane = destination_view.inverse().transpose() * destination.plane();
    if clip_plane.w > 0.0 {
        clip_plane = -clip_plane;
    }

    let mut e = projection.to_cols_array();
    let q = Vec4::new(
        (clip_sign(clip_plane.x) + e[8]) / e[0],
        (clip_sign(clip_plane.y) + e[9]) / e[5],
        -1.0,
        (1.0 + e[10]) / e[14],
    );

    let denom = clip_plane.dot(q);
    if !denom.is_finite() || denom.abs() < CLIP_SCALE_EPS {
        return projection;
    }
    let c = clip_plane * (2.0 / denom);

    e[2] = c.x;
    e[6] = c.y;
    e[10] = c.z + 1.0;
    e[14] = c.w;
    Mat4::from_cols_array(&e)
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use glam::{Mat4, Quat, Vec2, Vec3};

    use super::{
        clip_sign, compute_clipped_projection, compute_destination_view,
        destination_camera_world, rotation_delta, source_to_destination,
    };
    use crate::aperture::{ApertureDesc, ApertureSet, Handedness};

    fn scenario() -> ApertureSet {
        let mut set = ApertureSet::new();
        set.place(
            Handedness::Primary,
            ApertureDesc::new(Vec3::ZERO, Quat::IDENTITY, Vec2::new(5.0, 7.5)),
        )
        .unwrap();
        set.place(
            Handedness::Secondary,
            ApertureDesc::new(
                Vec3::new(50.0, 0.0, 0.0),
                Quat::from_rotation_y(-FRAC_PI_2),
                Vec2::new(5.0, 7.5),
            ),
        )
        .unwrap();
        set
    }

    fn approx(a: Vec3, b: Vec3) -> bool {
        a.abs_diff_eq(b, 1.0e-4)
    }

    #[test]
    fn source_plane_lands_on_destination_plane() {
        let set = scenario();
        let (a, b) = set.linked_pair().unwrap();
        let m = source_to_destination(a, b);

        for corner in a.corners() {
            let mapped = m.transform_point3(corner);
            assert!(b.signed_distance(mapped).abs() < 1.0e-4);
            assert!(b.contains_projected(mapped * 0.999 + b.position * 0.001, 0.0));
        }
        assert!(approx(m.transform_point3(a.position), b.position));
    }

    #[test]
    fn mapping_there_and_back_is_identity() {
        let set = scenario();
        let (a, b) = set.linked_pair().unwrap();
        let round_trip = source_to_destination(b, a) * source_to_destination(a, b);
        assert!(round_trip.abs_diff_eq(Mat4::IDENTITY, 1.0e-4));

        let q = rotation_delta(b, a) * rotation_delta(a, b);
        assert!((q * Vec3::X).abs_diff_eq(Vec3::X, 1.0e-5));
        assert!((q * Vec3::Z).abs_diff_eq(Vec3::Z, 1.0e-5));
    }

    #[test]
    fn concrete_pair_maps_front_point_behind_destination() {
        let set = scenario();
        let (a, b) = set.linked_pair().unwrap();
        let m = source_to_destination(a, b);
        assert!(approx(m.transform_point3(Vec3::new(0.0, 0.0, 1.0)), Vec3::new(51.0, 0.0, 0.0)));
        assert!(approx(rotation_delta(a, b) * Vec3::new(0.0, 0.0, 2.0), Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn destination_view_inverts_virtual_camera_world() {
        let set = scenario();
        let (a, b) = set.linked_pair().unwrap();
        let camera_world = Mat4::from_rotation_translation(
            Quat::from_rotation_y(0.3),
            Vec3::new(2.0, 1.5, 12.0),
        );
        let view = compute_destination_view(a, b, camera_world.inverse());
        let world = destination_camera_world(a, b, camera_world);
        assert!((view * world).abs_diff_eq(Mat4::IDENTITY, 1.0e-4));

        // A point just beyond the source maps into view space exactly where the
        // same point beyond the destination sits for the virtual camera.
        let beyond_source = Vec3::new(1.0, 2.0, -3.0);
        let beyond_destination = source_to_destination(a, b).transform_point3(beyond_source);
        let direct = camera_world.inverse().transform_point3(beyond_source);
        let virtual_view = view.transform_point3(beyond_destination);
        assert!(approx(direct, virtual_view));
    }

    fn ndc_depth(projection: Mat4, view: Mat4, point: Vec3) -> f32 {
        let clip = projection * view * point.extend(1.0);
        clip.z / clip.w
    }

    #[test]
    fn clipped_projection_puts_destination_plane_on_near_plane() {
        let set = scenario();
        let (a, b) = set.linked_pair().unwrap();
        let base = Mat4::perspective_rh_gl(70f32.to_radians(), 16.0 / 9.0, 0.1, 500.0);

        let cameras = [
            (a, b, Mat4::look_at_rh(Vec3::new(1.0, 0.5, 10.0), Vec3::ZERO, Vec3::Y)),
            (
                b,
                a,
                Mat4::look_at_rh(Vec3::new(40.0, -0.5, 1.0), Vec3::new(50.0, 0.0, 0.0), Vec3::Y),
            ),
        ];

        for (source, destination, camera_view) in cameras {
            let view = compute_destination_view(source, destination, camera_view);
            let clipped = compute_clipped_projection(destination, view, base);

            for point in destination.corners().into_iter().chain([destination.position]) {
                let depth = ndc_depth(clipped, view, point);
                assert!((depth + 1.0).abs() < 1.0e-3, "depth {depth}");
            }

            let beyond = destination.position + destination.normal() * 5.0;
            let depth = ndc_depth(clipped, view, beyond);
            assert!(depth > -1.0 && depth < 1.0, "depth {depth}");

            let behind = destination.position - destination.normal() * 2.0;
            assert!(ndc_depth(clipped, view, behind) < -1.0);
        }
    }

    #[test]
    fn clipped_projection_keeps_perspective_rows() {
        let set = scenario();
        let (a, b) = set.linked_pair().unwrap();
        let base = Mat4::perspective_rh_gl(1.2, 1.0, 0.1, 100.0);
        let view = compute_destination_view(a, b, Mat4::look_at_rh(Vec3::new(0.0, 0.0, 8.0), Vec3::ZERO, Vec3::Y));
        let clipped = compute_clipped_projection(b, view, base);
        assert_eq!(clipped.row(0), base.row(0));
        assert_eq!(clipped.row(1), base.row(1));
        assert_eq!(clipped.row(3), base.row(3));
    }

    #[test]
    fn zero_resolves_to_positive_sign() {
        assert_eq!(clip_sign(0.0), 1.0);
        assert_eq!(clip_sign(-0.0), 1.0);
        assert_eq!(clip_sign(-2.0), -1.0);
        assert_eq!(clip_sign(3.0), 1.0);
    }
}
