use aperture_shared::aperture::Aperture;
use glam::{Mat4, Vec3, Vec4};

/// Left, right, bottom, top, near, far; `xyz` is the inward unit normal.
pub type FrustumPlanes = [Vec4; 6];

/// Planes of an OpenGL-convention view-projection matrix.
pub fn extract_frustum_planes(view_projection: Mat4) -> FrustumPlanes {
    let x = view_projection.row(0);
    let y = view_projection.row(1);
    let z = view_projection.row(2);
    let w = view_projection.row(3);

    [w + x, w - x, w + y, w - y, w + z, w - z].map(|plane| {
        let length = plane.truncate().length();
        if length > 1.0e-4 {
            plane / length
        } else {
            Vec4::ZERO
        }
    })
}

pub fn sphere_in_frustum(planes: &FrustumPlanes, center: Vec3, radius: f32) -> bool {
    let center = center.extend(1.0);
    planes.iter().all(|plane| plane.dot(center) >= -radius)
}

/// Aperture proxies are one-sided: from behind its plane an aperture shows nothing.
pub fn faces_eye(aperture: &Aperture, eye: Vec3) -> bool {
    aperture.signed_distance(eye) > 0.0
}

/// Whether `aperture` can contribute pixels to a view from `eye`. The eye must
/// be in front of it and, when `planes` is given, its bounding sphere must
/// touch the frustum.
pub fn aperture_is_visible(aperture: &Aperture, eye: Vec3, planes: Option<&FrustumPlanes>) -> bool {
    if !faces_eye(aperture, eye) {
        return false;
    }
    planes.is_none_or(|planes| sphere_in_frustum(planes, aperture.position, aperture.bounding_radius()))
}

#[cfg(test)]
mod tests {
    use aperture_shared::aperture::{ApertureDesc, ApertureSet, Handedness};
    use glam::{Mat4, Quat, Vec2, Vec3};

    use super::{aperture_is_visible, extract_frustum_planes, sphere_in_frustum};

    #[test]
    fn frustum_rejects_spheres_behind_and_beside_camera() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh_gl(1.2, 1.0, 0.1, 100.0);
        let planes = extract_frustum_planes(projection * view);

        assert!(sphere_in_frustum(&planes, Vec3::ZERO, 1.0));
        assert!(!sphere_in_frustum(&planes, Vec3::new(0.0, 0.0, 20.0), 1.0));
        assert!(!sphere_in_frustum(&planes, Vec3::new(60.0, 0.0, 0.0), 1.0));
        assert!(!sphere_in_frustum(&planes, Vec3::new(0.0, 0.0, -200.0), 1.0));
    }

    #[test]
    fn apertures_seen_from_behind_are_hidden() {
        let mut set = ApertureSet::new();
        let (id, _) = set
            .place(
                Handedness::Primary,
                ApertureDesc::new(Vec3::ZERO, Quat::IDENTITY, Vec2::new(5.0, 7.5)),
            )
            .unwrap();
        let aperture = set.get(id).unwrap();
        let projection = Mat4::perspective_rh_gl(1.2, 1.0, 0.1, 100.0);

        let front = Vec3::new(0.0, 0.0, 10.0);
        let planes = extract_frustum_planes(projection * Mat4::look_at_rh(front, Vec3::ZERO, Vec3::Y));
        assert!(aperture_is_visible(aperture, front, Some(&planes)));
        assert!(aperture_is_visible(aperture, front, None));

        let back = Vec3::new(0.0, 0.0, -10.0);
        let planes = extract_frustum_planes(projection * Mat4::look_at_rh(back, Vec3::ZERO, Vec3::Y));
        assert!(!aperture_is_visible(aperture, back, Some(&planes)));
        assert!(!aperture_is_visible(aperture, back, None));

        // In front but looking away: only the frustum test rejects it.
        let away = Mat4::look_at_rh(front, Vec3::new(0.0, 0.0, 20.0), Vec3::Y);
        let planes = extract_frustum_planes(projection * away);
        assert!(!aperture_is_visible(aperture, front, Some(&planes)));
        assert!(aperture_is_visible(aperture, front, None));
    }
}
