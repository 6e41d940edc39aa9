use glam::Vec3;

use crate::aperture::Aperture;
use crate::config::FunnelConfig;

const CENTERED_EPS: f32 = 1.0e-4;

/// Steers bodies hovering above an upward-facing aperture toward its centre.
#[derive(Debug, Clone)]
pub struct FunnelAssist {
    facing_threshold: f32,
    cos_cone: f32,
    height: f32,
    strength: f32,
}

impl FunnelAssist {
    pub fn new(config: &FunnelConfig) -> Self {
        Self {
            facing_threshold: config.facing_threshold,
            cos_cone: config.cone_angle_deg.to_radians().cos(),
            height: config.height,
            strength: config.strength,
        }
    }

    pub fn faces_up(&self, aperture: &Aperture) -> bool {
        aperture.normal().dot(Vec3::Y) > self.facing_threshold
    }

    pub fn within_cone(&self, aperture: &Aperture, position: Vec3) -> bool {
        if !self.faces_up(aperture) {
            return false;
        }

        let to_body = position - aperture.position;
        let along = to_body.dot(aperture.normal());
        if !(0.0..=self.height).contains(&along) {
            return false;
        }

        let distance = to_body.length();
        if distance <= CENTERED_EPS {
            return false;
        }
        along / distance > self.cos_cone
    }

    /// Horizontal impulse toward the aperture centre, never longer than the
    /// remaining horizontal offset.
    pub fn impulse(&self, aperture: &Aperture, position: Vec3) -> Option<Vec3> {
        if !self.within_cone(aperture, position) {
            return None;
        }

        let mut to_center = aperture.position - position;
        to_center.y = 0.0;
        let distance = to_center.length();
        if distance <= CENTERED_EPS {
            return None;
        }
        Some(to_center / distance * self.strength.min(distance))
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use glam::{Quat, Vec2, Vec3};

    use super::FunnelAssist;
    use crate::aperture::{Aperture, ApertureDesc, ApertureSet, Handedness};
    use crate::config::FunnelConfig;

    fn floor_aperture(set: &mut ApertureSet, orientation: Quat) -> Aperture {
        let desc = ApertureDesc::new(Vec3::new(2.0, 0.0, 2.0), orientation, Vec2::new(5.0, 7.5));
        let (id, _) = set.place(Handedness::Primary, desc).unwrap();
        set.get(id).unwrap().clone()
    }

    #[test]
    fn pulls_bodies_inside_cone_toward_centre() {
        let mut set = ApertureSet::new();
        let aperture = floor_aperture(&mut set, Quat::from_rotation_x(-FRAC_PI_2));
        let funnel = FunnelAssist::new(&FunnelConfig::default());

        let impulse = funnel.impulse(&aperture, Vec3::new(4.0, 8.0, 2.0)).unwrap();
        assert!(impulse.abs_diff_eq(Vec3::new(-0.2, 0.0, 0.0), 1.0e-5));

        let near_axis = funnel.impulse(&aperture, Vec3::new(2.05, 5.0, 2.0)).unwrap();
        assert!(near_axis.abs_diff_eq(Vec3::new(-0.05, 0.0, 0.0), 1.0e-5));
    }

    #[test]
    fn ignores_bodies_outside_cone_or_height() {
        let mut set = ApertureSet::new();
        let aperture = floor_aperture(&mut set, Quat::from_rotation_x(-FRAC_PI_2));
        let funnel = FunnelAssist::new(&FunnelConfig::default());

        assert!(funnel.impulse(&aperture, Vec3::new(8.0, 2.0, 2.0)).is_none());
        assert!(funnel.impulse(&aperture, Vec3::new(2.5, 12.0, 2.0)).is_none());
        assert!(funnel.impulse(&aperture, Vec3::new(2.5, -1.0, 2.0)).is_none());
        assert!(funnel.impulse(&aperture, Vec3::new(2.0, 4.0, 2.0)).is_none());
    }

    #[test]
    fn wall_apertures_never_funnel() {
        let mut set = ApertureSet::new();
        let aperture = floor_aperture(&mut set, Quat::IDENTITY);
        let funnel = FunnelAssist::new(&FunnelConfig::default());
        assert!(!funnel.faces_up(&aperture));
        assert!(funnel.impulse(&aperture, Vec3::new(2.0, 0.5, 6.0)).is_none());
    }
}
