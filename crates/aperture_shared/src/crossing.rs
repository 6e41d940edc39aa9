use glam::{Quat, Vec3};

use crate::aperture::Aperture;
use crate::body::{Baseline, BodyState};
use crate::transform::{rotation_delta, source_to_destination};

const LEVEL_EPS: f32 = 1.0e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    pub t: f32,
    pub point: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorClamp {
    pub floor_height: f32,
    pub standing_height: f32,
    pub tolerance: f32,
}

impl FloorClamp {
    pub fn apply(&self, mut position: Vec3) -> Vec3 {
        let standing = self.floor_height + self.standing_height;
        if position.y < standing - self.tolerance {
            position.y = standing;
        }
        position
    }
}

/// Fraction of the step at which the plane was crossed, or `None` when the
/// signed distance did not change sign. A distance of exactly zero lies on
/// the plane and belongs to neither side.
pub fn crossing_parameter(d_prev: f32, d_curr: f32) -> Option<f32> {
    if d_prev == 0.0 || d_curr == 0.0 {
        return None;
    }
    if (d_prev < 0.0) == (d_curr < 0.0) {
        return None;
    }

    let t = d_prev / (d_prev - d_curr);
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    Some(t)
}

/// Tests the segment from `previous` to `current` against the opening of `aperture`.
pub fn detect_crossing(
    aperture: &Aperture,
    previous: Baseline,
    current: Vec3,
    vertical_offset: f32,
) -> Option<Crossing> {
    let d_curr = aperture.signed_distance(current);
    let t = crossing_parameter(previous.signed_distance, d_curr)?;
    let point = previous.position.lerp(current, t);
    if !aperture.contains_projected(point, vertical_offset) {
        return None;
    }
    Some(Crossing { t, point })
}

/// Removes roll and pitch so the body's up axis is world up, keeping its heading.
pub fn level_orientation(orientation: Quat) -> Quat {
    let forward = orientation * Vec3::NEG_Z;
    let mut heading = Vec3::new(forward.x, 0.0, forward.z);
    if heading.length_squared() <= LEVEL_EPS {
        // Looking straight up or down: derive the heading from the right axis.
        let right = orientation * Vec3::X;
        heading = Vec3::Y.cross(Vec3::new(right.x, 0.0, right.z));
    }
    if heading.length_squared() <= LEVEL_EPS {
        return Quat::IDENTITY;
    }

    let heading = heading.normalize();
    Quat::from_rotation_y((-heading.x).atan2(-heading.z))
}

/// Carries a body's full state through `source` and out of `destination`.
pub fn teleport(
    source: &Aperture,
    destination: &Aperture,
    state: &BodyState,
    floor: &FloorClamp,
) -> BodyState {
    let delta = rotation_delta(source, destination);
    let position = source_to_destination(source, destination).transform_point3(state.position);

    BodyState {
        position: floor.apply(position),
        orientation: level_orientation(delta * state.orientation),
        velocity: delta * state.velocity,
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use glam::{Quat, Vec2, Vec3};

    use super::{
        crossing_parameter, detect_crossing, level_orientation, teleport, FloorClamp,
    };
    use crate::aperture::{ApertureDesc, ApertureSet, Handedness};
    use crate::body::{Baseline, BodyState};

    const NO_FLOOR: FloorClamp = FloorClamp {
        floor_height: -1000.0,
        standing_height: 0.0,
        tolerance: 0.0,
    };

    fn pair(destination: ApertureDesc) -> ApertureSet {
        let mut set = ApertureSet::new();
        set.place(
            Handedness::Primary,
            ApertureDesc::new(Vec3::ZERO, Quat::IDENTITY, Vec2::new(5.0, 7.5)),
        )
        .unwrap();
        set.place(Handedness::Secondary, destination).unwrap();
        set
    }

    fn wall_pair() -> ApertureSet {
        pair(ApertureDesc::new(
            Vec3::new(50.0, 0.0, 0.0),
            Quat::from_rotation_y(-FRAC_PI_2),
            Vec2::new(5.0, 7.5),
        ))
    }

    fn baseline(set: &ApertureSet, position: Vec3) -> Baseline {
        let (a, _) = set.linked_pair().unwrap();
        Baseline {
            signed_distance: a.signed_distance(position),
            position,
        }
    }

    #[test]
    fn parameter_requires_sign_change() {
        assert_eq!(crossing_parameter(-1.0, 1.0), Some(0.5));
        assert_eq!(crossing_parameter(2.0, -6.0), Some(0.25));
        assert_eq!(crossing_parameter(3.0, 3.0), None);
        assert_eq!(crossing_parameter(3.0, 1.0), None);
        assert_eq!(crossing_parameter(-3.0, -1.0), None);
        assert_eq!(crossing_parameter(0.0, 0.0), None);
        assert_eq!(crossing_parameter(-2.0, 0.0), None);
        assert_eq!(crossing_parameter(0.0, 1.5), None);
        assert_eq!(crossing_parameter(0.0, -1.5), None);
    }

    #[test]
    fn concrete_scenario_crosses_at_half_step() {
        let set = wall_pair();
        let (a, b) = set.linked_pair().unwrap();
        let start = Vec3::new(0.0, 0.0, -1.0);
        let end = Vec3::new(0.0, 0.0, 1.0);

        let crossing = detect_crossing(a, baseline(&set, start), end, 0.0).unwrap();
        assert_eq!(crossing.t, 0.5);
        assert_eq!(crossing.point, Vec3::ZERO);

        let state = BodyState {
            position: end,
            orientation: Quat::IDENTITY,
            velocity: Vec3::new(0.0, 0.0, 2.0),
        };
        let after = teleport(a, b, &state, &NO_FLOOR);
        assert!(after.position.abs_diff_eq(Vec3::new(51.0, 0.0, 0.0), 1.0e-4));
        assert!(after.velocity.abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1.0e-4));
    }

    #[test]
    fn motion_on_one_side_never_crosses() {
        let set = wall_pair();
        let (a, _) = set.linked_pair().unwrap();
        let start = Vec3::new(0.0, 0.0, 3.0);
        assert!(detect_crossing(a, baseline(&set, start), Vec3::new(1.0, 2.0, 3.0), 0.0).is_none());
    }

    #[test]
    fn moving_away_never_crosses() {
        let set = wall_pair();
        let (a, _) = set.linked_pair().unwrap();
        for side in [-1.0f32, 1.0] {
            let mut position = Vec3::new(0.5, -1.0, side * 0.01);
            for _ in 0..50 {
                let next = position + Vec3::new(0.1, 0.05, side * 0.3);
                assert!(detect_crossing(a, baseline(&set, position), next, 0.0).is_none());
                position = next;
            }
        }
    }

    #[test]
    fn crossing_outside_opening_is_ignored() {
        let set = wall_pair();
        let (a, _) = set.linked_pair().unwrap();
        let start = Vec3::new(6.0, 0.0, -1.0);
        let end = Vec3::new(6.0, 0.0, 1.0);
        assert!(detect_crossing(a, baseline(&set, start), end, 0.0).is_none());

        let low_start = Vec3::new(0.0, -8.0, -1.0);
        let low_end = Vec3::new(0.0, -8.0, 1.0);
        assert!(detect_crossing(a, baseline(&set, low_start), low_end, 0.0).is_none());
        assert!(detect_crossing(a, baseline(&set, low_start), low_end, 1.0).is_some());
    }

    #[test]
    fn round_trip_restores_state() {
        let set = wall_pair();
        let (a, b) = set.linked_pair().unwrap();
        let state = BodyState {
            position: Vec3::new(1.5, 2.0, 0.4),
            orientation: Quat::from_rotation_y(0.7),
            velocity: Vec3::new(-1.0, 0.5, 3.0),
        };

        let there = teleport(a, b, &state, &NO_FLOOR);
        let back = teleport(b, a, &there, &NO_FLOOR);
        assert!(back.position.abs_diff_eq(state.position, 1.0e-4));
        assert!(back.velocity.abs_diff_eq(state.velocity, 1.0e-4));
        let forward = back.orientation * Vec3::NEG_Z;
        assert!(forward.abs_diff_eq(state.orientation * Vec3::NEG_Z, 1.0e-4));
    }

    #[test]
    fn speed_is_preserved_for_any_orientation_pair() {
        let velocities = [
            Vec3::new(0.0, -9.0, 0.0),
            Vec3::new(3.0, 4.0, 12.0),
            Vec3::new(-0.25, 0.0, 0.1),
        ];
        let orientations = [
            Quat::IDENTITY,
            Quat::from_rotation_x(-FRAC_PI_2),
            Quat::from_euler(glam::EulerRot::YXZ, 1.1, 0.4, -0.3),
            Quat::from_rotation_y(2.5),
        ];

        for destination in orientations {
            let set = pair(ApertureDesc::new(Vec3::new(-4.0, 3.0, 9.0), destination, Vec2::ONE));
            let (a, b) = set.linked_pair().unwrap();
            for velocity in velocities {
                let state = BodyState {
                    position: Vec3::ZERO,
                    orientation: Quat::IDENTITY,
                    velocity,
                };
                let after = teleport(a, b, &state, &NO_FLOOR);
                assert!((after.velocity.length() - velocity.length()).abs() < 1.0e-4);
            }
        }
    }

    #[test]
    fn floor_to_wall_turns_falling_into_horizontal_motion() {
        let mut set = pair(ApertureDesc::new(
            Vec3::new(0.0, 20.0, -30.0),
            Quat::IDENTITY,
            Vec2::new(5.0, 7.5),
        ));
        let floor = ApertureDesc::new(Vec3::ZERO, Quat::from_rotation_x(-FRAC_PI_2), Vec2::new(5.0, 7.5));
        set.place(Handedness::Primary, floor).unwrap();
        let (a, b) = set.linked_pair().unwrap();

        let state = BodyState {
            position: Vec3::new(0.0, -0.5, 0.0),
            orientation: Quat::IDENTITY,
            velocity: Vec3::new(0.0, -8.0, 0.0),
        };
        let after = teleport(a, b, &state, &NO_FLOOR);
        assert!(after.velocity.abs_diff_eq(Vec3::new(0.0, 0.0, 8.0), 1.0e-4));
        assert!((after.orientation * Vec3::Y).abs_diff_eq(Vec3::Y, 1.0e-5));
    }

    #[test]
    fn floor_clamp_lifts_low_arrivals_only() {
        let clamp = FloorClamp {
            floor_height: 0.0,
            standing_height: 10.0,
            tolerance: 0.02,
        };
        assert_eq!(clamp.apply(Vec3::new(1.0, 4.0, 2.0)), Vec3::new(1.0, 10.0, 2.0));
        assert_eq!(clamp.apply(Vec3::new(1.0, 9.99, 2.0)), Vec3::new(1.0, 9.99, 2.0));
        assert_eq!(clamp.apply(Vec3::new(1.0, 14.0, 2.0)), Vec3::new(1.0, 14.0, 2.0));
    }

    #[test]
    fn leveling_removes_roll_and_pitch() {
        let tilted = Quat::from_euler(glam::EulerRot::YXZ, 0.8, 0.5, 0.3);
        let level = level_orientation(tilted);
        assert!((level * Vec3::Y).abs_diff_eq(Vec3::Y, 1.0e-5));
        let expected = Quat::from_rotation_y(0.8);
        assert!((level * Vec3::NEG_Z).abs_diff_eq(expected * Vec3::NEG_Z, 1.0e-4));

        let straight_down = Quat::from_rotation_y(0.4) * Quat::from_rotation_x(-FRAC_PI_2);
        let level = level_orientation(straight_down);
        assert!((level * Vec3::NEG_Z).abs_diff_eq(Quat::from_rotation_y(0.4) * Vec3::NEG_Z, 1.0e-4));
    }
}
