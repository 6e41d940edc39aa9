use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::aperture::ApertureId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyKind {
    Player,
    HeldProp,
    Prop,
}

impl BodyKind {
    /// Height above the floor a body of this kind is lifted to when it
    /// materializes too low. Props are only kept above the floor itself.
    pub fn standing_height(self) -> f32 {
        match self {
            Self::Player => 10.0,
            Self::HeldProp | Self::Prop => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Vec3,
    pub orientation: Quat,
    pub velocity: Vec3,
}

impl BodyState {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub signed_distance: f32,
    pub position: Vec3,
}

/// Crossing bookkeeping for one teleport-eligible body.
#[derive(Debug, Clone)]
pub struct TrackedBody {
    pub id: BodyId,
    pub kind: BodyKind,
    /// Offset from the body origin to its centre along world up, applied when
    /// testing whether a crossing hit the opening.
    pub center_offset: f32,
    pub standing_height: f32,
    baselines: FxHashMap<ApertureId, Baseline>,
}

impl TrackedBody {
    pub fn new(id: BodyId, kind: BodyKind) -> Self {
        Self {
            id,
            kind,
            center_offset: 0.0,
            standing_height: kind.standing_height(),
            baselines: FxHashMap::default(),
        }
    }

    pub fn with_center_offset(mut self, offset: f32) -> Self {
        self.center_offset = offset;
        self
    }

    pub fn with_standing_height(mut self, height: f32) -> Self {
        self.standing_height = height;
        self
    }

    pub fn baseline(&self, aperture: ApertureId) -> Option<Baseline> {
        self.baselines.get(&aperture).copied()
    }

    pub fn set_baseline(&mut self, aperture: ApertureId, signed_distance: f32, position: Vec3) {
        self.baselines.insert(
            aperture,
            Baseline {
                signed_distance,
                position,
            },
        );
    }

    pub fn forget_aperture(&mut self, aperture: ApertureId) {
        self.baselines.remove(&aperture);
    }

    pub fn clear_baselines(&mut self) {
        self.baselines.clear();
    }

    pub fn retain_apertures(&mut self, live: &[ApertureId]) {
        self.baselines.retain(|id, _| live.contains(id));
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::{BodyId, BodyKind, TrackedBody};
    use crate::aperture::ApertureId;

    #[test]
    fn baselines_are_tracked_per_aperture() {
        let mut body = TrackedBody::new(BodyId(1), BodyKind::Player);
        assert_eq!(body.standing_height, 10.0);
        assert!(body.baseline(ApertureId(1)).is_none());

        body.set_baseline(ApertureId(1), -1.0, Vec3::new(0.0, 0.0, -1.0));
        body.set_baseline(ApertureId(2), 4.0, Vec3::ZERO);
        assert_eq!(body.baseline(ApertureId(1)).unwrap().signed_distance, -1.0);

        body.retain_apertures(&[ApertureId(2)]);
        assert!(body.baseline(ApertureId(1)).is_none());
        assert!(body.baseline(ApertureId(2)).is_some());

        body.clear_baselines();
        assert!(body.baseline(ApertureId(2)).is_none());
    }
}
