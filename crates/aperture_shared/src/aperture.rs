use std::f32::consts::FRAC_PI_2;
use std::fmt;

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use tracing::info;

const ORIENTATION_TOLERANCE: f32 = 1.0e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApertureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handedness {
    Primary,
    Secondary,
}

impl Handedness {
    pub const ALL: [Handedness; 2] = [Handedness::Primary, Handedness::Secondary];

    pub fn index(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::Primary => Self::Secondary,
            Self::Secondary => Self::Primary,
        }
    }

    pub fn stencil_index(self) -> u8 {
        self.index() as u8 + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegenerateReason {
    NonFiniteTransform,
    UnnormalizedOrientation,
    ZeroExtent,
    NonPlanar,
    NoThinAxis,
}

impl fmt::Display for DegenerateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFiniteTransform => write!(f, "position or orientation is not finite"),
            Self::UnnormalizedOrientation => write!(f, "orientation is not a unit quaternion"),
            Self::ZeroExtent => write!(f, "half extent must be positive on both in-plane axes"),
            Self::NonPlanar => write!(f, "box has non-zero extent on every axis"),
            Self::NoThinAxis => write!(f, "box is flat on more than one axis"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApertureError {
    DegenerateGeometry(DegenerateReason),
    MissingPair(ApertureId),
    UnknownAperture(ApertureId),
}

impl fmt::Display for ApertureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateGeometry(reason) => write!(f, "degenerate aperture geometry: {reason}"),
            Self::MissingPair(id) => write!(f, "aperture {} has no paired aperture", id.0),
            Self::UnknownAperture(id) => write!(f, "no live aperture with id {}", id.0),
        }
    }
}

impl std::error::Error for ApertureError {}

/// Geometry of an aperture before it is registered in an [`ApertureSet`].
///
/// Local axes follow the surface convention: +X is right, +Y is up and +Z is
/// the facing normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApertureDesc {
    pub position: Vec3,
    pub orientation: Quat,
    pub half_extent: Vec2,
    pub surface: Option<SurfaceId>,
}

impl ApertureDesc {
    pub fn new(position: Vec3, orientation: Quat, half_extent: Vec2) -> Self {
        Self {
            position,
            orientation,
            half_extent,
            surface: None,
        }
    }

    pub fn on_surface(mut self, surface: SurfaceId) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Builds an aperture from a box that is flat along exactly one world axis.
    /// The flat axis becomes the facing normal.
    pub fn from_axis_aligned_box(position: Vec3, size: Vec3) -> Result<Self, ApertureError> {
        if !position.is_finite() || !size.is_finite() {
            return Err(ApertureError::DegenerateGeometry(
                DegenerateReason::NonFiniteTransform,
            ));
        }

        let half = size.abs() * 0.5;
        let flat = [half.x == 0.0, half.y == 0.0, half.z == 0.0];
        let flat_count = flat.iter().filter(|axis| **axis).count();
        if flat_count == 0 {
            return Err(ApertureError::DegenerateGeometry(DegenerateReason::NonPlanar));
        }
        if flat_count > 1 {
            return Err(ApertureError::DegenerateGeometry(DegenerateReason::NoThinAxis));
        }

        let (orientation, half_extent) = if flat[0] {
            (Quat::from_rotation_y(FRAC_PI_2), Vec2::new(half.z, half.y))
        } else if flat[1] {
            (Quat::from_rotation_x(-FRAC_PI_2), Vec2::new(half.x, half.z))
        } else {
            (Quat::IDENTITY, Vec2::new(half.x, half.y))
        };

        let desc = Self::new(position, orientation, half_extent);
        desc.validate()?;
        Ok(desc)
    }

    pub fn validate(&self) -> Result<(), ApertureError> {
        if !self.position.is_finite() || !self.orientation.is_finite() {
            return Err(ApertureError::DegenerateGeometry(
                DegenerateReason::NonFiniteTransform,
            ));
        }
        if (self.orientation.length() - 1.0).abs() > ORIENTATION_TOLERANCE {
            return Err(ApertureError::DegenerateGeometry(
                DegenerateReason::UnnormalizedOrientation,
            ));
        }
        if !self.half_extent.is_finite() || self.half_extent.min_element() <= 0.0 {
            return Err(ApertureError::DegenerateGeometry(DegenerateReason::ZeroExtent));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Aperture {
    pub id: ApertureId,
    pub handedness: Handedness,
    pub position: Vec3,
    pub orientation: Quat,
    pub half_extent: Vec2,
    pub surface: Option<SurfaceId>,
    pub stencil_index: u8,
    paired: Option<ApertureId>,
}

impl Aperture {
    pub fn pair(&self) -> Option<ApertureId> {
        self.paired
    }

    pub fn normal(&self) -> Vec3 {
        self.orientation * Vec3::Z
    }

    pub fn right(&self) -> Vec3 {
        self.orientation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.orientation * Vec3::Y
    }

    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }

    /// Plane through the aperture centre as `(normal, -normal · centre)`.
    pub fn plane(&self) -> Vec4 {
        let normal = self.normal();
        normal.extend(-normal.dot(self.position))
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        (point - self.position).dot(self.normal())
    }

    pub fn bounding_radius(&self) -> f32 {
        self.half_extent.length()
    }

    /// In-plane coordinates of `point` along the right and up axes.
    pub fn plane_coords(&self, point: Vec3) -> Vec2 {
        let local = point - self.position;
        Vec2::new(local.dot(self.right()), local.dot(self.up()))
    }

    /// Whether `point`, lifted by `vertical_offset` along world up, projects strictly
    /// inside the opening.
    pub fn contains_projected(&self, point: Vec3, vertical_offset: f32) -> bool {
        let coords = self.plane_coords(point + Vec3::Y * vertical_offset);
        coords.x.abs() < self.half_extent.x && coords.y.abs() < self.half_extent.y
    }

    pub fn corners(&self) -> [Vec3; 4] {
        let right = self.right() * self.half_extent.x;
        let up = self.up() * self.half_extent.y;
        [
            self.position - right - up,
            self.position + right - up,
            self.position + right + up,
            self.position - right + up,
        ]
    }
}

#[derive(Debug, Default)]
pub struct ApertureSet {
    slots: [Option<Aperture>; 2],
    next_id: u32,
}

impl ApertureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an aperture in the slot for `handedness`, replacing any previous one.
    /// Returns the new id together with the aperture it displaced.
    pub fn place(
        &mut self,
        handedness: Handedness,
        desc: ApertureDesc,
    ) -> Result<(ApertureId, Option<Aperture>), ApertureError> {
        desc.validate()?;

        self.next_id += 1;
        let id = ApertureId(self.next_id);
        let replaced = self.slots[handedness.index()].replace(Aperture {
            id,
            handedness,
            position: desc.position,
            orientation: desc.orientation.normalize(),
            half_extent: desc.half_extent,
            surface: desc.surface,
            stencil_index: handedness.stencil_index(),
            paired: None,
        });
        if let Some(previous) = &replaced {
            info!(
                "Replacing {:?} aperture {} with {}",
                handedness, previous.id.0, id.0
            );
        }
        self.refresh_links();
        Ok((id, replaced))
    }

    pub fn remove(&mut self, handedness: Handedness) -> Option<Aperture> {
        let removed = self.slots[handedness.index()].take();
        if removed.is_some() {
            self.refresh_links();
        }
        removed.map(|mut aperture| {
            aperture.paired = None;
            aperture
        })
    }

    pub fn remove_id(&mut self, id: ApertureId) -> Option<Aperture> {
        let handedness = self.get(id)?.handedness;
        self.remove(handedness)
    }

    pub fn get(&self, id: ApertureId) -> Option<&Aperture> {
        self.iter().find(|aperture| aperture.id == id)
    }

    pub fn by_handedness(&self, handedness: Handedness) -> Option<&Aperture> {
        self.slots[handedness.index()].as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Aperture> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pair_of(&self, id: ApertureId) -> Result<&Aperture, ApertureError> {
        let aperture = self.get(id).ok_or(ApertureError::UnknownAperture(id))?;
        aperture
            .paired
            .and_then(|pair| self.get(pair))
            .ok_or(ApertureError::MissingPair(id))
    }

    /// Resolves `id` and its pair in one call, as `(source, destination)`.
    pub fn endpoints(&self, id: ApertureId) -> Result<(&Aperture, &Aperture), ApertureError> {
        let source = self.get(id).ok_or(ApertureError::UnknownAperture(id))?;
        Ok((source, self.pair_of(id)?))
    }

    pub fn linked_pair(&self) -> Option<(&Aperture, &Aperture)> {
        let primary = self.by_handedness(Handedness::Primary)?;
        let secondary = self.by_handedness(Handedness::Secondary)?;
        if primary.paired == Some(secondary.id) && secondary.paired == Some(primary.id) {
            Some((primary, secondary))
        } else {
            None
        }
    }

    pub fn is_linked(&self) -> bool {
        self.linked_pair().is_some()
    }

    pub fn ids(&self) -> Vec<ApertureId> {
        self.iter().map(|aperture| aperture.id).collect()
    }

    fn refresh_links(&mut self) {
        let primary_id = self.slots[Handedness::Primary.index()]
            .as_ref()
            .map(|a| a.id);
        let secondary_id = self.slots[Handedness::Secondary.index()]
            .as_ref()
            .map(|a| a.id);

        let (primary_link, secondary_link) = match (primary_id, secondary_id) {
            (Some(p), Some(s)) => (Some(s), Some(p)),
            _ => (None, None),
        };

        if let Some(primary) = self.slots[Handedness::Primary.index()].as_mut() {
            primary.paired = primary_link;
        }
        if let Some(secondary) = self.slots[Handedness::Secondary.index()].as_mut() {
            secondary.paired = secondary_link;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use glam::{Quat, Vec2, Vec3};

    use super::{
        ApertureDesc, ApertureError, ApertureSet, DegenerateReason, Handedness,
    };

    fn wall(x: f32) -> ApertureDesc {
        ApertureDesc::new(Vec3::new(x, 0.0, 0.0), Quat::IDENTITY, Vec2::new(5.0, 7.5))
    }

    fn assert_symmetric(set: &ApertureSet) {
        for aperture in set.iter() {
            if let Some(pair) = aperture.pair() {
                let back = set.get(pair).and_then(|other| other.pair());
                assert_eq!(back, Some(aperture.id));
            }
        }
    }

    #[test]
    fn pairing_is_symmetric_across_place_replace_and_remove() {
        let mut set = ApertureSet::new();
        let (a, _) = set.place(Handedness::Primary, wall(0.0)).unwrap();
        assert_eq!(set.get(a).unwrap().pair(), None);
        assert!(!set.is_linked());
        assert_symmetric(&set);

        let (b, _) = set.place(Handedness::Secondary, wall(50.0)).unwrap();
        assert_eq!(set.get(a).unwrap().pair(), Some(b));
        assert_eq!(set.get(b).unwrap().pair(), Some(a));
        assert_symmetric(&set);

        let (c, replaced) = set.place(Handedness::Primary, wall(10.0)).unwrap();
        assert_eq!(replaced.map(|r| r.id), Some(a));
        assert!(set.get(a).is_none());
        assert_eq!(set.get(b).unwrap().pair(), Some(c));
        assert_symmetric(&set);

        let removed = set.remove(Handedness::Secondary).unwrap();
        assert_eq!(removed.id, b);
        assert_eq!(removed.pair(), None);
        assert_eq!(set.get(c).unwrap().pair(), None);
        assert_symmetric(&set);
    }

    #[test]
    fn unpaired_aperture_reports_missing_pair() {
        let mut set = ApertureSet::new();
        let (a, _) = set.place(Handedness::Primary, wall(0.0)).unwrap();
        assert_eq!(set.pair_of(a).unwrap_err(), ApertureError::MissingPair(a));
    }

    #[test]
    fn stencil_indices_are_unique_per_slot() {
        let mut set = ApertureSet::new();
        set.place(Handedness::Primary, wall(0.0)).unwrap();
        set.place(Handedness::Secondary, wall(50.0)).unwrap();
        let indices: Vec<u8> = set.iter().map(|a| a.stencil_index).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn zero_extent_is_rejected() {
        let mut set = ApertureSet::new();
        let desc = ApertureDesc::new(Vec3::ZERO, Quat::IDENTITY, Vec2::new(0.0, 1.0));
        assert_eq!(
            set.place(Handedness::Primary, desc).unwrap_err(),
            ApertureError::DegenerateGeometry(DegenerateReason::ZeroExtent)
        );
        assert!(set.is_empty());
    }

    #[test]
    fn axis_aligned_box_picks_each_thin_axis() {
        let x = ApertureDesc::from_axis_aligned_box(Vec3::ZERO, Vec3::new(0.0, 2.0, 4.0)).unwrap();
        assert!((x.orientation * Vec3::Z).abs_diff_eq(Vec3::X, 1.0e-5));
        assert_eq!(x.half_extent, Vec2::new(2.0, 1.0));

        let y = ApertureDesc::from_axis_aligned_box(Vec3::ZERO, Vec3::new(4.0, 0.0, 2.0)).unwrap();
        assert!((y.orientation * Vec3::Z).abs_diff_eq(Vec3::Y, 1.0e-5));
        assert_eq!(y.half_extent, Vec2::new(2.0, 1.0));

        let z = ApertureDesc::from_axis_aligned_box(Vec3::ZERO, Vec3::new(10.0, 15.0, 0.0)).unwrap();
        assert_eq!(z.orientation, Quat::IDENTITY);
        assert_eq!(z.half_extent, Vec2::new(5.0, 7.5));

        assert_eq!(
            ApertureDesc::from_axis_aligned_box(Vec3::ZERO, Vec3::ONE).unwrap_err(),
            ApertureError::DegenerateGeometry(DegenerateReason::NonPlanar)
        );
        assert_eq!(
            ApertureDesc::from_axis_aligned_box(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)).unwrap_err(),
            ApertureError::DegenerateGeometry(DegenerateReason::NoThinAxis)
        );
    }

    #[test]
    fn projected_containment_respects_vertical_offset() {
        let mut set = ApertureSet::new();
        let desc = ApertureDesc::new(
            Vec3::ZERO,
            Quat::from_rotation_y(-FRAC_PI_2),
            Vec2::new(1.0, 2.0),
        );
        let (id, _) = set.place(Handedness::Primary, desc).unwrap();
        let aperture = set.get(id).unwrap();

        assert!(aperture.contains_projected(Vec3::new(0.0, -1.5, 0.5), 0.0));
        assert!(!aperture.contains_projected(Vec3::new(0.0, -2.5, 0.5), 0.0));
        assert!(aperture.contains_projected(Vec3::new(0.0, -2.5, 0.5), 1.0));
        assert!(!aperture.contains_projected(Vec3::new(0.0, 0.0, 1.0), 0.0));
    }
}
