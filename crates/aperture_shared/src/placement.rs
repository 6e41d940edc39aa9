use std::fmt;

use glam::{Mat4, Quat, Vec2, Vec3};

use crate::aperture::{ApertureDesc, ApertureError, ApertureSet, Handedness, SurfaceId};
use crate::config::PlacementConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementRequest {
    pub handedness: Handedness,
    pub half_extent: Vec2,
}

/// Raycast hit on a rectangular surface. The surface's local +Z is its outward
/// normal and its local XY plane holds the rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    pub surface: SurfaceId,
    pub point: Vec3,
    pub surface_position: Vec3,
    pub surface_orientation: Quat,
    pub surface_half_size: Vec2,
}

impl SurfaceHit {
    fn world_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.surface_orientation, self.surface_position)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlacementError {
    SurfaceTooSmall,
    OverlapsPairedAperture,
    Degenerate(ApertureError),
}

impl fmt::Display for PlacementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SurfaceTooSmall => write!(f, "surface is smaller than the aperture"),
            Self::OverlapsPairedAperture => {
                write!(f, "aperture would overlap the opposite aperture")
            }
            Self::Degenerate(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for PlacementError {}

impl From<ApertureError> for PlacementError {
    fn from(err: ApertureError) -> Self {
        Self::Degenerate(err)
    }
}

/// Computes where an aperture lands for a raycast hit, keeping the whole
/// opening on the surface and clear of the opposite-handed aperture.
pub fn compute_placement(
    request: &PlacementRequest,
    hit: &SurfaceHit,
    apertures: &ApertureSet,
    config: &PlacementConfig,
) -> Result<ApertureDesc, PlacementError> {
    let half = request.half_extent;
    if hit.surface_half_size.x < half.x || hit.surface_half_size.y < half.y {
        return Err(PlacementError::SurfaceTooSmall);
    }

    let surface_world = hit.world_matrix();
    let mut local = surface_world.inverse().transform_point3(hit.point);
    let limit = hit.surface_half_size - half;
    local.x = local.x.clamp(-limit.x, limit.x);
    local.y = local.y.clamp(-limit.y, limit.y);
    local.z = 0.0;

    let orientation = hit.surface_orientation.normalize();
    let position =
        surface_world.transform_point3(local) + orientation * Vec3::Z * config.surface_offset;

    let desc = ApertureDesc::new(position, orientation, half).on_surface(hit.surface);
    desc.validate()?;

    if let Some(other) = apertures.by_handedness(request.handedness.other()) {
        if other.surface == Some(hit.surface) {
            let other_local = surface_world.inverse().transform_point3(other.position);
            let delta = (other_local - local).truncate().abs();
            let reach = half + other.half_extent + Vec2::splat(config.overlap_buffer);
            if delta.x < reach.x && delta.y < reach.y {
                return Err(PlacementError::OverlapsPairedAperture);
            }
        }
    }

    Ok(desc)
}
