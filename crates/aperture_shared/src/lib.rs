pub mod aperture;
pub mod body;
pub mod collision;
pub mod config;
pub mod crossing;
pub mod funnel;
pub mod physics;
pub mod placement;
pub mod transform;
pub mod world;

pub use aperture::{Aperture, ApertureDesc, ApertureError, ApertureId, ApertureSet, Handedness, SurfaceId};
pub use body::{BodyId, BodyKind, BodyState, TrackedBody};
pub use config::PortalConfig;
pub use world::{PortalWorld, TeleportEvent};
