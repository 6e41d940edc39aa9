use std::fs;
use std::io;
use std::path::Path;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const MAX_RECURSION_LIMIT: u32 = 8;
const MIN_HALF_EXTENT: f32 = 0.01;
const MIN_CONE_ANGLE_DEG: f32 = 0.0;
const MAX_CONE_ANGLE_DEG: f32 = 89.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    Recursive,
    Indexed,
}

/// Broad class of a renderable item, used to exclude items from particular passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemClass {
    World,
    Avatar,
    Prop,
    Aperture,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunnelConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cone_angle_deg")]
    pub cone_angle_deg: f32,
    #[serde(default = "default_funnel_height")]
    pub height: f32,
    #[serde(default = "default_facing_threshold")]
    pub facing_threshold: f32,
    #[serde(default = "default_funnel_strength")]
    pub strength: f32,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cone_angle_deg: default_cone_angle_deg(),
            height: default_funnel_height(),
            facing_threshold: default_facing_threshold(),
            strength: default_funnel_strength(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeleportConfig {
    #[serde(default)]
    pub floor_height: f32,
    #[serde(default = "default_floor_tolerance")]
    pub floor_tolerance: f32,
}

impl Default for TeleportConfig {
    fn default() -> Self {
        Self {
            floor_height: 0.0,
            floor_tolerance: default_floor_tolerance(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlacementConfig {
    #[serde(default = "default_surface_offset")]
    pub surface_offset: f32,
    #[serde(default = "default_overlap_buffer")]
    pub overlap_buffer: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            surface_offset: default_surface_offset(),
            overlap_buffer: default_overlap_buffer(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WorldBounds {
    pub min: Vec3,
    pub max: Vec3,
    pub respawn: Vec3,
}

impl WorldBounds {
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortalConfig {
    #[serde(default = "default_max_recursion")]
    pub max_recursion: u32,
    #[serde(default)]
    pub render_mode: RenderMode,
    #[serde(default = "default_true")]
    pub cull_invisible: bool,
    #[serde(default = "default_aperture_half_extent")]
    pub aperture_half_extent: Vec2,
    #[serde(default)]
    pub funnel: FunnelConfig,
    #[serde(default)]
    pub teleport: TeleportConfig,
    #[serde(default)]
    pub placement: PlacementConfig,
    #[serde(default)]
    pub world_bounds: Option<WorldBounds>,
    #[serde(default = "default_direct_view_exclusions")]
    pub direct_view_exclusions: Vec<ItemClass>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            max_recursion: default_max_recursion(),
            render_mode: RenderMode::default(),
            cull_invisible: true,
            aperture_half_extent: default_aperture_half_extent(),
            funnel: FunnelConfig::default(),
            teleport: TeleportConfig::default(),
            placement: PlacementConfig::default(),
            world_bounds: None,
            direct_view_exclusions: default_direct_view_exclusions(),
        }
    }
}

impl PortalConfig {
    pub fn sanitize(mut self) -> Self {
        self.max_recursion = self.max_recursion.min(MAX_RECURSION_LIMIT);

        if !self.aperture_half_extent.is_finite() {
            warn!("Non-finite aperture half extent, using default");
            self.aperture_half_extent = default_aperture_half_extent();
        }
        self.aperture_half_extent = self.aperture_half_extent.max(Vec2::splat(MIN_HALF_EXTENT));

        self.funnel.cone_angle_deg = self
            .funnel
            .cone_angle_deg
            .clamp(MIN_CONE_ANGLE_DEG, MAX_CONE_ANGLE_DEG);
        self.funnel.height = self.funnel.height.max(0.0);
        self.funnel.facing_threshold = self.funnel.facing_threshold.clamp(-1.0, 1.0);
        self.funnel.strength = self.funnel.strength.max(0.0);

        self.teleport.floor_tolerance = self.teleport.floor_tolerance.max(0.0);
        self.placement.surface_offset = self.placement.surface_offset.max(0.0);
        self.placement.overlap_buffer = self.placement.overlap_buffer.max(0.0);

        if let Some(bounds) = self.world_bounds.as_mut() {
            let min = bounds.min.min(bounds.max);
            let max = bounds.min.max(bounds.max);
            bounds.min = min;
            bounds.max = max;
            bounds.respawn = bounds.respawn.clamp(min, max);
        }

        self.direct_view_exclusions.dedup();
        self
    }

    pub fn from_toml_str(contents: &str) -> io::Result<Self> {
        let parsed = toml::from_str::<Self>(contents).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to deserialize portal config: {e}"),
            )
        })?;
        Ok(parsed.sanitize())
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let config = self.clone().sanitize();
        let serialized = toml::to_string_pretty(&config).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to serialize portal config: {e}"),
            )
        })?;
        fs::write(path, serialized)
    }
}

fn default_true() -> bool {
    true
}

fn default_max_recursion() -> u32 {
    2
}

fn default_aperture_half_extent() -> Vec2 {
    Vec2::new(5.0, 7.5)
}

fn default_cone_angle_deg() -> f32 {
    30.0
}

fn default_funnel_height() -> f32 {
    10.0
}

fn default_facing_threshold() -> f32 {
    0.7
}

fn default_funnel_strength() -> f32 {
    0.2
}

fn default_floor_tolerance() -> f32 {
    0.02
}

fn default_surface_offset() -> f32 {
    0.01
}

fn default_overlap_buffer() -> f32 {
    4.0
}

fn default_direct_view_exclusions() -> Vec<ItemClass> {
    vec![ItemClass::Avatar]
}
