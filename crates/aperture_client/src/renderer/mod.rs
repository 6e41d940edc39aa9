pub mod backend;
pub mod frustum;
pub mod indexed;
pub mod recursive;
pub mod scene;
pub mod state;
pub mod wgpu_backend;

#[cfg(test)]
pub mod software;

use aperture_shared::aperture::ApertureSet;
use aperture_shared::config::{ItemClass, PortalConfig, RenderMode, MAX_RECURSION_LIMIT};
use glam::{Mat4, Vec3};
use tracing::trace;

use crate::renderer::backend::RenderBackend;
use crate::renderer::scene::Scene;

/// Camera matrices for one view. `projection` uses the OpenGL clip convention.
#[derive(Debug, Clone, Copy)]
pub struct ViewSetup {
    pub view: Mat4,
    pub projection: Mat4,
    pub eye: Vec3,
}

/// Everything a portal pass reads besides the backend.
#[derive(Debug, Clone, Copy)]
pub struct PassContext<'a> {
    pub scene: &'a Scene,
    pub apertures: &'a ApertureSet,
    pub max_recursion: u32,
    pub cull_invisible: bool,
    pub direct_view_exclusions: &'a [ItemClass],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub draw_calls: u32,
    pub deepest_level: u32,
    pub terminal_views: u32,
    pub truncated_levels: u32,
}

pub struct PortalRenderer {
    mode: RenderMode,
    max_recursion: u32,
    cull_invisible: bool,
    direct_view_exclusions: Vec<ItemClass>,
}

impl PortalRenderer {
    pub fn from_config(config: &PortalConfig) -> Self {
        Self {
            mode: config.render_mode,
            max_recursion: config.max_recursion.min(MAX_RECURSION_LIMIT),
            cull_invisible: config.cull_invisible,
            direct_view_exclusions: config.direct_view_exclusions.clone(),
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: RenderMode) {
        self.mode = mode;
    }

    pub fn max_recursion(&self) -> u32 {
        self.max_recursion
    }

    pub fn set_max_recursion(&mut self, max_recursion: u32) {
        self.max_recursion = max_recursion.min(MAX_RECURSION_LIMIT);
    }

    pub fn render<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
        scene: &Scene,
        apertures: &ApertureSet,
        setup: &ViewSetup,
    ) -> RenderStats {
        let ctx = PassContext {
            scene,
            apertures,
            max_recursion: self.max_recursion,
            cull_invisible: self.cull_invisible,
            direct_view_exclusions: &self.direct_view_exclusions,
        };
        let stats = match self.mode {
            RenderMode::Recursive => recursive::render_recursive(backend, &ctx, setup),
            RenderMode::Indexed => indexed::render_indexed(backend, &ctx, setup),
        };
        trace!(
            "Portal frame: {} draws, depth {}, {} terminal views",
            stats.draw_calls,
            stats.deepest_level,
            stats.terminal_views
        );
        stats
    }
}
