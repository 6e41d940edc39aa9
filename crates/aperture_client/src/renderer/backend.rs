use glam::Mat4;

use crate::renderer::scene::SceneItem;
use crate::renderer::state::RenderState;

/// Low-level drawing surface the portal passes are expressed against.
///
/// Projections handed to [`RenderBackend::render_subset`] follow the OpenGL
/// clip convention (NDC depth in [-1, 1]); backends with a different depth
/// range convert them.
pub trait RenderBackend {
    fn state(&self) -> RenderState;
    fn apply_state(&mut self, state: &RenderState);

    /// Resets depth to the far value wherever the current stencil test passes.
    /// With the stencil test disabled this clears the whole target.
    fn clear_depth(&mut self);

    fn render_subset(&mut self, items: &[&SceneItem], view: &Mat4, projection: &Mat4);
}
