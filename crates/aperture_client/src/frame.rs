use aperture_shared::body::BodyId;
use aperture_shared::physics::{Aabb, PhysicsWorld};
use aperture_shared::world::{PortalWorld, TeleportEvent};
use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::camera::Camera;
use crate::renderer::backend::RenderBackend;
use crate::renderer::scene::{ItemId, Scene, QUAD_MESH};
use crate::renderer::{PortalRenderer, RenderStats};

#[derive(Debug, Clone, Copy)]
struct BodyItem {
    item: ItemId,
    half_extents: Vec3,
}

#[derive(Debug, Default)]
pub struct FrameReport {
    pub teleports: Vec<TeleportEvent>,
    pub render: RenderStats,
}

/// Runs one simulation-and-render frame: physics, portal step, scene sync,
/// camera, then the portal passes.
pub struct FrameDriver {
    renderer: PortalRenderer,
    camera: Camera,
    follow: Option<(BodyId, f32)>,
    body_items: FxHashMap<BodyId, BodyItem>,
}

impl FrameDriver {
    pub fn new(renderer: PortalRenderer, camera: Camera) -> Self {
        Self {
            renderer,
            camera,
            follow: None,
            body_items: FxHashMap::default(),
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn renderer_mut(&mut self) -> &mut PortalRenderer {
        &mut self.renderer
    }

    /// Attaches the camera to `body`, `eye_height` above its origin.
    pub fn follow_body(&mut self, body: BodyId, eye_height: f32) {
        self.follow = Some((body, eye_height));
    }

    /// Keeps `item` (a unit cube mesh) on top of `body` every frame.
    pub fn bind_body_item(&mut self, body: BodyId, item: ItemId, half_extents: Vec3) {
        self.body_items.insert(body, BodyItem { item, half_extents });
    }

    pub fn run_frame<P, B>(
        &mut self,
        physics: &mut P,
        world: &mut PortalWorld,
        scene: &mut Scene,
        backend: &mut B,
        dt: f32,
    ) -> FrameReport
    where
        P: PhysicsWorld + ?Sized,
        B: RenderBackend + ?Sized,
    {
        physics.step(dt);
        let teleports = world.step(physics);
        for event in &teleports {
            debug!(
                "Body {} passed aperture {} -> {} at t={:.3}",
                event.body.0, event.from.0, event.to.0, event.crossing_t
            );
        }

        self.sync_scene(physics, world, scene);
        if let Some((body, eye_height)) = self.follow {
            if let Some(state) = physics.body_state(body) {
                self.camera.follow(&state, eye_height);
            }
        }

        let render = self
            .renderer
            .render(backend, scene, world.apertures(), &self.camera.view_setup());
        FrameReport { teleports, render }
    }

    fn sync_scene<P: PhysicsWorld + ?Sized>(&self, physics: &P, world: &PortalWorld, scene: &mut Scene) {
        scene.sync_apertures(world.apertures(), QUAD_MESH);
        let unit = Aabb {
            min: Vec3::splat(-1.0),
            max: Vec3::splat(1.0),
        };
        for (body, bound) in &self.body_items {
            let Some(state) = physics.body_state(*body) else {
                continue;
            };
            let model = Mat4::from_scale_rotation_translation(
                bound.half_extents,
                state.orientation,
                state.position,
            );
            scene.set_model(bound.item, model, unit);
        }
    }
}
