use aperture_shared::body::BodyState;
use glam::{Mat4, Vec2, Vec3};

use crate::renderer::ViewSetup;

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 10.0, 0.0),
            yaw: -std::f32::consts::FRAC_PI_2,
            pitch: 0.0,
            fov: 70.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    const MAX_PITCH: f32 = 89.0 * std::f32::consts::PI / 180.0;

    pub fn update_look(&mut self, mouse_delta: Vec2, look_sensitivity: f32) {
        self.yaw += mouse_delta.x * look_sensitivity;
        self.pitch -= mouse_delta.y * look_sensitivity;
        self.pitch = self.pitch.clamp(-Self::MAX_PITCH, Self::MAX_PITCH);
    }

    /// Puts the eye `eye_height` above the body and looks along its facing.
    pub fn follow(&mut self, body: &BodyState, eye_height: f32) {
        self.position = body.position + Vec3::Y * eye_height;
        let forward = (body.orientation * Vec3::NEG_Z).normalize_or_zero();
        if forward == Vec3::ZERO {
            return;
        }
        self.yaw = forward.z.atan2(forward.x);
        self.pitch = forward.y.clamp(-1.0, 1.0).asin().clamp(-Self::MAX_PITCH, Self::MAX_PITCH);
    }

    pub fn forward_direction(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize_or_zero()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward_direction(), Vec3::Y)
    }

    /// OpenGL-convention projection, the form the portal passes clip against.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(
            self.fov,
            self.aspect.max(0.0001),
            self.near.max(0.0001),
            self.far.max(self.near + 0.0001),
        )
    }

    pub fn world_matrix(&self) -> Mat4 {
        self.view_matrix().inverse()
    }

    pub fn view_setup(&self) -> ViewSetup {
        ViewSetup {
            view: self.view_matrix(),
            projection: self.projection_matrix(),
            eye: self.position,
        }
    }
}
