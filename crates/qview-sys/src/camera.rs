// camera.rs - viewer position and orientation integrator

use qview_common::q_shared::{vector_ma, Vec3};
use qview_renderer::Camera;

pub const WALKING_SPEED: f32 = 5.0;
pub const TURN_SPEED: f32 = 3.0;
pub const PITCH_SPEED: f32 = 1.0;
pub const STRAFE_SPEED: f32 = 5.0;
pub const MOUSE_SENSITIVITY: f32 = 0.3;

/// Where the viewer starts when the map has no `info_player_start`.
pub const DEFAULT_ORIGIN: Vec3 = [540.0, 260.0, 100.0];

/// Keeps an angle in [0, 360).
fn wrap_degrees(angle: f32) -> f32 {
    angle.rem_euclid(360.0)
}

/// A free-flying camera. Movement requests accumulate during a frame and
/// are applied by `update_position`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlyCamera {
    /// Degrees, 0 = +X, counter-clockwise seen from above.
    pub yaw: f32,
    /// Degrees, clamped to [-90, 90].
    pub pitch: f32,
    pub head: Vec3,
    pub view: Vec3,
    speed: f32,
    strafe: f32,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self::new(DEFAULT_ORIGIN, 90.0)
    }
}

impl FlyCamera {
    pub fn new(origin: Vec3, yaw: f32) -> Self {
        let mut camera = Self {
            yaw: wrap_degrees(yaw),
            pitch: 0.0,
            head: origin,
            view: [0.0; 3],
            speed: 0.0,
            strafe: 0.0,
        };
        camera.update_view();
        camera
    }

    fn update_view(&mut self) {
        let yaw = self.yaw.to_radians();
        let pitch = self.pitch.to_radians();
        self.view = [yaw.cos(), yaw.sin(), pitch.sin()];
    }

    /// Applies the accumulated movement, refreshes the view vector and
    /// clears the accumulators.
    pub fn update_position(&mut self) {
        let yaw = self.yaw.to_radians();
        let pitch = self.pitch.to_radians();

        if self.speed != 0.0 {
            self.head = vector_ma(&self.head, self.speed, &[yaw.cos(), yaw.sin(), pitch.sin()]);
        }

        if self.strafe != 0.0 {
            self.head = vector_ma(&self.head, self.strafe, &[yaw.sin(), -yaw.cos(), 0.0]);
        }

        self.update_view();
        self.speed = 0.0;
        self.strafe = 0.0;
    }

    /// Mouse-style pitch change.
    pub fn pitch(&mut self, degrees: f32) {
        self.pitch = (self.pitch - degrees * MOUSE_SENSITIVITY).clamp(-90.0, 90.0);
    }

    /// Mouse-style yaw change.
    pub fn yaw(&mut self, degrees: f32) {
        self.yaw = wrap_degrees(self.yaw - degrees * MOUSE_SENSITIVITY);
    }

    pub fn pitch_up(&mut self) {
        self.pitch = (self.pitch + PITCH_SPEED).min(90.0);
    }

    pub fn pitch_down(&mut self) {
        self.pitch = (self.pitch - PITCH_SPEED).max(-90.0);
    }

    pub fn move_forward(&mut self) {
        self.speed += WALKING_SPEED;
    }

    pub fn move_backward(&mut self) {
        self.speed -= WALKING_SPEED;
    }

    pub fn turn_right(&mut self) {
        self.yaw = wrap_degrees(self.yaw - TURN_SPEED);
    }

    pub fn turn_left(&mut self) {
        self.yaw = wrap_degrees(self.yaw + TURN_SPEED);
    }

    pub fn strafe_right(&mut self) {
        self.strafe += STRAFE_SPEED;
    }

    pub fn strafe_left(&mut self) {
        self.strafe -= STRAFE_SPEED;
    }
}

impl Camera for FlyCamera {
    fn position(&self) -> Vec3 {
        self.head
    }

    fn view(&self) -> Vec3 {
        self.view
    }
}
