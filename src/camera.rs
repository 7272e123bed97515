use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec3};

/// Fixed orbit radius around the globe.
pub const DEFAULT_DISTANCE: f32 = 3.0;
/// Rate of the exponential approach toward the target angles, per second.
pub const DEFAULT_DAMPING: f32 = 3.0;

/// Orbit camera looking at the origin, chasing a pointer-driven target.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    distance: f32,
    damping: f32,
    yaw: f32,
    pitch: f32,
    target_yaw: f32,
    target_pitch: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(DEFAULT_DISTANCE, DEFAULT_DAMPING)
    }
}

impl OrbitCamera {
    pub fn new(distance: f32, damping: f32) -> Self {
        Self {
            distance,
            damping,
            yaw: 0.0,
            pitch: 0.0,
            target_yaw: 0.0,
            target_pitch: 0.0,
        }
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn target_yaw(&self) -> f32 {
        self.target_yaw
    }

    pub fn target_pitch(&self) -> f32 {
        self.target_pitch
    }

    /// Sets the angles the camera drifts toward. Pitch is clamped to the
    /// poles, yaw wraps freely.
    pub fn set_target(&mut self, yaw: f32, pitch: f32) {
        self.target_yaw = yaw;
        self.target_pitch = pitch.clamp(-FRAC_PI_2, FRAC_PI_2);
    }

    /// Moves the current angles toward the target by `damping * dt` of the
    /// remaining distance. The factor is capped at one so a long frame lands
    /// on the target instead of overshooting it.
    pub fn advance(&mut self, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        let factor = (self.damping * dt).clamp(0.0, 1.0);
        self.yaw += (self.target_yaw - self.yaw) * factor;
        self.pitch += (self.target_pitch - self.pitch) * factor;
    }

    /// Eye position on the orbit sphere.
    pub fn eye(&self) -> Vec3 {
        orbit_direction(self.yaw, self.pitch) * self.distance
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), Vec3::ZERO, Vec3::Y)
    }
}

/// Unit direction for the given yaw and pitch.
pub fn orbit_direction(yaw: f32, pitch: f32) -> Vec3 {
    Vec3::new(
        yaw.cos() * pitch.cos(),
        pitch.sin(),
        yaw.sin() * pitch.cos(),
    )
}
