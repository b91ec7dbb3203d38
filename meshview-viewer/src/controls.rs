//! Orbit camera controller
//!
//! Input accumulates as spherical deltas around [`OrbitControls::target`]
//! and is applied to a [`Camera`] by [`OrbitControls::update`] once per
//! frame. With damping enabled each update applies only a fraction of the
//! pending motion and decays the rest, so a drag keeps gliding for a few
//! frames after input stops.

use crate::camera::Camera;
use nalgebra::{Point3, Vector3};
use std::f32::consts::PI;

const EPSILON: f32 = 1.0e-6;

#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub enable_pan: bool,
    pub enable_zoom: bool,
    /// Radians per unit of `rotate` input
    pub rotate_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    delta_theta: f32,
    delta_phi: f32,
    pan_offset: Vector3<f32>,
    scale: f32,
}

impl OrbitControls {
    pub fn new(target: Point3<f32>) -> Self {
        Self {
            target,
            enable_damping: false,
            damping_factor: 0.05,
            enable_pan: true,
            enable_zoom: true,
            rotate_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            delta_theta: 0.0,
            delta_phi: 0.0,
            pan_offset: Vector3::zeros(),
            scale: 1.0,
        }
    }

    pub fn with_damping(mut self, factor: f32) -> Self {
        self.enable_damping = true;
        self.damping_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Queue a rotation: `dx` around the up axis, `dy` towards the poles
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.delta_theta -= dx * self.rotate_speed;
        self.delta_phi -= dy * self.rotate_speed;
    }

    /// Queue a pan. Inputs are fractions of the viewport height, so a pan of
    /// 1.0 moves the target by the visible height at the target distance.
    pub fn pan(&mut self, dx: f32, dy: f32, camera: &Camera) {
        if !self.enable_pan {
            return;
        }
        let forward = camera.target - camera.position;
        let distance = forward.norm();
        if distance < EPSILON {
            return;
        }
        let visible = 2.0 * distance * (camera.fov_degrees.to_radians() * 0.5).tan();
        let right = forward.cross(&camera.up);
        let Some(right) = right.try_normalize(EPSILON) else {
            return;
        };
        let up = right.cross(&forward).normalize();
        self.pan_offset += (-right * dx + up * dy) * visible;
    }

    /// Queue a dolly; positive values move towards the target
    pub fn zoom(&mut self, delta: f32) {
        if self.enable_zoom {
            self.scale *= 0.95f32.powf(delta);
        }
    }

    /// Drop pending motion without applying it
    pub fn reset_motion(&mut self) {
        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.pan_offset = Vector3::zeros();
        self.scale = 1.0;
    }

    pub fn has_pending_motion(&self) -> bool {
        self.delta_theta.abs() > EPSILON
            || self.delta_phi.abs() > EPSILON
            || self.pan_offset.norm() > EPSILON
            || (self.scale - 1.0).abs() > EPSILON
    }

    /// Apply pending motion to `camera`. Returns true if the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let before = camera.position;
        let factor = if self.enable_damping {
            self.damping_factor
        } else {
            1.0
        };

        let offset = camera.position - self.target;
        let radius = offset.norm();

        self.target += self.pan_offset * factor;

        if radius > EPSILON {
            let mut theta = offset.x.atan2(offset.z);
            let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();
            theta += self.delta_theta * factor;
            phi = (phi + self.delta_phi * factor).clamp(EPSILON, PI - EPSILON);
            let radius = (radius * self.scale).clamp(self.min_distance.max(EPSILON), self.max_distance);

            let sin_phi = phi.sin();
            let spherical = Vector3::new(
                radius * sin_phi * theta.sin(),
                radius * phi.cos(),
                radius * sin_phi * theta.cos(),
            );
            camera.position = self.target + spherical;
        } else {
            camera.position += self.pan_offset * factor;
        }
        camera.look_at(self.target);

        if self.enable_damping {
            let decay = 1.0 - self.damping_factor;
            self.delta_theta *= decay;
            self.delta_phi *= decay;
            self.pan_offset *= decay;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
            self.pan_offset = Vector3::zeros();
        }
        self.scale = 1.0;

        (camera.position - before).norm() > EPSILON
    }
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new(Point3::origin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera_at(z: f32) -> Camera {
        let mut camera = Camera::default();
        camera.position = Point3::new(0.0, 0.0, z);
        camera
    }

    #[test]
    fn test_idle_update_keeps_camera() {
        let mut controls = OrbitControls::default();
        let mut camera = camera_at(10.0);
        assert!(!controls.update(&mut camera));
        assert_relative_eq!(camera.position.z, 10.0, epsilon = 1e-4);
    }

    #[test]
    fn test_rotate_keeps_distance() {
        let mut controls = OrbitControls::default();
        let mut camera = camera_at(10.0);
        controls.rotate(PI / 2.0, 0.0);
        assert!(controls.update(&mut camera));
        assert_relative_eq!(camera.distance_to_target(), 10.0, epsilon = 1e-4);
        assert_relative_eq!(camera.position.x, -10.0, epsilon = 1e-3);
    }

    #[test]
    fn test_zoom_scales_distance() {
        let mut controls = OrbitControls::default();
        let mut camera = camera_at(10.0);
        controls.zoom(1.0);
        controls.update(&mut camera);
        assert_relative_eq!(camera.distance_to_target(), 9.5, epsilon = 1e-4);
    }

    #[test]
    fn test_damping_spreads_motion_over_frames() {
        let mut controls = OrbitControls::default().with_damping(0.5);
        let mut camera = camera_at(10.0);
        controls.pan(0.1, 0.0, &camera);
        controls.update(&mut camera);
        let first = controls.target.x;
        assert!(controls.has_pending_motion());
        controls.update(&mut camera);
        assert!(controls.target.x.abs() > first.abs());
    }

    #[test]
    fn test_pole_is_clamped() {
        let mut controls = OrbitControls::default();
        let mut camera = camera_at(10.0);
        controls.rotate(0.0, 10.0);
        controls.update(&mut camera);
        assert!(camera.position.y.is_finite());
        assert!(camera.position.y > 9.9);
        assert_relative_eq!(camera.distance_to_target(), 10.0, epsilon = 1e-3);
    }
}
