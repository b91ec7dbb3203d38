//! Perspective camera

use nalgebra::{Matrix4, Perspective3, Point3, Vector3};

/// A perspective camera looking at `target`
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Create a new camera
    pub fn new(
        position: Point3<f32>,
        target: Point3<f32>,
        up: Vector3<f32>,
        fov_degrees: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self {
            position,
            target,
            up,
            fov_degrees,
            aspect_ratio,
            near,
            far,
        }
    }

    /// Camera at the origin looking down -Z
    pub fn perspective(fov_degrees: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        Self::new(
            Point3::origin(),
            Point3::new(0.0, 0.0, -1.0),
            Vector3::y(),
            fov_degrees,
            aspect_ratio,
            near,
            far,
        )
    }

    /// Aspect from a viewport size; zero heights are ignored
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect_ratio = width as f32 / height as f32;
        }
    }

    pub fn look_at(&mut self, target: Point3<f32>) {
        self.target = target;
    }

    pub fn distance_to_target(&self) -> f32 {
        (self.position - self.target).norm()
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    /// Get the projection matrix
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        let perspective = Perspective3::new(
            self.aspect_ratio,
            self.fov_degrees.to_radians(),
            self.near,
            self.far,
        );
        perspective.into_inner()
    }
}

impl Default for Camera {
    fn default() -> Self {
        let mut camera = Self::perspective(50.0, 1.0, 0.1, 10000.0);
        camera.position = Point3::new(0.0, 0.0, 10.0);
        camera.target = Point3::origin();
        camera
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_viewport_aspect() {
        let mut camera = Camera::default();
        camera.set_viewport(1600, 800);
        assert_relative_eq!(camera.aspect_ratio, 2.0);
        camera.set_viewport(100, 0);
        assert_relative_eq!(camera.aspect_ratio, 2.0);
    }

    #[test]
    fn test_view_matrix_moves_target_in_front() {
        let camera = Camera::default();
        let p = camera.view_matrix().transform_point(&camera.target);
        assert_relative_eq!(p.z, -10.0, epsilon = 1e-5);
    }
}
