//! Node transforms

use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Translation, rotation and scale of a scene node relative to its parent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeTransform {
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

impl NodeTransform {
    /// Create an identity transformation
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Create a translation transformation
    pub fn from_translation(translation: Vector3<f32>) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }

    /// Build from decomposed glTF-style parts, rotation as `[x, y, z, w]`
    pub fn from_parts(translation: [f32; 3], rotation: [f32; 4], scale: [f32; 3]) -> Self {
        let q = nalgebra::Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]);
        Self {
            translation: Vector3::from(translation),
            rotation: UnitQuaternion::from_quaternion(q),
            scale: Vector3::from(scale),
        }
    }

    /// Set the same scale factor on every axis
    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.scale = Vector3::new(scale, scale, scale);
    }

    /// Local matrix: translation * rotation * scale
    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_translation(&self.translation)
            * self.rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale)
    }

    /// Apply the transformation to a point
    pub fn transform_point(&self, point: &Point3<f32>) -> Point3<f32> {
        self.to_matrix().transform_point(point)
    }
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self::identity()
    }
}
