//! Core data structures for meshview
//!
//! This crate provides the scene-side types a model session drives:
//! meshes and bounding volumes, node transforms, colors, identity-keyed
//! materials, the arena scene graph, decoded model assets and the
//! animation mixer.

pub mod point;
pub mod mesh;
pub mod bounds;
pub mod transform;
pub mod color;
pub mod material;
pub mod asset;
pub mod scene;
pub mod animation;
pub mod error;

pub use point::*;
pub use mesh::*;
pub use bounds::*;
pub use transform::*;
pub use color::*;
pub use material::*;
pub use asset::*;
pub use scene::*;
pub use animation::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3, Matrix4, UnitQuaternion};

// Type aliases for easier imports
pub type Point = Point3f;
pub type Mesh = TriangleMesh;
