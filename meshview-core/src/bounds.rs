//! Axis-aligned bounding volumes

use crate::{mesh::*, point::*};
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3f,
    pub max: Point3f,
}

impl Aabb {
    /// Create a box from its corners
    pub fn new(min: Point3f, max: Point3f) -> Self {
        Self { min, max }
    }

    /// Smallest box enclosing all points, `None` for an empty iterator
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3f>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut aabb = Self::new(first, first);
        for p in iter {
            aabb.expand(p);
        }
        Some(aabb)
    }

    /// Grow the box to include a point
    pub fn expand(&mut self, p: &Point3f) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);

        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Union of two boxes
    pub fn union(&self, other: &Aabb) -> Aabb {
        let mut out = *self;
        out.expand(&other.min);
        out.expand(&other.max);
        out
    }

    pub fn size(&self) -> Vector3f {
        self.max - self.min
    }

    pub fn center(&self) -> Point3f {
        Point3f::from((self.min.coords + self.max.coords) * 0.5)
    }

    pub fn half_extent(&self) -> Vector3f {
        self.size() * 0.5
    }

    /// Largest edge length
    pub fn max_extent(&self) -> f32 {
        let s = self.size();
        s.x.max(s.y).max(s.z)
    }

    /// The eight corners, min corner first
    pub fn corners(&self) -> [Point3f; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3f::new(a.x, a.y, a.z),
            Point3f::new(b.x, a.y, a.z),
            Point3f::new(b.x, b.y, a.z),
            Point3f::new(a.x, b.y, a.z),
            Point3f::new(a.x, a.y, b.z),
            Point3f::new(b.x, a.y, b.z),
            Point3f::new(b.x, b.y, b.z),
            Point3f::new(a.x, b.y, b.z),
        ]
    }

    /// Box enclosing this box after an affine transform
    pub fn transformed(&self, matrix: &Matrix4<f32>) -> Aabb {
        let corners = self.corners().map(|c| matrix.transform_point(&c));
        // corners is never empty
        Aabb::from_points(corners.iter()).unwrap_or(*self)
    }
}

/// Trait for objects with a local-space bounding box
pub trait Bounded {
    /// Get the bounding box of the object, `None` when it has no extent
    fn bounding_box(&self) -> Option<Aabb>;

    /// Get the center point of the object
    fn center(&self) -> Option<Point3f> {
        self.bounding_box().map(|b| b.center())
    }
}

impl Bounded for TriangleMesh {
    fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_mesh_bounding_box() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(-1.0, 0.0, 2.0),
                Point3f::new(3.0, 4.0, -2.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let b = mesh.bounding_box().unwrap();
        assert_eq!(b.min, Point3f::new(-1.0, 0.0, -2.0));
        assert_eq!(b.max, Point3f::new(3.0, 4.0, 2.0));
        assert_eq!(b.center(), Point3f::new(1.0, 2.0, 0.0));
        assert_relative_eq!(b.max_extent(), 4.0);
    }

    #[test]
    fn test_empty_mesh_has_no_bounds() {
        assert!(TriangleMesh::new().bounding_box().is_none());
    }

    #[test]
    fn test_transformed_box_scales_and_translates() {
        let b = Aabb::new(Point3f::new(-1.0, -1.0, -1.0), Point3f::new(1.0, 1.0, 1.0));
        let m = Matrix4::new_translation(&Vector3::new(5.0, 0.0, 0.0)) * Matrix4::new_scaling(2.0);
        let t = b.transformed(&m);
        assert_relative_eq!(t.min.x, 3.0);
        assert_relative_eq!(t.max.x, 7.0);
        assert_relative_eq!(t.max.y, 2.0);
    }

    #[test]
    fn test_union() {
        let a = Aabb::new(Point3f::origin(), Point3f::new(1.0, 1.0, 1.0));
        let b = Aabb::new(Point3f::new(-2.0, 0.5, 0.0), Point3f::new(0.0, 3.0, 0.5));
        let u = a.union(&b);
        assert_eq!(u.min, Point3f::new(-2.0, 0.0, 0.0));
        assert_eq!(u.max, Point3f::new(1.0, 3.0, 1.0));
    }
}
