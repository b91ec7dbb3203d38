//! Fitting a model into the viewport

use meshview_core::{Aabb, Point3f, Vector3f};

/// How a model was scaled and where the camera looks at it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportFit {
    /// Uniform scale applied to the model root
    pub scale_factor: f32,
    /// Center of the model's bounds after scaling
    pub scaled_center: Point3f,
    pub scaled_half_extent: Vector3f,
}

impl ViewportFit {
    /// Scale that makes the largest dimension of `bounds` equal to
    /// `target_extent`; 1.0 for empty or degenerate bounds
    pub fn scale_for(bounds: Option<&Aabb>, target_extent: f32) -> f32 {
        let Some(bounds) = bounds else {
            return 1.0;
        };
        let extent = bounds.max_extent();
        if extent > 0.0 && extent.is_finite() {
            target_extent / extent
        } else {
            1.0
        }
    }

    /// Fit from bounds that already include the scale
    pub fn from_scaled_bounds(scale_factor: f32, scaled: Option<&Aabb>) -> Self {
        match scaled {
            Some(b) => Self {
                scale_factor,
                scaled_center: b.center(),
                scaled_half_extent: b.half_extent(),
            },
            None => Self {
                scale_factor,
                scaled_center: Point3f::origin(),
                scaled_half_extent: Vector3f::zeros(),
            },
        }
    }

    /// Scaled size of the model
    pub fn scaled_size(&self) -> Vector3f {
        self.scaled_half_extent * 2.0
    }

    /// The camera sits at the point whose coordinates are the scaled size.
    /// A model with no extent gets a camera `fallback_distance` in front of
    /// its center instead.
    pub fn camera_position(&self, fallback_distance: f32) -> Point3f {
        let size = self.scaled_size();
        let position = Point3f::from(size);
        if (position - self.scaled_center).norm() > f32::EPSILON {
            position
        } else {
            self.scaled_center + Vector3f::new(0.0, 0.0, fallback_distance)
        }
    }

    /// Bounds of the scaled model
    pub fn scaled_bounds(&self) -> Aabb {
        Aabb::new(
            self.scaled_center - self.scaled_half_extent,
            self.scaled_center + self.scaled_half_extent,
        )
    }
}
