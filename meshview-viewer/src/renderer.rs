//! Render backends
//!
//! A [`RenderBackend`] draws the attached part of a [`SceneGraph`] through a
//! [`Camera`]. [`HeadlessRenderer`] does no rasterization; it walks the
//! scene the way a GPU backend would and reports what a frame contained.

use crate::camera::Camera;
use meshview_core::{Color, NodeKind, Point3f, SceneGraph};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Viewport has zero size")]
    ZeroSize,

    #[error("Render backend error: {0}")]
    Backend(String),
}

/// What one frame drew
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// 1-based frame number
    pub frame: u64,
    pub meshes: usize,
    pub triangles: usize,
    pub wireframe_meshes: usize,
    pub normal_meshes: usize,
    /// Meshes whose bounds center lies inside the view frustum
    pub visible_meshes: usize,
    pub overlays: usize,
    pub background: Color,
    pub camera_position: Point3f,
}

pub trait RenderBackend {
    fn set_size(&mut self, width: u32, height: u32);

    fn size(&self) -> (u32, u32);

    /// Color used when the scene has no background
    fn set_clear_color(&mut self, color: Color);

    fn render(&mut self, scene: &SceneGraph, camera: &Camera) -> Result<FrameReport, RenderError>;
}

#[derive(Debug, Clone)]
pub struct HeadlessRenderer {
    width: u32,
    height: u32,
    clear_color: Color,
    frames: u64,
    last: Option<FrameReport>,
}

impl HeadlessRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            clear_color: Color::BLACK,
            frames: 0,
            last: None,
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn last_frame(&self) -> Option<&FrameReport> {
        self.last.as_ref()
    }
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl RenderBackend for HeadlessRenderer {
    fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    fn render(&mut self, scene: &SceneGraph, camera: &Camera) -> Result<FrameReport, RenderError> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::ZeroSize);
        }

        let view_projection = camera.projection_matrix() * camera.view_matrix();
        let mut report = FrameReport {
            frame: self.frames + 1,
            meshes: 0,
            triangles: 0,
            wireframe_meshes: 0,
            normal_meshes: 0,
            visible_meshes: 0,
            overlays: 0,
            background: scene.background.unwrap_or(self.clear_color),
            camera_position: camera.position,
        };

        for id in scene.descendants(scene.root()) {
            let Ok(node) = scene.node(id) else {
                continue;
            };
            match &node.kind {
                NodeKind::Mesh { geometry, material } => {
                    let material = scene
                        .materials()
                        .get(*material)
                        .map_err(|e| RenderError::Backend(e.to_string()))?;
                    report.meshes += 1;
                    report.triangles += geometry.face_count();
                    if material.wireframe() {
                        report.wireframe_meshes += 1;
                    }
                    if material.is_normal_debug() {
                        report.normal_meshes += 1;
                    }
                    if let Some(bounds) = scene.world_bounds(id) {
                        let clip = view_projection.transform_point(&bounds.center());
                        if clip.coords.iter().all(|c| c.abs() <= 1.0) {
                            report.visible_meshes += 1;
                        }
                    }
                }
                NodeKind::Overlay(_) => report.overlays += 1,
                NodeKind::Group | NodeKind::Light(_) => {}
            }
        }

        self.frames = report.frame;
        self.last = Some(report.clone());
        Ok(report)
    }
}
