//! Axes, grid and bounding-box helpers
//!
//! Overlays are built once per model and kept detached until a toggle
//! attaches them under the scene root. Detaching never frees them, so a
//! helper keeps its node id for the whole session.

use meshview_core::{Aabb, Color, NodeId, NodeKind, OverlayKind, Point3f, SceneGraph};

/// Outline color of the bounding-box helper
pub const BOUNDING_BOX_COLOR: Color = Color::from_hex_u32(0xFF0000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayType {
    Axes,
    Grid,
    BoundingBox,
}

impl OverlayType {
    pub const ALL: [OverlayType; 3] = [OverlayType::Axes, OverlayType::Grid, OverlayType::BoundingBox];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayHandles {
    pub axes: NodeId,
    pub grid: NodeId,
    pub bounding_box: NodeId,
}

impl OverlayHandles {
    /// Create the three helpers as detached nodes. Axes and grid are
    /// centered on `center`; the box outlines `bounds` in world space.
    pub fn build(
        scene: &mut SceneGraph,
        extent: f32,
        divisions: u32,
        center: Point3f,
        bounds: Aabb,
    ) -> Self {
        let axes = scene.create_node("AxesHelper", NodeKind::Overlay(OverlayKind::Axes { size: extent }));
        let grid = scene.create_node(
            "GridHelper",
            NodeKind::Overlay(OverlayKind::Grid {
                size: extent,
                divisions,
            }),
        );
        for id in [axes, grid] {
            if let Ok(node) = scene.node_mut(id) {
                node.transform.translation = center.coords;
            }
        }
        let bounding_box = scene.create_node(
            "BoxHelper",
            NodeKind::Overlay(OverlayKind::BoundingBox {
                bounds,
                color: BOUNDING_BOX_COLOR,
            }),
        );
        Self {
            axes,
            grid,
            bounding_box,
        }
    }

    pub fn get(&self, kind: OverlayType) -> NodeId {
        match kind {
            OverlayType::Axes => self.axes,
            OverlayType::Grid => self.grid,
            OverlayType::BoundingBox => self.bounding_box,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (OverlayType, NodeId)> + '_ {
        OverlayType::ALL.into_iter().map(move |k| (k, self.get(k)))
    }

    /// Attach or detach one helper under the scene root
    pub fn set_visible(
        &self,
        scene: &mut SceneGraph,
        kind: OverlayType,
        visible: bool,
    ) -> meshview_core::Result<()> {
        let id = self.get(kind);
        match (visible, scene.is_attached(id)) {
            (true, false) => scene.add(id),
            (false, true) => scene.detach(id),
            _ => Ok(()),
        }
    }

    pub fn is_visible(&self, scene: &SceneGraph, kind: OverlayType) -> bool {
        scene.is_attached(self.get(kind))
    }

    /// Free all three helpers
    pub fn remove(&self, scene: &mut SceneGraph) {
        for (kind, id) in self.iter() {
            if let Err(e) = scene.remove_subtree(id) {
                log::debug!("removing {:?} overlay: {}", kind, e);
            }
        }
    }
}

/// Line segments an overlay draws
pub fn segment_count(kind: &OverlayKind) -> usize {
    match kind {
        OverlayKind::Axes { .. } => 3,
        OverlayKind::Grid { divisions, .. } => 2 * (*divisions as usize + 1),
        OverlayKind::BoundingBox { .. } => 12,
    }
}
