//! Mutable session state
//!
//! Everything here runs with the state borrowed; nothing in this module
//! calls user code.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use meshview_core::{
    ActionHandle, AnimationMixer, Color, HemisphereLight, LoopMode, MaterialId, ModelAsset,
    Instance, NodeId, NodeKind, NormalMaterial, SceneGraph,
};
use meshview_io::{LoadError, LoadProgress, SourceFormat};

use crate::camera::Camera;
use crate::config::SessionConfig;
use crate::controls::OrbitControls;
use crate::error::{Result, SessionError};
use crate::overlay::{OverlayHandles, OverlayType};
use crate::progress::ProgressSignal;
use crate::renderer::{FrameReport, RenderBackend};
use crate::scheduler::FrameHandle;
use crate::settings::InteractionSettings;
use crate::stats::FrameStats;

use super::fit::ViewportFit;

/// Lifecycle of a session's single model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
    Failed,
}

/// Messages from the load thread
#[derive(Debug)]
pub(crate) enum LoadEvent {
    Progress(LoadProgress),
    Finished(std::result::Result<ModelAsset, LoadError>),
}

/// Summary handed to the success callback
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModel {
    pub format: SourceFormat,
    pub url: String,
    pub root: NodeId,
    pub mesh_count: usize,
    pub triangle_count: usize,
    pub clip_names: Vec<String>,
    pub fit: ViewportFit,
}

pub(crate) struct SessionState {
    pub config: SessionConfig,
    pub format: SourceFormat,
    pub url: String,
    pub load_state: LoadState,
    pub progress: ProgressSignal,
    pub settings: InteractionSettings,
    pub scene: SceneGraph,
    pub camera: Camera,
    pub controls: OrbitControls,
    pub renderer: Box<dyn RenderBackend>,
    pub stats: FrameStats,
    pub model: Option<LoadedModel>,
    pub overlays: Option<OverlayHandles>,
    pub mixer: Option<AnimationMixer>,
    pub channels: Vec<ActionHandle>,
    pub material_backup: HashMap<NodeId, MaterialId>,
    pub debug_materials: Vec<MaterialId>,
    pub last_frame: Option<FrameReport>,
    pub replay_failures: Vec<String>,
    pub registrations: Vec<FrameHandle>,
    pub pump: Option<FrameHandle>,
    pub load_events: Option<flume::Receiver<LoadEvent>>,
    pub disposed: bool,
}

impl SessionState {
    pub fn new(
        config: SessionConfig,
        format: SourceFormat,
        settings: InteractionSettings,
        mut renderer: Box<dyn RenderBackend>,
        (width, height): (u32, u32),
    ) -> Self {
        let mut scene = SceneGraph::new();
        let light = scene.create_node(
            "HemisphereLight",
            NodeKind::Light(HemisphereLight {
                sky: Color::WHITE,
                ground: Color::from_hex_u32(0x444444),
                intensity: config.light_intensity,
            }),
        );
        if let Err(e) = scene.add(light) {
            log::warn!("adding light: {}", e);
        }

        let mut camera = Camera::perspective(config.fov_degrees, 1.0, config.near, config.far);
        camera.set_viewport(width, height);
        renderer.set_size(width, height);
        renderer.set_clear_color(config.clear_color());
        let controls = OrbitControls::default().with_damping(config.damping_factor);

        Self {
            config,
            format,
            url: String::new(),
            load_state: LoadState::NotLoaded,
            progress: ProgressSignal::Hidden,
            settings,
            scene,
            camera,
            controls,
            renderer,
            stats: FrameStats::new(),
            model: None,
            overlays: None,
            mixer: None,
            channels: Vec::new(),
            material_backup: HashMap::new(),
            debug_materials: Vec::new(),
            last_frame: None,
            replay_failures: Vec::new(),
            registrations: Vec::new(),
            pump: None,
            load_events: None,
            disposed: false,
        }
    }

    /// Guard shared by every toggle
    pub fn ensure_ready(&self) -> Result<()> {
        if self.disposed {
            return Err(SessionError::Disposed);
        }
        if self.load_state != LoadState::Loaded {
            return Err(SessionError::NotReady);
        }
        Ok(())
    }

    pub fn model_root(&self) -> Option<NodeId> {
        self.model.as_ref().map(|m| m.root)
    }

    pub fn mesh_nodes(&self) -> Vec<NodeId> {
        match self.model_root() {
            Some(root) => self.scene.mesh_nodes(root),
            None => Vec::new(),
        }
    }

    /// Put a decoded asset into the scene: fit, overlays, animation,
    /// material backup, then attach. On error nothing has been attached.
    pub fn install(&mut self, asset: ModelAsset, url: &str) -> std::result::Result<LoadedModel, LoadError> {
        let instance = self.scene.instantiate(&asset)?;
        self.install_instance(&asset, &instance, url).inspect_err(|_| {
            if let Some(overlays) = self.overlays.take() {
                overlays.remove(&mut self.scene);
            }
            if let Err(e) = self.scene.remove_subtree(instance.root) {
                log::debug!("discarding partial model: {}", e);
            }
            self.mixer = None;
            self.channels.clear();
            self.material_backup.clear();
        })
    }

    fn install_instance(
        &mut self,
        asset: &ModelAsset,
        instance: &Instance,
        url: &str,
    ) -> std::result::Result<LoadedModel, LoadError> {
        let root = instance.root;

        let bounds = self.scene.world_bounds(root);
        let scale = ViewportFit::scale_for(bounds.as_ref(), self.config.target_extent);
        self.scene.node_mut(root)?.transform.set_uniform_scale(scale);
        let scaled = self.scene.world_bounds(root);
        let fit = ViewportFit::from_scaled_bounds(scale, scaled.as_ref());
        log::debug!(
            "fit {}: scale {:.4}, center {:?}",
            url,
            scale,
            fit.scaled_center
        );

        self.overlays = Some(OverlayHandles::build(
            &mut self.scene,
            self.config.overlay_extent,
            self.config.grid_divisions,
            fit.scaled_center,
            scaled.unwrap_or_else(|| fit.scaled_bounds()),
        ));

        let mut mixer = AnimationMixer::new(root);
        self.channels = asset
            .clips
            .iter()
            .map(|clip| {
                let handle = mixer.clip_action(Arc::new(clip.clone()), &instance.nodes, &self.scene);
                mixer.set_loop(handle, LoopMode::Repeat);
                mixer.set_clamp_when_finished(handle, true);
                handle
            })
            .collect();
        self.mixer = Some(mixer);

        let mut backup = HashMap::new();
        for id in self.scene.mesh_nodes(root) {
            backup.insert(id, self.scene.mesh_material(id)?);
        }
        self.material_backup = backup;

        self.scene.add(root)?;
        self.apply_fit(&fit);

        let model = LoadedModel {
            format: self.format,
            url: url.to_string(),
            root,
            mesh_count: asset.mesh_count(),
            triangle_count: asset.triangle_count(),
            clip_names: asset.clips.iter().map(|c| c.name.clone()).collect(),
            fit,
        };
        self.model = Some(model.clone());
        self.load_state = LoadState::Loaded;
        self.progress = ProgressSignal::Hidden;
        Ok(model)
    }

    /// Camera and controller back to the fitted view
    pub fn apply_fit(&mut self, fit: &ViewportFit) {
        self.camera.position = fit.camera_position(self.config.target_extent);
        self.camera.look_at(fit.scaled_center);
        self.controls.target = fit.scaled_center;
        self.controls.reset_motion();
    }

    pub fn set_wireframe(&mut self, enabled: bool) -> Result<()> {
        let mut materials = BTreeSet::new();
        for id in self.mesh_nodes() {
            materials.insert(self.scene.mesh_material(id)?);
        }
        for id in materials {
            self.scene.materials_mut().get_mut(id)?.set_wireframe(enabled);
        }
        self.settings.wireframe = enabled;
        Ok(())
    }

    pub fn set_normal(&mut self, enabled: bool) -> Result<()> {
        let previous = std::mem::take(&mut self.debug_materials);

        if enabled {
            let wireframe = self.settings.wireframe;
            for id in self.mesh_nodes() {
                let material = self
                    .scene
                    .materials_mut()
                    .insert(NormalMaterial::inspection(wireframe));
                self.scene.set_mesh_material(id, material)?;
                self.debug_materials.push(material);
            }
        } else {
            let backup: Vec<(NodeId, MaterialId)> =
                self.material_backup.iter().map(|(n, m)| (*n, *m)).collect();
            for (node, material) in backup {
                self.scene.set_mesh_material(node, material)?;
            }
            self.set_wireframe(self.settings.wireframe)?;
        }

        for material in previous {
            self.scene.materials_mut().remove(material);
        }
        self.settings.normal = enabled;
        Ok(())
    }

    pub fn set_animation(&mut self, enabled: bool) -> Result<()> {
        if enabled && self.channels.is_empty() {
            return Err(SessionError::AnimationUnavailable);
        }
        if let Some(mixer) = self.mixer.as_mut() {
            for &handle in &self.channels {
                if enabled {
                    mixer.play(handle);
                } else {
                    mixer.stop(handle, &mut self.scene);
                }
            }
        }
        self.settings.animation = enabled;
        Ok(())
    }

    pub fn set_overlay(&mut self, kind: OverlayType, visible: bool) -> Result<()> {
        let overlays = self.overlays.ok_or(SessionError::NotReady)?;
        overlays.set_visible(&mut self.scene, kind, visible)?;
        match kind {
            OverlayType::Axes => self.settings.axes_helper = visible,
            OverlayType::Grid => self.settings.grid_helper = visible,
            OverlayType::BoundingBox => self.settings.bounding_box_helper = visible,
        }
        Ok(())
    }

    pub fn set_background(&mut self, hex: &str) -> Result<()> {
        let color = Color::parse(hex).map_err(|_| SessionError::InvalidColor(hex.to_string()))?;
        self.scene.background = Some(color);
        self.settings.bgcolor = color.to_hex();
        Ok(())
    }

    pub fn is_animating(&self) -> bool {
        match &self.mixer {
            Some(mixer) => self.channels.iter().any(|&h| mixer.is_running(h)),
            None => false,
        }
    }

    /// Record a progress event while loading
    pub fn on_progress(&mut self, progress: &LoadProgress) {
        if self.load_state == LoadState::Loading {
            self.progress = ProgressSignal::from_progress(progress, self.progress);
        }
    }

    /// One tick of the render loop
    pub fn frame(&mut self, delta: Duration) {
        if let Some(mixer) = self.mixer.as_mut() {
            mixer.update(delta.as_secs_f32(), &mut self.scene);
        }
        self.controls.update(&mut self.camera);
        self.render();
    }

    pub fn render(&mut self) {
        self.stats.begin();
        match self.renderer.render(&self.scene, &self.camera) {
            Ok(report) => self.last_frame = Some(report),
            Err(e) => log::warn!("render failed: {}", e),
        }
        self.stats.end();
    }

    /// Remove the model, its overlays and every material it used. Returns
    /// the scheduler registrations still to cancel.
    pub fn teardown(&mut self) -> Vec<FrameHandle> {
        self.disposed = true;
        self.load_events = None;
        self.pump = None;

        let mut materials: BTreeSet<MaterialId> = self.material_backup.values().copied().collect();
        materials.extend(self.debug_materials.drain(..));

        if let Some(overlays) = self.overlays.take() {
            overlays.remove(&mut self.scene);
        }
        if let Some(root) = self.model_root() {
            for id in self.scene.mesh_nodes(root) {
                if let Ok(material) = self.scene.mesh_material(id) {
                    materials.insert(material);
                }
            }
            match self.scene.remove_subtree(root) {
                Ok(n) => log::debug!("removed {} model nodes", n),
                Err(e) => log::debug!("removing model: {}", e),
            }
        }
        for material in materials {
            self.scene.materials_mut().remove(material);
        }

        self.mixer = None;
        self.channels.clear();
        self.material_backup.clear();
        std::mem::take(&mut self.registrations)
    }
}
