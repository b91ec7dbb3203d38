//! Model sessions
//!
//! A [`ModelSession`] owns the lifecycle of one model in one viewport:
//!
//! 1. construction reads the persisted [`InteractionSettings`] and mounts a
//!    canvas (and optionally a stats panel) on the host surface;
//! 2. [`ModelSession::load`] decodes the model on a load thread and streams
//!    progress back over a channel that a scheduler callback drains;
//! 3. on success the model is scaled into view, overlays are built, clips
//!    are bound to the mixer, a render loop is registered and the persisted
//!    settings are replayed through the toggles;
//! 4. [`ModelSession::dispose`] cancels every registration, clears the
//!    mount and releases the model.
//!
//! `ModelSession` is a cheap handle to shared state. Scheduler callbacks
//! only hold weak references, so ticks that arrive after the last handle
//! is dropped do nothing. User callbacks never run with the state
//! borrowed and may call back into the session.

mod fit;
mod replay;
mod state;

pub use fit::ViewportFit;
pub use replay::{ReplayFn, REPLAY_TABLE};
pub use state::{LoadState, LoadedModel};

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use meshview_core::{Color, MaterialId, NodeId, Point3f, SceneGraph};
use meshview_io::{
    DefaultTransport, LoadError, LoadProgress, LoadRequest, LoaderRegistry, SourceFormat, Transport,
};

use crate::camera::Camera;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::mount::{MountChild, SharedMount};
use crate::overlay::{OverlayHandles, OverlayType};
use crate::progress::ProgressSignal;
use crate::renderer::{FrameReport, HeadlessRenderer, RenderBackend};
use crate::scheduler::{FrameScheduler, ManualScheduler};
use crate::settings::{InteractionSettings, MemoryStore, SettingsStore};

use state::{LoadEvent, SessionState};

pub type SuccessCallback = Box<dyn FnOnce(&LoadedModel)>;
pub type ProgressCallback = Box<dyn FnMut(LoadProgress)>;
pub type ErrorCallback = Box<dyn FnOnce(&SessionError)>;
pub type SettingsCallback = Rc<dyn Fn(&InteractionSettings)>;

/// Callbacks for one load
#[derive(Default)]
pub struct LoadCallbacks {
    pub on_success: Option<SuccessCallback>,
    pub on_progress: Option<ProgressCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl LoadCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, f: impl FnOnce(&LoadedModel) + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_progress(mut self, f: impl FnMut(LoadProgress) + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(&SessionError) + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

struct Shared {
    state: RefCell<SessionState>,
    callbacks: RefCell<LoadCallbacks>,
    mount: SharedMount,
    store: Rc<dyn SettingsStore>,
    scheduler: Rc<dyn FrameScheduler>,
    registry: LoaderRegistry,
    transport: Arc<dyn Transport>,
    on_settings_changed: Option<SettingsCallback>,
    settings_key: String,
}

/// Builder for [`ModelSession`]
pub struct SessionBuilder {
    mount: SharedMount,
    format: SourceFormat,
    config: SessionConfig,
    store: Option<Rc<dyn SettingsStore>>,
    scheduler: Option<Rc<dyn FrameScheduler>>,
    renderer: Option<Box<dyn RenderBackend>>,
    registry: Option<LoaderRegistry>,
    transport: Option<Arc<dyn Transport>>,
    on_settings_changed: Option<SettingsCallback>,
}

impl SessionBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Rc<dyn SettingsStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn scheduler(mut self, scheduler: Rc<dyn FrameScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn renderer(mut self, renderer: Box<dyn RenderBackend>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn registry(mut self, registry: LoaderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn on_settings_changed(mut self, f: impl Fn(&InteractionSettings) + 'static) -> Self {
        self.on_settings_changed = Some(Rc::new(f));
        self
    }

    pub fn build(self) -> ModelSession {
        let store = self.store.unwrap_or_else(|| Rc::new(MemoryStore::new()));
        let settings_key = self.config.settings_key.clone();
        let settings = InteractionSettings::load(store.as_ref(), &settings_key);
        let (width, height) = self.mount.borrow().size();
        let show_stats = self.config.show_stats;

        let renderer = self
            .renderer
            .unwrap_or_else(|| Box::new(HeadlessRenderer::new(width, height)));
        let state = SessionState::new(self.config, self.format, settings, renderer, (width, height));

        {
            let mut mount = self.mount.borrow_mut();
            mount.append_child(MountChild::Canvas { width, height });
            if show_stats {
                mount.append_child(MountChild::StatsPanel);
            }
        }
        log::debug!("{} session mounted at {}x{}", self.format, width, height);

        ModelSession {
            shared: Rc::new(Shared {
                state: RefCell::new(state),
                callbacks: RefCell::new(LoadCallbacks::default()),
                mount: self.mount,
                store,
                scheduler: self
                    .scheduler
                    .unwrap_or_else(|| Rc::new(ManualScheduler::new())),
                registry: self.registry.unwrap_or_default(),
                transport: self
                    .transport
                    .unwrap_or_else(|| Arc::new(DefaultTransport::new())),
                on_settings_changed: self.on_settings_changed,
                settings_key,
            }),
        }
    }
}

/// One model in one viewport. Cloning yields another handle to the same
/// session.
#[derive(Clone)]
pub struct ModelSession {
    shared: Rc<Shared>,
}

impl fmt::Debug for ModelSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ModelSession");
        match self.shared.state.try_borrow() {
            Ok(st) => d
                .field("format", &st.format)
                .field("load_state", &st.load_state)
                .field("disposed", &st.disposed)
                .finish(),
            Err(_) => d.finish_non_exhaustive(),
        }
    }
}

impl ModelSession {
    pub fn builder(mount: SharedMount, format: SourceFormat) -> SessionBuilder {
        SessionBuilder {
            mount,
            format,
            config: SessionConfig::default(),
            store: None,
            scheduler: None,
            renderer: None,
            registry: None,
            transport: None,
            on_settings_changed: None,
        }
    }

    /// Session with default collaborators
    pub fn new(mount: SharedMount, format: SourceFormat) -> Self {
        Self::builder(mount, format).build()
    }

    fn downgrade(&self) -> Weak<Shared> {
        Rc::downgrade(&self.shared)
    }

    fn from_weak(weak: &Weak<Shared>) -> Option<Self> {
        weak.upgrade().map(|shared| Self { shared })
    }

    /// Start loading. Only the first call on a session does anything;
    /// returns whether a load was started.
    pub fn load(&self, url: &str, material_url: Option<&str>, callbacks: LoadCallbacks) -> bool {
        let (format, tx) = {
            let mut st = self.shared.state.borrow_mut();
            if st.disposed {
                log::warn!("load({}) on a disposed session ignored", url);
                return false;
            }
            if st.load_state != LoadState::NotLoaded {
                log::warn!("session already used ({:?}), load({}) ignored", st.load_state, url);
                return false;
            }
            let (tx, rx) = flume::unbounded();
            st.url = url.to_string();
            st.load_state = LoadState::Loading;
            st.progress = ProgressSignal::Percent(0);
            st.scene.background = Some(Color::WHITE);
            st.load_events = Some(rx);
            (st.format, tx)
        };
        *self.shared.callbacks.borrow_mut() = callbacks;

        log::info!("loading {} model from {}", format, url);
        let mut request = LoadRequest::new(url);
        if let Some(material_url) = material_url {
            request = request.with_material(material_url);
        }
        let registry = self.shared.registry.clone();
        let transport = Arc::clone(&self.shared.transport);
        let spawned = std::thread::Builder::new()
            .name("meshview-load".into())
            .spawn(move || {
                let mut progress = |p: LoadProgress| {
                    let _ = tx.send(LoadEvent::Progress(p));
                };
                let result = registry.load(&request, Some(format), transport.as_ref(), &mut progress);
                // the session may be gone; nobody to tell
                let _ = tx.send(LoadEvent::Finished(result));
            });

        if let Err(e) = spawned {
            self.shared.state.borrow_mut().load_events = None;
            self.finish(Err(LoadError::Io(e)), url);
            return true;
        }

        let weak = self.downgrade();
        let handle = self.shared.scheduler.request_frames(Box::new(move |_| {
            if let Some(session) = Self::from_weak(&weak) {
                session.pump_load_events();
            }
        }));
        let mut st = self.shared.state.borrow_mut();
        st.pump = Some(handle);
        st.registrations.push(handle);
        true
    }

    /// Drain pending load events without blocking
    fn pump_load_events(&self) {
        loop {
            let rx = match self.shared.state.try_borrow() {
                Ok(st) => st.load_events.clone(),
                Err(_) => return,
            };
            let Some(rx) = rx else {
                return;
            };
            match rx.try_recv() {
                Ok(event) => self.handle_event(event),
                Err(flume::TryRecvError::Empty) => return,
                Err(flume::TryRecvError::Disconnected) => {
                    self.handle_event(LoadEvent::Finished(Err(thread_exited())));
                    return;
                }
            }
        }
    }

    /// Process load events on this thread until the load resolves
    pub fn block_until_loaded(&self) -> LoadState {
        loop {
            let rx = {
                let st = self.shared.state.borrow();
                match &st.load_events {
                    Some(rx) => rx.clone(),
                    None => return st.load_state,
                }
            };
            match rx.recv() {
                Ok(event) => self.handle_event(event),
                Err(flume::RecvError::Disconnected) => {
                    self.handle_event(LoadEvent::Finished(Err(thread_exited())));
                }
            }
        }
    }

    fn handle_event(&self, event: LoadEvent) {
        match event {
            LoadEvent::Progress(progress) => {
                {
                    let mut st = self.shared.state.borrow_mut();
                    if st.disposed {
                        return;
                    }
                    st.on_progress(&progress);
                }
                let callback = self.shared.callbacks.borrow_mut().on_progress.take();
                if let Some(mut callback) = callback {
                    callback(progress);
                    let mut callbacks = self.shared.callbacks.borrow_mut();
                    if callbacks.on_progress.is_none() {
                        callbacks.on_progress = Some(callback);
                    }
                }
            }
            LoadEvent::Finished(result) => {
                let (pump, url) = {
                    let mut st = self.shared.state.borrow_mut();
                    if st.disposed || st.load_state != LoadState::Loading {
                        log::debug!("late load result dropped");
                        st.load_events = None;
                        return;
                    }
                    st.load_events = None;
                    let pump = st.pump.take();
                    if let Some(pump) = pump {
                        st.registrations.retain(|h| *h != pump);
                    }
                    (pump, st.url.clone())
                };
                if let Some(pump) = pump {
                    self.shared.scheduler.cancel(pump);
                }
                self.finish(result, &url);
            }
        }
    }

    fn finish(&self, result: std::result::Result<meshview_core::ModelAsset, LoadError>, url: &str) {
        let installed = result.and_then(|asset| self.shared.state.borrow_mut().install(asset, url));

        match installed {
            Ok(model) => {
                let weak = self.downgrade();
                let handle = self.shared.scheduler.request_frames(Box::new(move |delta| {
                    if let Some(session) = Self::from_weak(&weak) {
                        session.tick(delta);
                    }
                }));
                self.shared.state.borrow_mut().registrations.push(handle);
                log::info!(
                    "loaded {}: {} meshes, {} triangles, {} clips",
                    url,
                    model.mesh_count,
                    model.triangle_count,
                    model.clip_names.len()
                );

                let callback = self.shared.callbacks.borrow_mut().on_success.take();
                if let Some(callback) = callback {
                    callback(&model);
                }
                replay::replay(self);
            }
            Err(e) => {
                {
                    let mut st = self.shared.state.borrow_mut();
                    st.load_state = LoadState::Failed;
                    st.progress = ProgressSignal::Failed;
                }
                log::error!("failed to load {}: {}", url, e);
                let error = SessionError::LoadFailure(e);
                let callback = self.shared.callbacks.borrow_mut().on_error.take();
                if let Some(callback) = callback {
                    callback(&error);
                }
            }
        }
    }

    fn tick(&self, delta: Duration) {
        let Ok(mut st) = self.shared.state.try_borrow_mut() else {
            log::debug!("tick skipped, session busy");
            return;
        };
        if st.disposed || st.load_state != LoadState::Loaded {
            return;
        }
        st.frame(delta);
    }

    /// Run a toggle, then persist and announce the new settings
    fn mutate(&self, name: &str, f: impl FnOnce(&mut SessionState) -> Result<()>) -> Result<()> {
        let outcome = {
            let mut st = self.shared.state.borrow_mut();
            st.ensure_ready().and_then(|_| f(&mut st)).map(|_| st.settings.clone())
        };
        match outcome {
            Ok(settings) => {
                settings.persist(self.shared.store.as_ref(), &self.shared.settings_key);
                if let Some(callback) = &self.shared.on_settings_changed {
                    callback(&settings);
                }
                Ok(())
            }
            Err(e @ SessionError::Disposed) => {
                log::debug!("{} on disposed session", name);
                Err(e)
            }
            Err(e) => {
                log::warn!("{} failed: {}", name, e);
                Err(e)
            }
        }
    }

    pub fn change_wireframe(&self, enabled: bool) -> Result<()> {
        self.mutate("change_wireframe", |st| st.set_wireframe(enabled))
    }

    pub fn change_normal(&self, enabled: bool) -> Result<()> {
        self.mutate("change_normal", |st| st.set_normal(enabled))
    }

    pub fn change_animation(&self, enabled: bool) -> Result<()> {
        self.mutate("change_animation", |st| st.set_animation(enabled))
    }

    pub fn change_axes_helper(&self, visible: bool) -> Result<()> {
        self.mutate("change_axes_helper", |st| st.set_overlay(OverlayType::Axes, visible))
    }

    pub fn change_grid_helper(&self, visible: bool) -> Result<()> {
        self.mutate("change_grid_helper", |st| st.set_overlay(OverlayType::Grid, visible))
    }

    pub fn change_bounding_box_helper(&self, visible: bool) -> Result<()> {
        self.mutate("change_bounding_box_helper", |st| {
            st.set_overlay(OverlayType::BoundingBox, visible)
        })
    }

    pub fn change_bgcolor(&self, hex: &str) -> Result<()> {
        self.mutate("change_bgcolor", |st| st.set_background(hex))
    }

    /// Camera and orbit target back to the fitted view. Not persisted.
    pub fn reset_camera(&self) -> Result<()> {
        let mut st = self.shared.state.borrow_mut();
        st.ensure_ready()?;
        let fit = st.model.as_ref().map(|m| m.fit).ok_or(SessionError::NotReady)?;
        st.apply_fit(&fit);
        Ok(())
    }

    /// New viewport size: camera aspect, renderer size and one frame
    pub fn resize(&self, width: u32, height: u32) {
        let mut st = self.shared.state.borrow_mut();
        if st.disposed || width == 0 || height == 0 {
            log::debug!("resize to {}x{} ignored", width, height);
            return;
        }
        st.camera.set_viewport(width, height);
        st.renderer.set_size(width, height);
        if st.load_state == LoadState::Loaded {
            st.render();
        }
    }

    /// Queue an orbit rotation, applied on the next tick
    pub fn orbit(&self, dx: f32, dy: f32) {
        let mut st = self.shared.state.borrow_mut();
        if !st.disposed {
            st.controls.rotate(dx, dy);
        }
    }

    pub fn pan(&self, dx: f32, dy: f32) {
        let mut st = self.shared.state.borrow_mut();
        if !st.disposed {
            let camera = st.camera.clone();
            st.controls.pan(dx, dy, &camera);
        }
    }

    pub fn zoom(&self, delta: f32) {
        let mut st = self.shared.state.borrow_mut();
        if !st.disposed {
            st.controls.zoom(delta);
        }
    }

    /// Release everything the session attached. Safe in any state; later
    /// calls do nothing.
    pub fn dispose(&self) {
        let registrations = {
            let mut st = self.shared.state.borrow_mut();
            if st.disposed {
                log::debug!("session already disposed");
                return;
            }
            st.teardown()
        };
        for handle in registrations {
            self.shared.scheduler.cancel(handle);
        }
        *self.shared.callbacks.borrow_mut() = LoadCallbacks::default();
        self.shared.mount.borrow_mut().clear_children();
        log::info!("session disposed");
    }

    pub fn load_state(&self) -> LoadState {
        self.shared.state.borrow().load_state
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.state.borrow().disposed
    }

    pub fn format(&self) -> SourceFormat {
        self.shared.state.borrow().format
    }

    pub fn settings(&self) -> InteractionSettings {
        self.shared.state.borrow().settings.clone()
    }

    pub fn settings_key(&self) -> &str {
        &self.shared.settings_key
    }

    pub fn progress(&self) -> ProgressSignal {
        self.shared.state.borrow().progress
    }

    pub fn loaded_model(&self) -> Option<LoadedModel> {
        self.shared.state.borrow().model.clone()
    }

    pub fn model_root(&self) -> Option<NodeId> {
        self.shared.state.borrow().model_root()
    }

    pub fn viewport_fit(&self) -> Option<ViewportFit> {
        self.shared.state.borrow().model.as_ref().map(|m| m.fit)
    }

    pub fn overlays(&self) -> Option<OverlayHandles> {
        self.shared.state.borrow().overlays
    }

    pub fn mesh_nodes(&self) -> Vec<NodeId> {
        self.shared.state.borrow().mesh_nodes()
    }

    /// Materials the meshes had when the model finished loading
    pub fn material_backup(&self) -> HashMap<NodeId, MaterialId> {
        self.shared.state.borrow().material_backup.clone()
    }

    pub fn animation_channels(&self) -> usize {
        self.shared.state.borrow().channels.len()
    }

    pub fn is_animating(&self) -> bool {
        self.shared.state.borrow().is_animating()
    }

    pub fn camera(&self) -> Camera {
        self.shared.state.borrow().camera.clone()
    }

    pub fn orbit_target(&self) -> Point3f {
        self.shared.state.borrow().controls.target
    }

    pub fn last_frame(&self) -> Option<FrameReport> {
        self.shared.state.borrow().last_frame.clone()
    }

    pub fn fps(&self) -> f32 {
        self.shared.state.borrow().stats.fps()
    }

    /// Fields that could not be re-applied after the load, as messages
    pub fn replay_failures(&self) -> Vec<String> {
        self.shared.state.borrow().replay_failures.clone()
    }

    fn record_replay_failure(&self, message: String) {
        self.shared.state.borrow_mut().replay_failures.push(message);
    }

    /// Read access to the scene
    pub fn with_scene<R>(&self, f: impl FnOnce(&SceneGraph) -> R) -> R {
        f(&self.shared.state.borrow().scene)
    }
}

fn thread_exited() -> LoadError {
    LoadError::Io(std::io::Error::other("load thread exited without a result"))
}
