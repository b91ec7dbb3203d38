//! Model sessions for meshview
//!
//! This crate drives one model through its life in a viewport:
//! - [`ModelSession`]: load, fit to view, inspection toggles, settings
//!   replay and disposal
//! - [`Camera`] and [`OrbitControls`] for the view
//! - Axes, grid and bounding-box overlays
//! - Collaborator traits with headless implementations: [`RenderBackend`],
//!   [`FrameScheduler`], [`MountTarget`] and [`SettingsStore`]

pub mod camera;
pub mod config;
pub mod controls;
pub mod error;
pub mod mount;
pub mod overlay;
pub mod progress;
pub mod renderer;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod stats;

pub use camera::*;
pub use config::*;
pub use controls::*;
pub use error::{Result, SessionError};
pub use mount::*;
pub use overlay::*;
pub use progress::*;
pub use renderer::*;
pub use scheduler::*;
pub use session::*;
pub use settings::*;
pub use stats::*;
