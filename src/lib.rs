//! # meshview
//!
//! Load 3D models, fit them into a viewport and inspect them.
//!
//! This is the umbrella crate that re-exports the workspace crates behind
//! feature flags. Use the individual crates for finer control over
//! dependencies.
//!
//! ## Features
//!
//! - **Core**: meshes, bounds, transforms, materials, the scene graph and
//!   the animation mixer
//! - **I/O**: glTF/GLB, OBJ + MTL, STL and binary FBX loaders
//! - **Viewer**: the model session with camera controls, overlays,
//!   inspection toggles and persisted settings
//!
//! ## Quick Start
//!
//! ```no_run
//! use meshview::prelude::*;
//!
//! let mount = HeadlessMount::shared(800, 600);
//! let session = ModelSession::new(mount, SourceFormat::Stl);
//! session.load("part.stl", None, LoadCallbacks::new());
//! if session.block_until_loaded() == LoadState::Loaded {
//!     session.change_wireframe(true).ok();
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: Enables io and viewer
//! - `io`: Model loaders
//! - `viewer`: Model sessions (implies `io`)
//! - `draco`: Draco-compressed glTF primitives
//! - `all`: Enables all features

// Re-export core functionality
pub use meshview_core::*;

// Re-export sub-crates
#[cfg(feature = "io")]
pub use meshview_io as io;

#[cfg(feature = "viewer")]
pub use meshview_viewer as viewer;

/// Convenient imports for common use cases
pub mod prelude {
    pub use meshview_core::{
        Aabb, Color, Material, MaterialId, ModelAsset, NodeId, SceneGraph, TriangleMesh,
    };

    #[cfg(feature = "io")]
    pub use meshview_io::{load_model, LoadError, LoadProgress, LoaderRegistry, SourceFormat};

    #[cfg(feature = "viewer")]
    pub use meshview_viewer::{
        FileStore, HeadlessMount, InteractionSettings, LoadCallbacks, LoadState, ManualScheduler,
        MemoryStore, ModelSession, ProgressSignal, SessionConfig, SessionError,
    };
}
