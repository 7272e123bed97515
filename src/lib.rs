//! Core modules for the globe viewer.
//!
//! The crate exposes the mesh generator, the orbit camera, the frame loop
//! and the theme pipeline as plain building blocks. GPU access goes through
//! the [`render::RenderBackend`] trait so everything above it stays testable
//! with the headless recording backend.

pub mod app;
pub mod assets;
pub mod camera;
pub mod config;
pub mod error;
pub mod input;
pub mod mesh;
pub mod render;
pub mod scene;
pub mod theme;

pub use app::Viewer;
pub use assets::{AssetSource, DecodedImage, FileAssetSource, MemoryAssetSource};
pub use camera::OrbitCamera;
pub use config::ViewerConfig;
pub use error::{Result, ViewerError};
pub use input::{InputEvent, InputQueue, PointerDrag};
pub use mesh::{generate_sphere, SphereMesh, Vertex, VertexStream};
pub use render::{RecordingBackend, RenderBackend, RenderLoop};
pub use scene::{Scene, UiState};
pub use theme::{ThemeDescriptor, ThemeLoader, ThemeManager};
