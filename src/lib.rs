//! Interactive 3D carpet preview: a carpet image at its real size, staged in a
//! furnished living room or on a studio floor, viewed through an orbit camera.

pub mod backend;
pub mod camera;
pub mod config;
pub mod error;
pub mod i18n;
pub mod input;
pub mod lifecycle;
pub mod mesh;
pub mod procedural;
pub mod renderer;
pub mod room;
pub mod scene;
pub mod screenshot;
pub mod studio;
pub mod texture;
pub mod timing;
pub mod ui;
pub mod viewer;

#[cfg(test)]
mod testing;

pub use backend::{FrameInput, FrameOutcome, RenderBackend, Viewport};
pub use camera::{CameraPreset, OrbitCamera};
pub use config::{AppConfig, CarpetSpec, SizeCm, ViewMode, ViewerOptions};
pub use error::{ConfigError, TextureError, ViewerError};
pub use input::{EventResponse, InputEvent};
pub use lifecycle::{Fallback, LoadStatus, Phase};
pub use renderer::GpuRenderer;
pub use texture::{ImageFetcher, UrlFetcher};
pub use viewer::{BackendFactory, Viewer};
