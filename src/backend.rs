// backend.rs: what the viewer needs from a rendering context

use crate::error::ViewerError;
use crate::scene::{NodeId, Scene};
use glam::{Mat4, Vec3};
use image::RgbaImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        if self.is_empty() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Camera data for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    pub view: Mat4,
    pub projection: Mat4,
    pub eye: Vec3,
}

/// Whether `render` actually presented an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// The surface was not ready (lost, outdated or timed out). Nothing was drawn.
    Skipped,
}

/// A rendering context exclusively owned by one viewer.
pub trait RenderBackend {
    /// Uploads geometry, materials and lights. Replaces anything uploaded before.
    fn upload_scene(&mut self, scene: &Scene) -> Result<(), ViewerError>;

    /// Re-uploads the material texture of one node after it changed in `scene`.
    fn update_node_texture(&mut self, scene: &Scene, node: NodeId) -> Result<(), ViewerError>;

    /// Frees the GPU resources of nodes that left the scene.
    fn remove_nodes(&mut self, nodes: &[NodeId]);

    fn resize(&mut self, viewport: Viewport);

    fn render(&mut self, frame: &FrameInput) -> Result<FrameOutcome, ViewerError>;

    /// The last rendered frame, or `None` when readback is not supported.
    fn read_pixels(&mut self) -> Option<RgbaImage>;

    /// Releases every GPU resource and detaches from the surface.
    fn release(&mut self);
}
