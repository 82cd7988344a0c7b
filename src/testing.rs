// testing.rs: test doubles for the GPU backend and the image fetcher

use crate::backend::{FrameInput, FrameOutcome, RenderBackend, Viewport};
use crate::error::{TextureError, ViewerError};
use crate::scene::{NodeId, Scene};
use crate::texture::{CancelToken, ImageFetcher, LoadEvent, LoadHandle};
use crate::viewer::{BackendFactory, Viewer};
use image::{Rgba, RgbaImage};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const WAIT_LIMIT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
pub struct BackendStats {
    pub created: usize,
    /// Viewport each successfully created context was sized to.
    pub contexts: Vec<Viewport>,
    pub uploads: usize,
    pub live_nodes: usize,
    pub texture_updates: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    pub resizes: Vec<Viewport>,
    pub renders: usize,
    /// Frames still to report as skipped, as a surface that is not ready would.
    pub skip_frames: usize,
    pub last_frame: Option<FrameInput>,
    pub released: usize,
}

/// Backend that only counts what the viewer asked of it.
pub struct RecordingBackend {
    stats: Rc<RefCell<BackendStats>>,
    readback: Option<RgbaImage>,
}

impl RenderBackend for RecordingBackend {
    fn upload_scene(&mut self, scene: &Scene) -> Result<(), ViewerError> {
        let mut stats = self.stats.borrow_mut();
        stats.uploads += 1;
        stats.live_nodes = scene.mesh_ids().len();
        Ok(())
    }

    fn update_node_texture(&mut self, scene: &Scene, node: NodeId) -> Result<(), ViewerError> {
        if scene.node(node).and_then(|n| n.material()).is_none() {
            return Err(ViewerError::Render(format!("node {} has no material", node.index())));
        }
        self.stats.borrow_mut().texture_updates.push(node);
        Ok(())
    }

    fn remove_nodes(&mut self, nodes: &[NodeId]) {
        let mut stats = self.stats.borrow_mut();
        stats.live_nodes = stats.live_nodes.saturating_sub(nodes.len());
        stats.removed.extend_from_slice(nodes);
    }

    fn resize(&mut self, viewport: Viewport) {
        self.stats.borrow_mut().resizes.push(viewport);
    }

    fn render(&mut self, frame: &FrameInput) -> Result<FrameOutcome, ViewerError> {
        let mut stats = self.stats.borrow_mut();
        if stats.skip_frames > 0 {
            stats.skip_frames -= 1;
            return Ok(FrameOutcome::Skipped);
        }
        stats.renders += 1;
        stats.last_frame = Some(*frame);
        Ok(FrameOutcome::Presented)
    }

    fn read_pixels(&mut self) -> Option<RgbaImage> {
        self.readback.clone()
    }

    fn release(&mut self) {
        let mut stats = self.stats.borrow_mut();
        stats.released += 1;
        stats.live_nodes = 0;
    }
}

pub fn recording_factory(
    stats: Rc<RefCell<BackendStats>>,
    readback: bool,
) -> BackendFactory<RecordingBackend> {
    Box::new(move |viewport| {
        let mut recorded = stats.borrow_mut();
        recorded.created += 1;
        recorded.contexts.push(viewport);
        drop(recorded);
        Ok(RecordingBackend {
            stats: stats.clone(),
            readback: readback.then(|| RgbaImage::from_pixel(4, 3, Rgba([90, 120, 60, 255]))),
        })
    })
}

/// Fails to create a context the first time, succeeds afterwards.
pub fn failing_once_factory(stats: Rc<RefCell<BackendStats>>) -> BackendFactory<RecordingBackend> {
    let mut inner = recording_factory(stats, false);
    let mut attempts = 0;
    Box::new(move |viewport| {
        attempts += 1;
        if attempts == 1 {
            return Err(ViewerError::Context("no suitable GPU adapter".into()));
        }
        inner(viewport)
    })
}

/// Opens a gated fetch.
#[derive(Clone, Default)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    pub fn open(&self) {
        let (open, cvar) = &*self.0;
        *open.lock().unwrap() = true;
        cvar.notify_all();
    }

    fn wait(&self, cancel: &CancelToken) {
        let (open, cvar) = &*self.0;
        let deadline = Instant::now() + WAIT_LIMIT;
        let mut guard = open.lock().unwrap();
        while !*guard && !cancel.is_cancelled() && Instant::now() < deadline {
            guard = cvar.wait_timeout(guard, Duration::from_millis(5)).unwrap().0;
        }
    }
}

enum Script {
    Ok(u32, u32),
    NotFound,
    Stalled,
    Gated(u32, u32, Gate),
}

pub struct ScriptedFetcher {
    script: Script,
}

impl ScriptedFetcher {
    pub fn ok(width: u32, height: u32) -> Self {
        Self { script: Script::Ok(width, height) }
    }

    pub fn not_found() -> Self {
        Self { script: Script::NotFound }
    }

    /// Never finishes unless cancelled.
    pub fn stalled() -> Self {
        Self { script: Script::Stalled }
    }

    /// Finishes with an image once the returned gate is opened.
    pub fn gated(width: u32, height: u32) -> (Self, Gate) {
        let gate = Gate::default();
        (
            Self {
                script: Script::Gated(width, height, gate.clone()),
            },
            gate,
        )
    }
}

fn checker(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if (x + y) % 2 == 0 {
            Rgba([170, 40, 40, 255])
        } else {
            Rgba([230, 210, 180, 255])
        }
    })
}

impl ImageFetcher for ScriptedFetcher {
    fn fetch(
        &self,
        _url: &str,
        progress: &mut dyn FnMut(f32),
        cancel: &CancelToken,
    ) -> Result<RgbaImage, TextureError> {
        match &self.script {
            Script::Ok(w, h) => {
                progress(0.5);
                Ok(checker(*w, *h))
            }
            Script::NotFound => Err(TextureError::Http { status: 404 }),
            Script::Stalled => {
                let deadline = Instant::now() + WAIT_LIMIT;
                while !cancel.is_cancelled() && Instant::now() < deadline {
                    thread::sleep(Duration::from_millis(1));
                }
                Err(TextureError::Cancelled)
            }
            Script::Gated(w, h, gate) => {
                progress(0.1);
                gate.wait(cancel);
                Ok(checker(*w, *h))
            }
        }
    }
}

/// Drains until a terminal event shows up.
pub fn wait_for_terminal(handle: &mut LoadHandle) -> Vec<LoadEvent> {
    let deadline = Instant::now() + WAIT_LIMIT;
    let mut events = Vec::new();
    while !handle.is_finished() {
        assert!(Instant::now() < deadline, "load did not finish in time");
        events.extend(handle.drain());
        thread::sleep(Duration::from_millis(1));
    }
    events
}

/// Calls `step` until it returns true.
pub fn wait_until<B: RenderBackend>(viewer: &mut Viewer<B>, mut step: impl FnMut(&mut Viewer<B>) -> bool) {
    let deadline = Instant::now() + WAIT_LIMIT;
    while !step(viewer) {
        assert!(Instant::now() < deadline, "viewer did not reach the expected state");
        thread::sleep(Duration::from_millis(1));
    }
}
