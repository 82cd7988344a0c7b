// viewer.rs: one carpet viewer session: lifecycle, render loop, camera input

use crate::backend::{FrameInput, FrameOutcome, RenderBackend, Viewport};
use crate::camera::{CameraPreset, OrbitCamera};
use crate::config::{ViewMode, ViewerOptions};
use crate::error::{TextureError, ViewerError};
use crate::input::{EventResponse, InputEvent, ListenerRegistry, TouchAction, TouchTracker};
use crate::lifecycle::{progress, Fallback, FrameLoop, LoadStatus, Phase};
use crate::room::{RoomSceneBuilder, RoomTextures};
use crate::scene::{Scene, StagedScene};
use crate::screenshot;
use crate::studio::build_studio;
use crate::texture::{load_image_file, ImageFetcher, LoadEvent, LoadHandle, TextureLoader};
use image::RgbaImage;
use std::path::Path;
use std::sync::Arc;

/// Creates a rendering context sized to the viewport. Called again on retry.
pub type BackendFactory<B> = Box<dyn FnMut(Viewport) -> Result<B, ViewerError>>;

pub struct Viewer<B: RenderBackend> {
    options: ViewerOptions,
    factory: BackendFactory<B>,
    loader: TextureLoader,
    backend: Option<B>,
    staged: Option<StagedScene>,
    camera: OrbitCamera,
    status: LoadStatus,
    phase: Phase,
    listeners: ListenerRegistry,
    touches: TouchTracker,
    frames: FrameLoop,
    pending: Option<LoadHandle>,
    viewport: Viewport,
    has_frame: bool,
}

impl<B: RenderBackend> Viewer<B> {
    /// Opens a viewer and starts initializing it. Failures end up in `status()`.
    pub fn open(
        options: ViewerOptions,
        viewport: Viewport,
        factory: BackendFactory<B>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        let loader = TextureLoader::new(fetcher, options.load_timeout);
        let mut viewer = Self {
            camera: OrbitCamera::new(CameraPreset::product()),
            options,
            factory,
            loader,
            backend: None,
            staged: None,
            status: LoadStatus::default(),
            phase: Phase::Uninitialized,
            listeners: ListenerRegistry::default(),
            touches: TouchTracker::default(),
            frames: FrameLoop::default(),
            pending: None,
            viewport,
            has_frame: false,
        };
        viewer.initialize();
        viewer
    }

    fn initialize(&mut self) {
        log::info!("opening viewer '{}' ({:?} mode)", self.options.name, self.options.mode);
        self.phase = Phase::Initializing;
        self.status.begin();

        let mut backend = match (self.factory)(self.viewport) {
            Ok(backend) => backend,
            Err(err) => {
                self.fail(err);
                return;
            }
        };
        self.status.advance(progress::CONTEXT_READY);

        let carpet = self.options.carpet.clone();
        let staged = match self.options.mode {
            ViewMode::Room => RoomSceneBuilder::new()
                .textures(self.room_textures())
                .carpet(carpet.clone())
                .build(),
            ViewMode::Studio => build_studio(carpet.as_ref()),
        };

        if let Err(err) = backend.upload_scene(&staged.scene) {
            backend.release();
            self.fail(err);
            return;
        }
        self.status.advance(progress::ENVIRONMENT_BUILT);

        self.camera = OrbitCamera::new(staged.camera);
        self.camera.auto_rotate = self.options.auto_rotate;
        self.backend = Some(backend);
        self.staged = Some(staged);

        self.listeners.register_all();
        self.frames.start();

        match carpet {
            Some(spec) => {
                self.pending = Some(self.loader.spawn(&spec.image_url));
                self.status.advance(progress::TEXTURE_STARTED);
            }
            None => self.status.advance(progress::TEXTURE_LOADED),
        }
    }

    fn room_textures(&self) -> RoomTextures {
        let load = |path: &Option<String>| -> Option<RgbaImage> {
            let path = path.as_deref()?;
            match load_image_file(Path::new(path)) {
                Ok(img) => Some(img),
                Err(err) => {
                    log::warn!("material texture {path} unusable, using placeholder: {err}");
                    None
                }
            }
        };
        let overrides = &self.options.textures;
        RoomTextures {
            wood: load(&overrides.wood),
            wall: load(&overrides.wall),
            fabric: load(&overrides.fabric),
            sky: load(&overrides.sky),
        }
    }

    fn fail(&mut self, err: ViewerError) {
        log::error!("viewer '{}': {err}", self.options.name);
        self.phase = Phase::Error;
        if let Some(mut handle) = self.pending.take() {
            handle.cancel();
        }
        let fallback = match &self.options.fallback_image {
            Some(image) => Fallback::Image(image.clone()),
            None => Fallback::Unavailable,
        };
        self.status.fail(err.to_string(), fallback);
    }

    /// Applies finished background loads. Safe to call at any time.
    pub fn poll(&mut self) {
        if self.phase == Phase::Disposed {
            return;
        }
        let Some(handle) = self.pending.as_mut() else {
            return;
        };
        let url = handle.url().to_string();
        let events = handle.drain();
        if handle.is_finished() {
            self.pending = None;
        }

        for event in events {
            match event {
                LoadEvent::Progress(fraction) => {
                    self.status.advance(progress::texture_fraction(fraction));
                }
                LoadEvent::Loaded(img) => self.apply_carpet(img),
                LoadEvent::Failed(source) => self.carpet_failed(url.clone(), source),
            }
        }
    }

    fn apply_carpet(&mut self, img: RgbaImage) {
        let (Some(staged), Some(backend)) = (self.staged.as_mut(), self.backend.as_mut()) else {
            return;
        };
        let Some(id) = staged.apply_carpet_texture(img) else {
            return;
        };
        if let Err(err) = backend.update_node_texture(&staged.scene, id) {
            self.fail(err);
            return;
        }
        self.status.advance(progress::TEXTURE_LOADED);
    }

    fn carpet_failed(&mut self, url: String, source: TextureError) {
        if let Some(staged) = self.staged.as_mut() {
            let removed = staged.remove_carpet();
            if let Some(backend) = self.backend.as_mut() {
                backend.remove_nodes(&removed);
            }
        }
        self.fail(ViewerError::Texture { url, source });
    }

    /// Runs one frame. Returns false once the frame loop has stopped.
    pub fn frame(&mut self, dt: f32) -> bool {
        if !self.frames.is_running() {
            return false;
        }
        self.poll();
        self.camera.update(dt);

        let Some(backend) = self.backend.as_mut() else {
            return false;
        };
        let input = FrameInput {
            view: self.camera.view_matrix(),
            projection: self.camera.projection_matrix(self.viewport.aspect()),
            eye: self.camera.eye(),
        };
        match backend.render(&input) {
            Ok(FrameOutcome::Presented) => {}
            // the loop keeps going; nothing counts until a frame is shown
            Ok(FrameOutcome::Skipped) => return true,
            Err(err) => {
                self.frames.stop();
                self.fail(err);
                return false;
            }
        }

        self.frames.tick();
        self.has_frame = true;
        if self.phase == Phase::Initializing && self.pending.is_none() {
            self.status.complete();
            self.phase = Phase::Ready;
            log::info!("viewer '{}' ready", self.options.name);
        }
        true
    }

    pub fn handle_input(&mut self, event: InputEvent) -> EventResponse {
        if self.phase == Phase::Disposed {
            return EventResponse::default();
        }
        // the size is tracked even without listeners so a retry after a
        // context failure builds its surface at the current window size
        let resize = matches!(event, InputEvent::Resize { .. });
        if !resize && !self.listeners.is_registered(event.kind()) {
            return EventResponse::default();
        }
        let consumed = match event {
            InputEvent::PointerDown { x, y } => {
                self.camera.on_pointer_down(x, y);
                true
            }
            InputEvent::PointerMove { x, y } => {
                let dragging = self.camera.is_dragging();
                self.camera.on_pointer_move(x, y);
                dragging
            }
            InputEvent::PointerUp => {
                self.camera.on_pointer_up();
                false
            }
            InputEvent::Touch { id, phase, x, y } => {
                match self.touches.handle(id, phase, x, y) {
                    TouchAction::Begin { x, y } => self.camera.on_pointer_down(x, y),
                    TouchAction::Move { x, y } => self.camera.on_pointer_move(x, y),
                    TouchAction::End => self.camera.on_pointer_up(),
                    TouchAction::Ignore => {}
                }
                true
            }
            InputEvent::Wheel { delta_y } => {
                self.camera.on_wheel(delta_y);
                true
            }
            InputEvent::Resize { width, height } => {
                self.resize(width, height);
                false
            }
        };
        EventResponse { consumed }
    }

    /// Follows the host container size. The scene is not rebuilt.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.phase == Phase::Disposed {
            return;
        }
        let viewport = Viewport::new(width, height);
        if viewport.is_empty() {
            return;
        }
        self.viewport = viewport;
        if let Some(backend) = self.backend.as_mut() {
            backend.resize(viewport);
        }
    }

    pub fn reset_view(&mut self) {
        if self.phase != Phase::Disposed {
            self.camera.reset();
        }
    }

    pub fn zoom_in(&mut self) {
        if self.phase != Phase::Disposed {
            self.camera.zoom_in();
        }
    }

    pub fn zoom_out(&mut self) {
        if self.phase != Phase::Disposed {
            self.camera.zoom_out();
        }
    }

    pub fn set_auto_rotate(&mut self, enabled: bool) {
        self.camera.auto_rotate = enabled;
    }

    /// PNG data URL of the last completed frame. `None` (with a warning) when
    /// nothing was rendered yet or the context cannot read pixels back.
    pub fn take_screenshot(&mut self) -> Option<String> {
        if !self.has_frame {
            log::warn!("screenshot requested before the first frame");
            return None;
        }
        let Some(frame) = self.backend.as_mut().and_then(|b| b.read_pixels()) else {
            log::warn!("screenshot skipped: frame readback not supported");
            return None;
        };
        match screenshot::png_data_url(&frame) {
            Ok(url) => Some(url),
            Err(err) => {
                log::warn!("screenshot encoding failed: {err}");
                None
            }
        }
    }

    /// Tears everything down and initializes again from scratch.
    pub fn retry(&mut self) {
        if self.phase == Phase::Disposed {
            return;
        }
        log::info!("retrying viewer '{}'", self.options.name);
        self.teardown();
        self.initialize();
    }

    /// Stops the loop, drops listeners and releases every GPU resource. Idempotent.
    pub fn close(&mut self) {
        if self.phase == Phase::Disposed {
            return;
        }
        self.teardown();
        self.phase = Phase::Disposed;
        log::info!("viewer '{}' closed", self.options.name);
    }

    fn teardown(&mut self) {
        self.frames.stop();
        self.listeners.clear();
        self.touches = TouchTracker::default();
        self.camera.on_pointer_up();
        if let Some(mut handle) = self.pending.take() {
            handle.cancel();
        }
        if let Some(mut backend) = self.backend.take() {
            backend.release();
        }
        self.staged = None;
        self.has_frame = false;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn zoom_level(&self) -> f32 {
        self.camera.zoom_level()
    }

    pub fn options(&self) -> &ViewerOptions {
        &self.options
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.staged.as_ref().map(|s| &s.scene)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn frame_count(&self) -> u64 {
        self.frames.count()
    }

    pub fn is_running(&self) -> bool {
        self.frames.is_running()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_mut(&mut self) -> Option<&mut B> {
        self.backend.as_mut()
    }
}

impl<B: RenderBackend> Drop for Viewer<B> {
    fn drop(&mut self) {
        self.close();
    }
}
