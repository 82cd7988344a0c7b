// ui.rs: egui control shell: menus, status bar, zoom buttons, error box with 2D fallback

use crate::backend::RenderBackend;
use crate::config::{ViewMode, DEFAULT_LOAD_TIMEOUT};
use crate::i18n::{self, tr, tr_with, LANGUAGES};
use crate::lifecycle::{Fallback, Phase};
use crate::renderer::Overlay;
use crate::texture::{LoadEvent, LoadHandle, TextureLoader, UrlFetcher};
use crate::viewer::Viewer;
use std::path::PathBuf;
use std::sync::Arc;
use winit::event::{VirtualKeyCode, WindowEvent};
use winit::window::Window;

/// Host-side facts the shell displays but the viewer does not own.
#[derive(Debug, Clone, Default)]
pub struct Hud {
    pub fps: f32,
    pub fullscreen: bool,
    pub notice: Option<String>,
}

/// What the user asked for during one UI pass. Applied by the host afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiActions {
    pub reset: bool,
    pub zoom_in: bool,
    pub zoom_out: bool,
    pub auto_rotate: Option<bool>,
    pub screenshot: bool,
    pub retry: bool,
    pub open_image: Option<PathBuf>,
    pub mode: Option<ViewMode>,
    pub toggle_fullscreen: bool,
    pub lang: Option<String>,
    pub quit: bool,
}

/// Keyboard shortcuts mirror the on-screen controls.
pub fn shortcut(key: VirtualKeyCode, auto_rotate: bool) -> Option<UiActions> {
    let mut actions = UiActions::default();
    match key {
        VirtualKeyCode::R => actions.reset = true,
        VirtualKeyCode::Plus | VirtualKeyCode::Equals | VirtualKeyCode::NumpadAdd => {
            actions.zoom_in = true
        }
        VirtualKeyCode::Minus | VirtualKeyCode::NumpadSubtract => actions.zoom_out = true,
        VirtualKeyCode::A => actions.auto_rotate = Some(!auto_rotate),
        VirtualKeyCode::S => actions.screenshot = true,
        VirtualKeyCode::F5 => actions.retry = true,
        VirtualKeyCode::O => {
            actions.open_image = rfd::FileDialog::new()
                .add_filter(tr("dialog.images"), &["png", "jpg", "jpeg", "webp", "bmp"])
                .pick_file();
        }
        VirtualKeyCode::F11 => actions.toggle_fullscreen = true,
        VirtualKeyCode::Escape => actions.quit = true,
        _ => return None,
    }
    Some(actions)
}

/// Adds a system CJK font as a fallback so zh-Hans renders.
fn setup_ui_fonts(ctx: &egui::Context) {
    fn try_load_font(path: &std::path::Path) -> Option<Vec<u8>> {
        let bytes = std::fs::read(path).ok()?;
        ab_glyph::FontArc::try_from_vec(bytes.clone()).ok()?;
        Some(bytes)
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    if cfg!(windows) {
        let dir = PathBuf::from(r"C:\Windows\Fonts");
        candidates.extend(["msyh.ttf", "simhei.ttf", "Deng.ttf"].map(|f| dir.join(f)));
    } else if cfg!(target_os = "macos") {
        candidates.push("/System/Library/Fonts/STHeiti Medium.ttc".into());
        candidates.push("/Library/Fonts/Arial Unicode.ttf".into());
    } else {
        for p in [
            "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
            "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
            "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
            "/usr/share/fonts/truetype/droid/DroidSansFallbackFull.ttf",
        ] {
            candidates.push(p.into());
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.join("assets").join("NotoSansSC-Regular.ttf"));
        }
    }
    candidates.push(PathBuf::from("assets").join("NotoSansSC-Regular.ttf"));

    let Some((path, bytes)) = candidates
        .into_iter()
        .find_map(|p| try_load_font(&p).map(|b| (p, b)))
    else {
        log::warn!("no CJK font found, some languages may show boxes");
        return;
    };
    log::info!("UI fallback font: {}", path.display());

    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert("cjk".to_owned(), egui::FontData::from_owned(bytes));
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        if let Some(list) = fonts.families.get_mut(&family) {
            list.push("cjk".to_owned());
        }
    }
    ctx.set_fonts(fonts);
}

/// The caller's 2D image shown in the error box, fetched in the background.
struct FallbackPreview {
    loader: TextureLoader,
    url: Option<String>,
    handle: Option<LoadHandle>,
    texture: Option<egui::TextureHandle>,
    failed: bool,
}

impl FallbackPreview {
    fn new() -> Self {
        let fetcher = Arc::new(UrlFetcher::new(DEFAULT_LOAD_TIMEOUT));
        Self {
            loader: TextureLoader::new(fetcher, DEFAULT_LOAD_TIMEOUT),
            url: None,
            handle: None,
            texture: None,
            failed: false,
        }
    }

    fn sync(&mut self, ctx: &egui::Context, fallback: &Fallback) {
        let wanted = match fallback {
            Fallback::Image(url) => Some(url.as_str()),
            _ => None,
        };
        if wanted != self.url.as_deref() {
            self.url = wanted.map(str::to_string);
            self.texture = None;
            self.failed = false;
            self.handle = wanted.map(|url| self.loader.spawn(url));
        }

        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        for event in handle.drain() {
            match event {
                LoadEvent::Loaded(img) => {
                    let size = [img.width() as usize, img.height() as usize];
                    let color = egui::ColorImage::from_rgba_unmultiplied(size, img.as_raw());
                    self.texture =
                        Some(ctx.load_texture("fallback_preview", color, egui::TextureOptions::LINEAR));
                }
                LoadEvent::Failed(err) => {
                    log::warn!("2D fallback image failed: {err}");
                    self.failed = true;
                }
                LoadEvent::Progress(_) => {}
            }
        }
        if handle.is_finished() {
            self.handle = None;
        }
    }
}

/// Native dialog for a window without a rendering context. There is no egui
/// error box to click then, so the retry is offered once per failed attempt.
#[derive(Debug, Default)]
pub struct RetryPrompt {
    shown: bool,
}

impl RetryPrompt {
    /// The context error to ask about, if it has not been asked about yet.
    pub fn pending<B: RenderBackend>(&mut self, viewer: &Viewer<B>) -> Option<String> {
        if viewer.has_backend() || viewer.phase() != Phase::Error {
            self.shown = false;
            return None;
        }
        if self.shown {
            return None;
        }
        self.shown = true;
        viewer.status().error.clone()
    }

    /// Call after a new attempt so its failure is offered again.
    pub fn reset(&mut self) {
        self.shown = false;
    }

    /// Blocks until the user answers. True means retry.
    pub fn ask(error: &str) -> bool {
        let answer = rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Error)
            .set_title(tr("error.title"))
            .set_description(tr_with("error.context_prompt", &[("err", error.to_string())]))
            .set_buttons(rfd::MessageButtons::YesNo)
            .show();
        answer == rfd::MessageDialogResult::Yes
    }
}

pub struct UiShell {
    ctx: egui::Context,
    state: egui_winit::State,
    fallback: FallbackPreview,
}

impl UiShell {
    pub fn new(window: &Window) -> Self {
        let ctx = egui::Context::default();
        setup_ui_fonts(&ctx);
        let mut state = egui_winit::State::new(window);
        state.set_pixels_per_point(window.scale_factor() as f32);
        Self {
            ctx,
            state,
            fallback: FallbackPreview::new(),
        }
    }

    /// True when egui used the event and the camera should not see it.
    pub fn on_event(&mut self, event: &WindowEvent<'_>) -> bool {
        self.state.on_event(&self.ctx, event).consumed
    }

    pub fn wants_keyboard(&self) -> bool {
        self.ctx.wants_keyboard_input()
    }

    pub fn run<B: RenderBackend>(
        &mut self,
        window: &Window,
        viewer: &Viewer<B>,
        hud: &Hud,
    ) -> (Overlay, UiActions) {
        self.fallback.sync(&self.ctx, &viewer.status().fallback);

        let mut actions = UiActions::default();
        let raw_input = self.state.take_egui_input(window);
        let fallback = &self.fallback;
        let full_output = self
            .ctx
            .run(raw_input, |ctx| draw_ui(ctx, viewer, hud, fallback, &mut actions));

        self.state
            .handle_platform_output(window, &self.ctx, full_output.platform_output);
        let primitives = self.ctx.tessellate(full_output.shapes);
        let overlay = Overlay {
            primitives,
            textures_delta: full_output.textures_delta,
            pixels_per_point: window.scale_factor() as f32,
        };
        (overlay, actions)
    }
}

fn mode_label(mode: ViewMode) -> String {
    match mode {
        ViewMode::Room => tr("view.mode.room"),
        ViewMode::Studio => tr("view.mode.studio"),
    }
}

fn draw_ui<B: RenderBackend>(
    ctx: &egui::Context,
    viewer: &Viewer<B>,
    hud: &Hud,
    fallback: &FallbackPreview,
    actions: &mut UiActions,
) {
    let options = viewer.options();
    let status = viewer.status();

    if options.show_controls {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button(tr("menu.file"), |ui| {
                    if ui.button(tr("menu.file.open")).clicked() {
                        actions.open_image = rfd::FileDialog::new()
                            .add_filter(tr("dialog.images"), &["png", "jpg", "jpeg", "webp", "bmp"])
                            .pick_file();
                        ui.close_menu();
                    }
                    if ui.button(tr("menu.file.screenshot")).clicked() {
                        actions.screenshot = true;
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button(tr("menu.file.quit")).clicked() {
                        actions.quit = true;
                        ui.close_menu();
                    }
                });

                ui.menu_button(tr("menu.view"), |ui| {
                    if ui.button(tr("view.reset")).clicked() {
                        actions.reset = true;
                        ui.close_menu();
                    }
                    let mut auto_rotate = viewer.camera().auto_rotate;
                    if ui.checkbox(&mut auto_rotate, tr("view.auto_rotate")).changed() {
                        actions.auto_rotate = Some(auto_rotate);
                    }
                    ui.separator();
                    for mode in [ViewMode::Room, ViewMode::Studio] {
                        if ui
                            .radio(options.mode == mode, mode_label(mode))
                            .clicked()
                            && options.mode != mode
                        {
                            actions.mode = Some(mode);
                            ui.close_menu();
                        }
                    }
                    ui.separator();
                    let label = if hud.fullscreen {
                        tr("view.fullscreen.exit")
                    } else {
                        tr("view.fullscreen.enter")
                    };
                    if ui.button(label).clicked() {
                        actions.toggle_fullscreen = true;
                        ui.close_menu();
                    }
                });

                ui.menu_button(tr("menu.language"), |ui| {
                    let current = i18n::current_lang();
                    for (code, name) in LANGUAGES {
                        if ui.radio(current == *code, *name).clicked() {
                            actions.lang = Some(code.to_string());
                            ui.close_menu();
                        }
                    }
                });
            });
        });
    }

    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            let state = viewer.camera().state();
            ui.label(tr_with("status.mode", &[("mode", mode_label(options.mode))]));
            ui.separator();
            ui.label(tr_with(
                "status.zoom",
                &[("zoom", format!("{:.0}", viewer.zoom_level()))],
            ));
            ui.separator();
            ui.label(tr_with(
                "status.angles",
                &[
                    ("theta", format!("{:.0}", state.theta.to_degrees())),
                    ("phi", format!("{:.0}", state.phi.to_degrees())),
                ],
            ));
            ui.separator();
            ui.label(tr_with("status.fps", &[("fps", format!("{:.0}", hud.fps))]));

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if status.is_loading {
                    ui.add(
                        egui::ProgressBar::new(status.loading_progress as f32 / 100.0)
                            .desired_width(160.0),
                    );
                    ui.label(tr_with(
                        "status.loading",
                        &[
                            ("name", options.name.clone()),
                            ("progress", status.loading_progress.to_string()),
                        ],
                    ));
                } else if let Some(notice) = &hud.notice {
                    ui.label(notice);
                } else if let Some(carpet) = &options.carpet {
                    ui.label(tr_with(
                        "status.ready",
                        &[
                            ("name", options.name.clone()),
                            ("width", format!("{:.0}", carpet.size_cm.width)),
                            ("height", format!("{:.0}", carpet.size_cm.height)),
                        ],
                    ));
                }
            });
        });
    });

    if options.show_controls && !status.has_error {
        egui::Area::new("view_controls")
            .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-12.0, -40.0))
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.vertical_centered(|ui| {
                        if ui.button("+").on_hover_text(tr("view.zoom_in")).clicked() {
                            actions.zoom_in = true;
                        }
                        if ui.button("−").on_hover_text(tr("view.zoom_out")).clicked() {
                            actions.zoom_out = true;
                        }
                        if ui.button("⟲").on_hover_text(tr("view.reset")).clicked() {
                            actions.reset = true;
                        }
                    });
                });
            });

        egui::Area::new("controls_hint")
            .anchor(egui::Align2::CENTER_BOTTOM, egui::vec2(0.0, -40.0))
            .interactable(false)
            .show(ctx, |ui| {
                ui.label(egui::RichText::new(tr("controls.hint")).weak());
            });
    }

    if status.has_error {
        egui::Window::new(tr("error.title"))
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                if let Some(message) = &status.error {
                    ui.label(message);
                }
                ui.add_space(8.0);
                match (&status.fallback, &fallback.texture) {
                    (Fallback::Image(_), Some(texture)) => {
                        let size = texture.size_vec2();
                        let scale = (360.0 / size.x.max(size.y)).min(1.0);
                        ui.add(egui::Image::new(egui::load::SizedTexture::new(
                            texture.id(),
                            size * scale,
                        )));
                    }
                    (Fallback::Image(_), None) if !fallback.failed => {
                        ui.label(tr("error.fallback_loading"));
                    }
                    _ => {
                        ui.label(tr("error.fallback_unavailable"));
                    }
                }
                ui.add_space(8.0);
                if ui.button(tr("error.retry")).clicked() {
                    actions.retry = true;
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Viewport;
    use crate::config::{SizeCm, ViewerOptions};
    use crate::testing::{failing_once_factory, recording_factory, wait_until, BackendStats, ScriptedFetcher};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn shortcuts_map_to_actions() {
        let zoom = shortcut(VirtualKeyCode::Equals, false).unwrap();
        assert!(zoom.zoom_in);
        assert_eq!(shortcut(VirtualKeyCode::NumpadSubtract, false).unwrap().zoom_out, true);
        assert_eq!(shortcut(VirtualKeyCode::A, true).unwrap().auto_rotate, Some(false));
        assert_eq!(shortcut(VirtualKeyCode::A, false).unwrap().auto_rotate, Some(true));
        assert!(shortcut(VirtualKeyCode::Escape, false).unwrap().quit);
        assert!(shortcut(VirtualKeyCode::Q, false).is_none());
    }

    #[test]
    fn retry_prompt_fires_once_per_context_failure() {
        let stats = Rc::new(RefCell::new(BackendStats::default()));
        let mut viewer = Viewer::open(
            ViewerOptions::default(),
            Viewport::new(320, 240),
            failing_once_factory(stats),
            Arc::new(ScriptedFetcher::ok(1, 1)),
        );
        let mut prompt = RetryPrompt::default();
        let error = prompt.pending(&viewer).unwrap();
        assert!(error.contains("no suitable GPU adapter"));
        assert!(prompt.pending(&viewer).is_none());

        prompt.reset();
        viewer.retry();
        assert!(viewer.has_backend());
        assert!(prompt.pending(&viewer).is_none());
    }

    #[test]
    fn retry_prompt_ignores_texture_errors() {
        let stats = Rc::new(RefCell::new(BackendStats::default()));
        let mut viewer = Viewer::open(
            ViewerOptions::new("rug.png", "rug", SizeCm::new(100.0, 100.0).unwrap()),
            Viewport::new(320, 240),
            recording_factory(stats, false),
            Arc::new(ScriptedFetcher::not_found()),
        );
        wait_until(&mut viewer, |v| {
            v.poll();
            v.status().has_error
        });
        assert!(RetryPrompt::default().pending(&viewer).is_none());
    }

    #[test]
    fn room_and_studio_have_labels() {
        assert_ne!(mode_label(ViewMode::Room), mode_label(ViewMode::Studio));
    }
}
