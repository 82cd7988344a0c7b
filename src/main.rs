// main.rs: window, event loop and control shell around one carpet viewer

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use carpet_viewer::config::{AppConfig, CarpetSpec, SizeCm, ViewerOptions};
use carpet_viewer::i18n::{self, tr, tr_with};
use carpet_viewer::input::{self, InputEvent, PointerTracker};
use carpet_viewer::timing::FrameTiming;
use carpet_viewer::ui::{self, Hud, RetryPrompt, UiActions, UiShell};
use carpet_viewer::{screenshot, BackendFactory, GpuRenderer, Phase, UrlFetcher, Viewer, Viewport};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use winit::{
    dpi::LogicalSize,
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, Window, WindowBuilder},
};

type GpuViewer = Viewer<GpuRenderer>;

fn open_viewer(window: &Arc<Window>, options: ViewerOptions) -> GpuViewer {
    let size = window.inner_size();
    let factory_window = window.clone();
    let factory: BackendFactory<GpuRenderer> = Box::new(move |viewport| {
        pollster::block_on(GpuRenderer::new(factory_window.clone(), viewport))
    });
    let fetcher = Arc::new(UrlFetcher::new(options.load_timeout));
    Viewer::open(
        options,
        Viewport::new(size.width, size.height),
        factory,
        fetcher,
    )
}

fn window_title(viewer: &GpuViewer) -> String {
    let base = format!("{} - {}", tr("app.title"), viewer.options().name);
    match (viewer.phase(), viewer.status().error.as_ref(), viewer.is_running()) {
        (Phase::Error, Some(err), false) => {
            format!("{base} - {}", tr_with("error.context", &[("err", err.clone())]))
        }
        _ => base,
    }
}

fn save_screenshot(viewer: &mut GpuViewer, hud: &mut Hud) {
    let Some(bytes) = viewer
        .take_screenshot()
        .and_then(|url| screenshot::decode_data_url(&url))
    else {
        hud.notice = Some(tr("screenshot.failed"));
        return;
    };
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let path = PathBuf::from(format!("carpet-{stamp}.png"));
    match std::fs::write(&path, bytes) {
        Ok(()) => {
            log::info!("screenshot written to {}", path.display());
            hud.notice = Some(tr_with(
                "screenshot.saved",
                &[("path", path.display().to_string())],
            ));
        }
        Err(err) => {
            log::error!("failed to write {}: {err}", path.display());
            hud.notice = Some(tr("screenshot.failed"));
        }
    }
}

/// Reopens the viewer with new options; the old one releases its surface first.
fn reopen(window: &Arc<Window>, viewer: &mut GpuViewer, options: ViewerOptions) {
    viewer.close();
    *viewer = open_viewer(window, options);
}

/// Returns true when the viewer got a fresh rendering context.
fn apply_actions(
    actions: UiActions,
    window: &Arc<Window>,
    viewer: &mut GpuViewer,
    hud: &mut Hud,
    control_flow: &mut ControlFlow,
) -> bool {
    if actions.quit {
        viewer.close();
        *control_flow = ControlFlow::Exit;
        return false;
    }
    let mut replaced = false;
    if actions.reset {
        viewer.reset_view();
    }
    if actions.zoom_in {
        viewer.zoom_in();
    }
    if actions.zoom_out {
        viewer.zoom_out();
    }
    if let Some(enabled) = actions.auto_rotate {
        viewer.set_auto_rotate(enabled);
    }
    if actions.screenshot {
        save_screenshot(viewer, hud);
    }
    if actions.toggle_fullscreen {
        hud.fullscreen = !hud.fullscreen;
        window.set_fullscreen(hud.fullscreen.then_some(Fullscreen::Borderless(None)));
    }
    if let Some(lang) = actions.lang {
        i18n::init(&lang);
    }
    if actions.retry {
        hud.notice = None;
        viewer.retry();
        replaced = true;
    }
    if let Some(path) = actions.open_image {
        let mut options = viewer.options().clone();
        let size = options
            .carpet
            .as_ref()
            .map(|c| c.size_cm)
            .or_else(|| SizeCm::new(200.0, 300.0).ok());
        if let Some(size) = size {
            if let Some(stem) = path.file_stem() {
                options.name = stem.to_string_lossy().into_owned();
            }
            options.carpet = Some(CarpetSpec::new(path.to_string_lossy(), size));
            options.fallback_image = None;
            reopen(window, viewer, options);
            replaced = true;
        }
    }
    if let Some(mode) = actions.mode {
        let options = viewer.options().clone().with_mode(mode);
        reopen(window, viewer, options);
        replaced = true;
    }
    replaced
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match AppConfig::from_env_and_args() {
        Ok(config) => config,
        Err(err) => {
            log::error!("{err}");
            std::process::exit(2);
        }
    };
    i18n::init(&config.lang);
    let options = match config.viewer_options() {
        Ok(options) => options,
        Err(err) => {
            log::error!("{err}");
            std::process::exit(2);
        }
    };

    let event_loop = EventLoop::new();
    let window = match WindowBuilder::new()
        .with_title(tr("app.title"))
        .with_inner_size(LogicalSize::new(1280, 720))
        .build(&event_loop)
    {
        Ok(window) => Arc::new(window),
        Err(err) => {
            log::error!("failed to create window: {err}");
            std::process::exit(1);
        }
    };

    let mut shell = UiShell::new(&window);
    let mut viewer = open_viewer(&window, options);
    let mut pointer = PointerTracker::default();
    let mut timing = FrameTiming::new(Instant::now());
    let mut hud = Hud::default();
    let mut prompt = RetryPrompt::default();
    let mut title = String::new();

    event_loop.run(move |event, _, control_flow| match event {
        Event::WindowEvent { event, window_id } if window_id == window.id() => {
            let egui_consumed = shell.on_event(&event);

            match &event {
                WindowEvent::CloseRequested => {
                    viewer.close();
                    *control_flow = ControlFlow::Exit;
                    return;
                }
                WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state: ElementState::Pressed,
                            virtual_keycode: Some(key),
                            ..
                        },
                    ..
                } if !shell.wants_keyboard() => {
                    if let Some(actions) = ui::shortcut(*key, viewer.camera().auto_rotate) {
                        if apply_actions(actions, &window, &mut viewer, &mut hud, control_flow) {
                            // egui textures live in the old renderer
                            shell = UiShell::new(&window);
                            prompt.reset();
                        }
                    }
                }
                _ => {}
            }

            if let Some(input) = input::translate(&event, &mut pointer) {
                // releases and resizes always reach the viewer so a drag never sticks
                let always = matches!(input, InputEvent::PointerUp | InputEvent::Resize { .. });
                if always || !egui_consumed {
                    viewer.handle_input(input);
                }
            }
        }

        Event::RedrawRequested(_) => {
            let dt = timing.tick(Instant::now());
            hud.fps = timing.fps;

            if !viewer.has_backend() {
                return;
            }
            let (overlay, actions) = shell.run(&window, &viewer, &hud);
            if let Some(backend) = viewer.backend_mut() {
                backend.set_overlay(overlay);
            }
            viewer.frame(dt);
            if actions != UiActions::default()
                && apply_actions(actions, &window, &mut viewer, &mut hud, control_flow)
            {
                shell = UiShell::new(&window);
                prompt.reset();
            }
        }

        Event::MainEventsCleared => {
            let next_title = window_title(&viewer);
            if next_title != title {
                window.set_title(&next_title);
                title = next_title;
            }
            if let Some(error) = prompt.pending(&viewer) {
                if RetryPrompt::ask(&error) {
                    log::info!("retrying after context failure");
                    viewer.retry();
                    shell = UiShell::new(&window);
                    prompt.reset();
                }
            }
            if viewer.is_running() {
                window.request_redraw();
            } else if *control_flow != ControlFlow::Exit {
                *control_flow = ControlFlow::Wait;
            }
        }

        _ => {}
    });
}
