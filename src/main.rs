use std::env;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use log::{error, info};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, MouseButton, Touch, TouchPhase, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use globe_viewer::render::{FrameRequest, FrameScheduler, ManualScheduler, WgpuBackend};
use globe_viewer::{
    FileAssetSource, InputEvent, RecordingBackend, ThemeLoader, Viewer, ViewerConfig,
};

/// How often pending theme loads are polled while the window is idle.
const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(10);

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let mut config = ViewerConfig::load(&options.asset_root).with_context(|| {
        format!(
            "failed to read configuration from {}",
            options.asset_root.display()
        )
    })?;
    if let Some(theme) = options.theme {
        if !config.themes.contains(&theme) {
            bail!(
                "Unknown theme: {theme}. Available themes: {}",
                config.themes.join(", ")
            );
        }
        config.initial_theme = Some(theme);
    }

    if options.headless {
        return run_headless(&config, options.frames);
    }
    match run_interactive(&config) {
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!("{err}. Falling back to --headless mode (set DISPLAY to open a window).");
            run_headless(&config, options.frames)
        }
        other => other,
    }
}

fn run_headless(config: &ViewerConfig, frames: u32) -> Result<()> {
    let theme = config
        .startup_theme()
        .context("no theme to display")?
        .to_string();
    let source = Rc::new(FileAssetSource::new(&config.asset_root));
    let mut loader = ThemeLoader::new(source);
    let mut viewer = Viewer::new(RecordingBackend::new(), ManualScheduler::default(), config)
        .context("failed to set up the viewer")?;

    viewer.load_theme(&theme, &mut loader)?;
    for load in loader.wait() {
        viewer.complete_theme(load);
    }
    let Some(active) = viewer.themes.active() else {
        bail!("theme {theme} failed to load");
    };
    println!("Active theme: {}", active.name);

    let mut drawn = 0;
    for frame in 0..frames {
        if viewer.frame(f64::from(frame) / 60.0)? {
            drawn += 1;
        }
    }
    let vertices = viewer.backend.last_draw().unwrap_or(0);
    println!("Drew {drawn} frame(s) of {vertices} vertices");
    let eye = viewer.scene.camera.eye();
    println!("Camera eye: ({:.2}, {:.2}, {:.2})", eye.x, eye.y, eye.z);

    viewer.shutdown();
    Ok(())
}

fn run_interactive(config: &ViewerConfig) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| WindowInitError::from_error("event loop", err))?;
    let source = Rc::new(FileAssetSource::new(&config.asset_root));
    let mut app = GlobeApp {
        config: config.clone(),
        loader: ThemeLoader::new(source),
        viewer: None,
        window: None,
        started: Instant::now(),
        cursor: (0.0, 0.0),
        touch: None,
        title: String::new(),
        last_error: None,
    };
    event_loop
        .run_app(&mut app)
        .context("event loop terminated abnormally")?;

    if let Some(viewer) = app.viewer.as_mut() {
        viewer.shutdown();
    }
    match app.last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

type NativeViewer = Viewer<WgpuBackend, WindowScheduler>;

struct GlobeApp {
    config: ViewerConfig,
    loader: ThemeLoader,
    viewer: Option<NativeViewer>,
    window: Option<Arc<Window>>,
    started: Instant,
    cursor: (f32, f32),
    touch: Option<u64>,
    title: String,
    last_error: Option<anyhow::Error>,
}

impl GlobeApp {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title("Globe Viewer")
            .with_inner_size(LogicalSize::new(
                f64::from(self.config.window.width),
                f64::from(self.config.window.height),
            ));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );
        let backend = block_on(WgpuBackend::new(Arc::clone(&window)))?;
        let scheduler = WindowScheduler::new(Arc::clone(&window));
        let mut viewer = Viewer::new(backend, scheduler, &self.config)
            .context("failed to set up the viewer")?;
        let size = window.inner_size();
        viewer.push_event(InputEvent::Resize {
            width: size.width,
            height: size.height,
        });

        if let Some(theme) = self.config.startup_theme() {
            viewer.load_theme(theme, &mut self.loader)?;
        }
        self.window = Some(window);
        self.viewer = Some(viewer);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.last_error = Some(err);
        event_loop.exit();
    }

    fn select_theme(&mut self, index: usize) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        let Some(name) = viewer.themes.catalog().get(index).map(str::to_string) else {
            return;
        };
        if let Err(err) = viewer.load_theme(&name, &mut self.loader) {
            error!("failed to start loading theme {name}: {err}");
        }
    }

    fn cycle_theme(&mut self) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        let current = viewer.themes.active().map(|theme| theme.name.as_str());
        let Some(name) = viewer.themes.catalog().next_after(current).map(str::to_string) else {
            return;
        };
        if let Err(err) = viewer.load_theme(&name, &mut self.loader) {
            error!("failed to start loading theme {name}: {err}");
        }
    }

    fn handle_touch(&mut self, touch: Touch) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        let (x, y) = (touch.location.x as f32, touch.location.y as f32);
        match touch.phase {
            TouchPhase::Started if self.touch.is_none() => {
                self.touch = Some(touch.id);
                viewer.push_event(InputEvent::PointerDown { x, y });
            }
            TouchPhase::Moved if self.touch == Some(touch.id) => {
                viewer.push_event(InputEvent::PointerMove { x, y });
            }
            TouchPhase::Ended | TouchPhase::Cancelled if self.touch == Some(touch.id) => {
                self.touch = None;
                viewer.push_event(InputEvent::PointerUp { x, y });
            }
            _ => {}
        }
    }

    fn update_title(&mut self) {
        let (Some(viewer), Some(window)) = (self.viewer.as_ref(), self.window.as_ref()) else {
            return;
        };
        let title = match (viewer.ui().loading_indicator, viewer.themes.active()) {
            (true, _) => "Globe Viewer (loading...)".to_string(),
            (false, Some(theme)) => format!("Globe Viewer - {}", theme.name),
            (false, None) => "Globe Viewer".to_string(),
        };
        if title != self.title {
            window.set_title(&title);
            self.title = title;
        }
    }
}

impl ApplicationHandler for GlobeApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Window close requested, exiting.");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.push_event(InputEvent::Resize {
                        width: size.width,
                        height: size.height,
                    });
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as f32, position.y as f32);
                if let Some(viewer) = self.viewer.as_mut() {
                    let (x, y) = self.cursor;
                    viewer.push_event(InputEvent::PointerMove { x, y });
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                if let Some(viewer) = self.viewer.as_mut() {
                    let (x, y) = self.cursor;
                    viewer.push_event(match state {
                        ElementState::Pressed => InputEvent::PointerDown { x, y },
                        ElementState::Released => InputEvent::PointerUp { x, y },
                    });
                }
            }
            WindowEvent::Touch(touch) => self.handle_touch(touch),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                match code {
                    KeyCode::Escape => event_loop.exit(),
                    KeyCode::Tab => self.cycle_theme(),
                    code => {
                        if let Some(index) = digit_index(code) {
                            self.select_theme(index);
                        }
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                let timestamp = self.started.elapsed().as_secs_f64();
                let Some(viewer) = self.viewer.as_mut() else {
                    return;
                };
                if let Err(err) = viewer.frame(timestamp) {
                    error!("frame failed: {err}");
                    self.fail(event_loop, err.into());
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(viewer) = self.viewer.as_mut() {
            viewer.pump(&mut self.loader);
        }
        self.update_title();
        if self.loader.in_flight() > 0 {
            let deadline = Instant::now() + LOAD_POLL_INTERVAL;
            event_loop.set_control_flow(ControlFlow::WaitUntil(deadline));
        } else {
            event_loop.set_control_flow(ControlFlow::Wait);
        }
    }
}

/// Number keys 1-9 select the theme at that position.
fn digit_index(code: KeyCode) -> Option<usize> {
    const DIGITS: [KeyCode; 9] = [
        KeyCode::Digit1,
        KeyCode::Digit2,
        KeyCode::Digit3,
        KeyCode::Digit4,
        KeyCode::Digit5,
        KeyCode::Digit6,
        KeyCode::Digit7,
        KeyCode::Digit8,
        KeyCode::Digit9,
    ];
    DIGITS.iter().position(|digit| *digit == code)
}

/// Frame requests become window redraw requests. A cancelled request is
/// ignored when its redraw arrives because the loop is no longer running.
struct WindowScheduler {
    window: Arc<Window>,
    next_id: u64,
}

impl WindowScheduler {
    fn new(window: Arc<Window>) -> Self {
        Self { window, next_id: 0 }
    }
}

impl FrameScheduler for WindowScheduler {
    fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        self.window.request_redraw();
        FrameRequest(self.next_id)
    }

    fn cancel_frame(&mut self, _request: FrameRequest) {}
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

const USAGE: &str = "Usage: globe-viewer [asset-root] [--theme NAME] [--headless] [--frames N]";

#[derive(Debug, PartialEq)]
struct CliOptions {
    asset_root: PathBuf,
    theme: Option<String>,
    headless: bool,
    frames: u32,
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut asset_root = None;
        let mut theme = None;
        let mut headless = false;
        let mut frames = 60;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--headless" => headless = true,
                "--theme" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--theme needs a value. {USAGE}"))?;
                    theme = Some(value);
                }
                "--frames" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--frames needs a value. {USAGE}"))?;
                    frames = value
                        .parse()
                        .with_context(|| format!("invalid frame count {value}"))?;
                }
                "-h" | "--help" => bail!("{USAGE}"),
                other if other.starts_with('-') => {
                    bail!("Unknown argument: {other}. {USAGE}");
                }
                path if asset_root.is_none() => asset_root = Some(PathBuf::from(path)),
                extra => bail!("Unexpected argument: {extra}. {USAGE}"),
            }
        }

        Ok(Self {
            asset_root: asset_root.unwrap_or_else(|| PathBuf::from("public")),
            theme,
            headless,
            frames,
        })
    }
}
