use log::info;

use crate::config::ViewerConfig;
use crate::error::Result;
use crate::input::{InputEvent, InputQueue};
use crate::render::{
    draw_frame, globe_shader, FrameScheduler, RenderBackend, RenderLoop, ShaderSource,
};
use crate::scene::{Scene, UiState};
use crate::theme::{CommitOutcome, ThemeLoad, ThemeLoader, ThemeManager, ThemeRequest};

/// The viewer context: scene, themes, frame loop and the backend they drive.
pub struct Viewer<B, S> {
    pub scene: Scene,
    pub themes: ThemeManager,
    pub render_loop: RenderLoop<S>,
    pub backend: B,
    input: InputQueue,
}

impl<B: RenderBackend, S: FrameScheduler> Viewer<B, S> {
    pub fn new(backend: B, scheduler: S, config: &ViewerConfig) -> Result<Self> {
        Self::with_shader(backend, scheduler, config, globe_shader())
    }

    pub fn with_shader(
        mut backend: B,
        scheduler: S,
        config: &ViewerConfig,
        shader: ShaderSource<'_>,
    ) -> Result<Self> {
        let scene = Scene::new(&mut backend, config, shader)?;
        Ok(Self {
            scene,
            themes: ThemeManager::new(config.catalog()),
            render_loop: RenderLoop::new(scheduler),
            backend,
            input: InputQueue::new(),
        })
    }

    pub fn ui(&self) -> UiState {
        self.scene.ui
    }

    /// Queues an event for the next tick. With the loop stopped there is no
    /// tick to drain the queue, so the event is applied right away.
    pub fn push_event(&mut self, event: InputEvent) {
        if self.render_loop.is_running() {
            self.input.push(event);
        } else {
            self.scene.apply_event(event, &mut self.backend);
        }
    }

    pub fn pending_events(&self) -> usize {
        self.input.len()
    }

    /// Starts a theme request without fetching anything.
    pub fn request_theme(&mut self, name: &str) -> ThemeRequest {
        self.themes.request(name, &mut self.scene.ui)
    }

    /// Starts a theme request and hands its fetch to `loader`.
    pub fn load_theme(&mut self, name: &str, loader: &mut ThemeLoader) -> Result<ThemeRequest> {
        let request = self.request_theme(name);
        loader.spawn(request.clone())?;
        Ok(request)
    }

    /// Commits a finished load; a newly active theme (re)starts the frame loop.
    pub fn complete_theme(&mut self, load: ThemeLoad) -> CommitOutcome {
        let outcome = self
            .themes
            .commit(load, &mut self.backend, &mut self.scene.ui);
        if outcome == CommitOutcome::Activated && self.render_loop.start() {
            info!("render loop started");
        }
        outcome
    }

    /// Commits every load `loader` finished since the last call.
    pub fn pump(&mut self, loader: &mut ThemeLoader) -> Vec<CommitOutcome> {
        loader
            .poll()
            .into_iter()
            .map(|load| self.complete_theme(load))
            .collect()
    }

    /// Runs one display refresh at `timestamp` seconds. Returns whether a
    /// frame was drawn.
    pub fn frame(&mut self, timestamp: f64) -> Result<bool> {
        let Some(dt) = self.render_loop.begin_tick(timestamp) else {
            return Ok(false);
        };
        for event in self.input.drain() {
            self.scene.apply_event(event, &mut self.backend);
        }
        self.scene.camera.advance(dt);

        let Some(theme) = self.themes.active() else {
            return Ok(false);
        };
        draw_frame(&mut self.backend, &self.scene, theme)?;
        Ok(true)
    }

    /// Stops the loop and releases the active textures.
    pub fn shutdown(&mut self) {
        self.render_loop.stop();
        self.themes.release(&mut self.backend);
    }
}
