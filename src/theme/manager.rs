use std::sync::Arc;

use log::{debug, error, info};

use super::catalog::ThemeCatalog;
use super::descriptor::ThemeDescriptor;
use crate::assets::DecodedImage;
use crate::error::Result;
use crate::render::{RenderBackend, TextureHandle, TextureUnit};
use crate::scene::UiState;

/// Progress of the latest theme request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    Failed,
}

/// A theme load tagged with the generation it was issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeRequest {
    pub generation: u64,
    pub name: String,
}

/// Descriptor and decoded images of a theme, fetched but not yet on the GPU.
#[derive(Debug, Clone)]
pub struct LoadedTheme {
    pub descriptor: ThemeDescriptor,
    pub images: [Arc<DecodedImage>; 3],
}

/// Outcome of a finished fetch, waiting to be committed.
#[derive(Debug)]
pub struct ThemeLoad {
    pub request: ThemeRequest,
    pub result: Result<LoadedTheme>,
}

/// The three textures of the active material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeTextures {
    pub diffuse: TextureHandle,
    pub normal: TextureHandle,
    pub specular: TextureHandle,
}

impl ThemeTextures {
    pub fn get(&self, unit: TextureUnit) -> TextureHandle {
        match unit {
            TextureUnit::Diffuse => self.diffuse,
            TextureUnit::Normal => self.normal,
            TextureUnit::Specular => self.specular,
        }
    }

    pub fn handles(&self) -> [TextureHandle; 3] {
        [self.diffuse, self.normal, self.specular]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTheme {
    pub name: String,
    pub descriptor: ThemeDescriptor,
    pub textures: ThemeTextures,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The load became the active theme.
    Activated,
    /// A newer request was issued after this one; nothing was created.
    Discarded,
    /// The load failed; the previous theme (if any) stays active.
    Failed,
}

/// Owns the active theme and decides which finished loads may replace it.
#[derive(Debug)]
pub struct ThemeManager {
    catalog: ThemeCatalog,
    generation: u64,
    state: LoadState,
    active: Option<ActiveTheme>,
}

impl ThemeManager {
    pub fn new(catalog: ThemeCatalog) -> Self {
        Self {
            catalog,
            generation: 0,
            state: LoadState::Idle,
            active: None,
        }
    }

    pub fn catalog(&self) -> &ThemeCatalog {
        &self.catalog
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn active(&self) -> Option<&ActiveTheme> {
        self.active.as_ref()
    }

    /// Starts a new request for `name`. Any request still in flight becomes
    /// stale.
    pub fn request(&mut self, name: &str, ui: &mut UiState) -> ThemeRequest {
        self.generation += 1;
        self.state = LoadState::Loading;
        ui.loading_indicator = true;
        debug!("requesting theme {name} (generation {})", self.generation);
        ThemeRequest {
            generation: self.generation,
            name: name.to_string(),
        }
    }

    /// Installs a finished load if it is still the latest request.
    ///
    /// Textures are created only for the latest request and either all three
    /// become active or none does. The previous texture set is released once
    /// the new one is installed.
    pub fn commit<B: RenderBackend + ?Sized>(
        &mut self,
        load: ThemeLoad,
        backend: &mut B,
        ui: &mut UiState,
    ) -> CommitOutcome {
        let ThemeLoad { request, result } = load;
        if request.generation != self.generation {
            debug!(
                "discarding theme {} from generation {} (latest is {})",
                request.name, request.generation, self.generation
            );
            return CommitOutcome::Discarded;
        }

        let installed = result.and_then(|loaded| {
            let textures = upload_textures(backend, &loaded.images)?;
            Ok(ActiveTheme {
                name: request.name.clone(),
                descriptor: loaded.descriptor,
                textures,
            })
        });

        match installed {
            Ok(theme) => {
                info!("activated theme {}", theme.name);
                if let Some(previous) = self.active.replace(theme) {
                    release_textures(backend, &previous.textures);
                }
                self.state = LoadState::Ready;
                ui.loading_indicator = false;
                ui.surface_visible = true;
                CommitOutcome::Activated
            }
            Err(err) => {
                error!("failed to load theme {}: {err}", request.name);
                self.state = LoadState::Failed;
                if self.active.is_some() {
                    ui.loading_indicator = false;
                }
                CommitOutcome::Failed
            }
        }
    }

    /// Releases the active textures, leaving no theme active.
    pub fn release<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        if let Some(theme) = self.active.take() {
            release_textures(backend, &theme.textures);
        }
        self.state = LoadState::Idle;
    }
}

fn upload_textures<B: RenderBackend + ?Sized>(
    backend: &mut B,
    images: &[Arc<DecodedImage>; 3],
) -> Result<ThemeTextures> {
    let mut created = Vec::with_capacity(3);
    for (unit, image) in TextureUnit::ALL.into_iter().zip(images) {
        match backend.create_texture(unit, image) {
            Ok(texture) => created.push(texture),
            Err(err) => {
                for texture in created {
                    backend.release_texture(texture);
                }
                return Err(err);
            }
        }
    }
    Ok(ThemeTextures {
        diffuse: created[0],
        normal: created[1],
        specular: created[2],
    })
}

fn release_textures<B: RenderBackend + ?Sized>(backend: &mut B, textures: &ThemeTextures) {
    for texture in textures.handles() {
        backend.release_texture(texture);
    }
}
