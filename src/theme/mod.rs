//! Theme descriptors and the asynchronous swap of the active material.

mod catalog;
mod descriptor;
mod loader;
mod manager;

pub use catalog::{ThemeCatalog, DEFAULT_THEMES};
pub use descriptor::{
    descriptor_path, image_path, LightSettings, MaterialSettings, TextureSet, ThemeDescriptor,
};
pub use loader::{fetch_theme, ThemeLoader};
pub use manager::{
    ActiveTheme, CommitOutcome, LoadState, LoadedTheme, ThemeLoad, ThemeManager, ThemeRequest,
    ThemeTextures,
};
