use std::path::PathBuf;

/// Errors surfaced by the viewer core and its backends.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    /// A text or image resource could not be fetched or decoded.
    #[error("failed to load asset {path}: {reason}")]
    AssetLoad { path: String, reason: String },

    /// The theme document was malformed or carried out-of-range values.
    #[error("malformed descriptor for theme {theme}: {reason}")]
    DescriptorParse { theme: String, reason: String },

    #[error("shader failed to compile: {0}")]
    ShaderCompile(String),

    #[error("shader program failed to link: {0}")]
    ProgramLink(String),

    #[error("unsupported sphere resolution {vertical}x{horizontal}: each axis needs 1 or more segments and the vertex count must fit in a u32")]
    InvalidMesh { vertical: u32, horizontal: u32 },

    #[error("invalid configuration in {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("render backend error: {0}")]
    Backend(String),

    #[error("failed to schedule asset load: {0}")]
    Spawn(#[from] futures::task::SpawnError),
}

impl ViewerError {
    pub(crate) fn asset(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::AssetLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Shader failures leave the viewer without a program; nothing can be drawn.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ShaderCompile(_) | Self::ProgramLink(_))
    }
}

pub type Result<T, E = ViewerError> = std::result::Result<T, E>;
