/// Result alias for library operations.
pub type Result<T> = std::result::Result<T, VisualizerError>;

/// Failures the visualizer core can report to its caller.
///
/// None of these are fatal to the tick loop: callers convert them into a
/// user-facing message and keep drawing without the affected feature.
#[derive(Debug, thiserror::Error)]
pub enum VisualizerError {
    /// The host lacks something a feature needs (audio capture, encoder, ...).
    #[error("{0}")]
    Unsupported(String),
    #[error("invalid color '{0}', expected #RGB or #RRGGBB")]
    InvalidColor(String),
    #[error("unknown visual style '{0}'")]
    UnknownStyle(String),
    #[error("unknown resolution '{0}'")]
    UnknownResolution(String),
    #[error("palette response rejected: {0}")]
    Palette(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl VisualizerError {
    pub fn unsupported<T: Into<String>>(msg: T) -> Self {
        Self::Unsupported(msg.into())
    }
}
