// Headless driver for the world renderer: configuration, camera, scripted
// input and a statistics backend.

pub mod camera;
pub mod host;
pub mod in_script;
pub mod vid_null;

use qview_common::QError;
use qview_renderer::RenderError;

/// Anything that ends a run.
#[derive(Debug)]
pub enum SysError {
    /// Configuration, file or map loading failure.
    Common(QError),
    /// Failure inside the renderer or backend.
    Render(RenderError),
}

impl std::fmt::Display for SysError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SysError::Common(err) => write!(f, "{}", err),
            SysError::Render(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for SysError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SysError::Common(err) => Some(err),
            SysError::Render(err) => Some(err),
        }
    }
}

impl From<QError> for SysError {
    fn from(err: QError) -> Self {
        SysError::Common(err)
    }
}

impl From<RenderError> for SysError {
    fn from(err: RenderError) -> Self {
        SysError::Render(err)
    }
}
