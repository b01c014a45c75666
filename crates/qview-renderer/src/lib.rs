//! World renderer
//!
//! Everything between a loaded map and a draw call:
//! - `r_bsp`: which leaf the viewer stands in
//! - `r_vis`: PVS decoding into the surfaces to draw
//! - `r_surf`: surface edge lists compiled into vertex primitives
//! - `r_image`: palette textures expanded into RGBA mip chains
//! - `r_view`: projection and modelview matrices
//! - `r_backend`: the graphics API seam
//! - `r_main`: the per-frame loop tying them together

pub mod r_bsp;
pub mod r_vis;
pub mod r_surf;
pub mod r_image;
pub mod r_view;
pub mod r_backend;
pub mod r_main;

pub use r_backend::RenderBackend;
pub use r_image::{TextureFlags, TextureHandle, TextureSet};
pub use r_main::{Camera, FrameStats, ViewConfig, World};
pub use r_surf::{SurfacePrimitives, SurfaceVertex};

use qview_common::QError;

/// Renderer errors.
#[derive(Debug)]
pub enum RenderError {
    /// Bad or inconsistent map data.
    Map(QError),
    /// The backend refused an operation.
    Backend(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::Map(err) => write!(f, "Map error: {}", err),
            RenderError::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Map(err) => Some(err),
            RenderError::Backend(_) => None,
        }
    }
}

impl From<QError> for RenderError {
    fn from(err: QError) -> Self {
        RenderError::Map(err)
    }
}
