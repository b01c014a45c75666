// r_backend.rs - the seam between the world renderer and a graphics API

use crate::r_image::{MipLevel, TextureHandle};
use crate::r_surf::{SurfacePrimitives, SurfaceVertex};
use crate::r_view::ViewSetup;
use crate::RenderError;

/// Draw-call sink. The renderer owns the frame loop; a backend only turns
/// the calls into API work.
pub trait RenderBackend {
    /// Receives a full mip chain, largest level first.
    fn upload_texture(
        &mut self,
        handle: TextureHandle,
        name: &str,
        levels: &[MipLevel],
    ) -> Result<(), RenderError>;

    /// Receives the compiled surface arena once after initialization.
    fn upload_surfaces(&mut self, _surfaces: &SurfacePrimitives) -> Result<(), RenderError> {
        Ok(())
    }

    /// Called at the start of each 3D rendering pass.
    fn begin_frame(&mut self, view: &ViewSetup) -> Result<(), RenderError>;

    /// `None` draws untextured.
    fn bind_texture(&mut self, handle: Option<TextureHandle>) -> Result<(), RenderError>;

    /// Draws one convex polygon with the currently bound texture.
    fn draw_polygon(&mut self, vertices: &[SurfaceVertex]) -> Result<(), RenderError>;

    /// Called at the end of each 3D rendering pass.
    fn end_frame(&mut self) -> Result<(), RenderError>;

    fn release_texture(&mut self, handle: TextureHandle);
}
