// r_main.rs - world setup and the per-frame loop

use log::{info, trace};

use qview_common::level::checked_index;
use qview_common::q_shared::Vec3;
use qview_common::MapData;

use crate::r_backend::RenderBackend;
use crate::r_bsp::point_in_leaf;
use crate::r_image::{TextureHandle, TextureSet};
use crate::r_surf::SurfacePrimitives;
use crate::r_view::ViewSetup;
use crate::r_vis::resolve;
use crate::RenderError;

/// Anything that can say where the viewer is and where it looks.
pub trait Camera {
    fn position(&self) -> Vec3;
    fn view(&self) -> Vec3;
}

/// Clip plane distances.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewConfig {
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            z_near: 1.0,
            z_far: 5000.0,
        }
    }
}

/// What one frame did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub leaf: usize,
    pub visible_surfaces: usize,
    pub polygons: usize,
    pub vertices: usize,
}

fn compile_surfaces<M, B>(map: &M, backend: &mut B) -> Result<SurfacePrimitives, RenderError>
where
    M: MapData + Sync + ?Sized,
    B: RenderBackend + ?Sized,
{
    let surfaces = SurfacePrimitives::build(map)?;
    backend.upload_surfaces(&surfaces)?;
    Ok(surfaces)
}

/// Derived render data for one map: compiled surfaces and uploaded textures.
pub struct World {
    surfaces: SurfacePrimitives,
    textures: TextureSet,
    width: u32,
    height: u32,
    config: ViewConfig,
    frame_count: u64,
}

impl World {
    /// Uploads every texture and compiles every surface.
    pub fn initialize<M, B>(
        map: &M,
        backend: &mut B,
        width: u32,
        height: u32,
        config: ViewConfig,
    ) -> Result<World, RenderError>
    where
        M: MapData + Sync + ?Sized,
        B: RenderBackend + ?Sized,
    {
        let mut textures = TextureSet::build(map, backend)?;

        let surfaces = match compile_surfaces(map, backend) {
            Ok(s) => s,
            Err(err) => {
                textures.release(backend);
                return Err(err);
            }
        };

        info!(
            "world ready: {} textures ({} slots), {} surfaces, {} vertices",
            textures.num_uploaded(),
            textures.len(),
            surfaces.len(),
            surfaces.num_vertices()
        );

        Ok(World {
            surfaces,
            textures,
            width,
            height,
            config,
            frame_count: 0,
        })
    }

    /// Texture bound for a surface; `None` when its texture was skipped.
    fn surface_texture<M: MapData + ?Sized>(
        &self,
        map: &M,
        surface: usize,
    ) -> Result<Option<TextureHandle>, RenderError> {
        let face = map.face(surface)?;
        let tex = map.texinfo(checked_index(face.texinfo as i64, "texinfo")?)?;
        Ok(usize::try_from(tex.miptex)
            .ok()
            .and_then(|id| self.textures.handle(id)))
    }

    /// Draws every surface potentially visible from `position`.
    pub fn render_frame<M, B>(
        &mut self,
        map: &M,
        backend: &mut B,
        position: Vec3,
        view_dir: Vec3,
    ) -> Result<FrameStats, RenderError>
    where
        M: MapData + ?Sized,
        B: RenderBackend + ?Sized,
    {
        let view = ViewSetup::new(
            self.width,
            self.height,
            self.config.z_near,
            self.config.z_far,
            position,
            view_dir,
        );

        // Every map lookup is done before the backend frame opens.
        let leaf = point_in_leaf(map, &position)?;
        let visible = resolve(map, leaf)?;

        let mut draws = Vec::with_capacity(visible.len());
        for &surface in &visible {
            let verts = self.surfaces.surface(surface)?;
            if verts.len() < 3 {
                continue;
            }
            draws.push((self.surface_texture(map, surface)?, verts));
        }

        let mut stats = FrameStats {
            leaf,
            visible_surfaces: visible.len(),
            ..Default::default()
        };

        backend.begin_frame(&view)?;
        for (texture, verts) in draws {
            backend.bind_texture(texture)?;
            backend.draw_polygon(verts)?;
            stats.polygons += 1;
            stats.vertices += verts.len();
        }
        backend.end_frame()?;
        self.frame_count += 1;

        trace!(
            "frame {}: leaf {}, {} surfaces, {} polys, {} verts",
            self.frame_count,
            stats.leaf,
            stats.visible_surfaces,
            stats.polygons,
            stats.vertices
        );
        Ok(stats)
    }

    /// Draws a frame from the camera's current position and view.
    pub fn render<M, B, C>(&mut self, map: &M, backend: &mut B, camera: &C) -> Result<FrameStats, RenderError>
    where
        M: MapData + ?Sized,
        B: RenderBackend + ?Sized,
        C: Camera + ?Sized,
    {
        self.render_frame(map, backend, camera.position(), camera.view())
    }

    /// Releases every texture handle held by the world.
    pub fn shutdown<B: RenderBackend + ?Sized>(mut self, backend: &mut B) {
        self.textures.release(backend);
        self.surfaces.clear();
        info!("world shut down after {} frames", self.frame_count);
    }

    pub fn surfaces(&self) -> &SurfacePrimitives {
        &self.surfaces
    }

    pub fn textures(&self) -> &TextureSet {
        &self.textures
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}
