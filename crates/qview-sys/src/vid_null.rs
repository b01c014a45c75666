// vid_null.rs - headless backend that counts what a real one would draw

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use qview_renderer::r_image::MipLevel;
use qview_renderer::r_view::ViewSetup;
use qview_renderer::{RenderBackend, RenderError, SurfacePrimitives, SurfaceVertex, TextureHandle};

/// Running totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendCounters {
    pub textures: usize,
    pub mip_levels: usize,
    pub texels: usize,
    pub surface_bytes: usize,
    pub frames: u64,
    pub binds: usize,
    pub polygons: usize,
    pub vertices: usize,
}

/// Collects statistics instead of drawing. Optionally writes level 0 of
/// every uploaded texture to a directory as PNG.
#[derive(Debug, Default)]
pub struct StatsBackend {
    pub totals: BackendCounters,
    /// Counters for the frame in progress (or the last finished one).
    pub frame: BackendCounters,
    live_textures: HashSet<usize>,
    bound: Option<TextureHandle>,
    in_frame: bool,
    dump_dir: Option<PathBuf>,
}

/// File-system friendly texture name; `*` and path separators are replaced.
pub fn dump_file_name(id: usize, name: &str) -> String {
    let clean: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '#' })
        .collect();
    format!("{:03}_{}.png", id, clean)
}

/// Writes one RGBA level as PNG.
pub fn write_png(path: &Path, level: &MipLevel) -> Result<(), RenderError> {
    let img = image::RgbaImage::from_raw(level.width, level.height, level.as_bytes().to_vec())
        .ok_or_else(|| RenderError::Backend(format!("{}: texel count mismatch", path.display())))?;
    img.save(path)
        .map_err(|e| RenderError::Backend(format!("couldn't write {}: {}", path.display(), e)))
}

impl StatsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dump uploaded textures into `dir`, creating it if needed.
    pub fn with_texture_dump(dir: &Path) -> Result<Self, RenderError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| RenderError::Backend(format!("couldn't create {}: {}", dir.display(), e)))?;
        Ok(Self {
            dump_dir: Some(dir.to_path_buf()),
            ..Self::default()
        })
    }

    pub fn live_textures(&self) -> usize {
        self.live_textures.len()
    }

    fn require_frame(&self, what: &str) -> Result<(), RenderError> {
        if self.in_frame {
            Ok(())
        } else {
            Err(RenderError::Backend(format!("{} outside of a frame", what)))
        }
    }
}

impl RenderBackend for StatsBackend {
    fn upload_texture(
        &mut self,
        handle: TextureHandle,
        name: &str,
        levels: &[MipLevel],
    ) -> Result<(), RenderError> {
        let base = levels
            .first()
            .ok_or_else(|| RenderError::Backend(format!("texture {} has no levels", name)))?;

        if !self.live_textures.insert(handle.id) {
            return Err(RenderError::Backend(format!("texture slot {} uploaded twice", handle.id)));
        }

        self.totals.textures += 1;
        self.totals.mip_levels += levels.len();
        self.totals.texels += levels.iter().map(|l| l.data.len()).sum::<usize>();

        if let Some(dir) = &self.dump_dir {
            let path = dir.join(dump_file_name(handle.id, name));
            write_png(&path, base)?;
            debug!("wrote {}", path.display());
        }
        Ok(())
    }

    fn upload_surfaces(&mut self, surfaces: &SurfacePrimitives) -> Result<(), RenderError> {
        self.totals.surface_bytes += surfaces.as_bytes().len();
        Ok(())
    }

    fn begin_frame(&mut self, _view: &ViewSetup) -> Result<(), RenderError> {
        if self.in_frame {
            return Err(RenderError::Backend("begin_frame inside a frame".into()));
        }
        self.in_frame = true;
        self.bound = None;
        self.frame = BackendCounters::default();
        Ok(())
    }

    fn bind_texture(&mut self, handle: Option<TextureHandle>) -> Result<(), RenderError> {
        self.require_frame("bind_texture")?;
        if let Some(h) = handle {
            if !self.live_textures.contains(&h.id) {
                return Err(RenderError::Backend(format!("texture slot {} is not resident", h.id)));
            }
        }
        self.bound = handle;
        self.frame.binds += 1;
        Ok(())
    }

    fn draw_polygon(&mut self, vertices: &[SurfaceVertex]) -> Result<(), RenderError> {
        self.require_frame("draw_polygon")?;
        self.frame.polygons += 1;
        self.frame.vertices += vertices.len();
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        self.require_frame("end_frame")?;
        self.in_frame = false;
        self.frame.frames = 1;
        self.totals.frames += 1;
        self.totals.binds += self.frame.binds;
        self.totals.polygons += self.frame.polygons;
        self.totals.vertices += self.frame.vertices;
        Ok(())
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        if !self.live_textures.remove(&handle.id) {
            warn!("release of unknown texture slot {}", handle.id);
        }
        if self.bound == Some(handle) {
            self.bound = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qview_renderer::r_image::build_mip_chain;

    fn handle(id: usize) -> TextureHandle {
        TextureHandle {
            id,
            width: 2,
            height: 2,
        }
    }

    fn view() -> ViewSetup {
        ViewSetup::new(320, 200, 1.0, 100.0, [0.0; 3], [1.0, 0.0, 0.0])
    }

    #[test]
    fn test_counts_frames() {
        let mut backend = StatsBackend::new();
        backend
            .upload_texture(handle(0), "wall", &build_mip_chain(vec![0xff00_00ff; 4], 2, 2))
            .unwrap();
        assert_eq!(backend.totals.mip_levels, 2);
        assert_eq!(backend.totals.texels, 5);

        let tri = [SurfaceVertex::default(); 3];
        for _ in 0..2 {
            backend.begin_frame(&view()).unwrap();
            backend.bind_texture(Some(handle(0))).unwrap();
            backend.draw_polygon(&tri).unwrap();
            backend.bind_texture(None).unwrap();
            backend.draw_polygon(&tri).unwrap();
            backend.end_frame().unwrap();
        }
        assert_eq!(backend.frame.polygons, 2);
        assert_eq!(backend.totals.frames, 2);
        assert_eq!(backend.totals.binds, 4);
        assert_eq!(backend.totals.vertices, 12);

        backend.release_texture(handle(0));
        assert_eq!(backend.live_textures(), 0);
    }

    #[test]
    fn test_misuse_is_an_error() {
        let mut backend = StatsBackend::new();
        assert!(backend.draw_polygon(&[]).is_err());
        assert!(backend.end_frame().is_err());
        backend.begin_frame(&view()).unwrap();
        assert!(backend.begin_frame(&view()).is_err());
        assert!(backend.bind_texture(Some(handle(7))).is_err());

        let chain = build_mip_chain(vec![0; 4], 2, 2);
        backend.upload_texture(handle(1), "a", &chain).unwrap();
        assert!(backend.upload_texture(handle(1), "a", &chain).is_err());
        assert!(backend.upload_texture(handle(2), "b", &[]).is_err());
    }

    #[test]
    fn test_dump_file_name() {
        assert_eq!(dump_file_name(3, "*water1"), "003_#water1.png");
        assert_eq!(dump_file_name(12, "sky4"), "012_sky4.png");
    }

    #[test]
    fn test_texture_dump_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("textures");
        let mut backend = StatsBackend::with_texture_dump(&out).unwrap();
        let chain = build_mip_chain(vec![0xff20_4080; 16], 4, 4);
        backend.upload_texture(handle(5), "+0slip", &chain).unwrap();

        let img = image::open(out.join("005_#0slip.png")).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (4, 4));
        assert_eq!(img.get_pixel(0, 0).0, [0x80, 0x40, 0x20, 0xff]);
    }
}
