// level.rs - read-only accessor over a loaded map and its palette

use crate::bspfile::{BspMap, DEdge, DFace, DLeaf, DNode, DPlane, DTexInfo, MipTex};
use crate::error::{QError, QResult};
use crate::files::FsContext;
use crate::palette::Palette;
use crate::q_shared::Vec3;

fn lookup<'a, T>(table: &'a [T], index: usize, what: &str) -> QResult<&'a T> {
    table.get(index).ok_or_else(|| {
        QError::CorruptData(format!(
            "{} index {} out of range ({} entries)",
            what,
            index,
            table.len()
        ))
    })
}

/// Converts a signed index read from the map, rejecting negatives.
pub fn checked_index(value: i64, what: &str) -> QResult<usize> {
    usize::try_from(value).map_err(|_| QError::CorruptData(format!("negative {} index {}", what, value)))
}

/// Indexed, bounds-checked access to every table the renderer reads.
///
/// Implementors only expose the raw tables; the lookups are provided and
/// turn any out-of-range index into `QError::CorruptData`.
pub trait MapData {
    fn planes(&self) -> &[DPlane];
    fn nodes(&self) -> &[DNode];
    fn leafs(&self) -> &[DLeaf];
    fn visibility(&self) -> &[u8];
    fn mark_surfaces(&self) -> &[u16];
    fn faces(&self) -> &[DFace];
    fn surf_edges(&self) -> &[i32];
    fn edges(&self) -> &[DEdge];
    fn vertexes(&self) -> &[Vec3];
    fn texinfos(&self) -> &[DTexInfo];
    fn textures(&self) -> &[MipTex];
    fn palette(&self) -> &Palette;

    fn num_nodes(&self) -> usize {
        self.nodes().len()
    }

    fn num_leafs(&self) -> usize {
        self.leafs().len()
    }

    fn num_faces(&self) -> usize {
        self.faces().len()
    }

    fn num_textures(&self) -> usize {
        self.textures().len()
    }

    fn plane(&self, index: usize) -> QResult<&DPlane> {
        lookup(self.planes(), index, "plane")
    }

    fn node(&self, index: usize) -> QResult<&DNode> {
        lookup(self.nodes(), index, "node")
    }

    fn leaf(&self, index: usize) -> QResult<&DLeaf> {
        lookup(self.leafs(), index, "leaf")
    }

    /// Face index stored in the leaf-to-surface indirection list.
    fn mark_surface(&self, index: usize) -> QResult<usize> {
        lookup(self.mark_surfaces(), index, "marksurface").map(|&s| s as usize)
    }

    fn face(&self, index: usize) -> QResult<&DFace> {
        lookup(self.faces(), index, "face")
    }

    fn surf_edge(&self, index: usize) -> QResult<i32> {
        lookup(self.surf_edges(), index, "surfedge").copied()
    }

    fn edge(&self, index: usize) -> QResult<&DEdge> {
        lookup(self.edges(), index, "edge")
    }

    fn vertex(&self, index: usize) -> QResult<&Vec3> {
        lookup(self.vertexes(), index, "vertex")
    }

    fn texinfo(&self, index: usize) -> QResult<&DTexInfo> {
        lookup(self.texinfos(), index, "texinfo")
    }

    fn mip_texture(&self, index: usize) -> QResult<&MipTex> {
        lookup(self.textures(), index, "texture")
    }
}

/// Owns everything loaded from disk for one session.
#[derive(Debug, Clone)]
pub struct Level {
    pub bsp: BspMap,
    pub palette: Palette,
}

impl Level {
    pub fn new(bsp: BspMap, palette: Palette) -> Self {
        Self { bsp, palette }
    }

    /// Loads the map and palette through the search path.
    pub fn load(fs: &FsContext, map_path: &str, palette_path: &str) -> QResult<Level> {
        let data = fs.load_file(map_path)?;
        let bsp = BspMap::load(map_path, &data)?;
        let palette = Palette::from_bytes(&fs.load_file(palette_path)?)?;
        Ok(Level::new(bsp, palette))
    }
}

impl MapData for Level {
    fn planes(&self) -> &[DPlane] {
        &self.bsp.planes
    }

    fn nodes(&self) -> &[DNode] {
        &self.bsp.nodes
    }

    fn leafs(&self) -> &[DLeaf] {
        &self.bsp.leafs
    }

    fn visibility(&self) -> &[u8] {
        &self.bsp.visibility
    }

    fn mark_surfaces(&self) -> &[u16] {
        &self.bsp.mark_surfaces
    }

    fn faces(&self) -> &[DFace] {
        &self.bsp.faces
    }

    fn surf_edges(&self) -> &[i32] {
        &self.bsp.surf_edges
    }

    fn edges(&self) -> &[DEdge] {
        &self.bsp.edges
    }

    fn vertexes(&self) -> &[Vec3] {
        &self.bsp.vertexes
    }

    fn texinfos(&self) -> &[DTexInfo] {
        &self.bsp.texinfo
    }

    fn textures(&self) -> &[MipTex] {
        &self.bsp.textures
    }

    fn palette(&self) -> &Palette {
        &self.palette
    }
}
