//! Surface compilation
//!
//! Expands every face's surface-edge list into an ordered polygon of
//! (position, texture coordinate) vertices. All polygons live in one flat
//! arena; each surface owns a span of it.

use bytemuck::{Pod, Zeroable};
use log::debug;
use rayon::prelude::*;

use qview_common::level::checked_index;
use qview_common::q_shared::dot_product;
use qview_common::{MapData, QError, QResult};

/// Size used to normalize texture coordinates when a face's texture is
/// missing, matching the 16x16 placeholder.
pub const NOTEXTURE_SIZE: u32 = 16;

/// Vertex format for world surfaces.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SurfaceVertex {
    /// Vertex position (xyz).
    pub position: [f32; 3],
    /// Diffuse texture coordinates, in texture repeats.
    pub tex_coord: [f32; 2],
}

impl SurfaceVertex {
    /// Size of vertex in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Location of one surface's vertices in the arena.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceSpan {
    pub first: usize,
    pub count: usize,
}

/// Compiled polygons for every surface of a map.
#[derive(Debug, Default)]
pub struct SurfacePrimitives {
    vertices: Vec<SurfaceVertex>,
    spans: Vec<SurfaceSpan>,
}

/// Builds the polygon for a single face.
///
/// Edges are walked last to first. A non-negative surface edge `r` starts at
/// vertex 0 of edge `r`; a negative one runs backwards along edge `-r` and
/// contributes its vertex 1.
pub fn compile_surface<M: MapData + ?Sized>(map: &M, index: usize) -> QResult<Vec<SurfaceVertex>> {
    let face = map.face(index)?;
    let num_edges = checked_index(face.num_edges as i64, "edge count")?;
    let first_edge = checked_index(face.first_edge as i64, "surfedge")?;

    let tex = map.texinfo(checked_index(face.texinfo as i64, "texinfo")?)?;
    let mip = map.mip_texture(checked_index(tex.miptex as i64, "texture")?)?;
    let (width, height) = if mip.is_missing() || mip.width == 0 || mip.height == 0 {
        (NOTEXTURE_SIZE, NOTEXTURE_SIZE)
    } else {
        (mip.width, mip.height)
    };

    let s_axis = tex.s_axis();
    let t_axis = tex.t_axis();

    let mut verts = Vec::with_capacity(num_edges);
    for i in (first_edge..first_edge + num_edges).rev() {
        let r = map.surf_edge(i)?;
        let vertex_index = if r >= 0 {
            map.edge(r as usize)?.v[0]
        } else {
            let back = r.checked_neg().ok_or_else(|| {
                QError::CorruptData(format!("surface {}: bad edge reference {}", index, r))
            })?;
            map.edge(back as usize)?.v[1]
        };

        let pos = *map.vertex(vertex_index as usize)?;
        let s = (dot_product(&pos, &s_axis) + tex.s_offset()) / width as f32;
        let t = (dot_product(&pos, &t_axis) + tex.t_offset()) / height as f32;
        verts.push(SurfaceVertex {
            position: pos,
            tex_coord: [s, t],
        });
    }
    Ok(verts)
}

impl SurfacePrimitives {
    /// Compiles every face of the map. Faces are built in parallel and
    /// concatenated in face order.
    pub fn build<M: MapData + Sync + ?Sized>(map: &M) -> QResult<Self> {
        let per_surface: Vec<Vec<SurfaceVertex>> = (0..map.num_faces())
            .into_par_iter()
            .map(|i| compile_surface(map, i))
            .collect::<QResult<_>>()?;

        let total: usize = per_surface.iter().map(Vec::len).sum();
        let mut vertices = Vec::with_capacity(total);
        let mut spans = Vec::with_capacity(per_surface.len());
        for verts in per_surface {
            spans.push(SurfaceSpan {
                first: vertices.len(),
                count: verts.len(),
            });
            vertices.extend(verts);
        }

        debug!(
            "compiled {} surfaces, {} vertices ({} bytes)",
            spans.len(),
            vertices.len(),
            vertices.len() * SurfaceVertex::SIZE
        );
        Ok(Self { vertices, spans })
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn span(&self, index: usize) -> QResult<SurfaceSpan> {
        self.spans.get(index).copied().ok_or_else(|| {
            QError::CorruptData(format!(
                "surface index {} out of range ({} entries)",
                index,
                self.spans.len()
            ))
        })
    }

    /// The polygon compiled for surface `index`.
    pub fn surface(&self, index: usize) -> QResult<&[SurfaceVertex]> {
        let span = self.span(index)?;
        Ok(&self.vertices[span.first..span.first + span.count])
    }

    pub fn vertices(&self) -> &[SurfaceVertex] {
        &self.vertices
    }

    /// The whole arena as raw bytes, for a single buffer upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Drops the compiled data.
    pub fn clear(&mut self) {
        self.vertices = Vec::new();
        self.spans = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qview_common::bspfile::{BspMap, DEdge, DFace, DTexInfo, MipTex};
    use qview_common::palette::Palette;
    use qview_common::Level;

    fn texinfo(miptex: i32) -> DTexInfo {
        DTexInfo {
            vecs: [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]],
            miptex,
            flags: 0,
        }
    }

    fn face(first_edge: i32, num_edges: i16) -> DFace {
        DFace {
            first_edge,
            num_edges,
            ..Default::default()
        }
    }

    /// A 64x64 quad at z = 0 with one 64x64 texture.
    fn quad_level() -> Level {
        let bsp = BspMap {
            vertexes: vec![
                [0.0, 0.0, 0.0],
                [64.0, 0.0, 0.0],
                [64.0, 64.0, 0.0],
                [32.0, 32.0, 0.0],
            ],
            edges: vec![
                DEdge { v: [0, 0] },
                DEdge { v: [0, 1] },
                DEdge { v: [1, 2] },
                DEdge { v: [2, 3] },
                DEdge { v: [3, 0] },
            ],
            surf_edges: vec![1, 2, 3, 4, -1, -3],
            faces: vec![face(0, 4), face(4, 2), face(0, 0)],
            texinfo: vec![texinfo(0)],
            textures: vec![MipTex {
                name: "wall".into(),
                width: 64,
                height: 64,
                pixels: vec![0; 64 * 64],
            }],
            ..Default::default()
        };
        Level::new(bsp, Palette::from_colors([[0; 3]; 256]))
    }

    #[test]
    fn test_vertex_layout() {
        assert_eq!(SurfaceVertex::SIZE, 20);
    }

    #[test]
    fn test_reverse_edge_order() {
        let level = quad_level();
        let verts = compile_surface(&level, 0).unwrap();
        let positions: Vec<[f32; 3]> = verts.iter().map(|v| v.position).collect();
        // surfedges 4, 3, 2, 1 -> start vertices 3, 2, 1, 0
        assert_eq!(
            positions,
            vec![[32.0, 32.0, 0.0], [64.0, 64.0, 0.0], [64.0, 0.0, 0.0], [0.0, 0.0, 0.0]]
        );
    }

    #[test]
    fn test_negative_edges_use_end_vertex() {
        let level = quad_level();
        let verts = compile_surface(&level, 1).unwrap();
        // -3 -> edge 3 end = vertex 3; -1 -> edge 1 end = vertex 1
        assert_eq!(verts[0].position, [32.0, 32.0, 0.0]);
        assert_eq!(verts[1].position, [64.0, 0.0, 0.0]);
    }

    #[test]
    fn test_texture_coordinates() {
        let level = quad_level();
        let verts = compile_surface(&level, 0).unwrap();
        assert_eq!(verts[0].tex_coord, [0.5, 0.5]);
        assert_eq!(verts[1].tex_coord, [1.0, 1.0]);
    }

    #[test]
    fn test_missing_texture_uses_placeholder_size() {
        let mut level = quad_level();
        level.bsp.textures[0] = MipTex::missing();
        let verts = compile_surface(&level, 0).unwrap();
        assert_eq!(verts[0].tex_coord, [2.0, 2.0]);
    }

    #[test]
    fn test_build_arena_and_spans() {
        let level = quad_level();
        let prims = SurfacePrimitives::build(&level).unwrap();
        assert_eq!(prims.len(), 3);
        assert_eq!(prims.num_vertices(), 6);
        assert_eq!(prims.span(1).unwrap(), SurfaceSpan { first: 4, count: 2 });
        assert!(prims.surface(2).unwrap().is_empty());
        assert_eq!(prims.as_bytes().len(), 6 * SurfaceVertex::SIZE);
        assert!(prims.surface(3).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_corrupt_faces() {
        let mut level = quad_level();
        level.bsp.faces.push(face(0, -1));
        assert!(compile_surface(&level, 3).unwrap_err().is_corrupt());

        level.bsp.faces[3] = face(5, 4);
        assert!(compile_surface(&level, 3).unwrap_err().is_corrupt());

        level.bsp.surf_edges.push(i32::MIN);
        level.bsp.faces[3] = face(6, 1);
        assert!(compile_surface(&level, 3).unwrap_err().is_corrupt());

        assert!(SurfacePrimitives::build(&level).unwrap_err().is_corrupt());
    }
}
