// bspfile.rs - BSP29 map decoding
//
// Every structure is decoded field by field from little-endian byte
// offsets. Lump ranges and record strides are validated before any record
// is read, so the per-field readers below only ever see in-bounds slices.

use log::{debug, info};
use rayon::prelude::*;

use crate::error::{QError, QResult};
use crate::q_shared::Vec3;
use crate::qfiles::{
    Lump, BSPVERSION, BSP_HEADER_SIZE, DEDGE_SIZE, DFACE_SIZE, DLEAF_SIZE, DMARKSURFACE_SIZE,
    DNODE_SIZE, DPLANE_SIZE, DSURFEDGE_SIZE, DTEXINFO_SIZE, DVERTEX_SIZE, HEADER_LUMPS,
    LUMP_EDGES, LUMP_ENTITIES, LUMP_FACES, LUMP_LEAFS, LUMP_MARKSURFACES, LUMP_NODES,
    LUMP_PLANES, LUMP_SURFEDGES, LUMP_TEXINFO, LUMP_TEXTURES, LUMP_VERTEXES, LUMP_VISIBILITY,
    MAX_MAP_EDGES, MAX_MAP_ENTSTRING, MAX_MAP_FACES, MAX_MAP_LEAFS, MAX_MAP_MARKSURFACES,
    MAX_MAP_MIPTEX, MAX_MAP_NODES, MAX_MAP_PLANES, MAX_MAP_SURFEDGES, MAX_MAP_TEXINFO,
    MAX_MAP_TEXTURES, MAX_MAP_VERTS, MAX_MAP_VISIBILITY, MIPTEX_HEADER_SIZE, MIPTEX_NAME_SIZE,
};

const CRC32: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// Below this record count, sequential decoding is faster than rayon.
const PARALLEL_LUMP_THRESHOLD: usize = 64;

// ============================================================
// Decoded records
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DPlane {
    pub normal: Vec3,
    pub dist: f32,
    pub plane_type: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DNode {
    pub plane_num: i32,
    /// [front, back]; negative numbers are !leaf
    pub children: [i16; 2],
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub first_face: u16,
    pub num_faces: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DLeaf {
    pub contents: i32,
    /// Byte offset into the visibility lump, -1 = no visibility info.
    pub visofs: i32,
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub first_mark_surface: u16,
    pub num_mark_surfaces: u16,
    pub ambient_level: [u8; 4],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DFace {
    pub plane_num: i16,
    pub side: i16,
    /// Index into the surface-edge list.
    pub first_edge: i32,
    pub num_edges: i16,
    pub texinfo: i16,
    pub styles: [u8; 4],
    pub lightofs: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DEdge {
    pub v: [u16; 2],
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DTexInfo {
    /// [s, t]: xyz axis followed by the offset
    pub vecs: [[f32; 4]; 2],
    pub miptex: i32,
    pub flags: i32,
}

impl DTexInfo {
    pub fn s_axis(&self) -> Vec3 {
        [self.vecs[0][0], self.vecs[0][1], self.vecs[0][2]]
    }

    pub fn s_offset(&self) -> f32 {
        self.vecs[0][3]
    }

    pub fn t_axis(&self) -> Vec3 {
        [self.vecs[1][0], self.vecs[1][1], self.vecs[1][2]]
    }

    pub fn t_offset(&self) -> f32 {
        self.vecs[1][3]
    }
}

/// A palette-indexed wall texture. Only the full-size level is kept; the
/// renderer builds its own mip chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MipTex {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl MipTex {
    /// Placeholder for a texture directory slot with offset -1.
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn is_missing(&self) -> bool {
        self.name.is_empty()
    }
}

// ============================================================
// Loaded map
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct BspMap {
    pub name: String,
    pub checksum: u32,
    pub planes: Vec<DPlane>,
    pub vertexes: Vec<Vec3>,
    pub nodes: Vec<DNode>,
    pub texinfo: Vec<DTexInfo>,
    pub faces: Vec<DFace>,
    pub leafs: Vec<DLeaf>,
    pub mark_surfaces: Vec<u16>,
    pub edges: Vec<DEdge>,
    pub surf_edges: Vec<i32>,
    pub visibility: Vec<u8>,
    pub textures: Vec<MipTex>,
    pub entity_string: String,
}

// ============================================================
// Byte helpers
// ============================================================

pub(crate) fn read_i32_le(data: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

pub(crate) fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

pub(crate) fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

pub(crate) fn read_i16_le(data: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([data[offset], data[offset + 1]])
}

pub(crate) fn read_f32_le(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn read_vec3(data: &[u8], offset: usize) -> Vec3 {
    [
        read_f32_le(data, offset),
        read_f32_le(data, offset + 4),
        read_f32_le(data, offset + 8),
    ]
}

fn read_i16x3(data: &[u8], offset: usize) -> [i16; 3] {
    [
        read_i16_le(data, offset),
        read_i16_le(data, offset + 2),
        read_i16_le(data, offset + 4),
    ]
}

/// Returns the NUL-terminated prefix of a fixed-size name field.
pub(crate) fn fixed_name(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}

// ============================================================
// Lump helpers
// ============================================================

fn lump_slice<'a>(data: &'a [u8], lump: &Lump, what: &str) -> QResult<&'a [u8]> {
    if lump.fileofs < 0 || lump.filelen < 0 {
        return Err(QError::Format(format!(
            "{} lump has negative offset or length ({}, {})",
            what, lump.fileofs, lump.filelen
        )));
    }
    let ofs = lump.fileofs as usize;
    let len = lump.filelen as usize;
    match ofs.checked_add(len) {
        Some(end) if end <= data.len() => Ok(&data[ofs..end]),
        _ => Err(QError::Format(format!(
            "{} lump ({} bytes at {}) extends past end of file ({} bytes)",
            what,
            len,
            ofs,
            data.len()
        ))),
    }
}

/// Decodes a fixed-stride lump, in parallel once it is large enough.
fn load_records<T, F>(
    data: &[u8],
    lump: &Lump,
    what: &str,
    stride: usize,
    max: usize,
    decode: F,
) -> QResult<Vec<T>>
where
    T: Send,
    F: Fn(&[u8]) -> T + Sync + Send,
{
    let bytes = lump_slice(data, lump, what)?;
    if bytes.len() % stride != 0 {
        return Err(QError::Format(format!("funny lump size ({})", what)));
    }
    let count = bytes.len() / stride;
    if count > max {
        return Err(QError::Format(format!("map has too many {} ({} > {})", what, count, max)));
    }

    let records: Vec<T> = if count >= PARALLEL_LUMP_THRESHOLD {
        bytes.par_chunks_exact(stride).map(decode).collect()
    } else {
        bytes.chunks_exact(stride).map(decode).collect()
    };
    debug!("loaded {} {}", records.len(), what);
    Ok(records)
}

fn decode_plane(rec: &[u8]) -> DPlane {
    DPlane {
        normal: read_vec3(rec, 0),
        dist: read_f32_le(rec, 12),
        plane_type: read_i32_le(rec, 16),
    }
}

fn decode_node(rec: &[u8]) -> DNode {
    DNode {
        plane_num: read_i32_le(rec, 0),
        children: [read_i16_le(rec, 4), read_i16_le(rec, 6)],
        mins: read_i16x3(rec, 8),
        maxs: read_i16x3(rec, 14),
        first_face: read_u16_le(rec, 20),
        num_faces: read_u16_le(rec, 22),
    }
}

fn decode_leaf(rec: &[u8]) -> DLeaf {
    DLeaf {
        contents: read_i32_le(rec, 0),
        visofs: read_i32_le(rec, 4),
        mins: read_i16x3(rec, 8),
        maxs: read_i16x3(rec, 14),
        first_mark_surface: read_u16_le(rec, 20),
        num_mark_surfaces: read_u16_le(rec, 22),
        ambient_level: [rec[24], rec[25], rec[26], rec[27]],
    }
}

fn decode_face(rec: &[u8]) -> DFace {
    DFace {
        plane_num: read_i16_le(rec, 0),
        side: read_i16_le(rec, 2),
        first_edge: read_i32_le(rec, 4),
        num_edges: read_i16_le(rec, 8),
        texinfo: read_i16_le(rec, 10),
        styles: [rec[12], rec[13], rec[14], rec[15]],
        lightofs: read_i32_le(rec, 16),
    }
}

fn decode_texinfo(rec: &[u8]) -> DTexInfo {
    let mut vecs = [[0.0f32; 4]; 2];
    for (i, v) in vecs.iter_mut().enumerate() {
        for (j, c) in v.iter_mut().enumerate() {
            *c = read_f32_le(rec, (i * 4 + j) * 4);
        }
    }
    DTexInfo {
        vecs,
        miptex: read_i32_le(rec, 32),
        flags: read_i32_le(rec, 36),
    }
}

/// Decodes the texture directory. Slots with offset -1 become
/// `MipTex::missing()` so texture ids keep their positions.
fn load_textures(data: &[u8], lump: &Lump) -> QResult<Vec<MipTex>> {
    let bytes = lump_slice(data, lump, "textures")?;
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    if bytes.len() > MAX_MAP_MIPTEX {
        return Err(QError::Format("map has too large textures lump".into()));
    }
    if bytes.len() < 4 {
        return Err(QError::Format("textures lump too short".into()));
    }

    let count = read_i32_le(bytes, 0);
    if count < 0 || count as usize > MAX_MAP_TEXTURES {
        return Err(QError::Format(format!("bad texture count {}", count)));
    }
    let count = count as usize;
    if 4 + count * 4 > bytes.len() {
        return Err(QError::Format("texture directory extends past lump".into()));
    }

    let mut textures = Vec::with_capacity(count);
    for i in 0..count {
        let ofs = read_i32_le(bytes, 4 + i * 4);
        if ofs == -1 {
            textures.push(MipTex::missing());
            continue;
        }
        if ofs < 0 || ofs as usize + MIPTEX_HEADER_SIZE > bytes.len() {
            return Err(QError::Format(format!("texture {} header out of lump (offset {})", i, ofs)));
        }
        let base = ofs as usize;
        let header = &bytes[base..base + MIPTEX_HEADER_SIZE];
        let name = fixed_name(&header[..MIPTEX_NAME_SIZE]);
        let width = read_u32_le(header, MIPTEX_NAME_SIZE);
        let height = read_u32_le(header, MIPTEX_NAME_SIZE + 4);
        let level0 = read_u32_le(header, MIPTEX_NAME_SIZE + 8) as usize;

        let size = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| QError::Format(format!("texture {} has absurd size", name)))?;
        let start = base + level0;
        let end = start.checked_add(size).filter(|&e| e <= bytes.len()).ok_or_else(|| {
            QError::Format(format!("texture {} ({}x{}) pixels extend past lump", name, width, height))
        })?;

        debug!("texture {}: {} {}x{}", i, name, width, height);
        textures.push(MipTex {
            name,
            width,
            height,
            pixels: bytes[start..end].to_vec(),
        });
    }
    Ok(textures)
}

fn load_visibility(data: &[u8], lump: &Lump) -> QResult<Vec<u8>> {
    let bytes = lump_slice(data, lump, "visibility")?;
    if bytes.len() > MAX_MAP_VISIBILITY {
        return Err(QError::Format("map has too large visibility lump".into()));
    }
    Ok(bytes.to_vec())
}

fn load_entity_string(data: &[u8], lump: &Lump) -> QResult<String> {
    let bytes = lump_slice(data, lump, "entities")?;
    if bytes.len() > MAX_MAP_ENTSTRING {
        return Err(QError::Format("map has too large entity lump".into()));
    }
    Ok(String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string())
}

// ============================================================
// BspMap::load
// ============================================================

impl BspMap {
    /// Decodes a BSP29 file held in memory.
    pub fn load(name: &str, data: &[u8]) -> QResult<BspMap> {
        if data.len() < BSP_HEADER_SIZE {
            return Err(QError::Format(format!(
                "{} is too short for a BSP header ({} bytes)",
                name,
                data.len()
            )));
        }

        let version = read_i32_le(data, 0);
        if version != BSPVERSION {
            return Err(QError::Format(format!(
                "{} has wrong version number ({} should be {})",
                name, version, BSPVERSION
            )));
        }

        let mut lumps = [Lump::default(); HEADER_LUMPS];
        for (i, lump) in lumps.iter_mut().enumerate() {
            let base = 4 + i * 8;
            lump.fileofs = read_i32_le(data, base);
            lump.filelen = read_i32_le(data, base + 4);
        }

        let map = BspMap {
            name: name.to_string(),
            checksum: CRC32.checksum(data),
            planes: load_records(data, &lumps[LUMP_PLANES], "planes", DPLANE_SIZE, MAX_MAP_PLANES, decode_plane)?,
            vertexes: load_records(data, &lumps[LUMP_VERTEXES], "vertexes", DVERTEX_SIZE, MAX_MAP_VERTS, |rec| read_vec3(rec, 0))?,
            nodes: load_records(data, &lumps[LUMP_NODES], "nodes", DNODE_SIZE, MAX_MAP_NODES, decode_node)?,
            texinfo: load_records(data, &lumps[LUMP_TEXINFO], "texinfo", DTEXINFO_SIZE, MAX_MAP_TEXINFO, decode_texinfo)?,
            faces: load_records(data, &lumps[LUMP_FACES], "faces", DFACE_SIZE, MAX_MAP_FACES, decode_face)?,
            leafs: load_records(data, &lumps[LUMP_LEAFS], "leafs", DLEAF_SIZE, MAX_MAP_LEAFS, decode_leaf)?,
            mark_surfaces: load_records(
                data,
                &lumps[LUMP_MARKSURFACES],
                "marksurfaces",
                DMARKSURFACE_SIZE,
                MAX_MAP_MARKSURFACES,
                |rec| read_u16_le(rec, 0),
            )?,
            edges: load_records(data, &lumps[LUMP_EDGES], "edges", DEDGE_SIZE, MAX_MAP_EDGES, |rec| DEdge {
                v: [read_u16_le(rec, 0), read_u16_le(rec, 2)],
            })?,
            surf_edges: load_records(
                data,
                &lumps[LUMP_SURFEDGES],
                "surfedges",
                DSURFEDGE_SIZE,
                MAX_MAP_SURFEDGES,
                |rec| read_i32_le(rec, 0),
            )?,
            visibility: load_visibility(data, &lumps[LUMP_VISIBILITY])?,
            textures: load_textures(data, &lumps[LUMP_TEXTURES])?,
            entity_string: load_entity_string(data, &lumps[LUMP_ENTITIES])?,
        };

        info!(
            "{}: {} nodes, {} leafs, {} faces, {} textures, {} bytes vis, checksum {:08x}",
            map.name,
            map.nodes.len(),
            map.leafs.len(),
            map.faces.len(),
            map.textures.len(),
            map.visibility.len(),
            map.checksum
        );
        Ok(map)
    }
}

// ============================================================
// Tests
// ============================================================
