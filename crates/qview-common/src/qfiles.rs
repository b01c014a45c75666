// qfiles.rs - on-disk layouts for BSP29 maps, palettes and PAK archives

// ============================================================
// PAK files
// ============================================================

/// PAK file magic: "PACK" in little-endian
pub const IDPAKHEADER: i32 = (b'K' as i32) << 24 | (b'C' as i32) << 16 | (b'A' as i32) << 8 | b'P' as i32;

/// ident + dirofs + dirlen
pub const PAK_HEADER_SIZE: usize = 12;
/// name[56] + filepos + filelen
pub const PAK_ENTRY_SIZE: usize = 64;
pub const PAK_NAME_SIZE: usize = 56;

pub const MAX_FILES_IN_PACK: usize = 2048;

// ============================================================
// Palette
// ============================================================

pub const PALETTE_COLORS: usize = 256;
/// 256 RGB triples
pub const PALETTE_SIZE: usize = PALETTE_COLORS * 3;

// ============================================================
// BSP29 format
// ============================================================

pub const BSPVERSION: i32 = 29;

pub const MAX_MAP_MODELS: usize = 256;
pub const MAX_MAP_ENTSTRING: usize = 0x40000;
pub const MAX_MAP_PLANES: usize = 32767;
pub const MAX_MAP_NODES: usize = 32767;
// node children are i16, so a leaf index never exceeds this
pub const MAX_MAP_LEAFS: usize = 32767;
pub const MAX_MAP_VERTS: usize = 65535;
pub const MAX_MAP_FACES: usize = 65535;
pub const MAX_MAP_MARKSURFACES: usize = 65535;
pub const MAX_MAP_TEXINFO: usize = 4096;
pub const MAX_MAP_EDGES: usize = 256000;
pub const MAX_MAP_SURFEDGES: usize = 512000;
pub const MAX_MAP_TEXTURES: usize = 512;
pub const MAX_MAP_MIPTEX: usize = 0x200000;
pub const MAX_MAP_VISIBILITY: usize = 0x100000;

pub const LUMP_ENTITIES: usize = 0;
pub const LUMP_PLANES: usize = 1;
pub const LUMP_TEXTURES: usize = 2;
pub const LUMP_VERTEXES: usize = 3;
pub const LUMP_VISIBILITY: usize = 4;
pub const LUMP_NODES: usize = 5;
pub const LUMP_TEXINFO: usize = 6;
pub const LUMP_FACES: usize = 7;
pub const LUMP_LIGHTING: usize = 8;
pub const LUMP_CLIPNODES: usize = 9;
pub const LUMP_LEAFS: usize = 10;
pub const LUMP_MARKSURFACES: usize = 11;
pub const LUMP_EDGES: usize = 12;
pub const LUMP_SURFEDGES: usize = 13;
pub const LUMP_MODELS: usize = 14;

pub const HEADER_LUMPS: usize = 15;
/// version + HEADER_LUMPS * (fileofs, filelen)
pub const BSP_HEADER_SIZE: usize = 4 + HEADER_LUMPS * 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lump {
    pub fileofs: i32,
    pub filelen: i32,
}

// Record sizes of the fixed-stride lumps.
pub const DPLANE_SIZE: usize = 20;
pub const DVERTEX_SIZE: usize = 12;
pub const DNODE_SIZE: usize = 24;
pub const DTEXINFO_SIZE: usize = 40;
pub const DFACE_SIZE: usize = 20;
pub const DLEAF_SIZE: usize = 28;
pub const DMARKSURFACE_SIZE: usize = 2;
pub const DEDGE_SIZE: usize = 4;
pub const DSURFEDGE_SIZE: usize = 4;

pub const MIPLEVELS: usize = 4;
pub const MIPTEX_NAME_SIZE: usize = 16;
/// name[16] + width + height + offsets[MIPLEVELS]
pub const MIPTEX_HEADER_SIZE: usize = MIPTEX_NAME_SIZE + 8 + MIPLEVELS * 4;

/// texinfo flag: sky or liquid, no lightmap
pub const TEX_SPECIAL: i32 = 1;

// leaf contents
pub const CONTENTS_EMPTY: i32 = -1;
pub const CONTENTS_SOLID: i32 = -2;
pub const CONTENTS_WATER: i32 = -3;
pub const CONTENTS_SLIME: i32 = -4;
pub const CONTENTS_LAVA: i32 = -5;
pub const CONTENTS_SKY: i32 = -6;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pak_magic_spells_pack() {
        assert_eq!(&IDPAKHEADER.to_le_bytes(), b"PACK");
    }

    #[test]
    fn test_header_size() {
        assert_eq!(BSP_HEADER_SIZE, 124);
        assert_eq!(MIPTEX_HEADER_SIZE, 40);
        assert_eq!(PALETTE_SIZE, 768);
    }
}
