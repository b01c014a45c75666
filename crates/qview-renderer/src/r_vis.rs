// r_vis.rs - potentially visible set decoding
//
// A leaf's PVS row is a run-length coded bitmap over leaves 1..num_leafs-1.
// A non-zero byte carries eight leaf bits (LSB first); a zero byte is
// followed by a count of all-zero bytes to skip.

use log::trace;

use qview_common::{MapData, QError, QResult};

/// Longest zero run one `0, n` pair can encode.
const MAX_ZERO_RUN: u8 = 255;

/// Calls `visit` for every leaf marked in the row starting at `offset`.
fn walk_vis_row(
    vis: &[u8],
    offset: usize,
    num_leafs: usize,
    mut visit: impl FnMut(usize),
) -> QResult<()> {
    let overrun = || {
        QError::CorruptData(format!(
            "PVS row at offset {} runs past the end of the visibility lump ({} bytes)",
            offset,
            vis.len()
        ))
    };

    let mut pos = offset;
    let mut cursor = 1usize;
    while cursor < num_leafs {
        let byte = *vis.get(pos).ok_or_else(overrun)?;
        pos += 1;

        if byte == 0 {
            let run = *vis.get(pos).ok_or_else(overrun)?;
            pos += 1;
            cursor += 8 * run as usize;
            continue;
        }

        for bit in 0..8 {
            if byte & (1 << bit) != 0 && cursor + bit < num_leafs {
                visit(cursor + bit);
            }
        }
        cursor += 8;
    }
    Ok(())
}

/// Leaves visible from `leaf`, in ascending order.
///
/// Leaf 0, a leaf without a PVS row, or a map without visibility data sees
/// every leaf.
pub fn visible_leaves<M: MapData + ?Sized>(map: &M, leaf: usize) -> QResult<Vec<usize>> {
    let num_leafs = map.num_leafs();
    let visofs = map.leaf(leaf)?.visofs;

    if leaf == 0 || visofs < 0 || map.visibility().is_empty() {
        return Ok((1..num_leafs).collect());
    }

    let mut leaves = Vec::new();
    walk_vis_row(map.visibility(), visofs as usize, num_leafs, |l| leaves.push(l))?;
    Ok(leaves)
}

/// Surface indices to draw from `leaf`: each visible leaf's mark surfaces
/// in leaf order, duplicates kept.
pub fn resolve<M: MapData + ?Sized>(map: &M, leaf: usize) -> QResult<Vec<usize>> {
    let leaves = visible_leaves(map, leaf)?;
    let mut surfaces = Vec::new();

    for &l in &leaves {
        let dleaf = map.leaf(l)?;
        let first = dleaf.first_mark_surface as usize;
        for i in first..first + dleaf.num_mark_surfaces as usize {
            surfaces.push(map.mark_surface(i)?);
        }
    }

    trace!(
        "leaf {}: {} visible leaves, {} surfaces",
        leaf,
        leaves.len(),
        surfaces.len()
    );
    Ok(surfaces)
}

/// Bytes in an uncompressed PVS row for `num_leafs` leaves (leaf 0 excluded).
pub fn vis_row_bytes(num_leafs: usize) -> usize {
    num_leafs.saturating_sub(1).div_ceil(8)
}

/// Expands the row at `offset` into a plain bitmap; bit `i` is leaf `i + 1`.
pub fn decompress_vis(vis: &[u8], offset: usize, num_leafs: usize) -> QResult<Vec<u8>> {
    let mut row = vec![0u8; vis_row_bytes(num_leafs)];
    walk_vis_row(vis, offset, num_leafs, |leaf| {
        let bit = leaf - 1;
        row[bit >> 3] |= 1 << (bit & 7);
    })?;
    Ok(row)
}

/// Run-length codes a bitmap row, the inverse of `decompress_vis`.
pub fn compress_vis(row: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(row.len());
    let mut j = 0;
    while j < row.len() {
        out.push(row[j]);
        if row[j] != 0 {
            j += 1;
            continue;
        }

        let mut rep = 1u8;
        j += 1;
        while j < row.len() && row[j] == 0 && rep < MAX_ZERO_RUN {
            rep += 1;
            j += 1;
        }
        out.push(rep);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decompress_literal_bytes() {
        // leaves 1 and 10
        let row = decompress_vis(&[0x01, 0x02], 0, 17).unwrap();
        assert_eq!(row, vec![0x01, 0x02]);
    }

    #[test]
    fn test_decompress_zero_run() {
        // skip 16 leaves, then leaf 17
        let row = decompress_vis(&[0x00, 0x02, 0x01], 0, 25).unwrap();
        assert_eq!(row, vec![0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_bits_past_leaf_count_are_ignored() {
        // 4 real leaves; the high bits of the byte are padding
        let row = decompress_vis(&[0xFF], 0, 5).unwrap();
        assert_eq!(row, vec![0x0F]);
    }

    #[test]
    fn test_overrun_is_corrupt() {
        assert!(decompress_vis(&[0x01], 0, 17).unwrap_err().is_corrupt());
        assert!(decompress_vis(&[0x00], 0, 17).unwrap_err().is_corrupt());
        assert!(decompress_vis(&[0x01], 4, 3).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_compress_caps_runs() {
        let row = vec![0u8; 300];
        assert_eq!(compress_vis(&row), vec![0, 255, 0, 45]);
        assert_eq!(compress_vis(&[0x80, 0, 0, 0x01]), vec![0x80, 0, 2, 0x01]);
        assert!(compress_vis(&[]).is_empty());
    }

    #[test]
    fn test_round_trip_64_leaves() {
        // leaves 1..=64 with set bits and zero runs mixed
        let row = vec![0x81, 0x00, 0x00, 0x00, 0x10, 0x00, 0xFF, 0x00];
        let packed = compress_vis(&row);
        assert_eq!(packed, vec![0x81, 0x00, 0x03, 0x10, 0x00, 0x01, 0xFF, 0x00, 0x01]);
        assert_eq!(decompress_vis(&packed, 0, 65).unwrap(), row);
    }

    #[test]
    fn test_row_bytes() {
        assert_eq!(vis_row_bytes(0), 0);
        assert_eq!(vis_row_bytes(1), 0);
        assert_eq!(vis_row_bytes(9), 1);
        assert_eq!(vis_row_bytes(10), 2);
    }
}
