// palette.rs - 256 color lookup table (gfx/palette.lmp)

use crate::error::{QError, QResult};
use crate::qfiles::{PALETTE_COLORS, PALETTE_SIZE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: [[u8; 3]; PALETTE_COLORS],
}

/// Builds a packed RGBA texel. Stored as little-endian u32 = (A << 24) | (B << 16) | (G << 8) | R.
pub fn make_palette_entry(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (a as u32) << 24 | (b as u32) << 16 | (g as u32) << 8 | (r as u32)
}

impl Palette {
    /// Parses exactly 256 consecutive RGB triples.
    pub fn from_bytes(data: &[u8]) -> QResult<Palette> {
        if data.len() != PALETTE_SIZE {
            return Err(QError::Format(format!(
                "palette must be {} bytes, got {}",
                PALETTE_SIZE,
                data.len()
            )));
        }
        let mut colors = [[0u8; 3]; PALETTE_COLORS];
        for (color, rgb) in colors.iter_mut().zip(data.chunks_exact(3)) {
            color.copy_from_slice(rgb);
        }
        Ok(Palette { colors })
    }

    pub fn from_colors(colors: [[u8; 3]; PALETTE_COLORS]) -> Palette {
        Palette { colors }
    }

    pub fn rgb(&self, index: u8) -> [u8; 3] {
        self.colors[index as usize]
    }

    /// Opaque packed RGBA for a palette index.
    pub fn packed(&self, index: u8) -> u32 {
        let [r, g, b] = self.colors[index as usize];
        make_palette_entry(r, g, b, 255)
    }

    /// Index of the closest color (squared RGB distance); ties go to the lowest index.
    pub fn nearest(&self, rgb: [u8; 3]) -> u8 {
        let mut best = 0usize;
        let mut best_dist = u32::MAX;
        for (i, c) in self.colors.iter().enumerate() {
            let dist: u32 = (0..3)
                .map(|k| {
                    let d = c[k] as i32 - rgb[k] as i32;
                    (d * d) as u32
                })
                .sum();
            if dist < best_dist {
                best_dist = dist;
                best = i;
                if dist == 0 {
                    break;
                }
            }
        }
        best as u8
    }
}
