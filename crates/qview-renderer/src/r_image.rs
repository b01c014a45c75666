// r_image.rs - wall texture expansion and upload
//
// Palette-indexed miptex pixels become opaque RGBA, are scaled up to power
// of two dimensions and get a full box-filtered mip chain down to 1x1.

use bitflags::bitflags;
use log::{debug, warn};
use rayon::prelude::*;

use qview_common::bspfile::MipTex;
use qview_common::palette::Palette;
use qview_common::{MapData, QError, QResult};

use crate::r_backend::RenderBackend;
use crate::RenderError;

/// Frames reserved for every animated texture sequence.
pub const ANIM_TEX_FRAMES: usize = 10;

/// Extra slots reserved for every sky texture (solid and alpha layers).
pub const SKY_TEX_LAYERS: usize = 2;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureFlags: u32 {
        /// Name starts with `*`.
        const ANIMATED = 1 << 0;
        /// Name starts with `sky`.
        const SKY      = 1 << 1;
    }
}

impl TextureFlags {
    pub fn from_texture_name(name: &str) -> Self {
        let mut flags = TextureFlags::empty();
        if name.starts_with('*') {
            flags |= TextureFlags::ANIMATED;
        }
        if name.starts_with("sky") {
            flags |= TextureFlags::SKY;
        }
        flags
    }

    /// Slots reserved beyond the texture's own.
    pub fn extra_slots(self) -> usize {
        let mut extra = 0;
        if self.contains(TextureFlags::ANIMATED) {
            extra += ANIM_TEX_FRAMES - 1;
        }
        if self.contains(TextureFlags::SKY) {
            extra += SKY_TEX_LAYERS;
        }
        extra
    }
}

/// An uploaded texture. `id` is the texture's slot in the map's texture
/// table; width and height are the source dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    pub id: usize,
    pub width: u32,
    pub height: u32,
}

/// One level of a mip chain, packed RGBA texels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u32>,
}

impl MipLevel {
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}

// ============================================================
// Pixel helpers
// ============================================================

/// Compute the next power-of-two dimension >= `n`.
pub fn next_power_of_two(n: u32) -> u32 {
    let mut scaled = 1u32;
    while scaled < n {
        scaled <<= 1;
    }
    scaled
}

/// Number of levels in a chain that halves each dimension (clamped to 1)
/// until both reach 1.
pub fn mipmap_level_count(width: u32, height: u32) -> usize {
    let mut levels = 1;
    let mut w = width;
    let mut h = height;
    while w > 1 || h > 1 {
        w = (w >> 1).max(1);
        h = (h >> 1).max(1);
        levels += 1;
    }
    levels
}

/// Palette indices to opaque packed RGBA.
pub fn expand_palette(palette: &Palette, pixels: &[u8]) -> Vec<u32> {
    pixels.iter().map(|&p| palette.packed(p)).collect()
}

/// Per-channel average of four packed texels.
fn average4(texels: [u32; 4]) -> u32 {
    let mut out = [0u8; 4];
    for (c, o) in out.iter_mut().enumerate() {
        let sum: u32 = texels.iter().map(|t| t.to_le_bytes()[c] as u32).sum();
        *o = (sum >> 2) as u8;
    }
    u32::from_le_bytes(out)
}

/// Scales `input` to `outwidth` x `outheight`. Every output texel averages
/// two taps a quarter and three quarters of the way across its source
/// footprint, in both directions.
pub fn resample_texture(
    input: &[u32],
    inwidth: u32,
    inheight: u32,
    outwidth: u32,
    outheight: u32,
) -> Vec<u32> {
    let (inw, inh) = (inwidth as usize, inheight as usize);
    let fracstep = (inwidth as u64 * 0x10000) / outwidth as u64;

    let column_taps = |start: u64| -> Vec<usize> {
        let mut frac = start;
        (0..outwidth)
            .map(|_| {
                let col = ((frac >> 16) as usize).min(inw - 1);
                frac += fracstep;
                col
            })
            .collect()
    };
    let p1 = column_taps(fracstep >> 2);
    let p2 = column_taps(3 * (fracstep >> 2));

    let source_row = |i: u32, bias: f32| -> usize {
        let row = ((i as f32 + bias) * inheight as f32 / outheight as f32) as usize;
        row.min(inh - 1) * inw
    };

    let mut out = Vec::with_capacity(outwidth as usize * outheight as usize);
    for i in 0..outheight {
        let inrow = source_row(i, 0.25);
        let inrow2 = source_row(i, 0.75);
        for j in 0..outwidth as usize {
            out.push(average4([
                input[inrow + p1[j]],
                input[inrow + p2[j]],
                input[inrow2 + p1[j]],
                input[inrow2 + p2[j]],
            ]));
        }
    }
    out
}

/// Halves a level with a 2x2 box filter. A dimension already at 1 stays 1.
pub fn mip_map(input: &[u32], width: u32, height: u32) -> MipLevel {
    let (w, h) = (width as usize, height as usize);
    let out_w = (width >> 1).max(1);
    let out_h = (height >> 1).max(1);

    let mut data = Vec::with_capacity(out_w as usize * out_h as usize);
    for y in 0..out_h as usize {
        let y0 = (2 * y).min(h - 1) * w;
        let y1 = (2 * y + 1).min(h - 1) * w;
        for x in 0..out_w as usize {
            let x0 = (2 * x).min(w - 1);
            let x1 = (2 * x + 1).min(w - 1);
            data.push(average4([input[y0 + x0], input[y0 + x1], input[y1 + x0], input[y1 + x1]]));
        }
    }
    MipLevel {
        width: out_w,
        height: out_h,
        data,
    }
}

/// Builds the complete chain for an RGBA image, scaling to power-of-two
/// dimensions first when needed.
pub fn build_mip_chain(rgba: Vec<u32>, width: u32, height: u32) -> Vec<MipLevel> {
    let scaled_width = next_power_of_two(width);
    let scaled_height = next_power_of_two(height);
    let base = if scaled_width == width && scaled_height == height {
        rgba
    } else {
        resample_texture(&rgba, width, height, scaled_width, scaled_height)
    };

    let mut levels = Vec::with_capacity(mipmap_level_count(scaled_width, scaled_height));
    levels.push(MipLevel {
        width: scaled_width,
        height: scaled_height,
        data: base,
    });
    loop {
        let last = &levels[levels.len() - 1];
        if last.width == 1 && last.height == 1 {
            break;
        }
        let next = mip_map(&last.data, last.width, last.height);
        levels.push(next);
    }
    levels
}

/// Expands one texture table entry. Missing or empty entries yield `None`.
pub fn decode_miptex(palette: &Palette, mip: &MipTex) -> QResult<Option<Vec<MipLevel>>> {
    if mip.is_missing() || mip.width == 0 || mip.height == 0 {
        return Ok(None);
    }
    let texels = mip.width as usize * mip.height as usize;
    if mip.pixels.len() < texels {
        return Err(QError::CorruptData(format!(
            "texture {}: {} pixels for {}x{}",
            mip.name,
            mip.pixels.len(),
            mip.width,
            mip.height
        )));
    }
    let rgba = expand_palette(palette, &mip.pixels[..texels]);
    Ok(Some(build_mip_chain(rgba, mip.width, mip.height)))
}

// ============================================================
// Texture set
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct TextureSlot {
    pub name: String,
    pub flags: TextureFlags,
    pub handle: Option<TextureHandle>,
}

/// Every texture slot of a map. The first `num_textures` slots mirror the
/// texture table; the rest are reserved frames for animated and sky
/// textures.
#[derive(Debug, Default)]
pub struct TextureSet {
    slots: Vec<TextureSlot>,
    num_textures: usize,
}

impl TextureSet {
    /// Slots needed for a texture table: one per entry, plus the extra
    /// animation frames and sky layers.
    pub fn slot_count(textures: &[MipTex]) -> usize {
        textures.len()
            + textures
                .iter()
                .map(|t| TextureFlags::from_texture_name(&t.name).extra_slots())
                .sum::<usize>()
    }

    /// Expands every texture in parallel, then uploads them in table order.
    pub fn build<M, B>(map: &M, backend: &mut B) -> Result<Self, RenderError>
    where
        M: MapData + Sync + ?Sized,
        B: RenderBackend + ?Sized,
    {
        let textures = map.textures();
        let palette = map.palette();
        let total = Self::slot_count(textures);

        let decoded: Vec<Option<Vec<MipLevel>>> = textures
            .par_iter()
            .map(|mip| decode_miptex(palette, mip))
            .collect::<QResult<_>>()?;

        let mut slots = Vec::with_capacity(total);
        for (id, (mip, levels)) in textures.iter().zip(decoded).enumerate() {
            let mut slot = TextureSlot {
                name: mip.name.clone(),
                flags: TextureFlags::from_texture_name(&mip.name),
                handle: None,
            };
            if let Some(levels) = levels {
                let handle = TextureHandle {
                    id,
                    width: mip.width,
                    height: mip.height,
                };
                backend.upload_texture(handle, &mip.name, &levels)?;
                debug!(
                    "texture {} '{}' {}x{}, {} levels",
                    id,
                    mip.name,
                    mip.width,
                    mip.height,
                    levels.len()
                );
                slot.handle = Some(handle);
            }
            slots.push(slot);
        }

        for mip in textures {
            let flags = TextureFlags::from_texture_name(&mip.name);
            for _ in 0..flags.extra_slots() {
                slots.push(TextureSlot {
                    name: mip.name.clone(),
                    flags,
                    handle: None,
                });
            }
        }

        let set = Self {
            slots,
            num_textures: textures.len(),
        };
        if set.unpopulated_slots() > 0 {
            warn!(
                "{} animated/sky texture slots reserved but not populated",
                set.unpopulated_slots()
            );
        }
        Ok(set)
    }

    /// Total reserved slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Reserved animation and sky slots that hold no texture.
    pub fn unpopulated_slots(&self) -> usize {
        self.slots[self.num_textures..]
            .iter()
            .filter(|s| s.handle.is_none())
            .count()
    }

    pub fn slot(&self, id: usize) -> Option<&TextureSlot> {
        self.slots.get(id)
    }

    /// Handle for a texture table index; `None` when skipped or out of range.
    pub fn handle(&self, id: usize) -> Option<TextureHandle> {
        self.slots.get(id).and_then(|s| s.handle)
    }

    pub fn num_uploaded(&self) -> usize {
        self.slots.iter().filter(|s| s.handle.is_some()).count()
    }

    /// Hands every uploaded texture back to the backend.
    pub fn release<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        for slot in &mut self.slots {
            if let Some(handle) = slot.handle.take() {
                backend.release_texture(handle);
            }
        }
    }
}
