//! ATC (AMD/Qualcomm) RGB and explicit interpolated alpha block decoders.

use super::{
    block::decode_smooth_alpha_block,
    BlockDecoder, Rgba,
};

pub(crate) struct AtcRgb4Decoder;
pub(crate) struct AtcRgba8Decoder;

impl BlockDecoder for AtcRgb4Decoder {
    #[inline(always)]
    fn decode_block(&self, compressed: &[u8], texels: &mut [Rgba]) {
        decode_atc_color_block(compressed, texels);
    }

    fn block_byte_size(&self) -> usize {
        8
    }
}

impl BlockDecoder for AtcRgba8Decoder {
    #[inline(always)]
    fn decode_block(&self, compressed: &[u8], texels: &mut [Rgba]) {
        decode_atc_color_block(&compressed[8..], texels);
        decode_smooth_alpha_block::<3>(compressed, texels);
    }

    fn block_byte_size(&self) -> usize {
        16
    }
}

#[inline(always)]
fn expand_5(c: u16) -> u32 {
    let c = (c & 0x1F) as u32;
    (c << 3) | (c >> 2)
}

#[inline(always)]
fn expand_6(c: u16) -> u32 {
    let c = (c & 0x3F) as u32;
    (c << 2) | (c >> 4)
}

/// Decodes an 8 byte ATC color block.
///
/// `color_0` is RGB555 with its top bit selecting the alternate palette,
/// `color_1` is RGB565.
fn decode_atc_color_block(compressed: &[u8], texels: &mut [Rgba]) {
    let c0 = u16::from_le_bytes([compressed[0], compressed[1]]);
    let c1 = u16::from_le_bytes([compressed[2], compressed[3]]);

    let color_0 = [expand_5(c0 >> 10), expand_5(c0 >> 5), expand_5(c0)];
    let color_1 = [expand_5(c1 >> 11), expand_6(c1 >> 5), expand_5(c1)];

    let mut palette = [[0u32; 3]; 4];
    if c0 & 0x8000 == 0 {
        palette[0] = color_0;
        palette[3] = color_1;
        for c in 0..3 {
            palette[1][c] = (5 * color_0[c] + 3 * color_1[c]) / 8;
            palette[2][c] = (3 * color_0[c] + 5 * color_1[c]) / 8;
        }
    } else {
        // palette[0] stays black
        palette[2] = color_0;
        palette[3] = color_1;
        for c in 0..3 {
            palette[1][c] = color_0[c].saturating_sub(color_1[c] / 4);
        }
    }

    let mut indices = u32::from_le_bytes([compressed[4], compressed[5], compressed[6], compressed[7]]);
    for texel in texels.iter_mut().take(16) {
        let [r, g, b] = palette[(indices & 0x03) as usize];
        *texel = [r as u8, g as u8, b as u8, 0xFF];
        indices >>= 2;
    }
}
