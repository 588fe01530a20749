//! BC1 (DXT1), BC3 (DXT5), BC4, BC5, BC6H and BC7 block decoders.
//!
//! Based on "bcdec.h - v0.98" by Sergii Kudlai, released into the public domain
//! (<https://github.com/iOrange/bcdec>), with the optimized BC1 interpolation
//! coefficients by Michael Schmidt and the BC6H/BC7 bit pulling routines by
//! Aras Pranckevicius.

use super::{BlockDecoder, Rgba};

pub(crate) struct Bc1Decoder;
pub(crate) struct Bc3Decoder;
pub(crate) struct Bc4Decoder;
pub(crate) struct Bc5Decoder;
#[cfg(feature = "bc6h")]
pub(crate) struct Bc6hDecoder<const SIGNED: bool>;
pub(crate) struct Bc7Decoder;

impl BlockDecoder for Bc1Decoder {
    #[inline(always)]
    fn decode_block(&self, compressed: &[u8], texels: &mut [Rgba]) {
        decode_color_block::<false>(compressed, texels);
    }

    fn block_byte_size(&self) -> usize {
        8
    }
}

impl BlockDecoder for Bc3Decoder {
    #[inline(always)]
    fn decode_block(&self, compressed: &[u8], texels: &mut [Rgba]) {
        decode_color_block::<true>(&compressed[8..], texels);
        decode_smooth_alpha_block::<3>(compressed, texels);
    }

    fn block_byte_size(&self) -> usize {
        16
    }
}

impl BlockDecoder for Bc4Decoder {
    #[inline(always)]
    fn decode_block(&self, compressed: &[u8], texels: &mut [Rgba]) {
        texels.fill([0, 0, 0, 0xFF]);
        decode_smooth_alpha_block::<0>(compressed, texels);
    }

    fn block_byte_size(&self) -> usize {
        8
    }
}

impl BlockDecoder for Bc5Decoder {
    #[inline(always)]
    fn decode_block(&self, compressed: &[u8], texels: &mut [Rgba]) {
        texels.fill([0, 0, 0, 0xFF]);
        decode_smooth_alpha_block::<0>(compressed, texels);
        decode_smooth_alpha_block::<1>(&compressed[8..], texels);
    }

    fn block_byte_size(&self) -> usize {
        16
    }
}

#[cfg(feature = "bc6h")]
impl<const SIGNED: bool> BlockDecoder for Bc6hDecoder<SIGNED> {
    fn decode_block(&self, compressed: &[u8], texels: &mut [Rgba]) {
        let hdr = decode_bc6h_texels(compressed, SIGNED);
        for (texel, [r, g, b]) in texels.iter_mut().zip(hdr) {
            *texel = [half_to_unorm8(r), half_to_unorm8(g), half_to_unorm8(b), 0xFF];
        }
    }

    fn block_byte_size(&self) -> usize {
        16
    }
}

impl BlockDecoder for Bc7Decoder {
    fn decode_block(&self, compressed: &[u8], texels: &mut [Rgba]) {
        decode_bc7_block(compressed, texels);
    }

    fn block_byte_size(&self) -> usize {
        16
    }
}

/// Splits a packed RGB565 color into its 5, 6 and 5 bit channels.
#[inline(always)]
fn unpack_565(color: u16) -> [u32; 3] {
    [
        ((color >> 11) & 0x1F) as u32,
        ((color >> 5) & 0x3F) as u32,
        (color & 0x1F) as u32,
    ]
}

/// Builds the four reference colors of a BC1 color block.
///
/// With `OPAQUE_MODE` (the color half of BC3) the four color mode is always used.
#[inline(always)]
fn color_palette<const OPAQUE_MODE: bool>(c0: u16, c1: u16) -> [Rgba; 4] {
    let [r0, g0, b0] = unpack_565(c0);
    let [r1, g1, b1] = unpack_565(c1);

    let expand = |r: u32, g: u32, b: u32| -> Rgba {
        [
            ((r * 527 + 23) >> 6) as u8,
            ((g * 259 + 33) >> 6) as u8,
            ((b * 527 + 23) >> 6) as u8,
            0xFF,
        ]
    };

    let mut palette = [expand(r0, g0, b0), expand(r1, g1, b1), [0; 4], [0; 4]];

    if c0 > c1 || OPAQUE_MODE {
        // color_2 = 2/3*color_0 + 1/3*color_1
        // color_3 = 1/3*color_0 + 2/3*color_1
        palette[2] = [
            (((2 * r0 + r1) * 351 + 61) >> 7) as u8,
            (((2 * g0 + g1) * 2763 + 1039) >> 11) as u8,
            (((2 * b0 + b1) * 351 + 61) >> 7) as u8,
            0xFF,
        ];
        palette[3] = [
            (((r0 + 2 * r1) * 351 + 61) >> 7) as u8,
            (((g0 + 2 * g1) * 2763 + 1039) >> 11) as u8,
            (((b0 + 2 * b1) * 351 + 61) >> 7) as u8,
            0xFF,
        ];
    } else {
        // Punch-through mode: color_2 is the midpoint, color_3 is transparent black.
        palette[2] = [
            (((r0 + r1) * 1053 + 125) >> 8) as u8,
            (((g0 + g1) * 4145 + 1019) >> 11) as u8,
            (((b0 + b1) * 1053 + 125) >> 8) as u8,
            0xFF,
        ];
    }

    palette
}

/// Decodes an 8 byte BC1 color block into all four channels of `texels`.
#[inline(always)]
pub(super) fn decode_color_block<const OPAQUE_MODE: bool>(compressed: &[u8], texels: &mut [Rgba]) {
    let c0 = u16::from_le_bytes([compressed[0], compressed[1]]);
    let c1 = u16::from_le_bytes([compressed[2], compressed[3]]);
    let palette = color_palette::<OPAQUE_MODE>(c0, c1);

    let mut indices = u32::from_le_bytes([compressed[4], compressed[5], compressed[6], compressed[7]]);
    for texel in texels.iter_mut().take(16) {
        *texel = palette[(indices & 0x03) as usize];
        indices >>= 2;
    }
}

/// Builds the eight values of an interpolated alpha (BC4) block.
#[inline(always)]
#[rustfmt::skip]
pub(super) fn alpha_palette(a0: u8, a1: u8) -> [u8; 8] {
    let (a0, a1) = (a0 as u16, a1 as u16);
    let mut alpha = [a0 as u8, a1 as u8, 0, 0, 0, 0, 0, 0];

    if a0 > a1 {
        // 6 interpolated alpha values
        alpha[2] = ((6 * a0 +     a1) / 7) as u8;   // 6/7*alpha_0 + 1/7*alpha_1
        alpha[3] = ((5 * a0 + 2 * a1) / 7) as u8;   // 5/7*alpha_0 + 2/7*alpha_1
        alpha[4] = ((4 * a0 + 3 * a1) / 7) as u8;   // 4/7*alpha_0 + 3/7*alpha_1
        alpha[5] = ((3 * a0 + 4 * a1) / 7) as u8;   // 3/7*alpha_0 + 4/7*alpha_1
        alpha[6] = ((2 * a0 + 5 * a1) / 7) as u8;   // 2/7*alpha_0 + 5/7*alpha_1
        alpha[7] = ((    a0 + 6 * a1) / 7) as u8;   // 1/7*alpha_0 + 6/7*alpha_1
    } else {
        // 4 interpolated alpha values
        alpha[2] = ((4 * a0 +     a1) / 5) as u8;   // 4/5*alpha_0 + 1/5*alpha_1
        alpha[3] = ((3 * a0 + 2 * a1) / 5) as u8;   // 3/5*alpha_0 + 2/5*alpha_1
        alpha[4] = ((2 * a0 + 3 * a1) / 5) as u8;   // 2/5*alpha_0 + 3/5*alpha_1
        alpha[5] = ((    a0 + 4 * a1) / 5) as u8;   // 1/5*alpha_0 + 4/5*alpha_1
        alpha[6] = 0x00;
        alpha[7] = 0xFF;
    }

    alpha
}

/// Decodes an 8 byte interpolated single channel block into channel `CHANNEL` of `texels`.
#[inline(always)]
pub(super) fn decode_smooth_alpha_block<const CHANNEL: usize>(compressed: &[u8], texels: &mut [Rgba]) {
    let mut block = [0u8; 8];
    block.copy_from_slice(&compressed[..8]);
    let block = u64::from_le_bytes(block);

    let alpha = alpha_palette(block as u8, (block >> 8) as u8);

    let mut indices = block >> 16;
    for texel in texels.iter_mut().take(16) {
        texel[CHANNEL] = alpha[(indices & 0x07) as usize];
        indices >>= 3;
    }
}

// There are 64 possible partition sets for a two-region tile and 64 for a three-region tile.
// Each 4x4 block represents a single shape. Every fix-up index has its MSB set.
// BC6H uses the first 32 two-region shapes.
static PARTITIONS2: &[[[u8; 4]; 4]; 64] = &[
    [[128, 0, 1, 1], [0, 0, 1, 1], [0, 0, 1, 1], [0, 0, 1, 129]], //  0
    [[128, 0, 0, 1], [0, 0, 0, 1], [0, 0, 0, 1], [0, 0, 0, 129]], //  1
    [[128, 1, 1, 1], [0, 1, 1, 1], [0, 1, 1, 1], [0, 1, 1, 129]], //  2
    [[128, 0, 0, 1], [0, 0, 1, 1], [0, 0, 1, 1], [0, 1, 1, 129]], //  3
    [[128, 0, 0, 0], [0, 0, 0, 1], [0, 0, 0, 1], [0, 0, 1, 129]], //  4
    [[128, 0, 1, 1], [0, 1, 1, 1], [0, 1, 1, 1], [1, 1, 1, 129]], //  5
    [[128, 0, 0, 1], [0, 0, 1, 1], [0, 1, 1, 1], [1, 1, 1, 129]], //  6
    [[128, 0, 0, 0], [0, 0, 0, 1], [0, 0, 1, 1], [0, 1, 1, 129]], //  7
    [[128, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 1], [0, 0, 1, 129]], //  8
    [[128, 0, 1, 1], [0, 1, 1, 1], [1, 1, 1, 1], [1, 1, 1, 129]], //  9
    [[128, 0, 0, 0], [0, 0, 0, 1], [0, 1, 1, 1], [1, 1, 1, 129]], // 10
    [[128, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 1], [0, 1, 1, 129]], // 11
    [[128, 0, 0, 1], [0, 1, 1, 1], [1, 1, 1, 1], [1, 1, 1, 129]], // 12
    [[128, 0, 0, 0], [0, 0, 0, 0], [1, 1, 1, 1], [1, 1, 1, 129]], // 13
    [[128, 0, 0, 0], [1, 1, 1, 1], [1, 1, 1, 1], [1, 1, 1, 129]], // 14
    [[128, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0], [1, 1, 1, 129]], // 15
    [[128, 0, 0, 0], [1, 0, 0, 0], [1, 1, 1, 0], [1, 1, 1, 129]], // 16
    [[128, 1, 129, 1], [0, 0, 0, 1], [0, 0, 0, 0], [0, 0, 0, 0]], // 17
    [[128, 0, 0, 0], [0, 0, 0, 0], [129, 0, 0, 0], [1, 1, 1, 0]], // 18
    [[128, 1, 129, 1], [0, 0, 1, 1], [0, 0, 0, 1], [0, 0, 0, 0]], // 19
    [[128, 0, 129, 1], [0, 0, 0, 1], [0, 0, 0, 0], [0, 0, 0, 0]], // 20
    [[128, 0, 0, 0], [1, 0, 0, 0], [129, 1, 0, 0], [1, 1, 1, 0]], // 21
    [[128, 0, 0, 0], [0, 0, 0, 0], [129, 0, 0, 0], [1, 1, 0, 0]], // 22
    [[128, 1, 1, 1], [0, 0, 1, 1], [0, 0, 1, 1], [0, 0, 0, 129]], // 23
    [[128, 0, 129, 1], [0, 0, 0, 1], [0, 0, 0, 1], [0, 0, 0, 0]], // 24
    [[128, 0, 0, 0], [1, 0, 0, 0], [129, 0, 0, 0], [1, 1, 0, 0]], // 25
    [[128, 1, 129, 0], [0, 1, 1, 0], [0, 1, 1, 0], [0, 1, 1, 0]], // 26
    [[128, 0, 129, 1], [0, 1, 1, 0], [0, 1, 1, 0], [1, 1, 0, 0]], // 27
    [[128, 0, 0, 1], [0, 1, 1, 1], [129, 1, 1, 0], [1, 0, 0, 0]], // 28
    [[128, 0, 0, 0], [1, 1, 1, 1], [129, 1, 1, 1], [0, 0, 0, 0]], // 29
    [[128, 1, 129, 1], [0, 0, 0, 1], [1, 0, 0, 0], [1, 1, 1, 0]], // 30
    [[128, 0, 129, 1], [1, 0, 0, 1], [1, 0, 0, 1], [1, 1, 0, 0]], // 31
    [[128, 1, 0, 1], [0, 1, 0, 1], [0, 1, 0, 1], [0, 1, 0, 129]], // 32
    [[128, 0, 0, 0], [1, 1, 1, 1], [0, 0, 0, 0], [1, 1, 1, 129]], // 33
    [[128, 1, 0, 1], [1, 0, 129, 0], [0, 1, 0, 1], [1, 0, 1, 0]], // 34
    [[128, 0, 1, 1], [0, 0, 1, 1], [129, 1, 0, 0], [1, 1, 0, 0]], // 35
    [[128, 0, 129, 1], [1, 1, 0, 0], [0, 0, 1, 1], [1, 1, 0, 0]], // 36
    [[128, 1, 0, 1], [0, 1, 0, 1], [129, 0, 1, 0], [1, 0, 1, 0]], // 37
    [[128, 1, 1, 0], [1, 0, 0, 1], [0, 1, 1, 0], [1, 0, 0, 129]], // 38
    [[128, 1, 0, 1], [1, 0, 1, 0], [1, 0, 1, 0], [0, 1, 0, 129]], // 39
    [[128, 1, 129, 1], [0, 0, 1, 1], [1, 1, 0, 0], [1, 1, 1, 0]], // 40
    [[128, 0, 0, 1], [0, 0, 1, 1], [129, 1, 0, 0], [1, 0, 0, 0]], // 41
    [[128, 0, 129, 1], [0, 0, 1, 0], [0, 1, 0, 0], [1, 1, 0, 0]], // 42
    [[128, 0, 129, 1], [1, 0, 1, 1], [1, 1, 0, 1], [1, 1, 0, 0]], // 43
    [[128, 1, 129, 0], [1, 0, 0, 1], [1, 0, 0, 1], [0, 1, 1, 0]], // 44
    [[128, 0, 1, 1], [1, 1, 0, 0], [1, 1, 0, 0], [0, 0, 1, 129]], // 45
    [[128, 1, 1, 0], [0, 1, 1, 0], [1, 0, 0, 1], [1, 0, 0, 129]], // 46
    [[128, 0, 0, 0], [0, 1, 129, 0], [0, 1, 1, 0], [0, 0, 0, 0]], // 47
    [[128, 1, 0, 0], [1, 1, 129, 0], [0, 1, 0, 0], [0, 0, 0, 0]], // 48
    [[128, 0, 129, 0], [0, 1, 1, 1], [0, 0, 1, 0], [0, 0, 0, 0]], // 49
    [[128, 0, 0, 0], [0, 0, 129, 0], [0, 1, 1, 1], [0, 0, 1, 0]], // 50
    [[128, 0, 0, 0], [0, 1, 0, 0], [129, 1, 1, 0], [0, 1, 0, 0]], // 51
    [[128, 1, 1, 0], [1, 1, 0, 0], [1, 0, 0, 1], [0, 0, 1, 129]], // 52
    [[128, 0, 1, 1], [0, 1, 1, 0], [1, 1, 0, 0], [1, 0, 0, 129]], // 53
    [[128, 1, 129, 0], [0, 0, 1, 1], [1, 0, 0, 1], [1, 1, 0, 0]], // 54
    [[128, 0, 129, 1], [1, 0, 0, 1], [1, 1, 0, 0], [0, 1, 1, 0]], // 55
    [[128, 1, 1, 0], [1, 1, 0, 0], [1, 1, 0, 0], [1, 0, 0, 129]], // 56
    [[128, 1, 1, 0], [0, 0, 1, 1], [0, 0, 1, 1], [1, 0, 0, 129]], // 57
    [[128, 1, 1, 1], [1, 1, 1, 0], [1, 0, 0, 0], [0, 0, 0, 129]], // 58
    [[128, 0, 0, 1], [1, 0, 0, 0], [1, 1, 1, 0], [0, 1, 1, 129]], // 59
    [[128, 0, 0, 0], [1, 1, 1, 1], [0, 0, 1, 1], [0, 0, 1, 129]], // 60
    [[128, 0, 129, 1], [0, 0, 1, 1], [1, 1, 1, 1], [0, 0, 0, 0]], // 61
    [[128, 0, 129, 0], [0, 0, 1, 0], [1, 1, 1, 0], [1, 1, 1, 0]], // 62
    [[128, 1, 0, 0], [0, 1, 0, 0], [0, 1, 1, 1], [0, 1, 1, 129]], // 63
];

static PARTITIONS3: &[[[u8; 4]; 4]; 64] = &[
    [[128, 0, 1, 129], [0, 0, 1, 1], [0, 2, 2, 1], [2, 2, 2, 130]], //  0
    [[128, 0, 0, 129], [0, 0, 1, 1], [130, 2, 1, 1], [2, 2, 2, 1]], //  1
    [[128, 0, 0, 0], [2, 0, 0, 1], [130, 2, 1, 1], [2, 2, 1, 129]], //  2
    [[128, 2, 2, 130], [0, 0, 2, 2], [0, 0, 1, 1], [0, 1, 1, 129]], //  3
    [[128, 0, 0, 0], [0, 0, 0, 0], [129, 1, 2, 2], [1, 1, 2, 130]], //  4
    [[128, 0, 1, 129], [0, 0, 1, 1], [0, 0, 2, 2], [0, 0, 2, 130]], //  5
    [[128, 0, 2, 130], [0, 0, 2, 2], [1, 1, 1, 1], [1, 1, 1, 129]], //  6
    [[128, 0, 1, 1], [0, 0, 1, 1], [130, 2, 1, 1], [2, 2, 1, 129]], //  7
    [[128, 0, 0, 0], [0, 0, 0, 0], [129, 1, 1, 1], [2, 2, 2, 130]], //  8
    [[128, 0, 0, 0], [1, 1, 1, 1], [129, 1, 1, 1], [2, 2, 2, 130]], //  9
    [[128, 0, 0, 0], [1, 1, 129, 1], [2, 2, 2, 2], [2, 2, 2, 130]], // 10
    [[128, 0, 1, 2], [0, 0, 129, 2], [0, 0, 1, 2], [0, 0, 1, 130]], // 11
    [[128, 1, 1, 2], [0, 1, 129, 2], [0, 1, 1, 2], [0, 1, 1, 130]], // 12
    [[128, 1, 2, 2], [0, 129, 2, 2], [0, 1, 2, 2], [0, 1, 2, 130]], // 13
    [[128, 0, 1, 129], [0, 1, 1, 2], [1, 1, 2, 2], [1, 2, 2, 130]], // 14
    [[128, 0, 1, 129], [2, 0, 0, 1], [130, 2, 0, 0], [2, 2, 2, 0]], // 15
    [[128, 0, 0, 129], [0, 0, 1, 1], [0, 1, 1, 2], [1, 1, 2, 130]], // 16
    [[128, 1, 1, 129], [0, 0, 1, 1], [130, 0, 0, 1], [2, 2, 0, 0]], // 17
    [[128, 0, 0, 0], [1, 1, 2, 2], [129, 1, 2, 2], [1, 1, 2, 130]], // 18
    [[128, 0, 2, 130], [0, 0, 2, 2], [0, 0, 2, 2], [1, 1, 1, 129]], // 19
    [[128, 1, 1, 129], [0, 1, 1, 1], [0, 2, 2, 2], [0, 2, 2, 130]], // 20
    [[128, 0, 0, 129], [0, 0, 0, 1], [130, 2, 2, 1], [2, 2, 2, 1]], // 21
    [[128, 0, 0, 0], [0, 0, 129, 1], [0, 1, 2, 2], [0, 1, 2, 130]], // 22
    [[128, 0, 0, 0], [1, 1, 0, 0], [130, 2, 129, 0], [2, 2, 1, 0]], // 23
    [[128, 1, 2, 130], [0, 129, 2, 2], [0, 0, 1, 1], [0, 0, 0, 0]], // 24
    [[128, 0, 1, 2], [0, 0, 1, 2], [129, 1, 2, 2], [2, 2, 2, 130]], // 25
    [[128, 1, 1, 0], [1, 2, 130, 1], [129, 2, 2, 1], [0, 1, 1, 0]], // 26
    [[128, 0, 0, 0], [0, 1, 129, 0], [1, 2, 130, 1], [1, 2, 2, 1]], // 27
    [[128, 0, 2, 2], [1, 1, 0, 2], [129, 1, 0, 2], [0, 0, 2, 130]], // 28
    [[128, 1, 1, 0], [0, 129, 1, 0], [2, 0, 0, 2], [2, 2, 2, 130]], // 29
    [[128, 0, 1, 1], [0, 1, 2, 2], [0, 1, 130, 2], [0, 0, 1, 129]], // 30
    [[128, 0, 0, 0], [2, 0, 0, 0], [130, 2, 1, 1], [2, 2, 2, 129]], // 31
    [[128, 0, 0, 0], [0, 0, 0, 2], [129, 1, 2, 2], [1, 2, 2, 130]], // 32
    [[128, 2, 2, 130], [0, 0, 2, 2], [0, 0, 1, 2], [0, 0, 1, 129]], // 33
    [[128, 0, 1, 129], [0, 0, 1, 2], [0, 0, 2, 2], [0, 2, 2, 130]], // 34
    [[128, 1, 2, 0], [0, 129, 2, 0], [0, 1, 130, 0], [0, 1, 2, 0]], // 35
    [[128, 0, 0, 0], [1, 1, 129, 1], [2, 2, 130, 2], [0, 0, 0, 0]], // 36
    [[128, 1, 2, 0], [1, 2, 0, 1], [130, 0, 129, 2], [0, 1, 2, 0]], // 37
    [[128, 1, 2, 0], [2, 0, 1, 2], [129, 130, 0, 1], [0, 1, 2, 0]], // 38
    [[128, 0, 1, 1], [2, 2, 0, 0], [1, 1, 130, 2], [0, 0, 1, 129]], // 39
    [[128, 0, 1, 1], [1, 1, 130, 2], [2, 2, 0, 0], [0, 0, 1, 129]], // 40
    [[128, 1, 0, 129], [0, 1, 0, 1], [2, 2, 2, 2], [2, 2, 2, 130]], // 41
    [[128, 0, 0, 0], [0, 0, 0, 0], [130, 1, 2, 1], [2, 1, 2, 129]], // 42
    [[128, 0, 2, 2], [1, 129, 2, 2], [0, 0, 2, 2], [1, 1, 2, 130]], // 43
    [[128, 0, 2, 130], [0, 0, 1, 1], [0, 0, 2, 2], [0, 0, 1, 129]], // 44
    [[128, 2, 2, 0], [1, 2, 130, 1], [0, 2, 2, 0], [1, 2, 2, 129]], // 45
    [[128, 1, 0, 1], [2, 2, 130, 2], [2, 2, 2, 2], [0, 1, 0, 129]], // 46
    [[128, 0, 0, 0], [2, 1, 2, 1], [130, 1, 2, 1], [2, 1, 2, 129]], // 47
    [[128, 1, 0, 129], [0, 1, 0, 1], [0, 1, 0, 1], [2, 2, 2, 130]], // 48
    [[128, 2, 2, 130], [0, 1, 1, 1], [0, 2, 2, 2], [0, 1, 1, 129]], // 49
    [[128, 0, 0, 2], [1, 129, 1, 2], [0, 0, 0, 2], [1, 1, 1, 130]], // 50
    [[128, 0, 0, 0], [2, 129, 1, 2], [2, 1, 1, 2], [2, 1, 1, 130]], // 51
    [[128, 2, 2, 2], [0, 129, 1, 1], [0, 1, 1, 1], [0, 2, 2, 130]], // 52
    [[128, 0, 0, 2], [1, 1, 1, 2], [129, 1, 1, 2], [0, 0, 0, 130]], // 53
    [[128, 1, 1, 0], [0, 129, 1, 0], [0, 1, 1, 0], [2, 2, 2, 130]], // 54
    [[128, 0, 0, 0], [0, 0, 0, 0], [2, 1, 129, 2], [2, 1, 1, 130]], // 55
    [[128, 1, 1, 0], [0, 129, 1, 0], [2, 2, 2, 2], [2, 2, 2, 130]], // 56
    [[128, 0, 2, 2], [0, 0, 1, 1], [0, 0, 129, 1], [0, 0, 2, 130]], // 57
    [[128, 0, 2, 2], [1, 1, 2, 2], [129, 1, 2, 2], [0, 0, 2, 130]], // 58
    [[128, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0], [2, 129, 1, 130]], // 59
    [[128, 0, 0, 130], [0, 0, 0, 1], [0, 0, 0, 2], [0, 0, 0, 129]], // 60
    [[128, 2, 2, 2], [1, 2, 2, 2], [0, 2, 2, 2], [129, 2, 2, 130]], // 61
    [[128, 1, 0, 129], [2, 2, 2, 2], [2, 2, 2, 2], [2, 2, 2, 130]], // 62
    [[128, 1, 1, 129], [2, 0, 1, 1], [130, 2, 0, 1], [2, 2, 2, 0]], // 63
];

static WEIGHT2: &[i32] = &[0, 21, 43, 64];
static WEIGHT3: &[i32] = &[0, 9, 18, 27, 37, 46, 55, 64];
static WEIGHT4: &[i32] = &[0, 4, 9, 13, 17, 21, 26, 30, 34, 38, 43, 47, 51, 55, 60, 64];

#[inline]
fn interpolate(a: i32, b: i32, weights: &[i32], index: i32) -> i32 {
    (a * (64 - weights[index as usize]) + b * weights[index as usize] + 32) >> 6
}

/// Converts a half float to an 8 bit normalized value, clamping to `[0, 1]`.
#[cfg(feature = "bc6h")]
#[inline]
fn half_to_unorm8(value: half::f16) -> u8 {
    let value = value.to_f32();
    if value.is_nan() || value <= 0.0 {
        0
    } else if value >= 1.0 {
        0xFF
    } else {
        (value * 255.0 + 0.5) as u8
    }
}

// Header values of a BC6H block, in endpoint major order: w, x, y, z for each of r, g, b.
#[cfg(feature = "bc6h")]
mod bc6h_fields {
    pub const RW: u8 = 0;
    pub const GW: u8 = 1;
    pub const BW: u8 = 2;
    pub const RX: u8 = 3;
    pub const GX: u8 = 4;
    pub const BX: u8 = 5;
    pub const RY: u8 = 6;
    pub const GY: u8 = 7;
    pub const BY: u8 = 8;
    pub const RZ: u8 = 9;
    pub const GZ: u8 = 10;
    pub const BZ: u8 = 11;
    /// Partition shape.
    pub const D: u8 = 12;
}

/// A run of `len` header bits landing in bits `shift..shift + len` of a header value.
///
/// Reversed runs store their first bit in the highest position.
#[cfg(feature = "bc6h")]
#[derive(Clone, Copy)]
struct Field {
    value: u8,
    shift: u8,
    len: u8,
    reversed: bool,
}

#[cfg(feature = "bc6h")]
const fn run(value: u8, len: u8) -> Field {
    Field { value, shift: 0, len, reversed: false }
}

#[cfg(feature = "bc6h")]
const fn bit(value: u8, shift: u8) -> Field {
    Field { value, shift, len: 1, reversed: false }
}

#[cfg(feature = "bc6h")]
const fn reversed(value: u8, shift: u8, len: u8) -> Field {
    Field { value, shift, len, reversed: true }
}

#[cfg(feature = "bc6h")]
struct Bc6hMode {
    /// Two or five bit mode selector.
    code: u32,
    /// Precision of the first endpoint.
    base_bits: u8,
    /// Precision of the remaining endpoints, per channel.
    delta_bits: [u8; 3],
    two_regions: bool,
    /// Whether the remaining endpoints are stored relative to the first one.
    transformed: bool,
    fields: &'static [Field],
}

#[cfg(feature = "bc6h")]
#[rustfmt::skip]
static BC6H_MODES: [Bc6hMode; 14] = {
    use self::bc6h_fields::*;

    [
        Bc6hMode { code: 0b00, base_bits: 10, delta_bits: [5, 5, 5], two_regions: true, transformed: true, fields: &[
            bit(GY, 4), bit(BY, 4), bit(BZ, 4), run(RW, 10), run(GW, 10), run(BW, 10), run(RX, 5), bit(GZ, 4),
            run(GY, 4), run(GX, 5), bit(BZ, 0), run(GZ, 4), run(BX, 5), bit(BZ, 1), run(BY, 4), run(RY, 5),
            bit(BZ, 2), run(RZ, 5), bit(BZ, 3), run(D, 5),
        ] },
        Bc6hMode { code: 0b01, base_bits: 7, delta_bits: [6, 6, 6], two_regions: true, transformed: true, fields: &[
            bit(GY, 5), bit(GZ, 4), bit(GZ, 5), run(RW, 7), bit(BZ, 0), bit(BZ, 1), bit(BY, 4), run(GW, 7),
            bit(BY, 5), bit(BZ, 2), bit(GY, 4), run(BW, 7), bit(BZ, 3), bit(BZ, 5), bit(BZ, 4), run(RX, 6),
            run(GY, 4), run(GX, 6), run(GZ, 4), run(BX, 6), run(BY, 4), run(RY, 6), run(RZ, 6), run(D, 5),
        ] },
        Bc6hMode { code: 0b00010, base_bits: 11, delta_bits: [5, 4, 4], two_regions: true, transformed: true, fields: &[
            run(RW, 10), run(GW, 10), run(BW, 10), run(RX, 5), bit(RW, 10), run(GY, 4), run(GX, 4), bit(GW, 10),
            bit(BZ, 0), run(GZ, 4), run(BX, 4), bit(BW, 10), bit(BZ, 1), run(BY, 4), run(RY, 5), bit(BZ, 2),
            run(RZ, 5), bit(BZ, 3), run(D, 5),
        ] },
        Bc6hMode { code: 0b00110, base_bits: 11, delta_bits: [4, 5, 4], two_regions: true, transformed: true, fields: &[
            run(RW, 10), run(GW, 10), run(BW, 10), run(RX, 4), bit(RW, 10), bit(GZ, 4), run(GY, 4), run(GX, 5),
            bit(GW, 10), run(GZ, 4), run(BX, 4), bit(BW, 10), bit(BZ, 1), run(BY, 4), run(RY, 4), bit(BZ, 0),
            bit(BZ, 2), run(RZ, 4), bit(GY, 4), bit(BZ, 3), run(D, 5),
        ] },
        Bc6hMode { code: 0b01010, base_bits: 11, delta_bits: [4, 4, 5], two_regions: true, transformed: true, fields: &[
            run(RW, 10), run(GW, 10), run(BW, 10), run(RX, 4), bit(RW, 10), bit(BY, 4), run(GY, 4), run(GX, 4),
            bit(GW, 10), bit(BZ, 0), run(GZ, 4), run(BX, 5), bit(BW, 10), run(BY, 4), run(RY, 4), bit(BZ, 1),
            bit(BZ, 2), run(RZ, 4), bit(BZ, 4), bit(BZ, 3), run(D, 5),
        ] },
        Bc6hMode { code: 0b01110, base_bits: 9, delta_bits: [5, 5, 5], two_regions: true, transformed: true, fields: &[
            run(RW, 9), bit(BY, 4), run(GW, 9), bit(GY, 4), run(BW, 9), bit(BZ, 4), run(RX, 5), bit(GZ, 4),
            run(GY, 4), run(GX, 5), bit(BZ, 0), run(GZ, 4), run(BX, 5), bit(BZ, 1), run(BY, 4), run(RY, 5),
            bit(BZ, 2), run(RZ, 5), bit(BZ, 3), run(D, 5),
        ] },
        Bc6hMode { code: 0b10010, base_bits: 8, delta_bits: [6, 5, 5], two_regions: true, transformed: true, fields: &[
            run(RW, 8), bit(GZ, 4), bit(BY, 4), run(GW, 8), bit(BZ, 2), bit(GY, 4), run(BW, 8), bit(BZ, 3),
            bit(BZ, 4), run(RX, 6), run(GY, 4), run(GX, 5), bit(BZ, 0), run(GZ, 4), run(BX, 5), bit(BZ, 1),
            run(BY, 4), run(RY, 6), run(RZ, 6), run(D, 5),
        ] },
        Bc6hMode { code: 0b10110, base_bits: 8, delta_bits: [5, 6, 5], two_regions: true, transformed: true, fields: &[
            run(RW, 8), bit(BZ, 0), bit(BY, 4), run(GW, 8), bit(GY, 5), bit(GY, 4), run(BW, 8), bit(GZ, 5),
            bit(BZ, 4), run(RX, 5), bit(GZ, 4), run(GY, 4), run(GX, 6), run(GZ, 4), run(BX, 5), bit(BZ, 1),
            run(BY, 4), run(RY, 5), bit(BZ, 2), run(RZ, 5), bit(BZ, 3), run(D, 5),
        ] },
        Bc6hMode { code: 0b11010, base_bits: 8, delta_bits: [5, 5, 6], two_regions: true, transformed: true, fields: &[
            run(RW, 8), bit(BZ, 1), bit(BY, 4), run(GW, 8), bit(BY, 5), bit(GY, 4), run(BW, 8), bit(BZ, 5),
            bit(BZ, 4), run(RX, 5), bit(GZ, 4), run(GY, 4), run(GX, 5), bit(BZ, 0), run(GZ, 4), run(BX, 6),
            run(BY, 4), run(RY, 5), bit(BZ, 2), run(RZ, 5), bit(BZ, 3), run(D, 5),
        ] },
        Bc6hMode { code: 0b11110, base_bits: 6, delta_bits: [6, 6, 6], two_regions: true, transformed: false, fields: &[
            run(RW, 6), bit(GZ, 4), bit(BZ, 0), bit(BZ, 1), bit(BY, 4), run(GW, 6), bit(GY, 5), bit(BY, 5),
            bit(BZ, 2), bit(GY, 4), run(BW, 6), bit(GZ, 5), bit(BZ, 3), bit(BZ, 5), bit(BZ, 4), run(RX, 6),
            run(GY, 4), run(GX, 6), run(GZ, 4), run(BX, 6), run(BY, 4), run(RY, 6), run(RZ, 6), run(D, 5),
        ] },
        Bc6hMode { code: 0b00011, base_bits: 10, delta_bits: [10, 10, 10], two_regions: false, transformed: false, fields: &[
            run(RW, 10), run(GW, 10), run(BW, 10), run(RX, 10), run(GX, 10), run(BX, 10),
        ] },
        Bc6hMode { code: 0b00111, base_bits: 11, delta_bits: [9, 9, 9], two_regions: false, transformed: true, fields: &[
            run(RW, 10), run(GW, 10), run(BW, 10), run(RX, 9), bit(RW, 10), run(GX, 9), bit(GW, 10), run(BX, 9),
            bit(BW, 10),
        ] },
        Bc6hMode { code: 0b01011, base_bits: 12, delta_bits: [8, 8, 8], two_regions: false, transformed: true, fields: &[
            run(RW, 10), run(GW, 10), run(BW, 10), run(RX, 8), reversed(RW, 10, 2), run(GX, 8), reversed(GW, 10, 2),
            run(BX, 8), reversed(BW, 10, 2),
        ] },
        Bc6hMode { code: 0b01111, base_bits: 16, delta_bits: [4, 4, 4], two_regions: false, transformed: true, fields: &[
            run(RW, 10), run(GW, 10), run(BW, 10), run(RX, 4), reversed(RW, 10, 6), run(GX, 4), reversed(GW, 10, 6),
            run(BX, 4), reversed(BW, 10, 6),
        ] },
    ]
};

/// Decodes a BC6H block into 16 RGB half float texels.
///
/// Reserved modes decode to black.
#[cfg(feature = "bc6h")]
fn decode_bc6h_texels(compressed_block: &[u8], is_signed: bool) -> [[half::f16; 3]; 16] {
    use half::f16;

    let mut texels = [[f16::ZERO; 3]; 16];
    let mut stream = BitStream::new(compressed_block);

    let mut code = stream.read_bits(2);
    if code > 1 {
        code |= stream.read_bits(3) << 2;
    }
    let Some(mode) = BC6H_MODES.iter().find(|mode| mode.code == code) else {
        return texels;
    };

    let mut values = [0i32; 13];
    for field in mode.fields {
        let len = u32::from(field.len);
        let mut bits = stream.read_bits(len);
        if field.reversed {
            bits = bits.reverse_bits() >> (32 - len);
        }
        values[field.value as usize] |= (bits as i32) << field.shift;
    }

    // endpoints[e][c]: w, x, y, z by r, g, b
    let mut endpoints = [[0i32; 3]; 4];
    for (e, endpoint) in endpoints.iter_mut().enumerate() {
        endpoint.copy_from_slice(&values[e * 3..e * 3 + 3]);
    }
    let partition = values[bc6h_fields::D as usize] as usize;

    let count = if mode.two_regions { 4 } else { 2 };
    let base_bits = i32::from(mode.base_bits);

    if is_signed {
        for component in &mut endpoints[0] {
            *component = extend_sign(*component, base_bits);
        }
    }
    if mode.transformed || is_signed {
        for endpoint in &mut endpoints[1..count] {
            for (component, bits) in endpoint.iter_mut().zip(mode.delta_bits) {
                *component = extend_sign(*component, i32::from(bits));
            }
        }
    }
    if mode.transformed {
        let base = endpoints[0];
        for endpoint in &mut endpoints[1..count] {
            for (component, base) in endpoint.iter_mut().zip(base) {
                *component = transform_inverse(*component, base, base_bits, is_signed);
            }
        }
    }
    for component in endpoints[..count].iter_mut().flatten() {
        *component = unquantize(*component, base_bits, is_signed);
    }

    let (weights, index_bits) = if mode.two_regions { (WEIGHT3, 3) } else { (WEIGHT4, 4) };

    for (i, texel) in texels.iter_mut().enumerate() {
        let shape = if !mode.two_regions {
            u8::from(i == 0) << 7
        } else {
            PARTITIONS2[partition][i / 4][i % 4]
        };

        // The fix-up index is stored with one bit less.
        let index = stream.read_bits(index_bits - u32::from(shape >> 7)) as i32;
        let first = usize::from(shape & 0x01) * 2;
        let (e0, e1) = (endpoints[first], endpoints[first + 1]);

        for c in 0..3 {
            let value = interpolate(e0[c], e1[c], weights, index);
            texel[c] = f16::from_bits(finish_unquantize(value, is_signed));
        }
    }

    texels
}

#[cfg(feature = "bc6h")]
#[inline]
fn extend_sign(value: i32, bits: i32) -> i32 {
    (value << (32 - bits)) >> (32 - bits)
}

/// Adds a delta to the first endpoint, wrapping at the base precision.
#[cfg(feature = "bc6h")]
#[inline]
fn transform_inverse(delta: i32, base: i32, bits: i32, is_signed: bool) -> i32 {
    let value = (delta + base) & ((1 << bits) - 1);
    if is_signed {
        extend_sign(value, bits)
    } else {
        value
    }
}

/// Expands a `bits` wide endpoint to the 16 bit interpolation range.
#[cfg(feature = "bc6h")]
#[inline]
fn unquantize(value: i32, bits: i32, is_signed: bool) -> i32 {
    if !is_signed {
        return match value {
            _ if bits >= 15 => value,
            0 => 0,
            _ if value == (1 << bits) - 1 => 0xFFFF,
            _ => ((value << 16) + 0x8000) >> bits,
        };
    }

    if bits >= 16 {
        return value;
    }
    let magnitude = match value.abs() {
        0 => 0,
        m if m >= (1 << (bits - 1)) - 1 => 0x7FFF,
        m => ((m << 15) + 0x4000) >> (bits - 1),
    };
    value.signum() * magnitude
}

/// Scales an interpolated value into half float bits.
#[cfg(feature = "bc6h")]
#[inline]
fn finish_unquantize(value: i32, is_signed: bool) -> u16 {
    if is_signed {
        let magnitude = ((value.abs() * 31) >> 5) as u16;
        if value < 0 {
            magnitude | 0x8000
        } else {
            magnitude
        }
    } else {
        ((value * 31) >> 6) as u16
    }
}

/// Per mode layout of a BC7 block.
struct Bc7Mode {
    subsets: usize,
    partition_bits: u32,
    rotation_bits: u32,
    index_selection_bits: u32,
    color_bits: u32,
    alpha_bits: u32,
    /// 0: no p-bits, 1: one p-bit per subset, 2: one p-bit per endpoint
    p_bits: u8,
    index_bits: u32,
    index_bits2: u32,
}

#[rustfmt::skip]
static BC7_MODES: [Bc7Mode; 8] = [
    Bc7Mode { subsets: 3, partition_bits: 4, rotation_bits: 0, index_selection_bits: 0, color_bits: 4, alpha_bits: 0, p_bits: 2, index_bits: 3, index_bits2: 0 },
    Bc7Mode { subsets: 2, partition_bits: 6, rotation_bits: 0, index_selection_bits: 0, color_bits: 6, alpha_bits: 0, p_bits: 1, index_bits: 3, index_bits2: 0 },
    Bc7Mode { subsets: 3, partition_bits: 6, rotation_bits: 0, index_selection_bits: 0, color_bits: 5, alpha_bits: 0, p_bits: 0, index_bits: 2, index_bits2: 0 },
    Bc7Mode { subsets: 2, partition_bits: 6, rotation_bits: 0, index_selection_bits: 0, color_bits: 7, alpha_bits: 0, p_bits: 2, index_bits: 2, index_bits2: 0 },
    Bc7Mode { subsets: 1, partition_bits: 0, rotation_bits: 2, index_selection_bits: 1, color_bits: 5, alpha_bits: 6, p_bits: 0, index_bits: 2, index_bits2: 3 },
    Bc7Mode { subsets: 1, partition_bits: 0, rotation_bits: 2, index_selection_bits: 0, color_bits: 7, alpha_bits: 8, p_bits: 0, index_bits: 2, index_bits2: 2 },
    Bc7Mode { subsets: 1, partition_bits: 0, rotation_bits: 0, index_selection_bits: 0, color_bits: 7, alpha_bits: 7, p_bits: 2, index_bits: 4, index_bits2: 0 },
    Bc7Mode { subsets: 2, partition_bits: 6, rotation_bits: 0, index_selection_bits: 0, color_bits: 5, alpha_bits: 5, p_bits: 2, index_bits: 2, index_bits2: 0 },
];

fn weight_table(bits: u32) -> &'static [i32] {
    match bits {
        2 => WEIGHT2,
        3 => WEIGHT3,
        _ => WEIGHT4,
    }
}

/// Shifts an endpoint component so its MSB lies in bit 7 and replicates the top bits into the gap.
#[inline]
fn expand_component(value: i32, precision: u32) -> i32 {
    let value = value << (8 - precision);
    value | (value >> precision)
}

/// Decodes a BC7 block into 16 RGBA8 texels.
fn decode_bc7_block(compressed_block: &[u8], texels: &mut [Rgba]) {
    // The mode is the position of the lowest set bit of the first byte.
    let mode = compressed_block[0].trailing_zeros() as usize;
    if mode >= 8 {
        // Reserved mode: transparent black.
        texels[..16].fill([0; 4]);
        return;
    }

    let layout = &BC7_MODES[mode];
    let mut bstream = BitStream::new(compressed_block);
    bstream.read_bits(mode as u32 + 1);

    let partition = bstream.read_bits(layout.partition_bits) as usize;
    let rotation = bstream.read_bits(layout.rotation_bits);
    let index_selection = bstream.read_bits(layout.index_selection_bits);

    let num_endpoints = layout.subsets * 2;
    let mut endpoints = [[0i32; 4]; 6];

    // RGB, channel by channel, then alpha (if any)
    for channel in 0..3 {
        for endpoint in endpoints.iter_mut().take(num_endpoints) {
            endpoint[channel] = bstream.read_bits(layout.color_bits) as i32;
        }
    }
    for endpoint in endpoints.iter_mut().take(num_endpoints) {
        endpoint[3] = bstream.read_bits(layout.alpha_bits) as i32;
    }

    let p_bit_shift = u32::from(layout.p_bits != 0);
    match layout.p_bits {
        1 => {
            for subset in 0..layout.subsets {
                let p = bstream.read_bits(1) as i32;
                for endpoint in &mut endpoints[subset * 2..subset * 2 + 2] {
                    for component in endpoint.iter_mut() {
                        *component = (*component << 1) | p;
                    }
                }
            }
        }
        2 => {
            for endpoint in endpoints.iter_mut().take(num_endpoints) {
                let p = bstream.read_bits(1) as i32;
                for component in endpoint.iter_mut() {
                    *component = (*component << 1) | p;
                }
            }
        }
        _ => {}
    }

    let color_precision = layout.color_bits + p_bit_shift;
    let alpha_precision = layout.alpha_bits + p_bit_shift;
    for endpoint in endpoints.iter_mut().take(num_endpoints) {
        for component in &mut endpoint[..3] {
            *component = expand_component(*component, color_precision);
        }
        endpoint[3] = if layout.alpha_bits == 0 {
            0xFF
        } else {
            expand_component(endpoint[3], alpha_precision)
        };
    }

    let shape = |i: usize| -> u8 {
        match layout.subsets {
            1 => {
                if i == 0 {
                    0x80
                } else {
                    0
                }
            }
            2 => PARTITIONS2[partition][i / 4][i % 4],
            _ => PARTITIONS3[partition][i / 4][i % 4],
        }
    };

    // Pass #1: primary indices, one bit less at the fix-up positions
    let mut indices = [0i32; 16];
    for (i, index) in indices.iter_mut().enumerate() {
        let bits = layout.index_bits - u32::from(shape(i) >> 7);
        *index = bstream.read_bits(bits) as i32;
    }

    // Pass #2: secondary indices, then interpolation and rotation
    let weights = weight_table(layout.index_bits);
    let weights2 = weight_table(layout.index_bits2);

    for (i, texel) in texels.iter_mut().take(16).enumerate() {
        let subset = (shape(i) & 0x03) as usize;
        let (e0, e1) = (endpoints[subset * 2], endpoints[subset * 2 + 1]);
        let index = indices[i];

        let mut color = [0i32; 4];
        if layout.index_bits2 == 0 {
            for c in 0..4 {
                color[c] = interpolate(e0[c], e1[c], weights, index);
            }
        } else {
            let bits = layout.index_bits2 - u32::from(i == 0);
            let index2 = bstream.read_bits(bits) as i32;

            let (color_weights, color_index, alpha_weights, alpha_index) = if index_selection == 0 {
                (weights, index, weights2, index2)
            } else {
                (weights2, index2, weights, index)
            };
            for c in 0..3 {
                color[c] = interpolate(e0[c], e1[c], color_weights, color_index);
            }
            color[3] = interpolate(e0[3], e1[3], alpha_weights, alpha_index);
        }

        match rotation {
            1 => color.swap(3, 0), // Scalar(R) Vector(AGB)
            2 => color.swap(3, 1), // Scalar(G) Vector(RAB)
            3 => color.swap(3, 2), // Scalar(B) Vector(RGA)
            _ => {}
        }

        *texel = color.map(|c| c as u8);
    }
}

/// Little endian bit reader over a 128 bit block.
#[derive(Debug, Clone, Copy)]
struct BitStream(u128);

impl BitStream {
    #[inline]
    fn new(data: &[u8]) -> Self {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&data[..16]);
        Self(u128::from_le_bytes(bytes))
    }

    /// Reads up to 32 bits, first bit in the lowest position.
    #[inline]
    fn read_bits(&mut self, num_bits: u32) -> u32 {
        let bits = (self.0 & ((1u128 << num_bits) - 1)) as u32;
        self.0 >>= num_bits;
        bits
    }
}
