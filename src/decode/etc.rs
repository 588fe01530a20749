//! ETC1, ETC2 (with punch-through or EAC alpha) and EAC R11/RG11 block decoders.
//!
//! All ETC family blocks store their per-texel selectors column-major, texel
//! `i` lives at `x = i / 4, y = i % 4`.

use super::{BlockDecoder, Rgba};

pub(crate) struct Etc1Decoder;
pub(crate) struct Etc2Decoder;
pub(crate) struct Etc2A1Decoder;
pub(crate) struct Etc2A8Decoder;
pub(crate) struct EacRDecoder<const SIGNED: bool>;
pub(crate) struct EacRgDecoder<const SIGNED: bool>;

impl BlockDecoder for Etc1Decoder {
    fn decode_block(&self, compressed: &[u8], texels: &mut [Rgba]) {
        let base = if compressed[3] & 0x02 != 0 {
            differential_base_colors(compressed, true)
        } else {
            individual_base_colors(compressed)
        };
        decode_subblocks(compressed, texels, base, false);
    }

    fn block_byte_size(&self) -> usize {
        8
    }
}

impl BlockDecoder for Etc2Decoder {
    fn decode_block(&self, compressed: &[u8], texels: &mut [Rgba]) {
        decode_etc2_color::<false>(compressed, texels);
    }

    fn block_byte_size(&self) -> usize {
        8
    }
}

impl BlockDecoder for Etc2A1Decoder {
    fn decode_block(&self, compressed: &[u8], texels: &mut [Rgba]) {
        decode_etc2_color::<true>(compressed, texels);
    }

    fn block_byte_size(&self) -> usize {
        8
    }
}

impl BlockDecoder for Etc2A8Decoder {
    fn decode_block(&self, compressed: &[u8], texels: &mut [Rgba]) {
        decode_etc2_color::<false>(&compressed[8..], texels);
        for (texel, alpha) in texels.iter_mut().zip(decode_eac_alpha(compressed)) {
            texel[3] = alpha;
        }
    }

    fn block_byte_size(&self) -> usize {
        16
    }
}

impl<const SIGNED: bool> BlockDecoder for EacRDecoder<SIGNED> {
    fn decode_block(&self, compressed: &[u8], texels: &mut [Rgba]) {
        for (texel, red) in texels.iter_mut().zip(decode_eac_r11::<SIGNED>(compressed)) {
            *texel = [red, 0, 0, 0xFF];
        }
    }

    fn block_byte_size(&self) -> usize {
        8
    }
}

impl<const SIGNED: bool> BlockDecoder for EacRgDecoder<SIGNED> {
    fn decode_block(&self, compressed: &[u8], texels: &mut [Rgba]) {
        let red = decode_eac_r11::<SIGNED>(compressed);
        let green = decode_eac_r11::<SIGNED>(&compressed[8..]);
        for (i, texel) in texels.iter_mut().take(16).enumerate() {
            *texel = [red[i], green[i], 0, 0xFF];
        }
    }

    fn block_byte_size(&self) -> usize {
        16
    }
}

static ETC1_MODIFIERS: [[i32; 2]; 8] = [
    [2, 8],
    [5, 17],
    [9, 29],
    [13, 42],
    [18, 60],
    [24, 80],
    [33, 106],
    [47, 183],
];

/// T and H mode paint color distances.
static ETC2_DISTANCES: [i32; 8] = [3, 6, 11, 16, 23, 32, 41, 64];

#[rustfmt::skip]
static EAC_MODIFIERS: [[i32; 8]; 16] = [
    [-3, -6, -9, -15, 2, 5, 8, 14],
    [-3, -7, -10, -13, 2, 6, 9, 12],
    [-2, -5, -8, -13, 1, 4, 7, 12],
    [-2, -4, -6, -13, 1, 3, 5, 12],
    [-3, -6, -8, -12, 2, 5, 7, 11],
    [-3, -7, -9, -11, 2, 6, 8, 10],
    [-4, -7, -8, -11, 3, 6, 7, 10],
    [-3, -5, -8, -11, 2, 4, 7, 10],
    [-2, -6, -8, -10, 1, 5, 7, 9],
    [-2, -5, -8, -10, 1, 4, 7, 9],
    [-2, -4, -8, -10, 1, 3, 7, 9],
    [-2, -5, -7, -10, 1, 4, 6, 9],
    [-3, -4, -7, -10, 2, 3, 6, 9],
    [-1, -2, -3, -10, 0, 1, 2, 9],
    [-4, -6, -8, -9, 3, 5, 7, 8],
    [-3, -5, -7, -9, 2, 4, 6, 8],
];

#[inline(always)]
fn extend_4(c: u8) -> i32 {
    let c = c & 0x0F;
    ((c << 4) | c) as i32
}

#[inline(always)]
fn extend_5(c: u8) -> i32 {
    let c = c & 0x1F;
    ((c << 3) | (c >> 2)) as i32
}

#[inline(always)]
fn extend_6(c: u8) -> i32 {
    let c = c & 0x3F;
    ((c << 2) | (c >> 4)) as i32
}

#[inline(always)]
fn extend_7(c: u8) -> i32 {
    let c = c & 0x7F;
    ((c << 1) | (c >> 6)) as i32
}

#[inline(always)]
fn clamp(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Sign extends the 3 bit delta stored in the low bits of a differential color byte.
#[inline(always)]
fn delta(byte: u8) -> i32 {
    (((byte as i8) << 5) >> 5) as i32
}

#[inline(always)]
fn selector_word(block: &[u8]) -> u32 {
    u32::from_be_bytes([block[4], block[5], block[6], block[7]])
}

/// Two bit selector of texel `i`, MSB from the high half word and LSB from the low.
#[inline(always)]
fn selector_index(selectors: u32, i: usize) -> usize {
    ((((selectors >> (16 + i)) & 1) << 1) | ((selectors >> i) & 1)) as usize
}

fn individual_base_colors(block: &[u8]) -> [[i32; 3]; 2] {
    let mut base = [[0; 3]; 2];
    for c in 0..3 {
        base[0][c] = extend_4(block[c] >> 4);
        base[1][c] = extend_4(block[c]);
    }
    base
}

/// Base colors of the differential mode. ETC1 wraps overflowing sums.
fn differential_base_colors(block: &[u8], wrap: bool) -> [[i32; 3]; 2] {
    let mut base = [[0; 3]; 2];
    for c in 0..3 {
        let value = (block[c] >> 3) as i32;
        let mut second = value + delta(block[c]);
        if wrap {
            second &= 0x1F;
        }
        base[0][c] = extend_5(value as u8);
        base[1][c] = extend_5(second as u8);
    }
    base
}

/// Applies the per-subblock luminance modifiers shared by ETC1 and the ETC2 differential mode.
///
/// In punch-through mode selector 2 is transparent and selector 0 keeps the base color.
fn decode_subblocks(block: &[u8], texels: &mut [Rgba], base: [[i32; 3]; 2], punch_through: bool) {
    let tables = [(block[3] >> 5) as usize, ((block[3] >> 2) & 0x07) as usize];
    let flip = block[3] & 0x01 != 0;
    let selectors = selector_word(block);

    for i in 0..16 {
        let (x, y) = (i / 4, i % 4);
        let subblock = usize::from(if flip { y >= 2 } else { x >= 2 });
        let index = selector_index(selectors, i);
        let [a, b] = ETC1_MODIFIERS[tables[subblock]];

        let texel = &mut texels[y * 4 + x];
        let modifier = match index {
            0 if punch_through => 0,
            2 if punch_through => {
                *texel = [0; 4];
                continue;
            }
            0 => a,
            1 => b,
            2 => -a,
            _ => -b,
        };

        let [r, g, b] = base[subblock];
        *texel = [clamp(r + modifier), clamp(g + modifier), clamp(b + modifier), 0xFF];
    }
}

/// Writes one of four paint colors per texel (T and H modes).
fn decode_paint_colors(block: &[u8], texels: &mut [Rgba], paint: [[i32; 3]; 4], punch_through: bool) {
    let selectors = selector_word(block);
    for i in 0..16 {
        let index = selector_index(selectors, i);
        let texel = &mut texels[(i % 4) * 4 + i / 4];
        *texel = if punch_through && index == 2 {
            [0; 4]
        } else {
            let [r, g, b] = paint[index];
            [clamp(r), clamp(g), clamp(b), 0xFF]
        };
    }
}

#[inline]
fn offset(color: [i32; 3], distance: i32) -> [i32; 3] {
    color.map(|c| c + distance)
}

fn decode_t_mode(block: &[u8], texels: &mut [Rgba], punch_through: bool) {
    let c1 = [
        extend_4(((block[0] >> 1) & 0x0C) | (block[0] & 0x03)),
        extend_4(block[1] >> 4),
        extend_4(block[1]),
    ];
    let c2 = [extend_4(block[2] >> 4), extend_4(block[2]), extend_4(block[3] >> 4)];
    let distance = ETC2_DISTANCES[(((block[3] >> 1) & 0x06) | (block[3] & 0x01)) as usize];

    let paint = [c1, offset(c2, distance), c2, offset(c2, -distance)];
    decode_paint_colors(block, texels, paint, punch_through);
}

fn decode_h_mode(block: &[u8], texels: &mut [Rgba], punch_through: bool) {
    let c1 = [
        (block[0] >> 3) & 0x0F,
        ((block[0] & 0x07) << 1) | ((block[1] >> 4) & 0x01),
        (block[1] & 0x08) | ((block[1] & 0x03) << 1) | (block[2] >> 7),
    ];
    let c2 = [
        (block[2] >> 3) & 0x0F,
        ((block[2] & 0x07) << 1) | (block[3] >> 7),
        (block[3] >> 3) & 0x0F,
    ];

    // The lowest distance bit is implied by the ordering of the two base colors.
    let packed = |c: [u8; 3]| (c[0] as u32) << 8 | (c[1] as u32) << 4 | c[2] as u32;
    let distance_index = (block[3] & 0x04) | ((block[3] & 0x01) << 1) | u8::from(packed(c1) >= packed(c2));
    let distance = ETC2_DISTANCES[distance_index as usize];

    let c1 = c1.map(extend_4);
    let c2 = c2.map(extend_4);
    let paint = [offset(c1, distance), offset(c1, -distance), offset(c2, distance), offset(c2, -distance)];
    decode_paint_colors(block, texels, paint, punch_through);
}

fn decode_planar_mode(block: &[u8], texels: &mut [Rgba]) {
    let b = block;
    let origin = [
        extend_6(b[0] >> 1),
        extend_7(((b[0] & 0x01) << 6) | (b[1] >> 1)),
        extend_6(((b[1] & 0x01) << 5) | (b[2] & 0x18) | ((b[2] & 0x03) << 1) | (b[3] >> 7)),
    ];
    let horizontal = [
        extend_6(((b[3] >> 1) & 0x3E) | (b[3] & 0x01)),
        extend_7(b[4] >> 1),
        extend_6(((b[4] & 0x01) << 5) | (b[5] >> 3)),
    ];
    let vertical = [
        extend_6(((b[5] & 0x07) << 3) | (b[6] >> 5)),
        extend_7(((b[6] & 0x1F) << 2) | (b[7] >> 6)),
        extend_6(b[7]),
    ];

    for y in 0..4 {
        for x in 0..4 {
            let channel = |c: usize| {
                clamp(
                    (x * (horizontal[c] - origin[c]) + y * (vertical[c] - origin[c]) + 4 * origin[c] + 2) >> 2,
                )
            };
            texels[(y * 4 + x) as usize] = [channel(0), channel(1), channel(2), 0xFF];
        }
    }
}

/// Decodes an ETC2 RGB block.
///
/// With `PUNCH_THROUGH` the differential bit becomes the opaque flag and the
/// individual mode is unavailable.
fn decode_etc2_color<const PUNCH_THROUGH: bool>(block: &[u8], texels: &mut [Rgba]) {
    let differential = block[3] & 0x02 != 0;
    if !PUNCH_THROUGH && !differential {
        decode_subblocks(block, texels, individual_base_colors(block), false);
        return;
    }

    let punch_through = PUNCH_THROUGH && !differential;
    let overflows = |c: usize| !(0..32).contains(&((block[c] >> 3) as i32 + delta(block[c])));

    if overflows(0) {
        decode_t_mode(block, texels, punch_through);
    } else if overflows(1) {
        decode_h_mode(block, texels, punch_through);
    } else if overflows(2) {
        decode_planar_mode(block, texels);
    } else {
        decode_subblocks(block, texels, differential_base_colors(block, false), punch_through);
    }
}

/// Splits an EAC block into base value, multiplier, modifier row and the 48 selector bits.
#[inline]
fn eac_header(block: &[u8]) -> (u8, i32, &'static [i32; 8], u64) {
    let multiplier = (block[1] >> 4) as i32;
    let table = &EAC_MODIFIERS[(block[1] & 0x0F) as usize];
    let selectors = block[2..8]
        .iter()
        .fold(0u64, |bits, &byte| (bits << 8) | byte as u64);
    (block[0], multiplier, table, selectors)
}

#[inline(always)]
fn eac_selector(selectors: u64, i: usize) -> usize {
    ((selectors >> (45 - 3 * i)) & 0x07) as usize
}

/// Decodes an 8 bit EAC alpha block into 16 row-major values.
fn decode_eac_alpha(block: &[u8]) -> [u8; 16] {
    let (base, multiplier, table, selectors) = eac_header(block);
    let mut alpha = [0u8; 16];
    for i in 0..16 {
        let value = base as i32 + table[eac_selector(selectors, i)] * multiplier;
        alpha[(i % 4) * 4 + i / 4] = clamp(value);
    }
    alpha
}

/// Decodes an 11 bit EAC block into 16 row-major values reduced to 8 bits.
fn decode_eac_r11<const SIGNED: bool>(block: &[u8]) -> [u8; 16] {
    let (base, multiplier, table, selectors) = eac_header(block);
    let mut values = [0u8; 16];
    for i in 0..16 {
        let modifier = table[eac_selector(selectors, i)];
        let scaled = if multiplier == 0 {
            modifier
        } else {
            modifier * multiplier * 8
        };

        values[(i % 4) * 4 + i / 4] = if SIGNED {
            // -128 is an alias of -127
            let base = (base as i8).max(-127) as i32;
            let value = (base * 8 + scaled).clamp(-1023, 1023);
            ((value + 1024) >> 3) as u8
        } else {
            let value = (base as i32 * 8 + 4 + scaled).clamp(0, 2047);
            (value >> 3) as u8
        };
    }
    values
}
