//! ASTC LDR decoding for every 2D block footprint.
//!
//! Blocks that cannot be decoded in LDR mode (reserved block modes, illegal
//! weight grids, HDR endpoints, HDR void extents) are filled with the error
//! color, opaque magenta.

use super::{BlockDecoder, Rgba};

const ERROR_COLOR: Rgba = [0xFF, 0x00, 0xFF, 0xFF];

/// Legal 2D block footprints.
const FOOTPRINTS: [(u32, u32); 14] = [
    (4, 4),
    (5, 4),
    (5, 5),
    (6, 5),
    (6, 6),
    (8, 5),
    (8, 6),
    (8, 8),
    (10, 5),
    (10, 6),
    (10, 8),
    (10, 10),
    (12, 10),
    (12, 12),
];

/// Returns `true` if `block_width x block_height` is a legal ASTC 2D footprint.
pub fn is_valid_footprint(block_width: u32, block_height: u32) -> bool {
    FOOTPRINTS.contains(&(block_width, block_height))
}

pub(crate) struct AstcDecoder {
    block_width: usize,
    block_height: usize,
}

impl AstcDecoder {
    pub(crate) fn new(block_width: usize, block_height: usize) -> Self {
        Self {
            block_width,
            block_height,
        }
    }
}

impl BlockDecoder for AstcDecoder {
    fn decode_block(&self, compressed: &[u8], texels: &mut [Rgba]) {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&compressed[..16]);
        let block = u128::from_le_bytes(bytes);

        let texels = &mut texels[..self.block_width * self.block_height];
        if decode_block(block, self.block_width, self.block_height, texels).is_err() {
            texels.fill(ERROR_COLOR);
        }
    }

    fn block_dimensions(&self) -> (usize, usize) {
        (self.block_width, self.block_height)
    }

    fn block_byte_size(&self) -> usize {
        16
    }
}

/// A block that has no LDR interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InvalidBlock;

#[inline(always)]
fn bits(value: u128, start: usize, len: usize) -> u32 {
    // Trailing groups of a sequence may read past the end of the block.
    let shifted = value.checked_shr(start as u32).unwrap_or(0);
    (shifted & ((1u128 << len) - 1)) as u32
}

/// Bounded integer sequence encoding of one value range.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct IntegerEncoding {
    trit: bool,
    quint: bool,
    bits: u8,
}

const fn bits_only(bits: u8) -> IntegerEncoding {
    IntegerEncoding {
        trit: false,
        quint: false,
        bits,
    }
}

const fn trits(bits: u8) -> IntegerEncoding {
    IntegerEncoding {
        trit: true,
        quint: false,
        bits,
    }
}

const fn quints(bits: u8) -> IntegerEncoding {
    IntegerEncoding {
        trit: false,
        quint: true,
        bits,
    }
}

/// Weight ranges, indexed by the 4 bit range field of the block mode minus 2.
static WEIGHT_ENCODINGS: [IntegerEncoding; 12] = [
    bits_only(1),
    trits(0),
    bits_only(2),
    quints(0),
    trits(1),
    bits_only(3),
    quints(1),
    trits(2),
    bits_only(4),
    quints(2),
    trits(3),
    bits_only(5),
];

/// Color endpoint ranges in increasing order, the first four are never used for colors.
static COLOR_ENCODINGS: [IntegerEncoding; 21] = [
    bits_only(1),
    trits(0),
    bits_only(2),
    quints(0),
    trits(1),
    bits_only(3),
    quints(1),
    trits(2),
    bits_only(4),
    quints(2),
    trits(3),
    bits_only(5),
    quints(3),
    trits(4),
    bits_only(6),
    quints(4),
    trits(5),
    bits_only(7),
    quints(5),
    trits(6),
    bits_only(8),
];

impl IntegerEncoding {
    fn bits_used(self, count: usize) -> usize {
        let extra = if self.trit {
            (count * 8 + 4) / 5
        } else if self.quint {
            (count * 7 + 2) / 3
        } else {
            0
        };
        count * self.bits as usize + extra
    }

    /// Decodes `out.len()` values from the low bits of `stream`.
    fn decode_sequence(self, stream: u128, out: &mut [u8]) {
        let n = self.bits as usize;

        if self.trit {
            for (group, values) in out.chunks_mut(5).enumerate() {
                let mut pos = group * (5 * n + 8);
                let mut take = |len: usize| {
                    let value = bits(stream, pos, len) as u8;
                    pos += len;
                    value
                };

                let mut m = [0u8; 5];
                let mut t = 0u8;
                m[0] = take(n);
                t |= take(2);
                m[1] = take(n);
                t |= take(2) << 2;
                m[2] = take(n);
                t |= take(1) << 4;
                m[3] = take(n);
                t |= take(2) << 5;
                m[4] = take(n);
                t |= take(1) << 7;

                let digits = decode_trits(t);
                for (j, value) in values.iter_mut().enumerate() {
                    *value = (digits[j] << n) | m[j];
                }
            }
        } else if self.quint {
            for (group, values) in out.chunks_mut(3).enumerate() {
                let mut pos = group * (3 * n + 7);
                let mut take = |len: usize| {
                    let value = bits(stream, pos, len) as u8;
                    pos += len;
                    value
                };

                let mut m = [0u8; 3];
                let mut q = 0u8;
                m[0] = take(n);
                q |= take(3);
                m[1] = take(n);
                q |= take(2) << 3;
                m[2] = take(n);
                q |= take(2) << 5;

                let digits = decode_quints(q);
                for (j, value) in values.iter_mut().enumerate() {
                    *value = (digits[j] << n) | m[j];
                }
            }
        } else {
            for (i, value) in out.iter_mut().enumerate() {
                *value = bits(stream, i * n, n) as u8;
            }
        }
    }

    /// Maps a decoded color value to `0..=255`.
    fn unquantize_color(self, value: u8) -> u8 {
        let n = self.bits as u32;
        if !self.trit && !self.quint {
            return replicate(value as u32, n, 8) as u8;
        }

        let m = value as u32 & ((1 << n) - 1);
        let d = value as u32 >> n;
        let a = if m & 1 != 0 { 0x1FF } else { 0 };
        let r = m >> 1;

        let (b, c) = if self.trit {
            match n {
                1 => (0, 204),
                2 => ((r << 8) | (r << 4) | (r << 2) | (r << 1), 93),
                3 => ((r << 7) | (r << 2) | r, 44),
                4 => ((r << 6) | r, 22),
                5 => ((r << 5) | (r >> 2), 11),
                _ => ((r << 4) | (r >> 4), 5),
            }
        } else {
            match n {
                1 => (0, 113),
                2 => ((r << 8) | (r << 3) | (r << 2), 54),
                3 => ((r << 7) | (r << 1) | (r >> 1), 26),
                4 => ((r << 6) | (r >> 1), 13),
                _ => ((r << 5) | (r >> 3), 6),
            }
        };

        let t = (d * c + b) ^ a;
        ((a & 0x80) | (t >> 2)) as u8
    }

    /// Maps a decoded weight to `0..=64`.
    fn unquantize_weight(self, value: u8) -> u8 {
        let n = self.bits as u32;
        let value = value as u32;

        let weight = if !self.trit && !self.quint {
            replicate(value, n, 6)
        } else if n == 0 {
            if self.trit {
                [0, 32, 63][value as usize]
            } else {
                [0, 16, 32, 47, 63][value as usize]
            }
        } else {
            let m = value & ((1 << n) - 1);
            let d = value >> n;
            let a = if m & 1 != 0 { 0x7F } else { 0 };
            let r = m >> 1;

            let (b, c) = if self.trit {
                match n {
                    1 => (0, 50),
                    2 => ((r << 6) | (r << 2) | r, 23),
                    _ => ((r << 5) | r, 11),
                }
            } else {
                match n {
                    1 => (0, 28),
                    _ => ((r << 6) | (r << 1), 13),
                }
            };

            let t = (d * c + b) ^ a;
            (a & 0x20) | (t >> 2)
        };

        if weight > 32 {
            weight as u8 + 1
        } else {
            weight as u8
        }
    }
}

fn decode_trits(t: u8) -> [u8; 5] {
    let bit = |value: u8, start: u8| (value >> start) & 1;
    let field = |value: u8, start: u8, len: u8| (value >> start) & ((1 << len) - 1);

    let mut digits = [0u8; 5];
    let c = if field(t, 2, 3) == 0b111 {
        digits[3] = 2;
        digits[4] = 2;
        (field(t, 5, 3) << 2) | field(t, 0, 2)
    } else {
        if field(t, 5, 2) == 0b11 {
            digits[3] = bit(t, 7);
            digits[4] = 2;
        } else {
            digits[3] = field(t, 5, 2);
            digits[4] = bit(t, 7);
        }
        field(t, 0, 5)
    };

    if field(c, 0, 2) == 0b11 {
        digits[0] = (bit(c, 3) << 1) | (bit(c, 2) & !bit(c, 3) & 1);
        digits[1] = bit(c, 4);
        digits[2] = 2;
    } else if field(c, 2, 2) == 0b11 {
        digits[0] = field(c, 0, 2);
        digits[1] = 2;
        digits[2] = 2;
    } else {
        digits[0] = (bit(c, 1) << 1) | (bit(c, 0) & !bit(c, 1) & 1);
        digits[1] = field(c, 2, 2);
        digits[2] = bit(c, 4);
    }

    digits
}

fn decode_quints(q: u8) -> [u8; 3] {
    let bit = |value: u8, start: u8| (value >> start) & 1;
    let field = |value: u8, start: u8, len: u8| (value >> start) & ((1 << len) - 1);

    if field(q, 1, 2) == 0b11 && field(q, 5, 2) == 0b00 {
        let not_q0 = !bit(q, 0) & 1;
        return [4, 4, (bit(q, 0) << 2) | ((bit(q, 4) & not_q0) << 1) | (bit(q, 3) & not_q0)];
    }

    let mut digits = [0u8; 3];
    let c = if field(q, 1, 2) == 0b11 {
        digits[2] = 4;
        (field(q, 3, 2) << 3) | ((!field(q, 5, 2) & 0b11) << 1) | bit(q, 0)
    } else {
        digits[2] = field(q, 5, 2);
        field(q, 0, 5)
    };

    if field(c, 0, 3) == 0b101 {
        digits[0] = field(c, 3, 2);
        digits[1] = 4;
    } else {
        digits[0] = field(c, 0, 3);
        digits[1] = field(c, 3, 2);
    }

    digits
}

/// Repeats the `from` bit pattern of `value` until it fills `to` bits.
fn replicate(value: u32, from: u32, to: u32) -> u32 {
    if from == 0 {
        return 0;
    }

    let mut result = 0;
    let mut filled = 0;
    while filled < to {
        result = (result << from) | value;
        filled += from;
    }
    result >> (filled - to)
}

/// Weight grid layout of a normal (non void extent) block.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct BlockMode {
    width: usize,
    height: usize,
    dual_plane: bool,
    weights: IntegerEncoding,
}

impl BlockMode {
    /// Decodes the low 11 bits of a block. Returns `None` for reserved modes and
    /// weight grids outside the legal weight count and bit budget.
    fn decode(mode: u32) -> Option<Self> {
        let field = |start: u32, len: u32| (mode >> start) & ((1 << len) - 1);

        let mut high_precision = field(9, 1) != 0;
        let mut dual_plane = field(10, 1) != 0;
        let a = field(5, 2);
        let mut range = field(4, 1);

        let (width, height) = if field(0, 2) != 0 {
            range |= field(0, 2) << 1;
            let b = field(7, 2);
            match field(2, 2) {
                0 => (b + 4, a + 2),
                1 => (b + 8, a + 2),
                2 => (a + 2, b + 8),
                _ if field(8, 1) != 0 => ((b & 1) + 2, a + 2),
                _ => (a + 2, (b & 1) + 6),
            }
        } else {
            range |= field(2, 2) << 1;
            if field(2, 2) == 0 {
                return None;
            }

            match field(7, 2) {
                0 => (12, a + 2),
                1 => (a + 2, 12),
                2 => {
                    high_precision = false;
                    dual_plane = false;
                    (a + 6, field(9, 2) + 6)
                }
                _ => match a {
                    0 => (6, 10),
                    1 => (10, 6),
                    _ => return None,
                },
            }
        };

        let weights = WEIGHT_ENCODINGS[(range - 2 + 6 * u32::from(high_precision)) as usize];
        let count = (width * height) as usize * if dual_plane { 2 } else { 1 };
        let weight_bits = weights.bits_used(count);

        if count > 64 || !(24..=96).contains(&weight_bits) {
            return None;
        }

        Some(Self {
            width: width as usize,
            height: height as usize,
            dual_plane,
            weights,
        })
    }

    fn weight_count(self) -> usize {
        self.width * self.height * if self.dual_plane { 2 } else { 1 }
    }
}

fn decode_block(block: u128, block_width: usize, block_height: usize, texels: &mut [Rgba]) -> Result<(), InvalidBlock> {
    let mode = bits(block, 0, 11);
    if mode & 0x1FF == 0x1FC {
        let color = void_extent_color(block)?;
        texels.fill(color);
        return Ok(());
    }

    let mode = BlockMode::decode(mode).ok_or(InvalidBlock)?;
    if mode.width > block_width || mode.height > block_height {
        return Err(InvalidBlock);
    }

    let partitions = bits(block, 11, 2) as usize + 1;
    if mode.dual_plane && partitions == 4 {
        return Err(InvalidBlock);
    }

    let weight_count = mode.weight_count();
    let weight_bits = mode.weights.bits_used(weight_count);

    // Everything between the configuration bits and the weights (stored
    // bit-reversed from the top) belongs to the endpoints, minus the extra
    // CEM and CCS bits packed right below the weights.
    let mut top = 128 - weight_bits;
    let bottom = if partitions == 1 { 17 } else { 29 };

    let cem_field = if partitions == 1 {
        bits(block, 13, 4) << 2
    } else {
        let low = bits(block, 23, 6);
        if low & 0b11 == 0 {
            low
        } else {
            let extra = 3 * partitions - 4;
            top = top.checked_sub(extra).ok_or(InvalidBlock)?;
            low | (bits(block, top, extra) << 6)
        }
    };

    let ccs = if mode.dual_plane {
        top = top.checked_sub(2).ok_or(InvalidBlock)?;
        Some(bits(block, top, 2) as usize)
    } else {
        None
    };

    let color_bits = top.checked_sub(bottom).ok_or(InvalidBlock)?;
    let cems = partition_cems(partitions, cem_field);
    if cems[..partitions].iter().any(|&cem| is_hdr(cem)) {
        return Err(InvalidBlock);
    }

    let value_count: usize = cems[..partitions]
        .iter()
        .map(|&cem| 2 * ((cem >> 2) as usize + 1))
        .sum();
    if value_count > 18 {
        return Err(InvalidBlock);
    }

    let color_encoding = COLOR_ENCODINGS[4..]
        .iter()
        .rev()
        .find(|encoding| encoding.bits_used(value_count) <= color_bits)
        .copied()
        .ok_or(InvalidBlock)?;

    let mut values = [0u8; 18];
    let values = &mut values[..value_count];
    let color_stream = (block >> bottom) & ((1u128 << color_bits) - 1);
    color_encoding.decode_sequence(color_stream, values);
    for value in values.iter_mut() {
        *value = color_encoding.unquantize_color(*value);
    }

    let mut endpoints = [[[0u8; 4]; 2]; 4];
    let mut offset = 0;
    for (partition, &cem) in cems[..partitions].iter().enumerate() {
        let count = 2 * ((cem >> 2) as usize + 1);
        endpoints[partition] = decode_endpoints(cem, &values[offset..offset + count]);
        offset += count;
    }

    let mut weights = [0u8; 64];
    let weights = &mut weights[..weight_count];
    let weight_stream = block.reverse_bits() & ((1u128 << weight_bits) - 1);
    mode.weights.decode_sequence(weight_stream, weights);
    for weight in weights.iter_mut() {
        *weight = mode.weights.unquantize_weight(*weight);
    }

    let planes = if mode.dual_plane { 2 } else { 1 };
    let mut infilled = [[0u8; 144]; 2];
    for (plane, texel_weights) in infilled.iter_mut().enumerate().take(planes) {
        infill_weights(
            weights,
            plane,
            planes,
            (mode.width, mode.height),
            (block_width, block_height),
            texel_weights,
        );
    }

    let partition_seed = bits(block, 13, 10);
    let small_block = block_width * block_height < 31;

    for y in 0..block_height {
        for x in 0..block_width {
            let i = y * block_width + x;
            let partition = if partitions == 1 {
                0
            } else {
                select_partition(partition_seed, x as u32, y as u32, partitions as u32, small_block)
            };

            let [e0, e1] = endpoints[partition];
            let mut color = [0u8; 4];
            for c in 0..4 {
                let weight = if ccs == Some(c) {
                    infilled[1][i]
                } else {
                    infilled[0][i]
                };
                color[c] = interpolate(e0[c], e1[c], weight);
            }
            texels[i] = color;
        }
    }

    Ok(())
}

fn void_extent_color(block: u128) -> Result<Rgba, InvalidBlock> {
    if bits(block, 9, 1) != 0 {
        // HDR void extent
        return Err(InvalidBlock);
    }

    // Four UNORM16 channels, the top byte of each is the LDR value.
    Ok([
        bits(block, 72, 8) as u8,
        bits(block, 88, 8) as u8,
        bits(block, 104, 8) as u8,
        bits(block, 120, 8) as u8,
    ])
}

/// Splits the color endpoint mode field into one mode per partition.
///
/// The field holds a 2 bit class selector; zero means every partition shares
/// the 4 bit mode above it, otherwise each partition gets a class offset bit
/// and a 2 bit mode.
fn partition_cems(partitions: usize, field: u32) -> [u8; 4] {
    let selector = field & 0b11;
    if selector == 0 {
        return [((field >> 2) & 0x0F) as u8; 4];
    }

    let base_class = selector - 1;
    let classes = field >> 2;
    let modes = field >> (2 + partitions);

    let mut cems = [0u8; 4];
    for (i, cem) in cems.iter_mut().enumerate().take(partitions) {
        let class = base_class + ((classes >> i) & 1);
        *cem = ((class << 2) | ((modes >> (2 * i)) & 0b11)) as u8;
    }
    cems
}

#[inline]
fn is_hdr(cem: u8) -> bool {
    matches!(cem, 2 | 3 | 7 | 11 | 14 | 15)
}

/// Moves the top bit of `b` into `a` and returns `a` as a signed 6 bit offset.
#[inline]
fn bit_transfer_signed(a: u8, b: u8) -> (i32, i32) {
    let b = ((b >> 1) | (a & 0x80)) as i32;
    let mut a = ((a >> 1) & 0x3F) as i32;
    if a & 0x20 != 0 {
        a -= 0x40;
    }
    (a, b)
}

#[inline]
fn clamp(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

#[inline]
fn blue_contract(r: i32, g: i32, b: i32, a: i32) -> Rgba {
    [clamp((r + b) >> 1), clamp((g + b) >> 1), clamp(b), clamp(a)]
}

fn decode_endpoints(cem: u8, v: &[u8]) -> [Rgba; 2] {
    let v: [i32; 8] = std::array::from_fn(|i| v.get(i).copied().unwrap_or(0) as i32);

    match cem {
        // Luminance, direct
        0 => [
            [v[0] as u8, v[0] as u8, v[0] as u8, 0xFF],
            [v[1] as u8, v[1] as u8, v[1] as u8, 0xFF],
        ],
        // Luminance, base + offset
        1 => {
            let l0 = (v[0] >> 2) | (v[1] & 0xC0);
            let l1 = (l0 + (v[1] & 0x3F)).min(0xFF);
            [
                [l0 as u8, l0 as u8, l0 as u8, 0xFF],
                [l1 as u8, l1 as u8, l1 as u8, 0xFF],
            ]
        }
        // Luminance + alpha, direct
        4 => [
            [v[0] as u8, v[0] as u8, v[0] as u8, v[2] as u8],
            [v[1] as u8, v[1] as u8, v[1] as u8, v[3] as u8],
        ],
        // Luminance + alpha, base + offset
        5 => {
            let (l_offset, l) = bit_transfer_signed(v[1] as u8, v[0] as u8);
            let (a_offset, a) = bit_transfer_signed(v[3] as u8, v[2] as u8);
            let l1 = clamp(l + l_offset);
            [
                [clamp(l), clamp(l), clamp(l), clamp(a)],
                [l1, l1, l1, clamp(a + a_offset)],
            ]
        }
        // RGB, base + scale
        6 => [
            [
                ((v[0] * v[3]) >> 8) as u8,
                ((v[1] * v[3]) >> 8) as u8,
                ((v[2] * v[3]) >> 8) as u8,
                0xFF,
            ],
            [v[0] as u8, v[1] as u8, v[2] as u8, 0xFF],
        ],
        // RGB, direct
        8 => rgba_direct([v[0], v[1], v[2], v[3], v[4], v[5], 0xFF, 0xFF]),
        // RGB, base + offset
        9 => rgba_base_offset(v, false),
        // RGB, base + scale, plus two alphas
        10 => [
            [
                ((v[0] * v[3]) >> 8) as u8,
                ((v[1] * v[3]) >> 8) as u8,
                ((v[2] * v[3]) >> 8) as u8,
                v[4] as u8,
            ],
            [v[0] as u8, v[1] as u8, v[2] as u8, v[5] as u8],
        ],
        // RGBA, direct
        12 => rgba_direct(v),
        // RGBA, base + offset
        13 => rgba_base_offset(v, true),
        // HDR modes are rejected before this point.
        _ => [ERROR_COLOR; 2],
    }
}

fn rgba_direct(v: [i32; 8]) -> [Rgba; 2] {
    let s0 = v[0] + v[2] + v[4];
    let s1 = v[1] + v[3] + v[5];
    if s1 >= s0 {
        [
            [clamp(v[0]), clamp(v[2]), clamp(v[4]), clamp(v[6])],
            [clamp(v[1]), clamp(v[3]), clamp(v[5]), clamp(v[7])],
        ]
    } else {
        [
            blue_contract(v[1], v[3], v[5], v[7]),
            blue_contract(v[0], v[2], v[4], v[6]),
        ]
    }
}

/// Offsets are stored in the odd values. Without alpha both endpoints are opaque.
fn rgba_base_offset(v: [i32; 8], has_alpha: bool) -> [Rgba; 2] {
    let mut base = [0i32, 0, 0, 0xFF];
    let mut offset = [0i32; 4];
    let channels = if has_alpha { 4 } else { 3 };
    for c in 0..channels {
        (offset[c], base[c]) = bit_transfer_signed(v[2 * c + 1] as u8, v[2 * c] as u8);
    }

    if offset[0] + offset[1] + offset[2] >= 0 {
        [
            base.map(clamp),
            std::array::from_fn(|c| clamp(base[c] + offset[c])),
        ]
    } else {
        [
            blue_contract(
                base[0] + offset[0],
                base[1] + offset[1],
                base[2] + offset[2],
                base[3] + offset[3],
            ),
            blue_contract(base[0], base[1], base[2], base[3]),
        ]
    }
}

/// Expands endpoints to UNORM16, blends them with a 0..=64 weight and reduces the result to 8 bits.
#[inline]
fn interpolate(e0: u8, e1: u8, weight: u8) -> u8 {
    let c0 = e0 as u32 * 257;
    let c1 = e1 as u32 * 257;
    let w = weight as u32;
    let c = (c0 * (64 - w) + c1 * w + 32) >> 6;
    ((c * 255 + 32768) / 65536) as u8
}

/// Bilinearly resamples one plane of the weight grid onto the block's texels.
fn infill_weights(
    weights: &[u8],
    plane: usize,
    planes: usize,
    (grid_width, grid_height): (usize, usize),
    (block_width, block_height): (usize, usize),
    out: &mut [u8; 144],
) {
    let grid = |x: usize, y: usize| -> u32 {
        if x < grid_width && y < grid_height {
            weights[(y * grid_width + x) * planes + plane] as u32
        } else {
            0
        }
    };

    let ds = (1024 + block_width / 2) / (block_width - 1);
    let dt = (1024 + block_height / 2) / (block_height - 1);

    for t in 0..block_height {
        for s in 0..block_width {
            let gs = (ds * s * (grid_width - 1) + 32) >> 6;
            let gt = (dt * t * (grid_height - 1) + 32) >> 6;
            let (js, fs) = (gs >> 4, (gs & 0x0F) as u32);
            let (jt, ft) = (gt >> 4, (gt & 0x0F) as u32);

            let w11 = (fs * ft + 8) >> 4;
            let w10 = ft - w11;
            let w01 = fs - w11;
            let w00 = 16 - fs - ft + w11;

            let p = grid(js, jt) * w00
                + grid(js + 1, jt) * w01
                + grid(js, jt + 1) * w10
                + grid(js + 1, jt + 1) * w11;
            out[t * block_width + s] = ((p + 8) >> 4) as u8;
        }
    }
}

fn hash52(mut p: u32) -> u32 {
    p ^= p >> 15;
    p = p.wrapping_sub(p << 17);
    p = p.wrapping_add(p << 7);
    p = p.wrapping_add(p << 4);
    p ^= p >> 5;
    p = p.wrapping_add(p << 16);
    p ^= p >> 7;
    p ^= p >> 3;
    p ^= p << 6;
    p ^= p >> 17;
    p
}

/// Returns the partition of texel `(x, y)` for the given 10 bit partition seed.
fn select_partition(seed: u32, x: u32, y: u32, partitions: u32, small_block: bool) -> usize {
    let (x, y) = if small_block { (x << 1, y << 1) } else { (x, y) };
    let z = 0u32;

    let seed = seed + (partitions - 1) * 1024;
    let rnum = hash52(seed);

    let mut seeds: [u32; 12] = [
        rnum & 0xF,
        (rnum >> 4) & 0xF,
        (rnum >> 8) & 0xF,
        (rnum >> 12) & 0xF,
        (rnum >> 16) & 0xF,
        (rnum >> 20) & 0xF,
        (rnum >> 24) & 0xF,
        (rnum >> 28) & 0xF,
        (rnum >> 18) & 0xF,
        (rnum >> 22) & 0xF,
        (rnum >> 26) & 0xF,
        ((rnum >> 30) | (rnum << 2)) & 0xF,
    ];
    for value in seeds.iter_mut() {
        *value *= *value;
    }

    let (sh1, sh2) = if seed & 1 != 0 {
        (if seed & 2 != 0 { 4 } else { 5 }, if partitions == 3 { 6 } else { 5 })
    } else {
        (if partitions == 3 { 6 } else { 5 }, if seed & 2 != 0 { 4 } else { 5 })
    };
    let sh3 = if seed & 0x10 != 0 { sh1 } else { sh2 };

    for (i, value) in seeds.iter_mut().enumerate() {
        *value >>= match i {
            0..=7 if i % 2 == 0 => sh1,
            0..=7 => sh2,
            _ => sh3,
        };
    }

    let a = (seeds[0] * x + seeds[1] * y + seeds[10] * z + (rnum >> 14)) & 0x3F;
    let b = (seeds[2] * x + seeds[3] * y + seeds[11] * z + (rnum >> 10)) & 0x3F;
    let mut c = (seeds[4] * x + seeds[5] * y + seeds[8] * z + (rnum >> 6)) & 0x3F;
    let mut d = (seeds[6] * x + seeds[7] * y + seeds[9] * z + (rnum >> 2)) & 0x3F;

    if partitions < 4 {
        d = 0;
    }
    if partitions < 3 {
        c = 0;
    }

    if a >= b && a >= c && a >= d {
        0
    } else if b >= c && b >= d {
        1
    } else if c >= d {
        2
    } else {
        3
    }
}
