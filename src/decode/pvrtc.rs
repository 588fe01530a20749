//! PVRTC 2bpp and 4bpp decoding.
//!
//! PVRTC words are not independent blocks: every texel blends the low
//! resolution colors of the 2x2 words around it, so this decoder walks windows
//! of four words instead of going through [`BlockDecoder`](super::BlockDecoder).

use super::Rgba;
use crate::DecodeError;

const WORD_HEIGHT: usize = 4;

#[derive(Clone, Copy)]
struct Word {
    modulation: u32,
    color: u32,
}

impl Word {
    #[inline]
    fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            modulation: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            color: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }

    /// Color A as 5 bit RGB and 4 bit alpha.
    fn color_a(self) -> [i32; 4] {
        let c = self.color as i32;
        if c & 0x8000 != 0 {
            [(c & 0x7C00) >> 10, (c & 0x3E0) >> 5, (c & 0x1E) | ((c & 0x1E) >> 4), 0xF]
        } else {
            [
                ((c & 0xF00) >> 7) | ((c & 0xF00) >> 11),
                ((c & 0xF0) >> 3) | ((c & 0xF0) >> 7),
                ((c & 0xE) << 1) | ((c & 0xE) >> 2),
                (c & 0x7000) >> 11,
            ]
        }
    }

    /// Color B as 5 bit RGB and 4 bit alpha.
    fn color_b(self) -> [i32; 4] {
        let c = self.color;
        let channels = if c & 0x8000_0000 != 0 {
            [(c & 0x7C00_0000) >> 26, (c & 0x3E0_0000) >> 21, (c & 0x1F_0000) >> 16, 0xF]
        } else {
            [
                ((c & 0xF00_0000) >> 23) | ((c & 0xF00_0000) >> 27),
                ((c & 0xF0_0000) >> 19) | ((c & 0xF0_0000) >> 23),
                ((c & 0xF_0000) >> 15) | ((c & 0xF_0000) >> 19),
                (c & 0x7000_0000) >> 27,
            ]
        };
        channels.map(|channel| channel as i32)
    }
}

/// Interleaves the word coordinates, `y` taking the low bit. Bits of the
/// larger dimension beyond the smaller one are appended unchanged.
fn twiddle(blocks_x: usize, blocks_y: usize, x: usize, y: usize) -> usize {
    let (min_dimension, mut max_value) = if blocks_y < blocks_x {
        (blocks_y, x)
    } else {
        (blocks_x, y)
    };

    let mut twiddled = 0;
    let mut src_bit = 1;
    let mut dst_bit = 1;
    let mut shift = 0;

    while src_bit < min_dimension {
        if y & src_bit != 0 {
            twiddled |= dst_bit;
        }
        if x & src_bit != 0 {
            twiddled |= dst_bit << 1;
        }
        src_bit <<= 1;
        dst_bit <<= 2;
        shift += 1;
    }

    max_value >>= shift;
    twiddled | (max_value << (2 * shift))
}

/// Modulation values and modes of a 2x2 word window, indexed `[y][x]`.
struct Modulation {
    values: [[i32; 16]; 8],
    modes: [[u8; 16]; 8],
}

impl Modulation {
    fn unpack<const TWO_BPP: bool>(&mut self, word: Word, offset_x: usize, offset_y: usize) {
        let mut mode = (word.color & 0x01) as u8;
        let mut bits = word.modulation;

        if TWO_BPP {
            if mode != 0 {
                // The flag bit picks between H+V interpolation (1) and a single
                // direction, given by the LSB of the centre texel (2 = H, 3 = V).
                if bits & 0x01 != 0 {
                    mode = if bits & (1 << 20) != 0 { 3 } else { 2 };
                    if bits & (1 << 21) != 0 {
                        bits |= 1 << 20;
                    } else {
                        bits &= !(1 << 20);
                    }
                }
                bits &= !0x01;

                for y in 0..WORD_HEIGHT {
                    for x in 0..8 {
                        self.modes[y + offset_y][x + offset_x] = mode;
                        if (x ^ y) & 1 == 0 {
                            self.values[y + offset_y][x + offset_x] = (bits & 0x03) as i32;
                            bits >>= 2;
                        }
                    }
                }
            } else {
                for y in 0..WORD_HEIGHT {
                    for x in 0..8 {
                        self.modes[y + offset_y][x + offset_x] = 0;
                        self.values[y + offset_y][x + offset_x] = if bits & 0x01 != 0 { 3 } else { 0 };
                        bits >>= 1;
                    }
                }
            }
        } else {
            for y in 0..WORD_HEIGHT {
                for x in 0..4 {
                    let value = (bits & 0x03) as i32;
                    self.values[y + offset_y][x + offset_x] = if mode != 0 {
                        // Punch-through: 2 marks a transparent texel halfway between A and B.
                        [0, 4, 14, 8][value as usize]
                    } else {
                        [0, 3, 5, 8][value as usize]
                    };
                    bits >>= 2;
                }
            }
        }
    }

    fn value<const TWO_BPP: bool>(&self, x: usize, y: usize) -> i32 {
        const REP_VALUES: [i32; 4] = [0, 3, 5, 8];

        if !TWO_BPP {
            return self.values[y][x];
        }

        let rep = |x: usize, y: usize| REP_VALUES[self.values[y][x] as usize];
        let mode = self.modes[y][x];
        if mode == 0 || (x ^ y) & 1 == 0 {
            return rep(x, y);
        }

        match mode {
            1 => (rep(x, y - 1) + rep(x, y + 1) + rep(x - 1, y) + rep(x + 1, y) + 2) / 4,
            2 => (rep(x - 1, y) + rep(x + 1, y) + 1) / 2,
            _ => (rep(x, y - 1) + rep(x, y + 1) + 1) / 2,
        }
    }
}

/// Bilinearly upscales four word colors across the window between their centres.
fn interpolate_colors<const TWO_BPP: bool>(p: [i32; 4], q: [i32; 4], r: [i32; 4], s: [i32; 4]) -> [[i32; 4]; 32] {
    let word_width = if TWO_BPP { 8 } else { 4 };
    let mut pixels = [[0i32; 4]; 32];

    let mut hp = p.map(|c| c * word_width as i32);
    let mut hr = r.map(|c| c * word_width as i32);
    let q_minus_p: [i32; 4] = std::array::from_fn(|c| q[c] - p[c]);
    let s_minus_r: [i32; 4] = std::array::from_fn(|c| s[c] - r[c]);

    for x in 0..word_width {
        let mut result = hp.map(|c| 4 * c);
        let dy: [i32; 4] = std::array::from_fn(|c| hr[c] - hp[c]);

        for y in 0..WORD_HEIGHT {
            let pixel = &mut pixels[y * word_width + x];
            for c in 0..3 {
                pixel[c] = if TWO_BPP {
                    (result[c] >> 7) + (result[c] >> 2)
                } else {
                    (result[c] >> 6) + (result[c] >> 1)
                };
            }
            pixel[3] = if TWO_BPP {
                (result[3] >> 5) + (result[3] >> 1)
            } else {
                (result[3] >> 4) + result[3]
            };

            for c in 0..4 {
                result[c] += dy[c];
            }
        }

        for c in 0..4 {
            hp[c] += q_minus_p[c];
            hr[c] += s_minus_r[c];
        }
    }

    pixels
}

/// Decodes the texels between the centres of four words, `p` top left, `q` top
/// right, `r` bottom left and `s` bottom right.
fn decode_window<const TWO_BPP: bool>([p, q, r, s]: [Word; 4]) -> [Rgba; 32] {
    let word_width = if TWO_BPP { 8 } else { 4 };

    let mut modulation = Modulation {
        values: [[0; 16]; 8],
        modes: [[0; 16]; 8],
    };
    modulation.unpack::<TWO_BPP>(p, 0, 0);
    modulation.unpack::<TWO_BPP>(q, word_width, 0);
    modulation.unpack::<TWO_BPP>(r, 0, WORD_HEIGHT);
    modulation.unpack::<TWO_BPP>(s, word_width, WORD_HEIGHT);

    let colors_a = interpolate_colors::<TWO_BPP>(p.color_a(), q.color_a(), r.color_a(), s.color_a());
    let colors_b = interpolate_colors::<TWO_BPP>(p.color_b(), q.color_b(), r.color_b(), s.color_b());

    let mut pixels = [[0u8; 4]; 32];
    for y in 0..WORD_HEIGHT {
        for x in 0..word_width {
            let mut weight = modulation.value::<TWO_BPP>(x + word_width / 2, y + WORD_HEIGHT / 2);
            let punch_through = weight > 10;
            if punch_through {
                weight -= 10;
            }

            let i = y * word_width + x;
            let blend = |c: usize| ((colors_a[i][c] * (8 - weight) + colors_b[i][c] * weight) / 8) as u8;

            pixels[i] = [
                blend(0),
                blend(1),
                blend(2),
                if punch_through { 0 } else { blend(3) },
            ];
        }
    }

    pixels
}

/// Decodes a PVRTC image. `data` must hold exactly one word per block.
pub(super) fn decompress<const TWO_BPP: bool>(
    width: u32,
    height: u32,
    data: &[u8],
    output: &mut [u8],
) -> Result<(), DecodeError> {
    let word_width = if TWO_BPP { 8 } else { 4 };
    let blocks_x = (width as usize).div_ceil(word_width);
    let blocks_y = (height as usize).div_ceil(WORD_HEIGHT);

    if !blocks_x.is_power_of_two() || !blocks_y.is_power_of_two() {
        return Err(DecodeError::NonPowerOfTwo {
            blocks_x: blocks_x as u32,
            blocks_y: blocks_y as u32,
        });
    }

    let words: Vec<Word> = data.chunks_exact(8).map(Word::from_bytes).collect();
    let word_at = |x: usize, y: usize| words[twiddle(blocks_x, blocks_y, x % blocks_x, y % blocks_y)];

    let full_width = blocks_x * word_width;
    let full_height = blocks_y * WORD_HEIGHT;
    let mut image = vec![[0u8; 4]; full_width * full_height];

    for word_y in 0..blocks_y {
        for word_x in 0..blocks_x {
            let window = [
                word_at(word_x, word_y),
                word_at(word_x + 1, word_y),
                word_at(word_x, word_y + 1),
                word_at(word_x + 1, word_y + 1),
            ];
            let pixels = decode_window::<TWO_BPP>(window);

            // The window starts at the centre of its top left word.
            for y in 0..WORD_HEIGHT {
                let image_y = (word_y * WORD_HEIGHT + WORD_HEIGHT / 2 + y) % full_height;
                for x in 0..word_width {
                    let image_x = (word_x * word_width + word_width / 2 + x) % full_width;
                    image[image_y * full_width + image_x] = pixels[y * word_width + x];
                }
            }
        }
    }

    let row_pitch = width as usize * 4;
    for (y, row) in output.chunks_exact_mut(row_pitch).enumerate() {
        row.copy_from_slice(bytemuck::cast_slice(&image[y * full_width..][..width as usize]));
    }

    tracing::trace!(width, height, two_bpp = TWO_BPP, "decoded pvrtc image");
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn word(modulation: u32, color: u32) -> Vec<u8> {
        let mut bytes = modulation.to_le_bytes().to_vec();
        bytes.extend_from_slice(&color.to_le_bytes());
        bytes
    }

    // Color A opaque red, color B opaque blue.
    const RED_BLUE: u32 = 0x801F_FC00;

    #[rstest]
    #[case::color_a(0x0000_0000, RED_BLUE, [0xFF, 0x00, 0x00, 0xFF])]
    #[case::color_b(0xFFFF_FFFF, RED_BLUE, [0x00, 0x00, 0xFF, 0xFF])]
    #[case::punch_through(0xAAAA_AAAA, RED_BLUE | 0x01, [127, 0x00, 127, 0x00])]
    fn test_pvrtc4_single_word(#[case] modulation: u32, #[case] color: u32, #[case] expected: Rgba) {
        let data = word(modulation, color);
        let mut output = vec![0u8; 4 * 4 * 4];
        decompress::<false>(4, 4, &data, &mut output).unwrap();

        let pixels: &[Rgba] = bytemuck::cast_slice(&output);
        assert_eq!(pixels, &[expected; 16]);
    }

    #[test]
    fn test_pvrtc2_single_word() {
        let data = word(0xFFFF_FFFF, RED_BLUE);
        let mut output = vec![0u8; 8 * 4 * 4];
        decompress::<true>(8, 4, &data, &mut output).unwrap();

        let pixels: &[Rgba] = bytemuck::cast_slice(&output);
        assert_eq!(pixels, &[[0x00, 0x00, 0xFF, 0xFF]; 32]);
    }

    #[test]
    fn test_pvrtc_translucent_color() {
        // Color A translucent: 4 bit white with alpha 0b011, modulation selects A.
        let data = word(0, 0x3FFE);
        let mut output = vec![0u8; 4 * 4 * 4];
        decompress::<false>(4, 4, &data, &mut output).unwrap();

        assert_eq!(&output[..4], &[0xFF, 0xFF, 0xFF, 0x66]);
    }

    #[test]
    fn test_pvrtc_requires_power_of_two() {
        let data = vec![0u8; 3 * 8];
        let mut output = vec![0u8; 12 * 4 * 4];
        assert_eq!(
            decompress::<false>(12, 4, &data, &mut output),
            Err(DecodeError::NonPowerOfTwo {
                blocks_x: 3,
                blocks_y: 1
            })
        );
    }

    #[rstest]
    #[case(4, 4, 1, 0, 2)]
    #[case(4, 4, 0, 1, 1)]
    #[case(4, 4, 1, 1, 3)]
    #[case(4, 4, 2, 0, 8)]
    #[case(4, 2, 3, 1, 7)]
    #[case(1, 4, 0, 3, 3)]
    fn test_twiddle(
        #[case] blocks_x: usize,
        #[case] blocks_y: usize,
        #[case] x: usize,
        #[case] y: usize,
        #[case] expected: usize,
    ) {
        assert_eq!(twiddle(blocks_x, blocks_y, x, y), expected);
    }
}
