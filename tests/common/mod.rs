//! Writer for small crunch containers used by the integration tests.
//!
//! Every model is sent as a flat code, so symbol `s` of a model with `n`
//! symbols is written as `s` in `ceil(log2(n))` bits.

const CODE_LENGTH_ORDER: [u32; 21] = [17, 18, 19, 20, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15, 16];

#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bits: usize,
}

impl BitWriter {
    pub fn write(&mut self, value: u32, bits: u32) {
        for i in (0..bits).rev() {
            if self.bits % 8 == 0 {
                self.bytes.push(0);
            }
            let last = self.bytes.len() - 1;
            self.bytes[last] |= (((value >> i) & 1) as u8) << (7 - self.bits % 8);
            self.bits += 1;
        }
    }

    /// Writes a model whose symbols all share one code length, returns that length.
    pub fn flat_model(&mut self, symbols: u32) -> u32 {
        let len = (32 - (symbols - 1).leading_zeros()).max(1);
        self.write(symbols, 14);

        let position = CODE_LENGTH_ORDER.iter().position(|&code| code == len).unwrap();
        self.write(position as u32 + 1, 5);
        for i in 0..=position {
            self.write(u32::from(i == position), 3);
        }
        for _ in 0..symbols {
            self.write(0, 1);
        }
        len
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFFu16;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x1021 } else { crc << 1 };
        }
    }
    crc ^ 0xFFFF
}

#[derive(Default, Clone)]
pub struct Palette {
    pub count: u16,
    pub data: Vec<u8>,
}

#[derive(Default, Clone)]
pub struct CrunchFile {
    pub width: u16,
    pub height: u16,
    pub faces: u8,
    pub format: u8,
    pub tables: Vec<u8>,
    pub color_endpoints: Palette,
    pub color_selectors: Palette,
    pub alpha_endpoints: Palette,
    pub alpha_selectors: Palette,
    pub level: Vec<u8>,
}

fn put_be(data: &mut [u8], offset: usize, len: usize, value: usize) {
    for i in 0..len {
        data[offset + i] = (value >> (8 * (len - 1 - i))) as u8;
    }
}

impl CrunchFile {
    /// Lays out header, tables, the four palettes and one level, in that order.
    pub fn build(&self) -> Vec<u8> {
        const HEADER_SIZE: usize = 74;

        let mut data = vec![0u8; HEADER_SIZE];
        data.extend_from_slice(&self.tables);
        put_be(&mut data, 65, 2, self.tables.len());
        put_be(&mut data, 67, 3, HEADER_SIZE);

        let palettes = [
            (33, &self.color_endpoints),
            (41, &self.color_selectors),
            (49, &self.alpha_endpoints),
            (57, &self.alpha_selectors),
        ];
        for (field, palette) in palettes {
            let offset = data.len();
            data.extend_from_slice(&palette.data);
            put_be(&mut data, field, 3, offset);
            put_be(&mut data, field + 3, 3, palette.data.len());
            put_be(&mut data, field + 6, 2, palette.count as usize);
        }

        let level_offset = data.len();
        data.extend_from_slice(&self.level);
        put_be(&mut data, 70, 4, level_offset);

        data[0] = b'H';
        data[1] = b'x';
        put_be(&mut data, 2, 2, HEADER_SIZE);
        let data_len = data.len();
        put_be(&mut data, 6, 4, data_len);
        put_be(&mut data, 12, 2, self.width as usize);
        put_be(&mut data, 14, 2, self.height as usize);
        data[16] = 1;
        data[17] = self.faces.max(1);
        data[18] = self.format;

        let payload_crc = crc16(&data[HEADER_SIZE..]);
        put_be(&mut data, 10, 2, payload_crc as usize);
        let header_crc = crc16(&data[6..HEADER_SIZE]);
        put_be(&mut data, 4, 2, header_crc as usize);

        data
    }
}

/// Color endpoint palette of the given RGB565 pairs, as (color0, color1).
pub fn dxt_color_endpoints(endpoints: &[(u16, u16)]) -> Palette {
    let mut writer = BitWriter::default();
    let five = writer.flat_model(32);
    let six = writer.flat_model(64);

    let mut previous = [0u32; 6];
    for &(color0, color1) in endpoints {
        let channels = [
            (color0 >> 11) as u32,
            (color0 >> 5 & 63) as u32,
            (color0 & 31) as u32,
            (color1 >> 11) as u32,
            (color1 >> 5 & 63) as u32,
            (color1 & 31) as u32,
        ];
        for (i, (&channel, previous)) in channels.iter().zip(&mut previous).enumerate() {
            let (bits, mask) = if i % 3 == 1 { (six, 63) } else { (five, 31) };
            writer.write(channel.wrapping_sub(*previous) & mask, bits);
            *previous = channel;
        }
    }

    Palette {
        count: endpoints.len() as u16,
        data: writer.finish(),
    }
}

/// Alpha endpoint palette of the given (alpha0, alpha1) pairs.
pub fn alpha_endpoints(endpoints: &[(u8, u8)]) -> Palette {
    let mut writer = BitWriter::default();
    let bits = writer.flat_model(256);

    let (mut a, mut b) = (0u8, 0u8);
    for &(alpha0, alpha1) in endpoints {
        writer.write(alpha0.wrapping_sub(a) as u32, bits);
        writer.write(alpha1.wrapping_sub(b) as u32, bits);
        (a, b) = (alpha0, alpha1);
    }

    Palette {
        count: endpoints.len() as u16,
        data: writer.finish(),
    }
}

/// Unity ETC endpoint palette of `[r, g, b, table]` entries, 5 bit colors.
pub fn etc_color_endpoints(endpoints: &[[u8; 4]]) -> Palette {
    let mut writer = BitWriter::default();
    let bits = writer.flat_model(32);

    let mut previous = [0u8; 4];
    for endpoint in endpoints {
        for (&lane, previous) in endpoint.iter().zip(&mut previous) {
            writer.write((lane.wrapping_sub(*previous) & 31) as u32, bits);
            *previous = lane;
        }
    }

    Palette {
        count: endpoints.len() as u16,
        data: writer.finish(),
    }
}

/// Packs 16 row-major 2 bit values into a linear selector.
pub fn linear_selector(pixels: [u32; 16]) -> u32 {
    pixels.iter().enumerate().fold(0, |acc, (i, &value)| acc | value << (2 * i))
}

/// Unity color selector palette, XOR coded 4 bits at a time.
pub fn xor_color_selectors(selectors: &[u32]) -> Palette {
    let mut writer = BitWriter::default();
    let bits = writer.flat_model(16);

    let mut previous = 0;
    for &selector in selectors {
        let delta = selector ^ previous;
        for shift in (0..32).step_by(4) {
            writer.write(delta >> shift & 0xF, bits);
        }
        previous = selector;
    }

    Palette {
        count: selectors.len() as u16,
        data: writer.finish(),
    }
}

/// Unity EAC selector palette of 16 row-major linear 3 bit values each.
pub fn etc_alpha_selectors(selectors: &[[u8; 16]]) -> Palette {
    let mut writer = BitWriter::default();
    let bits = writer.flat_model(64);

    let mut previous = [0u8; 8];
    for selector in selectors {
        for (pair, previous) in selector.chunks_exact(2).zip(&mut previous) {
            let group = pair[0] | pair[1] << 3;
            writer.write((group ^ *previous) as u32, bits);
            *previous = group;
        }
    }

    Palette {
        count: selectors.len() as u16,
        data: writer.finish(),
    }
}
