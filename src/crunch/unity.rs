//! Unity crunch encoding: XOR coded selector palettes and level streams in
//! which every block references a new, left, upper or diagonal endpoint.

use super::{
    advance, alpha_block, color_block, decode_alpha_endpoints, decode_dxt_color_endpoints, lookup, BitReader,
    BlockImage, CrunchFormat, CrunchInfo, Header, Palettes, Tables,
};
use crate::UnpackError;

/// Maps a linear 3 bit selector to the DXT5 alpha selector order.
const DXT5_FROM_LINEAR: [u32; 8] = [0, 2, 3, 4, 5, 6, 7, 1];

/// Reads ETC endpoints: three 5 bit base colors and a 3 bit intensity table
/// index, one byte each, delta coded lane by lane.
fn decode_etc_color_endpoints(section: &[u8], count: usize, format: CrunchFormat) -> Result<Vec<u32>, UnpackError> {
    let mut reader = BitReader::new(section);
    let model = reader.read_model()?;

    let mut value = 0u32;
    let mut endpoints = Vec::with_capacity(count);
    for _ in 0..count {
        for shift in (0..32).step_by(8) {
            value = value.wrapping_add(reader.decode(&model)? << shift);
        }
        value &= 0x1F1F_1F1F;

        let endpoint = if format.has_subblocks() {
            value
        } else {
            // Differential mode with a zero delta and the same table for
            // both subblocks, ready to be copied into a block.
            let table = value & 0x0700_0000;
            (table << 5) | (table << 2) | 0x0200_0000 | ((value & 0x001F_1F1F) << 3)
        };
        endpoints.push(endpoint);
    }

    Ok(endpoints)
}

/// Converts a linear 2 bit per pixel selector in row-major order to the ETC
/// layout: a most significant and a least significant bit plane in
/// column-major order, each stored big endian.
fn etc_selector(linear: u32, transpose: bool) -> u32 {
    let mapped = (!linear & 0xAAAA_AAAA) | (!(linear ^ (linear >> 1)) & 0x5555_5555);

    let mut selector = 0;
    for y in 0..4 {
        for x in 0..4 {
            let source = if transpose { x * 8 + y * 2 } else { y * 8 + x * 2 };
            let s = mapped >> source;
            let position = (8 + y + 4 * x) & 15;
            selector |= ((s >> 1 & 1) | (s & 1) << 16) << position;
        }
    }
    selector
}

fn decode_color_selectors(section: &[u8], count: usize, format: CrunchFormat) -> Result<Vec<u32>, UnpackError> {
    let mut reader = BitReader::new(section);
    let model = reader.read_model()?;

    let mut linear = 0u32;
    let mut selectors = Vec::with_capacity(count << usize::from(format.has_subblocks()));
    for _ in 0..count {
        for shift in (0..32).step_by(4) {
            linear ^= reader.decode(&model)? << shift;
        }

        if !format.is_etc() {
            selectors.push(((linear ^ (linear << 1)) & 0xAAAA_AAAA) | ((linear >> 1) & 0x5555_5555));
            continue;
        }
        if format.has_subblocks() {
            selectors.push(etc_selector(linear, true));
        }
        selectors.push(etc_selector(linear, false));
    }

    Ok(selectors)
}

fn decode_dxt_alpha_selectors(section: &[u8], count: usize) -> Result<Vec<[u8; 6]>, UnpackError> {
    let mut reader = BitReader::new(section);
    let model = reader.read_model()?;

    let mut linear = [0u32; 2];
    let mut selectors = Vec::with_capacity(count);
    for _ in 0..count {
        let mut halves = [0u32; 2];
        for (half, linear) in halves.iter_mut().zip(&mut linear) {
            for shift in (0..24).step_by(3) {
                *linear ^= reader.decode(&model)? << shift;
                *half |= DXT5_FROM_LINEAR[(*linear >> shift & 7) as usize] << shift;
            }
        }

        let packed = halves[0] as u64 | (halves[1] as u64) << 24;
        let mut selector = [0u8; 6];
        selector.copy_from_slice(&packed.to_le_bytes()[..6]);
        selectors.push(selector);
    }

    Ok(selectors)
}

/// Places the 3 bit value of pixel `k` (column-major) into a big endian 48 bit
/// EAC selector.
fn put_eac_selector(selector: &mut [u8; 6], k: usize, value: u8) {
    let packed = u64::from(value) << (45 - 3 * k);
    for (byte, shift) in selector.iter_mut().zip((0..6).rev()) {
        *byte |= (packed >> (8 * shift)) as u8;
    }
}

/// Reads EAC alpha selectors. Each selector yields two entries: pixels laid
/// out transposed, then in place.
fn decode_etc_alpha_selectors(section: &[u8], count: usize) -> Result<Vec<[u8; 6]>, UnpackError> {
    let mut reader = BitReader::new(section);
    let model = reader.read_model()?;

    let mut linear = [0u8; 8];
    let mut selectors = Vec::with_capacity(count * 2);
    for _ in 0..count {
        let mut transposed = [0u8; 6];
        let mut in_place = [0u8; 6];
        let mut group = 0u8;
        for p in 0..16 {
            if p & 1 == 0 {
                linear[p >> 1] ^= reader.decode(&model)? as u8;
                group = linear[p >> 1];
            } else {
                group >>= 3;
            }

            let mut value = group & 7;
            if value <= 3 {
                value = 3 - value;
            }
            put_eac_selector(&mut transposed, p, value);
            put_eac_selector(&mut in_place, (p & 3) * 4 + (p >> 2), value);
        }
        selectors.push(transposed);
        selectors.push(in_place);
    }

    Ok(selectors)
}

pub(super) fn decode_palettes(header: &Header, data: &[u8]) -> Result<Palettes, UnpackError> {
    let format = header.info.format;
    let mut palettes = Palettes::default();

    let palette = &header.color_endpoints;
    if palette.count > 0 {
        palettes.color_endpoints = if format.is_etc() {
            decode_etc_color_endpoints(palette.section(data), palette.count, format)?
        } else {
            decode_dxt_color_endpoints(palette.section(data), palette.count)?
        };
    }

    let palette = &header.color_selectors;
    if palette.count > 0 {
        palettes.color_selectors = decode_color_selectors(palette.section(data), palette.count, format)?;
    }

    let palette = &header.alpha_endpoints;
    if palette.count > 0 {
        palettes.alpha_endpoints = decode_alpha_endpoints(palette.section(data), palette.count)?;
    }

    let palette = &header.alpha_selectors;
    if palette.count > 0 {
        palettes.alpha_selectors = if format.is_etc() {
            decode_etc_alpha_selectors(palette.section(data), palette.count)?
        } else {
            decode_dxt_alpha_selectors(palette.section(data), palette.count)?
        };
    }

    Ok(palettes)
}

/// Per column state shared with the block row below.
#[derive(Copy, Clone, Default)]
struct Reference {
    reference: u8,
    color: usize,
    alpha: [usize; 2],
}

/// Endpoint indices currently in use.
#[derive(Copy, Clone, Default)]
struct Endpoints {
    color: usize,
    alpha: [usize; 2],
}

impl Reference {
    fn store(&mut self, endpoints: Endpoints) {
        self.color = endpoints.color;
        self.alpha = endpoints.alpha;
    }

    fn load(&self) -> Endpoints {
        Endpoints {
            color: self.color,
            alpha: self.alpha,
        }
    }
}

struct LevelDecoder<'a, 'b> {
    reader: &'a mut BitReader<'b>,
    tables: &'a Tables,
    palettes: &'a Palettes,
    format: CrunchFormat,
}

impl LevelDecoder<'_, '_> {
    fn next_color(&mut self, index: usize) -> Result<usize, UnpackError> {
        let delta = self.reader.decode(&self.tables.endpoint_delta[0])?;
        advance(index, delta, self.palettes.color_endpoints.len())
    }

    fn next_alpha(&mut self, index: usize) -> Result<usize, UnpackError> {
        let delta = self.reader.decode(&self.tables.endpoint_delta[1])?;
        advance(index, delta, self.palettes.alpha_endpoints.len())
    }

    /// Decodes new endpoints for every block kind of the format, color first.
    fn next_endpoints(&mut self, current: Endpoints, alpha_blocks: usize, has_color: bool) -> Result<Endpoints, UnpackError> {
        let mut next = current;
        if has_color {
            next.color = self.next_color(current.color)?;
        }
        for slot in 0..alpha_blocks {
            next.alpha[slot] = self.next_alpha(current.alpha[slot])?;
        }
        Ok(next)
    }

    fn color_selector(&mut self) -> Result<usize, UnpackError> {
        Ok(self.reader.decode(&self.tables.selector_delta[0])? as usize)
    }

    fn alpha_selector(&mut self) -> Result<usize, UnpackError> {
        Ok(self.reader.decode(&self.tables.selector_delta[1])? as usize)
    }

    /// DXT formats and the ETC formats without subblocks: one endpoint set
    /// per block, referenced as new (0), same as left (1) or same as above.
    fn unpack_blocks(&mut self, faces: usize, image: &mut BlockImage) -> Result<(), UnpackError> {
        let has_color = self.format.has_color();
        let alpha_blocks = self.format.alpha_blocks();
        let color_offset = alpha_blocks * 8;
        // ETC2AS keeps both EAC selector layouts, blocks use the in place one.
        let (alpha_stride, alpha_entry) = if self.format.is_etc() { (2, 1) } else { (1, 0) };

        let width = image.blocks_x.next_multiple_of(2);
        let height = image.blocks_y.next_multiple_of(2);
        let mut buffer = vec![Reference::default(); width];
        let mut current = Endpoints::default();
        let mut group = 0u32;

        for face in 0..faces {
            for y in 0..height {
                for x in 0..width {
                    if y & 1 == 0 && x & 1 == 0 {
                        group = self.reader.decode(&self.tables.block_encoding)?;
                    }

                    let reference = if y & 1 == 1 {
                        buffer[x].reference
                    } else {
                        let own = group & 3;
                        buffer[x].reference = (group >> 2 & 3) as u8;
                        group >>= 4;
                        own as u8
                    };

                    match reference {
                        0 => {
                            current = self.next_endpoints(current, alpha_blocks, has_color)?;
                            buffer[x].store(current);
                        }
                        1 => buffer[x].store(current),
                        _ => current = buffer[x].load(),
                    }

                    let color_selector = if has_color { Some(self.color_selector()?) } else { None };
                    let mut alpha_selectors = [0usize; 2];
                    for selector in &mut alpha_selectors[..alpha_blocks] {
                        *selector = self.alpha_selector()?;
                    }

                    if !image.is_visible(x, y) {
                        continue;
                    }
                    for slot in 0..alpha_blocks {
                        let endpoint = lookup(&self.palettes.alpha_endpoints, current.alpha[slot])?;
                        let index = alpha_selectors[slot] * alpha_stride + alpha_entry;
                        let selector = lookup(&self.palettes.alpha_selectors, index)?;
                        image.write(face, x, y, slot * 8, &alpha_block(endpoint, selector));
                    }
                    if let Some(selector) = color_selector {
                        let endpoint = lookup(&self.palettes.color_endpoints, current.color)?;
                        let selector = lookup(&self.palettes.color_selectors, selector)?;
                        image.write(face, x, y, color_offset, &color_block(endpoint, selector));
                    }
                }
            }
        }

        Ok(())
    }

    /// ETC1, ETC2 and ETC2A: each block has two subblock endpoints and a
    /// 4 bit reference. The low half picks the first endpoint as new (0),
    /// left (1), above (2) or diagonal (3), the high half flags a second
    /// endpoint and the subblock orientation.
    fn unpack_subblocks(&mut self, faces: usize, image: &mut BlockImage) -> Result<(), UnpackError> {
        let alpha_blocks = self.format.alpha_blocks();
        let color_offset = alpha_blocks * 8;

        let width = image.blocks_x.next_multiple_of(2);
        let height = image.blocks_y.next_multiple_of(2);
        let mut buffer = vec![Reference::default(); width * 2];
        let mut current = Endpoints::default();
        let mut diagonal = Endpoints::default();

        for face in 0..faces {
            for y in 0..height {
                for x in 0..width {
                    let above = 2 * x;
                    let mut reference = if y & 1 == 1 {
                        buffer[above].reference
                    } else {
                        let group = self.reader.decode(&self.tables.block_encoding)?;
                        buffer[above].reference = ((group >> 2 & 3) | (group >> 4 & 12)) as u8;
                        ((group & 3) | (group >> 2 & 12)) as u8
                    };

                    match reference & 3 {
                        0 => {
                            current = self.next_endpoints(current, alpha_blocks, true)?;
                            buffer[above].store(current);
                        }
                        1 => buffer[above].store(current),
                        3 => {
                            current = diagonal;
                            buffer[above].store(current);
                        }
                        _ => current = buffer[above].load(),
                    }
                    reference >>= 2;

                    let first = lookup(&self.palettes.color_endpoints, current.color)?;
                    let color_selector = self.color_selector()?;
                    let alpha_selector = if alpha_blocks > 0 { Some(self.alpha_selector()?) } else { None };
                    if reference != 0 {
                        current.color = self.next_color(current.color)?;
                    }

                    diagonal = buffer[above + 1].load();
                    buffer[above + 1].store(current);
                    let second = lookup(&self.palettes.color_endpoints, current.color)?;

                    if !image.is_visible(x, y) {
                        continue;
                    }
                    let flip = usize::from(reference >> 1 ^ 1);
                    if let Some(selector) = alpha_selector {
                        let endpoint = lookup(&self.palettes.alpha_endpoints, current.alpha[0])?;
                        let selector = lookup(&self.palettes.alpha_selectors, selector * 2 + flip)?;
                        image.write(face, x, y, 0, &alpha_block(endpoint, selector));
                    }
                    let selector = lookup(&self.palettes.color_selectors, color_selector * 2 + flip)?;
                    let endpoint = u32::from_le_bytes(subblock_endpoint(first, second, flip as u32));
                    image.write(face, x, y, color_offset, &color_block(endpoint, selector));
                }
            }
        }

        Ok(())
    }
}

/// Builds the first four bytes of an ETC1 block from the endpoints of its
/// two subblocks, in differential mode whenever the second base color is
/// within reach of the first.
fn subblock_endpoint(first: u32, second: u32, flip: u32) -> [u8; 4] {
    let e0 = first.to_le_bytes();
    let e1 = second.to_le_bytes();

    let diff = (0..3).all(|c| e0[c] + 3 >= e1[c] && e1[c] + 4 >= e0[c]);

    let mut block = [0u8; 4];
    for c in 0..3 {
        block[c] = if diff {
            (e0[c] << 3) | (e1[c].wrapping_sub(e0[c]) & 7)
        } else {
            ((e0[c] << 3) & 0xF0) | (e1[c] >> 1)
        };
    }
    block[3] = ((e0[3] as u32) << 5 | (e1[3] as u32) << 2 | (diff as u32) << 1 | flip) as u8;
    block
}

pub(super) fn unpack_level(
    reader: &mut BitReader<'_>,
    info: &CrunchInfo,
    tables: &Tables,
    palettes: &Palettes,
    image: &mut BlockImage,
) -> Result<(), UnpackError> {
    let mut decoder = LevelDecoder {
        reader,
        tables,
        palettes,
        format: info.format,
    };

    if info.format.has_subblocks() {
        decoder.unpack_subblocks(info.faces as usize, image)
    } else {
        decoder.unpack_blocks(info.faces as usize, image)
    }
}

#[cfg(test)]
mod tests {
    use super::super::codec::tests::BitWriter;
    use super::super::codec::HuffmanModel;
    use super::*;

    fn flat_model(symbols: usize, len: u8) -> HuffmanModel {
        HuffmanModel::from_code_sizes(&vec![len; symbols]).unwrap()
    }

    #[test]
    fn test_dxt_color_selector_order() {
        let mut writer = BitWriter::default();
        let len = writer.write_flat_model(16);
        // Pixels 0..4 at linear 0, 1, 2 and 3, the rest at 0.
        writer.write(0b0100, len);
        writer.write(0b1110, len);
        for _ in 0..6 {
            writer.write(0, len);
        }
        let data = writer.finish();

        let selectors = decode_color_selectors(&data, 1, CrunchFormat::Dxt1).unwrap();
        // Linear 0, 1, 2, 3 map to DXT1 selectors 0, 2, 3, 1.
        assert_eq!(selectors, vec![0b01_11_10_00]);
    }

    #[test]
    fn test_color_selectors_are_xor_coded() {
        let mut writer = BitWriter::default();
        let len = writer.write_flat_model(16);
        for _ in 0..8 {
            writer.write(0xF, len);
        }
        for _ in 0..8 {
            writer.write(0xF, len);
        }
        let data = writer.finish();

        let selectors = decode_color_selectors(&data, 2, CrunchFormat::Dxt1).unwrap();
        assert_eq!(selectors, vec![0x5555_5555, 0]);
    }

    #[test]
    fn test_etc_selector_planes() {
        // Linear 3 is the largest positive modifier, ETC index 1: LSB set, MSB clear.
        assert_eq!(etc_selector(u32::MAX, false), 0xFFFF_0000);
        // Linear 0 is the largest negative modifier, ETC index 3.
        assert_eq!(etc_selector(0, false), 0xFFFF_FFFF);
        // Linear 2 maps to ETC index 0.
        assert_eq!(etc_selector(0xAAAA_AAAA, true), 0);
    }

    #[test]
    fn test_etc_selector_orientation() {
        // Linear 2 for pixel (x = 1, y = 0), linear 0 elsewhere.
        let linear = 0b10 << 2;
        let in_place = etc_selector(linear, false);
        let transposed = etc_selector(linear, true);

        // Pixel (x, y) sits at plane bit x * 4 + y, stored big endian.
        let plane_bit = |x: u32, y: u32| (8 + y + 4 * x) & 15;
        let cleared = |selector: u32, x, y| {
            let bit = plane_bit(x, y);
            selector & (1 << bit) == 0 && selector & (1 << (16 + bit)) == 0
        };
        assert!(cleared(in_place, 1, 0));
        assert!(!cleared(in_place, 0, 1));
        assert!(cleared(transposed, 0, 1));
        assert!(!cleared(transposed, 1, 0));
    }

    #[test]
    fn test_etc1s_endpoint_layout() {
        let mut writer = BitWriter::default();
        let len = writer.write_flat_model(32);
        // r = 1, g = 2, b = 3, table 5
        for lane in [1, 2, 3, 5] {
            writer.write(lane, len);
        }
        let data = writer.finish();

        let endpoints = decode_etc_color_endpoints(&data, 1, CrunchFormat::Etc1S).unwrap();
        assert_eq!(endpoints[0].to_le_bytes(), [1 << 3, 2 << 3, 3 << 3, (5 << 5) | (5 << 2) | 0b10]);

        let endpoints = decode_etc_color_endpoints(&data, 1, CrunchFormat::Etc1).unwrap();
        assert_eq!(endpoints[0].to_le_bytes(), [1, 2, 3, 5]);
    }

    #[test]
    fn test_dxt_alpha_selectors() {
        let mut writer = BitWriter::default();
        let len = writer.write_flat_model(8);
        // First half all linear 7, second half all linear 1.
        for _ in 0..8 {
            writer.write(7, len);
        }
        for _ in 0..8 {
            writer.write(1, len);
        }
        let data = writer.finish();

        let selectors = decode_dxt_alpha_selectors(&data, 1).unwrap();
        // Linear 7 maps to 1 and linear 1 maps to 2.
        let expected = (0..8).fold(0u64, |acc, i| acc | 1 << (3 * i) | 2 << (24 + 3 * i));
        assert_eq!(selectors[0], expected.to_le_bytes()[..6]);
    }

    #[test]
    fn test_eac_selector_placement() {
        let mut selector = [0u8; 6];
        put_eac_selector(&mut selector, 0, 0b101);
        put_eac_selector(&mut selector, 15, 0b011);
        assert_eq!(selector, [0b1010_0000, 0, 0, 0, 0, 0b0000_0011]);
    }

    #[test]
    fn test_etc_alpha_selectors() {
        let mut writer = BitWriter::default();
        let len = writer.write_flat_model(64);
        // Pixel 1 (x = 1, y = 0) gets linear 4, everything else linear 3.
        writer.write(3 | 4 << 3, len);
        for _ in 1..8 {
            writer.write(3 | 3 << 3, len);
        }
        let data = writer.finish();

        let selectors = decode_etc_alpha_selectors(&data, 1).unwrap();
        assert_eq!(selectors.len(), 2);

        // Linear 3 becomes EAC index 0, linear 4 stays 4.
        let mut transposed = [0u8; 6];
        put_eac_selector(&mut transposed, 1, 4);
        let mut in_place = [0u8; 6];
        put_eac_selector(&mut in_place, 4, 4);
        assert_eq!(selectors, vec![transposed, in_place]);
    }

    #[test]
    fn test_subblock_endpoint() {
        // Close colors use differential mode.
        let block = subblock_endpoint(u32::from_le_bytes([10, 10, 10, 2]), u32::from_le_bytes([12, 9, 10, 4]), 1);
        assert_eq!(block, [(10 << 3) | 2, (10 << 3) | 7, 10 << 3, (2 << 5) | (4 << 2) | 0b11]);

        // Distant colors fall back to individual 4 bit colors.
        let block = subblock_endpoint(u32::from_le_bytes([0, 31, 0, 0]), u32::from_le_bytes([31, 0, 0, 0]), 0);
        assert_eq!(block, [31 >> 1, 0xF0, 0, 0]);
    }

    #[test]
    fn test_subblock_level() {
        let tables = Tables {
            block_encoding: flat_model(256, 8),
            endpoint_delta: [flat_model(2, 1), HuffmanModel::default()],
            selector_delta: [flat_model(2, 1), HuffmanModel::default()],
        };
        let palettes = Palettes {
            color_endpoints: vec![u32::from_le_bytes([10, 10, 10, 2]), u32::from_le_bytes([12, 9, 10, 4])],
            color_selectors: vec![0x1111_1111, 0x2222_2222, 0x3333_3333, 0x4444_4444],
            ..Default::default()
        };
        let info = CrunchInfo {
            width: 4,
            height: 4,
            levels: 1,
            faces: 1,
            format: CrunchFormat::Etc1,
        };

        let mut writer = BitWriter::default();
        // Block (0, 0): new endpoint with a second one and flip set, the block
        // below takes its endpoint from above.
        writer.write(0b0001_1000, 8);
        writer.write(0, 1);
        writer.write(1, 1);
        writer.write(1, 1);
        // Block (1, 0): left endpoint, the block below again from above.
        writer.write(0b0000_1001, 8);
        writer.write(0, 1);
        // Selectors of the bottom row.
        writer.write(0, 1);
        writer.write(0, 1);
        let data = writer.finish();

        let mut image = BlockImage::new(&info);
        let mut reader = BitReader::new(&data);
        unpack_level(&mut reader, &info, &tables, &palettes, &mut image).unwrap();

        let mut expected = [0u8; 8];
        expected[..4].copy_from_slice(&subblock_endpoint(palettes.color_endpoints[0], palettes.color_endpoints[1], 1));
        expected[4..].copy_from_slice(&0x4444_4444u32.to_le_bytes());
        assert_eq!(image.blocks, expected);
    }

    #[test]
    fn test_selector_out_of_range() {
        let tables = Tables {
            block_encoding: flat_model(256, 8),
            endpoint_delta: [flat_model(2, 1), HuffmanModel::default()],
            selector_delta: [flat_model(4, 2), HuffmanModel::default()],
        };
        let palettes = Palettes {
            color_endpoints: vec![0],
            color_selectors: vec![0],
            ..Default::default()
        };
        let info = CrunchInfo {
            width: 4,
            height: 4,
            levels: 1,
            faces: 1,
            format: CrunchFormat::Dxt1,
        };

        let mut writer = BitWriter::default();
        writer.write(0, 8);
        writer.write(0, 1);
        writer.write(3, 2);
        let data = writer.finish();

        let mut image = BlockImage::new(&info);
        let mut reader = BitReader::new(&data);
        assert_eq!(
            unpack_level(&mut reader, &info, &tables, &palettes, &mut image),
            Err(UnpackError::IndexOutOfRange { index: 3, len: 1 })
        );
    }
}
