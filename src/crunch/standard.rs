//! Original crunch encoding: delta coded selector palettes and level streams
//! made of 2x2 block chunks.

use super::{
    advance, alpha_block, color_block, decode_alpha_endpoints, decode_dxt_color_endpoints, BitReader,
    BlockImage, CrunchInfo, Header, Palettes, Tables,
};
use crate::UnpackError;

/// Maps a linear 2 bit selector to the DXT1 selector order.
const DXT1_FROM_LINEAR: [u32; 4] = [0, 2, 3, 1];

/// Maps a linear 3 bit selector to the DXT5 alpha selector order.
const DXT5_FROM_LINEAR: [u64; 8] = [0, 2, 3, 4, 5, 6, 7, 1];

/// Which of the up to four endpoint tiles each block of a chunk uses.
const CHUNK_TILES: [[usize; 4]; 8] = [
    [0, 0, 0, 0],
    [0, 0, 1, 1],
    [0, 1, 0, 1],
    [0, 0, 1, 2],
    [1, 2, 0, 0],
    [0, 1, 0, 2],
    [1, 0, 2, 0],
    [0, 1, 2, 3],
];

const CHUNK_TILE_COUNT: [usize; 8] = [1, 2, 2, 3, 3, 3, 3, 4];

/// Splits a selector delta symbol into two per pixel deltas in `-range..=range`.
fn split_delta(symbol: u32, range: i32) -> Result<(i32, i32), UnpackError> {
    let base = (2 * range + 1) as u32;
    if symbol >= base * base {
        return Err(UnpackError::InvalidSymbol);
    }
    Ok(((symbol % base) as i32 - range, (symbol / base) as i32 - range))
}

fn decode_color_selectors(section: &[u8], count: usize) -> Result<Vec<u32>, UnpackError> {
    let mut reader = BitReader::new(section);
    let model = reader.read_model()?;

    let mut current = [0i32; 16];
    let mut selectors = Vec::with_capacity(count);
    for _ in 0..count {
        for pair in current.chunks_exact_mut(2) {
            let (d0, d1) = split_delta(reader.decode(&model)?, 3)?;
            pair[0] = (pair[0] + d0) & 3;
            pair[1] = (pair[1] + d1) & 3;
        }

        let selector = current
            .iter()
            .enumerate()
            .fold(0, |acc, (i, &s)| acc | DXT1_FROM_LINEAR[s as usize] << (2 * i));
        selectors.push(selector);
    }

    Ok(selectors)
}

fn decode_alpha_selectors(section: &[u8], count: usize) -> Result<Vec<[u8; 6]>, UnpackError> {
    let mut reader = BitReader::new(section);
    let model = reader.read_model()?;

    let mut current = [0i32; 16];
    let mut selectors = Vec::with_capacity(count);
    for _ in 0..count {
        for pair in current.chunks_exact_mut(2) {
            let (d0, d1) = split_delta(reader.decode(&model)?, 7)?;
            pair[0] = (pair[0] + d0) & 7;
            pair[1] = (pair[1] + d1) & 7;
        }

        let packed = current
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, &s)| acc | DXT5_FROM_LINEAR[s as usize] << (3 * i));
        let mut selector = [0u8; 6];
        selector.copy_from_slice(&packed.to_le_bytes()[..6]);
        selectors.push(selector);
    }

    Ok(selectors)
}

pub(super) fn decode_palettes(header: &Header, data: &[u8]) -> Result<Palettes, UnpackError> {
    let mut palettes = Palettes::default();

    if header.color_endpoints.count > 0 {
        palettes.color_endpoints =
            decode_dxt_color_endpoints(header.color_endpoints.section(data), header.color_endpoints.count)?;
    }
    if header.color_selectors.count > 0 {
        palettes.color_selectors =
            decode_color_selectors(header.color_selectors.section(data), header.color_selectors.count)?;
    }
    if header.alpha_endpoints.count > 0 {
        palettes.alpha_endpoints =
            decode_alpha_endpoints(header.alpha_endpoints.section(data), header.alpha_endpoints.count)?;
    }
    if header.alpha_selectors.count > 0 {
        palettes.alpha_selectors =
            decode_alpha_selectors(header.alpha_selectors.section(data), header.alpha_selectors.count)?;
    }

    Ok(palettes)
}

/// Running palette indices, carried across chunks and faces.
#[derive(Default)]
struct Cursor {
    color_endpoint: usize,
    color_selector: usize,
    alpha_endpoint: usize,
    alpha_selector: usize,
}

pub(super) fn unpack_level(
    reader: &mut BitReader<'_>,
    info: &CrunchInfo,
    tables: &Tables,
    palettes: &Palettes,
    image: &mut BlockImage,
) -> Result<(), UnpackError> {
    let format = info.format;
    let has_color = format.has_color();
    let alpha_blocks = format.alpha_blocks();
    let color_offset = alpha_blocks * 8;

    let chunks_x = image.blocks_x.div_ceil(2);
    let chunks_y = image.blocks_y.div_ceil(2);

    let mut cursor = Cursor::default();
    let mut encoding_bits = 1u32;
    let mut color_tiles = [0u32; 4];
    let mut alpha_tiles = [[0u16; 4]; 2];

    for face in 0..info.faces as usize {
        for chunk_y in 0..chunks_y {
            for step in 0..chunks_x {
                let chunk_x = if chunk_y & 1 == 1 { chunks_x - 1 - step } else { step };

                if encoding_bits == 1 {
                    encoding_bits = reader.decode(&tables.block_encoding)? | 512;
                }
                let encoding = (encoding_bits & 7) as usize;
                encoding_bits >>= 3;
                let tile_count = CHUNK_TILE_COUNT[encoding];

                if has_color {
                    for tile in &mut color_tiles[..tile_count] {
                        let delta = reader.decode(&tables.endpoint_delta[0])?;
                        cursor.color_endpoint = advance(cursor.color_endpoint, delta, palettes.color_endpoints.len())?;
                        *tile = palettes.color_endpoints[cursor.color_endpoint];
                    }
                }
                for slot in &mut alpha_tiles[..alpha_blocks] {
                    for tile in &mut slot[..tile_count] {
                        let delta = reader.decode(&tables.endpoint_delta[1])?;
                        cursor.alpha_endpoint = advance(cursor.alpha_endpoint, delta, palettes.alpha_endpoints.len())?;
                        *tile = palettes.alpha_endpoints[cursor.alpha_endpoint];
                    }
                }

                for (i, &tile) in CHUNK_TILES[encoding].iter().enumerate() {
                    let x = chunk_x * 2 + (i & 1);
                    let y = chunk_y * 2 + (i >> 1);

                    // Selectors of hidden blocks are still coded.
                    let mut color = None;
                    if has_color {
                        let delta = reader.decode(&tables.selector_delta[0])?;
                        cursor.color_selector = advance(cursor.color_selector, delta, palettes.color_selectors.len())?;
                        color = Some(color_block(color_tiles[tile], palettes.color_selectors[cursor.color_selector]));
                    }
                    let mut alpha = [[0u8; 8]; 2];
                    for (slot, block) in alpha.iter_mut().enumerate().take(alpha_blocks) {
                        let delta = reader.decode(&tables.selector_delta[1])?;
                        cursor.alpha_selector = advance(cursor.alpha_selector, delta, palettes.alpha_selectors.len())?;
                        *block = alpha_block(alpha_tiles[slot][tile], palettes.alpha_selectors[cursor.alpha_selector]);
                    }

                    if !image.is_visible(x, y) {
                        continue;
                    }
                    for (slot, block) in alpha.iter().enumerate().take(alpha_blocks) {
                        image.write(face, x, y, slot * 8, block);
                    }
                    if let Some(block) = color {
                        image.write(face, x, y, color_offset, &block);
                    }
                }
            }
        }
    }

    Ok(())
}
