use block_decompression::{
    crunch::{crunch_info, unpack_crunch, CrunchFormat, CrunchVariant},
    decode_crunch, TextureFormat, UnpackError,
};
use proptest::prelude::*;

use crate::common::{
    alpha_endpoints, dxt_color_endpoints, etc_alpha_selectors, etc_color_endpoints, linear_selector,
    xor_color_selectors, BitWriter, CrunchFile, Palette,
};

mod common;

const WHITE_BLUE: [(u16, u16); 2] = [(0xFFFF, 0x0000), (0xF800, 0x001F)];

/// Expected level 0 of the 8x4 DXT1 files: a white block next to a blue one.
const WHITE_BLUE_BLOCKS: [u8; 16] = [
    0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0xF8, 0x1F, 0x00, 0x55, 0x55, 0x55, 0x55,
];

fn standard_dxt1() -> CrunchFile {
    let mut tables = BitWriter::default();
    let chunk_bits = tables.flat_model(512);
    let endpoint_bits = tables.flat_model(2);
    let selector_bits = tables.flat_model(2);

    // Selector 0 keeps every pixel at linear 0, selector 1 moves them to 3.
    let mut selectors = BitWriter::default();
    let bits = selectors.flat_model(49);
    for _ in 0..8 {
        selectors.write(24, bits);
    }
    for _ in 0..8 {
        selectors.write(48, bits);
    }

    let mut level = BitWriter::default();
    // One chunk, left and right column on separate endpoint tiles.
    level.write(2, chunk_bits);
    level.write(0, endpoint_bits);
    level.write(1, endpoint_bits);
    for delta in [0, 1, 0, 0] {
        level.write(delta, selector_bits);
    }

    CrunchFile {
        width: 8,
        height: 4,
        format: 0,
        tables: tables.finish(),
        color_endpoints: dxt_color_endpoints(&WHITE_BLUE),
        color_selectors: Palette {
            count: 2,
            data: selectors.finish(),
        },
        level: level.finish(),
        ..Default::default()
    }
}

fn unity_dxt1() -> CrunchFile {
    let mut tables = BitWriter::default();
    let group_bits = tables.flat_model(256);
    let endpoint_bits = tables.flat_model(2);
    let selector_bits = tables.flat_model(2);

    let mut selectors = BitWriter::default();
    let bits = selectors.flat_model(16);
    for _ in 0..8 {
        selectors.write(0, bits);
    }
    for _ in 0..8 {
        selectors.write(0xF, bits);
    }

    let mut level = BitWriter::default();
    // Every block of the 2x2 group decodes a new endpoint.
    level.write(0, group_bits);
    for (delta, selector) in [(0, 0), (1, 1), (0, 0), (0, 0)] {
        level.write(delta, endpoint_bits);
        level.write(selector, selector_bits);
    }

    CrunchFile {
        width: 8,
        height: 4,
        format: 0,
        tables: tables.finish(),
        color_endpoints: dxt_color_endpoints(&WHITE_BLUE),
        color_selectors: Palette {
            count: 2,
            data: selectors.finish(),
        },
        level: level.finish(),
        ..Default::default()
    }
}

fn standard_dxt5a() -> CrunchFile {
    let mut tables = BitWriter::default();
    let chunk_bits = tables.flat_model(512);
    let endpoint_bits = tables.flat_model(2);
    let selector_bits = tables.flat_model(2);

    let mut selectors = BitWriter::default();
    let bits = selectors.flat_model(225);
    for _ in 0..8 {
        selectors.write(112, bits);
    }

    let mut level = BitWriter::default();
    level.write(0, chunk_bits);
    level.write(0, endpoint_bits);
    for _ in 0..4 {
        level.write(0, selector_bits);
    }

    CrunchFile {
        width: 4,
        height: 4,
        format: 9,
        tables: tables.finish(),
        alpha_endpoints: alpha_endpoints(&[(0xFF, 0x00)]),
        alpha_selectors: Palette {
            count: 1,
            data: selectors.finish(),
        },
        level: level.finish(),
        ..Default::default()
    }
}

/// Standard color selector palette with one entry, every pixel at linear 3.
fn standard_linear3_color_selector() -> Palette {
    let mut selectors = BitWriter::default();
    let bits = selectors.flat_model(49);
    for _ in 0..8 {
        selectors.write(48, bits);
    }
    Palette {
        count: 1,
        data: selectors.finish(),
    }
}

/// Standard alpha selector palette with one entry, every pixel at linear 7.
fn standard_linear7_alpha_selector() -> Palette {
    let mut selectors = BitWriter::default();
    let bits = selectors.flat_model(225);
    for _ in 0..8 {
        selectors.write(224, bits);
    }
    Palette {
        count: 1,
        data: selectors.finish(),
    }
}

/// Alpha selector bytes with every pixel on index 1.
const ALPHA_INDEX_1: [u8; 6] = [0x49, 0x92, 0x24, 0x49, 0x92, 0x24];

fn standard_dxt5() -> CrunchFile {
    let mut tables = BitWriter::default();
    let chunk_bits = tables.flat_model(512);
    let color_endpoint_bits = tables.flat_model(2);
    let color_selector_bits = tables.flat_model(2);
    let alpha_endpoint_bits = tables.flat_model(2);
    let alpha_selector_bits = tables.flat_model(2);

    let mut level = BitWriter::default();
    level.write(0, chunk_bits);
    level.write(0, color_endpoint_bits);
    level.write(0, alpha_endpoint_bits);
    for _ in 0..4 {
        level.write(0, color_selector_bits);
        level.write(0, alpha_selector_bits);
    }

    CrunchFile {
        width: 4,
        height: 4,
        format: 2,
        tables: tables.finish(),
        color_endpoints: dxt_color_endpoints(&[(0xFFFF, 0x0000)]),
        color_selectors: standard_linear3_color_selector(),
        alpha_endpoints: alpha_endpoints(&[(0xFF, 0x00)]),
        alpha_selectors: standard_linear7_alpha_selector(),
        level: level.finish(),
        ..Default::default()
    }
}

fn standard_dxn() -> CrunchFile {
    let mut tables = BitWriter::default();
    let chunk_bits = tables.flat_model(512);
    let endpoint_bits = tables.flat_model(2);
    let selector_bits = tables.flat_model(2);

    let mut level = BitWriter::default();
    level.write(0, chunk_bits);
    // The second channel moves on to the next alpha endpoint.
    level.write(0, endpoint_bits);
    level.write(1, endpoint_bits);
    for _ in 0..8 {
        level.write(0, selector_bits);
    }

    CrunchFile {
        width: 4,
        height: 4,
        format: 7,
        tables: tables.finish(),
        alpha_endpoints: alpha_endpoints(&[(0xFF, 0x00), (0x10, 0x20)]),
        alpha_selectors: standard_linear7_alpha_selector(),
        level: level.finish(),
        ..Default::default()
    }
}

/// Pixel (1, 0) of the linear selectors in the ETC fixtures.
const MARKED: usize = 1;

fn marked_color_selector() -> Palette {
    // Linear 3 is the +b modifier, linear 2 the +a one.
    let mut pixels = [2; 16];
    pixels[MARKED] = 3;
    xor_color_selectors(&[linear_selector(pixels)])
}

fn marked_alpha_selector() -> Palette {
    // Linear 3 picks EAC modifier index 0, linear 4 index 4.
    let mut pixels = [3; 16];
    pixels[MARKED] = 4;
    etc_alpha_selectors(&[pixels])
}

/// A 4x4 Unity ETC file with subblocks (ETC1 or ETC2A). The visible block
/// takes endpoint 0 for its first and endpoint 1 for its second subblock.
/// `split` is the high reference half of that block: 1 gives a flipped
/// block with in place selectors, 3 an unflipped one with transposed selectors.
fn unity_etc_subblocks(format: u8, split: u32) -> CrunchFile {
    let has_alpha = format == 12;

    let mut tables = BitWriter::default();
    let group_bits = tables.flat_model(256);
    let endpoint_bits = tables.flat_model(2);
    let selector_bits = tables.flat_model(2);
    let (alpha_endpoint_bits, alpha_selector_bits) = if has_alpha {
        (tables.flat_model(2), tables.flat_model(2))
    } else {
        (0, 0)
    };

    let mut level = BitWriter::default();
    // Block (0, 0): new first endpoint, the block below reuses it.
    level.write(split << 4 | 2 << 2, group_bits);
    level.write(0, endpoint_bits);
    if has_alpha {
        level.write(0, alpha_endpoint_bits);
    }
    level.write(0, selector_bits);
    if has_alpha {
        level.write(0, alpha_selector_bits);
    }
    level.write(1, endpoint_bits);
    // Block (1, 0): same as left, the block below reuses it.
    level.write(2 << 2 | 1, group_bits);
    for _ in 0..3 {
        level.write(0, selector_bits);
        if has_alpha {
            level.write(0, alpha_selector_bits);
        }
    }

    let mut file = CrunchFile {
        width: 4,
        height: 4,
        format,
        tables: tables.finish(),
        color_endpoints: etc_color_endpoints(&[[10, 10, 10, 0], [12, 9, 10, 0]]),
        color_selectors: marked_color_selector(),
        level: level.finish(),
        ..Default::default()
    };
    if has_alpha {
        file.alpha_endpoints = alpha_endpoints(&[(128, 0x10)]);
        file.alpha_selectors = marked_alpha_selector();
    }
    file
}

/// A 4x4 Unity ETC file without subblocks (ETC1S or ETC2AS).
fn unity_etc_blocks(format: u8) -> CrunchFile {
    let has_alpha = format == 14;

    let mut tables = BitWriter::default();
    let group_bits = tables.flat_model(256);
    let endpoint_bits = tables.flat_model(2);
    let selector_bits = tables.flat_model(2);
    let (alpha_endpoint_bits, alpha_selector_bits) = if has_alpha {
        (tables.flat_model(2), tables.flat_model(2))
    } else {
        (0, 0)
    };

    let mut level = BitWriter::default();
    // New endpoint at (0, 0), left at (1, 0), both reused by the row below.
    level.write((1 | 2 << 2) << 4 | 2 << 2, group_bits);
    level.write(0, endpoint_bits);
    if has_alpha {
        level.write(0, alpha_endpoint_bits);
    }
    for _ in 0..4 {
        level.write(0, selector_bits);
        if has_alpha {
            level.write(0, alpha_selector_bits);
        }
    }

    let mut file = CrunchFile {
        width: 4,
        height: 4,
        format,
        tables: tables.finish(),
        color_endpoints: etc_color_endpoints(&[[10, 20, 5, 0]]),
        color_selectors: marked_color_selector(),
        level: level.finish(),
        ..Default::default()
    };
    if has_alpha {
        file.alpha_endpoints = alpha_endpoints(&[(128, 0x10)]);
        file.alpha_selectors = marked_alpha_selector();
    }
    file
}

/// Decodes level 0 through the block decoder and checks every pixel.
fn assert_pixels(file: CrunchFile, variant: CrunchVariant, expected: impl Fn(usize, usize) -> [u8; 4]) {
    let (width, height, rgba) = decode_crunch(&file.build(), variant).unwrap();
    assert_eq!((width, height), (4, 4));
    for (i, pixel) in rgba.chunks_exact(4).enumerate() {
        let (x, y) = (i % 4, i / 4);
        assert_eq!(pixel, expected(x, y), "pixel ({x}, {y})");
    }
}

#[test]
fn test_info() {
    let data = standard_dxt1().build();
    let info = crunch_info(&data, CrunchVariant::Standard).unwrap();

    assert_eq!((info.width, info.height), (8, 4));
    assert_eq!(info.levels, 1);
    assert_eq!(info.faces, 1);
    assert_eq!(info.format, CrunchFormat::Dxt1);
    assert_eq!(info.format.block_format(), TextureFormat::DXT1);
    assert_eq!(info.unpacked_size(), 16);
}

#[test]
fn test_unpack_standard_dxt1() {
    let data = standard_dxt1().build();
    let blocks = unpack_crunch(&data, CrunchVariant::Standard).unwrap();
    assert_eq!(blocks, WHITE_BLUE_BLOCKS);
}

#[test]
fn test_unpack_unity_dxt1() {
    let data = unity_dxt1().build();
    let blocks = unpack_crunch(&data, CrunchVariant::Unity).unwrap();
    assert_eq!(blocks, WHITE_BLUE_BLOCKS);
}

#[test]
fn test_decode_crunch() {
    let data = standard_dxt1().build();
    let (width, height, rgba) = decode_crunch(&data, CrunchVariant::Standard).unwrap();
    assert_eq!((width, height), (8, 4));

    for (i, pixel) in rgba.chunks_exact(4).enumerate() {
        let expected: [u8; 4] = if i % 8 < 4 { [255, 255, 255, 255] } else { [0, 0, 255, 255] };
        assert_eq!(pixel, expected, "pixel {i}");
    }
}

#[test]
fn test_unpack_standard_dxt5a() {
    let data = standard_dxt5a().build();
    let blocks = unpack_crunch(&data, CrunchVariant::Standard).unwrap();
    assert_eq!(blocks, [0xFFu8, 0, 0, 0, 0, 0, 0, 0]);

    let (_, _, rgba) = decode_crunch(&data, CrunchVariant::Standard).unwrap();
    assert!(rgba.chunks_exact(4).all(|pixel| pixel == [255u8, 0, 0, 255]));
}

#[test]
fn test_unpack_standard_dxt5() {
    let data = standard_dxt5().build();
    let blocks = unpack_crunch(&data, CrunchVariant::Standard).unwrap();

    let mut expected = vec![0xFF, 0x00];
    expected.extend_from_slice(&ALPHA_INDEX_1);
    expected.extend_from_slice(&[0xFF, 0xFF, 0x00, 0x00, 0x55, 0x55, 0x55, 0x55]);
    assert_eq!(blocks, expected);

    // Color index 1 is black and alpha index 1 is the second endpoint.
    assert_pixels(standard_dxt5(), CrunchVariant::Standard, |_, _| [0, 0, 0, 0]);
}

#[test]
fn test_unpack_standard_dxn() {
    let data = standard_dxn().build();
    let blocks = unpack_crunch(&data, CrunchVariant::Standard).unwrap();

    let mut expected = vec![0xFF, 0x00];
    expected.extend_from_slice(&ALPHA_INDEX_1);
    expected.extend_from_slice(&[0x10, 0x20]);
    expected.extend_from_slice(&ALPHA_INDEX_1);
    assert_eq!(blocks, expected);

    assert_pixels(standard_dxn(), CrunchVariant::Standard, |_, _| [0x00, 0x20, 0x00, 0xFF]);
}

#[test]
fn test_unpack_unity_etc1() {
    // Flipped: endpoint 0 (82, 82, 82) on top, endpoint 1 (99, 74, 82) below.
    // In place selectors keep the +8 modifier at pixel (1, 0).
    assert_pixels(unity_etc_subblocks(10, 1), CrunchVariant::Unity, |x, y| match (x, y) {
        (1, 0) => [90, 90, 90, 0xFF],
        (_, 0 | 1) => [84, 84, 84, 0xFF],
        _ => [101, 76, 84, 0xFF],
    });
}

#[test]
fn test_unpack_unity_etc2a() {
    // Unflipped: endpoint 0 on the left, endpoint 1 on the right. Color and
    // alpha selectors are both read transposed, moving the marked pixel to (0, 1).
    assert_pixels(unity_etc_subblocks(12, 3), CrunchVariant::Unity, |x, y| match (x, y) {
        (0, 1) => [90, 90, 90, 130],
        (0 | 1, _) => [84, 84, 84, 125],
        _ => [101, 76, 84, 125],
    });
}

#[test]
fn test_unpack_unity_etc2a_flipped_alpha() {
    assert_pixels(unity_etc_subblocks(12, 1), CrunchVariant::Unity, |x, y| match (x, y) {
        (1, 0) => [90, 90, 90, 130],
        (_, 0 | 1) => [84, 84, 84, 125],
        _ => [101, 76, 84, 125],
    });
}

#[test]
fn test_unpack_unity_etc1s() {
    let data = unity_etc_blocks(13).build();
    let blocks = unpack_crunch(&data, CrunchVariant::Unity).unwrap();
    // Differential mode with a zero delta, table 0 for both subblocks.
    assert_eq!(blocks[..4], [10u8 << 3, 20 << 3, 5 << 3, 0b10]);

    assert_pixels(unity_etc_blocks(13), CrunchVariant::Unity, |x, y| match (x, y) {
        (1, 0) => [90, 173, 49, 0xFF],
        _ => [84, 167, 43, 0xFF],
    });
}

#[test]
fn test_unpack_unity_etc2as() {
    // Blocks without subblocks use the in place alpha selector entry.
    assert_pixels(unity_etc_blocks(14), CrunchVariant::Unity, |x, y| match (x, y) {
        (1, 0) => [90, 173, 49, 130],
        _ => [84, 167, 43, 125],
    });
}

#[test]
fn test_empty_level_is_truncated() {
    let mut file = standard_dxt1();
    file.level.clear();

    let error = unpack_crunch(&file.build(), CrunchVariant::Standard).unwrap_err();
    assert_eq!(error, UnpackError::Truncated);
    assert!(error.is_corruption());
}

#[test]
fn test_short_palette_is_truncated() {
    let mut file = standard_dxt1();
    file.color_selectors.count = 40;

    let error = unpack_crunch(&file.build(), CrunchVariant::Standard).unwrap_err();
    assert_eq!(error, UnpackError::Truncated);
}

#[test]
fn test_standard_rejects_etc() {
    let mut file = unity_dxt1();
    file.format = 13;

    let data = file.build();
    assert_eq!(
        unpack_crunch(&data, CrunchVariant::Standard),
        Err(UnpackError::UnsupportedFormat(13))
    );
    assert_eq!(
        crunch_info(&data, CrunchVariant::Unity).map(|info| info.format),
        Ok(CrunchFormat::Etc1S)
    );
}

#[test]
fn test_corrupted_payload() {
    let mut data = standard_dxt1().build();
    let last = data.len() - 1;
    data[last] ^= 0x80;

    let error = unpack_crunch(&data, CrunchVariant::Standard).unwrap_err();
    assert_eq!(error, UnpackError::ChecksumMismatch("payload"));
    assert!(!error.is_corruption());
}

#[test]
fn test_unpacked_size_matches_info() {
    for (file, variant) in [
        (standard_dxt1(), CrunchVariant::Standard),
        (unity_dxt1(), CrunchVariant::Unity),
        (standard_dxt5a(), CrunchVariant::Standard),
        (standard_dxt5(), CrunchVariant::Standard),
        (standard_dxn(), CrunchVariant::Standard),
        (unity_etc_subblocks(10, 1), CrunchVariant::Unity),
        (unity_etc_subblocks(12, 3), CrunchVariant::Unity),
        (unity_etc_blocks(13), CrunchVariant::Unity),
        (unity_etc_blocks(14), CrunchVariant::Unity),
    ] {
        let data = file.build();
        let info = crunch_info(&data, variant).unwrap();
        let blocks = unpack_crunch(&data, variant).unwrap();
        assert_eq!(blocks.len(), info.unpacked_size());
        assert_eq!(
            blocks.len(),
            info.format.block_format().blocks_byte_size(info.width, info.height)
        );
    }
}

proptest! {
    #[test]
    fn unpack_never_panics(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = unpack_crunch(&data, CrunchVariant::Standard);
        let _ = unpack_crunch(&data, CrunchVariant::Unity);
    }

    #[test]
    fn unpack_never_panics_on_corrupted_streams(position in 74usize..200, value in any::<u8>()) {
        let mut data = unity_dxt1().build();
        if let Some(byte) = data.get_mut(position) {
            *byte = value;
        }
        // Recompute the payload checksum so the streams are actually parsed.
        let payload_crc = common::crc16(&data[74..]);
        data[10..12].copy_from_slice(&payload_crc.to_be_bytes());
        let header_crc = common::crc16(&data[6..74]);
        data[4..6].copy_from_slice(&header_crc.to_be_bytes());

        let _ = unpack_crunch(&data, CrunchVariant::Unity);
    }
}
