//! Crunch container unpacking.
//!
//! A crunch file stores Huffman coded palettes of block endpoints and
//! selectors plus one coded stream per mip level that references them. Two
//! incompatible encoders share the `Hx` container: the original crunch
//! library and the fork shipped with Unity 2017.3 and later. The caller picks
//! the variant, the header alone cannot tell them apart.
//!
//! Unpacking reconstructs the level 0 block stream of every face, which can
//! be decoded with [`crate::decode`] using [`CrunchFormat::block_format`].

mod codec;
mod standard;
mod unity;

use crate::{TextureFormat, UnpackError};

use self::codec::{BitReader, HuffmanModel};

const SIGNATURE: u16 = 0x4878;

/// Size of the fixed header part, followed by one 4 byte offset per level.
const HEADER_FIXED_SIZE: usize = 70;

/// Crunch encoder generation that produced a container.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CrunchVariant {
    /// The original crunch library, chunk based level streams.
    Standard,
    /// The Unity fork, per block reference coded level streams and ETC support.
    Unity,
}

/// Block format stored in a crunch container.
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CrunchFormat {
    Dxt1,
    Dxt5,
    Dxt5CCxY,
    Dxt5xGxR,
    Dxt5xGBR,
    Dxt5AGBR,
    DxnXY,
    DxnYX,
    Dxt5A,
    Etc1,
    Etc2,
    Etc2A,
    Etc1S,
    Etc2AS,
}

impl CrunchFormat {
    fn from_tag(tag: u8, variant: CrunchVariant) -> Result<Self, UnpackError> {
        let format = match tag {
            0 => CrunchFormat::Dxt1,
            2 => CrunchFormat::Dxt5,
            3 => CrunchFormat::Dxt5CCxY,
            4 => CrunchFormat::Dxt5xGxR,
            5 => CrunchFormat::Dxt5xGBR,
            6 => CrunchFormat::Dxt5AGBR,
            7 => CrunchFormat::DxnXY,
            8 => CrunchFormat::DxnYX,
            9 => CrunchFormat::Dxt5A,
            10 if variant == CrunchVariant::Unity => CrunchFormat::Etc1,
            11 if variant == CrunchVariant::Unity => CrunchFormat::Etc2,
            12 if variant == CrunchVariant::Unity => CrunchFormat::Etc2A,
            13 if variant == CrunchVariant::Unity => CrunchFormat::Etc1S,
            14 if variant == CrunchVariant::Unity => CrunchFormat::Etc2AS,
            // 1 is DXT3, which neither decoder supports
            _ => return Err(UnpackError::UnsupportedFormat(tag)),
        };
        Ok(format)
    }

    /// Returns the format able to decode the unpacked block stream.
    ///
    /// The swizzled DXT5 variants decode as plain DXT5, the channels stay
    /// swizzled.
    pub const fn block_format(self) -> TextureFormat {
        match self {
            CrunchFormat::Dxt1 => TextureFormat::DXT1,
            CrunchFormat::Dxt5
            | CrunchFormat::Dxt5CCxY
            | CrunchFormat::Dxt5xGxR
            | CrunchFormat::Dxt5xGBR
            | CrunchFormat::Dxt5AGBR => TextureFormat::DXT5,
            CrunchFormat::DxnXY | CrunchFormat::DxnYX => TextureFormat::BC5,
            CrunchFormat::Dxt5A => TextureFormat::BC4,
            CrunchFormat::Etc1 | CrunchFormat::Etc1S => TextureFormat::ETC1,
            CrunchFormat::Etc2 => TextureFormat::ETC2,
            CrunchFormat::Etc2A | CrunchFormat::Etc2AS => TextureFormat::ETC2A8,
        }
    }

    /// Size of one unpacked block in bytes.
    pub const fn block_byte_size(self) -> usize {
        self.block_format().block_byte_size() as usize
    }

    /// Number of alpha (or single channel) blocks in front of the color block.
    const fn alpha_blocks(self) -> usize {
        match self {
            CrunchFormat::Dxt1 | CrunchFormat::Etc1 | CrunchFormat::Etc2 | CrunchFormat::Etc1S => 0,
            CrunchFormat::DxnXY | CrunchFormat::DxnYX => 2,
            _ => 1,
        }
    }

    const fn has_color(self) -> bool {
        !matches!(self, CrunchFormat::DxnXY | CrunchFormat::DxnYX | CrunchFormat::Dxt5A)
    }

    const fn is_etc(self) -> bool {
        matches!(
            self,
            CrunchFormat::Etc1 | CrunchFormat::Etc2 | CrunchFormat::Etc2A | CrunchFormat::Etc1S | CrunchFormat::Etc2AS
        )
    }

    /// ETC formats whose two subblocks carry their own endpoint.
    const fn has_subblocks(self) -> bool {
        matches!(self, CrunchFormat::Etc1 | CrunchFormat::Etc2 | CrunchFormat::Etc2A)
    }
}

/// Summary of a crunch header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CrunchInfo {
    /// Width of level 0 in pixels
    pub width: u32,
    /// Height of level 0 in pixels
    pub height: u32,
    /// Number of mip levels stored
    pub levels: u32,
    /// 1 for 2D textures, 6 for cube maps
    pub faces: u32,
    /// Block format of the unpacked stream
    pub format: CrunchFormat,
}

impl CrunchInfo {
    /// Number of block columns of level 0.
    pub const fn blocks_x(&self) -> usize {
        self.width.div_ceil(4) as usize
    }

    /// Number of block rows of level 0.
    pub const fn blocks_y(&self) -> usize {
        self.height.div_ceil(4) as usize
    }

    /// Byte size of the level 0 block stream of all faces.
    pub const fn unpacked_size(&self) -> usize {
        self.faces as usize * self.blocks_x() * self.blocks_y() * self.format.block_byte_size()
    }
}

/// Location of one coded palette.
#[derive(Copy, Clone, Debug, Default)]
struct Palette {
    offset: usize,
    size: usize,
    count: usize,
}

impl Palette {
    fn section<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.offset..self.offset + self.size]
    }
}

/// Parsed and validated container header.
#[derive(Debug)]
struct Header {
    info: CrunchInfo,
    data_size: usize,
    color_endpoints: Palette,
    color_selectors: Palette,
    alpha_endpoints: Palette,
    alpha_selectors: Palette,
    tables: Palette,
    level_offsets: Vec<usize>,
}

fn read_be(data: &[u8], offset: usize, len: usize) -> usize {
    data[offset..offset + len]
        .iter()
        .fold(0, |value, &byte| (value << 8) | byte as usize)
}

/// CRC-16/CCITT with inverted initial value and result.
fn crc16(data: &[u8]) -> u16 {
    let mut crc = !0u16;
    for &byte in data {
        let q = (byte as u16) ^ (crc >> 8);
        let r = q ^ (q >> 4);
        crc = (crc << 8) ^ r ^ (r << 5) ^ (r << 12);
    }
    !crc
}

impl Header {
    fn parse(data: &[u8], variant: CrunchVariant) -> Result<Self, UnpackError> {
        if data.len() < HEADER_FIXED_SIZE + 4 {
            return Err(UnpackError::InvalidHeader("file too small"));
        }
        if read_be(data, 0, 2) as u16 != SIGNATURE {
            return Err(UnpackError::InvalidHeader("bad signature"));
        }

        let header_size = read_be(data, 2, 2);
        let levels = data[16] as usize;
        if levels == 0 {
            return Err(UnpackError::InvalidHeader("no levels"));
        }
        if header_size < HEADER_FIXED_SIZE + 4 * levels || header_size > data.len() {
            return Err(UnpackError::InvalidHeader("bad header size"));
        }

        let data_size = read_be(data, 6, 4);
        if data_size < header_size || data_size > data.len() {
            return Err(UnpackError::InvalidHeader("bad data size"));
        }

        if crc16(&data[6..header_size]) as usize != read_be(data, 4, 2) {
            return Err(UnpackError::ChecksumMismatch("header"));
        }
        if crc16(&data[header_size..data_size]) as usize != read_be(data, 10, 2) {
            return Err(UnpackError::ChecksumMismatch("payload"));
        }

        let width = read_be(data, 12, 2) as u32;
        let height = read_be(data, 14, 2) as u32;
        if width == 0 || height == 0 {
            return Err(UnpackError::InvalidHeader("bad dimensions"));
        }

        let faces = data[17] as u32;
        if faces != 1 && faces != 6 {
            return Err(UnpackError::InvalidHeader("bad face count"));
        }

        let format = CrunchFormat::from_tag(data[18], variant)?;

        let palette = |offset: usize| Palette {
            offset: read_be(data, offset, 3),
            size: read_be(data, offset + 3, 3),
            count: read_be(data, offset + 6, 2),
        };
        let tables = Palette {
            offset: read_be(data, 67, 3),
            size: read_be(data, 65, 2),
            count: 0,
        };

        let header = Header {
            info: CrunchInfo {
                width,
                height,
                levels: levels as u32,
                faces,
                format,
            },
            data_size,
            color_endpoints: palette(33),
            color_selectors: palette(41),
            alpha_endpoints: palette(49),
            alpha_selectors: palette(57),
            tables,
            level_offsets: (0..levels)
                .map(|level| read_be(data, HEADER_FIXED_SIZE + 4 * level, 4))
                .collect(),
        };

        let sections = [
            header.tables,
            header.color_endpoints,
            header.color_selectors,
            header.alpha_endpoints,
            header.alpha_selectors,
        ];
        // Unused sections may point anywhere inside the file, used ones must
        // lie in the payload.
        if sections.iter().any(|section| {
            section.offset + section.size > data_size || (section.size > 0 && section.offset < header_size)
        }) {
            return Err(UnpackError::InvalidHeader("section out of bounds"));
        }

        let mut previous = header_size;
        for &offset in &header.level_offsets {
            if offset < previous || offset > data_size {
                return Err(UnpackError::InvalidHeader("level out of bounds"));
            }
            previous = offset;
        }

        if header.color_endpoints.count == 0 && header.alpha_endpoints.count == 0 {
            return Err(UnpackError::InvalidHeader("no palettes"));
        }

        Ok(header)
    }

    fn level_data<'a>(&self, data: &'a [u8], level: usize) -> &'a [u8] {
        let start = self.level_offsets[level];
        let end = self.level_offsets.get(level + 1).copied().unwrap_or(self.data_size);
        &data[start..end]
    }
}

/// Models shared by every level stream.
struct Tables {
    /// Chunk encodings for the standard variant, reference groups for the Unity one.
    block_encoding: HuffmanModel,
    endpoint_delta: [HuffmanModel; 2],
    selector_delta: [HuffmanModel; 2],
}

impl Tables {
    fn read(header: &Header, data: &[u8]) -> Result<Self, UnpackError> {
        let mut reader = BitReader::new(header.tables.section(data));

        let block_encoding = reader.read_model()?;
        let mut tables = Tables {
            block_encoding,
            endpoint_delta: Default::default(),
            selector_delta: Default::default(),
        };

        if header.color_endpoints.count > 0 {
            tables.endpoint_delta[0] = reader.read_model()?;
            tables.selector_delta[0] = reader.read_model()?;
        }
        if header.alpha_endpoints.count > 0 {
            tables.endpoint_delta[1] = reader.read_model()?;
            tables.selector_delta[1] = reader.read_model()?;
        }

        Ok(tables)
    }
}

/// Decoded endpoint and selector palettes, stored as the bytes they
/// contribute to an unpacked block.
#[derive(Default)]
struct Palettes {
    /// Endpoint half of a color block, little endian
    color_endpoints: Vec<u32>,
    /// Selector half of a color block, little endian
    color_selectors: Vec<u32>,
    /// First two bytes of an alpha block
    alpha_endpoints: Vec<u16>,
    /// Last six bytes of an alpha block
    alpha_selectors: Vec<[u8; 6]>,
}

/// Reads DXT color endpoints: two RGB565 colors, each channel delta coded
/// against the previous endpoint.
fn decode_dxt_color_endpoints(section: &[u8], count: usize) -> Result<Vec<u32>, UnpackError> {
    let mut reader = BitReader::new(section);
    let five_bit = reader.read_model()?;
    let six_bit = reader.read_model()?;

    let mut channels = [0u32; 6];
    let mut endpoints = Vec::with_capacity(count);
    for _ in 0..count {
        for (i, channel) in channels.iter_mut().enumerate() {
            let (model, mask) = if i % 3 == 1 { (&six_bit, 63) } else { (&five_bit, 31) };
            *channel = (*channel + reader.decode(model)?) & mask;
        }

        let [r0, g0, b0, r1, g1, b1] = channels;
        endpoints.push(b0 | (g0 << 5) | (r0 << 11) | (b1 << 16) | (g1 << 21) | (r1 << 27));
    }

    Ok(endpoints)
}

/// Reads alpha endpoint pairs, each value delta coded against the previous pair.
fn decode_alpha_endpoints(section: &[u8], count: usize) -> Result<Vec<u16>, UnpackError> {
    let mut reader = BitReader::new(section);
    let model = reader.read_model()?;

    let (mut a, mut b) = (0u32, 0u32);
    let mut endpoints = Vec::with_capacity(count);
    for _ in 0..count {
        a = (a + reader.decode(&model)?) & 0xFF;
        b = (b + reader.decode(&model)?) & 0xFF;
        endpoints.push((a | (b << 8)) as u16);
    }

    Ok(endpoints)
}

/// Adds a coded delta to a palette index, wrapping once around the palette.
fn advance(index: usize, delta: u32, len: usize) -> Result<usize, UnpackError> {
    let mut next = index + delta as usize;
    if next >= len {
        next -= len;
    }
    if next >= len {
        return Err(UnpackError::IndexOutOfRange { index: next, len });
    }
    Ok(next)
}

fn lookup<T: Copy>(palette: &[T], index: usize) -> Result<T, UnpackError> {
    palette.get(index).copied().ok_or(UnpackError::IndexOutOfRange {
        index,
        len: palette.len(),
    })
}

/// Builds an 8 byte alpha block.
fn alpha_block(endpoint: u16, selector: [u8; 6]) -> [u8; 8] {
    let mut block = [0u8; 8];
    block[..2].copy_from_slice(&endpoint.to_le_bytes());
    block[2..].copy_from_slice(&selector);
    block
}

/// Builds an 8 byte color block.
fn color_block(endpoint: u32, selector: u32) -> [u8; 8] {
    let mut block = [0u8; 8];
    block[..4].copy_from_slice(&endpoint.to_le_bytes());
    block[4..].copy_from_slice(&selector.to_le_bytes());
    block
}

/// Level 0 block stream of all faces, in row-major block order.
struct BlockImage {
    blocks: Vec<u8>,
    blocks_x: usize,
    blocks_y: usize,
    block_size: usize,
}

impl BlockImage {
    fn new(info: &CrunchInfo) -> Self {
        Self {
            blocks: vec![0; info.unpacked_size()],
            blocks_x: info.blocks_x(),
            blocks_y: info.blocks_y(),
            block_size: info.format.block_byte_size(),
        }
    }

    fn is_visible(&self, x: usize, y: usize) -> bool {
        x < self.blocks_x && y < self.blocks_y
    }

    /// Writes `part` at `offset` bytes into block (x, y) of `face`.
    fn write(&mut self, face: usize, x: usize, y: usize, offset: usize, part: &[u8]) {
        let start = ((face * self.blocks_y + y) * self.blocks_x + x) * self.block_size + offset;
        self.blocks[start..start + part.len()].copy_from_slice(part);
    }
}

/// Reads the header of a crunch container without decoding any palette.
pub fn crunch_info(data: &[u8], variant: CrunchVariant) -> Result<CrunchInfo, UnpackError> {
    Header::parse(data, variant).map(|header| header.info)
}

/// Unpacks level 0 of a crunch container into a DXT, DXN or ETC block stream.
///
/// Faces are concatenated, each face is `blocks_x * blocks_y` blocks of
/// [`CrunchFormat::block_byte_size`] bytes in row-major order.
pub fn unpack_crunch(data: &[u8], variant: CrunchVariant) -> Result<Vec<u8>, UnpackError> {
    let header = Header::parse(data, variant)?;
    let info = header.info;
    tracing::debug!(
        ?variant,
        format = ?info.format,
        width = info.width,
        height = info.height,
        levels = info.levels,
        faces = info.faces,
        "parsed crunch header"
    );

    // Every 2x2 chunk of every face codes at least one symbol, so a level
    // stream shorter than that cannot cover the image.
    let level = header.level_data(data, 0);
    let chunks = info.faces as usize * info.blocks_x().div_ceil(2) * info.blocks_y().div_ceil(2);
    if level.len() * 8 < chunks {
        return Err(UnpackError::Truncated);
    }

    let tables = Tables::read(&header, data)?;
    let palettes = match variant {
        CrunchVariant::Standard => standard::decode_palettes(&header, data)?,
        CrunchVariant::Unity => unity::decode_palettes(&header, data)?,
    };
    tracing::debug!(
        color_endpoints = palettes.color_endpoints.len(),
        color_selectors = palettes.color_selectors.len(),
        alpha_endpoints = palettes.alpha_endpoints.len(),
        alpha_selectors = palettes.alpha_selectors.len(),
        "decoded crunch palettes"
    );

    let mut image = BlockImage::new(&info);
    let mut reader = BitReader::new(level);
    match variant {
        CrunchVariant::Standard => standard::unpack_level(&mut reader, &info, &tables, &palettes, &mut image)?,
        CrunchVariant::Unity => unity::unpack_level(&mut reader, &info, &tables, &palettes, &mut image)?,
    }

    Ok(image.blocks)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    /// Minimal valid header with one level and no payload beyond a dummy byte.
    fn header_bytes(format: u8) -> Vec<u8> {
        let mut data = vec![0u8; 75];
        data[0..2].copy_from_slice(&SIGNATURE.to_be_bytes());
        data[2..4].copy_from_slice(&74u16.to_be_bytes());
        data[6..10].copy_from_slice(&75u32.to_be_bytes());
        data[12..14].copy_from_slice(&16u16.to_be_bytes());
        data[14..16].copy_from_slice(&8u16.to_be_bytes());
        data[16] = 1;
        data[17] = 1;
        data[18] = format;
        // One color endpoint so the header is not empty.
        data[39..41].copy_from_slice(&1u16.to_be_bytes());
        data[70..74].copy_from_slice(&74u32.to_be_bytes());
        seal(&mut data);
        data
    }

    fn seal(data: &mut [u8]) {
        let data_crc = crc16(&data[74..]);
        data[10..12].copy_from_slice(&data_crc.to_be_bytes());
        let header_crc = crc16(&data[6..74]);
        data[4..6].copy_from_slice(&header_crc.to_be_bytes());
    }

    #[test]
    fn test_crc16() {
        assert_eq!(crc16(b"123456789"), 0xD64E);
        assert_eq!(crc16(&[]), 0x0000);
    }

    #[test]
    fn test_header_info() {
        let info = crunch_info(&header_bytes(2), CrunchVariant::Standard).unwrap();
        assert_eq!(
            info,
            CrunchInfo {
                width: 16,
                height: 8,
                levels: 1,
                faces: 1,
                format: CrunchFormat::Dxt5,
            }
        );
        assert_eq!(info.unpacked_size(), 4 * 2 * 16);
    }

    #[test]
    fn test_empty_section_outside_file() {
        let mut data = header_bytes(0);
        data[67..70].copy_from_slice(&[0xFF; 3]);
        seal(&mut data);
        assert_eq!(
            unpack_crunch(&data, CrunchVariant::Standard),
            Err(UnpackError::InvalidHeader("section out of bounds"))
        );
    }

    #[test]
    fn test_level_too_short_for_image() {
        // 65535x65535 with six faces, backed by a single level byte.
        let mut data = header_bytes(0);
        data[12..16].copy_from_slice(&[0xFF; 4]);
        data[17] = 6;
        seal(&mut data);
        assert_eq!(
            unpack_crunch(&data, CrunchVariant::Standard),
            Err(UnpackError::Truncated)
        );
    }

    #[rstest]
    #[case::dxt3(1, CrunchVariant::Standard)]
    #[case::dxt3_unity(1, CrunchVariant::Unity)]
    #[case::etc1_standard(10, CrunchVariant::Standard)]
    #[case::unknown(15, CrunchVariant::Unity)]
    fn test_unsupported_format(#[case] tag: u8, #[case] variant: CrunchVariant) {
        assert_eq!(
            crunch_info(&header_bytes(tag), variant),
            Err(UnpackError::UnsupportedFormat(tag))
        );
    }

    #[test]
    fn test_etc_requires_unity() {
        let info = crunch_info(&header_bytes(13), CrunchVariant::Unity).unwrap();
        assert_eq!(info.format, CrunchFormat::Etc1S);
        assert_eq!(info.format.block_format(), TextureFormat::ETC1);
    }

    #[test]
    fn test_bad_signature() {
        let mut data = header_bytes(0);
        data[0] = b'X';
        assert_eq!(
            crunch_info(&data, CrunchVariant::Standard),
            Err(UnpackError::InvalidHeader("bad signature"))
        );
    }

    #[test]
    fn test_header_checksum() {
        let mut data = header_bytes(0);
        data[12] ^= 0x01;
        assert_eq!(
            crunch_info(&data, CrunchVariant::Standard),
            Err(UnpackError::ChecksumMismatch("header"))
        );
    }

    #[test]
    fn test_payload_checksum() {
        let mut data = header_bytes(0);
        data[74] ^= 0xFF;
        assert_eq!(
            crunch_info(&data, CrunchVariant::Standard),
            Err(UnpackError::ChecksumMismatch("payload"))
        );
    }

    #[test]
    fn test_bad_face_count() {
        let mut data = header_bytes(0);
        data[17] = 2;
        seal(&mut data);
        assert_eq!(
            crunch_info(&data, CrunchVariant::Standard),
            Err(UnpackError::InvalidHeader("bad face count"))
        );
    }

    #[test]
    fn test_truncated_file() {
        let data = header_bytes(0);
        assert_eq!(
            crunch_info(&data[..40], CrunchVariant::Standard),
            Err(UnpackError::InvalidHeader("file too small"))
        );
    }

    #[rstest]
    #[case(5, 1, 9, 0)]
    #[case(8, 1, 9, 0)]
    #[case(0, 20, 9, 2)]
    fn test_advance(#[case] index: usize, #[case] delta: u32, #[case] len: usize, #[case] expected: usize) {
        assert_eq!(advance(index, delta, len), Ok(expected));
    }

    #[test]
    fn test_advance_out_of_range() {
        assert_eq!(
            advance(0, 30, 9),
            Err(UnpackError::IndexOutOfRange { index: 21, len: 9 })
        );
    }
}
