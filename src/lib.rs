//! # block_decompression
//!
//! Decoders for GPU block compressed textures and Crunch containers, producing
//! tightly packed RGBA8 images for asset inspection and extraction tools.
//!
//! ## Supported formats
//!
//!  * DXT1 (BC1), DXT5 (BC3)
//!  * BC4, BC5, BC6H signed and unsigned (feature `bc6h`), BC7
//!  * ETC1, ETC2, ETC2A1, ETC2A8
//!  * EAC R11 and RG11, signed and unsigned
//!  * ATC RGB4 and RGBA8
//!  * PVRTC 2bpp and 4bpp
//!  * ASTC LDR, every 2D block footprint
//!
//! Crunch containers (both the original format and the Unity fork) are
//! unpacked into DXT or ETC block streams with [`unpack_crunch`], which can then
//! be fed into [`decode`].
//!
//! ## Example
//!
//! ```
//! use block_decompression::{decode, TextureFormat};
//!
//! // A single white DXT1 block.
//! let block = [0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
//! let rgba = decode(TextureFormat::DXT1, &block, 4, 4).unwrap();
//!
//! assert_eq!(rgba.len(), 4 * 4 * 4);
//! assert!(rgba.iter().all(|&channel| channel == 0xFF));
//! ```
pub mod crunch;
pub mod decode;
mod error;

pub use crunch::{crunch_info, unpack_crunch, CrunchFormat, CrunchInfo, CrunchVariant};
pub use decode::{decode, decode_astc, decode_into};
pub use error::{DecodeError, Error, UnpackError};

#[cfg(feature = "bc6h")]
#[cfg_attr(docsrs, doc(cfg(feature = "bc6h")))]
pub use half;

/// Block compressed formats supported by this crate.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub enum TextureFormat {
    /// DXT1 / BC1 with optional punch-through alpha (RGBA)
    DXT1,
    /// DXT5 / BC3 with smooth alpha (RGBA)
    DXT5,
    /// PVRTC with 2 bits per pixel (RGBA)
    PVRTC2BPP,
    /// PVRTC with 4 bits per pixel (RGBA)
    PVRTC4BPP,
    /// ETC1 (RGB)
    ETC1,
    /// ETC2 (RGB)
    ETC2,
    /// ETC2 with punch-through alpha (RGBA)
    ETC2A1,
    /// ETC2 with an EAC alpha channel (RGBA)
    ETC2A8,
    /// EAC single channel, unsigned (R)
    EACR,
    /// EAC single channel, signed (R)
    EACR_SIGNED,
    /// EAC two channels, unsigned (RG)
    EACRG,
    /// EAC two channels, signed (RG)
    EACRG_SIGNED,
    /// BC4 (R)
    BC4,
    /// BC5 (RG)
    BC5,
    /// BC6H unsigned half float (RGB HDR), clamped to LDR
    BC6,
    /// BC6H signed half float (RGB HDR), clamped to LDR
    BC6_SIGNED,
    /// BC7 (RGBA)
    BC7,
    /// ATC without alpha (RGB)
    ATC_RGB4,
    /// ATC with interpolated alpha (RGBA)
    ATC_RGBA8,
    /// ASTC with the given block footprint in texels (RGBA)
    ASTC {
        /// Block width in texels
        block_width: u32,
        /// Block height in texels
        block_height: u32,
    },
}

impl TextureFormat {
    /// Returns the block footprint in texels.
    pub const fn block_dimensions(self) -> (u32, u32) {
        match self {
            TextureFormat::PVRTC2BPP => (8, 4),
            TextureFormat::ASTC {
                block_width,
                block_height,
            } => (block_width, block_height),
            _ => (4, 4),
        }
    }

    /// Returns the size of one compressed block in bytes.
    pub const fn block_byte_size(self) -> u32 {
        match self {
            TextureFormat::DXT1
            | TextureFormat::PVRTC2BPP
            | TextureFormat::PVRTC4BPP
            | TextureFormat::ETC1
            | TextureFormat::ETC2
            | TextureFormat::ETC2A1
            | TextureFormat::EACR
            | TextureFormat::EACR_SIGNED
            | TextureFormat::BC4
            | TextureFormat::ATC_RGB4 => 8,
            TextureFormat::DXT5
            | TextureFormat::ETC2A8
            | TextureFormat::EACRG
            | TextureFormat::EACRG_SIGNED
            | TextureFormat::BC5
            | TextureFormat::BC6
            | TextureFormat::BC6_SIGNED
            | TextureFormat::BC7
            | TextureFormat::ATC_RGBA8
            | TextureFormat::ASTC { .. } => 16,
        }
    }

    /// Returns the bytes per row of blocks for the given width.
    ///
    /// The width is rounded up to the next multiple of the block width.
    pub const fn bytes_per_row(self, width: u32) -> u32 {
        let (block_width, _) = self.block_dimensions();
        width.div_ceil(block_width) * self.block_byte_size()
    }

    /// Returns the byte size of the compressed blocks covering an image of the given dimensions.
    ///
    /// Width and height are rounded up to the next multiple of the block footprint.
    /// Saturates at `usize::MAX` when the size is not addressable.
    pub const fn blocks_byte_size(self, width: u32, height: u32) -> usize {
        match self.checked_blocks_byte_size(width, height) {
            Some(size) => size,
            None => usize::MAX,
        }
    }

    /// Like [`blocks_byte_size`](Self::blocks_byte_size), but returns `None` on overflow.
    pub const fn checked_blocks_byte_size(self, width: u32, height: u32) -> Option<usize> {
        let (block_width, block_height) = self.block_dimensions();
        let blocks_x = width.div_ceil(block_width) as usize;
        let blocks_y = height.div_ceil(block_height) as usize;
        match blocks_x.checked_mul(blocks_y) {
            Some(blocks) => blocks.checked_mul(self.block_byte_size() as usize),
            None => None,
        }
    }

    /// Short lowercase name of the format.
    pub const fn name(self) -> &'static str {
        match self {
            TextureFormat::DXT1 => "dxt1",
            TextureFormat::DXT5 => "dxt5",
            TextureFormat::PVRTC2BPP => "pvrtc2bpp",
            TextureFormat::PVRTC4BPP => "pvrtc4bpp",
            TextureFormat::ETC1 => "etc1",
            TextureFormat::ETC2 => "etc2",
            TextureFormat::ETC2A1 => "etc2a1",
            TextureFormat::ETC2A8 => "etc2a8",
            TextureFormat::EACR => "eacr",
            TextureFormat::EACR_SIGNED => "eacr_signed",
            TextureFormat::EACRG => "eacrg",
            TextureFormat::EACRG_SIGNED => "eacrg_signed",
            TextureFormat::BC4 => "bc4",
            TextureFormat::BC5 => "bc5",
            TextureFormat::BC6 => "bc6",
            TextureFormat::BC6_SIGNED => "bc6_signed",
            TextureFormat::BC7 => "bc7",
            TextureFormat::ATC_RGB4 => "atc_rgb4",
            TextureFormat::ATC_RGBA8 => "atc_rgba8",
            TextureFormat::ASTC { .. } => "astc",
        }
    }
}

/// Decodes the first face of a crunch container's top level into RGBA8.
///
/// Returns the image width, height and pixels.
pub fn decode_crunch(data: &[u8], variant: CrunchVariant) -> Result<(u32, u32, Vec<u8>), Error> {
    let info = crunch_info(data, variant)?;
    let blocks = unpack_crunch(data, variant)?;
    let format = info.format.block_format();
    let face_size = format.blocks_byte_size(info.width, info.height);
    let rgba = decode(format, &blocks[..face_size], info.width, info.height)?;
    Ok((info.width, info.height, rgba))
}
