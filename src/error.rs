//! Error types returned by the block decoders and the crunch unpackers.

use thiserror::Error;

/// Errors that can occur while decoding a block compressed image.
///
/// All of these are detected before any block is touched, so a failed call
/// never produces a partially written image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Width or height is zero, or the image is too large to address.
    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions {
        /// The requested width in pixels
        width: u32,
        /// The requested height in pixels
        height: u32,
    },

    /// The compressed data does not have the size implied by the geometry.
    #[error("Invalid input length: expected {expected} bytes, got {actual} bytes.")]
    InvalidLength {
        /// The required size in bytes
        expected: usize,
        /// The actual size in bytes
        actual: usize,
    },

    /// The output slice does not have room for exactly `width * height` RGBA pixels.
    #[error("Invalid output length: expected {expected} bytes, got {actual} bytes.")]
    InvalidOutputLength {
        /// The required size in bytes
        expected: usize,
        /// The actual size in bytes
        actual: usize,
    },

    /// The ASTC block footprint is not one of the legal 2D footprints.
    #[error("Invalid ASTC block footprint: {width}x{height}")]
    InvalidBlockSize {
        /// Block width in texels
        width: u32,
        /// Block height in texels
        height: u32,
    },

    /// PVRTC data must consist of a power-of-two number of words in each direction.
    #[error("PVRTC block grid {blocks_x}x{blocks_y} is not a power of two")]
    NonPowerOfTwo {
        /// Number of words per row
        blocks_x: u32,
        /// Number of word rows
        blocks_y: u32,
    },

    /// The format was compiled out of this build.
    #[error("Unsupported texture format: {0}")]
    UnsupportedFormat(&'static str),
}

/// Errors that can occur while unpacking a crunch container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UnpackError {
    /// The container header is malformed.
    #[error("Invalid crunch header: {0}")]
    InvalidHeader(&'static str),

    /// The header or payload CRC16 does not match its contents.
    #[error("Crunch checksum mismatch in {0}")]
    ChecksumMismatch(&'static str),

    /// The container format tag is unknown or not handled by the requested variant.
    #[error("Unsupported crunch format tag: {0}")]
    UnsupportedFormat(u8),

    /// A Huffman code length table does not describe a valid prefix code.
    #[error("Invalid Huffman table")]
    InvalidTable,

    /// A section ended before all of its symbols were read.
    #[error("Crunch stream truncated")]
    Truncated,

    /// A bit pattern did not resolve to any symbol of the active code.
    #[error("Undefined Huffman symbol")]
    InvalidSymbol,

    /// A palette reference pointed outside of the decoded palette.
    #[error("Palette index {index} out of range (palette size {len})")]
    IndexOutOfRange {
        /// The referenced index
        index: usize,
        /// The palette length
        len: usize,
    },
}

impl UnpackError {
    /// Returns `true` for errors found mid-stream, `false` for errors found
    /// while validating the header and tables.
    pub const fn is_corruption(&self) -> bool {
        matches!(
            self,
            UnpackError::Truncated | UnpackError::InvalidSymbol | UnpackError::IndexOutOfRange { .. }
        )
    }
}

/// Error of the combined unpack-then-decode path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// Block decoding failed.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Crunch unpacking failed.
    #[error(transparent)]
    Unpack(#[from] UnpackError),
}
