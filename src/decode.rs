//! CPU based decoding of block compressed images into RGBA8.

mod astc;
mod atc;
mod block;
mod etc;
mod pvrtc;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use self::{
    astc::AstcDecoder,
    atc::{AtcRgb4Decoder, AtcRgba8Decoder},
    block::{Bc1Decoder, Bc3Decoder, Bc4Decoder, Bc5Decoder, Bc7Decoder},
    etc::{
        EacRDecoder, EacRgDecoder, Etc1Decoder, Etc2A1Decoder, Etc2A8Decoder, Etc2Decoder,
    },
};
use crate::{DecodeError, TextureFormat};

pub use self::astc::is_valid_footprint;

/// One decoded texel.
pub(crate) type Rgba = [u8; 4];

/// Largest block footprint of any format (ASTC 12x12).
const MAX_BLOCK_TEXELS: usize = 144;

/// A decoder for formats whose blocks are independent of each other.
pub(crate) trait BlockDecoder: Sync {
    /// Decodes one block into `texels`, which holds `width * height` texels in row-major order.
    fn decode_block(&self, compressed: &[u8], texels: &mut [Rgba]);

    /// Block footprint in texels.
    fn block_dimensions(&self) -> (usize, usize) {
        (4, 4)
    }

    fn block_byte_size(&self) -> usize;
}

fn decompress<D: BlockDecoder>(decoder: &D, width: u32, height: u32, input: &[u8], output: &mut [u8]) {
    let (block_width, block_height) = decoder.block_dimensions();
    let row_pitch = width as usize * 4;
    let blocks_x = (width as usize).div_ceil(block_width);
    let block_row_bytes = blocks_x * decoder.block_byte_size();

    let decode_row = |(rows, blocks): (&mut [u8], &[u8])| {
        decode_block_row(decoder, width as usize, rows, blocks);
    };

    #[cfg(feature = "rayon")]
    output
        .par_chunks_mut(row_pitch * block_height)
        .zip(input.par_chunks(block_row_bytes))
        .for_each(decode_row);

    #[cfg(not(feature = "rayon"))]
    output
        .chunks_mut(row_pitch * block_height)
        .zip(input.chunks(block_row_bytes))
        .for_each(decode_row);

    tracing::trace!(width, height, block_width, block_height, "decoded block image");
}

/// Decodes one row of blocks into the (up to `block_height`) output rows it covers.
#[inline]
fn decode_block_row<D: BlockDecoder>(decoder: &D, width: usize, rows: &mut [u8], blocks: &[u8]) {
    let (block_width, block_height) = decoder.block_dimensions();
    let row_pitch = width * 4;
    let visible_rows = rows.len() / row_pitch;
    let mut texels = [[0u8; 4]; MAX_BLOCK_TEXELS];
    let texels = &mut texels[..block_width * block_height];

    for (bx, compressed) in blocks.chunks_exact(decoder.block_byte_size()).enumerate() {
        decoder.decode_block(compressed, texels);

        let x = bx * block_width;
        let visible_columns = block_width.min(width - x);

        for y in 0..visible_rows {
            let source = &texels[y * block_width..][..visible_columns];
            rows[y * row_pitch + x * 4..][..visible_columns * 4]
                .copy_from_slice(bytemuck::cast_slice(source));
        }
    }
}

/// Checks the geometry and input length, returns the byte size of the decoded image.
fn validate(format: TextureFormat, data: &[u8], width: u32, height: u32) -> Result<usize, DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }

    if let TextureFormat::ASTC {
        block_width,
        block_height,
    } = format
    {
        if !is_valid_footprint(block_width, block_height) {
            return Err(DecodeError::InvalidBlockSize {
                width: block_width,
                height: block_height,
            });
        }
    }

    let image_size = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4));
    let (Some(image_size), Some(expected)) = (image_size, format.checked_blocks_byte_size(width, height)) else {
        return Err(DecodeError::InvalidDimensions { width, height });
    };

    if data.len() != expected {
        return Err(DecodeError::InvalidLength {
            expected,
            actual: data.len(),
        });
    }

    Ok(image_size)
}

/// Decodes `data` of the given format into a freshly allocated RGBA8 image.
///
/// The result holds `width * height * 4` bytes, row-major with the top row first.
///
/// # Errors
/// Returns a [`DecodeError`] when the dimensions are zero or too large to
/// address, the ASTC footprint is invalid or `data` does not hold exactly the
/// number of blocks covering the image. Nothing is allocated in that case.
pub fn decode(
    format: TextureFormat,
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<Vec<u8>, DecodeError> {
    let image_size = validate(format, data, width, height)?;

    let mut image = vec![0u8; image_size];
    decode_into(format, data, width, height, &mut image)?;
    Ok(image)
}

/// Decodes ASTC data with the given block footprint.
///
/// Shorthand for [`decode`] with [`TextureFormat::ASTC`].
pub fn decode_astc(
    data: &[u8],
    width: u32,
    height: u32,
    block_width: u32,
    block_height: u32,
) -> Result<Vec<u8>, DecodeError> {
    decode(
        TextureFormat::ASTC {
            block_width,
            block_height,
        },
        data,
        width,
        height,
    )
}

/// Decodes `data` of the given format into `output`.
///
/// `output` must hold exactly `width * height * 4` bytes.
pub fn decode_into(
    format: TextureFormat,
    data: &[u8],
    width: u32,
    height: u32,
    output: &mut [u8],
) -> Result<(), DecodeError> {
    let expected = validate(format, data, width, height)?;
    if output.len() != expected {
        return Err(DecodeError::InvalidOutputLength {
            expected,
            actual: output.len(),
        });
    }

    match format {
        TextureFormat::DXT1 => decompress(&Bc1Decoder, width, height, data, output),
        TextureFormat::DXT5 => decompress(&Bc3Decoder, width, height, data, output),
        TextureFormat::PVRTC2BPP => pvrtc::decompress::<true>(width, height, data, output)?,
        TextureFormat::PVRTC4BPP => pvrtc::decompress::<false>(width, height, data, output)?,
        TextureFormat::ETC1 => decompress(&Etc1Decoder, width, height, data, output),
        TextureFormat::ETC2 => decompress(&Etc2Decoder, width, height, data, output),
        TextureFormat::ETC2A1 => decompress(&Etc2A1Decoder, width, height, data, output),
        TextureFormat::ETC2A8 => decompress(&Etc2A8Decoder, width, height, data, output),
        TextureFormat::EACR => decompress(&EacRDecoder::<false>, width, height, data, output),
        TextureFormat::EACR_SIGNED => {
            decompress(&EacRDecoder::<true>, width, height, data, output)
        }
        TextureFormat::EACRG => decompress(&EacRgDecoder::<false>, width, height, data, output),
        TextureFormat::EACRG_SIGNED => {
            decompress(&EacRgDecoder::<true>, width, height, data, output)
        }
        TextureFormat::BC4 => decompress(&Bc4Decoder, width, height, data, output),
        TextureFormat::BC5 => decompress(&Bc5Decoder, width, height, data, output),
        #[cfg(feature = "bc6h")]
        TextureFormat::BC6 => decompress(&block::Bc6hDecoder::<false>, width, height, data, output),
        #[cfg(feature = "bc6h")]
        TextureFormat::BC6_SIGNED => {
            decompress(&block::Bc6hDecoder::<true>, width, height, data, output)
        }
        #[cfg(not(feature = "bc6h"))]
        TextureFormat::BC6 | TextureFormat::BC6_SIGNED => {
            return Err(DecodeError::UnsupportedFormat(format.name()))
        }
        TextureFormat::BC7 => decompress(&Bc7Decoder, width, height, data, output),
        TextureFormat::ATC_RGB4 => decompress(&AtcRgb4Decoder, width, height, data, output),
        TextureFormat::ATC_RGBA8 => decompress(&AtcRgba8Decoder, width, height, data, output),
        TextureFormat::ASTC {
            block_width,
            block_height,
        } => decompress(
            &AstcDecoder::new(block_width as usize, block_height as usize),
            width,
            height,
            data,
            output,
        ),
    }

    Ok(())
}
