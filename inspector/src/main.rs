use std::{path::PathBuf, time::Instant};

use block_decompression::{decode, decode_crunch, CrunchVariant, TextureFormat};
use ddsfile::{D3DFormat, Dds, DxgiFormat};
use image::{ExtendedColorType, ImageFormat};
use tracing_subscriber::EnvFilter;

enum Input {
    Raw {
        format: TextureFormat,
        width: u32,
        height: u32,
    },
    Dds,
    Crunch(CrunchVariant),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (input, file_name) = match parse_args() {
        Some(args) => args,
        None => return,
    };

    let start = Instant::now();
    let data = std::fs::read(&file_name).expect("failed to read input file");

    let (width, height, rgba) = match input {
        Input::Raw {
            format,
            width,
            height,
        } => {
            let rgba = decode(format, &data, width, height).expect("failed to decode blocks");
            (width, height, rgba)
        }
        Input::Dds => decode_dds(&data),
        Input::Crunch(variant) => {
            decode_crunch(&data, variant).expect("failed to decode crunch file")
        }
    };

    let duration = start.elapsed();
    println!(
        "Decoding {width}x{height} took: {:.3} ms",
        duration.as_secs_f64() * 1000.0
    );

    let mut png_name = PathBuf::from(&file_name);
    png_name.set_extension("png");

    image::save_buffer_with_format(
        &png_name,
        &rgba,
        width,
        height,
        ExtendedColorType::Rgba8,
        ImageFormat::Png,
    )
    .expect("failed to write PNG file");

    println!("Wrote {}", png_name.display());
}

fn decode_dds(data: &[u8]) -> (u32, u32, Vec<u8>) {
    let dds = Dds::read(data).expect("failed to parse DDS file");
    let format = dds_format(&dds).expect("unsupported DDS format");

    let width = dds.get_width();
    let height = dds.get_height();
    let size = format.blocks_byte_size(width, height);

    // Only the top level of the first layer.
    let blocks = dds.get_data(0).expect("DDS file has no data");
    let blocks = blocks.get(..size).expect("DDS data is truncated");

    let rgba = decode(format, blocks, width, height).expect("failed to decode blocks");
    (width, height, rgba)
}

fn dds_format(dds: &Dds) -> Option<TextureFormat> {
    if let Some(format) = dds.get_dxgi_format() {
        return match format {
            DxgiFormat::BC1_UNorm | DxgiFormat::BC1_UNorm_sRGB => Some(TextureFormat::DXT1),
            DxgiFormat::BC3_UNorm | DxgiFormat::BC3_UNorm_sRGB => Some(TextureFormat::DXT5),
            DxgiFormat::BC4_UNorm => Some(TextureFormat::BC4),
            DxgiFormat::BC5_UNorm => Some(TextureFormat::BC5),
            DxgiFormat::BC6H_UF16 => Some(TextureFormat::BC6),
            DxgiFormat::BC6H_SF16 => Some(TextureFormat::BC6_SIGNED),
            DxgiFormat::BC7_UNorm | DxgiFormat::BC7_UNorm_sRGB => Some(TextureFormat::BC7),
            _ => None,
        };
    }

    match dds.get_d3d_format()? {
        D3DFormat::DXT1 => Some(TextureFormat::DXT1),
        D3DFormat::DXT5 => Some(TextureFormat::DXT5),
        _ => None,
    }
}

fn print_help() {
    println!("Usage: inspector <input_kind> <input_file> [width height]");
    println!("\nInput kinds:");
    println!("  dds       - DDS file with BC1, BC3, BC4, BC5, BC6H or BC7 data");
    println!("  crn       - Crunch file");
    println!("  crn-unity - Crunch file written by Unity 2017.3 or later");
    println!("  <format>  - Raw blocks, needs width and height. One of:");
    println!("              dxt1, dxt5, bc4, bc5, bc6, bc6_signed, bc7, etc1, etc2, etc2a1, etc2a8,");
    println!("              eacr, eacr_signed, eacrg, eacrg_signed, atc_rgb4, atc_rgba8,");
    println!("              pvrtc2bpp, pvrtc4bpp, astc<W>x<H>");
    println!("\nThe image is written next to the input file as PNG.");
    println!("Set RUST_LOG=debug to trace crunch headers.");
}

fn raw_format(name: &str) -> Option<TextureFormat> {
    let format = match name {
        "dxt1" | "bc1" => TextureFormat::DXT1,
        "dxt5" | "bc3" => TextureFormat::DXT5,
        "bc4" => TextureFormat::BC4,
        "bc5" => TextureFormat::BC5,
        "bc6" | "bc6h" => TextureFormat::BC6,
        "bc6_signed" | "bc6h_sf" => TextureFormat::BC6_SIGNED,
        "bc7" => TextureFormat::BC7,
        "etc1" => TextureFormat::ETC1,
        "etc2" => TextureFormat::ETC2,
        "etc2a1" => TextureFormat::ETC2A1,
        "etc2a8" => TextureFormat::ETC2A8,
        "eacr" => TextureFormat::EACR,
        "eacr_signed" => TextureFormat::EACR_SIGNED,
        "eacrg" => TextureFormat::EACRG,
        "eacrg_signed" => TextureFormat::EACRG_SIGNED,
        "atc_rgb4" => TextureFormat::ATC_RGB4,
        "atc_rgba8" => TextureFormat::ATC_RGBA8,
        "pvrtc2bpp" => TextureFormat::PVRTC2BPP,
        "pvrtc4bpp" => TextureFormat::PVRTC4BPP,
        _ => {
            let (block_width, block_height) = name.strip_prefix("astc")?.split_once('x')?;
            TextureFormat::ASTC {
                block_width: block_width.parse().ok()?,
                block_height: block_height.parse().ok()?,
            }
        }
    };
    Some(format)
}

fn parse_args() -> Option<(Input, String)> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 || args.contains(&"--help".to_string()) {
        print_help();
        return None;
    }

    let kind = args[1].to_lowercase();
    let input = match (kind.as_str(), args.len()) {
        ("dds", 3) => Input::Dds,
        ("crn", 3) => Input::Crunch(CrunchVariant::Standard),
        ("crn-unity", 3) => Input::Crunch(CrunchVariant::Unity),
        (name, 5) => {
            let dimensions = args[3].parse().ok().zip(args[4].parse().ok());
            match (raw_format(name), dimensions) {
                (Some(format), Some((width, height))) => Input::Raw {
                    format,
                    width,
                    height,
                },
                _ => {
                    println!("Error: Invalid format or dimensions");
                    print_help();
                    return None;
                }
            }
        }
        _ => {
            println!("Error: Invalid arguments");
            print_help();
            return None;
        }
    };

    let file_name = args[2].clone();

    Some((input, file_name))
}
