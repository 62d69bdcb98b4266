//! Shared helpers for unit tests

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

/// Encode a small solid-color RGB JPEG
pub(crate) fn tiny_jpeg(width: u32, height: u32) -> Vec<u8> {
    let pixels = vec![0x80u8; (width * height * 3) as usize];
    let mut out = Vec::new();
    JpegEncoder::new(&mut out)
        .encode(&pixels, width, height, ExtendedColorType::Rgb8)
        .expect("encode test jpeg");
    out
}
