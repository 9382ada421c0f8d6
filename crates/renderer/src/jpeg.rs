//! JPEG encoding with an optional EXIF APP1 segment.
//!
//! Compression is done by the `image` crate's baseline encoder. The EXIF
//! block is spliced in afterwards, directly after the JFIF APP0 header.

use image::codecs::jpeg::JpegEncoder;
use image::ColorType;

use crate::{RenderError, Result, JPEG_QUALITY};

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;
const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";

pub fn is_jpeg(data: &[u8]) -> bool {
    data.starts_with(&SOI)
}

/// Encode RGB pixels at [`JPEG_QUALITY`], adding `exif` as an APP1 segment.
pub fn create_jpeg(pixels: &[u8], width: u32, height: u32, exif: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY)
        .encode(pixels, width, height, ColorType::Rgb8)
        .map_err(|e| RenderError::Encode(e.to_string()))?;

    match exif {
        Some(exif) => insert_exif(&encoded, exif),
        None => Ok(encoded),
    }
}

fn insert_exif(jpeg: &[u8], exif: &[u8]) -> Result<Vec<u8>> {
    if !is_jpeg(jpeg) {
        return Err(RenderError::Encode("Encoder output is not a JPEG stream".to_string()));
    }

    // Segment length counts its own two bytes
    let segment_length = 2 + EXIF_HEADER.len() + exif.len();
    let segment_length = u16::try_from(segment_length).map_err(|_| {
        RenderError::Encode(format!("EXIF block of {} bytes does not fit in APP1", exif.len()))
    })?;

    let mut insert_at = SOI.len();
    if jpeg.get(2) == Some(&0xFF) && jpeg.get(3) == Some(&APP0) {
        let app0_length = jpeg
            .get(4..6)
            .map(|b| u16::from_be_bytes([b[0], b[1]]) as usize)
            .ok_or_else(|| RenderError::Encode("Truncated JFIF header".to_string()))?;
        insert_at += 2 + app0_length;
    }

    let mut out = Vec::with_capacity(jpeg.len() + segment_length as usize + 2);
    out.extend_from_slice(&jpeg[..insert_at]);
    out.extend_from_slice(&[0xFF, APP1]);
    out.extend_from_slice(&segment_length.to_be_bytes());
    out.extend_from_slice(EXIF_HEADER);
    out.extend_from_slice(exif);
    out.extend_from_slice(&jpeg[insert_at..]);
    Ok(out)
}

/// Find the TIFF block of the first EXIF APP1 segment.
pub fn read_exif(data: &[u8]) -> Option<&[u8]> {
    if !is_jpeg(data) {
        return None;
    }

    let mut offset = SOI.len();
    while offset + 4 <= data.len() {
        if data[offset] != 0xFF {
            return None;
        }
        let marker = data[offset + 1];
        if marker == 0xFF {
            // Fill byte
            offset += 1;
            continue;
        }
        if marker == SOS || marker == EOI {
            return None;
        }

        let length = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
        let body = data.get(offset + 4..offset + 2 + length)?;
        if marker == APP1 && body.starts_with(EXIF_HEADER) {
            return Some(&body[EXIF_HEADER.len()..]);
        }
        offset += 2 + length;
    }
    None
}
