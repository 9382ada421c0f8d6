//! Packing of normalized 8-bit bands into RGB pixels.

use image::RgbImage;

use crate::{RenderError, Result};

/// Interleave up to three channels as red, green and blue.
///
/// Missing channels are filled with zeros and channels past the third are
/// ignored. Every supplied channel must hold `width * height` samples.
pub fn pack_rgb(channels: &[&[u8]], width: u32, height: u32) -> Result<RgbImage> {
    if channels.is_empty() {
        return Err(RenderError::NoChannels);
    }

    let expected = width as usize * height as usize;
    let used = &channels[..channels.len().min(3)];
    for (i, channel) in used.iter().enumerate() {
        if channel.len() != expected {
            return Err(RenderError::ChannelLength {
                channel: i + 1,
                expected,
                actual: channel.len(),
            });
        }
    }

    let mut pixels = vec![0u8; expected * 3];
    for (c, channel) in used.iter().enumerate() {
        for (pixel, &sample) in pixels.chunks_exact_mut(3).zip(channel.iter()) {
            pixel[c] = sample;
        }
    }

    RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
        RenderError::Encode(format!("Pixel buffer does not fit {}x{}", width, height))
    })
}
