//! Image output for extracted GRIB2 parameters.
//!
//! Packs up to three 8-bit channels into an RGB raster and encodes it as
//! JPEG or PNG. Both encoders can embed a short text description in an EXIF
//! block, which is how per-band value ranges travel with the image.

pub mod channels;
pub mod exif;
pub mod jpeg;
pub mod png;

use std::fmt;
use std::str::FromStr;

use image::RgbImage;
use thiserror::Error;

pub use channels::pack_rgb;

/// JPEG quality used for every encoded image.
pub const JPEG_QUALITY: u8 = 95;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("Cannot pack an image with no channels")]
    NoChannels,

    #[error("Channel {channel} has {actual} samples, expected {expected}")]
    ChannelLength {
        channel: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Image encoding failed: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;

/// Image encodings supported for output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            _ => Err(RenderError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Encode an RGB image, embedding `description` as EXIF ImageDescription
/// when given.
pub fn encode(
    image: &RgbImage,
    format: OutputFormat,
    description: Option<&str>,
) -> Result<Vec<u8>> {
    let exif = description.map(exif::build_description);
    let (width, height) = image.dimensions();

    let encoded = match format {
        OutputFormat::Jpeg => jpeg::create_jpeg(image.as_raw(), width, height, exif.as_deref())?,
        OutputFormat::Png => png::create_png_rgb(
            image.as_raw(),
            width as usize,
            height as usize,
            exif.as_deref(),
        )
        .map_err(RenderError::Encode)?,
    };

    tracing::debug!(
        format = %format,
        width,
        height,
        bytes = encoded.len(),
        exif = exif.is_some(),
        "Encoded image"
    );
    Ok(encoded)
}

/// Recover the EXIF ImageDescription from encoded JPEG or PNG bytes.
pub fn read_description(data: &[u8]) -> Option<String> {
    let tiff = if png::is_png(data) {
        png::read_exif(data)?
    } else if jpeg::is_jpeg(data) {
        jpeg::read_exif(data)?
    } else {
        return None;
    };
    exif::parse_description(tiff)
}
