//! GRIB2 parameter extraction.
//!
//! Turns configured parameters of a GRIB2 file into 8-bit RGB images:
//!
//! - Band selection by index or `KEY=VALUE` metadata match
//! - Unit conversion (Fahrenheit, mph, kph) and wind speed derivation
//! - Min/max normalization with the ranges kept for EXIF embedding
//! - One image per parameter plus a bounds file per input

pub mod bands;
pub mod bounds;
pub mod config;
pub mod convert;
pub mod error;
pub mod normalize;
mod pipeline;
pub mod source;

// Re-exports
pub use bands::{find_band_by_attribute, resolve_band, resolve_bands, BandResolution};
pub use bounds::GeoBounds;
pub use config::{
    parse_add_exif, BandSelection, BandSpec, ExtractionConfig, ParameterConfig, RunOptions,
};
pub use convert::{celsius_to_fahrenheit, vector_magnitude, Conversions, SpeedUnit};
pub use error::{ExtractionError, Result};
pub use normalize::{describe_ranges, format_value, normalize, NormalizedBand};
pub use pipeline::{run, ParameterOutcome, ParameterPipeline, RunSummary};
pub use renderer::OutputFormat;
pub use source::{open_source, RasterSource};
