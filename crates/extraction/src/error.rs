//! Error types for the extraction crate.

use std::path::PathBuf;

use grib2_parser::Grib2Error;
use renderer::RenderError;
use thiserror::Error;

/// Errors that can occur while extracting parameters.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Could not open {path}: {source}")]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: Grib2Error,
    },

    #[error("Failed to read config {path}: {reason}")]
    ConfigRead { path: PathBuf, reason: String },

    #[error("Invalid configuration for {parameter}: {reason}")]
    InvalidConfig { parameter: String, reason: String },

    #[error("Could not find band matching attribute: {0}")]
    BandNotFound(String),

    #[error("Invalid band specification type: {0}")]
    InvalidBandSpec(String),

    #[error("Failed to read band {band}: {source}")]
    BandRead {
        band: i64,
        #[source]
        source: Grib2Error,
    },

    #[error("Parameter {parameter} produced no channels")]
    NoChannels { parameter: String },

    #[error("Failed to encode image: {0}")]
    Encode(#[from] RenderError),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractionError {
    /// Errors that skip the current parameter instead of aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExtractionError::BandNotFound(_) | ExtractionError::InvalidBandSpec(_)
        )
    }
}

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;
