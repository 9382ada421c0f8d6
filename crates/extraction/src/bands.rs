//! Band selection.
//!
//! A band spec is either a 1-based index, used unchanged, or a `KEY=VALUE`
//! string matched against band metadata. Index ranges are not checked here;
//! a bad index fails later when the band is read.

use tracing::debug;

use crate::config::{json_type_name, BandSpec};
use crate::error::{ExtractionError, Result};
use crate::source::RasterSource;

/// Outcome of resolving a parameter's band list.
#[derive(Debug)]
pub enum BandResolution {
    /// Band indices in channel order.
    Proceed(Vec<i64>),
    /// The parameter cannot be produced and is skipped.
    Skip(ExtractionError),
}

/// First band (1..N) whose metadata has `key == value`.
///
/// Returns `None` unless the attribute has exactly one `=`, or when no band
/// matches.
pub fn find_band_by_attribute<S: RasterSource + ?Sized>(source: &S, attribute: &str) -> Option<i64> {
    let mut parts = attribute.split('=');
    let (key, value) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    (1..=source.band_count())
        .find(|&i| {
            source
                .band_metadata(i)
                .and_then(|metadata| metadata.get(key))
                .is_some_and(|v| v == value)
        })
        .map(|i| i as i64)
}

/// Resolve one spec to a 1-based band index.
pub fn resolve_band<S: RasterSource + ?Sized>(source: &S, spec: &BandSpec) -> Result<i64> {
    match spec {
        BandSpec::Index(index) => Ok(*index),
        BandSpec::Attribute(attribute) => find_band_by_attribute(source, attribute)
            .ok_or_else(|| ExtractionError::BandNotFound(attribute.clone())),
        BandSpec::Other(value) => Err(ExtractionError::InvalidBandSpec(
            json_type_name(value).to_string(),
        )),
    }
}

/// Resolve every spec in order. The first failure skips the parameter.
pub fn resolve_bands<S: RasterSource + ?Sized>(source: &S, specs: &[BandSpec]) -> BandResolution {
    let resolved: Result<Vec<i64>> = specs.iter().map(|spec| resolve_band(source, spec)).collect();

    match resolved {
        Ok(bands) => {
            debug!(?bands, "Resolved bands");
            BandResolution::Proceed(bands)
        }
        Err(err) => BandResolution::Skip(err),
    }
}
