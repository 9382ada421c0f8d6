//! Raster access used by the pipeline.

use std::collections::BTreeMap;
use std::path::Path;

use grib2_parser::{GeoTransform, Grib2Dataset, Grib2Error};
use tracing::debug;

use crate::error::{ExtractionError, Result};

/// A multi-band raster whose bands carry key/value metadata.
pub trait RasterSource {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn geo_transform(&self) -> GeoTransform;

    fn band_count(&self) -> usize;

    /// Metadata of a band by 1-based index.
    fn band_metadata(&self, index: usize) -> Option<&BTreeMap<String, String>>;

    /// Read a band by 1-based index as row-major samples.
    fn read_band(&self, index: i64) -> Result<Vec<f64>>;
}

impl RasterSource for Grib2Dataset {
    fn width(&self) -> usize {
        Grib2Dataset::width(self)
    }

    fn height(&self) -> usize {
        Grib2Dataset::height(self)
    }

    fn geo_transform(&self) -> GeoTransform {
        Grib2Dataset::geo_transform(self)
    }

    fn band_count(&self) -> usize {
        Grib2Dataset::band_count(self)
    }

    fn band_metadata(&self, index: usize) -> Option<&BTreeMap<String, String>> {
        self.band(index).map(|band| band.metadata())
    }

    fn read_band(&self, index: i64) -> Result<Vec<f64>> {
        let read = match usize::try_from(index) {
            Ok(i) if i >= 1 => Grib2Dataset::read_band(self, i),
            _ => Err(Grib2Error::BandOutOfRange {
                index,
                count: self.band_count(),
            }),
        };
        read.map_err(|source| ExtractionError::BandRead {
            band: index,
            source,
        })
    }
}

/// Open a GRIB2 file as the raster source of a run.
pub fn open_source(path: impl AsRef<Path>) -> Result<Grib2Dataset> {
    let path = path.as_ref();
    let dataset = Grib2Dataset::open(path).map_err(|source| ExtractionError::SourceOpen {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(
        path = %path.display(),
        spatial_ref = dataset.spatial_ref().unwrap_or("none"),
        "Raster source ready"
    );
    Ok(dataset)
}
