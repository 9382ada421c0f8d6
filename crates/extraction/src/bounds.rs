//! Geographic extent of the raster, written once per run.

use std::fs;
use std::path::{Path, PathBuf};

use grib2_parser::GeoTransform;

use crate::error::{ExtractionError, Result};
use crate::normalize::format_value;

/// Outer edges of the raster in geotransform units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl GeoBounds {
    /// Edges of a `width` x `height` raster. Rotation terms are ignored.
    pub fn from_geo_transform(gt: &GeoTransform, width: usize, height: usize) -> Self {
        let min_x = gt[0];
        let max_y = gt[3];
        Self {
            min_x,
            max_x: min_x + width as f64 * gt[1],
            min_y: max_y + height as f64 * gt[5],
            max_y,
        }
    }

    /// Four `key: value` lines, minx/maxx/miny/maxy.
    pub fn to_text(&self) -> String {
        format!(
            "minx: {}\nmaxx: {}\nminy: {}\nmaxy: {}\n",
            format_value(self.min_x),
            format_value(self.max_x),
            format_value(self.min_y),
            format_value(self.max_y)
        )
    }

    /// Write `bounds_<suffix>.txt` into `dir`.
    pub fn write(&self, dir: &Path, suffix: &str) -> Result<PathBuf> {
        let path = dir.join(format!("bounds_{}.txt", suffix));
        fs::write(&path, self.to_text()).map_err(|source| ExtractionError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
