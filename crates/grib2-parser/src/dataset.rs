//! Raster view over a whole GRIB2 file.
//!
//! Every field becomes one band of a single raster, including each field of
//! a multi-field message. Bands carry key/value metadata using the `GRIB_*`
//! keys that GDAL's GRIB driver reports, so a band can be selected with an
//! attribute match such as `GRIB_ELEMENT=TMP`.
//!
//! Band reads are returned north-up, with missing points set to
//! [`NO_DATA_VALUE`] and Kelvin temperatures converted to Celsius.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use crate::{Grib2Error, Grib2Message, Grib2Reader, Grib2Tables};

/// Fill value for grid points absent from the bitmap.
pub const NO_DATA_VALUE: f64 = 9999.0;

const KELVIN_OFFSET: f64 = 273.15;

/// Affine pixel-to-geographic transform:
/// `x = gt[0] + col * gt[1] + row * gt[2]`, `y = gt[3] + col * gt[4] + row * gt[5]`.
pub type GeoTransform = [f64; 6];

const IDENTITY_TRANSFORM: GeoTransform = [0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// One band of a [`Grib2Dataset`].
#[derive(Debug, Clone)]
pub struct Band {
    message: Grib2Message,
    metadata: BTreeMap<String, String>,
    unit: String,
    kelvin_to_celsius: bool,
}

impl Band {
    /// The underlying GRIB2 message.
    pub fn message(&self) -> &Grib2Message {
        &self.message
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn metadata_item(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Unit of the values returned by [`Grib2Dataset::read_band`].
    pub fn unit(&self) -> &str {
        &self.unit
    }
}

/// A GRIB2 file opened as a multi-band raster.
#[derive(Debug)]
pub struct Grib2Dataset {
    path: PathBuf,
    width: usize,
    height: usize,
    geo_transform: GeoTransform,
    spatial_ref: Option<String>,
    flip_rows: bool,
    bands: Vec<Band>,
}

impl Grib2Dataset {
    /// Open a GRIB2 file with the standard parameter tables.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Grib2Error> {
        Self::open_with_tables(path, Arc::new(Grib2Tables::standard()))
    }

    pub fn open_with_tables(
        path: impl AsRef<Path>,
        tables: Arc<Grib2Tables>,
    ) -> Result<Self, Grib2Error> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let mut dataset = Self::from_bytes(Bytes::from(data), tables)?;
        dataset.path = path.to_path_buf();

        info!(
            path = %path.display(),
            width = dataset.width,
            height = dataset.height,
            bands = dataset.bands.len(),
            "Opened GRIB2 dataset"
        );
        Ok(dataset)
    }

    /// Build a dataset from in-memory GRIB2 bytes.
    pub fn from_bytes(data: Bytes, tables: Arc<Grib2Tables>) -> Result<Self, Grib2Error> {
        let mut reader = Grib2Reader::new(data, tables.clone());
        let mut messages = Vec::new();
        while let Some(message) = reader.next_message()? {
            messages.push(message);
        }

        let first = messages
            .first()
            .ok_or_else(|| Grib2Error::InvalidFormat("No GRIB2 messages found".to_string()))?;

        let grid = &first.grid_definition;
        let width = grid.num_points_longitude as usize;
        let height = grid.num_points_latitude as usize;
        let geo_transform = geo_transform_for(first);
        let spatial_ref = spatial_ref_for(first);
        let flip_rows = grid.rows_south_to_north();

        for (i, message) in messages.iter().enumerate() {
            let (nj, ni) = message.grid_dims();
            if ni as usize != width || nj as usize != height {
                return Err(Grib2Error::GridMismatch {
                    message: i + 1,
                    width,
                    height,
                    actual_width: ni as usize,
                    actual_height: nj as usize,
                });
            }
        }

        let bands = messages
            .into_iter()
            .map(|message| build_band(message, &tables))
            .collect();

        Ok(Self {
            path: PathBuf::new(),
            width,
            height,
            geo_transform,
            spatial_ref,
            flip_rows,
            bands,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn geo_transform(&self) -> GeoTransform {
        self.geo_transform
    }

    /// WKT of the geographic coordinate system, when the grid defines one.
    pub fn spatial_ref(&self) -> Option<&str> {
        self.spatial_ref.as_deref()
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Band by 1-based index.
    pub fn band(&self, index: usize) -> Option<&Band> {
        index.checked_sub(1).and_then(|i| self.bands.get(i))
    }

    /// Read a whole band (1-based index) as row-major, north-up samples.
    pub fn read_band(&self, index: usize) -> Result<Vec<f64>, Grib2Error> {
        let band = self.band(index).ok_or(Grib2Error::BandOutOfRange {
            index: index as i64,
            count: self.bands.len(),
        })?;

        let raw = band.message.unpack_data()?;
        let expected = self.width * self.height;
        if raw.len() != expected {
            return Err(Grib2Error::UnpackingError(format!(
                "Band {} decoded {} values, grid has {}",
                index,
                raw.len(),
                expected
            )));
        }

        let kelvin = band.kelvin_to_celsius;
        let mut values: Vec<f64> = raw
            .into_iter()
            .map(|v| {
                if v.is_nan() {
                    NO_DATA_VALUE
                } else if kelvin {
                    v as f64 - KELVIN_OFFSET
                } else {
                    v as f64
                }
            })
            .collect();

        if self.flip_rows && self.width > 0 {
            flip_rows(&mut values, self.width);
        }

        debug!(band = index, param = %band.message.parameter(), "Read band");
        Ok(values)
    }
}

fn flip_rows(values: &mut [f64], width: usize) {
    let height = values.len() / width;
    for row in 0..height / 2 {
        let (top, bottom) = values.split_at_mut((height - 1 - row) * width);
        top[row * width..(row + 1) * width].swap_with_slice(&mut bottom[..width]);
    }
}

fn build_band(message: Grib2Message, tables: &Grib2Tables) -> Band {
    let discipline = message.indicator.discipline;
    let pd = &message.product_definition;

    let info = tables.get_parameter(discipline, pd.parameter_category, pd.parameter_number);
    let kelvin_to_celsius = info.is_some_and(|info| info.unit == "K");
    let (description, unit) = match info {
        Some(info) if kelvin_to_celsius => (info.description.clone(), "C".to_string()),
        Some(info) => (info.description.clone(), info.unit.clone()),
        None => (pd.parameter_short_name.clone(), "-".to_string()),
    };

    let reference = message.identification.reference_time.timestamp();
    let forecast = pd.forecast_seconds();

    let mut metadata = BTreeMap::new();
    metadata.insert("GRIB_ELEMENT".to_string(), pd.parameter_short_name.clone());
    metadata.insert(
        "GRIB_COMMENT".to_string(),
        format!("{} [{}]", description, unit),
    );
    metadata.insert("GRIB_UNIT".to_string(), format!("[{}]", unit));
    metadata.insert(
        "GRIB_SHORT_NAME".to_string(),
        format!(
            "{}-{}",
            pd.level_value,
            tables.get_surface_abbreviation(pd.level_type)
        ),
    );
    metadata.insert(
        "GRIB_DISCIPLINE".to_string(),
        format!("{}({})", discipline, discipline_name(discipline)),
    );
    metadata.insert("GRIB_PDS_PDTN".to_string(), pd.template_number.to_string());
    metadata.insert("GRIB_REF_TIME".to_string(), reference.to_string());
    metadata.insert(
        "GRIB_VALID_TIME".to_string(),
        (reference + forecast).to_string(),
    );
    metadata.insert("GRIB_FORECAST_SECONDS".to_string(), forecast.to_string());

    Band {
        message,
        metadata,
        unit,
        kelvin_to_celsius,
    }
}

fn discipline_name(discipline: u8) -> &'static str {
    match discipline {
        0 => "Meteorological",
        1 => "Hydrological",
        2 => "Land Surface",
        3 | 4 => "Space",
        10 => "Oceanographic",
        209 => "Local",
        _ => "Unknown",
    }
}

/// Geotransform with pixel edges half a cell outside the grid point centres.
fn geo_transform_for(message: &Grib2Message) -> GeoTransform {
    let grid = &message.grid_definition;
    if !grid.is_lat_lon() {
        return IDENTITY_TRANSFORM;
    }

    let dx = grid.longitude_step();
    let dy = grid.latitude_step();
    let north = grid.first_latitude().max(grid.last_latitude());

    [
        grid.first_longitude() - dx / 2.0,
        dx,
        0.0,
        north + dy / 2.0,
        0.0,
        -dy,
    ]
}

fn spatial_ref_for(message: &Grib2Message) -> Option<String> {
    let grid = &message.grid_definition;
    if !grid.is_lat_lon() {
        return None;
    }

    // Code Table 3.2: spherical shapes carry a radius, the rest are ellipsoids
    let (spheroid, semi_major, inverse_flattening) = match grid.earth_radius() {
        Some(radius) => ("Sphere", radius, 0.0),
        None => match grid.earth_shape {
            2 => ("IAU 1965", 6_378_160.0, 297.0),
            4 => ("GRS 1980", 6_378_137.0, 298.257222101),
            _ => ("WGS 84", 6_378_137.0, 298.257223563),
        },
    };

    Some(format!(
        "GEOGCS[\"Coordinate System imported from GRIB file\",\
         DATUM[\"unnamed\",SPHEROID[\"{}\",{},{}]],\
         PRIMEM[\"Greenwich\",0],\
         UNIT[\"degree\",0.0174532925199433],\
         AXIS[\"Latitude\",NORTH],AXIS[\"Longitude\",EAST]]",
        spheroid, semi_major, inverse_flattening
    ))
}
