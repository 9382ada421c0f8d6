//! GRIB2 parser implementation (WMO FM 92 GRIB Edition 2).
//!
//! This crate provides a pure Rust reader for GRIB2 files, the standard
//! format for meteorological data exchange, plus a raster view over a
//! whole file ([`Grib2Dataset`]) where every field is one band.

pub mod dataset;
pub mod sections;
pub mod tables;
pub mod unpacking;

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

pub use dataset::{Band, GeoTransform, Grib2Dataset, NO_DATA_VALUE};
pub use sections::{
    Bitmap, DataRepresentation, DataSection, FieldLayout, GridDefinition, Identification,
    Indicator, ProductDefinition,
};
pub use tables::{Grib2Tables, LevelDescription, ParameterInfo};
pub use unpacking::unpack_simple;

/// Errors raised while reading GRIB2 data.
#[derive(Debug, Error)]
pub enum Grib2Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid GRIB2 format: {0}")]
    InvalidFormat(String),

    #[error("Invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },

    #[error("Unpacking failed: {0}")]
    UnpackingError(String),

    #[error("Message {message} has a {actual_width}x{actual_height} grid, expected {width}x{height}")]
    GridMismatch {
        message: usize,
        width: usize,
        height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("Band {index} out of range (dataset has {count} bands)")]
    BandOutOfRange { index: i64, count: usize },
}

/// One field of a GRIB2 message (a single parameter on a single grid).
///
/// Messages that repeat sections 4-7 yield one `Grib2Message` per field,
/// all sharing the same `raw` bytes.
#[derive(Debug, Clone)]
pub struct Grib2Message {
    pub indicator: Indicator,
    pub identification: Identification,
    pub grid_definition: GridDefinition,
    pub product_definition: ProductDefinition,
    pub data_representation: DataRepresentation,
    pub bitmap: Option<Bitmap>,
    pub data_section: DataSection,
    /// Raw bytes of the whole message, sections 0 through 8.
    pub raw: Bytes,
    /// 0-based position of this field within its message.
    pub field: usize,
}

impl Grib2Message {
    /// Parameter short name (e.g. "TMP", "UGRD").
    pub fn parameter(&self) -> &str {
        &self.product_definition.parameter_short_name
    }

    /// Human-readable level (e.g. "2 m above ground").
    pub fn level(&self) -> &str {
        &self.product_definition.level_description
    }

    /// Grid dimensions as (rows, columns).
    pub fn grid_dims(&self) -> (u32, u32) {
        (
            self.grid_definition.num_points_latitude,
            self.grid_definition.num_points_longitude,
        )
    }

    /// Decode the field values in scan order. Missing points are NaN.
    ///
    /// Simple packing (template 5.0) is decoded here. Everything else
    /// (complex packing, JPEG2000, PNG) goes through the `grib` crate.
    pub fn unpack_data(&self) -> Result<Vec<f32>, Grib2Error> {
        let bitmap_usable = match &self.bitmap {
            None => true,
            Some(bm) => bm.indicator == 0,
        };

        if self.data_representation.packing_method == 0 && bitmap_usable {
            let dr = &self.data_representation;
            let values = unpack_simple(
                &self.data_section.data,
                self.grid_definition.num_data_points,
                dr.bits_per_value,
                dr.reference_value,
                dr.binary_scale_factor,
                dr.decimal_scale_factor,
                self.bitmap.as_ref().map(|bm| bm.data.as_ref()),
            )?;
            return Ok(values.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect());
        }

        debug!(
            template = self.data_representation.packing_method,
            param = %self.parameter(),
            "Delegating unpacking to grib crate"
        );
        self.unpack_with_grib_crate()
    }

    fn unpack_with_grib_crate(&self) -> Result<Vec<f32>, Grib2Error> {
        let grib2 = grib::from_reader(Cursor::new(self.raw.as_ref()))
            .map_err(|e| Grib2Error::UnpackingError(format!("{:?}", e)))?;

        let (_, submessage) = grib2.iter().nth(self.field).ok_or_else(|| {
            Grib2Error::UnpackingError(format!("Message has no field {}", self.field))
        })?;

        let decoder = grib::Grib2SubmessageDecoder::from(submessage)
            .map_err(|e| Grib2Error::UnpackingError(format!("{:?}", e)))?;
        let values = decoder
            .dispatch()
            .map_err(|e| Grib2Error::UnpackingError(format!("{:?}", e)))?;

        Ok(values.collect())
    }
}

/// Sequential reader over the fields of a GRIB2 byte stream.
pub struct Grib2Reader {
    data: Bytes,
    offset: usize,
    tables: Arc<Grib2Tables>,
    pending: VecDeque<Grib2Message>,
}

impl Grib2Reader {
    pub fn new(data: Bytes, tables: Arc<Grib2Tables>) -> Self {
        Self {
            data,
            offset: 0,
            tables,
            pending: VecDeque::new(),
        }
    }

    /// Parse the next field, or `None` once no further "GRIB" marker exists.
    ///
    /// Fields of a multi-field message are returned one by one, in order.
    pub fn next_message(&mut self) -> Result<Option<Grib2Message>, Grib2Error> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(Some(message));
        }

        let start = match find_magic(&self.data[self.offset..]) {
            Some(pos) => self.offset + pos,
            None => {
                self.offset = self.data.len();
                return Ok(None);
            }
        };

        let indicator = sections::parse_indicator(&self.data[start..])?;
        let length = usize::try_from(indicator.message_length).map_err(|_| {
            Grib2Error::InvalidFormat(format!(
                "Message length {} does not fit in memory",
                indicator.message_length
            ))
        })?;

        if length < 16 || start + length > self.data.len() {
            return Err(Grib2Error::InvalidFormat(format!(
                "Message at offset {} claims {} bytes, {} available",
                start,
                length,
                self.data.len() - start
            )));
        }

        let raw = self.data.slice(start..start + length);
        self.offset = start + length;

        let fields = parse_fields(raw, indicator, &self.tables)?;
        if fields.len() > 1 {
            debug!(offset = start, fields = fields.len(), "Multi-field message");
        }
        self.pending.extend(fields);
        Ok(self.pending.pop_front())
    }
}

/// Bitmap indicator meaning "the bitmap of the previous field applies".
const BITMAP_PREVIOUSLY_DEFINED: u8 = 254;

fn parse_fields(
    raw: Bytes,
    indicator: Indicator,
    tables: &Grib2Tables,
) -> Result<Vec<Grib2Message>, Grib2Error> {
    let layouts = sections::field_layouts(&raw)?;
    let mut fields: Vec<Grib2Message> = Vec::with_capacity(layouts.len());

    for (field, layout) in layouts.iter().enumerate() {
        let mut bitmap = match layout.bitmap {
            Some(offset) => sections::parse_bitmap(&raw[offset..])?,
            None => None,
        };
        if bitmap
            .as_ref()
            .is_some_and(|bm| bm.indicator == BITMAP_PREVIOUSLY_DEFINED)
        {
            if let Some(previous) = fields.last().and_then(|f| f.bitmap.clone()) {
                bitmap = Some(previous);
            }
        }

        fields.push(Grib2Message {
            indicator: indicator.clone(),
            identification: sections::parse_identification(&raw[layout.identification..])?,
            grid_definition: sections::parse_grid_definition(&raw[layout.grid..])?,
            product_definition: sections::parse_product_definition(
                &raw[layout.product..],
                indicator.discipline,
                tables,
            )?,
            data_representation: sections::parse_data_representation(
                &raw[layout.representation..],
            )?,
            bitmap,
            data_section: sections::parse_data_section(&raw[layout.data..])?,
            raw: raw.clone(),
            field,
        });
    }

    Ok(fields)
}

fn find_magic(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"GRIB")
}
