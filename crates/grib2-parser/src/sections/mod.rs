//! GRIB2 section parsing.
//!
//! Each GRIB2 message consists of multiple sections containing metadata,
//! grid information and packed data. [`field_layouts`] walks a message and
//! locates the sections of every field it carries; the `parse_*` functions
//! take the bytes of one section, starting at its length octets.

use crate::tables::Grib2Tables;
use crate::Grib2Error;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};

/// Value used by GRIB2 for "missing" in 4-octet unsigned fields.
const MISSING_U32: u32 = 0xFFFF_FFFF;

/// Section 0: Indicator Section (16 bytes)
#[derive(Debug, Clone)]
pub struct Indicator {
    pub magic: [u8; 4],
    pub reserved: u16,
    pub edition: u8,
    pub discipline: u8,
    pub message_length: u64,
}

/// Section 1: Identification Section
#[derive(Debug, Clone)]
pub struct Identification {
    pub center: u16,
    pub sub_center: u16,
    pub table_version: u8,
    pub local_table_version: u8,
    pub significance_of_reference_time: u8,
    pub reference_time: DateTime<Utc>,
    pub production_status: u8,
    pub data_type: u8,
}

/// Section 3: Grid Definition Section
///
/// Angles are kept in microdegrees, as encoded by template 3.0.
#[derive(Debug, Clone)]
pub struct GridDefinition {
    pub template_number: u16,
    pub num_data_points: u32,
    pub earth_shape: u8,
    pub earth_radius_scale: u8,
    pub earth_radius_scaled: u32,
    pub num_points_latitude: u32,
    pub num_points_longitude: u32,
    pub first_latitude_microdegrees: i32,
    pub first_longitude_microdegrees: i32,
    pub last_latitude_microdegrees: i32,
    pub last_longitude_microdegrees: i32,
    /// Di: increment along a parallel (i / longitude direction).
    pub i_increment_microdegrees: u32,
    /// Dj: increment along a meridian (j / latitude direction).
    pub j_increment_microdegrees: u32,
    pub scanning_mode: u8,
}

impl GridDefinition {
    /// True for template 3.0 (regular latitude/longitude).
    pub fn is_lat_lon(&self) -> bool {
        self.template_number == 0
    }

    pub fn first_latitude(&self) -> f64 {
        self.first_latitude_microdegrees as f64 / 1e6
    }

    pub fn last_latitude(&self) -> f64 {
        self.last_latitude_microdegrees as f64 / 1e6
    }

    /// Longitude of the first grid point, wrapped into (-180, 180].
    pub fn first_longitude(&self) -> f64 {
        wrap_longitude(self.first_longitude_microdegrees as f64 / 1e6)
    }

    /// Longitude step in degrees, derived from the corners when Di is missing.
    pub fn longitude_step(&self) -> f64 {
        if self.i_increment_microdegrees != 0 && self.i_increment_microdegrees != MISSING_U32 {
            return self.i_increment_microdegrees as f64 / 1e6;
        }
        if self.num_points_longitude < 2 {
            return 0.0;
        }
        let span = (self.last_longitude_microdegrees as f64 - self.first_longitude_microdegrees as f64)
            .abs()
            / 1e6;
        span / (self.num_points_longitude - 1) as f64
    }

    /// Latitude step in degrees, derived from the corners when Dj is missing.
    pub fn latitude_step(&self) -> f64 {
        if self.j_increment_microdegrees != 0 && self.j_increment_microdegrees != MISSING_U32 {
            return self.j_increment_microdegrees as f64 / 1e6;
        }
        if self.num_points_latitude < 2 {
            return 0.0;
        }
        (self.last_latitude() - self.first_latitude()).abs() / (self.num_points_latitude - 1) as f64
    }

    /// Whether rows are stored south to north and must be flipped for a north-up raster.
    ///
    /// Lat/lon grids are judged by their corner latitudes; other templates
    /// fall back to scanning mode flag 0x40 (+j direction).
    pub fn rows_south_to_north(&self) -> bool {
        if self.is_lat_lon() && self.first_latitude_microdegrees != self.last_latitude_microdegrees {
            self.first_latitude_microdegrees < self.last_latitude_microdegrees
        } else {
            self.scanning_mode & 0x40 != 0
        }
    }

    /// Earth radius in metres for spherical shapes (Code Table 3.2).
    pub fn earth_radius(&self) -> Option<f64> {
        match self.earth_shape {
            0 => Some(6_367_470.0),
            1 => Some(
                self.earth_radius_scaled as f64 / 10f64.powi(self.earth_radius_scale as i32),
            ),
            6 => Some(6_371_229.0),
            8 => Some(6_371_200.0),
            _ => None,
        }
    }
}

fn wrap_longitude(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

/// Section 4: Product Definition Section
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    pub template_number: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub parameter_short_name: String,
    pub level_type: u8,
    pub level_value: u32,
    pub level_description: String,
    pub time_range_unit: u8,
    pub forecast_time: u32,
}

impl ProductDefinition {
    /// Forecast offset from the reference time, in seconds (Code Table 4.4).
    pub fn forecast_seconds(&self) -> i64 {
        let unit: i64 = match self.time_range_unit {
            0 => 60,
            1 => 3_600,
            2 => 86_400,
            10 => 3 * 3_600,
            11 => 6 * 3_600,
            12 => 12 * 3_600,
            13 => 1,
            _ => 3_600,
        };
        self.forecast_time as i64 * unit
    }
}

/// Section 5: Data Representation Section
#[derive(Debug, Clone)]
pub struct DataRepresentation {
    /// Number of packed values (excludes points masked by the bitmap).
    pub num_data_points: u32,
    pub packing_method: u8,
    pub original_data_type: u8,
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
}

/// Section 6: Bitmap Section
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub indicator: u8,
    pub data: Bytes,
}

/// Section 7: Data Section
#[derive(Debug, Clone)]
pub struct DataSection {
    pub data: Bytes,
}

// ===== Parsing Functions =====

/// Parse Section 0 (Indicator) from start of message
pub fn parse_indicator(data: &[u8]) -> Result<Indicator, Grib2Error> {
    if data.len() < 16 {
        return Err(Grib2Error::InvalidFormat(
            "Not enough data for indicator section".to_string(),
        ));
    }

    if &data[0..4] != b"GRIB" {
        return Err(Grib2Error::InvalidFormat(
            "Invalid GRIB magic bytes".to_string(),
        ));
    }

    // Octets 1-4: "GRIB", 5-6: reserved, 7: discipline, 8: edition,
    // 9-16: total message length (8-byte big-endian)
    let discipline = data[6];
    let edition = data[7];

    if edition != 2 {
        return Err(Grib2Error::InvalidFormat(format!(
            "Expected GRIB edition 2, got {}",
            edition
        )));
    }

    let message_length = u64::from_be_bytes([
        data[8], data[9], data[10], data[11], data[12], data[13], data[14], data[15],
    ]);

    Ok(Indicator {
        magic: [data[0], data[1], data[2], data[3]],
        reserved: u16::from_be_bytes([data[4], data[5]]),
        discipline,
        edition,
        message_length,
    })
}

/// Parse Section 1 (Identification)
pub fn parse_identification(section_data: &[u8]) -> Result<Identification, Grib2Error> {

    if section_data.len() < 19 {
        return Err(Grib2Error::InvalidSection {
            section: 1,
            reason: "Not enough data".to_string(),
        });
    }

    // Skip section length (4 bytes) and section number (1 byte)
    let sec = &section_data[5..];

    let year = u16::from_be_bytes([sec[7], sec[8]]);
    let (month, day, hour, minute, second) = (sec[9], sec[10], sec[11], sec[12], sec[13]);

    let reference_time = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or_else(|| Grib2Error::InvalidSection {
            section: 1,
            reason: format!(
                "Invalid date: {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ),
        })?;

    Ok(Identification {
        center: u16::from_be_bytes([sec[0], sec[1]]),
        sub_center: u16::from_be_bytes([sec[2], sec[3]]),
        table_version: sec[4],
        local_table_version: sec[5],
        significance_of_reference_time: sec[6],
        reference_time: DateTime::<Utc>::from_naive_utc_and_offset(reference_time, Utc),
        production_status: sec.get(14).copied().unwrap_or(0),
        data_type: sec.get(15).copied().unwrap_or(0),
    })
}

/// Parse Section 3 (Grid Definition)
pub fn parse_grid_definition(section_data: &[u8]) -> Result<GridDefinition, Grib2Error> {

    if section_data.len() < 14 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: "Not enough data".to_string(),
        });
    }

    // Bytes 0-3: length, 4: section number, 5: source of grid definition,
    // 6-9: number of data points, 10-11: optional list, 12-13: template number
    let num_data_points = be_u32(&section_data[6..10]);
    let template_number = u16::from_be_bytes([section_data[12], section_data[13]]);
    let gd = &section_data[14..];

    if template_number == 0 {
        // Template 3.0: regular latitude/longitude
        // 0: shape of the earth, 1: radius scale, 2-5: radius scaled value,
        // 16-19: Ni, 20-23: Nj, 32-35: La1, 36-39: Lo1, 40: resolution flags,
        // 41-44: La2, 45-48: Lo2, 49-52: Di, 53-56: Dj, 57: scanning mode
        if gd.len() < 58 {
            return Err(Grib2Error::InvalidSection {
                section: 3,
                reason: format!("Template 0 needs at least 58 bytes, got {}", gd.len()),
            });
        }

        Ok(GridDefinition {
            template_number,
            num_data_points,
            earth_shape: gd[0],
            earth_radius_scale: gd[1],
            earth_radius_scaled: be_u32(&gd[2..6]),
            num_points_longitude: be_u32(&gd[16..20]),
            num_points_latitude: be_u32(&gd[20..24]),
            first_latitude_microdegrees: be_signed(&gd[32..36]),
            first_longitude_microdegrees: be_signed(&gd[36..40]),
            last_latitude_microdegrees: be_signed(&gd[41..45]),
            last_longitude_microdegrees: be_signed(&gd[45..49]),
            i_increment_microdegrees: be_u32(&gd[49..53]),
            j_increment_microdegrees: be_u32(&gd[53..57]),
            scanning_mode: gd[57],
        })
    } else {
        // Other templates: Ni/Nj sit at the same offsets for the common
        // projections (Lambert, polar stereographic, Mercator).
        let ni = if gd.len() >= 20 { be_u32(&gd[16..20]) } else { 0 };
        let nj = if gd.len() >= 24 { be_u32(&gd[20..24]) } else { 0 };

        Ok(GridDefinition {
            template_number,
            num_data_points,
            earth_shape: gd.first().copied().unwrap_or(255),
            earth_radius_scale: 0,
            earth_radius_scaled: 0,
            num_points_latitude: nj,
            num_points_longitude: ni,
            first_latitude_microdegrees: 0,
            first_longitude_microdegrees: 0,
            last_latitude_microdegrees: 0,
            last_longitude_microdegrees: 0,
            i_increment_microdegrees: 0,
            j_increment_microdegrees: 0,
            scanning_mode: 0,
        })
    }
}

/// Parse Section 4 (Product Definition)
pub fn parse_product_definition(
    section_data: &[u8],
    discipline: u8,
    tables: &Grib2Tables,
) -> Result<ProductDefinition, Grib2Error> {

    if section_data.len() < 28 {
        return Err(Grib2Error::InvalidSection {
            section: 4,
            reason: "Not enough data".to_string(),
        });
    }

    // Bytes 0-3: length, 4: section number, 5-6: coordinate values,
    // 7-8: template number, 9: category, 10: number.
    // Template 4.0 continues with 17: time range unit, 18-21: forecast time,
    // 22: first surface type, 23: scale factor, 24-27: scaled value.
    let template_number = u16::from_be_bytes([section_data[7], section_data[8]]);
    let parameter_category = section_data[9];
    let parameter_number = section_data[10];
    let time_range_unit = section_data[17];
    let forecast_time = be_u32(&section_data[18..22]);
    let level_type = section_data[22];
    // The scale factor at byte 23 is ignored; levels in use are integral.
    let level_value = be_u32(&section_data[24..28]);

    Ok(ProductDefinition {
        template_number,
        parameter_category,
        parameter_number,
        parameter_short_name: tables.get_parameter_name(
            discipline,
            parameter_category,
            parameter_number,
        ),
        level_type,
        level_value,
        level_description: tables.get_level_description(level_type, level_value),
        time_range_unit,
        forecast_time,
    })
}

/// Parse Section 5 (Data Representation)
pub fn parse_data_representation(section_data: &[u8]) -> Result<DataRepresentation, Grib2Error> {

    if section_data.len() < 11 {
        return Err(Grib2Error::InvalidSection {
            section: 5,
            reason: "Not enough data".to_string(),
        });
    }

    // Bytes 5-8: number of packed values, 9-10: template number.
    // Templates 5.0, 5.2, 5.3, 5.40 and 5.41 share the first fields:
    // 11-14: reference value (IEEE f32), 15-16: binary scale factor,
    // 17-18: decimal scale factor, 19: bits per value, 20: original type.
    let num_data_points = be_u32(&section_data[5..9]);
    let template_number = u16::from_be_bytes([section_data[9], section_data[10]]);
    let t = &section_data[11..];

    let reference_value = if t.len() >= 4 {
        f32::from_be_bytes([t[0], t[1], t[2], t[3]])
    } else {
        0.0
    };
    let binary_scale_factor = if t.len() >= 6 { grib_i16(t[4], t[5]) } else { 0 };
    let decimal_scale_factor = if t.len() >= 8 { grib_i16(t[6], t[7]) } else { 0 };

    Ok(DataRepresentation {
        num_data_points,
        packing_method: u8::try_from(template_number).unwrap_or(u8::MAX),
        original_data_type: t.get(9).copied().unwrap_or(0),
        reference_value,
        binary_scale_factor,
        decimal_scale_factor,
        bits_per_value: t.get(8).copied().unwrap_or(0),
    })
}

/// Parse Section 6 (Bitmap). Returns `None` when no bitmap applies (indicator 255).
pub fn parse_bitmap(section_data: &[u8]) -> Result<Option<Bitmap>, Grib2Error> {

    if section_data.len() < 6 {
        return Err(Grib2Error::InvalidSection {
            section: 6,
            reason: "Not enough data".to_string(),
        });
    }

    let section_length = be_u32(&section_data[0..4]) as usize;
    let indicator = section_data[5];

    if indicator == 255 {
        return Ok(None);
    }

    let bitmap_data = if section_length > 6 {
        Bytes::copy_from_slice(&section_data[6..section_length])
    } else {
        Bytes::new()
    };

    Ok(Some(Bitmap {
        indicator,
        data: bitmap_data,
    }))
}

/// Parse Section 7 (Data)
pub fn parse_data_section(section_data: &[u8]) -> Result<DataSection, Grib2Error> {

    let section_length = be_u32(&section_data[0..4]) as usize;

    let data_bytes = if section_length > 5 {
        Bytes::copy_from_slice(&section_data[5..section_length])
    } else {
        Bytes::new()
    };

    Ok(DataSection { data: data_bytes })
}

// ===== Helper Functions =====

/// Section offsets, relative to the start of the message, for one field.
///
/// A message may carry several fields by repeating sections 2-7, 3-7 or
/// 4-7. Sections that are not repeated apply to every later field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub identification: usize,
    pub grid: usize,
    pub product: usize,
    pub representation: usize,
    pub bitmap: Option<usize>,
    pub data: usize,
}

/// Locate the sections of every field in a message, in order.
pub fn field_layouts(data: &[u8]) -> Result<Vec<FieldLayout>, Grib2Error> {
    let mut offset = 16; // After Section 0
    let mut identification = None;
    let mut grid = None;
    let mut product = None;
    let mut representation = None;
    let mut bitmap = None;
    let mut fields = Vec::new();

    loop {
        if offset + 4 <= data.len() && &data[offset..offset + 4] == b"7777" {
            break;
        }

        if offset + 5 > data.len() {
            return Err(Grib2Error::InvalidSection {
                section: 8,
                reason: "Message ends without 7777".to_string(),
            });
        }

        let section_length = be_u32(&data[offset..offset + 4]) as usize;
        let section_num = data[offset + 4];

        if section_length < 5 || offset + section_length > data.len() {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Invalid section length".to_string(),
            });
        }

        match section_num {
            1 => identification = Some(offset),
            3 => grid = Some(offset),
            4 => product = Some(offset),
            5 => representation = Some(offset),
            6 => bitmap = Some(offset),
            7 => {
                fields.push(FieldLayout {
                    identification: required(identification, 1)?,
                    grid: required(grid, 3)?,
                    product: required(product, 4)?,
                    representation: required(representation, 5)?,
                    bitmap,
                    data: offset,
                });
                // Every field needs its own product definition
                product = None;
            }
            _ => {}
        }

        offset += section_length;
    }

    if fields.is_empty() {
        return Err(Grib2Error::InvalidSection {
            section: 7,
            reason: "Section not found".to_string(),
        });
    }
    Ok(fields)
}

fn required(offset: Option<usize>, section: u8) -> Result<usize, Grib2Error> {
    offset.ok_or_else(|| Grib2Error::InvalidSection {
        section,
        reason: "Section not found before data section".to_string(),
    })
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// GRIB2 signed integers are sign-and-magnitude, not two's complement.
fn be_signed(bytes: &[u8]) -> i32 {
    let raw = be_u32(bytes);
    let magnitude = (raw & 0x7FFF_FFFF) as i32;
    if raw & 0x8000_0000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn grib_i16(hi: u8, lo: u8) -> i16 {
    let raw = u16::from_be_bytes([hi, lo]);
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}
