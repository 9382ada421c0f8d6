//! Synthetic GRIB2 message builder.
//!
//! Creates minimal but structurally valid GRIB2 messages (template 3.0 grid,
//! template 4.0 product, template 5.0 simple packing) so tests never depend
//! on downloaded model output. A multi-band file is just several built
//! messages concatenated, see [`concat_messages`].

/// Build a minimal GRIB2 message with the specified parameters
#[derive(Debug, Clone)]
pub struct Grib2Builder {
    discipline: u8,
    center: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    // Grid definition
    ni: u32,       // columns
    nj: u32,       // rows
    la1: i32,      // first lat (microdegrees)
    lo1: i32,      // first lon (microdegrees)
    la2: i32,      // last lat (microdegrees)
    lo2: i32,      // last lon (microdegrees)
    di: u32,       // lon increment (microdegrees)
    dj: u32,       // lat increment (microdegrees)
    scanning_mode: u8,
    // Product definition
    param_category: u8,
    param_number: u8,
    level_type: u8,
    level_value: u32,
    forecast_hour: u32,
    // Data, in scan order
    data_values: Vec<f32>,
    missing: Vec<bool>,
}

impl Grib2Builder {
    /// Create a new builder with defaults for GFS-like data
    pub fn new_gfs() -> Self {
        // Small 10x10 grid over the Pacific coast, north to south
        Self {
            discipline: 0, // Meteorological
            center: 7,     // NCEP
            year: 2025,
            month: 12,
            day: 10,
            hour: 12,
            ni: 10,
            nj: 10,
            la1: 45_000_000,  // 45.0°N
            lo1: 230_000_000, // 230.0°E = -130°W
            la2: 36_000_000,  // 36.0°N
            lo2: 239_000_000, // 239.0°E
            di: 1_000_000,    // 1.0° increment
            dj: 1_000_000,    // 1.0° increment
            scanning_mode: 0, // +i, -j, i consecutive
            param_category: 0,
            param_number: 0, // TMP
            level_type: 103, // m above ground
            level_value: 2,  // 2m
            forecast_hour: 0,
            data_values: vec![288.15; 100], // 15°C in Kelvin
            missing: vec![false; 100],
        }
    }

    pub fn with_reference_time(mut self, year: u16, month: u8, day: u8, hour: u8) -> Self {
        self.year = year;
        self.month = month;
        self.day = day;
        self.hour = hour;
        self
    }

    /// Resize the grid, keeping the first point and increments.
    pub fn with_grid(mut self, ni: u32, nj: u32) -> Self {
        self.ni = ni;
        self.nj = nj;
        self.update_last_point();
        let n = (ni * nj) as usize;
        self.data_values = vec![0.0; n];
        self.missing = vec![false; n];
        self
    }

    /// Place the first grid point and set increments (all in microdegrees).
    pub fn with_origin(mut self, la1: i32, lo1: i32, di: u32, dj: u32) -> Self {
        self.la1 = la1;
        self.lo1 = lo1;
        self.di = di;
        self.dj = dj;
        self.update_last_point();
        self
    }

    /// Store rows from south to north (scanning mode +j).
    pub fn south_to_north(mut self) -> Self {
        std::mem::swap(&mut self.la1, &mut self.la2);
        self.scanning_mode |= 0x40;
        self
    }

    pub fn with_discipline(mut self, discipline: u8) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_parameter(mut self, category: u8, number: u8) -> Self {
        self.param_category = category;
        self.param_number = number;
        self
    }

    pub fn with_level(mut self, level_type: u8, level_value: u32) -> Self {
        self.level_type = level_type;
        self.level_value = level_value;
        self
    }

    pub fn with_forecast_hour(mut self, hour: u32) -> Self {
        self.forecast_hour = hour;
        self
    }

    pub fn with_constant_value(mut self, value: f32) -> Self {
        self.data_values = vec![value; (self.ni * self.nj) as usize];
        self
    }

    pub fn with_gradient(mut self, min_val: f32, max_val: f32) -> Self {
        let n = (self.ni * self.nj) as usize;
        self.data_values = (0..n)
            .map(|i| min_val + (max_val - min_val) * (i as f32 / n as f32))
            .collect();
        self
    }

    pub fn with_data(mut self, data: Vec<f32>) -> Self {
        self.missing = vec![false; data.len()];
        self.data_values = data;
        self
    }

    /// Mark grid points (scan order) as missing; a bitmap section is written.
    pub fn with_missing(mut self, indices: &[usize]) -> Self {
        for &i in indices {
            if let Some(flag) = self.missing.get_mut(i) {
                *flag = true;
            }
        }
        self
    }

    fn update_last_point(&mut self) {
        let rows = self.nj.saturating_sub(1) as i64;
        let cols = self.ni.saturating_sub(1) as i64;
        self.la2 = (self.la1 as i64 - rows * self.dj as i64) as i32;
        self.lo2 = (self.lo1 as i64 + cols * self.di as i64) as i32;
    }

    fn has_bitmap(&self) -> bool {
        self.missing.iter().any(|&m| m)
    }

    fn present_values(&self) -> Vec<f32> {
        self.data_values
            .iter()
            .zip(self.missing.iter().chain(std::iter::repeat(&false)))
            .filter(|(_, &missing)| !missing)
            .map(|(&v, _)| v)
            .collect()
    }

    /// Build the complete GRIB2 message bytes
    pub fn build(&self) -> Vec<u8> {
        multi_field_message(std::slice::from_ref(self))
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut section = Vec::new();
        let section_length: u32 = 21;

        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(1); // Section number

        section.extend_from_slice(&self.center.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Sub-center
        section.push(2); // Master table version
        section.push(1); // Local table version
        section.push(1); // Significance of reference time (start of forecast)

        section.extend_from_slice(&self.year.to_be_bytes());
        section.push(self.month);
        section.push(self.day);
        section.push(self.hour);
        section.push(0); // Minute
        section.push(0); // Second

        section.push(0); // Production status (operational)
        section.push(1); // Type of data (forecast)

        section
    }

    fn build_section3(&self) -> Vec<u8> {
        let mut section = Vec::new();

        // Template 3.0: Latitude/Longitude
        let template_data_len = 58;
        let section_length: u32 = 14 + template_data_len;

        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(3); // Section number

        section.push(0); // Source of grid definition
        section.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        section.push(0); // Number of octets for optional list
        section.push(0); // Interpretation of optional list
        section.extend_from_slice(&0u16.to_be_bytes()); // Grid definition template (0 = lat/lon)

        section.push(6); // Shape of Earth (spherical with radius 6371229m)
        section.push(0); // Scale factor of radius
        section.extend_from_slice(&0u32.to_be_bytes()); // Scaled value of radius
        section.push(0); // Scale factor of major axis
        section.extend_from_slice(&0u32.to_be_bytes()); // Scaled value of major axis
        section.push(0); // Scale factor of minor axis
        section.extend_from_slice(&0u32.to_be_bytes()); // Scaled value of minor axis

        section.extend_from_slice(&self.ni.to_be_bytes()); // Ni
        section.extend_from_slice(&self.nj.to_be_bytes()); // Nj
        section.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
        section.extend_from_slice(&0xFFFFFFFFu32.to_be_bytes()); // Subdivisions

        section.extend_from_slice(&sign_magnitude_i32(self.la1)); // La1
        section.extend_from_slice(&sign_magnitude_i32(self.lo1)); // Lo1
        section.push(48); // Resolution and component flags
        section.extend_from_slice(&sign_magnitude_i32(self.la2)); // La2
        section.extend_from_slice(&sign_magnitude_i32(self.lo2)); // Lo2
        section.extend_from_slice(&self.di.to_be_bytes()); // Di
        section.extend_from_slice(&self.dj.to_be_bytes()); // Dj
        section.push(self.scanning_mode);

        section
    }

    fn build_section4(&self) -> Vec<u8> {
        let mut section = Vec::new();

        // Template 4.0: Analysis or forecast at horizontal level
        let section_length: u32 = 34;

        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(4); // Section number

        section.extend_from_slice(&0u16.to_be_bytes()); // Number of coordinate values
        section.extend_from_slice(&0u16.to_be_bytes()); // Product definition template (0)

        section.push(self.param_category);
        section.push(self.param_number);
        section.push(2); // Type of generating process (forecast)
        section.push(0); // Background generating process
        section.push(0); // Analysis or forecast process
        section.extend_from_slice(&0u16.to_be_bytes()); // Hours of cutoff
        section.push(0); // Minutes of cutoff
        section.push(1); // Time range unit (hours)
        section.extend_from_slice(&self.forecast_hour.to_be_bytes());

        section.push(self.level_type); // Type of first fixed surface
        section.push(0); // Scale factor
        section.extend_from_slice(&self.level_value.to_be_bytes());

        section.push(255); // Type of second fixed surface (none)
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section
    }

    fn packing_parameters(&self) -> (f32, i16, u8) {
        let (min_val, max_val) = self.present_values().iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY),
            |(min, max), &v| (min.min(v), max.max(v)),
        );

        if !min_val.is_finite() || max_val == min_val {
            let reference = if min_val.is_finite() { min_val } else { 0.0 };
            return (reference, 0, 0);
        }

        // Unpacking: value = reference + packed * 2^E. For 16-bit packing
        // the range must fit in 65535 * 2^E.
        let range = max_val - min_val;
        let binary_scale_factor = (range / 65535.0).log2().ceil() as i16;
        (min_val, binary_scale_factor, 16)
    }

    fn build_section5(&self) -> Vec<u8> {
        let mut section = Vec::new();
        let (reference_value, binary_scale_factor, bits_per_value) = self.packing_parameters();

        let section_length: u32 = 21;

        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(5); // Section number

        section.extend_from_slice(&(self.present_values().len() as u32).to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 5.0

        section.extend_from_slice(&reference_value.to_be_bytes());
        section.extend_from_slice(&sign_magnitude_i16(binary_scale_factor));
        section.extend_from_slice(&sign_magnitude_i16(0)); // Decimal scale factor
        section.push(bits_per_value);
        section.push(0); // Original field type (floating point)

        section
    }

    fn build_section6(&self) -> Vec<u8> {
        let mut section = Vec::new();

        if !self.has_bitmap() {
            section.extend_from_slice(&6u32.to_be_bytes());
            section.push(6);
            section.push(255); // No bitmap, all data present
            return section;
        }

        let mut bitmap = vec![0u8; self.missing.len().div_ceil(8)];
        for (i, &missing) in self.missing.iter().enumerate() {
            if !missing {
                bitmap[i / 8] |= 0x80 >> (i % 8);
            }
        }

        section.extend_from_slice(&(6 + bitmap.len() as u32).to_be_bytes());
        section.push(6);
        section.push(0); // Bitmap follows
        section.extend_from_slice(&bitmap);
        section
    }

    fn build_section7(&self) -> Vec<u8> {
        let mut section = Vec::new();
        let packed_data = self.pack_simple();

        let section_length: u32 = 5 + packed_data.len() as u32;

        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(7); // Section number
        section.extend_from_slice(&packed_data);

        section
    }

    fn pack_simple(&self) -> Vec<u8> {
        let (reference_value, binary_scale_factor, bits_per_value) = self.packing_parameters();

        if bits_per_value == 0 {
            return Vec::new();
        }

        let binary_scale = 2.0_f64.powi(binary_scale_factor as i32);
        let mut packed = Vec::new();

        for v in self.present_values() {
            let packed_value = ((v as f64 - reference_value as f64) / binary_scale).round() as u16;
            packed.extend_from_slice(&packed_value.to_be_bytes());
        }

        packed
    }
}

/// Build one message carrying several fields by repeating sections 4-7.
///
/// Sections 0, 1 and 3 come from the first field, so all fields share its
/// discipline, reference time and grid.
pub fn multi_field_message(fields: &[Grib2Builder]) -> Vec<u8> {
    let Some(first) = fields.first() else {
        return Vec::new();
    };

    let mut body = first.build_section1();
    body.extend(first.build_section3());
    for field in fields {
        body.extend(field.build_section4());
        body.extend(field.build_section5());
        body.extend(field.build_section6());
        body.extend(field.build_section7());
    }

    let message_length = 16 + body.len() + 4;
    let mut message = Vec::with_capacity(message_length);

    // Section 0: Indicator
    message.extend_from_slice(b"GRIB");
    message.extend_from_slice(&[0, 0]); // Reserved
    message.push(first.discipline);
    message.push(2); // Edition 2
    message.extend_from_slice(&(message_length as u64).to_be_bytes());

    message.extend_from_slice(&body);

    // Section 8: End
    message.extend_from_slice(b"7777");

    message
}

/// Concatenate messages into one multi-band GRIB2 file.
pub fn concat_messages(messages: &[Grib2Builder]) -> Vec<u8> {
    messages.iter().flat_map(|m| m.build()).collect()
}

fn sign_magnitude_i32(value: i32) -> [u8; 4] {
    let magnitude = value.unsigned_abs() & 0x7FFF_FFFF;
    let raw = if value < 0 { magnitude | 0x8000_0000 } else { magnitude };
    raw.to_be_bytes()
}

fn sign_magnitude_i16(value: i16) -> [u8; 2] {
    let magnitude = value.unsigned_abs() & 0x7FFF;
    let raw = if value < 0 { magnitude | 0x8000 } else { magnitude };
    raw.to_be_bytes()
}
