//! GRIB2 parameter and level lookup tables.
//!
//! This module provides lookup tables for translating GRIB2 numeric codes
//! into parameter names, units and level descriptions. The standard tables
//! cover the common NCEP products (GFS, HRRR, NAM); extra entries can be
//! registered at runtime.

use std::collections::HashMap;

/// Lookup key for parameter: (discipline, category, number)
pub type ParamKey = (u8, u8, u8);

/// Parameter identity as reported in band metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    /// Short name (e.g. "TMP", "UGRD")
    pub name: String,
    /// Long description (e.g. "Temperature")
    pub description: String,
    /// Unit as encoded in the GRIB2 tables (e.g. "K", "m/s")
    pub unit: String,
}

impl ParameterInfo {
    pub fn new(name: &str, description: &str, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            unit: unit.to_string(),
        }
    }
}

/// Level description - either static text or a template with {value} placeholder
#[derive(Debug, Clone)]
pub enum LevelDescription {
    /// Static description (e.g., "surface", "mean sea level")
    Static(String),
    /// Template with {value} placeholder (e.g., "{value} mb", "{value} m above ground")
    Template(String),
}

impl LevelDescription {
    /// Format the level description, substituting placeholders if it's a template.
    ///
    /// Supported placeholders:
    /// - `{value}` - Raw level value (e.g., 100000 for 1000 mb in Pa)
    /// - `{value_mb}` - Value converted from Pa to mb (divided by 100)
    pub fn format(&self, value: u32) -> String {
        match self {
            LevelDescription::Static(s) => s.clone(),
            LevelDescription::Template(t) => t
                .replace("{value}", &value.to_string())
                .replace("{value_mb}", &(value / 100).to_string()),
        }
    }
}

// (discipline, category, number, name, description, unit)
const STANDARD_PARAMETERS: &[(u8, u8, u8, &str, &str, &str)] = &[
    // Temperature
    (0, 0, 0, "TMP", "Temperature", "K"),
    (0, 0, 2, "POT", "Potential temperature", "K"),
    (0, 0, 4, "TMAX", "Maximum temperature", "K"),
    (0, 0, 5, "TMIN", "Minimum temperature", "K"),
    (0, 0, 6, "DPT", "Dew point temperature", "K"),
    // Moisture
    (0, 1, 0, "SPFH", "Specific humidity", "kg/kg"),
    (0, 1, 1, "RH", "Relative humidity", "%"),
    (0, 1, 3, "PWAT", "Precipitable water", "kg/(m^2)"),
    (0, 1, 7, "PRATE", "Precipitation rate", "kg/(m^2 s)"),
    (0, 1, 8, "APCP", "Total precipitation", "kg/(m^2)"),
    // Momentum
    (0, 2, 0, "WDIR", "Wind direction (from which blowing)", "deg true"),
    (0, 2, 1, "WIND", "Wind speed", "m/s"),
    (0, 2, 2, "UGRD", "u-component of wind", "m/s"),
    (0, 2, 3, "VGRD", "v-component of wind", "m/s"),
    (0, 2, 8, "VVEL", "Vertical velocity (pressure)", "Pa/s"),
    (0, 2, 22, "GUST", "Wind speed (gust)", "m/s"),
    // Mass
    (0, 3, 0, "PRES", "Pressure", "Pa"),
    (0, 3, 1, "PRMSL", "Pressure reduced to MSL", "Pa"),
    (0, 3, 5, "HGT", "Geopotential height", "gpm"),
    // Cloud
    (0, 6, 1, "TCDC", "Total cloud cover", "%"),
    (0, 6, 3, "LCDC", "Low cloud cover", "%"),
    (0, 6, 4, "MCDC", "Medium cloud cover", "%"),
    (0, 6, 5, "HCDC", "High cloud cover", "%"),
    // Thermodynamic stability
    (0, 7, 6, "CAPE", "Convective available potential energy", "J/kg"),
    (0, 7, 7, "CIN", "Convective inhibition", "J/kg"),
    // Radar
    (0, 16, 196, "REFC", "Composite reflectivity", "dB"),
    // Physical atmospheric properties
    (0, 19, 0, "VIS", "Visibility", "m"),
    // MRMS (local discipline 209)
    (209, 0, 16, "REFL", "Merged reflectivity QC", "dBZ"),
    (209, 1, 0, "PRECIP_RATE", "Precipitation rate", "mm/hr"),
];

// (level type, description, surface abbreviation)
const STANDARD_LEVELS: &[(u8, &str, &str)] = &[
    (1, "surface", "SFC"),
    (2, "cloud base", "CBL"),
    (3, "cloud top", "CTL"),
    (4, "0C isotherm", "0DEG"),
    (6, "max wind", "MWSL"),
    (7, "tropopause", "TRO"),
    (8, "top of atmosphere", "NTAT"),
    (10, "entire atmosphere", "EATM"),
    (100, "{value_mb} mb", "ISBL"),
    (101, "mean sea level", "MSL"),
    (102, "{value} m above MSL", "GPML"),
    (103, "{value} m above ground", "HTGL"),
    (104, "sigma level {value}", "SIGL"),
    (105, "hybrid level", "HYBL"),
    (106, "{value} m below surface", "DBLL"),
    (108, "{value_mb} mb above ground", "SPDL"),
    (200, "entire atmosphere", "EATM"),
];

/// GRIB2 parameter and level lookup tables.
#[derive(Debug, Clone, Default)]
pub struct Grib2Tables {
    /// (discipline, category, number) -> parameter info
    parameters: HashMap<ParamKey, ParameterInfo>,
    /// level_type -> description pattern
    levels: HashMap<u8, LevelDescription>,
    /// level_type -> surface abbreviation (e.g. 103 -> "HTGL")
    surfaces: HashMap<u8, String>,
}

impl Grib2Tables {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables pre-populated with the common NCEP parameters and level types.
    pub fn standard() -> Self {
        let mut tables = Self::new();

        for &(discipline, category, number, name, description, unit) in STANDARD_PARAMETERS {
            tables.add_parameter(
                discipline,
                category,
                number,
                ParameterInfo::new(name, description, unit),
            );
        }

        for &(level_type, description, abbreviation) in STANDARD_LEVELS {
            let description = if description.contains('{') {
                LevelDescription::Template(description.to_string())
            } else {
                LevelDescription::Static(description.to_string())
            };
            tables.add_level(level_type, description);
            tables.add_surface(level_type, abbreviation.to_string());
        }

        tables
    }

    /// Add a parameter mapping
    pub fn add_parameter(&mut self, discipline: u8, category: u8, number: u8, info: ParameterInfo) {
        self.parameters.insert((discipline, category, number), info);
    }

    /// Add a level description mapping
    pub fn add_level(&mut self, level_type: u8, description: LevelDescription) {
        self.levels.insert(level_type, description);
    }

    /// Add a surface abbreviation used in band short names
    pub fn add_surface(&mut self, level_type: u8, abbreviation: String) {
        self.surfaces.insert(level_type, abbreviation);
    }

    /// Look up full parameter info by GRIB2 codes.
    pub fn get_parameter(&self, discipline: u8, category: u8, number: u8) -> Option<&ParameterInfo> {
        self.parameters.get(&(discipline, category, number))
    }

    /// Look up parameter short name by GRIB2 codes.
    ///
    /// Returns "P{discipline}_{category}_{number}" if not found.
    pub fn get_parameter_name(&self, discipline: u8, category: u8, number: u8) -> String {
        self.get_parameter(discipline, category, number)
            .map(|info| info.name.clone())
            .unwrap_or_else(|| format!("P{}_{}_{}", discipline, category, number))
    }

    /// Look up level description by type code and value.
    ///
    /// Returns "Level type {type} value {value}" if not found.
    pub fn get_level_description(&self, level_type: u8, level_value: u32) -> String {
        match self.levels.get(&level_type) {
            Some(desc) => desc.format(level_value),
            None => format!("Level type {} value {}", level_type, level_value),
        }
    }

    /// Surface abbreviation for a level type, "LVL{type}" if unknown.
    pub fn get_surface_abbreviation(&self, level_type: u8) -> String {
        self.surfaces
            .get(&level_type)
            .cloned()
            .unwrap_or_else(|| format!("LVL{}", level_type))
    }

    /// Get the number of parameters in the table
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Get the number of level types in the table
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Check if the tables are empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.levels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_parameter_lookup() {
        let tables = Grib2Tables::standard();

        assert_eq!(tables.get_parameter_name(0, 0, 0), "TMP");
        assert_eq!(tables.get_parameter_name(0, 2, 2), "UGRD");
        assert_eq!(tables.get_parameter_name(0, 2, 3), "VGRD");
        assert_eq!(tables.get_parameter_name(209, 0, 16), "REFL");

        let tmp = tables.get_parameter(0, 0, 0).unwrap();
        assert_eq!(tmp.unit, "K");
        assert_eq!(tmp.description, "Temperature");
    }

    #[test]
    fn test_parameter_not_found() {
        let tables = Grib2Tables::standard();

        assert_eq!(tables.get_parameter_name(99, 99, 99), "P99_99_99");
        assert!(tables.get_parameter(0, 0, 99).is_none());
    }

    #[test]
    fn test_level_descriptions() {
        let tables = Grib2Tables::standard();

        assert_eq!(tables.get_level_description(1, 0), "surface");
        assert_eq!(tables.get_level_description(100, 50000), "500 mb");
        assert_eq!(tables.get_level_description(103, 2), "2 m above ground");
        assert_eq!(
            tables.get_level_description(99, 123),
            "Level type 99 value 123"
        );
    }

    #[test]
    fn test_surface_abbreviations() {
        let tables = Grib2Tables::standard();

        assert_eq!(tables.get_surface_abbreviation(103), "HTGL");
        assert_eq!(tables.get_surface_abbreviation(100), "ISBL");
        assert_eq!(tables.get_surface_abbreviation(42), "LVL42");
    }

    #[test]
    fn test_runtime_registration() {
        let mut tables = Grib2Tables::new();
        assert!(tables.is_empty());

        tables.add_parameter(0, 1, 1, ParameterInfo::new("RH", "Relative humidity", "%"));
        tables.add_level(1, LevelDescription::Static("surface".to_string()));

        assert_eq!(tables.parameter_count(), 1);
        assert_eq!(tables.level_count(), 1);
        assert_eq!(tables.get_parameter_name(0, 1, 1), "RH");
        assert!(!tables.is_empty());
    }
}
