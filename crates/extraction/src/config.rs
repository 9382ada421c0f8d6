//! Run options and the per-parameter JSON configuration.
//!
//! The config file is a JSON object mapping parameter names to entries such
//! as:
//!
//! ```json
//! {
//!   "temperature": { "band": "GRIB_ELEMENT=TMP", "to_fahrenheit": true },
//!   "wind": { "band": [1, 2], "calculate_speed": true, "to_mph": true }
//! }
//! ```
//!
//! Parameters run in file order. Entries are only deserialized when their
//! turn comes, so a malformed entry does not prevent earlier ones from being
//! written.

use std::fs;
use std::path::{Path, PathBuf};

use renderer::OutputFormat;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::{ExtractionError, Result};

/// Everything a run needs, parsed once from the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// GRIB2 input file. Outputs are written next to it.
    pub input: PathBuf,
    /// Appended to every output file name.
    pub suffix: String,
    /// JSON parameter config.
    pub config_path: PathBuf,
    pub format: OutputFormat,
    /// Embed per-band value ranges as EXIF ImageDescription.
    pub add_exif: bool,
}

impl RunOptions {
    /// Options with the default format (JPEG) and EXIF enabled.
    pub fn new(
        input: impl Into<PathBuf>,
        suffix: impl Into<String>,
        config_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            suffix: suffix.into(),
            config_path: config_path.into(),
            format: OutputFormat::default(),
            add_exif: true,
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_exif(mut self, add_exif: bool) -> Self {
        self.add_exif = add_exif;
        self
    }
}

/// `add_exif` is enabled only by a case-insensitive "true".
pub fn parse_add_exif(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

/// One entry of a `band` setting.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BandSpec {
    /// 1-based band index, used as is.
    Index(i64),
    /// `KEY=VALUE` match against band metadata.
    Attribute(String),
    /// Anything else, JSON booleans included; rejected when resolved.
    Other(Value),
}

/// A `band` setting: a single spec or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BandSelection {
    List(Vec<BandSpec>),
    Single(BandSpec),
}

impl BandSelection {
    pub fn specs(&self) -> &[BandSpec] {
        match self {
            BandSelection::List(specs) => specs,
            BandSelection::Single(spec) => std::slice::from_ref(spec),
        }
    }
}

/// Settings for one output parameter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ParameterConfig {
    #[serde(default, deserialize_with = "present")]
    pub band: Option<BandSelection>,
    #[serde(default)]
    pub to_fahrenheit: bool,
    #[serde(default)]
    pub to_mph: bool,
    #[serde(default)]
    pub to_kph: bool,
    #[serde(default)]
    pub calculate_speed: bool,
}

// An explicit `null` is a band spec of its own, not an absent field.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<BandSelection>, D::Error>
where
    D: Deserializer<'de>,
{
    BandSelection::deserialize(deserializer).map(Some)
}

impl ParameterConfig {
    /// Deserialize the config entry for `parameter`.
    ///
    /// `band` may only be left out when `calculate_speed` is set, in which
    /// case the speed channel is the only output.
    pub fn from_value(parameter: &str, value: &Value) -> Result<Self> {
        let config = Self::deserialize(value).map_err(|e| ExtractionError::InvalidConfig {
            parameter: parameter.to_string(),
            reason: e.to_string(),
        })?;

        if config.band.is_none() && !config.calculate_speed {
            return Err(ExtractionError::InvalidConfig {
                parameter: parameter.to_string(),
                reason: "missing field `band`".to_string(),
            });
        }

        Ok(config)
    }

    /// Band specs in channel order; empty when `band` is absent.
    pub fn band_specs(&self) -> &[BandSpec] {
        self.band.as_ref().map(BandSelection::specs).unwrap_or(&[])
    }
}

/// Parameter name to raw config entry, in file order.
#[derive(Debug, Clone, Default)]
pub struct ExtractionConfig {
    parameters: Map<String, Value>,
}

impl ExtractionConfig {
    /// Load a config file. The top-level value must be a JSON object.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_error = |reason: String| ExtractionError::ConfigRead {
            path: path.to_path_buf(),
            reason,
        };

        let text = fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        Self::from_json(&text).map_err(config_error)
    }

    pub fn from_json(text: &str) -> std::result::Result<Self, String> {
        match serde_json::from_str::<Value>(text).map_err(|e| e.to_string())? {
            Value::Object(parameters) => Ok(Self { parameters }),
            other => Err(format!(
                "expected a JSON object of parameters, found {}",
                json_type_name(&other)
            )),
        }
    }

    /// Parameter names and their raw entries, in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.parameters.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// Short name of a JSON value's type, for error messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
